//! Minimal ANSI helpers for quoting affected names in a distinct marker
//! (`spec.md` §7: "quote affected names in a distinct color/marker"),
//! reimplemented against this domain's data rather than carried over
//! file-for-file from `headlamp/src/format/ansi.rs`.

pub fn bold(text: &str) -> String {
    format!("\u{1b}[1m{text}\u{1b}[22m")
}

pub fn red(text: &str) -> String {
    format!("\u{1b}[31m{text}\u{1b}[39m")
}

pub fn yellow(text: &str) -> String {
    format!("\u{1b}[33m{text}\u{1b}[39m")
}

pub fn green(text: &str) -> String {
    format!("\u{1b}[32m{text}\u{1b}[39m")
}

pub fn cyan(text: &str) -> String {
    format!("\u{1b}[36m{text}\u{1b}[39m")
}

/// Quotes a repo/submodule name in the marker used throughout conflict and
/// error output: bold cyan between backticks.
pub fn quote_name(name: &str) -> String {
    bold(&cyan(&format!("`{name}`")))
}
