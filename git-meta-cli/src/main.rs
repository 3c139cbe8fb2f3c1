fn main() {
    let cwd = std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
    let code = git_meta::run(&cwd, std::env::args_os());
    std::process::exit(code);
}
