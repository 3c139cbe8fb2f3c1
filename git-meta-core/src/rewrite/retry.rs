//! Fetch retry/backoff policy for the pick loop (`spec.md` §9 Open
//! Questions: "up to 3 attempts with ~500 ms linear backoff", since the
//! distilled spec left the exact parameters unspecified).

use std::time::Duration;

use git2::Repository;

use crate::error::{Error, Result};
use crate::opener;

pub const MAX_ATTEMPTS: u32 = 3;

pub trait FetchRetry {
    fn sleep(&self, attempt: u32);
}

/// Real backoff: 500ms, 1000ms, 1500ms between attempts.
pub struct LinearBackoff;

impl FetchRetry for LinearBackoff {
    fn sleep(&self, attempt: u32) {
        std::thread::sleep(Duration::from_millis(500 * u64::from(attempt)));
    }
}

/// Zero-delay stand-in so tests exercise the retry *logic* without paying
/// the wall-clock cost.
pub struct NoDelay;

impl FetchRetry for NoDelay {
    fn sleep(&self, _attempt: u32) {}
}

/// Fetches `sha` into `sub_repo` if missing, retrying up to `MAX_ATTEMPTS`
/// times. Any in-progress sequencer is left untouched by the caller on final
/// failure, per `spec.md` §4.2 "Failure semantics".
pub fn fetch_with_retry(
    sub_repo: &Repository,
    sha: git2::Oid,
    remote: &str,
    retry: &dyn FetchRetry,
) -> Result<()> {
    let mut last_err = None;
    for attempt in 1..=MAX_ATTEMPTS {
        match opener::fetch_if_missing(sub_repo, sha) {
            Ok(()) => return Ok(()),
            Err(err) => {
                last_err = Some(err);
                if attempt < MAX_ATTEMPTS {
                    retry.sleep(attempt);
                }
            }
        }
    }
    match last_err {
        Some(Error::Git(source)) => Err(Error::RemoteFailure {
            remote: remote.to_string(),
            attempts: MAX_ATTEMPTS,
            source,
        }),
        Some(other) => Err(other),
        None => Ok(()),
    }
}
