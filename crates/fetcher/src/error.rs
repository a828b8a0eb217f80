//! Public error surface of the fetcher.

/// Error returned by the fetcher's submission methods once
/// [`stop`](crate::Fetcher::stop) has been called.
///
/// This is the only error callers need to distinguish. Every internal
/// decision — quota, distance, duplicates, validation, insert failures — is
/// absorbed into state cleanup and logging and never surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("fetcher terminated")]
pub struct Terminated;
