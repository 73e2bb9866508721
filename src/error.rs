use thiserror::Error;

/// Errors surfaced by the core library.
///
/// Validation failures are surfaced to the caller and never retried.
/// Code-generation collisions are recovered internally and never appear
/// here. Unknown codes on update/delete are reported as absent results
/// (`Ok(None)` / `Ok(false)`), not as errors. Only persistent-storage
/// unavailability propagates as a hard failure.
#[derive(Debug, Error)]
pub enum Error {
    #[error("target URL length {0} is outside the accepted range (6, 2048]")]
    TargetLength(usize),
    #[error("target does not look like a URL")]
    MalformedTarget,
    #[error("timestamp does not match DD-MM-YYYY.hh:mm")]
    MalformedTimestamp,
    #[error("expiry must lie between 5 minutes and 50 years from now")]
    ExpiryOutOfRange,
    #[error("a mapping cannot be both permanent and carry an expiry")]
    PermanentWithExpiry,
    #[error("could not allocate a free short code")]
    CodeSpaceExhausted,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
