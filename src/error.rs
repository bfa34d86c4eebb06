//! Error types for regionroute

use std::fmt;

/// Result type alias for regionroute operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for regionroute
///
/// Only two conditions are fatal: a misconfigured region hostname detected
/// at initialization, and a first-ever resolution failure before any
/// address set has been cached. Everything else is absorbed by the policy
/// and degrades to a best-effort, possibly-stale answer.
#[derive(Debug)]
pub enum Error {
    /// Configuration errors (fatal at initialization, not retried)
    Config(String),
    /// Name resolution failed with no previously cached address set
    Resolution(String),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Resolution(msg) => write!(f, "Resolution error: {}", msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_message() {
        let err = Error::Config("region hostname matches no node".to_string());
        assert!(format!("{err}").contains("region hostname matches no node"));

        let err = Error::Resolution("unknown host".to_string());
        assert!(format!("{err}").contains("unknown host"));
    }
}
