//! Error types for eventform.
//!
//! The streaming operations themselves never fail: bad data is reported
//! through data-quality signals (invalid planes, NaN centroids, discard
//! counters). The only fallible calls are construction-time configuration.

use thiserror::Error;

/// Result type alias for eventform operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors, raised before the streaming loop starts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Analysis or time-estimation algorithm key not recognized.
    #[error("unknown analysis algorithm: {0:?}")]
    UnknownAlgorithm(String),

    /// Amplitude compatibility band is malformed.
    #[error("invalid amplitude band: low={low}, high={high}")]
    InvalidAmplitudeBand {
        /// Lower multiplicative coefficient.
        low: f64,
        /// Upper multiplicative coefficient.
        high: f64,
    },
}
