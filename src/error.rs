//! Error types for the coding pipeline.

use thiserror::Error;

/// Error variants for coding, prediction and stream parsing.
#[derive(Debug, Error)]
pub enum Error {
    /// A symbol outside the configured alphabet was written or produced.
    #[error("symbol {symbol} is outside the alphabet of {alphabet} symbols")]
    InvalidSymbol {
        /// The offending symbol.
        symbol: u32,
        /// Number of symbols in the alphabet.
        alphabet: usize,
    },

    /// A symbol with zero frequency was written.
    #[error("symbol {0} has zero probability")]
    ZeroProbability(u32),

    /// Reads and writes were mixed on one sectioned coder.
    #[error("cannot mix reads and writes on one sectioned coder")]
    StreamDirection,

    /// The input does not describe a valid stream.
    #[error("malformed stream: {0}")]
    MalformedStream(&'static str),

    /// The compressor variant only implements encoding.
    #[error("decoding is not implemented for {0}")]
    UnimplementedDecode(&'static str),

    /// The frequency total is too large for 32-bit range arithmetic.
    #[error("frequency total {0} exceeds the coder precision")]
    FrequencyOverflow(u64),

    /// A pixel outside the field was accessed under the `Error` policy.
    #[error("pixel ({x}, {y}) is outside the field")]
    OutOfBounds {
        /// Column.
        x: isize,
        /// Row.
        y: isize,
    },

    /// A constructor or configuration argument is invalid.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// No compressor is registered under the given name.
    #[error("unknown compressor: {0}")]
    UnknownCompressor(String),

    /// An I/O error occurred during encoding or decoding.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for coding operations.
pub type Result<T> = std::result::Result<T, Error>;
