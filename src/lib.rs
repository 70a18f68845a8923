//! # quadcode
//!
//! *Lossless compression of 4-color images by context prediction and
//! arithmetic coding.*
//!
//! ## Intuition First
//!
//! Most pixels in a flat, few-color image are exactly what their neighbors
//! suggest. If encoder and decoder run the same predictor over the image in
//! the same order, only the surprises need to be stored. Replacing every
//! pixel by `pixel ^ prediction` turns a busy picture into a field that is
//! almost entirely zero, and long runs of zeros are cheap to code.
//!
//! ## Pipeline
//!
//! ```text
//! Field (values 0..=3)
//!   │  predictor (context window, hashed shapes, neighbor heuristics)
//!   ▼
//! residual field ── binary plane per value 1, 2, 3
//!   │  RunLength01MaxSmartCodec
//!   ▼
//! zero-run symbols ── frequency table (save_freqs)
//!   │  ArithmeticSectionsCodec
//!   ▼
//! bytes
//! ```
//!
//! Decoding walks the same path backwards. The predictor rebuilds the field
//! pixel by pixel from the pixels it has already restored, so it sees
//! exactly the context the encoder saw.
//!
//! ## Components
//!
//! - [`arith`]: 32-bit arithmetic coder, a one-shot codec and a sectioned
//!   codec that shares one table across several terminated streams.
//! - [`freqs`]: compact frequency tables, coded through a fixed meta table.
//! - [`runlength`]: zero-run codecs for binary data and a staged
//!   run-length codec for multi-symbol data.
//! - [`predictor`], [`context`], [`hash_context`], [`rolling`]: the causal
//!   predictors.
//! - [`field`] and [`transform`]: the 2D grid and the predictive transforms.
//! - [`fieldcode`]: the residual bitstream.
//! - [`compressor`]: named end-to-end compressors. All but the resolution
//!   pyramid and the block-kind coder also decode.
//!
//! ## Failure Modes
//!
//! 1. **Predictor drift**: encoder and decoder predictors must be built from
//!    the same configuration. A mismatch is not detected; it decodes to a
//!    different image.
//! 2. **Memory**: context predictors keep one entry per distinct window, so
//!    memory grows with image size and window area.
//!
//! ## Example
//!
//! ```
//! use quadcode::{by_name, Field};
//!
//! let field = Field::from_data(4, 2, vec![0, 0, 1, 1, 0, 0, 1, 1]).unwrap();
//! let compressor = by_name("xor", &[]).unwrap();
//! let bytes = compressor.encode(&field).unwrap();
//! assert_eq!(compressor.decode(&bytes).unwrap(), field);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arith;
pub mod compressor;
pub mod config;
pub mod context;
pub mod crc64;
pub mod error;
pub mod field;
pub mod fieldcode;
pub mod freqs;
pub mod hash_context;
pub mod predictor;
pub mod rolling;
pub mod runlength;
pub mod transform;
pub mod varint;

pub use arith::{
    ArithmeticCodec, ArithmeticDecoder, ArithmeticEncoder, ArithmeticSectionsCodec, Frequencies,
};
pub use compressor::{
    by_name, BlockKinds, Compressor, DiffFieldcode, HashFieldcode, ResolutionPyramid,
    XorFieldcode,
};
pub use config::{CompressorConfig, FieldcodeConfig, PassOrder, PredictorConfig};
pub use context::{FixedSizePredictor, VariableSizePredictor};
pub use error::{Error, Result};
pub use field::{Field, OutOfBounds};
pub use freqs::{load_freqs, save_freqs};
pub use hash_context::HashPredictor;
pub use predictor::{
    HorzVertPredictor, LeftOrTopPredictor, MostFrequentPredictor, NullPredictor, Predictor,
    VertPredictor,
};
pub use rolling::RollingContextPredictor;
pub use runlength::{
    RunLength01Codec, RunLength01MaxCodec, RunLength01MaxSmartCodec, RunLengthCodec, SymbolCodec,
};
