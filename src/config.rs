//! Compressor configuration.
//!
//! Plain structs with defaults and named presets. With the `serde` feature
//! they can be loaded from any serde format.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::context::{FixedSizePredictor, VariableSizePredictor};
use crate::error::{Error, Result};
use crate::hash_context::HashPredictor;
use crate::predictor::{
    HorzVertPredictor, LeftOrTopPredictor, MostFrequentPredictor, NullPredictor, Predictor,
    VertPredictor,
};
use crate::rolling::RollingContextPredictor;

/// Predictor selection. Context predictors fall back to
/// [`HorzVertPredictor`], except the rolling one, which falls back to
/// [`LeftOrTopPredictor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PredictorConfig {
    /// [`NullPredictor`].
    Null,
    /// [`HorzVertPredictor`].
    HorzVert,
    /// [`VertPredictor`].
    Vert,
    /// [`MostFrequentPredictor`] over a `size × size` window.
    MostFrequent {
        /// Window side.
        size: usize,
    },
    /// [`FixedSizePredictor`].
    FixedSize {
        /// Window width.
        width: usize,
        /// Window height, including the current row.
        height: usize,
        /// Pixels to the left of the current one.
        xpos: usize,
    },
    /// [`VariableSizePredictor`].
    VariableSize {
        /// Window width.
        width: usize,
        /// Tallest window height.
        height: usize,
        /// Pixels to the left of the current one.
        xpos: usize,
    },
    /// [`HashPredictor`].
    Hash {
        /// Widest shape.
        max_width: usize,
        /// Tallest shape.
        max_height: usize,
    },
    /// [`RollingContextPredictor`] over its fixed 8×8 band.
    Rolling,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        PredictorConfig::FixedSize {
            width: 7,
            height: 7,
            xpos: 3,
        }
    }
}

impl PredictorConfig {
    /// Hashed multi-shape contexts up to 13×13.
    pub fn hash() -> Self {
        PredictorConfig::Hash {
            max_width: 13,
            max_height: 13,
        }
    }

    /// Stateless neighbor heuristics only.
    pub fn fast() -> Self {
        PredictorConfig::HorzVert
    }

    /// Build a fresh predictor.
    pub fn build(&self) -> Result<Box<dyn Predictor>> {
        Ok(match *self {
            PredictorConfig::Null => Box::new(NullPredictor),
            PredictorConfig::HorzVert => Box::new(HorzVertPredictor),
            PredictorConfig::Vert => Box::new(VertPredictor),
            PredictorConfig::MostFrequent { size } => {
                if size == 0 {
                    return Err(Error::InvalidParameter("window size must be positive"));
                }
                Box::new(MostFrequentPredictor::new(size))
            }
            PredictorConfig::FixedSize {
                width,
                height,
                xpos,
            } => Box::new(FixedSizePredictor::new(
                width,
                height,
                xpos,
                Box::new(HorzVertPredictor),
            )?),
            PredictorConfig::VariableSize {
                width,
                height,
                xpos,
            } => Box::new(VariableSizePredictor::new(
                width,
                height,
                xpos,
                Box::new(HorzVertPredictor),
            )?),
            PredictorConfig::Hash {
                max_width,
                max_height,
            } => Box::new(HashPredictor::new(
                max_width,
                max_height,
                Box::new(HorzVertPredictor),
            )?),
            PredictorConfig::Rolling => {
                Box::new(RollingContextPredictor::new(Box::new(LeftOrTopPredictor)))
            }
        })
    }
}

/// Parameters of the fieldcode stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FieldcodeConfig {
    /// Escape symbol of the run-length codec; run symbols are `0..=symbols`.
    pub symbols: u32,
    /// Frequency of the section-end symbol.
    pub section_end_frequency: u64,
}

impl Default for FieldcodeConfig {
    fn default() -> Self {
        Self {
            symbols: 1024,
            section_end_frequency: 3,
        }
    }
}

impl FieldcodeConfig {
    /// Reject values the stream cannot represent.
    pub fn validate(&self) -> Result<()> {
        if self.symbols == 0 || self.symbols > 1 << 20 {
            return Err(Error::InvalidParameter("fieldcode symbols must be in 1..=2^20"));
        }
        if self.section_end_frequency == 0 || self.section_end_frequency > 1 << 20 {
            return Err(Error::InvalidParameter("section-end frequency must be in 1..=2^20"));
        }
        Ok(())
    }
}

/// Order of the horizontal and vertical passes of the hash compressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PassOrder {
    /// Rows only.
    #[default]
    Horizontal,
    /// Columns only.
    Vertical,
    /// Rows, then columns of the residual.
    HorizontalThenVertical,
    /// Columns, then rows of the residual.
    VerticalThenHorizontal,
}

impl PassOrder {
    fn from_index(index: u32) -> Result<Self> {
        match index {
            0 => Ok(PassOrder::Horizontal),
            1 => Ok(PassOrder::Vertical),
            2 => Ok(PassOrder::HorizontalThenVertical),
            3 => Ok(PassOrder::VerticalThenHorizontal),
            _ => Err(Error::InvalidParameter("pass order must be 0..=3")),
        }
    }

    /// Whether each pass runs over transposed data, in encoding order.
    pub fn passes(&self) -> &'static [bool] {
        match self {
            PassOrder::Horizontal => &[false],
            PassOrder::Vertical => &[true],
            PassOrder::HorizontalThenVertical => &[false, true],
            PassOrder::VerticalThenHorizontal => &[true, false],
        }
    }
}

/// Full configuration of a named compressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompressorConfig {
    /// Pixel predictor.
    pub predictor: PredictorConfig,
    /// Fieldcode stream parameters.
    pub fieldcode: FieldcodeConfig,
    /// Modulus of the difference transform.
    pub modulus: u32,
    /// Passes of the hash compressor.
    pub passes: PassOrder,
    /// The resolution pyramid stops halving once a side is at most this.
    pub pyramid_min_side: usize,
    /// Block width of the block-kind compressor.
    pub block_width: usize,
    /// Block height of the block-kind compressor.
    pub block_height: usize,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            predictor: PredictorConfig::default(),
            fieldcode: FieldcodeConfig::default(),
            modulus: 4,
            passes: PassOrder::Horizontal,
            pyramid_min_side: 100,
            block_width: 8,
            block_height: 8,
        }
    }
}

fn arg<T: std::str::FromStr>(args: &[&str], index: usize, default: T) -> Result<T> {
    match args.get(index) {
        None => Ok(default),
        Some(s) => s
            .trim()
            .parse()
            .map_err(|_| Error::InvalidParameter("argument is not a valid number")),
    }
}

impl CompressorConfig {
    /// Defaults for the hash compressor.
    pub fn hash() -> Self {
        Self {
            predictor: PredictorConfig::hash(),
            ..Default::default()
        }
    }

    /// Defaults for the block-kind compressor.
    pub fn blocks() -> Self {
        Self {
            predictor: PredictorConfig::Rolling,
            ..Default::default()
        }
    }

    /// Parse positional arguments for the compressor `name`.
    ///
    /// - `xor`, `diff`: `width height xpos symbols` (default `7 7 3 1024`)
    /// - `hash`: `order max_width max_height symbols` (default `0 13 13 1024`)
    /// - `pyramid`: `min_side` (default `100`)
    /// - `blocks`: `block_width block_height` (default `8 8`)
    ///
    /// # Errors
    /// Returns `Error::UnknownCompressor` for an unknown name and
    /// `Error::InvalidParameter` for unparsable or invalid arguments.
    pub fn from_args(name: &str, args: &[&str]) -> Result<Self> {
        let config = match name {
            "xor" | "diff" => Self {
                predictor: PredictorConfig::FixedSize {
                    width: arg(args, 0, 7)?,
                    height: arg(args, 1, 7)?,
                    xpos: arg(args, 2, 3)?,
                },
                fieldcode: FieldcodeConfig {
                    symbols: arg(args, 3, 1024)?,
                    ..Default::default()
                },
                ..Default::default()
            },
            "hash" => Self {
                passes: PassOrder::from_index(arg(args, 0, 0)?)?,
                predictor: PredictorConfig::Hash {
                    max_width: arg(args, 1, 13)?,
                    max_height: arg(args, 2, 13)?,
                },
                fieldcode: FieldcodeConfig {
                    symbols: arg(args, 3, 1024)?,
                    ..Default::default()
                },
                ..Default::default()
            },
            "pyramid" => Self {
                pyramid_min_side: arg(args, 0, 100)?,
                ..Default::default()
            },
            "blocks" => Self {
                block_width: arg(args, 0, 8)?,
                block_height: arg(args, 1, 8)?,
                ..Self::blocks()
            },
            _ => return Err(Error::UnknownCompressor(name.to_string())),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every parameter by building what it describes.
    pub fn validate(&self) -> Result<()> {
        self.fieldcode.validate()?;
        if self.modulus == 0 {
            return Err(Error::InvalidParameter("modulus must be positive"));
        }
        if self.pyramid_min_side == 0 {
            return Err(Error::InvalidParameter("pyramid side must be positive"));
        }
        if self.block_width == 0 || self.block_height == 0 {
            return Err(Error::InvalidParameter("block sides must be positive"));
        }
        self.predictor.build().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(CompressorConfig::default().validate().is_ok());
        assert!(CompressorConfig::hash().validate().is_ok());
        assert_eq!(FieldcodeConfig::default().symbols, 1024);
    }

    #[test]
    fn test_from_args() {
        let c = CompressorConfig::from_args("xor", &["5", "4", "2"]).unwrap();
        assert_eq!(
            c.predictor,
            PredictorConfig::FixedSize {
                width: 5,
                height: 4,
                xpos: 2
            }
        );
        assert_eq!(c.fieldcode.symbols, 1024);

        let c = CompressorConfig::from_args("hash", &["2", "7", "9", "64"]).unwrap();
        assert_eq!(c.passes, PassOrder::HorizontalThenVertical);
        assert_eq!(
            c.predictor,
            PredictorConfig::Hash {
                max_width: 7,
                max_height: 9
            }
        );
        assert_eq!(c.fieldcode.symbols, 64);

        let c = CompressorConfig::from_args("pyramid", &[]).unwrap();
        assert_eq!(c.pyramid_min_side, 100);

        let c = CompressorConfig::from_args("blocks", &["16"]).unwrap();
        assert_eq!((c.block_width, c.block_height), (16, 8));
        assert_eq!(c.predictor, PredictorConfig::Rolling);
    }

    #[test]
    fn test_from_args_errors() {
        assert!(matches!(
            CompressorConfig::from_args("lzw", &[]),
            Err(Error::UnknownCompressor(name)) if name == "lzw"
        ));
        assert!(matches!(
            CompressorConfig::from_args("xor", &["seven"]),
            Err(Error::InvalidParameter(_))
        ));
        assert!(CompressorConfig::from_args("hash", &["4"]).is_err());
        assert!(CompressorConfig::from_args("xor", &["9", "9", "4"]).is_err());
        assert!(CompressorConfig::from_args("diff", &["7", "7", "3", "0"]).is_err());
        assert!(CompressorConfig::from_args("blocks", &["8", "0"]).is_err());
    }

    #[test]
    fn test_pass_order() {
        assert_eq!(PassOrder::Vertical.passes(), &[true]);
        assert_eq!(PassOrder::VerticalThenHorizontal.passes(), &[true, false]);
    }

    #[test]
    fn test_predictor_build() {
        assert!(PredictorConfig::MostFrequent { size: 0 }.build().is_err());
        assert!(PredictorConfig::Hash {
            max_width: 2,
            max_height: 2
        }
        .build()
        .is_err());
        assert!(PredictorConfig::fast().build().is_ok());
        assert!(PredictorConfig::VariableSize {
            width: 5,
            height: 3,
            xpos: 2
        }
        .build()
        .is_ok());
    }
}
