//! Named end-to-end compressors.
//!
//! Each compressor turns a 4-color [`Field`] into bytes by running a
//! predictive transform and handing the residual to [`fieldcode`].
//! [`BlockKinds`] codes its residual itself.

use crate::arith::{ArithmeticEncoder, Frequencies};
use crate::config::CompressorConfig;
use crate::error::{Error, Result};
use crate::field::Field;
use crate::fieldcode;
use crate::freqs::{save_freqs, KIND_META, RUN_LENGTH_META};
use crate::varint;

/// Names accepted by [`by_name`].
pub const NAMES: [&str; 5] = ["xor", "diff", "hash", "pyramid", "blocks"];

/// A complete image codec.
pub trait Compressor: Send + Sync {
    /// Registry name.
    fn name(&self) -> &'static str;

    /// Compress a field with values `0..=3`.
    fn encode(&self, field: &Field) -> Result<Vec<u8>>;

    /// Rebuild the field from [`Compressor::encode`] output.
    fn decode(&self, bytes: &[u8]) -> Result<Field>;
}

/// Context prediction, XOR residual, fieldcode.
#[derive(Debug, Clone, Default)]
pub struct XorFieldcode {
    config: CompressorConfig,
}

impl XorFieldcode {
    /// Create a compressor after validating `config`.
    pub fn new(config: CompressorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl Compressor for XorFieldcode {
    fn name(&self) -> &'static str {
        "xor"
    }

    fn encode(&self, field: &Field) -> Result<Vec<u8>> {
        let mut residual = field.clone();
        residual.prediction_en_transform_xor(&mut self.config.predictor.build()?)?;
        fieldcode::encode(&residual, &self.config.fieldcode)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Field> {
        let mut field = fieldcode::decode(bytes, &self.config.fieldcode)?;
        field.prediction_de_transform_xor(&mut self.config.predictor.build()?)?;
        Ok(field)
    }
}

/// Context prediction, modular difference residual, fieldcode.
#[derive(Debug, Clone)]
pub struct DiffFieldcode {
    config: CompressorConfig,
}

impl DiffFieldcode {
    /// Create a compressor after validating `config`. The residual must fit
    /// the fieldcode's four values, so `modulus` may not exceed 4.
    pub fn new(config: CompressorConfig) -> Result<Self> {
        config.validate()?;
        if config.modulus > 4 {
            return Err(Error::InvalidParameter("modulus must be at most 4"));
        }
        Ok(Self { config })
    }
}

impl Compressor for DiffFieldcode {
    fn name(&self) -> &'static str {
        "diff"
    }

    fn encode(&self, field: &Field) -> Result<Vec<u8>> {
        let mut residual = field.clone();
        residual.prediction_en_transform_diff(
            &mut self.config.predictor.build()?,
            self.config.modulus,
        )?;
        fieldcode::encode(&residual, &self.config.fieldcode)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Field> {
        let mut field = fieldcode::decode(bytes, &self.config.fieldcode)?;
        if let Some(&v) = field.data().iter().find(|&&v| v >= self.config.modulus) {
            return Err(Error::InvalidSymbol {
                symbol: v,
                alphabet: self.config.modulus as usize,
            });
        }
        field.prediction_de_transform_diff(
            &mut self.config.predictor.build()?,
            self.config.modulus,
        )?;
        Ok(field)
    }
}

/// Hashed-context XOR passes over rows and/or columns, then fieldcode.
///
/// A vertical pass transposes the field, runs the transform and transposes
/// back. Each pass gets a fresh predictor.
#[derive(Debug, Clone)]
pub struct HashFieldcode {
    config: CompressorConfig,
}

impl HashFieldcode {
    /// Create a compressor after validating `config`.
    pub fn new(config: CompressorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl Default for HashFieldcode {
    fn default() -> Self {
        Self {
            config: CompressorConfig::hash(),
        }
    }
}

impl Compressor for HashFieldcode {
    fn name(&self) -> &'static str {
        "hash"
    }

    fn encode(&self, field: &Field) -> Result<Vec<u8>> {
        let mut residual = field.clone();
        for &transposed in self.config.passes.passes() {
            if transposed {
                residual.transpose();
            }
            let misses =
                residual.prediction_en_transform_xor(&mut self.config.predictor.build()?)?;
            if transposed {
                residual.transpose();
            }
            log::debug!("hash pass (transposed: {}): {} mispredicts", transposed, misses);
        }
        fieldcode::encode(&residual, &self.config.fieldcode)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Field> {
        let mut field = fieldcode::decode(bytes, &self.config.fieldcode)?;
        for &transposed in self.config.passes.passes().iter().rev() {
            if transposed {
                field.transpose();
            }
            field.prediction_de_transform_xor(&mut self.config.predictor.build()?)?;
            if transposed {
                field.transpose();
            }
        }
        Ok(field)
    }
}

/// Resolution pyramid with nearest-neighbour upsampled XOR residuals.
///
/// Stream layout: varint level count, then varint-length-prefixed fieldcode
/// blobs, coarsest level first, followed by the residual of each finer
/// level. Encode only.
#[derive(Debug, Clone, Default)]
pub struct ResolutionPyramid {
    config: CompressorConfig,
}

impl ResolutionPyramid {
    /// Create a compressor after validating `config`.
    pub fn new(config: CompressorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Successive halvings of `field`, finest first. Halving continues
    /// while both sides exceed `pyramid_min_side`.
    pub fn levels(&self, field: &Field) -> Vec<Field> {
        let mut levels = vec![field.clone()];
        let min = self.config.pyramid_min_side;
        while let Some(last) = levels.last() {
            if last.width() <= min || last.height() <= min {
                break;
            }
            let half = last.half_res_highest_count();
            levels.push(half);
        }
        levels
    }
}

/// `fine XOR upsample(coarse)`, where each coarse pixel covers a 2×2 block.
fn upsampled_residual(fine: &Field, coarse: &Field) -> Result<Field> {
    let mut residual = fine.clone();
    let width = fine.width();
    for y in 0..fine.height() {
        for x in 0..width {
            let predicted = coarse.data()[(y / 2) * coarse.width() + x / 2];
            residual.data_mut()[y * width + x] ^= predicted;
        }
    }
    if residual.data().iter().any(|&v| v > 3) {
        return Err(Error::InvalidParameter("pyramid input must use values 0..=3"));
    }
    Ok(residual)
}

impl Compressor for ResolutionPyramid {
    fn name(&self) -> &'static str {
        "pyramid"
    }

    fn encode(&self, field: &Field) -> Result<Vec<u8>> {
        let levels = self.levels(field);
        let mut out = Vec::new();
        varint::write_u64(&mut out, levels.len() as u64)?;

        let mut blobs = Vec::with_capacity(levels.len());
        if let Some(coarsest) = levels.last() {
            blobs.push(fieldcode::encode(coarsest, &self.config.fieldcode)?);
        }
        for pair in levels.windows(2).rev() {
            let residual = upsampled_residual(&pair[0], &pair[1])?;
            blobs.push(fieldcode::encode(&residual, &self.config.fieldcode)?);
        }
        for blob in &blobs {
            varint::write_u64(&mut out, blob.len() as u64)?;
            out.extend_from_slice(blob);
        }

        log::debug!(
            "pyramid of {} levels: {:?} B",
            levels.len(),
            blobs.iter().map(Vec::len).collect::<Vec<_>>()
        );
        Ok(out)
    }

    fn decode(&self, _bytes: &[u8]) -> Result<Field> {
        Err(Error::UnimplementedDecode("resolution pyramid"))
    }
}

/// Rolling-context XOR residual, coded block by block. Encode only.
///
/// The kind of a block is the bitmask of the residual values it holds
/// (bit `v - 1` for value `v`). Kinds are then narrowed in block order:
///
/// - a 5 between two 7s becomes 7;
/// - a 3, 5, 6 or 7 becomes 3 if the first half of the block is zero, else
///   6 if the second half is, else stays 5 or turns 7.
///
/// A narrowed 3 codes the second half of its block in all three planes and
/// a 6 the first half. Any other kind codes its pixels in the planes whose
/// bit it sets.
///
/// Stream layout:
///
/// ```text
/// varint  width
/// varint  height
/// bytes   kind runs    (KIND_META table)
/// bytes   pixel runs   (RUN_LENGTH_META table)
/// ```
///
/// Each `bytes` entry is a 256-entry `save_freqs` table, a varint byte
/// count, a varint coded length and the arithmetic-coded bytes.
#[derive(Debug, Clone)]
pub struct BlockKinds {
    config: CompressorConfig,
}

impl Default for BlockKinds {
    fn default() -> Self {
        Self {
            config: CompressorConfig::blocks(),
        }
    }
}

impl BlockKinds {
    /// Create a compressor after validating `config`.
    pub fn new(config: CompressorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    fn blocks_per_row(&self, width: usize) -> usize {
        width.div_ceil(self.config.block_width)
    }

    /// Block of `(x, y)` and the pixel's raster index inside it.
    fn locate(&self, cols: usize, x: usize, y: usize) -> (usize, usize) {
        let (bw, bh) = (self.config.block_width, self.config.block_height);
        ((y / bh) * cols + x / bw, (y % bh) * bw + x % bw)
    }

    /// Narrowed kind of every block of `residual`, blocks in raster order.
    ///
    /// # Errors
    /// Returns `Error::InvalidSymbol` for a residual above 3.
    pub fn kinds(&self, residual: &Field) -> Result<Vec<u8>> {
        let cols = self.blocks_per_row(residual.width());
        let rows = residual.height().div_ceil(self.config.block_height);
        let half = self.config.block_width * self.config.block_height / 2;

        let mut kinds = vec![0u8; cols * rows];
        let mut first_half = vec![false; kinds.len()];
        let mut second_half = vec![false; kinds.len()];
        let width = residual.width();
        for (p, &v) in residual.data().iter().enumerate() {
            if v == 0 {
                continue;
            }
            if v > 3 {
                return Err(Error::InvalidSymbol {
                    symbol: v,
                    alphabet: 4,
                });
            }
            let (block, index) = self.locate(cols, p % width, p / width);
            kinds[block] |= 1 << (v - 1);
            if index < half {
                first_half[block] = true;
            } else {
                second_half[block] = true;
            }
        }

        for i in 0..kinds.len() {
            if kinds[i] == 5 && i > 0 && i + 1 < kinds.len() && kinds[i - 1] == 7 && kinds[i + 1] == 7
            {
                kinds[i] = 7;
            }
            let k = kinds[i];
            if k == 3 || k > 4 {
                kinds[i] = if !first_half[i] {
                    3
                } else if !second_half[i] {
                    6
                } else if k == 5 {
                    5
                } else {
                    7
                };
            }
        }
        Ok(kinds)
    }

    /// Zero runs between occurrences of each plane's value, over the
    /// pixels each block's kind admits. A larger residual counts as a zero;
    /// a smaller non-zero one was coded by an earlier plane and is skipped.
    fn pixel_runs(&self, residual: &Field, kinds: &[u8]) -> Result<Vec<u8>> {
        let cols = self.blocks_per_row(residual.width());
        let half = self.config.block_width * self.config.block_height / 2;
        let width = residual.width();

        let mut out = Vec::new();
        let mut run = 0u64;
        for plane in 0..3u32 {
            for (p, &v) in residual.data().iter().enumerate() {
                let (block, index) = self.locate(cols, p % width, p / width);
                let coded = match kinds[block] {
                    3 => index >= half,
                    6 => index < half,
                    k => k & (1 << plane) != 0,
                };
                if !coded {
                    continue;
                }
                if v == plane + 1 {
                    varint::write_u64(&mut out, run)?;
                    run = 0;
                } else if v == 0 || v > plane + 1 {
                    run += 1;
                }
            }
        }
        if run > 0 {
            varint::write_u64(&mut out, run)?;
        }
        Ok(out)
    }
}

/// Alternating run lengths of the kind bit planes, plane 0 first, as
/// varints. The first run counts clear bits and may be empty.
fn kind_runs(kinds: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut set = false;
    let mut run = 0u64;
    for plane in 0..3 {
        for &k in kinds {
            if set != (k & (1 << plane) != 0) {
                varint::write_u64(&mut out, run)?;
                set = !set;
                run = 1;
            } else {
                run += 1;
            }
        }
    }
    varint::write_u64(&mut out, run)?;
    Ok(out)
}

/// Append `bytes` as a frequency table over all byte values followed by
/// their arithmetic coding.
fn write_byte_stream(out: &mut Vec<u8>, bytes: &[u8], meta: &[u64]) -> Result<()> {
    let mut counts = vec![0u64; 256];
    for &b in bytes {
        counts[usize::from(b)] += 1;
    }
    let (table, adjusted) = save_freqs(&counts, meta)?;
    out.extend_from_slice(&table);
    varint::write_u64(out, bytes.len() as u64)?;

    let coded = if bytes.is_empty() {
        Vec::new()
    } else {
        let mut encoder = ArithmeticEncoder::new(Vec::new(), Frequencies::new(adjusted)?);
        for &b in bytes {
            encoder.write_symbol(u32::from(b))?;
        }
        encoder.finish()?
    };
    varint::write_u64(out, coded.len() as u64)?;
    out.extend_from_slice(&coded);
    Ok(())
}

impl Compressor for BlockKinds {
    fn name(&self) -> &'static str {
        "blocks"
    }

    fn encode(&self, field: &Field) -> Result<Vec<u8>> {
        let mut residual = field.clone();
        let misses = residual.prediction_en_transform_xor(&mut self.config.predictor.build()?)?;
        let kinds = self.kinds(&residual)?;
        let kind_runs = kind_runs(&kinds)?;
        let pixel_runs = self.pixel_runs(&residual, &kinds)?;

        let mut out = Vec::new();
        varint::write_u64(&mut out, field.width() as u64)?;
        varint::write_u64(&mut out, field.height() as u64)?;
        let header = out.len();
        write_byte_stream(&mut out, &kind_runs, &KIND_META)?;
        let kinds_end = out.len();
        write_byte_stream(&mut out, &pixel_runs, &RUN_LENGTH_META)?;

        log::debug!(
            "block kinds {}x{}: {} blocks, {} mispredicts, kind runs {} B, pixel runs {} B",
            field.width(),
            field.height(),
            kinds.len(),
            misses,
            kinds_end - header,
            out.len() - kinds_end
        );
        Ok(out)
    }

    fn decode(&self, _bytes: &[u8]) -> Result<Field> {
        Err(Error::UnimplementedDecode("block kinds"))
    }
}

/// Build the compressor registered as `name` from positional arguments.
///
/// See [`CompressorConfig::from_args`] for the arguments each name takes.
pub fn by_name(name: &str, args: &[&str]) -> Result<Box<dyn Compressor>> {
    let config = CompressorConfig::from_args(name, args)?;
    Ok(match name {
        "xor" => Box::new(XorFieldcode::new(config)?),
        "diff" => Box::new(DiffFieldcode::new(config)?),
        "hash" => Box::new(HashFieldcode::new(config)?),
        "pyramid" => Box::new(ResolutionPyramid::new(config)?),
        "blocks" => Box::new(BlockKinds::new(config)?),
        _ => return Err(Error::UnknownCompressor(name.to_string())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PassOrder, PredictorConfig};

    fn blobs(w: usize, h: usize) -> Field {
        let data = (0..w * h)
            .map(|i| {
                let (x, y) = (i % w, i / w);
                if (x / 6 + y / 4) % 3 == 0 {
                    ((x + y) / 9 % 4) as u32
                } else {
                    0
                }
            })
            .collect();
        Field::from_data(w, h, data).unwrap()
    }

    #[test]
    fn test_xor_roundtrip() {
        let c = XorFieldcode::default();
        let f = blobs(40, 30);
        let bytes = c.encode(&f).unwrap();
        assert_eq!(c.decode(&bytes).unwrap(), f);
    }

    #[test]
    fn test_diff_roundtrip() {
        let c = DiffFieldcode::new(CompressorConfig {
            predictor: PredictorConfig::MostFrequent { size: 3 },
            ..Default::default()
        })
        .unwrap();
        let f = blobs(25, 19);
        let bytes = c.encode(&f).unwrap();
        assert_eq!(c.decode(&bytes).unwrap(), f);
    }

    #[test]
    fn test_diff_rejects_wide_modulus() {
        let config = CompressorConfig {
            modulus: 5,
            ..Default::default()
        };
        assert!(DiffFieldcode::new(config).is_err());
    }

    #[test]
    fn test_hash_every_pass_order() {
        let f = blobs(23, 17);
        for passes in [
            PassOrder::Horizontal,
            PassOrder::Vertical,
            PassOrder::HorizontalThenVertical,
            PassOrder::VerticalThenHorizontal,
        ] {
            let c = HashFieldcode::new(CompressorConfig {
                predictor: PredictorConfig::Hash {
                    max_width: 7,
                    max_height: 7,
                },
                passes,
                ..Default::default()
            })
            .unwrap();
            let bytes = c.encode(&f).unwrap();
            assert_eq!(c.decode(&bytes).unwrap(), f, "{:?}", passes);
        }
    }

    #[test]
    fn test_empty_field() {
        let f = Field::new(0, 0);
        for name in ["xor", "diff", "hash"] {
            let c = by_name(name, &[]).unwrap();
            let bytes = c.encode(&f).unwrap();
            let back = c.decode(&bytes).unwrap();
            assert!(back.is_empty(), "{}", name);
        }
    }

    #[test]
    fn test_pyramid_levels() {
        let c = ResolutionPyramid::new(CompressorConfig {
            pyramid_min_side: 10,
            ..Default::default()
        })
        .unwrap();
        let f = blobs(45, 30);
        let sizes: Vec<_> = c
            .levels(&f)
            .iter()
            .map(|l| (l.width(), l.height()))
            .collect();
        assert_eq!(sizes, vec![(45, 30), (23, 15), (12, 8)]);

        let bytes = c.encode(&f).unwrap();
        let mut input = bytes.as_slice();
        assert_eq!(varint::read_u64(&mut input).unwrap(), 3);

        // The coarsest blob is a plain fieldcode stream of the last level.
        let len = varint::read_u64(&mut input).unwrap() as usize;
        let coarsest = fieldcode::decode(&input[..len], &Default::default()).unwrap();
        assert_eq!(coarsest, c.levels(&f)[2]);

        assert!(matches!(
            c.decode(&bytes),
            Err(Error::UnimplementedDecode(_))
        ));
    }

    #[test]
    fn test_upsampled_residual_of_solid_image_is_zero() {
        let f = Field::from_data(5, 3, vec![2; 15]).unwrap();
        let r = upsampled_residual(&f, &f.half_res_highest_count()).unwrap();
        assert!(r.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_block_kind_narrowing() {
        let c = BlockKinds::default();
        let mut data = vec![0u32; 24 * 8];
        let mut put = |x: usize, y: usize, v: u32| data[y * 24 + x] = v;
        // Block 0 holds all three values in both halves.
        put(0, 0, 1);
        put(1, 0, 2);
        put(2, 7, 3);
        // Block 1 holds 1 and 3 in both halves, between two 7s.
        put(8, 1, 1);
        put(9, 6, 3);
        // Block 2 holds all three values in both halves.
        put(16, 0, 3);
        put(17, 5, 2);
        put(18, 5, 1);
        let f = Field::from_data(24, 8, data).unwrap();
        assert_eq!(c.kinds(&f).unwrap(), vec![7, 7, 7]);

        let mut data = vec![0u32; 32 * 8];
        let mut put = |x: usize, y: usize, v: u32| data[y * 32 + x] = v;
        // 1 and 2 in the second half only.
        put(0, 5, 1);
        put(3, 7, 2);
        // 2 and 3 in the first half only.
        put(8, 0, 2);
        put(9, 3, 3);
        // 1 and 3 in both halves, not enclosed by 7s.
        put(16, 0, 1);
        put(16, 7, 3);
        // A single value is never narrowed.
        put(24, 7, 2);
        let f = Field::from_data(32, 8, data).unwrap();
        assert_eq!(c.kinds(&f).unwrap(), vec![3, 6, 5, 2]);
    }

    #[test]
    fn test_kind_runs() {
        // Plane bits 1,0,1 | 0,0,1 | 0,0,0.
        assert_eq!(kind_runs(&[1, 0, 3]).unwrap(), vec![0, 1, 1, 1, 2, 1, 3]);
        assert_eq!(kind_runs(&[]).unwrap(), vec![0]);
    }

    #[test]
    fn test_pixel_runs() {
        let c = BlockKinds::default();
        let mut data = vec![0u32; 64];
        data[0] = 2;
        let f = Field::from_data(8, 8, data).unwrap();
        let kinds = c.kinds(&f).unwrap();
        assert_eq!(kinds, vec![2]);
        assert_eq!(c.pixel_runs(&f, &kinds).unwrap(), vec![0, 63]);

        // Second half only: each plane sees pixels 32..64.
        let mut data = vec![0u32; 64];
        data[40] = 1;
        data[50] = 2;
        let f = Field::from_data(8, 8, data).unwrap();
        let kinds = c.kinds(&f).unwrap();
        assert_eq!(kinds, vec![3]);
        assert_eq!(c.pixel_runs(&f, &kinds).unwrap(), vec![8, 40, 43]);
    }

    #[test]
    fn test_block_kinds_stream() {
        let c = BlockKinds::default();
        let f = blobs(45, 30);
        let mut residual = f.clone();
        residual
            .prediction_en_transform_xor(&mut c.config.predictor.build().unwrap())
            .unwrap();
        let kinds = c.kinds(&residual).unwrap();
        assert_eq!(kinds.len(), 6 * 4);
        let runs = kind_runs(&kinds).unwrap();
        assert!(!runs.is_empty());
        assert_eq!(kind_runs(&c.kinds(&residual).unwrap()).unwrap(), runs);

        let bytes = c.encode(&f).unwrap();
        assert_eq!(c.encode(&f).unwrap(), bytes);
        let mut input = bytes.as_slice();
        assert_eq!(varint::read_u64(&mut input).unwrap(), 45);
        assert_eq!(varint::read_u64(&mut input).unwrap(), 30);
        assert!(matches!(
            c.decode(&bytes),
            Err(Error::UnimplementedDecode(_))
        ));

        // Empty fields still produce both streams.
        assert!(!c.encode(&Field::new(0, 0)).unwrap().is_empty());
    }

    #[test]
    fn test_by_name() {
        for name in NAMES {
            assert_eq!(by_name(name, &[]).unwrap().name(), name);
        }
        assert!(matches!(
            by_name("bogus", &[]),
            Err(Error::UnknownCompressor(_))
        ));
        assert_eq!(by_name("hash", &["3", "9", "9"]).unwrap().name(), "hash");
        assert_eq!(by_name("blocks", &["4", "4"]).unwrap().name(), "blocks");
        assert!(by_name("blocks", &["0", "8"]).is_err());
    }
}
