//! Field-level bitstream for 4-color residual fields.
//!
//! A residual field is split into three binary planes, one for each non-zero
//! value. Each plane is run-length coded with [`RunLength01MaxSmartCodec`]
//! and the three symbol streams share one sectioned arithmetic coder:
//!
//! ```text
//! varint   width
//! varint   height
//! freqs    run-length symbol counts, symbols 0..=config.symbols
//! arith    section(value 1) section(value 2) section(value 3)
//! ```

use crate::arith::{ArithmeticSectionsCodec, MAX_TOTAL};
use crate::config::FieldcodeConfig;
use crate::error::{Error, Result};
use crate::field::Field;
use crate::freqs::{count_values_in, load_freqs, save_freqs, RUN_LENGTH_META};
use crate::runlength::{RunLength01MaxSmartCodec, SymbolCodec};
use crate::varint;

/// Non-zero residual values, one plane each.
const PLANE_VALUES: [u32; 3] = [1, 2, 3];

/// Largest field a stream may declare.
pub const MAX_PIXELS: usize = 1 << 28;

/// Halve counts until their total leaves room for the section-end symbol.
/// Non-zero counts stay non-zero.
fn fit_total(mut counts: Vec<u64>, reserved: u64) -> Vec<u64> {
    let limit = MAX_TOTAL.saturating_sub(reserved);
    while counts.iter().sum::<u64>() > limit {
        for c in &mut counts {
            *c = c.div_ceil(2);
        }
    }
    counts
}

/// Most run symbols a stream with table `counts` can hold, given that no
/// plane section holds more than `section_limit` symbols.
///
/// Counts from `save_freqs` sit at most `ceiling - 1` below the true counts.
/// A table whose total is under half the fitting limit was never halved by
/// [`fit_total`], so the true counts bound the stream.
fn symbol_budget(counts: &[u64], reserved: u64, section_limit: usize) -> Result<usize> {
    let total: u64 = counts.iter().sum();
    let planes = section_limit.saturating_mul(PLANE_VALUES.len());
    if total > planes as u64 {
        return Err(Error::MalformedStream("frequency table exceeds the field"));
    }
    let slack = RUN_LENGTH_META.len() as u64 - 1;
    let unhalved = MAX_TOTAL.saturating_sub(reserved) / 2;
    if total + slack * counts.len() as u64 > unhalved {
        return Ok(planes);
    }
    let bound: u64 = counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| c + slack - 1)
        .sum();
    Ok(usize::try_from(bound).map_or(planes, |b| b.min(planes)))
}

/// Encode a field with values `0..=3`.
///
/// # Errors
/// Returns `Error::InvalidSymbol` for a pixel above 3.
pub fn encode(field: &Field, config: &FieldcodeConfig) -> Result<Vec<u8>> {
    config.validate()?;
    if let Some(&v) = field.data().iter().find(|&&v| v > 3) {
        return Err(Error::InvalidSymbol {
            symbol: v,
            alphabet: 4,
        });
    }

    let codec = RunLength01MaxSmartCodec::new(config.symbols)?;
    let planes = PLANE_VALUES
        .iter()
        .map(|&v| codec.encode(field.binary_plane(v).data()))
        .collect::<Result<Vec<_>>>()?;

    let alphabet = config.symbols as usize + 1;
    let counts = count_values_in(planes.iter().map(Vec::as_slice), alphabet)?;
    let counts = fit_total(counts, config.section_end_frequency);

    let mut out = Vec::new();
    varint::write_u64(&mut out, field.width() as u64)?;
    varint::write_u64(&mut out, field.height() as u64)?;
    let header = out.len();

    let (table, adjusted) = save_freqs(&counts, &RUN_LENGTH_META)?;
    out.extend_from_slice(&table);

    let mut sections = ArithmeticSectionsCodec::new(&adjusted, config.section_end_frequency)?;
    for plane in &planes {
        sections.write_section(plane)?;
    }
    let body = sections.finish()?;
    out.extend_from_slice(&body);

    log::debug!(
        "fieldcode {}x{}: size {} B, freqs {} B, sections {} B, run symbols {:?}",
        field.width(),
        field.height(),
        header,
        table.len(),
        body.len(),
        planes.iter().map(Vec::len).collect::<Vec<_>>()
    );
    Ok(out)
}

/// Decode a stream produced by [`encode`] with the same configuration.
///
/// # Errors
/// Returns `Error::MalformedStream` if a plane does not cover exactly
/// `width × height` pixels or two planes claim the same pixel. The
/// frequency table caps how many run symbols are decoded, so a short stream
/// with an implausible table is rejected before the field is allocated.
pub fn decode(bytes: &[u8], config: &FieldcodeConfig) -> Result<Field> {
    config.validate()?;
    let mut input = bytes;

    let width = usize::try_from(varint::read_u64(&mut input)?)
        .map_err(|_| Error::MalformedStream("width too large"))?;
    let height = usize::try_from(varint::read_u64(&mut input)?)
        .map_err(|_| Error::MalformedStream("height too large"))?;
    let pixels = width
        .checked_mul(height)
        .filter(|&n| n <= MAX_PIXELS)
        .ok_or(Error::MalformedStream("field too large"))?;

    let alphabet = config.symbols as usize + 1;
    let counts = load_freqs(&mut input, &RUN_LENGTH_META, alphabet)?;
    let section_limit = 2 * pixels + 2;
    let mut budget = symbol_budget(&counts, config.section_end_frequency, section_limit)?;
    let mut sections = ArithmeticSectionsCodec::new(&counts, config.section_end_frequency)?;
    sections.start_reading(input.to_vec())?;

    let codec = RunLength01MaxSmartCodec::new(config.symbols)?;
    let mut planes = Vec::with_capacity(PLANE_VALUES.len());
    for _ in &PLANE_VALUES {
        let symbols = sections.read_section(section_limit.min(budget))?;
        budget -= symbols.len();
        if codec.decoded_len(&symbols)? != pixels {
            return Err(Error::MalformedStream("plane does not cover the field"));
        }
        planes.push(symbols);
    }

    let mut data = vec![0u32; pixels];
    for (&value, symbols) in PLANE_VALUES.iter().zip(&planes) {
        let plane = codec.decode(symbols)?;
        for (pixel, bit) in data.iter_mut().zip(plane) {
            if bit == 1 {
                if *pixel != 0 {
                    return Err(Error::MalformedStream("planes overlap"));
                }
                *pixel = value;
            }
        }
    }

    Field::from_data(width, height, data)
}
