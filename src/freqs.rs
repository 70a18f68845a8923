//! Compact serialization of frequency tables.
//!
//! Counts below a small ceiling are coded directly as symbols of an embedded
//! arithmetic stream driven by a fixed, offline-calibrated meta table. Counts
//! at or above the ceiling are coded as the ceiling symbol and their excess
//! goes to a varint side channel, rounded down to a multiple of the ceiling.
//!
//! Layout:
//!
//! ```text
//! varint   n                    length of the embedded arithmetic stream
//! [u8; n]  meta-coded symbols   min(count, ceiling) per entry
//! varint*  overflow             count / ceiling - 1, per entry >= ceiling
//! ```

use std::io::Read;

use crate::arith::{ArithmeticDecoder, ArithmeticEncoder, Frequencies};
use crate::error::{Error, Result};
use crate::varint;

/// Meta table for run-length symbol frequencies. The last entry is the
/// ceiling symbol.
pub const RUN_LENGTH_META: [u64; 32] = [
    594, 274, 294, 231, 176, 134, 84, 67, 54, 47, 54, 31, 29, 29, 13, 18, 18, 21, 16, 11, 14, 19,
    6, 8, 14, 14, 8, 9, 3, 7, 7, 512,
];

/// Meta table for block-kind frequencies, skewed towards very small counts.
pub const KIND_META: [u64; 32] = [
    1599, 370, 174, 137, 76, 59, 41, 36, 31, 18, 18, 21, 15, 10, 9, 5, 12, 6, 7, 8, 2, 6, 2, 4, 4,
    1, 3, 7, 5, 1, 2, 128,
];

/// Serialize `freqs` using the `meta` table.
///
/// Returns the encoded bytes together with the table the decoder will
/// reconstruct. Entries at or above the ceiling are rounded down to a
/// multiple of it, so the returned table (not `freqs`) must drive any
/// subsequent coding.
///
/// # Errors
/// Returns `Error::InvalidParameter` if `meta` has fewer than two entries or
/// any zero entry.
pub fn save_freqs(freqs: &[u64], meta: &[u64]) -> Result<(Vec<u8>, Vec<u64>)> {
    let (meta_freqs, ceiling) = meta_table(meta)?;

    let mut encoder = ArithmeticEncoder::new(Vec::new(), meta_freqs);
    let mut overflow = Vec::new();
    let mut adjusted = Vec::with_capacity(freqs.len());

    for &count in freqs {
        if count < ceiling {
            encoder.write_symbol(count as u32)?;
            adjusted.push(count);
        } else {
            encoder.write_symbol(ceiling as u32)?;
            let chunks = count / ceiling;
            varint::write_u64(&mut overflow, chunks - 1)?;
            adjusted.push(chunks * ceiling);
        }
    }
    let blob = encoder.finish()?;

    let mut out = Vec::with_capacity(blob.len() + overflow.len() + 4);
    varint::write_u64(&mut out, blob.len() as u64)?;
    out.extend_from_slice(&blob);
    out.extend_from_slice(&overflow);

    log::trace!(
        "saved {} frequencies in {} bytes ({} overflow)",
        freqs.len(),
        out.len(),
        overflow.len()
    );
    Ok((out, adjusted))
}

/// Read `len` frequencies written by [`save_freqs`] with the same `meta`.
pub fn load_freqs<R: Read>(input: &mut R, meta: &[u64], len: usize) -> Result<Vec<u64>> {
    let (meta_freqs, ceiling) = meta_table(meta)?;

    let blob_len = usize::try_from(varint::read_u64(input)?)
        .map_err(|_| Error::MalformedStream("frequency blob too large"))?;
    let mut blob = Vec::new();
    (&mut *input).take(blob_len as u64).read_to_end(&mut blob)?;
    if blob.len() != blob_len {
        return Err(Error::MalformedStream("truncated frequency blob"));
    }

    let mut decoder = ArithmeticDecoder::new(&blob[..], meta_freqs)?;
    let mut freqs = Vec::with_capacity(len);
    let mut overflowing = Vec::new();
    for i in 0..len {
        let symbol = u64::from(decoder.read_symbol()?);
        if symbol == ceiling {
            overflowing.push(i);
        }
        freqs.push(symbol);
    }

    for i in overflowing {
        let extra = varint::read_u64(input)?;
        freqs[i] = extra
            .checked_add(1)
            .and_then(|chunks| chunks.checked_mul(ceiling))
            .ok_or(Error::MalformedStream("frequency overflow value too large"))?;
    }
    Ok(freqs)
}

fn meta_table(meta: &[u64]) -> Result<(Frequencies, u64)> {
    if meta.len() < 2 {
        return Err(Error::InvalidParameter("meta table needs at least two entries"));
    }
    if meta.contains(&0) {
        return Err(Error::InvalidParameter("meta table entries must be positive"));
    }
    let ceiling = (meta.len() - 1) as u64;
    Ok((Frequencies::new(meta.to_vec())?, ceiling))
}

/// Serialize `freqs` as one varint per entry.
pub fn save_freqs_plain(freqs: &[u64]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(freqs.len());
    for &f in freqs {
        varint::write_u64(&mut out, f)?;
    }
    Ok(out)
}

/// Read `len` frequencies written by [`save_freqs_plain`].
pub fn load_freqs_plain<R: Read>(input: &mut R, len: usize) -> Result<Vec<u64>> {
    (0..len).map(|_| varint::read_u64(input)).collect()
}

/// Histogram of `symbols`, sized to the largest symbol plus one.
pub fn count_values(symbols: &[u32]) -> Vec<u64> {
    let mut counts = Vec::new();
    for &s in symbols {
        let s = s as usize;
        if s >= counts.len() {
            counts.resize(s + 1, 0);
        }
        counts[s] += 1;
    }
    counts
}

/// Histogram over several symbol streams, sized to `len`.
///
/// # Errors
/// Returns `Error::InvalidSymbol` for a symbol `>= len`.
pub fn count_values_in<'a, I>(streams: I, len: usize) -> Result<Vec<u64>>
where
    I: IntoIterator<Item = &'a [u32]>,
{
    let mut counts = vec![0u64; len];
    for stream in streams {
        for &s in stream {
            let slot = counts.get_mut(s as usize).ok_or(Error::InvalidSymbol {
                symbol: s,
                alphabet: len,
            })?;
            *slot += 1;
        }
    }
    Ok(counts)
}
