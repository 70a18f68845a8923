//! Adaptive arithmetic coding over explicit symbol frequencies.
//!
//! The coder keeps a 32-bit `[low, high]` interval and narrows it in
//! proportion to each symbol's share of the total frequency. Matching top
//! bits are shifted out as soon as they are settled; when the interval
//! straddles the midpoint without settling (the underflow case) the second
//! bit is dropped and a complement bit is owed to the output. Bits are packed
//! into bytes least significant bit first.
//!
//! Encoder and decoder must see identical frequencies at every symbol; the
//! stream has no checksum, so any divergence silently corrupts the rest of it.

use std::io::{Cursor, ErrorKind, Read, Write};

use crate::error::{Error, Result};

/// Largest frequency total the coder accepts.
///
/// A renormalized interval is always wider than `2^30`, so every symbol with
/// a positive frequency keeps a non-empty sub-interval.
pub const MAX_TOTAL: u64 = 1 << 30;

const MASK: u64 = 0xFFFF_FFFF;
const TOP_BIT: u64 = 0x8000_0000;
const SECOND_BIT: u64 = 0x4000_0000;

/// Zero bits the decoder may read past the end of its input. A flushed
/// stream never needs more than 30.
const MAX_PADDING_BITS: u32 = 32;

/// A symbol frequency table with its running total and cumulative sums.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frequencies {
    probs: Vec<u64>,
    cumulative: Vec<u64>,
}

impl Frequencies {
    /// Build a table from per-symbol counts.
    ///
    /// # Errors
    /// Returns `Error::InvalidParameter` if the table is empty or sums to
    /// zero, and `Error::FrequencyOverflow` if the total exceeds [`MAX_TOTAL`].
    pub fn new(probs: Vec<u64>) -> Result<Self> {
        let mut cumulative = Vec::with_capacity(probs.len() + 1);
        let mut total = 0u64;
        cumulative.push(0);
        for &p in &probs {
            total = total
                .checked_add(p)
                .ok_or(Error::FrequencyOverflow(u64::MAX))?;
            cumulative.push(total);
        }
        if total == 0 {
            return Err(Error::InvalidParameter("frequency table sums to zero"));
        }
        if total > MAX_TOTAL {
            return Err(Error::FrequencyOverflow(total));
        }
        Ok(Self { probs, cumulative })
    }

    /// Number of symbols in the alphabet.
    pub fn len(&self) -> usize {
        self.probs.len()
    }

    /// Whether the alphabet is empty. Always false for a constructed table.
    pub fn is_empty(&self) -> bool {
        self.probs.is_empty()
    }

    /// Sum of all frequencies.
    pub fn total(&self) -> u64 {
        self.cumulative[self.probs.len()]
    }

    /// Frequency of `symbol`, or zero outside the alphabet.
    pub fn get(&self, symbol: u32) -> u64 {
        self.probs.get(symbol as usize).copied().unwrap_or(0)
    }

    /// Sum of the frequencies of all symbols below `symbol`.
    pub fn cumulative(&self, symbol: u32) -> u64 {
        self.cumulative[symbol as usize]
    }

    /// The per-symbol counts.
    pub fn as_slice(&self) -> &[u64] {
        &self.probs
    }

    /// Symbol whose cumulative range contains `target` (`target < total`).
    fn symbol_at(&self, target: u64) -> u32 {
        // Last index whose cumulative start is <= target; zero-frequency
        // symbols share their start with the next symbol and are skipped.
        let idx = self.cumulative.partition_point(|&c| c <= target);
        (idx - 1) as u32
    }

    fn check(&self, symbol: u32) -> Result<(u64, u64)> {
        if symbol as usize >= self.probs.len() {
            return Err(Error::InvalidSymbol {
                symbol,
                alphabet: self.probs.len(),
            });
        }
        let freq = self.probs[symbol as usize];
        if freq == 0 {
            return Err(Error::ZeroProbability(symbol));
        }
        Ok((self.cumulative[symbol as usize], freq))
    }
}

/// Narrow `[low, high]` to the slice `[pos, pos + freq) / total`.
#[inline]
fn narrow(low: u64, high: u64, pos: u64, freq: u64, total: u64) -> (u64, u64) {
    let range = high - low + 1;
    let new_low = range * pos / total + low;
    let new_high = range * (pos + freq) / total + low - 1;
    (new_low, new_high)
}

/// Arithmetic encoder writing to a byte sink.
pub struct ArithmeticEncoder<W: Write> {
    freqs: Frequencies,
    writer: W,
    low: u64,
    high: u64,
    underflow: u64,
    cur_byte: u8,
    cur_bit: u8,
}

impl<W: Write> ArithmeticEncoder<W> {
    /// Create an encoder over `writer` using the given frequencies.
    pub fn new(writer: W, freqs: Frequencies) -> Self {
        Self {
            freqs,
            writer,
            low: 0,
            high: MASK,
            underflow: 0,
            cur_byte: 0,
            cur_bit: 0,
        }
    }

    /// The frequencies used for the next symbol.
    pub fn frequencies(&self) -> &Frequencies {
        &self.freqs
    }

    /// Replace the frequency table. The decoder must switch tables at the
    /// same symbol position.
    pub fn set_frequencies(&mut self, freqs: Frequencies) {
        self.freqs = freqs;
    }

    /// Encode one symbol.
    ///
    /// # Errors
    /// Returns `Error::InvalidSymbol` if `symbol` is outside the alphabet and
    /// `Error::ZeroProbability` if its frequency is zero.
    pub fn write_symbol(&mut self, symbol: u32) -> Result<()> {
        let (pos, freq) = self.freqs.check(symbol)?;
        let (low, high) = narrow(self.low, self.high, pos, freq, self.freqs.total());
        self.low = low;
        self.high = high;

        while (self.high & TOP_BIT) == (self.low & TOP_BIT) {
            let bit = self.high & TOP_BIT != 0;
            self.output_bit(bit)?;
            while self.underflow > 0 {
                self.output_bit(!bit)?;
                self.underflow -= 1;
            }
            self.high = ((self.high << 1) & MASK) | 1;
            self.low = (self.low << 1) & MASK;
        }

        while (self.low & SECOND_BIT) != 0 && (self.high & SECOND_BIT) == 0 {
            self.underflow += 1;
            self.high = ((self.high & 0x7FFF_FFFF) << 1) | 0x8000_0001;
            self.low = (self.low << 1) & 0x7FFF_FFFF;
        }
        Ok(())
    }

    fn output_bit(&mut self, bit: bool) -> Result<()> {
        if bit {
            self.cur_byte |= 1 << self.cur_bit;
        }
        if self.cur_bit >= 7 {
            self.writer.write_all(&[self.cur_byte])?;
            self.cur_bit = 0;
            self.cur_byte = 0;
        } else {
            self.cur_bit += 1;
        }
        Ok(())
    }

    /// Emit the bits that disambiguate the final interval and the last
    /// partial byte. Must be called once after the last symbol; the encoder
    /// is reset afterwards and can start a new stream.
    pub fn flush(&mut self) -> Result<()> {
        let bit = self.low & SECOND_BIT != 0;
        self.output_bit(bit)?;
        self.underflow += 1;
        while self.underflow > 0 {
            self.output_bit(!bit)?;
            self.underflow -= 1;
        }
        self.writer.write_all(&[self.cur_byte])?;

        self.low = 0;
        self.high = MASK;
        self.cur_byte = 0;
        self.cur_bit = 0;
        self.underflow = 0;
        Ok(())
    }

    /// Borrow the underlying sink.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Flush and return the underlying sink.
    pub fn finish(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.writer)
    }
}

/// Arithmetic decoder reading from a byte source.
pub struct ArithmeticDecoder<R: Read> {
    freqs: Frequencies,
    reader: R,
    low: u64,
    high: u64,
    code: u64,
    cur_byte: u8,
    bits_left: u8,
    exhausted: bool,
    padding_bits: u32,
}

impl<R: Read> ArithmeticDecoder<R> {
    /// Create a decoder and prime it with the first 32 bits of `reader`.
    pub fn new(reader: R, freqs: Frequencies) -> Result<Self> {
        let mut decoder = Self {
            freqs,
            reader,
            low: 0,
            high: MASK,
            code: 0,
            cur_byte: 0,
            bits_left: 0,
            exhausted: false,
            padding_bits: 0,
        };
        for _ in 0..32 {
            decoder.code = (decoder.code << 1) | decoder.input_bit()?;
        }
        Ok(decoder)
    }

    /// The frequencies used for the next symbol.
    pub fn frequencies(&self) -> &Frequencies {
        &self.freqs
    }

    /// Replace the frequency table, mirroring the encoder.
    pub fn set_frequencies(&mut self, freqs: Frequencies) {
        self.freqs = freqs;
    }

    /// Decode one symbol.
    ///
    /// # Errors
    /// Returns `Error::MalformedStream` if decoding needs more input than a
    /// flushed stream can require.
    pub fn read_symbol(&mut self) -> Result<u32> {
        let total = self.freqs.total();
        let range = self.high - self.low + 1;
        let offset = self
            .code
            .checked_sub(self.low)
            .ok_or(Error::MalformedStream("code below interval"))?;
        let target = ((offset + 1) * total - 1) / range;
        if target >= total {
            return Err(Error::MalformedStream("code above interval"));
        }

        let symbol = self.freqs.symbol_at(target);
        let pos = self.freqs.cumulative(symbol);
        let freq = self.freqs.get(symbol);
        let (low, high) = narrow(self.low, self.high, pos, freq, total);
        self.low = low;
        self.high = high;

        while (self.high & TOP_BIT) == (self.low & TOP_BIT) {
            self.high = ((self.high << 1) & MASK) | 1;
            self.low = (self.low << 1) & MASK;
            self.code = ((self.code << 1) & MASK) | self.input_bit()?;
        }

        while (self.low & SECOND_BIT) != 0 && (self.high & SECOND_BIT) == 0 {
            self.high = ((self.high & 0x7FFF_FFFF) << 1) | 0x8000_0001;
            self.low = (self.low << 1) & 0x7FFF_FFFF;
            self.code = (((self.code ^ SECOND_BIT) << 1) & MASK) | self.input_bit()?;
        }

        Ok(symbol)
    }

    fn input_bit(&mut self) -> Result<u64> {
        if self.bits_left == 0 && !self.next_byte()? {
            self.padding_bits += 1;
            if self.padding_bits > MAX_PADDING_BITS {
                return Err(Error::MalformedStream("read past end of arithmetic stream"));
            }
            return Ok(0);
        }
        let bit = u64::from(self.cur_byte & 1);
        self.cur_byte >>= 1;
        self.bits_left -= 1;
        Ok(bit)
    }

    fn next_byte(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        let mut byte = [0u8; 1];
        loop {
            match self.reader.read(&mut byte) {
                Ok(0) => {
                    self.exhausted = true;
                    return Ok(false);
                }
                Ok(_) => {
                    self.cur_byte = byte[0];
                    self.bits_left = 8;
                    return Ok(true);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Return the underlying source.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// One-shot coder that terminates each stream with an end symbol.
///
/// The end symbol is appended to the alphabet with frequency 1.
#[derive(Debug, Clone)]
pub struct ArithmeticCodec {
    freqs: Frequencies,
    sym_end: u32,
}

impl ArithmeticCodec {
    /// Create a codec for the alphabet described by `probs`.
    pub fn new(probs: &[u64]) -> Result<Self> {
        let mut all = Vec::with_capacity(probs.len() + 1);
        all.extend_from_slice(probs);
        all.push(1);
        Ok(Self {
            freqs: Frequencies::new(all)?,
            sym_end: probs.len() as u32,
        })
    }

    /// Encode `data` followed by the end symbol.
    pub fn encode(&self, data: &[u32]) -> Result<Vec<u8>> {
        let mut encoder = ArithmeticEncoder::new(Vec::new(), self.freqs.clone());
        for &symbol in data {
            if symbol >= self.sym_end {
                return Err(Error::InvalidSymbol {
                    symbol,
                    alphabet: self.sym_end as usize,
                });
            }
            encoder.write_symbol(symbol)?;
        }
        encoder.write_symbol(self.sym_end)?;
        encoder.finish()
    }

    /// Decode symbols up to the end symbol.
    pub fn decode(&self, data: &[u8]) -> Result<Vec<u32>> {
        let mut decoder = ArithmeticDecoder::new(data, self.freqs.clone())?;
        let mut out = Vec::new();
        loop {
            let symbol = decoder.read_symbol()?;
            if symbol == self.sym_end {
                return Ok(out);
            }
            out.push(symbol);
        }
    }
}

enum Direction {
    Idle,
    Writing(ArithmeticEncoder<Vec<u8>>),
    Reading(ArithmeticDecoder<Cursor<Vec<u8>>>),
}

/// Several independently terminated sections sharing one coder and table.
///
/// An instance is either a writer or a reader for its whole life; mixing the
/// two fails with `Error::StreamDirection`.
pub struct ArithmeticSectionsCodec {
    freqs: Frequencies,
    sym_end: u32,
    direction: Direction,
}

impl ArithmeticSectionsCodec {
    /// Create a codec for `probs` plus a section-end symbol whose frequency
    /// is the expected number of sections.
    pub fn new(probs: &[u64], est_sections: u64) -> Result<Self> {
        if est_sections == 0 {
            return Err(Error::InvalidParameter("section-end frequency must be positive"));
        }
        let mut all = Vec::with_capacity(probs.len() + 1);
        all.extend_from_slice(probs);
        all.push(est_sections);
        Ok(Self {
            freqs: Frequencies::new(all)?,
            sym_end: probs.len() as u32,
            direction: Direction::Idle,
        })
    }

    /// The symbol that terminates each section.
    pub fn section_end(&self) -> u32 {
        self.sym_end
    }

    /// Append one section.
    pub fn write_section(&mut self, data: &[u32]) -> Result<()> {
        if let Direction::Idle = self.direction {
            self.direction =
                Direction::Writing(ArithmeticEncoder::new(Vec::new(), self.freqs.clone()));
        }
        let Direction::Writing(encoder) = &mut self.direction else {
            return Err(Error::StreamDirection);
        };
        for &symbol in data {
            if symbol >= self.sym_end {
                return Err(Error::InvalidSymbol {
                    symbol,
                    alphabet: self.sym_end as usize,
                });
            }
            encoder.write_symbol(symbol)?;
        }
        encoder.write_symbol(self.sym_end)
    }

    /// Flush the coder and return the encoded sections.
    pub fn finish(self) -> Result<Vec<u8>> {
        match self.direction {
            Direction::Idle => ArithmeticEncoder::new(Vec::new(), self.freqs).finish(),
            Direction::Writing(encoder) => encoder.finish(),
            Direction::Reading(_) => Err(Error::StreamDirection),
        }
    }

    /// Begin decoding sections from `data`.
    pub fn start_reading(&mut self, data: Vec<u8>) -> Result<()> {
        match self.direction {
            Direction::Idle => {
                let decoder = ArithmeticDecoder::new(Cursor::new(data), self.freqs.clone())?;
                self.direction = Direction::Reading(decoder);
                Ok(())
            }
            Direction::Writing(_) => Err(Error::StreamDirection),
            // Already positioned inside a stream.
            Direction::Reading(_) => Ok(()),
        }
    }

    /// Decode the next section.
    ///
    /// # Errors
    /// Returns `Error::StreamDirection` if the instance is writing or has no
    /// input, and `Error::MalformedStream` if the section holds more than
    /// `limit` symbols.
    pub fn read_section(&mut self, limit: usize) -> Result<Vec<u32>> {
        let Direction::Reading(decoder) = &mut self.direction else {
            return Err(Error::StreamDirection);
        };
        let mut out = Vec::new();
        loop {
            let symbol = decoder.read_symbol()?;
            if symbol == self.sym_end {
                return Ok(out);
            }
            if out.len() == limit {
                return Err(Error::MalformedStream("section exceeds its length limit"));
            }
            out.push(symbol);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_uniform_three_symbols() {
        let codec = ArithmeticCodec::new(&[1, 1, 1]).unwrap();
        let input = vec![0, 1, 2, 0, 1, 2];
        let bytes = codec.encode(&input).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), input);
    }

    #[test]
    fn test_empty_payload() {
        let codec = ArithmeticCodec::new(&[5, 3]).unwrap();
        let bytes = codec.encode(&[]).unwrap();
        assert!(!bytes.is_empty());
        assert!(codec.decode(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_single_symbol() {
        let codec = ArithmeticCodec::new(&[7, 1, 0, 2]).unwrap();
        let bytes = codec.encode(&[3]).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), vec![3]);
    }

    #[test]
    fn test_invalid_symbol() {
        let freqs = Frequencies::new(vec![1, 1]).unwrap();
        let mut encoder = ArithmeticEncoder::new(Vec::new(), freqs);
        assert!(matches!(
            encoder.write_symbol(2),
            Err(Error::InvalidSymbol { symbol: 2, alphabet: 2 })
        ));
    }

    #[test]
    fn test_zero_probability() {
        let freqs = Frequencies::new(vec![1, 0, 1]).unwrap();
        let mut encoder = ArithmeticEncoder::new(Vec::new(), freqs);
        assert!(matches!(encoder.write_symbol(1), Err(Error::ZeroProbability(1))));
    }

    #[test]
    fn test_frequency_limits() {
        assert!(matches!(
            Frequencies::new(vec![0, 0]),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            Frequencies::new(vec![MAX_TOTAL, 1]),
            Err(Error::FrequencyOverflow(_))
        ));
        let freqs = Frequencies::new(vec![3, 0, 5]).unwrap();
        assert_eq!(freqs.total(), 8);
        assert_eq!(freqs.cumulative(2), 3);
        assert_eq!(freqs.symbol_at(2), 0);
        assert_eq!(freqs.symbol_at(3), 2);
    }

    #[test]
    fn test_skewed_long_run() {
        // Long runs of a dominant symbol exercise the underflow path.
        let codec = ArithmeticCodec::new(&[1000, 1, 1]).unwrap();
        let mut input = vec![0u32; 5000];
        input[1234] = 1;
        input[4321] = 2;
        let bytes = codec.encode(&input).unwrap();
        assert!(bytes.len() < 200);
        assert_eq!(codec.decode(&bytes).unwrap(), input);
    }

    #[test]
    fn test_encoder_reuse_after_flush() {
        let freqs = Frequencies::new(vec![2, 1, 1]).unwrap();
        let mut encoder = ArithmeticEncoder::new(Vec::new(), freqs.clone());
        encoder.write_symbol(1).unwrap();
        encoder.flush().unwrap();
        let first_len = encoder.get_ref().len();
        encoder.write_symbol(2).unwrap();
        let bytes = encoder.finish().unwrap();

        let mut first = ArithmeticDecoder::new(&bytes[..first_len], freqs.clone()).unwrap();
        assert_eq!(first.read_symbol().unwrap(), 1);
        let mut second = ArithmeticDecoder::new(&bytes[first_len..], freqs).unwrap();
        assert_eq!(second.read_symbol().unwrap(), 2);
    }

    #[test]
    fn test_decoder_runs_dry() {
        let codec = ArithmeticCodec::new(&[1, 1]).unwrap();
        // An empty input never reaches the end symbol.
        assert!(matches!(
            codec.decode(&[]),
            Err(Error::MalformedStream(_))
        ));
    }

    #[test]
    fn test_sections_roundtrip() {
        let mut writer = ArithmeticSectionsCodec::new(&[4, 3, 2, 1], 3).unwrap();
        let sections: [&[u32]; 3] = [&[0, 1, 2, 3], &[], &[3, 3, 0]];
        for s in sections {
            writer.write_section(s).unwrap();
        }
        let bytes = writer.finish().unwrap();

        let mut reader = ArithmeticSectionsCodec::new(&[4, 3, 2, 1], 3).unwrap();
        reader.start_reading(bytes).unwrap();
        for s in sections {
            assert_eq!(reader.read_section(16).unwrap(), s);
        }
    }

    #[test]
    fn test_sections_direction_misuse() {
        let mut writer = ArithmeticSectionsCodec::new(&[1, 1], 1).unwrap();
        writer.write_section(&[0, 1]).unwrap();
        assert!(matches!(writer.read_section(10), Err(Error::StreamDirection)));
        assert!(matches!(
            writer.start_reading(vec![0]),
            Err(Error::StreamDirection)
        ));

        let mut reader = ArithmeticSectionsCodec::new(&[1, 1], 1).unwrap();
        reader.start_reading(vec![0, 0, 0, 0]).unwrap();
        assert!(matches!(reader.write_section(&[0]), Err(Error::StreamDirection)));
        assert!(matches!(reader.finish(), Err(Error::StreamDirection)));
    }

    #[test]
    fn test_section_limit() {
        let mut writer = ArithmeticSectionsCodec::new(&[1, 1], 1).unwrap();
        writer.write_section(&[0, 1, 0, 1]).unwrap();
        let bytes = writer.finish().unwrap();
        let mut reader = ArithmeticSectionsCodec::new(&[1, 1], 1).unwrap();
        reader.start_reading(bytes).unwrap();
        assert!(matches!(
            reader.read_section(3),
            Err(Error::MalformedStream(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_codec_roundtrip(
            probs in prop::collection::vec(1u64..500, 1..20),
            picks in prop::collection::vec(any::<prop::sample::Index>(), 0..300),
        ) {
            let input: Vec<u32> = picks.iter().map(|i| i.index(probs.len()) as u32).collect();
            let codec = ArithmeticCodec::new(&probs).unwrap();
            let bytes = codec.encode(&input).unwrap();
            prop_assert_eq!(codec.decode(&bytes).unwrap(), input);
        }

        #[test]
        fn prop_adaptive_tables_stay_in_sync(
            input in prop::collection::vec(0u32..4, 1..200),
        ) {
            // Both sides bump the count of each coded symbol.
            let mut counts = vec![1u64; 5];
            let mut encoder = ArithmeticEncoder::new(Vec::new(), Frequencies::new(counts.clone()).unwrap());
            for &s in &input {
                encoder.write_symbol(s).unwrap();
                counts[s as usize] += 1;
                encoder.set_frequencies(Frequencies::new(counts.clone()).unwrap());
            }
            encoder.write_symbol(4).unwrap();
            let bytes = encoder.finish().unwrap();

            let mut counts = vec![1u64; 5];
            let mut decoder = ArithmeticDecoder::new(&bytes[..], Frequencies::new(counts.clone()).unwrap()).unwrap();
            let mut out = Vec::new();
            loop {
                let s = decoder.read_symbol().unwrap();
                if s == 4 {
                    break;
                }
                out.push(s);
                counts[s as usize] += 1;
                decoder.set_frequencies(Frequencies::new(counts.clone()).unwrap());
            }
            prop_assert_eq!(out, input);
        }
    }
}
