//! Run-length symbol codecs.
//!
//! The `RunLength01*` codecs turn a binary field into the lengths of its
//! zero runs: a count is emitted at every `1` and at the end of the data, so
//! a stream with `k` ones yields `k + 1` counts. They differ only in how
//! counts above the alphabet ceiling are split into bounded symbols.
//!
//! [`RunLengthCodec`] instead keeps literal symbols and replaces long runs of
//! selected symbols with staged escape symbols.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// A reversible mapping between symbol streams.
pub trait SymbolCodec {
    /// Encode `data` into a symbol stream.
    fn encode(&self, data: &[u32]) -> Result<Vec<u32>>;

    /// Decode a symbol stream produced by [`SymbolCodec::encode`].
    fn decode(&self, data: &[u32]) -> Result<Vec<u32>>;

    /// Largest symbol the encoder emits, or `None` if unbounded.
    fn max_symbol(&self) -> Option<u32>;
}

/// Walk a binary stream and call `emit` with each zero-run length.
fn for_each_run(data: &[u32], mut emit: impl FnMut(u32)) -> Result<()> {
    let mut run = 0u32;
    for &v in data {
        match v {
            0 => run += 1,
            1 => {
                emit(run);
                run = 0;
            }
            _ => {
                return Err(Error::InvalidSymbol {
                    symbol: v,
                    alphabet: 2,
                })
            }
        }
    }
    emit(run);
    Ok(())
}

fn push_run(out: &mut Vec<u32>, first: bool, zeros: usize) {
    if !first {
        out.push(1);
    }
    out.resize(out.len() + zeros, 0);
}

/// Unbounded zero-run lengths.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunLength01Codec;

impl SymbolCodec for RunLength01Codec {
    fn encode(&self, data: &[u32]) -> Result<Vec<u32>> {
        let mut out = Vec::new();
        for_each_run(data, |run| out.push(run))?;
        Ok(out)
    }

    fn decode(&self, data: &[u32]) -> Result<Vec<u32>> {
        let mut out = Vec::new();
        for (i, &run) in data.iter().enumerate() {
            push_run(&mut out, i == 0, run as usize);
        }
        Ok(out)
    }

    fn max_symbol(&self) -> Option<u32> {
        None
    }
}

/// Zero-run lengths capped at `max_run`: a long run is written as repeated
/// `max_run` symbols followed by the remainder.
#[derive(Debug, Clone, Copy)]
pub struct RunLength01MaxCodec {
    max_run: u32,
}

impl RunLength01MaxCodec {
    /// Create a codec emitting symbols `0..=max_run`.
    pub fn new(max_run: u32) -> Result<Self> {
        if max_run == 0 {
            return Err(Error::InvalidParameter("max_run must be positive"));
        }
        Ok(Self { max_run })
    }
}

impl SymbolCodec for RunLength01MaxCodec {
    fn encode(&self, data: &[u32]) -> Result<Vec<u32>> {
        let mut out = Vec::new();
        for_each_run(data, |mut run| {
            while run >= self.max_run {
                out.push(self.max_run);
                run -= self.max_run;
            }
            out.push(run);
        })?;
        Ok(out)
    }

    fn decode(&self, data: &[u32]) -> Result<Vec<u32>> {
        let mut out = Vec::new();
        let mut pos = 0;
        let mut first = true;
        while pos < data.len() {
            let mut count = 0usize;
            while data[pos] == self.max_run {
                count += self.max_run as usize;
                pos += 1;
                if pos == data.len() {
                    return Err(Error::MalformedStream("run ends inside an escape"));
                }
            }
            if data[pos] > self.max_run {
                return Err(Error::InvalidSymbol {
                    symbol: data[pos],
                    alphabet: self.max_run as usize + 1,
                });
            }
            count += data[pos] as usize;
            push_run(&mut out, first, count);
            first = false;
            pos += 1;
        }
        Ok(out)
    }

    fn max_symbol(&self) -> Option<u32> {
        Some(self.max_run)
    }
}

/// Zero-run lengths with two-symbol escapes.
///
/// A run of at least `max_sym` zeros starts with the escape pair
/// `(max_sym, k)`, standing for `(k + 1) * max_sym` zeros with
/// `k = min(run / max_sym - 1, max_sym)`; pairs repeat until the remainder is
/// below `max_sym`, which is emitted last.
#[derive(Debug, Clone, Copy)]
pub struct RunLength01MaxSmartCodec {
    max_sym: u32,
}

impl RunLength01MaxSmartCodec {
    /// Create a codec emitting symbols `0..=max_sym`.
    pub fn new(max_sym: u32) -> Result<Self> {
        if max_sym == 0 {
            return Err(Error::InvalidParameter("max_sym must be positive"));
        }
        Ok(Self { max_sym })
    }

    /// Number of values [`SymbolCodec::decode`] would produce, computed
    /// without expanding the runs.
    pub fn decoded_len(&self, data: &[u32]) -> Result<usize> {
        let mut len = 0usize;
        let mut first = true;
        let mut overflow = false;
        self.for_each_run(data, |count| {
            let sep = usize::from(!first);
            first = false;
            match len.checked_add(count).and_then(|l| l.checked_add(sep)) {
                Some(l) => len = l,
                None => overflow = true,
            }
        })?;
        if overflow {
            return Err(Error::MalformedStream("run lengths overflow"));
        }
        Ok(len)
    }

    /// Parse `data` into zero-run lengths.
    fn for_each_run(&self, data: &[u32], mut emit: impl FnMut(usize)) -> Result<()> {
        let m = self.max_sym;
        let mut pos = 0;
        while pos < data.len() {
            let mut count = 0usize;
            while data[pos] == m {
                let k = *data
                    .get(pos + 1)
                    .ok_or(Error::MalformedStream("truncated run-length escape"))?;
                if k > m {
                    return Err(Error::InvalidSymbol {
                        symbol: k,
                        alphabet: m as usize + 1,
                    });
                }
                count = count.saturating_add((k as usize + 1).saturating_mul(m as usize));
                pos += 2;
                if pos == data.len() {
                    return Err(Error::MalformedStream("run ends inside an escape"));
                }
            }
            if data[pos] > m {
                return Err(Error::InvalidSymbol {
                    symbol: data[pos],
                    alphabet: m as usize + 1,
                });
            }
            emit(count.saturating_add(data[pos] as usize));
            pos += 1;
        }
        Ok(())
    }
}

impl SymbolCodec for RunLength01MaxSmartCodec {
    fn encode(&self, data: &[u32]) -> Result<Vec<u32>> {
        let m = self.max_sym;
        let mut out = Vec::new();
        for_each_run(data, |mut run| {
            while run >= m {
                let k = (run / m - 1).min(m);
                out.push(m);
                out.push(k);
                run -= (k + 1) * m;
            }
            out.push(run);
        })?;
        Ok(out)
    }

    fn decode(&self, data: &[u32]) -> Result<Vec<u32>> {
        let mut out = Vec::new();
        let mut first = true;
        self.for_each_run(data, |count| {
            push_run(&mut out, first, count);
            first = false;
        })?;
        Ok(out)
    }

    fn max_symbol(&self) -> Option<u32> {
        Some(self.max_sym)
    }
}

/// Literal symbols with staged run escapes.
///
/// Symbols `0..=sym_data_max` are data. Each run-eligible symbol gets one
/// special symbol per stage, allocated after the data symbols. A run of three
/// or more is written as its stage's special symbol followed by `stage + 1`
/// little-endian digits in base `sym_max + 1`.
#[derive(Debug, Clone)]
pub struct RunLengthCodec {
    sym_max: u32,
    sym_data_max: u32,
    rle_symbols: Vec<u32>,
    /// `specials[stage][i]` is the escape for `rle_symbols[i]` at `stage`.
    specials: Vec<Vec<u32>>,
    special_lookup: HashMap<u32, (usize, usize)>,
    /// Longest run each stage can represent.
    max_run: Vec<u64>,
}

impl RunLengthCodec {
    /// Create a codec.
    ///
    /// # Errors
    /// Returns `Error::InvalidParameter` if the special symbols do not fit
    /// below `sym_max`, or if there are no stages or run-eligible symbols.
    pub fn new(sym_max: u32, sym_data_max: u32, stages: usize, rle_symbols: &[u32]) -> Result<Self> {
        if stages == 0 || rle_symbols.is_empty() {
            return Err(Error::InvalidParameter("need at least one stage and one run symbol"));
        }
        if rle_symbols.iter().any(|&s| s > sym_data_max) {
            return Err(Error::InvalidParameter("run symbols must be data symbols"));
        }

        let mut free = u64::from(sym_data_max) + 1;
        let mut specials = Vec::with_capacity(stages);
        let mut special_lookup = HashMap::new();
        for stage in 0..stages {
            let mut row = Vec::with_capacity(rle_symbols.len());
            for i in 0..rle_symbols.len() {
                if free > u64::from(sym_max) {
                    return Err(Error::InvalidParameter("special symbols exceed sym_max"));
                }
                row.push(free as u32);
                special_lookup.insert(free as u32, (stage, i));
                free += 1;
            }
            specials.push(row);
        }

        let base = u64::from(sym_max) + 1;
        let mut max_run = Vec::with_capacity(stages);
        let mut prod = 1u64;
        let mut acc = 0u64;
        for _ in 0..stages {
            prod = prod
                .checked_mul(base)
                .ok_or(Error::InvalidParameter("too many stages"))?;
            acc = acc
                .checked_add(prod)
                .ok_or(Error::InvalidParameter("too many stages"))?;
            max_run.push(acc);
        }
        if acc < 3 {
            return Err(Error::InvalidParameter("stages cannot hold a run of three"));
        }

        Ok(Self {
            sym_max,
            sym_data_max,
            rle_symbols: rle_symbols.to_vec(),
            specials,
            special_lookup,
            max_run,
        })
    }

    fn base(&self) -> u64 {
        u64::from(self.sym_max) + 1
    }

    fn longest_run(&self) -> u64 {
        self.max_run[self.max_run.len() - 1]
    }

    fn emit_run(&self, out: &mut Vec<u32>, index: usize, count: u64) {
        let mut stage = 0;
        while count > self.max_run[stage] {
            stage += 1;
        }
        out.push(self.specials[stage][index]);

        let below = if stage == 0 { 0 } else { self.max_run[stage - 1] };
        let mut rest = count - 1 - below;
        for _ in 0..=stage {
            out.push((rest % self.base()) as u32);
            rest /= self.base();
        }
    }
}

impl SymbolCodec for RunLengthCodec {
    fn encode(&self, data: &[u32]) -> Result<Vec<u32>> {
        let mut out = Vec::new();
        let mut pos = 0;
        while pos < data.len() {
            let sym = data[pos];
            if sym > self.sym_data_max {
                return Err(Error::InvalidSymbol {
                    symbol: sym,
                    alphabet: self.sym_data_max as usize + 1,
                });
            }

            let index = self.rle_symbols.iter().position(|&s| s == sym);
            let starts_run = pos + 2 < data.len() && data[pos + 1] == sym && data[pos + 2] == sym;
            match index {
                Some(index) if starts_run => {
                    let mut count = 3u64;
                    pos += 3;
                    while pos < data.len() && data[pos] == sym && count < self.longest_run() {
                        count += 1;
                        pos += 1;
                    }
                    self.emit_run(&mut out, index, count);
                }
                _ => {
                    out.push(sym);
                    pos += 1;
                }
            }
        }
        Ok(out)
    }

    fn decode(&self, data: &[u32]) -> Result<Vec<u32>> {
        let mut out = Vec::new();
        let mut pos = 0;
        while pos < data.len() {
            let sym = data[pos];
            if sym <= self.sym_data_max {
                out.push(sym);
                pos += 1;
                continue;
            }

            let &(stage, index) = self.special_lookup.get(&sym).ok_or(Error::InvalidSymbol {
                symbol: sym,
                alphabet: self.sym_max as usize + 1,
            })?;
            let digits = data
                .get(pos + 1..pos + 2 + stage)
                .ok_or(Error::MalformedStream("truncated run digits"))?;
            let mut count = 0u64;
            let mut mul = 1u64;
            for &d in digits {
                if d > self.sym_max {
                    return Err(Error::MalformedStream("run digit out of range"));
                }
                count += (u64::from(d) + 1) * mul;
                mul *= self.base();
            }
            let count =
                usize::try_from(count).map_err(|_| Error::MalformedStream("run too long"))?;
            out.resize(out.len() + count, self.rle_symbols[index]);
            pos += 2 + stage;
        }
        Ok(out)
    }

    fn max_symbol(&self) -> Option<u32> {
        Some(self.sym_max)
    }
}
