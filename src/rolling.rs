//! Rolling 8×8 context predictor.
//!
//! The context of a pixel is the band of columns `x - 3 ..= x + 4` over the
//! seven rows above it, plus the three pixels to its left: 59 pixels packed
//! into a `u128`. Each band row takes 16 bits of the key, the current row the
//! lowest 16, leftmost pixel in the high bits. Stepping one pixel right
//! shifts the whole key by one pixel and feeds in the new right-hand column,
//! so consecutive keys on a row cost eight reads instead of 59.
//!
//! Band pixels right of the field read as 0. Pixels whose band would leave
//! the top or left edge go to the fallback.

use std::collections::HashMap;

use crate::context::ColorCounts;
use crate::error::{Error, Result};
use crate::field::Field;
use crate::predictor::Predictor;

/// Band rows above the current pixel.
pub const ROWS_ABOVE: usize = 7;
/// Band columns left of the current pixel.
pub const LEFT: usize = 3;
/// Band columns right of the current pixel.
pub const RIGHT: usize = 4;

const ROW_BITS: usize = 16;

/// Clears the rightmost slot of every band row.
const ROLL_MASK: u128 = 0xFFFC_FFFC_FFFC_FFFC_FFFC_FFFC_FFFC_FFFC;

/// Bit offset of band `row` (0 = topmost, `ROWS_ABOVE` = current) and
/// `col` (0 = `x - LEFT`).
fn slot(row: usize, col: usize) -> u32 {
    (ROW_BITS * (ROWS_ABOVE - row) + 2 * (LEFT + RIGHT - col)) as u32
}

fn pixel(field: &Field, x: usize, y: usize) -> Result<u128> {
    if x >= field.width() {
        return Ok(0);
    }
    let v = field.data()[y * field.width() + x];
    if v > 3 {
        return Err(Error::InvalidSymbol {
            symbol: v,
            alphabet: 4,
        });
    }
    Ok(u128::from(v))
}

/// Key of the band at `(x, y)`, read pixel by pixel.
/// Requires `x >= LEFT` and `y >= ROWS_ABOVE`.
fn band_key(field: &Field, x: usize, y: usize) -> Result<u128> {
    let mut key = 0u128;
    for row in 0..ROWS_ABOVE {
        let py = y - ROWS_ABOVE + row;
        for col in 0..=LEFT + RIGHT {
            key |= pixel(field, x - LEFT + col, py)? << slot(row, col);
        }
    }
    for col in 0..LEFT {
        key |= pixel(field, x - LEFT + col, y)? << slot(ROWS_ABOVE, col);
    }
    Ok(key)
}

/// Key at `(x, y)` from the key at `(x - 1, y)`.
fn roll(key: u128, field: &Field, x: usize, y: usize) -> Result<u128> {
    let mut key = (key << 2) & ROLL_MASK;
    for row in 0..ROWS_ABOVE {
        key |= pixel(field, x + RIGHT, y - ROWS_ABOVE + row)? << slot(row, LEFT + RIGHT);
    }
    Ok(key | pixel(field, x - 1, y)? << slot(ROWS_ABOVE, LEFT - 1))
}

/// Predicts the most frequent color seen after the same 59-pixel band.
pub struct RollingContextPredictor {
    fallback: Box<dyn Predictor>,
    history: HashMap<u128, ColorCounts>,
    last: Option<(usize, u128)>,
}

impl RollingContextPredictor {
    /// Create a predictor; `fallback` answers near the top and left edges
    /// and for bands never seen before.
    pub fn new(fallback: Box<dyn Predictor>) -> Self {
        Self {
            fallback,
            history: HashMap::new(),
            last: None,
        }
    }

    /// Number of distinct bands seen so far.
    pub fn contexts(&self) -> usize {
        self.history.len()
    }

    fn key(&mut self, field: &Field, x: usize, y: usize, p: usize) -> Result<Option<u128>> {
        if x < LEFT || y < ROWS_ABOVE {
            return Ok(None);
        }
        let key = match self.last {
            Some((at, key)) if at == p => return Ok(Some(key)),
            Some((at, key)) if at + 1 == p && x > LEFT => roll(key, field, x, y)?,
            _ => band_key(field, x, y)?,
        };
        self.last = Some((p, key));
        Ok(Some(key))
    }
}

impl Predictor for RollingContextPredictor {
    fn initialize(&mut self, field: &mut Field) {
        self.history.clear();
        self.last = None;
        self.fallback.initialize(field);
    }

    fn foresee(&mut self, field: &Field, x: usize, y: usize, p: usize) -> Result<u32> {
        let known = match self.key(field, x, y, p)? {
            Some(key) => self.history.get(&key).copied(),
            None => None,
        };
        match known {
            Some(counts) => Ok(counts.predicted()),
            None => self.fallback.foresee(field, x, y, p),
        }
    }

    fn learn(&mut self, field: &Field, x: usize, y: usize, p: usize, actual: u32) -> Result<()> {
        match self.key(field, x, y, p)? {
            Some(key) => self.history.entry(key).or_default().learn(actual),
            None => self.fallback.learn(field, x, y, p, actual),
        }
    }
}
