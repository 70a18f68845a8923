//! Pixel predictors.
//!
//! A predictor guesses each pixel of a field from pixels already visited in
//! raster order. The encoder and decoder drive identical predictors over the
//! same sequence of `foresee`/`learn` calls, so any state a predictor keeps
//! must evolve deterministically from those calls alone.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::field::Field;

/// A causal pixel predictor.
pub trait Predictor: Send {
    /// Reset learned state before a pass over `field`. May adjust the
    /// field's out-of-bounds policy.
    fn initialize(&mut self, field: &mut Field) {
        let _ = field;
    }

    /// Predict the pixel at `(x, y)`, linear index `p`.
    ///
    /// Only pixels before `p` in raster order may influence the result.
    fn foresee(&mut self, field: &Field, x: usize, y: usize, p: usize) -> Result<u32>;

    /// Record that the pixel at `(x, y)` is `actual`.
    fn learn(&mut self, field: &Field, x: usize, y: usize, p: usize, actual: u32) -> Result<()> {
        let _ = (field, x, y, p, actual);
        Ok(())
    }
}

impl<P: Predictor + ?Sized> Predictor for Box<P> {
    fn initialize(&mut self, field: &mut Field) {
        (**self).initialize(field)
    }

    fn foresee(&mut self, field: &Field, x: usize, y: usize, p: usize) -> Result<u32> {
        (**self).foresee(field, x, y, p)
    }

    fn learn(&mut self, field: &Field, x: usize, y: usize, p: usize, actual: u32) -> Result<()> {
        (**self).learn(field, x, y, p, actual)
    }
}

/// Always predicts 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPredictor;

impl Predictor for NullPredictor {
    fn foresee(&mut self, _field: &Field, _x: usize, _y: usize, _p: usize) -> Result<u32> {
        Ok(0)
    }
}

/// Left, top and top-left neighbors; out-of-image neighbors read as 0.
fn neighbors(field: &Field, x: usize, y: usize, p: usize) -> (u32, u32, u32) {
    let data = field.data();
    let w = field.width();
    let l = if x == 0 { 0 } else { data[p - 1] };
    let t = if y == 0 { 0 } else { data[p - w] };
    let tl = if x == 0 || y == 0 { 0 } else { data[p - w - 1] };
    (l, t, tl)
}

/// Continues solid areas and horizontal or vertical edges.
#[derive(Debug, Clone, Copy, Default)]
pub struct HorzVertPredictor;

impl Predictor for HorzVertPredictor {
    fn foresee(&mut self, field: &Field, x: usize, y: usize, p: usize) -> Result<u32> {
        let (l, t, tl) = neighbors(field, x, y, p);
        Ok(if l == tl && t == tl {
            tl
        } else if l == tl {
            t
        } else if t == tl {
            l
        } else {
            // Diffusion or diagonal: both continue the top-left pixel.
            tl
        })
    }
}

/// Like [`HorzVertPredictor`] but favors the pixel above.
#[derive(Debug, Clone, Copy, Default)]
pub struct VertPredictor;

impl Predictor for VertPredictor {
    fn foresee(&mut self, field: &Field, x: usize, y: usize, p: usize) -> Result<u32> {
        let (l, t, tl) = neighbors(field, x, y, p);
        Ok(if (l == tl && t == tl) || (t == l && t != tl) {
            tl
        } else {
            t
        })
    }
}

/// Continues the top pixel where the left pixel matches the top-left one,
/// otherwise the left pixel.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeftOrTopPredictor;

impl Predictor for LeftOrTopPredictor {
    fn foresee(&mut self, field: &Field, x: usize, y: usize, p: usize) -> Result<u32> {
        let (l, t, tl) = neighbors(field, x, y, p);
        Ok(if l == tl { t } else { l })
    }
}

/// Mode of the `size × size` window ending at the current pixel, excluding
/// its row and column.
#[derive(Debug, Clone, Copy)]
pub struct MostFrequentPredictor {
    size: usize,
}

impl MostFrequentPredictor {
    /// Create a predictor over a `size × size` window.
    pub fn new(size: usize) -> Self {
        Self { size }
    }
}

/// Most frequent value of the `w × h` window whose bottom-right corner is
/// `(px, py)`, skipping row `py` and column `px`. Ties go to the smaller
/// value; an empty window yields 0.
pub fn most_frequent(field: &Field, px: usize, py: usize, w: usize, h: usize) -> u32 {
    let mut counts = BTreeMap::new();
    let data = field.data();
    for y in (py + 1).saturating_sub(h)..py {
        for x in (px + 1).saturating_sub(w)..px {
            *counts.entry(data[y * field.width() + x]).or_insert(0u32) += 1;
        }
    }

    let mut best = (0, 0);
    for (value, count) in counts {
        if count > best.1 {
            best = (value, count);
        }
    }
    best.0
}

impl Predictor for MostFrequentPredictor {
    fn foresee(&mut self, field: &Field, x: usize, y: usize, _p: usize) -> Result<u32> {
        Ok(most_frequent(field, x, y, self.size, self.size))
    }
}
