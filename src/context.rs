//! Window-context predictors.
//!
//! The context of a pixel is a window of already-visited neighbors: `xpos`
//! pixels to its left on the current row, plus rows above spanning
//! `[x - xpos, x - xpos + width)`. Each distinct window is packed into a
//! `u128` key (a leading marker bit, then 2 bits per pixel) and maps to the
//! color counts observed after it.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::field::Field;
use crate::predictor::Predictor;

/// Largest window, in pixels, that fits a packed key.
pub const MAX_WINDOW_PIXELS: usize = 63;

/// Occurrence counts of the four colors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorCounts([u32; 4]);

impl ColorCounts {
    /// Most frequent color; the smallest color wins ties.
    pub fn predicted(&self) -> u32 {
        let mut best = 0;
        for color in 1..4 {
            if self.0[color] > self.0[best] {
                best = color;
            }
        }
        best as u32
    }

    /// Count one occurrence of `color`.
    pub fn learn(&mut self, color: u32) -> Result<()> {
        let slot = self.0.get_mut(color as usize).ok_or(Error::InvalidSymbol {
            symbol: color,
            alphabet: 4,
        })?;
        *slot = slot.saturating_add(1);
        Ok(())
    }

    /// Raw counts, indexed by color.
    pub fn counts(&self) -> [u32; 4] {
        self.0
    }
}

/// Shape of a context window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    width: usize,
    xpos: usize,
}

impl Window {
    /// Packed key of the `height`-row window at `(x, y)`, or `None` if the
    /// window leaves the field.
    fn key(&self, field: &Field, x: usize, y: usize, height: usize) -> Result<Option<u128>> {
        if x < self.xpos || x + self.width > field.width() + self.xpos || y + 1 < height {
            return Ok(None);
        }

        let data = field.data();
        let stride = field.width();
        let left = x - self.xpos;

        let mut key = 1u128;
        for &v in &data[y * stride + left..y * stride + x] {
            key = push_pixel(key, v)?;
        }
        for cy in (y + 1 - height..y).rev() {
            let start = cy * stride + left;
            for &v in &data[start..start + self.width] {
                key = push_pixel(key, v)?;
            }
        }
        Ok(Some(key))
    }
}

fn push_pixel(key: u128, v: u32) -> Result<u128> {
    if v > 3 {
        return Err(Error::InvalidSymbol {
            symbol: v,
            alphabet: 4,
        });
    }
    Ok((key << 2) | u128::from(v))
}

fn check_window(width: usize, height: usize, xpos: usize) -> Result<Window> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidParameter("window must be non-empty"));
    }
    if xpos > width {
        return Err(Error::InvalidParameter("xpos must not exceed the window width"));
    }
    if xpos + (height - 1) * width > MAX_WINDOW_PIXELS {
        return Err(Error::InvalidParameter("context window too large"));
    }
    Ok(Window { width, xpos })
}

/// Predicts from a single fixed-size context window.
pub struct FixedSizePredictor {
    window: Window,
    height: usize,
    fallback: Box<dyn Predictor>,
    history: HashMap<u128, ColorCounts>,
}

impl FixedSizePredictor {
    /// Create a predictor with a `width × height` window offset by `xpos`.
    ///
    /// `fallback` answers when the window leaves the field or has never been
    /// seen.
    pub fn new(width: usize, height: usize, xpos: usize, fallback: Box<dyn Predictor>) -> Result<Self> {
        Ok(Self {
            window: check_window(width, height, xpos)?,
            height,
            fallback,
            history: HashMap::new(),
        })
    }

    /// Number of distinct contexts seen so far.
    pub fn contexts(&self) -> usize {
        self.history.len()
    }
}

impl Predictor for FixedSizePredictor {
    fn initialize(&mut self, field: &mut Field) {
        self.history.clear();
        self.fallback.initialize(field);
    }

    fn foresee(&mut self, field: &Field, x: usize, y: usize, p: usize) -> Result<u32> {
        let known = match self.window.key(field, x, y, self.height)? {
            Some(key) => self.history.get(&key),
            None => None,
        };
        match known {
            Some(counts) => Ok(counts.predicted()),
            None => self.fallback.foresee(field, x, y, p),
        }
    }

    fn learn(&mut self, field: &Field, x: usize, y: usize, p: usize, actual: u32) -> Result<()> {
        match self.window.key(field, x, y, self.height)? {
            Some(key) => self.history.entry(key).or_default().learn(actual),
            None => self.fallback.learn(field, x, y, p, actual),
        }
    }
}

/// Predicts from the tallest previously seen window among heights
/// `height..=1`.
pub struct VariableSizePredictor {
    window: Window,
    height: usize,
    fallback: Box<dyn Predictor>,
    history: HashMap<u128, ColorCounts>,
}

impl VariableSizePredictor {
    /// Create a predictor with windows up to `width × height` offset by
    /// `xpos`.
    pub fn new(width: usize, height: usize, xpos: usize, fallback: Box<dyn Predictor>) -> Result<Self> {
        Ok(Self {
            window: check_window(width, height, xpos)?,
            height,
            fallback,
            history: HashMap::new(),
        })
    }

    fn keys(&self, field: &Field, x: usize, y: usize) -> Result<Vec<u128>> {
        let mut keys = Vec::with_capacity(self.height);
        for h in (1..=self.height).rev() {
            if let Some(key) = self.window.key(field, x, y, h)? {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

impl Predictor for VariableSizePredictor {
    fn initialize(&mut self, field: &mut Field) {
        self.history.clear();
        self.fallback.initialize(field);
    }

    fn foresee(&mut self, field: &Field, x: usize, y: usize, p: usize) -> Result<u32> {
        for key in self.keys(field, x, y)? {
            if let Some(counts) = self.history.get(&key) {
                return Ok(counts.predicted());
            }
        }
        self.fallback.foresee(field, x, y, p)
    }

    fn learn(&mut self, field: &Field, x: usize, y: usize, p: usize, actual: u32) -> Result<()> {
        self.fallback.learn(field, x, y, p, actual)?;
        for key in self.keys(field, x, y)? {
            self.history.entry(key).or_default().learn(actual)?;
        }
        Ok(())
    }
}
