//! Two-dimensional integer fields.
//!
//! A [`Field`] is a row-major `width × height` grid of `u32` values. Image
//! pixels are quantized to the four colors `0..=3`, but intermediate fields
//! (binary planes, residuals) reuse the same type.

use crate::error::{Error, Result};

/// What [`Field::get`] and [`Field::set`] do outside the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutOfBounds {
    /// Fail with `Error::OutOfBounds`.
    #[default]
    Error,
    /// Reads return the color, writes are ignored.
    Substitute(u32),
}

/// A row-major grid of `u32` values.
#[derive(Debug, Clone)]
pub struct Field {
    width: usize,
    height: usize,
    data: Vec<u32>,
    out_of_bounds: OutOfBounds,
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height && self.data == other.data
    }
}

impl Eq for Field {}

impl Field {
    /// Create a zero-filled field.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
            out_of_bounds: OutOfBounds::Error,
        }
    }

    /// Wrap existing row-major data.
    ///
    /// # Errors
    /// Returns `Error::InvalidParameter` if `data.len() != width * height`.
    pub fn from_data(width: usize, height: usize, data: Vec<u32>) -> Result<Self> {
        if width.checked_mul(height) != Some(data.len()) {
            return Err(Error::InvalidParameter("data length does not match dimensions"));
        }
        Ok(Self {
            width,
            height,
            data,
            out_of_bounds: OutOfBounds::Error,
        })
    }

    /// Quantize packed `0xAARRGGBB` pixels to four gray levels by `R + G + B`.
    pub fn quantize_argb(width: usize, height: usize, argb: &[u32]) -> Result<Self> {
        let data = argb
            .iter()
            .map(|&px| {
                let gray = (px & 0xFF) + ((px >> 8) & 0xFF) + ((px >> 16) & 0xFF);
                match gray {
                    0..=191 => 0,
                    192..=383 => 1,
                    384..=575 => 2,
                    _ => 3,
                }
            })
            .collect();
        Self::from_data(width, height, data)
    }

    /// Map values in `min..=max` onto opaque gray `0xFFvvvvvv` pixels.
    pub fn to_argb(&self, min: u32, max: u32) -> Vec<u32> {
        self.data
            .iter()
            .map(|&v| {
                let level = if max <= min {
                    0
                } else {
                    (255 * u64::from(v.clamp(min, max) - min) / u64::from(max - min)) as u32
                };
                0xFF00_0000 | (level << 16) | (level << 8) | level
            })
            .collect()
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the field has no pixels.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row-major pixel data.
    pub fn data(&self) -> &[u32] {
        &self.data
    }

    /// Mutable row-major pixel data.
    pub fn data_mut(&mut self) -> &mut [u32] {
        &mut self.data
    }

    /// Consume the field and return its data.
    pub fn into_data(self) -> Vec<u32> {
        self.data
    }

    /// Current out-of-bounds policy.
    pub fn out_of_bounds(&self) -> OutOfBounds {
        self.out_of_bounds
    }

    /// Replace the out-of-bounds policy.
    pub fn set_out_of_bounds(&mut self, policy: OutOfBounds) {
        self.out_of_bounds = policy;
    }

    fn index(&self, x: isize, y: isize) -> Option<usize> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            None
        } else {
            Some(y as usize * self.width + x as usize)
        }
    }

    /// Read a pixel, applying the out-of-bounds policy.
    pub fn get(&self, x: isize, y: isize) -> Result<u32> {
        match (self.index(x, y), self.out_of_bounds) {
            (Some(p), _) => Ok(self.data[p]),
            (None, OutOfBounds::Substitute(color)) => Ok(color),
            (None, OutOfBounds::Error) => Err(Error::OutOfBounds { x, y }),
        }
    }

    /// Write a pixel, applying the out-of-bounds policy.
    pub fn set(&mut self, x: isize, y: isize, value: u32) -> Result<()> {
        match (self.index(x, y), self.out_of_bounds) {
            (Some(p), _) => {
                self.data[p] = value;
                Ok(())
            }
            (None, OutOfBounds::Substitute(_)) => Ok(()),
            (None, OutOfBounds::Error) => Err(Error::OutOfBounds { x, y }),
        }
    }

    fn wrapped_index(&self, x: isize, y: isize) -> Result<usize> {
        if self.is_empty() {
            return Err(Error::OutOfBounds { x, y });
        }
        let wx = x.rem_euclid(self.width as isize) as usize;
        let wy = y.rem_euclid(self.height as isize) as usize;
        Ok(wy * self.width + wx)
    }

    /// Read a pixel with toroidal wrap-around.
    pub fn get_wrapped(&self, x: isize, y: isize) -> Result<u32> {
        Ok(self.data[self.wrapped_index(x, y)?])
    }

    /// Write a pixel with toroidal wrap-around.
    pub fn set_wrapped(&mut self, x: isize, y: isize, value: u32) -> Result<()> {
        let p = self.wrapped_index(x, y)?;
        self.data[p] = value;
        Ok(())
    }

    /// Copy the `width × height` block at `(fx, fy)` into a new field.
    pub fn extract(&self, fx: usize, fy: usize, width: usize, height: usize) -> Result<Field> {
        if fx + width > self.width || fy + height > self.height {
            return Err(Error::OutOfBounds {
                x: (fx + width) as isize,
                y: (fy + height) as isize,
            });
        }
        let mut data = Vec::with_capacity(width * height);
        for y in fy..fy + height {
            let start = y * self.width + fx;
            data.extend_from_slice(&self.data[start..start + width]);
        }
        Field::from_data(width, height, data)
    }

    /// Swap rows and columns in place.
    pub fn transpose(&mut self) {
        let mut data = vec![0; self.data.len()];
        for y in 0..self.height {
            for x in 0..self.width {
                data[x * self.height + y] = self.data[y * self.width + x];
            }
        }
        self.data = data;
        std::mem::swap(&mut self.width, &mut self.height);
    }

    /// Apply `f` to every pixel.
    pub fn map(&mut self, mut f: impl FnMut(u32) -> u32) {
        for v in &mut self.data {
            *v = f(*v);
        }
    }

    /// A field holding 1 where this field equals `value` and 0 elsewhere.
    pub fn binary_plane(&self, value: u32) -> Field {
        let mut plane = self.clone();
        plane.map(|v| u32::from(v == value));
        plane.out_of_bounds = OutOfBounds::Error;
        plane
    }

    /// Halve both dimensions, keeping the most frequent value of each 2×2
    /// block. Blocks on an odd edge repeat the edge pixels.
    pub fn half_res_highest_count(&self) -> Field {
        let mut result = Field::new(self.width.div_ceil(2), self.height.div_ceil(2));
        for y in (0..self.height).step_by(2) {
            let y1 = (y + 1).min(self.height - 1);
            for x in (0..self.width).step_by(2) {
                let x1 = (x + 1).min(self.width - 1);
                let at = |x: usize, y: usize| self.data[y * self.width + x];
                result.data[(y / 2) * result.width + x / 2] =
                    most_frequent_of_four(at(x, y), at(x1, y), at(x, y1), at(x1, y1));
            }
        }
        result
    }

    /// Halve both dimensions, keeping the top-left pixel of each 2×2 block.
    pub fn half_res_nearest_neighbour(&self) -> Field {
        let mut result = Field::new(self.width.div_ceil(2), self.height.div_ceil(2));
        for y in (0..self.height).step_by(2) {
            for x in (0..self.width).step_by(2) {
                result.data[(y / 2) * result.width + x / 2] = self.data[y * self.width + x];
            }
        }
        result
    }

    /// Reduce by `block`, marking 1 wherever the block has any non-zero pixel.
    pub fn reduce_keeping_pixels(&self, block: usize) -> Result<Field> {
        if block == 0 {
            return Err(Error::InvalidParameter("block size must be positive"));
        }
        let mut result = Field::new(self.width.div_ceil(block), self.height.div_ceil(block));
        for y in 0..self.height {
            for x in 0..self.width {
                if self.data[y * self.width + x] != 0 {
                    result.data[(y / block) * result.width + x / block] = 1;
                }
            }
        }
        Ok(result)
    }

    /// Split into even rows and odd rows.
    pub fn interlaced_split(&self) -> (Field, Field) {
        let mut even = Vec::with_capacity(self.height.div_ceil(2) * self.width);
        let mut odd = Vec::with_capacity(self.height / 2 * self.width);
        for (y, row) in self.data.chunks(self.width.max(1)).enumerate() {
            if y % 2 == 0 {
                even.extend_from_slice(row);
            } else {
                odd.extend_from_slice(row);
            }
        }
        (
            Field {
                width: self.width,
                height: self.height.div_ceil(2),
                data: even,
                out_of_bounds: OutOfBounds::Error,
            },
            Field {
                width: self.width,
                height: self.height / 2,
                data: odd,
                out_of_bounds: OutOfBounds::Error,
            },
        )
    }
}

/// Majority of four values; ties favor the earlier argument.
fn most_frequent_of_four(p1: u32, p2: u32, p3: u32, p4: u32) -> u32 {
    let (e12, e13, e14) = (p1 == p2, p1 == p3, p1 == p4);
    let (e23, e24, e34) = (p2 == p3, p2 == p4, p3 == p4);
    if (e12 && e13) || (e12 && e14) || (e13 && e14) {
        p1
    } else if e23 && e34 {
        p2
    } else if e12 || e13 || e14 {
        p1
    } else if e23 || e24 {
        p2
    } else if e34 {
        p3
    } else {
        p1
    }
}
