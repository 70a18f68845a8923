//! Multi-shape hashed context predictor.
//!
//! Every pixel is described by a family of rectangular neighborhoods of
//! decreasing area. Each neighborhood is hashed with CRC-64 and the hash
//! indexes a [`PatternHashTable`] of saturating color counters. The largest
//! neighborhood that has been seen before predicts.
//!
//! Hashes are split into a 16-bit bucket index and a 48-bit key; each of the
//! 65536 buckets is an arena-backed binary search tree over its keys.

use std::cmp::Reverse;

use crate::crc64;
use crate::error::{Error, Result};
use crate::field::{Field, OutOfBounds};
use crate::predictor::Predictor;

/// Candidate neighborhood widths and heights.
pub const SHAPE_SIDES: [usize; 8] = [3, 4, 5, 7, 9, 13, 17, 21];

const BUCKETS: usize = 1 << 16;

/// Four saturating color counters packed into one word.
///
/// Colors 0, 1 and 3 get 12 bits, color 2 gets 11. Once any counter reaches
/// its maximum, bit 63 is set and all counters freeze so their ratios stay
/// intact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackedCounts(u64);

impl PackedCounts {
    const SATURATED: u64 = 1 << 63;
    /// `(shift, bits)` per color.
    const LAYOUT: [(u32, u32); 4] = [(0, 12), (12, 12), (24, 11), (35, 12)];

    fn get(&self, color: usize) -> u32 {
        let (shift, bits) = Self::LAYOUT[color];
        ((self.0 >> shift) & ((1 << bits) - 1)) as u32
    }

    /// Current counts, indexed by color.
    pub fn counts(&self) -> [u32; 4] {
        [self.get(0), self.get(1), self.get(2), self.get(3)]
    }

    /// Whether the counters have frozen.
    pub fn is_saturated(&self) -> bool {
        self.0 & Self::SATURATED != 0
    }

    /// Count one occurrence of `color`, which must be below 4.
    fn add(&mut self, color: usize) {
        if self.is_saturated() {
            return;
        }
        let (shift, bits) = Self::LAYOUT[color];
        let max = (1u64 << bits) - 1;
        let count = u64::from(self.get(color)) + 1;
        self.0 = (self.0 & !(max << shift)) | (count << shift);
        if count == max {
            self.0 |= Self::SATURATED;
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    key: (u32, u16),
    /// Child indices; 0 means none since the root is never a child.
    left: u32,
    right: u32,
    counts: PackedCounts,
}

enum Lookup {
    Found(usize),
    AttachLeft(usize),
    AttachRight(usize),
}

#[derive(Debug, Clone, Default)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn search(&self, key: (u32, u16)) -> Option<Lookup> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut cur = 0usize;
        loop {
            let node = &self.nodes[cur];
            let next = if key == node.key {
                return Some(Lookup::Found(cur));
            } else if key < node.key {
                if node.left == 0 {
                    return Some(Lookup::AttachLeft(cur));
                }
                node.left
            } else {
                if node.right == 0 {
                    return Some(Lookup::AttachRight(cur));
                }
                node.right
            };
            cur = next as usize;
        }
    }

    fn counts(&self, key: (u32, u16)) -> PackedCounts {
        match self.search(key) {
            Some(Lookup::Found(i)) => self.nodes[i].counts,
            _ => PackedCounts::default(),
        }
    }

    fn add(&mut self, key: (u32, u16), color: usize) -> Result<()> {
        let index = match self.search(key) {
            Some(Lookup::Found(i)) => i,
            miss => {
                let new = u32::try_from(self.nodes.len())
                    .map_err(|_| Error::InvalidParameter("hash bucket is full"))?;
                match miss {
                    Some(Lookup::AttachLeft(parent)) => self.nodes[parent].left = new,
                    Some(Lookup::AttachRight(parent)) => self.nodes[parent].right = new,
                    _ => {}
                }
                self.nodes.push(Node {
                    key,
                    left: 0,
                    right: 0,
                    counts: PackedCounts::default(),
                });
                new as usize
            }
        };
        self.nodes[index].counts.add(color);
        Ok(())
    }
}

/// Saturating color counters indexed by 64-bit pattern hashes.
#[derive(Debug, Clone)]
pub struct PatternHashTable {
    trees: Vec<Tree>,
}

impl PatternHashTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            trees: vec![Tree::default(); BUCKETS],
        }
    }

    fn split(hash: u64) -> (usize, (u32, u16)) {
        (
            (hash & 0xFFFF) as usize,
            ((hash >> 16) as u32, (hash >> 48) as u16),
        )
    }

    /// Counters stored for `hash`; all zero if never seen.
    pub fn counts(&self, hash: u64) -> PackedCounts {
        let (bucket, key) = Self::split(hash);
        self.trees[bucket].counts(key)
    }

    /// Count one occurrence of `color` after `hash`.
    pub fn add(&mut self, hash: u64, color: u32) -> Result<()> {
        if color > 3 {
            return Err(Error::InvalidSymbol {
                symbol: color,
                alphabet: 4,
            });
        }
        let (bucket, key) = Self::split(hash);
        self.trees[bucket].add(key, color as usize)
    }

    /// Number of distinct hashes stored.
    pub fn len(&self) -> usize {
        self.trees.iter().map(|t| t.nodes.len()).sum()
    }

    /// Whether no hash has been stored.
    pub fn is_empty(&self) -> bool {
        self.trees.iter().all(|t| t.nodes.is_empty())
    }

    /// Forget every hash, keeping allocations.
    pub fn clear(&mut self) {
        for tree in &mut self.trees {
            tree.nodes.clear();
        }
    }
}

impl Default for PatternHashTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash the `width × height` neighborhood of `(px, py)`.
///
/// The hash is seeded with the pixel count as a little-endian `u16`. Rows run
/// top to bottom over columns `[(w-1)/2 - w + 1, (w-1)/2]` relative to `px`,
/// stopping just before the current pixel; pixels are packed four per byte,
/// first pixel in the high bits.
pub fn hash_region(field: &Field, px: usize, py: usize, width: usize, height: usize) -> Result<u64> {
    let length = (width * height) as u32;
    let mut crc = crc64::update(0, length as u8);
    crc = crc64::update(crc, (length >> 8) as u8);

    let (px, py) = (px as isize, py as isize);
    let (w, h) = (width as isize, height as isize);
    let mut byte = 0u32;
    let mut pending = 0;

    'rows: for dy in -h + 1..=0 {
        for dx in (w - 1) / 2 - w + 1..=(w - 1) / 2 {
            if dy == 0 && dx == 0 {
                break 'rows;
            }
            let v = field.get(px + dx, py + dy)?;
            if v > 3 {
                return Err(Error::InvalidSymbol {
                    symbol: v,
                    alphabet: 4,
                });
            }
            byte = (byte << 2) | v;
            pending += 1;
            if pending == 4 {
                crc = crc64::update(crc, byte as u8);
                byte = 0;
                pending = 0;
            }
        }
    }
    if pending > 0 {
        crc = crc64::update(crc, byte as u8);
    }
    Ok(crc)
}

/// Predicts from hashed neighborhoods of several shapes.
pub struct HashPredictor {
    shapes: Vec<(usize, usize)>,
    table: PatternHashTable,
    fallback: Box<dyn Predictor>,
    /// Hashes computed by the last `foresee`, tagged with their pixel.
    cached: Option<(usize, Vec<u64>)>,
}

impl HashPredictor {
    /// Create a predictor using every shape from [`SHAPE_SIDES`] that fits
    /// within `max_width × max_height`.
    ///
    /// # Errors
    /// Returns `Error::InvalidParameter` if no shape fits.
    pub fn new(max_width: usize, max_height: usize, fallback: Box<dyn Predictor>) -> Result<Self> {
        let mut shapes = Vec::new();
        for &w in &SHAPE_SIDES {
            for &h in &SHAPE_SIDES {
                if w <= max_width && h <= max_height {
                    shapes.push((w, h));
                }
            }
        }
        if shapes.is_empty() {
            return Err(Error::InvalidParameter("hash shapes need at least 3x3"));
        }
        shapes.sort_by_key(|&(w, h)| Reverse(w * h));

        Ok(Self {
            shapes,
            table: PatternHashTable::new(),
            fallback,
            cached: None,
        })
    }

    /// Shapes in the order they are consulted.
    pub fn shapes(&self) -> &[(usize, usize)] {
        &self.shapes
    }

    /// Learned pattern table.
    pub fn table(&self) -> &PatternHashTable {
        &self.table
    }

    fn hashes(&mut self, field: &Field, x: usize, y: usize, p: usize) -> Result<Vec<u64>> {
        if let Some((at, hashes)) = self.cached.take() {
            if at == p {
                return Ok(hashes);
            }
        }
        self.shapes
            .iter()
            .map(|&(w, h)| hash_region(field, x, y, w, h))
            .collect()
    }
}

fn majority(counts: [u32; 4]) -> u32 {
    let mut best = 0;
    for color in 1..4 {
        if counts[color] > counts[best] {
            best = color;
        }
    }
    best as u32
}

impl Predictor for HashPredictor {
    fn initialize(&mut self, field: &mut Field) {
        self.table.clear();
        self.cached = None;
        field.set_out_of_bounds(OutOfBounds::Substitute(0));
        self.fallback.initialize(field);
    }

    fn foresee(&mut self, field: &Field, x: usize, y: usize, p: usize) -> Result<u32> {
        let hashes = self.hashes(field, x, y, p)?;
        let mut prediction = None;
        for &hash in &hashes {
            let counts = self.table.counts(hash).counts();
            if counts.iter().any(|&c| c > 0) {
                prediction = Some(majority(counts));
                break;
            }
        }
        self.cached = Some((p, hashes));
        match prediction {
            Some(color) => Ok(color),
            None => self.fallback.foresee(field, x, y, p),
        }
    }

    fn learn(&mut self, field: &Field, x: usize, y: usize, p: usize, actual: u32) -> Result<()> {
        for hash in self.hashes(field, x, y, p)? {
            self.table.add(hash, actual)?;
        }
        Ok(())
    }
}
