// src/partition.rs

//! Region partitioner.
//!
//! Carves a `width x height` image into axis-aligned [`Region`]s, one set per
//! rank, according to a [`PartitionMode`]. Partitioning is pure and
//! deterministic: every rank that runs it with the same inputs gets the same
//! answer, and the result is checked to tile the image exactly before it is
//! handed out.
//!
//! Over-provisioned groups (more ranks than columns or rows along a split
//! axis) are not an error. The surplus ranks receive zero-area regions, which
//! cover nothing and therefore cannot overlap anything; their workers shade
//! no pixels and return empty slices.

use crate::config::PartitionMode;
use crate::error::{RenderError, Result};

/// Number of scalar channels stored per pixel.
pub const CHANNELS: usize = 3;

/// Rectangle of the global image, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Region {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Region {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    /// Length of this region's slice buffer in scalar channels.
    pub fn channel_len(&self) -> usize {
        CHANNELS * self.area()
    }

    /// [`Region::channel_len`] for regions from an untrusted source.
    pub fn checked_channel_len(&self) -> Option<usize> {
        self.width.checked_mul(self.height)?.checked_mul(CHANNELS)
    }

    /// Whether the region lies inside a `width x height` image. Never
    /// overflows, whatever the region's fields hold.
    pub fn fits_within(&self, width: usize, height: usize) -> bool {
        let inside = |origin: usize, extent: usize, limit: usize| {
            origin.checked_add(extent).is_some_and(|end| end <= limit)
        };
        inside(self.x, self.width, width) && inside(self.y, self.height, height)
    }

    /// Offset of local pixel `(row, col)` inside this region's slice buffer.
    /// Slice buffers are always indexed by the region's own width.
    #[inline]
    pub fn local_offset(&self, row: usize, col: usize) -> usize {
        debug_assert!(row < self.height && col < self.width);
        CHANNELS * (row * self.width + col)
    }

    /// Offset of local pixel `(row, col)` inside a global image buffer that is
    /// `image_width` pixels wide.
    #[inline]
    pub fn global_offset(&self, image_width: usize, row: usize, col: usize) -> usize {
        to_global_index(self, image_width, row, col)
    }

    fn right(&self) -> usize {
        self.x + self.width
    }

    fn bottom(&self) -> usize {
        self.y + self.height
    }

    fn overlaps(&self, other: &Region) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Translates slice-local pixel `(local_row, local_col)` of `region` into the
/// channel offset of the same pixel in a row-major global buffer of
/// `image_width` pixels per row.
#[inline]
pub fn to_global_index(
    region: &Region,
    image_width: usize,
    local_row: usize,
    local_col: usize,
) -> usize {
    debug_assert!(local_row < region.height && local_col < region.width);
    CHANNELS * ((region.y + local_row) * image_width + region.x + local_col)
}

/// Result of partitioning one image across a process group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    width: usize,
    height: usize,
    mode: PartitionMode,
    assignments: Vec<Vec<Region>>,
}

impl Partition {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn mode(&self) -> PartitionMode {
        self.mode
    }

    /// Number of ranks the partition was computed for.
    pub fn rank_count(&self) -> usize {
        self.assignments.len()
    }

    /// Regions owned by `rank`, in dispatch order. Empty for ranks that do
    /// not participate.
    pub fn regions(&self, rank: usize) -> &[Region] {
        self.assignments
            .get(rank)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The first region of `rank`; its only one in the sequential and strip
    /// modes.
    pub fn region(&self, rank: usize) -> Option<&Region> {
        self.regions(rank).first()
    }

    /// Pixel count owned by `rank` across all its regions.
    pub fn pixel_count(&self, rank: usize) -> usize {
        self.regions(rank).iter().map(Region::area).sum()
    }

    /// Whether `rank` has anything to do in this run.
    pub fn participates(&self, rank: usize) -> bool {
        !self.regions(rank).is_empty()
    }

    /// Every `(rank, region)` pair, ranks ascending.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Region)> {
        self.assignments
            .iter()
            .enumerate()
            .flat_map(|(rank, regions)| regions.iter().map(move |region| (rank, region)))
    }

    /// Checks that the regions lie inside the image, never overlap, and
    /// together cover every pixel.
    pub fn verify(&self) -> Result<()> {
        let geometry = |detail: String| RenderError::Geometry {
            width: self.width,
            height: self.height,
            detail,
        };

        let mut covered = 0usize;
        for (rank, region) in self.iter() {
            if !region.fits_within(self.width, self.height) {
                return Err(geometry(format!(
                    "rank {} region {:?} extends outside the image",
                    rank, region
                )));
            }
            covered += region.area();
        }

        let regions: Vec<(usize, &Region)> = self.iter().filter(|(_, r)| !r.is_empty()).collect();
        for (i, (rank_a, a)) in regions.iter().enumerate() {
            for (rank_b, b) in &regions[i + 1..] {
                if a.overlaps(b) {
                    return Err(geometry(format!(
                        "rank {} region {:?} overlaps rank {} region {:?}",
                        rank_a, a, rank_b, b
                    )));
                }
            }
        }

        let expected = self.width * self.height;
        if covered != expected {
            return Err(geometry(format!(
                "regions cover {} pixels, image has {}",
                covered, expected
            )));
        }
        Ok(())
    }
}

/// Splits a `width x height` image across `ranks` processes.
///
/// A single rank always gets the whole image as one region, whatever the
/// mode. The result is verified before it is returned.
pub fn partition(
    width: usize,
    height: usize,
    ranks: usize,
    mode: PartitionMode,
) -> Result<Partition> {
    if ranks == 0 {
        return Err(crate::config::ConfigError::NoProcesses.into());
    }

    let assignments = if ranks == 1 {
        vec![vec![Region::new(0, 0, width, height)]]
    } else {
        match mode {
            PartitionMode::Sequential => sequential(width, height, ranks),
            PartitionMode::VerticalStrips => vertical_strips(width, height, ranks),
            PartitionMode::Blocks => blocks(width, height, ranks),
            PartitionMode::CyclicVertical { cycle_size } => {
                if cycle_size == 0 {
                    return Err(crate::config::ConfigError::ZeroCycleSize.into());
                }
                cyclic_vertical(width, height, ranks, cycle_size)
            }
        }
    };

    let partition = Partition {
        width,
        height,
        mode,
        assignments,
    };
    partition.verify()?;
    Ok(partition)
}

fn sequential(width: usize, height: usize, ranks: usize) -> Vec<Vec<Region>> {
    let mut assignments = vec![Vec::new(); ranks];
    assignments[0].push(Region::new(0, 0, width, height));
    assignments
}

/// Splits `extent` into `parts` runs of `extent / parts`; the last run also
/// takes the remainder. Returns `(offset, length)` for part `index`.
fn split_axis(extent: usize, parts: usize, index: usize) -> (usize, usize) {
    let base = extent / parts;
    let offset = index * base;
    if index == parts - 1 {
        (offset, base + extent % parts)
    } else {
        (offset, base)
    }
}

fn vertical_strips(width: usize, height: usize, ranks: usize) -> Vec<Vec<Region>> {
    (0..ranks)
        .map(|rank| {
            let (x, strip_width) = split_axis(width, ranks, rank);
            vec![Region::new(x, 0, strip_width, height)]
        })
        .collect()
}

/// Cuts both axes into `ranks` runs, giving a `ranks x ranks` grid of blocks
/// of `(width / ranks) x (height / ranks)` pixels. The last block column and
/// the last block row absorb the remainders. Block `(block_row, block_col)`
/// goes to rank `(block_row + block_col) % ranks`, so every rank owns one
/// block in each block row and one in each block column. A rank's blocks are
/// listed in row-major grid order.
fn blocks(width: usize, height: usize, ranks: usize) -> Vec<Vec<Region>> {
    let mut assignments = vec![Vec::new(); ranks];
    for block_row in 0..ranks {
        let (y, block_height) = split_axis(height, ranks, block_row);
        for block_col in 0..ranks {
            let (x, block_width) = split_axis(width, ranks, block_col);
            assignments[(block_row + block_col) % ranks]
                .push(Region::new(x, y, block_width, block_height));
        }
    }
    assignments
}

fn cyclic_vertical(
    width: usize,
    height: usize,
    ranks: usize,
    cycle_size: usize,
) -> Vec<Vec<Region>> {
    let mut assignments = vec![Vec::new(); ranks];
    for (strip, x) in (0..width).step_by(cycle_size).enumerate() {
        let strip_width = cycle_size.min(width - x);
        assignments[strip % ranks].push(Region::new(x, 0, strip_width, height));
    }
    assignments
}

#[cfg(test)]
mod tests;
