// src/pixels.rs

//! Flat RGB pixel storage and the merge step that folds a rendered slice back
//! into the global image.

use crate::partition::{Region, CHANNELS};

/// One shaded pixel.
pub type Rgb = [f32; CHANNELS];

/// Row-major RGB buffer of `width x height` pixels, three `f32` channels each.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl PixelBuffer {
    /// Allocates a zeroed buffer.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; CHANNELS * width * height],
        }
    }

    /// Wraps existing channel data, returning it unchanged if the length does
    /// not match the dimensions.
    pub fn from_raw(width: usize, height: usize, data: Vec<f32>) -> Result<Self, Vec<f32>> {
        if data.len() != CHANNELS * width * height {
            return Err(data);
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<f32> {
        self.data
    }

    pub fn pixel(&self, row: usize, col: usize) -> Rgb {
        let base = CHANNELS * (row * self.width + col);
        [self.data[base], self.data[base + 1], self.data[base + 2]]
    }

    /// Writes one pixel at its channel offset.
    #[inline]
    pub fn write_at(&mut self, offset: usize, rgb: Rgb) {
        self.data[offset..offset + CHANNELS].copy_from_slice(&rgb);
    }

    /// Copies a slice rendered for `region` into this buffer.
    ///
    /// `slice` is indexed by the region's own width; the destination by the
    /// image width. Global pixel `(region.y + row, region.x + col)` receives
    /// exactly local pixel `(row, col)`. Each region row is contiguous in
    /// both buffers, so rows are copied whole.
    pub fn merge_region(&mut self, region: &Region, slice: &[f32]) {
        debug_assert_eq!(slice.len(), region.channel_len());
        debug_assert!(region.x + region.width <= self.width);
        debug_assert!(region.y + region.height <= self.height);
        if region.is_empty() {
            return;
        }
        let row_len = CHANNELS * region.width;
        for (row, source) in slice.chunks_exact(row_len).enumerate() {
            let start = region.global_offset(self.width, row, 0);
            self.data[start..start + row_len].copy_from_slice(source);
        }
    }
}

/// Channel count of the concatenated slice buffer for `regions`.
pub fn slice_len(regions: &[Region]) -> usize {
    regions.iter().map(Region::channel_len).sum()
}

/// [`slice_len`] for regions decoded off the wire; `None` on overflow.
pub fn checked_slice_len(regions: &[Region]) -> Option<usize> {
    regions
        .iter()
        .try_fold(0usize, |total, region| total.checked_add(region.checked_channel_len()?))
}

/// Splits a concatenated slice buffer into one sub-slice per region, in order.
pub fn split_slices<'a>(
    regions: &'a [Region],
    buffer: &'a [f32],
) -> impl Iterator<Item = (&'a Region, &'a [f32])> + 'a {
    regions.iter().scan(0usize, move |start, region| {
        let end = *start + region.channel_len();
        let slice = &buffer[*start..end];
        *start = end;
        Some((region, slice))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn merge_translates_local_rows_to_global_rows() {
        let mut image = PixelBuffer::new(5, 4);
        let region = Region::new(2, 1, 3, 2);
        let slice: Vec<f32> = (0..region.channel_len()).map(|v| v as f32 + 1.0).collect();

        image.merge_region(&region, &slice);

        for row in 0..region.height {
            for col in 0..region.width {
                let local = region.local_offset(row, col);
                let expected = [slice[local], slice[local + 1], slice[local + 2]];
                assert_eq!(image.pixel(region.y + row, region.x + col), expected);
            }
        }
        // Untouched pixels stay zero.
        assert_eq!(image.pixel(0, 0), [0.0; 3]);
        assert_eq!(image.pixel(1, 1), [0.0; 3]);
        assert_eq!(image.pixel(3, 4), [0.0; 3]);
    }

    #[test_log::test]
    fn checked_slice_len_reports_overflow() {
        let regions = [Region::new(0, 0, 2, 3), Region::new(2, 0, 1, 3)];
        assert_eq!(checked_slice_len(&regions), Some(slice_len(&regions)));

        let half = usize::MAX / 6 + 1;
        let too_big = [Region::new(0, 0, half, 1), Region::new(0, 0, half, 1)];
        assert_eq!(checked_slice_len(&too_big), None);
    }

    #[test_log::test]
    fn merging_an_empty_region_is_a_no_op() {
        let mut image = PixelBuffer::new(3, 3);
        image.merge_region(&Region::new(1, 1, 0, 2), &[]);
        assert!(image.as_slice().iter().all(|&c| c == 0.0));
    }

    #[test_log::test]
    fn split_slices_follows_region_order() {
        let regions = [Region::new(0, 0, 1, 2), Region::new(4, 0, 2, 1)];
        let buffer: Vec<f32> = (0..slice_len(&regions)).map(|v| v as f32).collect();
        let parts: Vec<(Region, Vec<f32>)> = split_slices(&regions, &buffer)
            .map(|(r, s)| (*r, s.to_vec()))
            .collect();
        assert_eq!(parts[0].1, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(parts[1].1, vec![6.0, 7.0, 8.0, 9.0, 10.0, 11.0]);
    }

    #[test_log::test]
    fn from_raw_rejects_wrong_length() {
        assert!(PixelBuffer::from_raw(2, 2, vec![0.0; 11]).is_err());
        assert!(PixelBuffer::from_raw(2, 2, vec![0.0; 12]).is_ok());
    }
}
