// src/partition/tests.rs

use super::*;
use crate::config::PartitionMode;

const ALL_MODES: [PartitionMode; 5] = [
    PartitionMode::Sequential,
    PartitionMode::VerticalStrips,
    PartitionMode::Blocks,
    PartitionMode::CyclicVertical { cycle_size: 1 },
    PartitionMode::CyclicVertical { cycle_size: 3 },
];

/// Counts how many regions cover each pixel.
fn coverage(partition: &Partition) -> Vec<u32> {
    let mut hits = vec![0u32; partition.width() * partition.height()];
    for (_, region) in partition.iter() {
        for row in 0..region.height {
            for col in 0..region.width {
                hits[(region.y + row) * partition.width() + region.x + col] += 1;
            }
        }
    }
    hits
}

#[test_log::test]
fn every_mode_tiles_every_small_image_exactly() {
    for mode in ALL_MODES {
        for ranks in 1..=7 {
            for width in 0..=9 {
                for height in 0..=6 {
                    let partition = partition(width, height, ranks, mode).unwrap_or_else(|e| {
                        panic!("{}x{} over {} ranks in {}: {}", width, height, ranks, mode, e)
                    });
                    assert_eq!(partition.rank_count(), ranks);
                    assert!(
                        coverage(&partition).iter().all(|&hits| hits == 1),
                        "{}x{} over {} ranks in {} is not an exact tiling: {:?}",
                        width,
                        height,
                        ranks,
                        mode,
                        partition
                    );
                }
            }
        }
    }
}

#[test_log::test]
fn single_rank_degenerates_to_whole_image() {
    for mode in ALL_MODES {
        let partition = partition(37, 11, 1, mode).unwrap();
        assert_eq!(partition.regions(0), &[Region::new(0, 0, 37, 11)]);
    }
}

#[test_log::test]
fn sequential_keeps_other_ranks_idle() {
    let partition = partition(20, 10, 4, PartitionMode::Sequential).unwrap();
    assert_eq!(partition.region(0), Some(&Region::new(0, 0, 20, 10)));
    for rank in 1..4 {
        assert!(!partition.participates(rank));
        assert_eq!(partition.pixel_count(rank), 0);
    }
}

#[test_log::test]
fn vertical_strips_put_remainder_on_last_rank() {
    let partition = partition(100, 10, 3, PartitionMode::VerticalStrips).unwrap();
    let regions: Vec<Region> = (0..3).map(|rank| *partition.region(rank).unwrap()).collect();
    assert_eq!(
        regions,
        vec![
            Region::new(0, 0, 33, 10),
            Region::new(33, 0, 33, 10),
            Region::new(66, 0, 34, 10),
        ]
    );
}

#[test_log::test]
fn blocks_use_base_block_of_width_and_height_over_rank_count() {
    let partition = partition(10, 10, 4, PartitionMode::Blocks).unwrap();
    let total: usize = (0..4).map(|rank| partition.pixel_count(rank)).sum();
    assert_eq!(total, 100);

    assert_eq!(
        partition.regions(0),
        &[
            Region::new(0, 0, 2, 2),
            Region::new(6, 2, 4, 2),
            Region::new(4, 4, 2, 2),
            Region::new(2, 6, 2, 4),
        ]
    );
    for (_, region) in partition.iter() {
        let last_col = region.x == 6;
        let last_row = region.y == 6;
        assert_eq!(region.width, if last_col { 4 } else { 2 }, "{:?}", region);
        assert_eq!(region.height, if last_row { 4 } else { 2 }, "{:?}", region);
    }
    assert!(partition.regions(2).contains(&Region::new(6, 6, 4, 4)));
}

#[test_log::test]
fn blocks_last_along_each_axis_absorb_remainder() {
    let partition = partition(11, 9, 4, PartitionMode::Blocks).unwrap();
    assert_eq!(
        partition.regions(1),
        &[
            Region::new(2, 0, 2, 2),
            Region::new(0, 2, 2, 2),
            Region::new(6, 4, 5, 2),
            Region::new(4, 6, 2, 3),
        ]
    );
    assert!(partition.regions(2).contains(&Region::new(6, 6, 5, 3)));
}

#[test_log::test]
fn blocks_split_both_axes_for_prime_rank_counts() {
    let partition = partition(9, 6, 3, PartitionMode::Blocks).unwrap();
    for rank in 0..3 {
        let regions = partition.regions(rank);
        assert_eq!(regions.len(), 3);
        let mut columns: Vec<usize> = regions.iter().map(|r| r.x).collect();
        let mut rows: Vec<usize> = regions.iter().map(|r| r.y).collect();
        columns.sort_unstable();
        rows.sort_unstable();
        assert_eq!(columns, vec![0, 3, 6], "rank {}", rank);
        assert_eq!(rows, vec![0, 2, 4], "rank {}", rank);
        assert!(regions.iter().all(|r| (r.width, r.height) == (3, 2)));
    }
}

#[test_log::test]
fn cyclic_strips_deal_round_robin() {
    let partition = partition(10, 4, 2, PartitionMode::CyclicVertical { cycle_size: 3 }).unwrap();
    assert_eq!(
        partition.regions(0),
        &[Region::new(0, 0, 3, 4), Region::new(6, 0, 3, 4)]
    );
    assert_eq!(
        partition.regions(1),
        &[Region::new(3, 0, 3, 4), Region::new(9, 0, 1, 4)]
    );
}

#[test_log::test]
fn over_provisioned_strips_yield_empty_regions() {
    let partition = partition(2, 5, 4, PartitionMode::VerticalStrips).unwrap();
    for rank in 0..3 {
        assert!(partition.region(rank).unwrap().is_empty());
    }
    assert_eq!(partition.region(3), Some(&Region::new(0, 0, 2, 5)));
}

#[test_log::test]
fn zero_ranks_is_a_configuration_error() {
    let err = partition(4, 4, 0, PartitionMode::Blocks).unwrap_err();
    assert!(matches!(err, RenderError::Config(_)));
}

#[test_log::test]
fn verify_rejects_overlap() {
    let bad = Partition {
        width: 4,
        height: 4,
        mode: PartitionMode::VerticalStrips,
        assignments: vec![
            vec![Region::new(0, 0, 3, 4)],
            vec![Region::new(2, 0, 2, 4)],
        ],
    };
    let err = bad.verify().unwrap_err();
    assert!(matches!(err, RenderError::Geometry { .. }), "{}", err);
}

#[test_log::test]
fn verify_rejects_gap_and_out_of_bounds() {
    let gap = Partition {
        width: 4,
        height: 4,
        mode: PartitionMode::VerticalStrips,
        assignments: vec![vec![Region::new(0, 0, 1, 4)], vec![Region::new(2, 0, 2, 4)]],
    };
    assert!(matches!(gap.verify(), Err(RenderError::Geometry { .. })));

    let outside = Partition {
        width: 4,
        height: 4,
        mode: PartitionMode::Sequential,
        assignments: vec![vec![Region::new(1, 0, 4, 4)]],
    };
    assert!(matches!(outside.verify(), Err(RenderError::Geometry { .. })));
}

#[test_log::test]
fn global_index_matches_row_major_layout_for_every_pixel() {
    let (width, height) = (13, 7);
    for mode in ALL_MODES {
        for ranks in 1..=5 {
            let partition = partition(width, height, ranks, mode).unwrap();
            let mut seen = vec![false; width * height];
            for (_, region) in partition.iter() {
                for row in 0..region.height {
                    for col in 0..region.width {
                        let offset = to_global_index(region, width, row, col);
                        assert_eq!(offset % CHANNELS, 0);
                        let pixel = offset / CHANNELS;
                        assert_eq!(pixel / width, region.y + row);
                        assert_eq!(pixel % width, region.x + col);
                        assert!(!seen[pixel], "pixel {} written twice", pixel);
                        seen[pixel] = true;
                    }
                }
            }
            assert!(seen.into_iter().all(|s| s));
        }
    }
}

#[test_log::test]
fn local_offset_uses_region_width() {
    let region = Region::new(40, 3, 5, 2);
    assert_eq!(region.local_offset(0, 0), 0);
    assert_eq!(region.local_offset(1, 0), 15);
    assert_eq!(region.local_offset(1, 4), 27);
    assert_eq!(region.global_offset(100, 1, 4), 3 * (4 * 100 + 44));
}

#[test_log::test]
fn untrusted_regions_never_overflow() {
    let huge = Region::new(usize::MAX - 1, 0, 4, 1);
    assert!(!huge.fits_within(8, 8));
    assert!(!Region::new(0, usize::MAX, 1, 1).fits_within(8, 8));
    assert!(Region::new(4, 4, 4, 4).fits_within(8, 8));

    assert_eq!(Region::new(0, 0, usize::MAX, 2).checked_channel_len(), None);
    assert_eq!(Region::new(0, 0, 4, 2).checked_channel_len(), Some(24));
}
