// src/coordinator.rs

//! Coordinator runtime.
//!
//! Owns the global image buffer for the whole run. The protocol per run is:
//!
//! 1. partition the image (failing here sends nothing),
//! 2. send every worker its assignment and a zeroed slice buffer,
//! 3. shade the coordinator's own regions straight into the global buffer,
//! 4. receive each worker's slice, in ascending rank order, and merge it,
//! 5. tell every worker to exit.
//!
//! Results are harvested strictly by rank: a slow low rank holds up the
//! merge of faster higher ranks whose slices are already waiting in the
//! channel. This bounds throughput for large groups but keeps the gather
//! order deterministic.

use crate::config::{ConfigError, PartitionMode, RunConfig, COORDINATOR_RANK};
use crate::error::{Phase, RenderError, Result};
use crate::partition::{partition, Partition};
use crate::pixels::{slice_len, split_slices, PixelBuffer};
use crate::shade::Shader;
use crate::timing::{CommClock, Timings};
use crate::transport::{self, Assignment, Channel, Message, ReceiveError};
use std::time::Instant;

/// Everything a finished run hands back to the caller.
#[derive(Debug, Clone)]
pub struct RenderReport {
    pub image: PixelBuffer,
    pub timings: Timings,
    pub partition: Partition,
}

pub fn run<C, S>(config: &RunConfig, channel: &mut C, shader: &S) -> Result<RenderReport>
where
    C: Channel + ?Sized,
    S: Shader + ?Sized,
{
    if !config.is_coordinator() {
        return Err(ConfigError::WrongRole {
            rank: config.rank(),
            role: "the coordinator",
        }
        .into());
    }
    if channel.size() != config.process_count() {
        return Err(RenderError::protocol(
            COORDINATOR_RANK,
            Phase::Dispatch,
            format!(
                "channel connects {} ranks but the run has {}",
                channel.size(),
                config.process_count()
            ),
        ));
    }

    let (width, height) = (config.width(), config.height());
    let mut image = PixelBuffer::new(width, height);

    let started = Instant::now();
    let mut comm = CommClock::default();

    let partition = partition(width, height, config.process_count(), config.mode())?;
    for rank in 0..partition.rank_count() {
        log::info!(
            "Process {} will handle {} pixels in {:?}",
            rank,
            partition.pixel_count(rank),
            partition.regions(rank)
        );
    }

    let workers = dispatch_targets(&partition);

    for &rank in &workers {
        let regions = partition.regions(rank);
        let assignment = Message::Assign(Assignment {
            rank,
            mode: partition.mode(),
            regions: regions.to_vec(),
        });
        let slice = Message::Pixels(vec![0.0; slice_len(regions)]);
        comm.measure(|| {
            transport::send_message(channel, rank, &assignment)?;
            transport::send_message(channel, rank, &slice)
        })
        .map_err(|e| RenderError::transport(rank, Phase::Dispatch, e))?;
        log::debug!("Dispatched {} region(s) to rank {}", regions.len(), rank);
    }

    for region in partition.regions(COORDINATOR_RANK) {
        for row in 0..region.height {
            for col in 0..region.width {
                let rgb = shader.shade(region.y + row, region.x + col, config);
                image.write_at(region.global_offset(width, row, col), rgb);
            }
        }
    }
    log::debug!(
        "Coordinator shaded its own {} pixels",
        partition.pixel_count(COORDINATOR_RANK)
    );

    for &rank in &workers {
        let regions = partition.regions(rank);
        let expected = slice_len(regions);
        let received = comm
            .measure(|| transport::receive_message(channel, rank))
            .map_err(|e| match e {
                ReceiveError::Io(source) => RenderError::transport(rank, Phase::Gather, source),
                ReceiveError::Wire(wire) => {
                    RenderError::protocol(rank, Phase::Gather, wire.to_string())
                }
            })?;
        let slice = match received {
            Message::Pixels(slice) if slice.len() == expected => slice,
            Message::Pixels(slice) => {
                return Err(RenderError::BufferSize {
                    rank,
                    phase: Phase::Gather,
                    expected,
                    actual: slice.len(),
                });
            }
            other => {
                return Err(RenderError::protocol(
                    rank,
                    Phase::Gather,
                    format!("expected a rendered slice, got {}", other),
                ));
            }
        };
        for (region, part) in split_slices(regions, &slice) {
            image.merge_region(region, part);
        }
        log::info!("Received slice {}", rank);
    }

    let timings = Timings {
        computation: started.elapsed(),
        communication: comm.total(),
    };
    log::info!(
        "Computation {:.6}s, communication {:.6}s, ratio {:.6}",
        timings.computation_secs(),
        timings.communication_secs(),
        timings.ratio()
    );

    for rank in 1..config.process_count() {
        transport::send_message(channel, rank, &Message::Exit)
            .map_err(|e| RenderError::transport(rank, Phase::Gather, e))?;
    }

    Ok(RenderReport {
        image,
        timings,
        partition,
    })
}

/// Worker ranks that take part in dispatch and gather, ascending. In
/// sequential mode nobody but the coordinator renders.
fn dispatch_targets(partition: &Partition) -> Vec<usize> {
    if partition.mode() == PartitionMode::Sequential {
        return Vec::new();
    }
    (1..partition.rank_count()).collect()
}
