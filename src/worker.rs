// src/worker.rs

//! Worker runtime: receive an assignment, shade it, send it back.

use crate::config::{ConfigError, RunConfig, COORDINATOR_RANK};
use crate::error::{Phase, RenderError, Result};
use crate::partition::{Region, CHANNELS};
use crate::pixels::{checked_slice_len, slice_len};
use crate::shade::Shader;
use crate::transport::{self, Assignment, Channel, Message, ReceiveError};

/// What a worker did before it was told to exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerSummary {
    pub assignments: usize,
    pub pixels_shaded: usize,
}

/// Serves assignments from the coordinator until it sends `Exit`.
///
/// Any malformed or mismatched message is fatal; nothing is retried.
pub fn run<C, S>(config: &RunConfig, channel: &mut C, shader: &S) -> Result<WorkerSummary>
where
    C: Channel + ?Sized,
    S: Shader + ?Sized,
{
    let rank = config.rank();
    if config.is_coordinator() {
        return Err(ConfigError::WrongRole {
            rank,
            role: "a worker",
        }
        .into());
    }
    debug_assert_eq!(channel.rank(), rank);

    let mut summary = WorkerSummary::default();
    loop {
        match receive(channel, rank, Phase::Dispatch)? {
            Message::Exit => {
                log::debug!(
                    "Worker {}: exit after {} assignment(s), {} pixels",
                    rank,
                    summary.assignments,
                    summary.pixels_shaded
                );
                return Ok(summary);
            }
            Message::Pixels(buffer) => {
                return Err(RenderError::protocol(
                    rank,
                    Phase::Dispatch,
                    format!(
                        "slice buffer of {} channels arrived before any assignment",
                        buffer.len()
                    ),
                ));
            }
            Message::Assign(assignment) => {
                let expected = check_assignment(config, &assignment)?;
                let mut slice = match receive(channel, rank, Phase::Dispatch)? {
                    Message::Pixels(buffer) if buffer.len() == expected => buffer,
                    Message::Pixels(buffer) => {
                        return Err(RenderError::BufferSize {
                            rank,
                            phase: Phase::Dispatch,
                            expected,
                            actual: buffer.len(),
                        });
                    }
                    other => {
                        return Err(RenderError::protocol(
                            rank,
                            Phase::Dispatch,
                            format!("expected a slice buffer after the assignment, got {}", other),
                        ));
                    }
                };
                log::debug!(
                    "Worker {}: received {} region(s), {} pixels: {:?}",
                    rank,
                    assignment.regions.len(),
                    assignment.pixel_count(),
                    assignment.regions
                );

                let shaded = render_regions(config, &assignment.regions, &mut slice, shader);

                transport::send_message(channel, COORDINATOR_RANK, &Message::Pixels(slice))
                    .map_err(|e| RenderError::transport(rank, Phase::Gather, e))?;
                log::debug!("Worker {}: sent {} shaded pixels back", rank, shaded);

                summary.assignments += 1;
                summary.pixels_shaded += shaded;
            }
        }
    }
}

/// Shades every pixel of `regions` into `slice`, the concatenation of one
/// locally indexed buffer per region. The shader always sees global
/// coordinates. Returns the number of pixels shaded.
pub fn render_regions<S>(
    config: &RunConfig,
    regions: &[Region],
    slice: &mut [f32],
    shader: &S,
) -> usize
where
    S: Shader + ?Sized,
{
    debug_assert_eq!(slice.len(), slice_len(regions));
    let mut start = 0;
    let mut shaded = 0;
    for region in regions {
        let end = start + region.channel_len();
        let part = &mut slice[start..end];
        for row in 0..region.height {
            for col in 0..region.width {
                let rgb = shader.shade(region.y + row, region.x + col, config);
                let offset = region.local_offset(row, col);
                part[offset..offset + CHANNELS].copy_from_slice(&rgb);
            }
        }
        shaded += region.area();
        start = end;
    }
    shaded
}

fn receive<C>(channel: &mut C, rank: usize, phase: Phase) -> Result<Message>
where
    C: Channel + ?Sized,
{
    transport::receive_message(channel, COORDINATOR_RANK).map_err(|e| match e {
        ReceiveError::Io(source) => RenderError::transport(rank, phase, source),
        ReceiveError::Wire(wire) => RenderError::protocol(rank, phase, wire.to_string()),
    })
}

/// Validates an assignment against this rank's configuration and returns
/// the slice length it implies.
fn check_assignment(config: &RunConfig, assignment: &Assignment) -> Result<usize> {
    let rank = config.rank();
    let mismatch = |detail: String| RenderError::protocol(rank, Phase::Dispatch, detail);

    if assignment.rank != rank {
        return Err(mismatch(format!(
            "assignment addressed to rank {}",
            assignment.rank
        )));
    }
    if assignment.mode != config.mode() {
        return Err(mismatch(format!(
            "assignment computed with mode {} but this rank runs {}",
            assignment.mode,
            config.mode()
        )));
    }
    if let Some(region) = assignment
        .regions
        .iter()
        .find(|region| !region.fits_within(config.width(), config.height()))
    {
        return Err(mismatch(format!(
            "region {:?} lies outside the {}x{} image",
            region,
            config.width(),
            config.height()
        )));
    }
    checked_slice_len(&assignment.regions).ok_or_else(|| {
        mismatch(format!(
            "{} regions imply a slice buffer too large to address",
            assignment.regions.len()
        ))
    })
}
