// src/error.rs

//! Error taxonomy for a distributed render.
//!
//! Every variant is fatal for the run. Variants raised while talking to
//! another rank carry that rank and the [`Phase`] in which the failure was
//! observed, so the operator can tell which process and which step broke.

use crate::config::ConfigError;
use std::fmt;
use thiserror::Error;

/// Step of the protocol in which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Coordinator handing out assignments and slice buffers.
    Dispatch,
    /// A rank shading its own pixels.
    Render,
    /// Coordinator collecting rendered slices.
    Gather,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Dispatch => f.write_str("dispatch"),
            Phase::Render => f.write_str("render"),
            Phase::Gather => f.write_str("gather"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("partition of the {width}x{height} image does not tile it exactly: {detail}")]
    Geometry {
        width: usize,
        height: usize,
        detail: String,
    },

    #[error("rank {rank}: transport failure during {phase}: {source}")]
    Transport {
        rank: usize,
        phase: Phase,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "rank {rank}: slice buffer size mismatch during {phase}: expected {expected} channels, got {actual}"
    )]
    BufferSize {
        rank: usize,
        phase: Phase,
        expected: usize,
        actual: usize,
    },

    #[error("rank {rank}: protocol violation during {phase}: {detail}")]
    Protocol {
        rank: usize,
        phase: Phase,
        detail: String,
    },

    #[error("rank {rank}: worker process failed: {detail}")]
    Launch { rank: usize, detail: String },
}

impl RenderError {
    pub(crate) fn transport(rank: usize, phase: Phase, source: std::io::Error) -> Self {
        RenderError::Transport {
            rank,
            phase,
            source,
        }
    }

    pub(crate) fn protocol(rank: usize, phase: Phase, detail: impl Into<String>) -> Self {
        RenderError::Protocol {
            rank,
            phase,
            detail: detail.into(),
        }
    }

    /// The peer rank the failure is attributed to, if any.
    pub fn rank(&self) -> Option<usize> {
        match self {
            RenderError::Transport { rank, .. }
            | RenderError::BufferSize { rank, .. }
            | RenderError::Protocol { rank, .. }
            | RenderError::Launch { rank, .. } => Some(*rank),
            RenderError::Config(_) | RenderError::Geometry { .. } => None,
        }
    }

    /// The protocol phase the failure is attributed to, if any.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            RenderError::Transport { phase, .. }
            | RenderError::BufferSize { phase, .. }
            | RenderError::Protocol { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

pub type Result<T, E = RenderError> = std::result::Result<T, E>;
