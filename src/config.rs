// src/config.rs

//! Run configuration for a distributed render.
//!
//! Two layers live here. [`RenderSettings`] is what an operator writes down: a
//! serde-deserializable description of the image and the process group that
//! can be loaded from a JSON file and overridden from the command line.
//! [`RunConfig`] is the validated, immutable value every rank receives at
//! start-up; it is identical across processes except for the rank.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Rank of the process that owns the global image buffer.
pub const COORDINATOR_RANK: usize = 0;

/// Problems detected while building a [`RunConfig`] from settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unrecognized partitioning mode '{0}'")]
    UnknownMode(String),
    #[error("process count must be at least 1")]
    NoProcesses,
    #[error("rank {rank} is outside the process group of size {size}")]
    RankOutOfRange { rank: usize, size: usize },
    #[error("cycle size must be at least 1 column")]
    ZeroCycleSize,
    #[error("unrecognized transport '{0}' (expected 'processes' or 'threads')")]
    UnknownTransport(String),
    #[error("rank {rank} cannot act as {role}")]
    WrongRole { rank: usize, role: &'static str },
}

/// Strategy used to carve the image into per-rank regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionMode {
    /// The whole image on rank 0; no other rank participates.
    Sequential,
    /// One full-height column strip per rank.
    VerticalStrips,
    /// A grid of rectangular blocks, one per rank.
    Blocks,
    /// Strips `cycle_size` columns wide dealt out round-robin.
    CyclicVertical { cycle_size: usize },
}

impl PartitionMode {
    /// Numeric code used on the wire and accepted in settings files.
    pub fn code(&self) -> u8 {
        match self {
            PartitionMode::Sequential => 0,
            PartitionMode::VerticalStrips => 1,
            PartitionMode::Blocks => 2,
            PartitionMode::CyclicVertical { .. } => 3,
        }
    }

    /// Rebuilds a mode from its numeric code and the cycle size tunable.
    pub fn from_code(code: u8, cycle_size: usize) -> Result<Self, ConfigError> {
        match code {
            0 => Ok(PartitionMode::Sequential),
            1 => Ok(PartitionMode::VerticalStrips),
            2 => Ok(PartitionMode::Blocks),
            3 if cycle_size == 0 => Err(ConfigError::ZeroCycleSize),
            3 => Ok(PartitionMode::CyclicVertical { cycle_size }),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }

    /// Mode-specific tunable carried alongside the code; zero when unused.
    pub fn cycle_size(&self) -> usize {
        match self {
            PartitionMode::CyclicVertical { cycle_size } => *cycle_size,
            _ => 0,
        }
    }

    /// Short name used in logs and generated file names.
    pub fn name(&self) -> &'static str {
        match self {
            PartitionMode::Sequential => "sequential",
            PartitionMode::VerticalStrips => "strips",
            PartitionMode::Blocks => "blocks",
            PartitionMode::CyclicVertical { .. } => "cycles",
        }
    }

    /// Parses a mode name (or numeric code) with the given cycle size.
    pub fn parse_with_cycle(s: &str, cycle_size: usize) -> Result<Self, ConfigError> {
        let normalized = s.trim().to_ascii_lowercase();
        if let Ok(code) = normalized.parse::<u8>() {
            return Self::from_code(code, cycle_size);
        }
        match normalized.as_str() {
            "none" | "sequential" => Ok(PartitionMode::Sequential),
            "strips" | "vertical-strips" | "vertical_strips" => Ok(PartitionMode::VerticalStrips),
            "blocks" => Ok(PartitionMode::Blocks),
            "cycles" | "cyclic" | "cyclic-vertical" | "cycles-vertical" => {
                Self::from_code(3, cycle_size)
            }
            _ => Err(ConfigError::UnknownMode(s.to_string())),
        }
    }
}

impl FromStr for PartitionMode {
    type Err = ConfigError;

    /// Parses a mode name; cyclic modes get [`DEFAULT_CYCLE_SIZE`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_with_cycle(s, DEFAULT_CYCLE_SIZE)
    }
}

impl fmt::Display for PartitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionMode::CyclicVertical { cycle_size } => {
                write!(f, "{} (cycle size {})", self.name(), cycle_size)
            }
            _ => f.write_str(self.name()),
        }
    }
}

/// Immutable per-process parameters of one run.
///
/// Fields are private so that a constructed config cannot drift from the
/// values the other ranks were started with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    width: usize,
    height: usize,
    process_count: usize,
    rank: usize,
    mode: PartitionMode,
}

impl RunConfig {
    pub fn new(
        width: usize,
        height: usize,
        process_count: usize,
        rank: usize,
        mode: PartitionMode,
    ) -> Result<Self, ConfigError> {
        if process_count == 0 {
            return Err(ConfigError::NoProcesses);
        }
        if rank >= process_count {
            return Err(ConfigError::RankOutOfRange {
                rank,
                size: process_count,
            });
        }
        if let PartitionMode::CyclicVertical { cycle_size: 0 } = mode {
            return Err(ConfigError::ZeroCycleSize);
        }
        Ok(Self {
            width,
            height,
            process_count,
            rank,
            mode,
        })
    }

    /// The same run as seen from another rank.
    pub fn with_rank(&self, rank: usize) -> Result<Self, ConfigError> {
        Self::new(self.width, self.height, self.process_count, rank, self.mode)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn process_count(&self) -> usize {
        self.process_count
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn mode(&self) -> PartitionMode {
        self.mode
    }

    pub fn is_coordinator(&self) -> bool {
        self.rank == COORDINATOR_RANK
    }
}

// --- File-backed settings ---

pub const DEFAULT_CYCLE_SIZE: usize = 8;

/// How the ranks of a run are brought up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// One forked OS process per rank, connected by Unix socket pairs.
    #[default]
    Processes,
    /// One thread per rank inside this process, connected by queues.
    Threads,
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processes" | "process" | "fork" => Ok(TransportKind::Processes),
            "threads" | "thread" | "local" => Ok(TransportKind::Threads),
            _ => Err(ConfigError::UnknownTransport(s.to_string())),
        }
    }
}

/// Operator-facing settings, usually read from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RenderSettings {
    /// Image geometry.
    pub image: ImageSettings,
    /// Process group and partitioning.
    pub distribution: DistributionSettings,
    /// Where finished images are written.
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub width: usize,
    pub height: usize,
}

impl Default for ImageSettings {
    fn default() -> Self {
        ImageSettings {
            width: 640,
            height: 480,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionSettings {
    /// Partitioning mode by name ("sequential", "strips", "blocks", "cycles")
    /// or by numeric code.
    pub mode: String,
    /// Column count per strip for the cyclic mode.
    pub cycle_size: usize,
    /// Total number of ranks, coordinator included.
    pub processes: usize,
    pub transport: TransportKind,
}

impl Default for DistributionSettings {
    fn default() -> Self {
        DistributionSettings {
            mode: "strips".to_string(),
            cycle_size: DEFAULT_CYCLE_SIZE,
            processes: 4,
            transport: TransportKind::Processes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub directory: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        OutputSettings {
            directory: PathBuf::from("renders"),
        }
    }
}

impl RenderSettings {
    /// Reads settings from a JSON file; missing fields take their defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let settings: RenderSettings = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))?;
        log::debug!("Loaded settings from {}: {:?}", path.display(), settings);
        Ok(settings)
    }

    /// Resolves the partitioning mode, failing fast on unknown names.
    pub fn mode(&self) -> Result<PartitionMode, ConfigError> {
        PartitionMode::parse_with_cycle(&self.distribution.mode, self.distribution.cycle_size)
    }

    /// The coordinator's [`RunConfig`]; workers derive theirs with
    /// [`RunConfig::with_rank`].
    pub fn coordinator_config(&self) -> Result<RunConfig, ConfigError> {
        RunConfig::new(
            self.image.width,
            self.image.height,
            self.distribution.processes,
            COORDINATOR_RANK,
            self.mode()?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn mode_names_and_codes_parse() {
        assert_eq!("strips".parse::<PartitionMode>(), Ok(PartitionMode::VerticalStrips));
        assert_eq!("BLOCKS".parse::<PartitionMode>(), Ok(PartitionMode::Blocks));
        assert_eq!("0".parse::<PartitionMode>(), Ok(PartitionMode::Sequential));
        assert_eq!(
            PartitionMode::parse_with_cycle("cycles", 3),
            Ok(PartitionMode::CyclicVertical { cycle_size: 3 })
        );
    }

    #[test_log::test]
    fn unknown_mode_is_rejected() {
        assert_eq!(
            "spiral".parse::<PartitionMode>(),
            Err(ConfigError::UnknownMode("spiral".to_string()))
        );
        assert_eq!(
            PartitionMode::from_code(9, 0),
            Err(ConfigError::UnknownMode("9".to_string()))
        );
    }

    #[test_log::test]
    fn run_config_validates_rank_and_cycle() {
        assert_eq!(
            RunConfig::new(4, 4, 2, 2, PartitionMode::Blocks),
            Err(ConfigError::RankOutOfRange { rank: 2, size: 2 })
        );
        assert_eq!(
            RunConfig::new(4, 4, 0, 0, PartitionMode::Blocks),
            Err(ConfigError::NoProcesses)
        );
        assert_eq!(
            RunConfig::new(4, 4, 1, 0, PartitionMode::CyclicVertical { cycle_size: 0 }),
            Err(ConfigError::ZeroCycleSize)
        );
    }

    #[test_log::test]
    fn with_rank_changes_only_the_rank() {
        let base = RunConfig::new(30, 20, 3, 0, PartitionMode::VerticalStrips).unwrap();
        let worker = base.with_rank(2).unwrap();
        assert_eq!(worker.rank(), 2);
        assert_eq!(worker.width(), 30);
        assert_eq!(worker.height(), 20);
        assert_eq!(worker.mode(), base.mode());
        assert!(!worker.is_coordinator());
    }

    #[test_log::test]
    fn partial_settings_take_defaults() {
        let json = r#"{ "image": { "width": 32 }, "distribution": { "mode": "blocks" } }"#;
        let settings: RenderSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.image.width, 32);
        assert_eq!(settings.image.height, 480);
        assert_eq!(settings.distribution.processes, 4);
        assert_eq!(settings.distribution.transport, TransportKind::Processes);
        let config = settings.coordinator_config().unwrap();
        assert_eq!(config.mode(), PartitionMode::Blocks);
        assert!(config.is_coordinator());
    }
}
