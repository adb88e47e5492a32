//! distrender library crate.
//!
//! Splits a raster image across a group of ranks, renders each region on its
//! own rank and stitches the results back together on rank 0.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod launch;
pub mod partition;
pub mod persist;
pub mod pixels;
pub mod shade;
pub mod timing;
pub mod transport;
pub mod worker;

pub use config::{PartitionMode, RenderSettings, RunConfig, TransportKind};
pub use coordinator::RenderReport;
pub use error::{Phase, RenderError};
pub use partition::{partition, Partition, Region};
pub use pixels::PixelBuffer;
pub use shade::{SceneShader, Shader};
pub use timing::Timings;
