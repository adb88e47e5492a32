// In src/main.rs

use distrender::{
    config::{RenderSettings, TransportKind},
    launch, persist, SceneShader,
};

use anyhow::Context;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Instant;

/// Render an image across a group of processes.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// JSON settings file; flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    width: Option<usize>,
    #[arg(long)]
    height: Option<usize>,
    /// sequential | strips | blocks | cycles, or the codes 0-3.
    #[arg(long)]
    mode: Option<String>,
    /// Total process count, coordinator included.
    #[arg(long, short = 'n')]
    processes: Option<usize>,
    /// Strip width in columns for the cyclic mode.
    #[arg(long)]
    cycle_size: Option<usize>,
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// processes | threads
    #[arg(long)]
    transport: Option<TransportKind>,
}

impl Args {
    fn into_settings(self) -> anyhow::Result<RenderSettings> {
        let mut settings = match &self.config {
            Some(path) => RenderSettings::load(path)?,
            None => RenderSettings::default(),
        };
        if let Some(width) = self.width {
            settings.image.width = width;
        }
        if let Some(height) = self.height {
            settings.image.height = height;
        }
        if let Some(mode) = self.mode {
            settings.distribution.mode = mode;
        }
        if let Some(processes) = self.processes {
            settings.distribution.processes = processes;
        }
        if let Some(cycle_size) = self.cycle_size {
            settings.distribution.cycle_size = cycle_size;
        }
        if let Some(transport) = self.transport {
            settings.distribution.transport = transport;
        }
        if let Some(dir) = self.output_dir {
            settings.output.directory = dir;
        }
        Ok(settings)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    let settings = Args::parse().into_settings()?;
    let config = settings
        .coordinator_config()
        .context("Invalid render configuration")?;
    info!(
        "Rendering {}x{} with {} process(es), mode {}, transport {:?}",
        config.width(),
        config.height(),
        config.process_count(),
        config.mode(),
        settings.distribution.transport
    );

    let shader = SceneShader::default();
    let started = Instant::now();
    let report = launch::run(&config, &shader, settings.distribution.transport)
        .context("Render failed")?;
    let execution = started.elapsed();

    println!("Execution Time: {} seconds", execution.as_secs_f64());
    println!("{}", report.timings);

    let path = persist::generate_file_name(&settings.output.directory, config.mode());
    println!("Image will be saved to: {}", path.display());
    persist::save(&path, &report.image)
        .with_context(|| format!("Failed to save image to {}", path.display()))?;

    info!("Done.");
    Ok(())
}
