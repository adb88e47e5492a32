// src/persist.rs

//! Writes finished images to disk as 8-bit PNGs.

use crate::config::PartitionMode;
use crate::pixels::PixelBuffer;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cannot save an image of {width}x{height} pixels")]
    Dimensions { width: usize, height: usize },
    #[error("failed to create output directory {}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode {}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// `<dir>/render_<unix-seconds>_<mode>.png`
pub fn generate_file_name(dir: &Path, mode: PartitionMode) -> PathBuf {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    dir.join(format!("render_{}_{}.png", seconds, mode.name()))
}

/// Converts channels to bytes, clamping to `[0, 1]` first.
pub fn to_rgb8(buffer: &PixelBuffer) -> Result<RgbImage, PersistError> {
    let dimensions = PersistError::Dimensions {
        width: buffer.width(),
        height: buffer.height(),
    };
    let (Ok(width), Ok(height)) = (u32::try_from(buffer.width()), u32::try_from(buffer.height()))
    else {
        return Err(dimensions);
    };
    if width == 0 || height == 0 {
        return Err(dimensions);
    }
    let bytes = buffer
        .as_slice()
        .iter()
        .map(|&channel| (channel.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect();
    RgbImage::from_raw(width, height, bytes).ok_or(dimensions)
}

/// Saves `buffer` to `path`, creating parent directories as needed.
pub fn save(path: &Path, buffer: &PixelBuffer) -> Result<(), PersistError> {
    let image = to_rgb8(buffer)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| PersistError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    image.save(path).map_err(|source| PersistError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Saved {}x{} image to {}", image.width(), image.height(), path.display());
    Ok(())
}
