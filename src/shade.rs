// src/shade.rs

//! Shading collaborator.
//!
//! The runtimes only ever ask "what colour is global pixel (row, col)?". Any
//! deterministic, side-effect-free answer will do; [`SceneShader`] is the one
//! the binary ships with.

use crate::config::RunConfig;
use crate::pixels::Rgb;

/// Computes the colour of one pixel from its global coordinates.
///
/// Implementations must return the same value for the same `(row, col,
/// config)` no matter which rank calls them.
pub trait Shader {
    fn shade(&self, row: usize, col: usize, config: &RunConfig) -> Rgb;
}

impl<F> Shader for F
where
    F: Fn(usize, usize, &RunConfig) -> Rgb,
{
    fn shade(&self, row: usize, col: usize, config: &RunConfig) -> Rgb {
        self(row, col, config)
    }
}

/// A lit sphere over a vertical sky gradient, ray cast with an orthographic
/// camera. Cheap, but with enough structure that a misplaced region is
/// obvious in the saved image.
#[derive(Debug, Clone, Copy)]
pub struct SceneShader {
    /// Sphere radius as a fraction of the shorter image side.
    pub radius: f32,
    /// Direction towards the light, normalised on use.
    pub light: [f32; 3],
}

impl Default for SceneShader {
    fn default() -> Self {
        SceneShader {
            radius: 0.4,
            light: [-0.5, 0.7, 0.6],
        }
    }
}

impl Shader for SceneShader {
    fn shade(&self, row: usize, col: usize, config: &RunConfig) -> Rgb {
        let width = config.width().max(1) as f32;
        let height = config.height().max(1) as f32;
        let scale = width.min(height);

        // Pixel centre in image-centred units, y up.
        let u = (col as f32 + 0.5 - width * 0.5) / scale;
        let v = (height * 0.5 - row as f32 - 0.5) / scale;

        let r2 = self.radius * self.radius;
        let d2 = u * u + v * v;
        if d2 > r2 {
            let t = (row as f32 + 0.5) / height;
            return [0.55 + 0.35 * t, 0.7 + 0.2 * t, 0.95];
        }

        let normal = [u / self.radius, v / self.radius, (r2 - d2).sqrt() / self.radius];
        let length = self.light.iter().map(|c| c * c).sum::<f32>().sqrt().max(f32::EPSILON);
        let diffuse = normal
            .iter()
            .zip(self.light.iter())
            .map(|(n, l)| n * l / length)
            .sum::<f32>()
            .max(0.0);
        let ambient = 0.08;
        let shade = ambient + (1.0 - ambient) * diffuse;
        [0.9 * shade, 0.35 * shade, 0.2 * shade]
    }
}
