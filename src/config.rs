use crate::error::RemError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KNeighbors {
    Auto,
    Fixed(usize),
}

impl Default for KNeighbors {
    fn default() -> Self {
        KNeighbors::Auto
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    ImageRaster,
    GroundOverlayArchive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Colormap {
    MakoR,
    Viridis,
    Magma,
    Cividis,
    Blues,
}

impl Default for Colormap {
    fn default() -> Self {
        Colormap::MakoR
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub colormap: Colormap,

    #[serde(default = "defaults::vertical_exaggeration")]
    pub vertical_exaggeration: f64,

    #[serde(default = "defaults::hillshade_blend")]
    pub hillshade_blend: f64,

    #[serde(default = "defaults::output_formats")]
    pub output_formats: Vec<OutputFormat>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            colormap: Colormap::default(),
            vertical_exaggeration: defaults::vertical_exaggeration(),
            hillshade_blend: defaults::hillshade_blend(),
            output_formats: defaults::output_formats(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemConfig {
    #[serde(default = "defaults::interpolation_points")]
    pub interpolation_points: usize,

    #[serde(default)]
    pub k_neighbors: KNeighbors,

    #[serde(default = "defaults::error_tolerance")]
    pub error_tolerance: f64,

    #[serde(default = "defaults::cpu_workers")]
    pub cpu_workers: usize,

    #[serde(default = "defaults::chunk_max_cells")]
    pub chunk_max_cells: usize,

    // Map units. Unset picks a quarter of the DEM diagonal at run time.
    #[serde(default)]
    pub max_search_radius: Option<f64>,

    // Symmetric clip of the REM distribution, e.g. 99.0 clips to [P1, P99].
    #[serde(default)]
    pub clip_percentile: Option<f64>,

    #[serde(default)]
    pub render: RenderConfig,

    // No files are written when unset.
    #[serde(default)]
    pub out_dir: Option<PathBuf>,
}

impl Default for RemConfig {
    fn default() -> Self {
        Self {
            interpolation_points: defaults::interpolation_points(),
            k_neighbors: KNeighbors::default(),
            error_tolerance: defaults::error_tolerance(),
            cpu_workers: defaults::cpu_workers(),
            chunk_max_cells: defaults::chunk_max_cells(),
            max_search_radius: None,
            clip_percentile: None,
            render: RenderConfig::default(),
            out_dir: None,
        }
    }
}

impl RemConfig {
    pub fn validate(&self) -> Result<(), RemError> {
        if self.interpolation_points == 0 {
            return Err(invalid("interpolation_points must be positive"));
        }
        if let KNeighbors::Fixed(0) = self.k_neighbors {
            return Err(invalid("k_neighbors must be positive"));
        }
        if !self.error_tolerance.is_finite() || self.error_tolerance < 0.0 {
            return Err(invalid("error_tolerance must be a finite value >= 0"));
        }
        if self.cpu_workers == 0 {
            return Err(invalid("cpu_workers must be positive"));
        }
        if self.chunk_max_cells == 0 {
            return Err(invalid("chunk_max_cells must be positive"));
        }
        if let Some(radius) = self.max_search_radius {
            if !radius.is_finite() || radius <= 0.0 {
                return Err(invalid("max_search_radius must be a finite value > 0"));
            }
        }
        if let Some(p) = self.clip_percentile {
            if !(50.0..=100.0).contains(&p) {
                return Err(invalid("clip_percentile must lie in [50, 100]"));
            }
        }
        if !self.render.vertical_exaggeration.is_finite() || self.render.vertical_exaggeration <= 0.0
        {
            return Err(invalid("vertical_exaggeration must be a finite value > 0"));
        }
        if !(0.0..=1.0).contains(&self.render.hillshade_blend) {
            return Err(invalid("hillshade_blend must lie in [0, 1]"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> RemError {
    RemError::InvalidConfig(msg.into())
}

mod defaults {
    use super::OutputFormat;

    pub fn interpolation_points() -> usize {
        1000
    }

    pub fn error_tolerance() -> f64 {
        0.1
    }

    pub fn cpu_workers() -> usize {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        (available / 2).max(1)
    }

    pub fn chunk_max_cells() -> usize {
        1_000_000
    }

    pub fn vertical_exaggeration() -> f64 {
        4.0
    }

    pub fn hillshade_blend() -> f64 {
        0.25
    }

    pub fn output_formats() -> Vec<OutputFormat> {
        vec![OutputFormat::ImageRaster]
    }
}
