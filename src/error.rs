use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Loading,
    ResolvingCenterline,
    Sampling,
    Compositing,
    Rendering,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Loading => "loading",
            Stage::ResolvingCenterline => "resolving centerline",
            Stage::Sampling => "sampling",
            Stage::Compositing => "compositing",
            Stage::Rendering => "rendering",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum RemError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("CRS mismatch: DEM is '{dem}', centerline is '{centerline}'")]
    CrsMismatch { dem: String, centerline: String },

    #[error("no centerline vertex falls within the DEM extent")]
    NoCenterlineInExtent,

    #[error("raster I/O error: {0}")]
    Raster(#[from] gdal::errors::GdalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image encoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("run cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: RemError,
}

impl StageError {
    pub fn new(stage: Stage, source: RemError) -> Self {
        Self { stage, source }
    }

    // NoCenterlineInExtent leaves the run clean; the caller may retry with a
    // different centerline source.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.source, RemError::NoCenterlineInExtent)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.source, RemError::Cancelled)
    }
}
