pub mod centerline;
pub mod compositor;
pub mod config;
pub mod core;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod progress;
pub mod render;
pub mod sampler;
pub mod scheduler;
pub mod utils;

pub use centerline::{Centerline, CenterlineProvider, ResolvedCenterline, SamplePoint};
pub use config::{Colormap, KNeighbors, OutputFormat, RemConfig, RenderConfig};
pub use self::core::dem::DemRaster;
pub use self::core::raster::Raster;
pub use error::{RemError, Stage, StageError};
pub use pipeline::{RemPipeline, RemProduct, RemStats};
pub use progress::{ConsoleSink, NullSink, ProgressEvent, ProgressSink, RunState};
pub use scheduler::pool::CancelToken;
