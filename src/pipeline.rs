use crate::centerline::{self, Centerline, CenterlineProvider};
use crate::compositor;
use crate::config::{OutputFormat, RemConfig};
use crate::core::dem::DemRaster;
use crate::core::raster::Raster;
use crate::error::{RemError, Stage, StageError};
use crate::io::{reader, writer};
use crate::progress::{NullSink, Progress, ProgressSink, RunState};
use crate::render::{self, RenderedImage};
use crate::sampler::{index::PointIndex, SamplerParams, WaterSurfaceSampler};
use crate::scheduler::pool::{sample_chunks, CancelToken};
use crate::scheduler::plan_chunks;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemStats {
    pub sample_points: usize,
    pub sinuosity: f64,
    pub k_neighbors: usize,
    pub search_radius: f64,
    pub rem_min: Option<f32>,
    pub rem_max: Option<f32>,
    pub valid_pixels: u64,
    pub gap_pixels: u64,
}

#[derive(Debug)]
pub struct RemProduct {
    pub rem: Raster,
    pub water_surface: Raster,
    pub stats: RemStats,
    pub files: Vec<PathBuf>,
}

pub struct RemPipeline {
    config: RemConfig,
    sink: Arc<dyn ProgressSink>,
    cancel: CancelToken,
}

impl RemPipeline {
    pub fn new(config: RemConfig) -> Result<Self, RemError> {
        config.validate()?;
        Ok(Self {
            config,
            sink: Arc::new(NullSink),
            cancel: CancelToken::new(),
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &RemConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn run_from_path(
        &self,
        dem_path: impl AsRef<Path>,
        centerline: &Centerline,
    ) -> Result<RemProduct, StageError> {
        let progress = Progress::start(&*self.sink, Stage::Loading);
        let dem = match reader::open_dem(dem_path) {
            Ok(dem) => dem,
            Err(source) => {
                let err = StageError::new(Stage::Loading, source);
                self.sink.on_state(RunState::Failed(Stage::Loading));
                return Err(err);
            }
        };
        progress.finish();

        self.run(&dem, centerline)
    }

    pub fn run_with_provider(
        &self,
        dem: &DemRaster,
        provider: &dyn CenterlineProvider,
    ) -> Result<RemProduct, StageError> {
        let resolved = provider
            .resolve_centerline(dem.extent(), &dem.crs)
            .map_err(|source| StageError::new(Stage::ResolvingCenterline, source));

        match resolved {
            Ok(Some(centerline)) => self.run(dem, &centerline),
            Ok(None) => {
                self.sink
                    .on_state(RunState::Failed(Stage::ResolvingCenterline));
                Err(StageError::new(
                    Stage::ResolvingCenterline,
                    RemError::NoCenterlineInExtent,
                ))
            }
            Err(err) => {
                self.sink
                    .on_state(RunState::Failed(Stage::ResolvingCenterline));
                Err(err)
            }
        }
    }

    pub fn run(&self, dem: &DemRaster, centerline: &Centerline) -> Result<RemProduct, StageError> {
        let result = self.execute(dem, centerline);
        match &result {
            Ok(_) => self.sink.on_state(RunState::Done),
            Err(err) if err.is_cancelled() => self.sink.on_state(RunState::Cancelled),
            Err(err) => self.sink.on_state(RunState::Failed(err.stage)),
        }
        result
    }

    fn execute(&self, dem: &DemRaster, centerline: &Centerline) -> Result<RemProduct, StageError> {
        let sink = &*self.sink;

        self.checkpoint(Stage::ResolvingCenterline)?;
        let progress = Progress::start(sink, Stage::ResolvingCenterline);
        let resolved = centerline::resolve(centerline, dem, self.config.interpolation_points)
            .map_err(|e| StageError::new(Stage::ResolvingCenterline, e))?;
        let k = resolved.neighbor_count(self.config.k_neighbors);
        progress.finish();

        self.checkpoint(Stage::Sampling)?;
        let progress = Progress::start(sink, Stage::Sampling);
        let index = PointIndex::build(&resolved.points);
        let search_radius = self
            .config
            .max_search_radius
            .unwrap_or_else(|| dem.diagonal() / 4.0);
        let sampler = WaterSurfaceSampler::new(
            &index,
            SamplerParams {
                k,
                error_tolerance: self.config.error_tolerance,
                max_search_radius: search_radius,
            },
        );
        let chunks = plan_chunks(dem.height(), dem.width(), self.config.chunk_max_cells);
        let water_surface = sample_chunks(
            dem,
            sampler,
            &chunks,
            self.config.cpu_workers,
            &self.cancel,
            &progress,
        )
        .map_err(|e| StageError::new(Stage::Sampling, e))?;
        progress.finish();

        self.checkpoint(Stage::Compositing)?;
        let progress = Progress::start(sink, Stage::Compositing);
        let (rem, composite_stats) =
            compositor::composite(&dem.grid, &water_surface, self.config.clip_percentile);
        if composite_stats.gap_pixels > 0 {
            progress.warn(&format!(
                "{} pixels had no sample point within {search_radius:.1} map units and were left as no-data",
                composite_stats.gap_pixels
            ));
        }
        progress.finish();

        self.checkpoint(Stage::Rendering)?;
        let progress = Progress::start(sink, Stage::Rendering);
        let image = render::render(&rem, dem, &self.config.render, &progress);
        let files = self
            .write_outputs(dem, &rem, &image)
            .map_err(|e| StageError::new(Stage::Rendering, e))?;
        progress.finish();

        Ok(RemProduct {
            rem,
            water_surface,
            stats: RemStats {
                sample_points: resolved.points.len(),
                sinuosity: resolved.sinuosity,
                k_neighbors: k,
                search_radius,
                rem_min: composite_stats.min,
                rem_max: composite_stats.max,
                valid_pixels: composite_stats.valid_pixels,
                gap_pixels: composite_stats.gap_pixels,
            },
            files,
        })
    }

    fn checkpoint(&self, stage: Stage) -> Result<(), StageError> {
        if self.cancel.is_cancelled() {
            Err(StageError::new(stage, RemError::Cancelled))
        } else {
            Ok(())
        }
    }

    fn write_outputs(
        &self,
        dem: &DemRaster,
        rem: &Raster,
        image: &RenderedImage,
    ) -> Result<Vec<PathBuf>, RemError> {
        let Some(out_dir) = &self.config.out_dir else {
            return Ok(Vec::new());
        };
        fs::create_dir_all(out_dir)?;

        let stem = dem
            .source_path
            .as_deref()
            .and_then(Path::file_stem)
            .and_then(OsStr::to_str)
            .unwrap_or("dem");

        let mut guard = writer::OutputGuard::new();

        writer::write_rem_geotiff(&guard.track(out_dir.join(format!("{stem}_rem.tif"))), rem, dem)?;

        for format in &self.config.render.output_formats {
            match format {
                OutputFormat::ImageRaster => {
                    writer::write_viz_geotiff(
                        &guard.track(out_dir.join(format!("{stem}_viz.tif"))),
                        image,
                        dem,
                    )?;
                    writer::write_png(
                        &guard.track(out_dir.join(format!("{stem}_viz.png"))),
                        image,
                    )?;
                    writer::write_world_file(
                        &guard.track(out_dir.join(format!("{stem}_viz.pgw"))),
                        &dem.transform,
                    )?;
                }
                OutputFormat::GroundOverlayArchive => {
                    let bounds = writer::wgs84_bounds(dem)?;
                    writer::write_kmz(
                        &guard.track(out_dir.join(format!("{stem}_overlay.kmz"))),
                        image,
                        bounds,
                        stem,
                    )?;
                }
            }
        }

        // a cancel that landed while files were being written discards them all
        if self.cancel.is_cancelled() {
            return Err(RemError::Cancelled);
        }

        Ok(guard.commit())
    }
}
