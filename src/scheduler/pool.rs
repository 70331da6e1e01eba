use crate::core::dem::DemRaster;
use crate::core::raster::Raster;
use crate::error::RemError;
use crate::progress::Progress;
use crate::sampler::WaterSurfaceSampler;
use crate::scheduler::ChunkWindow;
use crossbeam_channel::{bounded, select};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

struct ChunkResult {
    window: ChunkWindow,
    data: Vec<f32>,
}

// Dispatches chunk windows to a bounded worker pool and merges the results
// into one surface raster. Each result lands in its own disjoint row window,
// so worker count and completion order never change a pixel.
pub fn sample_chunks(
    dem: &DemRaster,
    sampler: WaterSurfaceSampler<'_>,
    chunks: &[ChunkWindow],
    workers: usize,
    cancel: &CancelToken,
    progress: &Progress<'_>,
) -> Result<Raster, RemError> {
    let mut surface = Raster::filled(dem.width(), dem.height(), f32::NAN);
    if chunks.is_empty() {
        return Ok(surface);
    }
    if cancel.is_cancelled() {
        return Err(RemError::Cancelled);
    }

    let workers = workers.min(chunks.len()).max(1);
    let total = chunks.len();

    // Rendezvous task channel: a chunk is handed over only when a worker is
    // free, so nothing new starts once dispatching stops.
    let (task_tx, task_rx) = bounded::<ChunkWindow>(0);
    let (result_tx, result_rx) = bounded::<ChunkResult>(workers);

    let mut cancelled = false;

    thread::scope(|scope| {
        for _ in 0..workers {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                while let Ok(window) = task_rx.recv() {
                    let data = sampler.sample_rows(dem, window.row_off, window.rows);
                    if result_tx.send(ChunkResult { window, data }).is_err() {
                        break;
                    }
                }
            });
        }
        drop(task_rx);
        drop(result_tx);

        let mut pending = chunks.iter().copied();
        let mut next = pending.next();
        let mut task_tx = Some(task_tx);
        let mut dispatched = 0usize;
        let mut completed = 0usize;

        while next.is_some() || completed < dispatched {
            if !cancelled && cancel.is_cancelled() {
                cancelled = true;
                next = None;
                task_tx = None;
            }

            let mut close_tasks = false;
            if let (Some(tx), Some(window)) = (task_tx.as_ref(), next) {
                select! {
                    send(tx, window) -> sent => {
                        if sent.is_ok() {
                            dispatched += 1;
                            next = pending.next();
                        } else {
                            next = None;
                        }
                        close_tasks = next.is_none();
                    }
                    recv(result_rx) -> result => {
                        if let Ok(result) = result {
                            merge(&mut surface, &result);
                            completed += 1;
                            progress.update(completed as f64 / total as f64);
                        }
                    }
                }
            } else {
                match result_rx.recv() {
                    Ok(result) => {
                        completed += 1;
                        // results that finish after cancellation are discarded
                        if !cancelled {
                            merge(&mut surface, &result);
                            progress.update(completed as f64 / total as f64);
                        }
                    }
                    Err(_) => break,
                }
            }
            if close_tasks {
                task_tx = None;
            }
        }
    });

    if cancelled {
        Err(RemError::Cancelled)
    } else {
        Ok(surface)
    }
}

fn merge(surface: &mut Raster, result: &ChunkResult) {
    let width = surface.width();
    let start = result.window.row_off * width;
    surface.data_mut()[start..start + result.data.len()].copy_from_slice(&result.data);
}
