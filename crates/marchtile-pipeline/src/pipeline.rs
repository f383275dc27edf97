//! Phase orchestration: a fixed worker pool stepping through
//! RESCALE -> SAMPLE -> MARCH in lockstep.
//!
//! ```rust
//! # use marchtile_pipeline::{PipelineConfig, PipelineError, RasterBuffer, TilePalette};
//! # fn run() -> Result<(), PipelineError> {
//! let source = RasterBuffer::filled(64, 48, [255, 255, 255])?;
//! let palette = TilePalette::solid(8, |k| [k as u8 * 16, 0, 0]);
//! let config = PipelineConfig {
//!     workers: 4,
//!     ..PipelineConfig::default()
//! };
//! let (output, diagnostics) = marchtile_pipeline::process_with_diagnostics(source, &palette, &config)?;
//! assert_eq!(output.dimensions(), diagnostics.normalized);
//! # Ok(())
//! # }
//! ```
//!
//! `P` workers are spawned once per run. Each one walks the three phases
//! on its own [`Partition`] of the phase's row domain and waits at a
//! [`Barrier`] after RESCALE and after SAMPLE, so no worker reads the
//! normalized raster before it is complete, and no worker reads the grid
//! before every point has been sampled.
//!
//! Workers render their partition into a private strip and commit it
//! with one copy under the buffer's lock. Partitions are disjoint, so the
//! lock only orders copies of unrelated rows.
//!
//! A worker that fails keeps arriving at the barriers (doing no further
//! work) so the rest of the pool can drain. Once every worker has been
//! joined, the lowest worker's error is returned, except that a poisoned
//! lock never hides the panic that poisoned it.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Barrier, RwLock, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::diagnostics::{GridSummary, PhaseDiagnostics, RunDiagnostics};
use crate::grid::{ClassificationGrid, GridShape, sample_rows};
use crate::palette::TilePalette;
use crate::partition::Partition;
use crate::raster::RasterBuffer;
use crate::resample::{needs_resample, resample_rows};
use crate::stitch::{configuration_histogram, stitch_rows};
use crate::types::{Dimensions, PipelineConfig, PipelineError};

/// The phases of a run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Downscale the source into the normalized raster.
    Rescale,
    /// Classify grid sample points.
    Sample,
    /// Stamp a tile per grid cell.
    March,
    /// Every worker finished MARCH.
    Done,
}

impl Phase {
    /// The three phases that do work.
    pub const WORKING: [Self; 3] = [Self::Rescale, Self::Sample, Self::March];

    /// The phase that follows this one. `Done` is terminal.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Rescale => Self::Sample,
            Self::Sample => Self::March,
            Self::March | Self::Done => Self::Done,
        }
    }

    /// Whether all workers meet at the barrier after this phase.
    #[must_use]
    pub const fn ends_with_barrier(self) -> bool {
        matches!(self, Self::Rescale | Self::Sample)
    }

    const fn slot(self) -> usize {
        match self {
            Self::Rescale => 0,
            Self::Sample => 1,
            Self::March | Self::Done => 2,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rescale => f.write_str("rescale"),
            Self::Sample => f.write_str("sample"),
            Self::March => f.write_str("march"),
            Self::Done => f.write_str("done"),
        }
    }
}

/// Run the pipeline on `source`, returning the annotated raster and
/// diagnostics.
///
/// # Errors
///
/// Returns [`PipelineError::Configuration`] for an invalid config or a
/// palette whose tiles are not `step x step`,
/// [`PipelineError::Allocation`] if the normalized raster, the grid or a
/// worker strip cannot be allocated, and [`PipelineError::Thread`] if a
/// worker cannot be spawned or panics.
pub fn run(
    source: RasterBuffer,
    palette: &TilePalette,
    config: &PipelineConfig,
) -> Result<(RasterBuffer, RunDiagnostics), PipelineError> {
    config.validate()?;
    palette.ensure_tile_size(config.step)?;

    let started = Instant::now();
    let source_dims = source.dimensions();
    let resampled = needs_resample(source_dims, config.target());

    let (source, normalized) = if resampled {
        info!(
            source_width = source_dims.width,
            source_height = source_dims.height,
            target_width = config.target_width,
            target_height = config.target_height,
            "downscaling source to working resolution",
        );
        let target = RasterBuffer::try_new(config.target_width, config.target_height)?;
        (Some(source), target)
    } else {
        info!(
            width = source_dims.width,
            height = source_dims.height,
            "source within working resolution, skipping resample",
        );
        (None, source)
    };

    let normalized_dims = normalized.dimensions();
    let shape = GridShape::for_raster(normalized_dims, config.step);
    let grid = ClassificationGrid::try_new(shape)?;

    let shared = Shared {
        config,
        palette,
        source: source.as_ref(),
        normalized_dims,
        shape,
        normalized: RwLock::new(normalized),
        grid: RwLock::new(grid),
        barrier: Barrier::new(config.workers),
        failed: AtomicBool::new(false),
    };

    let reports = run_pool(&shared, config.workers)?;
    let phases = Phase::WORKING.map(|phase| shared.phase_diagnostics(phase, &reports));

    let Shared {
        normalized, grid, ..
    } = shared;
    let output = normalized
        .into_inner()
        .map_err(|_| poisoned("normalized raster"))?;
    let grid = grid.into_inner().map_err(|_| poisoned("classification grid"))?;

    let [rescale, sample, march] = phases;
    let diagnostics = RunDiagnostics {
        workers: config.workers,
        source: source_dims,
        normalized: normalized_dims,
        resampled,
        rescale,
        sample,
        march,
        total_duration: started.elapsed(),
        summary: GridSummary {
            rows: shape.rows,
            cols: shape.cols,
            dark_points: grid.dark_points(),
            tiles_stamped: shape.rows * shape.cols,
            configuration_histogram: configuration_histogram(&grid),
        },
    };

    info!(
        workers = config.workers,
        rows = shape.rows,
        cols = shape.cols,
        elapsed_ms = diagnostics.total_duration.as_secs_f64() * 1000.0,
        "contour tiles stamped",
    );

    Ok((output, diagnostics))
}

/// State shared by every worker for the duration of a run.
struct Shared<'a> {
    config: &'a PipelineConfig,
    palette: &'a TilePalette,
    /// `Some` only when the source is being downscaled.
    source: Option<&'a RasterBuffer>,
    normalized_dims: Dimensions,
    shape: GridShape,
    normalized: RwLock<RasterBuffer>,
    grid: RwLock<ClassificationGrid>,
    barrier: Barrier,
    failed: AtomicBool,
}

/// Busy time of one worker per working phase.
#[derive(Debug, Default, Clone, Copy)]
struct WorkerReport {
    busy: [Duration; 3],
}

impl Shared<'_> {
    /// Rows partitioned during `phase`.
    fn domain(&self, phase: Phase) -> usize {
        match phase {
            Phase::Rescale if self.source.is_some() => self.normalized_dims.height as usize,
            Phase::Rescale | Phase::Done => 0,
            Phase::Sample => self.shape.point_rows(),
            Phase::March => self.shape.rows,
        }
    }

    fn execute(&self, phase: Phase, part: Partition) -> Result<(), PipelineError> {
        if part.is_empty() {
            return Ok(());
        }
        let step = self.config.step;
        match phase {
            Phase::Rescale => {
                let Some(source) = self.source else {
                    return Ok(());
                };
                let strip = resample_rows(source, self.normalized_dims, part.rows())?;
                self.normalized
                    .write()
                    .map_err(|_| poisoned("normalized raster"))?
                    .commit_strip(&strip);
            }
            Phase::Sample => {
                let points = {
                    let normalized = self
                        .normalized
                        .read()
                        .map_err(|_| poisoned("normalized raster"))?;
                    sample_rows(
                        &normalized,
                        self.shape,
                        step,
                        self.config.threshold,
                        part.rows(),
                    )?
                };
                self.grid
                    .write()
                    .map_err(|_| poisoned("classification grid"))?
                    .commit_rows(part.start, &points);
            }
            Phase::March => {
                let strip = {
                    let grid = self
                        .grid
                        .read()
                        .map_err(|_| poisoned("classification grid"))?;
                    stitch_rows(&grid, self.palette, step, part.rows())?
                };
                self.normalized
                    .write()
                    .map_err(|_| poisoned("normalized raster"))?
                    .commit_strip(&strip);
            }
            Phase::Done => {}
        }
        Ok(())
    }

    fn phase_diagnostics(&self, phase: Phase, reports: &[WorkerReport]) -> PhaseDiagnostics {
        let domain_rows = self.domain(phase);
        PhaseDiagnostics {
            duration: reports
                .iter()
                .map(|r| r.busy[phase.slot()])
                .max()
                .unwrap_or_default(),
            domain_rows,
            busy_workers: Partition::all(self.config.workers, domain_rows)
                .filter(|p| !p.is_empty())
                .count(),
        }
    }
}

/// Spawn the pool, release it once every worker exists, and join it.
fn run_pool(shared: &Shared<'_>, workers: usize) -> Result<Vec<WorkerReport>, PipelineError> {
    thread::scope(|scope| {
        let mut gates = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for id in 0..workers {
            let (gate, wait) = mpsc::channel::<()>();
            let spawned = thread::Builder::new()
                .name(format!("marchtile-{id}"))
                .spawn_scoped(scope, move || worker(shared, id, &wait));
            match spawned {
                Ok(handle) => {
                    gates.push(gate);
                    handles.push(handle);
                }
                Err(e) => {
                    // Closing the gates lets the workers already spawned
                    // exit before they reach the barrier.
                    drop(gates);
                    for handle in handles {
                        handle.join().ok();
                    }
                    return Err(PipelineError::Thread(format!(
                        "failed to spawn worker {id}: {e}"
                    )));
                }
            }
        }

        for gate in &gates {
            gate.send(()).ok();
        }

        let mut reports = Vec::with_capacity(workers);
        let mut first_error = None;
        for (id, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(e)) => first_error = Some(root_cause(first_error.take(), e)),
                Err(payload) => {
                    let e = PipelineError::Thread(format!(
                        "worker {id} panicked: {}",
                        panic_message(payload.as_ref()),
                    ));
                    first_error = Some(root_cause(first_error.take(), e));
                }
            }
        }
        first_error.map_or(Ok(reports), Err)
    })
}

/// Body of worker `id`.
fn worker(
    shared: &Shared<'_>,
    id: usize,
    gate: &mpsc::Receiver<()>,
) -> Result<WorkerReport, PipelineError> {
    if gate.recv().is_err() {
        return Ok(WorkerReport::default());
    }

    let workers = shared.config.workers;
    let mut report = WorkerReport::default();
    let mut failure = None;
    let mut phase = Phase::Rescale;

    while phase != Phase::Done {
        let part = Partition::new(id, workers, shared.domain(phase));
        debug!(worker = id, %phase, start = part.start, end = part.end, "partition");

        if failure.is_none() && !shared.failed.load(Ordering::Acquire) {
            let started = Instant::now();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| shared.execute(phase, part)))
                .unwrap_or_else(|payload| {
                    Err(PipelineError::Thread(format!(
                        "worker {id} panicked during {phase}: {}",
                        panic_message(payload.as_ref()),
                    )))
                });
            report.busy[phase.slot()] = started.elapsed();
            if let Err(e) = outcome {
                shared.failed.store(true, Ordering::Release);
                failure = Some(e);
            }
        }

        if phase.ends_with_barrier() {
            shared.barrier.wait();
        }
        phase = phase.next();
    }

    failure.map_or(Ok(report), Err)
}

const POISONED: &str = "lock poisoned by a panicking worker";

fn poisoned(what: &str) -> PipelineError {
    PipelineError::Thread(format!("{what} {POISONED}"))
}

fn is_poisoned(error: &PipelineError) -> bool {
    matches!(error, PipelineError::Thread(msg) if msg.ends_with(POISONED))
}

/// The error to report given the one kept so far and a newly joined one.
///
/// A poisoned lock is only ever a consequence of another worker's panic,
/// so the panic replaces it regardless of worker order.
fn root_cause(current: Option<PipelineError>, next: PipelineError) -> PipelineError {
    match current {
        Some(current) if !is_poisoned(&current) || is_poisoned(&next) => current,
        _ => next,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}
