//! Scatter-gather over worker threads.
//!
//! One scoped OS thread is spawned per [`ByteRange`]. Each worker borrows the
//! shared [`Tables`] immutably, owns its range and partial grid, and reports a
//! single encoded [`TransferFrame`] over a channel. The coordinator merges only
//! after every thread has been joined, so the final grid is touched by exactly
//! one thread and needs no locking.
//!
//! A failing worker raises a shared abort flag so its siblings stop at their
//! next block. The run then fails with the first real error; no partial
//! contribution is ever merged as zeros.

use crate::grid::CountGrid;
use crate::partition::ByteRange;
use crate::transfer::{TransferFrame, WorkerOutput};
use crate::worker::{Tables, WorkerOptions, process_range};
use crate::{Error, Result};
use bytes::Bytes;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// The merged result of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Aggregate {
    pub grid: CountGrid,
    /// Records parsed across all workers.
    pub records: u64,
    /// Size of the input the ranges were cut from.
    pub file_size: u64,
}

pub struct Coordinator<'a> {
    input: &'a Path,
    file_size: u64,
    tables: &'a Tables,
    opts: WorkerOptions,
}

impl<'a> Coordinator<'a> {
    pub const fn new(
        input: &'a Path,
        file_size: u64,
        tables: &'a Tables,
        opts: WorkerOptions,
    ) -> Self {
        Self {
            input,
            file_size,
            tables,
            opts,
        }
    }

    /// Runs one worker per range and merges their frames.
    pub fn run(&self, ranges: &[ByteRange]) -> Result<Aggregate> {
        let frames = scatter(ranges, |worker, range, abort| {
            process_range(
                worker,
                self.input,
                range,
                self.file_size,
                self.tables,
                &self.opts,
                abort,
            )
        })?;
        self.gather(&frames)
    }

    /// Decodes and sums every frame. Addition commutes, so frame order does
    /// not affect the result.
    fn gather(&self, frames: &[Bytes]) -> Result<Aggregate> {
        let slugs = self.tables.catalog.len();
        let dates = self.tables.calendar.len();
        let mut grid = CountGrid::zeroed(slugs, dates);
        let mut records = 0_u64;

        for (worker, frame) in frames.iter().enumerate() {
            let output = TransferFrame::decode(worker, frame, slugs, dates)?;
            grid.merge(output.grid.cells())?;
            records += output.records;
        }

        Ok(Aggregate {
            grid,
            records,
            file_size: self.file_size,
        })
    }
}

/// Runs `body` for every range on its own named scoped thread and blocks
/// until every thread has been joined.
fn scatter<F>(ranges: &[ByteRange], body: F) -> Result<Vec<Bytes>>
where
    F: Fn(usize, ByteRange, &AtomicBool) -> Result<WorkerOutput> + Sync,
{
    let abort = AtomicBool::new(false);
    let (tx, rx) = crossbeam_channel::bounded::<(usize, Result<Bytes>)>(ranges.len());

    let (results, panicked) = thread::scope(|scope| {
        let body = &body;
        let abort = &abort;
        let handles: Vec<_> = ranges
            .iter()
            .enumerate()
            .map(|(worker, &range)| {
                let tx = tx.clone();
                thread::Builder::new()
                    .name(format!("visitgrid-worker-{worker}"))
                    .spawn_scoped(scope, move || {
                        let result = body(worker, range, abort)
                            .map(|output| TransferFrame::encode(&output));
                        if result.is_err() {
                            abort.store(true, Ordering::Relaxed);
                        }
                        // The receiver outlives the scope, so this cannot fail.
                        let _ = tx.send((worker, result));
                    })
                    .map_err(|e| {
                        abort.store(true, Ordering::Relaxed);
                        Error::io(format!("spawning worker {worker}"), e)
                    })
            })
            .collect();
        drop(tx);

        let mut panicked = None;
        let mut spawn_error = None;
        for (worker, handle) in handles.into_iter().enumerate() {
            match handle {
                Ok(handle) => {
                    if handle.join().is_err() {
                        abort.store(true, Ordering::Relaxed);
                        panicked.get_or_insert(worker);
                    }
                }
                Err(e) => {
                    spawn_error.get_or_insert(e);
                }
            }
        }

        let results: Vec<_> = rx.try_iter().collect();
        (spawn_error.map_or(Ok(results), Err), panicked)
    });

    if let Some(worker) = panicked {
        return Err(Error::WorkerPanicked { worker });
    }
    collect_frames(ranges.len(), results?)
}

/// Orders reported frames by worker. Fails with the first error that is not a
/// cancellation, or if any worker never reported.
fn collect_frames(workers: usize, results: Vec<(usize, Result<Bytes>)>) -> Result<Vec<Bytes>> {
    let mut frames: Vec<Option<Bytes>> = vec![None; workers];
    let mut first_error: Option<Error> = None;
    for (worker, result) in results {
        match result {
            Ok(frame) => frames[worker] = Some(frame),
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::error!("Worker {worker} failed: {e}");
                let replace = first_error
                    .as_ref()
                    .is_none_or(|prev| prev.is_cancellation() && !e.is_cancellation());
                if replace {
                    first_error = Some(e);
                }
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }

    frames
        .into_iter()
        .enumerate()
        .map(|(worker, frame)| {
            frame.ok_or_else(|| Error::Transfer {
                worker,
                reason: "worker exited without reporting".to_owned(),
            })
        })
        .collect()
}
