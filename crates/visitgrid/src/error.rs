//! Error types for the aggregation engine.
//!
//! Every failure in `visitgrid` is fatal for the run. Nothing is retried and
//! nothing is skipped: a malformed line, an unknown slug, or a worker that
//! dies without reporting would otherwise corrupt the aggregate silently. Each
//! variant carries the offset, worker index, or path needed to diagnose it.
//!
//! ## Error Cases
//! - `InvalidConfig`: a tunable or collaborator input is out of range.
//! - `InvalidYearRange`: the calendar was asked for an empty year span.
//! - `Io`: a path could not be opened, read, written, or renamed.
//! - `MalformedRecord`: a line does not match the fixed record layout.
//! - `UnknownSlug` / `UnknownDate`: a framed line refers to an id the lookup
//!   tables never assigned.
//! - `Transfer`: a worker's result frame is missing, truncated, or corrupt.
//! - `WorkerPanicked`: a worker thread unwound instead of reporting.
//! - `Cancelled`: a worker stopped early because a sibling failed.
//! - `CountOverflow`: merging pushed a cell past `u32::MAX`.

use std::io;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the aggregation engine.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A configuration value or collaborator input was rejected.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// `year_start` is after `year_end`.
    #[error("Invalid year range: {start} > {end}")]
    InvalidYearRange { start: u16, end: u16 },

    /// Underlying filesystem failure.
    #[error("I/O error ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// A line at `offset` does not fit the record layout.
    #[error("Malformed record at byte {offset}: {reason}")]
    MalformedRecord { offset: u64, reason: &'static str },

    /// The slug at `offset` was never assigned an id by the catalog.
    #[error("Unknown slug {slug:?} at byte {offset}")]
    UnknownSlug { offset: u64, slug: String },

    /// The date key at `offset` is outside the configured calendar.
    #[error("Unknown date {date:?} at byte {offset}")]
    UnknownDate { offset: u64, date: String },

    /// A worker's result frame could not be used.
    #[error("Transfer from worker {worker} failed: {reason}")]
    Transfer { worker: usize, reason: String },

    /// A worker thread panicked.
    #[error("Worker {worker} terminated abnormally")]
    WorkerPanicked { worker: usize },

    /// A worker observed the abort flag and stopped.
    #[error("Worker {worker} cancelled after a sibling failure")]
    Cancelled { worker: usize },

    /// Summation overflowed a grid cell.
    #[error("Count overflow in grid cell {cell}")]
    CountOverflow { cell: usize },
}

impl Error {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors that only signal a sibling's failure.
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
