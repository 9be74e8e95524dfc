//! Parallel per-day visit counting over fixed-layout access logs.
//!
//! Each input line is a URL followed by a delimiter and a fixed-width
//! timestamp. The crate slices the file into line-aligned byte ranges, counts
//! `(slug, date)` pairs on one thread per range, merges the per-worker grids,
//! and streams a JSON document mapping every visited path to its daily counts.
//!
//! ```no_run
//! use std::path::Path;
//! use visitgrid::{Aggregator, AggregatorConfig, NoKnownIdentifiers};
//!
//! let summary = Aggregator::new(AggregatorConfig::default()).run(
//!     Path::new("visits.csv"),
//!     &NoKnownIdentifiers,
//!     Path::new("visits.json"),
//! )?;
//! println!("{} records", summary.records);
//! # Ok::<(), visitgrid::Error>(())
//! ```

mod calendar;
mod catalog;
mod config;
mod coordinator;
mod error;
mod grid;
mod layout;
mod partition;
mod pipeline;
mod transfer;
mod worker;
mod writer;

pub use crate::calendar::*;
pub use crate::catalog::*;
pub use crate::config::*;
pub use crate::coordinator::*;
pub use crate::error::*;
pub use crate::grid::*;
pub use crate::layout::*;
pub use crate::partition::*;
pub use crate::pipeline::*;
pub use crate::transfer::*;
pub use crate::worker::*;
pub use crate::writer::*;
