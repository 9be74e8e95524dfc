//! End-to-end run: tables, partitions, workers, merge, and output.
//!
//! The document is written to a temporary sibling of the destination and
//! renamed into place only after it has been fully written and flushed. A
//! failed run leaves the destination untouched.

#[cfg(test)]
mod tests;

use crate::calendar::CalendarIndex;
use crate::catalog::{KnownIdentifiers, SlugCatalog};
use crate::config::AggregatorConfig;
use crate::coordinator::{Aggregate, Coordinator};
use crate::partition::{FileLineSeeker, split_line_aligned};
use crate::worker::{Tables, WorkerOptions};
use crate::writer::{JsonGridWriter, WriteStats};
use crate::{Error, Result};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
#[cfg(feature = "tracing")]
use std::time::Instant;

/// What a completed run did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub file_size: u64,
    pub workers: usize,
    pub slugs: usize,
    pub dates: usize,
    pub records: u64,
    pub write: WriteStats,
}

/// Runs the parse-aggregate-merge engine with a fixed configuration.
#[derive(Clone, Debug)]
pub struct Aggregator {
    config: AggregatorConfig,
}

impl Aggregator {
    pub const fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Builds the lookup tables and the merged grid without writing output.
    pub fn aggregate(
        &self,
        input: &Path,
        known: &(impl KnownIdentifiers + ?Sized),
    ) -> Result<(Tables, Aggregate)> {
        let cfg = &self.config;
        cfg.validate()?;

        let file_size = fs::metadata(input)
            .map_err(|e| Error::io(format!("stat {}", input.display()), e))?
            .len();

        #[cfg(feature = "tracing")]
        let phase = Instant::now();
        let calendar = CalendarIndex::build(cfg.year_start, cfg.year_end, cfg.layout.date_len)?;
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Calendar: {} dates in {}ms",
            calendar.len(),
            phase.elapsed().as_millis()
        );

        #[cfg(feature = "tracing")]
        let phase = Instant::now();
        let known = known.list_known_identifiers()?;
        let catalog = SlugCatalog::discover(input, cfg.sample_size, &cfg.layout, &known)?;
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Catalog: {} slugs in {}ms",
            catalog.len(),
            phase.elapsed().as_millis()
        );

        #[cfg(feature = "tracing")]
        let phase = Instant::now();
        let mut seeker = FileLineSeeker::open(input)?;
        let ranges = split_line_aligned(file_size, cfg.worker_count, &mut seeker)?;
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Partition: {} ranges over {file_size} bytes in {}ms",
            ranges.len(),
            phase.elapsed().as_millis()
        );

        let tables = Tables {
            calendar,
            catalog,
            layout: cfg.layout,
        };

        #[cfg(feature = "tracing")]
        let phase = Instant::now();
        let aggregate = Coordinator::new(
            input,
            file_size,
            &tables,
            WorkerOptions {
                read_buf_size: cfg.read_buf_size,
            },
        )
        .run(&ranges)?;
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Workers: {} records in {}ms",
            aggregate.records,
            phase.elapsed().as_millis()
        );

        Ok((tables, aggregate))
    }

    /// Aggregates `input` and atomically publishes the JSON document at
    /// `output`.
    pub fn run(
        &self,
        input: &Path,
        known: &(impl KnownIdentifiers + ?Sized),
        output: &Path,
    ) -> Result<RunSummary> {
        let (tables, aggregate) = self.aggregate(input, known)?;

        #[cfg(feature = "tracing")]
        let phase = Instant::now();
        let write = self.publish(output, &tables, &aggregate)?;
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Output: {} slugs, {} bytes in {}ms",
            write.slugs_written,
            write.bytes_written,
            phase.elapsed().as_millis()
        );

        Ok(RunSummary {
            file_size: aggregate.file_size,
            workers: self.config.worker_count,
            slugs: tables.catalog.len(),
            dates: tables.calendar.len(),
            records: aggregate.records,
            write,
        })
    }

    fn publish(&self, output: &Path, tables: &Tables, aggregate: &Aggregate) -> Result<WriteStats> {
        let tmp = temp_sibling(output);
        let result = self.write_to(&tmp, tables, aggregate).and_then(|stats| {
            fs::rename(&tmp, output).map_err(|e| {
                Error::io(
                    format!("renaming {} to {}", tmp.display(), output.display()),
                    e,
                )
            })?;
            Ok(stats)
        });
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }

    fn write_to(&self, path: &Path, tables: &Tables, aggregate: &Aggregate) -> Result<WriteStats> {
        let file =
            File::create(path).map_err(|e| Error::io(format!("creating {}", path.display()), e))?;
        let stats = JsonGridWriter::new(BufWriter::new(&file), self.config.writer.clone()).write(
            &aggregate.grid,
            &tables.catalog,
            &tables.calendar,
        )?;
        file.sync_all()
            .map_err(|e| Error::io(format!("syncing {}", path.display()), e))?;
        Ok(stats)
    }
}

fn temp_sibling(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "visitgrid-output".into());
    name.push(format!(".tmp-{}", std::process::id()));
    output.with_file_name(name)
}
