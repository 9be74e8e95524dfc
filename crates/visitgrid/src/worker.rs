//! Parse, bucket, and tally one byte range.
//!
//! A worker never touches the count grid while parsing. For every record it
//! appends the two-byte [`DateId`](crate::DateId) to a per-slug run, which is a
//! cheap sequential write. Once the range is exhausted, each run is replayed
//! into that slug's contiguous grid row. Random-access increments into the
//! `slugs × dates` grid therefore happen once per slug, over a compact buffer,
//! instead of once per line.
//!
//! All runs live in one [`Tally`] that is dropped in a single step when the
//! worker returns.

use crate::calendar::CalendarIndex;
use crate::catalog::SlugCatalog;
use crate::grid::CountGrid;
use crate::layout::RecordLayout;
use crate::partition::ByteRange;
use crate::transfer::WorkerOutput;
use crate::{Error, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Immutable lookup tables shared by every worker of a run.
#[derive(Clone, Debug)]
pub struct Tables {
    pub calendar: CalendarIndex,
    pub catalog: SlugCatalog,
    pub layout: RecordLayout,
}

impl Tables {
    /// Number of cells in a grid shaped for these tables.
    pub fn cells(&self) -> usize {
        self.catalog.len() * self.calendar.len()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct WorkerOptions {
    /// Bytes read per block. Must exceed the longest line.
    pub read_buf_size: usize,
}

/// Per-slug runs of little-endian date ids, plus the record count.
pub struct Tally<'t> {
    tables: &'t Tables,
    runs: Vec<Vec<u8>>,
    records: u64,
}

impl<'t> Tally<'t> {
    pub fn new(tables: &'t Tables) -> Self {
        Self {
            tables,
            runs: vec![Vec::new(); tables.catalog.len()],
            records: 0,
        }
    }

    pub const fn records(&self) -> u64 {
        self.records
    }

    /// Buckets one line (without `\n`) that starts at absolute `offset`.
    #[inline]
    fn push_line(&mut self, line: &[u8], offset: u64) -> Result<()> {
        let tables = self.tables;
        let (slug, date) = tables.layout.split(line).map_err(|e| e.at(offset))?;

        let Some(slug_id) = tables.catalog.id_of(slug) else {
            return Err(Error::UnknownSlug {
                offset,
                slug: String::from_utf8_lossy(slug).into_owned(),
            });
        };
        let Some(date_id) = tables.calendar.lookup(date) else {
            return Err(Error::UnknownDate {
                offset,
                date: String::from_utf8_lossy(date).into_owned(),
            });
        };

        self.runs[slug_id.index()].extend_from_slice(&date_id.to_raw().to_le_bytes());
        self.records += 1;
        Ok(())
    }

    /// Buckets every `\n`-terminated line of `block`, whose first byte sits at
    /// absolute offset `base`. Returns the number of bytes consumed; anything
    /// after the last `\n` is left for the caller to carry over.
    pub fn feed(&mut self, block: &[u8], base: u64) -> Result<usize> {
        let mut start = 0;
        for nl in memchr::memchr_iter(b'\n', block) {
            self.push_line(&block[start..nl], base + start as u64)?;
            start = nl + 1;
        }
        Ok(start)
    }

    /// Buckets the unterminated last line of the input.
    pub fn feed_final(&mut self, tail: &[u8], base: u64) -> Result<()> {
        debug_assert!(!tail.contains(&b'\n'));
        self.push_line(tail, base).map_err(|e| match e {
            Error::MalformedRecord { offset, .. } => Error::MalformedRecord {
                offset,
                reason: "truncated final record",
            },
            other => other,
        })
    }

    /// Replays every run into a zeroed grid.
    pub fn finish(self) -> WorkerOutput {
        let mut grid = CountGrid::zeroed(self.tables.catalog.len(), self.tables.calendar.len());
        for (slug, run) in self.runs.iter().enumerate() {
            if run.is_empty() {
                continue;
            }
            let row = grid.row_mut(slug);
            for id in run.chunks_exact(2) {
                row[usize::from(u16::from_le_bytes([id[0], id[1]]))] += 1;
            }
        }
        WorkerOutput {
            records: self.records,
            grid,
        }
    }
}

/// Single-threaded aggregation of an in-memory input. A trailing line without
/// `\n` is counted if it frames.
pub fn tally_bytes(data: &[u8], tables: &Tables) -> Result<WorkerOutput> {
    let mut tally = Tally::new(tables);
    let consumed = tally.feed(data, 0)?;
    if consumed < data.len() {
        tally.feed_final(&data[consumed..], consumed as u64)?;
    }
    Ok(tally.finish())
}

/// Aggregates `range` of the file at `input`.
///
/// The range is read in blocks of `opts.read_buf_size`; each block is cut at
/// its last `\n` and the remainder carried into the next read. `abort` is
/// polled once per block.
pub fn process_range(
    worker: usize,
    input: &Path,
    range: ByteRange,
    file_size: u64,
    tables: &Tables,
    opts: &WorkerOptions,
    abort: &AtomicBool,
) -> Result<WorkerOutput> {
    let mut tally = Tally::new(tables);
    if range.is_empty() {
        return Ok(tally.finish());
    }

    #[cfg(feature = "tracing")]
    let started = std::time::Instant::now();

    let mut file =
        File::open(input).map_err(|e| Error::io(format!("opening {}", input.display()), e))?;
    file.seek(SeekFrom::Start(range.start))
        .map_err(|e| Error::io(format!("seeking to {}", range.start), e))?;

    let mut buf = vec![0_u8; opts.read_buf_size];
    let mut filled = 0;
    let mut offset = range.start;
    let mut left = range.len();

    while left > 0 {
        if abort.load(Ordering::Relaxed) {
            return Err(Error::Cancelled { worker });
        }
        if filled == buf.len() {
            return Err(Error::MalformedRecord {
                offset,
                reason: "line exceeds read buffer",
            });
        }

        let want = left.min((buf.len() - filled) as u64) as usize;
        let n = file
            .read(&mut buf[filled..filled + want])
            .map_err(|e| Error::io(format!("reading at {}", offset + filled as u64), e))?;
        if n == 0 {
            return Err(Error::io(
                format!("reading at {}", offset + filled as u64),
                std::io::ErrorKind::UnexpectedEof.into(),
            ));
        }
        left -= n as u64;
        filled += n;

        let consumed = tally.feed(&buf[..filled], offset)?;
        buf.copy_within(consumed..filled, 0);
        filled -= consumed;
        offset += consumed as u64;
    }

    if filled > 0 {
        if range.end != file_size {
            return Err(Error::MalformedRecord {
                offset,
                reason: "range ends inside a line",
            });
        }
        tally.feed_final(&buf[..filled], offset)?;
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        "Worker {worker} parsed {} records from {:?} in {}ms",
        tally.records(),
        range,
        started.elapsed().as_millis()
    );

    Ok(tally.finish())
}
