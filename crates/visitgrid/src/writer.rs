//! Streaming JSON output.
//!
//! The document is produced slug by slug into a reusable string buffer that is
//! handed to the sink whenever it grows past the flush threshold. Flushes only
//! happen between slug entries, so the sink never sees half a token. Dates come
//! out sorted because date ids are chronological; slugs come out in catalog
//! order. Nothing is sorted here.
//!
//! ```text
//! {
//!     "\/blog\/foo": {
//!         "2024-03-01": 2
//!     },
//!     "\/blog\/bar": {
//!         "2024-03-02": 1
//!     }
//! }
//! ```

use crate::calendar::CalendarIndex;
use crate::catalog::SlugCatalog;
use crate::grid::CountGrid;
use crate::{Error, Result};
use core::fmt::Write as _;
use std::io::Write;

#[derive(Clone, Debug)]
pub struct WriterOptions {
    /// Prepended to every slug before escaping.
    pub key_prefix: String,
    /// Buffered bytes that trigger a write to the sink.
    pub flush_threshold: usize,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            key_prefix: "/blog/".to_owned(),
            flush_threshold: 64 * 1024,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub slugs_written: usize,
    pub cells_written: u64,
    pub bytes_written: u64,
}

/// Escapes `raw` as a JSON string literal, including quotes, with `/`
/// written as `\/`.
pub fn escape_key(raw: &str) -> Result<String> {
    // serde_json never emits `/` inside an escape sequence, so a plain
    // replacement afterwards is safe.
    let quoted = serde_json::to_string(raw)
        .map_err(|e| Error::io(format!("escaping key {raw:?}"), e.into()))?;
    Ok(quoted.replace('/', "\\/"))
}

pub struct JsonGridWriter<W: Write> {
    out: W,
    opts: WriterOptions,
    buf: String,
    stats: WriteStats,
}

impl<W: Write> JsonGridWriter<W> {
    pub fn new(out: W, opts: WriterOptions) -> Self {
        Self {
            buf: String::with_capacity(opts.flush_threshold + 4096),
            out,
            opts,
            stats: WriteStats::default(),
        }
    }

    /// Writes the whole document and flushes the sink.
    pub fn write(
        mut self,
        grid: &CountGrid,
        catalog: &SlugCatalog,
        calendar: &CalendarIndex,
    ) -> Result<WriteStats> {
        debug_assert_eq!(grid.slugs(), catalog.len());
        debug_assert_eq!(grid.dates(), calendar.len());

        let date_prefixes: Vec<String> = calendar
            .iter_labels()
            .map(|(_, label)| format!("        \"{label}\": "))
            .collect();

        let mut raw = String::new();
        let slug_prefixes = catalog
            .iter()
            .map(|(_, slug)| {
                raw.clear();
                raw.push_str(&self.opts.key_prefix);
                raw.push_str(slug);
                escape_key(&raw).map(|key| format!("\n    {key}: {{\n"))
            })
            .collect::<Result<Vec<String>>>()?;

        self.buf.push('{');
        let mut first_slug = true;

        for (slug_id, _) in catalog.iter() {
            let row = grid.row(slug_id);
            if row.iter().all(|&n| n == 0) {
                continue;
            }

            if !first_slug {
                self.buf.push(',');
            }
            first_slug = false;

            self.buf.push_str(&slug_prefixes[slug_id.index()]);

            let mut sep = "";
            for (date, &n) in row.iter().enumerate() {
                if n == 0 {
                    continue;
                }
                self.buf.push_str(sep);
                self.buf.push_str(&date_prefixes[date]);
                // Writing into a `String` cannot fail.
                let _ = write!(self.buf, "{n}");
                sep = ",\n";
                self.stats.cells_written += 1;
            }
            self.buf.push_str("\n    }");
            self.stats.slugs_written += 1;

            if self.buf.len() > self.opts.flush_threshold {
                self.flush_buf()?;
            }
        }

        self.buf.push_str("\n}");
        self.flush_buf()?;
        self.out
            .flush()
            .map_err(|e| Error::io("flushing output", e))?;

        Ok(self.stats)
    }

    fn flush_buf(&mut self) -> Result<()> {
        self.out
            .write_all(self.buf.as_bytes())
            .map_err(|e| Error::io("writing output", e))?;
        self.stats.bytes_written += self.buf.len() as u64;
        self.buf.clear();
        Ok(())
    }
}
