//! Line-aligned splitting of the input into worker ranges.
//!
//! A probe at `file_size * i / n` almost always lands inside a line; it is
//! pushed forward to the next line start so that no record straddles two
//! workers. The resulting ranges are contiguous, never overlap, and cover
//! `[0, file_size)` exactly. Empty ranges are legal and produce no-op workers.

use crate::{Error, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Half-open byte span `[start, end)` of the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub const fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub const fn len(&self) -> u64 {
        self.end - self.start
    }

    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Finds line starts in the input.
pub trait LineSeek {
    /// Returns `offset` if it already starts a line, otherwise the offset just
    /// past the next `\n`, or the input length if there is none.
    fn next_line_start(&mut self, offset: u64) -> Result<u64>;
}

/// [`LineSeek`] over an in-memory buffer.
#[derive(Clone, Copy, Debug)]
pub struct SliceLineSeeker<'a>(pub &'a [u8]);

impl LineSeek for SliceLineSeeker<'_> {
    fn next_line_start(&mut self, offset: u64) -> Result<u64> {
        let data = self.0;
        let offset = (offset as usize).min(data.len());
        if offset == 0 || data[offset - 1] == b'\n' {
            return Ok(offset as u64);
        }
        Ok(match memchr::memchr(b'\n', &data[offset..]) {
            Some(nl) => (offset + nl + 1) as u64,
            None => data.len() as u64,
        })
    }
}

/// [`LineSeek`] over a file, reading small windows around each probe.
pub struct FileLineSeeker {
    file: File,
    len: u64,
    window: Vec<u8>,
}

impl FileLineSeeker {
    const WINDOW: usize = 64 * 1024;

    pub fn open(path: &Path) -> Result<Self> {
        let file =
            File::open(path).map_err(|e| Error::io(format!("opening {}", path.display()), e))?;
        let len = file
            .metadata()
            .map_err(|e| Error::io(format!("stat {}", path.display()), e))?
            .len();
        Ok(Self {
            file,
            len,
            window: vec![0; Self::WINDOW],
        })
    }

    pub const fn len(&self) -> u64 {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl LineSeek for FileLineSeeker {
    fn next_line_start(&mut self, offset: u64) -> Result<u64> {
        if offset == 0 {
            return Ok(0);
        }
        if offset >= self.len {
            return Ok(self.len);
        }

        // Start one byte early: if that byte is `\n`, `offset` is a line start.
        let mut pos = offset - 1;
        self.file
            .seek(SeekFrom::Start(pos))
            .map_err(|e| Error::io(format!("seeking to {pos}"), e))?;
        loop {
            let n = self
                .file
                .read(&mut self.window)
                .map_err(|e| Error::io(format!("reading at {pos}"), e))?;
            if n == 0 {
                return Ok(self.len);
            }
            if let Some(nl) = memchr::memchr(b'\n', &self.window[..n]) {
                return Ok(pos + nl as u64 + 1);
            }
            pos += n as u64;
        }
    }
}

/// Splits `[0, file_size)` into `worker_count` line-aligned ranges.
pub fn split_line_aligned(
    file_size: u64,
    worker_count: usize,
    seek: &mut impl LineSeek,
) -> Result<Vec<ByteRange>> {
    if worker_count == 0 {
        return Err(Error::config("worker count must be greater than 0"));
    }

    let mut edges = Vec::with_capacity(worker_count + 1);
    edges.push(0);
    for i in 1..worker_count {
        let probe = (u128::from(file_size) * i as u128 / worker_count as u128) as u64;
        let prev = edges.last().copied().unwrap_or(0);
        let edge = seek.next_line_start(probe)?.clamp(prev, file_size);
        edges.push(edge);
    }
    edges.push(file_size);

    let ranges: Vec<_> = edges
        .windows(2)
        .map(|w| ByteRange::new(w[0], w[1]))
        .collect();

    #[cfg(feature = "tracing")]
    tracing::debug!("Partitioned {file_size} bytes into {:?}", ranges);

    Ok(ranges)
}
