//! Binary frames carrying a worker's partial grid to the coordinator.
//!
//! ```text
//! | "VGRD" | records: u64 | cells: u64 | cells × u32 |
//! ```
//!
//! All integers are little-endian. Cells are in `slug * dates + date` order,
//! so the coordinator merges by position alone. A frame whose length or cell
//! count disagrees with the expected grid shape is rejected rather than merged
//! as zeros.

use crate::grid::CountGrid;
use crate::{Error, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

const MAGIC: &[u8; 4] = b"VGRD";
const HEADER_LEN: usize = 4 + 8 + 8;
const CELL_SIZE: usize = core::mem::size_of::<u32>();

/// A worker's contribution: its partial grid and how many records built it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerOutput {
    pub records: u64,
    pub grid: CountGrid,
}

pub struct TransferFrame;

impl TransferFrame {
    pub fn encode(output: &WorkerOutput) -> Bytes {
        let cells = output.grid.cells();
        let mut buf = BytesMut::with_capacity(HEADER_LEN + cells.len() * CELL_SIZE);
        buf.put_slice(MAGIC);
        buf.put_u64_le(output.records);
        buf.put_u64_le(cells.len() as u64);
        for &cell in cells {
            buf.put_u32_le(cell);
        }
        buf.freeze()
    }

    /// Decodes a frame from `worker` that must hold exactly `slugs * dates`
    /// cells.
    pub fn decode(worker: usize, frame: &[u8], slugs: usize, dates: usize) -> Result<WorkerOutput> {
        let fail = |reason: String| Error::Transfer { worker, reason };

        if frame.len() < HEADER_LEN {
            return Err(fail(format!(
                "frame of {} bytes is shorter than its header",
                frame.len()
            )));
        }
        let mut buf = frame;
        if &buf[..MAGIC.len()] != MAGIC {
            return Err(fail("bad frame magic".to_owned()));
        }
        buf.advance(MAGIC.len());
        let records = buf.get_u64_le();
        let cells = buf.get_u64_le();

        let expected = slugs * dates;
        if cells != expected as u64 {
            return Err(fail(format!(
                "frame holds {cells} cells, expected {expected}"
            )));
        }
        if buf.remaining() != expected * CELL_SIZE {
            return Err(fail(format!(
                "frame payload is {} bytes, expected {}",
                buf.remaining(),
                expected * CELL_SIZE
            )));
        }

        let mut out = Vec::with_capacity(expected);
        while buf.has_remaining() {
            out.push(buf.get_u32_le());
        }

        Ok(WorkerOutput {
            records,
            grid: CountGrid::from_cells(slugs, dates, out),
        })
    }
}
