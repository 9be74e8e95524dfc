//! Dense visit counts.
//!
//! One `u32` per `(slug, date)` pair, slug-major, so each slug's days form a
//! contiguous row that the writer walks in date order.

use crate::calendar::DateId;
use crate::catalog::SlugId;
use crate::{Error, Result};

/// Dense `slugs × dates` visit counts, linearised as
/// `slug * dates + date`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountGrid {
    slugs: usize,
    dates: usize,
    cells: Vec<u32>,
}

impl CountGrid {
    pub fn zeroed(slugs: usize, dates: usize) -> Self {
        Self {
            slugs,
            dates,
            cells: vec![0; slugs * dates],
        }
    }

    /// Wraps cells received from a worker. `cells.len()` must equal
    /// `slugs * dates`.
    pub(crate) fn from_cells(slugs: usize, dates: usize, cells: Vec<u32>) -> Self {
        debug_assert_eq!(cells.len(), slugs * dates);
        Self {
            slugs,
            dates,
            cells,
        }
    }

    pub const fn slugs(&self) -> usize {
        self.slugs
    }

    pub const fn dates(&self) -> usize {
        self.dates
    }

    #[inline]
    pub fn get(&self, slug: SlugId, date: DateId) -> u32 {
        self.cells[slug.index() * self.dates + date.index()]
    }

    /// The contiguous per-date counts of one slug, in date order.
    #[inline]
    pub fn row(&self, slug: SlugId) -> &[u32] {
        let base = slug.index() * self.dates;
        &self.cells[base..base + self.dates]
    }

    #[inline]
    pub(crate) fn row_mut(&mut self, slug: usize) -> &mut [u32] {
        let base = slug * self.dates;
        &mut self.cells[base..base + self.dates]
    }

    pub fn cells(&self) -> &[u32] {
        &self.cells
    }

    pub fn total(&self) -> u64 {
        self.cells.iter().map(|&c| u64::from(c)).sum()
    }

    /// Adds `other` cell by cell. Fails without partial effects on shape
    /// mismatch; on overflow the grid is left partially merged and must be
    /// discarded.
    pub fn merge(&mut self, other: &[u32]) -> Result<()> {
        if other.len() != self.cells.len() {
            return Err(Error::config(format!(
                "cannot merge {} cells into a grid of {}",
                other.len(),
                self.cells.len()
            )));
        }
        for (cell, (acc, &add)) in self.cells.iter_mut().zip(other).enumerate() {
            *acc = acc
                .checked_add(add)
                .ok_or(Error::CountOverflow { cell })?;
        }
        Ok(())
    }
}
