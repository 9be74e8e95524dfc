//! Dense, chronologically ordered date ids.
//!
//! [`CalendarIndex`] enumerates every day of a bounded year span once, before
//! any parsing starts. Ids ascend with calendar order, so any structure
//! indexed by [`DateId`] is already sorted by date.
//!
//! February uses the simplified leap test `year % 4 == 0`. It only matches the
//! Gregorian calendar inside a span that contains no year divisible by 100 but
//! not by 400 (1900, 2100, ...). Such spans are accepted but logged.

use crate::{Error, Result};
use rustc_hash::FxHashMap;

/// Length of a full `YYYY-MM-DD` label.
pub const DATE_LABEL_LEN: usize = 10;

/// Dense identifier of one calendar day inside a [`CalendarIndex`].
///
/// Stored as two bytes in per-slug runs, so a calendar holds at most
/// `u16::MAX + 1` days.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateId(u16);

impl DateId {
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn to_raw(self) -> u16 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Bijective `date key <-> id <-> label` tables for a year span.
#[derive(Clone, Debug)]
pub struct CalendarIndex {
    year_start: u16,
    year_end: u16,
    key_len: usize,
    ids: FxHashMap<Box<[u8]>, DateId>,
    labels: Vec<String>,
}

impl CalendarIndex {
    /// Builds the index for `[year_start, year_end]`.
    ///
    /// Lookup keys are the trailing `key_len` bytes of each `YYYY-MM-DD`
    /// label, so `key_len == 8` matches two-digit-year logs.
    pub fn build(year_start: u16, year_end: u16, key_len: usize) -> Result<Self> {
        if year_start > year_end {
            return Err(Error::InvalidYearRange {
                start: year_start,
                end: year_end,
            });
        }
        if !(8..=DATE_LABEL_LEN).contains(&key_len) {
            return Err(Error::config(format!(
                "date key length must be within 8..={DATE_LABEL_LEN}, got {key_len}"
            )));
        }
        if year_end > 9999 {
            return Err(Error::config(format!(
                "year {year_end} does not fit a four-digit label"
            )));
        }

        #[cfg(feature = "tracing")]
        if (year_start..=year_end).any(|y| y % 100 == 0 && y % 400 != 0) {
            tracing::warn!(
                "Year range {year_start}..={year_end} contains a non-leap century year; February will be miscounted"
            );
        }

        let years = usize::from(year_end - year_start) + 1;
        let mut labels = Vec::with_capacity(years * 366);
        for year in year_start..=year_end {
            for month in 1..=12 {
                for day in 1..=days_in_month(year, month) {
                    labels.push(format!("{year:04}-{month:02}-{day:02}"));
                }
            }
        }

        if labels.len() > usize::from(u16::MAX) + 1 {
            return Err(Error::config(format!(
                "{} dates exceed the two-byte date id space",
                labels.len()
            )));
        }

        let mut ids = FxHashMap::with_capacity_and_hasher(labels.len(), Default::default());
        for (raw, label) in labels.iter().enumerate() {
            let key = &label.as_bytes()[DATE_LABEL_LEN - key_len..];
            if ids
                .insert(Box::from(key), DateId(raw as u16))
                .is_some()
            {
                return Err(Error::config(format!(
                    "date key length {key_len} is ambiguous across {year_start}..={year_end}"
                )));
            }
        }

        Ok(Self {
            year_start,
            year_end,
            key_len,
            ids,
            labels,
        })
    }

    /// Resolves a date key exactly as it appears in a record.
    #[inline]
    pub fn lookup(&self, key: &[u8]) -> Option<DateId> {
        self.ids.get(key).copied()
    }

    /// Returns the `YYYY-MM-DD` label for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this index.
    pub fn label(&self, id: DateId) -> &str {
        &self.labels[id.index()]
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub const fn key_len(&self) -> usize {
        self.key_len
    }

    pub const fn years(&self) -> (u16, u16) {
        (self.year_start, self.year_end)
    }

    /// Labels in id order, which is chronological order.
    pub fn iter_labels(&self) -> impl ExactSizeIterator<Item = (DateId, &str)> {
        self.labels
            .iter()
            .enumerate()
            .map(|(raw, label)| (DateId(raw as u16), label.as_str()))
    }
}

/// Days in `month` (1-based) using the `year % 4` leap rule.
pub const fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        2 => {
            if year % 4 == 0 {
                29
            } else {
                28
            }
        }
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}
