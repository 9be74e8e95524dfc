//! Fixed-offset record framing.
//!
//! Every record is one line:
//!
//! ```text
//! <prefix><slug><delimiter><timestamp>\n
//! |--25--|                  |----25---|
//! https://stitcher.io/blog/some-post,2024-03-01T12:34:56+00:00
//! ```
//!
//! The prefix and timestamp have fixed widths, so the slug and the date key
//! are plain slices at fixed offsets from the two ends of the line. The only
//! search the hot loop performs is the forward scan for `\n`, done by the
//! caller. The timestamp must start with an ISO-8601 `YYYY-MM-DD` date.

use crate::calendar::DATE_LABEL_LEN;
use crate::{Error, Result};

/// Upper bound on `prefix_len + timestamp_len`.
pub const MAX_FIXED_WIDTH: usize = 64 * 1024;

/// Why a line failed to frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramingError {
    /// Shorter than prefix + one slug byte + delimiter + timestamp.
    TooShort,
    /// The byte before the timestamp is not the delimiter.
    MissingDelimiter,
}

impl FramingError {
    pub const fn reason(self) -> &'static str {
        match self {
            Self::TooShort => "line shorter than the fixed record layout",
            Self::MissingDelimiter => "missing delimiter before timestamp",
        }
    }

    /// Attaches the absolute byte offset of the offending line.
    pub const fn at(self, offset: u64) -> Error {
        Error::MalformedRecord {
            offset,
            reason: self.reason(),
        }
    }
}

/// Widths that define the record format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordLayout {
    /// Bytes before the slug (scheme, host, and path root).
    pub prefix_len: usize,
    /// Separator between slug and timestamp.
    pub delimiter: u8,
    /// Width of the trailing timestamp.
    pub timestamp_len: usize,
    /// Width of the date key, ending where `YYYY-MM-DD` ends.
    pub date_len: usize,
}

impl Default for RecordLayout {
    fn default() -> Self {
        Self {
            prefix_len: 25,
            delimiter: b',',
            timestamp_len: 25,
            date_len: DATE_LABEL_LEN,
        }
    }
}

impl RecordLayout {
    pub fn validate(&self) -> Result<()> {
        if !(8..=DATE_LABEL_LEN).contains(&self.date_len) {
            return Err(Error::config(format!(
                "date length must be within 8..={DATE_LABEL_LEN}, got {}",
                self.date_len
            )));
        }
        if self.timestamp_len < DATE_LABEL_LEN {
            return Err(Error::config(format!(
                "timestamp length {} cannot hold a {DATE_LABEL_LEN}-byte date",
                self.timestamp_len
            )));
        }
        if self.delimiter == b'\n' {
            return Err(Error::config("delimiter cannot be a newline"));
        }
        let fixed = self
            .prefix_len
            .checked_add(self.timestamp_len)
            .filter(|&n| n <= MAX_FIXED_WIDTH);
        if fixed.is_none() {
            return Err(Error::config(format!(
                "prefix ({}) plus timestamp ({}) exceeds {MAX_FIXED_WIDTH} bytes",
                self.prefix_len, self.timestamp_len
            )));
        }
        Ok(())
    }

    /// Shortest well-formed line, excluding the `\n`. Only meaningful for a
    /// layout that passed [`validate`](Self::validate).
    #[inline]
    pub const fn min_line_len(&self) -> usize {
        self.prefix_len + 1 + 1 + self.timestamp_len
    }

    /// Distance from the line end back to the first byte of the date key.
    #[inline]
    const fn date_back_offset(&self) -> usize {
        self.timestamp_len - (DATE_LABEL_LEN - self.date_len)
    }

    /// Returns the slug of a line (without its `\n`).
    #[inline]
    pub fn extract_slug<'a>(&self, line: &'a [u8]) -> core::result::Result<&'a [u8], FramingError> {
        if line.len() < self.min_line_len() {
            return Err(FramingError::TooShort);
        }
        let delim = line.len() - self.timestamp_len - 1;
        if line[delim] != self.delimiter {
            return Err(FramingError::MissingDelimiter);
        }
        Ok(&line[self.prefix_len..delim])
    }

    /// Returns the date key of a line (without its `\n`).
    #[inline]
    pub fn extract_date_key<'a>(
        &self,
        line: &'a [u8],
    ) -> core::result::Result<&'a [u8], FramingError> {
        if line.len() < self.min_line_len() {
            return Err(FramingError::TooShort);
        }
        let start = line.len() - self.date_back_offset();
        Ok(&line[start..start + self.date_len])
    }

    /// Slug and date key in one pass.
    #[inline]
    pub fn split<'a>(
        &self,
        line: &'a [u8],
    ) -> core::result::Result<(&'a [u8], &'a [u8]), FramingError> {
        let slug = self.extract_slug(line)?;
        let date = self.extract_date_key(line)?;
        Ok((slug, date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &[u8] = b"https://stitcher.io/blog/some-post,2024-03-01T12:34:56+00:00";

    #[test]
    fn extracts_slug_and_date() {
        let layout = RecordLayout::default();
        assert_eq!(layout.extract_slug(LINE), Ok(&b"some-post"[..]));
        assert_eq!(layout.extract_date_key(LINE), Ok(&b"2024-03-01"[..]));
    }

    #[test]
    fn short_date_key_skips_century() {
        let layout = RecordLayout {
            date_len: 8,
            ..RecordLayout::default()
        };
        assert_eq!(layout.extract_date_key(LINE), Ok(&b"24-03-01"[..]));
    }

    #[test]
    fn slug_may_contain_path_separators_and_delimiters() {
        let layout = RecordLayout::default();
        let line = b"https://stitcher.io/blog/a/b,c,2021-12-31T00:00:00+00:00";
        assert_eq!(
            layout.split(line),
            Ok((&b"a/b,c"[..], &b"2021-12-31"[..]))
        );
    }

    #[test]
    fn oversized_fixed_widths_are_rejected() {
        let cases = [(usize::MAX, 25), (25, usize::MAX), (MAX_FIXED_WIDTH, 25)];
        for (prefix_len, timestamp_len) in cases {
            let layout = RecordLayout {
                prefix_len,
                timestamp_len,
                ..RecordLayout::default()
            };
            assert!(matches!(layout.validate(), Err(Error::InvalidConfig { .. })));
        }
        let widest = RecordLayout {
            prefix_len: MAX_FIXED_WIDTH - 25,
            ..RecordLayout::default()
        };
        widest.validate().unwrap();
    }

    #[test]
    fn single_byte_slug_is_minimal() {
        let layout = RecordLayout::default();
        let line = b"https://stitcher.io/blog/x,2021-12-31T00:00:00+00:00";
        assert_eq!(line.len(), layout.min_line_len());
        assert_eq!(layout.extract_slug(line), Ok(&b"x"[..]));
    }

    #[test]
    fn rejects_short_lines() {
        let layout = RecordLayout::default();
        let line = b"https://stitcher.io/blog/,2021-12-31T00:00:00+00:00";
        assert_eq!(layout.split(line), Err(FramingError::TooShort));
        assert_eq!(layout.extract_date_key(b""), Err(FramingError::TooShort));
    }

    #[test]
    fn rejects_missing_delimiter() {
        let layout = RecordLayout::default();
        let line = b"https://stitcher.io/blog/some-post;2024-03-01T12:34:56+00:00";
        assert_eq!(
            layout.extract_slug(line),
            Err(FramingError::MissingDelimiter)
        );
    }

    #[test]
    fn framing_error_carries_offset() {
        let err = FramingError::TooShort.at(42);
        assert!(matches!(err, Error::MalformedRecord { offset: 42, .. }));
    }

    #[test]
    fn validate_rejects_bad_widths() {
        let narrow = RecordLayout {
            timestamp_len: 9,
            ..RecordLayout::default()
        };
        assert!(narrow.validate().is_err());
        let wide_date = RecordLayout {
            date_len: 11,
            ..RecordLayout::default()
        };
        assert!(wide_date.validate().is_err());
        assert!(RecordLayout::default().validate().is_ok());
    }
}
