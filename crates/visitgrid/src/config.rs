use crate::layout::RecordLayout;
use crate::writer::WriterOptions;
use crate::{Error, Result};

/// Tunables for one aggregation run.
///
/// The defaults describe the `stitcher.io` visit log: 25-byte URL prefix,
/// 25-byte ISO-8601 timestamps, dates from 2020 through 2026.
#[derive(Clone, Debug)]
pub struct AggregatorConfig {
    /// Number of partitions, and therefore worker threads.
    pub worker_count: usize,
    /// Block size each worker reads at once. Must exceed the longest line.
    pub read_buf_size: usize,
    /// Bytes from the start of the input scanned for slugs.
    pub sample_size: u64,
    pub year_start: u16,
    pub year_end: u16,
    pub layout: RecordLayout,
    pub writer: WriterOptions,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            worker_count: 13,
            read_buf_size: 4 * 1024 * 1024,
            sample_size: 2 * 1024 * 1024,
            year_start: 2020,
            year_end: 2026,
            layout: RecordLayout::default(),
            writer: WriterOptions::default(),
        }
    }
}

impl AggregatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(Error::config("worker count must be greater than 0"));
        }
        if self.sample_size == 0 {
            return Err(Error::config("sample size must be greater than 0"));
        }
        self.layout.validate()?;
        if self.read_buf_size <= self.layout.min_line_len() {
            return Err(Error::config(format!(
                "read buffer ({} bytes) must exceed the minimum record length ({} bytes)",
                self.read_buf_size,
                self.layout.min_line_len()
            )));
        }
        if self.year_start > self.year_end {
            return Err(Error::InvalidYearRange {
                start: self.year_start,
                end: self.year_end,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        AggregatorConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_zero_workers_and_tiny_buffers() {
        let cfg = AggregatorConfig {
            worker_count: 0,
            ..AggregatorConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig { .. })));

        let cfg = AggregatorConfig {
            read_buf_size: 52,
            ..AggregatorConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn huge_prefix_is_a_config_error() {
        let cfg = AggregatorConfig {
            layout: RecordLayout {
                prefix_len: usize::MAX,
                ..RecordLayout::default()
            },
            ..AggregatorConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn rejects_inverted_years() {
        let cfg = AggregatorConfig {
            year_start: 2027,
            ..AggregatorConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(Error::InvalidYearRange { .. })
        ));
    }
}
