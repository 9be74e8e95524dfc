use anyhow::bail;
use clap::Parser;
use std::path::PathBuf;
use visitgrid::{AggregatorConfig, RecordLayout, WriterOptions};

/// Runtime configuration for the `visitgrid` binary.
///
/// Every flag can also be supplied through its environment variable or a
/// `.env` file in the working directory. Defaults match the `stitcher.io`
/// visit log format.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "visitgrid",
    version,
    about = "Aggregate a visit log into per-path, per-day JSON counts"
)]
pub struct CliArgs {
    /// Visit log to read.
    ///
    /// Environment variable: `VISITGRID_INPUT`
    #[arg(short, long, env = "VISITGRID_INPUT")]
    pub input: PathBuf,

    /// Destination of the JSON document. Replaced atomically on success.
    ///
    /// Environment variable: `VISITGRID_OUTPUT`
    #[arg(short, long, env = "VISITGRID_OUTPUT")]
    pub output: PathBuf,

    /// Optional file of full URIs, one per line, whose slugs are accepted
    /// even if they never appear in the sampled head of the input.
    ///
    /// Environment variable: `VISITGRID_KNOWN_IDENTIFIERS`
    #[arg(short, long, env = "VISITGRID_KNOWN_IDENTIFIERS")]
    pub known_identifiers: Option<PathBuf>,

    /// Number of partitions and worker threads. Defaults to the number of
    /// logical CPUs.
    ///
    /// Environment variable: `VISITGRID_WORKERS`
    #[arg(short, long, env = "VISITGRID_WORKERS", default_value_t = num_cpus::get())]
    pub workers: usize,

    /// Bytes each worker reads per block. Must exceed the longest line.
    ///
    /// Environment variable: `VISITGRID_READ_BUFFER`
    #[arg(long, env = "VISITGRID_READ_BUFFER", default_value_t = 4 * 1024 * 1024)]
    pub read_buffer: usize,

    /// Bytes from the start of the input scanned to discover slugs.
    ///
    /// Environment variable: `VISITGRID_SAMPLE_SIZE`
    #[arg(long, env = "VISITGRID_SAMPLE_SIZE", default_value_t = 2 * 1024 * 1024)]
    pub sample_size: u64,

    /// First year with valid dates.
    ///
    /// Environment variable: `VISITGRID_YEAR_START`
    #[arg(long, env = "VISITGRID_YEAR_START", default_value_t = 2020)]
    pub year_start: u16,

    /// Last year with valid dates, inclusive.
    ///
    /// Environment variable: `VISITGRID_YEAR_END`
    #[arg(long, env = "VISITGRID_YEAR_END", default_value_t = 2026)]
    pub year_end: u16,

    /// Bytes of URL before the slug, e.g. 25 for `https://stitcher.io/blog/`.
    ///
    /// Environment variable: `VISITGRID_PREFIX_LEN`
    #[arg(long, env = "VISITGRID_PREFIX_LEN", default_value_t = 25)]
    pub prefix_len: usize,

    /// Width of the trailing timestamp.
    ///
    /// Environment variable: `VISITGRID_TIMESTAMP_LEN`
    #[arg(long, env = "VISITGRID_TIMESTAMP_LEN", default_value_t = 25)]
    pub timestamp_len: usize,

    /// Width of the date key (8 to 10), counted back from the end of
    /// `YYYY-MM-DD`.
    ///
    /// Environment variable: `VISITGRID_DATE_LEN`
    #[arg(long, env = "VISITGRID_DATE_LEN", default_value_t = 10)]
    pub date_len: usize,

    /// String prepended to every slug in the output keys.
    ///
    /// Environment variable: `VISITGRID_KEY_PREFIX`
    #[arg(long, env = "VISITGRID_KEY_PREFIX", default_value_t = String::from("/blog/"))]
    pub key_prefix: String,

    /// Buffered output bytes that trigger a write.
    ///
    /// Environment variable: `VISITGRID_FLUSH_THRESHOLD`
    #[arg(long, env = "VISITGRID_FLUSH_THRESHOLD", default_value_t = 64 * 1024)]
    pub flush_threshold: usize,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub known_identifiers: Option<PathBuf>,
    pub aggregator: AggregatorConfig,
}

impl TryFrom<CliArgs> for RunConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.workers == 0 {
            bail!("VISITGRID_WORKERS must be greater than 0");
        }

        if args.year_start > args.year_end {
            bail!(
                "VISITGRID_YEAR_START ({}) is after VISITGRID_YEAR_END ({})",
                args.year_start,
                args.year_end
            );
        }

        if !(8..=10).contains(&args.date_len) {
            bail!(
                "VISITGRID_DATE_LEN ({}) must be between 8 and 10",
                args.date_len
            );
        }

        if args.input == args.output {
            bail!(
                "VISITGRID_OUTPUT must differ from VISITGRID_INPUT ({})",
                args.input.display()
            );
        }

        let aggregator = AggregatorConfig {
            worker_count: args.workers,
            read_buf_size: args.read_buffer,
            sample_size: args.sample_size,
            year_start: args.year_start,
            year_end: args.year_end,
            layout: RecordLayout {
                prefix_len: args.prefix_len,
                timestamp_len: args.timestamp_len,
                date_len: args.date_len,
                ..RecordLayout::default()
            },
            writer: WriterOptions {
                key_prefix: args.key_prefix,
                flush_threshold: args.flush_threshold,
            },
        };
        aggregator.validate()?;

        Ok(Self {
            input: args.input,
            output: args.output,
            known_identifiers: args.known_identifiers,
            aggregator,
        })
    }
}
