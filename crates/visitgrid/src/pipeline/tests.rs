use super::*;
use crate::catalog::NoKnownIdentifiers;
use crate::worker::tally_bytes;
use std::io::Write;
use tempfile::TempDir;

fn record(slug: &str, date: &str) -> String {
    format!("https://stitcher.io/blog/{slug},{date}T14:03:27+00:00\n")
}

fn write_input(dir: &TempDir, data: &str) -> PathBuf {
    let path = dir.path().join("visits.csv");
    let mut file = File::create(&path).unwrap();
    file.write_all(data.as_bytes()).unwrap();
    path
}

fn config(workers: usize) -> AggregatorConfig {
    AggregatorConfig {
        worker_count: workers,
        read_buf_size: 512,
        ..AggregatorConfig::default()
    }
}

const SLUGS: [&str; 6] = [
    "php-81-enums",
    "laravel/queues",
    "a",
    "what-is-new-in-php-84",
    "generics-in-php-3",
    "tags/rust",
];

/// Deterministic pseudo-random log with uneven slug popularity.
fn synthetic_log(lines: usize) -> String {
    let mut state = 0x2545_f491_u64;
    (0..lines)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let slug = SLUGS[(state % 97) as usize % SLUGS.len()];
            let year = 2020 + (state >> 8) % 7;
            let month = 1 + (state >> 16) % 12;
            let day = 1 + (state >> 24) % 28;
            record(slug, &format!("{year}-{month:02}-{day:02}"))
        })
        .collect()
}

fn render(dir: &TempDir, input: &Path, cfg: AggregatorConfig, name: &str) -> String {
    let output = dir.path().join(name);
    Aggregator::new(cfg)
        .run(input, &NoKnownIdentifiers, &output)
        .unwrap();
    fs::read_to_string(output).unwrap()
}

#[test]
fn three_line_round_trip() {
    let dir = TempDir::new().unwrap();
    let data = [
        record("foo", "2024-03-01"),
        record("foo", "2024-03-01"),
        record("bar", "2024-03-02"),
    ]
    .concat();
    let input = write_input(&dir, &data);

    let json = render(&dir, &input, config(2), "out.json");
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    let doc = parsed.as_object().unwrap();
    assert_eq!(doc.len(), 2);

    let foo = doc["/blog/foo"].as_object().unwrap();
    assert_eq!(foo.len(), 1);
    assert_eq!(foo["2024-03-01"], 2);

    let bar = doc["/blog/bar"].as_object().unwrap();
    assert_eq!(bar.len(), 1);
    assert_eq!(bar["2024-03-02"], 1);

    assert!(json.contains("\"\\/blog\\/foo\": {\n        \"2024-03-01\": 2\n    }"));
}

#[test]
fn parallel_runs_match_single_threaded_count() {
    let dir = TempDir::new().unwrap();
    let data = synthetic_log(5_000);
    let input = write_input(&dir, &data);

    let mut reference = None;
    for workers in [1, 2, 7, 13] {
        let (tables, agg) = Aggregator::new(config(workers))
            .aggregate(&input, &NoKnownIdentifiers)
            .unwrap();
        let direct = tally_bytes(data.as_bytes(), &tables).unwrap();
        assert_eq!(agg.grid, direct.grid, "workers = {workers}");
        assert_eq!(agg.records, 5_000, "workers = {workers}");
        match &reference {
            None => reference = Some(agg.grid),
            Some(grid) => assert_eq!(&agg.grid, grid),
        }
    }
}

#[test]
fn uneven_split_processes_every_byte_once() {
    let dir = TempDir::new().unwrap();
    // Lines of varying width, so range boundaries land mid-line.
    let data = synthetic_log(1_009);
    let input = write_input(&dir, &data);

    let (_, agg) = Aggregator::new(config(13))
        .aggregate(&input, &NoKnownIdentifiers)
        .unwrap();
    assert_eq!(agg.records, data.lines().count() as u64);
    assert_eq!(agg.grid.total(), 1_009);
}

#[test]
fn output_is_byte_identical_across_runs() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, &synthetic_log(2_000));

    let first = render(&dir, &input, config(5), "a.json");
    let second = render(&dir, &input, config(5), "b.json");
    assert_eq!(first, second);
    // Worker count never changes the document.
    let third = render(&dir, &input, config(1), "c.json");
    assert_eq!(first, third);
}

#[test]
fn slug_beyond_sample_is_counted_when_known() {
    let dir = TempDir::new().unwrap();
    let mut data = synthetic_log(400);
    data.push_str(&record("late-arrival", "2025-07-04"));
    let input = write_input(&dir, &data);

    let cfg = AggregatorConfig {
        sample_size: 1_024,
        ..config(3)
    };

    let err = Aggregator::new(cfg.clone())
        .aggregate(&input, &SLUGS[..])
        .unwrap_err();
    assert!(matches!(err, Error::UnknownSlug { ref slug, .. } if slug == "late-arrival"));

    let mut known: Vec<String> = SLUGS.iter().map(|s| (*s).to_owned()).collect();
    known.push("late-arrival".to_owned());
    let (tables, agg) = Aggregator::new(cfg).aggregate(&input, &known).unwrap();
    let slug = tables.catalog.id_of(b"late-arrival").unwrap();
    let date = tables.calendar.lookup(b"2025-07-04").unwrap();
    assert_eq!(agg.grid.get(slug, date), 1);
}

#[test]
fn zero_counts_are_omitted() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, &record("seen", "2021-05-05"));
    let output = dir.path().join("out.json");

    let known = vec!["never-visited".to_owned()];
    Aggregator::new(config(2))
        .run(&input, &known, &output)
        .unwrap();

    let parsed: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    let doc = parsed.as_object().unwrap();
    assert!(!doc.contains_key("/blog/never-visited"));
    assert_eq!(doc["/blog/seen"].as_object().unwrap().len(), 1);
}

#[test]
fn dates_are_chronological_in_output() {
    let dir = TempDir::new().unwrap();
    let data = [
        record("x", "2026-12-31"),
        record("x", "2020-01-01"),
        record("x", "2023-06-15"),
    ]
    .concat();
    let input = write_input(&dir, &data);
    let json = render(&dir, &input, config(3), "out.json");

    let first = json.find("2020-01-01").unwrap();
    let middle = json.find("2023-06-15").unwrap();
    let last = json.find("2026-12-31").unwrap();
    assert!(first < middle && middle < last);
}

#[test]
fn failed_run_leaves_no_output() {
    let dir = TempDir::new().unwrap();
    let data = [record("ok", "2024-01-01"), "not a record\n".to_owned()].concat();
    let input = write_input(&dir, &data);
    let output = dir.path().join("out.json");

    let err = Aggregator::new(config(1))
        .run(&input, &NoKnownIdentifiers, &output)
        .unwrap_err();
    assert!(matches!(err, Error::MalformedRecord { .. }));
    assert!(!output.exists());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn previous_output_survives_failure() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, &record("ok", "2019-01-01"));
    let output = dir.path().join("out.json");
    fs::write(&output, "previous").unwrap();

    let err = Aggregator::new(config(1))
        .run(&input, &NoKnownIdentifiers, &output)
        .unwrap_err();
    assert!(matches!(err, Error::UnknownDate { .. }));
    assert_eq!(fs::read_to_string(&output).unwrap(), "previous");
}

#[test]
fn slug_only_on_unterminated_last_line_is_counted() {
    let dir = TempDir::new().unwrap();
    let mut data = record("foo", "2024-03-01");
    data.push_str(record("tail-only", "2024-03-02").trim_end());
    let input = write_input(&dir, &data);

    for workers in [1, 3] {
        let (tables, agg) = Aggregator::new(config(workers))
            .aggregate(&input, &NoKnownIdentifiers)
            .unwrap();
        let slug = tables.catalog.id_of(b"tail-only").unwrap();
        let date = tables.calendar.lookup(b"2024-03-02").unwrap();
        assert_eq!(agg.grid.get(slug, date), 1, "workers = {workers}");
        assert_eq!(agg.records, 2, "workers = {workers}");
    }
}

#[test]
fn truncated_last_line_still_fails() {
    let dir = TempDir::new().unwrap();
    let mut data = record("foo", "2024-03-01");
    data.push_str("https://stitcher.io/blog/cut-off,2024-0");
    let input = write_input(&dir, &data);

    let err = Aggregator::new(config(2))
        .aggregate(&input, &NoKnownIdentifiers)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::MalformedRecord { reason: "truncated final record", .. }
    ));
}

#[test]
fn empty_input_produces_empty_document() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "");
    let output = dir.path().join("out.json");
    let summary = Aggregator::new(config(4))
        .run(&input, &NoKnownIdentifiers, &output)
        .unwrap();
    assert_eq!(summary.records, 0);
    assert_eq!(fs::read_to_string(&output).unwrap(), "{\n}");
}

#[test]
fn summary_reports_shape() {
    let dir = TempDir::new().unwrap();
    let data = synthetic_log(300);
    let input = write_input(&dir, &data);
    let output = dir.path().join("out.json");
    let summary = Aggregator::new(config(4))
        .run(&input, &NoKnownIdentifiers, &output)
        .unwrap();
    assert_eq!(summary.file_size, data.len() as u64);
    assert_eq!(summary.workers, 4);
    assert_eq!(summary.records, 300);
    assert_eq!(summary.dates, 365 * 7 + 2);
    assert_eq!(summary.write.bytes_written, fs::metadata(&output).unwrap().len());
}

#[test]
fn missing_input_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let err = Aggregator::new(config(2))
        .aggregate(&dir.path().join("absent.csv"), &NoKnownIdentifiers)
        .unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}
