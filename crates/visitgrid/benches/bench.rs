use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::io::Write;
use visitgrid::{
    CalendarIndex, Coordinator, JsonGridWriter, RecordLayout, SliceLineSeeker, SlugCatalog,
    Tables, WorkerOptions, WriterOptions, split_line_aligned, tally_bytes,
};

// Lines per generated log.
const LINES: usize = 200_000;

const SLUGS: [&str; 8] = [
    "php-enums",
    "laravel-beyond-crud",
    "a",
    "what-is-new-in-php-84",
    "generics-in-php-3",
    "tags/rust",
    "readonly-classes-in-php-82",
    "the-road-to-php",
];

fn synthetic_log(lines: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(lines * 80);
    let mut state = 0x9e37_79b9_7f4a_7c15_u64;
    for _ in 0..lines {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let slug = SLUGS[state as usize % SLUGS.len()];
        let year = 2020 + (state >> 8) % 7;
        let month = 1 + (state >> 16) % 12;
        let day = 1 + (state >> 24) % 28;
        writeln!(
            out,
            "https://stitcher.io/blog/{slug},{year}-{month:02}-{day:02}T08:15:00+00:00"
        )
        .unwrap();
    }
    out
}

fn tables(data: &[u8]) -> Tables {
    let layout = RecordLayout::default();
    Tables {
        calendar: CalendarIndex::build(2020, 2026, layout.date_len).unwrap(),
        catalog: SlugCatalog::build(data, &layout, &[]).unwrap(),
        layout,
    }
}

/// Single-threaded parse and count over an in-memory log.
fn bench_tally(c: &mut Criterion) {
    let data = synthetic_log(LINES);
    let tables = tables(&data);

    let mut group = c.benchmark_group("tally");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function(format!("lines/{LINES}"), |b| {
        b.iter(|| black_box(tally_bytes(black_box(&data), &tables).unwrap()));
    });
    group.finish();
}

/// Full scatter-gather over a file on disk.
fn bench_coordinator(c: &mut Criterion) {
    let data = synthetic_log(LINES);
    let tables = tables(&data);
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&data).unwrap();
    file.flush().unwrap();
    let size = data.len() as u64;

    let mut group = c.benchmark_group("coordinator");
    group.throughput(Throughput::Bytes(size));
    for workers in [1, 4, 13] {
        let ranges = split_line_aligned(size, workers, &mut SliceLineSeeker(&data)).unwrap();
        group.bench_function(format!("workers/{workers}"), |b| {
            b.iter(|| {
                let coordinator = Coordinator::new(
                    file.path(),
                    size,
                    &tables,
                    WorkerOptions {
                        read_buf_size: 4 * 1024 * 1024,
                    },
                );
                black_box(coordinator.run(&ranges).unwrap())
            });
        });
    }
    group.finish();
}

/// Rendering a dense grid to an in-memory sink.
fn bench_writer(c: &mut Criterion) {
    let data = synthetic_log(LINES);
    let tables = tables(&data);
    let output = tally_bytes(&data, &tables).unwrap();

    let mut group = c.benchmark_group("writer");
    group.throughput(Throughput::Elements(tables.cells() as u64));
    group.bench_function("json", |b| {
        b.iter(|| {
            let mut sink = Vec::with_capacity(1 << 20);
            let stats = JsonGridWriter::new(&mut sink, WriterOptions::default())
                .write(&output.grid, &tables.catalog, &tables.calendar)
                .unwrap();
            black_box((stats, sink))
        });
    });
    group.finish();
}

criterion_group!(benches, bench_tally, bench_coordinator, bench_writer);
criterion_main!(benches);
