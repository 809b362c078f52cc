//! Criterion benchmarks for line framing and classification.
//!
//! Run with:
//! ```bash
//! cargo bench --package touchportal-core --bench framer_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use touchportal_core::{classify, RecordFramer};

fn make_stream(messages: usize) -> Vec<u8> {
    let mut stream = Vec::new();
    for i in 0..messages {
        let line = match i % 4 {
            0 => format!("{{\"type\":\"action\",\"pluginId\":\"bench\",\"actionId\":\"a{i}\",\"data\":[]}}\n"),
            1 => format!("{{\"type\":\"down\",\"actionId\":\"a{i}\"}}\r\n"),
            2 => format!("{{\"type\":\"broadcast\",\"event\":\"pageChange\",\"pageName\":\"p{i}\"}}\n"),
            _ => format!("{{\"type\":\"settings\",\"values\":[{{\"Interval\":\"{i}\"}}]}}\r"),
        };
        stream.extend_from_slice(line.as_bytes());
    }
    stream
}

fn bench_framing(c: &mut Criterion) {
    let stream = make_stream(256);
    let mut group = c.benchmark_group("frame_and_classify");

    for chunk_size in [16usize, 512, 64 * 1024] {
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            &chunk_size,
            |b, &chunk_size| {
                b.iter(|| {
                    let mut framer = RecordFramer::new();
                    let mut events = 0usize;
                    for chunk in stream.chunks(chunk_size) {
                        for record in framer.feed(black_box(chunk)).flatten() {
                            events += classify(record, "bench").events.len();
                        }
                    }
                    black_box(events)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_framing);
criterion_main!(benches);
