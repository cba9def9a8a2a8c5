use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use logtally::jobs::{map_partition, tokens, JobSpec};
use logtally::stats::ProcessingStats;
use logtally::useragent::{Category, UserAgentParser};
use logtally::{extract_field, FieldSpec, Tally};

const ACCESS_LINE: &str = "183.162.52.7 - - [10/Nov/2016:00:01:02 +0800] \"POST /api3/getadv HTTP/1.1\" 200 813 \"www.imooc.com\" \"-\" cid=0&timestamp=1478707261865&uid=2871142 \"Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/54.0.2840.71 Safari/537.36\" \"-\" 10.100.134.244:80 200 0.027 0.027";

fn bench_tokens(c: &mut Criterion) {
    let line = "the quick brown fox jumps over the lazy dog  \t and keeps running";
    c.bench_function("tokens_short_line", |b| {
        b.iter(|| {
            black_box(tokens(black_box(line)).count());
        });
    });
}

fn bench_extract_field(c: &mut Criterion) {
    let spec = FieldSpec::default();
    c.bench_function("extract_user_agent", |b| {
        b.iter(|| {
            black_box(extract_field(black_box(ACCESS_LINE), &spec).ok());
        });
    });
}

fn bench_classify(c: &mut Criterion) {
    let parser = UserAgentParser::new().unwrap();
    let spec = FieldSpec::default();
    let agent = extract_field(ACCESS_LINE, &spec).unwrap();
    c.bench_function("classify_user_agent", |b| {
        b.iter(|| {
            black_box(parser.parse(black_box(agent)).ok());
        });
    });
}

fn bench_merge(c: &mut Criterion) {
    let partials: Vec<Tally> = (0..64)
        .map(|p| Tally::from_keys((0..500).map(|k| format!("key{}", (k * 7 + p) % 900))))
        .collect();

    c.bench_function("merge_64_partials", |b| {
        b.iter_batched(
            || partials.clone(),
            |partials| {
                let mut total = Tally::new();
                for partial in partials {
                    total.merge(partial);
                }
                black_box(total.len())
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_partition(c: &mut Criterion) {
    let lines: Vec<String> = (0..1000).map(|_| ACCESS_LINE.to_string()).collect();
    let job = JobSpec::Browsers {
        field: FieldSpec::default(),
        category: Category::Browser,
    };

    let mut group = c.benchmark_group("browsers_partition_1000");
    for combine in [true, false] {
        let name = if combine { "combined" } else { "raw" };
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut stats = ProcessingStats::default();
                let mut scope = job.setup().unwrap();
                let partial = map_partition(&mut scope, &lines, 1, combine, &mut stats);
                black_box(partial.into_tally().len())
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_tokens,
    bench_extract_field,
    bench_classify,
    bench_merge,
    bench_partition
);
criterion_main!(benches);
