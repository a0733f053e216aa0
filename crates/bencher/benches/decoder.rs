use bencher::{ASCII, BROKEN, ESCAPED, LONG, TestCase};
use bytes::Bytes;
use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use gate_http::cookie::parse_cookie;
use gate_http::environ::Environ;
use gate_http::percent::decode_path;
use gate_http::protocol::Request;
use gate_http::query::QueryDict;
use std::hint::black_box;

fn create_test_cases() -> Vec<TestCase> {
    vec![
        TestCase::small("ascii", ASCII),
        TestCase::normal("escaped", ESCAPED),
        TestCase::normal("broken", BROKEN),
        TestCase::large("long", LONG),
    ]
}

fn benchmark_field_decoders(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("field_decoder");

    for case in create_test_cases() {
        let input = *case.input();
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::new("path", case.name()), &input, |b, input| {
            b.iter(|| black_box(decode_path(black_box(input.path))));
        });
        group.bench_with_input(BenchmarkId::new("query", case.name()), &input, |b, input| {
            b.iter(|| black_box(QueryDict::parse(black_box(input.query))));
        });
        group.bench_with_input(BenchmarkId::new("cookie", case.name()), &input, |b, input| {
            b.iter(|| black_box(parse_cookie(black_box(input.cookie))));
        });
    }

    group.finish();
}

fn benchmark_request_decoder(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("request_decoder");

    for case in create_test_cases() {
        let input = *case.input();
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &input, |b, input| {
            b.iter_batched(
                || {
                    Environ::builder()
                        .raw_path(Bytes::from_static(input.path))
                        .query_string(Bytes::from_static(input.query))
                        .cookie(Bytes::from_static(input.cookie))
                        .build()
                },
                |environ| {
                    let request = Request::from_environ(environ).expect("benchmark environments carry a method");
                    black_box(request);
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(decoder, benchmark_field_decoders, benchmark_request_decoder);
criterion_main!(decoder);
