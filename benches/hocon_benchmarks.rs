use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hocon_core::{lexer::Lexer, parse_string, parser::Parser};

// ============================================================================
// Test Data: Varying Complexity and Size
// ============================================================================

const TINY_CONF: &str = "value = 42";

const SMALL_CONF: &str = r#"
name = "test"
version = 1.0
enabled = true
tags = [a, b, c]
"#;

const MEDIUM_CONF: &str = r#"
defaults {
  ssl = true
  retries = 5
  timeout = 30s
}

servers {
  one = ${defaults} { host = server1.example.com, port = 8080 }
  two = ${defaults} { host = server2.example.com, port = 8081 }
  three = ${defaults} { host = server3.example.com, port = 8082, ssl = false }
}

paths {
  home = /srv/app
  bin = ${paths.home}"/bin"
  logs = ${paths.home}"/logs"
  extra = ${?EXTRA_PATH}
}
"#;

fn generate_wide_conf(keys: usize) -> String {
    let mut conf = String::from("base = start\n");
    for i in 0..keys {
        conf.push_str(&format!("section{i} {{ id = {i}, name = \"item {i}\", ref = ${{base}} }}\n"));
    }
    conf
}

fn generate_chain_conf(depth: usize) -> String {
    let mut conf = String::from("v0 = root\n");
    for i in 1..depth {
        conf.push_str(&format!("v{i} = ${{v{}}}\"-{i}\"\n", i - 1));
    }
    conf
}

// ============================================================================
// Lexer Benchmarks
// ============================================================================

fn bench_lexer_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer_by_size");

    for (name, source) in [("tiny", TINY_CONF), ("small", SMALL_CONF), ("medium", MEDIUM_CONF)] {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), source, |b, src| {
            b.iter(|| {
                let mut lexer = Lexer::new(black_box(src));
                black_box(lexer.lex())
            });
        });
    }
    group.finish();
}

// ============================================================================
// Parser Benchmarks
// ============================================================================

fn bench_parser_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser_key_scaling");

    for size in [10, 100, 1000] {
        let source = generate_wide_conf(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &source, |b, src| {
            b.iter(|| {
                let mut parser = Parser::new(black_box(src)).unwrap();
                black_box(parser.parse_document().unwrap())
            });
        });
    }
    group.finish();
}

// ============================================================================
// End-to-End Benchmarks (parse + resolve + query)
// ============================================================================

fn bench_e2e_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("e2e_resolution");

    for size in [10, 100, 1000] {
        let source = generate_wide_conf(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &source, |b, src| {
            b.iter(|| {
                let config = parse_string(black_box(src)).unwrap();
                black_box(config.get_string("section0.ref").unwrap())
            });
        });
    }
    group.finish();
}

fn bench_e2e_reference_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("e2e_reference_chain");

    for depth in [10, 50, 200] {
        let source = generate_chain_conf(depth);
        let last = format!("v{}", depth - 1);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &source, |b, src| {
            b.iter(|| {
                let config = parse_string(black_box(src)).unwrap();
                black_box(config.get_string(&last).unwrap())
            });
        });
    }
    group.finish();
}

fn bench_fallback_layers(c: &mut Criterion) {
    let base = parse_string(MEDIUM_CONF).unwrap();
    let overrides = parse_string("defaults.retries = 1\nservers.two.port = 9000").unwrap();

    c.bench_function("with_fallback_and_query", |b| {
        b.iter(|| {
            let config = overrides.with_fallback(black_box(&base)).unwrap();
            black_box(config.get_int32("servers.one.retries").unwrap())
        });
    });
}

fn bench_cached_queries(c: &mut Criterion) {
    let config = parse_string(MEDIUM_CONF).unwrap();
    config.root().unwrap();

    c.bench_function("cached_typed_queries", |b| {
        b.iter(|| {
            black_box(config.get_int32(black_box("servers.three.port")).unwrap());
            black_box(config.get_time_duration(black_box("defaults.timeout")).unwrap());
            black_box(config.get_string(black_box("paths.bin")).unwrap())
        });
    });
}

criterion_group!(
    benches,
    bench_lexer_sizes,
    bench_parser_scaling,
    bench_e2e_resolution,
    bench_e2e_reference_chain,
    bench_fallback_layers,
    bench_cached_queries
);
criterion_main!(benches);
