//! Criterion benchmarks for the YellowNet packet codec.
//!
//! The poll loop decodes every line the device prints, so decode cost sits
//! directly on the serial hot path.
//!
//! Run with:
//! ```bash
//! cargo bench --package yellownet-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use yellownet_core::protocol::{decode, encode, encode_escaped, Method, Packet};

// ── Line fixtures ─────────────────────────────────────────────────────────────

fn lines() -> Vec<(&'static str, String)> {
    vec![
        ("chat", "1.MSG;chat|hello world".to_string()),
        ("control", "1.GTW;set_address|192.168.1.20:8080".to_string()),
        ("escaped", "a\\.b.REQ;x\\;y|hello\\|world".to_string()),
        ("noise", "Loading game data... done".to_string()),
        ("long_body", format!("7.ASW;dump|{}", "x".repeat(1024))),
    ]
}

fn packets() -> Vec<(&'static str, Packet)> {
    vec![
        ("chat", Packet::new("1", Method::Msg, "chat", "hello world")),
        ("reserved", Packet::new("a.b", Method::Req, "x;y", "p|q")),
        (
            "long_body",
            Packet::new("7", Method::Asw, "dump", "x".repeat(1024)),
        ),
    ]
}

// ── Benchmark groups ──────────────────────────────────────────────────────────

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for (name, line) in lines() {
        group.bench_with_input(BenchmarkId::new("line", name), &line, |b, line| {
            b.iter(|| decode(black_box(line)))
        });
    }
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for (name, packet) in packets() {
        group.bench_with_input(BenchmarkId::new("plain", name), &packet, |b, p| {
            b.iter(|| encode(black_box(p)))
        });
        group.bench_with_input(BenchmarkId::new("escaped", name), &packet, |b, p| {
            b.iter(|| encode_escaped(black_box(p)))
        });
    }
    group.finish();
}

/// The relay hot path: decode an inbound tunnel message, re-encode for serial.
fn bench_relay_roundtrip(c: &mut Criterion) {
    let line = "1.MSG;chat|hello\\|world";
    c.bench_function("relay_roundtrip", |b| {
        b.iter(|| {
            let packet = decode(black_box(line)).expect("line is a packet");
            format!("msg {}\n", encode(&packet))
        })
    });
}

criterion_group!(benches, bench_decode, bench_encode, bench_relay_roundtrip);
criterion_main!(benches);
