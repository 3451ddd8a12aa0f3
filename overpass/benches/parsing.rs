//! Benchmarks pour le parsing des réponses Overpass

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use overpass::HighwayFilter;

/// Génère une réponse `out geom` synthétique avec `ways` chemins de `vertices` points
fn synthetic_response(ways: usize, vertices: usize) -> Vec<u8> {
    let mut out = String::from(r#"{"version":0.6,"elements":["#);
    for i in 0..ways {
        if i > 0 {
            out.push(',');
        }
        let highway = if i % 3 == 0 { "footway" } else if i % 2 == 0 { "track" } else { "path" };
        out.push_str(&format!(r#"{{"type":"way","id":{},"geometry":["#, i));
        for v in 0..vertices {
            if v > 0 {
                out.push(',');
            }
            let lat = 30.0 + (i as f64) * 1e-4 + (v as f64) * 1e-5;
            let lon = -120.0 + (v as f64) * 1e-5;
            out.push_str(&format!(r#"{{"lat":{},"lon":{}}}"#, lat, lon));
        }
        out.push_str(&format!(
            r#"],"tags":{{"highway":"{}","name":"Trail {}","surface":"gravel"}}}}"#,
            highway, i
        ));
    }
    out.push_str("]}");
    out.into_bytes()
}

fn bench_parse_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_response");

    for ways in [100usize, 1_000, 10_000] {
        let data = synthetic_response(ways, 20);
        group.throughput(Throughput::Bytes(data.len() as u64));

        group.bench_with_input(BenchmarkId::from_parameter(ways), &data, |b, data| {
            b.iter(|| {
                let result = overpass::parse_response(black_box(data), None).unwrap();
                black_box(result.features.len())
            })
        });
    }

    group.finish();
}

fn bench_parse_filtered(c: &mut Criterion) {
    let data = synthetic_response(5_000, 20);
    let filter = HighwayFilter::default();

    let mut group = c.benchmark_group("parse_filtered");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.sample_size(20);

    group.bench_function("path_track", |b| {
        b.iter(|| {
            let result = overpass::parse_response(black_box(&data), Some(&filter)).unwrap();
            black_box(result.features.len())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_parse_sizes, bench_parse_filtered);
criterion_main!(benches);
