use criterion::{black_box, criterion_group, criterion_main, Criterion};
use muralkit_visualizer::{find_start_by_percent, parse_commands_sync, Point};

fn spiral_stream(moves: usize) -> String {
    let mut text = String::with_capacity(moves * 16);
    text.push_str("d0\nh2000\np1\n");
    for i in 0..moves {
        let t = i as f64 * 0.05;
        let r = 10.0 + t * 2.0;
        text.push_str(&format!("{:.3} {:.3}\n", 1000.0 + r * t.cos(), 1000.0 + r * t.sin()));
        if i % 500 == 0 {
            text.push_str(if i % 1000 == 0 { "p0\n" } else { "p1\n" });
        }
    }
    text
}

fn bench_parse(c: &mut Criterion) {
    let text = spiral_stream(100_000);
    c.bench_function("parse_commands_100k", |b| {
        b.iter(|| parse_commands_sync(black_box(&text), Point::default()))
    });
}

fn bench_seek(c: &mut Criterion) {
    let model = match parse_commands_sync(&spiral_stream(100_000), Point::default()) {
        Ok(model) => model,
        Err(e) => panic!("bench stream failed to parse: {}", e),
    };
    c.bench_function("find_start_by_percent", |b| {
        b.iter(|| {
            for p in 0..=100 {
                black_box(find_start_by_percent(&model, black_box(p as f64)));
            }
        })
    });
}

criterion_group!(benches, bench_parse, bench_seek);
criterion_main!(benches);
