use criterion::{Criterion, black_box, criterion_group, criterion_main};

use cortex_truncate::Truncator;

fn make_json(n: usize) -> String {
    serde_json::json!({
        "rows": (0..n).map(|i| serde_json::json!({
            "id": i,
            "name": format!("row-{i}"),
            "payload": "data ".repeat(8),
        })).collect::<Vec<_>>(),
    })
    .to_string()
}

fn make_tree(dirs: usize, files: usize) -> String {
    let mut out = String::from("repo\n");
    for d in 0..dirs {
        out.push_str(&format!("├── crate{d}\n"));
        for f in 0..files {
            out.push_str(&format!("│   ├── mod{f}.rs\n"));
        }
    }
    out
}

fn bench_truncation(c: &mut Criterion) {
    let truncator = Truncator::default();
    let mut group = c.benchmark_group("truncate");

    for n in [100, 1000, 10_000] {
        let json = make_json(n);
        group.bench_function(format!("json_{n}_rows"), |b| {
            b.iter(|| truncator.truncate(black_box(&json), 4096, None).unwrap())
        });
    }

    let tree = make_tree(200, 50);
    group.bench_function("tree_10k_lines", |b| {
        b.iter(|| truncator.truncate(black_box(&tree), 8192, None).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_truncation);
criterion_main!(benches);
