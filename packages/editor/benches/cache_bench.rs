//! Tree cache benchmarks
//!
//! Target: rebuild metadata for 10k nodes in <5ms

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nodegraph_editor::model::{FieldType, Node, RootSet, TypeDecl, TypeShapeRegistry, Value};
use nodegraph_editor::TreeCache;

fn registry() -> TypeShapeRegistry {
    TypeShapeRegistry::from_decls([
        TypeDecl::node("Constant")
            .field("value", FieldType::Float)
            .field("label", FieldType::Text)
            .field("weights", FieldType::list(FieldType::Float)),
        TypeDecl::node("Sum").multi_port("inputs"),
        TypeDecl::node("Negate").child("input"),
    ])
    .unwrap()
}

/// `fan_out` sums per level, `depth` levels deep, constants at the leaves
fn generate_tree(depth: usize, fan_out: usize) -> Node {
    if depth == 0 {
        return Node::new("Constant")
            .with("value", 1.0)
            .with("label", "leaf")
            .with("weights", vec![Value::Float(0.5); 8]);
    }
    let inputs: Vec<Value> = (0..fan_out)
        .map(|i| {
            let child = generate_tree(depth - 1, fan_out);
            if i % 2 == 0 {
                Value::from(Node::new("Negate").with("input", child))
            } else {
                Value::from(child)
            }
        })
        .collect();
    Node::new("Sum").with("inputs", inputs)
}

fn rebuild_small_tree(c: &mut Criterion) {
    let registry = registry();
    let roots = RootSet::from_nodes((0..4).map(|_| generate_tree(2, 3)).collect());
    let mut cache = TreeCache::new();

    c.bench_function("rebuild_small_tree", |b| {
        b.iter(|| {
            cache.mark_dirty();
            cache.refresh_if_needed(black_box(&roots), &registry)
        })
    });
}

fn rebuild_large_tree(c: &mut Criterion) {
    let registry = registry();
    let roots = RootSet::from_nodes((0..8).map(|_| generate_tree(5, 4)).collect());
    let mut cache = TreeCache::new();

    c.bench_function("rebuild_large_tree", |b| {
        b.iter(|| {
            cache.mark_dirty();
            cache.refresh_if_needed(black_box(&roots), &registry)
        })
    });
}

fn refresh_clean_cache(c: &mut Criterion) {
    let registry = registry();
    let roots = RootSet::from_nodes((0..8).map(|_| generate_tree(5, 4)).collect());
    let mut cache = TreeCache::new();
    cache.refresh_if_needed(&roots, &registry);

    c.bench_function("refresh_clean_cache", |b| {
        b.iter(|| cache.refresh_if_needed(black_box(&roots), &registry))
    });
}

fn dynamic_collect(c: &mut Criterion) {
    let roots = RootSet::from_nodes((0..8).map(|_| generate_tree(5, 4)).collect());

    c.bench_function("dynamic_collect_nodes", |b| {
        b.iter(|| black_box(&roots).collect_nodes(None).len())
    });
}

criterion_group!(
    benches,
    rebuild_small_tree,
    rebuild_large_tree,
    refresh_clean_cache,
    dynamic_collect
);
criterion_main!(benches);
