use criterion::{criterion_group, criterion_main, Criterion};
use skylore_core::tokenizer::tokenize;

fn bench_tokenize(c: &mut Criterion) {
    let text = "オリオンは海の神ポセイドンの息子で、腕の良い狩人でした。\u{3000}冬の夜空で最も目立つ星座の一つです。".repeat(40);
    c.bench_function("tokenize_myth", |b| b.iter(|| tokenize(&text)));
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
