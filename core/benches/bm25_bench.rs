use criterion::{criterion_group, criterion_main, Criterion};
use skylore_core::bm25::Bm25Params;
use skylore_core::lexical::LexicalIndex;
use skylore_core::{Constellation, RecordStore};

const WORDS: &[&str] = &["狩人", "女神", "怪物", "王女", "竪琴", "冒険", "伝説", "勇者", "夜空", "白鳥"];

fn corpus(n: usize) -> RecordStore {
    RecordStore::new(
        (0..n)
            .map(|i| Constellation {
                id: format!("C{i}"),
                jp_name: format!("星座{i}"),
                myth_summary: (0..30).map(|j| WORDS[(i * 7 + j * 3) % WORDS.len()]).collect::<Vec<_>>().join(" "),
                best_months: vec![(i % 12 + 1) as u8],
                ..Default::default()
            })
            .collect(),
    )
}

fn bench_bm25(c: &mut Criterion) {
    let lex = LexicalIndex::build(&corpus(88));
    c.bench_function("bm25_search_88", |b| b.iter(|| lex.search("冬の夜空に輝く狩人と女神", 10, Bm25Params::default())));
}

criterion_group!(benches, bench_bm25);
criterion_main!(benches);
