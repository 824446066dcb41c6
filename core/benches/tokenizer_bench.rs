use criterion::{criterion_group, criterion_main, Criterion};
use documind_core::tokenizer::tokenize;

const SAMPLE: &str = "Quarterly marketing strategy: growth targets, hiring plans and the \
    budget review for Q3. Authors should update the roadmap before Friday's sync; \
    action items are tracked in the shared tracker.";

fn bench_tokenize(c: &mut Criterion) {
    let text = SAMPLE.repeat(50);
    c.bench_function("tokenize_memo", |b| b.iter(|| tokenize(&text)));
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
