use criterion::{criterion_group, criterion_main, Criterion};
use urlindex::tokenizer::{char_sequence, normalize, word_set};

fn bench_tokenize(c: &mut Criterion) {
    let text = include_str!("../README.md");
    c.bench_function("word_set_readme", |b| b.iter(|| word_set(text)));
    c.bench_function("normalize_readme", |b| b.iter(|| normalize(text)));
    c.bench_function("char_sequence_url", |b| {
        b.iter(|| char_sequence("http://www.some-fairly-long-hostname.example.com/path"))
    });
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
