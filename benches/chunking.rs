use criterion::{Criterion, criterion_group, criterion_main};
use policy_rag::embeddings::chunking::{ChunkingConfig, split_text};
use std::hint::black_box;

fn sample_handbook() -> String {
    let sections = [
        "Annual leave accrues at 2.08 days per month of service. Requests are submitted through the HR portal at least two weeks in advance.",
        "Remote work is available up to three days per week with manager approval.\nEquipment is provided by IT and must be returned when employment ends.",
        "Expenses are reimbursed within 30 days of submission. Receipts are required for every item above 25 EUR.",
    ];
    (0..200)
        .map(|i| format!("Section {}\n\n{}", i, sections[i % sections.len()]))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let text = sample_handbook();
    let config = ChunkingConfig::default();
    c.bench_function("chunking", |b| {
        b.iter(|| split_text(black_box(&text), black_box(&config)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
