//! Extraction Benchmarks
//!
//! Token scanning, width assignment and choice detection over synthetic
//! text layers, without the PDF engine in the loop.
//!
//! Run with: `cargo bench --bench extraction`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use pdf_autofill::document::{PageText, TextRun};
use pdf_autofill::extract::{assign_widths, scan_tokens, ChoiceExtractor, PlaceholderExtractor};
use pdf_autofill::profile::ExtractionSettings;
use pdf_autofill::record::{Namespace, SourceRecord};
use pdf_autofill::resolver::FieldResolver;

const TOKENS: [&str; 6] = [
    "{firstName}",
    "{lastName}",
    "{dateOfBirth}",
    "{address}",
    "{phone}",
    "{email}",
];

/// A form-like page: labels, tokens on shared lines and split choice tokens
fn synthetic_page(page: usize, lines: usize) -> PageText {
    let mut runs = Vec::new();
    for line in 0..lines {
        let y = 60.0 + line as f32 * 18.0;
        runs.push(TextRun::new("Label:", 40.0, y, 34.0, 10.0));
        for (slot, token) in TOKENS.iter().enumerate().take(1 + line % 3) {
            let x = 100.0 + slot as f32 * 150.0;
            runs.push(TextRun::new(*token, x, y, token.len() as f32 * 5.2, 10.0));
        }
        if line % 4 == 0 {
            let option = line / 4 + 1;
            runs.push(TextRun::new("{radio_", 480.0, y, 32.0, 10.0));
            runs.push(TextRun::new(format!("id_{}}}", option), 513.0, y, 24.0, 10.0));
        }
    }
    PageText {
        page,
        width: 612.0,
        height: 792.0,
        runs,
    }
}

fn pages(count: usize, lines: usize) -> Vec<PageText> {
    (0..count).map(|p| synthetic_page(p, lines)).collect()
}

fn bench_placeholder_stages(c: &mut Criterion) {
    let settings = ExtractionSettings::default();
    let mut group = c.benchmark_group("placeholder");

    for page_count in [1usize, 5, 20] {
        let input = pages(page_count, 40);
        group.throughput(Throughput::Elements(page_count as u64));

        group.bench_with_input(BenchmarkId::new("scan_tokens", page_count), &input, |b, input| {
            b.iter(|| scan_tokens(black_box(input), &settings))
        });

        let pending = scan_tokens(&input, &settings);
        group.bench_with_input(
            BenchmarkId::new("assign_widths", page_count),
            &pending,
            |b, pending| b.iter(|| assign_widths(black_box(pending.clone()), |_| 612.0, &settings)),
        );
    }

    group.finish();
}

fn bench_full_extraction(c: &mut Criterion) {
    let resolver = FieldResolver::default();
    let placeholders = PlaceholderExtractor::new(resolver.clone());
    let choices = ChoiceExtractor::new(resolver);
    let record = SourceRecord::default()
        .with(Namespace::Subject, "firstName", "Ada")
        .with(Namespace::Subject, "lastName", "Lovelace");
    let input = pages(10, 40);

    let mut group = c.benchmark_group("extract");
    group.bench_function("fields_10_pages", |b| {
        b.iter(|| placeholders.extract(black_box(&input), &record))
    });
    group.bench_function("choices_10_pages", |b| {
        b.iter(|| choices.extract(black_box(&input)))
    });
    group.finish();
}

criterion_group!(benches, bench_placeholder_stages, bench_full_extraction);
criterion_main!(benches);
