use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sitedrift::classify::RuleSet;
use sitedrift::store::diff;
use std::collections::BTreeSet;

/// Synthetic sitemap urls spread across the default categories
mod fixtures {
    use super::*;

    const SECTIONS: [&str; 4] = ["guides", "telephone-filaire", "informatique", "alarmes-securite"];
    const PAGES: [&str; 3] = ["cgv", "mentions-legales", "retours-sav"];

    pub fn urls(count: usize, seed: usize) -> BTreeSet<String> {
        (0..count)
            .map(|i| {
                let n = i + seed;
                match n % 10 {
                    0 => format!("https://site/{}/page-{n}.html", SECTIONS[n % SECTIONS.len()]),
                    1 => format!("https://site/{}", PAGES[n % PAGES.len()]),
                    2 => format!("https://site/blog/post-{n}"),
                    _ => format!("https://site/product-{n}.html"),
                }
            })
            .collect()
    }
}

fn bench_categorize(c: &mut Criterion) {
    let rules = RuleSet::defaults();
    let urls = fixtures::urls(5_000, 0);

    c.bench_function("categorize_5000", |b| {
        b.iter(|| {
            for url in &urls {
                black_box(rules.categorize(black_box(url)));
            }
        })
    });
}

fn bench_tally(c: &mut Criterion) {
    let rules = RuleSet::defaults();
    let mut group = c.benchmark_group("tally");

    for count in [500, 5_000] {
        let urls = fixtures::urls(count, 0);
        group.bench_with_input(BenchmarkId::new("urls", count), &urls, |b, urls| {
            b.iter(|| black_box(rules.tally(urls)))
        });
    }

    group.finish();
}

fn bench_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff");

    for count in [500, 5_000] {
        // overlapping windows, roughly 10% churn
        let previous = fixtures::urls(count, 0);
        let current = fixtures::urls(count, count / 10);
        group.bench_with_input(
            BenchmarkId::new("urls", count),
            &(previous, current),
            |b, (previous, current)| b.iter(|| black_box(diff(previous, current))),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_categorize, bench_tally, bench_diff);
criterion_main!(benches);
