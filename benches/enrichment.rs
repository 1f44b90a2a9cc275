use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use gopca::{EnrichmentTester, GoTerm, RankedGeneList};

fn genes(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("gene{i}")).collect()
}

/// Pseudo-random loadings, so that annotated genes are spread over the list
fn loadings(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| ((i * 7919) % 10007) as f64 / 10007.0 - 0.5)
        .collect()
}

fn enrichment_benchmark(c: &mut Criterion) {
    let term = GoTerm::new("GO:0000001", "benchmark term", "BP");
    let tester = EnrichmentTester::new(5, 0.25, Some(1000), 1e-4).unwrap();

    let mut group = c.benchmark_group("xlmhg");
    for n_genes in [1000usize, 5000, 10000] {
        let genes = genes(n_genes);
        let loadings = loadings(n_genes);
        let ranked = RankedGeneList::from_loadings(&genes, &loadings, 1).unwrap();
        let annotated: Vec<usize> = (0..n_genes).step_by(50).collect();

        group.bench_with_input(BenchmarkId::from_parameter(n_genes), &n_genes, |b, _| {
            b.iter(|| {
                tester
                    .test(black_box(&ranked), black_box(&term), black_box(&annotated))
                    .unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(enrichment, enrichment_benchmark);
criterion_main!(enrichment);
