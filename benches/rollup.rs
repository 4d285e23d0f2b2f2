//! Benchmarks for lexicon matching and corpus rollup.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use coinmood::ensemble::{EnsembleCombiner, SignalWeightTable};
use coinmood::lexicon::{AspectLexicon, EntityLexicon, LexiconMatcher};
use coinmood::rollup::{Aggregator, ArticleRecord};
use coinmood::signal::{ProviderRegistry, ValenceLexiconProvider};
use coinmood::weighting::{CredibilityTable, WeightingEngine};

const TEXT: &str = "Bitcoin price surged past its all-time high as institutional investors \
    piled into spot ETFs. Ethereum lagged after the SEC delayed a decision on staking. \
    Analysts expect XRP volatility to remain elevated while regulation stays unclear.";

fn matcher() -> LexiconMatcher {
    LexiconMatcher::new(&EntityLexicon::default(), &AspectLexicon::default(), Some("crypto"))
        .unwrap()
}

fn corpus(n: usize) -> Vec<ArticleRecord> {
    (0..n)
        .map(|i| ArticleRecord {
            title: format!("Market wrap #{i}"),
            description: TEXT.to_string(),
            url: format!("https://www.coindesk.com/markets/{i}"),
            source: "CoinDesk".into(),
            published_at: Some("2024-05-01T08:00:00Z".into()),
            ..Default::default()
        })
        .collect()
}

fn bench_identify(c: &mut Criterion) {
    let m = matcher();
    c.bench_function("identify_default_lexicons", |bench| {
        bench.iter(|| black_box(m.identify(black_box(TEXT))))
    });
}

fn bench_aggregate(c: &mut Criterion) {
    let m = matcher();
    let mut registry = ProviderRegistry::new();
    registry.register(Box::new(ValenceLexiconProvider::new()));
    let combiner = EnsembleCombiner::new(registry, SignalWeightTable::default());
    let weighting = WeightingEngine::new(CredibilityTable::default(), true, true);
    let aggregator = Aggregator::new(&m, &combiner, &weighting);
    let articles = corpus(100);

    c.bench_function("aggregate_100_articles", |bench| {
        bench.iter(|| black_box(aggregator.aggregate(&articles)))
    });
}

criterion_group!(benches, bench_identify, bench_aggregate);
criterion_main!(benches);
