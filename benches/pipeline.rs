use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

use phishtriage::classify::PhishingClassifier;
use phishtriage::config::ModelConfig;
use phishtriage::reasons::extract_reasons;
use phishtriage::text::Normalizer;

const SAMPLE: &str = "Dear customer, we noticed unusual sign-in activity on your bank account. \
Please click here to verify your identity and update account details within 24 hours \
or your access will be suspended: http://192.168.10.4/secure/login. \
Do not share your password with anyone. Thank you for banking with us.";

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn bench_normalize(c: &mut Criterion) {
    let normalizer = Normalizer::default();
    c.bench_function("normalize_sample", |b| b.iter(|| normalizer.normalize(SAMPLE)));
}

fn bench_reasons(c: &mut Criterion) {
    c.bench_function("extract_reasons_sample", |b| b.iter(|| extract_reasons(SAMPLE)));
}

fn bench_classify(c: &mut Criterion) {
    let config = ModelConfig {
        vectorizer_path: fixture("vectorizer.json"),
        classifier_path: fixture("forest_model.json"),
        ..ModelConfig::default()
    };
    let classifier = PhishingClassifier::load(&config, Normalizer::default()).unwrap();

    c.bench_function("classify_sample", |b| b.iter(|| classifier.classify(SAMPLE)));

    let batch: Vec<&str> = std::iter::repeat(SAMPLE).take(256).collect();
    c.bench_function("classify_batch_256", |b| {
        b.iter(|| classifier.classify_batch(&batch))
    });
}

criterion_group!(benches, bench_normalize, bench_reasons, bench_classify);
criterion_main!(benches);
