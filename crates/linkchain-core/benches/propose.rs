use criterion::{criterion_group, criterion_main, Criterion};
use linkchain_core::{ChainConfig, ChainManager};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::json;

fn bench_propose(c: &mut Criterion) {
    c.bench_function("propose_small_payload", |b| {
        let chain = ChainManager::new(ChainConfig::default());
        let mut rng = StdRng::seed_from_u64(42);
        b.iter(|| {
            let _block = chain
                .propose(&json!({ "qty": rng.gen_range(1..100u32), "to": "bob" }))
                .expect("propose");
        });
    });
}

fn bench_verify(c: &mut Criterion) {
    c.bench_function("verify_1000_blocks", |b| {
        let chain = ChainManager::new(ChainConfig::default());
        let mut rng = StdRng::seed_from_u64(7);
        for i in 0..1000 {
            chain
                .propose(&json!({ "seq": i, "qty": rng.gen_range(1..100u32) }))
                .expect("propose");
        }
        b.iter(|| {
            assert!(chain.verify().is_valid());
        });
    });
}

criterion_group!(benches, bench_propose, bench_verify);
criterion_main!(benches);
