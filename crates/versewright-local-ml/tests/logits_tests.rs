use proptest::prelude::*;
use versewright_local_ml::{LogitSampler, SamplingParams, filter_logits};

fn params(temperature: f32, top_k: usize, top_p: f32) -> SamplingParams {
    SamplingParams {
        temperature,
        top_k,
        top_p,
    }
}

#[test]
fn top_k_keeps_the_k_largest_logits() {
    let logits = [0.5, 3.0, 1.0, 2.0, -4.0];
    let filtered = filter_logits(&logits, &params(1.0, 2, 0.0));
    let ids: Vec<u32> = filtered.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![1, 3]);
}

#[test]
fn unrestricted_filter_keeps_every_finite_token() {
    let logits = [0.0, 1.0, 2.0, 3.0];
    let filtered = filter_logits(&logits, &params(1.0, 0, 0.0));
    assert_eq!(filtered.len(), 4);
}

#[test]
fn nucleus_always_keeps_at_least_one_token() {
    let logits = [10.0, 0.0, 0.0];
    let filtered = filter_logits(&logits, &params(1.0, 0, 0.01));
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].0, 0);
}

#[test]
fn seeded_samplers_repeat_the_same_draws() {
    let logits: Vec<f32> = (0..32).map(|i| (i % 7) as f32 * 0.3).collect();
    let p = params(1.0, 0, 0.0);
    let mut a = LogitSampler::new(Some(99));
    let mut b = LogitSampler::new(Some(99));
    let draws_a: Vec<u32> = (0..20).map(|_| a.sample(&logits, &p).unwrap()).collect();
    let draws_b: Vec<u32> = (0..20).map(|_| b.sample(&logits, &p).unwrap()).collect();
    assert_eq!(draws_a, draws_b);
}

proptest! {
    #[test]
    fn filtered_distribution_is_normalised(
        logits in prop::collection::vec(-20.0f32..20.0, 1..64),
        top_k in 0usize..16,
        top_p in 0.0f32..1.0,
        temperature in 0.05f32..2.0,
    ) {
        let filtered = filter_logits(&logits, &params(temperature, top_k, top_p));
        prop_assert!(!filtered.is_empty());
        if top_p == 0.0 && top_k > 0 {
            prop_assert!(filtered.len() <= top_k);
        }
        let total: f64 = filtered.iter().map(|(_, p)| p).sum();
        prop_assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn sampled_token_survives_the_filter(
        logits in prop::collection::vec(-5.0f32..5.0, 2..32),
        top_k in 1usize..8,
        seed in any::<u64>(),
    ) {
        let p = params(1.0, top_k, 0.0);
        let allowed: Vec<u32> = filter_logits(&logits, &p).iter().map(|(id, _)| *id).collect();
        let token = LogitSampler::new(Some(seed)).sample(&logits, &p).unwrap();
        prop_assert!(allowed.contains(&token));
    }
}
