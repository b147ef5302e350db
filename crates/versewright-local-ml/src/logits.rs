//! Next-token selection from raw logits.
//!
//! Temperature scaling is applied first, then either nucleus (top-p) or top-k
//! filtering, then a draw from the renormalised distribution. A positive
//! `top_p` takes precedence over `top_k`; `top_k == 0` means unrestricted and
//! a temperature of 0 selects the argmax.

use anyhow::{Result, bail};
use rand::SeedableRng;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_k: usize,
    pub top_p: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_k: 0,
            top_p: 0.0,
        }
    }
}

/// Returns the surviving `(token_id, probability)` pairs, most likely first.
/// Non-finite logits are treated as masked out.
pub fn filter_logits(logits: &[f32], params: &SamplingParams) -> Vec<(u32, f64)> {
    let mut ranked: Vec<(u32, f64)> = logits
        .iter()
        .enumerate()
        .filter(|(_, logit)| logit.is_finite())
        .map(|(id, logit)| (id as u32, f64::from(*logit)))
        .collect();
    if ranked.is_empty() {
        return ranked;
    }
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    if params.temperature <= 0.0 {
        return vec![(ranked[0].0, 1.0)];
    }

    let temperature = f64::from(params.temperature);
    let max = ranked[0].1 / temperature;
    let mut probs: Vec<(u32, f64)> = ranked
        .into_iter()
        .map(|(id, logit)| (id, (logit / temperature - max).exp()))
        .collect();
    normalize(&mut probs);

    let keep = if params.top_p > 0.0 {
        nucleus_len(&probs, f64::from(params.top_p))
    } else if params.top_k > 0 {
        params.top_k.min(probs.len())
    } else {
        probs.len()
    };
    probs.truncate(keep);
    normalize(&mut probs);
    probs
}

/// Smallest prefix whose inclusive cumulative probability stays within `p`,
/// never fewer than one token.
fn nucleus_len(sorted: &[(u32, f64)], p: f64) -> usize {
    let mut cumulative = 0.0;
    let mut keep = 0;
    for (_, prob) in sorted {
        cumulative += prob;
        if cumulative <= p + 1e-9 {
            keep += 1;
        } else {
            break;
        }
    }
    keep.max(1)
}

fn normalize(probs: &mut [(u32, f64)]) {
    let total: f64 = probs.iter().map(|(_, p)| p).sum();
    if total > 0.0 {
        for (_, p) in probs.iter_mut() {
            *p /= total;
        }
    }
}

/// Draws token ids from filtered logits with its own RNG.
pub struct LogitSampler {
    rng: StdRng,
}

impl LogitSampler {
    /// A fixed `seed` makes the sequence of draws reproducible.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    pub fn sample(&mut self, logits: &[f32], params: &SamplingParams) -> Result<u32> {
        let filtered = filter_logits(logits, params);
        match filtered.len() {
            0 => bail!("no finite logits to sample from"),
            1 => Ok(filtered[0].0),
            _ => {
                let dist = WeightedIndex::new(filtered.iter().map(|(_, p)| *p))?;
                Ok(filtered[dist.sample(&mut self.rng)].0)
            }
        }
    }
}
