use anyhow::Result;

use crate::logits::SamplingParams;

/// One batch request against a sequence sampler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRequest {
    pub batch_size: usize,
    /// Tokens generated per candidate.
    pub length: usize,
    pub temperature: f32,
    pub top_k: usize,
    pub top_p: f32,
}

impl SampleRequest {
    pub fn params(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            top_k: self.top_k,
            top_p: self.top_p,
        }
    }
}

/// Produces batches of continuations for a token context.
///
/// Each returned sequence holds only the new tokens, exactly `length` of them,
/// and there are exactly `batch_size` sequences.
pub trait SequenceSampler {
    fn sample(&mut self, context: &[u32], request: &SampleRequest) -> Result<Vec<Vec<u32>>>;

    /// Model identifier string.
    fn model_id(&self) -> &str;
}

/// The tail of `context` the model is conditioned on, leaving room for
/// `length` new tokens inside an `n_ctx` window.
pub fn conditioning_window(context: &[u32], n_ctx: usize, length: usize) -> &[u32] {
    let room = n_ctx.saturating_sub(length);
    &context[context.len().saturating_sub(room)..]
}

#[cfg(feature = "local-ml")]
pub mod candle_backend;
