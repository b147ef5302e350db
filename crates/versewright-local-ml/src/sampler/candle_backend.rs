//! Candle-based batch sampler.
//!
//! This module is only compiled when the `local-ml` feature is enabled.
//! The whole batch runs through the model together: the conditioning window
//! is replicated once per candidate, then each step feeds one new token per
//! row at the next position.

use anyhow::{Result, anyhow, bail};
use candle_core::quantized::gguf_file;
use candle_core::{DType, Device, Tensor};
use candle_transformers::models::quantized_llama::ModelWeights;

use super::{SampleRequest, SequenceSampler, conditioning_window};
use crate::checkpoint::CheckpointLayout;
use crate::logits::LogitSampler;

/// Quantized GGUF model sampled autoregressively on a Candle device.
pub struct CandleSampler {
    model: ModelWeights,
    device: Device,
    n_ctx: usize,
    logits: LogitSampler,
    model_id_str: String,
}

impl CandleSampler {
    /// Load the weights named by a resolved checkpoint layout.
    pub fn load(layout: &CheckpointLayout, seed: Option<u64>, device: &Device) -> Result<Self> {
        let mut file = std::fs::File::open(&layout.weights_path)?;
        let content = gguf_file::Content::read(&mut file)
            .map_err(|e| anyhow!("failed to read checkpoint weights: {}", e))?;
        let model = ModelWeights::from_gguf(content, &mut file, device)?;

        let model_id_str = layout
            .weights_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("candle-sampler")
            .to_string();

        Ok(Self {
            model,
            device: device.clone(),
            n_ctx: layout.hparams.n_ctx,
            logits: LogitSampler::new(seed),
            model_id_str,
        })
    }

    fn sample_rows(&mut self, logits: &Tensor, request: &SampleRequest) -> Result<Vec<u32>> {
        let rows = logits.to_dtype(DType::F32)?.to_vec2::<f32>()?;
        let params = request.params();
        rows.iter()
            .map(|row| self.logits.sample(row, &params))
            .collect()
    }
}

impl SequenceSampler for CandleSampler {
    fn sample(&mut self, context: &[u32], request: &SampleRequest) -> Result<Vec<Vec<u32>>> {
        if request.length > self.n_ctx {
            bail!(
                "can't get samples longer than window size: {} (requested {})",
                self.n_ctx,
                request.length
            );
        }
        let window = conditioning_window(context, self.n_ctx, request.length);
        if window.is_empty() || request.batch_size == 0 || request.length == 0 {
            bail!("nothing to condition on");
        }

        let batch = request.batch_size;
        let mut input: Vec<u32> = Vec::with_capacity(batch * window.len());
        for _ in 0..batch {
            input.extend_from_slice(window);
        }
        let input = Tensor::from_vec(input, (batch, window.len()), &self.device)?;
        let logits = self.model.forward(&input, 0)?;
        let mut step = self.sample_rows(&logits, request)?;

        let mut rows: Vec<Vec<u32>> = step.iter().map(|&token| vec![token]).collect();
        let mut pos = window.len();
        while rows[0].len() < request.length {
            let input = Tensor::from_vec(step.clone(), (batch, 1), &self.device)?;
            let logits = self.model.forward(&input, pos)?;
            step = self.sample_rows(&logits, request)?;
            for (row, &token) in rows.iter_mut().zip(&step) {
                row.push(token);
            }
            pos += 1;
        }
        Ok(rows)
    }

    fn model_id(&self) -> &str {
        &self.model_id_str
    }
}
