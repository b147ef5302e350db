pub mod checkpoint;
pub mod codec;
pub mod logits;
pub mod sampler;

pub use checkpoint::{CheckpointError, CheckpointLayout, Hparams};
pub use codec::TokenCodec;
pub use logits::{LogitSampler, SamplingParams, filter_logits};
pub use sampler::{SampleRequest, SequenceSampler, conditioning_window};

#[cfg(feature = "local-ml")]
pub use codec::tokenizer_backend::TokenizerCodec;
#[cfg(feature = "local-ml")]
pub use sampler::candle_backend::CandleSampler;

/// Load the codec and sampler for a validated layout on the CPU.
#[cfg(feature = "local-ml")]
pub fn load_local_model(
    layout: &CheckpointLayout,
    seed: Option<u64>,
) -> anyhow::Result<(TokenizerCodec, CandleSampler)> {
    let codec = TokenizerCodec::load(&layout.tokenizer_path)?;
    let sampler = CandleSampler::load(layout, seed, &candle_core::Device::Cpu)?;
    Ok((codec, sampler))
}
