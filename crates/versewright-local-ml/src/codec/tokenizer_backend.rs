//! `tokenizers`-backed codec.
//!
//! Only compiled with the `local-ml` feature. Special tokens declared in
//! `tokenizer.json` (the boundary marker among them) are matched during encode
//! and kept during decode.

use anyhow::{Result, anyhow};
use std::path::Path;
use tokenizers::Tokenizer;

use super::TokenCodec;

pub struct TokenizerCodec {
    tokenizer: Tokenizer,
}

impl TokenizerCodec {
    pub fn load(tokenizer_path: &Path) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow!("failed to load tokenizer: {}", e))?;
        Ok(Self { tokenizer })
    }
}

impl TokenCodec for TokenizerCodec {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| anyhow!("tokenization failed: {}", e))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        self.tokenizer
            .decode(ids, false)
            .map_err(|e| anyhow!("decode failed: {}", e))
    }
}
