use anyhow::Result;
use versewright_core::EOT_MARKER;

/// Converts between text and token ids.
///
/// Implementations must recognise [`EOT_MARKER`] as a boundary, so that
/// `encode(EOT_MARKER + text)` always starts with `encode(EOT_MARKER)`.
pub trait TokenCodec {
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    fn decode(&self, ids: &[u32]) -> Result<String>;

    /// Textual form of the boundary marker.
    fn boundary_marker(&self) -> &str {
        EOT_MARKER
    }

    /// Encoding of the boundary marker alone.
    fn boundary_tokens(&self) -> Result<Vec<u32>> {
        self.encode(self.boundary_marker())
    }
}

#[cfg(feature = "local-ml")]
pub mod tokenizer_backend;
