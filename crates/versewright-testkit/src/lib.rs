//! Deterministic stand-ins for the model, tokenizer and terminal, so the
//! editing loop can be driven from a script.

use anyhow::{Result, anyhow, bail};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use versewright_core::{Chunk, EOT_MARKER, InputReader, Key, Screen};
use versewright_local_ml::{SampleRequest, SequenceSampler, TokenCodec};

/// Splits text into pieces that start with any leading whitespace followed by
/// a run of non-whitespace. The boundary marker is always id 0. Unseen pieces
/// are interned on first encode.
pub struct WordCodec {
    vocab: Mutex<Vocab>,
}

#[derive(Default)]
struct Vocab {
    pieces: Vec<String>,
    ids: HashMap<String, u32>,
}

impl Vocab {
    fn intern(&mut self, piece: &str) -> u32 {
        if let Some(id) = self.ids.get(piece) {
            return *id;
        }
        let id = self.pieces.len() as u32;
        self.pieces.push(piece.to_string());
        self.ids.insert(piece.to_string(), id);
        id
    }
}

impl Default for WordCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl WordCodec {
    pub fn new() -> Self {
        let mut vocab = Vocab::default();
        vocab.intern(EOT_MARKER);
        Self {
            vocab: Mutex::new(vocab),
        }
    }

    /// Encode `text`, panicking on failure. Test helper.
    pub fn ids(&self, text: &str) -> Vec<u32> {
        self.encode(text).expect("word codec encode")
    }
}

fn split_pieces(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut seen_word = false;
    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if seen_word {
                pieces.push(&text[start..idx]);
                start = idx;
                seen_word = false;
            }
        } else {
            seen_word = true;
        }
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

impl TokenCodec for WordCodec {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let mut vocab = self
            .vocab
            .lock()
            .map_err(|e| anyhow!("vocab lock poisoned: {}", e))?;
        let mut ids = Vec::new();
        for (i, segment) in text.split(EOT_MARKER).enumerate() {
            if i > 0 {
                ids.push(0);
            }
            for piece in split_pieces(segment) {
                ids.push(vocab.intern(piece));
            }
        }
        Ok(ids)
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        let vocab = self
            .vocab
            .lock()
            .map_err(|e| anyhow!("vocab lock poisoned: {}", e))?;
        let mut text = String::new();
        for id in ids {
            let piece = vocab
                .pieces
                .get(*id as usize)
                .ok_or_else(|| anyhow!("unknown token id {id}"))?;
            text.push_str(piece);
        }
        Ok(text)
    }
}

/// Returns queued batches in order and records every context it was given.
#[derive(Default)]
pub struct ScriptedSampler {
    batches: VecDeque<Vec<Vec<u32>>>,
    pub contexts: Vec<Vec<u32>>,
    pub requests: Vec<SampleRequest>,
}

impl ScriptedSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_batch(&mut self, batch: Vec<Vec<u32>>) -> &mut Self {
        self.batches.push_back(batch);
        self
    }

    /// Queue a batch whose candidates are the encodings of `texts`.
    pub fn push_texts(&mut self, codec: &WordCodec, texts: &[&str]) -> &mut Self {
        let batch = texts.iter().map(|text| codec.ids(text)).collect();
        self.push_batch(batch)
    }
}

impl SequenceSampler for ScriptedSampler {
    fn sample(&mut self, context: &[u32], request: &SampleRequest) -> Result<Vec<Vec<u32>>> {
        self.contexts.push(context.to_vec());
        self.requests.push(*request);
        match self.batches.pop_front() {
            Some(batch) => Ok(batch),
            None => bail!("scripted sampler exhausted"),
        }
    }

    fn model_id(&self) -> &str {
        "scripted-sampler"
    }
}

/// Everything a scripted console was asked to draw.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Present { visible: String, candidate: String },
    Help,
    Chunks(Vec<Chunk>),
    Prompt { text: String, prompt: String },
    Notice(String),
}

/// Console fed from queued keys and lines.
#[derive(Default)]
pub struct ScriptedConsole {
    keys: VecDeque<Key>,
    lines: VecDeque<String>,
    pub frames: Vec<Frame>,
}

impl ScriptedConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(mut self, keys: impl IntoIterator<Item = Key>) -> Self {
        self.keys.extend(keys);
        self
    }

    pub fn lines<S: Into<String>>(mut self, lines: impl IntoIterator<Item = S>) -> Self {
        self.lines.extend(lines.into_iter().map(Into::into));
        self
    }

    /// The `(visible, candidate)` pairs presented so far.
    pub fn presented(&self) -> Vec<(String, String)> {
        self.frames
            .iter()
            .filter_map(|frame| match frame {
                Frame::Present { visible, candidate } => {
                    Some((visible.clone(), candidate.clone()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.frames
            .iter()
            .filter_map(|frame| match frame {
                Frame::Prompt { prompt, .. } => Some(prompt.clone()),
                _ => None,
            })
            .collect()
    }
}

impl InputReader for ScriptedConsole {
    fn read_key(&mut self) -> Result<Key> {
        self.keys
            .pop_front()
            .ok_or_else(|| anyhow!("input stream closed: no scripted keys left"))
    }

    fn read_line(&mut self) -> Result<String> {
        self.lines
            .pop_front()
            .ok_or_else(|| anyhow!("input stream closed: no scripted lines left"))
    }
}

impl Screen for ScriptedConsole {
    fn present(&mut self, visible: &str, candidate: &str) -> Result<()> {
        self.frames.push(Frame::Present {
            visible: visible.to_string(),
            candidate: candidate.to_string(),
        });
        Ok(())
    }

    fn show_help(&mut self, _legend: &[&str]) -> Result<()> {
        self.frames.push(Frame::Help);
        Ok(())
    }

    fn show_chunks(&mut self, chunks: &[Chunk]) -> Result<()> {
        self.frames.push(Frame::Chunks(chunks.to_vec()));
        Ok(())
    }

    fn prompt_text(&mut self, text: &str, prompt: &str) -> Result<()> {
        self.frames.push(Frame::Prompt {
            text: text.to_string(),
            prompt: prompt.to_string(),
        });
        Ok(())
    }

    fn notice(&mut self, message: &str) -> Result<()> {
        self.frames.push(Frame::Notice(message.to_string()));
        Ok(())
    }
}

/// Writes a model directory with `hparams.json`, `tokenizer.json` and a
/// placeholder `model.gguf`.
pub fn write_model_dir(dir: &Path, n_ctx: usize) -> Result<()> {
    fs::create_dir_all(dir)?;
    let hparams = serde_json::json!({
        "n_ctx": n_ctx,
        "n_vocab": 50257,
        "n_embd": 768,
        "n_head": 12,
        "n_layer": 12,
    });
    fs::write(dir.join("hparams.json"), serde_json::to_vec_pretty(&hparams)?)?;
    fs::write(dir.join("tokenizer.json"), "{}")?;
    fs::write(dir.join("model.gguf"), b"GGUF")?;
    Ok(())
}

/// Temporary workspace holding `models/<name>` ready for layout checks.
pub fn workspace_with_model(name: &str, n_ctx: usize) -> Result<tempfile::TempDir> {
    let workspace = tempfile::tempdir()?;
    write_model_dir(&workspace.path().join("models").join(name), n_ctx)?;
    Ok(workspace)
}
