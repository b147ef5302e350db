use anyhow::Result;
use std::num::IntErrorKind;
use versewright_core::{Chunk, Console};
use versewright_local_ml::TokenCodec;

pub const CHUNK_COUNT_HINT: &str = "# Tokens To Remove: ";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkCountError {
    #[error("expected a whole number of tokens, got {0:?}")]
    NotANumber(String),
    #[error("cannot remove a negative number of tokens ({0})")]
    Negative(i64),
}

/// One chunk per visible token, oldest first, indexed from the newest.
pub fn list_chunks(codec: &dyn TokenCodec, visible_tokens: &[u32]) -> Result<Vec<Chunk>> {
    let n = visible_tokens.len();
    visible_tokens
        .iter()
        .enumerate()
        .map(|(pos, id)| {
            Ok(Chunk {
                index: n - pos - 1,
                text: codec.decode(&[*id])?,
            })
        })
        .collect()
}

/// Parses a typed removal count, clamped to the `available` chunks.
pub fn parse_chunk_count(line: &str, available: usize) -> Result<usize, ChunkCountError> {
    let trimmed = line.trim();
    match trimmed.parse::<usize>() {
        Ok(count) => Ok(count.min(available)),
        Err(err) if *err.kind() == IntErrorKind::PosOverflow => Ok(available),
        Err(_) => match trimmed.parse::<i64>() {
            Ok(negative) => Err(ChunkCountError::Negative(negative)),
            Err(_) => Err(ChunkCountError::NotANumber(trimmed.to_string())),
        },
    }
}

/// Lists `chunks` and reads lines until one is a valid count.
pub fn choose_chunk_count(console: &mut dyn Console, chunks: &[Chunk]) -> Result<usize> {
    console.show_chunks(chunks)?;
    loop {
        let line = console.read_line()?;
        match parse_chunk_count(&line, chunks.len()) {
            Ok(count) => return Ok(count),
            Err(_) => console.notice(CHUNK_COUNT_HINT)?,
        }
    }
}
