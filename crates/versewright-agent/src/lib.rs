//! The interactive editing loop: sampling rounds, key decisions and the
//! token context they edit.

pub mod chunks;
pub mod controller;
pub mod decision;
pub mod session;

pub use chunks::{
    CHUNK_COUNT_HINT, ChunkCountError, choose_chunk_count, list_chunks, parse_chunk_count,
};
pub use controller::{EditingController, SessionOutcome, sample_request};
pub use decision::{DecisionEngine, HELP_LEGEND, KeyIntent, RoundView, classify_key};
pub use session::Session;
