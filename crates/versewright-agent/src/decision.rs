use anyhow::Result;
use versewright_core::{Action, Console, Key};
use versewright_local_ml::TokenCodec;

use crate::chunks::{choose_chunk_count, list_chunks};

/// Key bindings shown when an unbound key is pressed.
pub const HELP_LEGEND: &[&str] = &[
    "press 'enter' to accept",
    "press 'delete' to reject",
    "press an arrowkey to edit",
    "press backslash to delete chunk",
    "press 's' to save",
    "press 'r' to reset prompt",
    "press 'q' to quit",
    "",
    "(press any key to acknowledge these instructions.)",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyIntent {
    Accept,
    Reject,
    EditText,
    DeleteChunk,
    Save,
    Reset,
    Quit,
    Unknown,
}

pub fn classify_key(key: Key) -> KeyIntent {
    match key {
        Key::Enter => KeyIntent::Accept,
        Key::Backspace | Key::Delete => KeyIntent::Reject,
        Key::Escape => KeyIntent::EditText,
        k if k.is_arrow() => KeyIntent::EditText,
        Key::Char('\\') => KeyIntent::DeleteChunk,
        Key::Char('s') => KeyIntent::Save,
        Key::Char('r') => KeyIntent::Reset,
        Key::Char('q') | Key::Ctrl('c') | Key::Ctrl('z') => KeyIntent::Quit,
        _ => KeyIntent::Unknown,
    }
}

/// What the human is deciding about in one presentation.
#[derive(Debug, Clone, Copy)]
pub struct RoundView<'a> {
    pub visible: &'a str,
    pub candidate: &'a str,
    pub visible_tokens: &'a [u32],
}

/// Turns keystrokes into exactly one [`Action`] per call.
pub struct DecisionEngine<'a> {
    codec: &'a dyn TokenCodec,
}

impl<'a> DecisionEngine<'a> {
    pub fn new(codec: &'a dyn TokenCodec) -> Self {
        Self { codec }
    }

    pub fn decide(&self, console: &mut dyn Console, view: &RoundView<'_>) -> Result<Action> {
        loop {
            console.present(view.visible, view.candidate)?;
            let key = console.read_key()?;
            let action = match classify_key(key) {
                KeyIntent::Accept => Action::Accept(view.candidate.to_string()),
                KeyIntent::Reject => Action::Reject,
                KeyIntent::EditText => {
                    console.prompt_text(view.visible, "")?;
                    let line = console.read_line()?;
                    if line.is_empty() {
                        Action::CustomText("\n".to_string())
                    } else {
                        Action::CustomText(line)
                    }
                }
                KeyIntent::DeleteChunk => {
                    let chunks = list_chunks(self.codec, view.visible_tokens)?;
                    Action::DeleteChunk(choose_chunk_count(console, &chunks)?)
                }
                KeyIntent::Save => Action::Save(view.visible.to_string()),
                KeyIntent::Reset => Action::ResetPrompt,
                KeyIntent::Quit => Action::Quit,
                KeyIntent::Unknown => {
                    console.show_help(HELP_LEGEND)?;
                    console.read_key()?;
                    continue;
                }
            };
            return Ok(action);
        }
    }
}
