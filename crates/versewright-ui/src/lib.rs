//! Terminal front end: single-keystroke capture in raw mode and full-screen
//! redraws of the document and the pending candidate.

use anyhow::{Result, bail};
use crossterm::cursor::MoveTo;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Print, PrintStyledContent, Stylize};
use crossterm::terminal::{Clear, ClearType, disable_raw_mode, enable_raw_mode};
use crossterm::{execute, queue};
use std::io::{self, BufRead, IsTerminal, Stdout, Write};
use unicode_width::UnicodeWidthStr;
use versewright_core::{Chunk, InputReader, Key, Screen};

const MIN_RULE_WIDTH: usize = 15;

/// Restores cooked mode on drop, including on panic.
struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Map a crossterm key event to a backend-neutral [`Key`].
pub fn map_key(event: &KeyEvent) -> Key {
    match event.code {
        KeyCode::Enter => Key::Enter,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Delete => Key::Delete,
        KeyCode::Esc => Key::Escape,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Char(c) if event.modifiers.contains(KeyModifiers::CONTROL) => {
            Key::Ctrl(c.to_ascii_lowercase())
        }
        KeyCode::Char(c) => Key::Char(c),
        _ => Key::Other,
    }
}

/// The document followed by the pending candidate.
pub fn frame_line(visible: &str, candidate: &str) -> String {
    format!("{visible}::{candidate}")
}

/// One `index::text` line per chunk, then a blank gap and a rule.
pub fn chunk_lines(chunks: &[Chunk]) -> Vec<String> {
    let mut lines: Vec<String> = chunks
        .iter()
        .map(|chunk| format!("{}::{}", chunk.index, chunk.text))
        .collect();
    let widest = lines
        .iter()
        .flat_map(|line| line.lines())
        .map(UnicodeWidthStr::width)
        .max()
        .unwrap_or(0);
    lines.push(String::new());
    lines.push(String::new());
    lines.push("=".repeat(widest.clamp(MIN_RULE_WIDTH, 80)));
    lines
}

/// Console bound to the process's stdin and stdout.
pub struct TerminalConsole {
    out: Stdout,
    color: bool,
}

impl TerminalConsole {
    pub fn new(color: bool) -> Self {
        Self {
            out: io::stdout(),
            color,
        }
    }

    /// Whether stdin can deliver single keystrokes.
    pub fn is_interactive() -> bool {
        io::stdin().is_terminal()
    }

    fn clear(&mut self) -> Result<()> {
        queue!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
        Ok(())
    }
}

impl InputReader for TerminalConsole {
    fn read_key(&mut self) -> Result<Key> {
        if !Self::is_interactive() {
            bail!("stdin is not a terminal");
        }
        enable_raw_mode()?;
        let _guard = TerminalGuard;
        loop {
            if let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                return Ok(map_key(&key));
            }
        }
    }

    fn read_line(&mut self) -> Result<String> {
        self.out.flush()?;
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            bail!("input stream closed");
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }
}

impl Screen for TerminalConsole {
    fn present(&mut self, visible: &str, candidate: &str) -> Result<()> {
        self.clear()?;
        if self.color {
            queue!(
                self.out,
                Print(visible),
                PrintStyledContent("::".dark_grey()),
                PrintStyledContent(candidate.cyan())
            )?;
        } else {
            queue!(self.out, Print(frame_line(visible, candidate)))?;
        }
        self.out.flush()?;
        Ok(())
    }

    fn show_help(&mut self, legend: &[&str]) -> Result<()> {
        queue!(self.out, Print("\n\n"))?;
        for line in legend {
            queue!(self.out, Print(line), Print("\n"))?;
        }
        self.out.flush()?;
        Ok(())
    }

    fn show_chunks(&mut self, chunks: &[Chunk]) -> Result<()> {
        self.clear()?;
        for line in chunk_lines(chunks) {
            queue!(self.out, Print(line), Print("\n"))?;
        }
        self.out.flush()?;
        Ok(())
    }

    fn prompt_text(&mut self, text: &str, prompt: &str) -> Result<()> {
        self.clear()?;
        queue!(self.out, Print(frame_line(text, prompt)))?;
        self.out.flush()?;
        Ok(())
    }

    fn notice(&mut self, message: &str) -> Result<()> {
        execute!(self.out, Print("\n"), Print(message), Print("\n"))?;
        Ok(())
    }
}
