//! User-facing error reporting for versewright.
//!
//! Errors that reach the binary boundary are classified into a category and
//! paired with recovery suggestions before they are printed.

use anyhow::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error with a user-friendly message and recovery suggestions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedError {
    pub title: String,
    pub message: String,
    pub suggestions: Vec<String>,
    pub error_type: ErrorType,
    pub context: Option<String>,
}

/// Types of errors for better categorization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ErrorType {
    /// Settings, sampling parameters, model window size
    Configuration,
    /// Missing or unreadable checkpoint files
    Model,
    /// Terminal or input stream problems
    Terminal,
    /// File system errors while saving
    Persistence,
    /// Unknown or uncategorized errors
    Unknown,
}

impl EnhancedError {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        error_type: ErrorType,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            suggestions: Vec::new(),
            error_type,
            context: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions.extend(suggestions);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn into_error(self) -> Error {
        Error::new(self)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({"message": self.message}))
    }

    /// Format error for display
    pub fn format(&self, verbose: bool) -> String {
        let mut output = String::new();

        output.push_str(&format!("{}: {}\n", self.error_type.label(), self.title));
        output.push_str(&format!("  {}\n", self.message));

        if verbose && let Some(context) = &self.context {
            output.push_str(&format!("\n  Context: {}\n", context));
        }

        if !self.suggestions.is_empty() {
            output.push_str("\n  Suggestions:\n");
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("    {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

impl ErrorType {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorType::Configuration => "[config]",
            ErrorType::Model => "[model]",
            ErrorType::Terminal => "[terminal]",
            ErrorType::Persistence => "[save]",
            ErrorType::Unknown => "[error]",
        }
    }
}

impl fmt::Display for EnhancedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

impl std::error::Error for EnhancedError {}

/// Turns arbitrary errors into user-facing reports.
pub struct ErrorHandler {
    verbose: bool,
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorHandler {
    pub fn new() -> Self {
        Self { verbose: false }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn handle(&self, error: &Error) -> String {
        self.enhance(error).format(self.verbose)
    }

    /// Extract an `EnhancedError` from the chain, or classify the message.
    pub fn enhance(&self, error: &Error) -> EnhancedError {
        if let Some(enhanced) = error.downcast_ref::<EnhancedError>() {
            return enhanced.clone();
        }
        let mut enhanced = self.classify_error(&format!("{error:#}"));
        if self.verbose {
            enhanced = enhanced.with_context(format!("{error:?}"));
        }
        enhanced
    }

    fn classify_error(&self, error_message: &str) -> EnhancedError {
        let lower_error = error_message.to_lowercase();

        if lower_error.contains("window size")
            || lower_error.contains("batch size")
            || lower_error.contains("temperature")
            || lower_error.contains("top_p")
            || lower_error.contains("settings")
        {
            return EnhancedError::new(
                "Configuration Error",
                error_message,
                ErrorType::Configuration,
            )
            .with_suggestions(vec![
                "Check .versewright/settings.json".to_string(),
                "Lower --length so it fits the model window".to_string(),
                "Run `versewright config` to inspect the effective settings".to_string(),
            ]);
        }

        if lower_error.contains("hparams")
            || lower_error.contains("tokenizer")
            || lower_error.contains("checkpoint")
            || lower_error.contains("weights")
        {
            return EnhancedError::new("Model Not Ready", error_message, ErrorType::Model)
                .with_suggestions(vec![
                    "Check --models-dir and --model point at an existing model".to_string(),
                    "Pass --checkpoint if the weights live elsewhere".to_string(),
                    "Run `versewright doctor` to validate the layout".to_string(),
                ]);
        }

        if lower_error.contains("terminal") || lower_error.contains("input stream") {
            return EnhancedError::new("Terminal Error", error_message, ErrorType::Terminal)
                .with_suggestion("Run versewright from an interactive terminal");
        }

        if lower_error.contains("permission") || lower_error.contains("denied") {
            return EnhancedError::new("Save Failed", error_message, ErrorType::Persistence)
                .with_suggestion("Check write permissions on the output directory");
        }

        EnhancedError::new("Error", error_message, ErrorType::Unknown)
            .with_suggestion("Re-run with --verbose for more detail")
    }
}

/// Constructors for frequently encountered errors
pub mod errors {
    use super::*;

    pub fn local_ml_disabled() -> EnhancedError {
        EnhancedError::new(
            "Local Model Unavailable",
            "This build of versewright was compiled without the `local-ml` feature.",
            ErrorType::Configuration,
        )
        .with_suggestion("Rebuild with `--features local-ml`")
    }

    pub fn not_a_terminal() -> EnhancedError {
        EnhancedError::new(
            "Interactive Terminal Required",
            "The writing session reads single keystrokes and needs a terminal on stdin.",
            ErrorType::Terminal,
        )
        .with_suggestion("Run versewright directly in a terminal, not through a pipe")
    }
}
