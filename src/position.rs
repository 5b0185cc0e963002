//! Line/position extraction from error messages.
//!
//! The evaluation service embeds `<line>:<position>` in its parser and evaluator
//! errors. This is a convention, not a schema: a message without the pattern
//! simply has no position.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // First `<digits>:<digits>` on any line, digit runs captured whole.
    static ref ERROR_POSITION: Regex = Regex::new(r"(?m)^.*?(\d+):(\d+).*$").unwrap();
    static ref CONTEXT_ERROR_POSITION: Regex = Regex::new(r"(?m)at position (\d+)$").unwrap();
}

/// Location of an error inside the edited text, when derivable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorPosition {
    pub line: Option<u32>,
    pub position: Option<u32>,
}

impl ErrorPosition {
    pub fn is_known(&self) -> bool {
        self.line.is_some() || self.position.is_some()
    }
}

/// Extracts `line:position` from a remote error message.
pub fn extract_error_position(message: &str) -> ErrorPosition {
    ERROR_POSITION
        .captures(message)
        .map(|captures| ErrorPosition {
            line: captures.get(1).and_then(|m| m.as_str().parse().ok()),
            position: captures.get(2).and_then(|m| m.as_str().parse().ok()),
        })
        .unwrap_or_default()
}

/// Extracts the position of a local JSON parse error.
///
/// Messages ending in `at position N` win; otherwise the parser's own
/// line/column report is used.
pub fn extract_context_error_position(error: &serde_json::Error) -> ErrorPosition {
    let message = error.to_string();
    if let Some(position) = CONTEXT_ERROR_POSITION
        .captures(&message)
        .and_then(|captures| captures.get(1))
        .and_then(|m| m.as_str().parse().ok())
    {
        return ErrorPosition {
            line: None,
            position: Some(position),
        };
    }

    if error.line() == 0 {
        return ErrorPosition::default();
    }
    ErrorPosition {
        line: u32::try_from(error.line()).ok(),
        position: u32::try_from(error.column()).ok(),
    }
}
