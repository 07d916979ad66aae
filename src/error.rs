//! Error types for greenscreen.

use std::time::Duration;

use crate::screen::Position;

/// Result type alias using GreenscreenError.
pub type Result<T> = std::result::Result<T, GreenscreenError>;

/// Errors that can occur when driving a session.
#[derive(Debug, thiserror::Error)]
pub enum GreenscreenError {
    /// The session identifier is not a single letter A-Z, or no session
    /// file exists for it when auto-launch is enabled.
    #[error("Invalid session name {name:?}: {reason}")]
    InvalidSessionName {
        /// The identifier as given by the caller.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No running emulator window is registered under the session name.
    #[error("AS400 session {name} not found, start the emulator first")]
    WindowNotFound {
        /// The session letter that was looked up.
        name: char,
    },

    /// A screen navigation did not land on the expected screen.
    ///
    /// The library never raises this itself; it is available to callers
    /// building navigation helpers on top of a session.
    #[error("Failed to transition to screen: {0}")]
    ScreenTransition(String),

    /// A screen description was malformed.
    #[error("Invalid screen description: {0}")]
    InvalidDescriptor(String),

    /// A key name or mnemonic could not be parsed.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Timeout waiting for a condition.
    #[error("Timeout after {timeout:?} waiting for: {condition}")]
    Timeout {
        /// The condition that was being waited for.
        condition: String,
        /// How long we waited.
        timeout: Duration,
    },

    /// Screen content did not match an expectation.
    #[error("Expected {expected:?} at row={}, col={}, found {found:?}", .position.row, .position.col)]
    ExpectationFailed {
        /// What the caller expected.
        expected: String,
        /// What the screen held.
        found: String,
        /// Where the text was read.
        position: Position,
    },

    /// A text pattern was not found on screen.
    #[error("Pattern not found: {pattern}")]
    PatternNotFound {
        /// The pattern that wasn't found.
        pattern: String,
    },

    /// Text that should be absent is on screen.
    #[error("Unexpected text {text:?} at row={}, col={}", .position.row, .position.col)]
    UnexpectedText {
        /// The text that was found.
        text: String,
        /// Where it was found first.
        position: Position,
    },

    /// The automation host rejected or failed a call.
    #[error("Host error: {0}")]
    Host(String),

    /// I/O error (session launch, artifacts).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Regex compilation error.
    #[error("Invalid regex: {0}")]
    Regex(#[from] regex::Error),

    /// Step file loading or execution error.
    #[error("Steps error: {0}")]
    Steps(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_not_found_message() {
        let err = GreenscreenError::WindowNotFound { name: 'B' };
        assert_eq!(
            err.to_string(),
            "AS400 session B not found, start the emulator first"
        );
    }

    #[test]
    fn test_expectation_message_includes_position() {
        let err = GreenscreenError::ExpectationFailed {
            expected: "MAIN".to_string(),
            found: "SIGN".to_string(),
            position: Position::new(1, 33),
        };
        let msg = err.to_string();
        assert!(msg.contains("row=1"));
        assert!(msg.contains("col=33"));
    }
}
