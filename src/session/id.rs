//! Session identifiers.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::GreenscreenError;

/// A validated session letter, always upper case `A`-`Z`.
///
/// Each emulator window registers under one letter; `"a"` and `"A"` name
/// the same window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(char);

impl SessionId {
    /// Validate a single character.
    pub fn new(letter: char) -> Result<Self, GreenscreenError> {
        let upper = letter.to_ascii_uppercase();
        if !upper.is_ascii_uppercase() {
            return Err(invalid(&letter.to_string(), "must be a letter A-Z"));
        }
        Ok(Self(upper))
    }

    /// The upper-case session letter.
    pub fn letter(self) -> char {
        self.0
    }

    /// File name of the session definition for this letter.
    pub fn session_file_name(self) -> String {
        format!("Session {}.ws", self.0)
    }
}

impl FromStr for SessionId {
    type Err = GreenscreenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) => Self::new(letter).map_err(|_| invalid(s, "must be a letter A-Z")),
            _ => Err(invalid(s, "must be exactly one character")),
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn invalid(name: &str, reason: &str) -> GreenscreenError {
    GreenscreenError::InvalidSessionName {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}
