//! Screen coordinates and captured screen state.
//!
//! The presentation space is addressed the way the host addresses it:
//! rows and columns are 1-based, `(1, 1)` being the top-left corner.

use serde::{Deserialize, Serialize};

/// Position on the presentation space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Row (1-indexed from top).
    pub row: u16,
    /// Column (1-indexed from left).
    pub col: u16,
}

impl Position {
    /// Create a new position.
    pub fn new(row: u16, col: u16) -> Self {
        Self { row, col }
    }

    /// The top-left corner of the screen.
    pub fn origin() -> Self {
        Self { row: 1, col: 1 }
    }
}

impl From<(u16, u16)> for Position {
    fn from((row, col): (u16, u16)) -> Self {
        Self::new(row, col)
    }
}

/// Presentation space dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    /// Number of columns.
    pub cols: u16,
    /// Number of rows.
    pub rows: u16,
}

impl Size {
    /// Create a new size.
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// The bottom-right position of a screen this size.
    pub fn last_position(&self) -> Position {
        Position::new(self.rows, self.cols)
    }
}

/// A snapshot of the presentation space, read row by row from the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSnapshot {
    /// Screen dimensions.
    pub size: Size,
    /// Cursor position.
    pub cursor: Position,
    /// Raw row contents, first entry is row 1.
    lines: Vec<String>,
}

impl ScreenSnapshot {
    /// Build a snapshot from rows already read from the host.
    pub fn new(size: Size, cursor: Position, lines: Vec<String>) -> Self {
        Self {
            size,
            cursor,
            lines,
        }
    }

    /// Get the full screen content as plain text.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.trim_end())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Get a single line of text (1-indexed).
    pub fn line(&self, row: u16) -> Option<String> {
        let idx = usize::from(row).checked_sub(1)?;
        self.lines.get(idx).map(|line| line.trim_end().to_string())
    }

    /// Check if the screen contains the given text.
    pub fn contains(&self, text: &str) -> bool {
        self.lines.iter().any(|line| line.contains(text))
    }

    /// Get the cursor position.
    pub fn cursor(&self) -> Position {
        self.cursor
    }

    /// Get screen dimensions.
    pub fn dimensions(&self) -> Size {
        self.size
    }

    /// Find all occurrences of text on the screen.
    pub fn find_text(&self, pattern: &str) -> Vec<TextMatch> {
        let mut matches = Vec::new();
        if pattern.is_empty() {
            return matches;
        }
        for (row_idx, line) in self.lines.iter().enumerate() {
            let mut start = 0;
            while let Some(pos) = line[start..].find(pattern) {
                let byte = start + pos;
                matches.push(TextMatch {
                    position: position_at(row_idx, line, byte),
                    text: pattern.to_string(),
                    length: pattern.chars().count(),
                });
                start = byte + pattern.len();
            }
        }
        matches
    }

    /// Find text matching a regex pattern.
    pub fn find_pattern(&self, pattern: &str) -> Result<Vec<TextMatch>, regex::Error> {
        let re = regex::Regex::new(pattern)?;
        let mut matches = Vec::new();

        for (row_idx, line) in self.lines.iter().enumerate() {
            for mat in re.find_iter(line) {
                matches.push(TextMatch {
                    position: position_at(row_idx, line, mat.start()),
                    text: mat.as_str().to_string(),
                    length: mat.as_str().chars().count(),
                });
            }
        }

        Ok(matches)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Serialize to compact JSON (trailing blanks trimmed from every row).
    pub fn to_json_compact(&self) -> Result<String, serde_json::Error> {
        #[derive(Serialize)]
        struct CompactScreen<'a> {
            size: Size,
            cursor: Position,
            lines: Vec<&'a str>,
        }

        let compact = CompactScreen {
            size: self.size,
            cursor: self.cursor,
            lines: self.lines.iter().map(|line| line.trim_end()).collect(),
        };

        serde_json::to_string(&compact)
    }
}

// Host columns count characters, not bytes.
fn position_at(row_idx: usize, line: &str, byte: usize) -> Position {
    let col = line[..byte].chars().count() + 1;
    Position::new(row_idx as u16 + 1, col as u16)
}

/// A text match found on the screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextMatch {
    /// Position of the match.
    pub position: Position,
    /// The matched text.
    pub text: String,
    /// Length of the match in characters.
    pub length: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ScreenSnapshot {
        ScreenSnapshot::new(
            Size::new(20, 3),
            Position::new(3, 7),
            vec![
                "  MAIN MENU         ".to_string(),
                "  1. User tasks     ".to_string(),
                "===> ____  MAIN     ".to_string(),
            ],
        )
    }

    #[test]
    fn test_position() {
        let pos = Position::new(5, 10);
        assert_eq!(pos.row, 5);
        assert_eq!(pos.col, 10);
        assert_eq!(Position::from((5, 10)), pos);
    }

    #[test]
    fn test_text_trims_rows() {
        let screen = sample();
        assert_eq!(
            screen.text(),
            "  MAIN MENU\n  1. User tasks\n===> ____  MAIN"
        );
        assert_eq!(screen.line(2).as_deref(), Some("  1. User tasks"));
        assert_eq!(screen.line(0), None);
        assert_eq!(screen.line(4), None);
    }

    #[test]
    fn test_find_text_is_one_based() {
        let matches = sample().find_text("MAIN");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].position, Position::new(1, 3));
        assert_eq!(matches[1].position, Position::new(3, 12));
        assert_eq!(matches[0].length, 4);
    }

    #[test]
    fn test_find_pattern() {
        let matches = sample().find_pattern(r"\d\.").unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].position, Position::new(2, 3));
        assert_eq!(matches[0].text, "1.");
    }

    #[test]
    fn test_compact_json_has_trimmed_lines() {
        let json = sample().to_json_compact().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["lines"][0], "  MAIN MENU");
        assert_eq!(value["cursor"]["row"], 3);
        assert_eq!(value["size"]["cols"], 20);
    }
}
