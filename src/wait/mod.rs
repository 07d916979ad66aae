//! Screen descriptions and duration helpers.
//!
//! A [`ScreenDescriptor`] asks the host to block until the screen looks a
//! certain way: the cursor at a position, or a string at a position.
//!
//! ```rust
//! use greenscreen::host::mock::MockHost;
//! use greenscreen::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let host = MockHost::new().with_connection('A').with_text("Exit", (10, 10));
//! let session = Session::connect(host, "A")?;
//!
//! let mut screen = session.screen()?;
//! screen.describe_text("exit", Position::new(10, 10), false)?;
//! assert!(screen.wait(5.seconds())?);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GreenscreenError, Result};
use crate::host::{Host, OiaInhibitMatch, PresentationSpace, ScreenDescription, millis};
use crate::screen::Position;
use crate::session::Session;

/// The kinds of description a descriptor accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    /// Cursor position.
    Cursor,
    /// String at a position.
    Text,
}

impl FromStr for DescriptorKind {
    type Err = GreenscreenError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cursor" => Ok(DescriptorKind::Cursor),
            "text" => Ok(DescriptorKind::Text),
            other => Err(GreenscreenError::InvalidDescriptor(format!(
                "only cursor or text descriptions are allowed, got {other:?}"
            ))),
        }
    }
}

/// The condition a descriptor currently holds.
///
/// Serializes as `{"cursor": {"x": .., "y": ..}}` or
/// `{"text": {"string": .., "x": .., "y": .., "case": ..}}`, where `x` is
/// the row and `y` the column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Description {
    /// Cursor at row `x`, column `y`.
    Cursor { x: u16, y: u16 },
    /// `string` at row `x`, column `y`.
    Text {
        string: String,
        x: u16,
        y: u16,
        /// Match case-sensitively.
        case: bool,
    },
}

impl Description {
    /// Where the condition applies.
    pub fn position(&self) -> Position {
        match self {
            Description::Cursor { x, y } | Description::Text { x, y, .. } => Position::new(*x, *y),
        }
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Description::Cursor { x, y } => write!(f, "cursor at row={x}, col={y}"),
            Description::Text {
                string,
                x,
                y,
                case,
            } => {
                let sensitivity = if *case { "case-sensitive" } else { "any case" };
                write!(f, "text '{string}' ({sensitivity}) at row={x}, col={y}")
            }
        }
    }
}

/// Extra arguments for a `text` description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DescribeOptions {
    /// The string to match.
    #[serde(default)]
    pub string: Option<String>,
    /// Match case-sensitively. Off by default.
    #[serde(default)]
    pub case: bool,
}

impl DescribeOptions {
    /// Options for matching `string`.
    pub fn text(string: impl Into<String>) -> Self {
        Self {
            string: Some(string.into()),
            case: false,
        }
    }

    /// Match case-sensitively.
    pub fn case_sensitive(mut self) -> Self {
        self.case = true;
        self
    }
}

/// An extra element stacked on top of the described condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// `string` somewhere inside the rectangle from `start` to `end`.
    StringInRect {
        string: String,
        start: Position,
        end: Position,
        case: bool,
    },
    /// Exactly this many fields.
    NumFields(u32),
    /// Exactly this many input fields.
    NumInputFields(u32),
    /// Keyboard lock state.
    OiaInhibitStatus(OiaInhibitMatch),
}

/// A host screen description bound to a session.
///
/// Holds one condition at a time: every `describe` call clears the host
/// description and replaces the recorded one. `require_*` calls add further
/// elements that last until the next `describe`.
pub struct ScreenDescriptor<'s, H: Host> {
    session: &'s Session<H>,
    raw: H::Descriptor,
    description: Option<Description>,
    requirements: Vec<Requirement>,
}

impl<'s, H: Host> ScreenDescriptor<'s, H> {
    pub(crate) fn new(session: &'s Session<H>) -> Result<Self> {
        Ok(Self {
            session,
            raw: session.new_descriptor()?,
            description: None,
            requirements: Vec::new(),
        })
    }

    /// Describe the screen by kind name (`"cursor"` or `"text"`).
    ///
    /// An unknown kind, or a `text` description without a string, is
    /// rejected before the host description is touched.
    pub fn describe(&mut self, kind: &str, x: u16, y: u16, options: DescribeOptions) -> Result<()> {
        let description = match kind.parse::<DescriptorKind>()? {
            DescriptorKind::Cursor => Description::Cursor { x, y },
            DescriptorKind::Text => {
                let string = options.string.ok_or_else(|| {
                    GreenscreenError::InvalidDescriptor(
                        "a text description needs a string".to_string(),
                    )
                })?;
                Description::Text {
                    string,
                    x,
                    y,
                    case: options.case,
                }
            }
        };
        self.set(description)
    }

    /// Expect the cursor at `pos`.
    pub fn describe_cursor(&mut self, pos: impl Into<Position>) -> Result<()> {
        let pos = pos.into();
        self.set(Description::Cursor {
            x: pos.row,
            y: pos.col,
        })
    }

    /// Expect `text` at `pos`.
    pub fn describe_text(
        &mut self,
        text: impl Into<String>,
        pos: impl Into<Position>,
        case_sensitive: bool,
    ) -> Result<()> {
        let pos = pos.into();
        self.set(Description::Text {
            string: text.into(),
            x: pos.row,
            y: pos.col,
            case: case_sensitive,
        })
    }

    /// Replace the current condition, dropping any requirements.
    ///
    /// If the host rejects the new element the descriptor is left empty.
    pub fn set(&mut self, description: Description) -> Result<()> {
        self.description = None;
        self.requirements.clear();
        self.raw.clear()?;
        match &description {
            Description::Cursor { x, y } => self.raw.add_cursor_pos(Position::new(*x, *y))?,
            Description::Text {
                string,
                x,
                y,
                case,
            } => self.raw.add_string(string, Position::new(*x, *y), *case)?,
        }
        self.description = Some(description);
        Ok(())
    }

    /// Also require `text` somewhere inside the rectangle.
    pub fn require_string_in_rect(
        &mut self,
        text: impl Into<String>,
        start: impl Into<Position>,
        end: impl Into<Position>,
        case_sensitive: bool,
    ) -> Result<()> {
        let (string, start, end) = (text.into(), start.into(), end.into());
        self.raw
            .add_string_in_rect(&string, start, end, case_sensitive)?;
        self.requirements.push(Requirement::StringInRect {
            string,
            start,
            end,
            case: case_sensitive,
        });
        Ok(())
    }

    /// Also require exactly `count` fields.
    pub fn require_num_fields(&mut self, count: u32) -> Result<()> {
        self.raw.add_num_fields(count)?;
        self.requirements.push(Requirement::NumFields(count));
        Ok(())
    }

    /// Also require exactly `count` input fields.
    pub fn require_num_input_fields(&mut self, count: u32) -> Result<()> {
        self.raw.add_num_input_fields(count)?;
        self.requirements.push(Requirement::NumInputFields(count));
        Ok(())
    }

    /// Set how the keyboard lock takes part in matching.
    pub fn require_oia_inhibit_status(&mut self, status: OiaInhibitMatch) -> Result<()> {
        self.raw.add_oia_inhibit_status(status)?;
        self.requirements.push(Requirement::OiaInhibitStatus(status));
        Ok(())
    }

    /// The condition currently described.
    pub fn description(&self) -> Option<&Description> {
        self.description.as_ref()
    }

    /// Elements added since the last `describe`.
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// The host-side description object.
    pub fn raw(&self) -> &H::Descriptor {
        &self.raw
    }

    /// Block until the screen matches, or `timeout` elapses.
    ///
    /// Returns the host's status: true when the screen matched.
    pub fn wait(&self, timeout: Duration) -> Result<bool> {
        if self.description.is_none() && self.requirements.is_empty() {
            return Err(GreenscreenError::InvalidDescriptor(
                "nothing has been described yet".to_string(),
            ));
        }
        debug!(
            session = %self.session.id(),
            description = ?self.description,
            requirements = self.requirements.len(),
            ?timeout,
            "waiting for screen"
        );
        self.session.ps().wait_for_screen(&self.raw, millis(timeout))
    }
}

impl<H: Host> fmt::Debug for ScreenDescriptor<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScreenDescriptor")
            .field("session", &self.session.id())
            .field("description", &self.description)
            .field("requirements", &self.requirements)
            .finish_non_exhaustive()
    }
}

/// Extension trait for Duration to create durations more ergonomically.
pub trait DurationExt {
    /// Create a duration from this value in seconds.
    fn seconds(self) -> Duration;
    /// Create a duration from this value in milliseconds.
    fn millis(self) -> Duration;
}

impl DurationExt for u64 {
    fn seconds(self) -> Duration {
        Duration::from_secs(self)
    }

    fn millis(self) -> Duration {
        Duration::from_millis(self)
    }
}

impl DurationExt for i32 {
    fn seconds(self) -> Duration {
        Duration::from_secs(self.max(0) as u64)
    }

    fn millis(self) -> Duration {
        Duration::from_millis(self.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::{Call, DescElement, MockHost};

    fn session(host: MockHost) -> Session<MockHost> {
        Session::connect(host, "A").unwrap()
    }

    #[test]
    fn test_duration_ext() {
        assert_eq!(5.seconds(), Duration::from_secs(5));
        assert_eq!(100.millis(), Duration::from_millis(100));
        assert_eq!((-1).seconds(), Duration::ZERO);
    }

    #[test]
    fn test_kind_parse_is_exact() {
        assert_eq!("cursor".parse::<DescriptorKind>().unwrap(), DescriptorKind::Cursor);
        assert!("Cursor".parse::<DescriptorKind>().is_err());
    }

    #[test]
    fn test_unknown_kind_leaves_host_descriptor_alone() {
        let host = MockHost::new().with_connection('A');
        let spy = host.clone();
        let session = session(host);
        let mut screen = session.screen().unwrap();
        spy.clear_calls();

        let err = screen
            .describe("bogus", 0, 0, DescribeOptions::default())
            .unwrap_err();

        assert!(matches!(err, GreenscreenError::InvalidDescriptor(_)));
        assert!(spy.calls().is_empty());
        assert!(screen.description().is_none());
    }

    #[test]
    fn test_text_without_string_is_rejected() {
        let host = MockHost::new().with_connection('A');
        let session = session(host);
        let mut screen = session.screen().unwrap();
        assert!(
            screen
                .describe("text", 1, 1, DescribeOptions::default())
                .is_err()
        );
        assert!(screen.raw().elements().is_empty());
    }

    #[test]
    fn test_text_description_reads_back_exactly() {
        let host = MockHost::new().with_connection('A');
        let session = session(host);
        let mut screen = session.screen().unwrap();

        screen
            .describe("text", 10, 10, DescribeOptions::text("Exit").case_sensitive())
            .unwrap();

        assert_eq!(
            serde_json::to_value(screen.description().unwrap()).unwrap(),
            serde_json::json!({"text": {"string": "Exit", "x": 10, "y": 10, "case": true}})
        );
    }

    #[test]
    fn test_case_defaults_to_insensitive() {
        let host = MockHost::new().with_connection('A');
        let session = session(host);
        let mut screen = session.screen().unwrap();
        screen
            .describe("text", 3, 4, DescribeOptions::text("Menu"))
            .unwrap();
        assert_eq!(
            screen.description(),
            Some(&Description::Text {
                string: "Menu".to_string(),
                x: 3,
                y: 4,
                case: false
            })
        );
    }

    #[test]
    fn test_describe_replaces_previous_condition() {
        let host = MockHost::new().with_connection('A');
        let spy = host.clone();
        let session = session(host);
        let mut screen = session.screen().unwrap();

        screen.describe_cursor((10, 20)).unwrap();
        screen.describe_text("Exit", (10, 10), true).unwrap();

        assert_eq!(
            screen.raw().elements(),
            &[DescElement::Text {
                text: "Exit".to_string(),
                pos: Position::new(10, 10),
                case_sensitive: true
            }]
        );
        let clears = spy
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::ClearDescriptor))
            .count();
        assert_eq!(clears, 2);
    }

    #[test]
    fn test_wait_passes_timeout_in_millis() {
        let host = MockHost::new().with_connection('A').with_cursor((10, 20));
        let spy = host.clone();
        let session = session(host);
        let mut screen = session.screen().unwrap();
        screen.describe("cursor", 10, 20, DescribeOptions::default()).unwrap();

        assert!(screen.wait(Duration::from_secs(5)).unwrap());
        assert_eq!(
            spy.calls().last(),
            Some(&Call::WaitForScreen { timeout_ms: 5000 })
        );
    }

    #[test]
    fn test_wait_without_description_fails() {
        let host = MockHost::new().with_connection('A');
        let session = session(host);
        let screen = session.screen().unwrap();
        assert!(screen.wait(Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_case_sensitive_text_mismatch_reports_false() {
        let host = MockHost::new().with_connection('A').with_text("EXIT", (1, 1));
        let session = session(host);
        let mut screen = session.screen().unwrap();
        screen.describe_text("Exit", (1, 1), true).unwrap();
        assert!(!screen.wait(Duration::from_millis(10)).unwrap());
        screen.describe_text("Exit", (1, 1), false).unwrap();
        assert!(screen.wait(Duration::from_millis(10)).unwrap());
    }

    #[test]
    fn test_requirements_stack_on_the_description() {
        let host = MockHost::new()
            .with_connection('A')
            .with_text("Work with Active Jobs", (3, 20))
            .with_fields(12, 4)
            .with_cursor((20, 7));
        let spy = host.clone();
        let session = session(host);
        let mut screen = session.screen().unwrap();

        screen.describe_cursor((20, 7)).unwrap();
        screen
            .require_string_in_rect("active jobs", (1, 1), (5, 80), false)
            .unwrap();
        screen.require_num_fields(12).unwrap();
        screen.require_num_input_fields(4).unwrap();
        screen
            .require_oia_inhibit_status(OiaInhibitMatch::NotInhibited)
            .unwrap();

        assert_eq!(screen.raw().elements().len(), 5);
        assert_eq!(screen.requirements()[1], Requirement::NumFields(12));
        assert!(spy.calls().contains(&Call::AddOiaInhibitStatus(
            OiaInhibitMatch::NotInhibited
        )));
        assert!(screen.wait(Duration::from_millis(10)).unwrap());

        screen.require_num_input_fields(5).unwrap();
        assert!(!screen.wait(Duration::from_millis(10)).unwrap());
    }

    #[test]
    fn test_string_in_rect_stays_inside_the_rectangle() {
        let host = MockHost::new()
            .with_connection('A')
            .with_text("Exit", (10, 60));
        let session = session(host);
        let mut screen = session.screen().unwrap();

        screen
            .require_string_in_rect("Exit", (1, 1), (24, 40), true)
            .unwrap();
        assert!(!screen.wait(Duration::from_millis(10)).unwrap());

        screen.describe_text("Exit", (10, 60), true).unwrap();
        assert!(screen.requirements().is_empty());
        screen
            .require_string_in_rect("Exit", (9, 50), (11, 70), true)
            .unwrap();
        assert!(screen.wait(Duration::from_millis(10)).unwrap());
    }

    #[test]
    fn test_requirements_alone_can_be_waited_on() {
        let host = MockHost::new().with_connection('A').with_inhibited(&[1]);
        let session = session(host);
        let mut screen = session.screen().unwrap();

        screen
            .require_oia_inhibit_status(OiaInhibitMatch::NotInhibited)
            .unwrap();
        assert!(!screen.wait(Duration::from_millis(10)).unwrap());

        screen
            .require_oia_inhibit_status(OiaInhibitMatch::DontCare)
            .unwrap();
        assert_eq!(screen.description(), None);
        assert_eq!(screen.requirements().len(), 2);
    }

    #[test]
    fn test_rejected_element_leaves_the_descriptor_empty() {
        let host = MockHost::new().with_connection('A');
        let session = session(host);
        let mut screen = session.screen().unwrap();

        screen.describe_text("Exit", (10, 10), true).unwrap();
        screen.require_num_fields(3).unwrap();
        assert!(screen.describe_cursor((30, 1)).is_err());

        assert_eq!(screen.description(), None);
        assert!(screen.requirements().is_empty());
        assert!(screen.raw().elements().is_empty());
        assert!(screen.wait(Duration::from_millis(10)).is_err());
    }
}
