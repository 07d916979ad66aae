//! In-memory automation host.
//!
//! `MockHost` answers every host call from a small in-memory model and
//! records each call, so session logic can be exercised without an emulator.
//! Clones share state: keep a clone as a spy after handing the host to a
//! [`Session`](crate::session::Session).
//!
//! ```rust
//! use greenscreen::host::mock::{Call, MockHost};
//! use greenscreen::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let host = MockHost::new().with_connection('A').with_inhibited(&[1, 0]);
//! let spy = host.clone();
//!
//! let session = Session::connect(host, "a")?;
//! session.send_key(Key::Pf(3))?;
//!
//! assert_eq!(spy.keys_sent(), vec!["[enter]", "[pf3]"]);
//! # Ok(())
//! # }
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{GreenscreenError, Result};
use crate::host::{
    ConnectionInfo, Host, Launcher, OiaInhibitMatch, OperatorInfoArea, PresentationSpace,
    ScreenDescription, SearchDirection,
};
use crate::screen::{Position, Size};
use crate::session::SessionId;

/// A call received by the mock, in order of arrival.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    RefreshConnections,
    FindConnection(char),
    Bind(char),
    NewDescriptor,
    GetText { pos: Position, length: u32 },
    GetTextRect { start: Position, end: Position },
    SetText { text: String, pos: Position },
    SetCursor(Position),
    CursorRow,
    CursorCol,
    NumRows,
    NumCols,
    SendKeys(String),
    Wait(u32),
    WaitForCursor { pos: Position, timeout_ms: u32 },
    WaitForString { text: String, pos: Position, timeout_ms: u32 },
    SearchText { text: String, direction: SearchDirection, start: Position },
    WaitForScreen { timeout_ms: u32 },
    InputInhibited,
    WaitForInputReady(u32),
    AddCursorPos(Position),
    AddString { text: String, pos: Position, case_sensitive: bool },
    AddStringInRect { text: String, start: Position, end: Position, case_sensitive: bool },
    AddNumFields(u32),
    AddNumInputFields(u32),
    AddOiaInhibitStatus(OiaInhibitMatch),
    ClearDescriptor,
    Launch(PathBuf),
}

/// One element of a mock screen description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescElement {
    /// Cursor expected at a position.
    Cursor(Position),
    /// Text expected at a position.
    Text {
        text: String,
        pos: Position,
        case_sensitive: bool,
    },
    /// Text expected on some row of a rectangle.
    TextInRect {
        text: String,
        start: Position,
        end: Position,
        case_sensitive: bool,
    },
    /// Total field count.
    NumFields(u32),
    /// Input field count.
    NumInputFields(u32),
    /// Keyboard lock requirement.
    OiaInhibit(OiaInhibitMatch),
}

#[derive(Debug)]
struct MockState {
    /// Connections that exist right now.
    open: Vec<ConnectionInfo>,
    /// Connections that open once a session file is launched.
    on_launch: Vec<ConnectionInfo>,
    /// Connections seen by the last refresh.
    listed: Vec<ConnectionInfo>,
    screen: Vec<Vec<char>>,
    cursor: Position,
    inhibited: VecDeque<u32>,
    input_ready: bool,
    fields: u32,
    input_fields: u32,
    calls: Vec<Call>,
}

impl MockState {
    fn record(&mut self, call: Call) {
        self.calls.push(call);
    }

    fn size(&self) -> Size {
        let rows = self.screen.len() as u16;
        let cols = self.screen.first().map(|r| r.len()).unwrap_or(0) as u16;
        Size::new(cols, rows)
    }

    fn cell_index(&self, pos: Position) -> Option<(usize, usize)> {
        let size = self.size();
        if pos.row == 0 || pos.col == 0 || pos.row > size.rows || pos.col > size.cols {
            return None;
        }
        Some((usize::from(pos.row) - 1, usize::from(pos.col) - 1))
    }

    // Reads run on in row-major order and stop at the end of the screen.
    fn read(&self, pos: Position, length: usize) -> Result<String> {
        let (row, col) = self
            .cell_index(pos)
            .ok_or_else(|| out_of_range(pos))?;
        let cols = self.size().cols as usize;
        let start = row * cols + col;
        Ok(self
            .screen
            .iter()
            .flatten()
            .skip(start)
            .take(length)
            .collect())
    }

    fn matches(&self, element: &DescElement) -> bool {
        match element {
            DescElement::Cursor(pos) => self.cursor == *pos,
            DescElement::Text {
                text,
                pos,
                case_sensitive,
            } => {
                let Ok(found) = self.read(*pos, text.chars().count()) else {
                    return false;
                };
                if *case_sensitive {
                    found == *text
                } else {
                    found.to_lowercase() == text.to_lowercase()
                }
            }
            DescElement::TextInRect {
                text,
                start,
                end,
                case_sensitive,
            } => {
                let (Some((r0, c0)), Some((r1, c1))) =
                    (self.cell_index(*start), self.cell_index(*end))
                else {
                    return false;
                };
                (r0..=r1).any(|row| {
                    let line: String = self.screen[row][c0..=c1.max(c0)].iter().collect();
                    if *case_sensitive {
                        line.contains(text.as_str())
                    } else {
                        line.to_lowercase().contains(&text.to_lowercase())
                    }
                })
            }
            DescElement::NumFields(count) => self.fields == *count,
            DescElement::NumInputFields(count) => self.input_fields == *count,
            DescElement::OiaInhibit(OiaInhibitMatch::DontCare) => true,
            DescElement::OiaInhibit(OiaInhibitMatch::NotInhibited) => {
                self.inhibited.front().copied().unwrap_or(0) == 0
            }
        }
    }
}

fn out_of_range(pos: Position) -> GreenscreenError {
    GreenscreenError::Host(format!(
        "position row={}, col={} is outside the presentation space",
        pos.row, pos.col
    ))
}

fn connection(name: char) -> ConnectionInfo {
    ConnectionInfo {
        name,
        handle: name as i64,
        started: true,
        comm_started: true,
        api_enabled: true,
        ready: true,
    }
}

/// In-memory automation host with a 24x80 screen.
#[derive(Debug, Clone)]
pub struct MockHost {
    state: Rc<RefCell<MockState>>,
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHost {
    /// A host with no connections and a blank 24x80 screen.
    pub fn new() -> Self {
        Self::with_size(Size::new(80, 24))
    }

    /// A host with no connections and a blank screen of the given size.
    pub fn with_size(size: Size) -> Self {
        let screen = vec![vec![' '; usize::from(size.cols)]; usize::from(size.rows)];
        Self {
            state: Rc::new(RefCell::new(MockState {
                open: Vec::new(),
                on_launch: Vec::new(),
                listed: Vec::new(),
                screen,
                cursor: Position::origin(),
                inhibited: VecDeque::new(),
                input_ready: true,
                fields: 0,
                input_fields: 0,
                calls: Vec::new(),
            })),
        }
    }

    /// Add an open connection.
    pub fn with_connection(self, name: char) -> Self {
        self.state
            .borrow_mut()
            .open
            .push(connection(name.to_ascii_uppercase()));
        self
    }

    /// Add a connection that opens when a session file is launched.
    pub fn with_connection_on_launch(self, name: char) -> Self {
        self.state
            .borrow_mut()
            .on_launch
            .push(connection(name.to_ascii_uppercase()));
        self
    }

    /// Queue inhibit codes returned by successive OIA reads. Once the queue
    /// is drained the keyboard reads as unlocked.
    pub fn with_inhibited(self, codes: &[u32]) -> Self {
        self.state.borrow_mut().inhibited.extend(codes.iter().copied());
        self
    }

    /// Make `wait_for_input_ready` report a timeout.
    pub fn with_input_never_ready(self) -> Self {
        self.state.borrow_mut().input_ready = false;
        self
    }

    /// Report `total` fields, `input` of them input fields.
    pub fn with_fields(self, total: u32, input: u32) -> Self {
        {
            let mut state = self.state.borrow_mut();
            state.fields = total;
            state.input_fields = input;
        }
        self
    }

    /// Write `text` onto the screen starting at `pos`.
    pub fn with_text(self, text: &str, pos: impl Into<Position>) -> Self {
        self.put_text(text, pos.into());
        self
    }

    /// Place the cursor.
    pub fn with_cursor(self, pos: impl Into<Position>) -> Self {
        self.state.borrow_mut().cursor = pos.into();
        self
    }

    /// Write `text` onto the screen, clipped at the end of the row.
    pub fn put_text(&self, text: &str, pos: Position) {
        let mut state = self.state.borrow_mut();
        let Some((row, col)) = state.cell_index(pos) else {
            return;
        };
        let line = &mut state.screen[row];
        for (cell, ch) in line.iter_mut().skip(col).zip(text.chars()) {
            *cell = ch;
        }
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Mnemonic strings passed to `send_keys`, in order.
    pub fn keys_sent(&self) -> Vec<String> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::SendKeys(keys) => Some(keys.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of `wait_for_input_ready` calls.
    pub fn readiness_polls(&self) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|call| matches!(call, Call::WaitForInputReady(_)))
            .count()
    }

    /// Session files launched through [`MockHost::launcher`].
    pub fn launched(&self) -> Vec<PathBuf> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Launch(path) => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    /// Row `row` (1-indexed) of the screen, untrimmed.
    pub fn screen_line(&self, row: u16) -> Option<String> {
        let state = self.state.borrow();
        let idx = usize::from(row).checked_sub(1)?;
        state.screen.get(idx).map(|line| line.iter().collect())
    }

    /// A launcher sharing this host's state. Launching opens the
    /// connections registered with [`MockHost::with_connection_on_launch`].
    pub fn launcher(&self) -> MockLauncher {
        MockLauncher {
            state: Rc::clone(&self.state),
        }
    }
}

impl Host for MockHost {
    type Descriptor = MockDescriptor;
    type Ps = MockPresentationSpace;
    type Oia = MockOia;

    fn refresh_connections(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.record(Call::RefreshConnections);
        state.listed = state.open.clone();
        Ok(())
    }

    fn connections(&self) -> Result<Vec<ConnectionInfo>> {
        Ok(self.state.borrow().listed.clone())
    }

    fn find_connection(&self, id: SessionId) -> Result<Option<ConnectionInfo>> {
        let mut state = self.state.borrow_mut();
        state.record(Call::FindConnection(id.letter()));
        Ok(state
            .listed
            .iter()
            .find(|conn| conn.name == id.letter())
            .cloned())
    }

    fn bind(&mut self, id: SessionId) -> Result<(Self::Ps, Self::Oia)> {
        let mut state = self.state.borrow_mut();
        state.record(Call::Bind(id.letter()));
        if !state.listed.iter().any(|conn| conn.name == id.letter()) {
            return Err(GreenscreenError::Host(format!(
                "no connection named {}",
                id.letter()
            )));
        }
        Ok((
            MockPresentationSpace {
                state: Rc::clone(&self.state),
            },
            MockOia {
                state: Rc::clone(&self.state),
            },
        ))
    }

    fn new_descriptor(&self) -> Result<Self::Descriptor> {
        self.state.borrow_mut().record(Call::NewDescriptor);
        Ok(MockDescriptor {
            state: Rc::clone(&self.state),
            elements: Vec::new(),
        })
    }
}

/// Presentation space of a [`MockHost`].
#[derive(Debug)]
pub struct MockPresentationSpace {
    state: Rc<RefCell<MockState>>,
}

impl PresentationSpace for MockPresentationSpace {
    type Descriptor = MockDescriptor;

    fn get_text(&self, pos: Position, length: u32) -> Result<String> {
        let mut state = self.state.borrow_mut();
        state.record(Call::GetText { pos, length });
        state.read(pos, length as usize)
    }

    fn get_text_rect(&self, start: Position, end: Position) -> Result<String> {
        let mut state = self.state.borrow_mut();
        state.record(Call::GetTextRect { start, end });
        let (first_row, first_col) = state.cell_index(start).ok_or_else(|| out_of_range(start))?;
        let (last_row, last_col) = state.cell_index(end).ok_or_else(|| out_of_range(end))?;
        let mut text = String::new();
        for row in first_row..=last_row {
            let line = &state.screen[row];
            text.extend(line[first_col..=last_col.max(first_col)].iter());
        }
        Ok(text)
    }

    fn set_text(&self, text: &str, pos: Position) -> Result<()> {
        self.state.borrow_mut().record(Call::SetText {
            text: text.to_string(),
            pos,
        });
        MockHost {
            state: Rc::clone(&self.state),
        }
        .put_text(text, pos);
        Ok(())
    }

    fn set_cursor(&self, pos: Position) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.record(Call::SetCursor(pos));
        state.cell_index(pos).ok_or_else(|| out_of_range(pos))?;
        state.cursor = pos;
        Ok(())
    }

    fn cursor_row(&self) -> Result<u16> {
        let mut state = self.state.borrow_mut();
        state.record(Call::CursorRow);
        Ok(state.cursor.row)
    }

    fn cursor_col(&self) -> Result<u16> {
        let mut state = self.state.borrow_mut();
        state.record(Call::CursorCol);
        Ok(state.cursor.col)
    }

    fn num_rows(&self) -> Result<u16> {
        let mut state = self.state.borrow_mut();
        state.record(Call::NumRows);
        Ok(state.size().rows)
    }

    fn num_cols(&self) -> Result<u16> {
        let mut state = self.state.borrow_mut();
        state.record(Call::NumCols);
        Ok(state.size().cols)
    }

    fn send_keys(&self, keys: &str) -> Result<()> {
        self.state
            .borrow_mut()
            .record(Call::SendKeys(keys.to_string()));
        Ok(())
    }

    fn wait(&self, ms: u32) -> Result<()> {
        self.state.borrow_mut().record(Call::Wait(ms));
        Ok(())
    }

    fn wait_for_cursor(&self, pos: Position, timeout_ms: u32) -> Result<bool> {
        let mut state = self.state.borrow_mut();
        state.record(Call::WaitForCursor { pos, timeout_ms });
        Ok(state.cursor == pos)
    }

    fn wait_for_string(&self, text: &str, pos: Position, timeout_ms: u32) -> Result<bool> {
        let mut state = self.state.borrow_mut();
        state.record(Call::WaitForString {
            text: text.to_string(),
            pos,
            timeout_ms,
        });
        Ok(state.matches(&DescElement::Text {
            text: text.to_string(),
            pos,
            case_sensitive: true,
        }))
    }

    fn search_text(
        &self,
        text: &str,
        direction: SearchDirection,
        start: Position,
    ) -> Result<bool> {
        let mut state = self.state.borrow_mut();
        state.record(Call::SearchText {
            text: text.to_string(),
            direction,
            start,
        });
        let (row, col) = state.cell_index(start).ok_or_else(|| out_of_range(start))?;
        let cols = state.size().cols as usize;
        let flat: String = state.screen.iter().flatten().collect();
        let offset = row * cols + col;
        let found = match direction {
            SearchDirection::Forward => flat.chars().skip(offset).collect::<String>().contains(text),
            SearchDirection::Backward => flat
                .chars()
                .take(offset + 1)
                .collect::<String>()
                .contains(text),
        };
        Ok(found)
    }

    fn wait_for_screen(&self, desc: &Self::Descriptor, timeout_ms: u32) -> Result<bool> {
        let mut state = self.state.borrow_mut();
        state.record(Call::WaitForScreen { timeout_ms });
        Ok(desc.elements.iter().all(|element| state.matches(element)))
    }
}

/// OIA of a [`MockHost`].
#[derive(Debug)]
pub struct MockOia {
    state: Rc<RefCell<MockState>>,
}

impl OperatorInfoArea for MockOia {
    fn input_inhibited(&self) -> Result<u32> {
        let mut state = self.state.borrow_mut();
        state.record(Call::InputInhibited);
        Ok(state.inhibited.pop_front().unwrap_or(0))
    }

    fn wait_for_input_ready(&self, timeout_ms: u32) -> Result<bool> {
        let mut state = self.state.borrow_mut();
        state.record(Call::WaitForInputReady(timeout_ms));
        Ok(state.input_ready)
    }
}

/// Screen description of a [`MockHost`].
#[derive(Debug)]
pub struct MockDescriptor {
    state: Rc<RefCell<MockState>>,
    elements: Vec<DescElement>,
}

impl MockDescriptor {
    /// Elements currently in the description.
    pub fn elements(&self) -> &[DescElement] {
        &self.elements
    }
}

impl ScreenDescription for MockDescriptor {
    fn add_cursor_pos(&mut self, pos: Position) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.record(Call::AddCursorPos(pos));
        state.cell_index(pos).ok_or_else(|| out_of_range(pos))?;
        self.elements.push(DescElement::Cursor(pos));
        Ok(())
    }

    fn add_string(&mut self, text: &str, pos: Position, case_sensitive: bool) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.record(Call::AddString {
            text: text.to_string(),
            pos,
            case_sensitive,
        });
        state.cell_index(pos).ok_or_else(|| out_of_range(pos))?;
        self.elements.push(DescElement::Text {
            text: text.to_string(),
            pos,
            case_sensitive,
        });
        Ok(())
    }

    fn add_string_in_rect(
        &mut self,
        text: &str,
        start: Position,
        end: Position,
        case_sensitive: bool,
    ) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.record(Call::AddStringInRect {
            text: text.to_string(),
            start,
            end,
            case_sensitive,
        });
        state.cell_index(start).ok_or_else(|| out_of_range(start))?;
        state.cell_index(end).ok_or_else(|| out_of_range(end))?;
        self.elements.push(DescElement::TextInRect {
            text: text.to_string(),
            start,
            end,
            case_sensitive,
        });
        Ok(())
    }

    fn add_num_fields(&mut self, count: u32) -> Result<()> {
        self.state.borrow_mut().record(Call::AddNumFields(count));
        self.elements.push(DescElement::NumFields(count));
        Ok(())
    }

    fn add_num_input_fields(&mut self, count: u32) -> Result<()> {
        self.state.borrow_mut().record(Call::AddNumInputFields(count));
        self.elements.push(DescElement::NumInputFields(count));
        Ok(())
    }

    fn add_oia_inhibit_status(&mut self, status: OiaInhibitMatch) -> Result<()> {
        self.state.borrow_mut().record(Call::AddOiaInhibitStatus(status));
        self.elements.push(DescElement::OiaInhibit(status));
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.state.borrow_mut().record(Call::ClearDescriptor);
        self.elements.clear();
        Ok(())
    }
}

/// Launcher sharing a [`MockHost`]'s state.
#[derive(Debug, Clone)]
pub struct MockLauncher {
    state: Rc<RefCell<MockState>>,
}

impl Launcher for MockLauncher {
    fn launch(&self, path: &Path) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.record(Call::Launch(path.to_path_buf()));
        let opened = std::mem::take(&mut state.on_launch);
        state.open.extend(opened);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> SessionId {
        s.parse().unwrap()
    }

    #[test]
    fn test_find_requires_refresh() {
        let mut host = MockHost::new().with_connection('A');
        assert_eq!(host.find_connection(id("A")).unwrap(), None);
        host.refresh_connections().unwrap();
        assert_eq!(host.find_connection(id("A")).unwrap().unwrap().name, 'A');
    }

    #[test]
    fn test_text_reads_back() {
        let mut host = MockHost::new().with_connection('A');
        host.refresh_connections().unwrap();
        let (ps, _) = host.bind(id("A")).unwrap();
        ps.set_text("SIGNON", Position::new(2, 5)).unwrap();
        assert_eq!(ps.get_text(Position::new(2, 5), 6).unwrap(), "SIGNON");
        assert_eq!(ps.get_text_rect(Position::new(2, 5), Position::new(3, 6)).unwrap(), "SI  ");
        assert!(ps.get_text(Position::new(25, 1), 1).is_err());
    }

    #[test]
    fn test_get_text_runs_onto_next_row() {
        let host = MockHost::with_size(Size::new(4, 2))
            .with_text("abcd", (1, 1))
            .with_text("efgh", (2, 1));
        assert_eq!(
            host.state.borrow().read(Position::new(1, 3), 4).unwrap(),
            "cdef"
        );
    }

    #[test]
    fn test_launch_opens_pending_connections() {
        let host = MockHost::new().with_connection_on_launch('c');
        host.launcher().launch(Path::new("Session C.ws")).unwrap();
        assert_eq!(host.launched(), vec![PathBuf::from("Session C.ws")]);
        assert_eq!(host.state.borrow().open[0].name, 'C');
    }

    #[test]
    fn test_inhibit_queue_drains_to_zero() {
        let mut host = MockHost::new().with_connection('A').with_inhibited(&[4]);
        host.refresh_connections().unwrap();
        let (_, oia) = host.bind(id("A")).unwrap();
        assert_eq!(oia.input_inhibited().unwrap(), 4);
        assert_eq!(oia.input_inhibited().unwrap(), 0);
    }

    #[test]
    fn test_search_directions() {
        let mut host = MockHost::new().with_connection('A').with_text("Exit", (10, 10));
        host.refresh_connections().unwrap();
        let (ps, _) = host.bind(id("A")).unwrap();
        assert!(ps.search_text("Exit", SearchDirection::Forward, Position::origin()).unwrap());
        assert!(!ps.search_text("Exit", SearchDirection::Forward, Position::new(11, 1)).unwrap());
        assert!(ps.search_text("Exit", SearchDirection::Backward, Position::new(11, 1)).unwrap());
    }
}
