//! The automation host: the capability surface a session drives.
//!
//! A [`Host`] stands for the emulator's automation object suite. It knows the
//! open connections and binds a session to one of them, handing back a
//! [`PresentationSpace`] (screen text, cursor, keystrokes, waits) and an
//! [`OperatorInfoArea`] (keyboard lock state). Screen descriptions used by
//! [`PresentationSpace::wait_for_screen`] are created through the host as well.
//!
//! Timeouts cross this boundary in milliseconds, as the automation objects
//! take them.
//!
//! - [`mock`]: in-memory host for tests and dry runs
//! - `pcomm`: the IBM Personal Communications objects (Windows only)

pub mod mock;
#[cfg(windows)]
pub mod pcomm;

use std::path::Path;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::screen::Position;
use crate::session::SessionId;

/// A connection known to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    /// Session letter.
    pub name: char,
    /// Host window handle.
    pub handle: i64,
    /// Emulator window is started.
    pub started: bool,
    /// Communication with the IBM i is established.
    pub comm_started: bool,
    /// The automation API is enabled for the session.
    pub api_enabled: bool,
    /// The session accepts input.
    pub ready: bool,
}

/// Direction for [`PresentationSpace::search_text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SearchDirection {
    /// Search toward the end of the screen.
    #[default]
    Forward,
    /// Search toward the start of the screen.
    Backward,
}

impl SearchDirection {
    /// The numeric code the automation objects expect.
    pub fn code(self) -> i32 {
        match self {
            SearchDirection::Forward => 1,
            SearchDirection::Backward => 2,
        }
    }
}

/// How a screen description treats the keyboard lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OiaInhibitMatch {
    /// Match whatever the lock state is.
    DontCare,
    /// Match only while input is accepted.
    #[default]
    NotInhibited,
}

impl OiaInhibitMatch {
    /// The numeric code the automation objects expect.
    pub fn code(self) -> i32 {
        match self {
            OiaInhibitMatch::DontCare => 0,
            OiaInhibitMatch::NotInhibited => 1,
        }
    }
}

/// Why the keyboard is locked, decoded from the raw inhibit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InhibitStatus {
    /// Input is accepted.
    NotInhibited,
    /// X SYSTEM: the host is processing.
    SystemWait,
    /// Communication check.
    CommCheck,
    /// Program check.
    ProgCheck,
    /// Machine check.
    MachCheck,
    /// Any other lock, including codes this crate does not know.
    Other(u32),
}

impl InhibitStatus {
    /// Decode a raw inhibit code.
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => InhibitStatus::NotInhibited,
            1 => InhibitStatus::SystemWait,
            2 => InhibitStatus::CommCheck,
            3 => InhibitStatus::ProgCheck,
            4 => InhibitStatus::MachCheck,
            other => InhibitStatus::Other(other),
        }
    }

    /// Whether the keyboard is locked. Any nonzero code counts.
    pub fn is_inhibited(self) -> bool {
        self != InhibitStatus::NotInhibited
    }
}

/// Screen text, cursor and keystroke access for one bound session.
pub trait PresentationSpace {
    /// The host's screen description object.
    type Descriptor: ScreenDescription;

    /// Read `length` characters starting at `pos`.
    fn get_text(&self, pos: Position, length: u32) -> Result<String>;
    /// Read the rectangle spanned by `start` and `end` (inclusive).
    fn get_text_rect(&self, start: Position, end: Position) -> Result<String>;
    /// Write `text` starting at `pos`.
    fn set_text(&self, text: &str, pos: Position) -> Result<()>;
    /// Move the cursor.
    fn set_cursor(&self, pos: Position) -> Result<()>;
    /// Current cursor row.
    fn cursor_row(&self) -> Result<u16>;
    /// Current cursor column.
    fn cursor_col(&self) -> Result<u16>;
    /// Number of rows on the screen.
    fn num_rows(&self) -> Result<u16>;
    /// Number of columns on the screen.
    fn num_cols(&self) -> Result<u16>;
    /// Send a `SendKeys` mnemonic string.
    fn send_keys(&self, keys: &str) -> Result<()>;
    /// Block the calling thread for `ms` milliseconds.
    fn wait(&self, ms: u32) -> Result<()>;
    /// Block until the cursor reaches `pos`; false on timeout.
    fn wait_for_cursor(&self, pos: Position, timeout_ms: u32) -> Result<bool>;
    /// Block until `text` appears at `pos`; false on timeout.
    fn wait_for_string(&self, text: &str, pos: Position, timeout_ms: u32) -> Result<bool>;
    /// Search for `text` from `start`; true if found.
    fn search_text(&self, text: &str, direction: SearchDirection, start: Position)
    -> Result<bool>;
    /// Block until the screen matches `desc`; false on timeout.
    fn wait_for_screen(&self, desc: &Self::Descriptor, timeout_ms: u32) -> Result<bool>;
}

/// Keyboard state for one bound session.
pub trait OperatorInfoArea {
    /// Raw inhibit code; nonzero means the keyboard is locked.
    fn input_inhibited(&self) -> Result<u32>;
    /// Block until input is accepted; false on timeout.
    fn wait_for_input_ready(&self, timeout_ms: u32) -> Result<bool>;
}

/// A host-side description of an expected screen.
pub trait ScreenDescription {
    /// Expect the cursor at `pos`.
    fn add_cursor_pos(&mut self, pos: Position) -> Result<()>;
    /// Expect `text` at `pos`.
    fn add_string(&mut self, text: &str, pos: Position, case_sensitive: bool) -> Result<()>;
    /// Expect `text` anywhere inside the rectangle from `start` to `end`.
    fn add_string_in_rect(
        &mut self,
        text: &str,
        start: Position,
        end: Position,
        case_sensitive: bool,
    ) -> Result<()>;
    /// Expect exactly `count` fields on the screen.
    fn add_num_fields(&mut self, count: u32) -> Result<()>;
    /// Expect exactly `count` input fields on the screen.
    fn add_num_input_fields(&mut self, count: u32) -> Result<()>;
    /// Set how the keyboard lock takes part in matching.
    fn add_oia_inhibit_status(&mut self, status: OiaInhibitMatch) -> Result<()>;
    /// Remove every element from the description.
    fn clear(&mut self) -> Result<()>;
}

/// The automation object suite.
pub trait Host {
    /// Screen descriptions created by this host.
    type Descriptor: ScreenDescription;
    /// Presentation space accessor handed out by [`Host::bind`].
    type Ps: PresentationSpace<Descriptor = Self::Descriptor>;
    /// OIA accessor handed out by [`Host::bind`].
    type Oia: OperatorInfoArea;

    /// Re-read the list of open connections.
    fn refresh_connections(&mut self) -> Result<()>;
    /// All connections from the last refresh.
    fn connections(&self) -> Result<Vec<ConnectionInfo>>;
    /// Look up one connection by name.
    fn find_connection(&self, id: SessionId) -> Result<Option<ConnectionInfo>>;
    /// Bind to the named connection.
    fn bind(&mut self, id: SessionId) -> Result<(Self::Ps, Self::Oia)>;
    /// Create an empty screen description.
    fn new_descriptor(&self) -> Result<Self::Descriptor>;
}

/// Starts session-definition files.
pub trait Launcher {
    /// Launch `path` detached from the current process.
    fn launch(&self, path: &Path) -> Result<()>;
}

/// Launches session files through the platform shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellLauncher;

impl Launcher for ShellLauncher {
    fn launch(&self, path: &Path) -> Result<()> {
        let mut command = if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", ""]).arg(path);
            cmd
        } else {
            Command::new(path)
        };
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(())
    }
}

/// The automation host for this platform.
#[cfg(windows)]
pub fn default_host() -> Result<pcomm::PcommHost> {
    pcomm::PcommHost::new()
}

/// The automation host for this platform.
#[cfg(not(windows))]
pub fn default_host() -> Result<mock::MockHost> {
    Err(crate::error::GreenscreenError::Host(
        "PCOMM automation objects are only available on Windows".to_string(),
    ))
}

/// Longest timeout the host accepts; its timeout arguments are signed 32-bit.
pub const MAX_TIMEOUT_MS: u32 = i32::MAX as u32;

/// Convert a timeout into the millisecond count the host expects.
pub(crate) fn millis(duration: std::time::Duration) -> u32 {
    u32::try_from(duration.as_millis())
        .unwrap_or(MAX_TIMEOUT_MS)
        .min(MAX_TIMEOUT_MS)
}

/// Narrow an argument to the host's signed 32-bit integer, saturating.
pub(crate) fn host_int(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}
