//! Session management and interaction.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{GreenscreenError, Result};
use crate::host::{
    ConnectionInfo, Host, InhibitStatus, Launcher, OperatorInfoArea, PresentationSpace,
    SearchDirection, ShellLauncher, millis,
};
use crate::input::{Key, escape_text};
use crate::screen::{Position, ScreenSnapshot, Size};
use crate::wait::ScreenDescriptor;

mod guard;
mod id;

pub use self::guard::{GuardOutcome, ensure_input_ready};
pub use self::id::SessionId;

/// Default time the input-ready guard waits for the keyboard.
pub const DEFAULT_GUARD_TIMEOUT: Duration = Duration::from_secs(2);
/// Default time given to a launched session file to register its window.
pub const DEFAULT_LAUNCH_GRACE: Duration = Duration::from_secs(5);

/// Fallback when `%PUBLIC%` is not set.
const PUBLIC_DESKTOP: &str = r"C:\Users\Public\Desktop";

/// Where to find session files when no window is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Directory holding `Session <LETTER>.ws` files.
    pub session_dir: PathBuf,
    /// How long to wait after launching before looking again.
    ///
    /// The emulator gives no signal when a new window registers, so this is
    /// a best-effort delay rather than a guarantee.
    pub grace: Duration,
}

impl LaunchConfig {
    /// Path of the session file for `id`.
    pub fn session_file(&self, id: SessionId) -> PathBuf {
        self.session_dir.join(id.session_file_name())
    }
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            session_dir: default_session_dir(),
            grace: DEFAULT_LAUNCH_GRACE,
        }
    }
}

/// The public desktop, where the emulator installs its session files.
pub fn default_session_dir() -> PathBuf {
    std::env::var_os("PUBLIC")
        .map(|public| PathBuf::from(public).join("Desktop"))
        .unwrap_or_else(|| PathBuf::from(PUBLIC_DESKTOP))
}

/// Configuration for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long the input-ready guard waits, per poll.
    pub guard_timeout: Duration,
    /// Auto-launch settings; `None` fails fast when no window is open.
    pub launch: Option<LaunchConfig>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            guard_timeout: DEFAULT_GUARD_TIMEOUT,
            launch: None,
        }
    }
}

/// Builder for connecting a [`Session`].
#[derive(Debug, Default)]
pub struct SessionBuilder {
    config: SessionConfig,
}

impl SessionBuilder {
    /// Create a new session builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Set how long the input-ready guard waits.
    pub fn guard_timeout(mut self, timeout: Duration) -> Self {
        self.config.guard_timeout = timeout;
        self
    }

    /// Launch the session file from the public desktop if no window is open.
    pub fn auto_launch(mut self) -> Self {
        self.config.launch.get_or_insert_with(LaunchConfig::default);
        self
    }

    /// Launch session files from `dir`. Enables auto-launch.
    pub fn session_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config
            .launch
            .get_or_insert_with(LaunchConfig::default)
            .session_dir = dir.into();
        self
    }

    /// Set the delay after launching a session file. Enables auto-launch.
    pub fn launch_grace(mut self, grace: Duration) -> Self {
        self.config
            .launch
            .get_or_insert_with(LaunchConfig::default)
            .grace = grace;
        self
    }

    /// The configuration built so far.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Connect to session `name`, launching it through the shell if needed.
    pub fn connect<H: Host>(self, host: H, name: &str) -> Result<Session<H>> {
        self.connect_with(host, &ShellLauncher, name)
    }

    /// Connect to session `name`, launching it through `launcher` if needed.
    pub fn connect_with<H, L>(self, mut host: H, launcher: &L, name: &str) -> Result<Session<H>>
    where
        H: Host,
        L: Launcher + ?Sized,
    {
        let id: SessionId = name.parse()?;

        host.refresh_connections()?;
        if host.find_connection(id)?.is_none() {
            match &self.config.launch {
                Some(launch) => launch_session(&mut host, launcher, id, launch)?,
                None => return Err(GreenscreenError::WindowNotFound { name: id.letter() }),
            }
        }

        let (ps, oia) = host.bind(id)?;
        info!(session = %id, "bound to session");

        Ok(Session {
            id,
            host,
            ps,
            oia,
            config: self.config,
        })
    }
}

fn launch_session<H, L>(
    host: &mut H,
    launcher: &L,
    id: SessionId,
    launch: &LaunchConfig,
) -> Result<()>
where
    H: Host,
    L: Launcher + ?Sized,
{
    let path = launch.session_file(id);
    if !path.is_file() {
        return Err(GreenscreenError::InvalidSessionName {
            name: id.to_string(),
            reason: format!("no session file at {}", path.display()),
        });
    }

    info!(session = %id, path = %path.display(), grace = ?launch.grace, "launching session file");
    launcher.launch(&path)?;
    std::thread::sleep(launch.grace);

    host.refresh_connections()?;
    if host.find_connection(id)?.is_none() {
        warn!(session = %id, grace = ?launch.grace, "session did not register after launch");
        return Err(GreenscreenError::WindowNotFound { name: id.letter() });
    }
    Ok(())
}

/// A session bound to one emulator window.
///
/// Reads, writes and key sends first run the input-ready guard (see
/// [`ensure_input_ready`]); waits go straight to the host.
pub struct Session<H: Host> {
    id: SessionId,
    host: H,
    ps: H::Ps,
    oia: H::Oia,
    config: SessionConfig,
}

impl<H: Host> Session<H> {
    /// Create a new session builder.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Connect to an open session window with default settings.
    pub fn connect(host: H, name: &str) -> Result<Self> {
        SessionBuilder::new().connect(host, name)
    }

    /// List the connections the host currently knows.
    pub fn list(host: &mut H) -> Result<Vec<ConnectionInfo>> {
        host.refresh_connections()?;
        host.connections()
    }

    /// The session letter.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Get the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Change how long the input-ready guard waits.
    pub fn set_guard_timeout(&mut self, timeout: Duration) {
        self.config.guard_timeout = timeout;
    }

    /// The host this session was bound through.
    pub fn host(&self) -> &H {
        &self.host
    }

    pub(crate) fn ps(&self) -> &H::Ps {
        &self.ps
    }

    /// Run the input-ready guard without touching the screen.
    pub fn ensure_ready(&self) -> Result<GuardOutcome> {
        ensure_input_ready(&self.ps, &self.oia, self.config.guard_timeout)
    }

    /// Current keyboard state, read without waiting.
    pub fn inhibit_status(&self) -> Result<InhibitStatus> {
        Ok(InhibitStatus::from_code(self.oia.input_inhibited()?))
    }

    /// Read `length` characters starting at `pos`.
    pub fn get_text(&self, pos: impl Into<Position>, length: u32) -> Result<String> {
        self.ensure_ready()?;
        self.ps.get_text(pos.into(), length)
    }

    /// Read the rectangle spanned by `start` and `end`, inclusive.
    pub fn get_text_rect(&self, start: impl Into<Position>, end: impl Into<Position>) -> Result<String> {
        self.ensure_ready()?;
        self.ps.get_text_rect(start.into(), end.into())
    }

    /// Write text at `pos`.
    pub fn set_text(&self, text: &str, pos: impl Into<Position>) -> Result<&Self> {
        self.ensure_ready()?;
        self.ps.set_text(text, pos.into())?;
        Ok(self)
    }

    /// Move the cursor.
    pub fn set_cursor(&self, pos: impl Into<Position>) -> Result<&Self> {
        self.ensure_ready()?;
        self.ps.set_cursor(pos.into())?;
        Ok(self)
    }

    /// Current cursor position.
    pub fn cursor(&self) -> Result<Position> {
        self.ensure_ready()?;
        Ok(Position::new(self.ps.cursor_row()?, self.ps.cursor_col()?))
    }

    /// Send a raw `SendKeys` mnemonic string, e.g. `"[pf3]"`.
    pub fn send_keys(&self, keys: &str) -> Result<&Self> {
        self.ensure_ready()?;
        self.ps.send_keys(keys)?;
        Ok(self)
    }

    /// Send a key. Keys without a mnemonic are rejected before the guard runs.
    pub fn send_key(&self, key: Key) -> Result<&Self> {
        let mnemonic = key.to_mnemonic()?;
        self.send_keys(&mnemonic)
    }

    /// Press Enter.
    pub fn enter(&self) -> Result<&Self> {
        self.send_key(Key::Enter)
    }

    /// Type literal text at the cursor.
    pub fn type_str(&self, text: &str) -> Result<&Self> {
        self.send_keys(&escape_text(text))
    }

    /// Search for `text` from `start`; true if found.
    pub fn search_text(
        &self,
        text: &str,
        direction: SearchDirection,
        start: impl Into<Position>,
    ) -> Result<bool> {
        self.ensure_ready()?;
        self.ps.search_text(text, direction, start.into())
    }

    /// Screen dimensions.
    pub fn size(&self) -> Result<Size> {
        Ok(Size::new(self.ps.num_cols()?, self.ps.num_rows()?))
    }

    /// Read the whole screen.
    pub fn snapshot(&self) -> Result<ScreenSnapshot> {
        self.ensure_ready()?;
        self.peek()
    }

    /// Read the whole screen without running the input-ready guard, so the
    /// screen is left exactly as found.
    pub fn peek(&self) -> Result<ScreenSnapshot> {
        let size = self.size()?;
        let cursor = Position::new(self.ps.cursor_row()?, self.ps.cursor_col()?);
        let lines = (1..=size.rows)
            .map(|row| self.ps.get_text(Position::new(row, 1), u32::from(size.cols)))
            .collect::<Result<Vec<_>>>()?;
        Ok(ScreenSnapshot::new(size, cursor, lines))
    }

    /// Block the calling thread through the host for `duration`.
    pub fn pause(&self, duration: Duration) -> Result<&Self> {
        self.ps.wait(millis(duration))?;
        Ok(self)
    }

    /// Wait for the cursor to reach `pos`; false on timeout.
    pub fn wait_for_cursor(&self, pos: impl Into<Position>, timeout: Duration) -> Result<bool> {
        let pos = pos.into();
        debug!(session = %self.id, row = pos.row, col = pos.col, ?timeout, "waiting for cursor");
        self.ps.wait_for_cursor(pos, millis(timeout))
    }

    /// Wait for `text` to appear at `pos`; false on timeout.
    pub fn wait_for_string(
        &self,
        text: &str,
        pos: impl Into<Position>,
        timeout: Duration,
    ) -> Result<bool> {
        let pos = pos.into();
        debug!(session = %self.id, text, row = pos.row, col = pos.col, ?timeout, "waiting for string");
        self.ps.wait_for_string(text, pos, millis(timeout))
    }

    /// Create an empty screen descriptor bound to this session.
    pub fn screen(&self) -> Result<ScreenDescriptor<'_, H>> {
        ScreenDescriptor::new(self)
    }

    pub(crate) fn new_descriptor(&self) -> Result<H::Descriptor> {
        self.host.new_descriptor()
    }
}

impl<H: Host> fmt::Debug for Session<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<H: Host> fmt::Display for Session<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Session {}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::{Call, MockHost};

    #[test]
    fn test_session_config_default() {
        let config = SessionConfig::default();
        assert_eq!(config.guard_timeout, DEFAULT_GUARD_TIMEOUT);
        assert_eq!(config.launch, None);
    }

    #[test]
    fn test_builder_launch_settings_enable_auto_launch() {
        let builder = SessionBuilder::new()
            .session_dir("/tmp/sessions")
            .launch_grace(Duration::from_millis(10));
        let launch = builder.config().launch.clone().unwrap();
        assert_eq!(launch.session_dir, PathBuf::from("/tmp/sessions"));
        assert_eq!(launch.grace, Duration::from_millis(10));
        assert_eq!(
            launch.session_file("d".parse().unwrap()),
            PathBuf::from("/tmp/sessions").join("Session D.ws")
        );
    }

    #[test]
    fn test_invalid_name_makes_no_host_calls() {
        let host = MockHost::new().with_connection('A');
        let spy = host.clone();
        let err = Session::connect(host, "AA").unwrap_err();
        assert!(matches!(err, GreenscreenError::InvalidSessionName { .. }));
        assert!(spy.calls().is_empty());
    }

    #[test]
    fn test_connect_refreshes_then_binds() {
        let host = MockHost::new().with_connection('A');
        let spy = host.clone();
        let session = Session::connect(host, "a").unwrap();
        assert_eq!(session.id().letter(), 'A');
        assert_eq!(
            spy.calls(),
            vec![
                Call::RefreshConnections,
                Call::FindConnection('A'),
                Call::Bind('A')
            ]
        );
    }

    #[test]
    fn test_cursor_reads_both_coordinates() {
        let host = MockHost::new().with_connection('A').with_cursor((6, 53));
        let session = Session::connect(host, "A").unwrap();
        assert_eq!(session.cursor().unwrap(), Position::new(6, 53));
    }

    #[test]
    fn test_type_str_escapes_brackets() {
        let host = MockHost::new().with_connection('A');
        let spy = host.clone();
        let session = Session::connect(host, "A").unwrap();
        session.type_str("[x]").unwrap();
        assert_eq!(spy.keys_sent(), vec!["[[x]]"]);
    }

    #[test]
    fn test_unknown_function_key_is_rejected_before_the_guard() {
        let host = MockHost::new().with_connection('A').with_inhibited(&[1]);
        let spy = host.clone();
        let session = Session::connect(host, "A").unwrap();
        spy.clear_calls();

        let err = session.send_key(Key::Pf(25)).unwrap_err();

        assert!(matches!(err, GreenscreenError::InvalidKey(_)));
        assert!(spy.calls().is_empty());
    }

    #[test]
    fn test_waits_skip_the_guard() {
        let host = MockHost::new().with_connection('A').with_inhibited(&[1]);
        let spy = host.clone();
        let session = Session::connect(host, "A").unwrap();
        spy.clear_calls();

        session
            .wait_for_cursor((1, 1), Duration::from_secs(3))
            .unwrap();
        session.pause(Duration::from_millis(250)).unwrap();

        assert_eq!(
            spy.calls(),
            vec![
                Call::WaitForCursor {
                    pos: Position::new(1, 1),
                    timeout_ms: 3000
                },
                Call::Wait(250),
            ]
        );
    }

    #[test]
    fn test_display() {
        let host = MockHost::new().with_connection('Q');
        let session = Session::connect(host, "q").unwrap();
        assert_eq!(session.to_string(), "Session Q");
    }
}
