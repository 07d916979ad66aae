//! # Greenscreen
//!
//! Playwright-like automation for AS400 (IBM i) 5250 sessions.
//!
//! Greenscreen drives an emulator window through its automation objects: find
//! the session by letter, read and write text at screen coordinates, send
//! keystrokes and wait for the screen to settle. Every read and write first
//! makes sure the keyboard is unlocked, pressing Enter once when a message
//! wait is holding the session.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use greenscreen::host::default_host;
//! use greenscreen::prelude::*;
//!
//! fn main() -> Result<()> {
//!     // Bind to the emulator window registered as session "A"
//!     let session = SessionBuilder::new()
//!         .guard_timeout(5.seconds())
//!         .auto_launch()
//!         .connect(default_host()?, "A")?;
//!
//!     // Wait for the sign-on screen
//!     session.wait_for_string("Sign On", (1, 36), 10.seconds())?;
//!
//!     // Fill in the user field and submit
//!     session.set_text("QUSER", (6, 53))?;
//!     session.enter()?;
//!
//!     // Block until the main menu shows up
//!     let mut menu = session.screen()?;
//!     menu.describe_text("MAIN", (1, 2), true)?;
//!     menu.wait(30.seconds())?;
//!
//!     println!("{}", session.snapshot()?.text());
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`session`]: Session handle, builder and the input-ready guard
//! - [`host`]: The automation capability traits, plus a mock host
//! - [`screen`]: Positions and captured screen snapshots
//! - [`wait`]: Screen descriptors and duration helpers
//! - [`input`]: Key mnemonics
//! - [`steps`] / [`runner`]: Scripted step files
//! - [`error`]: Error types
//! - [`prelude`]: Convenient re-exports

pub mod error;
pub mod host;
pub mod input;
pub mod runner;
pub mod screen;
pub mod session;
pub mod steps;
pub mod wait;

pub mod prelude;

// Re-export main types at crate root
pub use error::{GreenscreenError, Result};
pub use input::Key;
pub use screen::{Position, ScreenSnapshot};
pub use session::{Session, SessionId};
