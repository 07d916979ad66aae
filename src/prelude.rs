//! Convenient re-exports for common usage.
//!
//! ```rust
//! use greenscreen::prelude::*;
//! ```

pub use crate::error::{GreenscreenError, Result};
pub use crate::host::{ConnectionInfo, Host, InhibitStatus, OiaInhibitMatch, SearchDirection};
pub use crate::input::Key;
pub use crate::screen::{Position, ScreenSnapshot, Size, TextMatch};
pub use crate::session::{Session, SessionBuilder, SessionConfig, SessionId};
pub use crate::wait::{DescribeOptions, Description, DurationExt, Requirement, ScreenDescriptor};
