//! Keystrokes for the host's `SendKeys` mnemonic language.

mod keys;

pub use keys::{Key, escape_text};
