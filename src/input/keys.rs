//! Key definitions and mnemonic generation.

use std::str::FromStr;

use crate::error::{GreenscreenError, Result};

/// Represents a 5250 keyboard key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    /// A literal character.
    Char(char),
    /// Enter key.
    Enter,
    /// Tab (next field).
    Tab,
    /// Back tab (previous field).
    BackTab,
    /// Clear screen.
    Clear,
    /// Reset (unlocks the keyboard after an error).
    Reset,
    /// System request.
    SysReq,
    /// Attention.
    Attn,
    /// Field exit.
    FieldExit,
    /// Field plus.
    FieldPlus,
    /// Field minus.
    FieldMinus,
    /// Erase to end of field.
    EraseEof,
    /// Backspace.
    Backspace,
    /// Delete character.
    Delete,
    /// Toggle insert mode.
    Insert,
    /// Cursor to first input field.
    Home,
    /// Up arrow.
    Up,
    /// Down arrow.
    Down,
    /// Left arrow.
    Left,
    /// Right arrow.
    Right,
    /// Roll up.
    PageUp,
    /// Roll down.
    PageDown,
    /// Help.
    Help,
    /// Print screen.
    Print,
    /// Program function key (PF1-PF24).
    Pf(u8),
    /// Program attention key (PA1-PA3).
    Pa(u8),
}

impl Key {
    /// Convert the key to its `SendKeys` mnemonic.
    ///
    /// PF keys outside 1-24 and PA keys outside 1-3 have no mnemonic.
    pub fn to_mnemonic(&self) -> Result<String> {
        let fixed = match self {
            Key::Char(c) => return Ok(escape_char(*c)),
            Key::Pf(n) if (1..=24).contains(n) => return Ok(format!("[pf{n}]")),
            Key::Pa(n) if (1..=3).contains(n) => return Ok(format!("[pa{n}]")),
            Key::Pf(n) => return Err(GreenscreenError::InvalidKey(format!("PF{n}"))),
            Key::Pa(n) => return Err(GreenscreenError::InvalidKey(format!("PA{n}"))),
            Key::Enter => "[enter]",
            Key::Tab => "[tab]",
            Key::BackTab => "[backtab]",
            Key::Clear => "[clear]",
            Key::Reset => "[reset]",
            Key::SysReq => "[sysreq]",
            Key::Attn => "[attn]",
            Key::FieldExit => "[fldext]",
            Key::FieldPlus => "[field+]",
            Key::FieldMinus => "[field-]",
            Key::EraseEof => "[eraseeof]",
            Key::Backspace => "[backspace]",
            Key::Delete => "[delete]",
            Key::Insert => "[insert]",
            Key::Home => "[home]",
            Key::Up => "[up]",
            Key::Down => "[down]",
            Key::Left => "[left]",
            Key::Right => "[right]",
            Key::PageUp => "[pageup]",
            Key::PageDown => "[pagedn]",
            Key::Help => "[help]",
            Key::Print => "[print]",
        };
        Ok(fixed.to_string())
    }
}

fn escape_char(c: char) -> String {
    match c {
        '[' => "[[".to_string(),
        ']' => "]]".to_string(),
        _ => c.to_string(),
    }
}

/// Escape literal text so brackets are not read as mnemonics.
pub fn escape_text(text: &str) -> String {
    text.chars().map(escape_char).collect()
}

impl FromStr for Key {
    type Err = GreenscreenError;

    fn from_str(input: &str) -> Result<Self> {
        let normalized = input.trim().to_lowercase();
        let invalid = || GreenscreenError::InvalidKey(input.to_string());

        let key = match normalized.as_str() {
            "enter" => Key::Enter,
            "tab" => Key::Tab,
            "backtab" | "back_tab" => Key::BackTab,
            "clear" => Key::Clear,
            "reset" => Key::Reset,
            "sysreq" => Key::SysReq,
            "attn" => Key::Attn,
            "fieldexit" | "field_exit" | "fldext" => Key::FieldExit,
            "field+" | "fieldplus" => Key::FieldPlus,
            "field-" | "fieldminus" => Key::FieldMinus,
            "eraseeof" | "erase_eof" => Key::EraseEof,
            "backspace" => Key::Backspace,
            "delete" | "del" => Key::Delete,
            "insert" | "ins" => Key::Insert,
            "home" => Key::Home,
            "up" => Key::Up,
            "down" => Key::Down,
            "left" => Key::Left,
            "right" => Key::Right,
            "pageup" | "page_up" | "rollup" => Key::PageUp,
            "pagedown" | "page_down" | "pagedn" | "rolldown" => Key::PageDown,
            "help" => Key::Help,
            "print" => Key::Print,
            _ if normalized.len() > 2 && normalized.starts_with("pa") => {
                let n: u8 = normalized[2..].parse().map_err(|_| invalid())?;
                if !(1..=3).contains(&n) {
                    return Err(invalid());
                }
                Key::Pa(n)
            }
            _ if normalized.len() > 1
                && (normalized.starts_with("pf") || normalized.starts_with('f')) =>
            {
                let digits = normalized.trim_start_matches('p').trim_start_matches('f');
                let n: u8 = digits.parse().map_err(|_| invalid())?;
                if !(1..=24).contains(&n) {
                    return Err(invalid());
                }
                Key::Pf(n)
            }
            _ => {
                let mut chars = input.chars();
                let ch = chars.next().ok_or_else(invalid)?;
                if chars.next().is_some() {
                    return Err(invalid());
                }
                Key::Char(ch)
            }
        };

        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_mnemonic() {
        assert_eq!(Key::Char('a').to_mnemonic().unwrap(), "a");
        assert_eq!(Key::Char('[').to_mnemonic().unwrap(), "[[");
        assert_eq!(Key::Char(']').to_mnemonic().unwrap(), "]]");
    }

    #[test]
    fn test_special_keys() {
        assert_eq!(Key::Enter.to_mnemonic().unwrap(), "[enter]");
        assert_eq!(Key::FieldExit.to_mnemonic().unwrap(), "[fldext]");
        assert_eq!(Key::PageDown.to_mnemonic().unwrap(), "[pagedn]");
    }

    #[test]
    fn test_function_keys() {
        assert_eq!(Key::Pf(3).to_mnemonic().unwrap(), "[pf3]");
        assert_eq!(Key::Pf(24).to_mnemonic().unwrap(), "[pf24]");
        assert_eq!(Key::Pa(1).to_mnemonic().unwrap(), "[pa1]");
    }

    #[test]
    fn test_out_of_range_keys_have_no_mnemonic() {
        for key in [Key::Pf(0), Key::Pf(25), Key::Pa(0), Key::Pa(4)] {
            assert!(matches!(
                key.to_mnemonic(),
                Err(GreenscreenError::InvalidKey(_))
            ));
        }
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("Enter".parse::<Key>().unwrap(), Key::Enter);
        assert_eq!("F3".parse::<Key>().unwrap(), Key::Pf(3));
        assert_eq!("pf12".parse::<Key>().unwrap(), Key::Pf(12));
        assert_eq!("PA2".parse::<Key>().unwrap(), Key::Pa(2));
        assert_eq!("page_down".parse::<Key>().unwrap(), Key::PageDown);
        assert_eq!("x".parse::<Key>().unwrap(), Key::Char('x'));
        assert_eq!("f".parse::<Key>().unwrap(), Key::Char('f'));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!("F25".parse::<Key>().is_err());
        assert!("pa4".parse::<Key>().is_err());
        assert!("bogus".parse::<Key>().is_err());
        assert!("".parse::<Key>().is_err());
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("A[1]"), "A[[1]]");
        assert_eq!(escape_text("plain"), "plain");
    }
}
