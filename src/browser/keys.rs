//! Key-name mapping for CDP keyboard events
//!
//! Translates combination strings like "Control+A" or "Enter" into the
//! fields `Input.dispatchKeyEvent` expects: the DOM `key` value, the
//! physical `code`, the legacy Windows virtual key code, and the modifier
//! bitmask (Alt=1, Ctrl=2, Meta=4, Shift=8).

use crate::browser::BrowserError;

pub const MODIFIER_ALT: u64 = 1;
pub const MODIFIER_CTRL: u64 = 2;
pub const MODIFIER_META: u64 = 4;
pub const MODIFIER_SHIFT: u64 = 8;

/// A fully resolved key press
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStroke {
    /// DOM KeyboardEvent.key value
    pub key: String,
    /// Physical key code, e.g. "KeyA"
    pub code: String,
    /// Legacy virtual key code some pages still switch on
    pub windows_virtual_key_code: i64,
    /// Modifier bitmask held during the press
    pub modifiers: u64,
    /// Text produced by the key, when it produces any
    pub text: Option<String>,
}

/// Parse a combination string into a key stroke.
///
/// Everything before the last `+` must be a modifier name; the final
/// segment is the key itself. A lone "+" presses the plus key.
pub fn parse_combination(combo: &str) -> Result<KeyStroke, BrowserError> {
    let trimmed = combo.trim();
    if trimmed.is_empty() {
        return Err(BrowserError::UnknownKey(combo.to_string()));
    }

    let mut modifiers = 0u64;
    let segments: Vec<&str> = trimmed.split('+').collect();
    let (mod_names, key_name) = match segments.split_last() {
        Some((last, mods)) if !last.is_empty() => (mods, *last),
        // "Control++" or a trailing '+': the key is the plus sign.
        _ => (&segments[..segments.len().saturating_sub(2)], "+"),
    };

    for name in mod_names {
        modifiers |= modifier_bit(name).ok_or_else(|| BrowserError::UnknownKey(name.to_string()))?;
    }

    let mut stroke = resolve_key(key_name)?;
    stroke.modifiers = modifiers;
    Ok(stroke)
}

fn modifier_bit(name: &str) -> Option<u64> {
    match name.to_ascii_lowercase().as_str() {
        "alt" | "option" => Some(MODIFIER_ALT),
        "control" | "ctrl" => Some(MODIFIER_CTRL),
        "meta" | "command" | "cmd" | "super" => Some(MODIFIER_META),
        "shift" => Some(MODIFIER_SHIFT),
        _ => None,
    }
}

fn resolve_key(name: &str) -> Result<KeyStroke, BrowserError> {
    // Named keys first.
    if let Some((key, code, vk, text)) = named_key(name) {
        return Ok(KeyStroke {
            key: key.to_string(),
            code: code.to_string(),
            windows_virtual_key_code: vk,
            modifiers: 0,
            text: text.map(|t| t.to_string()),
        });
    }

    // Single printable characters.
    let mut chars = name.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        if ch.is_ascii_alphabetic() {
            let upper = ch.to_ascii_uppercase();
            return Ok(KeyStroke {
                key: ch.to_ascii_lowercase().to_string(),
                code: format!("Key{}", upper),
                windows_virtual_key_code: upper as i64,
                modifiers: 0,
                text: Some(ch.to_string()),
            });
        }
        if ch.is_ascii_digit() {
            return Ok(KeyStroke {
                key: ch.to_string(),
                code: format!("Digit{}", ch),
                windows_virtual_key_code: ch as i64,
                modifiers: 0,
                text: Some(ch.to_string()),
            });
        }
        if ch.is_ascii_graphic() || ch == ' ' {
            return Ok(KeyStroke {
                key: ch.to_string(),
                code: String::new(),
                windows_virtual_key_code: 0,
                modifiers: 0,
                text: Some(ch.to_string()),
            });
        }
    }

    // Function keys.
    if let Some(n) = name
        .strip_prefix('F')
        .or_else(|| name.strip_prefix('f'))
        .and_then(|s| s.parse::<i64>().ok())
    {
        if (1..=12).contains(&n) {
            return Ok(KeyStroke {
                key: format!("F{}", n),
                code: format!("F{}", n),
                windows_virtual_key_code: 111 + n,
                modifiers: 0,
                text: None,
            });
        }
    }

    Err(BrowserError::UnknownKey(name.to_string()))
}

fn named_key(name: &str) -> Option<(&'static str, &'static str, i64, Option<&'static str>)> {
    let entry = match name.to_ascii_lowercase().as_str() {
        "enter" | "return" => ("Enter", "Enter", 13, Some("\r")),
        "tab" => ("Tab", "Tab", 9, Some("\t")),
        "backspace" => ("Backspace", "Backspace", 8, None),
        "delete" => ("Delete", "Delete", 46, None),
        "escape" | "esc" => ("Escape", "Escape", 27, None),
        "space" => (" ", "Space", 32, Some(" ")),
        "arrowup" | "up" => ("ArrowUp", "ArrowUp", 38, None),
        "arrowdown" | "down" => ("ArrowDown", "ArrowDown", 40, None),
        "arrowleft" | "left" => ("ArrowLeft", "ArrowLeft", 37, None),
        "arrowright" | "right" => ("ArrowRight", "ArrowRight", 39, None),
        "home" => ("Home", "Home", 36, None),
        "end" => ("End", "End", 35, None),
        "pageup" => ("PageUp", "PageUp", 33, None),
        "pagedown" => ("PageDown", "PageDown", 34, None),
        _ => return None,
    };
    Some((entry.0, entry.1, entry.2, entry.3))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_letter() {
        let stroke = parse_combination("a").unwrap();
        assert_eq!(stroke.key, "a");
        assert_eq!(stroke.code, "KeyA");
        assert_eq!(stroke.windows_virtual_key_code, 65);
        assert_eq!(stroke.modifiers, 0);
        assert_eq!(stroke.text.as_deref(), Some("a"));
    }

    #[test]
    fn test_control_a() {
        let stroke = parse_combination("Control+A").unwrap();
        assert_eq!(stroke.modifiers, MODIFIER_CTRL);
        assert_eq!(stroke.code, "KeyA");
        assert_eq!(stroke.windows_virtual_key_code, 65);
    }

    #[test]
    fn test_meta_alias() {
        let stroke = parse_combination("Cmd+Shift+T").unwrap();
        assert_eq!(stroke.modifiers, MODIFIER_META | MODIFIER_SHIFT);
        assert_eq!(stroke.code, "KeyT");
    }

    #[test]
    fn test_named_keys() {
        let enter = parse_combination("Enter").unwrap();
        assert_eq!(enter.windows_virtual_key_code, 13);
        assert_eq!(enter.text.as_deref(), Some("\r"));

        let backspace = parse_combination("Backspace").unwrap();
        assert_eq!(backspace.windows_virtual_key_code, 8);
        assert!(backspace.text.is_none());

        let pgdn = parse_combination("PageDown").unwrap();
        assert_eq!(pgdn.windows_virtual_key_code, 34);
    }

    #[test]
    fn test_function_keys() {
        let f5 = parse_combination("F5").unwrap();
        assert_eq!(f5.key, "F5");
        assert_eq!(f5.windows_virtual_key_code, 116);
    }

    #[test]
    fn test_digit() {
        let five = parse_combination("5").unwrap();
        assert_eq!(five.code, "Digit5");
        assert_eq!(five.windows_virtual_key_code, '5' as i64);
    }

    #[test]
    fn test_unknown_modifier_rejected() {
        assert!(matches!(
            parse_combination("Hyper+A"),
            Err(BrowserError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_empty_rejected() {
        assert!(parse_combination("").is_err());
        assert!(parse_combination("   ").is_err());
    }
}
