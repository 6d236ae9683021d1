//! Global key chords.
//!
//! Every key event passes through the [`ShortcutDispatcher`] before any
//! session sees it. A recognised chord is consumed and turned into a
//! [`TabAction`]; everything else is forwarded to the selected session.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const CTRL = 0b0001;
        const ALT = 0b0010;
        const SHIFT = 0b0100;
        const SUPER = 0b1000;
    }
}

/// A key independent of modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// A character key, stored lowercase.
    Char(char),
    Enter,
    Tab,
    Backspace,
    Escape,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    F(u8),
}

/// A key plus the modifiers held with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyChord {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyChord {
    /// Character keys are folded to lowercase so `Ctrl+Shift+W` matches
    /// whether the host reports `W` or `w`.
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        let key = match key {
            Key::Char(c) => Key::Char(c.to_ascii_lowercase()),
            other => other,
        };
        Self { key, modifiers }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChordParseError {
    #[error("empty key chord")]
    Empty,
    #[error("unknown modifier '{0}'")]
    UnknownModifier(String),
    #[error("unknown key '{0}'")]
    UnknownKey(String),
}

impl FromStr for KeyChord {
    type Err = ChordParseError;

    /// Parse strings like `"ctrl+t"` or `"Ctrl+Shift+PageDown"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('+').map(str::trim).collect();
        let (key, modifiers) = match parts.split_last() {
            Some((key, modifiers)) if !key.is_empty() => (*key, modifiers),
            _ => return Err(ChordParseError::Empty),
        };

        let mut mods = Modifiers::empty();
        for m in modifiers {
            mods |= match m.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => Modifiers::CTRL,
                "alt" | "option" => Modifiers::ALT,
                "shift" => Modifiers::SHIFT,
                "super" | "cmd" | "meta" => Modifiers::SUPER,
                _ => return Err(ChordParseError::UnknownModifier(m.to_string())),
            };
        }

        Ok(KeyChord::new(parse_key(key)?, mods))
    }
}

fn parse_key(s: &str) -> Result<Key, ChordParseError> {
    let mut chars = s.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Ok(Key::Char(c));
    }

    let lower = s.to_ascii_lowercase();
    let key = match lower.as_str() {
        "enter" | "return" => Key::Enter,
        "tab" => Key::Tab,
        "backspace" => Key::Backspace,
        "esc" | "escape" => Key::Escape,
        "space" => Key::Char(' '),
        "up" => Key::Up,
        "down" => Key::Down,
        "left" => Key::Left,
        "right" => Key::Right,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" | "pgup" => Key::PageUp,
        "pagedown" | "pgdn" => Key::PageDown,
        "insert" => Key::Insert,
        "delete" | "del" => Key::Delete,
        f if f.starts_with('f') => match f[1..].parse::<u8>() {
            Ok(n) if (1..=24).contains(&n) => Key::F(n),
            _ => return Err(ChordParseError::UnknownKey(s.to_string())),
        },
        _ => return Err(ChordParseError::UnknownKey(s.to_string())),
    };
    Ok(key)
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        if self.modifiers.contains(Modifiers::CTRL) {
            parts.push("Ctrl".into());
        }
        if self.modifiers.contains(Modifiers::ALT) {
            parts.push("Alt".into());
        }
        if self.modifiers.contains(Modifiers::SHIFT) {
            parts.push("Shift".into());
        }
        if self.modifiers.contains(Modifiers::SUPER) {
            parts.push("Super".into());
        }
        parts.push(match self.key {
            Key::Char(' ') => "Space".into(),
            Key::Char(c) => c.to_ascii_uppercase().to_string(),
            Key::F(n) => format!("F{n}"),
            other => format!("{other:?}"),
        });
        write!(f, "{}", parts.join("+"))
    }
}

/// What a consumed chord asks the tab manager to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabAction {
    NewTab,
    NextTab,
    PreviousTab,
    CloseTab,
}

/// Result of offering a key to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Consumed(TabAction),
    /// Not a shortcut; the selected session gets the key.
    Forward,
}

#[derive(Debug, Clone, Default)]
pub struct ShortcutDispatcher {
    bindings: Vec<(KeyChord, TabAction)>,
}

impl ShortcutDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `chord` to `action`, replacing an existing binding of the chord.
    pub fn bind(&mut self, chord: KeyChord, action: TabAction) {
        self.bindings.retain(|(c, _)| *c != chord);
        self.bindings.push((chord, action));
    }

    pub fn dispatch(&self, chord: &KeyChord) -> Dispatch {
        self.bindings
            .iter()
            .find(|(c, _)| c == chord)
            .map_or(Dispatch::Forward, |&(_, action)| Dispatch::Consumed(action))
    }

    /// The chord bound to `action`, if any.
    pub fn chord_for(&self, action: TabAction) -> Option<KeyChord> {
        self.bindings
            .iter()
            .find(|(_, a)| *a == action)
            .map(|&(chord, _)| chord)
    }
}
