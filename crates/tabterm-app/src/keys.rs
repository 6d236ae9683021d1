//! Translate crossterm key events into chords and the bytes a shell expects.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tabterm_core::{Key, KeyChord, KeyInput, Modifiers};

/// `None` for releases and keys no session can receive.
pub fn translate(event: KeyEvent) -> Option<KeyInput> {
    if event.kind == KeyEventKind::Release {
        return None;
    }

    let mut modifiers = to_modifiers(event.modifiers);
    let key = match event.code {
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Enter => Key::Enter,
        KeyCode::Tab => Key::Tab,
        KeyCode::BackTab => {
            modifiers |= Modifiers::SHIFT;
            Key::Tab
        }
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Esc => Key::Escape,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::Insert => Key::Insert,
        KeyCode::Delete => Key::Delete,
        KeyCode::F(n) => Key::F(n),
        _ => return None,
    };

    Some(KeyInput {
        chord: KeyChord::new(key, modifiers),
        bytes: encode(event.code, modifiers),
    })
}

fn to_modifiers(mods: KeyModifiers) -> Modifiers {
    let mut out = Modifiers::empty();
    if mods.contains(KeyModifiers::CONTROL) {
        out |= Modifiers::CTRL;
    }
    if mods.contains(KeyModifiers::ALT) {
        out |= Modifiers::ALT;
    }
    if mods.contains(KeyModifiers::SHIFT) {
        out |= Modifiers::SHIFT;
    }
    if mods.intersects(KeyModifiers::SUPER | KeyModifiers::META) {
        out |= Modifiers::SUPER;
    }
    out
}

/// xterm encoding of a key press.
fn encode(code: KeyCode, mods: Modifiers) -> Vec<u8> {
    let mut bytes = match code {
        KeyCode::Char(c) => return encode_char(c, mods),
        KeyCode::Enter => vec![b'\r'],
        KeyCode::Tab if mods.contains(Modifiers::SHIFT) => b"\x1b[Z".to_vec(),
        KeyCode::BackTab => b"\x1b[Z".to_vec(),
        KeyCode::Tab => vec![b'\t'],
        KeyCode::Backspace => vec![0x7f],
        KeyCode::Esc => vec![0x1b],
        KeyCode::Up => return cursor_key(b'A', mods),
        KeyCode::Down => return cursor_key(b'B', mods),
        KeyCode::Right => return cursor_key(b'C', mods),
        KeyCode::Left => return cursor_key(b'D', mods),
        KeyCode::Home => return cursor_key(b'H', mods),
        KeyCode::End => return cursor_key(b'F', mods),
        KeyCode::Insert => return tilde_key(2, mods),
        KeyCode::Delete => return tilde_key(3, mods),
        KeyCode::PageUp => return tilde_key(5, mods),
        KeyCode::PageDown => return tilde_key(6, mods),
        KeyCode::F(n @ 1..=4) => {
            let last = b'P' + (n - 1);
            match modifier_param(mods) {
                Some(m) => format!("\x1b[1;{m}{}", last as char).into_bytes(),
                None => vec![0x1b, b'O', last],
            }
        }
        KeyCode::F(n) => match function_key_number(n) {
            Some(number) => return tilde_key(number, mods),
            None => Vec::new(),
        },
        _ => Vec::new(),
    };
    if mods.contains(Modifiers::ALT) && bytes.len() == 1 {
        bytes.insert(0, 0x1b);
    }
    bytes
}

fn encode_char(c: char, mods: Modifiers) -> Vec<u8> {
    let mut bytes = if mods.contains(Modifiers::CTRL) {
        match control_byte(c) {
            Some(b) => vec![b],
            None => c.to_string().into_bytes(),
        }
    } else {
        c.to_string().into_bytes()
    };
    if mods.contains(Modifiers::ALT) {
        bytes.insert(0, 0x1b);
    }
    bytes
}

fn control_byte(c: char) -> Option<u8> {
    match c.to_ascii_lowercase() {
        c @ 'a'..='z' => Some(c as u8 - b'a' + 1),
        '@' | ' ' | '2' => Some(0x00),
        '[' | '3' => Some(0x1b),
        '\\' | '4' => Some(0x1c),
        ']' | '5' => Some(0x1d),
        '^' | '6' => Some(0x1e),
        '_' | '7' | '/' => Some(0x1f),
        '8' | '?' => Some(0x7f),
        _ => None,
    }
}

/// `1 + shift + 2*alt + 4*ctrl`, or `None` when no modifier is held.
fn modifier_param(mods: Modifiers) -> Option<u8> {
    let mut param = 1;
    if mods.contains(Modifiers::SHIFT) {
        param += 1;
    }
    if mods.contains(Modifiers::ALT) {
        param += 2;
    }
    if mods.contains(Modifiers::CTRL) {
        param += 4;
    }
    (param > 1).then_some(param)
}

fn cursor_key(last: u8, mods: Modifiers) -> Vec<u8> {
    match modifier_param(mods) {
        Some(m) => format!("\x1b[1;{m}{}", last as char).into_bytes(),
        None => vec![0x1b, b'[', last],
    }
}

fn tilde_key(number: u8, mods: Modifiers) -> Vec<u8> {
    match modifier_param(mods) {
        Some(m) => format!("\x1b[{number};{m}~").into_bytes(),
        None => format!("\x1b[{number}~").into_bytes(),
    }
}

fn function_key_number(n: u8) -> Option<u8> {
    let number = match n {
        5 => 15,
        6 => 17,
        7 => 18,
        8 => 19,
        9 => 20,
        10 => 21,
        11 => 23,
        12 => 24,
        _ => return None,
    };
    Some(number)
}
