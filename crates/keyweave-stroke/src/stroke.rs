//! Stroke parsing and canonicalization.
//!
//! ## Learning: Manual Trait Impls
//!
//! `Stroke` keeps its parsed parts (modifiers, key) next to the canonical
//! text, but equality, hashing and ordering are implemented by hand so
//! they only look at the text. Deriving them would compare every field,
//! which is redundant here and would tie identity to internal layout.

use crate::names;
use crate::{StrokeError, StrokeResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Keyboard modifiers in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    pub alt: bool,
    pub cmd: bool,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl Modifiers {
    /// No modifiers pressed.
    pub const NONE: Modifiers = Modifiers {
        alt: false,
        cmd: false,
        ctrl: false,
        meta: false,
        shift: false,
    };

    /// Returns true if no modifiers are pressed.
    pub fn is_empty(&self) -> bool {
        !self.alt && !self.cmd && !self.ctrl && !self.meta && !self.shift
    }

    /// Returns true if any modifier other than Shift is pressed.
    pub fn has_command_modifier(&self) -> bool {
        self.alt || self.cmd || self.ctrl || self.meta
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = [
            (self.alt, "Alt"),
            (self.cmd, "Cmd"),
            (self.ctrl, "Ctrl"),
            (self.meta, "Meta"),
            (self.shift, "Shift"),
        ];
        let names: Vec<&str> = parts
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, name)| *name)
            .collect();
        write!(f, "{}", names.join("+"))
    }
}

/// Non-printing keys with a canonical name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Return,
    Tab,
    BackSpace,
    Escape,
    Delete,
    Insert,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    Prior,
    Next,
}

impl NamedKey {
    /// Returns the canonical spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            NamedKey::Return => "Return",
            NamedKey::Tab => "Tab",
            NamedKey::BackSpace => "BackSpace",
            NamedKey::Escape => "Escape",
            NamedKey::Delete => "Delete",
            NamedKey::Insert => "Insert",
            NamedKey::Up => "Up",
            NamedKey::Down => "Down",
            NamedKey::Left => "Left",
            NamedKey::Right => "Right",
            NamedKey::Home => "Home",
            NamedKey::End => "End",
            NamedKey::Prior => "Prior",
            NamedKey::Next => "Next",
        }
    }

    fn from_lowercase(name: &str) -> Option<Self> {
        let key = match name {
            "return" | "linefeed" | "ret" => NamedKey::Return,
            "tab" => NamedKey::Tab,
            "backspace" | "bksp" | "back_space" => NamedKey::BackSpace,
            "escape" | "esc" => NamedKey::Escape,
            "delete" | "del" => NamedKey::Delete,
            "insert" | "ins" => NamedKey::Insert,
            "up" | "uparrow" => NamedKey::Up,
            "down" | "downarrow" | "dnarrow" => NamedKey::Down,
            "left" | "leftarrow" | "ltarrow" => NamedKey::Left,
            "right" | "rightarrow" | "rtarrow" => NamedKey::Right,
            "home" => NamedKey::Home,
            "end" => NamedKey::End,
            "prior" | "pageup" | "page_up" | "pgup" => NamedKey::Prior,
            "next" | "pagedown" | "page_down" | "pgdn" | "pgdown" => NamedKey::Next,
            _ => return None,
        };
        Some(key)
    }
}

/// Keys that only ever act as modifiers.
const MODIFIER_KEYS: &[&str] = &[
    "Alt_L",
    "Alt_R",
    "Caps_Lock",
    "Control_L",
    "Control_R",
    "Meta_L",
    "Meta_R",
    "Num_Lock",
    "Shift_L",
    "Shift_R",
    "Super_L",
    "Super_R",
];

/// The key part of a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// A printable character.
    Char(char),
    /// A named, non-printing key.
    Named(NamedKey),
    /// Function key F1-F24.
    F(u8),
    /// A bare modifier press such as `Shift_L`.
    Modifier(&'static str),
}

impl Key {
    /// Parses the key part of a spec, after modifiers have been removed.
    fn parse(text: &str) -> Option<Self> {
        let mut chars = text.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            let key = match ch {
                '\n' | '\r' => Key::Named(NamedKey::Return),
                '\t' => Key::Named(NamedKey::Tab),
                '\u{8}' => Key::Named(NamedKey::BackSpace),
                '\u{1b}' => Key::Named(NamedKey::Escape),
                '\u{7f}' => Key::Named(NamedKey::Delete),
                ch => Key::Char(ch),
            };
            return Some(key);
        }

        let lower = text.to_ascii_lowercase();
        if let Some(named) = NamedKey::from_lowercase(&lower) {
            return Some(Key::Named(named));
        }
        if let Some(digits) = lower.strip_prefix('f') {
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                return digits
                    .parse::<u8>()
                    .ok()
                    .filter(|n| (1..=24).contains(n))
                    .map(Key::F);
            }
        }
        if let Some(name) = MODIFIER_KEYS.iter().find(|m| m.eq_ignore_ascii_case(text)) {
            return Some(Key::Modifier(name));
        }
        names::char_for_name(text).map(Key::Char)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(' ') => write!(f, "space"),
            Key::Char(c) => write!(f, "{}", c),
            Key::Named(named) => write!(f, "{}", named.as_str()),
            Key::F(n) => write!(f, "F{}", n),
            Key::Modifier(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Clone, Copy)]
enum Prefix {
    Alt,
    Cmd,
    Ctrl,
    Meta,
    Shift,
    Key,
}

const PREFIXES: &[(&str, Prefix)] = &[
    ("control", Prefix::Ctrl),
    ("command", Prefix::Cmd),
    ("ctrl", Prefix::Ctrl),
    ("cmd", Prefix::Cmd),
    ("alt", Prefix::Alt),
    ("meta", Prefix::Meta),
    ("shift", Prefix::Shift),
    ("key", Prefix::Key),
];

/// A canonical keystroke.
///
/// Construct with [`Stroke::parse`] (or `str::parse`). The canonical text
/// lists modifiers as `Alt+Cmd+Ctrl+Meta+Shift` followed by the key.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Stroke {
    text: String,
    modifiers: Modifiers,
    key: Key,
}

impl Stroke {
    /// Canonicalizes a raw shortcut specification.
    ///
    /// Modifier tokens are recognized case-insensitively and may be joined
    /// with `+` or `-`. Tk-style angle brackets (`<Control-x>`) are
    /// accepted. Specs mentioning enter/leave events are rejected, as is
    /// Shift applied to anything but a letter.
    pub fn parse(spec: &str) -> StrokeResult<Self> {
        if spec.is_empty() {
            return Err(StrokeError::Empty);
        }
        // A lone space is the space key, not padding.
        let trimmed = spec.trim();
        let body = if trimmed.is_empty() { spec } else { trimmed };

        let lower = body.to_lowercase();
        if lower.contains("enter") || lower.contains("leave") {
            return Err(StrokeError::Forbidden(spec.to_string()));
        }

        let body = strip_brackets(body);
        let (mut modifiers, key_prefix, rest) = split_modifiers(body);
        let key = Key::parse(rest).ok_or_else(|| StrokeError::UnknownKey {
            spec: spec.to_string(),
            key: rest.to_string(),
        })?;

        let key = match key {
            Key::Char(ch) if ch.is_alphabetic() => {
                if modifiers.shift {
                    // Shift alone on a letter is just the upper-case letter.
                    if !modifiers.has_command_modifier() {
                        modifiers.shift = false;
                    }
                    Key::Char(to_upper(ch))
                } else if key_prefix || modifiers.has_command_modifier() {
                    Key::Char(to_lower(ch))
                } else {
                    key
                }
            }
            _ if modifiers.shift => return Err(StrokeError::ShiftNonLetter(spec.to_string())),
            _ => key,
        };

        Ok(Self::from_parts(modifiers, key))
    }

    /// Builds the stroke for a single typed character.
    pub fn from_char(ch: char) -> StrokeResult<Self> {
        Self::parse(&ch.to_string())
    }

    fn from_parts(modifiers: Modifiers, key: Key) -> Self {
        let text = if modifiers.is_empty() {
            key.to_string()
        } else {
            format!("{}+{}", modifiers, key)
        };
        Self {
            text,
            modifiers,
            key,
        }
    }

    /// Returns the canonical text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Returns the modifiers.
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Returns the key part.
    pub fn key(&self) -> Key {
        self.key
    }

    /// True for a printable character without Alt/Cmd/Ctrl/Meta.
    pub fn is_plain(&self) -> bool {
        matches!(self.key, Key::Char(_)) && !self.modifiers.has_command_modifier()
    }

    /// True when both Alt and Ctrl are held (AltGr on many layouts).
    pub fn is_alt_ctrl(&self) -> bool {
        self.modifiers.alt && self.modifiers.ctrl
    }

    /// True for F1-F24, with or without modifiers.
    pub fn is_fkey(&self) -> bool {
        matches!(self.key, Key::F(_))
    }

    /// True for a bare modifier press such as `Shift_L`.
    pub fn is_pure_modifier(&self) -> bool {
        matches!(self.key, Key::Modifier(_))
    }

    /// True if this is exactly the named key with no modifiers.
    pub fn is_named(&self, named: NamedKey) -> bool {
        self.modifiers.is_empty() && self.key == Key::Named(named)
    }

    /// Returns the character this stroke inserts into text, if any.
    pub fn insertable_char(&self) -> Option<char> {
        if self.modifiers.has_command_modifier() {
            return None;
        }
        match self.key {
            Key::Char(ch) => Some(ch),
            Key::Named(NamedKey::Return) => Some('\n'),
            Key::Named(NamedKey::Tab) => Some('\t'),
            _ => None,
        }
    }

    /// Returns the stroke with punctuation spelled by keysym name,
    /// e.g. `Ctrl+exclam`.
    pub fn keysym_text(&self) -> String {
        match self.key {
            Key::Char(ch) if !ch.is_alphanumeric() => {
                let name = names::name_for_char(ch).map(str::to_string);
                let key = name.unwrap_or_else(|| ch.to_string());
                if self.modifiers.is_empty() {
                    key
                } else {
                    format!("{}+{}", self.modifiers, key)
                }
            }
            _ => self.text.clone(),
        }
    }
}

fn strip_brackets(body: &str) -> &str {
    if body.len() > 2 && body.starts_with('<') && body.ends_with('>') {
        &body[1..body.len() - 1]
    } else {
        body
    }
}

/// Removes leading modifier tokens. Returns the modifiers, whether a
/// `Key-` prefix was seen, and the remaining key text.
fn split_modifiers(body: &str) -> (Modifiers, bool, &str) {
    let mut modifiers = Modifiers::NONE;
    let mut key_prefix = false;
    let mut rest = body;

    'outer: loop {
        for (name, prefix) in PREFIXES {
            let n = name.len();
            // The key itself must remain after the separator.
            if rest.len() <= n + 1 {
                continue;
            }
            let (Some(head), Some(sep)) = (rest.get(..n), rest.get(n..n + 1)) else {
                continue;
            };
            if head.eq_ignore_ascii_case(name) && (sep == "+" || sep == "-") {
                match prefix {
                    Prefix::Alt => modifiers.alt = true,
                    Prefix::Cmd => modifiers.cmd = true,
                    Prefix::Ctrl => modifiers.ctrl = true,
                    Prefix::Meta => modifiers.meta = true,
                    Prefix::Shift => modifiers.shift = true,
                    Prefix::Key => key_prefix = true,
                }
                rest = &rest[n + 1..];
                continue 'outer;
            }
        }
        break;
    }

    (modifiers, key_prefix, rest)
}

fn to_upper(ch: char) -> char {
    let mut upper = ch.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) => u,
        _ => ch,
    }
}

fn to_lower(ch: char) -> char {
    let mut lower = ch.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => ch,
    }
}

impl PartialEq for Stroke {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Stroke {}

impl Hash for Stroke {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl PartialOrd for Stroke {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Stroke {
    fn cmp(&self, other: &Self) -> Ordering {
        self.text.cmp(&other.text)
    }
}

impl fmt::Debug for Stroke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Stroke").field(&self.text).finish()
    }
}

impl fmt::Display for Stroke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Stroke {
    type Err = StrokeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Stroke {
    type Error = StrokeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Stroke> for String {
    fn from(stroke: Stroke) -> Self {
        stroke.text
    }
}
