//! # Keyweave Stroke
//!
//! Canonical keystroke values.
//!
//! Every binding, mode table and runtime event in keyweave is keyed by a
//! [`Stroke`]. A stroke is built once from a raw specification such as
//! `"Ctrl-Shift-a"`, `"<Alt-X>"` or `"exclam"` and is immutable afterwards.
//! Two strokes are equal exactly when their canonical text is equal.
//!
//! ## Canonical form
//!
//! ```text
//! raw spec           canonical
//! ─────────────────  ─────────────
//! a, Key-a, Key-A    a
//! A, Shift-a         A
//! Alt-a, Alt-A       Alt+a
//! Alt-Shift-a        Alt+Shift+A
//! control-X          Ctrl+x
//! Key-!, exclam      !
//! pgdn, PageDown     Next
//! ```
//!
//! ## Learning: Parse, Don't Validate
//!
//! Instead of passing raw strings around and checking them at every use,
//! the raw text is parsed into a type whose existence proves it is valid.
//! Code that receives a `Stroke` never has to re-check canonicalization.

mod names;
mod stroke;

pub use names::{char_for_name, name_for_char};
pub use stroke::{Key, Modifiers, NamedKey, Stroke};

/// Result type for stroke parsing.
pub type StrokeResult<T> = Result<T, StrokeError>;

/// Reasons a raw shortcut specification cannot become a stroke.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StrokeError {
    #[error("Empty keystroke specification")]
    Empty,

    #[error("Forbidden keystroke {0:?}: enter/leave events cannot be bound")]
    Forbidden(String),

    #[error("Invalid keystroke {0:?}: Shift only applies to single letters")]
    ShiftNonLetter(String),

    #[error("Unknown key {key:?} in keystroke {spec:?}")]
    UnknownKey { spec: String, key: String },
}
