//! Focusable surfaces.
//!
//! ## Learning: Type Aliases and Newtypes
//!
//! `SurfaceId` is a newtype wrapper around `Uuid`, so a surface id can
//! never be confused with any other uuid the host passes around.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a focusable widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceId(Uuid);

impl SurfaceId {
    /// Creates a new unique surface ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SurfaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of widget has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceKind {
    /// The body text editor.
    Body,
    /// A headline being edited in the outline.
    Headline,
    /// The outline canvas itself.
    Tree,
    /// The log pane.
    Log,
    /// The minibuffer line.
    Minibuffer,
    /// A toolbar button.
    Button,
    Other,
}

impl SurfaceKind {
    /// Classifies a widget by its name prefix, e.g. `body-1` or `canvas`.
    pub fn from_widget_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        let prefixes = [
            ("body", SurfaceKind::Body),
            ("head", SurfaceKind::Headline),
            ("canvas", SurfaceKind::Tree),
            ("tree", SurfaceKind::Tree),
            ("log", SurfaceKind::Log),
            ("mini", SurfaceKind::Minibuffer),
            ("button", SurfaceKind::Button),
        ];
        prefixes
            .iter()
            .find(|(prefix, _)| lower.starts_with(prefix))
            .map(|(_, kind)| *kind)
            .unwrap_or(SurfaceKind::Other)
    }

    /// True for surfaces that accept typed text.
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            SurfaceKind::Body | SurfaceKind::Headline | SurfaceKind::Log | SurfaceKind::Minibuffer
        )
    }
}

/// A focused widget: identity plus kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Surface {
    pub id: SurfaceId,
    pub kind: SurfaceKind,
}

impl Surface {
    /// Creates a surface with a fresh id.
    pub fn new(kind: SurfaceKind) -> Self {
        Self {
            id: SurfaceId::new(),
            kind,
        }
    }

    /// Creates a surface with a known id.
    pub fn with_id(id: SurfaceId, kind: SurfaceKind) -> Self {
        Self { id, kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_widget_name() {
        assert_eq!(SurfaceKind::from_widget_name("body-2"), SurfaceKind::Body);
        assert_eq!(SurfaceKind::from_widget_name("head-17"), SurfaceKind::Headline);
        assert_eq!(SurfaceKind::from_widget_name("canvas"), SurfaceKind::Tree);
        assert_eq!(SurfaceKind::from_widget_name("LogPane"), SurfaceKind::Log);
        assert_eq!(SurfaceKind::from_widget_name("minibuffer"), SurfaceKind::Minibuffer);
        assert_eq!(SurfaceKind::from_widget_name("statusline"), SurfaceKind::Other);
    }

    #[test]
    fn test_text_capability() {
        assert!(SurfaceKind::Body.is_text());
        assert!(SurfaceKind::Headline.is_text());
        assert!(!SurfaceKind::Tree.is_text());
        assert!(!SurfaceKind::Button.is_text());
    }

    #[test]
    fn test_surface_ids_are_unique() {
        assert_ne!(Surface::new(SurfaceKind::Body).id, Surface::new(SurfaceKind::Body).id);
    }
}
