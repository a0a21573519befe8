//! Inbound keystroke events.

use crate::surface::{Surface, SurfaceId, SurfaceKind};
use crate::CoreResult;
use keyweave_stroke::Stroke;
use serde::{Deserialize, Serialize};

/// A keystroke as delivered by the host's event layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawKeyEvent {
    /// The character the key would type, if any.
    pub character: Option<char>,
    /// Raw stroke specification, canonicalized on entry.
    pub stroke: String,
    pub surface_id: SurfaceId,
    /// Widget name; its prefix determines the surface kind.
    pub surface_name: String,
}

/// A canonicalized keystroke aimed at a surface.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyEvent {
    pub stroke: Stroke,
    pub character: Option<char>,
    pub surface: Surface,
}

impl KeyEvent {
    /// Creates an event whose character is derived from the stroke.
    pub fn new(stroke: Stroke, surface: Surface) -> Self {
        let character = stroke.insertable_char();
        Self {
            stroke,
            character,
            surface,
        }
    }

    /// Parses a raw stroke spec aimed at `surface`.
    pub fn parse(spec: &str, surface: Surface) -> CoreResult<Self> {
        Ok(Self::new(Stroke::parse(spec)?, surface))
    }

    /// Canonicalizes a raw host event.
    pub fn from_raw(raw: &RawKeyEvent) -> CoreResult<Self> {
        let stroke = Stroke::parse(&raw.stroke)?;
        let surface = Surface::with_id(raw.surface_id, SurfaceKind::from_widget_name(&raw.surface_name));
        let character = raw.character.or_else(|| stroke.insertable_char());
        Ok(Self {
            stroke,
            character,
            surface,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_canonicalizes() {
        let raw = RawKeyEvent {
            character: None,
            stroke: "control-S".to_string(),
            surface_id: SurfaceId::new(),
            surface_name: "body".to_string(),
        };
        let event = KeyEvent::from_raw(&raw).unwrap();
        assert_eq!(event.stroke.as_str(), "Ctrl+s");
        assert_eq!(event.surface.kind, SurfaceKind::Body);
        assert_eq!(event.character, None);
    }

    #[test]
    fn test_plain_event_carries_character() {
        let event = KeyEvent::parse("q", Surface::new(SurfaceKind::Log)).unwrap();
        assert_eq!(event.character, Some('q'));
    }

    #[test]
    fn test_invalid_stroke_is_an_error() {
        assert!(KeyEvent::parse("Shift-7", Surface::new(SurfaceKind::Body)).is_err());
    }
}
