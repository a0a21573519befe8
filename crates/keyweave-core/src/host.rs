//! Traits the embedding editor implements.
//!
//! The engine never draws anything or edits text. It tells the [`Host`]
//! what to show and which keys to insert, and lets optional collaborators
//! intercept keys at fixed points of the dispatch order.

use crate::command::CommandOutcome;
use crate::config::UnboundAction;
use crate::engine::Engine;
use crate::input::KeyEvent;

/// Outbound calls from the engine to the editor.
pub trait Host {
    /// Displays the prompt or status line.
    fn show_prompt(&mut self, text: &str);

    /// Inserts (or overwrites with) the key's text on its surface.
    fn self_insert(&mut self, event: &KeyEvent, action: UnboundAction);

    /// Shows a titled list, e.g. completions or bindings.
    fn show_list(&mut self, _title: &str, _items: &[String]) {}

    /// Hides any list shown by [`Host::show_list`].
    fn clear_list(&mut self) {}

    /// Signals a rejected key.
    fn beep(&mut self) {}
}

/// A host that discards everything.
#[derive(Debug, Default)]
pub struct NullHost;

impl Host for NullHost {
    fn show_prompt(&mut self, _text: &str) {}

    fn self_insert(&mut self, _event: &KeyEvent, _action: UnboundAction) {}
}

/// Claims keys before binding lookup, e.g. for a demo or vi emulation.
pub trait Passthrough {
    /// Returns true if the key was consumed.
    fn claims(&mut self, event: &KeyEvent) -> bool;
}

/// Records commands into a keyboard macro.
pub trait MacroRecorder {
    fn is_recording(&self) -> bool;

    fn record(&mut self, command: &str, event: &KeyEvent);
}

/// Owns the auto-complete state while it is active.
pub trait AutoCompleter {
    /// Handles a key while auto-completing.
    ///
    /// `Unhandled` lets the key continue through standard dispatch.
    fn handle_key(&mut self, engine: &mut Engine, event: &KeyEvent) -> CommandOutcome;

    /// Called when the abort stroke cancels auto-completion.
    fn abort(&mut self) {}
}
