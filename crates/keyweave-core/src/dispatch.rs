//! Per-keystroke dispatch.
//!
//! [`Engine::handle_keystroke`] runs every key through the same sequence:
//!
//! 1. Bare modifier presses are ignored.
//! 2. The abort stroke runs `keyboard-quit`, whatever the state.
//! 3. An active modal state gets the key first. User modes hand unbound
//!    keys back after ending; the minibuffer states first let a few
//!    editing bindings through.
//! 4. A passthrough collaborator may claim the key.
//! 5. Plain keys insert text unless the input state is `command`, the
//!    tree has focus, or the key triggers auto-completion.
//! 6. Anything else resolves through the pane scopes; unresolved keys go
//!    to the unbound-key handler, which inserts or drops them.

use crate::binding::Scope;
use crate::builtin;
use crate::command::CommandOutcome;
use crate::config::UnboundAction;
use crate::engine::Engine;
use crate::event::EngineEvent;
use crate::input::{KeyEvent, RawKeyEvent};
use crate::mode::ModeState;
use crate::resolver;
use crate::surface::SurfaceKind;
use crate::CoreResult;
use keyweave_stroke::{Key, NamedKey, Stroke};
use std::sync::Arc;

/// What became of a keystroke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// A bare modifier press.
    Ignored,
    /// The abort stroke, or an abort inside a modal state.
    Aborted,
    /// A modal state used the key.
    Consumed,
    /// The passthrough collaborator claimed the key.
    PassedThrough,
    /// The host was asked to insert the key.
    Inserted,
    /// A command ran.
    Invoked(String),
    /// Nothing wanted the key.
    Dropped,
}

/// Keys that stay with the minibuffer state instead of resolving.
const MINIBUFFER_KEYS: &[NamedKey] = &[
    NamedKey::BackSpace,
    NamedKey::Return,
    NamedKey::Tab,
    NamedKey::Escape,
];

/// Scopes consulted for editing bindings inside the minibuffer.
const MINIBUFFER_SCOPES: &[Scope] = &[Scope::Mini, Scope::All, Scope::Text];

impl Engine {
    /// Canonicalizes and dispatches a raw host event.
    pub fn handle_raw(&mut self, raw: &RawKeyEvent) -> CoreResult<Dispatch> {
        let event = KeyEvent::from_raw(raw)?;
        Ok(self.handle_keystroke(&event))
    }

    /// Dispatches one keystroke.
    pub fn handle_keystroke(&mut self, event: &KeyEvent) -> Dispatch {
        let stroke = &event.stroke;
        if stroke.is_pure_modifier() {
            return Dispatch::Ignored;
        }
        self.state.lossage.push(stroke.clone());
        tracing::trace!(
            stroke = %stroke,
            surface = ?event.surface.kind,
            state = ?self.state.mode.kind(),
            "keystroke"
        );

        if self.special.abort.as_ref() == Some(stroke) {
            self.abort(event);
            return Dispatch::Aborted;
        }

        if !self.state.mode.is_idle() {
            if let Some(outcome) = self.dispatch_to_state(event) {
                return outcome;
            }
        }

        if let Some(passthrough) = self.passthrough.as_mut() {
            if passthrough.claims(event) {
                tracing::trace!(stroke = %stroke, "passthrough claimed key");
                return Dispatch::PassedThrough;
            }
        }

        if self.is_plain_key(stroke)
            && self.state.unbound_action.inserts()
            && event.surface.kind != SurfaceKind::Tree
            && !self.special.auto_complete.contains(stroke)
        {
            return self.handle_unbound_key(event);
        }

        let bindings = Arc::clone(&self.bindings);
        let resolved = resolver::resolve(
            &bindings,
            stroke,
            event.surface.kind,
            self.state.unbound_action,
        );
        match resolved {
            Some(record) => {
                let outcome = self.master_command(&record.command, &record.handler, Some(event));
                if outcome == CommandOutcome::Unhandled && self.state.mode.is_idle() {
                    return self.handle_unbound_key(event);
                }
                Dispatch::Invoked(record.command.clone())
            }
            None => self.handle_unbound_key(event),
        }
    }

    fn abort(&mut self, event: &KeyEvent) {
        match self.registry.lookup(builtin::KEYBOARD_QUIT) {
            Some(handler) => {
                self.master_command(builtin::KEYBOARD_QUIT, &handler, Some(event));
            }
            None => self.keyboard_quit(),
        }
    }

    /// Offers the key to the active modal state.
    ///
    /// `None` means the state declined and dispatch continues.
    fn dispatch_to_state(&mut self, event: &KeyEvent) -> Option<Dispatch> {
        match self.state.mode {
            ModeState::Idle => None,
            ModeState::UserMode { .. } => self.handle_user_mode_key(event),
            ModeState::GetArg => Some(match self.minibuffer_binding(event) {
                Some(outcome) => outcome,
                None => self.handle_arg_key(event),
            }),
            ModeState::FullCommand => Some(match self.minibuffer_binding(event) {
                Some(outcome) => outcome,
                None => {
                    self.handle_full_command_key(event);
                    Dispatch::Consumed
                }
            }),
            ModeState::UniversalArg => Some(self.handle_universal_key(event)),
            ModeState::AutoComplete => self.handle_auto_complete_key(event),
        }
    }

    /// Runs an editing binding while the minibuffer collects input.
    ///
    /// Commands outside `minibuffer_commands` end the collection first.
    fn minibuffer_binding(&mut self, event: &KeyEvent) -> Option<Dispatch> {
        let stroke = &event.stroke;
        let in_full_command = matches!(self.state.mode, ModeState::FullCommand);
        if in_full_command && (stroke.is_named(NamedKey::Up) || stroke.is_named(NamedKey::Down)) {
            return None;
        }
        if MINIBUFFER_KEYS.iter().any(|k| stroke.is_named(*k))
            || stroke.is_fkey()
            || self.is_plain_key(stroke)
        {
            return None;
        }

        let bindings = Arc::clone(&self.bindings);
        let record = MINIBUFFER_SCOPES
            .iter()
            .find_map(|scope| bindings.get(*scope, stroke))?;
        if record.command == "replace-string" && matches!(self.state.mode, ModeState::GetArg) {
            return None;
        }

        if !self.config.keys.minibuffer_commands.contains(&record.command) {
            tracing::debug!(command = %record.command, "leaving minibuffer for command");
            self.keyboard_quit();
        }
        self.master_command(&record.command, &record.handler, Some(event));
        Some(Dispatch::Invoked(record.command.clone()))
    }

    fn handle_auto_complete_key(&mut self, event: &KeyEvent) -> Option<Dispatch> {
        let Some(mut completer) = self.auto_completer.take() else {
            self.set_state(ModeState::Idle);
            return None;
        };
        let outcome = completer.handle_key(self, event);
        // The collaborator may have installed a replacement meanwhile.
        if self.auto_completer.is_none() {
            self.auto_completer = Some(completer);
        }
        match outcome {
            CommandOutcome::Handled => Some(Dispatch::Consumed),
            CommandOutcome::Unhandled => None,
        }
    }

    /// Enters the auto-complete state. Returns false when no
    /// auto-completer is installed.
    pub fn begin_auto_complete(&mut self) -> bool {
        if self.auto_completer.is_none() {
            return false;
        }
        self.set_state(ModeState::AutoComplete);
        true
    }

    /// Leaves the auto-complete state.
    pub fn end_auto_complete(&mut self) {
        if matches!(self.state.mode, ModeState::AutoComplete) {
            self.set_state(ModeState::Idle);
        }
    }

    /// True for keys that type text: plain keys, and Alt+Ctrl characters
    /// (AltGr) unless Alt+Ctrl bindings are enabled.
    pub fn is_plain_key(&self, stroke: &Stroke) -> bool {
        if stroke.is_plain() {
            return true;
        }
        let modifiers = stroke.modifiers();
        stroke.is_alt_ctrl()
            && matches!(stroke.key(), Key::Char(_))
            && !modifiers.cmd
            && !modifiers.meta
            && !self.config.keys.enable_alt_ctrl_bindings
    }

    /// Inserts or drops a key no binding claimed.
    fn handle_unbound_key(&mut self, event: &KeyEvent) -> Dispatch {
        let stroke = &event.stroke;
        let action = self.state.unbound_action;
        let keys = &self.config.keys;
        let plain = self.is_plain_key(stroke);

        let drop = action == UnboundAction::Command
            || stroke.is_fkey()
            || (!plain && stroke.modifiers().has_command_modifier() && keys.drop_unbound_alt_ctrl)
            || (keys.ignore_unbound_non_ascii_keys && event.character.is_some_and(|c| !c.is_ascii()))
            || stroke.is_named(NamedKey::Escape)
            || stroke.is_named(NamedKey::Insert)
            || !event.surface.kind.is_text()
            || event.character.is_none();

        if drop {
            tracing::debug!(stroke = %stroke, action = %action, "dropping unbound key");
            self.events.emit(EngineEvent::KeyDropped(stroke.to_string()));
            return Dispatch::Dropped;
        }

        self.host.self_insert(event, action);
        Dispatch::Inserted
    }
}
