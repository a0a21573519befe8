//! Universal argument: a repeat count for the next command.
//!
//! `Ctrl-u` starts a count of 4. Each further `Ctrl-u` multiplies it by
//! 4, and digits typed afterwards give an explicit count that the
//! multiplier then scales. The first key that is neither is dispatched
//! `max(1, digits) * multiplier` times, capped at [`MAX_REPEAT_COUNT`].

use crate::dispatch::Dispatch;
use crate::engine::Engine;
use crate::input::KeyEvent;
use crate::mode::ModeState;
use crate::resolver;
use keyweave_stroke::{Key, NamedKey};
use std::sync::Arc;

/// Upper bound on how many times one universal argument repeats a command.
pub const MAX_REPEAT_COUNT: u64 = 10_000;

/// A pending repeat count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatState {
    multiplier: u64,
    digits: String,
}

impl Default for RepeatState {
    fn default() -> Self {
        Self {
            multiplier: 1,
            digits: String::new(),
        }
    }
}

impl RepeatState {
    /// Multiplies the multiplier by 4.
    pub fn quadruple(&mut self) {
        self.multiplier = self.multiplier.saturating_mul(4).min(MAX_REPEAT_COUNT);
    }

    /// Appends a digit, or a minus sign before any digit.
    ///
    /// Returns false if `ch` is not accepted, including a digit that would
    /// take the count past [`MAX_REPEAT_COUNT`].
    pub fn push(&mut self, ch: char) -> bool {
        if ch == '-' && self.digits.is_empty() {
            self.digits.push(ch);
            return true;
        }
        if !ch.is_ascii_digit() {
            return false;
        }
        let candidate = format!("{}{ch}", self.digits);
        match candidate.parse::<i64>() {
            Ok(n) if n <= MAX_REPEAT_COUNT as i64 => {
                self.digits = candidate;
                true
            }
            _ => false,
        }
    }

    pub fn digits(&self) -> &str {
        &self.digits
    }

    /// How many times the next command runs.
    pub fn count(&self) -> u64 {
        // Empty or a lone minus sign.
        let n = self.digits.parse::<i64>().map_or(1, |n| n.max(1)) as u64;
        n.saturating_mul(self.multiplier).min(MAX_REPEAT_COUNT)
    }
}

impl Engine {
    /// Starts collecting a repeat count.
    pub fn begin_universal_argument(&mut self) {
        let mut repeat = RepeatState::default();
        repeat.quadruple();
        self.state.repeat = Some(repeat);
        self.set_state(ModeState::UniversalArg);
        let prompt = self.config.keys.universal_argument_prompt.clone();
        self.set_prompt(&prompt);
    }

    pub(crate) fn handle_universal_key(&mut self, event: &KeyEvent) -> Dispatch {
        let stroke = &event.stroke;
        if stroke.is_named(NamedKey::Escape) {
            self.keyboard_quit();
            return Dispatch::Aborted;
        }

        let repeat = self.state.repeat.get_or_insert_with(RepeatState::default);
        if self.special.universal_argument.as_ref() == Some(stroke) {
            repeat.quadruple();
            tracing::trace!(count = repeat.count(), "universal argument");
            return Dispatch::Consumed;
        }
        if let Key::Char(ch) = stroke.key() {
            if stroke.is_plain() {
                if repeat.push(ch) {
                    let digits = repeat.digits().to_string();
                    self.set_minibuffer_text(&digits);
                    return Dispatch::Consumed;
                }
                if ch.is_ascii_digit() {
                    tracing::debug!(digits = repeat.digits(), "repeat count at limit");
                    self.host.beep();
                    return Dispatch::Consumed;
                }
            }
        }

        // Consumed exactly once.
        let repeat = self.state.repeat.take().unwrap_or_default();
        self.set_state(ModeState::Idle);
        self.reset_label();

        let outcome = self.execute_n_times(event, repeat.count());
        if self.state.mode.is_idle() {
            self.show_state_and_mode(None);
        }
        outcome
    }

    /// Dispatches `event` `n` times.
    ///
    /// A bound stroke invokes its command directly; anything else goes
    /// through full dispatch each time.
    pub(crate) fn execute_n_times(&mut self, event: &KeyEvent, n: u64) -> Dispatch {
        tracing::debug!(stroke = %event.stroke, n, "repeating");
        let bindings = Arc::clone(&self.bindings);
        let resolved = resolver::resolve(
            &bindings,
            &event.stroke,
            event.surface.kind,
            self.state.unbound_action,
        );
        if let Some(record) = resolved {
            for _ in 0..n {
                self.master_command(&record.command, &record.handler, Some(event));
            }
            return Dispatch::Invoked(record.command.clone());
        }

        let mut outcome = Dispatch::Ignored;
        for _ in 0..n {
            outcome = self.handle_keystroke(event);
        }
        outcome
    }
}
