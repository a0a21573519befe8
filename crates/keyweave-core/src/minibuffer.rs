//! The minibuffer line and full-command entry.
//!
//! The minibuffer is a prompt followed by a virtual input line. The
//! engine owns the text; the host only ever sees the rendered line via
//! [`Host::show_prompt`](crate::host::Host::show_prompt).
//!
//! Full-command lets the user type any command name, with completion over
//! every registered command and Up/Down through previous entries.

use crate::builtin;
use crate::completion::{self, TabCompleter};
use crate::engine::Engine;
use crate::input::KeyEvent;
use crate::mode::ModeState;
use keyweave_stroke::NamedKey;

/// Prompt plus the text typed after it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Minibuffer {
    prompt: String,
    text: String,
}

impl Minibuffer {
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The full line as displayed.
    pub fn line(&self) -> String {
        format!("{}{}", self.prompt, self.text)
    }

    /// Sets a new prompt and clears the text.
    pub(crate) fn set_prompt(&mut self, prompt: &str) {
        self.prompt = prompt.to_string();
        self.text.clear();
    }

    pub(crate) fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
    }

    pub(crate) fn text_mut(&mut self) -> &mut String {
        &mut self.text
    }

    pub(crate) fn clear(&mut self) {
        self.prompt.clear();
        self.text.clear();
    }
}

/// Splits a full-command line into the command name and the rest.
///
/// The name runs over alphanumerics and `@`, `_`, `-`.
pub fn split_command(line: &str) -> (&str, Option<&str>) {
    let line = line.trim();
    let end = line
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || matches!(c, '@' | '_' | '-')))
        .map(|(i, _)| i)
        .unwrap_or(line.len());
    let tail = line[end..].trim();
    (&line[..end], (!tail.is_empty()).then_some(tail))
}

impl Engine {
    /// Starts reading a command name in the minibuffer.
    pub fn begin_full_command(&mut self) {
        self.state.full_command = Some(TabCompleter::new());
        self.set_state(ModeState::FullCommand);
        let prompt = self.config.keys.full_command_prompt.clone();
        self.set_prompt(&prompt);
        self.state.history.reset_cursor();
    }

    pub(crate) fn handle_full_command_key(&mut self, event: &KeyEvent) {
        let stroke = &event.stroke;
        if stroke.is_named(NamedKey::Escape) {
            self.keyboard_quit();
        } else if stroke.is_named(NamedKey::Insert) || stroke.is_fkey() {
            // Ignored.
        } else if stroke.is_named(NamedKey::Up) {
            let entry = self.state.history.backward().map(str::to_string);
            if let Some(entry) = entry {
                self.replace_full_command_text(&entry);
            }
        } else if stroke.is_named(NamedKey::Down) {
            let entry = self.state.history.forward().map(str::to_string);
            self.replace_full_command_text(entry.as_deref().unwrap_or(""));
        } else if stroke.is_named(NamedKey::Return) {
            self.run_full_command(event);
        } else if stroke.is_named(NamedKey::Tab) {
            self.complete_full_command();
        } else if stroke.is_named(NamedKey::BackSpace) {
            self.state.minibuffer.text_mut().pop();
            self.reset_full_command_cycling();
            self.show_full_command_matches();
            self.refresh_minibuffer();
        } else if let Some(ch) = event.character {
            self.state.minibuffer.text_mut().push(ch);
            self.reset_full_command_cycling();
            self.refresh_minibuffer();
        }
    }

    fn replace_full_command_text(&mut self, text: &str) {
        self.state.minibuffer.set_text(text);
        self.reset_full_command_cycling();
        self.refresh_minibuffer();
    }

    fn reset_full_command_cycling(&mut self) {
        if let Some(completer) = self.state.full_command.as_mut() {
            completer.reset();
        }
    }

    fn command_names(&self) -> Vec<String> {
        self.registry.all_names().map(str::to_string).collect()
    }

    fn show_full_command_matches(&mut self) {
        let names = self.command_names();
        let (items, _) = completion::matching(self.state.minibuffer.text(), &names);
        self.host.show_list("Completion", &items);
    }

    fn complete_full_command(&mut self) {
        // Once arguments follow the name there is nothing left to complete.
        if split_command(self.state.minibuffer.text()).1.is_some() {
            return;
        }
        let names = self.command_names();
        let completer = self.state.full_command.get_or_insert_with(TabCompleter::new);
        let items = completer.tab(self.state.minibuffer.text_mut(), &names);
        if items.is_empty() {
            self.host.beep();
        }
        self.host.show_list("Completion", &items);
        self.refresh_minibuffer();
    }

    fn run_full_command(&mut self, event: &KeyEvent) {
        let line = self.state.minibuffer.text().to_string();
        let (name, tail) = split_command(&line);
        let Some(handler) = self.registry.lookup(name) else {
            tracing::debug!(command = name, "full-command: no such command");
            self.complete_full_command();
            return;
        };

        self.clear_state();
        self.reset_label();
        self.host.clear_list();
        self.state.history.add(name);
        self.state.current_command = Some(name.to_string());
        self.invoke(name, &handler, Some(event), tail);
        self.end_command();
        if self.state.mode.is_idle() && self.state.minibuffer.prompt().is_empty() {
            self.show_state_and_mode(None);
        }
    }

    /// Re-runs the most recent full-command entry.
    pub fn repeat_complex_command(&mut self) -> crate::CoreResult<()> {
        let last = self
            .state
            .history
            .entries()
            .iter()
            .rev()
            .find(|entry| *entry != builtin::REPEAT_COMPLEX_COMMAND)
            .cloned();
        let Some(last) = last else {
            return Ok(());
        };
        self.simulate_command(&last)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::test_support::{body, counter, press, recording_engine};

    #[test]
    fn test_split_command() {
        assert_eq!(split_command("goto-line 42"), ("goto-line", Some("42")));
        assert_eq!(split_command("  save  "), ("save", None));
        assert_eq!(split_command("find@x rest of it"), ("find@x", Some("rest of it")));
        assert_eq!(split_command(""), ("", None));
    }

    #[test]
    fn test_minibuffer_line() {
        let mut mb = Minibuffer::default();
        mb.set_prompt("find: ");
        mb.text_mut().push_str("abc");
        assert_eq!(mb.line(), "find: abc");
        mb.set_prompt("other: ");
        assert_eq!(mb.text(), "");
    }

    #[test]
    fn test_full_command_runs_typed_name() {
        let (mut engine, host) = recording_engine(Config::default());
        let (handler, count) = counter();
        engine.register_command("save-file", handler, None);

        press(&mut engine, "Alt-x", body());
        assert_eq!(engine.state(), &ModeState::FullCommand);
        assert_eq!(host.last_prompt().as_deref(), Some("full-command: "));

        for key in ["s", "a", "v", "e", "minus", "f", "i", "l", "e", "Return"] {
            press(&mut engine, key, body());
        }
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(engine.state().is_idle());
        assert_eq!(engine.history().last(), Some("save-file"));
    }

    #[test]
    fn test_full_command_tab_completes_names() {
        let (mut engine, _host) = recording_engine(Config::default());
        let (handler, _) = counter();
        engine.register_command("zoom-in", handler.clone(), None);
        engine.register_command("zoom-out", handler, None);

        press(&mut engine, "Alt-x", body());
        press(&mut engine, "z", body());
        press(&mut engine, "Tab", body());
        assert_eq!(engine.minibuffer().text(), "zoom-");
        press(&mut engine, "Tab", body());
        assert_eq!(engine.minibuffer().text(), "zoom-out");
    }

    #[test]
    fn test_unknown_name_stays_in_full_command() {
        let (mut engine, host) = recording_engine(Config::default());
        press(&mut engine, "Alt-x", body());
        press(&mut engine, "q", body());
        press(&mut engine, "Return", body());
        assert_eq!(engine.state(), &ModeState::FullCommand);
        assert!(host.beeps() > 0);
    }

    #[test]
    fn test_history_navigation() {
        let mut config = Config::default();
        config.keys.history = vec!["first".to_string(), "second".to_string()];
        let (mut engine, _host) = recording_engine(config);

        press(&mut engine, "Alt-x", body());
        press(&mut engine, "Up", body());
        assert_eq!(engine.minibuffer().text(), "second");
        press(&mut engine, "Up", body());
        assert_eq!(engine.minibuffer().text(), "first");
        press(&mut engine, "Down", body());
        assert_eq!(engine.minibuffer().text(), "second");
        press(&mut engine, "Down", body());
        assert_eq!(engine.minibuffer().text(), "");
    }

    #[test]
    fn test_tail_reaches_command() {
        let (mut engine, _host) = recording_engine(Config::default());
        let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
        let sink = std::sync::Arc::clone(&seen);
        engine.register_fn("goto-line", None, move |ctx| {
            *sink.lock().unwrap() = ctx.tail.map(str::to_string);
            Ok(crate::CommandOutcome::Handled)
        });

        press(&mut engine, "Alt-x", body());
        engine.set_minibuffer_text("goto-line 12");
        press(&mut engine, "Return", body());
        assert_eq!(seen.lock().unwrap().as_deref(), Some("12"));
    }

    #[test]
    fn test_escape_leaves_full_command() {
        let (mut engine, _host) = recording_engine(Config::default());
        press(&mut engine, "Alt-x", body());
        press(&mut engine, "x", body());
        press(&mut engine, "Escape", body());
        assert!(engine.state().is_idle());
        assert_eq!(engine.minibuffer().line(), "");
    }
}
