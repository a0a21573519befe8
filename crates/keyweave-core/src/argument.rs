//! Minibuffer argument collection.
//!
//! A command that needs input calls [`Engine::get_arg`] with an
//! [`ArgRequest`] and returns. Keys then accumulate in the minibuffer
//! until Return (or an escape stroke) hands the text to the request's
//! continuation. The continuation runs like a command: it may start
//! another collection, enter a mode, or fail without breaking dispatch.
//!
//! ## Learning: `FnOnce` Continuations
//!
//! The continuation is a `Box<dyn FnOnce(..)>`. `FnOnce` lets it move
//! captured values out when it runs, and taking the [`ArgumentState`] out
//! of the engine before calling it guarantees it runs at most once.

use crate::command::{CommandContext, CommandResult};
use crate::completion::{self, TabCompleter};
use crate::dispatch::Dispatch;
use crate::engine::Engine;
use crate::input::KeyEvent;
use crate::mode::ModeState;
use keyweave_stroke::{NamedKey, Stroke};
use std::fmt;

type Continuation = Box<dyn FnOnce(&mut CommandContext<'_>, String) -> CommandResult>;

/// A request to collect one argument.
pub struct ArgRequest {
    continuation: Continuation,
    prompt: Option<String>,
    candidates: Option<Vec<String>>,
    single_char: bool,
    escapes: Vec<Stroke>,
}

impl ArgRequest {
    /// Creates a request that hands the collected text to `continuation`.
    pub fn new<F>(continuation: F) -> Self
    where
        F: FnOnce(&mut CommandContext<'_>, String) -> CommandResult + 'static,
    {
        Self {
            continuation: Box::new(continuation),
            prompt: None,
            candidates: None,
            single_char: false,
            escapes: Vec::new(),
        }
    }

    /// Shows `prompt` instead of keeping the current one.
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Enables completion over `candidates`.
    pub fn candidates(mut self, candidates: Vec<String>) -> Self {
        self.candidates = Some(candidates);
        self
    }

    /// Ends collection on the first key, passing that key's text.
    pub fn single_char(mut self) -> Self {
        self.single_char = true;
        self
    }

    /// Extra strokes that end collection like Return.
    pub fn escapes(mut self, escapes: Vec<Stroke>) -> Self {
        self.escapes = escapes;
        self
    }
}

impl fmt::Debug for ArgRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgRequest")
            .field("prompt", &self.prompt)
            .field("candidates", &self.candidates)
            .field("single_char", &self.single_char)
            .field("escapes", &self.escapes)
            .finish_non_exhaustive()
    }
}

/// Live collection state. Exists only between `get_arg` and the end of
/// collection.
pub struct ArgumentState {
    continuation: Continuation,
    candidates: Vec<String>,
    completion: bool,
    single_char: bool,
    escapes: Vec<Stroke>,
    completer: TabCompleter,
    /// Command that asked for the argument.
    command: Option<String>,
}

impl Engine {
    /// Starts collecting an argument.
    pub fn get_arg(&mut self, request: ArgRequest) {
        let prompt = request
            .prompt
            .unwrap_or_else(|| self.state.minibuffer.prompt().to_string());
        self.set_prompt(&prompt);

        let completion = request.candidates.is_some();
        self.state.argument = Some(ArgumentState {
            continuation: request.continuation,
            candidates: request.candidates.unwrap_or_default(),
            completion,
            single_char: request.single_char,
            escapes: request.escapes,
            completer: TabCompleter::new(),
            command: self.state.current_command.clone(),
        });
        self.set_state(ModeState::GetArg);
    }

    pub(crate) fn handle_arg_key(&mut self, event: &KeyEvent) -> Dispatch {
        let stroke = &event.stroke;
        let Some(arg) = self.state.argument.as_ref() else {
            // GetArg without state cannot collect anything.
            self.clear_state();
            return Dispatch::Dropped;
        };
        let single_char = arg.single_char;
        let escaped = arg.escapes.contains(stroke);

        if stroke.is_named(NamedKey::Escape) {
            self.keyboard_quit();
            return Dispatch::Aborted;
        }

        if single_char {
            let value = event
                .character
                .map(String::from)
                .unwrap_or_else(|| stroke.to_string());
            return self.finish_arg(event, value);
        }
        if stroke.is_named(NamedKey::Return) || escaped {
            let value = self.state.minibuffer.text().to_string();
            return self.finish_arg(event, value);
        }

        if stroke.is_named(NamedKey::Tab) {
            self.complete_arg();
        } else if stroke.is_named(NamedKey::BackSpace) {
            if self.state.minibuffer.text().is_empty() {
                self.keyboard_quit();
                return Dispatch::Aborted;
            }
            self.state.minibuffer.text_mut().pop();
            self.reset_arg_cycling();
            self.show_arg_matches();
            self.refresh_minibuffer();
        } else if stroke.is_fkey() {
            // Ignored.
        } else if let Some(ch) = event.character {
            self.insert_arg_char(ch);
        }
        Dispatch::Consumed
    }

    fn insert_arg_char(&mut self, ch: char) {
        self.state.minibuffer.text_mut().push(ch);
        self.reset_arg_cycling();
        let Some(arg) = self.state.argument.as_ref() else {
            return;
        };
        if arg.completion {
            let (items, _) = completion::matching(self.state.minibuffer.text(), &arg.candidates);
            if items.is_empty() && self.config.keys.forbid_invalid_completions {
                self.state.minibuffer.text_mut().pop();
                self.host.beep();
            } else {
                self.host.show_list("Completion", &items);
            }
        }
        self.refresh_minibuffer();
    }

    fn reset_arg_cycling(&mut self) {
        if let Some(arg) = self.state.argument.as_mut() {
            arg.completer.reset();
        }
    }

    fn show_arg_matches(&mut self) {
        let Some(arg) = self.state.argument.as_ref() else {
            return;
        };
        if arg.completion {
            let (items, _) = completion::matching(self.state.minibuffer.text(), &arg.candidates);
            self.host.show_list("Completion", &items);
        }
    }

    fn complete_arg(&mut self) {
        let Some(arg) = self.state.argument.as_mut() else {
            return;
        };
        if !arg.completion {
            return;
        }
        let items = arg
            .completer
            .tab(self.state.minibuffer.text_mut(), &arg.candidates);
        if items.is_empty() {
            self.host.beep();
        }
        self.host.show_list("Completion", &items);
        self.refresh_minibuffer();
    }

    fn finish_arg(&mut self, event: &KeyEvent, value: String) -> Dispatch {
        let Some(arg) = self.state.argument.take() else {
            return Dispatch::Dropped;
        };
        self.set_state(ModeState::Idle);
        self.host.clear_list();

        let name = arg.command.unwrap_or_else(|| "get-arg".to_string());
        tracing::debug!(command = %name, value = %value, "argument collected");
        let continuation = arg.continuation;
        self.guarded(&name, |engine| {
            let mut ctx = CommandContext {
                engine,
                command: &name,
                event: Some(event),
                tail: None,
            };
            continuation(&mut ctx, value)
        });

        // The continuation may have started another collection.
        if self.state.mode.is_idle() {
            self.reset_label();
            self.show_state_and_mode(None);
            self.end_command();
        }
        Dispatch::Consumed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutcome;
    use crate::config::Config;
    use crate::test_support::{body, press, recording_engine};
    use std::sync::{Arc, Mutex};

    const FINDS: &[&str] = &["find-all", "find-next", "find-prev"];

    fn candidates() -> Vec<String> {
        FINDS.iter().map(|s| s.to_string()).collect()
    }

    /// Registers `ask`, which collects one argument into the returned slot.
    fn install_ask(
        engine: &mut Engine,
        configure: fn(ArgRequest) -> ArgRequest,
    ) -> Arc<Mutex<Option<String>>> {
        let slot = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&slot);
        engine.register_fn("ask", None, move |ctx| {
            let sink = Arc::clone(&sink);
            let request = ArgRequest::new(move |_ctx, value| {
                *sink.lock().unwrap() = Some(value);
                Ok(CommandOutcome::Handled)
            });
            ctx.engine.get_arg(configure(request.prompt("Find: ")));
            Ok(CommandOutcome::Handled)
        });
        slot
    }

    fn type_text(engine: &mut Engine, text: &str) {
        for ch in text.chars() {
            let spec = keyweave_stroke::name_for_char(ch)
                .map(str::to_string)
                .unwrap_or_else(|| ch.to_string());
            press(engine, &spec, body());
        }
    }

    #[test]
    fn test_collects_text_until_return() {
        let (mut engine, host) = recording_engine(Config::default());
        let slot = install_ask(&mut engine, |r| r);

        engine.simulate_command("ask").unwrap();
        assert_eq!(engine.state(), &ModeState::GetArg);
        type_text(&mut engine, "abc");
        assert_eq!(host.last_prompt().as_deref(), Some("Find: abc"));

        press(&mut engine, "Return", body());
        assert_eq!(slot.lock().unwrap().as_deref(), Some("abc"));
        assert!(engine.state().is_idle());
        assert!(engine.state.argument.is_none());
    }

    #[test]
    fn test_first_tab_cycles_to_second_candidate() {
        let (mut engine, host) = recording_engine(Config::default());
        install_ask(&mut engine, |r| r.candidates(candidates()));

        engine.simulate_command("ask").unwrap();
        type_text(&mut engine, "find-");
        assert_eq!(engine.minibuffer().text(), "find-");

        press(&mut engine, "Tab", body());
        assert_eq!(engine.minibuffer().text(), "find-next");
        let lists = host.lists();
        assert_eq!(lists.last().unwrap().1.len(), 3);

        press(&mut engine, "Tab", body());
        assert_eq!(engine.minibuffer().text(), "find-prev");
        press(&mut engine, "Tab", body());
        assert_eq!(engine.minibuffer().text(), "find-all");
    }

    #[test]
    fn test_tab_extends_prefix() {
        let (mut engine, _host) = recording_engine(Config::default());
        install_ask(&mut engine, |r| r.candidates(candidates()));

        engine.simulate_command("ask").unwrap();
        type_text(&mut engine, "f");
        press(&mut engine, "Tab", body());
        assert_eq!(engine.minibuffer().text(), "find-");
    }

    #[test]
    fn test_typing_resets_cycle() {
        let (mut engine, _host) = recording_engine(Config::default());
        install_ask(&mut engine, |r| r.candidates(candidates()));

        engine.simulate_command("ask").unwrap();
        type_text(&mut engine, "find-");
        press(&mut engine, "Tab", body());
        press(&mut engine, "BackSpace", body());
        assert_eq!(engine.minibuffer().text(), "find-nex");
        press(&mut engine, "Tab", body());
        assert_eq!(engine.minibuffer().text(), "find-next");
    }

    #[test]
    fn test_forbid_invalid_completions() {
        let mut config = Config::default();
        config.keys.forbid_invalid_completions = true;
        let (mut engine, host) = recording_engine(config);
        install_ask(&mut engine, |r| r.candidates(candidates()));

        engine.simulate_command("ask").unwrap();
        type_text(&mut engine, "fz");
        assert_eq!(engine.minibuffer().text(), "f");
        assert_eq!(host.beeps(), 1);
    }

    #[test]
    fn test_escape_discards() {
        let (mut engine, _host) = recording_engine(Config::default());
        let slot = install_ask(&mut engine, |r| r);

        engine.simulate_command("ask").unwrap();
        type_text(&mut engine, "abc");
        assert_eq!(press(&mut engine, "Escape", body()), Dispatch::Aborted);
        assert!(slot.lock().unwrap().is_none());
        assert!(engine.state().is_idle());
        assert!(engine.state.argument.is_none());
    }

    #[test]
    fn test_backspace_on_empty_aborts() {
        let (mut engine, _host) = recording_engine(Config::default());
        let slot = install_ask(&mut engine, |r| r);

        engine.simulate_command("ask").unwrap();
        type_text(&mut engine, "a");
        press(&mut engine, "BackSpace", body());
        assert_eq!(engine.state(), &ModeState::GetArg);
        assert_eq!(press(&mut engine, "BackSpace", body()), Dispatch::Aborted);
        assert!(engine.state().is_idle());
        assert!(slot.lock().unwrap().is_none());
    }

    #[test]
    fn test_single_char() {
        let (mut engine, _host) = recording_engine(Config::default());
        let slot = install_ask(&mut engine, |r| r.single_char());

        engine.simulate_command("ask").unwrap();
        press(&mut engine, "y", body());
        assert_eq!(slot.lock().unwrap().as_deref(), Some("y"));
        assert!(engine.state().is_idle());
    }

    #[test]
    fn test_escape_stroke_ends_collection() {
        let (mut engine, _host) = recording_engine(Config::default());
        let slot = install_ask(&mut engine, |r| {
            r.escapes(vec![Stroke::parse("Ctrl-s").unwrap()])
        });

        engine.simulate_command("ask").unwrap();
        type_text(&mut engine, "xy");
        press(&mut engine, "Ctrl-s", body());
        assert_eq!(slot.lock().unwrap().as_deref(), Some("xy"));
    }

    #[test]
    fn test_chained_collection() {
        let (mut engine, host) = recording_engine(Config::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        engine.register_fn("replace", None, move |ctx| {
            let sink = Arc::clone(&sink);
            ctx.engine.get_arg(
                ArgRequest::new(move |ctx, find| {
                    sink.lock().unwrap().push(find);
                    ctx.engine.get_arg(
                        ArgRequest::new(move |_ctx, with| {
                            sink.lock().unwrap().push(with);
                            Ok(CommandOutcome::Handled)
                        })
                        .prompt("With: "),
                    );
                    Ok(CommandOutcome::Handled)
                })
                .prompt("Replace: "),
            );
            Ok(CommandOutcome::Handled)
        });

        engine.simulate_command("replace").unwrap();
        type_text(&mut engine, "a");
        press(&mut engine, "Return", body());
        assert_eq!(engine.state(), &ModeState::GetArg);
        assert_eq!(host.last_prompt().as_deref(), Some("With: "));

        type_text(&mut engine, "b");
        press(&mut engine, "Return", body());
        assert_eq!(*seen.lock().unwrap(), vec!["a".to_string(), "b".to_string()]);
        assert!(engine.state().is_idle());
    }

    #[test]
    fn test_non_minibuffer_command_aborts_collection() {
        let (mut engine, _host) = recording_engine(Config::default());
        let slot = install_ask(&mut engine, |r| r);

        engine.simulate_command("ask").unwrap();
        type_text(&mut engine, "abc");
        press(&mut engine, "Alt-x", body());
        assert_eq!(engine.state(), &ModeState::FullCommand);
        assert!(slot.lock().unwrap().is_none());
        assert!(engine.state.argument.is_none());
    }
}
