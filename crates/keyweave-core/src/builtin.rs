//! Commands the engine itself provides.
//!
//! These drive the modal machinery (abort, full-command, universal
//! argument, modes, input state) and introspection. Every engine
//! registers them, but a registry that already defines one of these
//! names keeps its own version.

use crate::binding::{Scope, Shortcut};
use crate::command::{CommandContext, CommandOutcome, CommandRegistry, CommandResult};
use crate::config::UnboundAction;
use crate::engine::Engine;

pub const KEYBOARD_QUIT: &str = "keyboard-quit";
pub const FULL_COMMAND: &str = "full-command";
pub const UNIVERSAL_ARGUMENT: &str = "universal-argument";
pub const AUTO_COMPLETE: &str = "auto-complete";
pub const EXIT_NAMED_MODE: &str = "exit-named-mode";
pub const MODE_HELP: &str = "mode-help";
pub const REPEAT_COMPLEX_COMMAND: &str = "repeat-complex-command";

fn add<F>(registry: &mut CommandRegistry, name: &str, shortcut: Option<Shortcut>, func: F)
where
    F: Fn(&mut CommandContext<'_>) -> CommandResult + Send + Sync + 'static,
{
    if registry.contains(name) {
        return;
    }
    registry.register_fn(name, shortcut, func);
}

fn done() -> CommandResult {
    Ok(CommandOutcome::Handled)
}

/// Registers the built-in commands.
pub fn register(registry: &mut CommandRegistry) {
    add(registry, KEYBOARD_QUIT, Some(Shortcut::new(Scope::All, "Ctrl-g")), |ctx| {
        ctx.engine.keyboard_quit();
        done()
    });
    add(registry, FULL_COMMAND, Some(Shortcut::new(Scope::All, "Alt-x")), |ctx| {
        ctx.engine.begin_full_command();
        done()
    });
    add(registry, UNIVERSAL_ARGUMENT, Some(Shortcut::new(Scope::All, "Ctrl-u")), |ctx| {
        ctx.engine.begin_universal_argument();
        done()
    });
    add(registry, AUTO_COMPLETE, None, |ctx| {
        if ctx.engine.begin_auto_complete() {
            done()
        } else {
            Ok(CommandOutcome::Unhandled)
        }
    });

    add(registry, EXIT_NAMED_MODE, None, |ctx| {
        ctx.engine.exit_named_mode();
        done()
    });
    add(registry, MODE_HELP, None, |ctx| {
        ctx.engine.mode_help();
        done()
    });

    add(registry, "set-command-state", None, |ctx| {
        ctx.engine.set_input_state(UnboundAction::Command);
        done()
    });
    add(registry, "set-insert-state", None, |ctx| {
        ctx.engine.set_input_state(UnboundAction::Insert);
        done()
    });
    add(registry, "set-overwrite-state", None, |ctx| {
        ctx.engine.set_input_state(UnboundAction::Overwrite);
        done()
    });
    add(registry, "toggle-input-state", None, |ctx| {
        let next = toggled_input_state(ctx.engine);
        ctx.engine.set_input_state(next);
        done()
    });

    add(registry, REPEAT_COMPLEX_COMMAND, None, |ctx| {
        ctx.engine.repeat_complex_command()?;
        done()
    });
    add(registry, "print-bindings", None, |ctx| {
        print_bindings(ctx.engine);
        done()
    });
    add(registry, "print-commands", None, |ctx| {
        print_commands(ctx.engine);
        done()
    });
    add(registry, "view-lossage", None, |ctx| {
        let strokes: Vec<String> = ctx.engine.lossage().map(|s| s.to_string()).collect();
        ctx.engine.host.show_list("Recent keystrokes", &strokes);
        done()
    });
}

/// Command state toggles to the configured default, anything else to
/// command state.
fn toggled_input_state(engine: &Engine) -> UnboundAction {
    match engine.unbound_action() {
        UnboundAction::Command => match engine.config.keys.top_level_unbound_key_action {
            UnboundAction::Command => UnboundAction::Insert,
            default => default,
        },
        _ => UnboundAction::Command,
    }
}

fn print_bindings(engine: &mut Engine) {
    let mut lines: Vec<String> = engine
        .bindings
        .records()
        .map(|r| format!("{} {} {}", r.scope, r.stroke, r.command))
        .collect();
    lines.sort();
    engine.host.show_list("Bindings", &lines);
}

fn print_commands(engine: &mut Engine) {
    let inverse = engine.bindings.inverse();
    let lines: Vec<String> = engine
        .registry
        .all_names()
        .map(|name| match inverse.get(name) {
            Some(pairs) => {
                let strokes: Vec<String> = pairs.iter().map(|(_, s)| s.to_string()).collect();
                format!("{} {}", name, strokes.join(", "))
            }
            None => name.to_string(),
        })
        .collect();
    engine.host.show_list("Commands", &lines);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::test_support::{body, press, recording_engine};
    use crate::ModeState;

    #[test]
    fn test_register_keeps_existing_commands() {
        let mut registry = CommandRegistry::new();
        registry.register_fn(KEYBOARD_QUIT, None, |_ctx| Ok(CommandOutcome::Unhandled));
        register(&mut registry);

        assert!(registry.default_shortcuts(KEYBOARD_QUIT).is_empty());
        assert!(registry.contains(FULL_COMMAND));
        assert!(registry.contains("view-lossage"));
    }

    #[test]
    fn test_toggle_input_state() {
        let (mut engine, host) = recording_engine(Config::default());
        engine.simulate_command("toggle-input-state").unwrap();
        assert_eq!(engine.unbound_action(), UnboundAction::Command);
        assert_eq!(host.last_prompt().as_deref(), Some("Command State"));

        engine.simulate_command("toggle-input-state").unwrap();
        assert_eq!(engine.unbound_action(), UnboundAction::Insert);
    }

    #[test]
    fn test_toggle_from_command_default() {
        let mut config = Config::default();
        config.keys.top_level_unbound_key_action = UnboundAction::Command;
        let (mut engine, _host) = recording_engine(config);
        engine.simulate_command("toggle-input-state").unwrap();
        assert_eq!(engine.unbound_action(), UnboundAction::Insert);
    }

    #[test]
    fn test_print_bindings() {
        let (mut engine, host) = recording_engine(Config::default());
        engine.simulate_command("print-bindings").unwrap();
        let lists = host.lists();
        let (title, lines) = lists.last().unwrap();
        assert_eq!(title, "Bindings");
        assert!(lines.contains(&"all Ctrl+g keyboard-quit".to_string()));
        assert!(lines.contains(&"all Alt+x full-command".to_string()));
    }

    #[test]
    fn test_print_commands() {
        let (mut engine, host) = recording_engine(Config::default());
        engine.simulate_command("print-commands").unwrap();
        let lists = host.lists();
        let (_, lines) = lists.last().unwrap();
        assert!(lines.contains(&"universal-argument Ctrl+u".to_string()));
        assert!(lines.contains(&"mode-help".to_string()));
    }

    #[test]
    fn test_view_lossage() {
        let (mut engine, host) = recording_engine(Config::default());
        press(&mut engine, "a", body());
        press(&mut engine, "Ctrl-b", body());
        engine.simulate_command("view-lossage").unwrap();

        let lists = host.lists();
        let (_, lines) = lists.last().unwrap();
        assert_eq!(lines, &vec!["Ctrl+b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_repeat_complex_command() {
        let (mut engine, _host) = recording_engine(Config::default());
        press(&mut engine, "Alt-x", body());
        engine.set_minibuffer_text("set-command-state");
        press(&mut engine, "Return", body());
        assert_eq!(engine.unbound_action(), UnboundAction::Command);

        engine.set_input_state(UnboundAction::Insert);
        press(&mut engine, "Alt-x", body());
        engine.set_minibuffer_text(REPEAT_COMPLEX_COMMAND);
        press(&mut engine, "Return", body());
        assert_eq!(engine.unbound_action(), UnboundAction::Command);
        assert_eq!(engine.state(), &ModeState::Idle);
    }

    #[test]
    fn test_auto_complete_without_collaborator_is_unhandled() {
        let (mut engine, _host) = recording_engine(Config::default());
        let outcome = engine.simulate_command(AUTO_COMPLETE).unwrap();
        assert_eq!(outcome, CommandOutcome::Unhandled);
        assert!(engine.state().is_idle());
    }
}
