//! The dispatch engine.
//!
//! One `Engine` exists per editing session. It owns the command registry,
//! the current binding and mode tables, and all modal state. There are
//! no globals: everything a keystroke can touch hangs off this struct.
//!
//! ## Learning: Snapshots Behind `Arc`
//!
//! Binding and mode tables are held as `Arc<BindingTable>` and
//! `Arc<ModeTable>`. Dispatch clones the `Arc` before resolving, so a
//! command that triggers a rebuild mid-keystroke swaps in a new table
//! without disturbing the lookup already in progress.

use crate::argument::ArgumentState;
use crate::binding::{self, BindingRecord, BindingTable, Scope, Shortcut};
use crate::builtin;
use crate::command::{CommandContext, CommandHandler, CommandOutcome, CommandRegistry, CommandResult};
use crate::completion::TabCompleter;
use crate::config::{Config, UnboundAction};
use crate::event::{EngineEvent, EventBus};
use crate::history::{CommandHistory, Lossage};
use crate::host::{AutoCompleter, Host, MacroRecorder, Passthrough};
use crate::input::KeyEvent;
use crate::minibuffer::Minibuffer;
use crate::mode::{self, EnterModeCommand, ModeState, ModeTable};
use crate::surface::Surface;
use crate::universal::RepeatState;
use crate::{CoreError, CoreResult};
use keyweave_stroke::Stroke;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Per-session modal state.
pub struct EngineState {
    pub(crate) mode: ModeState,
    pub(crate) unbound_action: UnboundAction,
    pub(crate) minibuffer: Minibuffer,
    /// Present only while collecting an argument.
    pub(crate) argument: Option<ArgumentState>,
    /// Completion state while in full-command.
    pub(crate) full_command: Option<TabCompleter>,
    /// Present only while collecting a universal argument.
    pub(crate) repeat: Option<RepeatState>,
    pub(crate) history: CommandHistory,
    pub(crate) lossage: Lossage,
    /// Surface focused when the current user mode was entered.
    pub(crate) mode_surface: Option<Surface>,
    /// Modes whose entry commands are running, outermost first.
    pub(crate) entering: Vec<String>,
    pub(crate) current_command: Option<String>,
}

impl EngineState {
    fn new(config: &Config) -> Self {
        Self {
            mode: ModeState::Idle,
            unbound_action: config.keys.top_level_unbound_key_action,
            minibuffer: Minibuffer::default(),
            argument: None,
            full_command: None,
            repeat: None,
            history: CommandHistory::with_entries(config.keys.history.iter().cloned()),
            lossage: Lossage::new(config.keys.lossage_limit),
            mode_surface: None,
            entering: Vec::new(),
            current_command: None,
        }
    }
}

/// Strokes with dispatcher-level meaning, derived from the bindings of
/// their commands after every rebuild.
#[derive(Debug, Clone, Default)]
pub(crate) struct SpecialStrokes {
    pub(crate) abort: Option<Stroke>,
    pub(crate) universal_argument: Option<Stroke>,
    pub(crate) auto_complete: Vec<Stroke>,
}

impl SpecialStrokes {
    fn derive(table: &BindingTable) -> Self {
        let first = |command: &str| table.strokes_for(command).into_iter().next().map(|(_, s)| s);
        Self {
            abort: first(builtin::KEYBOARD_QUIT),
            universal_argument: first(builtin::UNIVERSAL_ARGUMENT),
            auto_complete: table
                .strokes_for(builtin::AUTO_COMPLETE)
                .into_iter()
                .map(|(_, s)| s)
                .collect(),
        }
    }
}

/// The keystroke dispatch engine.
pub struct Engine {
    pub(crate) config: Config,
    pub(crate) registry: CommandRegistry,
    pub(crate) bindings: Arc<BindingTable>,
    pub(crate) modes: Arc<ModeTable>,
    pub(crate) special: SpecialStrokes,
    pub(crate) state: EngineState,
    pub(crate) host: Box<dyn Host>,
    pub(crate) passthrough: Option<Box<dyn Passthrough>>,
    pub(crate) macro_recorder: Option<Box<dyn MacroRecorder>>,
    pub(crate) auto_completer: Option<Box<dyn AutoCompleter>>,
    pub(crate) events: EventBus,
    /// `enter-<mode>` commands registered by the last rebuild.
    mode_commands: Vec<String>,
    diagnostics: Vec<CoreError>,
}

impl Engine {
    /// Creates an engine with only the built-in commands registered.
    pub fn new(config: Config, host: Box<dyn Host>) -> Self {
        Self::with_registry(config, CommandRegistry::new(), host)
    }

    /// Creates an engine over an existing registry.
    ///
    /// Built-in commands are added unless the registry already defines a
    /// command of the same name.
    pub fn with_registry(config: Config, mut registry: CommandRegistry, host: Box<dyn Host>) -> Self {
        builtin::register(&mut registry);
        let state = EngineState::new(&config);
        let mut engine = Self {
            config,
            registry,
            bindings: Arc::new(BindingTable::new()),
            modes: Arc::new(ModeTable::default()),
            special: SpecialStrokes::default(),
            state,
            host,
            passthrough: None,
            macro_recorder: None,
            auto_completer: None,
            events: EventBus::new(),
            mode_commands: Vec::new(),
            diagnostics: Vec::new(),
        };
        engine.rebuild_all();
        engine
    }

    // ==================== Collaborators ====================

    /// Installs a collaborator that may claim keys before binding lookup.
    pub fn set_passthrough(&mut self, passthrough: Box<dyn Passthrough>) {
        self.passthrough = Some(passthrough);
    }

    /// Installs the macro recorder.
    pub fn set_macro_recorder(&mut self, recorder: Box<dyn MacroRecorder>) {
        self.macro_recorder = Some(recorder);
    }

    /// Installs the collaborator that owns the auto-complete state.
    pub fn set_auto_completer(&mut self, completer: Box<dyn AutoCompleter>) {
        self.auto_completer = Some(completer);
    }

    /// Subscribes to engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Returns the event bus.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // ==================== Registry & Bindings ====================

    /// Returns the command registry.
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Registers a command.
    ///
    /// A default shortcut is bound immediately; everything else takes
    /// effect on the next [`Engine::rebuild_all`].
    pub fn register_command(
        &mut self,
        name: &str,
        handler: Arc<dyn CommandHandler>,
        default_shortcut: Option<Shortcut>,
    ) {
        self.registry.register(name, handler, default_shortcut.clone());
        if let Some(shortcut) = default_shortcut {
            if self.config.shortcuts.contains_key(name) {
                return;
            }
            if let Err(err) = self.bind_key(shortcut.scope, &shortcut.key, name) {
                tracing::warn!(command = name, error = %err, "default shortcut not bound");
            }
        }
    }

    /// Registers a closure as a command.
    pub fn register_fn<F>(&mut self, name: &str, default_shortcut: Option<Shortcut>, func: F)
    where
        F: Fn(&mut CommandContext<'_>) -> CommandResult + Send + Sync + 'static,
    {
        self.registry.register_fn(name, default_shortcut.clone(), func);
        if let Some(shortcut) = default_shortcut {
            if !self.config.shortcuts.contains_key(name) {
                if let Err(err) = self.bind_key(shortcut.scope, &shortcut.key, name) {
                    tracing::warn!(command = name, error = %err, "default shortcut not bound");
                }
            }
        }
    }

    /// Replaces the configuration and rebuilds every table.
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
        self.state.lossage.set_limit(self.config.keys.lossage_limit);
        self.rebuild_all();
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Rebuilds the binding and mode tables from the registry and config.
    ///
    /// The new tables are built completely before being swapped in.
    pub fn rebuild_all(&mut self) {
        // Shortcuts may name enter-<mode> commands, so those come first.
        let mode_commands: Vec<(String, String)> = self
            .config
            .modes
            .keys()
            .map(|raw_name| {
                let (name, _) = mode::normalize_mode_name(raw_name);
                (mode::enter_command_name(&name), name)
            })
            .collect();
        for stale in std::mem::take(&mut self.mode_commands) {
            if !mode_commands.iter().any(|(command, _)| *command == stale) {
                tracing::debug!(command = %stale, "dropping command of removed mode");
                self.registry.unregister(&stale);
            }
        }
        for (command, name) in mode_commands {
            self.registry
                .register(command.clone(), Arc::new(EnterModeCommand::new(name)), None);
            self.mode_commands.push(command);
        }

        let (table, mut diagnostics) = binding::build_table(&self.registry, &self.config);
        let (modes, mode_diagnostics) = ModeTable::build(&self.config.modes, &self.registry);
        diagnostics.extend(mode_diagnostics);

        for diagnostic in &diagnostics {
            match diagnostic {
                CoreError::BindingConflict { .. } if !self.config.keys.warn_about_redefined_shortcuts => {
                    tracing::debug!(%diagnostic, "rebuild");
                }
                _ => tracing::warn!(%diagnostic, "rebuild"),
            }
        }

        self.bindings = Arc::new(table);
        self.modes = Arc::new(modes);
        self.special = SpecialStrokes::derive(&self.bindings);
        self.diagnostics = diagnostics;

        tracing::info!(
            bindings = self.bindings.len(),
            modes = self.modes.len(),
            "rebuilt key bindings"
        );
        self.events.emit(EngineEvent::BindingsRebuilt {
            bindings: self.bindings.len(),
        });
    }

    /// Binds one stroke at runtime by swapping in an updated table.
    pub fn bind_key(&mut self, scope: Scope, spec: &str, command: &str) -> CoreResult<()> {
        let handler = self
            .registry
            .lookup(command)
            .ok_or_else(|| CoreError::UnknownCommand(command.to_string()))?;
        let stroke = Stroke::parse(spec)?;
        let record = BindingRecord {
            stroke,
            scope,
            command: command.to_string(),
            handler,
            tag: "runtime".to_string(),
        };
        let (table, conflicts) = self.bindings.with_binding(record);
        for conflict in &conflicts {
            tracing::debug!(%conflict, "runtime binding");
        }
        self.bindings = Arc::new(table);
        self.special = SpecialStrokes::derive(&self.bindings);
        Ok(())
    }

    /// Returns the current binding table.
    pub fn bindings(&self) -> Arc<BindingTable> {
        Arc::clone(&self.bindings)
    }

    /// Returns the current mode table.
    pub fn modes(&self) -> Arc<ModeTable> {
        Arc::clone(&self.modes)
    }

    /// Returns the first stroke bound to `command`, if any.
    pub fn stroke_for_command(&self, command: &str) -> Option<Stroke> {
        self.bindings
            .strokes_for(command)
            .into_iter()
            .next()
            .map(|(_, stroke)| stroke)
    }

    /// Problems found during the last rebuild.
    pub fn diagnostics(&self) -> &[CoreError] {
        &self.diagnostics
    }

    // ==================== State ====================

    /// Returns the current modal state.
    pub fn state(&self) -> &ModeState {
        &self.state.mode
    }

    /// Returns the current unbound-key action.
    pub fn unbound_action(&self) -> UnboundAction {
        self.state.unbound_action
    }

    /// Sets the unbound-key action and shows it.
    pub fn set_input_state(&mut self, action: UnboundAction) {
        tracing::debug!(action = %action, "input state");
        self.state.unbound_action = action;
        self.show_state_and_mode(None);
    }

    /// Returns the minibuffer.
    pub fn minibuffer(&self) -> &Minibuffer {
        &self.state.minibuffer
    }

    /// Replaces the minibuffer text after the prompt.
    pub fn set_minibuffer_text(&mut self, text: &str) {
        self.state.minibuffer.set_text(text);
        self.refresh_minibuffer();
    }

    /// Returns the full-command history.
    pub fn history(&self) -> &CommandHistory {
        &self.state.history
    }

    /// Recent keystrokes, most recent first.
    pub fn lossage(&self) -> impl Iterator<Item = &Stroke> {
        self.state.lossage.iter()
    }

    /// Name of the command currently executing, if any.
    pub fn current_command(&self) -> Option<&str> {
        self.state.current_command.as_deref()
    }

    /// Returns the host.
    pub fn host_mut(&mut self) -> &mut dyn Host {
        self.host.as_mut()
    }

    pub(crate) fn set_state(&mut self, next: ModeState) {
        if self.state.mode == next {
            return;
        }
        let previous = std::mem::replace(&mut self.state.mode, next);
        tracing::trace!(from = ?previous, to = ?self.state.mode, "state change");
        if let ModeState::UserMode { name, .. } = &previous {
            self.events.emit(EngineEvent::ModeExited(name.clone()));
        }
        if let ModeState::UserMode { name, .. } = &self.state.mode {
            self.events.emit(EngineEvent::ModeEntered(name.clone()));
        }
        self.events.emit(EngineEvent::StateChanged {
            from: previous.kind().map(str::to_string),
            to: self.state.mode.kind().map(str::to_string),
        });
    }

    /// Returns to Idle, discarding any argument or repeat state.
    pub(crate) fn clear_state(&mut self) {
        self.set_state(ModeState::Idle);
        self.state.argument = None;
        self.state.full_command = None;
        self.state.repeat = None;
    }

    // ==================== Labels ====================

    /// Shows a fresh prompt with an empty input line.
    pub fn set_prompt(&mut self, prompt: &str) {
        self.state.minibuffer.set_prompt(prompt);
        self.refresh_minibuffer();
    }

    pub(crate) fn refresh_minibuffer(&mut self) {
        let line = self.state.minibuffer.line();
        self.host.show_prompt(&line);
    }

    /// Clears the minibuffer without showing anything.
    pub fn reset_label(&mut self) {
        self.state.minibuffer.clear();
    }

    /// Shows the current mode or input state.
    ///
    /// Nothing is shown while the minibuffer is collecting input, since
    /// the minibuffer line is already on display.
    pub fn show_state_and_mode(&mut self, prompt: Option<&str>) {
        let text = match &self.state.mode {
            ModeState::Idle => format!("{} State", self.state.unbound_action.label()),
            ModeState::UserMode { name, .. } => match prompt {
                Some(prompt) => prompt.to_string(),
                None => mode::display_name(name),
            },
            _ => return,
        };
        self.host.show_prompt(&text);
    }

    // ==================== Commands ====================

    /// Aborts every modal state and restores the default input state.
    pub fn keyboard_quit(&mut self) {
        tracing::debug!(state = ?self.state.mode.kind(), "keyboard quit");
        if matches!(self.state.mode, ModeState::AutoComplete) {
            if let Some(completer) = self.auto_completer.as_mut() {
                completer.abort();
            }
        }
        self.clear_state();
        self.state.mode_surface = None;
        self.state.entering.clear();
        self.state.current_command = None;
        self.reset_label();
        self.state.unbound_action = self.config.keys.top_level_unbound_key_action;
        self.host.clear_list();
        self.show_state_and_mode(None);
        self.state.history.reset_cursor();
    }

    /// Runs a command by name, as if it had been bound and pressed.
    pub fn simulate_command(&mut self, name: &str) -> CoreResult<CommandOutcome> {
        let handler = self
            .registry
            .lookup(name)
            .ok_or_else(|| CoreError::UnknownCommand(name.to_string()))?;
        Ok(self.master_command(name, &handler, None))
    }

    /// Records, invokes and ends one command.
    pub(crate) fn master_command(
        &mut self,
        name: &str,
        handler: &Arc<dyn CommandHandler>,
        event: Option<&KeyEvent>,
    ) -> CommandOutcome {
        if let (Some(recorder), Some(event)) = (self.macro_recorder.as_mut(), event) {
            if recorder.is_recording() {
                recorder.record(name, event);
            }
        }
        self.state.current_command = Some(name.to_string());
        let outcome = self.invoke(name, handler, event, None);
        self.end_command();
        outcome
    }

    pub(crate) fn invoke(
        &mut self,
        name: &str,
        handler: &Arc<dyn CommandHandler>,
        event: Option<&KeyEvent>,
        tail: Option<&str>,
    ) -> CommandOutcome {
        tracing::debug!(command = name, "invoking command");
        let handler = Arc::clone(handler);
        let outcome = self.guarded(name, |engine| {
            let mut ctx = CommandContext {
                engine,
                command: name,
                event,
                tail,
            };
            handler.execute(&mut ctx)
        });
        self.events.emit(EngineEvent::CommandInvoked(name.to_string()));
        outcome
    }

    /// Runs `body` so that dispatch bookkeeping survives a failing or
    /// panicking command.
    ///
    /// Errors are logged and treated as handled. A panic resets modal
    /// state before it continues unwinding.
    pub(crate) fn guarded<F>(&mut self, name: &str, body: F) -> CommandOutcome
    where
        F: FnOnce(&mut Engine) -> CommandResult,
    {
        match panic::catch_unwind(AssertUnwindSafe(|| body(&mut *self))) {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                tracing::warn!(command = name, error = %err, "command failed");
                CommandOutcome::Handled
            }
            Err(payload) => {
                tracing::error!(command = name, "command panicked, resetting modal state");
                self.keyboard_quit();
                panic::resume_unwind(payload)
            }
        }
    }

    pub(crate) fn end_command(&mut self) {
        if self.state.mode.is_idle() {
            self.state.current_command = None;
        }
    }
}
