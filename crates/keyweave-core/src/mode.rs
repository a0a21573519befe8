//! Modal state and user-defined modes.
//!
//! ## Learning: Closed Enums Over Callbacks
//!
//! Every modal state the dispatcher can be in is one variant of
//! [`ModeState`]. The dispatcher matches on it once per keystroke, so the
//! compiler checks that every state has a key handler and no state can
//! smuggle in a handler with a surprising signature.
//!
//! User modes come from configuration. A mode named `outline::Outline`
//! becomes `outline-mode`, entered by the command `enter-outline-mode`
//! and prompting with `Outline`:
//!
//! ```toml
//! [modes."outline::Outline"]
//! entry_commands = ["contract-all"]
//! bindings = [
//!     { key = "e", command = "expand-node", next_mode = "same" },
//!     { key = "g", command = "goto-first", next_mode = "goto" },
//! ]
//! ```

use crate::builtin;
use crate::command::{CommandContext, CommandHandler, CommandOutcome, CommandRegistry, CommandResult};
use crate::dispatch::Dispatch;
use crate::engine::Engine;
use crate::input::KeyEvent;
use crate::surface::Surface;
use crate::{CoreError, CoreResult};
use keyweave_stroke::{Stroke, StrokeError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// The dispatcher's modal state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModeState {
    /// No modal state; keys resolve through the binding table.
    #[default]
    Idle,
    /// A user-defined mode. `step` is 0 while entry commands run and 1
    /// while waiting for a key.
    UserMode { name: String, step: u32 },
    /// Collecting an argument in the minibuffer.
    GetArg,
    /// Reading a command name in the minibuffer.
    FullCommand,
    /// An auto-completer owns the keys.
    AutoComplete,
    /// Collecting a repeat count.
    UniversalArg,
}

impl ModeState {
    /// The state's kind, or `None` when idle.
    pub fn kind(&self) -> Option<&str> {
        match self {
            ModeState::Idle => None,
            ModeState::UserMode { name, .. } => Some(name),
            ModeState::GetArg => Some("get-arg"),
            ModeState::FullCommand => Some("full-command"),
            ModeState::AutoComplete => Some("auto-complete"),
            ModeState::UniversalArg => Some("universal-argument"),
        }
    }

    /// The sub-step of a user mode.
    pub fn sub_step(&self) -> Option<u32> {
        match self {
            ModeState::UserMode { step, .. } => Some(*step),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, ModeState::Idle)
    }
}

/// Where a mode binding leaves the machine once its command returns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NextMode {
    /// Stay wherever the command left things.
    #[default]
    None,
    /// Re-enter the current mode without running its entry commands.
    Same,
    /// Enter the named mode fresh.
    Enter(String),
}

impl NextMode {
    /// Parses a configured `next_mode`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => NextMode::None,
            Some(s) if s.eq_ignore_ascii_case("none") => NextMode::None,
            Some(s) if s.eq_ignore_ascii_case("same") => NextMode::Same,
            Some(s) => NextMode::Enter(normalize_mode_name(s).0),
        }
    }
}

/// A mode as written in the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeSpec {
    /// Prompt shown while the mode is active
    pub prompt: Option<String>,

    /// Commands run, in order, when the mode is entered
    pub entry_commands: Vec<String>,

    /// Keys active inside the mode
    pub bindings: Vec<ModeKeySpec>,
}

/// One configured key inside a mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeKeySpec {
    pub key: String,
    pub command: String,
    #[serde(default)]
    pub next_mode: Option<String>,
}

/// Normalizes a configured mode name to `<base>-mode`.
///
/// Returns the name and, for `name::prompt`, the prompt.
pub fn normalize_mode_name(raw: &str) -> (String, Option<String>) {
    let (name, prompt) = match raw.split_once("::") {
        Some((name, prompt)) => (name, Some(prompt.trim().to_string())),
        None => (raw, None),
    };
    let mut base = name.trim().to_lowercase().replace(' ', "-");
    if let Some(stripped) = base.strip_suffix("mode") {
        base = stripped.trim_end_matches('-').to_string();
    }
    (format!("{base}-mode"), prompt.filter(|p| !p.is_empty()))
}

/// The command that enters `name`.
pub fn enter_command_name(name: &str) -> String {
    format!("enter-{name}")
}

/// Title-cases a mode name for display: `foo-bar-mode` is `Foo Bar Mode`.
pub fn display_name(name: &str) -> String {
    name.split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// A key bound inside a user mode.
#[derive(Clone)]
pub struct ModeBinding {
    pub stroke: Stroke,
    pub command: String,
    pub handler: Arc<dyn CommandHandler>,
    pub next_mode: NextMode,
}

impl fmt::Debug for ModeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeBinding")
            .field("stroke", &self.stroke)
            .field("command", &self.command)
            .field("next_mode", &self.next_mode)
            .finish()
    }
}

/// A resolved user mode.
#[derive(Debug, Clone)]
pub struct ModeDefinition {
    pub name: String,
    pub prompt: Option<String>,
    pub entry_commands: Vec<String>,
    pub bindings: HashMap<Stroke, ModeBinding>,
}

impl ModeDefinition {
    /// Bindings sorted by stroke.
    pub fn sorted_bindings(&self) -> Vec<&ModeBinding> {
        let mut bindings: Vec<&ModeBinding> = self.bindings.values().collect();
        bindings.sort_by(|a, b| a.stroke.cmp(&b.stroke));
        bindings
    }
}

/// Every defined mode, keyed by normalized name.
#[derive(Debug, Clone, Default)]
pub struct ModeTable {
    modes: BTreeMap<String, Arc<ModeDefinition>>,
}

impl ModeTable {
    /// Resolves configured modes against the registry.
    ///
    /// Bindings naming unknown commands or invalid strokes are skipped and
    /// reported. A mode with neither bindings nor entry commands is left
    /// out, so entering it reports [`CoreError::UndefinedMode`].
    pub fn build(
        specs: &BTreeMap<String, ModeSpec>,
        registry: &CommandRegistry,
    ) -> (ModeTable, Vec<CoreError>) {
        let mut modes = BTreeMap::new();
        let mut diagnostics = Vec::new();

        for (raw_name, spec) in specs {
            let (name, name_prompt) = normalize_mode_name(raw_name);

            let mut entry_commands = Vec::with_capacity(spec.entry_commands.len());
            for command in &spec.entry_commands {
                if registry.contains(command) {
                    entry_commands.push(command.clone());
                } else {
                    tracing::warn!(mode = %name, command = %command, "unknown entry command");
                    diagnostics.push(CoreError::UnknownCommand(command.clone()));
                }
            }

            let mut bindings = HashMap::new();
            for key in &spec.bindings {
                let stroke = match Stroke::parse(&key.key) {
                    Ok(stroke) => stroke,
                    Err(StrokeError::Empty) => continue,
                    Err(err) => {
                        tracing::warn!(mode = %name, key = %key.key, error = %err, "skipping mode binding");
                        diagnostics.push(err.into());
                        continue;
                    }
                };
                let Some(handler) = registry.lookup(&key.command) else {
                    tracing::warn!(mode = %name, command = %key.command, "unknown mode command");
                    diagnostics.push(CoreError::UnknownCommand(key.command.clone()));
                    continue;
                };
                bindings.insert(
                    stroke.clone(),
                    ModeBinding {
                        stroke,
                        command: key.command.clone(),
                        handler,
                        next_mode: NextMode::parse(key.next_mode.as_deref()),
                    },
                );
            }

            if bindings.is_empty() && entry_commands.is_empty() {
                tracing::warn!(mode = %name, "mode is empty");
                continue;
            }

            let definition = ModeDefinition {
                name: name.clone(),
                prompt: spec.prompt.clone().or(name_prompt),
                entry_commands,
                bindings,
            };
            modes.insert(name, Arc::new(definition));
        }

        (ModeTable { modes }, diagnostics)
    }

    pub fn get(&self, name: &str) -> Option<Arc<ModeDefinition>> {
        self.modes.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }
}

/// The `enter-<mode>` command registered for every configured mode.
pub struct EnterModeCommand {
    mode: String,
}

impl EnterModeCommand {
    pub fn new(mode: impl Into<String>) -> Self {
        Self { mode: mode.into() }
    }
}

impl CommandHandler for EnterModeCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>) -> CommandResult {
        let surface = ctx.event.map(|e| e.surface);
        ctx.engine.enter_mode(&self.mode, surface)?;
        Ok(CommandOutcome::Handled)
    }

    fn description(&self) -> &str {
        "enter a named mode"
    }
}

// ==================== Engine transitions ====================

impl Engine {
    /// Enters a user mode: runs its entry commands, then shows its prompt.
    ///
    /// An entry command that switches to another mode ends this entry.
    /// Entering a mode whose entry commands are still running is a cycle
    /// and falls back to Idle.
    pub fn enter_mode(&mut self, name: &str, surface: Option<Surface>) -> CoreResult<()> {
        let (name, _) = normalize_mode_name(name);
        let Some(definition) = self.modes.get(&name) else {
            return Err(self.bad_mode(&name));
        };
        if self.state.entering.contains(&name) {
            return Err(self.mode_cycle(&name));
        }

        tracing::debug!(mode = %name, "entering mode");
        self.state.mode_surface = surface.or(self.state.mode_surface);
        self.set_state(ModeState::UserMode {
            name: name.clone(),
            step: 0,
        });

        self.state.entering.push(name.clone());
        let redirected = self.run_entry_commands(&name, &definition.entry_commands);
        self.state.entering.retain(|n| *n != name);
        if redirected {
            return Ok(());
        }

        if let ModeState::UserMode { step, .. } = &mut self.state.mode {
            *step = 1;
        }
        self.show_state_and_mode(definition.prompt.as_deref());
        if self.config.keys.show_help_when_entering_modes {
            self.mode_help();
        }
        Ok(())
    }

    /// Returns true if an entry command left the mode.
    fn run_entry_commands(&mut self, name: &str, commands: &[String]) -> bool {
        let self_entry = enter_command_name(name);
        for command in commands {
            if *command == self_entry {
                tracing::warn!(mode = %name, "mode lists itself as an entry command");
                continue;
            }
            if let Err(err) = self.simulate_command(command) {
                tracing::warn!(mode = %name, command = %command, error = %err, "entry command failed");
            }
            let still_here = matches!(&self.state.mode, ModeState::UserMode { name: n, .. } if n == name);
            if !still_here || command.starts_with("enter-") {
                return true;
            }
        }
        false
    }

    fn mode_cycle(&mut self, name: &str) -> CoreError {
        let err = CoreError::ModeCycle(name.to_string());
        tracing::warn!(mode = name, entering = ?self.state.entering, "mode entry cycle");
        self.clear_state();
        self.reset_label();
        self.host.show_prompt(&err.to_string());
        err
    }

    fn bad_mode(&mut self, name: &str) -> CoreError {
        let err = CoreError::UndefinedMode(name.to_string());
        tracing::warn!(mode = name, "undefined mode");
        self.clear_state();
        self.reset_label();
        self.host.show_prompt(&err.to_string());
        err
    }

    /// Re-enters a mode without running its entry commands.
    fn reenter_mode(&mut self, name: &str, surface: Surface) {
        let Some(definition) = self.modes.get(name) else {
            return;
        };
        self.state.mode_surface = Some(surface);
        self.set_state(ModeState::UserMode {
            name: name.to_string(),
            step: 1,
        });
        self.show_state_and_mode(definition.prompt.as_deref());
    }

    /// Leaves the current user mode.
    pub fn end_mode(&mut self) {
        self.set_state(ModeState::Idle);
        self.state.mode_surface = None;
        self.reset_label();
        self.show_state_and_mode(None);
    }

    /// Leaves the current user mode, if any.
    pub fn exit_named_mode(&mut self) {
        if matches!(self.state.mode, ModeState::UserMode { .. }) {
            self.end_mode();
        }
    }

    /// Lists the current mode's bindings through the host.
    pub fn mode_help(&mut self) {
        let ModeState::UserMode { name, .. } = &self.state.mode else {
            return;
        };
        let Some(definition) = self.modes.get(name) else {
            return;
        };
        let items: Vec<String> = definition
            .sorted_bindings()
            .iter()
            .map(|b| format!("{} {}", b.stroke, b.command))
            .collect();
        self.host.show_list(&display_name(&definition.name), &items);
    }

    /// Handles a key while a user mode is active.
    ///
    /// Returns `None` when the stroke is not bound in the mode: the mode
    /// has ended and the stroke should continue through normal dispatch.
    pub(crate) fn handle_user_mode_key(&mut self, event: &KeyEvent) -> Option<Dispatch> {
        let ModeState::UserMode { name, .. } = self.state.mode.clone() else {
            return None;
        };
        let binding = self
            .modes
            .get(&name)
            .and_then(|definition| definition.bindings.get(&event.stroke).cloned());
        let Some(binding) = binding else {
            tracing::debug!(mode = %name, stroke = %event.stroke, "unbound key ends mode");
            self.end_mode();
            return None;
        };

        if binding.command == builtin::MODE_HELP {
            self.master_command(&binding.command, &binding.handler, Some(event));
            return Some(Dispatch::Invoked(binding.command));
        }

        let surface = self.state.mode_surface.unwrap_or(event.surface);
        let event = KeyEvent {
            surface,
            ..event.clone()
        };
        self.end_mode();
        self.master_command(&binding.command, &binding.handler, Some(&event));

        // A command that opened its own modal state keeps it.
        if self.state.mode.is_idle() {
            match &binding.next_mode {
                NextMode::None => {}
                NextMode::Same => self.reenter_mode(&name, surface),
                NextMode::Enter(next) => {
                    if let Err(err) = self.enter_mode(next, Some(surface)) {
                        tracing::warn!(mode = %name, next = %next, error = %err, "next mode failed");
                    }
                }
            }
        }
        Some(Dispatch::Invoked(binding.command))
    }
}
