//! Command registry.
//!
//! ## Learning: The Command Pattern
//!
//! Commands encapsulate actions as objects:
//! - Actions become first-class values
//! - They are referenced by name from bindings, modes and the minibuffer
//! - What a command *does* is opaque to the dispatcher
//!
//! The engine only needs a name and something it can call. Editor
//! features register their commands here and bindings point at them.

use crate::binding::Shortcut;
use crate::engine::Engine;
use crate::input::KeyEvent;
use crate::CoreResult;
use std::collections::BTreeMap;
use std::sync::Arc;

/// What a command reports back to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The command consumed the keystroke.
    Handled,
    /// The command declined; standard processing should continue.
    Unhandled,
}

/// Result of executing a command.
pub type CommandResult = CoreResult<CommandOutcome>;

/// Context passed to command execution.
pub struct CommandContext<'a> {
    pub engine: &'a mut Engine,
    /// Name the command was invoked under.
    pub command: &'a str,
    /// The triggering keystroke, absent for simulated commands.
    pub event: Option<&'a KeyEvent>,
    /// Text following the command name in the minibuffer, if any.
    pub tail: Option<&'a str>,
}

/// Trait for command handlers.
///
/// ## Learning: Trait Objects
///
/// `dyn CommandHandler` allows storing different types that
/// implement this trait in the same collection. The `Send + Sync`
/// bounds let a registry be built on one thread and used on another.
pub trait CommandHandler: Send + Sync {
    /// Executes the command.
    fn execute(&self, ctx: &mut CommandContext<'_>) -> CommandResult;

    /// Returns a description for listings.
    fn description(&self) -> &str {
        ""
    }
}

/// Adapter turning a closure into a [`CommandHandler`].
struct FnCommand<F> {
    func: F,
}

impl<F> CommandHandler for FnCommand<F>
where
    F: Fn(&mut CommandContext<'_>) -> CommandResult + Send + Sync,
{
    fn execute(&self, ctx: &mut CommandContext<'_>) -> CommandResult {
        (self.func)(ctx)
    }
}

struct Registered {
    handler: Arc<dyn CommandHandler>,
    default_shortcuts: Vec<Shortcut>,
}

/// Registry of named commands.
///
/// ## Learning: Type Erasure
///
/// `Arc<dyn CommandHandler>` erases the concrete type, and the `Arc`
/// lets binding records share the handler without borrowing the registry.
/// A `BTreeMap` keeps names ordered, which rebuilds rely on.
#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Registered>,
}

impl CommandRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler, replacing any previous command of that name.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn CommandHandler>,
        default_shortcut: Option<Shortcut>,
    ) {
        let name = name.into();
        tracing::trace!(command = %name, "registering command");
        self.commands.insert(
            name,
            Registered {
                handler,
                default_shortcuts: default_shortcut.into_iter().collect(),
            },
        );
    }

    /// Registers a closure as a command.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, default_shortcut: Option<Shortcut>, func: F)
    where
        F: Fn(&mut CommandContext<'_>) -> CommandResult + Send + Sync + 'static,
    {
        self.register(name, Arc::new(FnCommand { func }), default_shortcut);
    }

    /// Adds another default shortcut to an existing command.
    pub fn add_default_shortcut(&mut self, name: &str, shortcut: Shortcut) -> CoreResult<()> {
        let entry = self
            .commands
            .get_mut(name)
            .ok_or_else(|| crate::CoreError::UnknownCommand(name.to_string()))?;
        entry.default_shortcuts.push(shortcut);
        Ok(())
    }

    /// Removes a command. Returns false if it was not registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.commands.remove(name).is_some()
    }

    /// Looks up a command by name.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.commands.get(name).map(|c| Arc::clone(&c.handler))
    }

    /// Returns true if a command of that name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Returns all command names in sorted order.
    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    /// Returns the shortcuts a command was registered with.
    pub fn default_shortcuts(&self, name: &str) -> &[Shortcut] {
        self.commands
            .get(name)
            .map(|c| c.default_shortcuts.as_slice())
            .unwrap_or(&[])
    }

    /// Returns the number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
