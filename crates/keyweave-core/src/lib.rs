//! # Keyweave Core
//!
//! Keystroke resolution and modal dispatch.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Engine                             │
//! │  ┌──────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │CommandRegistry│ │   Config    │  │    EngineState      │  │
//! │  └──────┬───────┘  └──────┬──────┘  │ mode / arg / repeat │  │
//! │         │ rebuild_all     │         └──────────┬──────────┘  │
//! │  ┌──────┴─────────────────┴──────┐             │             │
//! │  │ Arc<BindingTable> Arc<ModeTable>│◄── resolve ─┤             │
//! │  └───────────────────────────────┘             │             │
//! │                                   handle_keystroke(KeyEvent) │
//! └──────────────────────────────────────────────────────────────┘
//!            │ show_prompt / self_insert        │ EngineEvent
//!            ▼                                  ▼
//!          Host                              EventBus
//! ```
//!
//! Every keystroke enters through [`Engine::handle_keystroke`]. The engine
//! decides whether an active modal state consumes it, whether a binding
//! for the focused surface names a command, or whether it is plain text
//! for the host to insert.
//!
//! ## Learning: Module Organization
//!
//! Several modules (`dispatch`, `argument`, `universal`, `minibuffer`,
//! `mode`) each add an `impl Engine` block. Rust allows any number of
//! inherent impl blocks for a type within its crate, which keeps one
//! state machine in one place without a single giant file.

pub mod argument;
pub mod binding;
pub mod builtin;
pub mod command;
pub mod completion;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod event;
pub mod history;
pub mod host;
pub mod input;
pub mod minibuffer;
pub mod mode;
pub mod resolver;
pub mod surface;
pub mod universal;

#[cfg(test)]
mod test_support;

pub use argument::ArgRequest;
pub use binding::{BindingRecord, BindingTable, Scope, Shortcut, ShortcutSource, TableBuilder};
pub use command::{CommandContext, CommandHandler, CommandOutcome, CommandRegistry, CommandResult};
pub use config::{Config, ConfigError, KeyConfig, UnboundAction};
pub use dispatch::Dispatch;
pub use engine::Engine;
pub use event::{EngineEvent, EventBus};
pub use host::{AutoCompleter, Host, MacroRecorder, NullHost, Passthrough};
pub use input::{KeyEvent, RawKeyEvent};
pub use keyweave_stroke::{Stroke, StrokeError};
pub use mode::{ModeDefinition, ModeState, ModeTable, NextMode};
pub use surface::{Surface, SurfaceId, SurfaceKind};

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations.
///
/// None of these is fatal to the engine: rebuild collects them as
/// diagnostics, and dispatch logs them and recovers to a known state.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid stroke: {0}")]
    InvalidStroke(#[from] StrokeError),

    #[error("Command not found: {0}")]
    UnknownCommand(String),

    #[error("Mode {0} is not defined (or is empty)")]
    UndefinedMode(String),

    #[error("Mode {0} re-enters itself through its entry commands")]
    ModeCycle(String),

    #[error("{stroke} in {scope} rebound from {previous} to {current}")]
    BindingConflict {
        stroke: Stroke,
        scope: Scope,
        previous: String,
        current: String,
    },

    #[error("Unknown scope: {0}")]
    UnknownScope(String),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Command failed: {0}")]
    Command(#[from] anyhow::Error),
}
