//! Keymap configuration.
//!
//! ## Learning: Serde for Serialization
//!
//! `#[derive(Serialize, Deserialize)]` generates the code to read a
//! keymap from TOML. `#[serde(default)]` fills missing fields from
//! `Default`, so a config file only needs to mention what it changes.
//!
//! ```toml
//! [keys]
//! top_level_unbound_key_action = "insert"
//!
//! [shortcuts]
//! save = ["Ctrl-s", "body: F2"]
//! kill-line = [{ pane = "body", key = "Ctrl-k", tag = "emacs" }]
//!
//! [modes."outline::Outline"]
//! entry_commands = ["contract-all"]
//! bindings = [{ key = "e", command = "expand-node", next_mode = "same" }]
//! ```

use crate::binding::{Scope, Shortcut, ShortcutSource};
use crate::mode::ModeSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Main keymap configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Dispatch behavior settings
    pub keys: KeyConfig,

    /// Shortcuts per command name
    pub shortcuts: BTreeMap<String, Vec<ShortcutEntry>>,

    /// Named modes
    pub modes: BTreeMap<String, ModeSpec>,
}

impl Config {
    /// Loads config from the default location.
    pub fn load() -> Self {
        Self::load_from_default_path().unwrap_or_default()
    }

    /// Loads config from a file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Parses config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads from the default config path.
    fn load_from_default_path() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Returns the default config file path.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("keyweave").join("keymap.toml"))
    }
}

impl ShortcutSource for Config {
    fn shortcuts(&self, command: &str) -> Option<Vec<Shortcut>> {
        let entries = self.shortcuts.get(command)?;
        let mut shortcuts = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry.to_shortcut() {
                Ok(shortcut) => shortcuts.push(shortcut),
                Err(err) => tracing::warn!(command, error = %err, "skipping shortcut"),
            }
        }
        Some(shortcuts)
    }

    fn commands(&self) -> Vec<String> {
        self.shortcuts.keys().cloned().collect()
    }
}

/// A shortcut as written in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShortcutEntry {
    /// `"pane: key"` or just `"key"`.
    Compact(String),
    /// `{ pane = "body", key = "Ctrl-k", tag = "emacs" }`.
    Full {
        #[serde(default = "default_pane")]
        pane: String,
        key: String,
        #[serde(default)]
        tag: Option<String>,
    },
}

fn default_pane() -> String {
    "all".to_string()
}

impl ShortcutEntry {
    fn to_shortcut(&self) -> crate::CoreResult<Shortcut> {
        match self {
            ShortcutEntry::Compact(spec) => {
                Ok(Shortcut::parse_compact(spec)?.tagged("config"))
            }
            ShortcutEntry::Full { pane, key, tag } => {
                let scope: Scope = pane.parse()?;
                let tag = tag.clone().unwrap_or_else(|| "config".to_string());
                Ok(Shortcut::new(scope, key.clone()).tagged(tag))
            }
        }
    }
}

/// What happens to keys that no binding claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnboundAction {
    /// Unbound plain keys do nothing.
    Command,
    /// Unbound plain keys insert text.
    #[default]
    Insert,
    /// Unbound plain keys overwrite text.
    Overwrite,
}

impl UnboundAction {
    /// Returns the config spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            UnboundAction::Command => "command",
            UnboundAction::Insert => "insert",
            UnboundAction::Overwrite => "overwrite",
        }
    }

    /// Returns the status-line label, e.g. `Insert`.
    pub fn label(&self) -> &'static str {
        match self {
            UnboundAction::Command => "Command",
            UnboundAction::Insert => "Insert",
            UnboundAction::Overwrite => "Overwrite",
        }
    }

    /// True if unbound plain keys should reach the text.
    pub fn inserts(&self) -> bool {
        !matches!(self, UnboundAction::Command)
    }
}

impl fmt::Display for UnboundAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnboundAction {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "command" => Ok(UnboundAction::Command),
            "insert" => Ok(UnboundAction::Insert),
            "overwrite" => Ok(UnboundAction::Overwrite),
            _ => Err(ConfigError::Invalid(format!("unknown unbound-key action {s:?}"))),
        }
    }
}

/// Dispatch behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Action for unbound plain keys when idle
    pub top_level_unbound_key_action: UnboundAction,

    /// Treat Alt+Ctrl chords as bindable instead of as AltGr text
    pub enable_alt_ctrl_bindings: bool,

    /// Drop unbound keys carrying Alt/Ctrl/Cmd/Meta
    pub drop_unbound_alt_ctrl: bool,

    /// Drop unbound non-ASCII characters
    pub ignore_unbound_non_ascii_keys: bool,

    /// Refuse minibuffer characters that match no completion
    pub forbid_invalid_completions: bool,

    /// Log rebinding conflicts at warn level
    pub warn_about_redefined_shortcuts: bool,

    /// List a mode's bindings when it is entered
    pub show_help_when_entering_modes: bool,

    /// Keystrokes remembered for view-lossage
    pub lossage_limit: usize,

    /// Prompt shown by full-command
    pub full_command_prompt: String,

    /// Prompt shown by universal-argument
    pub universal_argument_prompt: String,

    /// Commands allowed to run inside the minibuffer without aborting it
    pub minibuffer_commands: Vec<String>,

    /// Initial full-command history, oldest first
    pub history: Vec<String>,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            top_level_unbound_key_action: UnboundAction::Insert,
            enable_alt_ctrl_bindings: false,
            drop_unbound_alt_ctrl: true,
            ignore_unbound_non_ascii_keys: false,
            forbid_invalid_completions: false,
            warn_about_redefined_shortcuts: false,
            show_help_when_entering_modes: false,
            lossage_limit: 100,
            full_command_prompt: "full-command: ".to_string(),
            universal_argument_prompt: "Universal Argument: ".to_string(),
            minibuffer_commands: [
                "back-char",
                "back-word",
                "beginning-of-line",
                "copy-text",
                "cut-text",
                "delete-char",
                "end-of-line",
                "forward-char",
                "forward-word",
                "kill-line",
                "kill-word",
                "paste-text",
                "select-all",
                "yank",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            history: Vec::new(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config directory not found")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}
