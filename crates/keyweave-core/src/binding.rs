//! Binding tables.
//!
//! A [`BindingTable`] maps `(Scope, Stroke)` to the command bound there.
//! Tables are never edited while the engine dispatches: a
//! [`TableBuilder`] folds every registration into a fresh table, and the
//! engine swaps the finished table in behind an `Arc`.
//!
//! ## Conflicts
//!
//! Binding a stroke drops older records for the same stroke in every
//! *overlapping* scope: all scopes when the new binding is in `all` or
//! `button`, otherwise only the same scope. Last registration wins.

use crate::command::{CommandHandler, CommandRegistry};
use crate::{CoreError, CoreResult};
use keyweave_stroke::{Stroke, StrokeError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A pane scope bindings live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    All,
    Body,
    Button,
    Command,
    Insert,
    Log,
    Mini,
    Overwrite,
    Text,
    Tree,
}

impl Scope {
    /// Returns the scope's config spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::All => "all",
            Scope::Body => "body",
            Scope::Button => "button",
            Scope::Command => "command",
            Scope::Insert => "insert",
            Scope::Log => "log",
            Scope::Mini => "mini",
            Scope::Overwrite => "overwrite",
            Scope::Text => "text",
            Scope::Tree => "tree",
        }
    }

    /// True if a binding here overlaps every other scope.
    fn is_global(&self) -> bool {
        matches!(self, Scope::All | Scope::Button)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let scope = match s.trim().to_ascii_lowercase().as_str() {
            "all" | "any" => Scope::All,
            "body" => Scope::Body,
            "button" | "buttons" => Scope::Button,
            "command" => Scope::Command,
            "insert" => Scope::Insert,
            "log" => Scope::Log,
            "mini" | "minibuffer" => Scope::Mini,
            "overwrite" => Scope::Overwrite,
            "text" => Scope::Text,
            "tree" => Scope::Tree,
            _ => return Err(CoreError::UnknownScope(s.to_string())),
        };
        Ok(scope)
    }
}

/// One configured shortcut, before canonicalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortcut {
    pub scope: Scope,
    /// Raw stroke specification.
    pub key: String,
    /// Where the shortcut came from, for diagnostics.
    pub tag: String,
}

impl Shortcut {
    /// Creates a shortcut tagged as a registration default.
    pub fn new(scope: Scope, key: impl Into<String>) -> Self {
        Self {
            scope,
            key: key.into(),
            tag: "default".to_string(),
        }
    }

    /// Sets the provenance tag.
    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Parses the compact form `"pane: key"`; a bare key means `all`.
    pub fn parse_compact(spec: &str) -> CoreResult<Self> {
        match spec.split_once(':') {
            // A lone ':' or a key like "Ctrl-:" is a stroke, not a pane prefix.
            Some((pane, key)) if !pane.trim().is_empty() && !key.trim().is_empty() => {
                Ok(Self::new(pane.parse()?, key.trim()))
            }
            _ => Ok(Self::new(Scope::All, spec.trim())),
        }
    }
}

/// Supplies per-command shortcuts at rebuild time.
pub trait ShortcutSource {
    /// Shortcuts configured for `command`, or `None` to fall back to the
    /// command's registration defaults.
    fn shortcuts(&self, command: &str) -> Option<Vec<Shortcut>>;

    /// Every command name the source mentions.
    fn commands(&self) -> Vec<String>;
}

/// A source with no configured shortcuts.
pub struct NoShortcuts;

impl ShortcutSource for NoShortcuts {
    fn shortcuts(&self, _command: &str) -> Option<Vec<Shortcut>> {
        None
    }

    fn commands(&self) -> Vec<String> {
        Vec::new()
    }
}

/// A stroke bound to a command in one scope.
#[derive(Clone)]
pub struct BindingRecord {
    pub stroke: Stroke,
    pub scope: Scope,
    pub command: String,
    pub handler: Arc<dyn CommandHandler>,
    pub tag: String,
}

impl fmt::Debug for BindingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingRecord")
            .field("stroke", &self.stroke)
            .field("scope", &self.scope)
            .field("command", &self.command)
            .field("tag", &self.tag)
            .finish()
    }
}

/// Immutable mapping of scope and stroke to binding record.
#[derive(Clone, Default)]
pub struct BindingTable {
    scopes: HashMap<Scope, HashMap<Stroke, BindingRecord>>,
}

impl BindingTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record bound to `stroke` in `scope`.
    pub fn get(&self, scope: Scope, stroke: &Stroke) -> Option<&BindingRecord> {
        self.scopes.get(&scope).and_then(|m| m.get(stroke))
    }

    /// Returns the number of records across all scopes.
    pub fn len(&self) -> usize {
        self.scopes.values().map(HashMap::len).sum()
    }

    /// Returns true if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over every record, in no particular order.
    pub fn records(&self) -> impl Iterator<Item = &BindingRecord> {
        self.scopes.values().flat_map(HashMap::values)
    }

    /// Maps each command to the `(scope, stroke)` pairs bound to it.
    pub fn inverse(&self) -> BTreeMap<String, Vec<(Scope, Stroke)>> {
        let mut inverse: BTreeMap<String, Vec<(Scope, Stroke)>> = BTreeMap::new();
        for record in self.records() {
            inverse
                .entry(record.command.clone())
                .or_default()
                .push((record.scope, record.stroke.clone()));
        }
        for pairs in inverse.values_mut() {
            pairs.sort();
        }
        inverse
    }

    /// Returns the strokes bound to `command`, sorted by scope then stroke.
    pub fn strokes_for(&self, command: &str) -> Vec<(Scope, Stroke)> {
        let mut pairs: Vec<(Scope, Stroke)> = self
            .records()
            .filter(|r| r.command == command)
            .map(|r| (r.scope, r.stroke.clone()))
            .collect();
        pairs.sort();
        pairs
    }

    /// Returns a copy of this table with one more binding applied.
    pub fn with_binding(&self, record: BindingRecord) -> (BindingTable, Vec<CoreError>) {
        let mut table = self.clone();
        let conflicts = table.insert(record);
        (table, conflicts)
    }

    /// Inserts a record, dropping overlapping older ones.
    fn insert(&mut self, record: BindingRecord) -> Vec<CoreError> {
        let mut conflicts = Vec::new();
        for (scope, strokes) in self.scopes.iter_mut() {
            if !(record.scope.is_global() || *scope == record.scope) {
                continue;
            }
            if let Some(old) = strokes.remove(&record.stroke) {
                if old.command != record.command {
                    conflicts.push(CoreError::BindingConflict {
                        stroke: record.stroke.clone(),
                        scope: old.scope,
                        previous: format!("{} ({})", old.command, old.tag),
                        current: format!("{} ({})", record.command, record.tag),
                    });
                }
            }
        }
        self.scopes
            .entry(record.scope)
            .or_default()
            .insert(record.stroke.clone(), record);
        conflicts
    }
}

impl fmt::Debug for BindingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingTable")
            .field("len", &self.len())
            .finish()
    }
}

/// Folds registrations into a fresh [`BindingTable`].
#[derive(Default)]
pub struct TableBuilder {
    table: BindingTable,
    diagnostics: Vec<CoreError>,
}

impl TableBuilder {
    /// Creates a builder over an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `spec` in `scope` to `command`.
    ///
    /// Returns false when the stroke is empty or invalid; invalid strokes
    /// are recorded as diagnostics, empty ones are skipped silently.
    pub fn bind(
        &mut self,
        scope: Scope,
        spec: &str,
        command: &str,
        handler: Arc<dyn CommandHandler>,
        tag: &str,
    ) -> bool {
        let stroke = match Stroke::parse(spec) {
            Ok(stroke) => stroke,
            Err(StrokeError::Empty) => return false,
            Err(err) => {
                tracing::warn!(command, key = spec, error = %err, "skipping binding");
                self.diagnostics.push(err.into());
                return false;
            }
        };
        let record = BindingRecord {
            stroke,
            scope,
            command: command.to_string(),
            handler,
            tag: tag.to_string(),
        };
        for conflict in self.table.insert(record) {
            tracing::debug!(%conflict, "binding conflict");
            self.diagnostics.push(conflict);
        }
        true
    }

    /// Records a diagnostic found while gathering registrations.
    pub fn diagnose(&mut self, error: CoreError) {
        self.diagnostics.push(error);
    }

    /// Finishes the build.
    pub fn finish(self) -> (BindingTable, Vec<CoreError>) {
        (self.table, self.diagnostics)
    }
}

/// Replays every command's shortcuts, in command-name order, into a new
/// table.
///
/// Commands the source lists but the registry lacks are reported as
/// [`CoreError::UnknownCommand`].
pub fn build_table(
    registry: &CommandRegistry,
    source: &dyn ShortcutSource,
) -> (BindingTable, Vec<CoreError>) {
    let mut builder = TableBuilder::new();

    for command in source.commands() {
        if !registry.contains(&command) {
            tracing::warn!(command = %command, "shortcut names an unknown command");
            builder.diagnose(CoreError::UnknownCommand(command));
        }
    }

    for name in registry.all_names() {
        let Some(handler) = registry.lookup(name) else {
            continue;
        };
        let shortcuts = source
            .shortcuts(name)
            .unwrap_or_else(|| registry.default_shortcuts(name).to_vec());
        for shortcut in shortcuts {
            builder.bind(
                shortcut.scope,
                &shortcut.key,
                name,
                Arc::clone(&handler),
                &shortcut.tag,
            );
        }
    }

    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutcome;
    use crate::test_support::noop;

    fn stroke(spec: &str) -> Stroke {
        Stroke::parse(spec).unwrap()
    }

    #[test]
    fn test_scope_parsing() {
        assert_eq!("Body".parse::<Scope>().unwrap(), Scope::Body);
        assert_eq!("minibuffer".parse::<Scope>().unwrap(), Scope::Mini);
        assert!(matches!(
            "nowhere".parse::<Scope>(),
            Err(CoreError::UnknownScope(_))
        ));
    }

    #[test]
    fn test_compact_shortcut() {
        let sc = Shortcut::parse_compact("body: Ctrl-x").unwrap();
        assert_eq!(sc.scope, Scope::Body);
        assert_eq!(sc.key, "Ctrl-x");

        let bare = Shortcut::parse_compact("Alt-x").unwrap();
        assert_eq!(bare.scope, Scope::All);

        let colon = Shortcut::parse_compact(":").unwrap();
        assert_eq!(colon.key, ":");
    }

    #[test]
    fn test_bind_canonicalizes() {
        let mut builder = TableBuilder::new();
        assert!(builder.bind(Scope::All, "control-S", "save", noop(), "test"));
        let (table, diagnostics) = builder.finish();

        assert!(diagnostics.is_empty());
        assert_eq!(table.get(Scope::All, &stroke("Ctrl+s")).unwrap().command, "save");
    }

    #[test]
    fn test_empty_and_invalid_strokes_are_rejected() {
        let mut builder = TableBuilder::new();
        assert!(!builder.bind(Scope::All, "", "save", noop(), "test"));
        assert!(!builder.bind(Scope::All, "Shift-3", "save", noop(), "test"));
        let (table, diagnostics) = builder.finish();

        assert!(table.is_empty());
        assert_eq!(diagnostics.len(), 1);
        assert!(matches!(diagnostics[0], CoreError::InvalidStroke(_)));
    }

    #[test]
    fn test_same_scope_last_registration_wins() {
        let mut builder = TableBuilder::new();
        builder.bind(Scope::Body, "Ctrl-k", "kill-line", noop(), "a");
        builder.bind(Scope::Body, "Ctrl-k", "kill-node", noop(), "b");
        let (table, diagnostics) = builder.finish();

        assert_eq!(table.len(), 1);
        assert_eq!(table.get(Scope::Body, &stroke("Ctrl-k")).unwrap().command, "kill-node");
        assert!(matches!(diagnostics[0], CoreError::BindingConflict { .. }));
    }

    #[test]
    fn test_all_scope_overlaps_everything() {
        let mut builder = TableBuilder::new();
        builder.bind(Scope::Body, "Ctrl-k", "kill-line", noop(), "a");
        builder.bind(Scope::Tree, "Ctrl-k", "kill-node", noop(), "a");
        builder.bind(Scope::All, "Ctrl-k", "kill-all", noop(), "b");
        let (table, diagnostics) = builder.finish();

        assert_eq!(table.len(), 1);
        assert!(table.get(Scope::Body, &stroke("Ctrl-k")).is_none());
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn test_narrow_scope_keeps_all_scope_binding() {
        let mut builder = TableBuilder::new();
        builder.bind(Scope::All, "Ctrl-k", "kill-all", noop(), "a");
        builder.bind(Scope::Body, "Ctrl-k", "kill-line", noop(), "b");
        let (table, diagnostics) = builder.finish();

        assert_eq!(table.len(), 2);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_rebinding_same_command_is_not_a_conflict() {
        let mut builder = TableBuilder::new();
        builder.bind(Scope::All, "Ctrl-s", "save", noop(), "a");
        builder.bind(Scope::All, "Ctrl-S", "save", noop(), "b");
        let (_, diagnostics) = builder.finish();
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_with_binding_leaves_original_untouched() {
        let (table, _) = TableBuilder::new().finish();
        let record = BindingRecord {
            stroke: stroke("F5"),
            scope: Scope::All,
            command: "refresh".to_string(),
            handler: noop(),
            tag: "runtime".to_string(),
        };
        let (updated, _) = table.with_binding(record);

        assert!(table.is_empty());
        assert_eq!(updated.len(), 1);
    }

    #[test]
    fn test_inverse() {
        let mut builder = TableBuilder::new();
        builder.bind(Scope::All, "Ctrl-s", "save", noop(), "a");
        builder.bind(Scope::Body, "F2", "save", noop(), "a");
        builder.bind(Scope::All, "Ctrl-q", "quit", noop(), "a");
        let (table, _) = builder.finish();

        let inverse = table.inverse();
        assert_eq!(inverse["save"].len(), 2);
        assert_eq!(inverse["save"][0], (Scope::All, stroke("Ctrl-s")));
        assert_eq!(table.strokes_for("quit"), vec![(Scope::All, stroke("Ctrl-q"))]);
    }

    struct Configured;

    impl ShortcutSource for Configured {
        fn shortcuts(&self, command: &str) -> Option<Vec<Shortcut>> {
            match command {
                "save" => Some(vec![Shortcut::new(Scope::All, "F9").tagged("user")]),
                _ => None,
            }
        }

        fn commands(&self) -> Vec<String> {
            vec!["save".to_string(), "ghost".to_string()]
        }
    }

    #[test]
    fn test_build_table_prefers_configured_shortcuts() {
        let mut registry = CommandRegistry::new();
        registry.register_fn("save", Some(Shortcut::new(Scope::All, "Ctrl-s")), |_ctx| {
            Ok(CommandOutcome::Handled)
        });
        registry.register_fn("quit", Some(Shortcut::new(Scope::All, "Ctrl-q")), |_ctx| {
            Ok(CommandOutcome::Handled)
        });

        let (table, diagnostics) = build_table(&registry, &Configured);

        assert!(table.get(Scope::All, &stroke("Ctrl-s")).is_none());
        assert_eq!(table.get(Scope::All, &stroke("F9")).unwrap().tag, "user");
        assert_eq!(table.get(Scope::All, &stroke("Ctrl-q")).unwrap().command, "quit");
        assert!(matches!(&diagnostics[..], [CoreError::UnknownCommand(name)] if name == "ghost"));
    }
}
