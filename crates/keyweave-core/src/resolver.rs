//! Pane resolution: which binding a stroke means on a given surface.
//!
//! Candidate scopes are tried in a fixed order and the first scope that
//! applies to the surface *and* binds the stroke wins:
//!
//! | order | scope | applies when |
//! |---|---|---|
//! | 1-3 | `command`, `insert`, `overwrite` | it is the current unbound-key action |
//! | 4 | `button` | always |
//! | 5 | `body` | surface is the body |
//! | 6 | `text` | surface is a headline (except `previous-line`/`next-line`) |
//! | 7-8 | `tree` | surface is a headline or the tree |
//! | 9 | `log` | surface is the log |
//! | 10-11 | `text` | surface accepts text |
//! | 12 | `all` | always |

use crate::binding::{BindingRecord, BindingTable, Scope};
use crate::config::UnboundAction;
use crate::surface::SurfaceKind;
use keyweave_stroke::Stroke;

/// Scopes in resolution order, each with the surface kind it is tied to.
const PRIORITY: &[(Scope, Option<SurfaceKind>)] = &[
    (Scope::Command, None),
    (Scope::Insert, None),
    (Scope::Overwrite, None),
    (Scope::Button, None),
    (Scope::Body, Some(SurfaceKind::Body)),
    (Scope::Text, Some(SurfaceKind::Headline)),
    (Scope::Tree, Some(SurfaceKind::Headline)),
    (Scope::Tree, Some(SurfaceKind::Tree)),
    (Scope::Log, Some(SurfaceKind::Log)),
    (Scope::Text, Some(SurfaceKind::Log)),
    (Scope::Text, None),
    (Scope::All, None),
];

/// Commands that generic text bindings may not claim on a headline.
const TREE_NAVIGATION: &[&str] = &["previous-line", "next-line"];

fn action_scope(action: UnboundAction) -> Scope {
    match action {
        UnboundAction::Command => Scope::Command,
        UnboundAction::Insert => Scope::Insert,
        UnboundAction::Overwrite => Scope::Overwrite,
    }
}

fn applies(scope: Scope, kind: Option<SurfaceKind>, surface: SurfaceKind, action: UnboundAction) -> bool {
    if kind == Some(surface) {
        return true;
    }
    match scope {
        Scope::Command | Scope::Insert | Scope::Overwrite => scope == action_scope(action),
        Scope::Text => surface.is_text(),
        Scope::Button | Scope::All => true,
        _ => false,
    }
}

/// Returns the record `stroke` resolves to on a `surface`.
pub fn resolve<'t>(
    table: &'t BindingTable,
    stroke: &Stroke,
    surface: SurfaceKind,
    action: UnboundAction,
) -> Option<&'t BindingRecord> {
    for &(scope, kind) in PRIORITY {
        if !applies(scope, kind, surface, action) {
            continue;
        }
        let Some(record) = table.get(scope, stroke) else {
            continue;
        };
        if scope == Scope::Text
            && kind == Some(SurfaceKind::Headline)
            && TREE_NAVIGATION.contains(&record.command.as_str())
        {
            continue;
        }
        tracing::trace!(stroke = %stroke, scope = %scope, command = %record.command, "resolved");
        return Some(record);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::TableBuilder;
    use crate::test_support::noop;

    fn table(bindings: &[(Scope, &str, &str)]) -> BindingTable {
        let mut builder = TableBuilder::new();
        for (scope, key, command) in bindings {
            builder.bind(*scope, key, command, noop(), "test");
        }
        builder.finish().0
    }

    fn resolved(table: &BindingTable, key: &str, surface: SurfaceKind, action: UnboundAction) -> Option<String> {
        let stroke = Stroke::parse(key).unwrap();
        resolve(table, &stroke, surface, action).map(|r| r.command.clone())
    }

    #[test]
    fn test_body_preferred_over_all() {
        let t = table(&[(Scope::All, "Ctrl-k", "kill-all"), (Scope::Body, "Ctrl-k", "kill-line")]);
        assert_eq!(
            resolved(&t, "Ctrl-k", SurfaceKind::Body, UnboundAction::Insert).as_deref(),
            Some("kill-line")
        );
        assert_eq!(
            resolved(&t, "Ctrl-k", SurfaceKind::Tree, UnboundAction::Insert).as_deref(),
            Some("kill-all")
        );
    }

    #[test]
    fn test_text_scope_needs_text_surface() {
        let t = table(&[(Scope::Text, "Ctrl-a", "beginning-of-line")]);
        assert_eq!(
            resolved(&t, "Ctrl-a", SurfaceKind::Log, UnboundAction::Insert).as_deref(),
            Some("beginning-of-line")
        );
        assert_eq!(resolved(&t, "Ctrl-a", SurfaceKind::Tree, UnboundAction::Insert), None);
    }

    #[test]
    fn test_headline_skips_text_navigation() {
        let t = table(&[
            (Scope::Text, "Up", "previous-line"),
            (Scope::Tree, "Up", "goto-prev-visible"),
        ]);
        assert_eq!(
            resolved(&t, "Up", SurfaceKind::Headline, UnboundAction::Insert).as_deref(),
            Some("goto-prev-visible")
        );
        assert_eq!(
            resolved(&t, "Up", SurfaceKind::Body, UnboundAction::Insert).as_deref(),
            Some("previous-line")
        );
    }

    #[test]
    fn test_headline_prefers_text_for_other_commands() {
        let t = table(&[
            (Scope::Text, "Ctrl-e", "end-of-line"),
            (Scope::Tree, "Ctrl-e", "edit-headline"),
        ]);
        assert_eq!(
            resolved(&t, "Ctrl-e", SurfaceKind::Headline, UnboundAction::Insert).as_deref(),
            Some("end-of-line")
        );
    }

    #[test]
    fn test_action_scope_applies_only_in_that_state() {
        let t = table(&[(Scope::Command, "j", "next-node"), (Scope::Body, "j", "insert-j")]);
        assert_eq!(
            resolved(&t, "j", SurfaceKind::Body, UnboundAction::Command).as_deref(),
            Some("next-node")
        );
        assert_eq!(
            resolved(&t, "j", SurfaceKind::Body, UnboundAction::Insert).as_deref(),
            Some("insert-j")
        );
    }

    #[test]
    fn test_unbound_stroke() {
        let t = table(&[(Scope::Body, "F5", "refresh")]);
        assert_eq!(resolved(&t, "F6", SurfaceKind::Body, UnboundAction::Insert), None);
        assert_eq!(resolved(&t, "F5", SurfaceKind::Log, UnboundAction::Insert), None);
    }
}
