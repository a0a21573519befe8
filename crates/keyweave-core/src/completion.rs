//! Prefix completion and tab cycling.
//!
//! Each Tab press does one of three things:
//!
//! 1. While cycling, and the text still starts with the cycle's prefix,
//!    move to the next candidate of the frozen list, wrapping around.
//! 2. When the text already equals the common prefix of its matches,
//!    start cycling. The first press lands on the *second* match, so
//!    pressing Tab always changes what is shown.
//! 3. Otherwise extend the text to the longer common prefix.
//!
//! Any other edit resets cycling.

/// Returns the candidates starting with `prefix` (case-sensitive) and
/// their longest common prefix. The prefix is empty when nothing matches.
pub fn matching(prefix: &str, candidates: &[String]) -> (Vec<String>, String) {
    let items: Vec<String> = candidates
        .iter()
        .filter(|c| c.starts_with(prefix))
        .cloned()
        .collect();
    let common = common_prefix(&items);
    (items, common)
}

/// Longest common prefix of `items`, respecting char boundaries.
pub fn common_prefix(items: &[String]) -> String {
    let Some((first, rest)) = items.split_first() else {
        return String::new();
    };
    let mut end = first.len();
    for item in rest {
        end = first
            .char_indices()
            .zip(item.chars())
            .take_while(|((_, a), b)| a == b)
            .last()
            .map(|((i, a), _)| i + a.len_utf8())
            .unwrap_or(0)
            .min(end);
    }
    first[..end].to_string()
}

#[derive(Debug, Clone)]
struct Cycle {
    prefix: String,
    items: Vec<String>,
    index: usize,
}

/// Tab-completion state for one input line.
#[derive(Debug, Clone, Default)]
pub struct TabCompleter {
    cycle: Option<Cycle>,
}

impl TabCompleter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops cycling.
    pub fn reset(&mut self) {
        self.cycle = None;
    }

    pub fn is_cycling(&self) -> bool {
        self.cycle.is_some()
    }

    /// Applies one Tab press to `text`. Returns the candidates to display.
    pub fn tab(&mut self, text: &mut String, candidates: &[String]) -> Vec<String> {
        if let Some(cycle) = self.cycle.as_mut() {
            if text.starts_with(&cycle.prefix) && !cycle.items.is_empty() {
                cycle.index = (cycle.index + 1) % cycle.items.len();
                *text = cycle.items[cycle.index].clone();
                return cycle.items.clone();
            }
            self.cycle = None;
        }

        let (items, prefix) = matching(text, candidates);
        if items.is_empty() {
            return items;
        }
        if prefix.len() > text.len() {
            *text = prefix;
            return items;
        }

        let index = if items.len() > 1 { 1 } else { 0 };
        *text = items[index].clone();
        self.cycle = Some(Cycle {
            prefix,
            items: items.clone(),
            index,
        });
        items
    }
}
