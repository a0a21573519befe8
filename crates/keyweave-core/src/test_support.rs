//! Shared helpers for unit tests.

use crate::command::{CommandContext, CommandHandler, CommandOutcome, CommandResult};
use crate::config::{Config, UnboundAction};
use crate::dispatch::Dispatch;
use crate::engine::Engine;
use crate::host::{Host, NullHost};
use crate::input::KeyEvent;
use crate::surface::{Surface, SurfaceKind};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct Noop;

impl CommandHandler for Noop {
    fn execute(&self, _ctx: &mut CommandContext<'_>) -> CommandResult {
        Ok(CommandOutcome::Handled)
    }
}

pub(crate) fn noop() -> Arc<dyn CommandHandler> {
    Arc::new(Noop)
}

struct Counter(Arc<AtomicUsize>);

impl CommandHandler for Counter {
    fn execute(&self, _ctx: &mut CommandContext<'_>) -> CommandResult {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(CommandOutcome::Handled)
    }
}

/// A command that counts its invocations.
pub(crate) fn counter() -> (Arc<dyn CommandHandler>, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    (Arc::new(Counter(Arc::clone(&count))), count)
}

#[derive(Default)]
struct Recorded {
    prompts: Vec<String>,
    inserted: Vec<char>,
    lists: Vec<(String, Vec<String>)>,
    beeps: usize,
}

/// A host that remembers everything it is asked to do. Clones share
/// the same record.
#[derive(Clone, Default)]
pub(crate) struct RecordingHost {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingHost {
    pub(crate) fn last_prompt(&self) -> Option<String> {
        self.inner.lock().unwrap().prompts.last().cloned()
    }

    pub(crate) fn inserted(&self) -> Vec<char> {
        self.inner.lock().unwrap().inserted.clone()
    }

    pub(crate) fn lists(&self) -> Vec<(String, Vec<String>)> {
        self.inner.lock().unwrap().lists.clone()
    }

    pub(crate) fn beeps(&self) -> usize {
        self.inner.lock().unwrap().beeps
    }
}

impl Host for RecordingHost {
    fn show_prompt(&mut self, text: &str) {
        self.inner.lock().unwrap().prompts.push(text.to_string());
    }

    fn self_insert(&mut self, event: &KeyEvent, _action: UnboundAction) {
        if let Some(ch) = event.character {
            self.inner.lock().unwrap().inserted.push(ch);
        }
    }

    fn show_list(&mut self, title: &str, items: &[String]) {
        self.inner
            .lock()
            .unwrap()
            .lists
            .push((title.to_string(), items.to_vec()));
    }

    fn beep(&mut self) {
        self.inner.lock().unwrap().beeps += 1;
    }
}

pub(crate) fn engine_with(config: Config) -> Engine {
    Engine::new(config, Box::new(NullHost))
}

pub(crate) fn recording_engine(config: Config) -> (Engine, RecordingHost) {
    let host = RecordingHost::default();
    let engine = Engine::new(config, Box::new(host.clone()));
    (engine, host)
}

pub(crate) type Counts = BTreeMap<String, Arc<AtomicUsize>>;

/// An engine with a counting command per name, rebuilt so configured
/// shortcuts and modes can refer to them.
pub(crate) fn counting_engine(config: Config, names: &[&str]) -> (Engine, RecordingHost, Counts) {
    let (mut engine, host) = recording_engine(config);
    let mut counts = Counts::new();
    for name in names {
        let (handler, count) = counter();
        engine.register_command(name, handler, None);
        counts.insert(name.to_string(), count);
    }
    engine.rebuild_all();
    (engine, host, counts)
}

pub(crate) fn count(counts: &Counts, name: &str) -> usize {
    counts[name].load(Ordering::SeqCst)
}

pub(crate) fn body() -> Surface {
    Surface::new(SurfaceKind::Body)
}

pub(crate) fn tree() -> Surface {
    Surface::new(SurfaceKind::Tree)
}

/// Parses `spec` and dispatches it on `surface`.
pub(crate) fn press(engine: &mut Engine, spec: &str, surface: Surface) -> Dispatch {
    let event = KeyEvent::parse(spec, surface).unwrap();
    engine.handle_keystroke(&event)
}
