//! Event system for dispatch notifications.
//!
//! ## Learning: Observer Pattern in Rust
//!
//! Rust's ownership model makes traditional observer patterns tricky.
//! We use `tokio::sync::broadcast` for a safe, async-friendly event bus.
//!
//! Dispatch itself is synchronous: `emit` never blocks, so a slow status
//! bar or macro viewer can't stall keystroke handling.

use tokio::sync::broadcast;

/// Things the engine reports while dispatching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The modal state changed kind. `None` means Idle.
    StateChanged {
        from: Option<String>,
        to: Option<String>,
    },
    /// A user mode became active.
    ModeEntered(String),
    /// A user mode ended.
    ModeExited(String),
    /// A command ran.
    CommandInvoked(String),
    /// A keystroke matched nothing and was discarded.
    KeyDropped(String),
    /// Binding and mode tables were replaced.
    BindingsRebuilt { bindings: usize },
}

/// Event bus for broadcasting engine events.
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Creates a new event bus.
    pub fn new() -> Self {
        // Capacity of 256 events in the buffer
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    /// Emits an event to all subscribers.
    pub fn emit(&self, event: EngineEvent) {
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribes to events.
    ///
    /// Returns a receiver that will get all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Helper for processing events asynchronously.
///
/// ## Example
///
/// ```ignore
/// let mut handler = EventHandler::new(engine.subscribe());
///
/// tokio::spawn(async move {
///     while let Some(event) = handler.next().await {
///         if let EngineEvent::ModeEntered(name) = event {
///             status_bar.show(&name);
///         }
///     }
/// });
/// ```
pub struct EventHandler {
    receiver: broadcast::Receiver<EngineEvent>,
}

impl EventHandler {
    /// Creates a new event handler.
    pub fn new(receiver: broadcast::Receiver<EngineEvent>) -> Self {
        Self { receiver }
    }

    /// Waits for the next event.
    pub async fn next(&mut self) -> Option<EngineEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event handler lagged, missed {} events", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next buffered event without waiting.
    pub fn try_next(&mut self) -> Option<EngineEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!("Event handler lagged, missed {} events", n);
                    continue;
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::test_support::engine_with;

    #[tokio::test]
    async fn test_event_bus() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(EngineEvent::CommandInvoked("save".to_string()));

        let event = rx.recv().await.unwrap();
        assert_eq!(event, EngineEvent::CommandInvoked("save".to_string()));
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(EngineEvent::BindingsRebuilt { bindings: 3 });

        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_engine_reports_commands() {
        let mut engine = engine_with(Config::default());
        let mut handler = EventHandler::new(engine.subscribe());

        engine.simulate_command("set-command-state").unwrap();

        let mut seen = Vec::new();
        while let Some(event) = handler.try_next() {
            seen.push(event);
        }
        assert!(seen.contains(&EngineEvent::CommandInvoked("set-command-state".to_string())));
    }
}
