//! Graph-changed notifications.
//!
//! The indexing driver publishes one `refresh` event after each committed
//! re-index batch, strictly after the commit it refers to. Consumers (the
//! visualiser's streaming channel, tests) subscribe and receive every event
//! published after their subscription.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

/// A single graph-changed event. The wire form is the literal text
/// `refresh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphEvent {
    Refresh,
}

impl std::fmt::Display for GraphEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphEvent::Refresh => write!(f, "refresh"),
        }
    }
}

/// Fan-out of graph-changed events to any number of subscribers.
///
/// Disconnected subscribers are dropped on the next publish.
#[derive(Default)]
pub struct ChangeNotifier {
    subscribers: Mutex<Vec<Sender<GraphEvent>>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber. Events published before this call are
    /// not replayed.
    pub fn subscribe(&self) -> Receiver<GraphEvent> {
        let (tx, rx) = channel();
        match self.subscribers.lock() {
            Ok(mut subscribers) => subscribers.push(tx),
            Err(poisoned) => poisoned.into_inner().push(tx),
        }
        rx
    }

    /// Publish `refresh` to every live subscriber.
    pub fn publish(&self) {
        let mut subscribers = match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        subscribers.retain(|tx| tx.send(GraphEvent::Refresh).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_receive_published_events() {
        let notifier = ChangeNotifier::new();
        let rx = notifier.subscribe();
        notifier.publish();
        notifier.publish();
        assert_eq!(rx.try_recv(), Ok(GraphEvent::Refresh));
        assert_eq!(rx.try_recv(), Ok(GraphEvent::Refresh));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let notifier = ChangeNotifier::new();
        {
            let _rx = notifier.subscribe();
        }
        // Dropped receiver must not wedge future publishes
        notifier.publish();
        let rx = notifier.subscribe();
        notifier.publish();
        assert_eq!(rx.try_recv(), Ok(GraphEvent::Refresh));
    }

    #[test]
    fn event_renders_as_refresh() {
        assert_eq!(GraphEvent::Refresh.to_string(), "refresh");
    }
}
