//! Line notifications and their one-to-many distribution.
//!
//! Listeners are collected in a [`ListenerFanoutBuilder`] and frozen into a
//! [`ListenerFanout`] before the log stream is attached, so no listener can
//! miss output that was already flowing.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Receives every line of one logical output source.
pub trait LineListener: Send + Sync {
    fn on_line(&self, line: &str);
}

/// Registration phase of a [`ListenerFanout`].
#[derive(Default)]
pub struct ListenerFanoutBuilder {
    listeners: Vec<Arc<dyn LineListener>>,
}

impl ListenerFanoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Delivery follows registration order.
    pub fn add(&mut self, listener: Arc<dyn LineListener>) -> &mut Self {
        self.listeners.push(listener);
        self
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Freeze the set of listeners.
    pub fn build(self) -> ListenerFanout {
        ListenerFanout {
            listeners: self.listeners.into(),
        }
    }
}

/// Frozen, ordered set of listeners.
///
/// Delivery is synchronous on the caller's task. A listener that panics is
/// logged and skipped; the remaining listeners still get the line.
#[derive(Clone)]
pub struct ListenerFanout {
    listeners: Arc<[Arc<dyn LineListener>]>,
}

impl ListenerFanout {
    pub fn builder() -> ListenerFanoutBuilder {
        ListenerFanoutBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver a line to every listener in registration order.
    pub fn notify(&self, line: &str) {
        for (idx, listener) in self.listeners.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| listener.on_line(line))).is_err() {
                tracing::warn!("Line listener #{} panicked, continuing with the rest", idx);
            }
        }
    }
}

impl LineListener for ListenerFanout {
    fn on_line(&self, line: &str) {
        self.notify(line);
    }
}

impl std::fmt::Debug for ListenerFanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerFanout")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Tagged {
        tag: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl LineListener for Tagged {
        fn on_line(&self, line: &str) {
            self.seen.lock().unwrap().push(format!("{}:{}", self.tag, line));
        }
    }

    struct Exploding;

    impl LineListener for Exploding {
        fn on_line(&self, _line: &str) {
            panic!("listener failure");
        }
    }

    #[test]
    fn test_delivers_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut builder = ListenerFanout::builder();
        builder
            .add(Arc::new(Tagged {
                tag: "a",
                seen: seen.clone(),
            }))
            .add(Arc::new(Tagged {
                tag: "b",
                seen: seen.clone(),
            }));
        let fanout = builder.build();

        fanout.notify("l1");
        fanout.notify("l2");

        assert_eq!(fanout.len(), 2);
        assert_eq!(*seen.lock().unwrap(), vec!["a:l1", "b:l1", "a:l2", "b:l2"]);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut builder = ListenerFanoutBuilder::new();
        builder.add(Arc::new(Exploding)).add(Arc::new(Tagged {
            tag: "after",
            seen: seen.clone(),
        }));
        let fanout = builder.build();

        fanout.notify("line");

        assert_eq!(*seen.lock().unwrap(), vec!["after:line"]);
    }

    #[test]
    fn test_empty_fanout() {
        let fanout = ListenerFanoutBuilder::new().build();
        assert!(fanout.is_empty());
        fanout.on_line("nobody listens");
    }
}
