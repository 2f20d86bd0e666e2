//! Readiness predicates.
//!
//! A condition is either polled (each [`Condition::check`] may do I/O) or
//! fed by log lines (it also implements [`LineListener`] and its `check`
//! only reads state set by notifications). [`StartCondition`] tags which
//! one a given condition is, so the gate knows what to register with the
//! log fan-out before attaching.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::WaitError;
use crate::wait::listener::LineListener;

/// A readiness predicate.
///
/// Once `check` has returned `Ok(true)` it must keep doing so. The only
/// error a condition may return is [`WaitError::Configuration`]; everything
/// else counts as "not yet".
#[async_trait]
pub trait Condition: Send + Sync {
    async fn check(&self) -> Result<bool, WaitError>;

    /// Human-readable description used in failure messages.
    fn describe(&self) -> String;

    /// Release resources. Called once when a wait on this condition ends,
    /// whatever the outcome.
    fn after(&self) {}
}

/// A condition whose state is driven by log line notifications.
pub trait ListenerCondition: Condition + LineListener {}

impl<T: Condition + LineListener> ListenerCondition for T {}

/// A condition tagged by how it learns about readiness.
pub enum StartCondition {
    /// Actively checked on every poll.
    Pollable(Box<dyn Condition>),
    /// Passively fed by log lines; must be registered before attaching.
    Listener(Arc<dyn ListenerCondition>),
}

impl StartCondition {
    pub fn pollable(condition: impl Condition + 'static) -> Self {
        StartCondition::Pollable(Box::new(condition))
    }

    pub fn listener(condition: impl ListenerCondition + 'static) -> Self {
        StartCondition::Listener(Arc::new(condition))
    }

    /// The line listener to register with the fan-out, if any.
    pub fn line_listener(&self) -> Option<Arc<dyn LineListener>> {
        match self {
            StartCondition::Pollable(_) => None,
            StartCondition::Listener(condition) => {
                let listener: Arc<dyn LineListener> = condition.clone();
                Some(listener)
            }
        }
    }

    pub fn is_listener(&self) -> bool {
        matches!(self, StartCondition::Listener(_))
    }
}

#[async_trait]
impl Condition for StartCondition {
    async fn check(&self) -> Result<bool, WaitError> {
        match self {
            StartCondition::Pollable(c) => c.check().await,
            StartCondition::Listener(c) => c.check().await,
        }
    }

    fn describe(&self) -> String {
        match self {
            StartCondition::Pollable(c) => c.describe(),
            StartCondition::Listener(c) => c.describe(),
        }
    }

    fn after(&self) {
        match self {
            StartCondition::Pollable(c) => c.after(),
            StartCondition::Listener(c) => c.after(),
        }
    }
}

impl std::fmt::Debug for StartCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_listener() {
            "Listener"
        } else {
            "Pollable"
        };
        f.debug_tuple(kind).field(&self.describe()).finish()
    }
}
