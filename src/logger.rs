//! Observing status transitions.
//!
//! Every time a node's status actually changes, the tree sends a [`StatusChange`] to each
//! registered [`StatusObserver`]. Observers only get the change record, never the tree.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use tracing::debug;

use crate::{NodeId, NodeStatus, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub node: NodeId,
    pub name: Symbol,
    pub type_name: Symbol,
    pub previous: NodeStatus,
    pub current: NodeStatus,
    pub timestamp: Instant,
}

pub trait StatusObserver {
    fn on_status_change(&mut self, change: &StatusChange);
}

impl<F: FnMut(&StatusChange)> StatusObserver for F {
    fn on_status_change(&mut self, change: &StatusChange) {
        self(change)
    }
}

/// Forwards transitions to `tracing` at debug level.
#[derive(Debug, Default)]
pub struct TracingLogger {
    /// Also report transitions back to `Idle`
    pub show_idle: bool,
    start: Option<Instant>,
}

impl TracingLogger {
    pub fn new(show_idle: bool) -> Self {
        Self {
            show_idle,
            start: None,
        }
    }
}

impl StatusObserver for TracingLogger {
    fn on_status_change(&mut self, change: &StatusChange) {
        if change.current == NodeStatus::Idle && !self.show_idle {
            return;
        }
        let start = *self.start.get_or_insert(change.timestamp);
        let elapsed = change.timestamp.duration_since(start);
        debug!(
            elapsed_ms = elapsed.as_secs_f64() * 1e3,
            node = %change.name,
            "{} -> {}",
            change.previous,
            change.current
        );
    }
}

/// Records transitions into a shared buffer. Clones share the buffer, so keep one clone and hand
/// the other to the tree.
#[derive(Debug, Clone, Default)]
pub struct StatusLog(Rc<RefCell<Vec<StatusChange>>>);

impl StatusLog {
    pub fn entries(&self) -> Vec<StatusChange> {
        self.0.borrow().clone()
    }

    /// `(name, current)` of every transition, in order.
    pub fn transitions(&self) -> Vec<(Symbol, NodeStatus)> {
        self.0
            .borrow()
            .iter()
            .map(|change| (change.name, change.current))
            .collect()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl StatusObserver for StatusLog {
    fn on_status_change(&mut self, change: &StatusChange) {
        self.0.borrow_mut().push(*change);
    }
}
