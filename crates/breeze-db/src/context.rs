//! # Call Context
//!
//! The request-scoped value threaded through every repository call. It
//! carries the ambient transaction (if any) and an optional deadline.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DbContext::new()                  tx: None      → statements use pool │
//! │       │                                                                 │
//! │       ▼  run_transaction(&ctx, ..)                                     │
//! │  child context (passed to work)    tx: Some(h)   → statements use h    │
//! │       │                                                                 │
//! │       ▼  run_transaction(&child, ..)                                   │
//! │  same child context, joined        tx: Some(h)   → no second BEGIN     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Contexts are plain values: cloning one copies the handle reference, and a
//! parent context is never modified by what happens in its children.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::transaction::TxHandle;

/// Request-scoped execution context.
#[derive(Clone, Default)]
pub struct DbContext {
    tx: Option<TxHandle>,
    deadline: Option<Instant>,
}

impl DbContext {
    /// A context with no transaction and no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a context whose statements must finish within `timeout`.
    ///
    /// An earlier existing deadline is kept. A timeout too large to represent
    /// adds no deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.clone(),
        }
    }

    /// Returns a context with the given deadline, or the existing one if it
    /// is earlier.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        DbContext {
            tx: self.tx.clone(),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The ambient transaction handle, if this context carries one.
    pub fn transaction(&self) -> Option<&TxHandle> {
        self.tx.as_ref()
    }

    /// Whether this context carries a transaction that is still open.
    pub fn in_transaction(&self) -> bool {
        self.tx.as_ref().is_some_and(TxHandle::is_open)
    }

    pub(crate) fn with_transaction(&self, tx: TxHandle) -> Self {
        DbContext {
            tx: Some(tx),
            deadline: self.deadline,
        }
    }
}

impl fmt::Debug for DbContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbContext")
            .field("tx", &self.tx.as_ref().map(TxHandle::id))
            .field("deadline", &self.deadline)
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
