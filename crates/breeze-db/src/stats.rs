//! # Execution Counters
//!
//! Cheap atomic counters shared by every clone of a [`DbClient`](crate::DbClient).
//! They answer diagnostic questions such as "how many statements did that
//! relation load issue?" and "did the nested transaction open a second
//! physical transaction?".

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, owned by the client behind an `Arc`.
#[derive(Debug, Default)]
pub(crate) struct ClientStats {
    statements: AtomicU64,
    begun: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
}

impl ClientStats {
    pub(crate) fn record_statement(&self) {
        self.statements.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_begin(&self) {
        self.begun.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            statements: self.statements.load(Ordering::Relaxed),
            transactions_begun: self.begun.load(Ordering::Relaxed),
            transactions_committed: self.committed.load(Ordering::Relaxed),
            transactions_rolled_back: self.rolled_back.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the client counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Statements run through the executor (BEGIN / COMMIT / ROLLBACK excluded).
    pub statements: u64,
    /// Physical transactions opened by `run_transaction`.
    pub transactions_begun: u64,
    pub transactions_committed: u64,
    pub transactions_rolled_back: u64,
}

impl StatsSnapshot {
    /// Counter deltas between an earlier snapshot and this one.
    pub fn since(&self, earlier: &StatsSnapshot) -> StatsSnapshot {
        StatsSnapshot {
            statements: self.statements - earlier.statements,
            transactions_begun: self.transactions_begun - earlier.transactions_begun,
            transactions_committed: self.transactions_committed - earlier.transactions_committed,
            transactions_rolled_back: self.transactions_rolled_back
                - earlier.transactions_rolled_back,
        }
    }
}
