//! # Ambient Transaction Manager
//!
//! Runs a unit of work inside a database transaction, joining the caller's
//! transaction when the context already carries one.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    run_transaction(ctx, options, work)                  │
//! │                                                                         │
//! │  ctx has open tx? ──yes──► work(ctx) ──► result returned unmodified    │
//! │       │ no                                                              │
//! │       ▼                                                                 │
//! │  acquire conn ─► setup pragmas ─► BEGIN ...      (fail → BeginFailed)  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  work(child ctx) under catch_unwind                                    │
//! │       │                                                                 │
//! │       ├── Ok(value) ──► COMMIT ──► Ok(value)                           │
//! │       │                   └─ fails ─► ROLLBACK ─► CommitFailed         │
//! │       │                                                                 │
//! │       ├── Err(e) ─────► ROLLBACK ─► WorkFailed(e)                      │
//! │       │                   └─ fails ─► RollbackFailed { .. }            │
//! │       │                                                                 │
//! │       └── panic ──────► ROLLBACK ─► WorkFailed(Panicked(msg))          │
//! │                                                                         │
//! │  reset pragmas ─► connection back to pool ─► handle Closed             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## States
//! `Open → Closed`. A closed handle never reopens; statements routed through
//! it fail with `DbError::TransactionClosed`.
//!
//! ## Cancellation
//! If the `run_transaction` future is dropped while the transaction is open,
//! the connection is detached from the pool and closed. SQLite rolls back
//! whatever the closed connection left uncommitted.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use breeze_core::TxOptions;
use futures::FutureExt;
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::context::DbContext;
use crate::error::{DbError, DbResult};
use crate::pool::DbClient;

static NEXT_TX_ID: AtomicU64 = AtomicU64::new(1);

// =============================================================================
// Transaction Handle
// =============================================================================

/// Shared handle to one physical transaction.
///
/// Carried inside a [`DbContext`]. Clones refer to the same transaction.
#[derive(Clone)]
pub struct TxHandle {
    shared: Arc<TxShared>,
}

struct TxShared {
    id: u64,
    options: TxOptions,
    open: AtomicBool,
    slot: Mutex<TxSlot>,
}

/// The connection a transaction runs on. `None` once the transaction closed.
pub(crate) struct TxSlot {
    conn: Option<PoolConnection<Sqlite>>,
}

impl TxHandle {
    fn open(conn: PoolConnection<Sqlite>, options: TxOptions) -> Self {
        TxHandle {
            shared: Arc::new(TxShared {
                id: NEXT_TX_ID.fetch_add(1, Ordering::Relaxed),
                options,
                open: AtomicBool::new(true),
                slot: Mutex::new(TxSlot { conn: Some(conn) }),
            }),
        }
    }

    /// Process-unique id, used in log fields.
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn options(&self) -> TxOptions {
        self.shared.options
    }

    /// Whether the transaction has not yet committed or rolled back.
    pub fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::Acquire)
    }

    /// Waits for exclusive use of the transaction's connection.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, TxSlot> {
        self.shared.slot.lock().await
    }

    fn mark_closed(&self) {
        self.shared.open.store(false, Ordering::Release);
    }
}

impl fmt::Debug for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxHandle")
            .field("id", &self.id())
            .field("options", &self.shared.options)
            .field("open", &self.is_open())
            .finish()
    }
}

impl TxSlot {
    /// The live connection, or `TransactionClosed`.
    pub(crate) fn connection(&mut self) -> DbResult<&mut SqliteConnection> {
        self.conn.as_deref_mut().ok_or(DbError::TransactionClosed)
    }

    /// Returns the connection to the pool after resetting session pragmas.
    /// If a reset fails the connection is discarded instead.
    async fn release(&mut self, options: &TxOptions) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };

        for pragma in options.reset_pragmas() {
            if let Err(e) = sqlx::raw_sql(pragma).execute(&mut *conn).await {
                warn!(error = %e, pragma, "Pragma reset failed, discarding connection");
                drop(conn.detach());
                return;
            }
        }
    }

    /// Closes the connection without returning it to the pool.
    fn discard(&mut self) {
        if let Some(conn) = self.conn.take() {
            drop(conn.detach());
        }
    }
}

impl Drop for TxSlot {
    fn drop(&mut self) {
        if self.conn.is_some() {
            warn!("Transaction dropped while open, discarding connection");
            self.discard();
        }
    }
}

// =============================================================================
// Cancellation Guard
// =============================================================================

/// Closes the transaction if `run_transaction` is dropped before finishing.
struct OpenTx {
    handle: TxHandle,
    finished: bool,
}

impl Drop for OpenTx {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.handle.mark_closed();
        warn!(tx = self.handle.id(), "Transaction cancelled, discarding connection");
        if let Ok(mut slot) = self.handle.shared.slot.try_lock() {
            slot.discard();
        }
    }
}

// =============================================================================
// Transaction Manager
// =============================================================================

impl DbClient {
    /// Runs `work` inside a transaction.
    ///
    /// ## Joining
    /// If `ctx` already carries an open transaction, `work` runs on it and
    /// its result is returned unmodified: no second `BEGIN`, no wrapping.
    /// `options` are ignored in that case.
    ///
    /// ## Errors
    /// - `BeginFailed` - no connection, or `BEGIN` rejected
    /// - `WorkFailed(e)` - `work` returned `e`; rolled back
    /// - `WorkFailed(Panicked(msg))` - `work` panicked; rolled back
    /// - `RollbackFailed` - `work` failed and so did the rollback
    /// - `CommitFailed` - `COMMIT` rejected; rolled back
    ///
    /// ## Example
    /// ```rust,ignore
    /// let id = client
    ///     .run_transaction(&ctx, TxOptions::default(), |tx_ctx| async move {
    ///         let id = parents.create(&tx_ctx, ["PARENT"]).await?;
    ///         children.create(&tx_ctx, [Expr::val("TYPE1"), Expr::val(id)]).await?;
    ///         Ok(id)
    ///     })
    ///     .await?;
    /// ```
    pub async fn run_transaction<F, Fut, R>(
        &self,
        ctx: &DbContext,
        options: TxOptions,
        work: F,
    ) -> DbResult<R>
    where
        F: FnOnce(DbContext) -> Fut,
        Fut: Future<Output = DbResult<R>>,
    {
        if let Some(tx) = ctx.transaction() {
            if tx.is_open() {
                debug!(tx = tx.id(), "Joining ambient transaction");
                return work(ctx.clone()).await;
            }
            warn!(tx = tx.id(), "Context carries a closed transaction, starting a new one");
        }

        let handle = self.begin(options).await?;
        let mut guard = OpenTx {
            handle: handle.clone(),
            finished: false,
        };

        let tx_ctx = ctx.with_transaction(handle.clone());
        let outcome = AssertUnwindSafe(async move { work(tx_ctx).await })
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(Ok(value)) => self.commit(&handle).await.map(|()| value),
            Ok(Err(err)) => Err(self.rollback_after(&handle, err).await),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(tx = handle.id(), panic = %message, "Panic inside transaction");
                Err(self
                    .rollback_after(&handle, DbError::Panicked(message))
                    .await)
            }
        };

        guard.finished = true;
        result
    }

    async fn begin(&self, options: TxOptions) -> DbResult<TxHandle> {
        let mut conn = self
            .pool()
            .acquire()
            .await
            .map_err(|e| DbError::BeginFailed(e.to_string()))?;

        let mut started = Ok(());
        for pragma in options.setup_pragmas() {
            started = sqlx::raw_sql(pragma).execute(&mut *conn).await.map(drop);
            if started.is_err() {
                break;
            }
        }
        if started.is_ok() {
            started = sqlx::raw_sql(options.begin_statement())
                .execute(&mut *conn)
                .await
                .map(drop);
        }

        if let Err(e) = started {
            warn!(error = %e, %options, "Failed to begin transaction");
            let mut slot = TxSlot { conn: Some(conn) };
            slot.release(&options).await;
            return Err(DbError::BeginFailed(e.to_string()));
        }

        self.counters().record_begin();
        let handle = TxHandle::open(conn, options);
        info!(tx = handle.id(), %options, "Transaction started");
        Ok(handle)
    }

    async fn commit(&self, handle: &TxHandle) -> DbResult<()> {
        let mut slot = handle.lock().await;
        let committed = sqlx::raw_sql("COMMIT")
            .execute(slot.connection()?)
            .await
            .map(drop);

        match committed {
            Ok(()) => {
                handle.mark_closed();
                slot.release(&handle.options()).await;
                self.counters().record_commit();
                info!(tx = handle.id(), "Transaction committed");
                Ok(())
            }
            Err(e) => {
                warn!(tx = handle.id(), error = %e, "Commit failed, rolling back");
                if let Err(rb) = self.rollback_slot(handle, &mut slot).await {
                    error!(tx = handle.id(), error = %rb, "Rollback after failed commit failed");
                }
                Err(DbError::CommitFailed(e.to_string()))
            }
        }
    }

    /// Rolls back and wraps `cause` for the caller.
    async fn rollback_after(&self, handle: &TxHandle, cause: DbError) -> DbError {
        let mut slot = handle.lock().await;
        let failure = DbError::WorkFailed(Box::new(cause));

        match self.rollback_slot(handle, &mut slot).await {
            Ok(()) => {
                warn!(tx = handle.id(), error = %failure, "Transaction rolled back");
                failure
            }
            Err(rb) => {
                error!(tx = handle.id(), error = %failure, rollback = %rb, "Rollback failed");
                DbError::RollbackFailed {
                    source: Box::new(failure),
                    rollback: rb.to_string(),
                }
            }
        }
    }

    /// Issues `ROLLBACK` and closes the handle either way. A connection whose
    /// rollback failed is discarded.
    async fn rollback_slot(&self, handle: &TxHandle, slot: &mut TxSlot) -> DbResult<()> {
        handle.mark_closed();
        let rolled_back = match slot.connection() {
            Ok(conn) => sqlx::raw_sql("ROLLBACK").execute(conn).await.map(drop),
            Err(_) => return Ok(()),
        };

        match rolled_back {
            Ok(()) => {
                self.counters().record_rollback();
                slot.release(&handle.options()).await;
                Ok(())
            }
            Err(e) => {
                slot.discard();
                Err(e.into())
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
