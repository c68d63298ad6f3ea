//! # breeze-db: Database Layer for breeze-data
//!
//! Ambient transactions and generic repositories over SQLite, built on sqlx
//! and sea-query.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        breeze-data Data Flow                            │
//! │                                                                         │
//! │  Application code                                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   breeze-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────┐   ┌───────────────┐   ┌─────────────────┐   │   │
//! │  │   │ transaction  │   │  repository   │   │    executor     │   │   │
//! │  │   │              │   │               │   │                 │   │   │
//! │  │   │ run_         │   │ Repository<T> │   │ tx or pool?     │   │   │
//! │  │   │ transaction  │──►│ TableTemplates│──►│ deadline        │   │   │
//! │  │   │ TxHandle     │   │ Relation<P,C> │   │ log + count     │   │   │
//! │  │   └──────────────┘   └───────────────┘   └────────┬────────┘   │   │
//! │  │                                                   │            │   │
//! │  │   ┌──────────────┐   ┌───────────────┐            │            │   │
//! │  │   │   context    │   │     pool      │◄───────────┘            │   │
//! │  │   │  DbContext   │   │ DbConfig      │                         │   │
//! │  │   │              │   │ DbClient      │                         │   │
//! │  │   └──────────────┘   └───────────────┘                         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Configuration and the shared client
//! - [`context`] - Request-scoped context carrying the ambient transaction
//! - [`transaction`] - `run_transaction` and transaction handles
//! - [`repository`] - Generic repository, templates and relations
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use breeze_db::{DbClient, DbContext, TxOptions};
//!
//! let client = DbClient::connect("sqlite://app.db").await?;
//! let ctx = DbContext::new();
//!
//! client
//!     .run_transaction(&ctx, TxOptions::default(), |tx_ctx| async move {
//!         let id = parents.create(&tx_ctx, ["PARENT"]).await?;
//!         children.create(&tx_ctx, [Expr::val("TYPE1"), Expr::val(id)]).await?;
//!         Ok(())
//!     })
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod context;
pub mod error;
mod executor;
pub mod pool;
pub mod repository;
mod stats;
pub mod transaction;

// =============================================================================
// Re-exports
// =============================================================================

pub use context::DbContext;
pub use error::{DbError, DbResult};
pub use pool::{DbClient, DbConfig};
pub use repository::{from_row, LoadRelation, Relation, Repository, RowConverter, TableTemplates};
pub use stats::StatsSnapshot;
pub use transaction::TxHandle;

// Pure types callers need alongside the repository API
pub use breeze_core::{AccessMode, DeferrableMode, Entity, IsolationLevel, TxOptions};

/// The statement builder, for predicates and update statements.
pub use sea_query;
