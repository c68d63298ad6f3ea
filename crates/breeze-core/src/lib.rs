//! # breeze-core: Pure Types for breeze-data
//!
//! Everything the data-access layer needs that does not touch a database.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        breeze-data Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  Application code                               │   │
//! │  │    client.run_transaction(...)  repo.get_by_id(...)             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    breeze-db (Database Layer)                   │   │
//! │  │        DbClient, DbContext, Repository<T>, Relation<P, C>       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ breeze-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌────────────┐  ┌────────────┐                │   │
//! │  │   │  options  │  │   entity   │  │ validation │                │   │
//! │  │   │ TxOptions │  │   Entity   │  │ identifier │                │   │
//! │  │   │ BEGIN sql │  │ParentIndex │  │   checks   │                │   │
//! │  │   └───────────┘  └────────────┘  └────────────┘                │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`options`] - Transaction options and their SQLite rendering
//! - [`entity`] - The `Entity` trait and parent/child attachment
//! - [`validation`] - SQL identifier validation
//! - [`error`] - Core error types

// =============================================================================
// Module Declarations
// =============================================================================

pub mod entity;
pub mod error;
pub mod options;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use entity::{attach_children, AttachStats, Entity, ParentIndex};
pub use error::{CoreError, CoreResult, ValidationError};
pub use options::{AccessMode, DeferrableMode, IsolationLevel, TxOptions};
pub use validation::{validate_identifier, validate_identifiers};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Primary-key column assumed when a table does not configure its own.
pub const DEFAULT_ID_COLUMN: &str = "id";
