//! # Transaction Options
//!
//! The knobs a caller passes to `run_transaction`, and how they are rendered
//! into SQLite statements.
//!
//! ## Option Types
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         TxOptions                                       │
//! │                                                                         │
//! │  ┌──────────────────┐  ┌──────────────────┐  ┌──────────────────┐      │
//! │  │ IsolationLevel   │  │   AccessMode     │  │ DeferrableMode   │      │
//! │  │ ──────────────── │  │ ──────────────── │  │ ──────────────── │      │
//! │  │ Serializable     │  │ ReadWrite        │  │ Deferrable       │      │
//! │  │ RepeatableRead   │  │ ReadOnly         │  │ NotDeferrable    │      │
//! │  │ ReadCommitted    │  └──────────────────┘  └──────────────────┘      │
//! │  │ ReadUncommitted  │                                                   │
//! │  └──────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## SQLite Rendering
//! SQLite has no `SET TRANSACTION`. The options map onto the lock mode of
//! `BEGIN` plus connection pragmas:
//!
//! | Option                         | SQL                               |
//! |--------------------------------|-----------------------------------|
//! | Serializable                   | `BEGIN EXCLUSIVE`                 |
//! | RepeatableRead                 | `BEGIN IMMEDIATE`                 |
//! | ReadCommitted                  | `BEGIN DEFERRED`                  |
//! | ReadUncommitted                | `BEGIN DEFERRED` + `read_uncommitted` pragma |
//! | Deferrable (any isolation)     | `BEGIN DEFERRED`                  |
//! | ReadOnly (any isolation)       | `BEGIN DEFERRED` + `query_only` pragma |
//!
//! A read-only transaction never takes the write lock: SQLite rejects
//! `BEGIN IMMEDIATE` and `BEGIN EXCLUSIVE` while `query_only` is on. The
//! deferred transaction still reads from one snapshot until it closes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// =============================================================================
// Isolation Level
// =============================================================================

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IsolationLevel {
    #[serde(rename = "serializable")]
    Serializable,
    #[serde(rename = "repeatable read")]
    RepeatableRead,
    #[default]
    #[serde(rename = "read committed")]
    ReadCommitted,
    #[serde(rename = "read uncommitted")]
    ReadUncommitted,
}

impl IsolationLevel {
    /// SQL text of the level, e.g. `"repeatable read"`.
    pub const fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::Serializable => "serializable",
            IsolationLevel::RepeatableRead => "repeatable read",
            IsolationLevel::ReadCommitted => "read committed",
            IsolationLevel::ReadUncommitted => "read uncommitted",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for IsolationLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "serializable" => Ok(IsolationLevel::Serializable),
            "repeatable read" => Ok(IsolationLevel::RepeatableRead),
            "read committed" => Ok(IsolationLevel::ReadCommitted),
            "read uncommitted" => Ok(IsolationLevel::ReadUncommitted),
            _ => Err(CoreError::UnknownIsolationLevel(s.to_string())),
        }
    }
}

// =============================================================================
// Access Mode
// =============================================================================

/// Transaction access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AccessMode {
    #[default]
    #[serde(rename = "read write")]
    ReadWrite,
    #[serde(rename = "read only")]
    ReadOnly,
}

impl AccessMode {
    pub const fn as_sql(&self) -> &'static str {
        match self {
            AccessMode::ReadWrite => "read write",
            AccessMode::ReadOnly => "read only",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for AccessMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "read write" => Ok(AccessMode::ReadWrite),
            "read only" => Ok(AccessMode::ReadOnly),
            _ => Err(CoreError::UnknownAccessMode(s.to_string())),
        }
    }
}

// =============================================================================
// Deferrable Mode
// =============================================================================

/// Whether lock acquisition may be deferred until first use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeferrableMode {
    #[serde(rename = "deferrable")]
    Deferrable,
    #[default]
    #[serde(rename = "not deferrable")]
    NotDeferrable,
}

impl DeferrableMode {
    pub const fn as_sql(&self) -> &'static str {
        match self {
            DeferrableMode::Deferrable => "deferrable",
            DeferrableMode::NotDeferrable => "not deferrable",
        }
    }
}

impl fmt::Display for DeferrableMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for DeferrableMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "deferrable" => Ok(DeferrableMode::Deferrable),
            "not deferrable" => Ok(DeferrableMode::NotDeferrable),
            _ => Err(CoreError::UnknownDeferrableMode(s.to_string())),
        }
    }
}

/// Lowercases and collapses `_`, `-` and repeated whitespace into one space,
/// so `"READ_ONLY"` and `"read  only"` both parse.
fn normalize(s: &str) -> String {
    s.trim()
        .to_ascii_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// TxOptions
// =============================================================================

/// Options for one transaction.
///
/// ## Example
/// ```rust
/// use breeze_core::{AccessMode, IsolationLevel, TxOptions};
///
/// let opts = TxOptions::serializable().access_mode(AccessMode::ReadOnly);
/// assert_eq!(opts.isolation, IsolationLevel::Serializable);
/// assert_eq!(opts.begin_statement(), "BEGIN DEFERRED");
/// assert_eq!(TxOptions::serializable().begin_statement(), "BEGIN EXCLUSIVE");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TxOptions {
    pub isolation: IsolationLevel,
    pub access_mode: AccessMode,
    pub deferrable: DeferrableMode,
}

impl TxOptions {
    /// Read committed, read write, not deferrable.
    pub fn read_committed() -> Self {
        TxOptions::default()
    }

    /// Serializable, read write, not deferrable.
    pub fn serializable() -> Self {
        TxOptions::default().isolation(IsolationLevel::Serializable)
    }

    /// Read committed, read only.
    pub fn read_only() -> Self {
        TxOptions::default().access_mode(AccessMode::ReadOnly)
    }

    pub fn isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn access_mode(mut self, access_mode: AccessMode) -> Self {
        self.access_mode = access_mode;
        self
    }

    pub fn deferrable(mut self, deferrable: DeferrableMode) -> Self {
        self.deferrable = deferrable;
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.access_mode == AccessMode::ReadOnly
    }

    /// The `BEGIN` statement that opens a transaction with these options.
    pub fn begin_statement(&self) -> &'static str {
        if self.deferrable == DeferrableMode::Deferrable || self.is_read_only() {
            return "BEGIN DEFERRED";
        }
        match self.isolation {
            IsolationLevel::Serializable => "BEGIN EXCLUSIVE",
            IsolationLevel::RepeatableRead => "BEGIN IMMEDIATE",
            IsolationLevel::ReadCommitted | IsolationLevel::ReadUncommitted => "BEGIN DEFERRED",
        }
    }

    /// Pragmas to run on the connection before `BEGIN`.
    pub fn setup_pragmas(&self) -> Vec<&'static str> {
        let mut pragmas = Vec::new();
        if self.isolation == IsolationLevel::ReadUncommitted {
            pragmas.push("PRAGMA read_uncommitted = ON");
        }
        if self.is_read_only() {
            pragmas.push("PRAGMA query_only = ON");
        }
        pragmas
    }

    /// Pragmas that undo [`setup_pragmas`](Self::setup_pragmas) once the
    /// transaction is closed. The connection goes back to a shared pool, so
    /// it must leave in its default state.
    pub fn reset_pragmas(&self) -> Vec<&'static str> {
        let mut pragmas = Vec::new();
        if self.isolation == IsolationLevel::ReadUncommitted {
            pragmas.push("PRAGMA read_uncommitted = OFF");
        }
        if self.is_read_only() {
            pragmas.push("PRAGMA query_only = OFF");
        }
        pragmas
    }
}

impl fmt::Display for TxOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "isolation level {}, {}, {}",
            self.isolation, self.access_mode, self.deferrable
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
