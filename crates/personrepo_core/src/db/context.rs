//! Explicit execution context handed to every storage call.
//!
//! # Invariants
//! - A context borrows exactly one connection.
//! - A context is either outside any transaction or bound to the outermost
//!   transaction started on that connection.

use rusqlite::Connection;
use std::cell::Cell;
use uuid::Uuid;

/// Access mode requested for a transactional scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    ReadWrite,
    ReadOnly,
}

impl TxMode {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::ReadWrite => "read_write",
            Self::ReadOnly => "read_only",
        }
    }
}

#[derive(Debug)]
pub(crate) struct TxState {
    id: Uuid,
    mode: TxMode,
    rollback_only: Cell<bool>,
}

impl TxState {
    pub(crate) fn new(mode: TxMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            rollback_only: Cell::new(false),
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn mode(&self) -> TxMode {
        self.mode
    }

    pub(crate) fn mark_rollback_only(&self) {
        self.rollback_only.set(true);
    }

    pub(crate) fn is_rollback_only(&self) -> bool {
        self.rollback_only.get()
    }
}

/// Connection plus the transaction it is currently running in, if any.
///
/// Outside a transaction every statement runs in SQLite autocommit mode.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionContext<'a> {
    conn: &'a Connection,
    tx: Option<&'a TxState>,
}

impl<'a> ExecutionContext<'a> {
    /// Creates a non-transactional context over `conn`.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn, tx: None }
    }

    pub(crate) fn with_transaction(conn: &'a Connection, tx: &'a TxState) -> Self {
        Self { conn, tx: Some(tx) }
    }

    pub fn conn(&self) -> &'a Connection {
        self.conn
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    pub fn transaction_id(&self) -> Option<Uuid> {
        self.tx.map(TxState::id)
    }

    pub fn mode(&self) -> Option<TxMode> {
        self.tx.map(TxState::mode)
    }

    pub fn is_read_only(&self) -> bool {
        self.mode() == Some(TxMode::ReadOnly)
    }

    /// Returns whether the active transaction can still commit.
    pub fn is_rollback_only(&self) -> bool {
        self.tx.is_some_and(TxState::is_rollback_only)
    }

    pub(crate) fn tx_state(&self) -> Option<&'a TxState> {
        self.tx
    }
}
