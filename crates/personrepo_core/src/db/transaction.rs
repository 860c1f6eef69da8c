//! Transactional scopes with join propagation.
//!
//! # Invariants
//! - Only the outermost scope begins, commits or rolls back.
//! - A failing joined scope marks the outer transaction rollback-only.
//! - A rollback-only transaction never commits.

use super::context::{ExecutionContext, TxMode, TxState};
use super::DbError;
use log::{debug, warn};
use rusqlite::{Transaction, TransactionBehavior};

/// Runs `work` inside a transaction on `ctx`'s connection.
///
/// When `ctx` is already transactional the scope joins it; a read-only
/// transaction cannot be joined by a read-write scope. Otherwise a new
/// transaction is started, committed when `work` succeeds and rolled back
/// when it fails.
///
/// # Errors
/// - Any error returned by `work`, after rollback of an owned transaction.
/// - [`DbError::RollbackOnly`] when `work` succeeded but a joined scope failed.
/// - [`DbError::ReadOnlyTransaction`] when a read-write scope joins a read-only one.
/// - [`DbError::Sqlite`] when begin, commit or rollback fail.
pub fn run_in_transaction<T, E, F>(
    ctx: &ExecutionContext<'_>,
    mode: TxMode,
    work: F,
) -> Result<T, E>
where
    F: FnOnce(&ExecutionContext<'_>) -> Result<T, E>,
    E: From<DbError>,
{
    if let Some(state) = ctx.tx_state() {
        if state.mode() == TxMode::ReadOnly && mode == TxMode::ReadWrite {
            return Err(DbError::ReadOnlyTransaction { tx_id: state.id() }.into());
        }
        debug!(
            "event=tx_join module=db tx_id={} mode={}",
            state.id(),
            state.mode().label()
        );
        let result = work(ctx);
        if result.is_err() {
            state.mark_rollback_only();
            debug!("event=tx_mark_rollback_only module=db tx_id={}", state.id());
        }
        return result;
    }

    let behavior = match mode {
        TxMode::ReadWrite => TransactionBehavior::Immediate,
        TxMode::ReadOnly => TransactionBehavior::Deferred,
    };
    let tx = Transaction::new_unchecked(ctx.conn(), behavior).map_err(DbError::from)?;
    let state = TxState::new(mode);
    debug!(
        "event=tx_begin module=db tx_id={} mode={}",
        state.id(),
        mode.label()
    );

    let inner = ExecutionContext::with_transaction(ctx.conn(), &state);
    match work(&inner) {
        Ok(_) if state.is_rollback_only() => {
            tx.rollback().map_err(DbError::from)?;
            warn!(
                "event=tx_rollback module=db status=rollback_only tx_id={}",
                state.id()
            );
            Err(DbError::RollbackOnly { tx_id: state.id() }.into())
        }
        Ok(value) => {
            tx.commit().map_err(DbError::from)?;
            debug!("event=tx_commit module=db status=ok tx_id={}", state.id());
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback() {
                warn!(
                    "event=tx_rollback module=db status=error tx_id={} error={}",
                    state.id(),
                    rollback_err
                );
            } else {
                debug!("event=tx_rollback module=db status=ok tx_id={}", state.id());
            }
            Err(err)
        }
    }
}
