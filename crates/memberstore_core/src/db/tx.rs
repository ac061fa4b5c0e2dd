//! Thread-bound transactions over a [`DataSource`].
//!
//! # Responsibility
//! - Start a transaction on one pooled connection and publish that connection
//!   as the ambient connection for the current thread and data source.
//! - Commit or roll back, then unbind and return the connection to the pool.
//!
//! # Invariants
//! - At most one transaction per thread per data source.
//! - An unfinished scope rolls back on drop.
//! - The pooled connection goes back to the pool only after the scope ends
//!   and every transactional lease has been released.

use super::datasource::{DataSource, PooledSqlite};
use super::{DbError, DbResult};
use log::{error, info, warn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

thread_local! {
    static BOUND_CONNECTIONS: RefCell<HashMap<u64, Rc<PooledSqlite>>> =
        RefCell::new(HashMap::new());
}

/// Returns the connection bound to the current thread for `data_source_id`.
pub(crate) fn bound_connection(data_source_id: u64) -> Option<Rc<PooledSqlite>> {
    BOUND_CONNECTIONS.with(|bound| bound.borrow().get(&data_source_id).cloned())
}

/// Starts transactions on a shared [`DataSource`].
#[derive(Clone)]
pub struct TransactionManager {
    data_source: DataSource,
}

impl TransactionManager {
    pub fn new(data_source: DataSource) -> Self {
        Self { data_source }
    }

    /// Returns whether the current thread has an open transaction on this
    /// manager's data source.
    pub fn is_active(&self) -> bool {
        bound_connection(self.data_source.id()).is_some()
    }

    /// Begins an immediate transaction and binds its connection to this thread.
    ///
    /// # Errors
    /// - `DbError::TransactionAlreadyActive` when a scope is already open here.
    /// - Pool checkout or `BEGIN` failures.
    pub fn begin(&self) -> DbResult<TransactionScope> {
        let data_source_id = self.data_source.id();
        if self.is_active() {
            return Err(DbError::TransactionAlreadyActive);
        }

        let conn = self.data_source.checkout()?;
        conn.execute_batch("BEGIN IMMEDIATE;")?;
        let conn = Rc::new(conn);
        BOUND_CONNECTIONS.with(|bound| {
            bound
                .borrow_mut()
                .insert(data_source_id, Rc::clone(&conn));
        });

        info!("event=tx_begin module=tx status=ok data_source={data_source_id}");
        Ok(TransactionScope {
            data_source_id,
            conn,
            finished: false,
        })
    }
}

/// An open transaction. Not `Send`: it lives on the thread that began it.
pub struct TransactionScope {
    data_source_id: u64,
    conn: Rc<PooledSqlite>,
    finished: bool,
}

impl TransactionScope {
    /// Commits. A failed commit is rolled back before the error is returned.
    pub fn commit(mut self) -> DbResult<()> {
        self.finished = true;
        match self.conn.execute_batch("COMMIT;") {
            Ok(()) => {
                info!(
                    "event=tx_commit module=tx status=ok data_source={}",
                    self.data_source_id
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=tx_commit module=tx status=error data_source={} error={}",
                    self.data_source_id, err
                );
                self.rollback_quietly();
                Err(err.into())
            }
        }
    }

    /// Rolls back explicitly.
    ///
    /// On failure the scope stays unfinished, so dropping it retries the
    /// rollback before the binding is removed.
    pub fn rollback(mut self) -> DbResult<()> {
        self.conn.execute_batch("ROLLBACK;")?;
        self.finished = true;
        info!(
            "event=tx_rollback module=tx status=ok data_source={}",
            self.data_source_id
        );
        Ok(())
    }

    fn rollback_quietly(&self) {
        if let Err(err) = self.conn.execute_batch("ROLLBACK;") {
            warn!(
                "event=tx_rollback module=tx status=error data_source={} error={}",
                self.data_source_id, err
            );
        }
        if !self.conn.is_autocommit() {
            // The pool resets it on the next checkout.
            error!(
                "event=tx_rollback module=tx status=error data_source={} reason=still_open",
                self.data_source_id
            );
        }
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if !self.finished {
            info!(
                "event=tx_rollback module=tx status=start data_source={} reason=scope_dropped",
                self.data_source_id
            );
            self.rollback_quietly();
        }

        let data_source_id = self.data_source_id;
        let _ = BOUND_CONNECTIONS.try_with(|bound| {
            bound.borrow_mut().remove(&data_source_id);
        });
    }
}
