//! Transaction management utilities for repositories.
//!
//! Repository operations take an `Option<&mut PgConnection>`: `Some` means "run
//! inside the caller's transaction", `None` means "run as a single autocommitted
//! statement". [`TransactionRunner`] is the one place that turns "maybe a
//! transaction" into "definitely a transaction".

use std::{future::Future, pin::Pin};

use crate::error::AppError;
use sqlx::postgres::PgTransaction;
use sqlx::{PgConnection, PgPool};

/// Future returned by a transaction body. It borrows the connection for `'c`.
pub type TxFuture<'c, T> = Pin<Box<dyn Future<Output = Result<T, AppError>> + Send + 'c>>;

/// Begin a new database transaction.
///
/// Returns a transaction handle that can be used for multiple database operations.
/// On success, the transaction can be committed via [`commit_transaction`].
/// On failure, the transaction can be rolled back via [`rollback_transaction`].
pub async fn begin_transaction(db: &PgPool) -> Result<PgTransaction<'static>, AppError> {
    db.begin()
        .await
        .map_err(|e| AppError::InternalServerError(e.into()))
}

/// Commit a transaction.
pub async fn commit_transaction(tx: PgTransaction<'_>) -> Result<(), AppError> {
    tx.commit()
        .await
        .map_err(|e| AppError::InternalServerError(e.into()))
}

/// Rollback a transaction.
pub async fn rollback_transaction(tx: PgTransaction<'_>) -> Result<(), AppError> {
    tx.rollback()
        .await
        .map_err(|e| AppError::InternalServerError(e.into()))
}

#[derive(Debug, Clone)]
pub struct TransactionRunner {
    pool: PgPool,
}

impl TransactionRunner {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs `body` in a fresh transaction.
    ///
    /// Commits when `body` returns `Ok`, rolls back and returns the body's error
    /// otherwise. A failed rollback is logged; the body's error still wins.
    pub async fn run<T, F>(&self, body: F) -> Result<T, AppError>
    where
        F: for<'c> FnOnce(&'c mut PgConnection) -> TxFuture<'c, T> + Send,
        T: Send,
    {
        let mut tx = begin_transaction(&self.pool).await?;
        match body(&mut *tx).await {
            Ok(value) => {
                commit_transaction(tx).await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = rollback_transaction(tx).await {
                    tracing::warn!(error = %rollback_err, "transaction rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Runs `body` inside `existing` when the caller already holds a transaction,
    /// without opening a nested one. Falls back to [`TransactionRunner::run`].
    ///
    /// Commit and rollback of `existing` stay with its owner.
    pub async fn continue_or_start_new<T, F>(
        &self,
        existing: Option<&mut PgConnection>,
        body: F,
    ) -> Result<T, AppError>
    where
        F: for<'c> FnOnce(&'c mut PgConnection) -> TxFuture<'c, T> + Send,
        T: Send,
    {
        match existing {
            Some(conn) => body(conn).await,
            None => self.run(body).await,
        }
    }
}
