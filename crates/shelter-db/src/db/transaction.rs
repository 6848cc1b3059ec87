//! Database transaction utilities
//!
//! Multi-step writes (profile picture changes, guarded deletes, document
//! replacement) run inside a [`TransactionGuard`].

use std::ops::{Deref, DerefMut};

use shelter_core::AppError;
use sqlx::{PgPool, Postgres, Transaction};

/// A database transaction that must be finished explicitly.
///
/// If the guard is dropped without `commit` or `rollback`, sqlx rolls the
/// transaction back when the connection returns to the pool.
///
/// # Example
///
/// ```ignore
/// use shelter_db::TransactionGuard;
///
/// async fn example(pool: &sqlx::PgPool) -> Result<(), shelter_core::AppError> {
///     let mut tx = TransactionGuard::begin(pool).await?;
///     sqlx::query("UPDATE animals SET name = 'Rex'").execute(&mut **tx).await?;
///     tx.commit().await
/// }
/// ```
pub struct TransactionGuard<'a> {
    transaction: Transaction<'a, Postgres>,
}

impl<'a> TransactionGuard<'a> {
    /// Begin a new database transaction
    pub async fn begin(pool: &'a PgPool) -> Result<Self, AppError> {
        let transaction = pool.begin().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to begin database transaction");
            AppError::Database(e)
        })?;
        Ok(Self { transaction })
    }

    pub async fn commit(self) -> Result<(), AppError> {
        self.transaction.commit().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to commit database transaction");
            AppError::Database(e)
        })
    }

    pub async fn rollback(self) -> Result<(), AppError> {
        self.transaction.rollback().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to roll back database transaction");
            AppError::Database(e)
        })
    }

    /// Commit when `result` is `Ok`, roll back otherwise, and pass `result` on.
    ///
    /// A failed rollback is logged; the original error is what the caller sees.
    pub async fn finish<T>(self, result: Result<T, AppError>) -> Result<T, AppError> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback().await {
                    tracing::warn!(
                        error = %rollback_err,
                        original_error = %err,
                        "Rollback failed after error"
                    );
                }
                Err(err)
            }
        }
    }
}

impl<'a> Deref for TransactionGuard<'a> {
    type Target = Transaction<'a, Postgres>;

    fn deref(&self) -> &Self::Target {
        &self.transaction
    }
}

impl<'a> DerefMut for TransactionGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.transaction
    }
}
