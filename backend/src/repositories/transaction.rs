//! Transaction helpers shared by the Postgres stores.

use sqlx::postgres::PgTransaction;
use sqlx::PgPool;

/// Begin a new database transaction.
pub async fn begin_transaction(db: &PgPool) -> Result<PgTransaction<'static>, sqlx::Error> {
    db.begin().await
}

/// Close a transaction according to the outcome of the work done inside it.
///
/// `Ok` commits; any error rolls back and is returned unchanged. A failed
/// rollback is only logged, the original error is what the caller sees.
pub async fn finish_transaction<T, E>(
    tx: PgTransaction<'static>,
    outcome: Result<T, E>,
) -> Result<T, E>
where
    E: From<sqlx::Error>,
{
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "Failed to roll back transaction");
            }
            Err(err)
        }
    }
}
