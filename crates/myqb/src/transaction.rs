//! Transaction scoping.
//!
//! [`crate::Db::begin`] is idempotent and `commit`/`rollback` are plain
//! delegations; the [`action!`] macro is the recommended scoped idiom. It
//! guarantees commit-or-rollback on every exit path of the block, including
//! early `?` returns.
//!
//! # Example
//!
//! ```ignore
//! use myqb::{action, QbResult, Value};
//!
//! # async fn demo(db: &mut myqb::Db<impl myqb::Driver>) -> QbResult<()> {
//! myqb::action!(db, {
//!     db.table("account")?
//!         .where_("id", 1)?
//!         .update([("balance", Value::from(90))])
//!         .await?;
//!     db.table("account")?
//!         .where_("id", 2)?
//!         .update([("balance", Value::from(110))])
//!         .await?;
//!     Ok(())
//! })?;
//! # Ok(()) }
//! ```

use crate::error::QbError;

/// Runs the given block inside a database transaction.
///
/// - Begins a transaction via `$db.begin().await` (a no-op when one is
///   already open).
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)` and returns the original error; a rollback
///   failure is reported alongside it.
///
/// The block must evaluate to `myqb::QbResult<T>`.
#[macro_export]
macro_rules! action {
    ($db:expr, $body:block) => {{
        $db.begin().await?;

        let __myqb_action_result: $crate::QbResult<_> = async { $body }.await;
        match __myqb_action_result {
            Ok(value) => {
                $db.commit().await?;
                Ok(value)
            }
            Err(error) => match $db.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::transaction::rollback_failure(error, rollback_err)),
            },
        }
    }};
}

/// Combine a statement error with the rollback error that followed it.
///
/// This is a helper used by the [`action!`] macro. Not intended for direct
/// use.
#[doc(hidden)]
pub fn rollback_failure(original: QbError, rollback: QbError) -> QbError {
    tracing::warn!(error = %rollback, "rollback failed after transaction error");
    QbError::execution(format!("{original} (rollback failed: {rollback})"))
}
