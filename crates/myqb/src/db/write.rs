//! Mutation terminals: INSERT (single, bulk, upsert), UPDATE, DELETE.

use super::{Db, Fetched};
use crate::driver::Driver;
use crate::error::QbResult;
use crate::stmt::{self, Upsert};
use crate::value::Value;

/// Result of an INSERT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Rows were written; carries the generated auto-increment id
    /// (`0` when the table has none).
    Inserted(u64),
    /// The statement affected no rows (e.g. an upsert that matched an
    /// identical row).
    Unchanged,
}

impl InsertOutcome {
    /// The generated id, when rows were written.
    pub fn id(self) -> Option<u64> {
        match self {
            InsertOutcome::Inserted(id) => Some(id),
            InsertOutcome::Unchanged => None,
        }
    }
}

impl<D: Driver> Db<D> {
    /// Insert a single row.
    pub async fn insert_one<S, I>(
        &mut self,
        row: I,
        upsert: Upsert,
    ) -> QbResult<Fetched<InsertOutcome>>
    where
        S: Into<String>,
        I: IntoIterator<Item = (S, Value)> + Send,
    {
        let row: Vec<(String, Value)> = row
            .into_iter()
            .map(|(key, value)| (key.into(), value))
            .collect();
        self.insert(vec![row], upsert).await
    }

    /// Insert one or more rows, optionally with an
    /// `ON DUPLICATE KEY UPDATE` clause.
    ///
    /// All rows must share exactly the same key set (order-independent).
    pub async fn insert(
        &mut self,
        rows: Vec<Vec<(String, Value)>>,
        upsert: Upsert,
    ) -> QbResult<Fetched<InsertOutcome>> {
        let opts = std::mem::take(&mut self.options).finalize()?;
        let sql = stmt::insert(
            &opts,
            &rows,
            &upsert,
            self.config.dbname.as_deref(),
            self.escape,
        )?;

        Ok(self.run_exec(sql).await?.map(|outcome| {
            if outcome.rows_affected == 0 {
                InsertOutcome::Unchanged
            } else {
                InsertOutcome::Inserted(outcome.last_insert_id)
            }
        }))
    }

    /// Update matching rows. Returns the affected-row count.
    pub async fn update<S, I>(&mut self, data: I) -> QbResult<Fetched<u64>>
    where
        S: Into<String>,
        I: IntoIterator<Item = (S, Value)> + Send,
    {
        let data: Vec<(String, Value)> = data
            .into_iter()
            .map(|(key, value)| (key.into(), value))
            .collect();

        let opts = std::mem::take(&mut self.options).finalize()?;
        let sql = stmt::update(&opts, &data, self.config.dbname.as_deref(), self.escape)?;

        Ok(self
            .run_exec(sql)
            .await?
            .map(|outcome| outcome.rows_affected))
    }

    /// Delete matching rows. Returns the affected-row count.
    pub async fn delete(&mut self) -> QbResult<Fetched<u64>> {
        let opts = std::mem::take(&mut self.options).finalize()?;
        let sql = stmt::delete(&opts, self.config.dbname.as_deref(), self.escape)?;

        Ok(self
            .run_exec(sql)
            .await?
            .map(|outcome| outcome.rows_affected))
    }
}
