//! The fluent statement builder.
//!
//! [`Db`] owns one driver connection plus the state of the statement being
//! configured. Chained setters accumulate options; a terminal call compiles
//! them into SQL, executes, and resets the builder for the next statement:
//!
//! ```ignore
//! use myqb::{Db, Dir, QbResult};
//!
//! # async fn demo(db: &mut Db<impl myqb::Driver>) -> QbResult<()> {
//! let rows = db
//!     .table("user")?
//!     .fields(["user_id", "username"])
//!     .where_("user_id|>=", 20)?
//!     .order("user_id", Dir::Asc)
//!     .limit(10)
//!     .get_list()
//!     .await?
//!     .data()?;
//! # Ok(()) }
//! ```
//!
//! Setters that can reject their argument return `QbResult<&mut Self>`, so
//! malformed configuration fails at the call site, not at execution.

mod exec;
mod write;


pub use exec::FieldInfo;
pub use write::InsertOutcome;

use crate::condition::Cond;
use crate::config::DbConfig;
use crate::driver::Driver;
use crate::error::{QbError, QbResult};
use crate::ident::quote_key;
use crate::log::QueryLog;
use crate::options::{
    Dir, FieldExpr, FieldSpec, Join, JoinKind, JoinOn, Limit, OrderSpec, StatementOptions,
    TableRef,
};
use crate::row::Row;
use crate::stmt;
use crate::value::Value;
use exec::BindData;
use std::collections::HashMap;

/// Result of a terminal operation: executed data, or the rendered SQL when
/// statement-only mode ([`Db::fetch_sql`]) is active.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    /// Executed result.
    Data(T),
    /// Rendered SQL with bind values substituted as literals.
    Sql(String),
}

impl<T> Fetched<T> {
    /// Unwrap the executed data; errors when the terminal ran in
    /// statement-only mode.
    pub fn data(self) -> QbResult<T> {
        match self {
            Fetched::Data(data) => Ok(data),
            Fetched::Sql(_) => Err(QbError::execution(
                "Statement-only mode returned SQL instead of data",
            )),
        }
    }

    /// The rendered SQL, if the terminal ran in statement-only mode.
    pub fn sql(self) -> Option<String> {
        match self {
            Fetched::Sql(sql) => Some(sql),
            Fetched::Data(_) => None,
        }
    }

    /// Whether this is rendered SQL.
    pub fn is_sql(&self) -> bool {
        matches!(self, Fetched::Sql(_))
    }

    fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        match self {
            Fetched::Data(data) => Fetched::Data(f(data)),
            Fetched::Sql(sql) => Fetched::Sql(sql),
        }
    }
}

/// How [`Db::get_indexed`] keys its result rows.
enum IndexKey {
    Column(String),
    Keyed(Box<dyn Fn(&Row) -> Option<String> + Send + Sync>),
}

/// A fluent statement builder and executor over one driver connection.
pub struct Db<D: Driver> {
    driver: D,
    config: DbConfig,
    options: StatementOptions,
    bind_data: BindData,
    escape: bool,
    fetch_sql: bool,
    index_by: Option<IndexKey>,
    in_transaction: bool,
    last_insert_id: u64,
    query_log: QueryLog,
}

impl<D: Driver> std::fmt::Debug for Db<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db").finish_non_exhaustive()
    }
}

impl<D: Driver> Db<D> {
    /// Create a builder over an already connected driver.
    pub fn new(driver: D, config: DbConfig) -> Self {
        let query_log = QueryLog::new(config.log_mode, config.log_max);
        Self {
            driver,
            config,
            options: StatementOptions::default(),
            bind_data: BindData::Empty,
            escape: true,
            fetch_sql: false,
            index_by: None,
            in_transaction: false,
            last_insert_id: 0,
            query_log,
        }
    }

    /// The connection configuration.
    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Switch the database used to qualify dot-named tables.
    pub fn set_dbname(&mut self, dbname: impl Into<String>) -> &mut Self {
        self.config.dbname = Some(dbname.into());
        self
    }

    /// The underlying driver connection.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Mutable access to the underlying driver connection.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Consume the builder, returning the driver connection.
    pub fn into_driver(self) -> D {
        self.driver
    }

    // ==================== Configuration ====================

    /// Set the statement's table.
    pub fn table(&mut self, name: &str) -> QbResult<&mut Self> {
        self.options.table = Some(TableRef::new(name, None)?);
        Ok(self)
    }

    /// Set the statement's table with an alias.
    ///
    /// An alias that is not a plain word is silently dropped.
    pub fn table_as(&mut self, name: &str, alias: &str) -> QbResult<&mut Self> {
        self.options.table = Some(TableRef::new(name, Some(alias))?);
        Ok(self)
    }

    /// Add a join.
    pub fn join(
        &mut self,
        table: &str,
        on: impl Into<JoinOn>,
        kind: JoinKind,
    ) -> QbResult<&mut Self> {
        self.join_entry(table, None, on, kind)
    }

    /// Add a join with a table alias.
    pub fn join_as(
        &mut self,
        table: &str,
        alias: &str,
        on: impl Into<JoinOn>,
        kind: JoinKind,
    ) -> QbResult<&mut Self> {
        self.join_entry(table, Some(alias), on, kind)
    }

    /// Add a LEFT JOIN.
    pub fn left_join(&mut self, table: &str, on: impl Into<JoinOn>) -> QbResult<&mut Self> {
        self.join(table, on, JoinKind::Left)
    }

    /// Add an INNER JOIN.
    pub fn inner_join(&mut self, table: &str, on: impl Into<JoinOn>) -> QbResult<&mut Self> {
        self.join(table, on, JoinKind::Inner)
    }

    /// Add a RIGHT JOIN.
    pub fn right_join(&mut self, table: &str, on: impl Into<JoinOn>) -> QbResult<&mut Self> {
        self.join(table, on, JoinKind::Right)
    }

    /// Add a FULL JOIN.
    pub fn full_join(&mut self, table: &str, on: impl Into<JoinOn>) -> QbResult<&mut Self> {
        self.join(table, on, JoinKind::Full)
    }

    fn join_entry(
        &mut self,
        table: &str,
        alias: Option<&str>,
        on: impl Into<JoinOn>,
        kind: JoinKind,
    ) -> QbResult<&mut Self> {
        let on = on.into();
        if on.is_empty() {
            return Err(QbError::config("Empty join condition"));
        }
        self.options.joins.push(Join {
            table: TableRef::new(table, alias)?,
            kind,
            on,
        });
        Ok(self)
    }

    /// Set the select list from a single fragment.
    ///
    /// Fragments containing `(`, `)`, ` AS `, or `=` are emitted raw;
    /// anything else goes through identifier quoting.
    pub fn field(&mut self, expr: &str) -> &mut Self {
        self.options.fields = FieldSpec::Raw(expr.trim().to_string());
        self
    }

    /// Add select-list columns. Extends columns added earlier.
    pub fn fields<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = columns.into_iter().map(|col| FieldExpr {
            expr: col.into(),
            alias: None,
        });
        match &mut self.options.fields {
            FieldSpec::List(list) => list.extend(items),
            _ => self.options.fields = FieldSpec::List(items.collect()),
        }
        self
    }

    /// Add one select-list expression with an output alias.
    pub fn field_as(&mut self, expr: &str, alias: &str) -> &mut Self {
        let item = FieldExpr {
            expr: expr.to_string(),
            alias: Some(alias.to_string()),
        };
        match &mut self.options.fields {
            FieldSpec::List(list) => list.push(item),
            _ => self.options.fields = FieldSpec::List(vec![item]),
        }
        self
    }

    /// Add a condition from a `"field|operator"` key and a value.
    pub fn where_(&mut self, key: &str, value: impl Into<Value>) -> QbResult<&mut Self> {
        self.options.conds.push(Cond::pair(key, value)?);
        Ok(self)
    }

    /// Add a raw SQL condition.
    pub fn where_raw(&mut self, sql: impl Into<String>) -> &mut Self {
        self.options.conds.push(Cond::raw(sql));
        self
    }

    /// Add a prebuilt condition tree (nested AND/OR groups).
    pub fn where_cond(&mut self, cond: Cond) -> &mut Self {
        self.options.conds.push(cond);
        self
    }

    /// Add an ORDER BY column.
    pub fn order(&mut self, column: &str, dir: Dir) -> &mut Self {
        self.options
            .order
            .get_or_insert_with(|| OrderSpec::Items(Vec::new()))
            .push(column.to_string(), Some(dir));
        self
    }

    /// Replace the ORDER BY contents with a raw fragment.
    pub fn order_raw(&mut self, fragment: impl Into<String>) -> &mut Self {
        self.options.order = Some(OrderSpec::Raw(fragment.into()));
        self
    }

    /// Add a GROUP BY column.
    pub fn group(&mut self, column: &str) -> &mut Self {
        self.options
            .group
            .get_or_insert_with(|| OrderSpec::Items(Vec::new()))
            .push(column.to_string(), None);
        self
    }

    /// Add a GROUP BY column with an explicit direction.
    pub fn group_dir(&mut self, column: &str, dir: Dir) -> &mut Self {
        self.options
            .group
            .get_or_insert_with(|| OrderSpec::Items(Vec::new()))
            .push(column.to_string(), Some(dir));
        self
    }

    /// Replace the GROUP BY contents with a raw fragment.
    pub fn group_raw(&mut self, fragment: impl Into<String>) -> &mut Self {
        self.options.group = Some(OrderSpec::Raw(fragment.into()));
        self
    }

    /// Limit the row count.
    pub fn limit(&mut self, count: u64) -> &mut Self {
        self.options.limit = Some(Limit::Count(count));
        self
    }

    /// Limit with an offset.
    pub fn limit_range(&mut self, offset: u64, count: u64) -> &mut Self {
        self.options.limit = Some(Limit::Range(offset, count));
        self
    }

    /// Limit from a raw `"count"` or `"offset, count"` fragment.
    pub fn limit_raw(&mut self, fragment: &str) -> QbResult<&mut Self> {
        self.options.limit = Some(Limit::parse(fragment)?);
        Ok(self)
    }

    /// Select a page of rows. Transformed into a limit at compile time
    /// (offset = size × (page − 1)).
    pub fn page(&mut self, page: u64, size: u64) -> &mut Self {
        self.options.page = Some((page, size));
        self
    }

    /// Toggle `SELECT DISTINCT`.
    pub fn distinct(&mut self, distinct: bool) -> &mut Self {
        self.options.distinct = distinct;
        self
    }

    /// Toggle identifier escaping for the in-flight statement.
    ///
    /// Resets to on after every execution.
    pub fn escape(&mut self, escape: bool) -> &mut Self {
        self.escape = escape;
        self
    }

    /// Toggle statement-only mode: terminals render and return the SQL
    /// instead of executing it. Resets after the next terminal.
    pub fn fetch_sql(&mut self, fetch: bool) -> &mut Self {
        self.fetch_sql = fetch;
        self
    }

    /// Key [`Db::get_indexed`] results by a column.
    pub fn index_by(&mut self, column: &str) -> QbResult<&mut Self> {
        let column = column.trim();
        if column.is_empty() {
            return Err(QbError::config("Empty index_by column"));
        }
        self.index_by = Some(IndexKey::Column(column.to_string()));
        Ok(self)
    }

    /// Key [`Db::get_indexed`] results with a custom key function.
    ///
    /// Returning `None` for a row is a fatal error at fetch time.
    pub fn index_by_with<F>(&mut self, key: F) -> &mut Self
    where
        F: Fn(&Row) -> Option<String> + Send + Sync + 'static,
    {
        self.index_by = Some(IndexKey::Keyed(Box::new(key)));
        self
    }

    // ==================== Read terminals ====================

    /// Fetch all matching rows.
    pub async fn get_list(&mut self) -> QbResult<Fetched<Vec<Row>>> {
        let sql = self.compile_select()?;
        self.run_query(sql).await
    }

    /// Fetch all matching rows, keyed per [`Db::index_by`] /
    /// [`Db::index_by_with`].
    pub async fn get_indexed(&mut self) -> QbResult<Fetched<HashMap<String, Row>>> {
        let key = self.index_by.take().ok_or_else(|| {
            QbError::config("get_indexed requires index_by or index_by_with")
        })?;

        let rows = match self.get_list().await? {
            Fetched::Sql(sql) => return Ok(Fetched::Sql(sql)),
            Fetched::Data(rows) => rows,
        };

        let mut indexed = HashMap::with_capacity(rows.len());
        for row in rows {
            let index = match &key {
                IndexKey::Column(column) => row
                    .try_get(column)?
                    .to_key_string()
                    .ok_or_else(|| {
                        QbError::execution(format!(
                            "Column {column:?} cannot be used as a row key"
                        ))
                    })?,
                IndexKey::Keyed(f) => f(&row).ok_or_else(|| {
                    QbError::execution("Key function produced no key for a row")
                })?,
            };
            indexed.insert(index, row);
        }

        Ok(Fetched::Data(indexed))
    }

    /// Fetch the first matching row.
    pub async fn get_row(&mut self) -> QbResult<Fetched<Option<Row>>> {
        self.options.limit = Some(Limit::Count(1));
        Ok(self
            .get_list()
            .await?
            .map(|rows| rows.into_iter().next()))
    }

    /// Whether any row matches the current conditions.
    pub async fn has(&mut self) -> QbResult<Fetched<bool>> {
        let opts = std::mem::take(&mut self.options).finalize()?;
        let sql = stmt::exists(&opts, self.config.dbname.as_deref(), self.escape)?;
        Ok(self.run_query(sql).await?.map(|rows| {
            rows.first()
                .and_then(|row| row.value_at(0))
                .and_then(Value::as_i64)
                .is_some_and(|n| n != 0)
        }))
    }

    /// Count matching rows.
    pub async fn count(&mut self) -> QbResult<Fetched<u64>> {
        self.count_field("*").await
    }

    /// Count non-NULL values of a field.
    pub async fn count_field(&mut self, field: &str) -> QbResult<Fetched<u64>> {
        let field = if field == "*" || field.parse::<f64>().is_ok() {
            field.to_string()
        } else {
            quote_key(field, self.escape)?
        };
        let fetched = self
            .value(&format!("COUNT({field}) AS `count_total`"))
            .await?;
        match fetched {
            Fetched::Sql(sql) => Ok(Fetched::Sql(sql)),
            Fetched::Data(None) => Ok(Fetched::Data(0)),
            Fetched::Data(Some(value)) => {
                let count = value
                    .as_u64()
                    .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
                    .ok_or_else(|| {
                        QbError::execution("COUNT did not produce an integer")
                    })?;
                Ok(Fetched::Data(count))
            }
        }
    }

    /// Total of a column.
    pub async fn sum(&mut self, field: &str) -> QbResult<Fetched<Option<Value>>> {
        self.aggregate("SUM", field).await
    }

    /// Maximum of a column.
    pub async fn max(&mut self, field: &str) -> QbResult<Fetched<Option<Value>>> {
        self.aggregate("MAX", field).await
    }

    /// Minimum of a column.
    pub async fn min(&mut self, field: &str) -> QbResult<Fetched<Option<Value>>> {
        self.aggregate("MIN", field).await
    }

    /// Average of a column.
    pub async fn avg(&mut self, field: &str) -> QbResult<Fetched<Option<Value>>> {
        self.aggregate("AVG", field).await
    }

    async fn aggregate(&mut self, func: &str, field: &str) -> QbResult<Fetched<Option<Value>>> {
        let quoted = quote_key(field, self.escape)?;
        let alias = func.to_lowercase();
        self.value(&format!("{func}({quoted}) AS `{alias}_tmp`")).await
    }

    /// Fetch a single scalar: the projected column of the first matching row.
    pub async fn value(&mut self, field: &str) -> QbResult<Fetched<Option<Value>>> {
        self.options.limit = Some(Limit::Count(1));
        Ok(self
            .column(field)
            .await?
            .map(|mut values| if values.is_empty() { None } else { Some(values.remove(0)) }))
    }

    /// Fetch one projected column across all matching rows.
    pub async fn column(&mut self, field: &str) -> QbResult<Fetched<Vec<Value>>> {
        let plain = !field.is_empty()
            && field
                .chars()
                .all(|c| c == '_' || c.is_ascii_alphanumeric());
        self.options.fields = if plain {
            FieldSpec::List(vec![FieldExpr {
                expr: field.to_string(),
                alias: None,
            }])
        } else {
            FieldSpec::Raw(field.to_string())
        };

        let rows = match self.get_list().await? {
            Fetched::Sql(sql) => return Ok(Fetched::Sql(sql)),
            Fetched::Data(rows) => rows,
        };

        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            let value = row
                .value_at(0)
                .cloned()
                .ok_or_else(|| QbError::execution("Projection returned an empty row"))?;
            values.push(value);
        }
        Ok(Fetched::Data(values))
    }

    /// Stream matching rows into a callback without buffering the result
    /// set. Iteration stops early when the callback returns `false`; the
    /// cursor is released either way. Returns the number of rows visited.
    pub async fn stream_each<F>(&mut self, mut on_row: F) -> QbResult<Fetched<u64>>
    where
        F: FnMut(Row) -> bool + Send,
    {
        let sql = self.compile_select()?;
        self.run_query_each(sql, &mut on_row).await
    }

    // ==================== Chunked iteration ====================

    /// Iterate matching rows in batches of `size`, re-running the saved
    /// option set at increasing page numbers.
    ///
    /// The returned [`Chunks`] is lazy, finite, and not restartable: it ends
    /// when a page yields fewer rows than `size`.
    pub fn chunk(&mut self, size: u64) -> QbResult<Chunks<'_, D>> {
        if size == 0 {
            return Err(QbError::config("Chunk size must be positive"));
        }
        if self.fetch_sql {
            return Err(QbError::config(
                "Chunking cannot run in statement-only mode",
            ));
        }
        let options = std::mem::take(&mut self.options);
        let binds = std::mem::take(&mut self.bind_data);
        Ok(Chunks {
            db: self,
            options,
            binds,
            size,
            page: 1,
            done: false,
        })
    }

    /// Drive [`Db::chunk`] to completion with a callback.
    ///
    /// Stops early when the callback returns `false`. Returns `true` when
    /// the data was exhausted, `false` when the callback stopped it.
    pub async fn chunk_each<F>(&mut self, size: u64, mut each: F) -> QbResult<bool>
    where
        F: FnMut(Vec<Row>) -> bool + Send,
    {
        let mut chunks = self.chunk(size)?;
        while let Some(batch) = chunks.next().await? {
            if !each(batch) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // ==================== Compilation helpers ====================

    fn compile_select(&mut self) -> QbResult<String> {
        let opts = std::mem::take(&mut self.options).finalize()?;
        stmt::select(&opts, self.config.dbname.as_deref(), self.escape)
    }
}

/// A lazy sequence of row batches produced by [`Db::chunk`].
pub struct Chunks<'db, D: Driver> {
    db: &'db mut Db<D>,
    options: StatementOptions,
    binds: BindData,
    size: u64,
    page: u64,
    done: bool,
}

impl<D: Driver> std::fmt::Debug for Chunks<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunks").finish_non_exhaustive()
    }
}

impl<D: Driver> Chunks<'_, D> {
    /// Fetch the next batch, or `None` once the data is exhausted.
    pub async fn next(&mut self) -> QbResult<Option<Vec<Row>>> {
        if self.done {
            return Ok(None);
        }

        self.db.options = self.options.clone();
        self.db.bind_data = self.binds.clone();
        self.db.page(self.page, self.size);

        let rows = match self.db.get_list().await? {
            Fetched::Data(rows) => rows,
            Fetched::Sql(_) => {
                return Err(QbError::execution(
                    "Chunking cannot run in statement-only mode",
                ));
            }
        };

        if (rows.len() as u64) < self.size {
            self.done = true;
        }
        self.page += 1;

        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(rows))
    }
}
