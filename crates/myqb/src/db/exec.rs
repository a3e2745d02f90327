//! Statement execution: bind resolution, prefix expansion, dry-run
//! rendering, the query log, transactions, and schema introspection.

use super::{Db, Fetched};
use crate::clause;
use crate::driver::{Driver, ExecOutcome};
use crate::error::{QbError, QbResult};
use crate::ident::quote_key;
use crate::log::QueryLog;
use crate::options::TableRef;
use crate::row::Row;
use crate::value::Value;
use regex::Regex;
use std::sync::LazyLock;

/// `#NAME#` markers in raw SQL, expanded to `{prefix}name`.
static PREFIX_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([A-Z0-9_-]+)#").expect("valid pattern"));

/// `:name` bind tokens.
static NAMED_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").expect("valid pattern"));

/// Pending bind data for the in-flight statement.
///
/// Positional and named styles are mutually exclusive; the first `bind` or
/// `bind_named` call decides which one the statement uses.
#[derive(Debug, Clone, Default)]
pub(crate) enum BindData {
    #[default]
    Empty,
    Positional(Vec<Value>),
    Named(Vec<(String, Value)>),
}

/// A statement after bind resolution.
enum Prepared {
    /// Dry-run: the fully substituted SQL, nothing to execute.
    Sql(String),
    /// Ready to execute.
    Exec {
        sql: String,
        params: Vec<Value>,
        rendered: String,
    },
}

/// Column metadata from `SHOW FULL COLUMNS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: String,
    pub column_type: String,
    pub not_null: bool,
    pub default: Option<String>,
    pub primary: bool,
    pub extra: String,
    pub comment: String,
}

impl<D: Driver> Db<D> {
    // ==================== Bind data ====================

    /// Bind a value to the next positional `?` placeholder.
    pub fn bind(&mut self, value: impl Into<Value>) -> QbResult<&mut Self> {
        if matches!(self.bind_data, BindData::Named(_)) {
            return Err(QbError::bind(
                "Cannot mix positional and named bind data in one statement",
            ));
        }
        let value = value.into();
        if let BindData::Positional(values) = &mut self.bind_data {
            values.push(value);
        } else {
            self.bind_data = BindData::Positional(vec![value]);
        }
        Ok(self)
    }

    /// Bind a value to a named `:key` placeholder.
    ///
    /// Binding the same key twice replaces the earlier value.
    pub fn bind_named(&mut self, key: &str, value: impl Into<Value>) -> QbResult<&mut Self> {
        let key = key.trim_start_matches(':');
        if !is_identifier(key) {
            return Err(QbError::bind(format!("Invalid bind key {key:?}")));
        }
        if matches!(self.bind_data, BindData::Positional(_)) {
            return Err(QbError::bind(
                "Cannot mix positional and named bind data in one statement",
            ));
        }
        let value = value.into();
        if let BindData::Named(pairs) = &mut self.bind_data {
            match pairs.iter_mut().find(|(k, _)| k == key) {
                Some((_, existing)) => *existing = value,
                None => pairs.push((key.to_string(), value)),
            }
        } else {
            self.bind_data = BindData::Named(vec![(key.to_string(), value)]);
        }
        Ok(self)
    }

    // ==================== Raw execution ====================

    /// Execute a raw SQL query with the pending bind data and return rows.
    pub async fn query(&mut self, sql: &str) -> QbResult<Fetched<Vec<Row>>> {
        self.run_query(sql.to_string()).await
    }

    /// Execute a raw SQL statement with the pending bind data and return the
    /// affected-row count.
    pub async fn exec(&mut self, sql: &str) -> QbResult<Fetched<u64>> {
        Ok(self
            .run_exec(sql.to_string())
            .await?
            .map(|outcome| outcome.rows_affected))
    }

    /// Execute a raw SQL query unbuffered, pushing rows into a callback.
    pub async fn query_each<F>(&mut self, sql: &str, mut on_row: F) -> QbResult<Fetched<u64>>
    where
        F: FnMut(Row) -> bool + Send,
    {
        self.run_query_each(sql.to_string(), &mut on_row).await
    }

    pub(crate) async fn run_query(&mut self, sql: String) -> QbResult<Fetched<Vec<Row>>> {
        match self.prepare_statement(sql)? {
            Prepared::Sql(sql) => Ok(Fetched::Sql(sql)),
            Prepared::Exec {
                sql,
                params,
                rendered,
            } => {
                tracing::debug!(sql = %rendered, "executing query");
                let result = self.driver.query(&sql, &params).await;
                self.query_log.push(rendered);
                Ok(Fetched::Data(result?))
            }
        }
    }

    pub(crate) async fn run_query_each(
        &mut self,
        sql: String,
        on_row: &mut (dyn FnMut(Row) -> bool + Send),
    ) -> QbResult<Fetched<u64>> {
        match self.prepare_statement(sql)? {
            Prepared::Sql(sql) => Ok(Fetched::Sql(sql)),
            Prepared::Exec {
                sql,
                params,
                rendered,
            } => {
                tracing::debug!(sql = %rendered, "executing unbuffered query");
                let result = self.driver.query_each(&sql, &params, on_row).await;
                self.query_log.push(rendered);
                Ok(Fetched::Data(result?))
            }
        }
    }

    pub(crate) async fn run_exec(&mut self, sql: String) -> QbResult<Fetched<ExecOutcome>> {
        match self.prepare_statement(sql)? {
            Prepared::Sql(sql) => Ok(Fetched::Sql(sql)),
            Prepared::Exec {
                sql,
                params,
                rendered,
            } => {
                tracing::debug!(sql = %rendered, "executing statement");
                let result = self.driver.execute(&sql, &params).await;
                self.query_log.push(rendered);
                let outcome = result?;
                self.last_insert_id = outcome.last_insert_id;
                Ok(Fetched::Data(outcome))
            }
        }
    }

    /// Resolve prefix markers and bind data, then either render the dry-run
    /// SQL or produce the driver statement. Consumes the per-statement
    /// bind/escape/dry-run/index state either way.
    fn prepare_statement(&mut self, sql: String) -> QbResult<Prepared> {
        let sql = self.expand_prefix(&sql);
        let binds = std::mem::take(&mut self.bind_data);
        self.escape = true;
        self.index_by = None;

        let rendered = render_literals(&sql, &binds)?;
        if self.fetch_sql {
            self.fetch_sql = false;
            return Ok(Prepared::Sql(rendered));
        }

        let (sql, params) = to_positional(sql, binds)?;
        Ok(Prepared::Exec {
            sql,
            params,
            rendered,
        })
    }

    /// Expand `#NAME#` markers with the configured table prefix.
    fn expand_prefix(&self, sql: &str) -> String {
        let prefix = self.config.prefix.as_deref().unwrap_or("");
        PREFIX_MARKER
            .replace_all(sql, |caps: &regex::Captures<'_>| {
                format!("{prefix}{}", caps[1].to_lowercase())
            })
            .into_owned()
    }

    // ==================== Transactions ====================

    /// Open a transaction. A no-op when one is already open.
    pub async fn begin(&mut self) -> QbResult<()> {
        if self.in_transaction {
            return Ok(());
        }
        self.driver.begin().await?;
        self.in_transaction = true;
        Ok(())
    }

    /// Commit the open transaction.
    pub async fn commit(&mut self) -> QbResult<()> {
        self.in_transaction = false;
        self.driver.commit().await
    }

    /// Roll back the open transaction.
    pub async fn rollback(&mut self) -> QbResult<()> {
        self.in_transaction = false;
        self.driver.rollback().await
    }

    /// Whether a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    // ==================== Bookkeeping ====================

    /// Auto-increment id produced by the most recent mutation.
    pub fn last_insert_id(&self) -> u64 {
        self.last_insert_id
    }

    /// The query log.
    pub fn query_log(&self) -> &QueryLog {
        &self.query_log
    }

    /// The most recently executed statement.
    pub fn last_query(&self) -> Option<&str> {
        self.query_log.last()
    }

    /// Drop all retained query-log entries.
    pub fn clear_query_log(&mut self) {
        self.query_log.clear();
    }

    // ==================== Introspection ====================

    /// Column metadata for a table (`SHOW FULL COLUMNS`).
    ///
    /// Always executes, even in statement-only mode.
    pub async fn table_fields(&mut self, table: &str) -> QbResult<Vec<FieldInfo>> {
        let table = TableRef::new(table, None)?;
        let table_sql = clause::table(&table, self.config.dbname.as_deref(), self.escape)?;
        self.fetch_sql = false;

        let rows = self
            .run_query(format!("SHOW FULL COLUMNS FROM {table_sql}"))
            .await?
            .data()?;

        let mut fields = Vec::with_capacity(rows.len());
        for row in rows {
            let get = |column: &str| -> String {
                row.iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(column))
                    .map(|(_, value)| value_text(value))
                    .unwrap_or_default()
            };
            let default = row
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("default"))
                .map(|(_, value)| value)
                .filter(|value| !value.is_null())
                .map(value_text);

            fields.push(FieldInfo {
                name: get("field"),
                column_type: get("type"),
                not_null: get("null").eq_ignore_ascii_case("no"),
                default,
                primary: get("key").eq_ignore_ascii_case("pri"),
                extra: get("extra"),
                comment: get("comment"),
            });
        }
        Ok(fields)
    }

    /// Tables of the configured database (`SHOW TABLES`).
    ///
    /// Always executes, even in statement-only mode.
    pub async fn tables(&mut self) -> QbResult<Vec<String>> {
        let sql = match self.config.dbname.as_deref().filter(|db| !db.is_empty()) {
            Some(dbname) => format!("SHOW TABLES FROM {}", quote_key(dbname, true)?),
            None => "SHOW TABLES".to_string(),
        };
        self.fetch_sql = false;

        let rows = self.run_query(sql).await?.data()?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.value_at(0).and_then(Value::to_key_string))
            .collect())
    }
}

fn value_text(value: &Value) -> String {
    value.to_key_string().unwrap_or_default()
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Substitute bind values as literals for the query log and dry-run mode.
fn render_literals(sql: &str, binds: &BindData) -> QbResult<String> {
    match binds {
        BindData::Empty => Ok(sql.trim().to_string()),
        BindData::Positional(values) => {
            let mut out = String::with_capacity(sql.len());
            let mut rest = sql;
            for value in values {
                match rest.find('?') {
                    Some(pos) => {
                        out.push_str(&rest[..pos]);
                        out.push_str(&value.to_literal()?);
                        rest = &rest[pos + 1..];
                    }
                    None => break,
                }
            }
            out.push_str(rest);
            Ok(out.trim().to_string())
        }
        BindData::Named(pairs) => {
            let mut out = String::with_capacity(sql.len());
            let mut last = 0;
            for caps in NAMED_TOKEN.captures_iter(sql) {
                let marker = caps.get(0).expect("whole match");
                let name = &caps[1];
                if let Some((_, value)) = pairs.iter().find(|(key, _)| key == name) {
                    out.push_str(&sql[last..marker.start()]);
                    out.push_str(&value.to_literal()?);
                    last = marker.end();
                }
            }
            out.push_str(&sql[last..]);
            Ok(out.trim().to_string())
        }
    }
}

/// Resolve bind data into the positional statement the driver executes.
///
/// Named placeholders are rewritten to `?` with values in occurrence order.
/// A placeholder without a bind, or a bind without a placeholder, is a bind
/// error, caught before the statement reaches the driver.
fn to_positional(sql: String, binds: BindData) -> QbResult<(String, Vec<Value>)> {
    match binds {
        BindData::Empty => Ok((sql, Vec::new())),
        BindData::Positional(values) => {
            let placeholders = sql.matches('?').count();
            if placeholders != values.len() {
                return Err(QbError::bind(format!(
                    "Statement has {placeholders} positional placeholders, {} values bound",
                    values.len()
                )));
            }
            for value in &values {
                if matches!(value, Value::Array(_)) {
                    return Err(QbError::bind(
                        "Cannot bind a list value to a single placeholder",
                    ));
                }
            }
            Ok((sql, values))
        }
        BindData::Named(pairs) => {
            let mut params = Vec::new();
            let mut used = vec![false; pairs.len()];
            let mut out = String::with_capacity(sql.len());
            let mut last = 0;

            for caps in NAMED_TOKEN.captures_iter(&sql) {
                let marker = caps.get(0).expect("whole match");
                let name = &caps[1];
                let Some(idx) = pairs.iter().position(|(key, _)| key == name) else {
                    return Err(QbError::bind(format!("No value bound for :{name}")));
                };
                let value = &pairs[idx].1;
                if matches!(value, Value::Array(_)) {
                    return Err(QbError::bind(
                        "Cannot bind a list value to a single placeholder",
                    ));
                }
                used[idx] = true;
                params.push(value.clone());
                out.push_str(&sql[last..marker.start()]);
                out.push('?');
                last = marker.end();
            }
            out.push_str(&sql[last..]);

            if let Some(idx) = used.iter().position(|used| !used) {
                return Err(QbError::bind(format!(
                    "Bound key :{} does not appear in the statement",
                    pairs[idx].0
                )));
            }

            Ok((out, params))
        }
    }
}

#[cfg(test)]
mod bind_tests {
    use super::*;

    #[test]
    fn positional_literal_rendering() {
        let binds = BindData::Positional(vec![Value::Int(20), Value::from("a?b")]);
        let sql = render_literals("SELECT * FROM t WHERE a > ? AND b = ?", &binds).unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE a > 20 AND b = 'a?b'");
    }

    #[test]
    fn positional_literal_with_question_mark_in_value_does_not_cascade() {
        let binds = BindData::Positional(vec![Value::from("?x"), Value::Int(2)]);
        let sql = render_literals("a = ? AND b = ?", &binds).unwrap();
        assert_eq!(sql, "a = '?x' AND b = 2");
    }

    #[test]
    fn named_literal_rendering_leaves_unknown_tokens() {
        let binds = BindData::Named(vec![("uid".to_string(), Value::Int(7))]);
        let sql = render_literals("a = :uid AND b = :other", &binds).unwrap();
        assert_eq!(sql, "a = 7 AND b = :other");
    }

    #[test]
    fn positional_count_mismatch_is_a_bind_error() {
        let err = to_positional("a = ?".to_string(), BindData::Positional(vec![])).unwrap_err();
        assert!(err.is_bind());
        let err = to_positional(
            "a = ?".to_string(),
            BindData::Positional(vec![Value::Int(1), Value::Int(2)]),
        )
        .unwrap_err();
        assert!(err.is_bind());
    }

    #[test]
    fn named_placeholders_rewrite_to_positional() {
        let binds = BindData::Named(vec![
            ("uid".to_string(), Value::Int(7)),
            ("name".to_string(), Value::from("x")),
        ]);
        let (sql, params) =
            to_positional("a = :uid AND b = :name AND c = :uid".to_string(), binds).unwrap();
        assert_eq!(sql, "a = ? AND b = ? AND c = ?");
        assert_eq!(
            params,
            vec![Value::Int(7), Value::from("x"), Value::Int(7)]
        );
    }

    #[test]
    fn missing_and_unused_named_binds_are_bind_errors() {
        let err = to_positional(
            "a = :uid".to_string(),
            BindData::Named(vec![("other".to_string(), Value::Int(1))]),
        )
        .unwrap_err();
        assert!(err.is_bind());

        let err = to_positional(
            "a = 1".to_string(),
            BindData::Named(vec![("uid".to_string(), Value::Int(1))]),
        )
        .unwrap_err();
        assert!(err.is_bind());
    }

    #[test]
    fn list_values_cannot_be_bound() {
        let err = to_positional(
            "a IN ?".to_string(),
            BindData::Positional(vec![Value::from(vec![1, 2])]),
        )
        .unwrap_err();
        assert!(err.is_bind());
    }
}
