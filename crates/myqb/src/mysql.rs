//! sqlx-backed MySQL driver.
//!
//! One [`MySqlDriver`] wraps one `sqlx::mysql::MySqlConnection`. Statement
//! parameters are bound from [`Value`] variants, result columns decode back
//! into [`Value`] by column type, and transaction control is issued as plain
//! text commands so the builder's own in-transaction flag stays the single
//! source of truth.

use crate::config::DbConfig;
use crate::driver::{Driver, ExecOutcome};
use crate::error::{QbError, QbResult};
use crate::row::Row;
use crate::value::Value;
use futures_util::TryStreamExt;
use sqlx::mysql::{MySqlArguments, MySqlColumn, MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Column, ConnectOptions, Connection, Executor, Row as _, TypeInfo, ValueRef};

type MySqlQuery<'q> = sqlx::query::Query<'q, sqlx::MySql, MySqlArguments>;

/// A single MySQL connection implementing the [`Driver`] seam.
pub struct MySqlDriver {
    conn: MySqlConnection,
}

impl MySqlDriver {
    /// Connect using a [`DbConfig`].
    pub async fn connect(config: &DbConfig) -> QbResult<Self> {
        Self::connect_with(config.connect_options()).await
    }

    /// Connect using prepared sqlx options.
    pub async fn connect_with(options: MySqlConnectOptions) -> QbResult<Self> {
        let conn = options.connect().await?;
        Ok(Self { conn })
    }

    /// Check the connection.
    pub async fn ping(&mut self) -> QbResult<()> {
        self.conn.ping().await?;
        Ok(())
    }

    /// Close the connection cleanly.
    pub async fn close(self) -> QbResult<()> {
        self.conn.close().await?;
        Ok(())
    }
}

impl Driver for MySqlDriver {
    async fn query(&mut self, sql: &str, params: &[Value]) -> QbResult<Vec<Row>> {
        let query = bind_params(sqlx::query(sql), params)?;
        let rows = query.fetch_all(&mut self.conn).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn query_each(
        &mut self,
        sql: &str,
        params: &[Value],
        on_row: &mut (dyn FnMut(Row) -> bool + Send),
    ) -> QbResult<u64> {
        let query = bind_params(sqlx::query(sql), params)?;
        let mut stream = self.conn.fetch(query);
        let mut seen = 0;
        while let Some(row) = stream.try_next().await? {
            let row = decode_row(&row)?;
            seen += 1;
            if !on_row(row) {
                break;
            }
        }
        Ok(seen)
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> QbResult<ExecOutcome> {
        let query = bind_params(sqlx::query(sql), params)?;
        let result = query.execute(&mut self.conn).await?;
        Ok(ExecOutcome {
            rows_affected: result.rows_affected(),
            last_insert_id: result.last_insert_id(),
        })
    }

    async fn begin(&mut self) -> QbResult<()> {
        self.conn.execute("START TRANSACTION").await?;
        Ok(())
    }

    async fn commit(&mut self) -> QbResult<()> {
        self.conn.execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> QbResult<()> {
        self.conn.execute("ROLLBACK").await?;
        Ok(())
    }
}

/// Bind [`Value`]s with driver parameter types inferred per variant.
fn bind_params<'q>(mut query: MySqlQuery<'q>, params: &[Value]) -> QbResult<MySqlQuery<'q>> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Int(n) => query.bind(*n),
            Value::Uint(n) => query.bind(*n),
            Value::Float(f) => query.bind(*f),
            Value::Str(s) => query.bind(s.clone()),
            Value::Bytes(bytes) => query.bind(bytes.clone()),
            Value::Array(_) => {
                return Err(QbError::bind(
                    "Cannot bind a list value to a single placeholder",
                ));
            }
        };
    }
    Ok(query)
}

fn decode_row(row: &MySqlRow) -> QbResult<Row> {
    let columns = row.columns();
    let mut pairs = Vec::with_capacity(columns.len());
    for (idx, column) in columns.iter().enumerate() {
        pairs.push((column.name().to_string(), decode_value(row, idx, column)?));
    }
    Ok(Row::new(pairs))
}

fn decode_value(row: &MySqlRow, idx: usize, column: &MySqlColumn) -> QbResult<Value> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(Value::Null);
    }

    let value = match column.type_info().name() {
        "BOOLEAN" => Value::Bool(row.try_get::<bool, _>(idx)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            Value::Int(row.try_get::<i64, _>(idx)?)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => Value::Uint(row.try_get::<u64, _>(idx)?),
        "YEAR" => Value::Uint(row.try_get_unchecked::<u64, _>(idx)?),
        "FLOAT" => Value::Float(f64::from(row.try_get::<f32, _>(idx)?)),
        "DOUBLE" => Value::Float(row.try_get::<f64, _>(idx)?),
        "DATE" => Value::Str(row.try_get::<chrono::NaiveDate, _>(idx)?.to_string()),
        "TIME" => Value::Str(row.try_get::<chrono::NaiveTime, _>(idx)?.to_string()),
        "DATETIME" => Value::Str(
            row.try_get::<chrono::NaiveDateTime, _>(idx)?
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
        ),
        "TIMESTAMP" => Value::Str(
            row.try_get::<chrono::DateTime<chrono::Utc>, _>(idx)?
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
        ),
        "JSON" => Value::from(row.try_get::<serde_json::Value, _>(idx)?),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => Value::Bytes(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
        // CHAR/VARCHAR/TEXT family, ENUM, SET, DECIMAL, and anything newer:
        // take the textual form, falling back to raw bytes.
        _ => match row.try_get_unchecked::<String, _>(idx) {
            Ok(text) => Value::Str(text),
            Err(_) => Value::Bytes(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
        },
    };
    Ok(value)
}

impl crate::Db<MySqlDriver> {
    /// Connect to MySQL and wrap the connection in a builder.
    pub async fn connect(config: DbConfig) -> QbResult<Self> {
        let driver = MySqlDriver::connect(&config).await?;
        Ok(Self::new(driver, config))
    }
}
