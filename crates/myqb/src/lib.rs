//! # myqb
//!
//! A fluent statement builder and executor for MySQL-family databases.
//!
//! ## Features
//!
//! - **Chained configuration**: accumulate table/field/where/join/order/
//!   group/limit options, then fire a terminal (`get_list`, `update`, ...)
//! - **Condition tree DSL**: `"field|operator"` keys with nested AND/OR
//!   groups, BETWEEN/LIKE/IN shapes picked from the value's type
//! - **Injection-safe rendering**: backtick identifier quoting and MySQL
//!   literal escaping, with bind placeholders (`?` / `:name`) passed to the
//!   driver as typed parameters
//! - **Statement-only mode**: render the final SQL without executing it
//! - **Bounded query log**, idempotent transactions with a scoped
//!   [`action!`] macro, chunked and unbuffered iteration
//!
//! ## Example
//!
//! ```ignore
//! use myqb::{Db, DbConfig, Dir, QbResult, Value};
//!
//! # async fn demo() -> QbResult<()> {
//! let mut db = Db::connect(
//!     DbConfig::new()
//!         .host("127.0.0.1")
//!         .dbname("app")
//!         .username("app")
//!         .password("secret"),
//! )
//! .await?;
//!
//! let users = db
//!     .table("user")?
//!     .fields(["user_id", "username"])
//!     .where_("user_id|>=", 20)?
//!     .order("user_id", Dir::Asc)
//!     .limit(10)
//!     .get_list()
//!     .await?
//!     .data()?;
//!
//! db.table("user")?
//!     .insert_one(
//!         [("username", Value::from("dave")), ("age", Value::from(30))],
//!         myqb::Upsert::None,
//!     )
//!     .await?;
//! # Ok(()) }
//! ```

pub mod condition;
pub mod config;
pub mod db;
pub mod driver;
pub mod error;
pub mod log;
pub mod options;
pub mod row;
pub mod stmt;
pub mod transaction;
pub mod value;

mod clause;
mod ident;

#[cfg(feature = "mysql")]
pub mod mysql;

pub use condition::{CmpOp, Cond};
pub use config::DbConfig;
pub use db::{Chunks, Db, Fetched, FieldInfo, InsertOutcome};
pub use driver::{Driver, ExecOutcome};
pub use error::{QbError, QbResult};
pub use ident::quote_key;
pub use log::{LogRetention, QueryLog};
pub use options::{Dir, JoinKind, JoinOn, Limit};
pub use row::Row;
pub use stmt::Upsert;
pub use value::Value;

#[cfg(feature = "mysql")]
pub use mysql::MySqlDriver;
