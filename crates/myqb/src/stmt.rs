//! Full-statement assembly.
//!
//! Each function stitches clause fragments into one of the fixed statement
//! templates:
//!
//! ```text
//! SELECT{ DISTINCT} {fields} FROM {table}{joins}{where}{group}{order}{limit}
//! SELECT EXISTS(SELECT 1 FROM {table}{where}) AS `tmp`
//! INSERT INTO {table} ({fields}) VALUES {rows}[ ON DUPLICATE KEY UPDATE {assignments}]
//! UPDATE {table} SET {assignments}{where}[{order}{limit}]
//! DELETE FROM {table}{where}[{order}{limit}]
//! ```

use crate::clause;
use crate::error::{QbError, QbResult};
use crate::ident::quote_key;
use crate::options::StatementOptions;
use crate::value::{Value, quote_str};

/// The `ON DUPLICATE KEY UPDATE` clause of an insert.
#[derive(Debug, Clone, Default)]
pub enum Upsert {
    /// Plain insert.
    #[default]
    None,
    /// Update the named columns from their inserted values. Every name must
    /// be one of the inserted columns.
    Fields(Vec<String>),
    /// A caller-supplied assignment list, emitted verbatim.
    Raw(String),
    /// Update every inserted column from its inserted value.
    AllFields,
}

/// Render an insert/update data value as a literal.
///
/// Arrays are serialized to JSON text; everything else follows the normal
/// literal rules (booleans become `1`/`0`, bind placeholders pass through).
fn data_literal(value: &Value) -> QbResult<String> {
    match value {
        Value::Array(_) => {
            let json: serde_json::Value = value.into();
            Ok(quote_str(&json.to_string()))
        }
        other => other.to_literal(),
    }
}

/// Assemble a SELECT statement.
pub(crate) fn select(
    opts: &StatementOptions,
    dbname: Option<&str>,
    escape: bool,
) -> QbResult<String> {
    Ok(format!(
        "SELECT{} {} FROM {}{}{}{}{}{}",
        clause::distinct(opts.distinct),
        clause::fields(&opts.fields, escape)?,
        clause::table(opts.table(), dbname, escape)?,
        clause::joins(&opts.joins, dbname, escape)?,
        clause::where_clause(&opts.conds, escape)?,
        clause::group(opts.group.as_ref(), escape)?,
        clause::order(opts.order.as_ref(), escape)?,
        clause::limit(opts.limit),
    ))
}

/// Assemble an existence probe.
pub(crate) fn exists(
    opts: &StatementOptions,
    dbname: Option<&str>,
    escape: bool,
) -> QbResult<String> {
    Ok(format!(
        "SELECT EXISTS(SELECT 1 FROM {}{}) AS `tmp`",
        clause::table(opts.table(), dbname, escape)?,
        clause::where_clause(&opts.conds, escape)?,
    ))
}

/// Assemble an INSERT statement from one or more rows.
///
/// All rows must share exactly the same key set; keys are sorted into one
/// column list and every value tuple follows that order.
pub(crate) fn insert(
    opts: &StatementOptions,
    rows: &[Vec<(String, Value)>],
    upsert: &Upsert,
    dbname: Option<&str>,
    escape: bool,
) -> QbResult<String> {
    if rows.is_empty() {
        return Err(QbError::compile("No rows to insert"));
    }

    let mut keys: Vec<&str> = rows[0].iter().map(|(k, _)| k.as_str()).collect();
    keys.sort_unstable();
    keys.dedup();
    if keys.len() != rows[0].len() || keys.is_empty() {
        return Err(QbError::compile("Duplicate or missing insert columns"));
    }

    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        if row.len() != keys.len() {
            return Err(QbError::compile("Insert rows do not share one column set"));
        }
        let mut literals = Vec::with_capacity(keys.len());
        for key in &keys {
            let Some((_, value)) = row.iter().find(|(k, _)| k == key) else {
                return Err(QbError::compile("Insert rows do not share one column set"));
            };
            literals.push(data_literal(value)?);
        }
        tuples.push(format!("({})", literals.join(", ")));
    }

    let columns: Vec<String> = keys
        .iter()
        .map(|key| quote_key(key, escape))
        .collect::<QbResult<_>>()?;

    let update_values = |fields: &[&str]| -> QbResult<String> {
        let parts: Vec<String> = fields
            .iter()
            .map(|field| {
                let quoted = quote_key(field, escape)?;
                Ok(format!("{quoted}=VALUES({quoted})"))
            })
            .collect::<QbResult<_>>()?;
        Ok(parts.join(", "))
    };

    let replace = match upsert {
        Upsert::None => String::new(),
        Upsert::Raw(raw) => raw.trim().to_string(),
        Upsert::AllFields => update_values(&keys)?,
        Upsert::Fields(fields) => {
            for field in fields {
                if !keys.contains(&field.as_str()) {
                    return Err(QbError::compile(format!(
                        "Upsert field {field:?} is not an inserted column"
                    )));
                }
            }
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            update_values(&fields)?
        }
    };

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        clause::table(opts.table(), dbname, escape)?,
        columns.join(", "),
        tuples.join(", "),
    );
    if !replace.is_empty() {
        sql.push_str(" ON DUPLICATE KEY UPDATE ");
        sql.push_str(&replace);
    }

    Ok(sql)
}

/// Assemble an UPDATE statement.
pub(crate) fn update(
    opts: &StatementOptions,
    data: &[(String, Value)],
    dbname: Option<&str>,
    escape: bool,
) -> QbResult<String> {
    if data.is_empty() {
        return Err(QbError::compile("No assignments for UPDATE"));
    }

    let mut assignments = Vec::with_capacity(data.len());
    for (key, value) in data {
        assignments.push(format!(
            "{} = {}",
            quote_key(key, escape)?,
            data_literal(value)?
        ));
    }

    let mut sql = format!(
        "UPDATE {} SET {}{}",
        clause::table(opts.table(), dbname, escape)?,
        assignments.join(", "),
        clause::where_clause(&opts.conds, escape)?,
    );
    sql.push_str(&row_bound_suffix(opts, escape)?);

    Ok(sql)
}

/// Assemble a DELETE statement.
pub(crate) fn delete(
    opts: &StatementOptions,
    dbname: Option<&str>,
    escape: bool,
) -> QbResult<String> {
    let mut sql = format!(
        "DELETE FROM {}{}",
        clause::table(opts.table(), dbname, escape)?,
        clause::where_clause(&opts.conds, escape)?,
    );
    sql.push_str(&row_bound_suffix(opts, escape)?);

    Ok(sql)
}

/// Optional `{order}{limit}` suffix for UPDATE/DELETE.
///
/// Only emitted when a limit is present; an ORDER BY alone is dropped.
fn row_bound_suffix(opts: &StatementOptions, escape: bool) -> QbResult<String> {
    let limit = clause::limit(opts.limit);
    if limit.is_empty() {
        return Ok(String::new());
    }
    Ok(format!(
        "{}{}",
        clause::order(opts.order.as_ref(), escape)?,
        limit
    ))
}
