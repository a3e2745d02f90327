//! Clause compilers.
//!
//! Pure functions from one structured option to a SQL fragment. Fragments
//! that follow another clause carry their own leading space (` WHERE …`,
//! ` ORDER BY …`), so an unused option contributes an empty string and the
//! statement templates concatenate without bookkeeping.

use crate::condition::{Cond, Joiner, build_where};
use crate::error::QbResult;
use crate::ident::quote_key;
use crate::options::{FieldSpec, Join, JoinOn, Limit, OrderSpec, TableRef};

/// `DISTINCT` marker.
pub(crate) fn distinct(distinct: bool) -> &'static str {
    if distinct { " DISTINCT" } else { "" }
}

/// Compile the select list.
///
/// A raw string containing `(`, `)`, ` AS `, or `=` is taken as an already
/// rendered expression and passed through untouched. This mirrors the
/// identifier heuristic in [`crate::ident`] and shares its caveat.
pub(crate) fn fields(spec: &FieldSpec, escape: bool) -> QbResult<String> {
    match spec {
        FieldSpec::All => Ok("*".to_string()),
        FieldSpec::Raw(raw) => {
            let raw = raw.trim();
            if raw.is_empty() || raw == "*" {
                return Ok("*".to_string());
            }
            let upper = raw.to_uppercase();
            if raw.contains(['(', ')', '=']) || upper.contains(" AS ") {
                return Ok(raw.to_string());
            }
            quote_key(raw, escape)
        }
        FieldSpec::List(items) => {
            if items.is_empty() {
                return Ok("*".to_string());
            }
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                let expr = if item.expr.contains('*') {
                    item.expr.clone()
                } else {
                    quote_key(&item.expr, escape)?
                };
                match &item.alias {
                    Some(alias) => {
                        parts.push(format!("{expr} AS {}", quote_key(alias, escape)?));
                    }
                    None => parts.push(expr),
                }
            }
            Ok(parts.join(", "))
        }
    }
}

/// Compile a table reference, qualifying dot-named tables with the
/// configured database and appending a validated alias.
pub(crate) fn table(table: &TableRef, dbname: Option<&str>, escape: bool) -> QbResult<String> {
    let mut name = table.name.clone();
    if let Some(dbname) = dbname.filter(|db| !db.is_empty()) {
        if name.contains('.') {
            name = format!("{dbname}.{name}");
        }
    }
    let mut sql = quote_key(&name, escape)?;

    if let Some(alias) = &table.alias {
        sql.push_str(" AS ");
        sql.push_str(&quote_key(alias, escape)?);
    }

    Ok(sql)
}

/// Compile the JOIN clauses.
pub(crate) fn joins(joins: &[Join], dbname: Option<&str>, escape: bool) -> QbResult<String> {
    if joins.is_empty() {
        return Ok(String::new());
    }

    let mut parts = Vec::with_capacity(joins.len());
    for join in joins {
        let target = table(&join.table, dbname, escape)?;
        let on = join_on(&join.on, escape)?;
        parts.push(format!("{} JOIN {target} ON {on}", join.kind.as_sql()));
    }

    Ok(format!(" {}", parts.join(" ")))
}

fn join_on(on: &JoinOn, escape: bool) -> QbResult<String> {
    match on {
        JoinOn::Raw(sql) => Ok(sql.clone()),
        JoinOn::Pairs(pairs) => {
            let mut parts = Vec::with_capacity(pairs.len());
            for (left, right) in pairs {
                parts.push(format!(
                    "{} = {}",
                    quote_key(left, escape)?,
                    quote_key(right, escape)?
                ));
            }
            Ok(parts.join(" AND "))
        }
    }
}

/// Compile the WHERE clause. An empty tree omits the clause entirely.
pub(crate) fn where_clause(conds: &[Cond], escape: bool) -> QbResult<String> {
    let sql = build_where(conds, Joiner::And, true, escape)?;
    if sql.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!(" WHERE {sql}"))
    }
}

/// Compile the ORDER BY clause.
pub(crate) fn order(spec: Option<&OrderSpec>, escape: bool) -> QbResult<String> {
    ordering(spec, " ORDER BY ", true, escape)
}

/// Compile the GROUP BY clause.
pub(crate) fn group(spec: Option<&OrderSpec>, escape: bool) -> QbResult<String> {
    ordering(spec, " GROUP BY ", false, escape)
}

fn ordering(
    spec: Option<&OrderSpec>,
    prefix: &str,
    default_dir: bool,
    escape: bool,
) -> QbResult<String> {
    let Some(spec) = spec else {
        return Ok(String::new());
    };

    let body = match spec {
        OrderSpec::Raw(raw) => {
            let raw = raw.trim();
            if raw.is_empty() {
                return Ok(String::new());
            }
            // Quote a bare identifier; anything richer passes through.
            if raw
                .chars()
                .all(|c| c == '_' || c == '.' || c.is_ascii_alphanumeric())
            {
                quote_key(raw, escape)?
            } else {
                raw.to_string()
            }
        }
        OrderSpec::Items(items) => {
            if items.is_empty() {
                return Ok(String::new());
            }
            let mut parts = Vec::with_capacity(items.len());
            for (column, dir) in items {
                let column = quote_key(column, escape)?;
                match dir {
                    Some(dir) => parts.push(format!("{column} {}", dir.as_sql())),
                    // ORDER BY defaults a bare column to ASC; GROUP BY
                    // leaves it bare.
                    None if default_dir => parts.push(format!("{column} ASC")),
                    None => parts.push(column),
                }
            }
            parts.join(", ")
        }
    };

    Ok(format!("{prefix}{body}"))
}

/// Compile the LIMIT clause.
pub(crate) fn limit(limit: Option<Limit>) -> String {
    match limit {
        None => String::new(),
        Some(Limit::Count(n)) => format!(" LIMIT {n}"),
        Some(Limit::Range(offset, count)) => format!(" LIMIT {offset}, {count}"),
    }
}
