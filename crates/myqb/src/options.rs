//! Per-statement option state.
//!
//! [`StatementOptions`] is the accumulator behind the fluent surface. One
//! instance describes one in-flight statement; terminals take it by value
//! ([`std::mem::take`]) and leave the builder reset for the next statement.

use crate::condition::Cond;
use crate::error::{QbError, QbResult};

/// A table reference with an optional alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

impl TableRef {
    /// Create a table reference, validating the alias.
    ///
    /// An alias that is not a plain word (`[A-Za-z0-9_]+`) is silently
    /// dropped rather than rejected.
    pub(crate) fn new(name: &str, alias: Option<&str>) -> QbResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(QbError::config("Unexpected empty value for table"));
        }
        let alias = alias
            .map(str::trim)
            .filter(|a| !a.is_empty() && a.chars().all(|c| c == '_' || c.is_ascii_alphanumeric()))
            .map(str::to_string);
        Ok(Self {
            name: name.to_string(),
            alias,
        })
    }
}

/// Join kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinKind {
    #[default]
    Left,
    Right,
    Inner,
    Full,
}

impl JoinKind {
    pub(crate) fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Left => "LEFT",
            JoinKind::Right => "RIGHT",
            JoinKind::Inner => "INNER",
            JoinKind::Full => "FULL",
        }
    }
}

/// A join's ON condition: raw SQL, or column-equality pairs joined by AND.
#[derive(Debug, Clone)]
pub enum JoinOn {
    Raw(String),
    Pairs(Vec<(String, String)>),
}

impl From<&str> for JoinOn {
    fn from(sql: &str) -> Self {
        JoinOn::Raw(sql.to_string())
    }
}

impl From<String> for JoinOn {
    fn from(sql: String) -> Self {
        JoinOn::Raw(sql)
    }
}

impl From<Vec<(&str, &str)>> for JoinOn {
    fn from(pairs: Vec<(&str, &str)>) -> Self {
        JoinOn::Pairs(
            pairs
                .into_iter()
                .map(|(l, r)| (l.to_string(), r.to_string()))
                .collect(),
        )
    }
}

impl JoinOn {
    pub(crate) fn is_empty(&self) -> bool {
        match self {
            JoinOn::Raw(sql) => sql.trim().is_empty(),
            JoinOn::Pairs(pairs) => pairs.is_empty(),
        }
    }
}

/// One JOIN entry.
#[derive(Debug, Clone)]
pub struct Join {
    pub table: TableRef,
    pub kind: JoinKind,
    pub on: JoinOn,
}

/// The select list.
#[derive(Debug, Clone, Default)]
pub enum FieldSpec {
    /// `*`
    #[default]
    All,
    /// A caller-supplied fragment, subject to the raw-expression heuristic.
    Raw(String),
    /// Individual expressions with optional output aliases.
    List(Vec<FieldExpr>),
}

/// One select-list entry.
#[derive(Debug, Clone)]
pub struct FieldExpr {
    pub expr: String,
    pub alias: Option<String>,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dir {
    Asc,
    Desc,
}

impl Dir {
    pub(crate) fn as_sql(self) -> &'static str {
        match self {
            Dir::Asc => "ASC",
            Dir::Desc => "DESC",
        }
    }
}

/// ORDER BY / GROUP BY contents: items, or a raw fragment.
#[derive(Debug, Clone)]
pub enum OrderSpec {
    Raw(String),
    Items(Vec<(String, Option<Dir>)>),
}

impl OrderSpec {
    pub(crate) fn push(&mut self, column: String, dir: Option<Dir>) {
        match self {
            OrderSpec::Items(items) => items.push((column, dir)),
            // A raw fragment is replaced once items are used.
            OrderSpec::Raw(_) => *self = OrderSpec::Items(vec![(column, dir)]),
        }
    }
}

/// LIMIT contents: `LIMIT count` or `LIMIT offset, count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Count(u64),
    Range(u64, u64),
}

impl Limit {
    /// Parse a raw `"count"` or `"offset, count"` fragment.
    pub(crate) fn parse(raw: &str) -> QbResult<Self> {
        let parse_int = |s: &str| {
            s.trim()
                .parse::<u64>()
                .map_err(|_| QbError::config(format!("Invalid limit fragment {raw:?}")))
        };
        match raw.split_once(',') {
            Some((offset, count)) => Ok(Limit::Range(parse_int(offset)?, parse_int(count)?)),
            None => Ok(Limit::Count(parse_int(raw)?)),
        }
    }
}

/// Accumulated options for one statement.
#[derive(Debug, Clone, Default)]
pub struct StatementOptions {
    pub(crate) table: Option<TableRef>,
    pub(crate) joins: Vec<Join>,
    pub(crate) fields: FieldSpec,
    pub(crate) conds: Vec<Cond>,
    pub(crate) order: Option<OrderSpec>,
    pub(crate) group: Option<OrderSpec>,
    pub(crate) limit: Option<Limit>,
    pub(crate) page: Option<(u64, u64)>,
    pub(crate) distinct: bool,
}

impl StatementOptions {
    /// Finalize the options before compilation.
    ///
    /// Requires a table, and folds `page` into `limit`
    /// (offset = size × (page − 1); a zero size falls back to a count-only
    /// limit already set, else 20).
    pub(crate) fn finalize(mut self) -> QbResult<Self> {
        if self.table.is_none() {
            return Err(QbError::compile("No table configured for statement"));
        }

        if let Some((page, size)) = self.page.take() {
            let page = page.max(1);
            let size = if size > 0 {
                size
            } else {
                match self.limit {
                    Some(Limit::Count(n)) if n > 0 => n,
                    _ => 20,
                }
            };
            self.limit = Some(Limit::Range(size * (page - 1), size));
        }

        Ok(self)
    }

    pub(crate) fn table(&self) -> &TableRef {
        self.table.as_ref().expect("finalize() checked the table")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_table_is_a_compile_error() {
        let err = StatementOptions::default().finalize().unwrap_err();
        assert!(err.is_compile());
    }

    #[test]
    fn page_becomes_offset_count() {
        let mut opts = StatementOptions::default();
        opts.table = Some(TableRef::new("user", None).unwrap());
        opts.page = Some((3, 25));
        let opts = opts.finalize().unwrap();
        assert_eq!(opts.limit, Some(Limit::Range(50, 25)));
    }

    #[test]
    fn page_size_falls_back_to_limit_then_default() {
        let mut opts = StatementOptions::default();
        opts.table = Some(TableRef::new("user", None).unwrap());
        opts.limit = Some(Limit::Count(10));
        opts.page = Some((2, 0));
        let opts = opts.finalize().unwrap();
        assert_eq!(opts.limit, Some(Limit::Range(10, 10)));

        let mut opts = StatementOptions::default();
        opts.table = Some(TableRef::new("user", None).unwrap());
        opts.page = Some((2, 0));
        let opts = opts.finalize().unwrap();
        assert_eq!(opts.limit, Some(Limit::Range(20, 20)));
    }

    #[test]
    fn page_number_is_clamped_to_one() {
        let mut opts = StatementOptions::default();
        opts.table = Some(TableRef::new("user", None).unwrap());
        opts.page = Some((0, 10));
        let opts = opts.finalize().unwrap();
        assert_eq!(opts.limit, Some(Limit::Range(0, 10)));
    }

    #[test]
    fn invalid_alias_is_dropped() {
        let t = TableRef::new("user", Some("u-x")).unwrap();
        assert_eq!(t.alias, None);
        let t = TableRef::new("user", Some("u1")).unwrap();
        assert_eq!(t.alias.as_deref(), Some("u1"));
    }

    #[test]
    fn limit_fragment_parses() {
        assert_eq!(Limit::parse("10").unwrap(), Limit::Count(10));
        assert_eq!(Limit::parse("0, 10").unwrap(), Limit::Range(0, 10));
        assert!(Limit::parse("ten").is_err());
    }
}
