//! WHERE condition tree and its compiler.
//!
//! A [`Cond`] is either raw SQL, an AND/OR group of subtrees, or a leaf
//! comparison. Leaves are usually written through the string key DSL,
//! `"field|operator"`:
//!
//! ```ignore
//! use myqb::Cond;
//!
//! let cond = Cond::all(vec![
//!     Cond::pair("status", "active")?,        // `status` = 'active'
//!     Cond::pair("age|>=", 18)?,              // `age` >= 18
//!     Cond::any(vec![
//!         Cond::pair("role", "admin")?,
//!         Cond::pair("role", "owner")?,
//!     ]),
//! ]);
//! ```
//!
//! The leaf value's type picks the SQL shape: NULL becomes `IS NULL`, an
//! array becomes an `IN` list (or the `BETWEEN` pair for `<>`/`><`), and
//! scalars become plain comparisons.

use crate::error::{QbError, QbResult};
use crate::ident::quote_key;
use crate::value::{Value, is_bind_marker, quote_str};

/// Comparison operator of a condition leaf.
///
/// In the string key DSL the operator follows the field after a `|`:
/// none (equality / IN / IS NULL by value type), `!` (negation),
/// `<>` / `><` (BETWEEN / NOT BETWEEN), `~` / `!~` (LIKE / NOT LIKE),
/// `>`, `>=`, `<`, `<=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Between,
    NotBetween,
    Like,
    NotLike,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// A WHERE clause condition tree.
#[derive(Debug, Clone)]
pub enum Cond {
    /// Raw SQL, emitted verbatim.
    ///
    /// Bypasses quoting and escaping; only use with trusted SQL text.
    Raw(String),
    /// Conjunction of subtrees (AND).
    All(Vec<Cond>),
    /// Disjunction of subtrees (OR).
    Any(Vec<Cond>),
    /// A single comparison.
    Leaf {
        field: String,
        op: CmpOp,
        value: Value,
    },
}

impl Cond {
    /// Create a raw SQL condition.
    pub fn raw(sql: impl Into<String>) -> Self {
        Cond::Raw(sql.into())
    }

    /// Create an AND group.
    pub fn all(conds: Vec<Cond>) -> Self {
        Cond::All(conds)
    }

    /// Create an OR group.
    pub fn any(conds: Vec<Cond>) -> Self {
        Cond::Any(conds)
    }

    /// Create a leaf from a `"field|operator"` key and a value.
    pub fn pair(key: &str, value: impl Into<Value>) -> QbResult<Self> {
        let (field, op) = parse_key(key)?;
        Ok(Cond::Leaf {
            field,
            op,
            value: value.into(),
        })
    }
}

/// Split a `"field|operator"` key into its parts.
pub(crate) fn parse_key(key: &str) -> QbResult<(String, CmpOp)> {
    let (field, suffix) = match key.split_once('|') {
        Some((field, suffix)) => (field, suffix.trim()),
        None => (key, ""),
    };

    let field = field.trim();
    if field.is_empty() {
        return Err(QbError::compile(format!(
            "Empty field in condition key {key:?}"
        )));
    }

    let op = match suffix {
        "" => CmpOp::Eq,
        "!" => CmpOp::Ne,
        "<>" => CmpOp::Between,
        "><" => CmpOp::NotBetween,
        "~" => CmpOp::Like,
        "!~" => CmpOp::NotLike,
        ">" => CmpOp::Gt,
        ">=" => CmpOp::Gte,
        "<" => CmpOp::Lt,
        "<=" => CmpOp::Lte,
        other => {
            return Err(QbError::compile(format!(
                "Unsupported condition operator {other:?}"
            )));
        }
    };

    Ok((field.to_string(), op))
}

/// Joining operator of a condition group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Joiner {
    And,
    Or,
}

impl Joiner {
    fn as_sql(self) -> &'static str {
        match self {
            Joiner::And => "AND",
            Joiner::Or => "OR",
        }
    }
}

/// Compile a group of conditions into a boolean expression.
///
/// The root level is emitted bare; nested groups are parenthesized. An empty
/// group compiles to an empty string so the caller can omit the WHERE clause
/// entirely.
pub(crate) fn build_where(
    conds: &[Cond],
    joiner: Joiner,
    root: bool,
    escape: bool,
) -> QbResult<String> {
    let mut parts = Vec::with_capacity(conds.len());
    for cond in conds {
        let sql = match cond {
            Cond::Raw(s) => s.clone(),
            Cond::All(children) => build_where(children, Joiner::And, false, escape)?,
            Cond::Any(children) => build_where(children, Joiner::Or, false, escape)?,
            Cond::Leaf { field, op, value } => build_leaf(field, *op, value, escape)?,
        };
        if !sql.is_empty() {
            parts.push(sql);
        }
    }

    let joined = parts.join(&format!(" {} ", joiner.as_sql()));
    if !root && !joined.is_empty() {
        Ok(format!("({joined})"))
    } else {
        Ok(joined)
    }
}

fn build_leaf(field: &str, op: CmpOp, value: &Value, escape: bool) -> QbResult<String> {
    let field = quote_key(field.trim(), escape)?;

    match op {
        CmpOp::Eq | CmpOp::Ne => {
            let negated = op == CmpOp::Ne;
            match value {
                Value::Null => Ok(format!(
                    "{field} IS {}NULL",
                    if negated { "NOT " } else { "" }
                )),
                Value::Array(items) => {
                    if items.is_empty() {
                        return Err(QbError::compile(format!(
                            "Empty list for IN condition on {field}"
                        )));
                    }
                    Ok(format!(
                        "{field} {}IN ({})",
                        if negated { "NOT " } else { "" },
                        value.to_literal()?
                    ))
                }
                _ => Ok(format!(
                    "{field} {} {}",
                    if negated { "!=" } else { "=" },
                    value.to_literal()?
                )),
            }
        }
        CmpOp::Between | CmpOp::NotBetween => {
            let Value::Array(items) = value else {
                return Err(QbError::compile(format!(
                    "BETWEEN on {field} requires a two-element list"
                )));
            };
            if items.len() != 2 {
                return Err(QbError::compile(format!(
                    "BETWEEN on {field} requires exactly two values, got {}",
                    items.len()
                )));
            }
            if items.iter().any(|item| matches!(item, Value::Array(_))) {
                return Err(QbError::compile(format!(
                    "BETWEEN on {field} requires scalar bounds"
                )));
            }
            Ok(format!(
                "({field}{} BETWEEN {} AND {})",
                if op == CmpOp::NotBetween { " NOT" } else { "" },
                items[0].to_literal()?,
                items[1].to_literal()?
            ))
        }
        CmpOp::Like | CmpOp::NotLike => build_like(&field, op == CmpOp::NotLike, value),
        CmpOp::Gt | CmpOp::Gte | CmpOp::Lt | CmpOp::Lte => {
            let symbol = match op {
                CmpOp::Gt => ">",
                CmpOp::Gte => ">=",
                CmpOp::Lt => "<",
                CmpOp::Lte => "<=",
                _ => unreachable!(),
            };
            match value {
                Value::Null | Value::Array(_) | Value::Bytes(_) => Err(QbError::compile(format!(
                    "Invalid value for {symbol} comparison on {field}"
                ))),
                _ => Ok(format!("{field} {symbol} {}", value.to_literal()?)),
            }
        }
    }
}

/// Compile a LIKE leaf. Multiple values become an OR group of predicates,
/// parenthesized when there is more than one.
fn build_like(field: &str, negated: bool, value: &Value) -> QbResult<String> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        single => vec![single],
    };
    if items.is_empty() {
        return Err(QbError::compile(format!(
            "Empty list for LIKE condition on {field}"
        )));
    }

    let mut predicates = Vec::with_capacity(items.len());
    for item in items {
        let text = match item {
            Value::Str(s) => s.clone(),
            Value::Int(n) => n.to_string(),
            Value::Uint(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            _ => {
                return Err(QbError::compile(format!(
                    "Invalid value for LIKE condition on {field}"
                )));
            }
        };
        if text.is_empty() {
            return Err(QbError::compile(format!(
                "Empty pattern for LIKE condition on {field}"
            )));
        }

        // Auto-wildcard unless the pattern is already anchored with `%` on
        // either end, or is a bind placeholder.
        let rendered = if is_bind_marker(&text) {
            text
        } else if !text.starts_with('%') && !text.ends_with('%') {
            quote_str(&format!("%{text}%"))
        } else {
            quote_str(&text)
        };

        predicates.push(format!(
            "{field}{} LIKE {rendered}",
            if negated { " NOT" } else { "" }
        ));
    }

    if predicates.len() >= 2 {
        Ok(format!("({})", predicates.join(" OR ")))
    } else {
        Ok(predicates.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(conds: &[Cond]) -> String {
        build_where(conds, Joiner::And, true, true).unwrap()
    }

    #[test]
    fn equality_by_value_type() {
        assert_eq!(
            compile(&[Cond::pair("age", 20).unwrap()]),
            "`age` = 20"
        );
        assert_eq!(
            compile(&[Cond::pair("name", "dave").unwrap()]),
            "`name` = 'dave'"
        );
        assert_eq!(
            compile(&[Cond::pair("deleted", Value::Null).unwrap()]),
            "`deleted` IS NULL"
        );
        assert_eq!(
            compile(&[Cond::pair("active", true).unwrap()]),
            "`active` = 1"
        );
    }

    #[test]
    fn negation_by_value_type() {
        assert_eq!(
            compile(&[Cond::pair("age|!", 20).unwrap()]),
            "`age` != 20"
        );
        assert_eq!(
            compile(&[Cond::pair("deleted|!", Value::Null).unwrap()]),
            "`deleted` IS NOT NULL"
        );
        assert_eq!(
            compile(&[Cond::pair("id|!", vec![1, 2]).unwrap()]),
            "`id` NOT IN (1, 2)"
        );
    }

    #[test]
    fn array_compiles_to_in_list() {
        assert_eq!(
            compile(&[Cond::pair("tag", vec!["a", "b"]).unwrap()]),
            "`tag` IN ('a', 'b')"
        );
    }

    #[test]
    fn empty_in_list_is_a_compile_error() {
        let cond = Cond::pair("tag", Vec::<i64>::new()).unwrap();
        let err = build_where(&[cond], Joiner::And, true, true).unwrap_err();
        assert!(err.is_compile());
    }

    #[test]
    fn between_renders_parenthesized() {
        assert_eq!(
            compile(&[Cond::pair("age|<>", vec![5, 10]).unwrap()]),
            "(`age` BETWEEN 5 AND 10)"
        );
        assert_eq!(
            compile(&[Cond::pair("age|><", vec![5, 10]).unwrap()]),
            "(`age` NOT BETWEEN 5 AND 10)"
        );
    }

    #[test]
    fn between_requires_exactly_two_values() {
        let one = Cond::pair("age|<>", vec![5]).unwrap();
        assert!(build_where(&[one], Joiner::And, true, true).is_err());
        let three = Cond::pair("age|<>", vec![5, 10, 15]).unwrap();
        assert!(build_where(&[three], Joiner::And, true, true).is_err());
        let scalar = Cond::pair("age|<>", 5).unwrap();
        assert!(build_where(&[scalar], Joiner::And, true, true).is_err());
    }

    #[test]
    fn like_auto_wildcards() {
        assert_eq!(
            compile(&[Cond::pair("title|~", "abc").unwrap()]),
            "`title` LIKE '%abc%'"
        );
    }

    #[test]
    fn like_keeps_existing_wildcards() {
        assert_eq!(
            compile(&[Cond::pair("title|~", "abc%").unwrap()]),
            "`title` LIKE 'abc%'"
        );
        assert_eq!(
            compile(&[Cond::pair("title|~", "%abc").unwrap()]),
            "`title` LIKE '%abc'"
        );
    }

    #[test]
    fn like_passes_bind_placeholder_through() {
        assert_eq!(
            compile(&[Cond::pair("title|~", ":kw").unwrap()]),
            "`title` LIKE :kw"
        );
    }

    #[test]
    fn like_multiple_values_or_grouped() {
        assert_eq!(
            compile(&[Cond::pair("title|~", vec!["abc", "def"]).unwrap()]),
            "(`title` LIKE '%abc%' OR `title` LIKE '%def%')"
        );
    }

    #[test]
    fn not_like() {
        assert_eq!(
            compile(&[Cond::pair("title|!~", "abc").unwrap()]),
            "`title` NOT LIKE '%abc%'"
        );
    }

    #[test]
    fn comparison_operators() {
        assert_eq!(
            compile(&[Cond::pair("user_id|>=", 20).unwrap()]),
            "`user_id` >= 20"
        );
        assert_eq!(
            compile(&[Cond::pair("score|<", 9.5).unwrap()]),
            "`score` < 9.5"
        );
        assert_eq!(
            compile(&[Cond::pair("name|>", "m").unwrap()]),
            "`name` > 'm'"
        );
    }

    #[test]
    fn comparison_rejects_null_and_lists() {
        let null = Cond::pair("a|>", Value::Null).unwrap();
        assert!(build_where(&[null], Joiner::And, true, true).is_err());
        let list = Cond::pair("a|>", vec![1, 2]).unwrap();
        assert!(build_where(&[list], Joiner::And, true, true).is_err());
    }

    #[test]
    fn unsupported_operator_is_rejected() {
        assert!(Cond::pair("a|=>", 1).is_err());
        assert!(Cond::pair("|>", 1).is_err());
    }

    #[test]
    fn root_is_bare_and_groups_are_parenthesized() {
        let conds = [
            Cond::pair("status", "active").unwrap(),
            Cond::any(vec![
                Cond::pair("role", "admin").unwrap(),
                Cond::pair("role", "owner").unwrap(),
            ]),
        ];
        assert_eq!(
            compile(&conds),
            "`status` = 'active' AND (`role` = 'admin' OR `role` = 'owner')"
        );
    }

    #[test]
    fn nested_groups_recurse() {
        let conds = [Cond::any(vec![
            Cond::all(vec![
                Cond::pair("a", 1).unwrap(),
                Cond::pair("b", 2).unwrap(),
            ]),
            Cond::pair("c", 3).unwrap(),
        ])];
        assert_eq!(compile(&conds), "((`a` = 1 AND `b` = 2) OR `c` = 3)");
    }

    #[test]
    fn raw_conditions_pass_through() {
        let conds = [
            Cond::raw("char_length(name) > 3"),
            Cond::pair("id|<", 100).unwrap(),
        ];
        assert_eq!(compile(&conds), "char_length(name) > 3 AND `id` < 100");
    }

    #[test]
    fn empty_tree_compiles_to_nothing() {
        assert_eq!(compile(&[]), "");
        assert_eq!(compile(&[Cond::all(vec![])]), "");
    }

    #[test]
    fn flat_tree_has_balanced_joiners() {
        let conds = [
            Cond::pair("a", 1).unwrap(),
            Cond::pair("b", 2).unwrap(),
            Cond::pair("c", 3).unwrap(),
        ];
        let sql = compile(&conds);
        assert_eq!(sql.matches(" AND ").count(), conds.len() - 1);
        assert_eq!(
            sql.matches('(').count(),
            sql.matches(')').count()
        );
    }

    #[test]
    fn bind_placeholder_value_is_not_escaped() {
        assert_eq!(
            compile(&[Cond::pair("user_id", "?").unwrap()]),
            "`user_id` = ?"
        );
        assert_eq!(
            compile(&[Cond::pair("user_id", ":uid").unwrap()]),
            "`user_id` = :uid"
        );
    }
}
