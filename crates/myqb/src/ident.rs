//! Identifier quoting.
//!
//! MySQL identifiers are wrapped in backticks per dotted segment. A handful
//! of inputs deliberately pass through unchanged:
//!
//! - escaping disabled for the in-flight statement,
//! - empty or numeric input,
//! - input containing `(`, `)`, `+`, `-`, `/`, or `%`, taken as an already
//!   raw expression. This is a heuristic, kept for compatibility: a plain
//!   identifier containing one of those characters will not be quoted.
//!
//! Comma-separated lists expand with every segment quoted individually, and
//! dotted `table.column` names quote each side of the first dot. `*` is
//! never quoted.

use crate::error::{QbError, QbResult};

/// Quote an identifier (or identifier list) for use in generated SQL.
pub fn quote_key(key: &str, escape: bool) -> QbResult<String> {
    if !escape {
        return Ok(key.to_string());
    }

    if key.is_empty() || key.parse::<f64>().is_ok() {
        return Ok(key.to_string());
    }

    // Raw-expression heuristic.
    if key.contains(['(', ')', '+', '-', '/', '%']) {
        return Ok(key.to_string());
    }

    let key: String = key.chars().filter(|c| *c != ' ' && *c != '`').collect();

    if key.contains(',') {
        let mut parts = Vec::new();
        for segment in key.split(',') {
            if segment.is_empty() {
                return Err(QbError::compile("Empty segment in identifier list"));
            }
            parts.push(quote_key(segment, true)?);
        }
        return Ok(parts.join(", "));
    }

    let segments: Vec<&str> = if key.contains('.') {
        key.splitn(2, '.').collect()
    } else {
        vec![key.as_str()]
    };

    let quoted: Vec<String> = segments
        .iter()
        .map(|segment| {
            if *segment == "*" {
                (*segment).to_string()
            } else {
                format!("`{segment}`")
            }
        })
        .collect();

    Ok(quoted.join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_identifier() {
        assert_eq!(quote_key("user_id", true).unwrap(), "`user_id`");
    }

    #[test]
    fn dotted_identifier() {
        assert_eq!(quote_key("user.name", true).unwrap(), "`user`.`name`");
    }

    #[test]
    fn star_is_never_quoted() {
        assert_eq!(quote_key("*", true).unwrap(), "*");
        assert_eq!(quote_key("user.*", true).unwrap(), "`user`.*");
    }

    #[test]
    fn comma_list_expands() {
        assert_eq!(
            quote_key("user_id, username", true).unwrap(),
            "`user_id`, `username`"
        );
    }

    #[test]
    fn empty_list_segment_is_rejected() {
        assert!(quote_key("a,,b", true).unwrap_err().is_compile());
    }

    #[test]
    fn raw_expressions_pass_through() {
        assert_eq!(quote_key("COUNT(id)", true).unwrap(), "COUNT(id)");
        assert_eq!(quote_key("a+b", true).unwrap(), "a+b");
        assert_eq!(quote_key("score%10", true).unwrap(), "score%10");
    }

    #[test]
    fn numeric_and_empty_pass_through() {
        assert_eq!(quote_key("42", true).unwrap(), "42");
        assert_eq!(quote_key("4.2", true).unwrap(), "4.2");
        assert_eq!(quote_key("", true).unwrap(), "");
    }

    #[test]
    fn escaping_disabled_passes_through() {
        assert_eq!(quote_key("user_id", false).unwrap(), "user_id");
    }

    #[test]
    fn stray_backticks_are_stripped() {
        assert_eq!(quote_key("`user_id`", true).unwrap(), "`user_id`");
        assert_eq!(quote_key("user . name", true).unwrap(), "`user`.`name`");
    }

    #[test]
    fn quoting_is_idempotent() {
        let once = quote_key("user.name", true).unwrap();
        assert_eq!(quote_key(&once, true).unwrap(), once);
    }
}
