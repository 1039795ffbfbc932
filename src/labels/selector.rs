use crate::error::{StoreError, StoreResult};
use crate::labels::{MatchOp, Matcher, Matchers, METRIC_NAME_LABEL};
use regex::Regex;
use std::sync::LazyLock;

static MATCHER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*([a-zA-Z_][a-zA-Z0-9_]*)\s*(=~|!~|!=|=)\s*"((?:[^"\\]|\\.)*)"\s*$"#)
        .expect("static matcher pattern")
});

/// Parses a series selector of the form `name{label=~"value", ...}`.
///
/// Both the metric name and the braces are optional, but the selector must
/// contain at least one matcher overall. Values are double-quoted with
/// backslash escapes.
pub fn parse_selector(input: &str) -> StoreResult<Matchers> {
    let s = input.trim();
    if s.is_empty() {
        return Err(StoreError::InvalidQuery("empty series selector".into()));
    }

    let (name_part, rest) = match s.find('{') {
        None => (s, ""),
        Some(idx) => (s[..idx].trim_end(), &s[idx..]),
    };

    let mut matchers = Vec::new();
    if !name_part.is_empty() {
        if !is_valid_metric_name(name_part) {
            return Err(StoreError::InvalidQuery(format!(
                "invalid metric name {name_part:?} in selector"
            )));
        }
        matchers.push(Matcher::equal(METRIC_NAME_LABEL, name_part));
    }

    if !rest.is_empty() {
        if !rest.ends_with('}') {
            return Err(StoreError::InvalidQuery(format!(
                "unclosed matcher block in selector {s:?}"
            )));
        }
        let inner = &rest[1..rest.len() - 1];
        for item in split_matcher_items(inner)? {
            matchers.push(parse_matcher(item)?);
        }
    }

    if matchers.is_empty() {
        return Err(StoreError::InvalidQuery(format!(
            "selector {s:?} contains no matchers"
        )));
    }
    Ok(Matchers::new(matchers))
}

fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Splits the inside of a matcher block at commas that sit outside quoted
/// values.
fn split_matcher_items(inner: &str) -> StoreResult<Vec<&str>> {
    let mut items = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (idx, c) in inner.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                items.push(&inner[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    if in_quotes {
        return Err(StoreError::InvalidQuery(format!(
            "unterminated quoted value in selector block {inner:?}"
        )));
    }

    let tail = &inner[start..];
    if !tail.trim().is_empty() {
        items.push(tail);
    } else if start > 0 {
        // dangling comma such as `{a="b",}`
        return Err(StoreError::InvalidQuery(format!(
            "empty matcher in selector block {inner:?}"
        )));
    }
    // empty items between commas, such as `{a="b",,c="d"}`
    if items.iter().any(|item| item.trim().is_empty()) {
        return Err(StoreError::InvalidQuery(format!(
            "empty matcher in selector block {inner:?}"
        )));
    }
    Ok(items)
}

fn parse_matcher(item: &str) -> StoreResult<Matcher> {
    let caps = MATCHER_RE
        .captures(item)
        .ok_or_else(|| StoreError::InvalidQuery(format!("invalid matcher {:?}", item.trim())))?;

    let name = &caps[1];
    let op = match &caps[2] {
        "=" => MatchOp::Equal,
        "!=" => MatchOp::NotEqual,
        "=~" => MatchOp::RegexEqual,
        "!~" => MatchOp::RegexNotEqual,
        other => {
            return Err(StoreError::InvalidQuery(format!(
                "invalid match operator {other:?}"
            )))
        }
    };
    let value = enquote::unquote(&format!("\"{}\"", &caps[3]))
        .map_err(|e| StoreError::InvalidQuery(format!("invalid matcher value in {item:?}: {e}")))?;

    Matcher::new(op, name.to_string(), value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::Labels;

    #[test]
    fn test_bare_metric_name() {
        let matchers = parse_selector("allocs").unwrap();
        assert_eq!(matchers.0.len(), 1);
        assert!(matchers.matches(&Labels::from_pairs([("__name__", "allocs")])));
        assert!(!matchers.matches(&Labels::from_pairs([("__name__", "goroutine")])));
    }

    #[test]
    fn test_name_with_matchers() {
        let matchers = parse_selector(r#"allocs{foo="bar", instance!="web-1"}"#).unwrap();
        assert_eq!(matchers.0.len(), 3);
        assert!(matchers.matches(&Labels::from_pairs([
            ("__name__", "allocs"),
            ("foo", "bar"),
            ("instance", "web-2"),
        ])));
        assert!(!matchers.matches(&Labels::from_pairs([
            ("__name__", "allocs"),
            ("foo", "bar"),
            ("instance", "web-1"),
        ])));
    }

    #[test]
    fn test_braces_only() {
        let matchers = parse_selector(r#"{foo=~"b.*"}"#).unwrap();
        assert!(matchers.matches(&Labels::from_pairs([("foo", "bar")])));
        assert!(!matchers.matches(&Labels::from_pairs([("foo", "qux")])));
    }

    #[test]
    fn test_value_with_comma_and_escapes() {
        let matchers = parse_selector(r#"{note="a,b", quoted="say \"hi\""}"#).unwrap();
        assert!(matchers.matches(&Labels::from_pairs([
            ("note", "a,b"),
            ("quoted", r#"say "hi""#),
        ])));
    }

    #[test]
    fn test_empty_braces_with_name() {
        let matchers = parse_selector("allocs{}").unwrap();
        assert_eq!(matchers.0.len(), 1);
    }

    #[test]
    fn test_invalid_selectors() {
        for input in [
            "",
            "   ",
            "{}",
            "{foo}",
            "{foo=bar}",
            r#"{foo="bar"         "#,
            r#"{foo="bar}"#,
            r#"{foo="bar",}"#,
            r#"{foo="bar",   }"#,
            r#"{a="b",,c="d"}"#,
            r#"{,foo="bar"}"#,
            "1badname",
            r#"allocs{foo="bar"} trailing"#,
        ] {
            let result = parse_selector(input);
            assert!(
                matches!(result, Err(StoreError::InvalidQuery(_))),
                "selector {input:?} should be rejected, got {result:?}"
            );
        }
    }
}
