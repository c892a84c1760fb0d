//! Value rendering and pattern matching shared by the assertion operations.
//!
//! Messages print values the way rule authors have always seen them: booleans as
//! `True`/`False`, null as `None`, and lists as `['a', 'b']`.

use super::AssertError;
use crate::value::{ConfigValue, Scalar};
use regex::{Regex, RegexBuilder};

/// Text used for equality checks: booleans and `"true"`/`"false"` strings (any case)
/// become `True`/`False`, numbers their decimal text, null `None`.
pub(crate) fn canonical(value: &ConfigValue) -> String {
    match value {
        ConfigValue::Scalar(Scalar::Bool(b)) => bool_text(*b).to_string(),
        ConfigValue::Scalar(Scalar::String(s)) if s.eq_ignore_ascii_case("true") => {
            "True".to_string()
        }
        ConfigValue::Scalar(Scalar::String(s)) if s.eq_ignore_ascii_case("false") => {
            "False".to_string()
        }
        other => display(other),
    }
}

/// Plain rendering: strings unquoted, everything else as [`repr`].
pub(crate) fn display(value: &ConfigValue) -> String {
    match value {
        ConfigValue::Scalar(Scalar::String(s)) => s.clone(),
        ConfigValue::Reference(_) | ConfigValue::FunctionCall(_) | ConfigValue::Arithmetic(_) => {
            value.to_text()
        }
        other => repr(other),
    }
}

/// Quoted rendering used inside lists and maps.
pub(crate) fn repr(value: &ConfigValue) -> String {
    match value {
        ConfigValue::Scalar(Scalar::Null) => "None".to_string(),
        ConfigValue::Scalar(Scalar::Bool(b)) => bool_text(*b).to_string(),
        ConfigValue::Scalar(Scalar::Number(n)) => n.to_string(),
        ConfigValue::Scalar(Scalar::String(s)) => quote(s),
        ConfigValue::Sequence(items) => {
            let inner: Vec<String> = items.iter().map(repr).collect();
            format!("[{}]", inner.join(", "))
        }
        ConfigValue::Mapping(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", quote(k), repr(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
        other => quote(&other.to_text()),
    }
}

/// The actual value in list-operation messages: a list prints with every element
/// as a string, anything else prints plainly.
pub(crate) fn list_actual(value: &ConfigValue) -> String {
    match value {
        ConfigValue::Sequence(items) => {
            let inner: Vec<String> = items.iter().map(|i| quote(&display(i))).collect();
            format!("[{}]", inner.join(", "))
        }
        other => display(other),
    }
}

pub(crate) fn list_repr(values: &[ConfigValue]) -> String {
    let inner: Vec<String> = values.iter().map(repr).collect();
    format!("[{}]", inner.join(", "))
}

fn bool_text(b: bool) -> &'static str {
    if b { "True" } else { "False" }
}

fn quote(s: &str) -> String {
    let delimiter = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(delimiter);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == delimiter => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(delimiter);
    out
}

/// A rule pattern matched against the whole text: `^`/`$` are added when missing,
/// and `.` also matches newlines when the text spans several lines.
#[derive(Clone, Debug)]
pub(crate) struct Pattern {
    source: String,
    single_line: Regex,
    multi_line: Regex,
}

impl Pattern {
    pub(crate) fn new(pattern: &str) -> Result<Self, AssertError> {
        let mut anchored = String::with_capacity(pattern.len() + 2);
        if !pattern.starts_with('^') {
            anchored.push('^');
        }
        anchored.push_str(pattern);
        if !pattern.ends_with('$') {
            anchored.push('$');
        }
        let build = |dot_all: bool| {
            RegexBuilder::new(&anchored)
                .dot_matches_new_line(dot_all)
                .build()
                .map_err(|source| AssertError::Pattern {
                    pattern: pattern.to_string(),
                    source,
                })
        };
        Ok(Self {
            source: pattern.to_string(),
            single_line: build(false)?,
            multi_line: build(true)?,
        })
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.source
    }

    pub(crate) fn is_match(&self, text: &str) -> bool {
        if text.contains('\n') {
            self.multi_line.is_match(text)
        } else {
            self.single_line.is_match(text)
        }
    }

    /// Match against the plain rendering of a value.
    pub(crate) fn matches_value(&self, value: &ConfigValue) -> bool {
        self.is_match(&display(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_text_normalizes_booleans() {
        assert_eq!(canonical(&true.into()), "True");
        assert_eq!(canonical(&"TRUE".into()), "True");
        assert_eq!(canonical(&"false".into()), "False");
        assert_eq!(canonical(&1.into()), "1");
        assert_eq!(canonical(&ConfigValue::null()), "None");
        assert_eq!(canonical(&"private".into()), "private");
    }

    #[test]
    fn repr_quotes_like_rule_authors_expect() {
        let list = ConfigValue::from(vec![
            ConfigValue::from("a"),
            ConfigValue::from(1),
            ConfigValue::from(true),
        ]);
        assert_eq!(repr(&list), "['a', 1, True]");
        assert_eq!(list_actual(&list), "['a', '1', 'True']");
        assert_eq!(repr(&"it's".into()), "\"it's\"");
        let map = ConfigValue::Mapping(
            [("k".to_string(), ConfigValue::from("v"))]
                .into_iter()
                .collect(),
        );
        assert_eq!(display(&map), "{'k': 'v'}");
    }

    #[test]
    fn patterns_are_anchored() {
        let p = Pattern::new("aws_s3.*").expect("pattern");
        assert!(p.is_match("aws_s3_bucket"));
        assert!(!p.is_match("x_aws_s3_bucket"));
        let p = Pattern::new("^web$").expect("pattern");
        assert!(p.is_match("web"));
        assert!(!p.is_match("webserver"));
    }

    #[test]
    fn multi_line_text_matches_across_newlines() {
        let p = Pattern::new(".*Statement.*").expect("pattern");
        assert!(p.is_match("{\n  \"Statement\": []\n}"));
    }

    #[test]
    fn invalid_patterns_are_errors() {
        assert!(matches!(Pattern::new("("), Err(AssertError::Pattern { .. })));
    }
}
