//! Reference AST and the parser that builds it from decoded strings.
//!
//! Strings are parsed once. `${...}` interpolations become [`Interpolation`] nodes, each
//! carrying its own [`ReferenceState`]; a string that is exactly a bare reference
//! (`var.x`, `local.m[local.k]`) is treated as a single whole-value interpolation.

use crate::functions::{Arithmetic, Function, FunctionCall, Operator};
use crate::value::{ConfigValue, Scalar};
use serde_json::Number;
use std::fmt;

/// Resolution progress of one interpolation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferenceState {
    /// Never attempted.
    Unresolved,
    /// Attempted on the first pass without success; retried on the second.
    PendingRetry,
    /// Permanently unresolvable. Never retried.
    Failed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    pub parts: Vec<TemplatePart>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TemplatePart {
    Literal(String),
    Interpolation(Interpolation),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Interpolation {
    pub expr: Expr,
    pub state: ReferenceState,
    /// Original text, including `${` and `}` when present.
    pub source: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Reference(Reference),
    /// Literals, lists, function calls and arithmetic.
    Value(ConfigValue),
    /// Conditionals, comparisons, resource attributes and anything else the engine
    /// does not evaluate.
    Unsupported,
    /// `${` with no matching `}`.
    Unterminated,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Reference {
    pub root: Root,
    pub accessors: Vec<Accessor>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Root {
    Variable(String),
    Local(String),
    Module(String),
    /// `data.<type>.<name>...`; the type and name are the leading accessors.
    Data,
    Workspace,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Accessor {
    Attr(String),
    Index(Box<ConfigValue>),
}

impl Interpolation {
    pub fn new(expr: Expr, source: impl Into<String>) -> Self {
        Self {
            expr,
            state: ReferenceState::Unresolved,
            source: source.into(),
        }
    }
}

impl Template {
    pub fn single(interpolation: Interpolation) -> Self {
        Self {
            parts: vec![TemplatePart::Interpolation(interpolation)],
        }
    }

    /// The template is one interpolation with no surrounding text, so its resolved
    /// value keeps its own type.
    pub fn is_whole(&self) -> bool {
        matches!(self.parts.as_slice(), [TemplatePart::Interpolation(_)])
    }

    pub fn interpolations(&self) -> impl Iterator<Item = &Interpolation> {
        self.parts.iter().filter_map(|p| match p {
            TemplatePart::Interpolation(i) => Some(i),
            TemplatePart::Literal(_) => None,
        })
    }

    pub fn is_settled(&self) -> bool {
        self.interpolations()
            .all(|i| i.state == ReferenceState::Failed)
    }

    pub fn source_text(&self) -> String {
        self.parts
            .iter()
            .map(|p| match p {
                TemplatePart::Literal(s) => s.as_str(),
                TemplatePart::Interpolation(i) => i.source.as_str(),
            })
            .collect()
    }

    /// Collapse to a plain string when no interpolation is left.
    pub fn into_value(self) -> ConfigValue {
        if self.interpolations().next().is_none() {
            return ConfigValue::string(self.source_text());
        }
        ConfigValue::Reference(self)
    }
}

impl Root {
    fn keyword(&self) -> &'static str {
        match self {
            Root::Variable(_) => "var",
            Root::Local(_) => "local",
            Root::Module(_) => "module",
            Root::Data => "data",
            Root::Workspace => "terraform",
        }
    }
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Root::Variable(n) | Root::Local(n) | Root::Module(n) => {
                write!(f, "{}.{}", self.keyword(), n)
            }
            Root::Data => f.write_str("data"),
            Root::Workspace => f.write_str("terraform.workspace"),
        }
    }
}

impl Reference {
    /// Key used against variable overrides, and how many accessors it consumed.
    ///
    /// `data.` references consume their whole attribute chain; other roots consume none.
    pub fn override_key(&self) -> (String, usize) {
        let mut key = self.root.to_string();
        if self.root != Root::Data {
            return (key, 0);
        }
        let mut consumed = 0;
        for accessor in &self.accessors {
            match accessor {
                Accessor::Attr(a) => {
                    key.push('.');
                    key.push_str(a);
                    consumed += 1;
                }
                Accessor::Index(_) => break,
            }
        }
        (key, consumed)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for accessor in &self.accessors {
            match accessor {
                Accessor::Attr(a) => write!(f, ".{a}")?,
                Accessor::Index(v) => match v.as_ref() {
                    ConfigValue::Scalar(Scalar::String(s)) => write!(f, "[\"{s}\"]")?,
                    other => write!(f, "[{other}]")?,
                },
            }
        }
        Ok(())
    }
}

const BARE_PREFIXES: [&str; 5] = ["var.", "local.", "module.", "data.", "terraform.workspace"];

/// Parse a decoded string into a scalar or a reference template.
pub fn parse_string(s: &str) -> ConfigValue {
    if s.contains("${") {
        return parse_template(s).into_value();
    }
    if BARE_PREFIXES.iter().any(|p| s.starts_with(p)) {
        let mut parser = ExprParser::new(s);
        if let Some(Operand::Reference(reference, _)) = parser.operand() {
            if parser.at_end() {
                return ConfigValue::Reference(Template::single(Interpolation::new(
                    Expr::Reference(reference),
                    s,
                )));
            }
        }
    }
    ConfigValue::string(s)
}

fn parse_template(s: &str) -> Template {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut rest = s;

    while let Some(pos) = rest.find("${") {
        if rest[..pos].ends_with('$') {
            // `$${` is an escaped literal `${`.
            literal.push_str(&rest[..pos - 1]);
            literal.push_str("${");
            rest = &rest[pos + 2..];
            continue;
        }
        literal.push_str(&rest[..pos]);
        if !literal.is_empty() {
            parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
        }

        let body = &rest[pos + 2..];
        match find_closing_brace(body) {
            Some(end) => {
                let source = &rest[pos..pos + 2 + end + 1];
                parts.push(TemplatePart::Interpolation(Interpolation::new(
                    parse_expr(&body[..end]),
                    source,
                )));
                rest = &body[end + 1..];
            }
            None => {
                parts.push(TemplatePart::Interpolation(Interpolation::new(
                    Expr::Unterminated,
                    &rest[pos..],
                )));
                rest = "";
            }
        }
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        parts.push(TemplatePart::Literal(literal));
    }
    Template { parts }
}

/// Byte offset of the `}` closing an interpolation body, honoring nested braces and
/// quoted strings.
fn find_closing_brace(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn parse_expr(body: &str) -> Expr {
    let mut parser = ExprParser::new(body);
    match parser.expression() {
        Some(Operand::Reference(reference, _)) if parser.at_end() => Expr::Reference(reference),
        Some(Operand::Value(value)) if parser.at_end() => Expr::Value(value),
        _ => Expr::Unsupported,
    }
}

enum Operand {
    Reference(Reference, String),
    Value(ConfigValue),
}

impl Operand {
    fn into_value(self) -> ConfigValue {
        match self {
            Operand::Value(v) => v,
            Operand::Reference(reference, source) => ConfigValue::Reference(Template::single(
                Interpolation::new(Expr::Reference(reference), source),
            )),
        }
    }
}

struct ExprParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> ExprParser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.src[self.pos..].chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> Option<()> {
        (self.bump()? == expected).then_some(())
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.pos == self.src.len()
    }

    fn expression(&mut self) -> Option<Operand> {
        let lhs = self.operand()?;
        self.skip_ws();
        let op = match (self.peek(), self.peek_second()) {
            (Some(c), next) if next != Some('=') => Operator::from_char(c),
            _ => None,
        };
        let Some(op) = op else {
            return Some(lhs);
        };
        self.bump();
        let rhs = self.operand()?;
        Some(Operand::Value(ConfigValue::Arithmetic(Box::new(Arithmetic {
            lhs: lhs.into_value(),
            op,
            rhs: rhs.into_value(),
        }))))
    }

    fn operand(&mut self) -> Option<Operand> {
        self.skip_ws();
        match self.peek()? {
            '"' => self.string_literal(),
            '[' => self.list_literal(),
            '(' => {
                self.bump();
                let inner = self.expression()?;
                self.skip_ws();
                self.eat(')')?;
                Some(inner)
            }
            c if c.is_ascii_digit() => self.number(),
            '-' if self.peek_second().is_some_and(|c| c.is_ascii_digit()) => self.number(),
            c if c.is_ascii_alphabetic() || c == '_' => self.identifier_operand(),
            _ => None,
        }
    }

    fn ident(&mut self) -> &'a str {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn identifier_operand(&mut self) -> Option<Operand> {
        let start = self.pos;
        let name = self.ident();
        if self.peek() == Some('(') {
            return self.call(name);
        }
        match name {
            "true" => Some(Operand::Value(true.into())),
            "false" => Some(Operand::Value(false.into())),
            "null" => Some(Operand::Value(ConfigValue::null())),
            "var" | "local" | "module" | "data" | "terraform" => self.reference(name, start),
            _ => None,
        }
    }

    fn reference(&mut self, keyword: &str, start: usize) -> Option<Operand> {
        self.eat('.')?;
        let first = self.ident();
        if first.is_empty() {
            return None;
        }
        let mut accessors = Vec::new();
        let root = match keyword {
            "var" => Root::Variable(first.to_string()),
            "local" => Root::Local(first.to_string()),
            "module" => Root::Module(first.to_string()),
            "data" => {
                accessors.push(Accessor::Attr(first.to_string()));
                Root::Data
            }
            _ if first == "workspace" => Root::Workspace,
            _ => return None,
        };

        loop {
            match self.peek() {
                // `...` closes a splat argument, not an attribute access.
                Some('.') if self.src[self.pos..].starts_with("...") => break,
                Some('.') => {
                    self.bump();
                    let attr = self.ident();
                    if attr.is_empty() {
                        return None;
                    }
                    accessors.push(Accessor::Attr(attr.to_string()));
                }
                Some('[') => {
                    self.bump();
                    let index = self.expression()?;
                    self.skip_ws();
                    self.eat(']')?;
                    accessors.push(Accessor::Index(Box::new(index.into_value())));
                }
                _ => break,
            }
        }

        if root == Root::Data
            && accessors
                .iter()
                .filter(|a| matches!(a, Accessor::Attr(_)))
                .count()
                < 2
        {
            return None;
        }

        let source = self.src[start..self.pos].to_string();
        Some(Operand::Reference(Reference { root, accessors }, source))
    }

    fn call(&mut self, name: &str) -> Option<Operand> {
        let function = Function::from_name(name)?;
        self.eat('(')?;
        let mut args = Vec::new();
        let mut splat = false;
        self.skip_ws();
        if self.peek() == Some(')') {
            self.bump();
        } else {
            loop {
                args.push(self.expression()?.into_value());
                self.skip_ws();
                if self.src[self.pos..].starts_with("...") {
                    self.pos += 3;
                    splat = true;
                    self.skip_ws();
                    self.eat(')')?;
                    break;
                }
                match self.bump()? {
                    ',' => {
                        self.skip_ws();
                        if self.peek() == Some(')') {
                            self.bump();
                            break;
                        }
                    }
                    ')' => break,
                    _ => return None,
                }
            }
        }
        Some(Operand::Value(ConfigValue::FunctionCall(FunctionCall {
            function,
            args,
            splat,
        })))
    }

    fn string_literal(&mut self) -> Option<Operand> {
        self.eat('"')?;
        let mut text = String::new();
        loop {
            match self.bump()? {
                '"' => break,
                '\\' => match self.bump()? {
                    'n' => text.push('\n'),
                    't' => text.push('\t'),
                    'r' => text.push('\r'),
                    '"' => text.push('"'),
                    '\\' => text.push('\\'),
                    other => {
                        text.push('\\');
                        text.push(other);
                    }
                },
                c => text.push(c),
            }
        }
        Some(Operand::Value(parse_string(&text)))
    }

    fn list_literal(&mut self) -> Option<Operand> {
        self.eat('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(']') {
                self.bump();
                break;
            }
            items.push(self.expression()?.into_value());
            self.skip_ws();
            match self.bump()? {
                ',' => continue,
                ']' => break,
                _ => return None,
            }
        }
        Some(Operand::Value(ConfigValue::Sequence(items)))
    }

    fn number(&mut self) -> Option<Operand> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump();
        }
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E')
        {
            self.bump();
        }
        let text = &self.src[start..self.pos];
        let number = match text.parse::<i64>() {
            Ok(i) => Number::from(i),
            Err(_) => Number::from_f64(text.parse::<f64>().ok()?)?,
        };
        Some(Operand::Value(ConfigValue::Scalar(Scalar::Number(number))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn whole_expr(s: &str) -> Expr {
        match parse_string(s) {
            ConfigValue::Reference(t) => {
                assert!(t.is_whole(), "expected whole-value template for {s}");
                match t.parts.into_iter().next() {
                    Some(TemplatePart::Interpolation(i)) => i.expr,
                    _ => unreachable!(),
                }
            }
            other => panic!("expected reference for {s}, got {other:?}"),
        }
    }

    #[test]
    fn braced_variable_reference() {
        let Expr::Reference(r) = whole_expr("${var.region}") else {
            panic!("expected reference");
        };
        assert_eq!(r.root, Root::Variable("region".to_string()));
        assert!(r.accessors.is_empty());
    }

    #[test]
    fn bare_reference_with_nested_subscript() {
        let Expr::Reference(r) = whole_expr("local.env_vpc_id2[local.env2]") else {
            panic!("expected reference");
        };
        assert_eq!(r.root, Root::Local("env_vpc_id2".to_string()));
        let [Accessor::Index(index)] = r.accessors.as_slice() else {
            panic!("expected one index accessor");
        };
        assert!(matches!(index.as_ref(), ConfigValue::Reference(_)));
    }

    #[test]
    fn partial_template_keeps_literal_text() {
        let ConfigValue::Reference(t) =
            parse_string("sf-${module.common.account_name}-${local.vpc_type}")
        else {
            panic!("expected template");
        };
        assert!(!t.is_whole());
        assert_eq!(t.parts.len(), 4);
        assert_eq!(
            t.source_text(),
            "sf-${module.common.account_name}-${local.vpc_type}"
        );
    }

    #[test]
    fn function_calls_parse_into_calls() {
        let Expr::Value(ConfigValue::FunctionCall(call)) =
            whole_expr(r#"${coalescelist(var.lists...)}"#)
        else {
            panic!("expected call");
        };
        assert_eq!(call.function, Function::Coalescelist);
        assert!(call.splat);
        assert_eq!(call.args.len(), 1);
    }

    #[test]
    fn arithmetic_parses_into_triple() {
        let Expr::Value(ConfigValue::Arithmetic(a)) = whole_expr("${var.count * 2}") else {
            panic!("expected arithmetic");
        };
        assert_eq!(a.op, Operator::Mul);
    }

    #[test]
    fn conditionals_and_resource_attributes_are_unsupported() {
        assert_eq!(whole_expr(r#"${var.a == "x" ? 1 : 2}"#), Expr::Unsupported);
        assert_eq!(whole_expr("${aws_instance.web.id}"), Expr::Unsupported);
        assert_eq!(whole_expr("${lookup(var.m, \"k\")}"), Expr::Unsupported);
    }

    #[test]
    fn unterminated_interpolation_is_flagged() {
        assert_eq!(whole_expr("${var.a"), Expr::Unterminated);
    }

    #[test]
    fn escaped_interpolation_is_literal() {
        assert_eq!(parse_string("$${not.a.ref}"), ConfigValue::string("${not.a.ref}"));
    }

    #[test]
    fn plain_text_mentioning_prefixes_is_literal() {
        assert_eq!(parse_string("my var.x value"), ConfigValue::string("my var.x value"));
        assert_eq!(parse_string("data.txt"), ConfigValue::string("data.txt"));
    }

    #[test]
    fn override_key_covers_data_attribute_chain() {
        let Expr::Reference(r) = whole_expr("${data.aws_ami.ubuntu.id}") else {
            panic!("expected reference");
        };
        assert_eq!(r.override_key(), ("data.aws_ami.ubuntu.id".to_string(), 3));
    }

    proptest! {
        #[test]
        fn parser_never_panics(input in ".*") {
            let _ = parse_string(&input);
        }

        #[test]
        fn source_text_round_trips(input in r"[a-z ${}.\[\]]{0,40}") {
            prop_assume!(!input.contains("$${"));
            let value = parse_string(&input);
            prop_assert_eq!(value.to_text(), input);
        }
    }
}
