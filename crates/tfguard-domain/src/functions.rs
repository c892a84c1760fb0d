//! Interpolation functions and arithmetic.
//!
//! Both only evaluate over fully resolved arguments; callers keep the node in place
//! and retry on a later pass otherwise.

use crate::value::{ConfigValue, Mapping, Scalar};
use serde_json::Number;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Function {
    Join,
    Merge,
    Concat,
    Element,
    Coalesce,
    Coalescelist,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "join" => Some(Function::Join),
            "merge" => Some(Function::Merge),
            "concat" => Some(Function::Concat),
            "element" => Some(Function::Element),
            "coalesce" => Some(Function::Coalesce),
            "coalescelist" => Some(Function::Coalescelist),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Join => "join",
            Function::Merge => "merge",
            Function::Concat => "concat",
            Function::Element => "element",
            Function::Coalesce => "coalesce",
            Function::Coalescelist => "coalescelist",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionCall {
    pub function: Function,
    pub args: Vec<ConfigValue>,
    /// Trailing `...` on the last argument.
    pub splat: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
}

impl Operator {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Operator::Add),
            '-' => Some(Operator::Sub),
            '*' => Some(Operator::Mul),
            '/' => Some(Operator::Div),
            _ => None,
        }
    }

    pub fn from_symbol(s: &str) -> Option<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Operator::from_char(c),
            _ => None,
        }
    }

    fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Sub => '-',
            Operator::Mul => '*',
            Operator::Div => '/',
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Arithmetic {
    pub lhs: ConfigValue,
    pub op: Operator,
    pub rhs: ConfigValue,
}

impl FunctionCall {
    /// Evaluate the call. `None` means the call has to stay as it is for now.
    pub fn evaluate(&self) -> Option<ConfigValue> {
        if !self.args.iter().all(ConfigValue::is_resolved) {
            return None;
        }
        match self.function {
            Function::Join => join(&self.args),
            Function::Merge => Some(merge(&self.args)),
            Function::Concat => Some(concat(&self.args)),
            Function::Element => element(&self.args),
            Function::Coalesce | Function::Coalescelist => Some(self.coalesce()),
        }
    }

    fn coalesce(&self) -> ConfigValue {
        let candidates: &[ConfigValue] = match (self.splat, self.args.first()) {
            (true, Some(ConfigValue::Sequence(items))) => items,
            _ => &self.args,
        };
        candidates
            .iter()
            .find(|v| v.is_truthy())
            .cloned()
            .unwrap_or_else(ConfigValue::null)
    }
}

fn join(args: &[ConfigValue]) -> Option<ConfigValue> {
    let (delimiter, lists) = args.split_first()?;
    let delimiter = delimiter.as_scalar()?.to_text();
    let mut parts = Vec::new();
    for list in lists {
        for item in list.as_sequence()? {
            parts.push(item.as_scalar()?.to_text());
        }
    }
    Some(ConfigValue::string(parts.join(&delimiter)))
}

fn merge(args: &[ConfigValue]) -> ConfigValue {
    let mut merged = Mapping::new();
    for arg in args {
        match arg {
            ConfigValue::Mapping(map) => {
                for (k, v) in map {
                    merged.insert(k.clone(), v.clone());
                }
            }
            ConfigValue::Scalar(s) => {
                merged.insert(s.to_text(), arg.clone());
            }
            _ => {}
        }
    }
    ConfigValue::Mapping(merged)
}

fn concat(args: &[ConfigValue]) -> ConfigValue {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            ConfigValue::Sequence(items) => out.extend(items.iter().cloned()),
            other => out.push(other.clone()),
        }
    }
    ConfigValue::Sequence(out)
}

fn element(args: &[ConfigValue]) -> Option<ConfigValue> {
    let [list, index] = args else {
        return None;
    };
    let items = list.as_sequence()?;
    if items.is_empty() || items.iter().any(|i| i.as_str() == Some("*")) {
        return None;
    }
    let index = index.as_scalar()?.as_f64()?;
    if index < 0.0 || index.fract() != 0.0 {
        return None;
    }
    let index = (index as usize) % items.len();
    items.get(index).cloned()
}

impl Arithmetic {
    pub fn evaluate(&self) -> Option<ConfigValue> {
        evaluate_numeric(self.lhs.as_scalar()?, self.op, self.rhs.as_scalar()?)
    }
}

/// `[operand, "+"|"-"|"*"|"/", operand]` sequences evaluate to a number once both
/// operands are numeric.
pub fn evaluate_triple(items: &[ConfigValue]) -> Option<ConfigValue> {
    let [lhs, op, rhs] = items else {
        return None;
    };
    let op = Operator::from_symbol(op.as_str()?)?;
    evaluate_numeric(lhs.as_scalar()?, op, rhs.as_scalar()?)
}

fn evaluate_numeric(lhs: &Scalar, op: Operator, rhs: &Scalar) -> Option<ConfigValue> {
    let integral = |s: &Scalar| match s {
        Scalar::Number(n) => n.as_i64(),
        _ => None,
    };
    if let (Some(a), Some(b)) = (integral(lhs), integral(rhs)) {
        let exact = match op {
            Operator::Add => a.checked_add(b),
            Operator::Sub => a.checked_sub(b),
            Operator::Mul => a.checked_mul(b),
            Operator::Div => None,
        };
        if let Some(n) = exact {
            return Some(ConfigValue::Scalar(Scalar::Number(Number::from(n))));
        }
    }

    let (a, b) = (lhs.as_f64()?, rhs.as_f64()?);
    let result = match op {
        Operator::Add => a + b,
        Operator::Sub => a - b,
        Operator::Mul => a * b,
        Operator::Div if b == 0.0 => return None,
        Operator::Div => a / b,
    };
    ConfigValue::number_f64(result)
}

fn write_arg(f: &mut fmt::Formatter<'_>, arg: &ConfigValue) -> fmt::Result {
    match arg {
        ConfigValue::Scalar(Scalar::String(s)) => write!(f, "\"{s}\""),
        other => write!(f, "{other}"),
    }
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.function.name())?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write_arg(f, arg)?;
        }
        if self.splat {
            f.write_str("...")?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for Arithmetic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_arg(f, &self.lhs)?;
        write!(f, " {} ", self.op.symbol())?;
        write_arg(f, &self.rhs)
    }
}
