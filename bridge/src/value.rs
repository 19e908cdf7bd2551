//! Values exchanged with the macro engine
//!
//! The macro engine only knows two scalar kinds, told apart by the first
//! character of a variable name: `#` for integers and `$` for strings.
//! Extension values are reduced to one of the two with [`coerce`], which
//! tries, in order:
//!
//! 1. `bool` maps to `1`/`0`
//! 2. integer parse of the value's string form
//! 3. float parse, truncated toward zero (lossy: `3.7` becomes `3`)
//! 4. the string form itself

use std::fmt;

/// A value handed to the bridge by the extension.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(n.into())
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(x.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<MacroValue> for Value {
    fn from(v: MacroValue) -> Self {
        match v {
            MacroValue::Int(n) => Value::Int(n),
            MacroValue::Str(s) => Value::Str(s),
        }
    }
}

/// Variable namespace of the macro engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// `#name`
    Numeric,
    /// `$name`
    Text,
}

impl Namespace {
    /// Namespace of a variable name, from its prefix.
    pub fn of(name: &str) -> Option<Namespace> {
        match name.chars().next() {
            Some('#') => Some(Namespace::Numeric),
            Some('$') => Some(Namespace::Text),
            _ => None,
        }
    }

    pub fn prefix(self) -> char {
        match self {
            Namespace::Numeric => '#',
            Namespace::Text => '$',
        }
    }
}

/// A scalar as the macro engine holds it.
///
/// The variant is the type discriminator reported by the read path; no
/// inspection of the payload is needed to tell the kinds apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MacroValue {
    Int(i64),
    Str(String),
}

impl MacroValue {
    pub fn namespace(&self) -> Namespace {
        match self {
            MacroValue::Int(_) => Namespace::Numeric,
            MacroValue::Str(_) => Namespace::Text,
        }
    }

    /// The reset value of a namespace: `0` or `""`.
    pub fn zero(ns: Namespace) -> MacroValue {
        match ns {
            Namespace::Numeric => MacroValue::Int(0),
            Namespace::Text => MacroValue::Str(String::new()),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            MacroValue::Int(n) => Some(*n),
            MacroValue::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MacroValue::Int(_) => None,
            MacroValue::Str(s) => Some(s),
        }
    }

    /// The value as macro source: a decimal number, or a raw `@"..."`
    /// string with quotes doubled.
    pub fn literal(&self) -> String {
        match self {
            MacroValue::Int(n) => n.to_string(),
            MacroValue::Str(s) => format!("@\"{}\"", s.replace('"', "\"\"")),
        }
    }

    /// Fit the value into `ns`.
    ///
    /// Integers always fit the string namespace as their decimal form.
    /// Strings fit the numeric namespace only when they coerce to an integer.
    pub fn conform(self, ns: Namespace) -> Option<MacroValue> {
        match (ns, self) {
            (Namespace::Numeric, v @ MacroValue::Int(_)) => Some(v),
            (Namespace::Numeric, MacroValue::Str(s)) => match coerce(&Value::Str(s)) {
                v @ MacroValue::Int(_) => Some(v),
                MacroValue::Str(_) => None,
            },
            (Namespace::Text, MacroValue::Int(n)) => Some(MacroValue::Str(n.to_string())),
            (Namespace::Text, v @ MacroValue::Str(_)) => Some(v),
        }
    }
}

impl fmt::Display for MacroValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacroValue::Int(n) => write!(f, "{}", n),
            MacroValue::Str(s) => f.write_str(s),
        }
    }
}

/// Reduce an extension value to a macro scalar.
pub fn coerce(value: &Value) -> MacroValue {
    match value {
        Value::Bool(b) => MacroValue::Int(i64::from(*b)),
        Value::Int(n) => MacroValue::Int(*n),
        Value::Float(x) => truncate(*x).unwrap_or_else(|| MacroValue::Str(x.to_string())),
        Value::Str(s) => coerce_str(s),
    }
}

fn coerce_str(s: &str) -> MacroValue {
    let trimmed = s.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return MacroValue::Int(n);
    }
    if let Some(v) = trimmed.parse::<f64>().ok().and_then(truncate) {
        return v;
    }
    MacroValue::Str(s.to_string())
}

/// Truncate toward zero. Out-of-range values saturate; NaN and infinities
/// are not numbers to the macro engine.
fn truncate(x: f64) -> Option<MacroValue> {
    if x.is_finite() {
        Some(MacroValue::Int(x.trunc() as i64))
    } else {
        None
    }
}
