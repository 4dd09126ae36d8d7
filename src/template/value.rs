//! Expression values

use std::fmt;
use std::rc::Rc;

use crate::dom::Node;
use crate::reactive::{Deferred, Source};

use super::TemplateResult;

/// Every shape an expression value can take.
///
/// Primitives compare by value for the "unchanged value" short circuit;
/// everything else compares by identity.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Text(Rc<str>),
    /// A caller-owned node placed into the tree as is
    Node(Node),
    Template(TemplateResult),
    /// A sequence, flattened depth-first when resolved
    List(Rc<[Value]>),
    /// Resolves once
    Future(Deferred),
    /// Emits any number of values over time
    Stream(Source),
}

impl Value {
    /// Whether `other` is the very same value, so rendering it again can be
    /// skipped
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => a.ptr_eq(b),
            (Value::Template(a), Value::Template(b)) => a.ptr_eq(b),
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Future(a), Value::Future(b)) => a.ptr_eq(b),
            (Value::Stream(a), Value::Stream(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Node(_) => "node",
            Value::Template(_) => "template",
            Value::List(_) => "list",
            Value::Future(_) => "future",
            Value::Stream(_) => "stream",
        }
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Value::Future(_) | Value::Stream(_))
    }
}

/// Text form of a number, written the way markup templates expect: the
/// shortest round-trip digits, switching to exponent form (`1e+21`, `1e-7`)
/// outside `1e-6..1e21`
pub(crate) fn number_text(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        // Also covers negative zero
        "0".to_string()
    } else if (1e-6..1e21).contains(&n.abs()) {
        n.to_string()
    } else {
        let text = format!("{n:e}");
        match text.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => text,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({})", number_text(*n)),
            Value::Text(s) => write!(f, "Text({s:?})"),
            Value::Node(node) => write!(f, "{node:?}"),
            Value::Template(result) => write!(f, "{result:?}"),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Future(_) => f.write_str("Future"),
            Value::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Undefined
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! number_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::Number(n as f64)
            }
        })*
    };
}

number_from!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(Rc::from(s))
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Text(Rc::from(s.as_str()))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::Text(s)
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Value::Node(node)
    }
}

impl From<&Node> for Value {
    fn from(node: &Node) -> Self {
        Value::Node(node.clone())
    }
}

impl From<TemplateResult> for Value {
    fn from(result: TemplateResult) -> Self {
        Value::Template(result)
    }
}

impl From<&TemplateResult> for Value {
    fn from(result: &TemplateResult) -> Self {
        Value::Template(result.clone())
    }
}

impl From<Deferred> for Value {
    fn from(deferred: Deferred) -> Self {
        Value::Future(deferred)
    }
}

impl From<Source> for Value {
    fn from(source: Source) -> Self {
        Value::Stream(source)
    }
}

impl From<&Value> for Value {
    fn from(value: &Value) -> Self {
        value.clone()
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(option: Option<T>) -> Self {
        option.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        items.into_iter().collect()
    }
}

impl<T: Into<Value>> FromIterator<T> for Value {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Value::List(iter.into_iter().map(Into::into).collect())
    }
}
