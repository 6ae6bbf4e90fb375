//! value representation
//!
//! Everything that flows through queries, attributes and action results is a [Value]:
//! - null
//! - boolean (true/false)
//! - integer (signed, i64)
//! - decimal (f64)
//! - string (utf-8)
//! - array ("list" of values)
//! - object (order-preserving "map"/"dictionary", where the key is of type string)
//!
//! Additionally a value can reference the runtime:
//! - a host ([HostHandle])
//! - a node wrapped in its environment ([Env])
//! - a bound action ([EnvAction]), callable from queries
//! - a plain function ([Function])
//!
//! The only **implicit** conversion: every `integer` is also a `decimal` when compared or combined.
use crate::env::{Env, EnvAction};
use crate::hosts::HostHandle;
use indexmap::IndexMap;
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serializer,
};
use std::sync::Arc;

/// All possible value types
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    Host(HostHandle),
    Node(Env),
    Action(EnvAction),
    Function(Function),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Host(_) => "host",
            Value::Node(_) => "node",
            Value::Action(_) => "action",
            Value::Function(_) => "function",
        }
    }

    /// `null`, `false`, `0`, `0.0`, `""`, `[]` and `{}` are falsy, everything else is truthy
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Decimal(d) => *d != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
            Value::Host(_) | Value::Node(_) | Value::Action(_) | Value::Function(_) => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Env> {
        match self {
            Value::Node(env) => Some(env),
            _ => None,
        }
    }

    pub fn as_host(&self) -> Option<&HostHandle> {
        match self {
            Value::Host(host) => Some(host),
            _ => None,
        }
    }

    /// Representation used by `%r` formatting and inside containers
    pub fn repr(&self) -> String {
        match self {
            Value::String(s) => format!("{s:?}"),
            other => other.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Decimal(_) | Value::Integer(_), Value::Decimal(_) | Value::Integer(_)) => {
                self.as_f64() == other.as_f64()
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Host(a), Value::Host(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => a.node() == b.node(),
            (Value::Action(a), Value::Action(b)) => {
                a.name() == b.name() && a.env().node() == b.env().node()
            }
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(&a.func, &b.func),
            _ => false,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::String(s) => f.write_str(s),
            Value::Array(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&item.repr())?;
                }
                f.write_str("]")
            }
            Value::Object(object) => {
                f.write_str("{")?;
                for (index, (key, item)) in object.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key:?}: {}", item.repr())?;
                }
                f.write_str("}")
            }
            Value::Host(host) => write!(f, "{host}"),
            Value::Node(env) => write!(f, "{env:?}"),
            Value::Action(action) => write!(f, "{action:?}"),
            Value::Function(function) => write!(f, "<function {}>", function.name),
        }
    }
}

/// Named callable usable as a value (and from queries)
#[derive(Clone)]
pub struct Function {
    name: String,
    func: Arc<dyn Fn(&Args) -> anyhow::Result<Value> + Send + Sync>,
}

impl Function {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&Args) -> anyhow::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &Args) -> anyhow::Result<Value> {
        (self.func)(args)
    }
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Function({})", self.name)
    }
}

/// Arguments passed to actions and functions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    pub positional: Vec<Value>,
    pub keyword: IndexMap<String, Value>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn keyword(&self, key: &str) -> Option<&Value> {
        self.keyword.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }
}

impl std::fmt::Display for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let positional = self.positional.iter().map(Value::repr);
        let keyword = self
            .keyword
            .iter()
            .map(|(key, value)| format!("{key}={}", value.repr()));
        let all: Vec<String> = positional.chain(keyword).collect();
        f.write_str(&all.join(", "))
    }
}

impl From<()> for Args {
    fn from(_: ()) -> Self {
        Args::default()
    }
}

impl From<Vec<Value>> for Args {
    fn from(positional: Vec<Value>) -> Self {
        Args {
            positional,
            keyword: IndexMap::new(),
        }
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Args {
    fn from(values: [T; N]) -> Self {
        values.into_iter().map(Into::into).collect::<Vec<_>>().into()
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        i64::try_from(value).map_or(Self::Decimal(value as f64), Self::Integer)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Decimal(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(value: IndexMap<String, Value>) -> Self {
        Value::Object(value)
    }
}

impl From<HostHandle> for Value {
    fn from(value: HostHandle) -> Self {
        Value::Host(value)
    }
}

impl From<Env> for Value {
    fn from(value: Env) -> Self {
        Value::Node(value)
    }
}

impl From<EnvAction> for Value {
    fn from(value: EnvAction) -> Self {
        Value::Action(value)
    }
}

impl From<Function> for Value {
    fn from(value: Function) -> Self {
        Value::Function(value)
    }
}

impl From<hcl::Number> for Value {
    fn from(value: hcl::Number) -> Self {
        if let Some(int) = value.as_i64() {
            return Value::Integer(int);
        }

        // every hcl number that is not an i64 is representable as f64
        Value::Decimal(value.as_f64().unwrap_or(f64::NAN))
    }
}

impl From<hcl::Value> for Value {
    fn from(value: hcl::Value) -> Value {
        match value {
            hcl::Value::Null => Value::Null,
            hcl::Value::Bool(b) => b.into(),
            hcl::Value::Number(n) => n.into(),
            hcl::Value::String(s) => s.into(),
            hcl::Value::Array(a) => a.into(),
            hcl::Value::Object(o) => Value::Object(
                o.into_iter()
                    .map(|(k, v)| (k.to_string(), v.into()))
                    .collect(),
            ),
        }
    }
}

/// Only literal expressions (no variables, functions or templates) can be converted
impl TryFrom<hcl::Expression> for Value {
    type Error = UnsupportedExpression;

    fn try_from(value: hcl::Expression) -> Result<Self, Self::Error> {
        use hcl::Expression;

        Ok(match value {
            Expression::Null => Value::Null,
            Expression::Bool(bool) => bool.into(),
            Expression::Number(num) => num.into(),
            Expression::String(s) => s.into(),
            Expression::Array(array) => Value::Array(
                array
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            Expression::Object(object) => Value::Object(
                object
                    .into_iter()
                    .map(|(k, v)| Ok((object_key_to_string(k)?, Value::try_from(v)?)))
                    .collect::<Result<_, UnsupportedExpression>>()?,
            ),
            other => return Err(UnsupportedExpression(other.to_string())),
        })
    }
}

fn object_key_to_string(key: hcl::ObjectKey) -> Result<String, UnsupportedExpression> {
    match key {
        hcl::ObjectKey::Identifier(ident) => Ok(ident.to_string()),
        hcl::ObjectKey::Expression(hcl::Expression::String(s)) => Ok(s),
        hcl::ObjectKey::Expression(other) => Err(UnsupportedExpression(other.to_string())),
        _ => Err(UnsupportedExpression("object key".to_string())),
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("expression `{0}` is not a literal value")]
pub struct UnsupportedExpression(pub String);

impl serde::ser::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(value) => serializer.serialize_bool(*value),
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::Decimal(value) => serializer.serialize_f64(*value),
            Value::String(value) => serializer.serialize_str(value),
            Value::Array(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            Value::Object(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
            Value::Host(host) => serializer.serialize_str(host.slug()),
            Value::Node(env) => serializer.serialize_str(&env.node().path().to_string()),
            Value::Action(_) | Value::Function(_) => serializer.serialize_str(&self.to_string()),
        }
    }
}
