use std::{cmp::Ordering, fmt, rc::Rc};

use indexmap::IndexMap;

use crate::{
    assert::AssertChain,
    error::{HostError, Result},
};

/// Arity marker for host functions that accept any number of arguments.
pub const VARIADIC: usize = usize::MAX;

pub type NativeCallback = Rc<dyn Fn(&[Value]) -> Result<Value>>;

#[derive(Clone)]
pub struct Value(pub Rc<ValueKind>);

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn null() -> Self {
        Self::new(ValueKind::Null)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ValueKind::Bool(value))
    }

    pub fn int(value: i64) -> Self {
        Self::new(ValueKind::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Self::new(ValueKind::Float(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ValueKind::String(value.into()))
    }

    pub fn array(values: Vec<Value>) -> Self {
        Self::new(ValueKind::Array(values))
    }

    pub fn map(entries: IndexMap<String, Value>) -> Self {
        Self::new(ValueKind::Map(entries))
    }

    pub fn module(name: impl Into<String>, exports: IndexMap<String, Value>) -> Self {
        Self::new(ValueKind::Module(ModuleValue {
            name: name.into(),
            exports,
        }))
    }

    pub fn native(
        name: impl Into<String>,
        arity: usize,
        callback: impl Fn(&[Value]) -> Result<Value> + 'static,
    ) -> Self {
        Self::new(ValueKind::NativeFunction(NativeFunction {
            name: name.into(),
            arity,
            callback: Rc::new(callback),
        }))
    }

    pub fn assert_chain(chain: AssertChain) -> Self {
        Self::new(ValueKind::Assert(chain))
    }

    pub fn kind(&self) -> &ValueKind {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind(), ValueKind::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self.kind() {
            ValueKind::Null => false,
            ValueKind::Bool(b) => *b,
            ValueKind::Int(n) => *n != 0,
            ValueKind::Float(f) => *f != 0.0,
            ValueKind::String(s) => !s.is_empty(),
            ValueKind::Array(_)
            | ValueKind::Map(_)
            | ValueKind::Module(_)
            | ValueKind::NativeFunction(_)
            | ValueKind::Assert(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind() {
            ValueKind::Null => "Null",
            ValueKind::Bool(_) => "Bool",
            ValueKind::Int(_) => "Int",
            ValueKind::Float(_) => "Float",
            ValueKind::String(_) => "String",
            ValueKind::Array(_) => "Array",
            ValueKind::Map(_) => "Map",
            ValueKind::Module(_) => "Module",
            ValueKind::NativeFunction(_) => "Function",
            ValueKind::Assert(_) => "Assert",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.kind() {
            ValueKind::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.kind() {
            ValueKind::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.kind() {
            ValueKind::Int(n) => Some(*n as f64),
            ValueKind::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self.kind() {
            ValueKind::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&NativeFunction> {
        match self.kind() {
            ValueKind::NativeFunction(function) => Some(function),
            _ => None,
        }
    }

    /// Member lookup on maps and modules.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self.kind() {
            ValueKind::Map(map) => map.get(key),
            ValueKind::Module(module) => module.exports.get(key),
            _ => None,
        }
    }

    /// Ordering between numbers, or between strings. Anything else is incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self.kind(), other.kind()) {
            (ValueKind::Int(a), ValueKind::Int(b)) => Some(a.cmp(b)),
            (ValueKind::String(a), ValueKind::String(b)) => Some(a.cmp(b)),
            _ => self.as_f64()?.partial_cmp(&other.as_f64()?),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self.kind() {
            ValueKind::Null
            | ValueKind::Module(_)
            | ValueKind::NativeFunction(_)
            | ValueKind::Assert(_) => serde_json::Value::Null,
            ValueKind::Bool(b) => serde_json::Value::Bool(*b),
            ValueKind::Int(n) => serde_json::Value::from(*n),
            ValueKind::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ValueKind::String(s) => serde_json::Value::String(s.clone()),
            ValueKind::Array(values) => {
                serde_json::Value::Array(values.iter().map(Value::to_json).collect())
            }
            ValueKind::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::null(),
            serde_json::Value::Bool(b) => Value::bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(int) => Value::int(int),
                None => Value::float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::string(s),
            serde_json::Value::Array(values) => {
                Value::array(values.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::map(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::string(value)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self.kind(), other.kind()) {
            (ValueKind::Null, ValueKind::Null) => true,
            (ValueKind::Bool(a), ValueKind::Bool(b)) => a == b,
            (ValueKind::String(a), ValueKind::String(b)) => a == b,
            (ValueKind::Array(a), ValueKind::Array(b)) => a == b,
            (ValueKind::Map(a), ValueKind::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(key, value)| b.get(key).is_some_and(|other| other == value))
            }
            (ValueKind::Module(_), _)
            | (ValueKind::NativeFunction(_), _)
            | (ValueKind::Assert(_), _) => Rc::ptr_eq(&self.0, &other.0),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ValueKind::Null => write!(f, "null"),
            ValueKind::Bool(b) => write!(f, "{b}"),
            ValueKind::Int(n) => write!(f, "{n}"),
            ValueKind::Float(n) => write!(f, "{n}"),
            ValueKind::String(s) => write!(f, "\"{s}\""),
            ValueKind::Array(values) => f.debug_list().entries(values.iter()).finish(),
            ValueKind::Map(map) => f.debug_map().entries(map.iter()).finish(),
            ValueKind::Module(module) => f
                .debug_struct("Module")
                .field("name", &module.name)
                .field("exports", &module.exports)
                .finish(),
            ValueKind::NativeFunction(fun) => write!(f, "<native fn {}>", fun.name),
            ValueKind::Assert(chain) => write!(f, "<assert {}>", chain.name()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ValueKind::Null => write!(f, "null"),
            ValueKind::Bool(b) => write!(f, "{b}"),
            ValueKind::Int(n) => write!(f, "{n}"),
            ValueKind::Float(n) => write!(f, "{n}"),
            ValueKind::String(s) => write!(f, "{s}"),
            ValueKind::Array(_) | ValueKind::Map(_) => write!(f, "{}", self.to_json()),
            ValueKind::Module(module) => write!(f, "<module {}>", module.name),
            ValueKind::NativeFunction(fun) => write!(f, "<native fn {}>", fun.name),
            ValueKind::Assert(chain) => write!(f, "<assert {}>", chain.name()),
        }
    }
}

#[derive(Clone)]
pub enum ValueKind {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Map(IndexMap<String, Value>),
    Module(ModuleValue),
    NativeFunction(NativeFunction),
    Assert(AssertChain),
}

#[derive(Clone)]
pub struct ModuleValue {
    pub name: String,
    pub exports: IndexMap<String, Value>,
}

#[derive(Clone)]
pub struct NativeFunction {
    pub name: String,
    pub arity: usize,
    pub callback: NativeCallback,
}

impl NativeFunction {
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        if self.arity != VARIADIC && args.len() != self.arity {
            return Err(HostError::runtime(format!(
                "function `{}` expected {} arguments but received {}",
                self.name,
                self.arity,
                args.len()
            )));
        }
        (self.callback)(args)
    }
}
