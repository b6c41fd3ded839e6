//! Exchange representation
//!
//! `Value` is the format-neutral form typed accessors accept and alternate
//! codecs serialize. It carries no schema; conversion to a `Param` goes
//! through the parameter's `ParamSpec`.

use super::scalar::Scalar;

/// Value type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTag {
    Bool,
    Int,
    Float,
    String,
    Object,
    List,
}

impl ValueTag {
    pub fn name(self) -> &'static str {
        match self {
            ValueTag::Bool => "bool",
            ValueTag::Int => "int",
            ValueTag::Float => "float",
            ValueTag::String => "string",
            ValueTag::Object => "object",
            ValueTag::List => "list",
        }
    }
}

/// Owned exchange value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Object(Vec<(String, Value)>),
    List(Vec<Value>),
}

impl Value {
    /// Get the tag for this value
    pub fn tag(&self) -> ValueTag {
        match self {
            Value::Bool(_) => ValueTag::Bool,
            Value::Int(_) => ValueTag::Int,
            Value::Float(_) => ValueTag::Float,
            Value::String(_) => ValueTag::String,
            Value::Object(_) => ValueTag::Object,
            Value::List(_) => ValueTag::List,
        }
    }

    /// Short description used in type mismatch errors
    pub fn describe(&self) -> String {
        match self {
            Value::Bool(b) => format!("bool {b}"),
            Value::Int(i) => format!("int {i}"),
            Value::Float(f) => format!("float {f}"),
            Value::String(s) => format!("string '{s}'"),
            Value::Object(_) => "object".to_string(),
            Value::List(items) => format!("list of {}", items.len()),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Floats, and ints widened to floats
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Field of an object by key
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.as_object()?
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    /// Get a nested value by slash-separated path (e.g., "griddata/delr")
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = self;
        for key in path.split('/').filter(|k| !k.is_empty()) {
            current = current.field(key)?;
        }
        Some(current)
    }
}

// Convenience From impls for Value
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::List(v.into_iter().map(Value::Float).collect())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<&Scalar> for Value {
    fn from(v: &Scalar) -> Self {
        match v {
            Scalar::Keyword(b) => Value::Bool(*b),
            Scalar::Integer(i) => Value::Int(*i),
            Scalar::Double(f) => Value::Float(*f),
            Scalar::String(s) => Value::String(s.clone()),
            Scalar::Path { inout: None, path } => {
                Value::String(path.to_string_lossy().into_owned())
            }
            Scalar::Path {
                inout: Some(inout),
                path,
            } => Value::Object(vec![
                (
                    "inout".to_string(),
                    Value::String(inout.keyword().to_ascii_lowercase()),
                ),
                (
                    "path".to_string(),
                    Value::String(path.to_string_lossy().into_owned()),
                ),
            ]),
        }
    }
}
