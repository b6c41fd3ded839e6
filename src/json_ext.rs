//! JSON backend codec
//!
//! Maps the exchange representation onto JSON: blocks become objects, list
//! rows become objects keyed by column name, arrays keep their storage mode
//! (`{"how": "constant", "value": 2.0}`).
//!
//! Enable with the `json` feature flag.

use std::io;

use crate::context::ContextTree;
use crate::error::{Error, Result};
use crate::exchange;
use crate::options::CodecOptions;
use crate::registry::Codec;
use crate::schema::ComponentSpec;
use crate::types::Value;

/// Convert an exchange value to JSON
pub fn to_json(value: &Value, path: &str) -> Result<serde_json::Value> {
    let json = match value {
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| Error::mismatch(path, "finite number", f.to_string(), None))?,
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => serde_json::Value::Array(
            items
                .iter()
                .map(|item| to_json(item, path))
                .collect::<Result<_>>()?,
        ),
        Value::Object(entries) => {
            let mut map = serde_json::Map::new();
            for (key, value) in entries {
                map.insert(key.clone(), to_json(value, &format!("{path}/{key}"))?);
            }
            serde_json::Value::Object(map)
        }
    };
    Ok(json)
}

/// Convert JSON to an exchange value
pub fn from_json(json: serde_json::Value, path: &str) -> Result<Value> {
    let value = match json {
        serde_json::Value::Null => return Err(Error::mismatch(path, "value", "null", None)),
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(
                n.as_f64()
                    .ok_or_else(|| Error::mismatch(path, "number", n.to_string(), None))?,
            ),
        },
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => Value::List(
            items
                .into_iter()
                .map(|item| from_json(item, path))
                .collect::<Result<_>>()?,
        ),
        serde_json::Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    let value = from_json(value, &format!("{path}/{key}"))?;
                    Ok((key, value))
                })
                .collect::<Result<_>>()?,
        ),
    };
    Ok(value)
}

/// JSON documents holding one component's blocks
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &str {
        "json"
    }

    fn structure(
        &self,
        bytes: &[u8],
        spec: &ComponentSpec,
        options: &CodecOptions,
    ) -> Result<ContextTree> {
        let json: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| Error::syntax(&spec.name, e.line(), e.to_string()))?;
        exchange::structure(from_json(json, &spec.name)?, spec, options)
    }

    fn unstructure(&self, tree: &ContextTree, _options: &CodecOptions) -> Result<Vec<u8>> {
        let root = tree.root();
        let path = tree.path(root);
        let json = to_json(&exchange::unstructure(tree, root)?, &path)?;
        serde_json::to_vec_pretty(&json).map_err(|e| Error::Write {
            path,
            boundary: 0,
            source: io::Error::other(e),
        })
    }
}
