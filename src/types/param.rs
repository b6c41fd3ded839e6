//! Parameter definitions and typed values
//!
//! `ParamSpec` is the typed accessor for one declared parameter: it validates
//! values against the declared type and converts between `Param` and the
//! exchange `Value`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::array::{ArrayDef, ArrayStore, Control, Dim, How, NumKind, Part, Payload};
use super::list::{Cell, ColumnType, ListDef, ListStore, Row};
use super::record::{Keystring, KeystringDef, Record, RecordDef};
use super::scalar::{InOut, Scalar, ScalarKind};
use super::value::Value;
use crate::error::{Error, Result};
use crate::signal::Effect;

/// Scope in which dimension and extension references resolve
pub trait Lookup {
    /// Current value of the nearest scalar parameter named `name`
    fn scalar(&self, name: &str) -> Option<Scalar>;

    /// Location of an external file named in the input
    fn resolve_file(&self, file: &Path) -> PathBuf {
        file.to_path_buf()
    }
}

/// Declared type of a parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParamType {
    Keyword,
    Integer,
    Double,
    String,
    Path,
    Record { fields: RecordDef },
    Keystring { variants: KeystringDef },
    Array(ArrayDef),
    List(ListDef),
}

impl ParamType {
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            ParamType::Keyword => Some(ScalarKind::Keyword),
            ParamType::Integer => Some(ScalarKind::Integer),
            ParamType::Double => Some(ScalarKind::Double),
            ParamType::String => Some(ScalarKind::String),
            ParamType::Path => Some(ScalarKind::Path),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ParamType::Record { .. } => "record",
            ParamType::Keystring { .. } => "keystring",
            ParamType::Array(_) => "array",
            ParamType::List(_) => "list",
            other => other.scalar_kind().map(ScalarKind::name).unwrap_or("scalar"),
        }
    }
}

impl From<ScalarKind> for ParamType {
    fn from(kind: ScalarKind) -> Self {
        match kind {
            ScalarKind::Keyword => ParamType::Keyword,
            ScalarKind::Integer => ParamType::Integer,
            ScalarKind::Double => ParamType::Double,
            ScalarKind::String => ParamType::String,
            ScalarKind::Path => ParamType::Path,
        }
    }
}

/// One declared parameter of a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(flatten)]
    pub ty: ParamType,
    #[serde(default)]
    pub optional: bool,
    /// Value an unset parameter takes; a scalar default seeds a constant array
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Scalar>,
    /// A keystring written as `NAME VARIANT ...` rather than `VARIANT ...`
    #[serde(default)]
    pub tagged: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ParamSpec {
    pub fn new(name: &str, ty: ParamType) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            ty,
            optional: false,
            default: None,
            tagged: false,
            description: String::new(),
        }
    }

    pub fn keyword(name: &str) -> Self {
        Self::new(name, ParamType::Keyword).optional()
    }

    pub fn integer(name: &str) -> Self {
        Self::new(name, ParamType::Integer)
    }

    pub fn double(name: &str) -> Self {
        Self::new(name, ParamType::Double)
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, ParamType::String)
    }

    pub fn path(name: &str) -> Self {
        Self::new(name, ParamType::Path)
    }

    pub fn record(name: &str, fields: RecordDef) -> Self {
        Self::new(name, ParamType::Record { fields })
    }

    pub fn keystring(name: &str, variants: KeystringDef) -> Self {
        Self::new(name, ParamType::Keystring { variants })
    }

    pub fn array(name: &str, kind: NumKind, shape: Vec<Dim>) -> Self {
        Self::new(
            name,
            ParamType::Array(ArrayDef {
                kind,
                shape,
                layered: false,
            }),
        )
    }

    pub fn list(name: &str, def: ListDef) -> Self {
        Self::new(name, ParamType::List(def))
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.optional = false;
        self
    }

    pub fn default(mut self, value: impl Into<Scalar>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn tagged(mut self) -> Self {
        self.tagged = true;
        self
    }

    /// Allow one control line per layer
    pub fn layered(mut self) -> Self {
        if let ParamType::Array(def) = &mut self.ty {
            def.layered = true;
        }
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Arrays and lists; everything else is configuration
    pub fn is_data(&self) -> bool {
        matches!(self.ty, ParamType::Array(_) | ParamType::List(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self.ty, ParamType::List(_))
    }

    /// A record whose first field is a keyword is selected by that keyword
    pub fn leading_keyword(&self) -> Option<&str> {
        match &self.ty {
            ParamType::Record { fields } => fields
                .fields
                .first()
                .filter(|f| f.kind == ScalarKind::Keyword)
                .map(|f| f.name.as_str()),
            _ => None,
        }
    }

    /// Parameters this one's shape or schema depends on
    pub fn dependencies(&self) -> Vec<(&str, Effect)> {
        match &self.ty {
            ParamType::Array(def) => def.refs().map(|r| (r, Effect::Reshape)).collect(),
            ParamType::List(def) => def.controllers().map(|c| (c, Effect::Reschema)).collect(),
            _ => Vec::new(),
        }
    }

    /// The default as a typed value, if one can be built in this scope
    pub fn default_param(&self, lookup: &dyn Lookup, path: &str) -> Option<Param> {
        let default = self.default.as_ref()?;
        match &self.ty {
            ParamType::Array(def) => {
                let shape = def.resolve_shape(lookup, path).ok()?;
                let mut store = ArrayStore::constant(def.kind, shape, default.as_float()?);
                store.set_label(path);
                Some(Param::Array(store))
            }
            ty => {
                let kind = ty.scalar_kind()?;
                scalar_from_value(kind, Value::from(default), path)
                    .ok()
                    .map(Param::Scalar)
            }
        }
    }

    /// Convert an exchange value to a typed parameter
    pub fn coerce(&self, value: Value, lookup: &dyn Lookup, path: &str) -> Result<Param> {
        let param = match &self.ty {
            ParamType::Record { fields } => Param::Record(record_from_value(fields, value, path)?),
            ParamType::Keystring { variants } => {
                Param::Keystring(keystring_from_value(variants, value, path)?)
            }
            ParamType::Array(def) => {
                let shape = def.resolve_shape(lookup, path)?;
                Param::Array(array_from_value(def, shape, value, lookup, path)?)
            }
            ParamType::List(def) => {
                let schema = def.resolve(lookup, path)?;
                let rows = match value {
                    Value::List(rows) => rows,
                    other => {
                        return Err(Error::mismatch(path, "list of rows", other.describe(), None));
                    }
                };
                let rows = rows
                    .into_iter()
                    .enumerate()
                    .map(|(i, row)| row_from_value(&schema, row, i + 1, path))
                    .collect::<Result<Vec<_>>>()?;
                let mut store = ListStore::new(schema);
                store.set_label(path);
                store.set_rows(rows)?;
                Param::List(store)
            }
            ty => {
                let kind = ty.scalar_kind().unwrap_or(ScalarKind::String);
                Param::Scalar(scalar_from_value(kind, value, path)?)
            }
        };
        Ok(param)
    }

    /// Check a typed value against the declared type
    pub fn admit(&self, param: Param, lookup: &dyn Lookup, path: &str) -> Result<Param> {
        let wrong = |param: &Param| Error::mismatch(path, self.ty.name(), param.kind_name(), None);
        match (&self.ty, param) {
            (ParamType::Double, Param::Scalar(Scalar::Integer(i))) => {
                Ok(Param::Scalar(Scalar::Double(i as f64)))
            }
            (ty, Param::Scalar(s)) if ty.scalar_kind() == Some(s.kind()) => Ok(Param::Scalar(s)),
            (ParamType::Record { fields }, Param::Record(record)) => {
                Ok(Param::Record(fields.admit(record, path)?))
            }
            (ParamType::Keystring { variants }, Param::Keystring(ks)) => {
                Ok(Param::Keystring(variants.admit(ks, path, None)?))
            }
            (ParamType::Array(def), Param::Array(mut store)) => {
                if store.kind() != def.kind {
                    return Err(Error::mismatch(
                        path,
                        format!("{} array", def.kind.name()),
                        format!("{} array", store.kind().name()),
                        None,
                    ));
                }
                let shape = def.resolve_shape(lookup, path)?;
                if store.shape() != shape.as_slice() {
                    return Err(Error::mismatch(
                        path,
                        format!("shape {shape:?}"),
                        format!("shape {:?}", store.shape()),
                        None,
                    ));
                }
                store.set_label(path);
                Ok(Param::Array(store))
            }
            (ParamType::List(def), Param::List(store)) => {
                let schema = def.resolve(lookup, path)?;
                let mut admitted = ListStore::new(schema);
                admitted.set_label(path);
                admitted.set_rows(store.rows()?.to_vec())?;
                Ok(Param::List(admitted))
            }
            (_, param) => Err(wrong(&param)),
        }
    }
}

fn scalar_from_value(kind: ScalarKind, value: Value, path: &str) -> Result<Scalar> {
    let scalar = match (kind, value) {
        (ScalarKind::Keyword, Value::Bool(b)) => Scalar::Keyword(b),
        (ScalarKind::Integer, Value::Int(i)) => Scalar::Integer(i),
        (ScalarKind::Double, Value::Float(f)) => Scalar::Double(f),
        (ScalarKind::Double, Value::Int(i)) => Scalar::Double(i as f64),
        (ScalarKind::String, Value::String(s)) => Scalar::String(s),
        (ScalarKind::Path, Value::String(s)) => Scalar::path(s),
        (ScalarKind::Path, value @ Value::Object(_)) => {
            let inout = value
                .field("inout")
                .and_then(Value::as_str)
                .and_then(InOut::from_token);
            let file = value
                .field("path")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::mismatch(path, "path", value.describe(), None))?;
            Scalar::Path {
                inout,
                path: PathBuf::from(file),
            }
        }
        (kind, value) => return Err(Error::mismatch(path, kind.name(), value.describe(), None)),
    };
    Ok(scalar)
}

fn record_from_value(def: &RecordDef, value: Value, path: &str) -> Result<Record> {
    let entries = match value {
        Value::Object(entries) => entries,
        other => return Err(Error::mismatch(path, "record", other.describe(), None)),
    };
    if let Some((name, _)) = entries.iter().find(|(k, _)| def.field(k).is_none()) {
        return Err(Error::UnknownParameter {
            path: path.to_string(),
            name: name.clone(),
            line: None,
        });
    }
    let mut entries: Vec<(String, Option<Value>)> =
        entries.into_iter().map(|(k, v)| (k, Some(v))).collect();
    let mut record = Record::new();
    for field in &def.fields {
        let field_path = format!("{path}/{}", field.name);
        let given = entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&field.name))
            .and_then(|(_, v)| v.take());
        match given {
            Some(value) => {
                record.insert(&field.name, scalar_from_value(field.kind, value, &field_path)?)
            }
            None if field.kind == ScalarKind::Keyword => {
                record.insert(&field.name, Scalar::Keyword(!field.optional))
            }
            None if field.optional => {}
            None => return Err(Error::mismatch(&field_path, field.kind.name(), "nothing", None)),
        }
    }
    Ok(record)
}

fn keystring_from_value(def: &KeystringDef, value: Value, path: &str) -> Result<Keystring> {
    let (variant, fields) = match value {
        Value::String(variant) => (variant, Value::Object(Vec::new())),
        Value::Object(mut entries) if entries.len() == 1 => {
            let (variant, fields) = entries.remove(0);
            let fields = match fields {
                Value::Bool(true) => Value::Object(Vec::new()),
                other => other,
            };
            (variant, fields)
        }
        other => return Err(Error::mismatch(path, "keystring", other.describe(), None)),
    };
    let record_def = def.get(&variant).ok_or_else(|| Error::UnknownVariant {
        path: path.to_string(),
        token: variant.clone(),
        line: None,
    })?;
    let record = record_from_value(record_def, fields, &format!("{path}/{variant}"))?;
    Ok(Keystring::new(&variant, record))
}

fn row_from_value(
    schema: &super::ListSchema,
    value: Value,
    number: usize,
    path: &str,
) -> Result<Row> {
    let columns = schema.columns();
    let values: Vec<Value> = match value {
        Value::List(cells) => cells,
        Value::Object(mut entries) => {
            let mut cells = Vec::new();
            for column in columns {
                let Some(at) = entries
                    .iter()
                    .position(|(k, _)| k.eq_ignore_ascii_case(&column.name))
                else {
                    break;
                };
                cells.push(entries.remove(at).1);
            }
            if let Some((name, _)) = entries.first() {
                return Err(Error::UnknownParameter {
                    path: path.to_string(),
                    name: name.clone(),
                    line: Some(number),
                });
            }
            cells
        }
        other => return Err(Error::mismatch(path, "row", other.describe(), Some(number))),
    };
    if values.len() > columns.len() {
        return Err(Error::RowArityMismatch {
            path: path.to_string(),
            row: number,
            expected: columns.len().to_string(),
            found: values.len(),
        });
    }
    let cells = columns
        .iter()
        .zip(values)
        .map(|(column, value)| {
            let cell_path = format!("{path}/{}", column.name);
            match &column.ty {
                ColumnType::Scalar(kind) => {
                    scalar_from_value(*kind, value, &cell_path).map(Cell::Scalar)
                }
                ColumnType::Keystring(def) => {
                    keystring_from_value(def, value, &cell_path).map(Cell::Keystring)
                }
            }
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Row::new(cells))
}

fn flatten_numbers(value: Value, out: &mut Vec<f64>, path: &str) -> Result<()> {
    match value {
        Value::List(items) => {
            for item in items {
                flatten_numbers(item, out, path)?;
            }
            Ok(())
        }
        other => {
            let number = other
                .as_float()
                .ok_or_else(|| Error::mismatch(path, "number", other.describe(), None))?;
            out.push(number);
            Ok(())
        }
    }
}

fn part_from_value(value: Value, len: usize, lookup: &dyn Lookup, path: &str) -> Result<Part> {
    match value {
        Value::Int(_) | Value::Float(_) => Ok(Part::constant(value.as_float().unwrap_or_default())),
        Value::List(_) => {
            let mut data = Vec::with_capacity(len);
            flatten_numbers(value, &mut data, path)?;
            check_len(&data, len, path)?;
            Ok(Part::data(Control::new(How::Internal), data))
        }
        Value::Object(_) => {
            let how = match value.field("how").and_then(Value::as_str) {
                Some(token) => How::from_keyword(token)
                    .or_else(|| token.eq_ignore_ascii_case("external").then_some(How::External))
                    .ok_or_else(|| Error::UnknownVariant {
                        path: path.to_string(),
                        token: token.to_string(),
                        line: None,
                    })?,
                None if value.field("path").is_some() => How::External,
                None if value.field("value").is_some() => How::Constant,
                None => How::Internal,
            };
            let mut control = Control::new(how);
            control.factor = value.field("factor").and_then(Value::as_float);
            control.iprn = value.field("iprn").and_then(Value::as_int);
            match how {
                How::Constant => {
                    let v = value
                        .field("value")
                        .and_then(Value::as_float)
                        .ok_or_else(|| {
                            Error::mismatch(path, "constant value", value.describe(), None)
                        })?;
                    let mut part = Part::constant(v);
                    part.control = control;
                    Ok(part)
                }
                How::Internal => {
                    let data = value
                        .field("data")
                        .cloned()
                        .ok_or_else(|| {
                            Error::mismatch(path, "array data", value.describe(), None)
                        })?;
                    let mut values = Vec::with_capacity(len);
                    flatten_numbers(data, &mut values, path)?;
                    check_len(&values, len, path)?;
                    Ok(Part::data(control, values))
                }
                How::External => {
                    let file = value
                        .field("path")
                        .and_then(Value::as_str)
                        .map(PathBuf::from)
                        .ok_or_else(|| {
                            Error::mismatch(path, "external path", value.describe(), None)
                        })?;
                    let resolved = lookup.resolve_file(&file);
                    control.path = Some(file);
                    Ok(Part::deferred(control, super::Source::File(resolved)))
                }
            }
        }
        other => Err(Error::mismatch(path, "array", other.describe(), None)),
    }
}

fn check_len(values: &[f64], len: usize, path: &str) -> Result<()> {
    if values.len() != len {
        return Err(Error::mismatch(
            path,
            format!("{len} values"),
            format!("{} values", values.len()),
            None,
        ));
    }
    Ok(())
}

fn array_from_value(
    def: &ArrayDef,
    shape: Vec<usize>,
    value: Value,
    lookup: &dyn Lookup,
    path: &str,
) -> Result<ArrayStore> {
    let layered = def.layered && value.field("layers").is_some();
    let parts = if layered {
        let layers = shape.first().copied().unwrap_or(0);
        let len = shape.iter().skip(1).product();
        let items = value
            .field("layers")
            .and_then(Value::as_list)
            .map(<[Value]>::to_vec)
            .unwrap_or_default();
        if items.len() != layers {
            return Err(Error::mismatch(
                path,
                format!("{layers} layers"),
                format!("{} layers", items.len()),
                None,
            ));
        }
        items
            .into_iter()
            .map(|item| part_from_value(item, len, lookup, path))
            .collect::<Result<Vec<_>>>()?
    } else {
        let len = shape.iter().product();
        vec![part_from_value(value, len, lookup, path)?]
    };
    Ok(ArrayStore::from_parts(def.kind, shape, layered, parts, path))
}

fn number(kind: NumKind, v: f64) -> Value {
    match kind {
        NumKind::Integer => Value::Int(v as i64),
        NumKind::Double => Value::Float(v),
    }
}

fn part_to_value(part: &Part, kind: NumKind, len: usize, label: &str) -> Result<Value> {
    let control = &part.control;
    let mut entries = vec![(
        "how".to_string(),
        Value::String(control.how.keyword().to_ascii_lowercase()),
    )];
    if let Some(factor) = control.factor {
        entries.push(("factor".to_string(), Value::Float(factor)));
    }
    if let Some(iprn) = control.iprn {
        entries.push(("iprn".to_string(), Value::Int(iprn)));
    }
    match (&part.payload, control.how) {
        (Payload::Constant(v), _) => entries.push(("value".to_string(), number(kind, *v))),
        (_, How::External) => {
            let file = control
                .path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();
            entries.push(("path".to_string(), Value::String(file)));
        }
        _ => {
            let raw = part.raw(kind, len, label)?;
            let data = raw.iter().map(|v| number(kind, *v)).collect();
            entries.push(("data".to_string(), Value::List(data)));
        }
    }
    Ok(Value::Object(entries))
}

fn record_to_value(record: &Record) -> Value {
    Value::Object(
        record
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(v)))
            .collect(),
    )
}

fn keystring_to_value(ks: &Keystring) -> Value {
    Value::Object(vec![(ks.variant.clone(), record_to_value(&ks.record))])
}

/// Typed value of one parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Scalar(Scalar),
    Record(Record),
    Keystring(Keystring),
    Array(ArrayStore),
    List(ListStore),
}

impl Param {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Param::Scalar(s) => s.kind().name(),
            Param::Record(_) => "record",
            Param::Keystring(_) => "keystring",
            Param::Array(_) => "array",
            Param::List(_) => "list",
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Param::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_scalar()?.as_bool()
    }

    pub fn as_int(&self) -> Option<i64> {
        self.as_scalar()?.as_int()
    }

    pub fn as_float(&self) -> Option<f64> {
        self.as_scalar()?.as_float()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar()?.as_str()
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Param::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_keystring(&self) -> Option<&Keystring> {
        match self {
            Param::Keystring(k) => Some(k),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayStore> {
        match self {
            Param::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListStore> {
        match self {
            Param::List(l) => Some(l),
            _ => None,
        }
    }

    pub(crate) fn set_label(&mut self, label: &str) {
        match self {
            Param::Array(a) => a.set_label(label),
            Param::List(l) => l.set_label(label),
            _ => {}
        }
    }

    /// Exchange form; converts deferred internal data but leaves external files unread
    pub fn to_value(&self) -> Result<Value> {
        let value = match self {
            Param::Scalar(s) => Value::from(s),
            Param::Record(r) => record_to_value(r),
            Param::Keystring(k) => keystring_to_value(k),
            Param::Array(store) => {
                let len = store.part_len();
                let parts = store
                    .parts()
                    .iter()
                    .map(|p| part_to_value(p, store.kind(), len, store.label()))
                    .collect::<Result<Vec<_>>>()?;
                if store.is_layered() {
                    Value::Object(vec![
                        ("layered".to_string(), Value::Bool(true)),
                        ("layers".to_string(), Value::List(parts)),
                    ])
                } else {
                    parts.into_iter().next().unwrap_or(Value::List(Vec::new()))
                }
            }
            Param::List(store) => {
                let names: Vec<&str> = store.schema().names().collect();
                let rows = store
                    .rows()?
                    .iter()
                    .map(|row| {
                        Value::Object(
                            names
                                .iter()
                                .zip(row.cells())
                                .map(|(name, cell)| {
                                    let value = match cell {
                                        Cell::Scalar(s) => Value::from(s),
                                        Cell::Keystring(k) => keystring_to_value(k),
                                    };
                                    (name.to_string(), value)
                                })
                                .collect(),
                        )
                    })
                    .collect();
                Value::List(rows)
            }
        };
        Ok(value)
    }
}

impl From<Scalar> for Param {
    fn from(v: Scalar) -> Self {
        Param::Scalar(v)
    }
}

impl From<Record> for Param {
    fn from(v: Record) -> Self {
        Param::Record(v)
    }
}

impl From<Keystring> for Param {
    fn from(v: Keystring) -> Self {
        Param::Keystring(v)
    }
}

impl From<ArrayStore> for Param {
    fn from(v: ArrayStore) -> Self {
        Param::Array(v)
    }
}

impl From<ListStore> for Param {
    fn from(v: ListStore) -> Self {
        Param::List(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnDef, ExtensionDef, FieldDef, Presence};

    struct Scope(Vec<(&'static str, Scalar)>);

    impl Lookup for Scope {
        fn scalar(&self, name: &str) -> Option<Scalar> {
            self.0
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn test_coerce_scalar_mismatch() {
        let spec = ParamSpec::integer("nlay");
        let err = spec
            .coerce(Value::from("three"), &Scope(vec![]), "dis/dimensions/nlay")
            .unwrap_err();
        match err {
            Error::TypeMismatch {
                path,
                expected,
                found,
                ..
            } => {
                assert_eq!(path, "dis/dimensions/nlay");
                assert_eq!(expected, "integer");
                assert_eq!(found, "string 'three'");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_coerce_double_accepts_int() {
        let spec = ParamSpec::double("angrot");
        let param = spec.coerce(Value::Int(5), &Scope(vec![]), "p").unwrap();
        assert_eq!(param.as_float(), Some(5.0));
    }

    #[test]
    fn test_coerce_array_forms() {
        let spec = ParamSpec::array("delr", NumKind::Double, vec![Dim::from("ncol")]);
        let scope = Scope(vec![("ncol", Scalar::Integer(3))]);

        let constant = spec.coerce(Value::Float(10.0), &scope, "p").unwrap();
        assert_eq!(constant.as_array().unwrap().how(), How::Constant);

        let internal = spec
            .coerce(Value::from(vec![1.0, 2.0, 3.0]), &scope, "p")
            .unwrap();
        assert_eq!(
            internal.as_array().unwrap().raw_values().unwrap(),
            vec![1.0, 2.0, 3.0]
        );

        let err = spec.coerce(Value::from(vec![1.0]), &scope, "p").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_array_value_roundtrip_with_factor() {
        let spec = ParamSpec::array("k", NumKind::Double, vec![Dim::Literal(2)]);
        let scope = Scope(vec![]);
        let value = Value::Object(vec![
            ("how".into(), Value::from("internal")),
            ("factor".into(), Value::Float(2.0)),
            ("data".into(), Value::from(vec![1.0, 2.0])),
        ]);
        let param = spec.coerce(value.clone(), &scope, "p").unwrap();
        let store = param.as_array().unwrap();
        assert_eq!(store.factor(), 2.0);
        assert_eq!(param.to_value().unwrap(), value);
    }

    #[test]
    fn test_keystring_coerce() {
        let variants = KeystringDef::new()
            .variant("all", vec![])
            .variant("frequency", vec![FieldDef::new("frequency", ScalarKind::Integer)]);
        let spec = ParamSpec::keystring("ocsetting", variants);
        let scope = Scope(vec![]);

        let all = spec.coerce(Value::from("ALL"), &scope, "p").unwrap();
        assert_eq!(all.as_keystring().unwrap().variant, "all");

        let freq = spec
            .coerce(
                Value::Object(vec![(
                    "frequency".into(),
                    Value::Object(vec![("frequency".into(), Value::Int(3))]),
                )]),
                &scope,
                "p",
            )
            .unwrap();
        assert_eq!(
            freq.as_keystring().unwrap().record.get("frequency"),
            Some(&Scalar::Integer(3))
        );

        let err = spec.coerce(Value::from("never"), &scope, "p").unwrap_err();
        assert!(matches!(err, Error::UnknownVariant { token, .. } if token == "never"));
    }

    #[test]
    fn test_list_coerce_by_name() {
        let def = ListDef::new(vec![
            ColumnDef::new("cellid", ScalarKind::Integer),
            ColumnDef::new("head", ScalarKind::Double),
        ])
        .extension(ExtensionDef::new(
            "boundname",
            ScalarKind::String,
            Presence::Flag("boundnames".into()),
        ));
        let spec = ParamSpec::list("stress_period_data", def);
        let scope = Scope(vec![("boundnames", Scalar::Keyword(true))]);
        let rows = Value::List(vec![Value::Object(vec![
            ("cellid".into(), Value::Int(1)),
            ("head".into(), Value::Float(9.5)),
            ("boundname".into(), Value::from("river")),
        ])]);
        let param = spec.coerce(rows.clone(), &scope, "p").unwrap();
        assert_eq!(param.as_list().unwrap().len(), 1);
        assert_eq!(param.to_value().unwrap(), rows);
    }

    #[test]
    fn test_admit_rejects_wrong_kind() {
        let spec = ParamSpec::keyword("save_flows");
        let err = spec
            .admit(Param::Scalar(Scalar::Integer(1)), &Scope(vec![]), "p")
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    fn rate_spec() -> ParamSpec {
        ParamSpec::record(
            "rate",
            RecordDef::new(vec![
                FieldDef::new("name", ScalarKind::String),
                FieldDef::new("scale", ScalarKind::Double).tagged().optional(),
            ]),
        )
    }

    #[test]
    fn test_admit_record_checks_fields() {
        let spec = rate_spec();
        let scope = Scope(vec![]);

        let err = spec
            .admit(Param::Record(Record::new().with("bogus", 7i64)), &scope, "p")
            .unwrap_err();
        match err {
            Error::UnknownParameter { name, .. } => assert_eq!(name, "bogus"),
            other => panic!("unexpected error: {other}"),
        }

        let err = spec
            .admit(Param::Record(Record::new().with("scale", 2.0)), &scope, "p")
            .unwrap_err();
        match err {
            Error::TypeMismatch { path, .. } => assert_eq!(path, "p/name"),
            other => panic!("unexpected error: {other}"),
        }

        let wrong = Record::new().with("name", "well").with("scale", "big");
        let err = spec.admit(Param::Record(wrong), &scope, "p").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));

        let given = Record::new().with("name", "well").with("scale", 2i64);
        let widened = spec.admit(Param::Record(given), &scope, "p").unwrap();
        match widened {
            Param::Record(record) => assert_eq!(record.get("scale"), Some(&Scalar::Double(2.0))),
            other => panic!("unexpected param: {other:?}"),
        }
    }

    #[test]
    fn test_admit_keystring_checks_fields() {
        let variants = KeystringDef::new()
            .variant("status", vec![FieldDef::new("status", ScalarKind::String)])
            .variant("frequency", vec![FieldDef::new("frequency", ScalarKind::Integer)]);
        let spec = ParamSpec::keystring("setting", variants);
        let scope = Scope(vec![]);

        let ok = Keystring::new("frequency", Record::new().with("frequency", 3i64));
        assert!(spec.admit(Param::Keystring(ok), &scope, "p").is_ok());

        let missing = Keystring::new("frequency", Record::new());
        let err = spec.admit(Param::Keystring(missing), &scope, "p").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));

        let stray = Keystring::new("status", Record::new().with("status", "on").with("rate", 1.0));
        let err = spec.admit(Param::Keystring(stray), &scope, "p").unwrap_err();
        assert!(matches!(err, Error::UnknownParameter { .. }));

        let wrong = Keystring::new("frequency", Record::new().with("frequency", "often"));
        let err = spec.admit(Param::Keystring(wrong), &scope, "p").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_default_param_seeds_constant_array() {
        let spec = ParamSpec::array("strt", NumKind::Double, vec![Dim::from("nodes")]).default(1.0);
        let scope = Scope(vec![("nodes", Scalar::Integer(4))]);
        let param = spec.default_param(&scope, "ic/griddata/strt").unwrap();
        let store = param.as_array().unwrap();
        assert_eq!(store.constant_value(), Some(1.0));
        assert_eq!(store.len(), 4);
    }
}
