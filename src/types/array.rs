//! Array store
//!
//! An array keeps its contents flat and unscaled, one part per control line.
//! Layered arrays have one part per layer, each with its own storage mode and
//! factor. Shaped views are built on request.

use std::borrow::Cow;
use std::cell::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

use super::TextSpan;
use super::param::Lookup;
use super::scalar::{Scalar, format_double, parse_double, parse_int};
use crate::error::{Error, Result};

/// Element kind of a numeric array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumKind {
    Integer,
    Double,
}

impl NumKind {
    pub fn name(self) -> &'static str {
        match self {
            NumKind::Integer => "integer",
            NumKind::Double => "double",
        }
    }

    pub fn parse(self, token: &str) -> Option<f64> {
        match self {
            NumKind::Integer => parse_int(token).map(|i| i as f64),
            NumKind::Double => parse_double(token),
        }
    }

    pub fn format(self, value: f64) -> String {
        match self {
            NumKind::Integer => (value as i64).to_string(),
            NumKind::Double => format_double(value),
        }
    }
}

/// Storage mode named by a control line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum How {
    Constant,
    Internal,
    External,
}

impl How {
    pub fn keyword(self) -> &'static str {
        match self {
            How::Constant => "CONSTANT",
            How::Internal => "INTERNAL",
            How::External => "OPEN/CLOSE",
        }
    }

    pub fn from_keyword(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("constant") {
            Some(How::Constant)
        } else if token.eq_ignore_ascii_case("internal") {
            Some(How::Internal)
        } else if token.eq_ignore_ascii_case("open/close") {
            Some(How::External)
        } else {
            None
        }
    }
}

/// One declared array dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dim {
    Literal(usize),
    /// Name of an integer parameter holding the extent
    Ref(String),
}

impl From<usize> for Dim {
    fn from(v: usize) -> Self {
        Dim::Literal(v)
    }
}

impl From<&str> for Dim {
    fn from(v: &str) -> Self {
        Dim::Ref(v.to_ascii_lowercase())
    }
}

/// Declared element kind and shape of an array parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayDef {
    pub kind: NumKind,
    pub shape: Vec<Dim>,
    /// Input may give one control line per entry of the first dimension
    #[serde(default)]
    pub layered: bool,
}

impl ArrayDef {
    /// Names of the parameters the shape depends on
    pub fn refs(&self) -> impl Iterator<Item = &str> {
        self.shape.iter().filter_map(|d| match d {
            Dim::Ref(name) => Some(name.as_str()),
            Dim::Literal(_) => None,
        })
    }

    /// Resolve each dimension against current parameter values
    pub fn resolve_shape(&self, lookup: &dyn Lookup, path: &str) -> Result<Vec<usize>> {
        self.shape
            .iter()
            .map(|dim| match dim {
                Dim::Literal(n) => Ok(*n),
                Dim::Ref(name) => {
                    let unresolved = |reason: &str| Error::ShapeUnresolved {
                        path: path.to_string(),
                        dim: name.clone(),
                        reason: reason.to_string(),
                    };
                    match lookup.scalar(name) {
                        Some(Scalar::Integer(n)) if n >= 0 => Ok(n as usize),
                        Some(Scalar::Integer(n)) => {
                            Err(unresolved(&format!("negative extent {n}")))
                        }
                        Some(other) => Err(unresolved(&format!(
                            "{} is a {}, not an integer",
                            name,
                            other.kind()
                        ))),
                        None => Err(unresolved("no value in scope")),
                    }
                }
            })
            .collect()
    }
}

/// Parsed control line
#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    pub how: How,
    pub factor: Option<f64>,
    pub iprn: Option<i64>,
    /// File name as written, for external storage
    pub path: Option<PathBuf>,
}

impl Control {
    pub fn new(how: How) -> Self {
        Self {
            how,
            factor: None,
            iprn: None,
            path: None,
        }
    }
}

/// Where unconverted values still live
#[derive(Debug, Clone)]
pub(crate) enum Source {
    Text(TextSpan),
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub(crate) enum Payload {
    Constant(f64),
    Data {
        buffer: OnceCell<Vec<f64>>,
        source: Option<Source>,
        /// Modified in memory since it was read
        dirty: bool,
    },
}

/// Contents named by one control line
#[derive(Debug, Clone)]
pub(crate) struct Part {
    pub control: Control,
    pub payload: Payload,
}

impl Part {
    pub fn constant(value: f64) -> Self {
        Self {
            control: Control::new(How::Constant),
            payload: Payload::Constant(value),
        }
    }

    pub fn data(control: Control, values: Vec<f64>) -> Self {
        Self {
            control,
            payload: Payload::Data {
                buffer: OnceCell::from(values),
                source: None,
                dirty: false,
            },
        }
    }

    pub fn deferred(control: Control, source: Source) -> Self {
        Self {
            control,
            payload: Payload::Data {
                buffer: OnceCell::new(),
                source: Some(source),
                dirty: false,
            },
        }
    }

    fn factor(&self) -> f64 {
        self.control.factor.unwrap_or(1.0)
    }

    fn is_loaded(&self) -> bool {
        match &self.payload {
            Payload::Constant(_) => true,
            Payload::Data { buffer, .. } => buffer.get().is_some(),
        }
    }

    /// Unscaled values of this part
    pub fn raw(&self, kind: NumKind, len: usize, label: &str) -> Result<Cow<'_, [f64]>> {
        match &self.payload {
            Payload::Constant(v) => Ok(Cow::Owned(vec![*v; len])),
            Payload::Data { buffer, source, .. } => {
                if buffer.get().is_none() {
                    let values = match source {
                        Some(source) => load(source, kind, len, label)?,
                        None => Vec::new(),
                    };
                    let _ = buffer.set(values);
                }
                Ok(Cow::Borrowed(
                    buffer.get().map(Vec::as_slice).unwrap_or_default(),
                ))
            }
        }
    }
}

fn load(source: &Source, kind: NumKind, len: usize, label: &str) -> Result<Vec<f64>> {
    let mut values = Vec::with_capacity(len);
    match source {
        Source::Text(span) => {
            tracing::trace!(param = label, len, "converting internal array");
            for (number, text) in span.lines() {
                convert(text, kind, label, Some(number), &mut values)?;
            }
        }
        Source::File(file) => {
            tracing::trace!(param = label, file = %file.display(), "reading external array");
            let text =
                fs::read_to_string(file).map_err(|source| Error::ExternalFileUnavailable {
                    path: label.to_string(),
                    file: file.clone(),
                    source,
                })?;
            convert(&text, kind, label, None, &mut values)?;
        }
    }
    if values.len() != len {
        return Err(Error::mismatch(
            label,
            format!("{len} values"),
            format!("{} values", values.len()),
            None,
        ));
    }
    Ok(values)
}

fn convert(
    text: &str,
    kind: NumKind,
    label: &str,
    line: Option<usize>,
    out: &mut Vec<f64>,
) -> Result<()> {
    for token in text.split_whitespace() {
        let value = kind
            .parse(token)
            .ok_or_else(|| Error::mismatch(label, kind.name(), format!("'{token}'"), line))?;
        out.push(value);
    }
    Ok(())
}

/// Contents of one array parameter
#[derive(Debug, Clone)]
pub struct ArrayStore {
    kind: NumKind,
    shape: Vec<usize>,
    layered: bool,
    parts: Vec<Part>,
    label: String,
}

impl ArrayStore {
    /// A single value broadcast over `shape`
    pub fn constant(kind: NumKind, shape: Vec<usize>, value: f64) -> Self {
        Self {
            kind,
            shape,
            layered: false,
            parts: vec![Part::constant(value)],
            label: String::new(),
        }
    }

    /// Values stored inline, in row-major order
    pub fn internal(kind: NumKind, shape: Vec<usize>, values: Vec<f64>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if values.len() != expected {
            return Err(Error::mismatch(
                "",
                format!("{expected} values"),
                format!("{} values", values.len()),
                None,
            ));
        }
        Ok(Self {
            kind,
            shape,
            layered: false,
            parts: vec![Part::data(Control::new(How::Internal), values)],
            label: String::new(),
        })
    }

    /// Values kept in `file` (as written) and read from `resolved` on first access
    pub fn external(
        kind: NumKind,
        shape: Vec<usize>,
        file: impl Into<PathBuf>,
        resolved: impl Into<PathBuf>,
    ) -> Self {
        let mut control = Control::new(How::External);
        control.path = Some(file.into());
        Self {
            kind,
            shape,
            layered: false,
            parts: vec![Part::deferred(control, Source::File(resolved.into()))],
            label: String::new(),
        }
    }

    /// Stack same-shaped single-part arrays as the layers of a new array
    pub fn stack(layers: Vec<ArrayStore>) -> Result<Self> {
        let Some(first) = layers.first() else {
            return Err(Error::mismatch("", "at least one layer", "none", None));
        };
        let kind = first.kind;
        let layer_shape = first.shape.clone();
        let mut shape = vec![layers.len()];
        shape.extend(&layer_shape);
        let mut parts = Vec::with_capacity(layers.len());
        for layer in layers {
            if layer.kind != kind || layer.shape != layer_shape || layer.parts.len() != 1 {
                return Err(Error::mismatch(
                    "",
                    format!("{} layer of shape {:?}", kind.name(), layer_shape),
                    format!("{} layer of shape {:?}", layer.kind.name(), layer.shape),
                    None,
                ));
            }
            parts.extend(layer.parts);
        }
        Ok(Self {
            kind,
            shape,
            layered: true,
            parts,
            label: String::new(),
        })
    }

    pub(crate) fn from_parts(
        kind: NumKind,
        shape: Vec<usize>,
        layered: bool,
        parts: Vec<Part>,
        label: &str,
    ) -> Self {
        Self {
            kind,
            shape,
            layered,
            parts,
            label: label.to_string(),
        }
    }

    /// Set the scale factor of every part
    pub fn with_factor(mut self, factor: f64) -> Self {
        for part in &mut self.parts {
            if part.control.how != How::Constant {
                part.control.factor = Some(factor);
            }
        }
        self
    }

    pub fn with_iprn(mut self, iprn: i64) -> Self {
        for part in &mut self.parts {
            part.control.iprn = Some(iprn);
        }
        self
    }

    pub(crate) fn set_label(&mut self, label: &str) {
        self.label = label.to_string();
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn kind(&self) -> NumKind {
        self.kind
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_layered(&self) -> bool {
        self.layered
    }

    /// Storage mode of the first part
    pub fn how(&self) -> How {
        self.parts
            .first()
            .map(|p| p.control.how)
            .unwrap_or(How::Internal)
    }

    /// Control of each part, one per layer when layered
    pub fn controls(&self) -> impl Iterator<Item = &Control> {
        self.parts.iter().map(|p| &p.control)
    }

    /// Scale factor of the first part
    pub fn factor(&self) -> f64 {
        self.parts.first().map(Part::factor).unwrap_or(1.0)
    }

    /// The broadcast value, when every part is the same constant
    pub fn constant_value(&self) -> Option<f64> {
        let mut value = None;
        for part in &self.parts {
            match (&part.payload, value) {
                (Payload::Constant(v), None) => value = Some(*v),
                (Payload::Constant(v), Some(seen)) if *v == seen => {}
                _ => return None,
            }
        }
        value
    }

    /// Whether every payload has been converted
    pub fn is_loaded(&self) -> bool {
        self.parts.iter().all(Part::is_loaded)
    }

    /// Elements per part
    pub(crate) fn part_len(&self) -> usize {
        if self.layered {
            self.shape.iter().skip(1).product()
        } else {
            self.len()
        }
    }

    /// External file names as written, with their resolved locations
    pub fn external_files(&self) -> Vec<(&Path, &Path)> {
        self.parts
            .iter()
            .filter_map(|part| match (&part.control.path, &part.payload) {
                (
                    Some(file),
                    Payload::Data {
                        source: Some(Source::File(resolved)),
                        ..
                    },
                ) => Some((file.as_path(), resolved.as_path())),
                (Some(file), _) => Some((file.as_path(), file.as_path())),
                _ => None,
            })
            .collect()
    }

    /// Convert every deferred payload now
    pub fn load(&self) -> Result<()> {
        let len = self.part_len();
        for part in &self.parts {
            part.raw(self.kind, len, &self.label)?;
        }
        Ok(())
    }

    fn flat(&self, scaled: bool) -> Result<Vec<f64>> {
        let len = self.part_len();
        let mut out = Vec::with_capacity(self.len());
        for part in &self.parts {
            let raw = part.raw(self.kind, len, &self.label)?;
            if scaled {
                let factor = part.factor();
                out.extend(raw.iter().map(|v| v * factor));
            } else {
                out.extend_from_slice(&raw);
            }
        }
        Ok(out)
    }

    fn shaped(&self, flat: Vec<f64>) -> Result<ArrayD<f64>> {
        ArrayD::from_shape_vec(IxDyn(&self.shape), flat)
            .map_err(|e| {
                Error::mismatch(&self.label, format!("shape {:?}", self.shape), e.to_string(), None)
            })
    }

    /// Shaped copy with factors applied
    pub fn value(&self) -> Result<ArrayD<f64>> {
        self.shaped(self.flat(true)?)
    }

    /// Shaped copy without factors
    pub fn raw(&self) -> Result<ArrayD<f64>> {
        self.shaped(self.flat(false)?)
    }

    /// Unscaled values in row-major order
    pub fn raw_values(&self) -> Result<Vec<f64>> {
        self.flat(false)
    }

    /// Replace the unscaled contents
    ///
    /// Constant parts become internal. External parts keep their file and are
    /// marked for flushing.
    pub fn set_raw(&mut self, values: Vec<f64>) -> Result<()> {
        if values.len() != self.len() {
            return Err(Error::mismatch(
                &self.label,
                format!("{} values", self.len()),
                format!("{} values", values.len()),
                None,
            ));
        }
        let len = self.part_len().max(1);
        for (part, chunk) in self.parts.iter_mut().zip(values.chunks(len)) {
            let external = part.control.how == How::External;
            if part.control.how == How::Constant {
                part.control = Control::new(How::Internal);
            }
            let source = match &part.payload {
                Payload::Data {
                    source: Some(Source::File(file)),
                    ..
                } => Some(Source::File(file.clone())),
                _ => None,
            };
            part.payload = Payload::Data {
                buffer: OnceCell::from(chunk.to_vec()),
                source,
                dirty: external,
            };
        }
        Ok(())
    }

    /// Replace the contents with one broadcast value
    pub fn set_constant(&mut self, value: f64) {
        let count = if self.layered { self.parts.len() } else { 1 };
        self.parts = (0..count).map(|_| Part::constant(value)).collect();
    }

    /// Adopt a new shape, keeping contents when they still fit
    ///
    /// Returns false when the contents cannot be kept; the caller drops them.
    pub(crate) fn reshape(&mut self, shape: Vec<usize>) -> bool {
        if shape == self.shape {
            return true;
        }
        let new_len: usize = shape.iter().product();
        if self.layered {
            let layers = shape.first().copied().unwrap_or(0);
            if let Some(value) = self.constant_value() {
                self.parts = (0..layers).map(|_| Part::constant(value)).collect();
                self.shape = shape;
                return true;
            }
            if layers == self.parts.len() && new_len == self.len() {
                self.shape = shape;
                return true;
            }
            return false;
        }
        if self.constant_value().is_some() || new_len == self.len() {
            self.shape = shape;
            return true;
        }
        false
    }

    /// Modified external parts: resolved file and unscaled values
    pub(crate) fn dirty_external(&self) -> Vec<(&Path, &[f64])> {
        self.parts
            .iter()
            .filter_map(|part| match &part.payload {
                Payload::Data {
                    buffer,
                    source: Some(Source::File(file)),
                    dirty: true,
                } => buffer.get().map(|b| (file.as_path(), b.as_slice())),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn mark_clean(&mut self) {
        for part in &mut self.parts {
            if let Payload::Data { dirty, .. } = &mut part.payload {
                *dirty = false;
            }
        }
    }
}

/// Structural equality: kind, shape, control modes and values
///
/// External parts compare by file name and factor without reading the file.
impl PartialEq for ArrayStore {
    fn eq(&self, other: &Self) -> bool {
        if self.kind != other.kind
            || self.shape != other.shape
            || self.layered != other.layered
            || self.parts.len() != other.parts.len()
        {
            return false;
        }
        let len = self.part_len();
        self.parts.iter().zip(&other.parts).all(|(a, b)| {
            if a.control != b.control {
                return false;
            }
            match (&a.payload, &b.payload) {
                (Payload::Constant(x), Payload::Constant(y)) => x == y,
                _ if a.control.how == How::External => true,
                _ => match (
                    a.raw(self.kind, len, &self.label),
                    b.raw(other.kind, len, &other.label),
                ) {
                    (Ok(x), Ok(y)) => x == y,
                    _ => false,
                },
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_constant_broadcast() {
        let store = ArrayStore::constant(NumKind::Double, vec![3, 4], 2.0);
        let value = store.value().unwrap();
        assert_eq!(value.shape(), &[3, 4]);
        assert!(value.iter().all(|v| *v == 2.0));
        assert_eq!(store.how(), How::Constant);
        assert_eq!(store.constant_value(), Some(2.0));
    }

    #[test]
    fn test_factor_applied_on_read_only() {
        let store = ArrayStore::internal(NumKind::Double, vec![3], vec![1.0, 2.0, 3.0])
            .unwrap()
            .with_factor(2.0);
        assert_eq!(store.value().unwrap(), array![2.0, 4.0, 6.0].into_dyn());
        assert_eq!(store.raw().unwrap(), array![1.0, 2.0, 3.0].into_dyn());
        assert_eq!(store.factor(), 2.0);
    }

    #[test]
    fn test_internal_length_checked() {
        let err = ArrayStore::internal(NumKind::Double, vec![2, 2], vec![1.0]).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_stack_layers() {
        let top = ArrayStore::constant(NumKind::Double, vec![2], 1.0);
        let bottom = ArrayStore::internal(NumKind::Double, vec![2], vec![5.0, 6.0])
            .unwrap()
            .with_factor(10.0);
        let store = ArrayStore::stack(vec![top, bottom]).unwrap();
        assert!(store.is_layered());
        assert_eq!(store.shape(), &[2, 2]);
        assert_eq!(
            store.value().unwrap(),
            array![[1.0, 1.0], [50.0, 60.0]].into_dyn()
        );
    }

    #[test]
    fn test_set_raw_promotes_constant() {
        let mut store = ArrayStore::constant(NumKind::Integer, vec![2], 1.0);
        store.set_raw(vec![1.0, 2.0]).unwrap();
        assert_eq!(store.how(), How::Internal);
        assert_eq!(store.raw_values().unwrap(), vec![1.0, 2.0]);

        let err = store.set_raw(vec![1.0]).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        assert_eq!(store.raw_values().unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_reshape_rules() {
        let mut constant = ArrayStore::constant(NumKind::Double, vec![3], 1.0);
        assert!(constant.reshape(vec![5]));
        assert_eq!(constant.len(), 5);

        let mut data = ArrayStore::internal(NumKind::Double, vec![2, 3], vec![0.0; 6]).unwrap();
        assert!(data.reshape(vec![3, 2]));
        assert!(!data.reshape(vec![4, 2]));
    }

    #[test]
    fn test_external_missing_file() {
        let mut store =
            ArrayStore::external(NumKind::Double, vec![2], "top.txt", "/nonexistent/top.txt");
        store.set_label("gwf/dis/griddata/top");
        let err = store.value().unwrap_err();
        match err {
            Error::ExternalFileUnavailable { path, file, .. } => {
                assert_eq!(path, "gwf/dis/griddata/top");
                assert_eq!(file, PathBuf::from("/nonexistent/top.txt"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_external_loads_once() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("top.txt");
        fs::write(&file, "1.0 2.0\n3.0\n").unwrap();
        let store = ArrayStore::external(NumKind::Double, vec![3], "top.txt", &file);
        assert!(!store.is_loaded());
        assert_eq!(store.raw_values().unwrap(), vec![1.0, 2.0, 3.0]);
        assert!(store.is_loaded());

        fs::remove_file(&file).unwrap();
        assert_eq!(store.raw_values().unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_resolve_shape_unresolved() {
        struct Empty;
        impl Lookup for Empty {
            fn scalar(&self, _name: &str) -> Option<Scalar> {
                None
            }
        }
        let def = ArrayDef {
            kind: NumKind::Double,
            shape: vec![Dim::from("ncol")],
            layered: false,
        };
        let err = def.resolve_shape(&Empty, "dis/griddata/delr").unwrap_err();
        match err {
            Error::ShapeUnresolved { path, dim, .. } => {
                assert_eq!(path, "dis/griddata/delr");
                assert_eq!(dim, "ncol");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
