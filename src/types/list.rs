//! List store
//!
//! Rows of schema-typed cells. The column schema is the declared base columns
//! followed by extension groups (auxiliary variables, boundary names) whose
//! presence and width come from other parameters.

use std::borrow::Cow;
use std::cell::OnceCell;

use serde::{Deserialize, Serialize};

use super::TextSpan;
use super::param::Lookup;
use super::record::{Keystring, KeystringDef};
use super::scalar::{Scalar, ScalarKind};
use crate::error::{Error, Result};
use crate::parser::lines::tokenize;

/// How an extension group's columns are switched on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    /// A keyword parameter adds one column named after the group
    Flag(String),
    /// An integer parameter gives the column count; columns are `group1..`
    Count(String),
    /// A string parameter lists the column names
    Names(String),
}

impl Presence {
    /// Name of the controlling parameter
    pub fn controller(&self) -> &str {
        match self {
            Presence::Flag(name) | Presence::Count(name) | Presence::Names(name) => name,
        }
    }
}

/// Optional trailing column group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionDef {
    pub group: String,
    pub kind: ScalarKind,
    pub presence: Presence,
}

impl ExtensionDef {
    pub fn new(group: &str, kind: ScalarKind, presence: Presence) -> Self {
        Self {
            group: group.to_ascii_lowercase(),
            kind,
            presence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Scalar(ScalarKind),
    /// Variable-width trailing column selected by its first token
    Keystring(KeystringDef),
}

/// Declared base column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ColumnType,
    #[serde(default)]
    pub optional: bool,
}

impl ColumnDef {
    pub fn new(name: &str, kind: ScalarKind) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            ty: ColumnType::Scalar(kind),
            optional: false,
        }
    }

    pub fn keystring(name: &str, def: KeystringDef) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            ty: ColumnType::Keystring(def),
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Declared row type of a list parameter
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListDef {
    pub columns: Vec<ColumnDef>,
    #[serde(default)]
    pub extensions: Vec<ExtensionDef>,
}

impl ListDef {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self {
            columns,
            extensions: Vec::new(),
        }
    }

    pub fn extension(mut self, extension: ExtensionDef) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Names of the parameters extension groups depend on
    pub fn controllers(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(|e| e.presence.controller())
    }

    /// Expand extension groups against current parameter values
    pub fn resolve(&self, lookup: &dyn Lookup, path: &str) -> Result<ListSchema> {
        let mut extra = Vec::new();
        for ext in &self.extensions {
            let controller = ext.presence.controller();
            let value = lookup.scalar(controller);
            let names: Vec<String> = match (&ext.presence, value) {
                (Presence::Flag(_), Some(Scalar::Keyword(true))) => vec![ext.group.clone()],
                (Presence::Count(_), Some(Scalar::Integer(n))) if n < 0 => {
                    return Err(Error::ShapeUnresolved {
                        path: path.to_string(),
                        dim: controller.to_string(),
                        reason: format!("negative column count {n}"),
                    });
                }
                (Presence::Count(_), Some(Scalar::Integer(n))) => {
                    (1..=n).map(|i| format!("{}{i}", ext.group)).collect()
                }
                (Presence::Names(_), Some(Scalar::String(names))) => names
                    .split_whitespace()
                    .map(|n| n.to_ascii_lowercase())
                    .collect(),
                _ => Vec::new(),
            };
            extra.extend(names.into_iter().map(|name| Column {
                name,
                ty: ColumnType::Scalar(ext.kind),
                optional: false,
                group: Some(ext.group.clone()),
            }));
        }
        let extended = !extra.is_empty();
        let mut columns: Vec<Column> = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                ty: c.ty.clone(),
                optional: c.optional && !extended,
                group: None,
            })
            .collect();
        columns.extend(extra);
        Ok(ListSchema { columns })
    }
}

/// One resolved column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
    pub optional: bool,
    /// Extension group the column belongs to
    pub group: Option<String>,
}

/// Resolved columns of a list
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListSchema {
    columns: Vec<Column>,
}

impl ListSchema {
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Columns in extension group `group`
    pub fn group(&self, group: &str) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(move |c| c.group.as_deref() == Some(group))
    }

    fn keystring(&self) -> Option<&KeystringDef> {
        match self.columns.last().map(|c| &c.ty) {
            Some(ColumnType::Keystring(def)) => Some(def),
            _ => None,
        }
    }

    /// Fixed-width columns before any trailing keystring
    fn fixed(&self) -> usize {
        if self.keystring().is_some() {
            self.columns.len() - 1
        } else {
            self.columns.len()
        }
    }

    fn required(&self) -> usize {
        self.columns.iter().filter(|c| !c.optional).count()
    }

    fn expected(&self) -> String {
        if self.keystring().is_some() {
            format!("at least {}", self.fixed() + 1)
        } else if self.required() == self.columns.len() {
            self.columns.len().to_string()
        } else {
            format!("{} to {}", self.required(), self.columns.len())
        }
    }

    fn arity_error(&self, path: &str, row: usize, found: usize) -> Error {
        Error::RowArityMismatch {
            path: path.to_string(),
            row,
            expected: self.expected(),
            found,
        }
    }

    /// Check a row's width, and its keystring variant if it has one
    pub(crate) fn check(&self, tokens: &[Cow<'_, str>], row: usize, path: &str) -> Result<()> {
        let found = tokens.len();
        match self.keystring() {
            Some(def) => {
                let fixed = self.fixed();
                if found <= fixed {
                    return Err(self.arity_error(path, row, found));
                }
                let (_, used) = def.parse(&tokens[fixed..], path, Some(row))?;
                if fixed + used != found {
                    return Err(self.arity_error(path, row, found));
                }
            }
            None => {
                if found < self.required() || found > self.columns.len() {
                    return Err(self.arity_error(path, row, found));
                }
            }
        }
        Ok(())
    }

    /// Convert the tokens of one row
    pub(crate) fn convert(&self, tokens: &[Cow<'_, str>], row: usize, path: &str) -> Result<Row> {
        self.check(tokens, row, path)?;
        let mut cells = Vec::with_capacity(self.columns.len());
        for (column, token) in self.columns.iter().zip(tokens.iter()) {
            let cell_path = format!("{path}/{}", column.name);
            let cell = match &column.ty {
                ColumnType::Scalar(kind) => {
                    let scalar = Scalar::from_token(*kind, token).ok_or_else(|| {
                        Error::mismatch(&cell_path, kind.name(), format!("'{token}'"), Some(row))
                    })?;
                    Cell::Scalar(scalar)
                }
                ColumnType::Keystring(def) => {
                    let at = cells.len();
                    let (ks, _) = def.parse(&tokens[at..], &cell_path, Some(row))?;
                    Cell::Keystring(ks)
                }
            };
            cells.push(cell);
        }
        Ok(Row { cells })
    }

    /// Check a row built in memory, widening integers in real columns
    pub(crate) fn admit(&self, row: Row, number: usize, path: &str) -> Result<Row> {
        let found = row.cells.len();
        if found < self.required() || found > self.columns.len() {
            return Err(self.arity_error(path, number, found));
        }
        let mut cells = Vec::with_capacity(found);
        for (column, cell) in self.columns.iter().zip(row.cells) {
            let cell = match (&column.ty, cell) {
                (ColumnType::Scalar(ScalarKind::Double), Cell::Scalar(Scalar::Integer(i))) => {
                    Cell::Scalar(Scalar::Double(i as f64))
                }
                (ColumnType::Scalar(kind), Cell::Scalar(s)) if s.kind() == *kind => Cell::Scalar(s),
                (ColumnType::Keystring(def), Cell::Keystring(ks)) => {
                    let cell_path = format!("{path}/{}", column.name);
                    Cell::Keystring(def.admit(ks, &cell_path, Some(number))?)
                }
                (ty, cell) => {
                    let expected = match ty {
                        ColumnType::Scalar(kind) => kind.name(),
                        ColumnType::Keystring(_) => "keystring",
                    };
                    return Err(Error::mismatch(
                        &format!("{path}/{}", column.name),
                        expected,
                        cell.kind_name(),
                        Some(number),
                    ));
                }
            };
            cells.push(cell);
        }
        Ok(Row { cells })
    }

    /// `row` laid out under `target`, each cell matched to its column by name
    fn remap(&self, row: &Row, target: &ListSchema, number: usize) -> Option<Row> {
        let mut cells = Vec::with_capacity(target.columns.len());
        for column in &target.columns {
            match self.position(&column.name).and_then(|i| row.get(i)) {
                Some(cell) => cells.push(cell.clone()),
                None if column.optional => break,
                None => return None,
            }
        }
        target.admit(Row { cells }, number, "").ok()
    }
}

/// One list cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Scalar(Scalar),
    Keystring(Keystring),
}

impl Cell {
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Cell::Scalar(s) => Some(s),
            Cell::Keystring(_) => None,
        }
    }

    pub fn as_keystring(&self) -> Option<&Keystring> {
        match self {
            Cell::Keystring(k) => Some(k),
            Cell::Scalar(_) => None,
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Cell::Scalar(s) => s.kind().name(),
            Cell::Keystring(_) => "keystring",
        }
    }
}

impl From<Scalar> for Cell {
    fn from(v: Scalar) -> Self {
        Cell::Scalar(v)
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Scalar(Scalar::Integer(v))
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Scalar(Scalar::Double(v))
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Scalar(Scalar::String(v.to_string()))
    }
}

impl From<Keystring> for Cell {
    fn from(v: Keystring) -> Self {
        Cell::Keystring(v)
    }
}

/// One list row, cells in column order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    cells: Vec<Cell>,
}

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Contents of one list parameter
#[derive(Debug, Clone)]
pub struct ListStore {
    schema: ListSchema,
    rows: OnceCell<Vec<Row>>,
    /// One line per row, converted on first access
    source: Option<TextSpan>,
    count: usize,
    label: String,
}

impl ListStore {
    /// An empty list
    pub fn new(schema: ListSchema) -> Self {
        Self {
            schema,
            rows: OnceCell::from(Vec::new()),
            source: None,
            count: 0,
            label: String::new(),
        }
    }

    /// A list of checked rows
    pub fn from_rows(schema: ListSchema, rows: Vec<Row>) -> Result<Self> {
        let mut store = Self::new(schema);
        store.set_rows(rows)?;
        Ok(store)
    }

    /// Rows still in text form, already checked for width
    pub(crate) fn deferred(schema: ListSchema, span: TextSpan, label: &str) -> Self {
        let count = span.len();
        Self {
            schema,
            rows: OnceCell::new(),
            source: Some(span),
            count,
            label: label.to_string(),
        }
    }

    pub(crate) fn set_label(&mut self, label: &str) {
        self.label = label.to_string();
    }

    pub fn schema(&self) -> &ListSchema {
        &self.schema
    }

    /// Number of rows, known without converting them
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_loaded(&self) -> bool {
        self.rows.get().is_some()
    }

    /// Convert any deferred rows now
    pub fn load(&self) -> Result<()> {
        self.rows().map(|_| ())
    }

    pub fn rows(&self) -> Result<&[Row]> {
        if self.rows.get().is_none() {
            let mut rows = Vec::with_capacity(self.count);
            if let Some(span) = &self.source {
                tracing::trace!(param = %self.label, rows = self.count, "converting list rows");
                for (number, text) in span.lines() {
                    rows.push(self.schema.convert(&tokenize(text), number, &self.label)?);
                }
            }
            let _ = self.rows.set(rows);
        }
        Ok(self.rows.get().map(Vec::as_slice).unwrap_or_default())
    }

    pub fn row(&self, index: usize) -> Result<Option<&Row>> {
        Ok(self.rows()?.get(index))
    }

    /// Cells of one column by name, `None` where an optional cell is omitted
    pub fn column(&self, name: &str) -> Result<Vec<Option<&Cell>>> {
        let index = self
            .schema
            .position(name)
            .ok_or_else(|| Error::UnknownParameter {
                path: self.label.clone(),
                name: name.to_string(),
                line: None,
            })?;
        Ok(self.rows()?.iter().map(|row| row.get(index)).collect())
    }

    /// Replace every row; nothing changes if any row is rejected
    pub fn set_rows(&mut self, rows: Vec<Row>) -> Result<()> {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| self.schema.admit(row, i + 1, &self.label))
            .collect::<Result<Vec<_>>>()?;
        self.count = rows.len();
        self.rows = OnceCell::from(rows);
        self.source = None;
        Ok(())
    }

    pub fn push(&mut self, row: Row) -> Result<()> {
        let row = self.schema.admit(row, self.count + 1, &self.label)?;
        let mut rows = self.rows()?.to_vec();
        rows.push(row);
        self.count = rows.len();
        self.rows = OnceCell::from(rows);
        self.source = None;
        Ok(())
    }

    /// Adopt a re-resolved schema
    ///
    /// Cells follow their column by name and columns that are gone are
    /// dropped. A new required column has nothing to fill it, so existing
    /// rows are dropped instead; returns false when that happens.
    pub(crate) fn reschema(&mut self, schema: ListSchema) -> bool {
        if schema == self.schema {
            return true;
        }
        if self.count == 0 {
            self.schema = schema;
            return true;
        }
        let moved = self.rows().ok().and_then(|rows| {
            rows.iter()
                .enumerate()
                .map(|(i, row)| self.schema.remap(row, &schema, i + 1))
                .collect::<Option<Vec<Row>>>()
        });
        self.schema = schema;
        self.source = None;
        match moved {
            Some(rows) => {
                self.rows = OnceCell::from(rows);
                true
            }
            None => {
                self.rows = OnceCell::from(Vec::new());
                self.count = 0;
                false
            }
        }
    }
}

/// Structural equality: schema and converted rows
impl PartialEq for ListStore {
    fn eq(&self, other: &Self) -> bool {
        if self.schema != other.schema || self.count != other.count {
            return false;
        }
        match (self.rows(), other.rows()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}
