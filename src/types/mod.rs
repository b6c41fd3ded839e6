//! Parameter value model

mod array;
mod list;
mod param;
mod record;
mod scalar;
mod value;

pub use array::{ArrayDef, ArrayStore, Control, Dim, How, NumKind};
pub(crate) use array::{Part, Payload, Source};
pub use list::{
    Cell, Column, ColumnDef, ColumnType, ExtensionDef, ListDef, ListSchema, ListStore, Presence,
    Row,
};
pub use param::{Lookup, Param, ParamSpec, ParamType};
pub use record::{FieldDef, Keystring, KeystringDef, Record, RecordDef};
pub use scalar::{InOut, Scalar, ScalarKind, format_double, parse_double, parse_int};
pub use value::{Value, ValueTag};

/// Unconverted input lines kept for deferred conversion
#[derive(Debug, Clone, Default)]
pub(crate) struct TextSpan {
    text: String,
    /// Source line number and byte offset of each line
    starts: Vec<(usize, usize)>,
}

impl TextSpan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, number: usize, line: &str) {
        self.starts.push((number, self.text.len()));
        self.text.push_str(line);
        self.text.push('\n');
    }

    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    pub fn lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.starts.iter().enumerate().map(|(i, &(number, start))| {
            let end = self
                .starts
                .get(i + 1)
                .map(|&(_, next)| next)
                .unwrap_or(self.text.len());
            (number, self.text[start..end].trim_end())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_span_lines() {
        let mut span = TextSpan::new();
        span.push(4, "1 2 3");
        span.push(7, "4 5");
        let lines: Vec<(usize, &str)> = span.lines().collect();
        assert_eq!(lines, vec![(4, "1 2 3"), (7, "4 5")]);
        assert_eq!(span.len(), 2);
    }
}
