//! List serialization

use std::io::Write;

use super::Sink;
use crate::error::Result;
use crate::types::{Cell, ColumnType, ListStore, Row};

fn row_text(store: &ListStore, row: &Row) -> String {
    let columns = store.schema().columns();
    let mut tokens = Vec::with_capacity(row.len());
    for (column, cell) in columns.iter().zip(row.cells()) {
        match (cell, &column.ty) {
            (Cell::Keystring(ks), ColumnType::Keystring(def)) => tokens.extend(ks.to_tokens(def)),
            (Cell::Keystring(ks), _) => tokens.push(ks.variant.to_ascii_uppercase()),
            (Cell::Scalar(scalar), _) => tokens.push(scalar.to_token()),
        }
    }
    tokens.join(" ")
}

/// One line per row, cells in column order
pub fn write_list<W: Write>(sink: &mut Sink<'_, W>, store: &ListStore) -> Result<()> {
    for row in store.rows()? {
        sink.line(1, &row_text(store, row))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnDef, ListDef, Lookup, Scalar, ScalarKind};

    struct Empty;

    impl Lookup for Empty {
        fn scalar(&self, _: &str) -> Option<Scalar> {
            None
        }
    }

    #[test]
    fn test_rows_with_quoted_names() {
        let def = ListDef::new(vec![
            ColumnDef::new("cellid", ScalarKind::Integer),
            ColumnDef::new("head", ScalarKind::Double),
            ColumnDef::new("name", ScalarKind::String).optional(),
        ]);
        let schema = def.resolve(&Empty, "chd").unwrap();
        let store = ListStore::from_rows(
            schema,
            vec![
                Row::new(vec![1i64.into(), 10.0.into(), "east bank".into()]),
                Row::new(vec![2i64.into(), 9.5.into()]),
            ],
        )
        .unwrap();

        let mut buf = Vec::new();
        let mut sink = Sink::new(&mut buf, 2);
        write_list(&mut sink, &store).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "  1 10.0 'east bank'\n  2 9.5\n"
        );
    }
}
