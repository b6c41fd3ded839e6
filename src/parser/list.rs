//! List block parsing

use super::{Cursor, Parser};
use crate::error::Result;
use crate::options::{CodecOptions, Load};
use crate::types::{ListDef, ListStore, Lookup, TextSpan};

/// Reads rows up to, not including, the line that ends the block
pub(crate) struct ListParser<'s> {
    pub def: &'s ListDef,
    pub lookup: &'s dyn Lookup,
    pub options: &'s CodecOptions,
    pub path: &'s str,
}

impl<'a> Parser<'a> for ListParser<'_> {
    type Output = ListStore;

    fn parse(&self, mut cursor: Cursor<'a>) -> Result<(Self::Output, Cursor<'a>)> {
        let schema = self.def.resolve(self.lookup, self.path)?;
        let mut span = TextSpan::new();
        let mut rows = Vec::new();

        while let Some(line) = cursor.peek() {
            let tokens = line.tokens();
            if tokens[0].eq_ignore_ascii_case("end") || tokens[0].eq_ignore_ascii_case("begin") {
                break;
            }
            match self.options.lists {
                Load::Eager => rows.push(schema.convert(&tokens, line.number, self.path)?),
                Load::Lazy => {
                    schema.check(&tokens, line.number, self.path)?;
                    span.push(line.number, line.text);
                }
            }
            cursor = cursor.advance();
        }

        let store = match self.options.lists {
            Load::Eager => {
                let mut store = ListStore::from_rows(schema, rows)?;
                store.set_label(self.path);
                store
            }
            Load::Lazy => ListStore::deferred(schema, span, self.path),
        };
        tracing::trace!(param = self.path, rows = store.len(), "read list");
        Ok((store, cursor))
    }
}
