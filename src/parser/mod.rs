//! Block-text parser
//!
//! Input is split into meaningful lines once; each sub-parser takes a
//! `Cursor` and returns its output with the advanced cursor. Bulk data is
//! checked for shape while parsing and converted either immediately or on
//! first access, per `CodecOptions`.

mod array;
mod block;
pub(crate) mod lines;
mod list;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::context::{ContextTree, NodeId};
use crate::error::{Error, Result};
use crate::options::CodecOptions;
use crate::schema::ComponentSpec;
use lines::{Line, split_lines};

pub(crate) use block::ComponentParser;

/// Position within the meaningful lines of one input
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cursor<'a> {
    lines: &'a [Line<'a>],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(lines: &'a [Line<'a>]) -> Self {
        Self { lines, pos: 0 }
    }

    pub fn peek(&self) -> Option<Line<'a>> {
        self.lines.get(self.pos).copied()
    }

    pub fn advance(self) -> Self {
        Self {
            lines: self.lines,
            pos: (self.pos + 1).min(self.lines.len()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.lines.len()
    }

    /// Line number to report when input ends early
    pub fn end_line(&self) -> usize {
        self.lines.last().map(|l| l.number).unwrap_or(0)
    }
}

/// A line-oriented parser
pub(crate) trait Parser<'a> {
    type Output;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Output, Cursor<'a>)>;
}

fn decode<'b>(bytes: &'b [u8], path: &str) -> Result<&'b str> {
    std::str::from_utf8(bytes).map_err(|e| {
        let line = bytes[..e.valid_up_to()].iter().filter(|&&b| b == b'\n').count() + 1;
        Error::syntax(path, line, "input is not valid UTF-8")
    })
}

/// Parse one component into a new tree rooted at it
///
/// The root is named after the component type; use [`parse_named`] to pick
/// the name.
pub fn parse(bytes: &[u8], spec: &ComponentSpec, options: &CodecOptions) -> Result<ContextTree> {
    parse_named(bytes, spec, &spec.name, options)
}

/// Parse one component into a new tree whose root is `name`
pub fn parse_named(
    bytes: &[u8],
    spec: &ComponentSpec,
    name: &str,
    options: &CodecOptions,
) -> Result<ContextTree> {
    let text = decode(bytes, name)?;
    let lines = split_lines(text);
    let spec = Arc::new(spec.clone());
    let parser = ComponentParser {
        spec: &spec,
        name,
        tree: None,
        options,
        path: name,
    };
    let (staged, _) = parser.parse(Cursor::new(&lines))?;
    let mut tree = ContextTree::new(name, spec.kind.into());
    tree.configure(options);
    tree.attach(None, staged);
    Ok(tree)
}

/// Parse one component and attach it under `parent`
///
/// Dimensions and extension controllers the component does not declare
/// itself resolve against the nodes already in the tree. On error the tree
/// is unchanged.
pub fn parse_into(
    tree: &mut ContextTree,
    parent: NodeId,
    name: &str,
    bytes: &[u8],
    spec: &ComponentSpec,
    options: &CodecOptions,
) -> Result<NodeId> {
    let path = format!("{}/{}", tree.path(parent), name.to_ascii_lowercase());
    let text = decode(bytes, &path)?;
    let lines = split_lines(text);
    let spec = Arc::new(spec.clone());
    let parser = ComponentParser {
        spec: &spec,
        name,
        tree: Some((&*tree, parent)),
        options,
        path: &path,
    };
    let (staged, _) = parser.parse(Cursor::new(&lines))?;
    Ok(tree.attach(Some(parent), staged))
}

/// Read and parse a component file, recording the file on the new node
pub fn parse_file_into(
    tree: &mut ContextTree,
    parent: NodeId,
    name: &str,
    file: &Path,
    spec: &ComponentSpec,
    options: &CodecOptions,
) -> Result<NodeId> {
    let path = format!("{}/{}", tree.path(parent), name.to_ascii_lowercase());
    let resolved = options.resolve(file);
    let bytes = fs::read(&resolved).map_err(|source| Error::ExternalFileUnavailable {
        path: path.clone(),
        file: resolved.clone(),
        source,
    })?;
    tracing::debug!(component = %path, file = %resolved.display(), "reading component");
    let node = parse_into(tree, parent, name, &bytes, spec, options)?;
    tree.set_file(node, file);
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::builtin;
    use crate::types::{How, Param};

    #[test]
    fn test_parse_component() {
        let schema = builtin();
        let input = b"BEGIN OPTIONS\n  LENGTH_UNITS meters\nEND OPTIONS\n\nBEGIN DIMENSIONS\n  NLAY 1\n  NROW 2\n  NCOL 3\nEND DIMENSIONS\n\nBEGIN GRIDDATA\n  DELR\n    CONSTANT 100.0\n  TOP\n    INTERNAL FACTOR 1.0\n      1 2 3\n      4 5 6\nEND GRIDDATA\n";
        let tree = parse(input, schema.get("gwf-dis").unwrap(), &CodecOptions::default()).unwrap();

        let units = tree.lookup("options/length_units").unwrap();
        assert_eq!(tree.get(units).and_then(Param::as_str), Some("meters"));

        let top = tree.lookup("griddata/top").unwrap();
        let store = tree.get(top).and_then(Param::as_array).unwrap();
        assert_eq!(store.how(), How::Internal);
        assert!(!store.is_loaded());
        assert_eq!(store.raw_values().unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(store.is_loaded());
    }

    #[test]
    fn test_non_utf8_is_syntax_error() {
        let schema = builtin();
        let spec = schema.get("gwf-ic").unwrap();
        let err = parse(b"BEGIN OPTIONS\n\xff\n", spec, &CodecOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 2, .. }));
    }

    #[test]
    fn test_parse_into_resolves_against_tree() {
        let schema = builtin();
        let options = CodecOptions::default();
        let mut tree = ContextTree::new("gwf", crate::context::Kind::Model);
        let root = tree.root();
        parse_into(
            &mut tree,
            root,
            "dis",
            b"BEGIN DIMENSIONS\n NLAY 2\n NROW 1\n NCOL 2\nEND DIMENSIONS\n",
            schema.get("gwf-dis").unwrap(),
            &options,
        )
        .unwrap();
        parse_into(
            &mut tree,
            root,
            "ic",
            b"BEGIN GRIDDATA\n STRT LAYERED\n  CONSTANT 10.0\n  CONSTANT 20.0\nEND GRIDDATA\n",
            schema.get("gwf-ic").unwrap(),
            &options,
        )
        .unwrap();
        let strt = tree.lookup("ic/griddata/strt").unwrap();
        let value = tree.get(strt).and_then(Param::as_array).unwrap().value().unwrap();
        assert_eq!(value.shape(), &[2, 1, 2]);
        assert_eq!(value.iter().copied().collect::<Vec<_>>(), vec![10.0, 10.0, 20.0, 20.0]);
    }

    #[test]
    fn test_failed_parse_leaves_tree_unchanged() {
        let schema = builtin();
        let mut tree = ContextTree::new("gwf", crate::context::Kind::Model);
        let root = tree.root();
        let before = tree.clone();
        let err = parse_into(
            &mut tree,
            root,
            "ic",
            b"BEGIN GRIDDATA\n STRT\n  CONSTANT 1.0\nEND GRIDDATA\n",
            schema.get("gwf-ic").unwrap(),
            &CodecOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ShapeUnresolved { .. }));
        assert_eq!(tree, before);
    }
}
