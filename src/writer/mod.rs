//! Block-text writer
//!
//! Writes one component node back to MF6 input text. Parameters keep the
//! storage mode they were read or set with. Optional parameters are written
//! only when given; required ones are written whether given or defaulted.

mod array;
mod external;
mod list;
mod value;

use std::io::{self, Write};

use crate::context::{ContextTree, Kind, NodeId};
use crate::error::{Error, Result};
use crate::options::CodecOptions;
use crate::types::{ArrayStore, ListStore, Param, ParamType};

pub use external::flush_external;

/// Byte sink that reports the offset of a failed write
pub(crate) struct Sink<'w, W: Write> {
    inner: &'w mut W,
    written: usize,
    path: String,
    indent: usize,
}

impl<'w, W: Write> Sink<'w, W> {
    fn new(inner: &'w mut W, indent: usize) -> Self {
        Self {
            inner,
            written: 0,
            path: String::new(),
            indent,
        }
    }

    fn fail(&self, source: io::Error) -> Error {
        Error::Write {
            path: self.path.clone(),
            boundary: self.written,
            source,
        }
    }

    /// One line at `depth` levels of indentation
    pub fn line(&mut self, depth: usize, text: &str) -> Result<()> {
        let pad = " ".repeat(depth * self.indent);
        for chunk in [pad.as_bytes(), text.as_bytes(), b"\n".as_slice()] {
            self.inner.write_all(chunk).map_err(|e| self.fail(e))?;
            self.written += chunk.len();
        }
        Ok(())
    }

    pub fn blank(&mut self) -> Result<()> {
        self.inner.write_all(b"\n").map_err(|e| self.fail(e))?;
        self.written += 1;
        Ok(())
    }

    pub fn set_path(&mut self, path: String) {
        self.path = path;
    }
}

/// Write the root component with default options
pub fn write(tree: &ContextTree) -> Result<Vec<u8>> {
    write_with(tree, tree.root(), &CodecOptions::default())
}

/// Write one component node to bytes
pub fn write_with(tree: &ContextTree, node: NodeId, options: &CodecOptions) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_to(&mut buf, tree, node, options)?;
    Ok(buf)
}

/// Write one component node, returning the number of bytes written
pub fn write_to<W: Write>(
    writer: &mut W,
    tree: &ContextTree,
    node: NodeId,
    options: &CodecOptions,
) -> Result<usize> {
    let mut sink = Sink::new(writer, options.indent);
    let mut first = true;
    for &block in tree.children(node) {
        if tree.node(block).kind() != Kind::Block {
            continue;
        }
        let path = tree.path(block);
        sink.set_path(path);
        let lines = block_lines(tree, block)?;
        let indexed = tree.node(block).index().is_some();
        if lines.is_empty() && !indexed {
            continue;
        }
        if !first {
            sink.blank()?;
        }
        first = false;
        write_block(&mut sink, tree, block, lines)?;
    }
    sink.inner.flush().map_err(|e| sink.fail(e))?;
    tracing::debug!(component = %tree.path(node), bytes = sink.written, "wrote component");
    Ok(sink.written)
}

/// Entries of a block in declaration order
enum Entry<'t> {
    Text(String),
    Array(&'t str, &'t ArrayStore),
    List(&'t ListStore),
}

fn block_lines(tree: &ContextTree, block: NodeId) -> Result<Vec<Entry<'_>>> {
    let mut entries = Vec::new();
    for (name, param) in tree.params(block) {
        let Some(param) = param else { continue };
        let id = tree.param(block, name)?;
        if !tree.emits(id) {
            continue;
        }
        let spec = tree.spec(id);
        match (&spec.ty, param) {
            (ParamType::Array(_), Param::Array(store)) => {
                entries.push(Entry::Array(&spec.name, store))
            }
            (ParamType::List(_), Param::List(store)) => entries.push(Entry::List(store)),
            _ => {
                if let Some(text) = value::entry(spec, param) {
                    entries.push(Entry::Text(text));
                }
            }
        }
    }
    Ok(entries)
}

fn write_block<W: Write>(
    sink: &mut Sink<'_, W>,
    tree: &ContextTree,
    block: NodeId,
    entries: Vec<Entry<'_>>,
) -> Result<()> {
    let node = tree.node(block);
    let name = node.name().to_ascii_uppercase();
    match node.index() {
        Some(index) => sink.line(0, &format!("BEGIN {name} {index}"))?,
        None => sink.line(0, &format!("BEGIN {name}"))?,
    }
    for entry in entries {
        match entry {
            Entry::Text(text) => sink.line(1, &text)?,
            Entry::Array(name, store) => array::write_array(sink, name, store)?,
            Entry::List(store) => list::write_list(sink, store)?,
        }
    }
    sink.line(0, &format!("END {name}"))
}
