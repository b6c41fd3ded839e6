//! Exchange representation
//!
//! Converts between a component node and a nested `Value`: one object per
//! block keyed by block name, indexed blocks keyed by their index, and child
//! components keyed by their name.

use crate::context::{ContextTree, Kind, NodeId};
use crate::error::{Error, Result};
use crate::options::CodecOptions;
use crate::schema::ComponentSpec;
use crate::types::Value;

fn insert(entries: &mut Vec<(String, Value)>, key: &str, value: Value) {
    entries.push((key.to_string(), value));
}

/// Written parameters of one block
fn block_value(tree: &ContextTree, block: NodeId) -> Result<Value> {
    let mut entries = Vec::new();
    for (name, _) in tree.params(block) {
        let id = tree.param(block, name)?;
        if !tree.emits(id) {
            continue;
        }
        if let Some(value) = tree.value(id)? {
            if value == Value::Bool(false) {
                continue;
            }
            insert(&mut entries, name, value);
        }
    }
    Ok(Value::Object(entries))
}

/// Nested value for a component node and the components below it
pub fn unstructure(tree: &ContextTree, node: NodeId) -> Result<Value> {
    let mut entries: Vec<(String, Value)> = Vec::new();
    for &child in tree.children(node) {
        let n = tree.node(child);
        match (n.kind(), n.index()) {
            (Kind::Block, Some(index)) => {
                let value = block_value(tree, child)?;
                match entries.iter_mut().find(|(k, _)| k == n.name()) {
                    Some((_, Value::Object(periods))) => insert(periods, &index.to_string(), value),
                    _ => insert(
                        &mut entries,
                        n.name(),
                        Value::Object(vec![(index.to_string(), value)]),
                    ),
                }
            }
            (Kind::Block, None) => {
                let value = block_value(tree, child)?;
                if !matches!(&value, Value::Object(e) if e.is_empty()) {
                    insert(&mut entries, n.name(), value);
                }
            }
            _ => {
                let value = unstructure(tree, child)?;
                insert(&mut entries, n.name(), value);
            }
        }
    }
    Ok(Value::Object(entries))
}

fn set_block(tree: &mut ContextTree, block: NodeId, value: Value) -> Result<()> {
    let path = tree.path(block);
    let Value::Object(entries) = value else {
        return Err(Error::mismatch(&path, "object of parameters", value.describe(), None));
    };
    for (name, value) in entries {
        let id = tree.param(block, &name)?;
        tree.set(id, value)?;
    }
    Ok(())
}

/// Build a single-component tree from its nested value
pub fn structure(
    value: Value,
    spec: &ComponentSpec,
    options: &CodecOptions,
) -> Result<ContextTree> {
    let mut tree = ContextTree::from_spec(spec, &spec.name);
    tree.configure(options);
    let root = tree.root();
    let Value::Object(entries) = value else {
        return Err(Error::mismatch(&spec.name, "object of blocks", value.describe(), None));
    };
    // Dimensions must be set before the blocks whose shapes use them, so
    // blocks go in declaration order whatever order the keys came in.
    let mut blocks = Vec::with_capacity(entries.len());
    for (name, value) in entries {
        let position = spec
            .blocks
            .iter()
            .position(|b| b.name.eq_ignore_ascii_case(&name))
            .ok_or_else(|| Error::UnknownBlock {
                path: spec.name.clone(),
                name: name.clone(),
                line: None,
            })?;
        blocks.push((position, name, value));
    }
    blocks.sort_by_key(|(position, _, _)| *position);

    for (position, name, value) in blocks {
        let block = &spec.blocks[position];
        if !block.indexed {
            let node = tree
                .block(root, &block.name, None)
                .ok_or_else(|| Error::UnknownBlock {
                    path: spec.name.clone(),
                    name: name.clone(),
                    line: None,
                })?;
            set_block(&mut tree, node, value)?;
            continue;
        }
        let Value::Object(periods) = value else {
            return Err(Error::mismatch(
                &format!("{}/{}", spec.name, block.name),
                "object keyed by block index",
                value.describe(),
                None,
            ));
        };
        for (index, value) in periods {
            let index = crate::types::parse_int(&index).ok_or_else(|| {
                Error::mismatch(
                    &format!("{}/{}", spec.name, block.name),
                    "integer block index",
                    format!("'{index}'"),
                    None,
                )
            })?;
            let node = tree.add_block(root, &block.name, Some(index))?;
            set_block(&mut tree, node, value)?;
        }
    }
    Ok(tree)
}
