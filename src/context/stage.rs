//! Components under construction
//!
//! The parser fills staged blocks and attaches the whole component to the
//! tree only once the input has been read without error, so a failed parse
//! never leaves a partial component behind.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;

use super::{ContextTree, NodeId, Slot};
use crate::schema::{BlockSpec, ComponentSpec};
use crate::types::{Lookup, Param, Scalar};

/// A block read from input but not yet attached
#[derive(Debug, Clone)]
pub(crate) struct StagedBlock {
    pub spec: Arc<BlockSpec>,
    pub index: Option<i64>,
    pub slots: IndexMap<String, Slot>,
}

impl StagedBlock {
    pub fn new(spec: Arc<BlockSpec>, index: Option<i64>) -> Self {
        let slots = spec
            .params
            .iter()
            .map(|p| (p.name.clone(), Slot::new(p.clone())))
            .collect();
        Self { spec, index, slots }
    }

    /// Store an explicitly given value
    pub fn set(&mut self, name: &str, param: Param) {
        if let Some(slot) = self.slots.get_mut(name) {
            slot.value = Some(param);
            slot.explicit = true;
        }
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.slots.get(name).is_some_and(|s| s.value.is_some())
    }

    fn scalar(&self, name: &str) -> Option<Scalar> {
        self.slots
            .get(name)
            .and_then(|s| s.value.as_ref())
            .and_then(Param::as_scalar)
            .cloned()
    }

    fn segment(&self) -> String {
        match self.index {
            Some(index) => format!("{} {}", self.spec.name, index),
            None => self.spec.name.clone(),
        }
    }
}

/// A component read from input but not yet attached
#[derive(Debug, Clone)]
pub(crate) struct StagedComponent {
    pub name: String,
    pub spec: Arc<ComponentSpec>,
    pub file: Option<PathBuf>,
    pub blocks: Vec<StagedBlock>,
}

impl StagedComponent {
    pub fn new(name: &str, spec: Arc<ComponentSpec>, file: Option<PathBuf>) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            spec,
            file,
            blocks: Vec::new(),
        }
    }

    /// Lookup scope seen from `current`, falling back to the tree at `parent`
    pub fn scope<'a>(
        &'a self,
        current: Option<&'a StagedBlock>,
        tree: Option<(&'a ContextTree, NodeId)>,
        base_dir: &'a Path,
    ) -> StageScope<'a> {
        StageScope {
            current,
            blocks: &self.blocks,
            tree,
            base_dir,
        }
    }

    pub fn has_block(&self, name: &str, index: Option<i64>) -> bool {
        self.blocks
            .iter()
            .any(|b| b.spec.name == name && b.index == index)
    }

    /// Seed defaults, report missing required parameters, and keep the block
    pub fn close(
        &mut self,
        mut block: StagedBlock,
        tree: Option<(&ContextTree, NodeId)>,
        base_dir: &Path,
        path: &str,
    ) {
        let block_path = format!("{path}/{}", block.segment());
        let defaults: Vec<(String, Option<Param>)> = {
            let scope = self.scope(Some(&block), tree, base_dir);
            block
                .slots
                .iter()
                .filter(|(_, slot)| slot.value.is_none())
                .map(|(name, slot)| {
                    let param_path = format!("{block_path}/{name}");
                    (name.clone(), slot.spec.default_param(&scope, &param_path))
                })
                .collect()
        };
        for (name, default) in defaults {
            let Some(slot) = block.slots.get_mut(&name) else {
                continue;
            };
            match default {
                Some(param) => slot.value = Some(param),
                None if !slot.spec.optional => {
                    tracing::warn!(
                        block = %block_path,
                        param = %name,
                        "required parameter not set"
                    );
                }
                None => {}
            }
        }
        self.blocks.push(block);
    }

    /// Add absent non-indexed blocks and put blocks in declaration order
    pub fn finish(&mut self, tree: Option<(&ContextTree, NodeId)>, base_dir: &Path, path: &str) {
        let missing: Vec<Arc<BlockSpec>> = self
            .spec
            .blocks
            .iter()
            .filter(|b| !b.indexed && !self.has_block(&b.name, None))
            .cloned()
            .collect();
        for spec in missing {
            let block = StagedBlock::new(spec, None);
            self.close(block, tree, base_dir, path);
        }
        let order = |block: &StagedBlock| {
            let position = self
                .spec
                .blocks
                .iter()
                .position(|b| b.name == block.spec.name)
                .unwrap_or(usize::MAX);
            (position, block.index.unwrap_or(0))
        };
        let mut blocks = std::mem::take(&mut self.blocks);
        blocks.sort_by_key(|b| order(b));
        self.blocks = blocks;
    }
}

/// Lookup over staged blocks, then the tree the component will join
pub(crate) struct StageScope<'a> {
    current: Option<&'a StagedBlock>,
    blocks: &'a [StagedBlock],
    tree: Option<(&'a ContextTree, NodeId)>,
    base_dir: &'a Path,
}

impl Lookup for StageScope<'_> {
    fn scalar(&self, name: &str) -> Option<Scalar> {
        let name = name.to_ascii_lowercase();
        self.current
            .into_iter()
            .chain(self.blocks.iter().rev())
            .find_map(|b| b.scalar(&name))
            .or_else(|| {
                self.tree
                    .and_then(|(tree, node)| tree.resolve_scalar(node, &name).cloned())
            })
    }

    fn resolve_file(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.base_dir.join(file)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::builtin;
    use crate::types::Param;

    #[test]
    fn test_close_seeds_defaults_from_staged_dimensions() {
        let schema = builtin();
        let spec = schema.get("gwf-dis").unwrap().clone();
        let mut staged = StagedComponent::new("dis", spec.clone(), None);
        let base = PathBuf::from(".");

        let mut dims = StagedBlock::new(spec.get("dimensions").unwrap().clone(), None);
        dims.set("ncol", Param::Scalar(Scalar::Integer(5)));
        staged.close(dims, None, &base, "dis");

        staged.finish(None, &base, "dis");
        let names: Vec<&str> = staged.blocks.iter().map(|b| b.spec.name.as_str()).collect();
        assert_eq!(names, vec!["options", "dimensions", "griddata"]);

        let griddata = &staged.blocks[2];
        let delr = griddata.slots["delr"].value.as_ref().unwrap();
        assert_eq!(delr.as_array().unwrap().shape(), &[5]);
        assert!(!griddata.slots["delr"].explicit);
        assert!(staged.blocks[1].slots["ncol"].explicit);
    }
}
