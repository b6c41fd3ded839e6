//! Context tree
//!
//! An arena of simulation, model, package and block nodes. Blocks own the
//! parameter slots; every mutation goes through the slot's `ParamSpec` and
//! then through the Signal Bus.

mod stage;

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::options::CodecOptions;
use crate::schema::{BlockSpec, BlockType, ComponentKind, ComponentSpec};
use crate::signal::{Effect, Propagation, SignalBus};
use crate::types::{Lookup, Param, ParamSpec, ParamType, Scalar, Value};

pub(crate) use stage::{StagedBlock, StagedComponent};

/// Handle of a node in a `ContextTree`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }
}

/// Handle of a parameter slot: its block and position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId {
    node: NodeId,
    slot: usize,
}

impl ParamId {
    pub(crate) fn new(node: NodeId, slot: usize) -> Self {
        Self { node, slot }
    }

    /// Block holding the parameter
    pub fn node(&self) -> NodeId {
        self.node
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Simulation,
    Model,
    Package,
    Block,
}

impl From<ComponentKind> for Kind {
    fn from(kind: ComponentKind) -> Self {
        match kind {
            ComponentKind::Simulation => Kind::Simulation,
            ComponentKind::Model => Kind::Model,
            ComponentKind::Package => Kind::Package,
        }
    }
}

/// Declared parameter and its current value
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub spec: Arc<ParamSpec>,
    pub value: Option<Param>,
    /// Set by input or by the caller, as opposed to defaulted
    pub explicit: bool,
}

impl Slot {
    pub fn new(spec: Arc<ParamSpec>) -> Self {
        Self {
            spec,
            value: None,
            explicit: false,
        }
    }
}

/// One context: component or block
#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    kind: Kind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    params: IndexMap<String, Slot>,
    index: Option<i64>,
    component: Option<Arc<ComponentSpec>>,
    block: Option<Arc<BlockSpec>>,
    file: Option<PathBuf>,
}

impl Node {
    fn new(name: &str, kind: Kind, parent: Option<NodeId>) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            kind,
            parent,
            children: Vec::new(),
            params: IndexMap::new(),
            index: None,
            component: None,
            block: None,
            file: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Period index of an indexed block
    pub fn index(&self) -> Option<i64> {
        self.index
    }

    pub fn block_type(&self) -> Option<BlockType> {
        self.block.as_ref().map(|b| b.block_type())
    }

    /// Component specification, for component nodes
    pub fn component(&self) -> Option<&Arc<ComponentSpec>> {
        self.component.as_ref()
    }

    pub fn block_spec(&self) -> Option<&Arc<BlockSpec>> {
        self.block.as_ref()
    }

    /// File the component was read from or is written to
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Path segment naming this node under its parent
    fn segment(&self) -> String {
        match self.index {
            Some(index) => format!("{} {}", self.name, index),
            None => self.name.clone(),
        }
    }
}

/// Ownership hierarchy of a simulation's components, blocks and parameters
#[derive(Clone)]
pub struct ContextTree {
    nodes: Vec<Node>,
    bus: SignalBus,
    base_dir: PathBuf,
}

impl fmt::Debug for ContextTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextTree")
            .field("root", &self.nodes[0].name)
            .field("nodes", &self.nodes.len())
            .field("edges", &self.bus.edges().len())
            .finish()
    }
}

impl ContextTree {
    /// A tree holding only a root node
    pub fn new(name: &str, kind: Kind) -> Self {
        Self {
            nodes: vec![Node::new(name, kind, None)],
            bus: SignalBus::default(),
            base_dir: PathBuf::from("."),
        }
    }

    /// A tree rooted at a new component with all its non-indexed blocks
    pub fn from_spec(spec: &ComponentSpec, name: &str) -> Self {
        let mut tree = Self::new(name, spec.kind.into());
        tree.nodes[0].component = Some(Arc::new(spec.clone()));
        for block in spec.blocks.iter().filter(|b| !b.indexed) {
            tree.push_block(tree.root(), block.clone(), None);
        }
        tree
    }

    pub(crate) fn configure(&mut self, options: &CodecOptions) {
        self.base_dir = options.base_dir.clone();
        self.bus.set_max_depth(options.max_wave_depth);
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn set_base_dir(&mut self, dir: impl AsRef<Path>) {
        self.base_dir = dir.as_ref().to_path_buf();
    }

    pub fn signal_bus(&self) -> &SignalBus {
        &self.bus
    }

    pub(crate) fn set_file(&mut self, node: NodeId, file: impl Into<PathBuf>) {
        self.nodes[node.0].file = Some(file.into());
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// Slash-separated path from the root, e.g. `sim/gwf/chd/period 2`
    pub fn path(&self, node: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            let n = &self.nodes[id.0];
            segments.push(n.segment());
            current = n.parent;
        }
        segments.reverse();
        segments.join("/")
    }

    pub fn param_path(&self, id: ParamId) -> String {
        format!("{}/{}", self.path(id.node), self.slot(id).spec.name)
    }

    /// Child of `parent` named by a path segment (`name` or `name index`)
    pub fn child(&self, parent: NodeId, segment: &str) -> Option<NodeId> {
        let segment = segment.trim().to_ascii_lowercase();
        self.nodes[parent.0]
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c.0].segment() == segment)
    }

    /// Block child of `component` with this name and index
    pub fn block(&self, component: NodeId, name: &str, index: Option<i64>) -> Option<NodeId> {
        self.nodes[component.0].children.iter().copied().find(|&c| {
            let n = &self.nodes[c.0];
            n.kind == Kind::Block && n.name.eq_ignore_ascii_case(name) && n.index == index
        })
    }

    /// Node at a path relative to the root
    pub fn node_at(&self, path: &str) -> Option<NodeId> {
        let mut current = self.root();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = self.child(current, segment)?;
        }
        Some(current)
    }

    /// Parameter at a path relative to the root, e.g. `gwf/dis/dimensions/ncol`
    pub fn lookup(&self, path: &str) -> Result<ParamId> {
        let trimmed = path.trim_matches('/');
        let (parent, name) = trimmed.rsplit_once('/').unwrap_or(("", trimmed));
        let unknown = || Error::UnknownParameter {
            path: match parent {
                "" => self.path(self.root()),
                parent => format!("{}/{}", self.path(self.root()), parent),
            },
            name: name.to_string(),
            line: None,
        };
        let node = self.node_at(parent).ok_or_else(unknown)?;
        self.param(node, name).map_err(|_| unknown())
    }

    /// Declared parameter of `node` by name
    pub fn param(&self, node: NodeId, name: &str) -> Result<ParamId> {
        self.nodes[node.0]
            .params
            .get_index_of(&name.to_ascii_lowercase())
            .map(|slot| ParamId { node, slot })
            .ok_or_else(|| Error::UnknownParameter {
                path: self.path(node),
                name: name.to_string(),
                line: None,
            })
    }

    pub(crate) fn slot(&self, id: ParamId) -> &Slot {
        &self.nodes[id.node.0].params[id.slot]
    }

    fn slot_mut(&mut self, id: ParamId) -> &mut Slot {
        &mut self.nodes[id.node.0].params[id.slot]
    }

    pub fn spec(&self, id: ParamId) -> &ParamSpec {
        &self.slot(id).spec
    }

    pub fn get(&self, id: ParamId) -> Option<&Param> {
        self.slot(id).value.as_ref()
    }

    /// Whether the value was given rather than defaulted
    pub fn is_explicit(&self, id: ParamId) -> bool {
        self.slot(id).explicit
    }

    /// Whether the value is written out: given explicitly, or required
    pub(crate) fn emits(&self, id: ParamId) -> bool {
        let slot = self.slot(id);
        slot.value.is_some() && (slot.explicit || !slot.spec.optional)
    }

    /// Exchange form of a parameter's value
    pub fn value(&self, id: ParamId) -> Result<Option<Value>> {
        self.get(id).map(Param::to_value).transpose()
    }

    /// Parameters of a node in declaration order
    pub fn params(&self, node: NodeId) -> impl Iterator<Item = (&str, Option<&Param>)> {
        self.nodes[node.0]
            .params
            .iter()
            .map(|(name, slot)| (name.as_str(), slot.value.as_ref()))
    }

    /// Nearest parameter named `name`, searching outward from `from`
    ///
    /// Each ancestor's subtree is searched breadth-first before moving on to
    /// the next ancestor, so the closest declaration wins.
    pub fn resolve(&self, from: NodeId, name: &str) -> Option<ParamId> {
        let name = name.to_ascii_lowercase();
        let mut searched: Option<NodeId> = None;
        let mut current = Some(from);
        while let Some(anchor) = current {
            let mut queue = VecDeque::from([anchor]);
            while let Some(id) = queue.pop_front() {
                if Some(id) == searched {
                    continue;
                }
                let node = &self.nodes[id.0];
                if let Some(slot) = node.params.get_index_of(&name) {
                    return Some(ParamId { node: id, slot });
                }
                queue.extend(node.children.iter().copied());
            }
            searched = Some(anchor);
            current = self.nodes[anchor.0].parent;
        }
        None
    }

    /// Value of the nearest scalar parameter named `name`
    pub fn resolve_scalar(&self, from: NodeId, name: &str) -> Option<&Scalar> {
        self.resolve(from, name)
            .and_then(|id| self.get(id))
            .and_then(Param::as_scalar)
    }

    pub(crate) fn scope(&self, node: NodeId) -> TreeScope<'_> {
        TreeScope { tree: self, node }
    }

    /// Assign from the exchange representation
    pub fn set(&mut self, id: ParamId, value: impl Into<Value>) -> Result<Propagation> {
        let path = self.param_path(id);
        let spec = self.slot(id).spec.clone();
        let param = spec.coerce(value.into(), &self.scope(id.node), &path)?;
        self.commit(id, Some(param))
    }

    /// Assign a typed value
    pub fn set_param(&mut self, id: ParamId, param: Param) -> Result<Propagation> {
        let path = self.param_path(id);
        let spec = self.slot(id).spec.clone();
        let param = spec.admit(param, &self.scope(id.node), &path)?;
        self.commit(id, Some(param))
    }

    /// Clear a parameter's value
    pub fn unset(&mut self, id: ParamId) -> Result<Propagation> {
        self.commit(id, None)
    }

    /// Declare that `dependent` observes `controller`
    pub fn depend(&mut self, dependent: ParamId, controller: ParamId) {
        self.bus.connect(dependent, controller, Effect::Notify);
    }

    /// Store a value and propagate; on failure every touched slot is restored
    fn commit(&mut self, id: ParamId, value: Option<Param>) -> Result<Propagation> {
        let path = self.param_path(id);
        let mut journal = Vec::new();
        let slot = self.slot_mut(id);
        let explicit = value.is_some();
        let mut value = value;
        if let Some(param) = value.as_mut() {
            param.set_label(&path);
        }
        journal.push((id, slot.value.take(), slot.explicit));
        slot.value = value;
        slot.explicit = explicit;

        match self.propagate(id, &mut journal) {
            Ok(propagation) => {
                self.connect_dependencies(id);
                Ok(propagation)
            }
            Err(err) => {
                for (id, value, explicit) in journal.into_iter().rev() {
                    let slot = self.slot_mut(id);
                    slot.value = value;
                    slot.explicit = explicit;
                }
                Err(err)
            }
        }
    }

    /// Breadth-first notification of dependents, one wave at a time
    fn propagate(
        &mut self,
        origin: ParamId,
        journal: &mut Vec<(ParamId, Option<Param>, bool)>,
    ) -> Result<Propagation> {
        let mut propagation = Propagation::default();
        let mut via: HashMap<ParamId, ParamId> = HashMap::new();
        let mut wave = vec![origin];
        loop {
            let notices = self.bus.next_wave(&wave);
            if notices.is_empty() {
                break;
            }
            if let Some(notice) = notices.iter().find(|n| n.dependent == origin) {
                return Err(self.cycle(origin, notice.via, &via));
            }
            if propagation.waves.len() >= self.bus.max_depth() {
                let mut chain: Vec<String> = wave.iter().map(|&p| self.param_path(p)).collect();
                chain.extend(notices.iter().map(|n| self.param_path(n.dependent)));
                return Err(Error::DependencyCycle {
                    path: self.param_path(origin),
                    chain,
                });
            }
            tracing::debug!(
                origin = %self.param_path(origin),
                wave = propagation.waves.len() + 1,
                dependents = notices.len(),
                "propagating change"
            );
            for notice in &notices {
                via.entry(notice.dependent).or_insert(notice.via);
                for effect in &notice.effects {
                    self.apply(notice.dependent, *effect, journal)?;
                }
            }
            wave = notices.iter().map(|n| n.dependent).collect();
            propagation.waves.push(wave.clone());
        }
        Ok(propagation)
    }

    fn cycle(&self, origin: ParamId, last: ParamId, via: &HashMap<ParamId, ParamId>) -> Error {
        let mut chain = vec![self.param_path(origin)];
        let mut current = last;
        while current != origin {
            chain.push(self.param_path(current));
            match via.get(&current) {
                Some(&prev) if !chain.contains(&self.param_path(prev)) || prev == origin => {
                    current = prev
                }
                _ => break,
            }
        }
        chain.push(self.param_path(origin));
        let last = chain.len() - 1;
        chain[1..last].reverse();
        Error::DependencyCycle {
            path: self.param_path(origin),
            chain,
        }
    }

    /// Recompute one dependent after its controller changed
    fn apply(
        &mut self,
        id: ParamId,
        effect: Effect,
        journal: &mut Vec<(ParamId, Option<Param>, bool)>,
    ) -> Result<()> {
        let path = self.param_path(id);
        let slot = self.slot(id);
        let spec = slot.spec.clone();
        let current = slot.value.clone();
        let explicit = slot.explicit;
        let updated = match (effect, &spec.ty, current.clone()) {
            (Effect::Reshape, ParamType::Array(def), Some(Param::Array(mut store))) => {
                match def.resolve_shape(&self.scope(id.node), &path) {
                    Ok(shape) => {
                        if store.reshape(shape.clone()) {
                            Some(Param::Array(store))
                        } else {
                            tracing::warn!(
                                param = %path,
                                ?shape,
                                "array no longer fits its dimensions, clearing"
                            );
                            None
                        }
                    }
                    Err(err) => {
                        tracing::warn!(
                            param = %path,
                            error = %err,
                            "array dimensions unresolved, clearing"
                        );
                        None
                    }
                }
            }
            (Effect::Reshape, ParamType::Array(_), None) => {
                spec.default_param(&self.scope(id.node), &path)
            }
            (Effect::Reschema, ParamType::List(def), Some(Param::List(mut store))) => {
                let schema = def.resolve(&self.scope(id.node), &path)?;
                if !store.reschema(schema) {
                    tracing::warn!(param = %path, "list columns widened, existing rows dropped");
                }
                Some(Param::List(store))
            }
            _ => return Ok(()),
        };
        if updated == current {
            return Ok(());
        }
        journal.push((id, current, explicit));
        let slot = self.slot_mut(id);
        slot.explicit = explicit && updated.is_some();
        slot.value = updated;
        Ok(())
    }

    /// Register the edges a parameter's declared dependencies imply
    fn connect_dependencies(&mut self, id: ParamId) {
        let spec = self.slot(id).spec.clone();
        for (name, effect) in spec.dependencies() {
            if let Some(controller) = self.resolve(id.node, name) {
                if controller != id {
                    self.bus.connect(id, controller, effect);
                }
            }
        }
    }

    /// Append a block with a slot per declared parameter
    fn push_block(&mut self, parent: NodeId, spec: Arc<BlockSpec>, index: Option<i64>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let mut node = Node::new(&spec.name, Kind::Block, Some(parent));
        node.index = index;
        for param in &spec.params {
            node.params.insert(param.name.clone(), Slot::new(param.clone()));
        }
        node.block = Some(spec);
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        self.fill_defaults(id);
        for slot in 0..self.nodes[id.0].params.len() {
            self.connect_dependencies(ParamId { node: id, slot });
        }
        id
    }

    /// Add a block to a component node, e.g. another period block
    pub fn add_block(
        &mut self,
        component: NodeId,
        name: &str,
        index: Option<i64>,
    ) -> Result<NodeId> {
        let path = self.path(component);
        let spec = self.nodes[component.0]
            .component
            .as_ref()
            .and_then(|c| c.get(name))
            .cloned()
            .ok_or_else(|| Error::UnknownBlock {
                path: path.clone(),
                name: name.to_string(),
                line: None,
            })?;
        match (spec.indexed, index) {
            (true, None) | (false, Some(_)) => {
                return Err(Error::Syntax {
                    path,
                    line: 0,
                    message: format!("block {} index does not match its declaration", spec.name),
                });
            }
            _ => {}
        }
        if self.block(component, name, index).is_some() {
            return Err(Error::Syntax {
                path,
                line: 0,
                message: format!("block {} already present", spec.name),
            });
        }
        let id = self.push_block(component, spec, index);
        if index.is_some() {
            self.sort_indexed(component);
        }
        Ok(id)
    }

    /// Add a component under `parent` with all its non-indexed blocks
    pub fn add_component(&mut self, parent: NodeId, spec: &ComponentSpec, name: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        let mut node = Node::new(name, spec.kind.into(), Some(parent));
        node.component = Some(Arc::new(spec.clone()));
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        for block in spec.blocks.iter().filter(|b| !b.indexed) {
            self.push_block(id, block.clone(), None);
        }
        id
    }

    /// Keep same-named indexed blocks in increasing index order
    fn sort_indexed(&mut self, component: NodeId) {
        let mut children = std::mem::take(&mut self.nodes[component.0].children);
        children.sort_by_key(|&c| {
            let n = &self.nodes[c.0];
            (n.index.is_some(), n.index.unwrap_or(0))
        });
        self.nodes[component.0].children = children;
    }

    /// Seed unset slots of a block from their defaults
    fn fill_defaults(&mut self, block: NodeId) {
        for slot in 0..self.nodes[block.0].params.len() {
            let id = ParamId { node: block, slot };
            if self.slot(id).value.is_some() {
                continue;
            }
            let path = self.param_path(id);
            let spec = self.slot(id).spec.clone();
            if let Some(param) = spec.default_param(&self.scope(block), &path) {
                self.slot_mut(id).value = Some(param);
            }
        }
    }

    /// Attach a fully parsed component under `parent`, or as the root's content
    pub(crate) fn attach(&mut self, parent: Option<NodeId>, staged: StagedComponent) -> NodeId {
        let component = match parent {
            Some(parent) => {
                let id = NodeId(self.nodes.len());
                let node = Node::new(&staged.name, staged.spec.kind.into(), Some(parent));
                self.nodes.push(node);
                self.nodes[parent.0].children.push(id);
                id
            }
            None => self.root(),
        };
        {
            let node = &mut self.nodes[component.0];
            node.component = Some(staged.spec.clone());
            node.file = staged.file;
        }
        let mut blocks = Vec::with_capacity(staged.blocks.len());
        for block in staged.blocks {
            let id = NodeId(self.nodes.len());
            let mut node = Node::new(&block.spec.name, Kind::Block, Some(component));
            node.index = block.index;
            node.params = block.slots;
            node.block = Some(block.spec);
            self.nodes.push(node);
            self.nodes[component.0].children.push(id);
            blocks.push(id);
        }
        for &block in &blocks {
            for slot in 0..self.nodes[block.0].params.len() {
                let id = ParamId { node: block, slot };
                let path = self.param_path(id);
                if let Some(param) = self.slot_mut(id).value.as_mut() {
                    param.set_label(&path);
                }
                self.connect_dependencies(id);
            }
        }
        tracing::debug!(
            component = %self.path(component),
            blocks = blocks.len(),
            "attached component"
        );
        component
    }

    /// Logical parameter path to resolved external file, for every external array part
    pub fn external_files(&self) -> IndexMap<String, PathBuf> {
        let mut files = IndexMap::new();
        for (n, node) in self.nodes.iter().enumerate() {
            for (slot, (_, s)) in node.params.iter().enumerate() {
                let Some(Param::Array(store)) = &s.value else {
                    continue;
                };
                let path = self.param_path(ParamId {
                    node: NodeId(n),
                    slot,
                });
                let externals = store.external_files();
                let layered = store.is_layered();
                for (i, (_, resolved)) in externals.into_iter().enumerate() {
                    let key = if layered {
                        format!("{path}/{}", i + 1)
                    } else {
                        path.clone()
                    };
                    files.insert(key, resolved.to_path_buf());
                }
            }
        }
        files
    }

    /// Every parameter slot in tree order
    pub(crate) fn all_params(&self) -> Vec<ParamId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            out.extend((0..node.params.len()).map(|slot| ParamId { node: id, slot }));
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    pub(crate) fn slot_value_mut(&mut self, id: ParamId) -> Option<&mut Param> {
        self.slot_mut(id).value.as_mut()
    }

    fn node_eq(&self, a: NodeId, other: &ContextTree, b: NodeId) -> bool {
        let (x, y) = (&self.nodes[a.0], &other.nodes[b.0]);
        if x.name != y.name
            || x.kind != y.kind
            || x.index != y.index
            || x.children.len() != y.children.len()
        {
            return false;
        }
        let set = |node: &Node| -> Vec<(String, Option<Param>)> {
            node.params
                .iter()
                .filter(|(_, s)| s.value.is_some())
                .map(|(k, s)| (k.clone(), s.value.clone()))
                .collect()
        };
        let (mut px, mut py) = (set(x), set(y));
        px.sort_by(|l, r| l.0.cmp(&r.0));
        py.sort_by(|l, r| l.0.cmp(&r.0));
        px == py
            && x
                .children
                .iter()
                .zip(&y.children)
                .all(|(&ca, &cb)| self.node_eq(ca, other, cb))
    }
}

/// Structural equality: names, kinds, indices and parameter values
impl PartialEq for ContextTree {
    fn eq(&self, other: &Self) -> bool {
        self.node_eq(self.root(), other, other.root())
    }
}

/// Lookup scope anchored at a tree node
pub(crate) struct TreeScope<'a> {
    tree: &'a ContextTree,
    node: NodeId,
}

impl Lookup for TreeScope<'_> {
    fn scalar(&self, name: &str) -> Option<Scalar> {
        self.tree.resolve_scalar(self.node, name).cloned()
    }

    fn resolve_file(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.tree.base_dir.join(file)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::builtin;
    use crate::types::{ArrayStore, How, NumKind};

    fn dis_tree() -> ContextTree {
        let schema = builtin();
        let mut tree = ContextTree::new("sim", Kind::Simulation);
        let gwf = tree.add_component(tree.root(), schema.get("gwf-nam").unwrap(), "gwf");
        tree.add_component(gwf, schema.get("gwf-dis").unwrap(), "dis");
        tree.add_component(gwf, schema.get("gwf-ic").unwrap(), "ic");
        tree
    }

    #[test]
    fn test_paths_and_lookup() {
        let tree = dis_tree();
        let ncol = tree.lookup("gwf/dis/dimensions/ncol").unwrap();
        assert_eq!(tree.param_path(ncol), "sim/gwf/dis/dimensions/ncol");
        assert_eq!(tree.get(ncol).and_then(Param::as_int), Some(1));
        assert!(!tree.is_explicit(ncol));
    }

    #[test]
    fn test_lookup_unknown_names_parameter() {
        let tree = dis_tree();
        let err = tree.lookup("gwf/dis/dimensions/nfoo").unwrap_err();
        match err {
            Error::UnknownParameter { path, name, .. } => {
                assert_eq!(path, "sim/gwf/dis/dimensions");
                assert_eq!(name, "nfoo");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_resolve_nearest_ancestor() {
        let tree = dis_tree();
        let griddata = tree.node_at("gwf/ic/griddata").unwrap();
        let nlay = tree.resolve(griddata, "NLAY").unwrap();
        assert_eq!(tree.param_path(nlay), "sim/gwf/dis/dimensions/nlay");
        assert!(tree.resolve(griddata, "nothing").is_none());
    }

    #[test]
    fn test_set_validates_and_propagates() {
        let mut tree = dis_tree();
        let ncol = tree.lookup("gwf/dis/dimensions/ncol").unwrap();
        let delr = tree.lookup("gwf/dis/griddata/delr").unwrap();

        let err = tree.set(ncol, "four").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        assert_eq!(tree.get(ncol).and_then(Param::as_int), Some(1));

        let propagation = tree.set(ncol, 4i64).unwrap();
        assert!(propagation.notified().any(|p| p == delr));
        let store = tree.get(delr).and_then(Param::as_array).unwrap();
        assert_eq!(store.shape(), &[4]);
        assert_eq!(store.how(), How::Constant);
    }

    #[test]
    fn test_reshape_clears_mismatched_data() {
        let mut tree = dis_tree();
        let ncol = tree.lookup("gwf/dis/dimensions/ncol").unwrap();
        let delr = tree.lookup("gwf/dis/griddata/delr").unwrap();
        tree.set(ncol, 2i64).unwrap();
        tree.set(delr, vec![1.0, 2.0]).unwrap();
        tree.set(ncol, 3i64).unwrap();
        assert!(tree.get(delr).is_none());
    }

    #[test]
    fn test_set_param_checks_shape() {
        let mut tree = dis_tree();
        let delr = tree.lookup("gwf/dis/griddata/delr").unwrap();
        let wrong = ArrayStore::constant(NumKind::Double, vec![5], 1.0);
        let err = tree.set_param(delr, wrong.into()).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_mutual_dependency_is_cycle() {
        let mut tree = dis_tree();
        let nrow = tree.lookup("gwf/dis/dimensions/nrow").unwrap();
        let ncol = tree.lookup("gwf/dis/dimensions/ncol").unwrap();
        tree.depend(nrow, ncol);
        tree.depend(ncol, nrow);
        let err = tree.set(ncol, 7i64).unwrap_err();
        match &err {
            Error::DependencyCycle { path, chain } => {
                assert_eq!(path, "sim/gwf/dis/dimensions/ncol");
                assert_eq!(chain.first(), chain.last());
                assert!(chain.contains(&"sim/gwf/dis/dimensions/nrow".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(tree.get(ncol).and_then(Param::as_int), Some(1));
        let delr = tree.lookup("gwf/dis/griddata/delr").unwrap();
        assert_eq!(tree.get(delr).and_then(Param::as_array).unwrap().len(), 1);
    }

    /// ic attached before dis, so strt has no dimension edges yet
    fn late_grid_tree() -> (ContextTree, ParamId, ParamId) {
        let schema = builtin();
        let mut tree = ContextTree::new("sim", Kind::Simulation);
        let gwf = tree.add_component(tree.root(), schema.get("gwf-nam").unwrap(), "gwf");
        tree.add_component(gwf, schema.get("gwf-ic").unwrap(), "ic");
        tree.add_component(gwf, schema.get("gwf-dis").unwrap(), "dis");
        let strt = tree.lookup("gwf/ic/griddata/strt").unwrap();
        let nlay = tree.lookup("gwf/dis/dimensions/nlay").unwrap();
        (tree, strt, nlay)
    }

    #[test]
    fn test_failed_set_adds_no_edges() {
        let (mut tree, strt, nlay) = late_grid_tree();
        assert!(tree.get(strt).is_none());
        tree.depend(nlay, strt);
        tree.depend(strt, nlay);
        let edges = tree.signal_bus().edges().to_vec();

        let err = tree.set(strt, vec![3.0]).unwrap_err();
        assert!(matches!(err, Error::DependencyCycle { .. }));
        assert_eq!(tree.signal_bus().edges(), edges.as_slice());
        assert!(tree.get(strt).is_none());
    }

    #[test]
    fn test_set_connects_late_dependencies() {
        let (mut tree, strt, nlay) = late_grid_tree();
        assert_eq!(tree.signal_bus().dependents(nlay).filter(|e| e.dependent == strt).count(), 0);

        tree.set(strt, vec![3.0]).unwrap();
        assert!(tree.signal_bus().dependents(nlay).any(|e| e.dependent == strt));

        tree.set(nlay, 2i64).unwrap();
        assert!(tree.get(strt).is_none());
    }

    #[test]
    fn test_add_block_orders_indices() {
        let schema = builtin();
        let mut tree = ContextTree::from_spec(schema.get("gwf-sto").unwrap(), "sto");
        let root = tree.root();
        tree.add_block(root, "period", Some(3)).unwrap();
        tree.add_block(root, "period", Some(1)).unwrap();
        let indices: Vec<Option<i64>> = tree
            .children(root)
            .iter()
            .map(|&c| tree.node(c).index())
            .filter(Option::is_some)
            .collect();
        assert_eq!(indices, vec![Some(1), Some(3)]);
        assert!(tree.add_block(root, "period", None).is_err());
        assert!(matches!(
            tree.add_block(root, "nonsense", None),
            Err(Error::UnknownBlock { .. })
        ));
    }

    #[test]
    fn test_structural_equality_ignores_explicitness() {
        let mut a = dis_tree();
        let b = dis_tree();
        assert_eq!(a, b);
        let nlay = a.lookup("gwf/dis/dimensions/nlay").unwrap();
        a.set(nlay, 1i64).unwrap();
        assert_eq!(a, b);
        a.set(nlay, 2i64).unwrap();
        assert_ne!(a, b);
    }
}
