//! Parameter specification
//!
//! A `Schema` maps component types (e.g. `gwf-dis`) to the blocks they may
//! contain and the parameters each block declares. Schemas are plain data and
//! can be built in code, deserialized, or taken from [`builtin`].

mod builtin;

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{ParamSpec, ParamType};

pub use builtin::builtin;

/// Role of a block within its component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Options,
    Dimensions,
    GridData,
    PackageData,
    Period,
    Other,
}

impl BlockType {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "options" => BlockType::Options,
            "dimensions" => BlockType::Dimensions,
            "griddata" => BlockType::GridData,
            "packagedata" => BlockType::PackageData,
            "period" => BlockType::Period,
            _ => BlockType::Other,
        }
    }
}

/// Level of the tree a component occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Simulation,
    Model,
    Package,
}

/// How an entry's leading token picked its parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// The token is the parameter's name
    Name,
    /// The token is a keystring variant or a record's leading keyword, and
    /// belongs to the value
    Value,
}

/// Declared contents of one block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSpec {
    pub name: String,
    /// Repeated with an increasing integer index
    #[serde(default)]
    pub indexed: bool,
    /// Unknown keywords are skipped instead of rejected
    #[serde(default)]
    pub open: bool,
    #[serde(default)]
    pub params: Vec<Arc<ParamSpec>>,
}

impl BlockSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            indexed: false,
            open: false,
            params: Vec::new(),
        }
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub fn open(mut self) -> Self {
        self.open = true;
        self
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(Arc::new(param));
        self
    }

    pub fn block_type(&self) -> BlockType {
        BlockType::from_name(&self.name)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ParamSpec>> {
        self.params.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// The list parameter, when this is a list block
    pub fn list(&self) -> Option<&Arc<ParamSpec>> {
        self.params.iter().find(|p| p.is_list())
    }

    /// Parameter selected by the first token of an entry
    ///
    /// The parameter name wins; otherwise an untagged keystring variant or a
    /// record's leading keyword.
    pub fn select(&self, token: &str) -> Option<(&Arc<ParamSpec>, Selector)> {
        if let Some(spec) = self.get(token) {
            let selector = match spec.leading_keyword() {
                Some(_) => Selector::Value,
                None => Selector::Name,
            };
            return Some((spec, selector));
        }
        self.params
            .iter()
            .find(|p| match &p.ty {
                ParamType::Keystring { variants } if !p.tagged => variants.get(token).is_some(),
                _ => p
                    .leading_keyword()
                    .is_some_and(|k| k.eq_ignore_ascii_case(token)),
            })
            .map(|p| (p, Selector::Value))
    }

    /// Check that a list block holds nothing else and that names are unique
    pub fn validate(&self, path: &str) -> Result<()> {
        let path = format!("{path}/{}", self.name);
        let lists = self.params.iter().filter(|p| p.is_list()).count();
        if lists > 0 && self.params.len() > 1 {
            return Err(Error::Schema {
                path,
                message: "a block holding a list may hold no other parameter".to_string(),
            });
        }
        for (i, param) in self.params.iter().enumerate() {
            if self.params[..i]
                .iter()
                .any(|p| p.name.eq_ignore_ascii_case(&param.name))
            {
                return Err(Error::Schema {
                    path,
                    message: format!("parameter {} declared twice", param.name),
                });
            }
        }
        Ok(())
    }
}

/// Declared blocks of one component type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    /// Component type key, e.g. `gwf-dis`
    pub name: String,
    pub kind: ComponentKind,
    #[serde(default)]
    pub blocks: Vec<Arc<BlockSpec>>,
}

impl ComponentSpec {
    pub fn new(name: &str, kind: ComponentKind) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            kind,
            blocks: Vec::new(),
        }
    }

    pub fn block(mut self, block: BlockSpec) -> Self {
        self.blocks.push(Arc::new(block));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<BlockSpec>> {
        self.blocks.iter().find(|b| b.name.eq_ignore_ascii_case(name))
    }

    pub fn validate(&self) -> Result<()> {
        for block in &self.blocks {
            block.validate(&self.name)?;
        }
        Ok(())
    }
}

/// Component specifications keyed by type
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    components: IndexMap<String, Arc<ComponentSpec>>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, component: ComponentSpec) -> Self {
        self.insert(component);
        self
    }

    pub fn insert(&mut self, component: ComponentSpec) {
        self.components
            .insert(component.name.clone(), Arc::new(component));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ComponentSpec>> {
        self.components.get(&name.to_ascii_lowercase())
    }

    pub fn components(&self) -> impl Iterator<Item = &Arc<ComponentSpec>> {
        self.components.values()
    }

    pub fn validate(&self) -> Result<()> {
        for component in self.components.values() {
            component.validate()?;
        }
        Ok(())
    }
}
