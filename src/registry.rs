//! Codec registry
//!
//! Every backend implements the same `(structure, unstructure)` pair: bytes
//! in its own format to a Context Tree, and back. The native block-text codec
//! is always present; other backends register by name.

use indexmap::IndexMap;

use crate::context::ContextTree;
use crate::error::{Error, Result};
use crate::options::CodecOptions;
use crate::parser;
use crate::schema::ComponentSpec;
use crate::writer;

/// A format that can build and emit a single-component tree
pub trait Codec {
    /// Registry key, e.g. `native`
    fn name(&self) -> &str;

    /// Build a tree for one component from bytes in this format
    fn structure(
        &self,
        bytes: &[u8],
        spec: &ComponentSpec,
        options: &CodecOptions,
    ) -> Result<ContextTree>;

    /// Emit the tree's root component in this format
    fn unstructure(&self, tree: &ContextTree, options: &CodecOptions) -> Result<Vec<u8>>;
}

/// MF6 block text
#[derive(Debug, Clone, Copy, Default)]
pub struct Native;

impl Codec for Native {
    fn name(&self) -> &str {
        "native"
    }

    fn structure(
        &self,
        bytes: &[u8],
        spec: &ComponentSpec,
        options: &CodecOptions,
    ) -> Result<ContextTree> {
        parser::parse(bytes, spec, options)
    }

    fn unstructure(&self, tree: &ContextTree, options: &CodecOptions) -> Result<Vec<u8>> {
        writer::write_with(tree, tree.root(), options)
    }
}

/// Codecs keyed by name, in registration order
pub struct CodecRegistry {
    codecs: IndexMap<String, Box<dyn Codec>>,
}

impl CodecRegistry {
    /// Registry holding only the native codec
    pub fn new() -> Self {
        let mut registry = Self {
            codecs: IndexMap::new(),
        };
        registry.register(Native);
        registry
    }

    /// Native codec plus every backend enabled by crate features
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "json")]
        registry.register(crate::json_ext::JsonCodec);
        registry
    }

    /// Register a codec, replacing any codec of the same name
    pub fn register(&mut self, codec: impl Codec + 'static) {
        let name = codec.name().to_ascii_lowercase();
        tracing::debug!(codec = %name, "registered codec");
        self.codecs.insert(name, Box::new(codec));
    }

    pub fn get(&self, name: &str) -> Result<&dyn Codec> {
        self.codecs
            .get(&name.to_ascii_lowercase())
            .map(|c| c.as_ref())
            .ok_or_else(|| Error::UnknownCodec {
                name: name.to_string(),
            })
    }

    pub fn structure(
        &self,
        codec: &str,
        bytes: &[u8],
        spec: &ComponentSpec,
        options: &CodecOptions,
    ) -> Result<ContextTree> {
        self.get(codec)?.structure(bytes, spec, options)
    }

    pub fn unstructure(
        &self,
        codec: &str,
        tree: &ContextTree,
        options: &CodecOptions,
    ) -> Result<Vec<u8>> {
        self.get(codec)?.unstructure(tree, options)
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.codecs.keys().map(String::as_str)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange;
    use crate::schema::builtin;
    use crate::types::Value;

    /// Debug rendering of the exchange value, enough to exercise the seam
    struct Echo;

    impl Codec for Echo {
        fn name(&self) -> &str {
            "Echo"
        }

        fn structure(
            &self,
            _: &[u8],
            spec: &ComponentSpec,
            options: &CodecOptions,
        ) -> Result<ContextTree> {
            exchange::structure(Value::Object(Vec::new()), spec, options)
        }

        fn unstructure(&self, tree: &ContextTree, _: &CodecOptions) -> Result<Vec<u8>> {
            Ok(format!("{:?}", exchange::unstructure(tree, tree.root())?).into_bytes())
        }
    }

    #[test]
    fn test_native_registered() {
        let registry = CodecRegistry::new();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["native"]);

        let schema = builtin();
        let spec = schema.get("sim-tdis").unwrap();
        let input = "BEGIN DIMENSIONS\n  NPER 2\nEND DIMENSIONS\n\nBEGIN PERIODDATA\n  1.0 1 1.0\n  10.0 5 1.2\nEND PERIODDATA\n";
        let options = CodecOptions::default();
        let tree = registry.structure("NATIVE", input.as_bytes(), spec, &options).unwrap();
        let text = registry.unstructure("native", &tree, &options).unwrap();
        assert_eq!(String::from_utf8(text).unwrap(), input);
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = CodecRegistry::default();
        registry.register(Echo);
        assert_eq!(registry.len(), 2);
        assert!(registry.get("echo").is_ok());

        let err = registry.get("toml").err().unwrap();
        assert!(matches!(err, Error::UnknownCodec { ref name } if name == "toml"));
    }
}
