//! Codec configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default bound on Signal Bus wave depth
pub const DEFAULT_MAX_WAVE_DEPTH: usize = 32;

/// When bulk payloads are converted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Load {
    /// Convert while parsing
    Eager,
    /// Convert on first access
    #[default]
    Lazy,
}

/// Options for a single codec invocation
///
/// Configuration-class parameters (scalars, records, keystrings) are always
/// read eagerly. `arrays` and `lists` control the data classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecOptions {
    /// Directory external file references resolve against
    pub base_dir: PathBuf,
    pub arrays: Load,
    pub lists: Load,
    /// Waves a single mutation may propagate before it is reported as a cycle
    pub max_wave_depth: usize,
    /// Writer indentation width
    pub indent: usize,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            arrays: Load::Lazy,
            lists: Load::Lazy,
            max_wave_depth: DEFAULT_MAX_WAVE_DEPTH,
            indent: 2,
        }
    }
}

impl CodecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.base_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_arrays(mut self, load: Load) -> Self {
        self.arrays = load;
        self
    }

    pub fn with_lists(mut self, load: Load) -> Self {
        self.lists = load;
        self
    }

    /// Load every data-class parameter while parsing
    pub fn eager(self) -> Self {
        self.with_arrays(Load::Eager).with_lists(Load::Eager)
    }

    pub fn with_max_wave_depth(mut self, depth: usize) -> Self {
        self.max_wave_depth = depth;
        self
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    /// Resolve a path as written in the input against `base_dir`
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}
