//! mf6io - MODFLOW 6 input text as a typed context tree
//!
//! A bidirectional codec between MF6 block-structured input files and an
//! in-memory tree of typed parameters. Parameters are declared per component
//! by a [`Schema`]; parsing checks every entry against it, and writing
//! reproduces the text, keeping each array's storage mode.
//!
//! # Features
//!
//! - Constant, internal and external (`OPEN/CLOSE`) arrays with `FACTOR`
//! - Lists whose columns grow with sibling options (`AUXILIARY`, `BOUNDNAMES`)
//! - Dimensions resolved by nearest ancestor, so a package sees its model's grid
//! - Dependent shapes and schemas kept current when a controlling value changes
//! - Lazy loading of bulk array and list data
//! - Whole-simulation load and write from `mfsim.nam`
//!
//! # Example
//!
//! ```rust
//! use mf6io::{CodecOptions, Param, builtin, parser, writer};
//!
//! let schema = builtin();
//! let input = b"BEGIN DIMENSIONS\n  NLAY 1\n  NROW 1\n  NCOL 3\nEND DIMENSIONS\n\
//! BEGIN GRIDDATA\n  DELR\n    CONSTANT 10.0\nEND GRIDDATA\n";
//! let spec = schema.get("gwf-dis").unwrap();
//! let mut tree = parser::parse(input, spec, &CodecOptions::default()).unwrap();
//!
//! // Changing a dimension reshapes the arrays that depend on it
//! let ncol = tree.lookup("dimensions/ncol").unwrap();
//! tree.set(ncol, 5i64).unwrap();
//! let delr = tree.lookup("griddata/delr").unwrap();
//! assert_eq!(tree.get(delr).and_then(Param::as_array).unwrap().shape(), &[5]);
//!
//! let text = writer::write(&tree).unwrap();
//! assert!(String::from_utf8(text).unwrap().contains("NCOL 5"));
//! ```

pub mod context;
pub mod error;
pub mod exchange;
pub mod options;
pub mod parser;
pub mod registry;
pub mod schema;
pub mod signal;
pub mod sim;
pub mod types;
pub mod writer;

#[cfg(feature = "json")]
pub mod json_ext;

// Re-export common types at crate root
pub use context::{ContextTree, Kind, Node, NodeId, ParamId};
pub use error::{Error, Result};
pub use options::{CodecOptions, Load};
pub use parser::parse;
pub use registry::{Codec, CodecRegistry, Native};
pub use schema::{BlockSpec, BlockType, ComponentKind, ComponentSpec, Schema, builtin};
pub use signal::{Effect, Propagation, SignalBus};
pub use sim::{load_simulation, write_simulation};
pub use types::{
    ArrayStore, Cell, How, ListStore, NumKind, Param, ParamSpec, ParamType, Record, Row, Scalar,
    ScalarKind, Value,
};
pub use writer::write;

#[cfg(feature = "json")]
pub use json_ext::JsonCodec;
