//! Whole-simulation load and write
//!
//! A simulation directory holds `mfsim.nam`, which names the temporal
//! discretization file and one name file per model; each model name file
//! lists the model's package files. Loading follows those references and
//! builds `sim -> model -> package` in one tree, so packages resolve grid
//! dimensions against their model's discretization.

use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::context::{ContextTree, Kind, NodeId};
use crate::error::{Error, Result};
use crate::options::CodecOptions;
use crate::parser;
use crate::schema::{ComponentSpec, Schema};
use crate::types::{Param, Scalar};
use crate::writer;

/// Simulation name file, relative to the simulation directory
pub const SIM_NAME_FILE: &str = "mfsim.nam";

const SIM_ROOT: &str = "sim";

fn component<'s>(schema: &'s Schema, path: &str, key: &str) -> Result<&'s ComponentSpec> {
    schema.get(key).map(|c| c.as_ref()).ok_or_else(|| Error::UnknownComponent {
        path: path.to_string(),
        name: key.to_string(),
    })
}

/// String cells of every row in a component's list block
fn list_rows(tree: &ContextTree, node: NodeId, block: &str) -> Result<Vec<Vec<Option<String>>>> {
    let Some(block_node) = tree.block(node, block, None) else {
        return Ok(Vec::new());
    };
    let id = tree.param(block_node, block)?;
    let Some(Param::List(store)) = tree.get(id) else {
        return Ok(Vec::new());
    };
    let rows = store
        .rows()?
        .iter()
        .map(|row| {
            row.cells()
                .iter()
                .map(|cell| cell.as_scalar().and_then(Scalar::as_str).map(str::to_string))
                .collect()
        })
        .collect();
    Ok(rows)
}

fn cell(row: &[Option<String>], i: usize) -> Option<&str> {
    row.get(i).and_then(|c| c.as_deref())
}

/// Strip the `6` suffix name files put on type keywords (`GWF6`, `DIS6`)
fn base_type(token: &str) -> String {
    token.to_ascii_lowercase().trim_end_matches('6').to_string()
}

/// Load every component reachable from `dir/mfsim.nam`
///
/// External array files and name-file references resolve against `dir`.
pub fn load_simulation(
    dir: impl AsRef<Path>,
    schema: &Schema,
    options: &CodecOptions,
) -> Result<ContextTree> {
    let dir = dir.as_ref();
    let options = options.clone().with_base_dir(dir);

    let nam = dir.join(SIM_NAME_FILE);
    let bytes = fs::read(&nam).map_err(|source| Error::ExternalFileUnavailable {
        path: SIM_ROOT.to_string(),
        file: nam.clone(),
        source,
    })?;
    let spec = component(schema, SIM_ROOT, "sim-nam")?;
    let mut tree = parser::parse_named(&bytes, spec, SIM_ROOT, &options)?;
    let root = tree.root();
    tree.set_file(root, SIM_NAME_FILE);
    tree.set_base_dir(dir);

    let tdis = tree
        .lookup("timing/tdis6")
        .ok()
        .and_then(|id| tree.get(id))
        .and_then(Param::as_scalar)
        .and_then(Scalar::as_path)
        .map(Path::to_path_buf);
    if let Some(file) = tdis {
        let spec = component(schema, SIM_ROOT, "sim-tdis")?;
        parser::parse_file_into(&mut tree, root, "tdis", &file, spec, &options)?;
    }

    for row in list_rows(&tree, root, "models")? {
        let (Some(mtype), Some(mfname), Some(mname)) = (cell(&row, 0), cell(&row, 1), cell(&row, 2))
        else {
            continue;
        };
        let mtype = base_type(mtype);
        let spec = component(schema, SIM_ROOT, &format!("{mtype}-nam"))?;
        let model =
            parser::parse_file_into(&mut tree, root, mname, Path::new(mfname), spec, &options)?;
        load_packages(&mut tree, model, &mtype, schema, &options)?;
    }

    tracing::debug!(
        dir = %dir.display(),
        components = count_components(&tree, root),
        "loaded simulation"
    );
    Ok(tree)
}

fn load_packages(
    tree: &mut ContextTree,
    model: NodeId,
    mtype: &str,
    schema: &Schema,
    options: &CodecOptions,
) -> Result<()> {
    let path = tree.path(model);
    for row in list_rows(tree, model, "packages")? {
        let (Some(ftype), Some(fname)) = (cell(&row, 0), cell(&row, 1)) else {
            continue;
        };
        let ftype = base_type(ftype);
        let spec = component(schema, &path, &format!("{mtype}-{ftype}"))?;
        let name = cell(&row, 2).unwrap_or(&ftype).to_string();
        parser::parse_file_into(tree, model, &name, Path::new(fname), spec, options)?;
    }
    Ok(())
}

fn components(tree: &ContextTree, node: NodeId, out: &mut Vec<NodeId>) {
    if tree.node(node).kind() == Kind::Block {
        return;
    }
    out.push(node);
    for &child in tree.children(node) {
        components(tree, child, out);
    }
}

fn count_components(tree: &ContextTree, root: NodeId) -> usize {
    let mut out = Vec::new();
    components(tree, root, &mut out);
    out.len()
}

/// Write every component with a recorded file name into `dir`, then flush
/// modified external arrays to the files they were read from
///
/// Returns the component files written.
pub fn write_simulation(tree: &mut ContextTree, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let options = CodecOptions::default().with_base_dir(dir);
    let mut nodes = Vec::new();
    components(tree, tree.root(), &mut nodes);

    let mut written = Vec::new();
    for node in nodes {
        let Some(file) = tree.node(node).file() else {
            continue;
        };
        let target = dir.join(file);
        let handle = fs::File::create(&target).map_err(|source| Error::Write {
            path: tree.path(node),
            boundary: 0,
            source,
        })?;
        let bytes = writer::write_to(&mut BufWriter::new(handle), tree, node, &options)?;
        tracing::debug!(
            component = %tree.path(node),
            file = %target.display(),
            bytes,
            "wrote component file"
        );
        written.push(target);
    }
    writer::flush_external(tree)?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::builtin;
    use crate::types::ArrayStore;

    fn fixture(dir: &Path) {
        let files: [(&str, &str); 6] = [
            (
                "mfsim.nam",
                "BEGIN OPTIONS\nEND OPTIONS\n\nBEGIN TIMING\n  TDIS6 model.tdis\nEND TIMING\n\nBEGIN MODELS\n  gwf6 model.nam model\nEND MODELS\n\nBEGIN EXCHANGES\nEND EXCHANGES\n\nBEGIN SOLUTIONGROUP 1\n  ims6 model.ims model\nEND SOLUTIONGROUP\n",
            ),
            (
                "model.tdis",
                "BEGIN OPTIONS\n  TIME_UNITS days\nEND OPTIONS\n\nBEGIN DIMENSIONS\n  NPER 2\nEND DIMENSIONS\n\nBEGIN PERIODDATA\n  1.0 1 1.0\n  10.0 5 1.2\nEND PERIODDATA\n",
            ),
            (
                "model.nam",
                "BEGIN OPTIONS\n  SAVE_FLOWS\nEND OPTIONS\n\nBEGIN PACKAGES\n  DIS6 model.dis dis\n  IC6 model.ic\n  CHD6 model.chd\nEND PACKAGES\n",
            ),
            (
                "model.dis",
                "BEGIN DIMENSIONS\n  NLAY 1\n  NROW 2\n  NCOL 2\nEND DIMENSIONS\n\nBEGIN GRIDDATA\n  TOP\n    CONSTANT 10.0\n  BOTM\n    CONSTANT 0.0\nEND GRIDDATA\n",
            ),
            (
                "model.ic",
                "BEGIN GRIDDATA\n  STRT\n    INTERNAL\n      5.0 6.0\n      7.0 8.0\nEND GRIDDATA\n",
            ),
            (
                "model.chd",
                "BEGIN DIMENSIONS\n  MAXBOUND 1\nEND DIMENSIONS\n\nBEGIN PERIOD 1\n  1 1 1 10.0\nEND PERIOD\n",
            ),
        ];
        for (name, text) in files {
            fs::write(dir.join(name), text).unwrap();
        }
    }

    #[test]
    fn test_load_simulation_tree() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path());
        let tree = load_simulation(dir.path(), &builtin(), &CodecOptions::default()).unwrap();

        let nper = tree.lookup("tdis/dimensions/nper").unwrap();
        assert_eq!(tree.get(nper).and_then(Param::as_int), Some(2));

        let strt = tree.lookup("model/ic/griddata/strt").unwrap();
        let store = tree.get(strt).and_then(Param::as_array).unwrap();
        assert_eq!(store.shape(), &[1, 2, 2]);
        assert_eq!(store.raw_values().unwrap(), vec![5.0, 6.0, 7.0, 8.0]);

        assert!(tree.node_at("model/chd/period 1").is_some());
        assert_eq!(
            tree.node(tree.node_at("model/dis").unwrap()).file(),
            Some(Path::new("model.dis"))
        );
    }

    #[test]
    fn test_missing_component_type() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path());
        fs::write(
            dir.path().join("model.nam"),
            "BEGIN PACKAGES\n  NPF6 model.npf\nEND PACKAGES\n",
        )
        .unwrap();
        let err = load_simulation(dir.path(), &builtin(), &CodecOptions::default()).unwrap_err();
        assert!(matches!(err, Error::UnknownComponent { ref name, .. } if name == "gwf-npf"));
        assert_eq!(err.path(), "sim/model");
    }

    #[test]
    fn test_write_and_reload() {
        let src = tempfile::tempdir().unwrap();
        fixture(src.path());
        let schema = builtin();
        let mut tree = load_simulation(src.path(), &schema, &CodecOptions::default()).unwrap();

        let top = tree.lookup("model/dis/griddata/top").unwrap();
        let store = ArrayStore::constant(crate::types::NumKind::Double, vec![2, 2], 12.5);
        tree.set_param(top, store.into()).unwrap();

        let out = tempfile::tempdir().unwrap();
        let written = write_simulation(&mut tree, out.path()).unwrap();
        assert_eq!(written.len(), 6);

        let reloaded = load_simulation(out.path(), &schema, &CodecOptions::default()).unwrap();
        assert_eq!(reloaded, tree);
        let text = fs::read_to_string(out.path().join("model.dis")).unwrap();
        assert!(text.contains("  TOP\n    CONSTANT 12.5\n"));
    }
}
