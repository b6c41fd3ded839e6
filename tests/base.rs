//! Integration tests for mf6io
//!
//! These tests walk through the main use cases: reading package text into a
//! tree, mutating it, and writing it back.

use std::fs;

use mf6io::types::{ColumnDef, ExtensionDef, ListDef, Presence};
use mf6io::{
    BlockSpec, Cell, CodecOptions, ComponentKind, ComponentSpec, ContextTree, Error, How, Kind,
    Load, Param, ParamSpec, Scalar, ScalarKind, Value, builtin, exchange, parser, writer,
};
use pretty_assertions::assert_eq;

const CHD: &str = "\
BEGIN OPTIONS
  AUXILIARY conc
  BOUNDNAMES
  SAVE_FLOWS
END OPTIONS

BEGIN DIMENSIONS
  MAXBOUND 2
END DIMENSIONS

BEGIN PERIOD 1
  1 1 1 10.0 0.5 west
  1 2 1 9.5 0.25 'east bank'
END PERIOD

BEGIN PERIOD 3
  1 1 1 11.0 0.0 west
END PERIOD
";

const DIS: &str = "\
BEGIN OPTIONS
  LENGTH_UNITS meters
END OPTIONS

BEGIN DIMENSIONS
  NLAY 2
  NROW 2
  NCOL 3
END DIMENSIONS

BEGIN GRIDDATA
  DELR
    CONSTANT 100.0
  DELC
    INTERNAL FACTOR 2.0 IPRN 1
      10.0 20.0
  TOP
    CONSTANT 50.0
  BOTM LAYERED
    CONSTANT 20.0
    INTERNAL
      1.0 2.0 3.0
      4.0 5.0 6.0
END GRIDDATA
";

fn naux_spec() -> ComponentSpec {
    let list = ListDef::new(vec![
        ColumnDef::new("cellid", ScalarKind::Integer),
        ColumnDef::new("rate", ScalarKind::Double),
    ])
    .extension(ExtensionDef::new("aux", ScalarKind::Double, Presence::Count("naux".into())));
    ComponentSpec::new("gwf-wel", ComponentKind::Package)
        .block(BlockSpec::new("options").param(ParamSpec::integer("naux").default(0i64)))
        .block(
            BlockSpec::new("period")
                .indexed()
                .param(ParamSpec::list("stress_period_data", list)),
        )
}

// =============================================================================
// Round trips
// =============================================================================

#[test]
fn roundtrip_package_text() {
    let schema = builtin();
    let spec = schema.get("gwf-chd").unwrap();
    let tree = parser::parse(CHD.as_bytes(), spec, &CodecOptions::default()).unwrap();

    let text = writer::write(&tree).unwrap();
    assert_eq!(String::from_utf8(text.clone()).unwrap(), CHD);

    let reparsed = parser::parse(&text, spec, &CodecOptions::default()).unwrap();
    assert_eq!(reparsed, tree);
}

#[test]
fn roundtrip_grid_text() {
    let schema = builtin();
    let spec = schema.get("gwf-dis").unwrap();
    let tree = parser::parse(DIS.as_bytes(), spec, &CodecOptions::default().eager()).unwrap();

    let text = writer::write(&tree).unwrap();
    assert_eq!(String::from_utf8(text.clone()).unwrap(), DIS);
    assert_eq!(parser::parse(&text, spec, &CodecOptions::default()).unwrap(), tree);
}

#[test]
fn roundtrip_through_exchange_value() {
    let schema = builtin();
    let spec = schema.get("gwf-dis").unwrap();
    let tree = parser::parse(DIS.as_bytes(), spec, &CodecOptions::default()).unwrap();

    let value = exchange::unstructure(&tree, tree.root()).unwrap();
    assert_eq!(value.get("dimensions/ncol").and_then(Value::as_int), Some(3));
    let rebuilt = exchange::structure(value, spec, &CodecOptions::default()).unwrap();
    assert_eq!(rebuilt, tree);
}

// =============================================================================
// Array fidelity
// =============================================================================

#[test]
fn constant_array_stays_constant() {
    let schema = builtin();
    let spec = schema.get("gwf-dis").unwrap();
    let input = "BEGIN DIMENSIONS\n  NROW 3\n  NCOL 4\nEND DIMENSIONS\n\nBEGIN GRIDDATA\n  TOP\n    CONSTANT 2.0\nEND GRIDDATA\n";
    let tree = parser::parse(input.as_bytes(), spec, &CodecOptions::default()).unwrap();

    let top = tree.lookup("griddata/top").unwrap();
    let store = tree.get(top).and_then(Param::as_array).unwrap();
    assert_eq!(store.how(), How::Constant);
    assert_eq!(store.shape(), &[3, 4]);
    assert!(store.value().unwrap().iter().all(|&v| v == 2.0));

    let text = String::from_utf8(writer::write(&tree).unwrap()).unwrap();
    assert_eq!(
        text,
        concat!(
            "BEGIN DIMENSIONS\n  NLAY 1\n  NROW 3\n  NCOL 4\nEND DIMENSIONS\n\n",
            "BEGIN GRIDDATA\n  DELR\n    CONSTANT 1.0\n  DELC\n    CONSTANT 1.0\n",
            "  TOP\n    CONSTANT 2.0\n  BOTM\n    CONSTANT 0.0\nEND GRIDDATA\n",
        )
    );
    assert_eq!(parser::parse(text.as_bytes(), spec, &CodecOptions::default()).unwrap(), tree);
}

#[test]
fn factor_applies_to_value_not_raw() {
    let schema = builtin();
    let spec = schema.get("gwf-dis").unwrap();
    let input = b"BEGIN DIMENSIONS\n  NCOL 3\nEND DIMENSIONS\nBEGIN GRIDDATA\n  DELR\n    INTERNAL FACTOR 2.0\n      1 2 3\nEND GRIDDATA\n";
    let tree = parser::parse(input, spec, &CodecOptions::default()).unwrap();

    let delr = tree.lookup("griddata/delr").unwrap();
    let store = tree.get(delr).and_then(Param::as_array).unwrap();
    assert_eq!(store.value().unwrap().iter().copied().collect::<Vec<_>>(), vec![2.0, 4.0, 6.0]);
    assert_eq!(store.raw().unwrap().iter().copied().collect::<Vec<_>>(), vec![1.0, 2.0, 3.0]);
    assert_eq!(store.factor(), 2.0);
}

#[test]
fn layered_array_stacks_layers() {
    let schema = builtin();
    let spec = schema.get("gwf-dis").unwrap();
    let tree = parser::parse(DIS.as_bytes(), spec, &CodecOptions::default()).unwrap();
    let botm = tree.lookup("griddata/botm").unwrap();
    let store = tree.get(botm).and_then(Param::as_array).unwrap();
    assert!(store.is_layered());
    let value = store.value().unwrap();
    assert_eq!(value.shape(), &[2, 2, 3]);
    assert_eq!(
        value.iter().copied().collect::<Vec<_>>(),
        vec![20.0, 20.0, 20.0, 20.0, 20.0, 20.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
    );
}

// =============================================================================
// External files
// =============================================================================

#[test]
fn external_array_reads_lazily() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("delr.txt"), "1.0 2.0\n3.0\n").unwrap();
    let options = CodecOptions::default().with_base_dir(dir.path());
    let schema = builtin();
    let input = b"BEGIN DIMENSIONS\n  NCOL 3\nEND DIMENSIONS\nBEGIN GRIDDATA\n  DELR\n    OPEN/CLOSE delr.txt FACTOR 10.0\nEND GRIDDATA\n";
    let tree = parser::parse(input, schema.get("gwf-dis").unwrap(), &options).unwrap();

    let files = tree.external_files();
    assert_eq!(files.get("gwf-dis/griddata/delr"), Some(&dir.path().join("delr.txt")));

    let delr = tree.lookup("griddata/delr").unwrap();
    let store = tree.get(delr).and_then(Param::as_array).unwrap();
    assert!(!store.is_loaded());
    assert_eq!(store.value().unwrap().iter().copied().collect::<Vec<_>>(), vec![10.0, 20.0, 30.0]);
    assert!(store.is_loaded());

    // A loaded array never goes back to the file
    fs::remove_file(dir.path().join("delr.txt")).unwrap();
    assert_eq!(store.raw_values().unwrap(), vec![1.0, 2.0, 3.0]);

    let text = String::from_utf8(writer::write(&tree).unwrap()).unwrap();
    assert!(text.contains("  DELR\n    OPEN/CLOSE delr.txt FACTOR 10.0\n"));
}

#[test]
fn missing_external_file() {
    let dir = tempfile::tempdir().unwrap();
    let options = CodecOptions::default().with_base_dir(dir.path());
    let schema = builtin();
    let spec = schema.get("gwf-dis").unwrap();
    let input = b"BEGIN GRIDDATA\n  DELR\n    OPEN/CLOSE nowhere.txt\nEND GRIDDATA\n";

    let tree = parser::parse(input, spec, &options).unwrap();
    let delr = tree.lookup("griddata/delr").unwrap();
    let err = tree.get(delr).and_then(Param::as_array).unwrap().value().unwrap_err();
    assert!(matches!(err, Error::ExternalFileUnavailable { .. }));

    let err = parser::parse(input, spec, &options.with_arrays(Load::Eager)).unwrap_err();
    assert!(matches!(err, Error::ExternalFileUnavailable { .. }));
    assert_eq!(err.path(), "gwf-dis/griddata/delr");
}

// =============================================================================
// List schema expansion
// =============================================================================

#[test]
fn naux_adds_trailing_columns() {
    let spec = naux_spec();
    let input = b"BEGIN OPTIONS\n  NAUX 2\nEND OPTIONS\nBEGIN PERIOD 1\n  4 -1.5 0.1 0.2\n  5 -2.5 0.3 0.4\nEND PERIOD\n";
    let tree = parser::parse(input, &spec, &CodecOptions::default()).unwrap();

    let data = tree.lookup("period 1/stress_period_data").unwrap();
    let store = tree.get(data).and_then(Param::as_list).unwrap();
    let names: Vec<&str> = store.schema().names().collect();
    assert_eq!(names, vec!["cellid", "rate", "aux1", "aux2"]);
    let aux2: Vec<f64> = store
        .column("aux2")
        .unwrap()
        .into_iter()
        .map(|c| c.and_then(|c| c.as_scalar()).and_then(|s| s.as_float()).unwrap())
        .collect();
    assert_eq!(aux2, vec![0.2, 0.4]);
}

#[test]
fn short_row_is_arity_mismatch() {
    let spec = naux_spec();
    let input = b"BEGIN OPTIONS\n  NAUX 2\nEND OPTIONS\nBEGIN PERIOD 1\n  4 -1.5 0.1 0.2\n  5 -2.5 0.3\nEND PERIOD\n";
    for options in [CodecOptions::default(), CodecOptions::default().eager()] {
        let err = parser::parse(input, &spec, &options).unwrap_err();
        match err {
            Error::RowArityMismatch { row, found, ref path, .. } => {
                assert_eq!(row, 6);
                assert_eq!(found, 3);
                assert_eq!(path, "gwf-wel/period 1/stress_period_data");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

// =============================================================================
// Dependency propagation
// =============================================================================

#[test]
fn boundnames_change_reaches_list_in_one_wave() {
    let schema = builtin();
    let spec = schema.get("gwf-chd").unwrap();
    let input = b"BEGIN DIMENSIONS\n  MAXBOUND 1\nEND DIMENSIONS\nBEGIN PERIOD 1\nEND PERIOD\n";
    let mut tree = parser::parse(input, spec, &CodecOptions::default()).unwrap();

    let flag = tree.lookup("options/boundnames").unwrap();
    let data = tree.lookup("period 1/stress_period_data").unwrap();
    let propagation = tree.set(flag, true).unwrap();
    assert_eq!(propagation.waves, vec![vec![data]]);

    let store = tree.get(data).and_then(Param::as_list).unwrap();
    assert_eq!(store.schema().position("boundname"), Some(4));
    assert_eq!(tree.signal_bus().dependents(flag).count(), 1);
}

#[test]
fn dropping_auxiliary_keeps_boundnames() {
    let schema = builtin();
    let spec = schema.get("gwf-chd").unwrap();
    let mut tree = parser::parse(CHD.as_bytes(), spec, &CodecOptions::default()).unwrap();
    let auxiliary = tree.lookup("options/auxiliary").unwrap();
    tree.unset(auxiliary).unwrap();

    let text = String::from_utf8(writer::write(&tree).unwrap()).unwrap();
    assert!(text.contains("BEGIN PERIOD 1\n  1 1 1 10.0 west\n  1 2 1 9.5 'east bank'\n"));

    let reparsed = parser::parse(text.as_bytes(), spec, &CodecOptions::default()).unwrap();
    let data = reparsed.lookup("period 1/stress_period_data").unwrap();
    let store = reparsed.get(data).and_then(Param::as_list).unwrap();
    let names: Vec<Option<&str>> = store
        .column("boundname")
        .unwrap()
        .into_iter()
        .map(|cell| cell.and_then(Cell::as_scalar).and_then(Scalar::as_str))
        .collect();
    assert_eq!(names, vec![Some("west"), Some("east bank")]);
    assert_eq!(reparsed, tree);
}

#[test]
fn dimension_change_reshapes_grid_arrays() {
    let schema = builtin();
    let spec = schema.get("gwf-dis").unwrap();
    let mut tree = parser::parse(DIS.as_bytes(), spec, &CodecOptions::default()).unwrap();
    let nrow = tree.lookup("dimensions/nrow").unwrap();
    tree.set(nrow, 4i64).unwrap();

    let top = tree.lookup("griddata/top").unwrap();
    assert_eq!(tree.get(top).and_then(Param::as_array).unwrap().shape(), &[4, 3]);
    // Internal data no longer fits and is dropped
    let delc = tree.lookup("griddata/delc").unwrap();
    assert!(tree.get(delc).is_none());
}

#[test]
fn mutual_dependency_is_rejected() {
    let schema = builtin();
    let mut tree = ContextTree::from_spec(schema.get("gwf-dis").unwrap(), "dis");
    let x = tree.lookup("options/xorigin").unwrap();
    let y = tree.lookup("options/yorigin").unwrap();
    tree.set(x, 1.0).unwrap();
    tree.depend(y, x);
    tree.depend(x, y);

    let err = tree.set(x, 2.0).unwrap_err();
    match err {
        Error::DependencyCycle { ref chain, .. } => {
            assert_eq!(chain.first(), chain.last());
            assert!(chain.contains(&"dis/options/yorigin".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(tree.get(x).and_then(Param::as_float), Some(1.0));
}

// =============================================================================
// Block structure errors
// =============================================================================

#[test]
fn period_indices_must_increase() {
    let schema = builtin();
    let spec = schema.get("gwf-sto").unwrap();
    let block = |i: i64| format!("BEGIN PERIOD {i}\n  TRANSIENT\nEND PERIOD\n");

    let ok: String = [1, 2, 3].into_iter().map(block).collect();
    let tree = parser::parse(ok.as_bytes(), spec, &CodecOptions::default()).unwrap();
    let periods: Vec<i64> = tree
        .children(tree.root())
        .iter()
        .filter_map(|&c| tree.node(c).index())
        .collect();
    assert_eq!(periods, vec![1, 2, 3]);

    let bad: String = [1, 2, 2].into_iter().map(block).collect();
    let err = parser::parse(bad.as_bytes(), spec, &CodecOptions::default()).unwrap_err();
    assert!(matches!(err, Error::PeriodOrderError { previous: 2, found: 2, line: 7, .. }));
}

#[test]
fn unknown_keyword_in_closed_block() {
    let schema = builtin();
    let input = b"BEGIN OPTIONS\n  FOO 1\nEND OPTIONS\n";
    let spec = schema.get("gwf-dis").unwrap();
    let err = parser::parse(input, spec, &CodecOptions::default()).unwrap_err();
    match err {
        Error::UnknownParameter { ref name, ref path, line } => {
            assert_eq!(name, "FOO");
            assert_eq!(path, "gwf-dis/options");
            assert_eq!(line, Some(2));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unknown_keyword_in_open_block_is_skipped() {
    let schema = builtin();
    let input = b"BEGIN OPTIONS\n  FOO 1\n  SAVE_FLOWS\nEND OPTIONS\n";
    let spec = schema.get("gwf-nam").unwrap();
    let tree = parser::parse(input, spec, &CodecOptions::default()).unwrap();
    let flag = tree.lookup("options/save_flows").unwrap();
    assert_eq!(tree.get(flag).and_then(Param::as_bool), Some(true));
}

#[test]
fn mismatched_end() {
    let schema = builtin();
    let input = b"BEGIN OPTIONS\nEND DIMENSIONS\n";
    let spec = schema.get("gwf-dis").unwrap();
    let err = parser::parse(input, spec, &CodecOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::BlockMismatch { ref expected, ref found, open_line: 1, line: 2, .. }
            if expected == "OPTIONS" && found == "END DIMENSIONS"
    ));
}

// =============================================================================
// Building trees in code
// =============================================================================

#[test]
fn model_tree_resolves_package_dimensions() {
    let schema = builtin();
    let options = CodecOptions::default();
    let mut tree = ContextTree::new("gwf", Kind::Model);
    let root = tree.root();
    let dis = schema.get("gwf-dis").unwrap();
    parser::parse_into(&mut tree, root, "dis", DIS.as_bytes(), dis, &options).unwrap();
    let sto = tree.add_component(root, schema.get("gwf-sto").unwrap(), "sto");

    let ss = tree.lookup("sto/griddata/ss").unwrap();
    let store = tree.get(ss).and_then(Param::as_array).unwrap();
    assert_eq!(store.shape(), &[2, 2, 3]);
    assert_eq!(store.constant_value(), Some(1e-5));

    let period = tree.add_block(sto, "period", Some(1)).unwrap();
    let storage = tree.param(period, "storage").unwrap();
    tree.set(storage, "transient").unwrap();
    let text = String::from_utf8(writer::write_with(&tree, sto, &options).unwrap()).unwrap();
    assert!(text.starts_with("BEGIN GRIDDATA\n  ICONVERT\n    CONSTANT 0\n  SS\n"));
    assert!(text.contains("  SY\n    CONSTANT 0.15\nEND GRIDDATA\n"));
    assert!(text.ends_with("\n\nBEGIN PERIOD 1\n  TRANSIENT\nEND PERIOD\n"));
}
