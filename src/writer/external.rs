//! Writing modified external array files

use std::fs;

use super::array::data_rows;
use crate::context::ContextTree;
use crate::error::{Error, Result};
use crate::types::Param;

/// Rewrite every external array file whose values were changed in memory
///
/// Returns the number of files written.
pub fn flush_external(tree: &mut ContextTree) -> Result<usize> {
    let mut flushed = Vec::new();
    let mut written = 0;
    for id in tree.all_params() {
        let Some(Param::Array(store)) = tree.get(id) else {
            continue;
        };
        let dirty = store.dirty_external();
        if dirty.is_empty() {
            continue;
        }
        let path = tree.param_path(id);
        for (file, values) in dirty {
            let mut text = data_rows(values, store.shape(), store.kind()).join("\n");
            text.push('\n');
            fs::write(file, text).map_err(|source| Error::ExternalFileUnavailable {
                path: path.clone(),
                file: file.to_path_buf(),
                source,
            })?;
            tracing::debug!(param = %path, file = %file.display(), "flushed external array");
            written += 1;
        }
        flushed.push(id);
    }
    for id in flushed {
        if let Some(Param::Array(store)) = tree.slot_value_mut(id) {
            store.mark_clean();
        }
    }
    Ok(written)
}
