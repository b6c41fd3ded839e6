//! Array serialization

use std::io::Write;

use super::Sink;
use crate::error::Result;
use crate::types::{ArrayStore, Control, How, NumKind, Part, Payload, Scalar};

/// Control line text for one part
fn control_line(part: &Part, kind: NumKind) -> String {
    let control: &Control = &part.control;
    let mut tokens = vec![control.how.keyword().to_string()];
    match control.how {
        How::Constant => {
            if let Payload::Constant(value) = part.payload {
                tokens.push(kind.format(value));
            }
        }
        How::External => {
            let file = control
                .path
                .as_ref()
                .map(|p| Scalar::path(p.clone()).to_token())
                .unwrap_or_default();
            tokens.push(file);
        }
        How::Internal => {}
    }
    if let Some(factor) = control.factor {
        tokens.push("FACTOR".to_string());
        tokens.push(NumKind::Double.format(factor));
    }
    if let Some(iprn) = control.iprn {
        tokens.push("IPRN".to_string());
        tokens.push(iprn.to_string());
    }
    tokens.join(" ")
}

/// Values in rows of the innermost dimension
pub(crate) fn data_rows(values: &[f64], shape: &[usize], kind: NumKind) -> Vec<String> {
    let width = shape.last().copied().filter(|&w| w > 0).unwrap_or(values.len().max(1));
    values
        .chunks(width)
        .map(|row| {
            row.iter()
                .map(|v| kind.format(*v))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

/// `NAME [LAYERED]`, then each part's control line and internal data
pub fn write_array<W: Write>(sink: &mut Sink<'_, W>, name: &str, store: &ArrayStore) -> Result<()> {
    let mut header = name.to_ascii_uppercase();
    if store.is_layered() {
        header.push_str(" LAYERED");
    }
    sink.line(1, &header)?;
    let len = store.part_len();
    for part in store.parts() {
        sink.line(2, &control_line(part, store.kind()))?;
        if part.control.how == How::Internal {
            let raw = part.raw(store.kind(), len, store.label())?;
            for row in data_rows(&raw, store.shape(), store.kind()) {
                sink.line(3, &row)?;
            }
        }
    }
    Ok(())
}
