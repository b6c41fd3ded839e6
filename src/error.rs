//! Error types for mf6io

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Codec result type
pub type Result<T> = std::result::Result<T, Error>;

/// Codec errors
///
/// Every variant carries the path of the offending component, block or
/// parameter (`component/block/param`).
#[derive(Debug, Error)]
pub enum Error {
    #[error("{path}: BEGIN {expected} at line {open_line} closed by {found} at line {line}")]
    BlockMismatch {
        path: String,
        expected: String,
        found: String,
        open_line: usize,
        line: usize,
    },

    #[error("{path}: unknown block {name}{}", at_line(.line))]
    UnknownBlock {
        path: String,
        name: String,
        line: Option<usize>,
    },

    #[error("{path}: unknown component type {name}")]
    UnknownComponent { path: String, name: String },

    #[error("{path}: unknown parameter {name}{}", at_line(.line))]
    UnknownParameter {
        path: String,
        name: String,
        line: Option<usize>,
    },

    #[error("{path}: unknown variant {token}{}", at_line(.line))]
    UnknownVariant {
        path: String,
        token: String,
        line: Option<usize>,
    },

    #[error("{path}: expected {expected}, found {found}{}", at_line(.line))]
    TypeMismatch {
        path: String,
        expected: String,
        found: String,
        line: Option<usize>,
    },

    #[error("{path}: row {row} has {found} columns, expected {expected}")]
    RowArityMismatch {
        path: String,
        row: usize,
        expected: String,
        found: usize,
    },

    #[error("{path}: cannot resolve dimension {dim}: {reason}")]
    ShapeUnresolved {
        path: String,
        dim: String,
        reason: String,
    },

    #[error("{path}: dependency cycle through {}", .chain.join(" -> "))]
    DependencyCycle { path: String, chain: Vec<String> },

    #[error("{path}: block index {found} at line {line} does not follow {previous}")]
    PeriodOrderError {
        path: String,
        previous: i64,
        found: i64,
        line: usize,
    },

    #[error("{path}: external file {} unavailable: {source}", .file.display())]
    ExternalFileUnavailable {
        path: String,
        file: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path}: line {line}: {message}")]
    Syntax {
        path: String,
        line: usize,
        message: String,
    },

    #[error("{path}: invalid schema: {message}")]
    Schema { path: String, message: String },

    #[error("unknown codec: {name}")]
    UnknownCodec { name: String },

    #[error("{path}: write failed after {boundary} bytes: {source}")]
    Write {
        path: String,
        boundary: usize,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Path of the component, block or parameter the error refers to
    pub fn path(&self) -> &str {
        match self {
            Error::BlockMismatch { path, .. }
            | Error::UnknownBlock { path, .. }
            | Error::UnknownComponent { path, .. }
            | Error::UnknownParameter { path, .. }
            | Error::UnknownVariant { path, .. }
            | Error::TypeMismatch { path, .. }
            | Error::RowArityMismatch { path, .. }
            | Error::ShapeUnresolved { path, .. }
            | Error::DependencyCycle { path, .. }
            | Error::PeriodOrderError { path, .. }
            | Error::ExternalFileUnavailable { path, .. }
            | Error::Syntax { path, .. }
            | Error::Schema { path, .. }
            | Error::Write { path, .. } => path,
            Error::UnknownCodec { name } => name,
        }
    }

    /// 1-based input line, where the error has one
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::BlockMismatch { line, .. }
            | Error::PeriodOrderError { line, .. }
            | Error::Syntax { line, .. } => Some(*line),
            Error::UnknownBlock { line, .. }
            | Error::UnknownParameter { line, .. }
            | Error::UnknownVariant { line, .. }
            | Error::TypeMismatch { line, .. } => *line,
            Error::RowArityMismatch { row, .. } => Some(*row),
            _ => None,
        }
    }

    pub(crate) fn syntax(path: &str, line: usize, message: impl Into<String>) -> Self {
        Error::Syntax {
            path: path.to_string(),
            line,
            message: message.into(),
        }
    }

    pub(crate) fn mismatch(
        path: &str,
        expected: impl Into<String>,
        found: impl Into<String>,
        line: Option<usize>,
    ) -> Self {
        Error::TypeMismatch {
            path: path.to_string(),
            expected: expected.into(),
            found: found.into(),
            line,
        }
    }
}

fn at_line(line: &Option<usize>) -> String {
    match line {
        Some(line) => format!(" at line {line}"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_unknown_parameter() {
        let err = Error::UnknownParameter {
            path: "gwf-dis/options".to_string(),
            name: "FOO".to_string(),
            line: Some(3),
        };
        assert_eq!(
            err.to_string(),
            "gwf-dis/options: unknown parameter FOO at line 3"
        );
        assert_eq!(err.path(), "gwf-dis/options");
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn test_display_cycle() {
        let err = Error::DependencyCycle {
            path: "sim/a".to_string(),
            chain: vec!["sim/a".to_string(), "sim/b".to_string(), "sim/a".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "sim/a: dependency cycle through sim/a -> sim/b -> sim/a"
        );
    }

    #[test]
    fn test_display_without_line() {
        let err = Error::mismatch("pkg/options/x", "integer", "'abc'", None);
        assert_eq!(err.to_string(), "pkg/options/x: expected integer, found 'abc'");
    }
}
