//! Scalar parameter values

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Primitive kinds a scalar parameter or record field may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    /// Switch that is on when present
    Keyword,
    Integer,
    Double,
    String,
    Path,
}

impl ScalarKind {
    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::Keyword => "keyword",
            ScalarKind::Integer => "integer",
            ScalarKind::Double => "double",
            ScalarKind::String => "string",
            ScalarKind::Path => "path",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Direction tag preceding a file path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InOut {
    FileIn,
    FileOut,
}

impl InOut {
    pub fn keyword(self) -> &'static str {
        match self {
            InOut::FileIn => "FILEIN",
            InOut::FileOut => "FILEOUT",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("filein") {
            Some(InOut::FileIn)
        } else if token.eq_ignore_ascii_case("fileout") {
            Some(InOut::FileOut)
        } else {
            None
        }
    }
}

/// A single typed scalar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Keyword(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Path {
        #[serde(default)]
        inout: Option<InOut>,
        path: PathBuf,
    },
}

impl Scalar {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::Keyword(_) => ScalarKind::Keyword,
            Scalar::Integer(_) => ScalarKind::Integer,
            Scalar::Double(_) => ScalarKind::Double,
            Scalar::String(_) => ScalarKind::String,
            Scalar::Path { .. } => ScalarKind::Path,
        }
    }

    pub fn path(path: impl Into<PathBuf>) -> Self {
        Scalar::Path {
            inout: None,
            path: path.into(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Keyword(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Scalar::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Reals, and integers widened to reals
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Scalar::Double(f) => Some(*f),
            Scalar::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Scalar::Path { path, .. } => Some(path),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            Scalar::Path { path, .. } => path.to_str(),
            _ => None,
        }
    }

    /// Convert one token to a scalar of `kind`
    ///
    /// A keyword token always converts to `true`; the caller decides whether
    /// the token matches the keyword's name.
    pub fn from_token(kind: ScalarKind, token: &str) -> Option<Scalar> {
        match kind {
            ScalarKind::Keyword => Some(Scalar::Keyword(true)),
            ScalarKind::Integer => parse_int(token).map(Scalar::Integer),
            ScalarKind::Double => parse_double(token).map(Scalar::Double),
            ScalarKind::String => Some(Scalar::String(token.to_string())),
            ScalarKind::Path => Some(Scalar::path(token)),
        }
    }

    /// Text form of the value as it appears in input files
    ///
    /// Keywords have no value text; the writer emits their name instead.
    pub fn to_token(&self) -> String {
        match self {
            Scalar::Keyword(_) => String::new(),
            Scalar::Integer(i) => i.to_string(),
            Scalar::Double(f) => format_double(*f),
            Scalar::String(s) => quote(s),
            Scalar::Path { inout, path } => {
                let path = quote(&path.to_string_lossy());
                match inout {
                    Some(inout) => format!("{} {}", inout.keyword(), path),
                    None => path,
                }
            }
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Keyword(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Integer(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Double(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::String(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::String(v)
    }
}

pub fn parse_int(token: &str) -> Option<i64> {
    token.parse().ok()
}

/// Parse a real, accepting Fortran `d` exponents (`1.5d-3`)
pub fn parse_double(token: &str) -> Option<f64> {
    if token.contains(['d', 'D']) {
        token.replace(['d', 'D'], "e").parse().ok()
    } else {
        token.parse().ok()
    }
}

/// Shortest text that reads back to the same `f64`
pub fn format_double(value: f64) -> String {
    format!("{value:?}")
}

fn quote(s: &str) -> String {
    if s.is_empty() || s.contains(char::is_whitespace) {
        format!("'{s}'")
    } else {
        s.to_string()
    }
}
