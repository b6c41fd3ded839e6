//! Component and block parsing

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;

use super::array::ArrayParser;
use super::list::ListParser;
use super::{Cursor, Parser};
use crate::context::{ContextTree, NodeId, StagedBlock, StagedComponent};
use crate::error::{Error, Result};
use crate::options::CodecOptions;
use crate::schema::{BlockSpec, ComponentSpec, Selector};
use crate::types::{InOut, Param, ParamSpec, ParamType, Scalar, ScalarKind, parse_int};

/// Reads every block of one component
pub(crate) struct ComponentParser<'s> {
    pub spec: &'s Arc<ComponentSpec>,
    pub name: &'s str,
    pub tree: Option<(&'s ContextTree, NodeId)>,
    pub options: &'s CodecOptions,
    pub path: &'s str,
}

impl<'a> Parser<'a> for ComponentParser<'_> {
    type Output = StagedComponent;

    fn parse(&self, mut cursor: Cursor<'a>) -> Result<(Self::Output, Cursor<'a>)> {
        let mut staged = StagedComponent::new(self.name, self.spec.clone(), None::<PathBuf>);
        let mut last_index: IndexMap<String, i64> = IndexMap::new();

        while let Some(line) = cursor.peek() {
            let tokens = line.tokens();
            if !tokens[0].eq_ignore_ascii_case("begin") {
                return Err(Error::syntax(
                    self.path,
                    line.number,
                    format!("expected BEGIN, found {}", tokens[0]),
                ));
            }
            let Some(name) = tokens.get(1) else {
                return Err(Error::syntax(self.path, line.number, "BEGIN without a block name"));
            };
            let spec = self.spec.get(name).ok_or_else(|| Error::UnknownBlock {
                path: self.path.to_string(),
                name: name.to_string(),
                line: Some(line.number),
            })?;

            let index = if spec.indexed {
                let index = tokens.get(2).and_then(|t| parse_int(t)).ok_or_else(|| {
                    Error::syntax(
                        self.path,
                        line.number,
                        format!("block {} needs an integer index", spec.name.to_ascii_uppercase()),
                    )
                })?;
                if let Some(&previous) = last_index.get(&spec.name) {
                    if index <= previous {
                        return Err(Error::PeriodOrderError {
                            path: format!("{}/{}", self.path, spec.name),
                            previous,
                            found: index,
                            line: line.number,
                        });
                    }
                }
                last_index.insert(spec.name.clone(), index);
                Some(index)
            } else {
                if staged.has_block(&spec.name, None) {
                    return Err(Error::syntax(
                        self.path,
                        line.number,
                        format!("block {} repeated", spec.name.to_ascii_uppercase()),
                    ));
                }
                None
            };

            tracing::trace!(component = self.path, block = %spec.name, ?index, "reading block");
            let parser = BlockParser {
                spec,
                index,
                open_line: line.number,
                staged: &staged,
                tree: self.tree,
                options: self.options,
                path: self.path,
            };
            let (block, rest) = parser.parse(cursor.advance())?;
            staged.close(block, self.tree, &self.options.base_dir, self.path);
            cursor = rest;
        }

        staged.finish(self.tree, &self.options.base_dir, self.path);
        tracing::debug!(
            component = self.path,
            blocks = staged.blocks.len(),
            "parsed component"
        );
        Ok((staged, cursor))
    }
}

/// Reads one block body up to and including its END line
struct BlockParser<'s> {
    spec: &'s Arc<BlockSpec>,
    index: Option<i64>,
    open_line: usize,
    staged: &'s StagedComponent,
    tree: Option<(&'s ContextTree, NodeId)>,
    options: &'s CodecOptions,
    path: &'s str,
}

impl BlockParser<'_> {
    fn block_path(&self) -> String {
        match self.index {
            Some(index) => format!("{}/{} {}", self.path, self.spec.name, index),
            None => format!("{}/{}", self.path, self.spec.name),
        }
    }

    fn mismatch(&self, found: String, line: usize) -> Error {
        Error::BlockMismatch {
            path: self.block_path(),
            expected: self.spec.name.to_ascii_uppercase(),
            found,
            open_line: self.open_line,
            line,
        }
    }

    /// Checks an END line; anything else that ends the block is a mismatch
    fn close<'a>(&self, cursor: Cursor<'a>) -> Result<Option<Cursor<'a>>> {
        let Some(line) = cursor.peek() else {
            return Err(self.mismatch("end of file".to_string(), cursor.end_line()));
        };
        let tokens = line.tokens();
        if tokens[0].eq_ignore_ascii_case("begin") {
            let found = format!("BEGIN {}", tokens.get(1).map_or("", |t| &**t));
            return Err(self.mismatch(found, line.number));
        }
        if !tokens[0].eq_ignore_ascii_case("end") {
            return Ok(None);
        }
        match tokens.get(1) {
            Some(name) if !name.eq_ignore_ascii_case(&self.spec.name) => {
                Err(self.mismatch(format!("END {name}"), line.number))
            }
            _ => Ok(Some(cursor.advance())),
        }
    }

    /// Typed value of a configuration entry from the tokens following its selector
    fn entry(&self, spec: &ParamSpec, rest: &[Cow<'_, str>], line: usize) -> Result<Param> {
        let path = format!("{}/{}", self.block_path(), spec.name);
        let (param, used) = match &spec.ty {
            ParamType::Keyword => (Param::Scalar(Scalar::Keyword(true)), 0),
            ParamType::String => {
                if rest.is_empty() {
                    return Err(Error::mismatch(&path, "string", "end of line", Some(line)));
                }
                let joined = rest.iter().map(|t| &**t).collect::<Vec<&str>>().join(" ");
                (Param::Scalar(Scalar::String(joined)), rest.len())
            }
            ParamType::Path => {
                let inout = rest.first().and_then(|t| InOut::from_token(t));
                let at = usize::from(inout.is_some());
                let file = rest
                    .get(at)
                    .ok_or_else(|| Error::mismatch(&path, "path", "end of line", Some(line)))?;
                let scalar = Scalar::Path {
                    inout,
                    path: PathBuf::from(&**file),
                };
                (Param::Scalar(scalar), at + 1)
            }
            ParamType::Integer | ParamType::Double => {
                let kind = spec.ty.scalar_kind().unwrap_or(ScalarKind::Double);
                let token = rest
                    .first()
                    .ok_or_else(|| Error::mismatch(&path, kind.name(), "end of line", Some(line)))?;
                let scalar = Scalar::from_token(kind, token).ok_or_else(|| {
                    Error::mismatch(&path, kind.name(), format!("'{token}'"), Some(line))
                })?;
                (Param::Scalar(scalar), 1)
            }
            ParamType::Record { fields } => {
                let (record, used) = fields.parse(rest, &path, Some(line))?;
                (Param::Record(record), used)
            }
            ParamType::Keystring { variants } => {
                let (keystring, used) = variants.parse(rest, &path, Some(line))?;
                (Param::Keystring(keystring), used)
            }
            ParamType::Array(_) | ParamType::List(_) => {
                return Err(Error::syntax(&path, line, "data parameter read as an entry"));
            }
        };
        if used < rest.len() {
            return Err(Error::syntax(
                &path,
                line,
                format!("unexpected '{}' after {}", rest[used], spec.name.to_ascii_uppercase()),
            ));
        }
        Ok(param)
    }
}

impl<'a> Parser<'a> for BlockParser<'_> {
    type Output = StagedBlock;

    fn parse(&self, mut cursor: Cursor<'a>) -> Result<(Self::Output, Cursor<'a>)> {
        let mut block = StagedBlock::new(self.spec.clone(), self.index);
        let block_path = self.block_path();

        if let Some(list) = self.spec.list() {
            let scope = self.staged.scope(Some(&block), self.tree, &self.options.base_dir);
            let ParamType::List(def) = &list.ty else {
                return Err(Error::syntax(&block_path, self.open_line, "list block without a list"));
            };
            let path = format!("{block_path}/{}", list.name);
            let parser = ListParser {
                def,
                lookup: &scope,
                options: self.options,
                path: &path,
            };
            let (store, rest) = parser.parse(cursor)?;
            block.set(&list.name, Param::List(store));
            cursor = rest;
            return match self.close(cursor)? {
                Some(rest) => Ok((block, rest)),
                None => Err(self.mismatch("data".to_string(), cursor.end_line())),
            };
        }

        loop {
            if let Some(rest) = self.close(cursor)? {
                return Ok((block, rest));
            }
            let Some(line) = cursor.peek() else {
                return Err(self.mismatch("end of file".to_string(), cursor.end_line()));
            };
            let tokens = line.tokens();
            let Some((spec, selector)) = self.spec.select(&tokens[0]) else {
                if self.spec.open {
                    tracing::warn!(
                        block = %block_path,
                        keyword = %tokens[0],
                        line = line.number,
                        "skipping unknown keyword"
                    );
                    cursor = cursor.advance();
                    continue;
                }
                return Err(Error::UnknownParameter {
                    path: block_path,
                    name: tokens[0].to_string(),
                    line: Some(line.number),
                });
            };
            if block.is_set(&spec.name) {
                tracing::debug!(
                    block = %block_path,
                    param = %spec.name,
                    line = line.number,
                    "parameter repeated, keeping the last value"
                );
            }

            if let ParamType::Array(def) = &spec.ty {
                let path = format!("{block_path}/{}", spec.name);
                let store = {
                    let scope = self.staged.scope(Some(&block), self.tree, &self.options.base_dir);
                    let parser = ArrayParser {
                        def,
                        lookup: &scope,
                        options: self.options,
                        path: &path,
                    };
                    let (store, rest) = parser.parse(cursor)?;
                    cursor = rest;
                    store
                };
                block.set(&spec.name, Param::Array(store));
                continue;
            }

            let rest = match selector {
                Selector::Name => &tokens[1..],
                Selector::Value => &tokens[..],
            };
            let param = self.entry(spec, rest, line.number)?;
            block.set(&spec.name, param);
            cursor = cursor.advance();
        }
    }
}
