//! Array parsing
//!
//! `NAME [LAYERED]` followed by one control line (or one per layer) and,
//! for internal storage, exactly as many values as the resolved shape holds.

use std::borrow::Cow;
use std::path::PathBuf;

use super::lines::count_tokens;
use super::{Cursor, Parser};
use crate::error::{Error, Result};
use crate::options::{CodecOptions, Load};
use crate::types::{
    ArrayDef, ArrayStore, Control, How, Lookup, Part, Source, TextSpan, parse_double, parse_int,
};

pub(crate) struct ArrayParser<'s> {
    pub def: &'s ArrayDef,
    pub lookup: &'s dyn Lookup,
    pub options: &'s CodecOptions,
    pub path: &'s str,
}

impl ArrayParser<'_> {
    /// Control line options following the storage keyword; returns the
    /// position of the first token that is not an option
    fn options(
        &self,
        tokens: &[Cow<'_, str>],
        mut at: usize,
        control: &mut Control,
        line: usize,
    ) -> Result<usize> {
        while let Some(token) = tokens.get(at) {
            match token.to_ascii_uppercase().as_str() {
                "FACTOR" => {
                    let value = tokens.get(at + 1).and_then(|t| parse_double(t)).ok_or_else(|| {
                        let found = describe(tokens.get(at + 1));
                        Error::mismatch(self.path, "FACTOR value", found, Some(line))
                    })?;
                    control.factor = Some(value);
                    at += 2;
                }
                "IPRN" => {
                    let value = tokens.get(at + 1).and_then(|t| parse_int(t)).ok_or_else(|| {
                        let found = describe(tokens.get(at + 1));
                        Error::mismatch(self.path, "IPRN value", found, Some(line))
                    })?;
                    control.iprn = Some(value);
                    at += 2;
                }
                "BINARY" | "(BINARY)" => {
                    let message = "binary array files are not supported";
                    return Err(Error::syntax(self.path, line, message));
                }
                _ => break,
            }
        }
        Ok(at)
    }

    /// One control line and its payload
    fn part<'a>(
        &self,
        inline: Option<(usize, Vec<Cow<'a, str>>)>,
        mut cursor: Cursor<'a>,
        len: usize,
    ) -> Result<(Part, Cursor<'a>)> {
        let (number, tokens) = match inline {
            Some(inline) => inline,
            None => {
                let line = cursor.peek().ok_or_else(|| {
                    Error::syntax(self.path, cursor.end_line(), "expected an array control line")
                })?;
                cursor = cursor.advance();
                (line.number, line.tokens())
            }
        };
        let how = How::from_keyword(&tokens[0]).ok_or_else(|| Error::UnknownVariant {
            path: self.path.to_string(),
            token: tokens[0].to_string(),
            line: Some(number),
        })?;
        let mut control = Control::new(how);

        match how {
            How::Constant => {
                let value = tokens.get(1).and_then(|t| self.def.kind.parse(t)).ok_or_else(|| {
                    let found = describe(tokens.get(1));
                    Error::mismatch(self.path, self.def.kind.name(), found, Some(number))
                })?;
                let at = self.options(&tokens, 2, &mut control, number)?;
                self.no_more(&tokens, at, number)?;
                let mut part = Part::constant(value);
                part.control = control;
                Ok((part, cursor))
            }
            How::External => {
                let file = tokens.get(1).ok_or_else(|| {
                    Error::mismatch(self.path, "external file name", "end of line", Some(number))
                })?;
                let file = PathBuf::from(&**file);
                let at = self.options(&tokens, 2, &mut control, number)?;
                self.no_more(&tokens, at, number)?;
                let resolved = self.lookup.resolve_file(&file);
                control.path = Some(file);
                Ok((Part::deferred(control, Source::File(resolved)), cursor))
            }
            How::Internal => {
                let at = self.options(&tokens, 1, &mut control, number)?;
                let mut span = TextSpan::new();
                let mut count = 0;
                if at < tokens.len() {
                    let first = tokens[at..].join(" ");
                    count += tokens.len() - at;
                    span.push(number, &first);
                }
                let mut last = number;
                while count < len {
                    let short = |line: usize| {
                        let message = format!("expected {len} values, found {count}");
                        Error::syntax(self.path, line, message)
                    };
                    let line = cursor.peek().ok_or_else(|| short(cursor.end_line()))?;
                    let numeric = line
                        .text
                        .split_whitespace()
                        .next()
                        .and_then(|t| self.def.kind.parse(t))
                        .is_some();
                    if !numeric {
                        return Err(short(line.number));
                    }
                    count += count_tokens(line.text);
                    span.push(line.number, line.text);
                    last = line.number;
                    cursor = cursor.advance();
                }
                if count > len {
                    return Err(Error::syntax(
                        self.path,
                        last,
                        format!("expected {len} values, found {count}"),
                    ));
                }
                Ok((Part::deferred(control, Source::Text(span)), cursor))
            }
        }
    }

    fn no_more(&self, tokens: &[Cow<'_, str>], at: usize, line: usize) -> Result<()> {
        match tokens.get(at) {
            Some(token) => {
                let message = format!("unexpected '{token}' on control line");
                Err(Error::syntax(self.path, line, message))
            }
            None => Ok(()),
        }
    }
}

impl<'a> Parser<'a> for ArrayParser<'_> {
    type Output = ArrayStore;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Output, Cursor<'a>)> {
        let line = cursor
            .peek()
            .ok_or_else(|| Error::syntax(self.path, cursor.end_line(), "expected an array"))?;
        let mut cursor = cursor.advance();
        let tokens = line.tokens();
        let mut at = 1;
        let layered = tokens
            .get(1)
            .is_some_and(|t| t.eq_ignore_ascii_case("layered"));
        if layered {
            if !self.def.layered {
                return Err(Error::syntax(self.path, line.number, "array does not accept LAYERED"));
            }
            at += 1;
        }
        let shape = self.def.resolve_shape(self.lookup, self.path)?;
        let inline = (at < tokens.len()).then(|| (line.number, tokens[at..].to_vec()));

        let parts = if layered {
            if inline.is_some() {
                return Err(Error::syntax(
                    self.path,
                    line.number,
                    "LAYERED arrays take their control lines on following lines",
                ));
            }
            let layers = shape.first().copied().unwrap_or(0);
            let len = shape.iter().skip(1).product();
            let mut parts = Vec::with_capacity(layers);
            for _ in 0..layers {
                let (part, rest) = self.part(None, cursor, len)?;
                parts.push(part);
                cursor = rest;
            }
            parts
        } else {
            let (part, rest) = self.part(inline, cursor, shape.iter().product())?;
            cursor = rest;
            vec![part]
        };

        let store = ArrayStore::from_parts(self.def.kind, shape, layered, parts, self.path);
        if self.options.arrays == Load::Eager {
            store.load()?;
        }
        Ok((store, cursor))
    }
}

fn describe(token: Option<&Cow<'_, str>>) -> String {
    match token {
        Some(token) => format!("'{token}'"),
        None => "end of line".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lines::split_lines;
    use crate::types::{Dim, NumKind, Scalar};
    use std::io::Write;
    use std::path::Path;

    struct Dims(Vec<(&'static str, i64)>, PathBuf);

    impl Lookup for Dims {
        fn scalar(&self, name: &str) -> Option<Scalar> {
            self.0
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| Scalar::Integer(*v))
        }

        fn resolve_file(&self, file: &Path) -> PathBuf {
            self.1.join(file)
        }
    }

    fn def(layered: bool) -> ArrayDef {
        ArrayDef {
            kind: NumKind::Double,
            shape: vec![Dim::from("nlay"), Dim::from("ncol")],
            layered,
        }
    }

    fn read(
        def: &ArrayDef,
        input: &str,
        options: &CodecOptions,
        base: &Path,
    ) -> Result<ArrayStore> {
        let lines = split_lines(input);
        let lookup = Dims(vec![("nlay", 2), ("ncol", 3)], base.to_path_buf());
        let parser = ArrayParser {
            def,
            lookup: &lookup,
            options,
            path: "dis/griddata/a",
        };
        parser.parse(Cursor::new(&lines)).map(|(store, _)| store)
    }

    #[test]
    fn test_inline_internal() {
        let store = read(
            &def(false),
            "A INTERNAL 1.0 2.0 3.0\n 4 5 6\n",
            &CodecOptions::default(),
            Path::new("."),
        )
        .unwrap();
        assert_eq!(store.how(), How::Internal);
        assert_eq!(store.raw_values().unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_layered_mixed_storage() {
        let store = read(
            &def(true),
            "A LAYERED\n CONSTANT 5.0\n INTERNAL FACTOR 2.0 IPRN 1\n 1 2 3\n",
            &CodecOptions::default(),
            Path::new("."),
        )
        .unwrap();
        assert!(store.is_layered());
        let value = store.value().unwrap();
        assert_eq!(value.iter().copied().collect::<Vec<_>>(), vec![5.0, 5.0, 5.0, 2.0, 4.0, 6.0]);
        let controls: Vec<&Control> = store.controls().collect();
        assert_eq!(controls[1].iprn, Some(1));
    }

    #[test]
    fn test_layered_rejected_when_undeclared() {
        let err = read(
            &def(false),
            "A LAYERED\n CONSTANT 1\n CONSTANT 2\n",
            &CodecOptions::default(),
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 1, .. }));
    }

    #[test]
    fn test_value_count_checked() {
        let err = read(
            &def(false),
            "A\n INTERNAL\n 1 2 3\n 4 5\n",
            &CodecOptions::default(),
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 4, .. }));

        let err = read(
            &def(false),
            "A\n INTERNAL\n 1 2 3 4\n 5 6 7\n",
            &CodecOptions::default(),
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 4, .. }));
    }

    #[test]
    fn test_lazy_conversion_reports_bad_value() {
        let store = read(
            &def(false),
            "A\n INTERNAL\n 1 2 x\n 4 5 6\n",
            &CodecOptions::default(),
            Path::new("."),
        )
        .unwrap();
        let err = store.raw_values().unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { line: Some(3), .. }));

        let err = read(
            &def(false),
            "A\n INTERNAL\n 1 2 x\n 4 5 6\n",
            &CodecOptions::default().eager(),
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { line: Some(3), .. }));
    }

    #[test]
    fn test_unknown_storage_keyword() {
        let err = read(
            &def(false),
            "A\n SOMEWHERE 1\n",
            &CodecOptions::default(),
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownVariant { ref token, line: Some(2), .. } if token == "SOMEWHERE"
        ));
    }

    #[test]
    fn test_external_lazy_and_eager() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("a.txt")).unwrap();
        writeln!(file, "1 2 3\n4 5 6").unwrap();

        let input = "A\n OPEN/CLOSE a.txt FACTOR 10.0\n";
        let store = read(&def(false), input, &CodecOptions::default(), dir.path()).unwrap();
        assert!(!store.is_loaded());
        assert_eq!(store.how(), How::External);
        assert_eq!(store.value().unwrap()[[1, 2]], 60.0);

        let missing = "A\n OPEN/CLOSE missing.txt\n";
        let lazy = read(&def(false), missing, &CodecOptions::default(), dir.path()).unwrap();
        assert!(matches!(lazy.load(), Err(Error::ExternalFileUnavailable { .. })));
        let eager = read(&def(false), missing, &CodecOptions::default().eager(), dir.path());
        assert!(matches!(eager, Err(Error::ExternalFileUnavailable { .. })));
    }
}
