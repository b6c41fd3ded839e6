//! Records and keystrings
//!
//! A record is a fixed product of named scalar fields read from consecutive
//! tokens. A keystring is a union of records selected by a leading keyword.

use std::borrow::Cow;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::scalar::{InOut, Scalar, ScalarKind};
use crate::error::{Error, Result};

/// One field of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: ScalarKind,
    /// The field's name precedes its value in the text
    #[serde(default)]
    pub tagged: bool,
    #[serde(default)]
    pub optional: bool,
}

impl FieldDef {
    pub fn new(name: &str, kind: ScalarKind) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            kind,
            tagged: false,
            optional: false,
        }
    }

    pub fn keyword(name: &str) -> Self {
        Self::new(name, ScalarKind::Keyword)
    }

    pub fn tagged(mut self) -> Self {
        self.tagged = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Ordered field definitions of a record
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordDef {
    pub fields: Vec<FieldDef>,
}

impl RecordDef {
    pub fn new(fields: Vec<FieldDef>) -> Self {
        Self { fields }
    }

    /// Read a record from the front of `tokens`, returning it and the number
    /// of tokens consumed
    pub fn parse(
        &self,
        tokens: &[Cow<'_, str>],
        path: &str,
        line: Option<usize>,
    ) -> Result<(Record, usize)> {
        let mut record = Record::default();
        let mut at = 0;
        for field in &self.fields {
            let field_path = format!("{path}/{}", field.name);
            let current = tokens.get(at).map(|t| t.as_ref());
            let names_field = current.is_some_and(|t| t.eq_ignore_ascii_case(&field.name));

            if field.kind == ScalarKind::Keyword {
                if names_field {
                    record.insert(&field.name, Scalar::Keyword(true));
                    at += 1;
                } else if field.optional {
                    record.insert(&field.name, Scalar::Keyword(false));
                } else {
                    return Err(Error::mismatch(
                        &field_path,
                        format!("keyword {}", field.name.to_ascii_uppercase()),
                        describe(current),
                        line,
                    ));
                }
                continue;
            }

            if field.tagged {
                if names_field {
                    at += 1;
                } else if field.optional {
                    continue;
                } else {
                    return Err(Error::mismatch(
                        &field_path,
                        format!("tag {}", field.name.to_ascii_uppercase()),
                        describe(current),
                        line,
                    ));
                }
            }

            let mut inout = None;
            if field.kind == ScalarKind::Path {
                inout = tokens.get(at).and_then(|t| InOut::from_token(t));
                if inout.is_some() {
                    at += 1;
                }
            }

            let Some(token) = tokens.get(at) else {
                if field.optional {
                    continue;
                }
                return Err(Error::mismatch(&field_path, field.kind.name(), "end of line", line));
            };
            let value = Scalar::from_token(field.kind, token).ok_or_else(|| {
                Error::mismatch(&field_path, field.kind.name(), format!("'{token}'"), line)
            })?;
            let value = match value {
                Scalar::Path { path, .. } => Scalar::Path { inout, path },
                other => other,
            };
            record.insert(&field.name, value);
            at += 1;
        }
        Ok((record, at))
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Check a record built in memory, widening integers in real fields
    pub fn admit(&self, record: Record, path: &str) -> Result<Record> {
        if let Some((name, _)) = record.iter().find(|(name, _)| self.field(name).is_none()) {
            return Err(Error::UnknownParameter {
                path: path.to_string(),
                name: name.to_string(),
                line: None,
            });
        }
        let mut admitted = Record::new();
        for field in &self.fields {
            let field_path = format!("{path}/{}", field.name);
            match record.get(&field.name) {
                Some(Scalar::Integer(i)) if field.kind == ScalarKind::Double => {
                    admitted.insert(&field.name, Scalar::Double(*i as f64))
                }
                Some(value) if value.kind() == field.kind => {
                    admitted.insert(&field.name, value.clone())
                }
                Some(value) => {
                    let found = value.kind().name();
                    return Err(Error::mismatch(&field_path, field.kind.name(), found, None));
                }
                None if field.optional && field.kind == ScalarKind::Keyword => {
                    admitted.insert(&field.name, Scalar::Keyword(false))
                }
                None if field.optional => {}
                None => {
                    return Err(Error::mismatch(&field_path, field.kind.name(), "nothing", None));
                }
            }
        }
        Ok(admitted)
    }
}

fn describe(token: Option<&str>) -> String {
    match token {
        Some(token) => format!("'{token}'"),
        None => "end of line".to_string(),
    }
}

/// Field values of a parsed record, in definition order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: IndexMap<String, Scalar>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<Scalar>) -> Self {
        self.insert(name, value.into());
        self
    }

    pub fn insert(&mut self, name: &str, value: Scalar) {
        self.fields.insert(name.to_ascii_lowercase(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.fields.get(&name.to_ascii_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Text tokens for this record under `def`
    pub fn to_tokens(&self, def: &RecordDef) -> Vec<String> {
        let mut tokens = Vec::new();
        for field in &def.fields {
            let Some(value) = self.get(&field.name) else {
                continue;
            };
            match value {
                Scalar::Keyword(true) => tokens.push(field.name.to_ascii_uppercase()),
                Scalar::Keyword(false) => {}
                value => {
                    if field.tagged {
                        tokens.push(field.name.to_ascii_uppercase());
                    }
                    tokens.push(value.to_token());
                }
            }
        }
        tokens
    }
}

/// Record variants of a keystring, keyed by their selecting keyword
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeystringDef {
    pub variants: IndexMap<String, RecordDef>,
}

impl KeystringDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variant(mut self, keyword: &str, fields: Vec<FieldDef>) -> Self {
        self.variants
            .insert(keyword.to_ascii_lowercase(), RecordDef::new(fields));
        self
    }

    pub fn get(&self, token: &str) -> Option<&RecordDef> {
        self.variants.get(&token.to_ascii_lowercase())
    }

    /// Check a keystring built in memory: its variant, then that variant's fields
    pub fn admit(
        &self,
        keystring: Keystring,
        path: &str,
        line: Option<usize>,
    ) -> Result<Keystring> {
        let Some(def) = self.get(&keystring.variant) else {
            return Err(Error::UnknownVariant {
                path: path.to_string(),
                token: keystring.variant,
                line,
            });
        };
        let record = def.admit(keystring.record, &format!("{path}/{}", keystring.variant))?;
        Ok(Keystring::new(&keystring.variant, record))
    }

    /// Read a keystring whose selecting keyword is `tokens[0]`
    pub fn parse(
        &self,
        tokens: &[Cow<'_, str>],
        path: &str,
        line: Option<usize>,
    ) -> Result<(Keystring, usize)> {
        let Some(token) = tokens.first() else {
            return Err(Error::mismatch(path, "keystring variant", "end of line", line));
        };
        let variant = token.to_ascii_lowercase();
        let def = self.variants.get(&variant).ok_or_else(|| Error::UnknownVariant {
            path: path.to_string(),
            token: token.to_string(),
            line,
        })?;
        let (record, used) = def.parse(&tokens[1..], &format!("{path}/{variant}"), line)?;
        Ok((Keystring { variant, record }, used + 1))
    }
}

/// A selected keystring variant and its fields
#[derive(Debug, Clone, PartialEq)]
pub struct Keystring {
    pub variant: String,
    pub record: Record,
}

impl Keystring {
    pub fn new(variant: &str, record: Record) -> Self {
        Self {
            variant: variant.to_ascii_lowercase(),
            record,
        }
    }

    pub fn to_tokens(&self, def: &KeystringDef) -> Vec<String> {
        let mut tokens = vec![self.variant.to_ascii_uppercase()];
        if let Some(record_def) = def.get(&self.variant) {
            tokens.extend(self.record.to_tokens(record_def));
        }
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lines::tokenize;

    fn budget_def() -> RecordDef {
        RecordDef::new(vec![
            FieldDef::keyword("budget"),
            FieldDef::new("budgetfile", ScalarKind::Path),
        ])
    }

    fn ocsetting() -> KeystringDef {
        KeystringDef::new()
            .variant("all", vec![])
            .variant("first", vec![])
            .variant("frequency", vec![FieldDef::new("frequency", ScalarKind::Integer)])
    }

    #[test]
    fn test_record_with_inout_path() {
        let tokens = tokenize("BUDGET FILEOUT model.cbc");
        let (record, used) = budget_def().parse(&tokens, "oc/options/budget", Some(2)).unwrap();
        assert_eq!(used, 3);
        assert_eq!(record.get("budget"), Some(&Scalar::Keyword(true)));
        assert_eq!(
            record.get("budgetfile"),
            Some(&Scalar::Path {
                inout: Some(InOut::FileOut),
                path: "model.cbc".into()
            })
        );
        assert_eq!(
            record.to_tokens(&budget_def()),
            vec!["BUDGET", "FILEOUT model.cbc"]
        );
    }

    #[test]
    fn test_record_type_mismatch_names_field() {
        let def = RecordDef::new(vec![FieldDef::new("nstp", ScalarKind::Integer)]);
        let tokens = tokenize("abc");
        let err = def.parse(&tokens, "tdis/period", Some(7)).unwrap_err();
        match err {
            Error::TypeMismatch {
                path,
                expected,
                found,
                line,
            } => {
                assert_eq!(path, "tdis/period/nstp");
                assert_eq!(expected, "integer");
                assert_eq!(found, "'abc'");
                assert_eq!(line, Some(7));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_optional_tagged_field() {
        let def = RecordDef::new(vec![
            FieldDef::new("name", ScalarKind::String),
            FieldDef::new("scale", ScalarKind::Double).tagged().optional(),
        ]);
        let (record, used) = def.parse(&tokenize("a SCALE 2.5"), "p", None).unwrap();
        assert_eq!(used, 3);
        assert_eq!(record.get("scale"), Some(&Scalar::Double(2.5)));

        let (record, used) = def.parse(&tokenize("a"), "p", None).unwrap();
        assert_eq!(used, 1);
        assert_eq!(record.get("scale"), None);
    }

    #[test]
    fn test_keystring_selects_variant() {
        let (ks, used) = ocsetting()
            .parse(&tokenize("FREQUENCY 5"), "oc/period/ocsetting", Some(4))
            .unwrap();
        assert_eq!(used, 2);
        assert_eq!(ks.variant, "frequency");
        assert_eq!(ks.record.get("frequency"), Some(&Scalar::Integer(5)));
        assert_eq!(ks.to_tokens(&ocsetting()), vec!["FREQUENCY", "5"]);
    }

    #[test]
    fn test_keystring_unknown_variant() {
        let err = ocsetting()
            .parse(&tokenize("SOMETIMES"), "oc/period/ocsetting", Some(9))
            .unwrap_err();
        match err {
            Error::UnknownVariant { path, token, line } => {
                assert_eq!(path, "oc/period/ocsetting");
                assert_eq!(token, "SOMETIMES");
                assert_eq!(line, Some(9));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
