//! Line splitting and tokenization

use std::borrow::Cow;

/// One non-blank input line with comments removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// 1-based line number in the source
    pub number: usize,
    pub text: &'a str,
}

impl<'a> Line<'a> {
    pub fn tokens(&self) -> Vec<Cow<'a, str>> {
        tokenize(self.text)
    }

    /// First token, lowercased
    pub fn keyword(&self) -> Option<String> {
        self.tokens().first().map(|t| t.to_ascii_lowercase())
    }
}

/// Split source text into meaningful lines
pub fn split_lines(source: &str) -> Vec<Line<'_>> {
    source
        .lines()
        .enumerate()
        .filter_map(|(i, raw)| {
            let text = strip_comment(raw).trim();
            if text.is_empty() {
                None
            } else {
                Some(Line { number: i + 1, text })
            }
        })
        .collect()
}

/// Remove a trailing `#` or `!` comment, and `//` comment lines
pub fn strip_comment(line: &str) -> &str {
    if line.trim_start().starts_with("//") {
        return "";
    }
    let mut quote = None;
    for (i, c) in line.char_indices() {
        match (quote, c) {
            (None, '\'' | '"') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '#' | '!') => return &line[..i],
            _ => {}
        }
    }
    line
}

/// Whitespace tokenizer honoring single and double quotes
pub fn tokenize(text: &str) -> Vec<Cow<'_, str>> {
    let mut tokens = Vec::new();
    let mut rest = text.trim_start();
    while !rest.is_empty() {
        let first = rest.as_bytes()[0];
        if first == b'\'' || first == b'"' {
            let body = &rest[1..];
            match body.find(first as char) {
                Some(end) => {
                    tokens.push(Cow::Borrowed(&body[..end]));
                    rest = &body[end + 1..];
                }
                None => {
                    tokens.push(Cow::Borrowed(body));
                    rest = "";
                }
            }
        } else {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            tokens.push(Cow::Borrowed(&rest[..end]));
            rest = &rest[end..];
        }
        rest = rest.trim_start();
    }
    tokens
}

/// Number of tokens on a data line, without allocating
pub fn count_tokens(text: &str) -> usize {
    if text.contains(['\'', '"']) {
        tokenize(text).len()
    } else {
        text.split_whitespace().count()
    }
}
