// http-digest - HTTP Digest authentication engine
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tokenizer for the parameter list that follows `Digest ` in an
//! `Authorization` header.
//!
//! The grammar is a comma separated sequence of `key=value` pairs. Keys and
//! unquoted values are trimmed. A value is quoted when a `"` appears before
//! the next `,`; only whitespace may precede the opening quote, and the value
//! runs to the first quote not preceded by a backslash. Quoted values are
//! returned verbatim (escape sequences are kept as-is).
//!
//! Scanning stops quietly once no `=` remains, so trailing garbage without a
//! key is ignored rather than rejected.

use std::collections::btree_map;
use std::collections::BTreeMap;

use smol_str::SmolStr;

use crate::error::ParseError;

const EQUALS: char = '=';
const DELIMITER: char = ',';
const QUOTE: char = '"';
const ESCAPE: u8 = b'\\';

pub const REALM: &str = "realm";
pub const NONCE: &str = "nonce";
pub const USERNAME: &str = "username";
pub const URI: &str = "uri";
pub const RESPONSE: &str = "response";
pub const ALGORITHM: &str = "algorithm";

/// Read position over the raw header value.
///
/// All indices handed out are absolute byte offsets into `input`. Every
/// delimiter the parser searches for is ASCII, so offsets always land on
/// character boundaries.
struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn len(&self) -> usize {
        self.input.len()
    }

    /// Offset of the next `ch` at or after the cursor.
    fn peek(&self, ch: char) -> Option<usize> {
        self.peek_from(self.pos, ch)
    }

    fn peek_from(&self, from: usize, ch: char) -> Option<usize> {
        self.input
            .get(from..)
            .and_then(|rest| rest.find(ch))
            .map(|idx| from + idx)
    }

    /// Offset of the first quote after `open` that is not preceded by a backslash.
    fn peek_closing_quote(&self, open: usize) -> Option<usize> {
        let bytes = self.input.as_bytes();
        let mut from = open + 1;
        loop {
            let idx = self.peek_from(from, QUOTE)?;
            if bytes[idx - 1] != ESCAPE {
                return Some(idx);
            }
            from = idx + 1;
        }
    }

    fn slice_to(&self, end: usize) -> &'a str {
        &self.input[self.pos..end]
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.input[start..end]
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos.min(self.input.len())..]
    }

    fn advance_to(&mut self, pos: usize) {
        self.pos = pos.min(self.input.len());
    }

    /// Moves past the next delimiter, or to the end when there is none.
    fn skip_delimiter(&mut self) {
        match self.peek(DELIMITER) {
            Some(idx) => self.advance_to(idx + 1),
            None => self.advance_to(self.input.len()),
        }
    }
}

/// Single-pass iterator over the `(key, value)` pairs of a Digest header.
///
/// Yields borrowed slices of the input. After the first error the iterator
/// is exhausted.
pub struct ParamParser<'a> {
    cursor: Cursor<'a>,
    failed: bool,
}

impl<'a> ParamParser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            cursor: Cursor::new(input),
            failed: false,
        }
    }

    fn quoted_value(&mut self, key: &'a str, open: usize) -> Result<&'a str, ParseError> {
        let dropped = self.cursor.slice_to(open).trim();
        if !dropped.is_empty() {
            return Err(ParseError::UnexpectedCharacters {
                key: key.to_string(),
                dropped: dropped.to_string(),
            });
        }

        let close = self
            .cursor
            .peek_closing_quote(open)
            .ok_or_else(|| ParseError::UnterminatedQuote {
                key: key.to_string(),
            })?;
        let value = self.cursor.slice(open + 1, close);

        self.cursor.advance_to(close + 1);
        self.cursor.skip_delimiter();
        Ok(value)
    }

    fn unquoted_value(&mut self, delimiter: Option<usize>) -> &'a str {
        match delimiter {
            Some(idx) => {
                let value = self.cursor.slice_to(idx).trim();
                self.cursor.advance_to(idx + 1);
                value
            }
            None => {
                let value = self.cursor.rest().trim();
                self.cursor.advance_to(self.cursor.len());
                value
            }
        }
    }
}

impl<'a> Iterator for ParamParser<'a> {
    type Item = Result<(&'a str, &'a str), ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor.at_end() {
            return None;
        }

        // A key needs an '=' with at least one character after it.
        let equals = self.cursor.peek(EQUALS)?;
        if equals + 1 >= self.cursor.len() {
            self.cursor.advance_to(self.cursor.len());
            return None;
        }

        let key = self.cursor.slice_to(equals).trim();
        self.cursor.advance_to(equals + 1);

        let delimiter = self.cursor.peek(DELIMITER);
        let quote = self.cursor.peek(QUOTE);
        let open = match (quote, delimiter) {
            (Some(q), Some(d)) if q < d => Some(q),
            (Some(q), None) => Some(q),
            _ => None,
        };

        let value = match open {
            Some(open) => self.quoted_value(key, open),
            None => Ok(self.unquoted_value(delimiter)),
        };

        match value {
            Ok(value) => Some(Ok((key, value))),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

impl std::iter::FusedIterator for ParamParser<'_> {}

/// Parameters supplied by the client in one `Authorization` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChallengeParameters {
    params: BTreeMap<SmolStr, SmolStr>,
}

impl ChallengeParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a parameter, replacing any earlier value for the same key.
    pub fn insert(&mut self, key: impl Into<SmolStr>, value: impl Into<SmolStr>) {
        self.params.insert(key.into(), value.into());
    }

    /// Case-sensitive lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|v| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn realm(&self) -> Option<&str> {
        self.get(REALM)
    }

    pub fn nonce(&self) -> Option<&str> {
        self.get(NONCE)
    }

    pub fn username(&self) -> Option<&str> {
        self.get(USERNAME)
    }

    pub fn uri(&self) -> Option<&str> {
        self.get(URI)
    }

    pub fn response(&self) -> Option<&str> {
        self.get(RESPONSE)
    }

    pub fn algorithm(&self) -> Option<&str> {
        self.get(ALGORITHM)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, SmolStr, SmolStr> {
        self.params.iter()
    }
}

impl<K: Into<SmolStr>, V: Into<SmolStr>> FromIterator<(K, V)> for ChallengeParameters {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// Parses the text following `Digest ` into a parameter map.
pub fn parse_challenge(raw: &str) -> Result<ChallengeParameters, ParseError> {
    let mut params = ChallengeParameters::new();
    for pair in ParamParser::new(raw) {
        let (key, value) = pair?;
        params.insert(key, value);
    }
    Ok(params)
}
