// http-digest - HTTP Digest authentication engine
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::slice::Iter;

use smol_str::SmolStr;

pub const AUTHORIZATION: &str = "Authorization";
pub const WWW_AUTHENTICATE: &str = "WWW-Authenticate";
pub const VIA: &str = "Via";
pub const FORWARDED: &str = "Forwarded";
pub const X_FORWARDED_FOR: &str = "X-Forwarded-For";

/// Represents a single HTTP header field as a name/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: SmolStr,
    pub value: SmolStr,
}

/// Collection of HTTP headers preserving insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<Header>);

impl Headers {
    /// Creates an empty header collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header to the collection.
    pub fn push(&mut self, name: impl Into<SmolStr>, value: impl Into<SmolStr>) {
        self.0.push(Header {
            name: name.into(),
            value: value.into(),
        });
    }

    pub fn iter(&self) -> Iter<'_, Header> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Finds the first header whose name matches ignoring ASCII case.
    pub fn get(&self, name: &str) -> Option<&SmolStr> {
        self.0
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| &h.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

impl IntoIterator for Headers {
    type Item = Header;
    type IntoIter = std::vec::IntoIter<Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a Header;
    type IntoIter = Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let mut headers = Headers::new();
        headers.push("authorization", "Digest realm=\"a\"");
        assert_eq!(
            headers.get(AUTHORIZATION).map(|v| v.as_str()),
            Some("Digest realm=\"a\"")
        );
        assert!(headers.contains("AUTHORIZATION"));
        assert!(!headers.contains(VIA));
    }

    #[test]
    fn get_returns_first_and_iteration_keeps_order() {
        let mut headers = Headers::new();
        headers.push(VIA, "1.1 first");
        headers.push("via", "1.1 second");
        assert_eq!(headers.get(VIA).map(|v| v.as_str()), Some("1.1 first"));
        let all: Vec<_> = headers.iter().map(|h| h.value.as_str()).collect();
        assert_eq!(all, vec!["1.1 first", "1.1 second"]);
        assert_eq!(headers.len(), 2);
    }
}
