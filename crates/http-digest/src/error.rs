// http-digest - HTTP Digest authentication engine
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for the digest engine.
//!
//! Expected authentication failures (bad password, stale nonce, unknown
//! user) are never errors; they surface as a fresh challenge. The types here
//! cover the fatal cases only:
//! - [`ParseError`] / [`AuthError::InvalidScheme`] / [`AuthError::MissingParameter`]:
//!   the client sent a malformed `Authorization` header (400)
//! - [`AuthError::Resolver`]: the credential resolver cannot serve digest
//!   lookups (500)
//! - [`ConfigError`]: the authenticator was built with unusable settings

use std::fmt;

/// Failure while tokenizing the parameter list of a Digest header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Non-whitespace characters sit between `=` and the opening quote.
    UnexpectedCharacters { key: String, dropped: String },
    /// A quoted value is missing its closing, unescaped quote.
    UnterminatedQuote { key: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedCharacters { key, dropped } => write!(
                f,
                "Unexpected characters being dropped from header '{}' for {}",
                dropped, key
            ),
            ParseError::UnterminatedQuote { key } => {
                write!(f, "Unable to find closing quote for {}", key)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Fatal outcome of a single authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// `Authorization` header present but not using the Digest scheme.
    InvalidScheme,
    /// The Digest parameter list could not be tokenized.
    Malformed(ParseError),
    /// Username and realm were supplied but a parameter needed for the digest was not.
    MissingParameter(&'static str),
    /// The credential resolver is not suitable for digest authentication.
    Resolver(String),
}

impl AuthError {
    /// HTTP status used when the error is turned into a response.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::InvalidScheme
            | AuthError::Malformed(_)
            | AuthError::MissingParameter(_) => 400,
            AuthError::Resolver(_) => 500,
        }
    }

    /// `true` for client protocol violations, `false` for server-side misconfiguration.
    pub fn is_protocol_violation(&self) -> bool {
        self.status_code() == 400
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidScheme => write!(f, "Invalid 'Authorization' header."),
            AuthError::Malformed(err) => write!(f, "Malformed 'Authorization' header: {}", err),
            AuthError::MissingParameter(name) => {
                write!(f, "Digest parameter '{}' is required", name)
            }
            AuthError::Resolver(msg) => write!(
                f,
                "Credential resolver not suitable for Digest authentication: {}",
                msg
            ),
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AuthError::Malformed(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ParseError> for AuthError {
    fn from(err: ParseError) -> Self {
        AuthError::Malformed(err)
    }
}

/// Invalid authenticator settings, detected before any request is served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyRealm,
    InvalidRealm(String),
    ZeroNonceTtl,
    ZeroNonceCapacity,
    UnknownAlgorithm(String),
    UsersFile(String),
    /// The credential resolver cannot hand out plaintext passwords.
    UnsupportedResolver,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyRealm => write!(f, "realm must not be empty"),
            ConfigError::InvalidRealm(realm) => {
                write!(f, "realm '{}' contains quotes or control characters", realm)
            }
            ConfigError::ZeroNonceTtl => write!(f, "nonce lifetime must be greater than zero"),
            ConfigError::ZeroNonceCapacity => {
                write!(f, "nonce capacity must be greater than zero")
            }
            ConfigError::UnknownAlgorithm(name) => {
                write!(f, "unsupported digest algorithm '{}'", name)
            }
            ConfigError::UsersFile(msg) => write!(f, "unable to load users file: {}", msg),
            ConfigError::UnsupportedResolver => {
                write!(f, "credential resolver cannot supply digest passwords")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_errors_map_to_bad_request() {
        assert_eq!(AuthError::InvalidScheme.status_code(), 400);
        assert_eq!(AuthError::MissingParameter("nonce").status_code(), 400);
        let malformed: AuthError = ParseError::UnterminatedQuote {
            key: "realm".to_string(),
        }
        .into();
        assert_eq!(malformed.status_code(), 400);
        assert!(malformed.is_protocol_violation());
    }

    #[test]
    fn resolver_errors_map_to_server_error() {
        let err = AuthError::Resolver("no password support".to_string());
        assert_eq!(err.status_code(), 500);
        assert!(!err.is_protocol_violation());
    }

    #[test]
    fn parse_error_messages_name_the_key() {
        let err = ParseError::UnexpectedCharacters {
            key: "nonce".to_string(),
            dropped: "x".to_string(),
        };
        assert!(err.to_string().contains("'x' for nonce"));
    }
}
