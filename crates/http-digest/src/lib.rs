// http-digest - HTTP Digest authentication engine
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Server-side HTTP Digest authentication (RFC 2069 / RFC 2617 without qop).
//!
//! This crate implements the protocol engine that sits between an HTTP
//! transport and a credential store:
//! - **Challenges**: `WWW-Authenticate: Digest realm="..",nonce=".."[,stale=true]`
//! - **Nonce Management**: single-use nonces with expiry and a bounded ledger
//! - **Header Parsing**: the quoted/escaped `key=value` list of `Authorization`
//! - **Verification**: HA1/HA2 digest triad with constant-time comparison
//! - **Connection Caching**: a connection authenticates once; proxied
//!   requests always authenticate on their own
//! - **Pluggable Credentials**: sync or async resolvers
//!
//! # Examples
//!
//! ```
//! use http_digest::{
//!     AuthOutcome, AuthRequest, ConnectionId, ContextRegistry, DigestAuthenticator,
//!     DigestConfig, Headers, MemoryCredentialResolver,
//! };
//!
//! let resolver = MemoryCredentialResolver::new().with_user("mgmt", "alice", "secret");
//! let auth = DigestAuthenticator::new(DigestConfig::new("mgmt"), resolver)?;
//! let contexts = ContextRegistry::new();
//!
//! let headers = Headers::new();
//! let request = AuthRequest::new("GET", "/management", &headers, ConnectionId(1));
//! match auth.authenticate(&request, &contexts)? {
//!     AuthOutcome::Retry(challenge) => assert_eq!(challenge.status_code(), 401),
//!     AuthOutcome::Success(_) => unreachable!("no credentials were sent"),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod authenticator;
pub mod config;
pub mod context;
pub mod credentials;
pub mod error;
pub mod headers;
pub mod nonce;
pub mod parser;
pub mod validator;

pub use authenticator::{AuthOutcome, AuthRequest, Challenge, DigestAuthenticator};
pub use config::DigestConfig;
pub use context::{is_proxied, AuthContext, ConnectionId, ContextRegistry, Principal};
pub use credentials::{
    AsyncCredentialResolver, AsyncToSyncResolver, CredentialResolver, Lookup,
    MemoryCredentialResolver, SyncToAsyncResolver,
};
pub use error::{AuthError, ConfigError, ParseError};
pub use headers::{Header, Headers};
pub use nonce::NonceFactory;
pub use parser::{parse_challenge, ChallengeParameters, ParamParser};
pub use validator::{expected_response, DigestAlgorithm, DigestValidator};
