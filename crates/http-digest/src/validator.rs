// http-digest - HTTP Digest authentication engine
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Digest response verification (RFC 2069 style, no qop).
//!
//! ```text
//! HA1      = H(username ":" realm ":" password)
//! HA2      = H(method ":" uri)
//! response = H(HA1 ":" nonce ":" HA2)
//! ```

use sha2::{Digest, Sha256, Sha512};
use tracing::{debug, warn};

use crate::context::Principal;
use crate::credentials::{AsyncCredentialResolver, CredentialResolver, Lookup};
use crate::error::{AuthError, ConfigError};
use crate::parser::{ChallengeParameters, NONCE, RESPONSE, URI};

/// Hash function used for the digest triad. MD5 is what RFC 2617 clients speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    #[default]
    Md5,
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "MD5",
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha512 => "SHA-512",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "MD5" => Some(DigestAlgorithm::Md5),
            "SHA-256" => Some(DigestAlgorithm::Sha256),
            "SHA-512" => Some(DigestAlgorithm::Sha512),
            _ => None,
        }
    }

    /// Lowercase hex digest of `data`.
    pub fn hash(&self, data: &[u8]) -> String {
        match self {
            DigestAlgorithm::Md5 => format!("{:x}", md5::compute(data)),
            DigestAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
            DigestAlgorithm::Sha512 => hex::encode(Sha512::digest(data)),
        }
    }
}

impl std::str::FromStr for DigestAlgorithm {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ConfigError::UnknownAlgorithm(s.to_string()))
    }
}

/// Computes the response a client holding `password` should have sent.
pub fn expected_response(
    algorithm: DigestAlgorithm,
    method: &str,
    uri: &str,
    nonce: &str,
    username: &str,
    realm: &str,
    password: &str,
) -> String {
    let ha1 = algorithm.hash(format!("{}:{}:{}", username, realm, password).as_bytes());
    let ha2 = algorithm.hash(format!("{}:{}", method, uri).as_bytes());
    algorithm.hash(format!("{}:{}:{}", ha1, nonce, ha2).as_bytes())
}

/// Compares `expected` against `actual` in time that depends only on the
/// length of `expected`.
pub fn constant_time_eq(expected: &[u8], actual: &[u8]) -> bool {
    let mut diff = expected.len() ^ actual.len();
    for (i, x) in expected.iter().enumerate() {
        let y = actual.get(i).copied().unwrap_or(0);
        diff |= usize::from(x ^ y);
    }
    diff == 0
}

/// Parameters that passed the pre-lookup checks.
struct Claim<'p> {
    username: &'p str,
    realm: &'p str,
    nonce: &'p str,
    uri: &'p str,
    response: &'p str,
}

/// Verifies digest responses against passwords from a credential resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestValidator {
    algorithm: DigestAlgorithm,
    verify_uri: bool,
}

impl DigestValidator {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self {
            algorithm,
            verify_uri: false,
        }
    }

    /// Require the `uri` parameter to equal the request target.
    pub fn with_verify_uri(mut self, verify_uri: bool) -> Self {
        self.verify_uri = verify_uri;
        self
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Checks that run before any credential lookup.
    ///
    /// `Ok(None)` fails the attempt closed without consulting the resolver.
    fn claim<'p>(
        &self,
        target: &str,
        params: &'p ChallengeParameters,
    ) -> Result<Option<Claim<'p>>, AuthError> {
        let (Some(realm), Some(username)) = (params.realm(), params.username()) else {
            debug!("digest realm or username missing");
            return Ok(None);
        };
        if realm.is_empty() || username.is_empty() {
            debug!("digest realm or username empty");
            return Ok(None);
        }

        let nonce = params.nonce().ok_or(AuthError::MissingParameter(NONCE))?;
        let uri = params.uri().ok_or(AuthError::MissingParameter(URI))?;
        let response = params
            .response()
            .ok_or(AuthError::MissingParameter(RESPONSE))?;

        if let Some(alg) = params.algorithm() {
            if DigestAlgorithm::parse(alg) != Some(self.algorithm) {
                debug!(algorithm = alg, "digest algorithm mismatch");
                return Ok(None);
            }
        }

        if self.verify_uri && uri != target {
            debug!("digest uri mismatch");
            return Ok(None);
        }

        Ok(Some(Claim {
            username,
            realm,
            nonce,
            uri,
            response,
        }))
    }

    fn check(
        &self,
        method: &str,
        claim: &Claim<'_>,
        lookup: Lookup,
    ) -> Result<Option<Principal>, AuthError> {
        let password = match lookup {
            Lookup::Resolved(password) => password,
            Lookup::NotFound => {
                debug!(username = claim.username, realm = claim.realm, "unknown user");
                return Ok(None);
            }
            Lookup::Unsupported(msg) => {
                warn!(error = %msg, "credential resolver cannot serve digest authentication");
                return Err(AuthError::Resolver(msg));
            }
        };

        let expected = expected_response(
            self.algorithm,
            method,
            claim.uri,
            claim.nonce,
            claim.username,
            claim.realm,
            &password,
        );

        if constant_time_eq(expected.as_bytes(), claim.response.as_bytes()) {
            Ok(Some(Principal::new(claim.username, claim.realm)))
        } else {
            debug!(username = claim.username, "digest response mismatch");
            Ok(None)
        }
    }

    /// Verifies the client's response for a request with `method` and `target`.
    ///
    /// Returns `Ok(None)` for any ordinary authentication failure and `Err`
    /// only for protocol violations or an unusable resolver.
    pub fn validate<R: CredentialResolver + ?Sized>(
        &self,
        method: &str,
        target: &str,
        params: &ChallengeParameters,
        resolver: &R,
    ) -> Result<Option<Principal>, AuthError> {
        let Some(claim) = self.claim(target, params)? else {
            return Ok(None);
        };
        let lookup = resolver.resolve(claim.realm, claim.username);
        self.check(method, &claim, lookup)
    }

    pub async fn validate_async<R: AsyncCredentialResolver + ?Sized>(
        &self,
        method: &str,
        target: &str,
        params: &ChallengeParameters,
        resolver: &R,
    ) -> Result<Option<Principal>, AuthError> {
        let Some(claim) = self.claim(target, params)? else {
            return Ok(None);
        };
        let lookup = resolver.resolve(claim.realm, claim.username).await;
        self.check(method, &claim, lookup)
    }
}
