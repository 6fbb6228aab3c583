// http-digest - HTTP Digest authentication engine
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-request Digest state machine.
//!
//! 1. An authenticated connection context short-circuits to success.
//! 2. No `Authorization` header: issue a challenge (`stale` unset).
//! 3. Header without the `Digest ` scheme: fatal, 400.
//! 4. Parse and validate. On failure burn the presented nonce and
//!    re-challenge.
//! 5. Valid credentials: consume the nonce. Fresh nonce means success and
//!    the context remembers the principal; a used or expired one means a
//!    `stale=true` challenge.

use std::fmt;
use std::sync::Arc;

use smol_str::SmolStr;
use tracing::debug;

use crate::config::DigestConfig;
use crate::context::{is_proxied, AuthContext, ConnectionId, ContextRegistry, Principal};
use crate::credentials::{AsyncCredentialResolver, CredentialResolver};
use crate::error::{AuthError, ConfigError};
use crate::headers::{Headers, AUTHORIZATION, WWW_AUTHENTICATE};
use crate::nonce::NonceFactory;
use crate::parser::{parse_challenge, ChallengeParameters};
use crate::validator::{DigestAlgorithm, DigestValidator};

const SCHEME: &str = "Digest";

/// The parts of an inbound request the authenticator looks at.
#[derive(Debug, Clone, Copy)]
pub struct AuthRequest<'a> {
    pub method: &'a str,
    pub uri: &'a str,
    pub headers: &'a Headers,
    pub connection: ConnectionId,
}

impl<'a> AuthRequest<'a> {
    pub fn new(
        method: &'a str,
        uri: &'a str,
        headers: &'a Headers,
        connection: ConnectionId,
    ) -> Self {
        Self {
            method,
            uri,
            headers,
            connection,
        }
    }
}

/// A `WWW-Authenticate` challenge sent back with a 401.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    realm: SmolStr,
    nonce: SmolStr,
    stale: bool,
    algorithm: DigestAlgorithm,
}

impl Challenge {
    pub const STATUS: u16 = 401;

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn status_code(&self) -> u16 {
        Self::STATUS
    }

    /// Response headers carrying this challenge.
    pub fn to_headers(&self) -> Headers {
        let mut headers = Headers::new();
        headers.push(WWW_AUTHENTICATE, self.to_string());
        headers
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} realm=\"{}\",nonce=\"{}\"", SCHEME, self.realm, self.nonce)?;
        if self.stale {
            f.write_str(",stale=true")?;
        }
        if self.algorithm != DigestAlgorithm::Md5 {
            write!(f, ",algorithm={}", self.algorithm.as_str())?;
        }
        Ok(())
    }
}

/// Result of one authentication attempt that did not fail fatally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The request is authenticated.
    Success(Principal),
    /// Respond 401 with the challenge; the client should retry.
    Retry(Challenge),
}

impl AuthOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AuthOutcome::Success(_))
    }

    pub fn principal(&self) -> Option<&Principal> {
        match self {
            AuthOutcome::Success(principal) => Some(principal),
            AuthOutcome::Retry(_) => None,
        }
    }

    pub fn challenge(&self) -> Option<&Challenge> {
        match self {
            AuthOutcome::Success(_) => None,
            AuthOutcome::Retry(challenge) => Some(challenge),
        }
    }
}

/// Where a request stands once the header has been parsed.
enum Step {
    Done(AuthOutcome),
    Validate {
        context: Arc<AuthContext>,
        params: ChallengeParameters,
    },
}

/// Returns the text after `Digest `, matching the scheme ignoring ASCII case.
fn strip_scheme(value: &str) -> Option<&str> {
    let scheme = value.get(..SCHEME.len())?;
    let rest = value.get(SCHEME.len()..)?;
    if scheme.eq_ignore_ascii_case(SCHEME) {
        rest.strip_prefix(' ')
    } else {
        None
    }
}

/// Digest authenticator for one realm.
pub struct DigestAuthenticator<R> {
    realm: SmolStr,
    validator: DigestValidator,
    nonces: NonceFactory,
    resolver: R,
}

impl<R: CredentialResolver> DigestAuthenticator<R> {
    /// Builds an authenticator over a blocking resolver.
    ///
    /// Fails if the settings are invalid or the resolver cannot hand out
    /// plaintext passwords.
    pub fn new(config: DigestConfig, resolver: R) -> Result<Self, ConfigError> {
        let supported = resolver.supports_digest();
        Self::build(config, resolver, supported)
    }
}

impl<R: AsyncCredentialResolver> DigestAuthenticator<R> {
    /// Same as [`DigestAuthenticator::new`] for async resolvers.
    pub fn new_async(config: DigestConfig, resolver: R) -> Result<Self, ConfigError> {
        let supported = resolver.supports_digest();
        Self::build(config, resolver, supported)
    }
}

impl<R> DigestAuthenticator<R> {
    fn build(config: DigestConfig, resolver: R, supported: bool) -> Result<Self, ConfigError> {
        config.validate()?;
        if !supported {
            return Err(ConfigError::UnsupportedResolver);
        }
        Ok(Self {
            validator: DigestValidator::new(config.algorithm).with_verify_uri(config.verify_uri),
            nonces: NonceFactory::new(config.nonce_ttl).with_max_nonces(config.max_nonces),
            realm: config.realm,
            resolver,
        })
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn nonces(&self) -> &NonceFactory {
        &self.nonces
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Builds a challenge around a freshly minted nonce.
    pub fn challenge(&self, stale: bool) -> Challenge {
        let challenge = Challenge {
            realm: self.realm.clone(),
            nonce: self.nonces.create_nonce(),
            stale,
            algorithm: self.validator.algorithm(),
        };
        debug!(realm = %self.realm, stale, "issuing digest challenge");
        challenge
    }

    fn begin(
        &self,
        request: &AuthRequest<'_>,
        contexts: &ContextRegistry,
    ) -> Result<Step, AuthError> {
        let context = contexts.lookup_or_create(request.connection, is_proxied(request.headers));
        if let Some(principal) = context.principal() {
            return Ok(Step::Done(AuthOutcome::Success(principal)));
        }

        let Some(header) = request.headers.get(AUTHORIZATION) else {
            return Ok(Step::Done(AuthOutcome::Retry(self.challenge(false))));
        };

        let credentials = strip_scheme(header).ok_or(AuthError::InvalidScheme)?;
        let params = parse_challenge(credentials)?;
        Ok(Step::Validate { context, params })
    }

    fn finish(
        &self,
        context: &AuthContext,
        params: &ChallengeParameters,
        principal: Option<Principal>,
    ) -> AuthOutcome {
        let Some(principal) = principal else {
            // Burn the nonce so it cannot be reused for another guess.
            if let Some(nonce) = params.nonce() {
                self.nonces.use_nonce(nonce);
            }
            debug!("digest authentication failed");
            return AuthOutcome::Retry(self.challenge(false));
        };

        let fresh = params
            .nonce()
            .map_or(false, |nonce| self.nonces.use_nonce(nonce));
        if fresh {
            debug!(principal = %principal, "digest authentication succeeded");
            context.set_principal(principal.clone());
            AuthOutcome::Success(principal)
        } else {
            debug!(principal = %principal, "valid credentials with stale nonce");
            AuthOutcome::Retry(self.challenge(true))
        }
    }
}

impl<R: CredentialResolver> DigestAuthenticator<R> {
    /// Runs the state machine for one request.
    ///
    /// `Err` means the request must be rejected outright (see
    /// [`AuthError::status_code`]); ordinary failures come back as
    /// [`AuthOutcome::Retry`].
    pub fn authenticate(
        &self,
        request: &AuthRequest<'_>,
        contexts: &ContextRegistry,
    ) -> Result<AuthOutcome, AuthError> {
        let (context, params) = match self.begin(request, contexts)? {
            Step::Done(outcome) => return Ok(outcome),
            Step::Validate { context, params } => (context, params),
        };
        let principal = self
            .validator
            .validate(request.method, request.uri, &params, &self.resolver)?;
        Ok(self.finish(&context, &params, principal))
    }
}

impl<R: AsyncCredentialResolver> DigestAuthenticator<R> {
    /// Same as [`DigestAuthenticator::authenticate`] for resolvers that must
    /// not block the caller's thread.
    pub async fn authenticate_async(
        &self,
        request: &AuthRequest<'_>,
        contexts: &ContextRegistry,
    ) -> Result<AuthOutcome, AuthError> {
        let (context, params) = match self.begin(request, contexts)? {
            Step::Done(outcome) => return Ok(outcome),
            Step::Validate { context, params } => (context, params),
        };
        let principal = self
            .validator
            .validate_async(request.method, request.uri, &params, &self.resolver)
            .await?;
        Ok(self.finish(&context, &params, principal))
    }
}
