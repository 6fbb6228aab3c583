// http-digest - HTTP Digest authentication engine
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::time::Duration;

use smol_str::SmolStr;

use crate::error::ConfigError;
use crate::nonce::{DEFAULT_NONCE_TTL, MAX_NONCE_COUNT};
use crate::validator::DigestAlgorithm;

/// Authenticator settings.
#[derive(Debug, Clone)]
pub struct DigestConfig {
    /// Realm announced in every challenge (e.g. "ManagementRealm")
    pub realm: SmolStr,

    /// Digest hash; MD5 unless both sides agree on something else
    pub algorithm: DigestAlgorithm,

    /// How long an issued nonce stays usable
    pub nonce_ttl: Duration,

    /// Upper bound on outstanding nonces
    pub max_nonces: usize,

    /// Require the digest `uri` to equal the request target
    pub verify_uri: bool,
}

impl DigestConfig {
    pub fn new(realm: impl Into<SmolStr>) -> Self {
        Self {
            realm: realm.into(),
            ..Self::default()
        }
    }

    pub fn with_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_nonce_ttl(mut self, ttl: Duration) -> Self {
        self.nonce_ttl = ttl;
        self
    }

    pub fn with_max_nonces(mut self, max: usize) -> Self {
        self.max_nonces = max;
        self
    }

    pub fn with_verify_uri(mut self, verify_uri: bool) -> Self {
        self.verify_uri = verify_uri;
        self
    }

    /// Rejects settings that would produce broken challenges or a useless ledger.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.realm.is_empty() {
            return Err(ConfigError::EmptyRealm);
        }
        if self.realm.chars().any(|c| c == '"' || c == '\\' || c.is_control()) {
            return Err(ConfigError::InvalidRealm(self.realm.to_string()));
        }
        if self.nonce_ttl.is_zero() {
            return Err(ConfigError::ZeroNonceTtl);
        }
        if self.max_nonces == 0 {
            return Err(ConfigError::ZeroNonceCapacity);
        }
        Ok(())
    }
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            realm: SmolStr::new("ManagementRealm"),
            algorithm: DigestAlgorithm::Md5,
            nonce_ttl: DEFAULT_NONCE_TTL,
            max_nonces: MAX_NONCE_COUNT,
            verify_uri: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(DigestConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_settings() {
        assert_eq!(DigestConfig::new("").validate(), Err(ConfigError::EmptyRealm));
        assert!(matches!(
            DigestConfig::new("a\"b").validate(),
            Err(ConfigError::InvalidRealm(_))
        ));
        assert_eq!(
            DigestConfig::new("r")
                .with_nonce_ttl(Duration::ZERO)
                .validate(),
            Err(ConfigError::ZeroNonceTtl)
        );
        assert_eq!(
            DigestConfig::new("r").with_max_nonces(0).validate(),
            Err(ConfigError::ZeroNonceCapacity)
        );
    }
}
