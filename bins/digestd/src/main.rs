// http-digest - HTTP Digest authentication engine
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

mod http;
mod server;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use http_digest::{
    ConfigError, ContextRegistry, DigestAlgorithm, DigestAuthenticator, DigestConfig,
    MemoryCredentialResolver, SyncToAsyncResolver,
};
use tracing::{info, warn};

/// Demo HTTP server that guards every request with Digest authentication
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Bind address (TCP)
    #[arg(long, default_value = "127.0.0.1:9990")]
    bind: String,
    /// Realm announced in challenges
    #[arg(long, default_value = "ManagementRealm")]
    realm: String,
    /// JSON file of {"username": "password"} entries
    #[arg(long)]
    users_file: Option<PathBuf>,
    /// Lifetime of an issued nonce
    #[arg(long, default_value_t = 300)]
    nonce_ttl_secs: u64,
    /// Maximum number of outstanding nonces
    #[arg(long, default_value_t = 10_000)]
    max_nonces: usize,
    /// Digest algorithm (MD5, SHA-256, SHA-512)
    #[arg(long, default_value = "MD5")]
    algorithm: String,
    /// Require the digest uri to match the request target
    #[arg(long)]
    verify_uri: bool,
}

impl Args {
    fn digest_config(&self) -> Result<DigestConfig, ConfigError> {
        let algorithm: DigestAlgorithm = self.algorithm.parse()?;
        let config = DigestConfig::new(self.realm.as_str())
            .with_algorithm(algorithm)
            .with_nonce_ttl(Duration::from_secs(self.nonce_ttl_secs))
            .with_max_nonces(self.max_nonces)
            .with_verify_uri(self.verify_uri);
        config.validate()?;
        Ok(config)
    }
}

/// Entry point for the digest demo daemon.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let args = Args::parse();
    let config = args.digest_config()?;

    let users = match &args.users_file {
        Some(path) => {
            let users = MemoryCredentialResolver::load_users_file(&config.realm, path)?;
            info!(path = %path.display(), users = users.len(), "loaded users file");
            users
        }
        None => {
            warn!("no --users-file given; every login will be refused");
            MemoryCredentialResolver::new()
        }
    };

    let ttl = config.nonce_ttl;
    // Lookups go through the blocking pool, as they would for a file or
    // directory backed store.
    let auth = Arc::new(DigestAuthenticator::new_async(config, SyncToAsyncResolver::new(users))?);
    let contexts = Arc::new(ContextRegistry::new());

    let sweeper = Arc::clone(&auth);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(ttl);
        loop {
            interval.tick().await;
            sweeper.nonces().cleanup();
        }
    });

    server::run(&args.bind, auth, contexts).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_config_from_flags() {
        let args = Args::parse_from([
            "digestd",
            "--realm",
            "mgmt",
            "--algorithm",
            "SHA-256",
            "--nonce-ttl-secs",
            "60",
            "--verify-uri",
        ]);
        let config = args.digest_config().expect("config");
        assert_eq!(config.realm, "mgmt");
        assert_eq!(config.algorithm, DigestAlgorithm::Sha256);
        assert_eq!(config.nonce_ttl, Duration::from_secs(60));
        assert!(config.verify_uri);
    }

    #[test]
    fn rejects_unknown_algorithm_and_zero_ttl() {
        let args = Args::parse_from(["digestd", "--algorithm", "CRC32"]);
        assert!(matches!(
            args.digest_config(),
            Err(ConfigError::UnknownAlgorithm(_))
        ));

        let args = Args::parse_from(["digestd", "--nonce-ttl-secs", "0"]);
        assert_eq!(args.digest_config().unwrap_err(), ConfigError::ZeroNonceTtl);
    }
}
