// http-digest - HTTP Digest authentication engine
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Credential lookup collaborators.
//!
//! Digest verification needs the plaintext password for a `(realm, username)`
//! pair. Where that password lives is up to the embedding application; this
//! module only fixes the lookup contract and ships an in-memory table.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use smol_str::SmolStr;
use tokio::{runtime::Handle, task};

use crate::error::ConfigError;

/// Result of a single credential lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The user exists; carries the plaintext password.
    Resolved(SmolStr),
    /// No such user in this realm.
    NotFound,
    /// The backend cannot answer digest lookups at all (e.g. it only stores
    /// password hashes, or is unreachable).
    Unsupported(String),
}

/// Synchronous credential backend.
pub trait CredentialResolver: Send + Sync {
    fn resolve(&self, realm: &str, username: &str) -> Lookup;

    /// Whether this backend can supply realm, username and plaintext
    /// password. Checked once when the authenticator is built.
    fn supports_digest(&self) -> bool {
        true
    }
}

/// Credential backend for async callers.
#[async_trait]
pub trait AsyncCredentialResolver: Send + Sync {
    async fn resolve(&self, realm: &str, username: &str) -> Lookup;

    /// See [`CredentialResolver::supports_digest`].
    fn supports_digest(&self) -> bool {
        true
    }
}

impl<T: CredentialResolver + ?Sized> CredentialResolver for Arc<T> {
    fn resolve(&self, realm: &str, username: &str) -> Lookup {
        (**self).resolve(realm, username)
    }

    fn supports_digest(&self) -> bool {
        (**self).supports_digest()
    }
}

/// Adapter to expose an async resolver as a sync one.
///
/// Must be called from within a multi-threaded tokio runtime.
pub struct AsyncToSyncResolver<T: AsyncCredentialResolver> {
    inner: T,
}

impl<T: AsyncCredentialResolver> AsyncToSyncResolver<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        task::block_in_place(|| Handle::current().block_on(fut))
    }
}

impl<T: AsyncCredentialResolver> CredentialResolver for AsyncToSyncResolver<T> {
    fn resolve(&self, realm: &str, username: &str) -> Lookup {
        self.block_on(self.inner.resolve(realm, username))
    }

    fn supports_digest(&self) -> bool {
        self.inner.supports_digest()
    }
}

/// Adapter to expose a blocking resolver as async, running each lookup on
/// the blocking thread pool so the event loop never stalls.
pub struct SyncToAsyncResolver<T: CredentialResolver> {
    inner: Arc<T>,
}

impl<T: CredentialResolver> SyncToAsyncResolver<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

#[async_trait]
impl<T: CredentialResolver + 'static> AsyncCredentialResolver for SyncToAsyncResolver<T> {
    async fn resolve(&self, realm: &str, username: &str) -> Lookup {
        let inner = Arc::clone(&self.inner);
        let realm = realm.to_owned();
        let username = username.to_owned();
        match task::spawn_blocking(move || inner.resolve(&realm, &username)).await {
            Ok(lookup) => lookup,
            Err(err) => Lookup::Unsupported(format!("credential lookup task failed: {}", err)),
        }
    }

    fn supports_digest(&self) -> bool {
        self.inner.supports_digest()
    }
}

/// In-memory credential table, keyed by `(realm, username)`.
#[derive(Debug, Default, Clone)]
pub struct MemoryCredentialResolver {
    users: HashMap<(SmolStr, SmolStr), SmolStr>,
}

impl MemoryCredentialResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, realm: &str, username: &str, password: &str) -> Self {
        self.add(realm, username, password);
        self
    }

    pub fn add(&mut self, realm: &str, username: &str, password: &str) {
        self.users.insert(
            (SmolStr::new(realm), SmolStr::new(username)),
            SmolStr::new(password),
        );
    }

    /// Loads a JSON object of the form `{"username": "password"}` into `realm`.
    pub fn load_users_file(realm: &str, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::UsersFile(format!("{}: {}", path.display(), e)))?;
        Self::from_users_json(realm, &contents)
    }

    pub fn from_users_json(realm: &str, json: &str) -> Result<Self, ConfigError> {
        let users: HashMap<String, String> =
            serde_json::from_str(json).map_err(|e| ConfigError::UsersFile(e.to_string()))?;
        let mut resolver = Self::new();
        for (username, password) in &users {
            resolver.add(realm, username, password);
        }
        Ok(resolver)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl CredentialResolver for MemoryCredentialResolver {
    fn resolve(&self, realm: &str, username: &str) -> Lookup {
        match self
            .users
            .get(&(SmolStr::new(realm), SmolStr::new(username)))
        {
            Some(password) => Lookup::Resolved(password.clone()),
            None => Lookup::NotFound,
        }
    }
}

#[async_trait]
impl AsyncCredentialResolver for MemoryCredentialResolver {
    async fn resolve(&self, realm: &str, username: &str) -> Lookup {
        CredentialResolver::resolve(self, realm, username)
    }
}
