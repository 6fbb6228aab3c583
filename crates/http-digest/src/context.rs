// http-digest - HTTP Digest authentication engine
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-connection authentication state.
//!
//! Once a connection has authenticated, later requests on it skip the
//! challenge/response exchange. The registry is owned by the transport layer,
//! which removes a connection's entry when the connection closes. Requests
//! arriving through an intermediary never share state with the underlying
//! connection.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use smol_str::SmolStr;

use crate::headers::{Headers, FORWARDED, VIA, X_FORWARDED_FOR};

/// Identity proven by a successful digest exchange.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal {
    username: SmolStr,
    realm: SmolStr,
}

impl Principal {
    pub fn new(username: impl Into<SmolStr>, realm: impl Into<SmolStr>) -> Self {
        Self {
            username: username.into(),
            realm: realm.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.username, self.realm)
    }
}

/// Transport-assigned identifier of a physical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Authentication result cached for one connection (or one proxied request).
#[derive(Debug, Default)]
pub struct AuthContext {
    principal: RwLock<Option<Principal>>,
}

impl AuthContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.read().is_some()
    }

    pub fn principal(&self) -> Option<Principal> {
        self.principal.read().clone()
    }

    /// Records the authenticated principal. The first principal stored wins;
    /// later calls leave it untouched.
    pub fn set_principal(&self, principal: Principal) {
        let mut slot = self.principal.write();
        if slot.is_none() {
            *slot = Some(principal);
        }
    }
}

/// `true` when the request carries a header added by a proxy or gateway.
pub fn is_proxied(headers: &Headers) -> bool {
    [VIA, FORWARDED, X_FORWARDED_FOR]
        .iter()
        .any(|name| headers.contains(name))
}

/// Map from connection to its authentication context.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    contexts: DashMap<ConnectionId, Arc<AuthContext>>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the context for `connection`, creating it on first use.
    ///
    /// Proxied requests always get a fresh context that is not stored, so an
    /// authenticated downstream connection cannot be reused by whoever sits
    /// behind the intermediary.
    pub fn lookup_or_create(&self, connection: ConnectionId, proxied: bool) -> Arc<AuthContext> {
        if proxied {
            return Arc::new(AuthContext::new());
        }
        self.contexts
            .entry(connection)
            .or_insert_with(|| Arc::new(AuthContext::new()))
            .clone()
    }

    pub fn get(&self, connection: ConnectionId) -> Option<Arc<AuthContext>> {
        self.contexts.get(&connection).map(|ctx| Arc::clone(&ctx))
    }

    /// Drops the context of a closed connection.
    pub fn remove(&self, connection: ConnectionId) -> Option<Arc<AuthContext>> {
        self.contexts.remove(&connection).map(|(_, ctx)| ctx)
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}
