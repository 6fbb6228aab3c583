// http-digest - HTTP Digest authentication engine
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single-use server nonces with expiry.
//!
//! Each nonce is 48 lowercase hex characters: the issue time in Unix
//! milliseconds (16 digits) followed by 16 random bytes (32 digits). The
//! ledger keeps every outstanding nonce until it is used, expires, or is
//! evicted to stay under the capacity bound.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use rand::{thread_rng, RngCore};
use smol_str::SmolStr;
use tracing::debug;

/// Maximum number of nonces to keep in memory to prevent unbounded growth.
pub const MAX_NONCE_COUNT: usize = 10_000;
pub const DEFAULT_NONCE_TTL: Duration = Duration::from_secs(300);

const TIMESTAMP_HEX_LEN: usize = 16;
const RANDOM_BYTES: usize = 16;
const NONCE_LEN: usize = TIMESTAMP_HEX_LEN + RANDOM_BYTES * 2;

#[derive(Debug, Clone, Copy)]
struct NonceEntry {
    created_at: Instant,
}

impl NonceEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() <= ttl
    }
}

fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn generate_value(issued_at: SystemTime) -> SmolStr {
    let mut random = [0u8; RANDOM_BYTES];
    thread_rng().fill_bytes(&mut random);
    let mut value = String::with_capacity(NONCE_LEN);
    value.push_str(&hex::encode(unix_millis(issued_at).to_be_bytes()));
    value.push_str(&hex::encode(random));
    SmolStr::new(value)
}

/// Issue time embedded in a nonce value, in Unix milliseconds.
///
/// Returns `None` for values that were not produced by a [`NonceFactory`].
pub fn issued_at_millis(value: &str) -> Option<u64> {
    if value.len() != NONCE_LEN || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(&value[..TIMESTAMP_HEX_LEN], 16).ok()
}

/// Issues nonces and consumes them at most once.
///
/// Cloning yields another handle onto the same ledger.
#[derive(Debug, Clone)]
pub struct NonceFactory {
    nonces: Arc<DashMap<SmolStr, NonceEntry>>,
    ttl: Duration,
    max_nonces: usize,
}

impl NonceFactory {
    pub fn new(ttl: Duration) -> Self {
        Self {
            nonces: Arc::new(DashMap::new()),
            ttl,
            max_nonces: MAX_NONCE_COUNT,
        }
    }

    pub fn with_max_nonces(mut self, max: usize) -> Self {
        self.max_nonces = max.max(1);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Generates a fresh nonce and records it in the ledger.
    pub fn create_nonce(&self) -> SmolStr {
        // If we're at capacity, run cleanup before generating new nonce
        if self.nonces.len() >= self.max_nonces {
            self.cleanup();

            if self.nonces.len() >= self.max_nonces {
                self.remove_oldest((self.max_nonces / 10).max(1));
            }
        }

        let value = generate_value(SystemTime::now());
        self.nonces.insert(
            value.clone(),
            NonceEntry {
                created_at: Instant::now(),
            },
        );
        value
    }

    /// Consumes `value`, returning `true` only for a known, unexpired,
    /// previously unused nonce.
    ///
    /// The entry is removed in the same step as the check, so of several
    /// callers racing on one value at most one sees `true`. Expired entries
    /// are evicted as a side effect.
    pub fn use_nonce(&self, value: &str) -> bool {
        let Some(issued) = issued_at_millis(value) else {
            debug!("rejecting nonce with unrecognised format");
            return false;
        };

        let age_ms = unix_millis(SystemTime::now()).saturating_sub(issued);
        if u128::from(age_ms) > self.ttl.as_millis() {
            self.nonces.remove(value);
            debug!(age_ms, "rejecting expired nonce");
            return false;
        }

        match self.nonces.remove(value) {
            Some((_, entry)) if entry.is_fresh(self.ttl) => true,
            Some(_) => {
                debug!("rejecting expired nonce");
                false
            }
            None => {
                debug!("rejecting unknown or already used nonce");
                false
            }
        }
    }

    /// Removes expired nonces from the ledger.
    pub fn cleanup(&self) {
        let ttl = self.ttl;
        self.nonces.retain(|_, entry| entry.is_fresh(ttl));
    }

    /// Removes the oldest nonces up to the specified count.
    fn remove_oldest(&self, count: usize) {
        let mut entries: Vec<_> = self
            .nonces
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().created_at))
            .collect();

        entries.sort_by_key(|(_, created_at)| *created_at);

        for (key, _) in entries.iter().take(count) {
            self.nonces.remove(key);
        }
        debug!(evicted = count.min(entries.len()), "nonce ledger at capacity");
    }

    /// Number of outstanding nonces.
    pub fn count(&self) -> usize {
        self.nonces.len()
    }
}

impl Default for NonceFactory {
    fn default() -> Self {
        Self::new(DEFAULT_NONCE_TTL)
    }
}
