// http-digest - HTTP Digest authentication engine
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;
use std::time::Duration;

use http_digest::{
    expected_response, AuthError, AuthOutcome, AuthRequest, ConnectionId, ContextRegistry,
    CredentialResolver, DigestAlgorithm, DigestAuthenticator, DigestConfig, Headers, Lookup,
    MemoryCredentialResolver, Principal, SyncToAsyncResolver,
};

const REALM: &str = "ManagementRealm";
const URI: &str = "/management";

/// Resolver that counts lookups so tests can prove the pipeline was skipped.
struct CountingResolver {
    inner: MemoryCredentialResolver,
    calls: AtomicUsize,
}

impl CountingResolver {
    fn new() -> Self {
        Self {
            inner: MemoryCredentialResolver::new().with_user(REALM, "admin", "s3cret"),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CredentialResolver for CountingResolver {
    fn resolve(&self, realm: &str, username: &str) -> Lookup {
        self.calls.fetch_add(1, Ordering::SeqCst);
        CredentialResolver::resolve(&self.inner, realm, username)
    }
}

struct BrokenResolver;

impl CredentialResolver for BrokenResolver {
    fn resolve(&self, _realm: &str, _username: &str) -> Lookup {
        Lookup::Unsupported("store only holds password hashes".to_string())
    }
}

fn authenticator() -> DigestAuthenticator<CountingResolver> {
    DigestAuthenticator::new(DigestConfig::new(REALM), CountingResolver::new()).expect("config")
}

fn credentials(nonce: &str, password: &str) -> Headers {
    let response =
        expected_response(DigestAlgorithm::Md5, "GET", URI, nonce, "admin", REALM, password);
    let mut headers = Headers::new();
    headers.push(
        "Authorization",
        format!(
            "Digest username=\"admin\", realm=\"{REALM}\", nonce=\"{nonce}\", \
             uri=\"{URI}\", response=\"{response}\", algorithm=MD5"
        ),
    );
    headers
}

fn get<R: CredentialResolver>(
    auth: &DigestAuthenticator<R>,
    contexts: &ContextRegistry,
    headers: &Headers,
    connection: u64,
) -> AuthOutcome {
    let request = AuthRequest::new("GET", URI, headers, ConnectionId(connection));
    auth.authenticate(&request, contexts).expect("authenticate")
}

/// Runs the two-leg handshake on `connection` and returns the nonce used.
fn login<R: CredentialResolver>(
    auth: &DigestAuthenticator<R>,
    contexts: &ContextRegistry,
    connection: u64,
) -> String {
    let challenge = get(auth, contexts, &Headers::new(), connection);
    let nonce = challenge.challenge().expect("challenge").nonce().to_string();
    let outcome = get(auth, contexts, &credentials(&nonce, "s3cret"), connection);
    assert_eq!(outcome, AuthOutcome::Success(Principal::new("admin", REALM)));
    nonce
}

#[test]
fn missing_header_yields_fresh_non_stale_challenge() {
    let auth = authenticator();
    let contexts = ContextRegistry::new();

    let outcome = get(&auth, &contexts, &Headers::new(), 1);
    let challenge = outcome.challenge().expect("challenge");
    assert!(!challenge.is_stale());
    assert!(!challenge.to_string().contains("stale"));
    assert_eq!(challenge.realm(), REALM);
    assert_eq!(auth.resolver().calls(), 0);
}

#[test]
fn authenticated_connection_skips_the_pipeline() {
    let auth = authenticator();
    let contexts = ContextRegistry::new();
    login(&auth, &contexts, 1);
    let calls = auth.resolver().calls();
    let outstanding = auth.nonces().count();

    // No Authorization header at all: the cached principal is enough.
    let outcome = get(&auth, &contexts, &Headers::new(), 1);
    assert_eq!(outcome, AuthOutcome::Success(Principal::new("admin", REALM)));

    // Even garbage credentials are not looked at.
    let mut garbage = Headers::new();
    garbage.push("Authorization", "Basic Zm9vOmJhcg==");
    assert!(get(&auth, &contexts, &garbage, 1).is_success());

    assert_eq!(auth.resolver().calls(), calls);
    assert_eq!(auth.nonces().count(), outstanding);
}

#[test]
fn reused_nonce_with_correct_credentials_is_stale() {
    let auth = authenticator();
    let contexts = ContextRegistry::new();
    let nonce = login(&auth, &contexts, 1);

    // Replay the same Authorization header on another connection.
    let outcome = get(&auth, &contexts, &credentials(&nonce, "s3cret"), 2);
    let challenge = outcome.challenge().expect("challenge");
    assert!(challenge.is_stale());
    assert!(challenge.to_string().ends_with(",stale=true"));
    assert_ne!(challenge.nonce(), nonce);
    assert!(contexts.get(ConnectionId(2)).map_or(true, |ctx| !ctx.is_authenticated()));
}

#[test]
fn expired_nonce_with_correct_credentials_is_stale() {
    let auth = DigestAuthenticator::new(
        DigestConfig::new(REALM).with_nonce_ttl(Duration::from_millis(20)),
        CountingResolver::new(),
    )
    .expect("config");
    let contexts = ContextRegistry::new();

    let first = get(&auth, &contexts, &Headers::new(), 1);
    let nonce = first.challenge().expect("challenge").nonce().to_string();
    std::thread::sleep(Duration::from_millis(40));

    let outcome = get(&auth, &contexts, &credentials(&nonce, "s3cret"), 1);
    assert!(outcome.challenge().expect("challenge").is_stale());
}

#[test]
fn wrong_password_then_correct_password_on_burnt_nonce() {
    let auth = authenticator();
    let contexts = ContextRegistry::new();

    let first = get(&auth, &contexts, &Headers::new(), 1);
    let nonce = first.challenge().expect("challenge").nonce().to_string();

    let wrong = get(&auth, &contexts, &credentials(&nonce, "guess"), 1);
    assert!(!wrong.challenge().expect("challenge").is_stale());

    // The nonce was consumed by the failed attempt.
    let retry = get(&auth, &contexts, &credentials(&nonce, "s3cret"), 1);
    assert!(retry.challenge().expect("challenge").is_stale());
}

#[test]
fn proxied_request_reauthenticates() {
    let auth = authenticator();
    let contexts = ContextRegistry::new();
    login(&auth, &contexts, 1);

    let mut proxied = Headers::new();
    proxied.push("Via", "1.1 gateway.example.com");
    let outcome = get(&auth, &contexts, &proxied, 1);
    assert!(outcome.challenge().is_some());

    // A proxied request that authenticates does not mark anything cached.
    let nonce = outcome.challenge().expect("challenge").nonce().to_string();
    let mut proxied_creds = credentials(&nonce, "s3cret");
    proxied_creds.push("X-Forwarded-For", "203.0.113.9");
    assert!(get(&auth, &contexts, &proxied_creds, 5).is_success());
    assert!(contexts.get(ConnectionId(5)).is_none());
    assert!(get(&auth, &contexts, &proxied, 5).challenge().is_some());
}

#[test]
fn connection_teardown_forgets_principal() {
    let auth = authenticator();
    let contexts = ContextRegistry::new();
    login(&auth, &contexts, 1);

    contexts.remove(ConnectionId(1));
    assert!(get(&auth, &contexts, &Headers::new(), 1).challenge().is_some());
}

#[test]
fn missing_username_is_plain_retry_without_lookup() {
    let auth = authenticator();
    let contexts = ContextRegistry::new();
    let mut headers = Headers::new();
    headers.push("Authorization", "Digest realm=\"ManagementRealm\", nonce=\"abc\"");

    let outcome = get(&auth, &contexts, &headers, 1);
    assert!(!outcome.challenge().expect("challenge").is_stale());
    assert_eq!(auth.resolver().calls(), 0);
}

#[test]
fn resolver_capability_error_is_fatal() {
    let auth = DigestAuthenticator::new(DigestConfig::new(REALM), BrokenResolver).expect("config");
    let contexts = ContextRegistry::new();
    let nonce = auth.challenge(false).nonce().to_string();

    let err = auth
        .authenticate(
            &AuthRequest::new("GET", URI, &credentials(&nonce, "s3cret"), ConnectionId(1)),
            &contexts,
        )
        .unwrap_err();
    assert!(matches!(err, AuthError::Resolver(_)));
    assert_eq!(err.status_code(), 500);
}

#[test]
fn concurrent_requests_race_for_one_nonce() {
    const THREADS: usize = 8;
    let auth = DigestAuthenticator::new(
        DigestConfig::new(REALM),
        MemoryCredentialResolver::new().with_user(REALM, "admin", "s3cret"),
    )
    .expect("config");

    for round in 0..50u64 {
        let contexts = ContextRegistry::new();
        let nonce = auth.challenge(false).nonce().to_string();
        let headers = credentials(&nonce, "s3cret");
        let barrier = Barrier::new(THREADS);
        let successes = AtomicUsize::new(0);
        let stale = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for t in 0..THREADS as u64 {
                let (auth, contexts, headers) = (&auth, &contexts, &headers);
                let (barrier, successes, stale) = (&barrier, &successes, &stale);
                scope.spawn(move || {
                    barrier.wait();
                    let connection = ConnectionId(round * 100 + t);
                    let request = AuthRequest::new("GET", URI, headers, connection);
                    match auth.authenticate(&request, contexts).expect("authenticate") {
                        AuthOutcome::Success(_) => successes.fetch_add(1, Ordering::SeqCst),
                        AuthOutcome::Retry(c) => {
                            assert!(c.is_stale());
                            stale.fetch_add(1, Ordering::SeqCst)
                        }
                    };
                });
            }
        });

        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(stale.load(Ordering::SeqCst), THREADS - 1);
    }
}

#[tokio::test]
async fn async_handshake_with_blocking_resolver() {
    let resolver = SyncToAsyncResolver::new(
        MemoryCredentialResolver::new().with_user(REALM, "admin", "s3cret"),
    );
    let auth = DigestAuthenticator::new_async(DigestConfig::new(REALM), resolver).expect("config");
    let contexts = ContextRegistry::new();

    let empty = Headers::new();
    let first = auth
        .authenticate_async(&AuthRequest::new("GET", URI, &empty, ConnectionId(1)), &contexts)
        .await
        .expect("authenticate");
    let nonce = first.challenge().expect("challenge").nonce().to_string();

    let headers = credentials(&nonce, "s3cret");
    let second = auth
        .authenticate_async(&AuthRequest::new("GET", URI, &headers, ConnectionId(1)), &contexts)
        .await
        .expect("authenticate");
    assert_eq!(second.principal().map(|p| p.username()), Some("admin"));

    let third = auth
        .authenticate_async(&AuthRequest::new("GET", URI, &empty, ConnectionId(1)), &contexts)
        .await
        .expect("authenticate");
    assert!(third.is_success());
}
