// http-digest - HTTP Digest authentication engine
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use http_digest::{
    AsyncCredentialResolver, AuthOutcome, AuthRequest, ConnectionId, ContextRegistry,
    DigestAuthenticator,
};
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::http::{read_request, write_response, Response};

/// Accepts connections forever, one task per connection.
pub async fn run<R>(
    bind: &str,
    auth: Arc<DigestAuthenticator<R>>,
    contexts: Arc<ContextRegistry>,
) -> Result<()>
where
    R: AsyncCredentialResolver + 'static,
{
    let listener = TcpListener::bind(bind).await?;
    info!(%bind, realm = auth.realm(), "listening (http)");
    let next_id = AtomicU64::new(1);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                error!(%e, "tcp accept error");
                continue;
            }
        };
        let connection = ConnectionId(next_id.fetch_add(1, Ordering::Relaxed));
        let auth = Arc::clone(&auth);
        let contexts = Arc::clone(&contexts);
        tokio::spawn(async move {
            debug!(%peer, %connection, "connection opened");
            if let Err(e) = serve_connection(stream, connection, &auth, &contexts).await {
                debug!(%peer, %connection, error = %e, "connection closed with error");
            }
            // The principal must not outlive the transport.
            contexts.remove(connection);
            debug!(%peer, %connection, "connection closed");
        });
    }
}

async fn serve_connection<R: AsyncCredentialResolver>(
    stream: TcpStream,
    connection: ConnectionId,
    auth: &DigestAuthenticator<R>,
    contexts: &ContextRegistry,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    while let Some(head) = read_request(&mut reader).await? {
        let request = AuthRequest::new(&head.method, &head.target, &head.headers, connection);
        let response = match auth.authenticate_async(&request, contexts).await {
            Ok(AuthOutcome::Success(principal)) => {
                Response::new(200).with_body(format!("Hello, {principal}\n"))
            }
            Ok(AuthOutcome::Retry(challenge)) => {
                Response::new(challenge.status_code()).with_headers(challenge.to_headers())
            }
            Err(err) => {
                if err.is_protocol_violation() {
                    debug!(%connection, error = %err, "rejecting request");
                } else {
                    warn!(%connection, error = %err, "authentication unavailable");
                }
                Response::new(err.status_code())
                    .with_body(format!("{err}\n"))
                    .closing()
            }
        };

        write_response(&mut writer, &response).await?;
        if response.close || head.wants_close() {
            break;
        }
    }
    Ok(())
}
