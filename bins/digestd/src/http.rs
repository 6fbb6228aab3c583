// http-digest - HTTP Digest authentication engine
// Copyright (C) 2025 James Ferris <ferrous.communications@gmail.com>
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Just enough HTTP/1.1 framing for the demo daemon.

use anyhow::{anyhow, Result};
use http_digest::Headers;
use smol_str::SmolStr;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

const MAX_HEADERS: usize = 100;
const MAX_LINE_LEN: usize = 8 * 1024;
const MAX_BODY_SIZE: u64 = 1024 * 1024;

/// Request line and headers of one inbound request.
#[derive(Debug)]
pub struct RequestHead {
    pub method: String,
    pub target: String,
    pub version: String,
    pub headers: Headers,
}

impl RequestHead {
    /// `true` when the client asked to close the connection after this exchange.
    pub fn wants_close(&self) -> bool {
        match self.headers.get("Connection") {
            Some(value) => value.eq_ignore_ascii_case("close"),
            None => self.version == "HTTP/1.0",
        }
    }
}

async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R, line: &mut String) -> Result<usize> {
    line.clear();
    // Never buffer more than one byte past the limit.
    let n = (&mut *reader)
        .take(MAX_LINE_LEN as u64 + 1)
        .read_line(line)
        .await?;
    if n > MAX_LINE_LEN {
        warn!(limit = MAX_LINE_LEN, "request line exceeds limit, closing connection");
        return Err(anyhow!("header line too long"));
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(n)
}

/// Reads the next request head, discarding any body. `Ok(None)` on a clean EOF.
pub async fn read_request<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<RequestHead>> {
    let mut line = String::new();
    if read_line(reader, &mut line).await? == 0 {
        return Ok(None);
    }

    let mut parts = line.split_whitespace();
    let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(anyhow!("malformed request line"));
    };
    let mut head = RequestHead {
        method: method.to_owned(),
        target: target.to_owned(),
        version: version.to_owned(),
        headers: Headers::new(),
    };

    loop {
        if read_line(reader, &mut line).await? == 0 {
            return Err(anyhow!("connection closed inside request head"));
        }
        if line.is_empty() {
            break;
        }
        if head.headers.len() >= MAX_HEADERS {
            return Err(anyhow!("too many headers"));
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| anyhow!("malformed header line"))?;
        head.headers
            .push(SmolStr::new(name.trim()), SmolStr::new(value.trim()));
    }

    // Only Content-Length framing is understood; anything else would make the
    // body look like the next request.
    if head.headers.contains("Transfer-Encoding") {
        return Err(anyhow!("Transfer-Encoding is not supported"));
    }

    let body_len = match head.headers.get("Content-Length") {
        Some(value) => value
            .parse::<u64>()
            .map_err(|_| anyhow!("invalid Content-Length"))?,
        None => 0,
    };
    if body_len > MAX_BODY_SIZE {
        return Err(anyhow!("request body too large"));
    }
    if body_len > 0 {
        tokio::io::copy(&mut reader.take(body_len), &mut tokio::io::sink()).await?;
    }

    Ok(Some(head))
}

/// Response about to be written back to the client.
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    pub body: String,
    pub close: bool,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: String::new(),
            close: false,
        }
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        for header in headers {
            self.headers.push(header.name, header.value);
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn closing(mut self) -> Self {
        self.close = true;
        self
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
) -> Result<()> {
    let mut out = format!("HTTP/1.1 {} {}\r\n", response.status, reason_phrase(response.status));
    for header in &response.headers {
        out.push_str(&format!("{}: {}\r\n", header.name, header.value));
    }
    out.push_str(&format!("Content-Length: {}\r\n", response.body.len()));
    if response.close {
        out.push_str("Connection: close\r\n");
    }
    out.push_str("\r\n");
    out.push_str(&response.body);

    writer.write_all(out.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
