// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Minimal HTTP request-line reader for device notifications.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Reads one request and returns its target.
///
/// The first line must be `GET <target> ...` (method case-insensitive).
/// Header lines are read and discarded up to the blank line or EOF. A blank
/// first line ends the request.
///
/// Returns `Ok(None)` for an empty connection, a blank first line, or a
/// request line without a GET target.
///
/// # Errors
///
/// Returns `io::ErrorKind::TimedOut` if a line does not arrive within
/// `timeout`, and `io::ErrorKind::InvalidData` if a line exceeds
/// `max_line_length` bytes.
pub(crate) async fn read_request_target<R>(
    reader: &mut R,
    timeout: Duration,
    max_line_length: usize,
) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let Some(request_line) = read_line(reader, timeout, max_line_length).await? else {
        return Ok(None);
    };
    if request_line.is_empty() {
        return Ok(None);
    }

    let mut tokens = request_line.split_whitespace();
    let target = match (tokens.next(), tokens.next()) {
        (Some(method), Some(target)) if method.eq_ignore_ascii_case("GET") => {
            Some(target.to_string())
        }
        _ => None,
    };

    while let Some(line) = read_line(reader, timeout, max_line_length).await? {
        if line.is_empty() {
            break;
        }
    }

    Ok(target)
}

async fn read_line<R>(reader: &mut R, timeout: Duration, max: usize) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let limit = u64::try_from(max).unwrap_or(u64::MAX).saturating_add(1);

    let read = tokio::time::timeout(timeout, (&mut *reader).take(limit).read_until(b'\n', &mut buf))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "request line timed out"))??;

    if read == 0 {
        return Ok(None);
    }
    if buf.len() > max {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "request line too long"));
    }

    let line = String::from_utf8_lossy(&buf);
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(10);

    async fn target_of(raw: &[u8]) -> io::Result<Option<String>> {
        let mut reader = raw;
        read_request_target(&mut reader, TIMEOUT, 8 * 1024).await
    }

    #[tokio::test]
    async fn extracts_target_and_skips_headers() {
        let raw = b"GET /?pt=3&cmd=1 HTTP/1.1\r\nHost: 10.0.0.1\r\n\r\n";
        assert_eq!(target_of(raw).await.unwrap().as_deref(), Some("/?pt=3&cmd=1"));
    }

    #[tokio::test]
    async fn method_is_case_insensitive() {
        let raw = b"get /?all=on;off HTTP/1.0\r\n\r\n";
        assert_eq!(target_of(raw).await.unwrap().as_deref(), Some("/?all=on;off"));
    }

    #[tokio::test]
    async fn headers_may_end_at_eof() {
        let raw = b"GET /?pt=1 HTTP/1.1\r\nHost: x\r\n";
        assert_eq!(target_of(raw).await.unwrap().as_deref(), Some("/?pt=1"));
    }

    #[tokio::test]
    async fn non_get_yields_none() {
        let raw = b"POST /?pt=1 HTTP/1.1\r\n\r\n";
        assert_eq!(target_of(raw).await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_connection_yields_none() {
        assert_eq!(target_of(b"").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_target_yields_none() {
        assert_eq!(target_of(b"GET\r\n\r\n").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_first_line_ends_request() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut reader = tokio::io::BufReader::new(server);
        tokio::io::AsyncWriteExt::write_all(&mut client, b"\r\n").await.unwrap();

        let target = read_request_target(&mut reader, TIMEOUT, 8 * 1024).await.unwrap();
        assert_eq!(target, None);
        drop(client);
    }

    #[tokio::test]
    async fn overlong_line_is_rejected() {
        let mut raw = b"GET /?".to_vec();
        raw.extend(std::iter::repeat_n(b'a', 100));
        raw.extend_from_slice(b" HTTP/1.1\r\n\r\n");

        let mut reader = raw.as_slice();
        let err = read_request_target(&mut reader, TIMEOUT, 64)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peer_times_out() {
        let (client, server) = tokio::io::duplex(64);
        let mut reader = tokio::io::BufReader::new(server);

        let err = read_request_target(&mut reader, TIMEOUT, 8 * 1024)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        drop(client);
    }
}
