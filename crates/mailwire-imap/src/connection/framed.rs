//! Line and literal framing.
//!
//! Responses are CRLF-terminated lines. A line ending in `{n}` or `{n+}` is
//! followed by exactly `n` raw bytes, which may contain CR/LF, and then the
//! rest of the response. [`FramedStream::next_line`] returns one whole
//! response with its literals spliced in.

#![allow(clippy::missing_errors_doc)]

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::FramingError;
use crate::{ConnectionError, Error, Result};

const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Bytes of a discarded response kept for diagnostics.
const DISCARD_HEAD: usize = 64;

/// Framed transport: buffered reads with literal splicing, flushed writes.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
    max_line_length: usize,
    max_literal_size: u64,
    discarded_head: Vec<u8>,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps `stream` with the given limits.
    pub fn new(stream: S, max_line_length: usize, max_literal_size: u64) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
            max_line_length,
            max_literal_size,
            discarded_head: Vec::new(),
        }
    }

    /// Reads one logical response line, literals included.
    ///
    /// An over-long line or oversize literal is skipped up to the end of its
    /// response before the error is returned, so the stream stays aligned.
    /// The first bytes of the skipped response are kept in
    /// [`discarded_head`](Self::discarded_head).
    pub async fn next_line(&mut self) -> Result<Vec<u8>> {
        let mut response = Vec::new();
        loop {
            let read = match self.read_line().await {
                Err(Error::Connection(ConnectionError::Closed)) if !response.is_empty() => {
                    return Err(FramingError::UnexpectedEof.into());
                }
                read => read?,
            };
            let line = match read {
                Line::Complete(line) => line,
                Line::TooLong { head, tail } => {
                    self.remember(if response.is_empty() { &head } else { &response });
                    let pending = literal_length(&tail)?;
                    return self
                        .discard_rest(pending, FramingError::LineTooLong {
                            limit: self.max_line_length,
                        })
                        .await;
                }
            };
            response.extend_from_slice(&line);

            let Some(len) = literal_length(&line)? else {
                return Ok(response);
            };
            if len > self.max_literal_size {
                self.remember(&response);
                return self
                    .discard_rest(Some(len), FramingError::LiteralTooLarge {
                        size: len,
                        limit: self.max_literal_size,
                    })
                    .await;
            }
            let len = usize::try_from(len).map_err(|_| FramingError::InvalidLiteralLength)?;
            let start = response.len();
            response.resize(start + len, 0);
            self.reader
                .read_exact(&mut response[start..])
                .await
                .map_err(eof_as_framing)?;
        }
    }

    /// Waits until response bytes are available without consuming any.
    ///
    /// Cancel-safe, unlike [`next_line`](Self::next_line), so it can race a
    /// timer while nothing is in flight.
    pub async fn readable(&mut self) -> Result<()> {
        if self.reader.fill_buf().await?.is_empty() {
            return Err(ConnectionError::Closed.into());
        }
        Ok(())
    }

    /// Start of the response most recently skipped by a resynchronizing
    /// framing error.
    #[must_use]
    pub fn discarded_head(&self) -> &[u8] {
        &self.discarded_head
    }

    fn remember(&mut self, bytes: &[u8]) {
        self.discarded_head = bytes[..bytes.len().min(DISCARD_HEAD)].to_vec();
    }

    /// Reads up to and including `\n`, giving up once the limit is passed.
    async fn read_line(&mut self) -> Result<Line> {
        let mut line = Vec::new();
        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(if line.is_empty() {
                    ConnectionError::Closed.into()
                } else {
                    FramingError::UnexpectedEof.into()
                });
            }
            if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                line.extend_from_slice(&buf[..=pos]);
                self.reader.consume(pos + 1);
                break;
            }
            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);

            if line.len() > self.max_line_length {
                line.truncate(DISCARD_HEAD);
                let tail = self.skip_line().await?;
                return Ok(Line::TooLong { head: line, tail });
            }
        }
        if line.len() > self.max_line_length {
            let tail = line[line.len().saturating_sub(DISCARD_HEAD)..].to_vec();
            line.truncate(DISCARD_HEAD);
            return Ok(Line::TooLong { head: line, tail });
        }
        Ok(Line::Complete(line))
    }

    /// Consumes the remainder of the current line and returns its last bytes,
    /// enough to recognize a trailing literal marker.
    async fn skip_line(&mut self) -> Result<Vec<u8>> {
        let mut tail = Vec::new();
        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(FramingError::UnexpectedEof.into());
            }
            let (take, done) = buf
                .iter()
                .position(|&b| b == b'\n')
                .map_or((buf.len(), false), |pos| (pos + 1, true));
            tail.extend_from_slice(&buf[..take]);
            if tail.len() > DISCARD_HEAD {
                tail.drain(..tail.len() - DISCARD_HEAD);
            }
            self.reader.consume(take);
            if done {
                return Ok(tail);
            }
        }
    }

    async fn skip_bytes(&mut self, mut remaining: u64) -> Result<()> {
        while remaining > 0 {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(FramingError::UnexpectedEof.into());
            }
            let take = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
            self.reader.consume(take);
            remaining -= take as u64;
        }
        Ok(())
    }

    /// Skips the rest of a response, following literal markers, then
    /// returns `error`.
    async fn discard_rest(&mut self, mut pending: Option<u64>, error: FramingError) -> Result<Vec<u8>> {
        while let Some(len) = pending {
            self.skip_bytes(len).await?;
            let tail = self.skip_line().await?;
            pending = literal_length(&tail)?;
        }
        tracing::warn!(%error, "discarded oversized response");
        Err(error.into())
    }

    /// Writes `data` and flushes.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(data);
        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buffer).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Shuts down the write half.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.reader.get_mut().shutdown().await?;
        Ok(())
    }

    /// The underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        self.reader.get_mut()
    }

    /// Returns the underlying stream. Buffered unread bytes are lost; only
    /// call this at a response boundary (e.g. after a STARTTLS OK).
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

enum Line {
    Complete(Vec<u8>),
    TooLong { head: Vec<u8>, tail: Vec<u8> },
}

fn eof_as_framing(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        FramingError::UnexpectedEof.into()
    } else {
        Error::Connection(ConnectionError::Io(err))
    }
}

/// Parses a trailing `{n}` or `{n+}` literal marker.
///
/// Returns `Ok(None)` when the line has no marker and
/// [`FramingError::InvalidLiteralLength`] when the digits do not fit.
fn literal_length(line: &[u8]) -> Result<Option<u64>> {
    let line = line
        .strip_suffix(b"\r\n")
        .or_else(|| line.strip_suffix(b"\n"))
        .unwrap_or(line);
    let Some(body) = line.strip_suffix(b"}") else {
        return Ok(None);
    };
    let body = body.strip_suffix(b"+").unwrap_or(body);
    let Some(open) = body.iter().rposition(|&b| b == b'{') else {
        return Ok(None);
    };
    let digits = &body[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Ok(None);
    }
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Some)
        .ok_or_else(|| FramingError::InvalidLiteralLength.into())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;

    fn framed<S: AsyncRead + AsyncWrite + Unpin>(stream: S) -> FramedStream<S> {
        FramedStream::new(stream, 1024, 4096)
    }

    #[test]
    fn literal_markers() {
        assert_eq!(literal_length(b"BODY {123}\r\n").unwrap(), Some(123));
        assert_eq!(literal_length(b"BODY {123+}\r\n").unwrap(), Some(123));
        assert_eq!(literal_length(b"{0}\n").unwrap(), Some(0));
        assert_eq!(literal_length(b"no literal\r\n").unwrap(), None);
        assert_eq!(literal_length(b"wrong {abc}\r\n").unwrap(), None);
        assert_eq!(literal_length(b"{}\r\n").unwrap(), None);
        assert!(matches!(
            literal_length(b"{99999999999999999999999}\r\n"),
            Err(Error::Framing(FramingError::InvalidLiteralLength))
        ));
    }

    mod read_tests {
        use super::*;

        #[tokio::test]
        async fn simple_line() {
            let mut framed = framed(Builder::new().read(b"* OK ready\r\n").build());
            assert_eq!(framed.next_line().await.unwrap(), b"* OK ready\r\n");
        }

        #[tokio::test]
        async fn literal_with_embedded_crlf_then_next_line() {
            let mock = Builder::new()
                .read(b"* 1 FETCH (BODY[] {12}\r\n")
                .read(b"hello\r\nworld")
                .read(b")\r\n* 2 EXISTS\r\n")
                .build();
            let mut framed = framed(mock);
            assert_eq!(
                framed.next_line().await.unwrap(),
                b"* 1 FETCH (BODY[] {12}\r\nhello\r\nworld)\r\n"
            );
            assert_eq!(framed.next_line().await.unwrap(), b"* 2 EXISTS\r\n");
        }

        #[tokio::test]
        async fn eof_mid_literal() {
            let mock = Builder::new().read(b"* 1 FETCH (BODY[] {10}\r\nabc").build();
            let err = framed(mock).next_line().await.unwrap_err();
            assert!(matches!(err, Error::Framing(FramingError::UnexpectedEof)));
            assert!(err.is_fatal());
        }

        #[tokio::test]
        async fn eof_between_lines_is_clean_close() {
            let err = framed(Builder::new().build()).next_line().await.unwrap_err();
            assert!(matches!(err, Error::Connection(ConnectionError::Closed)));
            assert!(err.is_fatal());
        }

        #[tokio::test]
        async fn readable_does_not_consume() {
            let mut framed = framed(Builder::new().read(b"* 3 EXISTS\r\n").build());
            framed.readable().await.unwrap();
            assert_eq!(framed.next_line().await.unwrap(), b"* 3 EXISTS\r\n");
        }
    }

    mod resync_tests {
        use super::*;

        #[tokio::test]
        async fn long_line_is_skipped() {
            let long = format!("* OK {}\r\n", "x".repeat(3000));
            let mock = Builder::new()
                .read(long.as_bytes())
                .read(b"A1 OK done\r\n")
                .build();
            let mut framed = framed(mock);
            let err = framed.next_line().await.unwrap_err();
            assert!(matches!(err, Error::Framing(FramingError::LineTooLong { limit: 1024 })));
            assert!(!err.is_fatal());
            assert!(framed.discarded_head().starts_with(b"* OK xxx"));
            assert_eq!(framed.next_line().await.unwrap(), b"A1 OK done\r\n");
        }

        #[tokio::test]
        async fn oversize_literal_is_skipped() {
            let body = vec![b'Z'; 5000];
            let mock = Builder::new()
                .read(b"* 3 FETCH (BODY[] {5000}\r\n")
                .read(&body)
                .read(b" UID 7)\r\nA2 OK fetched\r\n")
                .build();
            let mut framed = framed(mock);
            let err = framed.next_line().await.unwrap_err();
            assert!(matches!(
                err,
                Error::Framing(FramingError::LiteralTooLarge { size: 5000, limit: 4096 })
            ));
            assert_eq!(framed.next_line().await.unwrap(), b"A2 OK fetched\r\n");
        }
    }

    #[tokio::test]
    async fn write_flushes() {
        let mock = Builder::new().write(b"A001 NOOP\r\n").build();
        let mut framed = framed(mock);
        framed.write_all(b"A001 NOOP\r\n").await.unwrap();
    }
}
