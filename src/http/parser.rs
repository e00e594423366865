//! # HTTP Response Parser
//!
//! Explicit state machine over an incrementally fed byte stream.
//!
//! The agent only ever talks plain HTTP/1.1 with a `Content-Length` body,
//! so the parser is deliberately minimal: status line, the one header it
//! cares about, blank line, exact-length body. Every way an input can be
//! malformed maps to a distinct [`HttpError`], and the body is bounded by a
//! caller-supplied capacity checked *before* any body byte is stored.

use bytes::BytesMut;

use super::{HttpError, HttpResponse};

const STATUS_MARKER: &[u8] = b"HTTP/1.1 ";
const CONTENT_LENGTH: &[u8] = b"Content-Length: ";

/// Parser progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitStatusLine,
    AwaitContentLength,
    AwaitBodyStart,
    ReadingBody,
    Done,
}

/// Incremental HTTP/1.1 response parser with a bounded body.
#[derive(Debug)]
pub struct ResponseParser {
    state: State,
    buf: BytesMut,
    status: u16,
    content_length: usize,
    capacity: usize,
    body: Vec<u8>,
}

impl ResponseParser {
    /// Create a parser that rejects any body longer than `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: State::AwaitStatusLine,
            buf: BytesMut::new(),
            status: 0,
            content_length: 0,
            capacity,
            body: Vec::new(),
        }
    }

    /// Feed the next chunk of received bytes.
    ///
    /// Returns `Ok(true)` once the full response has been parsed; further
    /// bytes are ignored. Errors are final.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<bool, HttpError> {
        self.buf.extend_from_slice(chunk);
        loop {
            let before = self.state;
            self.advance()?;
            if self.state == State::Done {
                return Ok(true);
            }
            if self.state == before && !self.progressable() {
                return Ok(false);
            }
        }
    }

    /// Finish parsing at end of stream.
    ///
    /// A stream that ends before the body is complete is malformed, not a
    /// short read.
    pub fn finish(self) -> Result<HttpResponse, HttpError> {
        match self.state {
            State::Done => Ok(HttpResponse {
                status: self.status,
                content_length: self.content_length,
                body: self.body,
            }),
            State::AwaitContentLength | State::AwaitBodyStart | State::ReadingBody => {
                Err(HttpError::MalformedResponse("truncated response"))
            }
            State::AwaitStatusLine => Err(HttpError::MalformedResponse("no status line")),
        }
    }

    /// Whether buffered bytes could move the current state forward.
    fn progressable(&self) -> bool {
        match self.state {
            State::ReadingBody => !self.buf.is_empty(),
            State::Done => false,
            // Header states need a complete line
            _ => find_crlf(&self.buf).is_some(),
        }
    }

    fn advance(&mut self) -> Result<(), HttpError> {
        match self.state {
            State::AwaitStatusLine => {
                let Some(line) = take_line(&mut self.buf) else {
                    return Ok(());
                };
                if !line.starts_with(STATUS_MARKER) {
                    return Err(HttpError::MalformedResponse("missing HTTP/1.1 marker"));
                }
                let status = parse_leading_int(&line[STATUS_MARKER.len()..])
                    .ok_or(HttpError::MalformedResponse("unparseable status code"))?;
                if status != 200 {
                    // Non-200: fail now, never read headers or body
                    return Err(HttpError::Status(status as u16));
                }
                self.status = status as u16;
                self.state = State::AwaitContentLength;
            }
            State::AwaitContentLength => {
                let Some(line) = take_line(&mut self.buf) else {
                    return Ok(());
                };
                if line.is_empty() {
                    // Headers ended without the one header we require
                    return Err(HttpError::MissingContentLength);
                }
                if line.starts_with(CONTENT_LENGTH) {
                    self.content_length = parse_leading_int(&line[CONTENT_LENGTH.len()..])
                        .ok_or(HttpError::MalformedResponse("unparseable Content-Length"))?;
                    self.state = State::AwaitBodyStart;
                }
            }
            State::AwaitBodyStart => {
                let Some(line) = take_line(&mut self.buf) else {
                    return Ok(());
                };
                if line.is_empty() {
                    if self.content_length > self.capacity {
                        return Err(HttpError::ResponseTooLarge {
                            length: self.content_length,
                            capacity: self.capacity,
                        });
                    }
                    self.body.reserve(self.content_length);
                    self.state = State::ReadingBody;
                }
            }
            State::ReadingBody => {
                let want = self.content_length - self.body.len();
                let take = want.min(self.buf.len());
                self.body.extend_from_slice(&self.buf.split_to(take));
                if self.body.len() == self.content_length {
                    self.state = State::Done;
                }
            }
            State::Done => {}
        }
        Ok(())
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Split one `\r\n`-terminated line off the front of `buf`, without the
/// terminator. None if no complete line is buffered yet.
fn take_line(buf: &mut BytesMut) -> Option<BytesMut> {
    let pos = find_crlf(buf)?;
    let mut line = buf.split_to(pos + 2);
    line.truncate(pos);
    Some(line)
}

/// Parse the decimal integer at the start of `bytes`, stopping at the first
/// non-digit. None if there is no leading digit.
fn parse_leading_int(bytes: &[u8]) -> Option<usize> {
    let digits: &[u8] = match bytes.iter().position(|b| !b.is_ascii_digit()) {
        Some(0) => return None,
        Some(end) => &bytes[..end],
        None if bytes.is_empty() => return None,
        None => bytes,
    };
    // Digits only, so from_utf8 cannot fail
    std::str::from_utf8(digits).ok()?.parse().ok()
}
