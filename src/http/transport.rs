//! Trait abstraction for the TCP primitive to enable testing

use async_trait::async_trait;
use std::io;
use std::net::IpAddr;
use std::time::Duration;

/// Trait for the single-connection TCP operations the HTTP client needs.
///
/// Reads are timeout-bounded: an idle timeout surfaces as `Ok(0)` (no more
/// bytes), letting the caller decide whether what it has so far parses.
#[async_trait]
pub trait TcpTransport: Send {
    /// Open a connection, bounded by `timeout_ms`.
    async fn connect(&mut self, addr: IpAddr, port: u16, timeout_ms: u64) -> io::Result<()>;

    /// Whether a connection is currently open.
    fn is_connected(&self) -> bool;

    /// Write all bytes to the connection.
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Read some bytes, waiting at most `timeout_ms`. Returns 0 on EOF or
    /// idle timeout.
    async fn read(&mut self, buf: &mut [u8], timeout_ms: u64) -> io::Result<usize>;

    /// Close the connection. Closing an unopened transport is a no-op.
    async fn close(&mut self);
}

/// Production transport over `tokio::net::TcpStream`.
#[derive(Debug, Default)]
pub struct TokioTcp {
    stream: Option<tokio::net::TcpStream>,
}

impl TokioTcp {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TcpTransport for TokioTcp {
    async fn connect(&mut self, addr: IpAddr, port: u16, timeout_ms: u64) -> io::Result<()> {
        let connect = tokio::net::TcpStream::connect((addr, port));
        let stream = tokio::time::timeout(Duration::from_millis(timeout_ms), connect)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
        self.stream = Some(stream);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "not connected"))?;
        stream.write_all(data).await?;
        stream.flush().await
    }

    async fn read(&mut self, buf: &mut [u8], timeout_ms: u64) -> io::Result<usize> {
        use tokio::io::AsyncReadExt;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "not connected"))?;
        match tokio::time::timeout(Duration::from_millis(timeout_ms), stream.read(buf)).await {
            Ok(result) => result,
            // Idle timeout: report end-of-stream and let the parser judge
            Err(_) => Ok(0),
        }
    }

    async fn close(&mut self) {
        // Dropping the stream closes the socket
        self.stream = None;
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;

    /// Mock transport replaying scripted read chunks and recording writes.
    pub struct MockTransport {
        pub connect_ok: bool,
        pub connected: bool,
        pub written: Vec<u8>,
        pub reads: VecDeque<Vec<u8>>,
        pub connect_calls: u32,
        pub close_calls: u32,
    }

    impl MockTransport {
        pub fn with_response(chunks: Vec<Vec<u8>>) -> Self {
            Self {
                connect_ok: true,
                connected: false,
                written: Vec::new(),
                reads: chunks.into(),
                connect_calls: 0,
                close_calls: 0,
            }
        }

        pub fn refusing() -> Self {
            let mut t = Self::with_response(Vec::new());
            t.connect_ok = false;
            t
        }
    }

    #[async_trait]
    impl TcpTransport for MockTransport {
        async fn connect(&mut self, _addr: IpAddr, _port: u16, _timeout_ms: u64) -> io::Result<()> {
            self.connect_calls += 1;
            if self.connect_ok {
                self.connected = true;
                Ok(())
            } else {
                Err(io::Error::new(io::ErrorKind::ConnectionRefused, "mock refused"))
            }
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
            self.written.extend_from_slice(data);
            Ok(())
        }

        async fn read(&mut self, buf: &mut [u8], _timeout_ms: u64) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    // Anything that did not fit goes back to the front
                    if n < chunk.len() {
                        self.reads.push_front(chunk[n..].to_vec());
                    }
                    Ok(n)
                }
                None => Ok(0),
            }
        }

        async fn close(&mut self) {
            self.close_calls += 1;
            self.connected = false;
        }
    }
}
