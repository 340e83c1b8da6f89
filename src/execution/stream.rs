//! Live output streams of a child process.
//!
//! Each pipe gets its own reader task that forwards raw byte chunks over a
//! channel as they are produced, so the aggregator never blocks on a
//! single stream.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::result::OutputSource;

/// Default buffer size for reading child output.
const READ_BUFFER_SIZE: usize = 8192;

/// Capacity of each per-stream chunk channel.
pub(crate) const CHUNK_CHANNEL_CAPACITY: usize = 64;

/// Async reader that drains one child pipe into a channel.
pub struct AsyncStreamReader<R: AsyncRead + Unpin + Send + 'static> {
    reader: R,
    tx: mpsc::Sender<Vec<u8>>,
    source: OutputSource,
    buffer_size: usize,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncStreamReader<R> {
    /// Create a new reader for the given pipe.
    pub fn new(reader: R, tx: mpsc::Sender<Vec<u8>>, source: OutputSource) -> Self {
        Self {
            reader,
            tx,
            source,
            buffer_size: READ_BUFFER_SIZE,
        }
    }

    /// Create with custom buffer size.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Read until EOF, forwarding every chunk in order.
    ///
    /// Returns when:
    /// - The pipe reaches EOF (every writer closed it)
    /// - The channel is closed (receiver dropped)
    /// - A read error occurs
    pub async fn run(mut self) {
        let mut buf = vec![0u8; self.buffer_size];

        loop {
            match self.reader.read(&mut buf).await {
                Ok(0) => {
                    debug!(source = ?self.source, "stream reader: EOF");
                    break;
                }
                Ok(n) => {
                    trace!(source = ?self.source, "stream reader: read {} bytes", n);
                    if self.tx.send(buf[..n].to_vec()).await.is_err() {
                        debug!(source = ?self.source, "stream reader: channel closed");
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(source = ?self.source, "stream reader error: {}", e);
                    break;
                }
            }
        }
    }
}

/// Incremental UTF-8 decoder for chunked output.
///
/// A multi-byte character split across two chunks is held back until its
/// remaining bytes arrive. Invalid sequences become U+FFFD, matching
/// `String::from_utf8_lossy` over the whole stream.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `bytes` (plus any held-back tail) as possible.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut out = String::with_capacity(self.pending.len());
        let mut rest: &[u8] = &self.pending;

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, tail) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                        None => {
                            // Incomplete sequence at the end; wait for more.
                            rest = tail;
                            break;
                        }
                    }
                }
            }
        }

        let consumed = self.pending.len() - rest.len();
        self.pending.drain(..consumed);
        out
    }

    /// Flush whatever is still held back (a truncated final character).
    pub fn finish(&mut self) -> String {
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }
}
