//! Stream reassembly for one TCP connection
//!
//! A [`Connection`] turns arbitrary reads from a byte stream into complete
//! [`SipMessage`]s. The reader writes straight into [`Connection::write_buffer`]
//! and then reports how many bytes arrived with [`Connection::process`].
//!
//! The buffer grows by half whenever it fills up while the header block is
//! still incomplete. Once the headers are complete they are split off and
//! frozen, so the message's header values share that allocation. If the body
//! has not fully arrived yet, a buffer of exactly the remaining body size
//! is allocated. Bytes after the end of a message stay in the buffer and
//! start the next one.

use std::time::{Duration, Instant};

use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use strata_sip_core::{Preparser, PreparseStatus, SipMessage, Tuple, DEFAULT_MAX_HEADER_SIZE};
use tracing::trace;

use crate::error::{Error, Result};

/// Limits for stream reassembly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Size of a freshly allocated receive buffer
    pub chunk_size: usize,
    /// Upper bound on start line plus headers
    pub max_header_size: usize,
    /// Upper bound on a declared Content-Length
    pub max_body_size: usize,
    /// How long an outbound connect may take before it counts as failed
    pub connect_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            chunk_size: 8192,
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
            max_body_size: 1024 * 1024,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ConnectionConfig {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_max_header_size(mut self, max_header_size: usize) -> Self {
        self.max_header_size = max_header_size;
        self
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    NewMessage,
    ReadingHeaders,
    PartialBody,
}

/// What a [`Connection`] is waiting for after a call to `process`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Between messages; nothing buffered
    Idle,
    /// The header block is incomplete
    MoreDataNeeded,
    /// Headers are complete and `remaining` body bytes are still missing
    PartialBody { remaining: usize },
}

/// Framing state of one stream connection
#[derive(Debug)]
pub struct Connection {
    tuple: Tuple,
    config: ConnectionConfig,
    state: ReadState,
    /// Receive area; only the first `filled` bytes hold data
    buffer: BytesMut,
    filled: usize,
    preparser: Preparser,
    pending: Option<SipMessage>,
    body_len: usize,
}

fn zeroed(len: usize) -> BytesMut {
    let mut buf = BytesMut::with_capacity(len);
    buf.resize(len, 0);
    buf
}

impl Connection {
    pub fn new(tuple: Tuple, config: ConnectionConfig) -> Self {
        let preparser = Preparser::new(config.max_header_size);
        Self {
            tuple,
            buffer: zeroed(config.chunk_size),
            config,
            state: ReadState::NewMessage,
            filled: 0,
            preparser,
            pending: None,
            body_len: 0,
        }
    }

    pub fn tuple(&self) -> &Tuple {
        &self.tuple
    }

    /// Bytes received but not yet emitted as part of a message
    pub fn buffered(&self) -> usize {
        self.filled
    }

    /// Free space to read into. Never empty.
    pub fn write_buffer(&mut self) -> &mut [u8] {
        if self.filled == self.buffer.len() {
            let len = self.buffer.len();
            let grown = (len + len / 2).max(self.config.chunk_size).max(len + 1);
            trace!(tuple = %self.tuple, from = len, to = grown, "growing receive buffer");
            self.buffer.resize(grown, 0);
        }
        &mut self.buffer[self.filled..]
    }

    /// Accounts for `bytes_read` new bytes at the start of the write buffer
    /// and pushes every message they complete onto `out`, in order.
    ///
    /// An error means the stream can no longer be framed and the connection
    /// must be closed. Messages completed before the error are still in `out`.
    pub fn process(&mut self, bytes_read: usize, out: &mut impl Extend<SipMessage>) -> Result<ConnectionStatus> {
        self.filled = (self.filled + bytes_read).min(self.buffer.len());
        loop {
            match self.state {
                ReadState::NewMessage | ReadState::ReadingHeaders => {
                    if self.filled == 0 {
                        self.state = ReadState::NewMessage;
                        return Ok(ConnectionStatus::Idle);
                    }
                    match self.preparser.process(&self.buffer[..self.filled]) {
                        PreparseStatus::MoreDataNeeded if self.preparser.is_idle() => {
                            // keep-alive line breaks only
                            self.filled = 0;
                            self.preparser.reset();
                            self.state = ReadState::NewMessage;
                            return Ok(ConnectionStatus::Idle);
                        }
                        PreparseStatus::MoreDataNeeded | PreparseStatus::Fragmented => {
                            self.state = ReadState::ReadingHeaders;
                            return Ok(ConnectionStatus::MoreDataNeeded);
                        }
                        PreparseStatus::Error(e) => return Err(e.into()),
                        PreparseStatus::HeadersComplete { header_len } => {
                            if let Some(status) = self.headers_complete(header_len, out)? {
                                return Ok(status);
                            }
                        }
                    }
                }
                ReadState::PartialBody => {
                    if self.filled < self.body_len {
                        return Ok(ConnectionStatus::PartialBody {
                            remaining: self.body_len - self.filled,
                        });
                    }
                    let body = self.buffer.split_to(self.body_len).freeze();
                    self.filled -= self.body_len;
                    if let Some(mut message) = self.pending.take() {
                        message.attach_body(body);
                        out.extend(Some(message));
                    }
                    self.start_next_message();
                }
            }
        }
    }

    /// Splits off a complete header block. Returns a status when the caller
    /// has to wait for more body bytes, `None` when a message was emitted.
    fn headers_complete(
        &mut self,
        header_len: usize,
        out: &mut impl Extend<SipMessage>,
    ) -> Result<Option<ConnectionStatus>> {
        let head = self.buffer.split_to(header_len).freeze();
        self.filled -= header_len;
        let mut message = self.preparser.build_message(&head)?;
        self.preparser.reset();

        let content_length = message.content_length()?.ok_or(Error::MissingContentLength)? as usize;
        if content_length > self.config.max_body_size {
            return Err(Error::BodyTooLarge {
                length: content_length,
                limit: self.config.max_body_size,
            });
        }
        message.set_source(self.tuple);
        message.set_received_at(Instant::now());

        if self.filled >= content_length {
            let body = self.buffer.split_to(content_length).freeze();
            self.filled -= content_length;
            message.attach_body(body);
            out.extend(Some(message));
            self.start_next_message();
            return Ok(None);
        }

        let mut body = zeroed(content_length);
        body[..self.filled].copy_from_slice(&self.buffer[..self.filled]);
        self.buffer = body;
        self.body_len = content_length;
        self.pending = Some(message);
        self.state = ReadState::PartialBody;
        Ok(Some(ConnectionStatus::PartialBody {
            remaining: content_length - self.filled,
        }))
    }

    fn start_next_message(&mut self) {
        self.state = ReadState::NewMessage;
        self.body_len = 0;
        if self.filled == 0 {
            self.buffer = zeroed(self.config.chunk_size);
        }
    }
}
