//! Fixed-size rolling buffer for inbound partial frames.
//!
//! The buffer never grows beyond [`COMMAND_BUFFER_SIZE`] bytes. The poll
//! loop appends whatever the transport has, the codec consumes complete
//! frames from the front, and any tail is compacted to the start for the
//! next read. A full buffer from which nothing can be consumed is the
//! overflow condition the endpoint answers with `END` and a reset.

use std::io;

use super::wire_format::COMMAND_BUFFER_SIZE;
use crate::transport::Transport;

/// Rolling byte buffer between the transport and the codec.
pub struct CommandBuffer {
    buf: Box<[u8; COMMAND_BUFFER_SIZE]>,
    len: usize,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self {
            buf: Box::new([0; COMMAND_BUFFER_SIZE]),
            len: 0,
        }
    }

    /// Unprocessed inbound bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == COMMAND_BUFFER_SIZE
    }

    /// Read once from the transport into the free tail. Returns the byte
    /// count; 0 means nothing was available (or the buffer is full).
    pub fn fill_from(&mut self, transport: &mut dyn Transport) -> io::Result<usize> {
        if self.is_full() {
            return Ok(0);
        }
        let n = transport.read(&mut self.buf[self.len..])?;
        debug_assert!(self.len + n <= COMMAND_BUFFER_SIZE);
        self.len += n;
        Ok(n)
    }

    /// Append bytes directly (tests and loopback paths). Bytes beyond the
    /// buffer's capacity are dropped.
    pub fn extend(&mut self, data: &[u8]) {
        let n = data.len().min(COMMAND_BUFFER_SIZE - self.len);
        self.buf[self.len..self.len + n].copy_from_slice(&data[..n]);
        self.len += n;
    }

    /// Drop `n` processed bytes from the front, compacting the remainder.
    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.len);
        let n = n.min(self.len);
        self.buf.copy_within(n..self.len, 0);
        self.len -= n;
    }

    /// Discard everything (connection reset).
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffer").field("len", &self.len).finish()
    }
}
