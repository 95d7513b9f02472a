//! In-memory duplex transport.
//!
//! [`LoopbackTransport::pair`] returns two connected ends; bytes written to
//! one become readable on the other. Tests wire a host and a device
//! together with it, or keep one end as the raw wire to script literal
//! byte sequences.

use std::io;
use std::sync::{Arc, Mutex};

use bytes::{Buf, BytesMut};

use super::Transport;

#[derive(Debug, Default)]
struct Shared {
    connected: bool,
    a_to_b: BytesMut,
    b_to_a: BytesMut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    A,
    B,
}

/// One end of an in-memory duplex pair.
///
/// Clones share the same end of the link: a test can hand one handle to an
/// endpoint and keep a clone to script writes or pull the virtual cable.
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    shared: Arc<Mutex<Shared>>,
    end: End,
}

impl LoopbackTransport {
    /// Create a connected-capable pair. The link starts down; either end's
    /// `connect` brings it up for both.
    pub fn pair() -> (LoopbackTransport, LoopbackTransport) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        (
            LoopbackTransport {
                shared: shared.clone(),
                end: End::A,
            },
            LoopbackTransport {
                shared,
                end: End::B,
            },
        )
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Shared> {
        // A poisoned lock only happens when a peer test thread panicked;
        // the byte queues are still valid.
        match self.shared.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Transport for LoopbackTransport {
    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    fn connect(&mut self) -> io::Result<()> {
        self.lock().connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut shared = self.lock();
        shared.connected = false;
        shared.a_to_b.clear();
        shared.b_to_a.clear();
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut shared = self.lock();
        let queue = match self.end {
            End::A => &mut shared.b_to_a,
            End::B => &mut shared.a_to_b,
        };
        let n = queue.len().min(buf.len());
        buf[..n].copy_from_slice(&queue[..n]);
        queue.advance(n);
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut shared = self.lock();
        if !shared.connected {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "loopback link is down",
            ));
        }
        let queue = match self.end {
            End::A => &mut shared.a_to_b,
            End::B => &mut shared.b_to_a,
        };
        queue.extend_from_slice(buf);
        Ok(())
    }

    fn name(&self) -> &str {
        "loopback"
    }
}
