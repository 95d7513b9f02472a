//! Endpoint substrate shared by the host and device roles.
//!
//! Both endpoints run the same connection lifecycle:
//!
//! ```text
//! Handshaking ──SYN/ACK──▶ Synchronisation ──ACT──▶ Active
//!      ▲                                              │
//!      └──────── END / disconnect / overflow ─────────┘
//! ```
//!
//! [`Session`] owns what the roles have in common: the transport, the
//! rolling command buffer, the negotiated wire state (protocol version and
//! framing), the format scratch buffers, and the log hook. The role types
//! ([`HostEndpoint`], [`DeviceEndpoint`]) each add their catalog view,
//! dirty queues, and role-specific command handling on top.

mod device;
mod host;

pub use device::DeviceEndpoint;
pub use host::HostEndpoint;

use std::fmt;
use std::ops::BitOr;

use bytes::{BufMut, BytesMut};

use crate::catalog::{Event, NumericValue};
use crate::codec::ascii;
use crate::log::Logger;
use crate::protocol::wire_format::{self as wire, client, ValueCoding};
use crate::protocol::CommandBuffer;
use crate::transport::Transport;

/// Connection lifecycle state. Advances only forward, or resets to
/// `Handshaking`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No negotiated version, no catalog.
    Handshaking,
    /// Version agreed; the catalog is being declared.
    Synchronisation,
    /// Catalog complete; value and event traffic flows.
    Active,
}

/// Set of states a command is allowed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StateMask(u8);

impl StateMask {
    pub(crate) const HANDSHAKING: StateMask = StateMask(1 << ConnectionState::Handshaking as u8);
    pub(crate) const SYNCHRONISATION: StateMask =
        StateMask(1 << ConnectionState::Synchronisation as u8);
    pub(crate) const ACTIVE: StateMask = StateMask(1 << ConnectionState::Active as u8);

    #[inline]
    pub(crate) fn contains(self, state: ConnectionState) -> bool {
        self.0 & (1 << state as u8) != 0
    }
}

impl BitOr for StateMask {
    type Output = StateMask;

    fn bitor(self, rhs: StateMask) -> StateMask {
        StateMask(self.0 | rhs.0)
    }
}

/// Which framing a command arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Framing {
    Ascii,
    Binary,
}

/// Outcome of a state-precondition check.
pub(crate) enum Gate {
    Pass,
    /// Command disallowed. When the endpoint was still handshaking the
    /// caller must reset and answer `END`.
    Reject { reset_handshake: bool },
}

/// Role-independent connection state: transport, buffers, negotiated wire
/// parameters, diagnostics.
pub(crate) struct Session {
    pub transport: Box<dyn Transport>,
    pub local_name: String,
    pub state: ConnectionState,
    pub protocol_version: u32,
    pub binary: bool,
    pub buffer: CommandBuffer,
    pub log: Logger,
    scratch: String,
    frame: BytesMut,
}

impl Session {
    pub fn new(transport: Box<dyn Transport>, local_name: String) -> Self {
        Self {
            transport,
            local_name,
            state: ConnectionState::Handshaking,
            protocol_version: 1,
            binary: false,
            buffer: CommandBuffer::new(),
            log: Logger::new(),
            scratch: String::new(),
            frame: BytesMut::with_capacity(wire::MAX_COMMAND_LENGTH),
        }
    }

    /// Drop every negotiated wire parameter and buffered byte. Role state
    /// (catalogs, queues) is the caller's responsibility.
    pub fn reset_wire(&mut self) {
        self.state = ConnectionState::Handshaking;
        self.protocol_version = 1;
        self.binary = false;
        self.buffer.clear();
    }

    /// Check a command's state precondition. A version below `min_version`
    /// is diagnostic only; a disallowed state rejects the command.
    pub fn expect_state(&mut self, allowed: StateMask, label: &str, min_version: u32) -> Gate {
        if self.protocol_version < min_version {
            self.log.warn(format_args!(
                "Did not expect command under version {}: {label}",
                self.protocol_version
            ));
        }
        if allowed.contains(self.state) {
            return Gate::Pass;
        }
        self.log.warn(format_args!(
            "Did not expect command in state {:?}: {label}",
            self.state
        ));
        Gate::Reject {
            reset_handshake: self.state == ConnectionState::Handshaking,
        }
    }

    // -- outbound ----------------------------------------------------------

    fn send_raw(&mut self, bytes: &[u8]) {
        if let Err(err) = self.transport.write(bytes) {
            self.log
                .warn(format_args!("Write failed on '{}': {err}", self.transport.name()));
        }
    }

    fn send_scratch(&mut self) {
        if let Err(err) = self.transport.write(self.scratch.as_bytes()) {
            self.log
                .warn(format_args!("Write failed on '{}': {err}", self.transport.name()));
        }
    }

    fn send_frame(&mut self) {
        if let Err(err) = self.transport.write(&self.frame) {
            self.log
                .warn(format_args!("Write failed on '{}': {err}", self.transport.name()));
        }
    }

    /// Emit one value frame in the session's framing. `coding` selects the
    /// client (device-originated) or server (host-originated) bit layout.
    pub fn send_value(&mut self, value: &NumericValue, coding: &ValueCoding) {
        self.log.info(format_args!(
            "-> {}({}) = {}",
            value.channel, value.name, value.value
        ));
        let raw = value.value.to_raw(value.ty);
        if self.binary {
            let mut cmd = [0u8; 5];
            let len = wire::pack_value(coding, value.channel, raw, &mut cmd);
            self.send_raw(&cmd[..len]);
        } else {
            self.scratch.clear();
            ascii::write_value(&mut self.scratch, value.channel, raw);
            self.send_scratch();
        }
    }

    /// Emit one event-fired frame (device role, client coding).
    pub fn send_event_fired(&mut self, event: &Event) {
        self.log
            .info(format_args!("-> EXC: {} ({})", event.channel, event.name));
        if self.binary {
            let mut cmd = [0u8; 3];
            let len = wire::pack_event(event.channel, &mut cmd);
            self.send_raw(&cmd[..len]);
        } else {
            self.scratch.clear();
            ascii::write_event_fired(&mut self.scratch, event.channel);
            self.send_scratch();
        }
    }

    pub fn send_event_decl(&mut self, event: &Event) {
        self.log
            .info(format_args!("-> CMD: {} {}", event.channel, event.name));
        if self.binary {
            self.frame.clear();
            self.frame.put_u8(client::CMD);
            self.frame.put_u16_le(event.channel);
            self.frame.put_slice(event.name.as_bytes());
            self.frame.put_u8(0);
            self.send_frame();
        } else {
            self.scratch.clear();
            ascii::write_event_decl(&mut self.scratch, event);
            self.send_scratch();
        }
    }

    pub fn send_numeric_decl(&mut self, value: &NumericValue, output: bool) {
        self.log.info(format_args!(
            "-> NIO: {} {} ({} {:?})",
            value.channel,
            value.name,
            if output { "Out" } else { "In" },
            value.ty
        ));
        if self.binary {
            let mut opcode = client::NIO;
            match value.ty {
                crate::value::NumericType::Boolean => {}
                crate::value::NumericType::Number => opcode |= client::NIO_NUMBER,
                crate::value::NumericType::Fraction => opcode |= client::NIO_FRACTION,
            }
            if output {
                opcode |= client::NIO_OUTPUT;
            }
            self.frame.clear();
            self.frame.put_u8(opcode);
            self.frame.put_u16_le(value.channel);
            self.frame.put_slice(value.name.as_bytes());
            self.frame.put_u8(0);
            self.send_frame();
        } else {
            self.scratch.clear();
            ascii::write_numeric_decl(&mut self.scratch, value, output);
            self.send_scratch();
        }
    }

    pub fn send_pid(&mut self, pid: u32, vid: u32) {
        self.log.info(format_args!(
            "-> PID: {pid}/{vid} {}",
            self.local_name
        ));
        if self.binary {
            self.frame.clear();
            self.frame.put_u8(client::PID);
            self.frame.put_u32_le(pid);
            self.frame.put_u32_le(vid);
            self.frame.put_slice(self.local_name.as_bytes());
            self.frame.put_u8(0);
            self.send_frame();
        } else {
            self.scratch.clear();
            ascii::write_pid(&mut self.scratch, pid, vid, &self.local_name);
            self.send_scratch();
        }
    }

    pub fn send_toggle(&mut self, channel: u16, active: bool) {
        self.log
            .info(format_args!("-> TNI: {channel} {}", active as u8));
        if self.binary {
            let mut opcode = client::TNI;
            if active {
                opcode |= client::TNI_ACTIVE;
            }
            let mut cmd = [opcode, 0, 0];
            cmd[1..3].copy_from_slice(&channel.to_le_bytes());
            self.send_raw(&cmd);
        } else {
            self.scratch.clear();
            ascii::write_toggle(&mut self.scratch, channel, active);
            self.send_scratch();
        }
    }

    pub fn send_debug(&mut self, text: &str) {
        self.log.info(format_args!("-> DBG: {text}"));
        if self.binary {
            self.frame.clear();
            self.frame.put_u8(client::DBG);
            self.frame.put_slice(text.as_bytes());
            self.frame.put_u8(0);
            self.send_frame();
        } else {
            self.scratch.clear();
            ascii::write_debug(&mut self.scratch, text);
            self.send_scratch();
        }
    }

    /// SYN is always ASCII: the negotiated framing is not live yet.
    pub fn send_syn(&mut self, version: u32, binary: bool) {
        self.scratch.clear();
        ascii::write_syn(&mut self.scratch, version, binary);
        self.send_scratch();
    }

    pub fn send_ack_v1(&mut self) {
        self.scratch.clear();
        ascii::write_ack_v1(&mut self.scratch);
        self.send_scratch();
    }

    pub fn send_ack(&mut self, game_version: u32, game_name: &str) {
        self.scratch.clear();
        ascii::write_ack(&mut self.scratch, game_version, game_name);
        self.send_scratch();
    }

    pub fn send_deny(&mut self) {
        self.scratch.clear();
        ascii::write_deny(&mut self.scratch);
        self.send_scratch();
    }

    pub fn send_act(&mut self) {
        if self.binary {
            self.send_raw(&[client::ACT]);
        } else {
            self.scratch.clear();
            ascii::write_act(&mut self.scratch);
            self.send_scratch();
        }
    }

    /// Emit `END`. The host always sends the text form (its first byte is
    /// the binary END code in the server table); a device in binary mode
    /// passes its one-byte opcode.
    pub fn send_end(&mut self, binary_opcode: Option<u8>) {
        match binary_opcode {
            Some(opcode) if self.binary => self.send_raw(&[opcode]),
            _ => {
                self.scratch.clear();
                ascii::write_end(&mut self.scratch);
                self.send_scratch();
            }
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("protocol_version", &self.protocol_version)
            .field("binary", &self.binary)
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}
