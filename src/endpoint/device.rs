//! Device-side endpoint: talks to a host application.
//!
//! The device owns the catalog: the application registers its inputs,
//! outputs and events up front, the endpoint offers a handshake (`SYN`),
//! and on `ACK` it declares the whole catalog and activates. Once Active it
//! forwards queued output changes and fired events to the host and applies
//! inbound input values.
//!
//! Registrations are local configuration, so they survive resets — after a
//! dropped link or an `END`, the device re-handshakes and re-declares the
//! same catalog.

use std::mem;

use crate::catalog::{self, Catalog, Event, NumericValue};
use crate::codec::ascii::{self, AsciiLine};
use crate::codec::binary::{self, Decoded};
use crate::error::{OisError, Result};
use crate::log::LogSink;
use crate::protocol::wire_format::{client, CLIENT_VALUES, MAX_NAME_LENGTH};
use crate::protocol::Command;
use crate::transport::Transport;
use crate::value::{NumericType, Value};

use super::{ConnectionState, Framing, Gate, Session, StateMask};

/// The peripheral side of an OIS connection.
pub struct DeviceEndpoint {
    session: Session,
    pid: u32,
    vid: u32,
    requested_version: u32,
    requested_binary: bool,
    syn_sent: bool,
    game_version: u32,
    game_name: String,
    catalog: Catalog,
    queued_outputs: Vec<usize>,
    queued_events: Vec<usize>,
}

impl DeviceEndpoint {
    /// Create a device endpoint. `local_name`, `pid` and `vid` identify the
    /// device to version-2 hosts. The endpoint offers protocol version 2 in
    /// ASCII framing by default; see [`request_version`](Self::request_version)
    /// and [`request_binary`](Self::request_binary).
    pub fn new(
        transport: Box<dyn Transport>,
        local_name: impl Into<String>,
        pid: u32,
        vid: u32,
    ) -> Self {
        Self {
            session: Session::new(transport, local_name.into()),
            pid,
            vid,
            requested_version: 2,
            requested_binary: false,
            syn_sent: false,
            game_version: 0,
            game_name: String::new(),
            catalog: Catalog::default(),
            queued_outputs: Vec::new(),
            queued_events: Vec::new(),
        }
    }

    /// Protocol version to offer in the next handshake (1 or 2).
    pub fn request_version(&mut self, version: u32) -> Result<()> {
        if !(1..=2).contains(&version) {
            return Err(OisError::Protocol(format!(
                "unsupported protocol version {version}"
            )));
        }
        self.requested_version = version;
        Ok(())
    }

    /// Ask for binary framing in the next handshake. Version 1 is ASCII
    /// only; the request is ignored for v1 offers.
    pub fn request_binary(&mut self, binary: bool) {
        self.requested_binary = binary;
    }

    /// Drive the connection: reconnect and offer `SYN` if needed, drain and
    /// apply inbound commands, then flush queued values and events. Never
    /// fails; faults are reported through the log hook and state.
    pub fn poll(&mut self) {
        self.connect_and_poll();

        if self.session.transport.is_connected()
            && self.session.state == ConnectionState::Handshaking
            && !self.syn_sent
        {
            self.session.log.info(format_args!(
                "-> SYN: {}/{}",
                self.requested_version,
                if self.offers_binary() { "B" } else { "A" }
            ));
            self.session
                .send_syn(self.requested_version, self.offers_binary());
            self.syn_sent = true;
        }

        if self.session.state == ConnectionState::Active {
            let queued = mem::take(&mut self.queued_outputs);
            for index in queued {
                match self.catalog.outputs.get(index) {
                    Some(value) => self.session.send_value(value, &CLIENT_VALUES),
                    None => self
                        .session
                        .log
                        .assertion(format_args!("queued output index {index} out of range")),
                }
            }
            let events = mem::take(&mut self.queued_events);
            for index in events {
                match self.catalog.events.get(index) {
                    Some(event) => self.session.send_event_fired(event),
                    None => self
                        .session
                        .log
                        .assertion(format_args!("queued event index {index} out of range")),
                }
            }
        }
    }

    /// Name the host reported in a v2 `ACK` (empty before then).
    pub fn game_name(&self) -> &str {
        &self.game_name
    }

    /// Version the host reported in a v2 `ACK` (0 before then).
    pub fn game_version(&self) -> u32 {
        self.game_version
    }

    /// A handshake has completed (any state past `Handshaking`).
    pub fn connecting(&self) -> bool {
        self.session.state != ConnectionState::Handshaking
    }

    /// Catalog declared, value traffic permitted.
    pub fn connected(&self) -> bool {
        self.session.state == ConnectionState::Active
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state
    }

    pub fn protocol_version(&self) -> u32 {
        self.session.protocol_version
    }

    pub fn binary(&self) -> bool {
        self.session.binary
    }

    /// Registered inputs (host → device values), in registration order.
    pub fn inputs(&self) -> &[NumericValue] {
        self.catalog.inputs()
    }

    /// Registered outputs (device → host values), in registration order.
    pub fn outputs(&self) -> &[NumericValue] {
        self.catalog.outputs()
    }

    /// Registered events, in registration order.
    pub fn events(&self) -> &[Event] {
        self.catalog.events()
    }

    /// Register an input channel (a value the host will send us).
    pub fn register_input(
        &mut self,
        name: impl Into<String>,
        channel: u16,
        ty: NumericType,
    ) -> Result<()> {
        let name = validate_name(name.into())?;
        if catalog::find_channel(&self.catalog.inputs, channel).is_some() {
            return Err(OisError::DuplicateChannel(channel));
        }
        self.catalog
            .inputs
            .push(NumericValue::new(name, channel, ty));
        if self.declares_late() {
            let value = &self.catalog.inputs[self.catalog.inputs.len() - 1];
            self.session.send_numeric_decl(value, false);
        }
        Ok(())
    }

    /// Register an output channel (a value we will report to the host).
    /// Outputs require protocol version 2.
    pub fn register_output(
        &mut self,
        name: impl Into<String>,
        channel: u16,
        ty: NumericType,
    ) -> Result<()> {
        let name = validate_name(name.into())?;
        if catalog::find_channel(&self.catalog.outputs, channel).is_some() {
            return Err(OisError::DuplicateChannel(channel));
        }
        self.catalog
            .outputs
            .push(NumericValue::new(name, channel, ty));
        if self.declares_late() {
            let value = &self.catalog.outputs[self.catalog.outputs.len() - 1];
            self.session.send_numeric_decl(value, true);
        }
        Ok(())
    }

    /// Register an event channel.
    pub fn register_event(&mut self, name: impl Into<String>, channel: u16) -> Result<()> {
        let name = validate_name(name.into())?;
        if catalog::find_channel(&self.catalog.events, channel).is_some() {
            return Err(OisError::DuplicateChannel(channel));
        }
        self.catalog.events.push(Event { channel, name });
        if self.declares_late() {
            let event = &self.catalog.events[self.catalog.events.len() - 1];
            self.session.send_event_decl(event);
        }
        Ok(())
    }

    /// Update an output channel's value; the change is sent on the next
    /// `poll`. Returns false when no output with that channel exists.
    /// Setting the current value again queues nothing.
    pub fn set_output(&mut self, channel: u16, value: Value) -> bool {
        catalog::set_value_and_enqueue(
            &mut self.catalog.outputs,
            channel,
            value,
            &mut self.queued_outputs,
        )
    }

    /// Queue an event to fire on the next `poll`, in FIFO order. Returns
    /// false when no event with that channel exists.
    pub fn trigger_event(&mut self, channel: u16) -> bool {
        let Some(index) = catalog::find_channel(&self.catalog.events, channel) else {
            return false;
        };
        self.queued_events.push(index);
        true
    }

    /// Toggle a registered input's active flag and tell the host (`TNI`,
    /// protocol version 2). Returns false when no input with that channel
    /// exists.
    pub fn set_input_active(&mut self, channel: u16, active: bool) -> bool {
        let Some(index) = catalog::find_channel(&self.catalog.inputs, channel) else {
            return false;
        };
        self.catalog.inputs[index].active = active;
        if self.session.state != ConnectionState::Handshaking && self.session.protocol_version >= 2
        {
            self.session.send_toggle(channel, active);
        }
        true
    }

    /// Send a free-form debug line to the host's diagnostic stream.
    /// Dropped while the link is down.
    pub fn send_debug(&mut self, text: &str) {
        if self.session.transport.is_connected() {
            self.session.send_debug(text);
        }
    }

    /// Install a log hook. Defaults to forwarding into `tracing`.
    pub fn set_log_sink(&mut self, sink: Box<dyn LogSink>) {
        self.session.log.set_sink(sink);
    }

    // -- connection driving ------------------------------------------------

    fn offers_binary(&self) -> bool {
        self.requested_binary && self.requested_version >= 2
    }

    /// Whether a late registration must be declared immediately (catalog
    /// extensions are allowed while Active from protocol version 2 on).
    fn declares_late(&self) -> bool {
        self.session.state == ConnectionState::Active && self.session.protocol_version > 1
    }

    fn connect_and_poll(&mut self) {
        if !self.session.transport.is_connected() {
            if self.session.state != ConnectionState::Handshaking {
                self.clear_state();
            }
            self.syn_sent = false;
            if let Err(err) = self.session.transport.connect() {
                self.session
                    .log
                    .warn(format_args!("Connect failed: {err}"));
            }
            return;
        }
        loop {
            match self
                .session
                .buffer
                .fill_from(self.session.transport.as_mut())
            {
                Ok(0) => break,
                Ok(_) => self.process_commands(),
                Err(err) => {
                    self.session.log.warn(format_args!("Read failed: {err}"));
                    self.session.transport.disconnect();
                    break;
                }
            }
        }
    }

    fn process_commands(&mut self) {
        let mut consumed = false;
        // The framing flag is re-read per frame: the ACK that latches
        // binary framing may share the buffer with the frames after it.
        loop {
            if self.session.buffer.is_empty() {
                break;
            }
            if self.session.binary {
                match binary::decode_from_host(self.session.buffer.data()) {
                    Decoded::NeedMore => break,
                    Decoded::AsciiHandshake { .. } => {
                        // The server table has no ASCII fallback; treat it
                        // as unreachable noise.
                        self.session
                            .log
                            .assertion(format_args!("ASCII fallback in server framing"));
                        self.session.buffer.consume(1);
                        consumed = true;
                    }
                    Decoded::Unknown { byte } => {
                        self.session
                            .log
                            .warn(format_args!("Unknown command: 0x{byte:02x}"));
                        self.session.buffer.consume(1);
                        consumed = true;
                    }
                    Decoded::Frame { command, length } => {
                        self.session.buffer.consume(length);
                        consumed = true;
                        self.apply(command, Framing::Binary);
                    }
                }
            } else {
                let data = self.session.buffer.data();
                let Some(pos) = data.iter().position(|&b| b == b'\n') else {
                    break;
                };
                let parsed = ascii::parse_line(&data[..pos]);
                if parsed == AsciiLine::Unknown {
                    self.session.log.warn(format_args!(
                        "Unknown command: {}",
                        String::from_utf8_lossy(&data[..pos])
                    ));
                }
                self.session.buffer.consume(pos + 1);
                consumed = true;
                if let AsciiLine::Command(command) = parsed {
                    self.apply(command, Framing::Ascii);
                }
            }
        }

        if !consumed && self.session.buffer.is_full() {
            self.session.log.warn(format_args!(
                "Command buffer is full without a valid command present! Ending..."
            ));
            self.session.log.info(format_args!("-> END"));
            self.session.send_end(Some(client::END));
            self.clear_state();
        }
    }

    fn gate(&mut self, allowed: StateMask, label: &str, min_version: u32) -> bool {
        match self.session.expect_state(allowed, label, min_version) {
            Gate::Pass => true,
            Gate::Reject { reset_handshake } => {
                if reset_handshake {
                    self.clear_state();
                    self.session.send_end(Some(client::END));
                }
                false
            }
        }
    }

    fn apply(&mut self, command: Command, framing: Framing) {
        let label = command.label();
        let binary = framing == Framing::Binary;
        match command {
            Command::Ack {
                game_version,
                game_name,
            } => {
                if !self.gate(StateMask::HANDSHAKING, label, 1) {
                    return;
                }
                self.session
                    .log
                    .info(format_args!("<- ACK: {game_version} {game_name}"));
                self.game_version = game_version;
                self.game_name = game_name;
                self.session.protocol_version = self.requested_version;
                self.session.binary = self.offers_binary();
                self.session.state = ConnectionState::Synchronisation;
                self.send_declarations();
                self.session.state = ConnectionState::Active;
            }
            Command::Deny => {
                if !self.gate(StateMask::HANDSHAKING, label, 1) {
                    return;
                }
                self.session.log.info(format_args!("<- DEN"));
                self.clear_state();
            }
            Command::Value { channel, raw } => {
                if !self.gate(StateMask::ACTIVE, label, if binary { 2 } else { 1 }) {
                    return;
                }
                match catalog::find_channel(&self.catalog.inputs, channel) {
                    Some(index) => {
                        let input = &mut self.catalog.inputs[index];
                        input.value = Value::from_raw(input.ty, raw);
                        self.session.log.info(format_args!(
                            "<- {channel}({}) = {}",
                            input.name, input.value
                        ));
                    }
                    None => self.session.log.warn(format_args!(
                        "Received key/value message for unregistered channel {channel}"
                    )),
                }
            }
            Command::End => {
                self.session.log.info(format_args!("<- END"));
                if self.session.state != ConnectionState::Handshaking {
                    self.clear_state();
                }
                self.session.transport.disconnect();
            }
            _ => {
                self.session
                    .log
                    .warn(format_args!("Unknown command: {label}"));
            }
        }
    }

    /// Declare the registered catalog to the host, then activate. Runs in
    /// Synchronisation, right after a successful `ACK`.
    fn send_declarations(&mut self) {
        let version = self.session.protocol_version;
        if version >= 2 {
            self.session.send_pid(self.pid, self.vid);
        }
        for event in &self.catalog.events {
            self.session.send_event_decl(event);
        }
        for value in &self.catalog.inputs {
            self.session.send_numeric_decl(value, false);
        }
        if version >= 2 {
            for value in &self.catalog.outputs {
                self.session.send_numeric_decl(value, true);
            }
        } else if !self.catalog.outputs.is_empty() {
            self.session.log.warn(format_args!(
                "Output channels require protocol version 2; skipping {} declarations",
                self.catalog.outputs.len()
            ));
        }
        self.session.log.info(format_args!("-> ACT"));
        self.session.send_act();
    }

    /// Reset negotiated state but keep the registered catalog: it is local
    /// configuration, re-declared on the next handshake. Current values are
    /// kept too, so they flush once the link is Active again.
    fn clear_state(&mut self) {
        self.session.reset_wire();
        self.syn_sent = false;
        self.game_version = 0;
        self.game_name.clear();
        self.queued_outputs.clear();
        self.queued_events.clear();
    }
}

impl std::fmt::Debug for DeviceEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceEndpoint")
            .field("session", &self.session)
            .field("pid", &self.pid)
            .field("vid", &self.vid)
            .finish_non_exhaustive()
    }
}

/// Names travel inside both framings: cap the length and refuse the bytes
/// that would corrupt a frame.
fn validate_name(name: String) -> Result<String> {
    if name.len() > MAX_NAME_LENGTH {
        return Err(OisError::NameTooLong(name.len()));
    }
    if name.bytes().any(|b| b == b'\n' || b == b'\0' || b == b',') {
        return Err(OisError::InvalidName(name));
    }
    Ok(name)
}
