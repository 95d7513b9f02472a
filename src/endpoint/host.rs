//! Host-side endpoint: talks to a peripheral device.
//!
//! The host answers the device's handshake, receives the declared catalog
//! during Synchronisation, and — once Active — receives output values and
//! fired events while sending input values back. Note the asymmetry: value
//! frames arriving at the host update its **outputs** list (the device
//! reporting knob positions), while the VAL frames the host emits carry
//! entries of its **inputs** list (state for the device to display).

use std::mem;

use crate::catalog::{self, Catalog, Event, NumericValue};
use crate::codec::ascii::{self, AsciiLine};
use crate::codec::binary::{self, Decoded};
use crate::log::LogSink;
use crate::protocol::wire_format::{DEFAULT_PID, DEFAULT_VID, SERVER_VALUES};
use crate::protocol::Command;
use crate::transport::Transport;
use crate::value::Value;

use super::{ConnectionState, Framing, Gate, Session, StateMask};

/// The application side of an OIS connection.
pub struct HostEndpoint {
    session: Session,
    game_version: u32,
    game_name: String,
    pid: u32,
    vid: u32,
    device_name_override: String,
    catalog: Catalog,
    queued_inputs: Vec<usize>,
    received_events: Vec<usize>,
}

impl HostEndpoint {
    /// Create a host endpoint. `local_name` is the fallback device name
    /// until a `PID` arrives; `game_version` and `game_name` are reported
    /// to version-2 devices in the `ACK`.
    pub fn new(
        transport: Box<dyn Transport>,
        local_name: impl Into<String>,
        game_version: u32,
        game_name: impl Into<String>,
    ) -> Self {
        Self {
            session: Session::new(transport, local_name.into()),
            game_version,
            game_name: game_name.into(),
            pid: DEFAULT_PID,
            vid: DEFAULT_VID,
            device_name_override: String::new(),
            catalog: Catalog::default(),
            queued_inputs: Vec::new(),
            received_events: Vec::new(),
        }
    }

    /// Drive the connection: reconnect if needed, drain and apply inbound
    /// commands, then flush queued input values. Never fails; faults are
    /// reported through the log hook and the connection state.
    pub fn poll(&mut self) {
        self.connect_and_poll();

        if self.session.state == ConnectionState::Active {
            let queued = mem::take(&mut self.queued_inputs);
            for index in queued {
                match self.catalog.inputs.get(index) {
                    Some(value) => self.session.send_value(value, &SERVER_VALUES),
                    None => self
                        .session
                        .log
                        .assertion(format_args!("queued input index {index} out of range")),
                }
            }
        }
    }

    /// Device name: the `PID` override when one arrived, else the
    /// constructor-provided name.
    pub fn device_name(&self) -> &str {
        if self.device_name_override.is_empty() {
            &self.session.local_name
        } else {
            &self.device_name_override
        }
    }

    pub fn product_id(&self) -> u32 {
        self.pid
    }

    pub fn vendor_id(&self) -> u32 {
        self.vid
    }

    /// A handshake has begun (any state past `Handshaking`).
    pub fn connecting(&self) -> bool {
        self.session.state != ConnectionState::Handshaking
    }

    /// Catalog complete, value traffic permitted.
    pub fn connected(&self) -> bool {
        self.session.state == ConnectionState::Active
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state
    }

    /// Negotiated protocol version (1 until a handshake completes).
    pub fn protocol_version(&self) -> u32 {
        self.session.protocol_version
    }

    /// Whether binary framing is live.
    pub fn binary(&self) -> bool {
        self.session.binary
    }

    /// Declared inputs (host → device), in declaration order.
    pub fn inputs(&self) -> &[NumericValue] {
        self.catalog.inputs()
    }

    /// Declared outputs (device → host), in declaration order.
    pub fn outputs(&self) -> &[NumericValue] {
        self.catalog.outputs()
    }

    /// Declared events, in declaration order.
    pub fn events(&self) -> &[Event] {
        self.catalog.events()
    }

    /// Update an input channel's value; the change is sent on the next
    /// `poll`. Returns false when no input with that channel exists.
    /// Setting the current value again queues nothing.
    pub fn set_input(&mut self, channel: u16, value: Value) -> bool {
        catalog::set_value_and_enqueue(
            &mut self.catalog.inputs,
            channel,
            value,
            &mut self.queued_inputs,
        )
    }

    /// Drain received events in arrival order, invoking `f` for each.
    /// Returns whether any were drained.
    pub fn pop_events<F: FnMut(&Event)>(&mut self, mut f: F) -> bool {
        if self.received_events.is_empty() {
            return false;
        }
        for &index in &self.received_events {
            match self.catalog.events.get(index) {
                Some(event) => f(event),
                None => self
                    .session
                    .log
                    .assertion(format_args!("received event index {index} out of range")),
            }
        }
        self.received_events.clear();
        true
    }

    /// Install a log hook. Defaults to forwarding into `tracing`.
    pub fn set_log_sink(&mut self, sink: Box<dyn LogSink>) {
        self.session.log.set_sink(sink);
    }

    // -- connection driving ------------------------------------------------

    fn connect_and_poll(&mut self) {
        if !self.session.transport.is_connected() {
            if self.session.state != ConnectionState::Handshaking {
                self.clear_state();
            }
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
        // The framing flag is re-read per frame: a SYN that switches the
        // session to binary may share the buffer with the frames after it.
        loop {
            if self.session.buffer.is_empty() {
                break;
            }
            if self.session.binary {
                match binary::decode_from_device(self.session.buffer.data()) {
                    Decoded::NeedMore => break,
                    Decoded::AsciiHandshake { .. } => {
                        self.session
                            .log
                            .info(format_args!("Device reverted to ASCII; resetting"));
                        self.clear_state();
                        return;
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
            self.session.send_end(None);
            self.clear_state();
        }
    }

    /// Precondition gate; on a handshake-state violation the endpoint is
    /// reset and an `END` answered.
    fn gate(&mut self, allowed: StateMask, label: &str, min_version: u32) -> bool {
        match self.session.expect_state(allowed, label, min_version) {
            Gate::Pass => true,
            Gate::Reject { reset_handshake } => {
                if reset_handshake {
                    self.clear_state();
                    self.session.send_end(None);
                }
                false
            }
        }
    }

    fn apply(&mut self, command: Command, framing: Framing) {
        let label = command.label();
        let binary = framing == Framing::Binary;
        match command {
            Command::Syn {
                version,
                binary: wants_binary,
            } => self.on_syn(version, wants_binary),
            Command::Pid { pid, vid, name } => {
                if !self.gate(StateMask::SYNCHRONISATION, label, 2) {
                    return;
                }
                self.pid = pid;
                self.vid = vid;
                self.session
                    .log
                    .info(format_args!("<- PID: {pid}/{vid} {name}"));
                self.device_name_override = name;
            }
            Command::EventDecl { channel, name } => {
                let allowed = if binary || self.session.protocol_version > 1 {
                    StateMask::SYNCHRONISATION | StateMask::ACTIVE
                } else {
                    StateMask::SYNCHRONISATION
                };
                if !self.gate(allowed, label, if binary { 2 } else { 1 }) {
                    return;
                }
                if catalog::find_channel(&self.catalog.events, channel).is_some() {
                    self.session.log.warn(format_args!(
                        "Ignoring duplicate event declaration for channel {channel}"
                    ));
                    return;
                }
                self.session
                    .log
                    .info(format_args!("<- CMD: {channel} {name}"));
                self.catalog.events.push(Event { channel, name });
            }
            Command::NumericDecl {
                channel,
                name,
                ty,
                output,
            } => {
                let allowed = if self.session.protocol_version > 1 {
                    StateMask::SYNCHRONISATION | StateMask::ACTIVE
                } else {
                    StateMask::SYNCHRONISATION
                };
                let min_version = if binary || output { 2 } else { 1 };
                if !self.gate(allowed, label, min_version) {
                    return;
                }
                let list = if output {
                    &mut self.catalog.outputs
                } else {
                    &mut self.catalog.inputs
                };
                if catalog::find_channel(list, channel).is_some() {
                    self.session.log.warn(format_args!(
                        "Ignoring duplicate declaration for channel {channel}"
                    ));
                    return;
                }
                self.session.log.info(format_args!(
                    "<- NIO: {channel} {name} ({} {ty:?})",
                    if output { "Out" } else { "In" }
                ));
                list.push(NumericValue::new(name, channel, ty));
            }
            Command::ToggleInput { channel, active } => {
                if !self.gate(StateMask::SYNCHRONISATION | StateMask::ACTIVE, label, 2) {
                    return;
                }
                match catalog::find_channel(&self.catalog.inputs, channel) {
                    Some(index) => {
                        let input = &mut self.catalog.inputs[index];
                        input.active = active;
                        self.session
                            .log
                            .info(format_args!("<- TNI {channel} ({})", input.name));
                    }
                    None => self
                        .session
                        .log
                        .info(format_args!("<- TNI {channel} (UNKNOWN CHANNEL)")),
                }
            }
            Command::Activate => {
                if !self.gate(StateMask::SYNCHRONISATION, label, if binary { 2 } else { 1 }) {
                    return;
                }
                self.session.state = ConnectionState::Active;
                self.session.log.info(format_args!("<- ACT"));
            }
            Command::EventFired { channel } => {
                if !self.gate(StateMask::ACTIVE, label, if binary { 2 } else { 1 }) {
                    return;
                }
                match catalog::find_channel(&self.catalog.events, channel) {
                    Some(index) => {
                        self.received_events.push(index);
                        self.session.log.info(format_args!(
                            "<- EXC: {channel} ({})",
                            self.catalog.events[index].name
                        ));
                    }
                    None => self
                        .session
                        .log
                        .info(format_args!("<- EXC: {channel} (INVALID CHANNEL)")),
                }
            }
            Command::Value { channel, raw } => {
                if !self.gate(StateMask::ACTIVE, label, if binary { 2 } else { 1 }) {
                    return;
                }
                match catalog::find_channel(&self.catalog.outputs, channel) {
                    Some(index) => {
                        let output = &mut self.catalog.outputs[index];
                        output.value = Value::from_raw(output.ty, raw);
                        self.session.log.info(format_args!(
                            "<- {channel}({}) = {}",
                            output.name, output.value
                        ));
                    }
                    None => self.session.log.warn(format_args!(
                        "Received key/value message for unregistered channel {channel}"
                    )),
                }
            }
            Command::Debug { text } => {
                self.session.log.info(format_args!("<- DBG: {text}"));
            }
            Command::End => {
                self.session.log.info(format_args!("<- END"));
                if self.session.state != ConnectionState::Handshaking {
                    self.clear_state();
                }
                self.session.transport.disconnect();
            }
            Command::Ack { .. } | Command::Deny => {
                self.session
                    .log
                    .warn(format_args!("Unknown command: {label}"));
            }
        }
    }

    fn on_syn(&mut self, version: i64, binary: bool) {
        // A SYN outside Handshaking is an asymmetric reconnect: reset and
        // process the handshake from the clean state.
        match self.session.expect_state(StateMask::HANDSHAKING, "SYN", 1) {
            Gate::Pass => {}
            Gate::Reject { .. } => self.clear_state(),
        }
        self.session.log.info(format_args!(
            "<- SYN: {version}/{}",
            if binary { "B" } else { "A" }
        ));
        // Version 1 is ASCII only; version 2 may be either framing.
        if !(version == 1 && binary) && (1..=2).contains(&version) {
            self.session.binary = binary;
            self.session.protocol_version = version as u32;
            self.session.state = ConnectionState::Synchronisation;
            match version {
                1 => self.session.send_ack_v1(),
                _ => self.session.send_ack(self.game_version, &self.game_name),
            }
            self.session.log.info(format_args!("-> ACK"));
        } else {
            self.session.log.info(format_args!("-> DEN"));
            self.session.send_deny();
            self.clear_state();
        }
    }

    /// Full reset: wire state, catalog, queues, identity. Registered
    /// declarations only exist on the device side, so the host forgets
    /// everything the connection taught it.
    fn clear_state(&mut self) {
        self.session.reset_wire();
        self.pid = DEFAULT_PID;
        self.vid = DEFAULT_VID;
        self.device_name_override.clear();
        self.catalog.clear();
        self.queued_inputs.clear();
        self.received_events.clear();
    }
}

impl std::fmt::Debug for HostEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostEndpoint")
            .field("session", &self.session)
            .field("inputs", &self.catalog.inputs().len())
            .field("outputs", &self.catalog.outputs().len())
            .field("events", &self.catalog.events().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LoopbackTransport;
    use crate::value::NumericType;

    /// Host wired to a raw far end standing in for the device.
    fn host_pair() -> (HostEndpoint, LoopbackTransport) {
        let (near, far) = LoopbackTransport::pair();
        let mut host = HostEndpoint::new(Box::new(near), "panel", 1, "OisHub");
        host.set_log_sink(Box::new(crate::log::NullSink));
        host.poll(); // first poll connects
        (host, far)
    }

    fn drain(far: &mut LoopbackTransport) -> Vec<u8> {
        let mut out = Vec::new();
        let mut chunk = [0u8; 256];
        loop {
            let n = far.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        out
    }

    #[test]
    fn test_ascii_v1_handshake() {
        let (mut host, mut far) = host_pair();
        far.write(b"SYN=1\n").unwrap();
        host.poll();

        assert_eq!(drain(&mut far), b"ACK\n");
        assert!(host.connecting());
        assert!(!host.connected());
        assert_eq!(host.protocol_version(), 1);
        assert!(!host.binary());
    }

    #[test]
    fn test_ascii_v2_binary_handshake() {
        let (mut host, mut far) = host_pair();
        far.write(b"SYN=2,B\n").unwrap();
        host.poll();

        assert_eq!(drain(&mut far), b"ACK=1,OisHub\n");
        assert!(host.binary());
        assert_eq!(host.protocol_version(), 2);
    }

    #[test]
    fn test_syn_v1_binary_is_denied() {
        let (mut host, mut far) = host_pair();
        far.write(b"SYN=1,B\n").unwrap();
        host.poll();

        assert_eq!(drain(&mut far), b"DEN\n");
        assert!(!host.connecting());
    }

    #[test]
    fn test_unsupported_version_is_denied() {
        let (mut host, mut far) = host_pair();
        far.write(b"SYN=3\n").unwrap();
        host.poll();

        assert_eq!(drain(&mut far), b"DEN\n");
        assert!(!host.connecting());
    }

    #[test]
    fn test_catalog_declaration_ascii() {
        let (mut host, mut far) = host_pair();
        far.write(b"SYN=1\n").unwrap();
        host.poll();
        far.write(b"CMD=Fire,7\nNIB=Lamp,3\nACT\n").unwrap();
        host.poll();

        assert!(host.connected());
        assert_eq!(host.events().len(), 1);
        assert_eq!(host.events()[0].channel, 7);
        assert_eq!(host.events()[0].name, "Fire");

        assert_eq!(host.inputs().len(), 1);
        let lamp = &host.inputs()[0];
        assert_eq!(lamp.channel, 3);
        assert_eq!(lamp.name, "Lamp");
        assert_eq!(lamp.ty, NumericType::Boolean);
        assert!(lamp.active);
        assert_eq!(lamp.value, Value::Boolean(false));
    }

    #[test]
    fn test_binary_value_updates_output() {
        let (mut host, mut far) = host_pair();
        far.write(b"SYN=2,B\n").unwrap();
        host.poll();
        drain(&mut far);

        // Declare output channel 5 and activate, all in binary.
        let mut decl = vec![0x02 | 0x10 | 0x40]; // NIO | Number | Output
        decl.extend_from_slice(&5u16.to_le_bytes());
        decl.extend_from_slice(b"Knob\0");
        decl.push(0x03); // ACT
        far.write(&decl).unwrap();
        host.poll();
        assert!(host.connected());

        // VAL_1: channel=5, value=3 → [0x38, 0x05].
        far.write(&[0x38, 0x05]).unwrap();
        host.poll();
        assert_eq!(host.outputs()[0].value, Value::Number(3));
    }

    #[test]
    fn test_binary_event_fire_and_pop() {
        let (mut host, mut far) = host_pair();
        far.write(b"SYN=2,B\n").unwrap();
        host.poll();
        drain(&mut far);

        let mut decl = vec![0x01]; // CMD
        decl.extend_from_slice(&2u16.to_le_bytes());
        decl.extend_from_slice(b"Fire\0");
        decl.push(0x03); // ACT
        far.write(&decl).unwrap();
        host.poll();

        // EXC_0 with channel=2: 0x0C | (2 << 4) = 0x2C.
        far.write(&[0x2C]).unwrap();
        host.poll();

        let mut seen = Vec::new();
        assert!(host.pop_events(|event| seen.push(event.clone())));
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].channel, 2);
        assert_eq!(seen[0].name, "Fire");

        // Drained: a second pop finds nothing.
        assert!(!host.pop_events(|_| panic!("no events expected")));
    }

    #[test]
    fn test_event_for_unknown_channel_is_ignored() {
        let (mut host, mut far) = host_pair();
        far.write(b"SYN=1\nCMD=Fire,7\nACT\n").unwrap();
        host.poll();
        far.write(b"EXC=99\n").unwrap();
        host.poll();
        assert!(!host.pop_events(|_| panic!("no events expected")));
    }

    #[test]
    fn test_set_input_queues_and_flushes() {
        let (mut host, mut far) = host_pair();
        far.write(b"SYN=1\nNIN=Altitude,9\nACT\n").unwrap();
        host.poll();
        drain(&mut far);

        assert!(host.set_input(9, Value::Number(-4200)));
        host.poll();
        assert_eq!(drain(&mut far), b"9=-4200\n");

        // Unchanged value: nothing goes out.
        assert!(host.set_input(9, Value::Number(-4200)));
        host.poll();
        assert!(drain(&mut far).is_empty());

        // Unknown channel is refused.
        assert!(!host.set_input(99, Value::Number(1)));
    }

    #[test]
    fn test_set_input_coalesces_to_final_value() {
        let (mut host, mut far) = host_pair();
        far.write(b"SYN=1\nNIN=Altitude,9\nACT\n").unwrap();
        host.poll();
        drain(&mut far);

        assert!(host.set_input(9, Value::Number(1)));
        assert!(host.set_input(9, Value::Number(2)));
        host.poll();
        // Two queue entries, both reading the final value at emission time.
        assert_eq!(drain(&mut far), b"9=2\n9=2\n");
    }

    #[test]
    fn test_binary_input_flush_uses_server_coding() {
        let (mut host, mut far) = host_pair();
        far.write(b"SYN=2,B\n").unwrap();
        host.poll();
        drain(&mut far);

        let mut decl = vec![0x02 | 0x10]; // NIO | Number (input)
        decl.extend_from_slice(&9u16.to_le_bytes());
        decl.extend_from_slice(b"Altitude\0");
        decl.push(0x03);
        far.write(&decl).unwrap();
        host.poll();

        assert!(host.set_input(9, Value::Number(3)));
        host.poll();
        // Server coding, shift 3: 0x01 | (3 << 3) = 0x19, channel 9.
        assert_eq!(drain(&mut far), &[0x19, 0x09]);
    }

    #[test]
    fn test_end_resets_and_disconnects() {
        let (mut host, mut far) = host_pair();
        far.write(b"SYN=1\nNIB=Lamp,3\nACT\n").unwrap();
        host.poll();
        assert!(host.connected());

        far.write(b"END\n").unwrap();
        host.poll();
        assert!(!host.connecting());
        assert!(host.inputs().is_empty());
        assert!(host.events().is_empty());
        assert!(!far.is_connected());
    }

    #[test]
    fn test_value_in_handshaking_resets_with_end() {
        let (mut host, mut far) = host_pair();
        far.write(b"17=1\n").unwrap();
        host.poll();
        // The violation in Handshaking answers END.
        assert_eq!(drain(&mut far), b"END\n");
        assert!(!host.connecting());
    }

    #[test]
    fn test_resyn_mid_session_restarts_handshake() {
        let (mut host, mut far) = host_pair();
        far.write(b"SYN=1\nNIB=Lamp,3\nACT\n").unwrap();
        host.poll();
        assert!(host.connected());
        drain(&mut far);

        // Device reboots and handshakes again: catalog is rebuilt.
        far.write(b"SYN=1\n").unwrap();
        host.poll();
        assert!(host.connecting());
        assert!(!host.connected());
        assert!(host.inputs().is_empty());
        assert_eq!(drain(&mut far), b"ACK\n");
    }

    #[test]
    fn test_binary_ascii_fallback_resets() {
        let (mut host, mut far) = host_pair();
        far.write(b"SYN=2,B\n").unwrap();
        host.poll();
        assert!(host.binary());
        drain(&mut far);

        // Device rebooted into ASCII and sends a fresh SYN.
        far.write(b"SYN=1\n").unwrap();
        host.poll();
        assert!(!host.binary());
        assert!(!host.connecting());

        // The dropped line is re-sent by a real device; the next one lands.
        far.write(b"SYN=1\n").unwrap();
        host.poll();
        assert!(host.connecting());
        assert_eq!(drain(&mut far), b"ACK\n");
    }

    #[test]
    fn test_pid_overrides_device_name() {
        let (mut host, mut far) = host_pair();
        assert_eq!(host.device_name(), "panel");
        far.write(b"SYN=2\nPID=77,88,Throttle Quadrant\n").unwrap();
        host.poll();
        assert_eq!(host.device_name(), "Throttle Quadrant");
        assert_eq!(host.product_id(), 77);
        assert_eq!(host.vendor_id(), 88);
        drain(&mut far);

        // Reset restores the defaults.
        far.write(b"END\n").unwrap();
        host.poll();
        assert_eq!(host.device_name(), "panel");
        assert_eq!(host.product_id(), DEFAULT_PID);
    }

    #[test]
    fn test_tni_toggles_input_without_activating() {
        let (mut host, mut far) = host_pair();
        far.write(b"SYN=2\nNIB=Lamp,3\n").unwrap();
        host.poll();
        assert!(host.inputs()[0].active);

        far.write(b"TNI=3,0\n").unwrap();
        host.poll();
        assert!(!host.inputs()[0].active);
        // TNI alone must not activate the session.
        assert!(!host.connected());

        far.write(b"TNI=3,1\nACT\n").unwrap();
        host.poll();
        assert!(host.inputs()[0].active);
        assert!(host.connected());
    }

    #[test]
    fn test_duplicate_declaration_is_ignored() {
        let (mut host, mut far) = host_pair();
        far.write(b"SYN=1\nNIB=Lamp,3\nNIN=Other,3\nACT\n").unwrap();
        host.poll();
        assert_eq!(host.inputs().len(), 1);
        assert_eq!(host.inputs()[0].ty, NumericType::Boolean);
    }

    #[test]
    fn test_value_for_unregistered_channel_is_ignored() {
        let (mut host, mut far) = host_pair();
        far.write(b"SYN=1\nNOB=Switch,4\nACT\n").unwrap();
        host.poll();
        far.write(b"99=1\n").unwrap();
        host.poll();
        assert_eq!(host.outputs()[0].value, Value::Boolean(false));
    }

    #[test]
    fn test_debug_reaches_the_log_hook() {
        use crate::log::test_support::RecordingSink;
        use crate::log::LogCategory;

        let (mut host, mut far) = host_pair();
        let (sink, lines) = RecordingSink::new();
        host.set_log_sink(sink);

        far.write(b"DBG=boot ok\n").unwrap();
        host.poll();

        let lines = lines.lock().unwrap();
        assert!(lines
            .iter()
            .any(|(category, message)| *category == LogCategory::Info
                && message == "<- DBG: boot ok"));
    }

    #[test]
    fn test_buffer_overflow_forces_reset() {
        use crate::protocol::COMMAND_BUFFER_SIZE;

        let (mut host, mut far) = host_pair();
        far.write(b"SYN=1\n").unwrap();
        host.poll();
        drain(&mut far);

        // A newline-free flood fills the buffer without a valid command.
        far.write(&vec![b'x'; COMMAND_BUFFER_SIZE + 16]).unwrap();
        host.poll();
        assert!(!host.connecting());
        assert_eq!(drain(&mut far), b"END\n");
    }

    #[test]
    fn test_transport_drop_resets_state() {
        let (mut host, mut far) = host_pair();
        far.write(b"SYN=1\nACT\n").unwrap();
        host.poll();
        assert!(host.connected());

        far.disconnect();
        host.poll();
        assert!(!host.connected());
        assert!(!host.connecting());
        // The reconnect attempt brings the link back up for a new handshake.
        assert!(far.is_connected());
    }
}
