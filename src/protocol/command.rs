//! One decoded protocol command.
//!
//! Both framings decode to the same [`Command`]; which variants an endpoint
//! accepts, and in which connection states, is the endpoint's business.

use crate::value::NumericType;

/// A complete protocol command, decoded from either framing.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `SYN=<version>[,<mode>]` — device opens a handshake.
    Syn { version: i64, binary: bool },
    /// `ACK` (v1) or `ACK=<gameVersion>,<gameName>` (v2) — host accepts.
    Ack { game_version: u32, game_name: String },
    /// `DEN` — host rejects the offered version.
    Deny,
    /// `PID=<pid>,<vid>,<name>` — device identification.
    Pid { pid: u32, vid: u32, name: String },
    /// `CMD=<name>,<channel>` — event declaration.
    EventDecl { channel: u16, name: String },
    /// `NIB/NIN/NIF/NOB/NON/NOF=<name>,<channel>` — numeric declaration.
    NumericDecl {
        channel: u16,
        name: String,
        ty: NumericType,
        output: bool,
    },
    /// `TNI=<channel>,<active>` — toggle a numeric input's active flag.
    ToggleInput { channel: u16, active: bool },
    /// `ACT` — catalog complete, value traffic may begin.
    Activate,
    /// `EXC=<channel>` — device fired an event.
    EventFired { channel: u16 },
    /// `<channel>=<rawValue>` — value update for a numeric channel.
    Value { channel: u16, raw: u16 },
    /// `DBG=<text>` — device debug text.
    Debug { text: String },
    /// `END` — tear the session down.
    End,
}

impl Command {
    /// Short opcode label used in diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Command::Syn { .. } => "SYN",
            Command::Ack { .. } => "ACK",
            Command::Deny => "DEN",
            Command::Pid { .. } => "PID",
            Command::EventDecl { .. } => "CMD",
            Command::NumericDecl { .. } => "NIO",
            Command::ToggleInput { .. } => "TNI",
            Command::Activate => "ACT",
            Command::EventFired { .. } => "EXC",
            Command::Value { .. } => "VAL",
            Command::Debug { .. } => "DBG",
            Command::End => "END",
        }
    }
}
