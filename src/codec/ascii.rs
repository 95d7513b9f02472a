//! ASCII framing: `\n`-terminated command lines.
//!
//! A line is either a three-letter opcode with a comma-separated payload
//! (`SYN=2,B`), a bare opcode (`ACT`), or a key=value line whose key starts
//! with a digit (`17=-4200`). Opcodes are matched by their 32-bit
//! little-endian tag (opcode plus `=` or NUL).
//!
//! Numeric fields parse with `atoi` leniency: optional leading whitespace
//! and sign, then digits; an unparsable field reads 0. Junk after the
//! number is ignored. This keeps the parser total — line noise degrades to
//! warnings, never to errors.

use std::fmt::Write;

use crate::catalog::{Event, NumericValue};
use crate::protocol::command::Command;
use crate::protocol::wire_format::{fourcc, tag, MAX_NAME_LENGTH};
use crate::value::NumericType;

/// Result of parsing one `\n`-terminated line (terminator excluded).
#[derive(Debug, PartialEq)]
pub enum AsciiLine {
    /// Blank line; silently skipped.
    Empty,
    /// A recognized command.
    Command(Command),
    /// Unrecognized opcode or malformed key; warned about and discarded.
    Unknown,
}

/// Parse one complete line (without its `\n`).
pub fn parse_line(line: &[u8]) -> AsciiLine {
    if line.is_empty() {
        return AsciiLine::Empty;
    }
    if line[0].is_ascii_digit() {
        return parse_key_value(line);
    }

    let line_tag = match line.len() {
        0..=2 => 0,
        3 => fourcc(&[line[0], line[1], line[2], 0]),
        _ => fourcc(&[line[0], line[1], line[2], line[3]]),
    };
    let payload = if line.len() > 4 { &line[4..] } else { &[][..] };

    match line_tag {
        tag::SYN => {
            let (version_field, mode) = split_field(payload);
            AsciiLine::Command(Command::Syn {
                version: parse_int(version_field),
                binary: mode.first() == Some(&b'B'),
            })
        }
        tag::ACK => AsciiLine::Command(Command::Ack {
            game_version: 0,
            game_name: String::new(),
        }),
        tag::ACK_PAYLOAD => {
            let (version_field, name) = split_field(payload);
            AsciiLine::Command(Command::Ack {
                game_version: parse_int(version_field).clamp(0, u32::MAX as i64) as u32,
                game_name: lossy_name(name),
            })
        }
        tag::DEN => AsciiLine::Command(Command::Deny),
        tag::PID => {
            let (pid_field, rest) = split_field(payload);
            let (vid_field, name) = split_field(rest);
            AsciiLine::Command(Command::Pid {
                pid: parse_int(pid_field) as u32,
                vid: parse_int(vid_field) as u32,
                name: lossy_name(name),
            })
        }
        tag::CMD => {
            let (name, channel_field) = split_field(payload);
            AsciiLine::Command(Command::EventDecl {
                channel: parse_int(channel_field) as u16,
                name: lossy_name(name),
            })
        }
        tag::NIB | tag::NIN | tag::NIF | tag::NOB | tag::NON | tag::NOF => {
            let output = matches!(line_tag, tag::NOB | tag::NON | tag::NOF);
            let ty = match line_tag {
                tag::NIN | tag::NON => NumericType::Number,
                tag::NIF | tag::NOF => NumericType::Fraction,
                _ => NumericType::Boolean,
            };
            let (name, channel_field) = split_field(payload);
            AsciiLine::Command(Command::NumericDecl {
                channel: parse_int(channel_field) as u16,
                name: lossy_name(name),
                ty,
                output,
            })
        }
        tag::TNI => {
            let (channel_field, active_field) = split_field(payload);
            let channel = parse_int(channel_field);
            if !(0..=0xFFFF).contains(&channel) {
                return AsciiLine::Unknown;
            }
            AsciiLine::Command(Command::ToggleInput {
                channel: channel as u16,
                active: parse_int(active_field) != 0,
            })
        }
        tag::ACT => AsciiLine::Command(Command::Activate),
        tag::EXC => {
            let channel = parse_int(payload);
            if !(0..=0xFFFF).contains(&channel) {
                return AsciiLine::Unknown;
            }
            AsciiLine::Command(Command::EventFired {
                channel: channel as u16,
            })
        }
        tag::DBG => AsciiLine::Command(Command::Debug {
            text: String::from_utf8_lossy(payload).into_owned(),
        }),
        tag::END => AsciiLine::Command(Command::End),
        _ => AsciiLine::Unknown,
    }
}

/// `<channel>=<rawValue>`; the raw word is a signed decimal, truncated to
/// 16 bits like the rest of the wire.
fn parse_key_value(line: &[u8]) -> AsciiLine {
    let (key, value_field) = match line.iter().position(|&b| b == b'=') {
        Some(pos) => (&line[..pos], &line[pos + 1..]),
        None => (line, &[][..]),
    };
    let channel = parse_int(key);
    if !(0..=0xFFFF).contains(&channel) {
        return AsciiLine::Unknown;
    }
    AsciiLine::Command(Command::Value {
        channel: channel as u16,
        raw: (parse_int(value_field) & 0xFFFF) as u16,
    })
}

/// Split a payload at its first comma; the comma is consumed.
fn split_field(payload: &[u8]) -> (&[u8], &[u8]) {
    match payload.iter().position(|&b| b == b',') {
        Some(pos) => (&payload[..pos], &payload[pos + 1..]),
        None => (payload, &[][..]),
    }
}

/// `atoi`-style integer parse: leading whitespace, optional sign, digits.
fn parse_int(field: &[u8]) -> i64 {
    let mut bytes = field.iter().skip_while(|b| b.is_ascii_whitespace());
    let mut current = bytes.next();
    let negative = match current {
        Some(b'-') => {
            current = bytes.next();
            true
        }
        Some(b'+') => {
            current = bytes.next();
            false
        }
        _ => false,
    };
    let mut value: i64 = 0;
    while let Some(&digit) = current {
        if !digit.is_ascii_digit() {
            break;
        }
        value = value
            .saturating_mul(10)
            .saturating_add((digit - b'0') as i64);
        current = bytes.next();
    }
    if negative {
        -value
    } else {
        value
    }
}

/// Decode a name field: cap at `MAX_NAME_LENGTH` bytes, lossy UTF-8.
pub(crate) fn lossy_name(bytes: &[u8]) -> String {
    let capped = &bytes[..bytes.len().min(MAX_NAME_LENGTH)];
    String::from_utf8_lossy(capped).into_owned()
}

// ---------------------------------------------------------------------------
// Emission. All helpers append one complete line to `out`.
// ---------------------------------------------------------------------------

pub fn write_value(out: &mut String, channel: u16, raw: u16) {
    let _ = write!(out, "{}={}\n", channel, raw as i16);
}

pub fn write_syn(out: &mut String, version: u32, binary: bool) {
    if binary {
        let _ = write!(out, "SYN={version},B\n");
    } else {
        let _ = write!(out, "SYN={version}\n");
    }
}

pub fn write_ack_v1(out: &mut String) {
    out.push_str("ACK\n");
}

pub fn write_ack(out: &mut String, game_version: u32, game_name: &str) {
    let _ = write!(out, "ACK={game_version},{game_name}\n");
}

pub fn write_deny(out: &mut String) {
    out.push_str("DEN\n");
}

pub fn write_end(out: &mut String) {
    out.push_str("END\n");
}

pub fn write_act(out: &mut String) {
    out.push_str("ACT\n");
}

pub fn write_pid(out: &mut String, pid: u32, vid: u32, name: &str) {
    let _ = write!(out, "PID={pid},{vid},{name}\n");
}

pub fn write_event_decl(out: &mut String, event: &Event) {
    let _ = write!(out, "CMD={},{}\n", event.name, event.channel);
}

pub fn write_numeric_decl(out: &mut String, value: &NumericValue, output: bool) {
    let opcode = match (output, value.ty) {
        (false, NumericType::Boolean) => "NIB",
        (false, NumericType::Number) => "NIN",
        (false, NumericType::Fraction) => "NIF",
        (true, NumericType::Boolean) => "NOB",
        (true, NumericType::Number) => "NON",
        (true, NumericType::Fraction) => "NOF",
    };
    let _ = write!(out, "{}={},{}\n", opcode, value.name, value.channel);
}

pub fn write_toggle(out: &mut String, channel: u16, active: bool) {
    let _ = write!(out, "TNI={},{}\n", channel, active as u8);
}

pub fn write_event_fired(out: &mut String, channel: u16) {
    let _ = write!(out, "EXC={channel}\n");
}

pub fn write_debug(out: &mut String, text: &str) {
    let _ = write!(out, "DBG={text}\n");
}
