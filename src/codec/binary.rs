//! Binary framing: one opcode byte with payload bits above the command
//! code, followed by a fixed tail and, for some commands, a NUL-terminated
//! name.
//!
//! Two tables exist. The **client** table decodes device-originated frames
//! (the host's inbound direction); the smaller **server** table decodes
//! host-originated frames (the device's inbound direction). Frame lengths
//! derive from the command code, so the decoder either consumes a complete
//! frame, reports that more bytes are needed, or discards a single
//! unrecognized byte and resynchronizes on the next.
//!
//! A device that resets mid-session falls back to ASCII and starts sending
//! `SYN=…` / `451` lines; the client decoder recognizes their first bytes
//! and tells the endpoint to drop back to ASCII framing.

use crate::protocol::command::Command;
use crate::protocol::wire_format::{
    self as wire, client, server, CLIENT_VALUES, SERVER_VALUES,
};
use crate::value::NumericType;

use super::ascii::lossy_name;

/// Result of examining the front of the inbound buffer.
#[derive(Debug, PartialEq)]
pub enum Decoded {
    /// The buffer holds less than one complete frame; consume nothing.
    NeedMore,
    /// One complete frame of `length` bytes.
    Frame { command: Command, length: usize },
    /// A complete ASCII `SYN`/`451` line: the device has reset to ASCII.
    /// The endpoint should reset; `length` covers the line and its `\n`.
    AsciiHandshake { length: usize },
    /// Unrecognized first byte; discard exactly one byte.
    Unknown { byte: u8 },
}

/// Decode one device-originated frame (host inbound, client table).
pub fn decode_from_device(buf: &[u8]) -> Decoded {
    let Some(&first) = buf.first() else {
        return Decoded::NeedMore;
    };

    if first == client::ASCII_SYN || first == client::ASCII_451 {
        let Some(pos) = buf.iter().position(|&b| b == b'\n') else {
            return Decoded::NeedMore;
        };
        let line = &buf[..pos];
        if line.starts_with(b"SYN") || line.starts_with(b"451") {
            return Decoded::AsciiHandshake { length: pos + 1 };
        }
        return Decoded::Unknown { byte: first };
    }

    let code = first & client::COMMAND_MASK;
    let (fixed, has_name) = match code {
        client::CMD | client::NIO => (3, true),
        client::ACT | client::END | client::EXC_0 => (1, false),
        client::DBG => (1, true),
        client::TNI => (3, false),
        client::PID => (9, true),
        client::EXC_1 | client::VAL_1 => (2, false),
        client::EXC_2 | client::VAL_2 => (3, false),
        client::VAL_3 => (4, false),
        client::VAL_4 => (5, false),
        _ => return Decoded::Unknown { byte: first },
    };

    let mut length = fixed;
    let mut name = &[][..];
    if has_name {
        if buf.len() <= fixed {
            return Decoded::NeedMore;
        }
        let Some(pos) = buf[fixed..].iter().position(|&b| b == 0) else {
            return Decoded::NeedMore;
        };
        name = &buf[fixed..fixed + pos];
        length = fixed + pos + 1;
    }
    if buf.len() < length {
        return Decoded::NeedMore;
    }

    let command = match code {
        client::CMD => Command::EventDecl {
            channel: u16::from_le_bytes([buf[1], buf[2]]),
            name: lossy_name(name),
        },
        client::NIO => {
            let ty = if first & client::NIO_FRACTION != 0 {
                NumericType::Fraction
            } else if first & client::NIO_NUMBER != 0 {
                NumericType::Number
            } else {
                NumericType::Boolean
            };
            Command::NumericDecl {
                channel: u16::from_le_bytes([buf[1], buf[2]]),
                name: lossy_name(name),
                ty,
                output: first & client::NIO_OUTPUT != 0,
            }
        }
        client::ACT => Command::Activate,
        client::END => Command::End,
        client::DBG => Command::Debug {
            text: String::from_utf8_lossy(name).into_owned(),
        },
        client::TNI => Command::ToggleInput {
            channel: u16::from_le_bytes([buf[1], buf[2]]),
            active: first & client::TNI_ACTIVE != 0,
        },
        client::PID => Command::Pid {
            pid: u32::from_le_bytes([buf[1], buf[2], buf[3], buf[4]]),
            vid: u32::from_le_bytes([buf[5], buf[6], buf[7], buf[8]]),
            name: lossy_name(name),
        },
        client::EXC_0 | client::EXC_1 | client::EXC_2 => {
            match wire::unpack_event(&buf[..length]) {
                Some(channel) => Command::EventFired { channel },
                None => return Decoded::Unknown { byte: first },
            }
        }
        _ => match wire::unpack_value(&CLIENT_VALUES, &buf[..length]) {
            Some((channel, raw)) => Command::Value { channel, raw },
            None => return Decoded::Unknown { byte: first },
        },
    };

    Decoded::Frame { command, length }
}

/// Decode one host-originated frame (device inbound, server table).
pub fn decode_from_host(buf: &[u8]) -> Decoded {
    let Some(&first) = buf.first() else {
        return Decoded::NeedMore;
    };

    // END is matched against the whole byte: it is also the first byte of
    // an ASCII `END\n`, and the reset it triggers discards the tail.
    if first == server::END {
        return Decoded::Frame {
            command: Command::End,
            length: 1,
        };
    }

    let code = first & server::COMMAND_MASK;
    let length = match code {
        server::VAL_1 => 2,
        server::VAL_2 => 3,
        server::VAL_3 => 4,
        server::VAL_4 => 5,
        _ => return Decoded::Unknown { byte: first },
    };
    if buf.len() < length {
        return Decoded::NeedMore;
    }

    match wire::unpack_value(&SERVER_VALUES, &buf[..length]) {
        Some((channel, raw)) => Decoded::Frame {
            command: Command::Value { channel, raw },
            length,
        },
        None => Decoded::Unknown { byte: first },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_val_1_from_device() {
        // channel=5, value=3: 0x08 | (3 << 4) = 0x38.
        let decoded = decode_from_device(&[0x38, 0x05]);
        assert_eq!(
            decoded,
            Decoded::Frame {
                command: Command::Value { channel: 5, raw: 3 },
                length: 2
            }
        );
    }

    #[test]
    fn test_decode_exc_0_from_device() {
        // channel=2 packed into the opcode byte: 0x0C | (2 << 4) = 0x2C.
        let decoded = decode_from_device(&[0x2C]);
        assert_eq!(
            decoded,
            Decoded::Frame {
                command: Command::EventFired { channel: 2 },
                length: 1
            }
        );
    }

    #[test]
    fn test_decode_event_decl() {
        let mut frame = vec![client::CMD];
        frame.extend_from_slice(&7u16.to_le_bytes());
        frame.extend_from_slice(b"Fire\0");
        assert_eq!(
            decode_from_device(&frame),
            Decoded::Frame {
                command: Command::EventDecl {
                    channel: 7,
                    name: "Fire".to_string()
                },
                length: 8
            }
        );
    }

    #[test]
    fn test_decode_numeric_decl_bits() {
        // Fraction output on channel 41.
        let mut frame = vec![client::NIO | client::NIO_FRACTION | client::NIO_OUTPUT];
        frame.extend_from_slice(&41u16.to_le_bytes());
        frame.extend_from_slice(b"Trim\0");
        match decode_from_device(&frame) {
            Decoded::Frame {
                command:
                    Command::NumericDecl {
                        channel,
                        ty,
                        output,
                        ..
                    },
                ..
            } => {
                assert_eq!(channel, 41);
                assert_eq!(ty, NumericType::Fraction);
                assert!(output);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_decode_pid() {
        let mut frame = vec![client::PID];
        frame.extend_from_slice(&1234u32.to_le_bytes());
        frame.extend_from_slice(&5678u32.to_le_bytes());
        frame.extend_from_slice(b"Panel\0");
        assert_eq!(
            decode_from_device(&frame),
            Decoded::Frame {
                command: Command::Pid {
                    pid: 1234,
                    vid: 5678,
                    name: "Panel".to_string()
                },
                length: 15
            }
        );
    }

    #[test]
    fn test_decode_tni_active_bit() {
        let mut frame = vec![client::TNI | client::TNI_ACTIVE];
        frame.extend_from_slice(&3u16.to_le_bytes());
        assert_eq!(
            decode_from_device(&frame),
            Decoded::Frame {
                command: Command::ToggleInput {
                    channel: 3,
                    active: true
                },
                length: 3
            }
        );

        frame[0] = client::TNI;
        assert_eq!(
            decode_from_device(&frame),
            Decoded::Frame {
                command: Command::ToggleInput {
                    channel: 3,
                    active: false
                },
                length: 3
            }
        );
    }

    #[test]
    fn test_partial_frames_need_more() {
        // VAL_4 needs five bytes.
        assert_eq!(decode_from_device(&[0x0B, 0x01, 0x02]), Decoded::NeedMore);
        // Declaration without its NUL terminator yet.
        let mut frame = vec![client::CMD];
        frame.extend_from_slice(&7u16.to_le_bytes());
        frame.extend_from_slice(b"Fir");
        assert_eq!(decode_from_device(&frame), Decoded::NeedMore);
        assert_eq!(decode_from_device(&[]), Decoded::NeedMore);
    }

    #[test]
    fn test_unknown_byte_discards_one() {
        assert_eq!(decode_from_device(&[0x00]), Decoded::Unknown { byte: 0 });
        assert_eq!(
            decode_from_device(&[0x0F, 0x38, 0x05]),
            Decoded::Unknown { byte: 0x0F }
        );
    }

    #[test]
    fn test_ascii_syn_fallback() {
        // An ASCII SYN line in binary mode: wait for the newline, then
        // report the fallback.
        assert_eq!(decode_from_device(b"SYN=2,B"), Decoded::NeedMore);
        assert_eq!(
            decode_from_device(b"SYN=2,B\n"),
            Decoded::AsciiHandshake { length: 8 }
        );
        assert_eq!(
            decode_from_device(b"451\nrest"),
            Decoded::AsciiHandshake { length: 4 }
        );
        // A complete line that is not a handshake is just noise.
        assert_eq!(
            decode_from_device(b"Something\n"),
            Decoded::Unknown { byte: b'S' }
        );
    }

    #[test]
    fn test_decode_val_from_host() {
        // Server coding: shift 3, VAL_1 = 0x01. value=3 → 0x01 | (3 << 3).
        let decoded = decode_from_host(&[0x01 | (3 << 3), 0x09]);
        assert_eq!(
            decoded,
            Decoded::Frame {
                command: Command::Value { channel: 9, raw: 3 },
                length: 2
            }
        );
    }

    #[test]
    fn test_decode_end_from_host_unmasked() {
        assert_eq!(
            decode_from_host(b"END\n"),
            Decoded::Frame {
                command: Command::End,
                length: 1
            }
        );
    }

    #[test]
    fn test_decode_unknown_from_host() {
        assert_eq!(decode_from_host(&[0x00]), Decoded::Unknown { byte: 0 });
        // 0x07 is not a server VAL code.
        assert_eq!(decode_from_host(&[0x07]), Decoded::Unknown { byte: 0x07 });
        assert_eq!(decode_from_host(&[]), Decoded::NeedMore);
    }

    #[test]
    fn test_server_val_roundtrip_through_decoder() {
        let mut out = [0u8; 5];
        let len = wire::pack_value(&SERVER_VALUES, 300, (-77i16) as u16, &mut out);
        assert_eq!(
            decode_from_host(&out[..len]),
            Decoded::Frame {
                command: Command::Value {
                    channel: 300,
                    raw: (-77i16) as u16
                },
                length: len
            }
        );
    }
}
