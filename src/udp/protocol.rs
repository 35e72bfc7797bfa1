//! Broker datagram protocol
//!
//! Same shape as the Semtech packet forwarder protocol (GWMP): a 4-byte
//! binary header followed by a type-specific body. All multi-byte integers
//! are big-endian (network byte order).
//!
//!   Version(1) | Token(2) | Identifier(1) | Body
//!
//! | Identifier | Direction        | Body                          |
//! |------------|------------------|-------------------------------|
//! | UPLINK     | router → broker  | uplink frame                  |
//! | ACK        | broker → router  | optional response payload     |
//! | REGISTER   | any → broker     | JSON registration             |
//! | NACK       | broker → router  | Kind(1) + UTF-8 message       |
//! | FORWARD    | broker → handler | application packet            |

use bytes::{Buf, BufMut, BytesMut};

use crate::adapter::AckOutcome;
use crate::error::{Error, ErrorKind};

/// Protocol version (always 0x01)
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Packet types (identifier byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Uplink = 0x00,
    Ack = 0x01,
    Register = 0x02,
    Nack = 0x03,
    Forward = 0x04,
}

impl TryFrom<u8> for PacketType {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(PacketType::Uplink),
            0x01 => Ok(PacketType::Ack),
            0x02 => Ok(PacketType::Register),
            0x03 => Ok(PacketType::Nack),
            0x04 => Ok(PacketType::Forward),
            _ => Err(anyhow::anyhow!("Unknown packet type: 0x{:02x}", value)),
        }
    }
}

/// Parsed broker datagram
#[derive(Debug, Clone, PartialEq)]
pub enum Datagram {
    Uplink {
        random_token: u16,
        frame: Vec<u8>,
    },
    Ack {
        random_token: u16,
        payload: Vec<u8>,
    },
    Register {
        random_token: u16,
        json_payload: String,
    },
    Nack {
        random_token: u16,
        error: Error,
    },
    Forward {
        random_token: u16,
        packet: Vec<u8>,
    },
}

impl Datagram {
    /// Parse a raw UDP datagram
    pub fn parse(data: &[u8]) -> anyhow::Result<Self> {
        if data.len() < 4 {
            return Err(anyhow::anyhow!("Packet too short: {} bytes", data.len()));
        }

        let mut buf = data;

        let version = buf.get_u8();
        if version != PROTOCOL_VERSION {
            return Err(anyhow::anyhow!(
                "Unsupported protocol version: 0x{:02x}",
                version
            ));
        }

        let random_token = buf.get_u16();
        let packet_type = PacketType::try_from(buf.get_u8())?;
        let body = buf.to_vec();

        match packet_type {
            PacketType::Uplink => Ok(Datagram::Uplink {
                random_token,
                frame: body,
            }),
            PacketType::Ack => Ok(Datagram::Ack {
                random_token,
                payload: body,
            }),
            PacketType::Register => {
                let json_payload = String::from_utf8(body)
                    .map_err(|e| anyhow::anyhow!("Invalid UTF-8 in registration: {}", e))?;
                Ok(Datagram::Register {
                    random_token,
                    json_payload,
                })
            }
            PacketType::Nack => {
                if !buf.has_remaining() {
                    return Err(anyhow::anyhow!("NACK without error kind"));
                }
                let kind_byte = buf.get_u8();
                let kind = ErrorKind::from_byte(kind_byte)
                    .ok_or_else(|| anyhow::anyhow!("Unknown error kind: 0x{:02x}", kind_byte))?;
                let message = String::from_utf8_lossy(buf).into_owned();
                Ok(Datagram::Nack {
                    random_token,
                    error: Error::new(kind, message),
                })
            }
            PacketType::Forward => Ok(Datagram::Forward {
                random_token,
                packet: body,
            }),
        }
    }

    pub fn random_token(&self) -> u16 {
        match self {
            Datagram::Uplink { random_token, .. }
            | Datagram::Ack { random_token, .. }
            | Datagram::Register { random_token, .. }
            | Datagram::Nack { random_token, .. }
            | Datagram::Forward { random_token, .. } => *random_token,
        }
    }

    /// The outcome carried by an ACK or NACK
    pub fn outcome(&self) -> Option<AckOutcome> {
        match self {
            Datagram::Ack { payload, .. } if payload.is_empty() => Some(AckOutcome::Ack(None)),
            Datagram::Ack { payload, .. } => Some(AckOutcome::Ack(Some(payload.clone()))),
            Datagram::Nack { error, .. } => Some(AckOutcome::Nack(error.clone())),
            _ => None,
        }
    }

    /// Build an UPLINK datagram
    pub fn uplink(random_token: u16, frame: &[u8]) -> Vec<u8> {
        build(random_token, PacketType::Uplink, frame)
    }

    /// Build a REGISTER datagram
    pub fn register(random_token: u16, json: &str) -> Vec<u8> {
        build(random_token, PacketType::Register, json.as_bytes())
    }

    /// Build an ACK response
    pub fn ack(random_token: u16, payload: Option<&[u8]>) -> Vec<u8> {
        build(random_token, PacketType::Ack, payload.unwrap_or_default())
    }

    /// Build a NACK response
    pub fn nack(random_token: u16, error: &Error) -> Vec<u8> {
        let mut body = Vec::with_capacity(1 + error.message().len());
        body.push(error.kind().to_byte());
        body.extend_from_slice(error.message().as_bytes());
        build(random_token, PacketType::Nack, &body)
    }

    /// Build a FORWARD datagram towards a handler
    pub fn forward(random_token: u16, packet: &[u8]) -> Vec<u8> {
        build(random_token, PacketType::Forward, packet)
    }
}

fn build(random_token: u16, packet_type: PacketType, body: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(4 + body.len());
    buf.put_u8(PROTOCOL_VERSION);
    buf.put_u16(random_token);
    buf.put_u8(packet_type as u8);
    buf.put_slice(body);
    buf.to_vec()
}
