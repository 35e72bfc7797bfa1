//! Broker frames exchanged with routers (uplink) and handlers (application)
//!
//! All multi-byte integers are big-endian, except inside the LoRaWAN PHY
//! payload which keeps its own little-endian layout.
//!
//! Uplink:      Version(1) | Type(1) | MetaLen(2) | Metadata | PHYPayload
//! Application: Version(1) | Type(1) | AppEUI(8) | DevEUI(8) | MetaLen(2) | Metadata | PHYPayload

pub mod application;
pub mod metadata;
pub mod uplink;

pub use application::ApplicationPacket;
pub use metadata::{Metadata, ShortString};
pub use uplink::UplinkPacket;

use bytes::Buf;

use crate::error::{Error, Result};

/// Frame format version
pub const FRAME_VERSION: u8 = 0x01;

/// Frame types (second header byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    Uplink = 0x01,
    Application = 0x02,
}

impl TryFrom<u8> for FrameType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(FrameType::Uplink),
            0x02 => Ok(FrameType::Application),
            _ => Err(Error::structural(format!(
                "unknown frame type: 0x{:02x}",
                value
            ))),
        }
    }
}

/// Consume and check the version/type header
fn read_header(buf: &mut &[u8], expected: FrameType) -> Result<()> {
    if buf.remaining() < 2 {
        return Err(Error::structural("frame header truncated"));
    }

    let version = buf.get_u8();
    if version != FRAME_VERSION {
        return Err(Error::structural(format!(
            "unsupported frame version: 0x{:02x}",
            version
        )));
    }

    let frame_type = FrameType::try_from(buf.get_u8())?;
    if frame_type != expected {
        return Err(Error::structural(format!(
            "expected {:?} frame, got {:?}",
            expected, frame_type
        )));
    }
    Ok(())
}

/// Split off the length-prefixed metadata block, leaving the PHY payload in `buf`
fn read_metadata(buf: &mut &[u8], min_tail: usize) -> Result<Metadata> {
    if buf.remaining() < 2 {
        return Err(Error::structural("metadata length truncated"));
    }
    let meta_len = buf.get_u16() as usize;
    if meta_len + min_tail > buf.remaining() {
        return Err(Error::structural(format!(
            "metadata length {} inconsistent with {} remaining bytes",
            meta_len,
            buf.remaining()
        )));
    }

    // A zero-length block stands for "no metadata"
    let metadata = if meta_len == 0 {
        Metadata::default()
    } else {
        Metadata::decode(&buf[..meta_len])?
    };
    buf.advance(meta_len);
    Ok(metadata)
}
