use bytes::{Buf, BufMut, BytesMut};

use super::{read_header, read_metadata, FrameType, Metadata, UplinkPacket, FRAME_VERSION};
use crate::error::{Error, Result};
use crate::lorawan::keys::Eui64;
use crate::lorawan::{decode_uplink, DataFrame, MIN_DATA_FRAME_LEN};
use crate::registration::DeviceEntry;

/// Version(1) + Type(1) + AppEUI(8) + DevEUI(8) + MetaLen(2) + minimal data frame
pub const MIN_APPLICATION_LEN: usize = 20 + MIN_DATA_FRAME_LEN;

/// An authenticated uplink, addressed by application and device identity
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationPacket {
    pub app_eui: Eui64,
    pub dev_eui: Eui64,
    /// The LoRaWAN frame exactly as the device sent it
    pub payload: DataFrame,
    pub metadata: Metadata,
}

impl ApplicationPacket {
    /// Re-address an uplink to the device that authenticated it
    pub fn translate(packet: UplinkPacket, entry: &DeviceEntry) -> Self {
        let (payload, metadata) = packet.into_parts();
        Self {
            app_eui: entry.app_eui,
            dev_eui: entry.dev_eui,
            payload,
            metadata,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut meta = BytesMut::new();
        self.metadata.encode(&mut meta);
        let phy = self.payload.to_bytes();

        let mut buf = BytesMut::with_capacity(MIN_APPLICATION_LEN + meta.len() + phy.len());
        buf.put_u8(FRAME_VERSION);
        buf.put_u8(FrameType::Application as u8);
        buf.put_slice(self.app_eui.as_bytes());
        buf.put_slice(self.dev_eui.as_bytes());
        // At most metadata::MAX_ENCODED_LEN bytes
        buf.put_u16(meta.len() as u16);
        buf.put_slice(&meta);
        buf.put_slice(&phy);
        buf.to_vec()
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_APPLICATION_LEN {
            return Err(Error::structural(format!(
                "application packet too short: {} bytes (minimum {})",
                data.len(),
                MIN_APPLICATION_LEN
            )));
        }

        let mut buf = data;
        read_header(&mut buf, FrameType::Application)?;

        let mut app_eui = [0u8; 8];
        buf.copy_to_slice(&mut app_eui);
        let mut dev_eui = [0u8; 8];
        buf.copy_to_slice(&mut dev_eui);

        let metadata = read_metadata(&mut buf, MIN_DATA_FRAME_LEN)?;
        let payload = decode_uplink(buf)?;

        Ok(Self {
            app_eui: Eui64(app_eui),
            dev_eui: Eui64(dev_eui),
            payload,
            metadata,
        })
    }
}
