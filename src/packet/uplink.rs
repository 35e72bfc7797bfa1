use bytes::{BufMut, BytesMut};

use super::{read_header, read_metadata, FrameType, Metadata, FRAME_VERSION};
use crate::error::{Error, Result};
use crate::lorawan::keys::DevAddr;
use crate::lorawan::{decode_uplink, DataFrame, MIN_DATA_FRAME_LEN};

/// Version(1) + Type(1) + MetaLen(2) + minimal data frame
pub const MIN_UPLINK_LEN: usize = 4 + MIN_DATA_FRAME_LEN;

/// An uplink as handed over by a router: a LoRaWAN data frame identified
/// only by its (untrusted, non-unique) device address, plus reception metadata
#[derive(Debug, Clone, PartialEq)]
pub struct UplinkPacket {
    frame: DataFrame,
    metadata: Metadata,
}

impl UplinkPacket {
    pub fn new(frame: DataFrame, metadata: Metadata) -> Self {
        Self { frame, metadata }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn dev_addr(&self) -> DevAddr {
        self.frame.dev_addr
    }

    pub fn into_parts(self) -> (DataFrame, Metadata) {
        (self.frame, self.metadata)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut meta = BytesMut::new();
        self.metadata.encode(&mut meta);
        let phy = self.frame.to_bytes();

        let mut buf = BytesMut::with_capacity(4 + meta.len() + phy.len());
        buf.put_u8(FRAME_VERSION);
        buf.put_u8(FrameType::Uplink as u8);
        // At most metadata::MAX_ENCODED_LEN bytes
        buf.put_u16(meta.len() as u16);
        buf.put_slice(&meta);
        buf.put_slice(&phy);
        buf.to_vec()
    }

    /// Parse an uplink frame; every failure is Structural
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_UPLINK_LEN {
            return Err(Error::structural(format!(
                "uplink too short: {} bytes (minimum {})",
                data.len(),
                MIN_UPLINK_LEN
            )));
        }

        let mut buf = data;
        read_header(&mut buf, FrameType::Uplink)?;
        let metadata = read_metadata(&mut buf, MIN_DATA_FRAME_LEN)?;
        let frame = decode_uplink(buf)?;

        Ok(Self { frame, metadata })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::lorawan::encoder::FrameBuilder;
    use crate::lorawan::keys::AesKey;
    use crate::mocks::sample_metadata;
    use crate::packet::metadata::MAX_ENCODED_LEN;
    use crate::packet::ShortString;

    fn packet() -> UplinkPacket {
        let frame = FrameBuilder::new_uplink(DevAddr([2, 3, 2, 3]), 5, 1, b"Payload".to_vec())
            .build(&AesKey([0x01; 16]));
        UplinkPacket::new(frame, sample_metadata())
    }

    fn assert_structural(data: &[u8]) {
        let err = UplinkPacket::decode(data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural, "{}", err);
    }

    #[test]
    fn test_encode_decode_preserves_everything() {
        let original = packet();
        let bytes = original.encode();
        assert_eq!(&bytes[..2], &[FRAME_VERSION, FrameType::Uplink as u8]);

        let decoded = UplinkPacket::decode(&bytes).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(decoded.dev_addr(), DevAddr([2, 3, 2, 3]));
    }

    #[test]
    fn test_mic_is_trailing() {
        let original = packet();
        let bytes = original.encode();
        assert_eq!(&bytes[bytes.len() - 4..], original.frame().mic.as_bytes());
    }

    #[test]
    fn test_too_short_rejected() {
        assert_structural(&[]);
        assert_structural(&[1, 2, 3]);
        assert_structural(&packet().encode()[..MIN_UPLINK_LEN - 1]);
    }

    #[test]
    fn test_bad_header_rejected() {
        let mut bytes = packet().encode();
        bytes[0] = 0x02;
        assert_structural(&bytes);

        let mut bytes = packet().encode();
        bytes[1] = 0x7F;
        assert_structural(&bytes);

        let mut bytes = packet().encode();
        bytes[1] = FrameType::Application as u8;
        assert_structural(&bytes);
    }

    #[test]
    fn test_inconsistent_metadata_length_rejected() {
        let mut bytes = packet().encode();
        bytes[2] = 0xFF;
        bytes[3] = 0xFF;
        assert_structural(&bytes);

        // One byte short: metadata no longer consumes exactly its block
        let mut bytes = packet().encode();
        let meta_len = u16::from_be_bytes([bytes[2], bytes[3]]) - 1;
        bytes[2..4].copy_from_slice(&meta_len.to_be_bytes());
        assert_structural(&bytes);
    }

    #[test]
    fn test_empty_metadata_minimal_frame() {
        let frame = FrameBuilder::new_uplink(DevAddr([1, 2, 3, 4]), 0, 1, vec![])
            .build(&AesKey([0x01; 16]));
        let original = UplinkPacket::new(frame, Metadata::default());
        let bytes = original.encode();
        assert_eq!(bytes.len(), MIN_UPLINK_LEN + 2);
        assert_eq!(UplinkPacket::decode(&bytes).unwrap(), original);
    }

    #[test]
    fn test_largest_metadata_survives() {
        let longest = || Some(ShortString::try_from("X".repeat(ShortString::MAX_LEN)).unwrap());
        let metadata = Metadata {
            modu: longest(),
            datr: longest(),
            codr: longest(),
            ..sample_metadata()
        };
        let original = UplinkPacket::new(packet().frame().clone(), metadata);
        let bytes = original.encode();
        assert_eq!(
            u16::from_be_bytes([bytes[2], bytes[3]]) as usize,
            MAX_ENCODED_LEN
        );
        assert_eq!(UplinkPacket::decode(&bytes).unwrap(), original);
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let frame = FrameBuilder::new_uplink(DevAddr([2, 3, 2, 3]), 5, 1, vec![0xAB; 300])
            .build(&AesKey([0x01; 16]));
        let bytes = UplinkPacket::new(frame, sample_metadata()).encode();
        assert_structural(&bytes);
    }
}
