//! LoRaWAN identifiers, session keys and MIC computation
//!
//! - DevAddr: 4-byte, network-assigned, NOT unique (several devices may share one)
//! - EUI-64: globally unique application/device identifiers
//! - NwkSKey: AES-128 network session key, the only thing that proves identity
//!
//! The uplink MIC is the first 4 bytes of AES-128-CMAC(NwkSKey, B0 | msg),
//! where msg is the PHY payload without its trailing MIC.

use aes::cipher::generic_array::GenericArray;
use aes::Aes128;
use cmac::{Cmac, Mac};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

macro_rules! hex_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", hex::encode_upper(self.0))
            }
        }

        impl FromStr for $name {
            type Err = hex::FromHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let mut out = [0u8; $len];
                hex::decode_to_slice(s, &mut out)?;
                Ok(Self(out))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_bytes!(
    /// Device address, most-significant byte first (the wire carries it little-endian)
    DevAddr,
    4
);

hex_bytes!(
    /// AppEUI / DevEUI
    Eui64,
    8
);

hex_bytes!(
    /// AES-128 session key
    AesKey,
    16
);

hex_bytes!(
    /// Message Integrity Code, bytes exactly as transmitted
    Mic,
    4
);

impl DevAddr {
    pub fn from_le_bytes(bytes: [u8; 4]) -> Self {
        let mut addr = bytes;
        addr.reverse();
        Self(addr)
    }

    pub fn to_le_bytes(self) -> [u8; 4] {
        let mut bytes = self.0;
        bytes.reverse();
        bytes
    }
}

/// Compute the MIC of an uplink data frame
///
/// `msg` is MHDR | FHDR | FPort | FRMPayload. LoRaWAN 1.0 frames carry a
/// 16-bit frame counter, so the upper half of the B0 counter is zero.
/// `msg` is at most 251 bytes; `decode_uplink` rejects anything longer.
pub fn compute_uplink_mic(key: &AesKey, dev_addr: DevAddr, fcnt: u32, msg: &[u8]) -> Mic {
    // B0 = 0x49 | 4 x 0x00 | Dir | DevAddr | FCnt | 0x00 | len(msg)
    let mut b0 = [0u8; 16];
    b0[0] = 0x49;
    b0[5] = 0x00; // uplink
    b0[6..10].copy_from_slice(&dev_addr.to_le_bytes());
    b0[10..14].copy_from_slice(&fcnt.to_le_bytes());
    b0[15] = msg.len() as u8;

    let mut mac = <Cmac<Aes128> as Mac>::new(GenericArray::from_slice(&key.0));
    mac.update(&b0);
    mac.update(msg);
    let tag = mac.finalize().into_bytes();

    let mut mic = [0u8; 4];
    mic.copy_from_slice(&tag[..4]);
    Mic(mic)
}
