//! Pick the one device that actually sent an uplink
//!
//! DevAddr is only a hint: every candidate sharing it is tried in directory
//! order, and the carried MIC must match exactly under the candidate's
//! NwkSKey. Nothing about a candidate is trusted until it matches.

use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::lorawan::keys::compute_uplink_mic;
use crate::packet::UplinkPacket;
use crate::registration::DeviceEntry;

pub fn disambiguate<'a>(packet: &UplinkPacket, candidates: &'a [DeviceEntry]) -> Result<&'a DeviceEntry> {
    let frame = packet.frame();
    let msg = frame.mic_input();
    let fcnt = u32::from(frame.fcnt);

    let mut matches = candidates
        .iter()
        .filter(|c| compute_uplink_mic(&c.nwk_s_key, frame.dev_addr, fcnt, &msg) == frame.mic);

    match (matches.next(), matches.next()) {
        (None, _) => {
            debug!(
                "No valid MIC among {} candidate(s) for DevAddr {}",
                candidates.len(),
                frame.dev_addr
            );
            Err(Error::behavioural(format!(
                "no device authenticates uplink from {}",
                frame.dev_addr
            )))
        }
        (Some(entry), None) => Ok(entry),
        (Some(first), Some(second)) => {
            // Two distinct session keys producing the same MIC means the
            // provisioning is broken; picking one would misroute data.
            error!(
                "MIC collision on DevAddr {}: devices {} and {} both authenticate FCnt {}",
                frame.dev_addr, first.dev_eui, second.dev_eui, frame.fcnt
            );
            panic!(
                "MIC collision on DevAddr {} between {} and {}",
                frame.dev_addr, first.dev_eui, second.dev_eui
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lorawan::encoder::FrameBuilder;
    use crate::lorawan::keys::{AesKey, DevAddr, Eui64};
    use crate::packet::Metadata;

    fn entry(dev: u8, key: u8) -> DeviceEntry {
        DeviceEntry {
            recipient: vec![dev],
            app_eui: Eui64([1; 8]),
            dev_eui: Eui64([dev, dev, dev, dev, 2, 3, 2, 3]),
            nwk_s_key: AesKey([key; 16]),
        }
    }

    fn packet_signed_with(key: u8) -> UplinkPacket {
        let frame = FrameBuilder::new_uplink(DevAddr([2, 3, 2, 3]), 5, 1, b"Payload".to_vec())
            .build(&AesKey([key; 16]));
        UplinkPacket::new(frame, Metadata::default())
    }

    #[test]
    fn test_single_match_among_collisions() {
        let candidates = vec![entry(1, 0x11), entry(2, 0x22), entry(3, 0x33)];
        let chosen = disambiguate(&packet_signed_with(0x22), &candidates).unwrap();
        assert_eq!(chosen, &candidates[1]);
    }

    #[test]
    fn test_single_candidate_must_still_authenticate() {
        let candidates = vec![entry(1, 0x11)];
        assert!(disambiguate(&packet_signed_with(0x11), &candidates).is_ok());

        let err = disambiguate(&packet_signed_with(0x99), &candidates).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Behavioural);
    }

    #[test]
    fn test_no_candidates() {
        let err = disambiguate(&packet_signed_with(0x11), &[]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Behavioural);
    }

    #[test]
    #[should_panic(expected = "MIC collision")]
    fn test_multiple_matches_panic() {
        let candidates = vec![entry(1, 0x11), entry(2, 0x11)];
        let _ = disambiguate(&packet_signed_with(0x11), &candidates);
    }
}
