//! LoRaWAN uplink frame builder
//!
//! Builds signed uplink data frames the way a device would, which is what
//! routers hand to the broker. Used by the router simulator and in tests.
//!
//! Frame structure (data up):
//!   MHDR(1) | DevAddr(4,LE) | FCtrl(1) | FCnt(2,LE) | [FPort(1) | FRMPayload(N)] | MIC(4)

use super::keys::{AesKey, DevAddr, Mic};
use super::{DataFrame, FCtrl, MType};

/// Parameters for building a LoRaWAN uplink data frame
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    /// UnconfirmedDataUp or ConfirmedDataUp
    pub mtype: MType,
    pub dev_addr: DevAddr,
    /// Frame counter (16-bit, managed by caller)
    pub fcnt: u16,
    /// FPort (application port, 1-223 for application data)
    pub f_port: u8,
    /// FRMPayload, passed through opaque
    pub payload: Vec<u8>,
}

impl FrameBuilder {
    /// Create a new frame builder for an unconfirmed uplink
    pub fn new_uplink(dev_addr: DevAddr, fcnt: u16, f_port: u8, payload: Vec<u8>) -> Self {
        Self {
            mtype: MType::UnconfirmedDataUp,
            dev_addr,
            fcnt,
            f_port,
            payload,
        }
    }

    pub fn confirmed(mut self) -> Self {
        self.mtype = MType::ConfirmedDataUp;
        self
    }

    /// Build the frame and sign it with the device's network session key
    pub fn build(&self, nwk_s_key: &AesKey) -> DataFrame {
        let mut frame = DataFrame {
            mtype: self.mtype,
            dev_addr: self.dev_addr,
            fctrl: FCtrl::default(),
            fcnt: self.fcnt,
            f_opts: vec![],
            // FPort only if payload is present
            f_port: (!self.payload.is_empty()).then_some(self.f_port),
            frm_payload: self.payload.clone(),
            mic: Mic::default(),
        };
        frame.sign(nwk_s_key);
        frame
    }
}
