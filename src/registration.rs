//! Registrations and the device records they produce
//!
//! Registrations arrive out-of-band (see the REGISTER datagram) as JSON:
//!
//! ```json
//! {"kind":"device","recipient":"3132372e302e302e313a31373030",
//!  "app_eui":"0102030405060708","dev_eui":"0404040402030203",
//!  "nwk_s_key":"01010202030304040505060607070808"}
//! ```

use serde::{Deserialize, Serialize};

use crate::lorawan::keys::{AesKey, DevAddr, Eui64};

/// Anything that may be registered somewhere in the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Registration {
    /// Bind a device session to a handler
    Device(DeviceRegistration),
    /// Bind an application to a handler
    Application(ApplicationRegistration),
    /// Router-side registration; the broker has no use for it
    Router(RouterRegistration),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRegistration {
    /// Opaque handler descriptor, resolved by the adapter
    #[serde(with = "hex::serde")]
    pub recipient: Vec<u8>,
    pub app_eui: Eui64,
    pub dev_eui: Eui64,
    pub nwk_s_key: AesKey,
}

impl DeviceRegistration {
    /// Personalized devices use the low 4 bytes of their DevEUI as address
    pub fn dev_addr(&self) -> DevAddr {
        let eui = self.dev_eui.as_bytes();
        DevAddr([eui[4], eui[5], eui[6], eui[7]])
    }

    pub fn entry(&self) -> DeviceEntry {
        DeviceEntry {
            recipient: self.recipient.clone(),
            app_eui: self.app_eui,
            dev_eui: self.dev_eui,
            nwk_s_key: self.nwk_s_key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRegistration {
    #[serde(with = "hex::serde")]
    pub recipient: Vec<u8>,
    pub app_eui: Eui64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterRegistration {
    #[serde(with = "hex::serde")]
    pub recipient: Vec<u8>,
    pub dev_eui: Eui64,
}

/// A device as known to the directory
///
/// Several entries may share a DevAddr; only the session key tells them apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    pub recipient: Vec<u8>,
    pub app_eui: Eui64,
    pub dev_eui: Eui64,
    pub nwk_s_key: AesKey,
}
