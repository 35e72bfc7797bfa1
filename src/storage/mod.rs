//! Device directory consumed by the broker
//!
//! Multiple devices may share a DevAddr (address reuse), so lookups return
//! every candidate; the broker narrows them down by MIC.

pub mod memory;

pub use memory::MemoryStorage;

use async_trait::async_trait;

use crate::error::Result;
use crate::lorawan::keys::DevAddr;
use crate::registration::{ApplicationRegistration, DeviceEntry, DeviceRegistration};

#[async_trait]
pub trait Storage: Send + Sync {
    /// All devices currently holding `dev_addr`
    async fn lookup_devices(&self, dev_addr: DevAddr) -> Result<Vec<DeviceEntry>>;

    async fn store_device(&self, reg: &DeviceRegistration) -> Result<()>;

    async fn store_application(&self, reg: &ApplicationRegistration) -> Result<()>;
}
