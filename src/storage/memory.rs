//! In-process device directory
//!
//! Nothing survives a restart; seed devices come from the config file.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::Storage;
use crate::error::{Error, Result};
use crate::lorawan::keys::{DevAddr, Eui64};
use crate::registration::{ApplicationRegistration, DeviceEntry, DeviceRegistration};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationEntry {
    pub recipient: Vec<u8>,
    pub app_eui: Eui64,
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    devices: RwLock<HashMap<DevAddr, Vec<DeviceEntry>>>,
    applications: RwLock<HashMap<Eui64, ApplicationEntry>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lookup_application(&self, app_eui: Eui64) -> Result<ApplicationEntry> {
        self.applications
            .read()
            .await
            .get(&app_eui)
            .cloned()
            .ok_or_else(|| Error::behavioural(format!("no application {}", app_eui)))
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn lookup_devices(&self, dev_addr: DevAddr) -> Result<Vec<DeviceEntry>> {
        match self.devices.read().await.get(&dev_addr) {
            Some(entries) if !entries.is_empty() => Ok(entries.clone()),
            _ => Err(Error::behavioural(format!(
                "no device entry for address {}",
                dev_addr
            ))),
        }
    }

    async fn store_device(&self, reg: &DeviceRegistration) -> Result<()> {
        let dev_addr = reg.dev_addr();
        let entry = reg.entry();

        let mut devices = self.devices.write().await;
        let entries = devices.entry(dev_addr).or_default();

        // Re-registration replaces the session rather than adding a candidate
        entries.retain(|e| !(e.app_eui == entry.app_eui && e.dev_eui == entry.dev_eui));
        entries.push(entry);

        debug!(
            "Stored device {} (DevAddr {}, {} candidate(s))",
            reg.dev_eui,
            dev_addr,
            entries.len()
        );
        Ok(())
    }

    async fn store_application(&self, reg: &ApplicationRegistration) -> Result<()> {
        self.applications.write().await.insert(
            reg.app_eui,
            ApplicationEntry {
                recipient: reg.recipient.clone(),
                app_eui: reg.app_eui,
            },
        );
        debug!("Stored application {}", reg.app_eui);
        Ok(())
    }
}
