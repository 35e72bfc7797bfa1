//! The broker: between routers and handlers
//!
//! Two entry points, each answered by exactly one ack or nack:
//! - [`Broker::register`] binds devices/applications into the directory
//! - [`Broker::handle_up`] decodes an uplink, works out which device sent it,
//!   re-addresses it and forwards it to that device's handler
//!
//! The broker keeps no state of its own between calls.

pub mod disambiguate;

pub use disambiguate::disambiguate;

use std::slice;

use tracing::{debug, info, warn};

use crate::adapter::{AckNacker, Adapter};
use crate::error::{Error, Result};
use crate::packet::{ApplicationPacket, UplinkPacket};
use crate::registration::Registration;
use crate::storage::Storage;

pub struct Broker<S> {
    storage: S,
}

impl<S: Storage> Broker<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Store a registration and acknowledge it
    pub async fn register<A: AckNacker>(&self, reg: Registration, an: A) -> Result<()> {
        let result = match &reg {
            Registration::Device(device) => {
                debug!("Registering device {} for {}", device.dev_eui, device.app_eui);
                self.storage.store_device(device).await
            }
            Registration::Application(app) => {
                debug!("Registering application {}", app.app_eui);
                self.storage.store_application(app).await
            }
            Registration::Router(router) => Err(Error::structural(format!(
                "router registration for {} not accepted by broker",
                router.dev_eui
            ))),
        };

        report(an, result).await
    }

    /// Forward a raw uplink to the handler of the device that sent it
    pub async fn handle_up<A, D>(&self, data: &[u8], an: A, adapter: &D) -> Result<()>
    where
        A: AckNacker,
        D: Adapter,
    {
        let result = self.forward_up(data, adapter).await;
        report(an, result).await
    }

    async fn forward_up<D: Adapter>(&self, data: &[u8], adapter: &D) -> Result<()> {
        let packet = UplinkPacket::decode(data)?;
        let dev_addr = packet.dev_addr();
        debug!("Uplink {}", packet.frame());

        let entries = self
            .storage
            .lookup_devices(dev_addr)
            .await
            .map_err(|e| Error::behavioural(e.message()))?;

        let entry = disambiguate(&packet, &entries)?;
        let packet = ApplicationPacket::translate(packet, entry);
        debug!(
            "DevAddr {} authenticated as {} / {}",
            dev_addr, packet.app_eui, packet.dev_eui
        );

        let recipient = adapter.get_recipient(&entry.recipient).await?;
        adapter.send(&packet, slice::from_ref(&recipient)).await?;

        info!(
            "Forwarded uplink FCnt {} from {} to application {}",
            packet.payload.fcnt, packet.dev_eui, packet.app_eui
        );
        Ok(())
    }
}

/// Turn a pipeline result into the one ack or nack it deserves
async fn report<A: AckNacker>(an: A, result: Result<()>) -> Result<()> {
    match result {
        Ok(()) => an.ack(None).await,
        Err(err) => {
            warn!("Nack: {}", err);
            if let Err(e) = an.nack(&err).await {
                warn!("Failed to deliver nack: {}", e);
            }
            Err(err)
        }
    }
}
