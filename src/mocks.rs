//! Recording test doubles for the broker's collaborators

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::adapter::{AckNacker, AckOutcome, Adapter};
use crate::error::{Error, ErrorKind, Result};
use crate::lorawan::keys::{DevAddr, Eui64};
use crate::packet::{ApplicationPacket, Metadata};
use crate::registration::{
    ApplicationRegistration, DeviceEntry, DeviceRegistration, Registration,
};
use crate::storage::Storage;

/// Metadata with every field populated
pub fn sample_metadata() -> Metadata {
    Metadata {
        time: DateTime::<Utc>::from_timestamp(1_771_435_800, 123_456_789),
        tmst: Some(3_512_348_611),
        freq: Some(868.1),
        chan: Some(2),
        rfch: Some(0),
        rssi: Some(-35.0),
        lsnr: Some(5.1),
        modu: Some("LORA".try_into().unwrap()),
        datr: Some("SF7BW125".try_into().unwrap()),
        codr: Some("4/5".try_into().unwrap()),
        size: Some(23),
        gateway_eui: Some(Eui64([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x00, 0x11])),
    }
}

// ---- AckNacker ----

#[derive(Debug, Clone, Default)]
pub struct MockAckNacker {
    outcomes: Arc<Mutex<Vec<AckOutcome>>>,
    failure: Option<Error>,
}

impl MockAckNacker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the answer, then reports `err` as the delivery failure
    pub fn failing(err: Error) -> Self {
        Self {
            failure: Some(err),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.outcomes.lock().unwrap().len()
    }

    pub fn outcome(&self) -> Option<AckOutcome> {
        let outcomes = self.outcomes.lock().unwrap();
        assert!(outcomes.len() <= 1, "answered more than once: {:?}", outcomes);
        outcomes.first().cloned()
    }

    pub fn nack_kind(&self) -> Option<ErrorKind> {
        match self.outcome()? {
            AckOutcome::Nack(err) => Some(err.kind()),
            AckOutcome::Ack(_) => None,
        }
    }
}

#[async_trait]
impl AckNacker for MockAckNacker {
    async fn ack(self, payload: Option<Vec<u8>>) -> Result<()> {
        self.outcomes.lock().unwrap().push(AckOutcome::Ack(payload));
        self.failure.map_or(Ok(()), Err)
    }

    async fn nack(self, err: &Error) -> Result<()> {
        self.outcomes.lock().unwrap().push(AckOutcome::Nack(err.clone()));
        self.failure.map_or(Ok(()), Err)
    }
}

// ---- Storage ----

#[derive(Debug, Default)]
struct StorageState {
    failures: HashMap<&'static str, Error>,
    lookup: Vec<DeviceEntry>,
    lookups: Vec<DevAddr>,
    devices: Vec<Registration>,
    applications: Vec<Registration>,
}

#[derive(Debug, Clone, Default)]
pub struct MockStorage {
    state: Arc<Mutex<StorageState>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `method` fail with `err`
    pub fn fail(&self, method: &'static str, err: Error) {
        self.state.lock().unwrap().failures.insert(method, err);
    }

    pub fn set_lookup(&self, entries: Vec<DeviceEntry>) {
        self.state.lock().unwrap().lookup = entries;
    }

    pub fn lookups(&self) -> Vec<DevAddr> {
        self.state.lock().unwrap().lookups.clone()
    }

    pub fn stored_devices(&self) -> Vec<Registration> {
        self.state.lock().unwrap().devices.clone()
    }

    pub fn stored_applications(&self) -> Vec<Registration> {
        self.state.lock().unwrap().applications.clone()
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn lookup_devices(&self, dev_addr: DevAddr) -> Result<Vec<DeviceEntry>> {
        let mut state = self.state.lock().unwrap();
        state.lookups.push(dev_addr);
        if let Some(err) = state.failures.get("lookup_devices") {
            return Err(err.clone());
        }
        Ok(state.lookup.clone())
    }

    async fn store_device(&self, reg: &DeviceRegistration) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.devices.push(Registration::Device(reg.clone()));
        match state.failures.get("store_device") {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn store_application(&self, reg: &ApplicationRegistration) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.applications.push(Registration::Application(reg.clone()));
        match state.failures.get("store_application") {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

// ---- Adapter ----

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRecipient(pub Vec<u8>);

#[derive(Debug, Default)]
struct AdapterState {
    failures: HashMap<&'static str, Error>,
    resolved: Vec<Vec<u8>>,
    sent: Vec<(ApplicationPacket, Vec<MockRecipient>)>,
}

#[derive(Debug, Clone, Default)]
pub struct MockAdapter {
    state: Arc<Mutex<AdapterState>>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, method: &'static str, err: Error) {
        self.state.lock().unwrap().failures.insert(method, err);
    }

    /// Raw descriptors passed to `get_recipient`
    pub fn resolved(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().resolved.clone()
    }

    /// Every `send` call, failed ones included
    pub fn sent(&self) -> Vec<(ApplicationPacket, Vec<MockRecipient>)> {
        self.state.lock().unwrap().sent.clone()
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    type Recipient = MockRecipient;

    async fn get_recipient(&self, raw: &[u8]) -> Result<MockRecipient> {
        let mut state = self.state.lock().unwrap();
        state.resolved.push(raw.to_vec());
        match state.failures.get("get_recipient") {
            Some(err) => Err(err.clone()),
            None => Ok(MockRecipient(raw.to_vec())),
        }
    }

    async fn send(&self, packet: &ApplicationPacket, recipients: &[MockRecipient]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.sent.push((packet.clone(), recipients.to_vec()));
        match state.failures.get("send") {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
