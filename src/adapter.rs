//! Collaborator interfaces at the broker's outer edge
//!
//! - [`Adapter`]: resolves opaque recipient descriptors and delivers packets
//! - [`AckNacker`]: reports the single outcome of one inbound request

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::packet::ApplicationPacket;

/// Recipient discovery and delivery towards handlers
#[async_trait]
pub trait Adapter: Send + Sync {
    type Recipient: Send + Sync;

    /// Turn a stored descriptor into something `send` can deliver to
    async fn get_recipient(&self, raw: &[u8]) -> Result<Self::Recipient>;

    async fn send(&self, packet: &ApplicationPacket, recipients: &[Self::Recipient]) -> Result<()>;
}

/// Reports the outcome of one request back to whoever sent it
///
/// Both methods consume the reporter, so a request can be answered at most once.
#[async_trait]
pub trait AckNacker: Send {
    async fn ack(self, payload: Option<Vec<u8>>) -> Result<()>;

    async fn nack(self, err: &Error) -> Result<()>;
}

/// What a request ended with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    Ack(Option<Vec<u8>>),
    Nack(Error),
}

impl AckOutcome {
    pub fn is_ack(&self) -> bool {
        matches!(self, AckOutcome::Ack(_))
    }
}
