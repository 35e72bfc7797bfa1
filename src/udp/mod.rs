pub mod protocol;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

use crate::adapter::{AckNacker, Adapter};
use crate::broker::Broker;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::packet::ApplicationPacket;
use crate::registration::Registration;
use crate::storage::Storage;
use protocol::Datagram;

/// Run the broker's UDP server
///
/// Routers send UPLINK and REGISTER datagrams; each is handled on its own
/// task and answered with one ACK or NACK carrying the same token.
/// Authenticated uplinks leave through the same socket as FORWARD datagrams.
pub async fn run_server<S>(config: &Config, broker: Arc<Broker<S>>) -> anyhow::Result<()>
where
    S: Storage + 'static,
{
    let socket = Arc::new(UdpSocket::bind(&config.udp.bind).await?);
    info!("UDP server listening on {}", config.udp.bind);

    let adapter = Arc::new(UdpAdapter::new(socket.clone()));
    let mut buf = vec![0u8; 65535];

    loop {
        let (len, src) = socket.recv_from(&mut buf).await?;
        debug!("Received {} bytes from {}", len, src);

        match Datagram::parse(&buf[..len]) {
            Ok(datagram) => {
                let an = UdpAckNacker::new(socket.clone(), src, datagram.random_token());
                let broker = broker.clone();
                let adapter = adapter.clone();
                tokio::spawn(async move {
                    handle_datagram(&broker, &*adapter, an, src, datagram).await;
                });
            }
            Err(e) => {
                warn!("Failed to parse datagram from {}: {}", src, e);
            }
        }
    }
}

async fn handle_datagram<S: Storage>(
    broker: &Broker<S>,
    adapter: &UdpAdapter,
    an: UdpAckNacker,
    src: SocketAddr,
    datagram: Datagram,
) {
    match datagram {
        Datagram::Uplink { frame, .. } => {
            if let Err(e) = broker.handle_up(&frame, an, adapter).await {
                debug!("Uplink from router {} rejected: {}", src, e);
            }
        }
        Datagram::Register { json_payload, .. } => {
            match serde_json::from_str::<Registration>(&json_payload) {
                Ok(reg) => {
                    if let Err(e) = broker.register(reg, an).await {
                        debug!("Registration from {} rejected: {}", src, e);
                    }
                }
                Err(e) => {
                    let err = Error::structural(format!("invalid registration: {}", e));
                    warn!("Nack to {}: {}", src, err);
                    if let Err(e) = an.nack(&err).await {
                        error!("Failed to send NACK to {}: {}", src, e);
                    }
                }
            }
        }
        other => {
            debug!(
                "Ignoring unexpected datagram from {} (token: 0x{:04x})",
                src,
                other.random_token()
            );
        }
    }
}

/// Answers one router request over UDP
pub struct UdpAckNacker {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    random_token: u16,
}

impl UdpAckNacker {
    pub fn new(socket: Arc<UdpSocket>, peer: SocketAddr, random_token: u16) -> Self {
        Self {
            socket,
            peer,
            random_token,
        }
    }

    async fn reply(&self, datagram: &[u8]) -> Result<()> {
        self.socket
            .send_to(datagram, self.peer)
            .await
            .map(|_| ())
            .map_err(|e| Error::operational(format!("reply to {} failed: {}", self.peer, e)))
    }
}

#[async_trait]
impl AckNacker for UdpAckNacker {
    async fn ack(self, payload: Option<Vec<u8>>) -> Result<()> {
        self.reply(&Datagram::ack(self.random_token, payload.as_deref()))
            .await
    }

    async fn nack(self, err: &Error) -> Result<()> {
        self.reply(&Datagram::nack(self.random_token, err)).await
    }
}

/// Delivers application packets to handlers listening on UDP
///
/// Recipient descriptors are UTF-8 socket addresses such as `127.0.0.1:1700`.
pub struct UdpAdapter {
    socket: Arc<UdpSocket>,
    next_token: AtomicU16,
}

impl UdpAdapter {
    pub fn new(socket: Arc<UdpSocket>) -> Self {
        Self {
            socket,
            next_token: AtomicU16::new(1),
        }
    }
}

#[async_trait]
impl Adapter for UdpAdapter {
    type Recipient = SocketAddr;

    async fn get_recipient(&self, raw: &[u8]) -> Result<SocketAddr> {
        std::str::from_utf8(raw)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                Error::structural(format!("invalid recipient descriptor: {}", hex::encode(raw)))
            })
    }

    async fn send(&self, packet: &ApplicationPacket, recipients: &[SocketAddr]) -> Result<()> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let datagram = Datagram::forward(token, &packet.encode());

        for recipient in recipients {
            self.socket
                .send_to(&datagram, *recipient)
                .await
                .map_err(|e| {
                    Error::operational(format!("forward to {} failed: {}", recipient, e))
                })?;
            debug!(
                "FORWARD (token: 0x{:04x}) {} bytes to {}",
                token,
                datagram.len(),
                recipient
            );
        }
        Ok(())
    }
}
