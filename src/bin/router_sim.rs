//! Router Simulator
//!
//! Plays a router talking to the broker, and a handler receiving from it:
//! registers two devices sharing one DevAddr, then sends a genuine uplink,
//! a forged one and a malformed frame. Useful for testing without hardware.
//!
//! Usage: cargo run --bin router-sim [broker_addr]

use std::env;
use std::net::SocketAddr;

use chrono::Utc;
use tokio::net::UdpSocket;
use tokio::time::{timeout, Duration};

use lora_broker::adapter::AckOutcome;
use lora_broker::lorawan::encoder::FrameBuilder;
use lora_broker::lorawan::keys::{AesKey, DevAddr, Eui64};
use lora_broker::packet::{ApplicationPacket, Metadata, UplinkPacket};
use lora_broker::registration::{ApplicationRegistration, DeviceRegistration, Registration};
use lora_broker::udp::protocol::Datagram;

/// Fake gateway EUI
const GATEWAY_EUI: Eui64 = Eui64([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x00, 0x11]);

const APP_EUI: Eui64 = Eui64([0x70, 0xB3, 0xD5, 0x7E, 0xD0, 0x00, 0x00, 0x01]);

/// Both devices end in 260B1234, so they share that DevAddr
const TEMP_SENSOR: Eui64 = Eui64([0x00, 0x00, 0x00, 0x01, 0x26, 0x0B, 0x12, 0x34]);
const DOOR_SENSOR: Eui64 = Eui64([0x00, 0x00, 0x00, 0x02, 0x26, 0x0B, 0x12, 0x34]);

const TEMP_KEY: AesKey = AesKey([0x2B; 16]);
const DOOR_KEY: AesKey = AesKey([0x3C; 16]);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let broker_addr: SocketAddr = env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:1681".to_string())
        .parse()?;

    let router = UdpSocket::bind("0.0.0.0:0").await?;
    let handler = UdpSocket::bind("127.0.0.1:0").await?;
    let handler_addr = handler.local_addr()?;

    println!("LoRa Broker Router Simulator");
    println!("  Broker:  {}", broker_addr);
    println!("  Handler: {}", handler_addr);
    println!();

    let recipient = handler_addr.to_string().into_bytes();
    let registrations = vec![
        (
            "Application",
            Registration::Application(ApplicationRegistration {
                recipient: recipient.clone(),
                app_eui: APP_EUI,
            }),
        ),
        (
            "Temperature sensor",
            Registration::Device(DeviceRegistration {
                recipient: recipient.clone(),
                app_eui: APP_EUI,
                dev_eui: TEMP_SENSOR,
                nwk_s_key: TEMP_KEY,
            }),
        ),
        (
            "Door sensor (same DevAddr)",
            Registration::Device(DeviceRegistration {
                recipient: recipient.clone(),
                app_eui: APP_EUI,
                dev_eui: DOOR_SENSOR,
                nwk_s_key: DOOR_KEY,
            }),
        ),
    ];

    let mut token: u16 = 0;

    for (desc, reg) in &registrations {
        token = token.wrapping_add(1);
        println!("Registering: {}", desc);
        let json = serde_json::to_string(reg)?;
        router
            .send_to(&Datagram::register(token, &json), broker_addr)
            .await?;
        await_reply(&router, token).await;
    }

    let dev_addr = DevAddr([0x26, 0x0B, 0x12, 0x34]);
    let scenarios = vec![
        (
            "Door sensor uplink (door=open)",
            uplink(FrameBuilder::new_uplink(dev_addr, 7, 2, vec![0x01]).confirmed(), &DOOR_KEY, -112.0)?,
            true,
        ),
        (
            "Temperature uplink (22.5°C)",
            uplink(FrameBuilder::new_uplink(dev_addr, 66, 1, vec![0x00, 0xE1]), &TEMP_KEY, -65.0)?,
            true,
        ),
        (
            "Forged uplink (unknown key)",
            uplink(FrameBuilder::new_uplink(dev_addr, 67, 1, vec![0x41]), &AesKey([0x99; 16]), -68.0)?,
            false,
        ),
        ("Malformed frame", vec![0x01, 0x01, 0x00], false),
    ];

    for (desc, frame, forwarded) in &scenarios {
        token = token.wrapping_add(1);
        println!("Sending: {} ({} bytes)", desc, frame.len());
        router
            .send_to(&Datagram::uplink(token, frame), broker_addr)
            .await?;

        if *forwarded {
            await_forward(&handler).await;
        }
        await_reply(&router, token).await;
        println!();
    }

    println!("Simulation complete!");
    Ok(())
}

fn uplink(builder: FrameBuilder, key: &AesKey, rssi: f64) -> anyhow::Result<Vec<u8>> {
    let metadata = Metadata {
        time: Some(Utc::now()),
        freq: Some(868.1),
        rssi: Some(rssi),
        lsnr: Some(7.5),
        modu: Some("LORA".try_into()?),
        datr: Some("SF7BW125".try_into()?),
        codr: Some("4/5".try_into()?),
        gateway_eui: Some(GATEWAY_EUI),
        ..Default::default()
    };
    Ok(UplinkPacket::new(builder.build(key), metadata).encode())
}

async fn await_reply(router: &UdpSocket, token: u16) {
    let mut buf = [0u8; 1024];
    match timeout(Duration::from_secs(2), router.recv_from(&mut buf)).await {
        Ok(Ok((len, _))) => match Datagram::parse(&buf[..len]) {
            Ok(reply) if reply.random_token() != token => {
                println!("   Reply for another token: 0x{:04x}", reply.random_token());
            }
            Ok(reply) => match reply.outcome() {
                Some(AckOutcome::Ack(_)) => println!("   ACK"),
                Some(AckOutcome::Nack(err)) => println!("   NACK ({})", err),
                None => println!("   Unexpected reply: {:?}", reply),
            },
            Err(e) => println!("   Unparsable reply: {}", e),
        },
        Ok(Err(e)) => println!("   Recv error: {}", e),
        Err(_) => println!("   No reply (timeout)"),
    }
}

async fn await_forward(handler: &UdpSocket) {
    let mut buf = [0u8; 2048];
    match timeout(Duration::from_secs(2), handler.recv_from(&mut buf)).await {
        Ok(Ok((len, _))) => match Datagram::parse(&buf[..len]) {
            Ok(Datagram::Forward { packet, .. }) => match ApplicationPacket::decode(&packet) {
                Ok(packet) => println!(
                    "   Handler got AppEUI={} DevEUI={} {}",
                    packet.app_eui, packet.dev_eui, packet.payload
                ),
                Err(e) => println!("   Handler got undecodable packet: {}", e),
            },
            Ok(other) => println!("   Handler got unexpected datagram: {:?}", other),
            Err(e) => println!("   Handler got unparsable datagram: {}", e),
        },
        Ok(Err(e)) => println!("   Handler recv error: {}", e),
        Err(_) => println!("   Nothing forwarded (timeout)"),
    }
}
