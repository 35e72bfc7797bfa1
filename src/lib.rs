//! LoRaWAN broker
//!
//! Sits between routers (which only know a packet's DevAddr) and handlers
//! (which expect packets addressed by AppEUI/DevEUI). Uplinks are
//! authenticated by MIC against every device sharing the address, then
//! forwarded to the handler of the one device that signed them.

pub mod adapter;
pub mod broker;
pub mod config;
pub mod error;
pub mod lorawan;
pub mod packet;
pub mod registration;
pub mod storage;
pub mod udp;

#[cfg(test)]
mod mocks;
