//! Reception metadata attached by the gateway and router
//!
//! Binary block: Presence(u16) followed by each present field in bit order.
//! Floats travel as raw IEEE-754 bits so the block survives translation
//! unchanged. Strings are u8-length-prefixed UTF-8.

use std::fmt;
use std::ops::Deref;

use bytes::{Buf, BufMut, BytesMut};
use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::lorawan::keys::Eui64;

const TIME: u16 = 1 << 0;
const TMST: u16 = 1 << 1;
const FREQ: u16 = 1 << 2;
const CHAN: u16 = 1 << 3;
const RFCH: u16 = 1 << 4;
const RSSI: u16 = 1 << 5;
const LSNR: u16 = 1 << 6;
const MODU: u16 = 1 << 7;
const DATR: u16 = 1 << 8;
const CODR: u16 = 1 << 9;
const SIZE: u16 = 1 << 10;
const GATEWAY: u16 = 1 << 11;
const KNOWN: u16 = (1 << 12) - 1;

/// Largest encoded block: every field present, every string at full length
pub const MAX_ENCODED_LEN: usize =
    2 + 12 + 4 + 8 + 1 + 1 + 8 + 8 + 3 * (1 + ShortString::MAX_LEN) + 2 + 8;

// MetaLen is a u16
const _: () = assert!(MAX_ENCODED_LEN <= u16::MAX as usize);

/// UTF-8 text short enough for a metadata string field
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShortString(String);

impl ShortString {
    pub const MAX_LEN: usize = u8::MAX as usize;

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ShortString {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        if s.len() > Self::MAX_LEN {
            return Err(Error::structural(format!(
                "metadata string too long: {} bytes (maximum {})",
                s.len(),
                Self::MAX_LEN
            )));
        }
        Ok(Self(s))
    }
}

impl TryFrom<&str> for ShortString {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Self::try_from(s.to_string())
    }
}

impl Deref for ShortString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShortString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metadata {
    /// UTC time of packet reception
    pub time: Option<DateTime<Utc>>,
    /// Concentrator timestamp (microseconds)
    pub tmst: Option<u32>,
    /// Frequency in MHz
    pub freq: Option<f64>,
    /// Concentrator IF channel
    pub chan: Option<u8>,
    /// RF chain
    pub rfch: Option<u8>,
    /// RSSI in dBm
    pub rssi: Option<f64>,
    /// LoRa signal-to-noise ratio
    pub lsnr: Option<f64>,
    /// Modulation (LORA or FSK)
    pub modu: Option<ShortString>,
    /// Datarate identifier (e.g., "SF7BW125")
    pub datr: Option<ShortString>,
    /// Coding rate (e.g., "4/5")
    pub codr: Option<ShortString>,
    /// RF packet payload size in bytes
    pub size: Option<u16>,
    /// Gateway that received the packet
    pub gateway_eui: Option<Eui64>,
}

impl Metadata {
    fn presence(&self) -> u16 {
        let mut bits = 0;
        let flags = [
            (self.time.is_some(), TIME),
            (self.tmst.is_some(), TMST),
            (self.freq.is_some(), FREQ),
            (self.chan.is_some(), CHAN),
            (self.rfch.is_some(), RFCH),
            (self.rssi.is_some(), RSSI),
            (self.lsnr.is_some(), LSNR),
            (self.modu.is_some(), MODU),
            (self.datr.is_some(), DATR),
            (self.codr.is_some(), CODR),
            (self.size.is_some(), SIZE),
            (self.gateway_eui.is_some(), GATEWAY),
        ];
        for (present, bit) in flags {
            if present {
                bits |= bit;
            }
        }
        bits
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.presence());

        if let Some(time) = self.time {
            buf.put_i64(time.timestamp());
            buf.put_u32(time.timestamp_subsec_nanos());
        }
        if let Some(tmst) = self.tmst {
            buf.put_u32(tmst);
        }
        if let Some(freq) = self.freq {
            buf.put_f64(freq);
        }
        if let Some(chan) = self.chan {
            buf.put_u8(chan);
        }
        if let Some(rfch) = self.rfch {
            buf.put_u8(rfch);
        }
        if let Some(rssi) = self.rssi {
            buf.put_f64(rssi);
        }
        if let Some(lsnr) = self.lsnr {
            buf.put_f64(lsnr);
        }
        for s in [&self.modu, &self.datr, &self.codr].into_iter().flatten() {
            put_str(buf, s);
        }
        if let Some(size) = self.size {
            buf.put_u16(size);
        }
        if let Some(eui) = self.gateway_eui {
            buf.put_slice(eui.as_bytes());
        }
    }

    /// Decode a metadata block; `data` must hold exactly one block
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut buf = data;
        let presence = take(&mut buf, 2, "presence")?.get_u16();
        if presence & !KNOWN != 0 {
            return Err(Error::structural(format!(
                "unknown metadata fields: 0x{:04x}",
                presence & !KNOWN
            )));
        }
        let has = |bit: u16| presence & bit != 0;

        let mut meta = Metadata::default();
        if has(TIME) {
            let mut field = take(&mut buf, 12, "time")?;
            let secs = field.get_i64();
            let nanos = field.get_u32();
            meta.time = Some(DateTime::<Utc>::from_timestamp(secs, nanos).ok_or_else(|| {
                Error::structural(format!("time out of range: {}s {}ns", secs, nanos))
            })?);
        }
        if has(TMST) {
            meta.tmst = Some(take(&mut buf, 4, "tmst")?.get_u32());
        }
        if has(FREQ) {
            meta.freq = Some(take(&mut buf, 8, "freq")?.get_f64());
        }
        if has(CHAN) {
            meta.chan = Some(take(&mut buf, 1, "chan")?.get_u8());
        }
        if has(RFCH) {
            meta.rfch = Some(take(&mut buf, 1, "rfch")?.get_u8());
        }
        if has(RSSI) {
            meta.rssi = Some(take(&mut buf, 8, "rssi")?.get_f64());
        }
        if has(LSNR) {
            meta.lsnr = Some(take(&mut buf, 8, "lsnr")?.get_f64());
        }
        if has(MODU) {
            meta.modu = Some(get_str(&mut buf, "modu")?);
        }
        if has(DATR) {
            meta.datr = Some(get_str(&mut buf, "datr")?);
        }
        if has(CODR) {
            meta.codr = Some(get_str(&mut buf, "codr")?);
        }
        if has(SIZE) {
            meta.size = Some(take(&mut buf, 2, "size")?.get_u16());
        }
        if has(GATEWAY) {
            let mut eui = [0u8; 8];
            take(&mut buf, 8, "gateway_eui")?.copy_to_slice(&mut eui);
            meta.gateway_eui = Some(Eui64(eui));
        }

        if buf.has_remaining() {
            return Err(Error::structural(format!(
                "{} trailing bytes after metadata",
                buf.remaining()
            )));
        }
        Ok(meta)
    }
}

/// Split `n` bytes off the front of `buf`
fn take<'a>(buf: &mut &'a [u8], n: usize, field: &str) -> Result<&'a [u8]> {
    if buf.len() < n {
        return Err(Error::structural(format!(
            "metadata truncated reading {}",
            field
        )));
    }
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}

fn put_str(buf: &mut BytesMut, s: &ShortString) {
    buf.put_u8(s.len() as u8);
    buf.put_slice(s.as_bytes());
}

fn get_str(buf: &mut &[u8], field: &str) -> Result<ShortString> {
    let len = take(buf, 1, field)?.get_u8() as usize;
    let raw = take(buf, len, field)?;
    String::from_utf8(raw.to_vec())
        .map(ShortString)
        .map_err(|e| Error::structural(format!("invalid UTF-8 in {}: {}", field, e)))
}
