pub mod encoder;
pub mod keys;

use std::fmt;

use keys::{compute_uplink_mic, AesKey, DevAddr, Mic};

/// Minimum data frame: MHDR(1) + DevAddr(4) + FCtrl(1) + FCnt(2) + MIC(4)
pub const MIN_DATA_FRAME_LEN: usize = 12;

/// Largest PHY payload; the MIC block encodes the message length in one byte
pub const MAX_PHY_PAYLOAD_LEN: usize = 255;

/// Errors raised while decoding a LoRaWAN PHY payload
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("empty PHY payload")]
    Empty,

    #[error("data frame too short: {0} bytes (minimum {})", MIN_DATA_FRAME_LEN)]
    TooShort(usize),

    #[error("PHY payload too long: {0} bytes (maximum {})", MAX_PHY_PAYLOAD_LEN)]
    TooLong(usize),

    #[error("unsupported LoRaWAN major version: {0}")]
    UnsupportedMajor(u8),

    #[error("reserved MHDR bits set: 0x{0:02x}")]
    ReservedBitsSet(u8),

    #[error("{0} is not an uplink data frame")]
    NotUplink(MType),

    #[error("FOpts length {0} exceeds available data")]
    FOptsOverrun(u8),
}

impl From<FrameError> for crate::error::Error {
    fn from(err: FrameError) -> Self {
        crate::error::Error::structural(err.to_string())
    }
}

/// LoRaWAN MAC Header (MHDR) - Message Type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MType {
    JoinRequest,
    JoinAccept,
    UnconfirmedDataUp,
    UnconfirmedDataDown,
    ConfirmedDataUp,
    ConfirmedDataDown,
    RejoinRequest,
    Proprietary,
}

impl From<u8> for MType {
    fn from(mhdr: u8) -> Self {
        match (mhdr >> 5) & 0x07 {
            0b000 => MType::JoinRequest,
            0b001 => MType::JoinAccept,
            0b010 => MType::UnconfirmedDataUp,
            0b011 => MType::UnconfirmedDataDown,
            0b100 => MType::ConfirmedDataUp,
            0b101 => MType::ConfirmedDataDown,
            0b110 => MType::RejoinRequest,
            _ => MType::Proprietary,
        }
    }
}

impl MType {
    /// MHDR byte for this type with Major = LoRaWAN R1
    pub fn mhdr(self) -> u8 {
        let bits = match self {
            MType::JoinRequest => 0b000,
            MType::JoinAccept => 0b001,
            MType::UnconfirmedDataUp => 0b010,
            MType::UnconfirmedDataDown => 0b011,
            MType::ConfirmedDataUp => 0b100,
            MType::ConfirmedDataDown => 0b101,
            MType::RejoinRequest => 0b110,
            MType::Proprietary => 0b111,
        };
        bits << 5
    }

    pub fn is_uplink_data(self) -> bool {
        matches!(self, MType::UnconfirmedDataUp | MType::ConfirmedDataUp)
    }
}

impl fmt::Display for MType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MType::JoinRequest => write!(f, "JoinRequest"),
            MType::JoinAccept => write!(f, "JoinAccept"),
            MType::UnconfirmedDataUp => write!(f, "UnconfirmedDataUp"),
            MType::UnconfirmedDataDown => write!(f, "UnconfirmedDataDown"),
            MType::ConfirmedDataUp => write!(f, "ConfirmedDataUp"),
            MType::ConfirmedDataDown => write!(f, "ConfirmedDataDown"),
            MType::RejoinRequest => write!(f, "RejoinRequest"),
            MType::Proprietary => write!(f, "Proprietary"),
        }
    }
}

/// Frame Control byte (FCtrl) for uplink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FCtrl {
    pub adr: bool,
    pub adr_ack_req: bool,
    pub ack: bool,
    pub class_b: bool,
    pub f_opts_len: u8,
}

impl From<u8> for FCtrl {
    fn from(byte: u8) -> Self {
        Self {
            adr: (byte & 0x80) != 0,
            adr_ack_req: (byte & 0x40) != 0,
            ack: (byte & 0x20) != 0,
            class_b: (byte & 0x10) != 0,
            f_opts_len: byte & 0x0F,
        }
    }
}

impl FCtrl {
    pub fn to_byte(self) -> u8 {
        let mut byte = self.f_opts_len & 0x0F;
        if self.adr {
            byte |= 0x80;
        }
        if self.adr_ack_req {
            byte |= 0x40;
        }
        if self.ack {
            byte |= 0x20;
        }
        if self.class_b {
            byte |= 0x10;
        }
        byte
    }
}

/// Decoded LoRaWAN uplink data frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    pub mtype: MType,
    pub dev_addr: DevAddr,
    pub fctrl: FCtrl,
    pub fcnt: u16,
    pub f_opts: Vec<u8>,
    pub f_port: Option<u8>,
    pub frm_payload: Vec<u8>,
    pub mic: Mic,
}

impl DataFrame {
    /// Bytes covered by the MIC: the whole frame except the MIC itself
    pub fn mic_input(&self) -> Vec<u8> {
        let mut msg = Vec::with_capacity(
            MIN_DATA_FRAME_LEN + self.f_opts.len() + 1 + self.frm_payload.len(),
        );
        msg.push(self.mtype.mhdr());
        msg.extend_from_slice(&self.dev_addr.to_le_bytes());
        msg.push(self.fctrl.to_byte());
        msg.extend_from_slice(&self.fcnt.to_le_bytes());
        msg.extend_from_slice(&self.f_opts);
        if let Some(port) = self.f_port {
            msg.push(port);
            msg.extend_from_slice(&self.frm_payload);
        }
        msg
    }

    /// Raw PHY payload, byte-for-byte what [`decode_uplink`] accepts
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut frame = self.mic_input();
        frame.extend_from_slice(self.mic.as_bytes());
        frame
    }

    pub fn compute_mic(&self, key: &AesKey) -> Mic {
        compute_uplink_mic(key, self.dev_addr, u32::from(self.fcnt), &self.mic_input())
    }

    /// Overwrite the carried MIC with one computed under `key`
    pub fn sign(&mut self, key: &AesKey) {
        self.mic = self.compute_mic(key);
    }
}

impl fmt::Display for DataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} DevAddr={} FCnt={} FPort={} Payload={} bytes MIC={} ADR={}",
            self.mtype,
            self.dev_addr,
            self.fcnt,
            self.f_port
                .map(|p| p.to_string())
                .unwrap_or("-".to_string()),
            self.frm_payload.len(),
            self.mic,
            self.fctrl.adr,
        )
    }
}

/// Decode a LoRaWAN PHY payload that must be an uplink data frame
pub fn decode_uplink(data: &[u8]) -> Result<DataFrame, FrameError> {
    let mhdr = *data.first().ok_or(FrameError::Empty)?;

    let major = mhdr & 0x03;
    if major != 0 {
        return Err(FrameError::UnsupportedMajor(major));
    }
    if mhdr & 0x1C != 0 {
        return Err(FrameError::ReservedBitsSet(mhdr & 0x1C));
    }

    let mtype = MType::from(mhdr);
    if !mtype.is_uplink_data() {
        return Err(FrameError::NotUplink(mtype));
    }

    if data.len() < MIN_DATA_FRAME_LEN {
        return Err(FrameError::TooShort(data.len()));
    }
    if data.len() > MAX_PHY_PAYLOAD_LEN {
        return Err(FrameError::TooLong(data.len()));
    }

    let dev_addr = DevAddr::from_le_bytes([data[1], data[2], data[3], data[4]]);
    let fctrl = FCtrl::from(data[5]);
    let fcnt = u16::from_le_bytes([data[6], data[7]]);

    let mic_start = data.len() - 4;
    let f_opts_end = 8 + fctrl.f_opts_len as usize;
    if f_opts_end > mic_start {
        return Err(FrameError::FOptsOverrun(fctrl.f_opts_len));
    }
    let f_opts = data[8..f_opts_end].to_vec();

    // FPort + FRMPayload are only present if there's data between FOpts and MIC
    let (f_port, frm_payload) = if f_opts_end < mic_start {
        (
            Some(data[f_opts_end]),
            data[f_opts_end + 1..mic_start].to_vec(),
        )
    } else {
        (None, vec![])
    };

    let mut mic = [0u8; 4];
    mic.copy_from_slice(&data[mic_start..]);

    Ok(DataFrame {
        mtype,
        dev_addr,
        fctrl,
        fcnt,
        f_opts,
        f_port,
        frm_payload,
        mic: Mic(mic),
    })
}
