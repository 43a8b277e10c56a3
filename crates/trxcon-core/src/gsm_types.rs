use core::fmt;
use serde::Deserialize;

/// Physical channel combination of a timeslot, 3GPP TS 45.002 clause 6.4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PchanConfig {
    None,
    TchF,
    TchH,
    /// FCCH + SCH + BCCH + CCCH
    Ccch,
    /// FCCH + SCH + BCCH + CCCH + SDCCH/4 + SACCH/4
    CcchSdcch4,
    CcchSdcch4Cbch,
    /// SDCCH/8 + SACCH/8
    Sdcch8,
    Sdcch8Cbch,
    /// Packet data channel
    Pdch,
}

impl fmt::Display for PchanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PchanConfig::None => "NONE",
            PchanConfig::TchF => "TCH/F",
            PchanConfig::TchH => "TCH/H",
            PchanConfig::Ccch => "CCCH",
            PchanConfig::CcchSdcch4 => "CCCH+SDCCH4",
            PchanConfig::CcchSdcch4Cbch => "CCCH+SDCCH4+CBCH",
            PchanConfig::Sdcch8 => "SDCCH8",
            PchanConfig::Sdcch8Cbch => "SDCCH8+CBCH",
            PchanConfig::Pdch => "PDCH",
        };
        f.write_str(s)
    }
}

/// Channel mode of a dedicated channel, values as in 3GPP TS 44.018 clause 10.5.2.6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TchMode {
    /// Signalling only
    #[default]
    Sign,
    /// Full rate or half rate speech version 1
    SpeechV1,
    /// Enhanced full rate
    SpeechEfr,
    /// Adaptive multi-rate
    SpeechAmr,
    Data14k5,
    Data12k0,
    Data6k0,
    Data3k6,
}

impl TchMode {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x00 => Some(TchMode::Sign),
            0x01 => Some(TchMode::SpeechV1),
            0x21 => Some(TchMode::SpeechEfr),
            0x41 => Some(TchMode::SpeechAmr),
            0x0f => Some(TchMode::Data14k5),
            0x03 => Some(TchMode::Data12k0),
            0x0b => Some(TchMode::Data6k0),
            0x13 => Some(TchMode::Data3k6),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            TchMode::Sign => 0x00,
            TchMode::SpeechV1 => 0x01,
            TchMode::SpeechEfr => 0x21,
            TchMode::SpeechAmr => 0x41,
            TchMode::Data14k5 => 0x0f,
            TchMode::Data12k0 => 0x03,
            TchMode::Data6k0 => 0x0b,
            TchMode::Data3k6 => 0x13,
        }
    }

    pub fn is_speech(self) -> bool {
        matches!(self, TchMode::SpeechV1 | TchMode::SpeechEfr | TchMode::SpeechAmr)
    }

    pub fn is_data(self) -> bool {
        matches!(self, TchMode::Data14k5 | TchMode::Data12k0 | TchMode::Data6k0 | TchMode::Data3k6)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BurstType {
    #[default]
    Gmsk,
    Psk8,
}

/// RSL channel number encoding, 3GPP TS 48.058 clause 9.3.1.
/// The upper five bits (C-bits) select the channel, the lower three the timeslot.
pub mod chan_nr {
    pub const BM_TCHF: u8 = 0x08;
    pub const LM_TCHH: u8 = 0x10;
    pub const SDCCH4: u8 = 0x20;
    pub const SDCCH8: u8 = 0x40;
    pub const BCCH: u8 = 0x80;
    pub const RACH: u8 = 0x88;
    pub const PCH_AGCH: u8 = 0x90;
    /// Osmocom extension for PDCH
    pub const OSMO_PDCH: u8 = 0xc0;
    /// Osmocom extension for CBCH on SDCCH/4
    pub const OSMO_CBCH4: u8 = 0xc8;
    /// Osmocom extension for CBCH on SDCCH/8
    pub const OSMO_CBCH8: u8 = 0xd0;

    /// Link identifier values
    pub const LID_DEDIC: u8 = 0x00;
    pub const LID_SACCH: u8 = 0x40;
    pub const LID_PTCCH: u8 = 0x80;

    #[inline(always)]
    pub fn tn(chan_nr: u8) -> u8 {
        chan_nr & 0x07
    }

    #[inline(always)]
    pub fn cbits(chan_nr: u8) -> u8 {
        chan_nr >> 3
    }
}

/// A5 ciphering algorithm number. 0 means no ciphering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct A5Algo(pub u8);

impl fmt::Display for A5Algo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A5/{}", self.0)
    }
}

/// Largest A5 key we accept (A5/4 uses 128 bit keys)
pub const MAX_A5_KEY_LEN: usize = 16;
