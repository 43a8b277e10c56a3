//! TDMA scheduler: multiframe layouts, logical channels, burst handlers and the
//! entity connecting them to the transceiver link and L1CTL.

use core::fmt;

use trxcon_core::TchMode;

use components::a5::A5Error;
use components::codec::CodecError;
use lchan_desc::LchanType;

pub mod clock;
pub mod components;
pub mod entity;
pub mod lchan;
pub mod lchan_desc;
pub mod lchans;
pub mod meas;
pub mod mframe;
pub mod prim;
pub mod sched;

pub use entity::L1Sched;
pub use sched::L1Scheduler;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedError {
    /// Timeslot not allocated, or without a multiframe layout
    NotConfigured { tn: u8 },
    /// The frame maps to a channel without a handler, or one not allocated on the timeslot
    NoHandler,
    /// Loss compensation needs a processed burst to start from
    NoHistory,
    /// Burst older than the last processed one
    Stale { fn_: u32, last: u32 },
    /// More frames lost than a multiframe period
    GapTooLarge { elapsed: u32, period: u32 },
    Duplicate { fn_: u32 },
    /// Transmit opportunity in the middle of a block that was never started
    NoPrim,
    InvalidPayload { len: usize, expected: usize },
    Codec(CodecError),
    Cipher(A5Error),
    UnsupportedMode(TchMode),
    AlreadyActive(LchanType),
    NotActive(LchanType),
    /// No (active) channel for the addressed channel type
    NoLchan(LchanType),
    InvalidKeyLen(usize),
    /// SCH decoded a frame number other than the one the burst was received on
    FnMismatch { decoded: u32, expected: u32 },
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::NotConfigured { tn } => write!(f, "timeslot {} is not configured", tn),
            SchedError::NoHandler => write!(f, "no handler for this frame"),
            SchedError::NoHistory => write!(f, "no burst processed yet"),
            SchedError::Stale { fn_, last } => write!(f, "burst fn={} older than last processed fn={}", fn_, last),
            SchedError::GapTooLarge { elapsed, period } => {
                write!(f, "{} frames elapsed, more than the period of {}", elapsed, period)
            }
            SchedError::Duplicate { fn_ } => write!(f, "fn={} was already processed", fn_),
            SchedError::NoPrim => write!(f, "no block in progress"),
            SchedError::InvalidPayload { len, expected } => {
                write!(f, "invalid payload length {}, expected {}", len, expected)
            }
            SchedError::Codec(e) => write!(f, "channel coding: {}", e),
            SchedError::Cipher(e) => write!(f, "ciphering: {}", e),
            SchedError::UnsupportedMode(mode) => write!(f, "channel mode {:?} is not supported", mode),
            SchedError::AlreadyActive(chan) => write!(f, "{} is already active", chan),
            SchedError::NotActive(chan) => write!(f, "{} is not active", chan),
            SchedError::NoLchan(chan) => write!(f, "no active {} lchan", chan),
            SchedError::InvalidKeyLen(len) => write!(f, "A5 key of {} bytes is too long", len),
            SchedError::FnMismatch { decoded, expected } => {
                write!(f, "decoded fn={} does not match fn={}", decoded, expected)
            }
        }
    }
}

impl std::error::Error for SchedError {}
