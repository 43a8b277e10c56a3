//! Link to the transceiver: clock indications, the control command FSM and burst datagrams

use core::fmt;

pub mod entity;
pub mod link;
pub mod proto;
pub mod transport;

pub use entity::TrxLink;
pub use link::{CtrlOutput, TrxCtrl, TrxState};
pub use transport::{TrxChannel, TrxTransport, UdpTrxTransport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrxError {
    /// Socket could not be opened
    Bind { port: u16, reason: String },
    Send(String),
    /// Datagram too short to hold a burst
    InvalidLength { len: usize, min: usize },
    InvalidTn(u8),
    InvalidFn(u32),
    Malformed(String),
    /// ARFCN outside of the known bands
    UnknownArfcn(u16),
    AlreadyPoweredUp,
    /// Response received with no command in flight
    Unsolicited(String),
    /// Burst refused, the transceiver is not powered up
    NotActive,
}

impl fmt::Display for TrxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrxError::Bind { port, reason } => write!(f, "cannot open UDP port {}: {}", port, reason),
            TrxError::Send(reason) => write!(f, "send failed: {}", reason),
            TrxError::InvalidLength { len, min } => write!(f, "datagram of {} bytes, expected at least {}", len, min),
            TrxError::InvalidTn(tn) => write!(f, "illegal TS {}", tn),
            TrxError::InvalidFn(fn_) => write!(f, "illegal FN {}", fn_),
            TrxError::Malformed(msg) => write!(f, "malformed message {:?}", msg),
            TrxError::UnknownArfcn(arfcn) => write!(f, "ARFCN {} not defined", arfcn),
            TrxError::AlreadyPoweredUp => write!(f, "already powered up"),
            TrxError::Unsolicited(msg) => write!(f, "response {:?} without command", msg),
            TrxError::NotActive => write!(f, "transceiver is not active"),
        }
    }
}

impl std::error::Error for TrxError {}
