use core::fmt;

use trxcon_core::PchanConfig;

/// Commands understood by the transceiver control interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrxCmd {
    Echo,
    PowerOn,
    PowerOff,
    /// Transmit power attenuation in dB
    SetPower(i32),
    /// Relative power change in dB
    AdjPower(i32),
    SetRxGain(i32),
    /// Maximum access delay in symbols
    SetMaxDly(u32),
    /// Timing advance in symbols
    SetTa(i8),
    SetSlot { tn: u8, pchan: PchanConfig },
    RxTune { band_arfcn: u16 },
    TxTune { band_arfcn: u16 },
    /// Power measurement on a single ARFCN
    Measure { band_arfcn: u16 },
}

impl TrxCmd {
    pub fn verb(&self) -> &'static str {
        match self {
            TrxCmd::Echo => "ECHO",
            TrxCmd::PowerOn => "POWERON",
            TrxCmd::PowerOff => "POWEROFF",
            TrxCmd::SetPower(_) => "SETPOWER",
            TrxCmd::AdjPower(_) => "ADJPOWER",
            TrxCmd::SetRxGain(_) => "SETRXGAIN",
            TrxCmd::SetMaxDly(_) => "SETMAXDLY",
            TrxCmd::SetTa(_) => "SETTA",
            TrxCmd::SetSlot { .. } => "SETSLOT",
            TrxCmd::RxTune { .. } => "RXTUNE",
            TrxCmd::TxTune { .. } => "TXTUNE",
            TrxCmd::Measure { .. } => "MEASURE",
        }
    }

    /// A rejected critical command is fatal to the link. Rejection of the
    /// power and gain adjustments is tolerated.
    pub fn is_critical(&self) -> bool {
        !matches!(
            self,
            TrxCmd::SetPower(_) | TrxCmd::AdjPower(_) | TrxCmd::SetRxGain(_) | TrxCmd::SetMaxDly(_) | TrxCmd::SetTa(_)
        )
    }
}

/// Request to queue a control command on the transceiver link
#[derive(Debug, Clone)]
pub struct TrxcCmdReq {
    pub cmd: TrxCmd,
}

/// Request a power measurement sweep over an ARFCN range (inclusive)
#[derive(Debug, Clone)]
pub struct TrxcMeasureReq {
    pub band_arfcn_start: u16,
    pub band_arfcn_stop: u16,
}

/// Frame number reported by the transceiver
#[derive(Debug, Clone, Copy)]
pub struct TrxClockInd {
    pub fn_: u32,
}

/// Why the transceiver link went offline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrxFailure {
    /// No response after all retries
    RetryExhausted { verb: &'static str },
    /// A critical command was answered with a non-zero status
    CommandRejected { verb: &'static str, status: i32 },
    /// The response did not match the command in flight
    UnexpectedResponse { expected: &'static str, got: String },
}

impl fmt::Display for TrxFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrxFailure::RetryExhausted { verb } => write!(f, "no response to {} after retries", verb),
            TrxFailure::CommandRejected { verb, status } => write!(f, "{} rejected with status {}", verb, status),
            TrxFailure::UnexpectedResponse { expected, got } => {
                write!(f, "unexpected response {:?}, expected {}", got, expected)
            }
        }
    }
}

/// State changes of the transceiver link reported to its owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrxLinkEvent {
    /// Transceiver answered ECHO or POWEROFF
    Idle,
    /// Transceiver is powered up and bursts may be exchanged
    Active,
    /// The link failed and all pending commands were dropped
    Offline(TrxFailure),
    /// No clock indication was seen for too long
    ClockLost,
}
