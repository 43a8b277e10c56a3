use trxcon_core::{A5Algo, PchanConfig, TchMode};

/// Training sequence used for an access burst, 3GPP TS 45.002 clause 5.2.7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RachSynchSeq {
    #[default]
    Ts0,
    Ts1,
    Ts2,
}

/// Signalling (or packet data) block to transmit
#[derive(Debug, Clone)]
pub struct L1ctlDataReq {
    pub chan_nr: u8,
    pub link_id: u8,
    /// Frame number of the first burst, required on PDTCH
    pub fn_: Option<u32>,
    pub payload: Vec<u8>,
}

/// Speech or data frame to transmit on a TCH
#[derive(Debug, Clone)]
pub struct L1ctlTrafficReq {
    pub chan_nr: u8,
    pub link_id: u8,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct L1ctlRachReq {
    pub chan_nr: u8,
    pub link_id: u8,
    /// Number of RACH opportunities to skip before transmitting
    pub offset: u16,
    pub ra: u16,
    pub is_11bit: bool,
    pub synch_seq: RachSynchSeq,
}

/// A decoded (or bad) block, with averaged measurements
#[derive(Debug, Clone)]
pub struct L1ctlDataInd {
    pub chan_nr: u8,
    pub link_id: u8,
    pub band_arfcn: u16,
    pub fn_: u32,
    pub rssi: i8,
    pub toa256: i16,
    pub n_errors: u16,
    pub n_bits_total: u16,
    /// Empty when the block could not be decoded
    pub payload: Vec<u8>,
    pub is_traffic: bool,
}

impl L1ctlDataInd {
    pub fn is_bad(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Confirms that a block was fully transmitted
#[derive(Debug, Clone)]
pub struct L1ctlDataConf {
    pub chan_nr: u8,
    pub link_id: u8,
    pub band_arfcn: u16,
    pub fn_: u32,
    pub is_traffic: bool,
}

#[derive(Debug, Clone)]
pub struct L1ctlRachConf {
    pub chan_nr: u8,
    pub link_id: u8,
    pub band_arfcn: u16,
    pub fn_: u32,
}

/// Start a cell search on the given ARFCN
#[derive(Debug, Clone)]
pub struct L1ctlFbsbReq {
    pub band_arfcn: u16,
}

/// Cell timing and BSIC learned from the SCH
#[derive(Debug, Clone)]
pub struct L1ctlFbsbConf {
    pub chan_nr: u8,
    pub link_id: u8,
    pub band_arfcn: u16,
    pub fn_: u32,
    pub rx_level: i8,
    pub bsic: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L1ctlPmConf {
    pub band_arfcn: u16,
    pub dbm: i16,
}

#[derive(Debug, Clone)]
pub struct L1ctlTsConfigReq {
    pub tn: u8,
    pub pchan: PchanConfig,
}

/// (De)activates every logical channel of the given channel number
#[derive(Debug, Clone)]
pub struct L1ctlLchanReq {
    pub chan_nr: u8,
    pub active: bool,
    pub tch_mode: TchMode,
    pub tsc: u8,
}

#[derive(Debug, Clone)]
pub struct L1ctlCryptoReq {
    pub tn: u8,
    pub algo: A5Algo,
    pub key: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct L1ctlResetReq {
    pub reset_clock: bool,
}
