use trxcon_core::{SBit, UBit};

/// A burst received from the transceiver, converted to soft bits
#[derive(Debug, Clone)]
pub struct TrxdBurstInd {
    pub tn: u8,
    pub fn_: u32,
    /// Received signal strength in dBm
    pub rssi: i8,
    /// Timing of arrival in 1/256 symbol periods
    pub toa256: i16,
    /// 148 soft bits, positive for 0 and negative for 1
    pub burst: Vec<SBit>,
}

/// A burst to be transmitted by the transceiver
#[derive(Debug, Clone)]
pub struct TrxdBurstReq {
    pub tn: u8,
    pub fn_: u32,
    /// Transmit power attenuation in dB
    pub pwr: u8,
    /// 148 hard bits
    pub burst: Vec<UBit>,
}
