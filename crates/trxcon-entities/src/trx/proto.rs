//! Wire formats of the three transceiver sockets

use trxcon_core::arfcn::arfcn_to_khz;
use trxcon_core::bits::GSM_BURST_LEN;
use trxcon_core::{GSM_HYPERFRAME, PchanConfig, SBit};
use trxcon_saps::trxc::TrxCmd;
use trxcon_saps::trxd::{TrxdBurstInd, TrxdBurstReq};

use super::TrxError;

/// TN, FN, RSSI and TOA
pub const TRXD_RX_HDR_LEN: usize = 8;
/// TN, FN and power attenuation
pub const TRXD_TX_HDR_LEN: usize = 6;
pub const TRXD_RX_MIN_LEN: usize = TRXD_RX_HDR_LEN + GSM_BURST_LEN;
/// Largest datagram we read from the DATA socket
pub const TRXD_BUF_SIZE: usize = 512;
pub const TRXC_BUF_SIZE: usize = 1024;

/// Channel combination numbers used by SETSLOT
pub fn setslot_chan_type(pchan: PchanConfig) -> u8 {
    match pchan {
        PchanConfig::None => 0,
        PchanConfig::TchF => 1,
        PchanConfig::TchH => 3,
        PchanConfig::Ccch => 4,
        PchanConfig::CcchSdcch4 | PchanConfig::CcchSdcch4Cbch => 5,
        PchanConfig::Sdcch8 | PchanConfig::Sdcch8Cbch => 7,
        PchanConfig::Pdch => 13,
    }
}

fn tune_khz(band_arfcn: u16, uplink: bool) -> Result<u32, TrxError> {
    arfcn_to_khz(band_arfcn, uplink).ok_or(TrxError::UnknownArfcn(band_arfcn))
}

/// Renders a control command, e.g. `CMD SETSLOT 0 4`
pub fn format_cmd(cmd: &TrxCmd) -> Result<String, TrxError> {
    let verb = cmd.verb();
    let args = match cmd {
        TrxCmd::Echo | TrxCmd::PowerOn | TrxCmd::PowerOff => None,
        TrxCmd::SetPower(db) | TrxCmd::AdjPower(db) | TrxCmd::SetRxGain(db) => Some(db.to_string()),
        TrxCmd::SetMaxDly(dly) => Some(dly.to_string()),
        TrxCmd::SetTa(ta) => Some(ta.to_string()),
        TrxCmd::SetSlot { tn, pchan } => Some(format!("{} {}", tn, setslot_chan_type(*pchan))),
        // The MS receives on the downlink and transmits on the uplink
        TrxCmd::RxTune { band_arfcn } | TrxCmd::Measure { band_arfcn } => Some(tune_khz(*band_arfcn, false)?.to_string()),
        TrxCmd::TxTune { band_arfcn } => Some(tune_khz(*band_arfcn, true)?.to_string()),
    };
    Ok(match args {
        Some(args) => format!("CMD {} {}", verb, args),
        None => format!("CMD {}", verb),
    })
}

/// Text of a datagram, without the trailing NUL the transceiver may append
fn datagram_str(buf: &[u8]) -> Result<&str, TrxError> {
    let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
    let s = std::str::from_utf8(&buf[..end]).map_err(|_| TrxError::Malformed("not ASCII".to_string()))?;
    Ok(s.trim_end())
}

/// Parses `IND CLOCK <fn>`. Out-of-range frame numbers are wrapped.
pub fn parse_clck(buf: &[u8]) -> Result<u32, TrxError> {
    let s = datagram_str(buf)?;
    let Some(arg) = s.strip_prefix("IND CLOCK ") else {
        return Err(TrxError::Malformed(s.to_string()));
    };
    let fn_: u32 = arg
        .trim()
        .parse()
        .map_err(|_| TrxError::Malformed(s.to_string()))?;
    if fn_ >= GSM_HYPERFRAME {
        tracing::error!("Indicated clock's FN is not wrapping correctly: {}", fn_);
        return Ok(fn_ % GSM_HYPERFRAME);
    }
    Ok(fn_)
}

/// A parsed `RSP <verb> <status> [params...]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrxRsp {
    pub verb: String,
    pub status: i32,
    pub params: Vec<String>,
}

pub fn parse_rsp(buf: &[u8]) -> Result<TrxRsp, TrxError> {
    let s = datagram_str(buf)?;
    let mut words = s.split_ascii_whitespace();
    if words.next() != Some("RSP") {
        return Err(TrxError::Malformed(s.to_string()));
    }
    let verb = words.next().ok_or_else(|| TrxError::Malformed(s.to_string()))?;
    let status = words
        .next()
        .and_then(|w| w.parse().ok())
        .ok_or_else(|| TrxError::Malformed(s.to_string()))?;
    Ok(TrxRsp {
        verb: verb.to_string(),
        status,
        params: words.map(str::to_string).collect(),
    })
}

/// Soft bits on the wire range from 0 (certain 0) to 255 (certain 1)
fn wire_to_sbit(v: u8) -> SBit {
    if v == 255 { -127 } else { (127 - v as i16) as SBit }
}

/// Decodes a received burst datagram. Trailing bytes past the burst are ignored.
pub fn decode_burst_ind(buf: &[u8]) -> Result<TrxdBurstInd, TrxError> {
    if buf.len() < TRXD_RX_MIN_LEN {
        return Err(TrxError::InvalidLength {
            len: buf.len(),
            min: TRXD_RX_MIN_LEN,
        });
    }

    let tn = buf[0];
    let fn_ = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
    let rssi = (buf[5] as i16).wrapping_neg().max(i8::MIN as i16) as i8;
    let toa256 = i16::from_be_bytes([buf[6], buf[7]]);

    if tn >= 8 {
        return Err(TrxError::InvalidTn(tn));
    }
    if fn_ >= GSM_HYPERFRAME {
        return Err(TrxError::InvalidFn(fn_));
    }

    let burst = buf[TRXD_RX_HDR_LEN..TRXD_RX_MIN_LEN]
        .iter()
        .map(|v| wire_to_sbit(*v))
        .collect();

    Ok(TrxdBurstInd {
        tn,
        fn_,
        rssi,
        toa256,
        burst,
    })
}

/// Encodes a burst to be transmitted: header followed by one byte per hard bit
pub fn encode_burst_req(req: &TrxdBurstReq) -> Vec<u8> {
    let mut buf = Vec::with_capacity(TRXD_TX_HDR_LEN + req.burst.len());
    buf.push(req.tn);
    buf.extend_from_slice(&req.fn_.to_be_bytes());
    buf.push(req.pwr);
    buf.extend_from_slice(&req.burst);
    buf
}
