//! Builders for the downlink bursts a transceiver would deliver

use trxcon_core::bits::{GSM_BURST_LEN, GSM_NBITS_NB_GMSK_PAYLOAD as BPLEN, ubit_to_sbit};
use trxcon_core::{GsmTime, SBit, Sap, TrxconEntity, UBit};
use trxcon_entities::l1sched::components::codec::{ChannelCodec, Gsm0503Codec, SCH_CODED_BITS, sch_encode};
use trxcon_saps::trxd::TrxdBurstInd;
use trxcon_saps::{SapMsg, SapMsgInner};

pub const TEST_RSSI: i8 = -60;

/// Soft normal burst carrying 116 coded bits; the training sequence is left blank
pub fn soft_nb(payload: &[UBit]) -> Vec<SBit> {
    let mut burst = vec![0 as SBit; GSM_BURST_LEN];
    for (i, b) in payload.iter().take(BPLEN).enumerate() {
        let pos = if i < 58 { 3 + i } else { 87 + i - 58 };
        burst[pos] = ubit_to_sbit(*b);
    }
    burst
}

/// The four bursts of an xCCH block
pub fn xcch_bursts(block: &[u8]) -> Vec<Vec<SBit>> {
    let coded = Gsm0503Codec::new().xcch_encode(block).unwrap();
    coded.chunks(BPLEN).map(soft_nb).collect()
}

/// Burst where every bit is erased
pub fn erased_burst() -> Vec<SBit> {
    vec![0; GSM_BURST_LEN]
}

/// SCH information bits for a given frame number and BSIC
pub fn encode_sb(fn_: u32, bsic: u8) -> [u8; 4] {
    let t = GsmTime::from_fn(fn_);
    let t1 = t.t1 as u32;
    let t3p = ((t.t3 as u32) - 1) / 10;
    let sb = ((t1 & 1) << 23)
        | (((t1 >> 1) & 0xff) << 8)
        | ((t1 >> 9) & 3)
        | ((t.t2 as u32 & 0x1f) << 18)
        | ((t3p & 1) << 24)
        | (((t3p >> 1) & 3) << 16)
        | ((bsic as u32 & 0x3f) << 2);
    sb.to_le_bytes()
}

/// Synchronisation burst, only valid on SCH frames (fn % 51 in 1, 11, 21, 31, 41)
pub fn sch_burst(fn_: u32, bsic: u8) -> Vec<SBit> {
    let coded = sch_encode(&encode_sb(fn_, bsic));
    let half = SCH_CODED_BITS / 2;
    let mut burst = vec![0 as SBit; GSM_BURST_LEN];
    for (i, b) in coded.iter().enumerate() {
        let pos = if i < half { 3 + i } else { 106 + i - half };
        burst[pos] = ubit_to_sbit(*b);
    }
    burst
}

/// A received burst as the transceiver link hands it to the scheduler
pub fn burst_ind(tn: u8, fn_: u32, burst: Vec<SBit>) -> SapMsg {
    SapMsg::new(
        Sap::TrxdSap,
        TrxconEntity::TrxLink,
        TrxconEntity::L1Sched,
        fn_,
        SapMsgInner::TrxdBurstInd(TrxdBurstInd {
            tn,
            fn_,
            rssi: TEST_RSSI,
            toa256: 0,
            burst,
        }),
    )
}

/// TRXD datagram in the 158 byte layout: header, soft bits, two padding bytes
pub fn trxd_datagram(tn: u8, fn_: u32, burst: &[SBit]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(158);
    buf.push(tn);
    buf.extend_from_slice(&fn_.to_be_bytes());
    buf.push(TEST_RSSI.unsigned_abs());
    buf.extend_from_slice(&0i16.to_be_bytes());
    buf.extend(burst.iter().map(|s| (127 - *s as i16) as u8));
    buf.extend_from_slice(&[0, 0]);
    buf
}
