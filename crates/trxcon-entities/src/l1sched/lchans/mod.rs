//! Logical channel burst handlers
//!
//! Receive handlers collect bursts into the channel's buffer and emit one indication
//! per decoded (or failed) block. Transmit handlers encode a whole block when its
//! first burst is due and hand out one 148-bit normal or access burst per call.

use trxcon_core::bits::{GSM_BURST_LEN, GSM_NBITS_NB_GMSK_PAYLOAD};
use trxcon_core::{SBit, UBit};
use trxcon_saps::SapMsgInner;
use trxcon_saps::l1ctl::{L1ctlDataConf, L1ctlDataInd};

use super::SchedError;
use super::components::codec::{ChannelCodec, CodecError};
use super::lchan::LchanState;
use super::lchan_desc::{RxHandler, TxHandler};
use super::meas::MeasSet;
use super::prim::PrimQueue;

pub mod pdtch;
pub mod rach;
pub mod sch;
pub mod tchf;
pub mod tchh;
pub mod xcch;

const BPLEN: usize = GSM_NBITS_NB_GMSK_PAYLOAD;

/// Training sequences for normal bursts, 3GPP TS 45.002 clause 5.2.3, set 1
pub const NB_TRAINING_SEQ: [[u8; 26]; 8] = [
    [0, 0, 1, 0, 0, 1, 0, 1, 1, 1, 0, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 1, 0, 1, 1, 1],
    [0, 0, 1, 0, 1, 1, 0, 1, 1, 1, 0, 1, 1, 1, 1, 0, 0, 0, 1, 0, 1, 1, 0, 1, 1, 1],
    [0, 1, 0, 0, 0, 0, 1, 1, 1, 0, 1, 1, 1, 0, 1, 0, 0, 1, 0, 0, 0, 0, 1, 1, 1, 0],
    [0, 1, 0, 0, 0, 1, 1, 1, 1, 0, 1, 1, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 1, 1, 1, 0],
    [0, 0, 0, 1, 1, 0, 1, 0, 1, 1, 1, 0, 0, 1, 0, 0, 0, 0, 0, 1, 1, 0, 1, 0, 1, 1],
    [0, 1, 0, 0, 1, 1, 1, 0, 1, 0, 1, 1, 0, 0, 0, 0, 0, 1, 0, 0, 1, 1, 1, 0, 1, 0],
    [1, 0, 1, 0, 0, 1, 1, 1, 1, 1, 0, 1, 1, 0, 0, 0, 1, 0, 1, 0, 0, 1, 1, 1, 1, 1],
    [1, 1, 1, 0, 1, 1, 1, 1, 0, 0, 0, 1, 0, 0, 1, 0, 1, 1, 1, 0, 1, 1, 1, 1, 0, 0],
];

/// Measurements reported with a bad frame indication that was not received at all
pub const BFI_FAKE_RSSI: i8 = -110;

/// State shared by all channels of the link that handlers may need
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    /// Cell timing has been reported to L1CTL since the last FBSB request
    pub fbsb_conf_sent: bool,
    /// BSIC learned from the SCH, used to code access bursts
    pub bsic: u8,
}

/// Everything a handler may touch besides its own channel state
pub struct LchanCtx<'a> {
    pub codec: &'a dyn ChannelCodec,
    pub tn: u8,
    pub band_arfcn: u16,
    pub queue: &'a mut PrimQueue,
    pub sync: &'a mut SyncState,
    /// Primitives for L1CTL produced by the handler
    pub out: &'a mut Vec<SapMsgInner>,
}

/// A received burst, after deciphering
pub struct BurstInd<'a> {
    pub fn_: u32,
    /// Burst index within the block, from the multiframe layout
    pub bid: u8,
    /// 148 soft bits
    pub burst: &'a [SBit],
    pub rssi: i8,
    pub toa256: i16,
}

/// A transmit opportunity
#[derive(Debug, Clone, Copy)]
pub struct BurstReq {
    pub fn_: u32,
    pub bid: u8,
}

pub type TxResult = Result<Option<Vec<UBit>>, SchedError>;

impl LchanCtx<'_> {
    /// Data indication carrying the channel's averaged block measurement
    pub fn data_ind(&mut self, lchan: &LchanState, payload: Vec<u8>, n_errors: u16, n_bits_total: u16, is_traffic: bool) {
        let meas = lchan.meas_avg;
        tracing::debug!(
            ts = meas.fn_,
            "{} data ind: len={} ber={}/{} rssi={} toa256={} traffic={}",
            lchan.chan,
            payload.len(),
            n_errors,
            n_bits_total,
            meas.rssi,
            meas.toa256,
            is_traffic
        );
        self.out.push(SapMsgInner::L1ctlDataInd(L1ctlDataInd {
            chan_nr: lchan.chan_nr(self.tn),
            link_id: lchan.link_id(),
            band_arfcn: self.band_arfcn,
            fn_: meas.fn_,
            rssi: meas.rssi,
            toa256: meas.toa256,
            n_errors,
            n_bits_total,
            payload,
            is_traffic,
        }));
    }

    pub fn data_conf(&mut self, lchan: &LchanState, fn_: u32, is_traffic: bool) {
        tracing::debug!(ts = fn_, "{} data conf, traffic={}", lchan.chan, is_traffic);
        self.out.push(SapMsgInner::L1ctlDataConf(L1ctlDataConf {
            chan_nr: lchan.chan_nr(self.tn),
            link_id: lchan.link_id(),
            band_arfcn: self.band_arfcn,
            fn_,
            is_traffic,
        }));
    }
}

/// Copies the two 58-bit halves (data plus stealing flag) of a normal burst into `dst`
pub fn copy_nb_payload(dst: &mut [SBit], burst: &[SBit]) {
    dst[..58].copy_from_slice(&burst[3..61]);
    dst[58..BPLEN].copy_from_slice(&burst[87..145]);
}

/// Builds a normal burst: tail, first half, training sequence, second half, tail
pub fn compose_nb(payload: &[UBit], tsc: u8) -> Vec<UBit> {
    let mut burst = vec![0 as UBit; GSM_BURST_LEN];
    burst[3..61].copy_from_slice(&payload[..58]);
    burst[61..87].copy_from_slice(&NB_TRAINING_SEQ[(tsc & 7) as usize]);
    burst[87..145].copy_from_slice(&payload[58..BPLEN]);
    burst
}

/// Bit error figures to report for a block that failed to decode
pub fn failed_ber(err: &CodecError) -> (u16, u16) {
    match err {
        CodecError::CrcMismatch { n_errors, n_bits_total } => (*n_errors, *n_bits_total),
        _ => (0, 0),
    }
}

/// Replaces the block measurement with the one used for frames never received
pub fn set_bfi_meas(lchan: &mut LchanState) {
    lchan.meas_avg = MeasSet {
        fn_: lchan.meas_avg.fn_,
        rssi: BFI_FAKE_RSSI,
        toa256: 0,
    };
}

pub fn handle_rx(handler: RxHandler, ctx: &mut LchanCtx, lchan: &mut LchanState, bi: &BurstInd) -> Result<(), SchedError> {
    match handler {
        RxHandler::Xcch => xcch::rx(ctx, lchan, bi),
        RxHandler::TchF => tchf::rx(ctx, lchan, bi),
        RxHandler::TchH => tchh::rx(ctx, lchan, bi),
        RxHandler::Pdtch => pdtch::rx(ctx, lchan, bi),
        RxHandler::Sch => sch::rx(ctx, lchan, bi),
    }
}

pub fn handle_tx(handler: TxHandler, ctx: &mut LchanCtx, lchan: &mut LchanState, br: &BurstReq) -> TxResult {
    match handler {
        TxHandler::Xcch => xcch::tx(ctx, lchan, br),
        TxHandler::TchF => tchf::tx(ctx, lchan, br),
        TxHandler::TchH => tchh::tx(ctx, lchan, br),
        TxHandler::Pdtch => pdtch::tx(ctx, lchan, br),
        TxHandler::Rach => rach::tx(ctx, lchan, br),
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    //! Helpers shared by the handler unit tests

    use trxcon_core::bits::ubit_to_sbit;

    use super::*;
    use crate::l1sched::components::codec::Gsm0503Codec;
    use crate::l1sched::lchan_desc::LchanType;

    pub struct Harness {
        pub codec: Gsm0503Codec,
        pub queue: PrimQueue,
        pub sync: SyncState,
        pub out: Vec<SapMsgInner>,
    }

    impl Harness {
        pub fn new() -> Self {
            Self {
                codec: Gsm0503Codec::new(),
                queue: PrimQueue::new(),
                sync: SyncState::default(),
                out: Vec::new(),
            }
        }

        pub fn ctx(&mut self, tn: u8) -> LchanCtx<'_> {
            LchanCtx {
                codec: &self.codec,
                tn,
                band_arfcn: 871,
                queue: &mut self.queue,
                sync: &mut self.sync,
                out: &mut self.out,
            }
        }

        pub fn data_inds(&self) -> Vec<&L1ctlDataInd> {
            self.out
                .iter()
                .filter_map(|m| match m {
                    SapMsgInner::L1ctlDataInd(ind) => Some(ind),
                    _ => None,
                })
                .collect()
        }

        pub fn data_confs(&self) -> Vec<&L1ctlDataConf> {
            self.out
                .iter()
                .filter_map(|m| match m {
                    SapMsgInner::L1ctlDataConf(conf) => Some(conf),
                    _ => None,
                })
                .collect()
        }
    }

    pub fn active_lchan(chan: LchanType) -> LchanState {
        let mut l = LchanState::new(chan);
        l.alloc_buffers();
        l.active = true;
        l
    }

    /// Wraps a coded 116-bit payload into a received soft normal burst
    pub fn soft_nb(payload: &[UBit]) -> Vec<SBit> {
        compose_nb(payload, 0).iter().map(|b| ubit_to_sbit(*b)).collect()
    }

    pub fn mac_block(seed: u8) -> Vec<u8> {
        (0..23u8).map(|i| i.wrapping_mul(29).wrapping_add(seed)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_nb_layout() {
        let payload: Vec<UBit> = (0..BPLEN).map(|i| (i % 2) as UBit).collect();
        let burst = compose_nb(&payload, 5);
        assert_eq!(burst.len(), GSM_BURST_LEN);
        assert_eq!(&burst[..3], &[0, 0, 0]);
        assert_eq!(&burst[61..87], &NB_TRAINING_SEQ[5]);
        assert_eq!(&burst[145..], &[0, 0, 0]);

        let soft: Vec<SBit> = burst.iter().map(|b| if *b == 1 { -1 } else { 1 }).collect();
        let mut back = vec![0 as SBit; BPLEN];
        copy_nb_payload(&mut back, &soft);
        for (s, u) in back.iter().zip(payload.iter()) {
            assert_eq!(*s < 0, *u == 1);
        }
    }
}
