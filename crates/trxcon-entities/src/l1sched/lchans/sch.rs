//! SCH: a single synchronisation burst carrying the BSIC and the reduced frame number

use trxcon_core::{GsmTime, SBit};
use trxcon_saps::SapMsgInner;
use trxcon_saps::l1ctl::L1ctlFbsbConf;

use super::{BurstInd, LchanCtx};
use crate::l1sched::SchedError;
use crate::l1sched::components::codec::SCH_CODED_BITS;
use crate::l1sched::lchan::LchanState;

/// BSIC and time decoded from the SCH information bits, 3GPP TS 45.002 clause 3.3.2.2.1
pub fn decode_sb(sb_info: &[u8; 4]) -> (GsmTime, u8) {
    let sb = u32::from_le_bytes(*sb_info);
    let bsic = ((sb >> 2) & 0x3f) as u8;
    let t1 = (((sb >> 23) & 0x01) | ((sb >> 7) & 0x1fe) | ((sb << 9) & 0x600)) as u16;
    let t2 = ((sb >> 18) & 0x1f) as u8;
    let t3p = (((sb >> 24) & 0x01) | ((sb >> 15) & 0x06)) as u8;
    let t3 = t3p * 10 + 1;
    (GsmTime::from_t1_t2_t3(t1, t2, t3), bsic)
}

pub fn rx(ctx: &mut LchanCtx, lchan: &mut LchanState, bi: &BurstInd) -> Result<(), SchedError> {
    let half = SCH_CODED_BITS / 2;
    let mut payload = vec![0 as SBit; SCH_CODED_BITS];
    payload[..half].copy_from_slice(&bi.burst[3..3 + half]);
    payload[half..].copy_from_slice(&bi.burst[106..106 + half]);

    let sb_info = match ctx.codec.sch_decode(&payload) {
        Ok(sb_info) => sb_info,
        Err(e) => {
            tracing::debug!(ts = bi.fn_, "received bad SCH burst: {}", e);
            return Err(SchedError::Codec(e));
        }
    };

    let (time, bsic) = decode_sb(&sb_info);
    tracing::debug!(ts = bi.fn_, "received SCH: bsic={} time={}", bsic, time);

    if time.fn_ != bi.fn_ {
        tracing::error!(ts = bi.fn_, "decoded fn={} does not match fn={} provided by scheduler", time.fn_, bi.fn_);
        return Err(SchedError::FnMismatch {
            decoded: time.fn_,
            expected: bi.fn_,
        });
    }

    // Reported once per cell search
    if ctx.sync.fbsb_conf_sent {
        return Ok(());
    }

    tracing::info!(ts = bi.fn_, "synchronised to cell with bsic={}", bsic);
    ctx.out.push(SapMsgInner::L1ctlFbsbConf(L1ctlFbsbConf {
        chan_nr: lchan.chan_nr(ctx.tn),
        link_id: lchan.link_id(),
        band_arfcn: ctx.band_arfcn,
        fn_: bi.fn_,
        rx_level: bi.rssi.saturating_neg(),
        bsic,
    }));
    ctx.sync.fbsb_conf_sent = true;
    ctx.sync.bsic = bsic;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use trxcon_core::bits::{GSM_BURST_LEN, ubit_to_sbit};

    use super::*;
    use crate::l1sched::components::codec::sch_encode;
    use crate::l1sched::lchan_desc::LchanType;
    use crate::l1sched::lchans::testutil::*;

    /// Packs BSIC and time into SCH information bits
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

    /// Soft synchronisation burst for a frame where the SCH is sent (fn % 51 == 1, 11, ...)
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

    #[test]
    fn test_decode_sb() {
        for fn_ in [1u32, 51 * 26 + 11, 2_715_648 - 51 + 41] {
            let (time, bsic) = decode_sb(&encode_sb(fn_, 0x2a));
            assert_eq!(time.fn_, fn_);
            assert_eq!(bsic, 0x2a);
        }
    }

    #[test]
    fn test_fbsb_conf_once() {
        let mut h = Harness::new();
        let mut lchan = active_lchan(LchanType::Sch);
        for fn_ in [1u32, 11] {
            let burst = sch_burst(fn_, 7);
            let bi = BurstInd {
                fn_,
                bid: 0,
                burst: &burst,
                rssi: -63,
                toa256: 0,
            };
            rx(&mut h.ctx(0), &mut lchan, &bi).unwrap();
        }
        assert_eq!(h.out.len(), 1);
        match &h.out[0] {
            SapMsgInner::L1ctlFbsbConf(conf) => {
                assert_eq!(conf.bsic, 7);
                assert_eq!(conf.fn_, 1);
                assert_eq!(conf.rx_level, 63);
                assert_eq!(conf.chan_nr, 0x80);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(h.sync.fbsb_conf_sent);
        assert_eq!(h.sync.bsic, 7);
    }

    #[test]
    fn test_fn_mismatch() {
        let mut h = Harness::new();
        let mut lchan = active_lchan(LchanType::Sch);
        let burst = sch_burst(21, 7);
        let bi = BurstInd {
            fn_: 31,
            bid: 0,
            burst: &burst,
            rssi: -63,
            toa256: 0,
        };
        let res = rx(&mut h.ctx(0), &mut lchan, &bi);
        assert!(matches!(res, Err(SchedError::FnMismatch { decoded: 21, expected: 31 })));
        assert!(h.out.is_empty());
    }
}
