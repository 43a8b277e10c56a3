//! Access bursts, 3GPP TS 45.002 clause 5.2.7. Uplink only, one burst per request.

use trxcon_core::UBit;
use trxcon_core::bits::GSM_BURST_LEN;
use trxcon_saps::SapMsgInner;
use trxcon_saps::l1ctl::{L1ctlRachConf, RachSynchSeq};

use super::{BurstReq, LchanCtx, TxResult};
use crate::l1sched::SchedError;
use crate::l1sched::lchan::LchanState;
use crate::l1sched::prim::PrimPayload;

/// Extended tail bits BN0..BN7
const RACH_EXT_TAIL_BITS: [UBit; 8] = [0, 0, 1, 1, 1, 0, 1, 0];
const RACH_SYNCH_SEQ_LEN: usize = 41;

/// Training sequences TS0 (GSM, GMSK), TS1 (EGPRS, 8-PSK) and TS2 (EGPRS, GMSK)
const RACH_SYNCH_SEQ_TS0: &str = "01001011011111111001100110101010001111000";
const RACH_SYNCH_SEQ_TS1: &str = "01010100111110001000011000101111001001101";
const RACH_SYNCH_SEQ_TS2: &str = "11101111001001110101011000001101101110111";

fn synch_seq_bits(seq: RachSynchSeq) -> impl Iterator<Item = UBit> {
    let bits = match seq {
        RachSynchSeq::Ts0 => RACH_SYNCH_SEQ_TS0,
        RachSynchSeq::Ts1 => RACH_SYNCH_SEQ_TS1,
        RachSynchSeq::Ts2 => RACH_SYNCH_SEQ_TS2,
    };
    bits.bytes().map(|c| (c == b'1') as UBit)
}

/// Tail, training sequence, coded payload, then zeros up to the burst length
pub fn compose_ab(payload: &[UBit], seq: RachSynchSeq) -> Vec<UBit> {
    let mut burst = Vec::with_capacity(GSM_BURST_LEN);
    burst.extend_from_slice(&RACH_EXT_TAIL_BITS);
    burst.extend(synch_seq_bits(seq));
    burst.extend_from_slice(payload);
    burst.resize(GSM_BURST_LEN, 0);
    burst
}

pub fn tx(ctx: &mut LchanCtx, lchan: &mut LchanState, br: &BurstReq) -> TxResult {
    let Some(prim) = lchan.prim.as_mut() else {
        return Ok(None);
    };
    let PrimPayload::Rach(req) = &mut prim.payload else {
        tracing::error!(ts = br.fn_, "{}: prim is not an access request, dropping", lchan.chan);
        lchan.prim = None;
        return Err(SchedError::InvalidPayload { len: 0, expected: 1 });
    };

    // Delay sending according to the offset
    if req.offset > 0 {
        req.offset -= 1;
        return Ok(None);
    }

    // Only extended requests choose their training sequence
    let seq = if req.is_11bit { req.synch_seq } else { RachSynchSeq::Ts0 };
    let (ra, is_11bit) = (req.ra, req.is_11bit);
    let (chan_nr, link_id) = (prim.chan_nr, prim.link_id);

    let payload = match ctx.codec.rach_encode(ra, ctx.sync.bsic, is_11bit) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(ts = br.fn_, "could not encode RACH burst (ra={} bsic={}): {}", ra, ctx.sync.bsic, e);
            lchan.prim = None;
            return Err(SchedError::Codec(e));
        }
    };
    let burst = compose_ab(&payload, seq);

    tracing::info!(
        ts = br.fn_,
        "scheduled {} RACH ({:?}) on tn={}, lchan={}",
        if is_11bit { "extended (11-bit)" } else { "regular (8-bit)" },
        seq,
        ctx.tn,
        lchan.chan
    );
    ctx.out.push(SapMsgInner::L1ctlRachConf(L1ctlRachConf {
        chan_nr,
        link_id,
        band_arfcn: ctx.band_arfcn,
        fn_: br.fn_,
    }));
    lchan.prim = None;
    Ok(Some(burst))
}
