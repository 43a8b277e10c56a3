//! xCCH: BCCH, CCCH, SDCCH, SACCH and CBCH. Blocks of 4 bursts, block-diagonal
//! interleaving.

use trxcon_core::bits::{GSM_MACBLOCK_LEN, burst_mask_str};

use super::{BPLEN, BurstInd, BurstReq, LchanCtx, TxResult, compose_nb, copy_nb_payload, failed_ber};
use crate::l1sched::SchedError;
use crate::l1sched::lchan::LchanState;

pub fn rx(ctx: &mut LchanCtx, lchan: &mut LchanState, bi: &BurstInd) -> Result<(), SchedError> {
    // Wait for the first burst of a block
    if lchan.rx_mask == 0 && bi.bid != 0 {
        return Ok(());
    }

    lchan.rx_mask |= 1 << bi.bid;
    tracing::trace!(ts = bi.fn_, "{}: received burst bid={}", lchan.chan, bi.bid);
    lchan.meas.push(bi.fn_, bi.rssi, bi.toa256);
    copy_nb_payload(lchan.rx_bursts.burst_mut(bi.bid as usize), bi.burst);

    if bi.bid != 3 {
        return Ok(());
    }

    lchan.meas_avg(4);
    if lchan.rx_mask & 0xf != 0xf {
        tracing::error!(
            ts = bi.fn_,
            "{}: received incomplete block ({})",
            lchan.chan,
            burst_mask_str(lchan.rx_mask as u8, 4)
        );
        tracing::trace!(ts = bi.fn_, "{}: decoding with missing bursts", lchan.chan);
    }
    lchan.rx_mask = (lchan.rx_mask << 4) & 0xff;

    match ctx.codec.xcch_decode(lchan.rx_bursts.head(4)) {
        Ok(block) => ctx.data_ind(lchan, block.data, block.n_errors, block.n_bits_total, false),
        Err(e) => {
            tracing::debug!(ts = bi.fn_, "{}: received bad block: {}", lchan.chan, e);
            let (n_errors, n_bits_total) = failed_ber(&e);
            ctx.data_ind(lchan, Vec::new(), n_errors, n_bits_total, false);
        }
    }
    Ok(())
}

pub fn tx(ctx: &mut LchanCtx, lchan: &mut LchanState, br: &BurstReq) -> TxResult {
    // Block transmission starts at the first burst only
    if br.bid > 0 && lchan.tx_mask == 0 {
        return Ok(None);
    }

    if br.bid == 0 {
        let Some(prim) = lchan.prim.as_ref() else {
            return Ok(None);
        };
        let len = prim.bytes().len();
        if len != GSM_MACBLOCK_LEN {
            tracing::error!(ts = br.fn_, "{}: invalid prim length {}, dropping", lchan.chan, len);
            lchan.prim = None;
            return Err(SchedError::InvalidPayload {
                len,
                expected: GSM_MACBLOCK_LEN,
            });
        }
        match ctx.codec.xcch_encode(prim.bytes()) {
            Ok(bits) => lchan.tx_bursts.head_mut(4).copy_from_slice(&bits[..4 * BPLEN]),
            Err(e) => {
                tracing::error!(ts = br.fn_, "{}: failed to encode L2 frame: {}", lchan.chan, e);
                lchan.prim = None;
                return Err(SchedError::Codec(e));
            }
        }
    }

    let burst = compose_nb(lchan.tx_bursts.burst(br.bid as usize), lchan.tsc);
    lchan.tx_mask |= 1 << br.bid;
    tracing::trace!(ts = br.fn_, "{}: transmitting burst bid={}", lchan.chan, br.bid);

    if lchan.tx_mask & 0xf == 0xf {
        ctx.data_conf(lchan, br.fn_, false);
        lchan.prim = None;
        lchan.tx_mask = 0;
    }
    Ok(Some(burst))
}
