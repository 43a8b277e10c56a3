//! TCH/F: full rate traffic with FACCH/F, both diagonally interleaved over 8 bursts.
//! A new block starts every 4 bursts, so the buffers hold two half blocks.

use trxcon_core::TchMode;
use trxcon_core::bits::{GSM_MACBLOCK_LEN, burst_mask_str};

use super::{BurstInd, BurstReq, LchanCtx, TxResult, compose_nb, copy_nb_payload, failed_ber, set_bfi_meas};
use crate::l1sched::SchedError;
use crate::l1sched::components::codec::{GSM_EFR_BYTES, GSM_FR_BYTES, TchFrame};
use crate::l1sched::lchan::LchanState;
use crate::l1sched::prim::bad_frame_ind;

/// Bad frame indication for the frame that could not be received or was stolen
fn send_bfi(ctx: &mut LchanCtx, lchan: &LchanState, n_errors: u16, n_bits_total: u16) {
    if lchan.tch_mode == TchMode::Sign {
        ctx.data_ind(lchan, Vec::new(), n_errors, n_bits_total, false);
        return;
    }
    let bfi = bad_frame_ind(lchan.chan, lchan.tch_mode);
    ctx.data_ind(lchan, bfi, n_errors, n_bits_total, true);
}

pub fn rx(ctx: &mut LchanCtx, lchan: &mut LchanState, bi: &BurstInd) -> Result<(), SchedError> {
    if lchan.rx_mask == 0 && bi.bid != 0 {
        return Ok(());
    }

    lchan.rx_mask |= 1 << bi.bid;
    lchan.meas.push(bi.fn_, bi.rssi, bi.toa256);
    // Second half of the buffer
    copy_nb_payload(lchan.rx_bursts.burst_mut(4 + bi.bid as usize), bi.burst);

    if bi.bid != 3 {
        return Ok(());
    }

    lchan.meas_avg(8);

    // Only the first half of the interleaving window so far
    if lchan.rx_mask & 0xf0 == 0 {
        lchan.rx_bursts.shift_left(4);
        lchan.rx_mask = (lchan.rx_mask << 4) & 0xff;
        return Ok(());
    }

    if lchan.rx_mask & 0xff != 0xff {
        tracing::error!(
            ts = bi.fn_,
            "{}: received incomplete frame ({})",
            lchan.chan,
            burst_mask_str(lchan.rx_mask as u8, 8)
        );
        lchan.rx_bursts.shift_left(4);
        lchan.rx_mask = (lchan.rx_mask << 4) & 0xff;
        set_bfi_meas(lchan);
        send_bfi(ctx, lchan, 0, 0);
        return Ok(());
    }

    lchan.rx_mask = (lchan.rx_mask << 4) & 0xff;
    let res = ctx.codec.tch_fr_decode(lchan.rx_bursts.as_slice(), lchan.tch_mode);
    lchan.rx_bursts.shift_left(4);

    match res {
        Ok(TchFrame::Facch(block)) => {
            ctx.data_ind(lchan, block.data, block.n_errors, block.n_bits_total, false);
            // The traffic frame it replaced
            send_bfi(ctx, lchan, block.n_errors, block.n_bits_total);
        }
        Ok(TchFrame::Speech(frame)) => {
            ctx.data_ind(lchan, frame.data, frame.n_errors, frame.n_bits_total, true);
        }
        Err(e) => {
            tracing::debug!(ts = bi.fn_, "{}: received bad frame: {}", lchan.chan, e);
            let (n_errors, n_bits_total) = failed_ber(&e);
            send_bfi(ctx, lchan, n_errors, n_bits_total);
        }
    }
    Ok(())
}

fn send_burst(ctx: &mut LchanCtx, lchan: &mut LchanState, br: &BurstReq) -> TxResult {
    let burst = compose_nb(lchan.tx_bursts.burst(br.bid as usize), lchan.tsc);
    lchan.tx_mask |= 1 << br.bid;
    tracing::trace!(ts = br.fn_, "{}: transmitting burst bid={}", lchan.chan, br.bid);

    if lchan.tx_mask == 0x0f {
        let is_traffic = lchan.prim.as_ref().is_some_and(|p| p.is_traffic());
        ctx.data_conf(lchan, br.fn_, is_traffic);
        lchan.prim = None;
        lchan.tx_mask = 0;
    }
    Ok(Some(burst))
}

pub fn tx(ctx: &mut LchanCtx, lchan: &mut LchanState, br: &BurstReq) -> TxResult {
    // Block in progress
    if lchan.tx_mask != 0 {
        return send_burst(ctx, lchan, br);
    }
    if br.bid > 0 {
        return Ok(None);
    }
    let Some(prim) = lchan.prim.as_ref() else {
        return Ok(None);
    };

    let expected = match lchan.tch_mode {
        TchMode::Sign | TchMode::SpeechV1 => GSM_FR_BYTES,
        TchMode::SpeechEfr => GSM_EFR_BYTES,
        mode => {
            tracing::error!(ts = br.fn_, "{}: TCH mode {:?} is not supported, dropping prim", lchan.chan, mode);
            lchan.prim = None;
            return Err(SchedError::UnsupportedMode(mode));
        }
    };

    let len = prim.bytes().len();
    if len != GSM_MACBLOCK_LEN && len != expected {
        tracing::error!(
            ts = br.fn_,
            "{}: prim has odd length={} (expected {} or {}), dropping",
            lchan.chan,
            len,
            GSM_MACBLOCK_LEN,
            expected
        );
        lchan.prim = None;
        return Err(SchedError::InvalidPayload { len, expected });
    }

    // The second half of the previous block stays in front
    lchan.tx_bursts.shift_left(4);
    if let Err(e) = ctx
        .codec
        .tch_fr_encode(lchan.tx_bursts.as_mut_slice(), prim.bytes(), lchan.tch_mode)
    {
        tracing::error!(ts = br.fn_, "{}: failed to encode frame: {}", lchan.chan, e);
        lchan.prim = None;
        return Err(SchedError::Codec(e));
    }

    send_burst(ctx, lchan, br)
}
