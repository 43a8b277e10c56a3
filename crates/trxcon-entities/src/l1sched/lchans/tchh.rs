//! TCH/H: half rate traffic interleaved over 4 bursts, FACCH/H over 6 bursts. Each
//! sub-channel gets every other frame, and a FACCH/H steals two consecutive traffic
//! blocks.

use trxcon_core::TchMode;
use trxcon_core::bits::GSM_MACBLOCK_LEN;

use super::{BurstInd, BurstReq, LchanCtx, TxResult, compose_nb, copy_nb_payload, failed_ber};
use crate::l1sched::SchedError;
use crate::l1sched::components::codec::TchFrame;
use crate::l1sched::lchan::LchanState;
use crate::l1sched::lchan_desc::LchanType;
use crate::l1sched::prim::{Primitive, dummy_lapdm};

/// Traffic blocks per sub-channel, positions within the 13 frame half of a 26-multiframe
const TCH_H0_TRAFFIC_BLOCK_MAP: [[u8; 4]; 3] = [[0, 2, 4, 6], [4, 6, 8, 10], [8, 10, 0, 2]];
const TCH_H1_TRAFFIC_BLOCK_MAP: [[u8; 4]; 3] = [[1, 3, 5, 7], [5, 7, 9, 11], [9, 11, 1, 3]];

/// FACCH/H blocks per sub-channel and direction, positions within the 26-multiframe
const TCH_H0_DL_FACCH_BLOCK_MAP: [[u8; 6]; 3] = [[4, 6, 8, 10, 13, 15], [13, 15, 17, 19, 21, 23], [21, 23, 0, 2, 4, 6]];
const TCH_H0_UL_FACCH_BLOCK_MAP: [[u8; 6]; 3] = [[0, 2, 4, 6, 8, 10], [8, 10, 13, 15, 17, 19], [17, 19, 21, 23, 0, 2]];
const TCH_H1_DL_FACCH_BLOCK_MAP: [[u8; 6]; 3] = [[5, 7, 9, 11, 14, 16], [14, 16, 18, 20, 22, 24], [22, 24, 1, 3, 5, 7]];
const TCH_H1_UL_FACCH_BLOCK_MAP: [[u8; 6]; 3] = [[1, 3, 5, 7, 9, 11], [9, 11, 14, 16, 18, 20], [18, 20, 22, 24, 1, 3]];

/// Downlink frames (fn % 26) that can end a FACCH/H block, for either sub-channel
const DL_FACCH_END: [u8; 6] = [15, 16, 23, 24, 6, 7];

fn matches_map<const N: usize>(map: &[[u8; N]; 3], pos: u8, start: bool) -> bool {
    let idx = if start { 0 } else { N - 1 };
    map.iter().any(|block| block[idx] == pos)
}

/// Whether a TCH/H block (traffic or FACCH) can start or end at `fn_` on the sub-channel
/// `chan`, 3GPP TS 45.002 clause 7 table 1
pub fn block_map_fn(chan: LchanType, fn_: u32, ul: bool, facch: bool, start: bool) -> bool {
    let LchanType::TchH(sub) = chan else {
        return false;
    };
    if facch {
        let pos = (fn_ % 26) as u8;
        let map = match (sub, ul) {
            (0, true) => &TCH_H0_UL_FACCH_BLOCK_MAP,
            (0, false) => &TCH_H0_DL_FACCH_BLOCK_MAP,
            (_, true) => &TCH_H1_UL_FACCH_BLOCK_MAP,
            (_, false) => &TCH_H1_DL_FACCH_BLOCK_MAP,
        };
        matches_map(map, pos, start)
    } else {
        let pos = (fn_ % 13) as u8;
        let map = if sub == 0 { &TCH_H0_TRAFFIC_BLOCK_MAP } else { &TCH_H1_TRAFFIC_BLOCK_MAP };
        matches_map(map, pos, start)
    }
}

pub fn facch_start(chan: LchanType, fn_: u32, ul: bool) -> bool {
    block_map_fn(chan, fn_, ul, true, true)
}

pub fn facch_end(chan: LchanType, fn_: u32, ul: bool) -> bool {
    block_map_fn(chan, fn_, ul, true, false)
}

fn dl_facch_possible(fn_: u32) -> bool {
    DL_FACCH_END.contains(&((fn_ % 26) as u8))
}

pub fn rx(ctx: &mut LchanCtx, lchan: &mut LchanState, bi: &BurstInd) -> Result<(), SchedError> {
    if bi.bid == 0 {
        lchan.rx_bursts.shift_left(2);
        lchan.rx_bursts.tail_mut(2).fill(0);
        lchan.rx_mask <<= 2;
    }

    if lchan.rx_mask == 0 {
        if bi.bid > 0 {
            return Ok(());
        }
        // In signalling mode every block is a FACCH/H
        if lchan.tch_mode == TchMode::Sign && !facch_start(lchan.chan, bi.fn_, false) {
            return Ok(());
        }
    }

    lchan.rx_mask |= 1 << bi.bid;
    lchan.meas.push(bi.fn_, bi.rssi, bi.toa256);
    copy_nb_payload(lchan.rx_bursts.burst_mut(4 + bi.bid as usize), bi.burst);

    if bi.bid != 1 {
        return Ok(());
    }

    let complete = match lchan.tch_mode {
        TchMode::Sign => lchan.rx_mask & 0x3f == 0x3f,
        _ => lchan.rx_mask & 0x0f == 0x0f,
    };
    if !complete {
        return Ok(());
    }

    // Second traffic block stolen by the FACCH/H decoded last time
    if lchan.dl_ongoing_facch {
        lchan.meas_avg(4);
        ctx.data_ind(lchan, Vec::new(), 0, 0, true);
        lchan.dl_ongoing_facch = false;
        return Ok(());
    }

    let res = ctx
        .codec
        .tch_hr_decode(lchan.rx_bursts.as_slice(), dl_facch_possible(bi.fn_), lchan.tch_mode);
    match res {
        Ok(TchFrame::Facch(block)) => {
            lchan.dl_ongoing_facch = true;
            lchan.meas_avg(6);
            ctx.data_ind(lchan, block.data, block.n_errors, block.n_bits_total, false);
            if lchan.tch_mode == TchMode::Sign {
                return Ok(());
            }
            // First stolen traffic block
            lchan.meas_avg(4);
            ctx.data_ind(lchan, Vec::new(), block.n_errors, block.n_bits_total, true);
        }
        Ok(TchFrame::Speech(frame)) => {
            lchan.meas_avg(4);
            ctx.data_ind(lchan, frame.data, frame.n_errors, frame.n_bits_total, true);
        }
        Err(e) => {
            tracing::debug!(ts = bi.fn_, "{}: received bad frame: {}", lchan.chan, e);
            let (n_errors, n_bits_total) = failed_ber(&e);
            lchan.meas_avg(4);
            ctx.data_ind(lchan, Vec::new(), n_errors, n_bits_total, true);
        }
    }
    Ok(())
}

fn send_burst(lchan: &mut LchanState, br: &BurstReq) -> TxResult {
    let burst = compose_nb(lchan.tx_bursts.burst(br.bid as usize), lchan.tsc);
    lchan.tx_mask |= 1 << br.bid;
    tracing::trace!(ts = br.fn_, "{}: transmitting burst bid={}", lchan.chan, br.bid);

    // One burst less of a FACCH/H in progress
    if lchan.ul_facch_blocks > 0 {
        lchan.ul_facch_blocks -= 1;
    }
    Ok(Some(burst))
}

pub fn tx(ctx: &mut LchanCtx, lchan: &mut LchanState, br: &BurstReq) -> TxResult {
    if br.bid > 0 {
        if lchan.tx_mask & 0x01 == 0 {
            return Err(SchedError::NoPrim);
        }
        return send_burst(lchan, br);
    }

    // Align transmission of the first FACCH/H in signalling mode
    if lchan.tx_mask == 0 && lchan.tch_mode == TchMode::Sign && !facch_start(lchan.chan, br.fn_, true) {
        return Ok(None);
    }

    lchan.tx_bursts.shift_left(2);
    lchan.tx_bursts.tail_mut(2).fill(0);
    lchan.tx_mask <<= 2;

    // Traffic blocks stolen by a FACCH/H are dropped
    if lchan.ul_facch_blocks > 2 {
        if let Some(stolen) = ctx.queue.dequeue_tch(lchan.chan, false) {
            tracing::debug!(ts = br.fn_, "{}: dropping traffic frame (len={}) stolen by FACCH", lchan.chan, stolen.bytes().len());
        }
        return send_burst(lchan, br);
    }

    let chan = lchan.chan;
    let msg_tch = ctx.queue.dequeue_tch(chan, false);
    let msg_facch = if facch_start(chan, br.fn_, true) {
        ctx.queue.dequeue_tch(chan, true)
    } else {
        None
    };
    let mut msg = match (msg_facch, msg_tch) {
        (Some(facch), Some(_)) => {
            tracing::debug!(ts = br.fn_, "{}: FACCH replaces a traffic frame", chan);
            Some(facch)
        }
        (Some(facch), None) => Some(facch),
        (None, tch) => tch,
    };

    match lchan.tch_mode {
        TchMode::Sign => {
            if msg.is_none() {
                msg = Some(Primitive::data(chan, lchan.chan_nr(ctx.tn), lchan.link_id(), dummy_lapdm(false)));
            }
        }
        TchMode::SpeechV1 => {}
        mode => {
            tracing::error!(ts = br.fn_, "{}: TCH mode {:?} is not supported", chan, mode);
            return Err(SchedError::UnsupportedMode(mode));
        }
    }

    // Nothing to say, the buffer holds the rest of the previous block
    let Some(msg) = msg else {
        return send_burst(lchan, br);
    };

    if let Err(e) = ctx
        .codec
        .tch_hr_encode(lchan.tx_bursts.as_mut_slice(), msg.bytes(), lchan.tch_mode)
    {
        tracing::error!(ts = br.fn_, "{}: failed to encode L2 payload (len={}): {}", chan, msg.bytes().len(), e);
        return Err(SchedError::Codec(e));
    }

    if msg.bytes().len() == GSM_MACBLOCK_LEN {
        lchan.ul_facch_blocks = 6;
    }
    ctx.data_conf(lchan, br.fn_, msg.is_traffic());

    send_burst(lchan, br)
}

#[cfg(test)]
mod tests {
    use trxcon_core::bits::{GSM_NBITS_NB_GMSK_PAYLOAD as BPLEN, ubit_to_sbit};
    use trxcon_core::{SBit, UBit};

    use super::*;
    use crate::l1sched::components::codec::ChannelCodec;
    use crate::l1sched::lchans::testutil::*;

    #[test]
    fn test_block_maps() {
        let h0 = LchanType::TchH(0);
        let h1 = LchanType::TchH(1);
        for fn_ in [0u32, 8, 17, 26, 34] {
            assert!(facch_start(h0, fn_, true), "fn={}", fn_);
        }
        assert!(!facch_start(h0, 1, true));
        assert!(facch_start(h1, 9, true));
        assert!(facch_start(h0, 13, false));
        assert!(facch_end(h0, 15, false));
        assert!(facch_end(h1, 24, false));
        assert!(facch_end(h1, 11, true));
        // Traffic blocks repeat every 13 frames
        assert!(block_map_fn(h0, 13 + 4, true, false, true));
        assert!(block_map_fn(h1, 11, false, false, false));
        assert!(block_map_fn(h1, 13 + 3, false, false, false));
        assert!(!block_map_fn(h1, 10, false, false, false));
        assert!(!block_map_fn(LchanType::TchF, 0, true, true, true));
    }

    /// Bursts of a FACCH/H block on sub-channel 0 downlink starting at fn 4
    const DL_FACCH_FNS: [u32; 6] = [4, 6, 8, 10, 13, 15];

    fn feed(h: &mut Harness, lchan: &mut LchanState, fn_: u32, bid: u8, burst: &[SBit]) {
        let bi = BurstInd {
            fn_,
            bid,
            burst,
            rssi: -80,
            toa256: 0,
        };
        rx(&mut h.ctx(2), lchan, &bi).unwrap();
    }

    #[test]
    fn test_rx_facch_signalling() {
        let mut h = Harness::new();
        let mut lchan = active_lchan(LchanType::TchH(0));
        let block = mac_block(7);
        let mut coded = vec![0 as UBit; 6 * BPLEN];
        h.codec.tch_hr_encode(&mut coded, &block, TchMode::Sign).unwrap();

        // Not a block start, ignored
        feed(&mut h, &mut lchan, 2, 0, &vec![0; 148]);
        assert_eq!(lchan.rx_mask, 0);

        for (n, fn_) in DL_FACCH_FNS.iter().enumerate() {
            let burst = soft_nb(&coded[n * BPLEN..(n + 1) * BPLEN]);
            feed(&mut h, &mut lchan, *fn_, (n % 2) as u8, &burst);
        }
        let inds = h.data_inds();
        assert_eq!(inds.len(), 1);
        assert_eq!(inds[0].payload, block);
        assert!(!inds[0].is_traffic);
        assert_eq!(inds[0].fn_, 4);
        assert_eq!(inds[0].chan_nr, 0x12);
        assert!(lchan.dl_ongoing_facch);

        // The next block is the second one stolen
        let idle = vec![0 as SBit; 148];
        feed(&mut h, &mut lchan, 17, 0, &idle);
        feed(&mut h, &mut lchan, 19, 1, &idle);
        let inds = h.data_inds();
        assert_eq!(inds.len(), 2);
        assert!(inds[1].is_bad());
        assert!(inds[1].is_traffic);
        assert!(!lchan.dl_ongoing_facch);
    }

    #[test]
    fn test_rx_speech_mode_reports_bfi() {
        let mut h = Harness::new();
        let mut lchan = active_lchan(LchanType::TchH(1));
        lchan.tch_mode = TchMode::SpeechV1;
        let idle = vec![0 as SBit; 148];
        for (fn_, bid) in [(1u32, 0u8), (3, 1), (5, 0), (7, 1), (9, 0), (11, 1)] {
            feed(&mut h, &mut lchan, fn_, bid, &idle);
        }
        // Half rate speech cannot be decoded, each complete block after the first
        // pair of bursts gives a BFI
        let inds = h.data_inds();
        assert_eq!(inds.len(), 2);
        assert!(inds.iter().all(|i| i.is_bad() && i.is_traffic));
    }

    #[test]
    fn test_tx_facch_then_dummy() {
        let mut h = Harness::new();
        let mut lchan = active_lchan(LchanType::TchH(0));
        let block = mac_block(11);
        h.queue
            .enqueue(Primitive::data(LchanType::TchH(0), 0x12, 0, block.clone()));

        // Waits for a FACCH/H start in signalling mode
        let req = BurstReq { fn_: 4, bid: 0 };
        assert!(tx(&mut h.ctx(2), &mut lchan, &req).unwrap().is_none());
        assert_eq!(h.queue.len(), 1);

        let mut sent = Vec::new();
        for (n, fn_) in [0u32, 2, 4, 6, 8, 10].iter().enumerate() {
            let req = BurstReq {
                fn_: *fn_,
                bid: (n % 2) as u8,
            };
            sent.push(tx(&mut h.ctx(2), &mut lchan, &req).unwrap().unwrap());
        }
        let confs = h.data_confs();
        // The FACCH/H and the LAPDm fill frame started at fn 8
        assert_eq!(confs.len(), 2);
        assert_eq!(confs[0].fn_, 0);
        assert!(!confs[0].is_traffic);
        assert_eq!(confs[1].fn_, 8);
        assert!(h.queue.is_empty());

        let mut soft = vec![0 as SBit; 6 * BPLEN];
        for (n, burst) in sent.iter().enumerate() {
            let s: Vec<SBit> = burst.iter().map(|b| ubit_to_sbit(*b)).collect();
            copy_nb_payload(&mut soft[n * BPLEN..(n + 1) * BPLEN], &s);
        }
        match h.codec.tch_hr_decode(&soft, true, TchMode::Sign).unwrap() {
            TchFrame::Facch(d) => assert_eq!(d.data, block),
            other => panic!("expected FACCH, got {:?}", other),
        }
    }

    #[test]
    fn test_tx_mid_block_without_start() {
        let mut h = Harness::new();
        let mut lchan = active_lchan(LchanType::TchH(1));
        let req = BurstReq { fn_: 3, bid: 1 };
        assert!(matches!(tx(&mut h.ctx(2), &mut lchan, &req), Err(SchedError::NoPrim)));
    }
}
