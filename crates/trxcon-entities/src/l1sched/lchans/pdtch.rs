//! PDTCH: packet data blocks of 4 bursts. Uplink blocks are bound to the frame number
//! the upper layers scheduled them for.

use trxcon_core::bits::burst_mask_str;
use trxcon_core::tdma::fn_sub;

use super::{BurstInd, BurstReq, LchanCtx, TxResult, compose_nb, copy_nb_payload, failed_ber};
use crate::l1sched::SchedError;
use crate::l1sched::lchan::LchanState;

pub fn rx(ctx: &mut LchanCtx, lchan: &mut LchanState, bi: &BurstInd) -> Result<(), SchedError> {
    if lchan.rx_mask == 0 && bi.bid != 0 {
        return Ok(());
    }

    lchan.rx_mask |= 1 << bi.bid;
    lchan.meas.push(bi.fn_, bi.rssi, bi.toa256);
    copy_nb_payload(lchan.rx_bursts.burst_mut(bi.bid as usize), bi.burst);

    if bi.bid != 3 {
        return Ok(());
    }

    lchan.meas_avg(4);
    if lchan.rx_mask & 0xf != 0xf {
        tracing::error!(
            ts = bi.fn_,
            "{}: received incomplete packet data ({})",
            lchan.chan,
            burst_mask_str(lchan.rx_mask as u8, 4)
        );
    }
    lchan.rx_mask = (lchan.rx_mask << 4) & 0xff;

    match ctx.codec.pdtch_decode(lchan.rx_bursts.head(4)) {
        Ok(block) => ctx.data_ind(lchan, block.data, block.n_errors, block.n_bits_total, true),
        Err(e) => {
            tracing::error!(ts = bi.fn_, "{}: received bad block: {}", lchan.chan, e);
            let (n_errors, n_bits_total) = failed_ber(&e);
            ctx.data_ind(lchan, Vec::new(), n_errors, n_bits_total, true);
        }
    }
    Ok(())
}

pub fn tx(ctx: &mut LchanCtx, lchan: &mut LchanState, br: &BurstReq) -> TxResult {
    if br.bid > 0 {
        if lchan.tx_mask & 0x01 == 0 {
            return Err(SchedError::NoPrim);
        }
    } else {
        lchan.tx_mask <<= 4;

        let Some(prim) = ctx.queue.dequeue_pdtch(lchan.chan, br.fn_) else {
            return Ok(None);
        };
        match ctx.codec.pdtch_encode(prim.bytes()) {
            Ok(bits) => lchan.tx_bursts.head_mut(4).copy_from_slice(&bits),
            Err(e) => {
                tracing::error!(
                    ts = br.fn_,
                    "{}: failed to encode L2 payload (len={}): {}",
                    lchan.chan,
                    prim.bytes().len(),
                    e
                );
                return Err(SchedError::Codec(e));
            }
        }
        lchan.prim = Some(prim);
    }

    let burst = compose_nb(lchan.tx_bursts.burst(br.bid as usize), lchan.tsc);
    lchan.tx_mask |= 1 << br.bid;
    tracing::trace!(ts = br.fn_, "{}: transmitting burst bid={}", lchan.chan, br.bid);

    if br.bid == 3 {
        let is_traffic = lchan.prim.take().is_some_and(|p| p.is_traffic());
        ctx.data_conf(lchan, fn_sub(br.fn_, 3), is_traffic);
    }
    Ok(Some(burst))
}

#[cfg(test)]
mod tests {
    use trxcon_core::bits::GSM_NBITS_NB_GMSK_PAYLOAD as BPLEN;

    use super::*;
    use crate::l1sched::components::codec::ChannelCodec;
    use crate::l1sched::lchan_desc::LchanType;
    use crate::l1sched::lchans::testutil::*;
    use crate::l1sched::prim::Primitive;

    #[test]
    fn test_rx_cs1_block() {
        let mut h = Harness::new();
        let mut lchan = active_lchan(LchanType::Pdtch);
        assert_eq!(lchan.rx_bursts.num_bursts(), 12);
        let block = mac_block(0x40);
        let coded = h.codec.pdtch_encode(&block).unwrap();
        for bid in 0..4u8 {
            let burst = soft_nb(&coded[bid as usize * BPLEN..(bid as usize + 1) * BPLEN]);
            let bi = BurstInd {
                fn_: 104 + bid as u32,
                bid,
                burst: &burst,
                rssi: -75,
                toa256: 0,
            };
            rx(&mut h.ctx(7), &mut lchan, &bi).unwrap();
        }
        let inds = h.data_inds();
        assert_eq!(inds.len(), 1);
        assert_eq!(inds[0].payload, block);
        assert!(inds[0].is_traffic);
        assert_eq!(inds[0].chan_nr, 0xc7);
    }

    #[test]
    fn test_tx_scheduled_block() {
        let mut h = Harness::new();
        let mut lchan = active_lchan(LchanType::Pdtch);
        let mut prim = Primitive::data(LchanType::Pdtch, 0xc7, 0, mac_block(1));
        prim.fn_ = Some(108);
        h.queue.enqueue(prim);

        // Not yet
        let req = BurstReq { fn_: 104, bid: 0 };
        assert!(tx(&mut h.ctx(7), &mut lchan, &req).unwrap().is_none());
        let req = BurstReq { fn_: 105, bid: 1 };
        assert!(matches!(tx(&mut h.ctx(7), &mut lchan, &req), Err(SchedError::NoPrim)));

        for bid in 0..4u8 {
            let req = BurstReq { fn_: 108 + bid as u32, bid };
            assert!(tx(&mut h.ctx(7), &mut lchan, &req).unwrap().is_some());
        }
        let confs = h.data_confs();
        assert_eq!(confs.len(), 1);
        assert_eq!(confs[0].fn_, 108);
        assert!(lchan.prim.is_none());
        assert!(h.queue.is_empty());
    }

    #[test]
    fn test_tx_unsupported_coding_scheme() {
        let mut h = Harness::new();
        let mut lchan = active_lchan(LchanType::Pdtch);
        let mut prim = Primitive::data(LchanType::Pdtch, 0xc7, 0, vec![0; 54]);
        prim.fn_ = Some(0);
        h.queue.enqueue(prim);
        let req = BurstReq { fn_: 0, bid: 0 };
        assert!(matches!(tx(&mut h.ctx(7), &mut lchan, &req), Err(SchedError::Codec(_))));
        assert!(h.queue.is_empty());
    }
}
