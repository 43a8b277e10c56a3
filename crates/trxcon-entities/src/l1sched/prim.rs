//! Uplink primitives and the per-timeslot transmit queue

use std::collections::VecDeque;

use rand::Rng;
use trxcon_core::TchMode;
use trxcon_core::bits::GSM_MACBLOCK_LEN;
use trxcon_saps::l1ctl::RachSynchSeq;

use super::components::codec::{GSM_EFR_BYTES, GSM_FR_BYTES, GSM_HR_BYTES};
use super::lchan_desc::LchanType;

/// Random access request, waiting for its transmission opportunity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RachPrim {
    /// RACH opportunities left to skip
    pub offset: u16,
    pub ra: u16,
    pub is_11bit: bool,
    pub synch_seq: RachSynchSeq,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimPayload {
    /// L2 frame, traffic frame or packet data block
    Data(Vec<u8>),
    Rach(RachPrim),
}

/// A channel-tagged uplink primitive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Primitive {
    pub chan: LchanType,
    pub chan_nr: u8,
    pub link_id: u8,
    /// Frame number the block has to be sent in, PDTCH only
    pub fn_: Option<u32>,
    pub payload: PrimPayload,
}

impl Primitive {
    pub fn data(chan: LchanType, chan_nr: u8, link_id: u8, payload: Vec<u8>) -> Self {
        Self {
            chan,
            chan_nr,
            link_id,
            fn_: None,
            payload: PrimPayload::Data(payload),
        }
    }

    pub fn rach(chan: LchanType, chan_nr: u8, link_id: u8, req: RachPrim) -> Self {
        Self {
            chan,
            chan_nr,
            link_id,
            fn_: None,
            payload: PrimPayload::Rach(req),
        }
    }

    /// Payload bytes, empty for RACH
    pub fn bytes(&self) -> &[u8] {
        match &self.payload {
            PrimPayload::Data(d) => d,
            PrimPayload::Rach(_) => &[],
        }
    }

    pub fn is_rach(&self) -> bool {
        matches!(self.payload, PrimPayload::Rach(_))
    }

    /// A MAC block sent on a traffic channel steals it
    pub fn is_facch(&self) -> bool {
        matches!(&self.payload, PrimPayload::Data(d) if d.len() == GSM_MACBLOCK_LEN)
    }

    /// Traffic frame, as opposed to signalling
    pub fn is_traffic(&self) -> bool {
        self.chan.is_tch() && !self.is_facch() && !self.is_rach()
    }

    /// Measurement Report: RR protocol discriminator and message type after the
    /// SACCH L1 header and the LAPDm header
    pub fn is_meas_rep(&self) -> bool {
        let d = self.bytes();
        d.len() > 6 && d[5] == 0x06 && d[6] == 0x15
    }
}

/// Measurement Report sent until the upper layers provide one
pub const DUMMY_MEAS_REP: [u8; GSM_MACBLOCK_LEN] = [
    0x0f, 0x00, // L1 header: MS power 15, TA 0
    0x01, 0x03, 0x49, // LAPDm: SAPI 0, UI, length 18
    0x06, 0x15, // RR Measurement Report
    0x36, 0x76, 0x01, 0xc0, // RXLEV and quality, no neighbours
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// SACCH uplink state of a dedicated channel
#[derive(Debug, Clone)]
pub struct SacchState {
    pub mr_cache: [u8; GSM_MACBLOCK_LEN],
    pub mr_cache_usage: u32,
    /// Whether the last block sent was a Measurement Report
    pub mr_tx_last: bool,
}

impl Default for SacchState {
    fn default() -> Self {
        Self {
            mr_cache: [0; GSM_MACBLOCK_LEN],
            mr_cache_usage: 0,
            mr_tx_last: false,
        }
    }
}

impl SacchState {
    /// Builds a Measurement Report from the cache, seeding it with the dummy report first
    fn compose_mr(&mut self, chan: LchanType, chan_nr: u8, link_id: u8) -> Primitive {
        let cached = self.mr_cache[2] != 0 && self.mr_cache[3] != 0 && self.mr_cache[4] != 0;
        if !cached {
            self.mr_cache = DUMMY_MEAS_REP;
        }

        self.mr_cache_usage += 1;
        if self.mr_cache_usage > 5 {
            tracing::warn!(
                "{}: SACCH MR cache usage count={} > 5, ancient measurements",
                chan,
                self.mr_cache_usage
            );
        }
        tracing::debug!("{}: using cached Measurement Report", chan);

        Primitive::data(chan, chan_nr, link_id, self.mr_cache.to_vec())
    }
}

/// Transmit queue of a timeslot, bounded only by memory
#[derive(Debug, Default)]
pub struct PrimQueue {
    prims: VecDeque<Primitive>,
}

impl PrimQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, prim: Primitive) {
        tracing::debug!(
            "enqueue {} prim (chan_nr=0x{:02x} link_id=0x{:02x} len={})",
            prim.chan,
            prim.chan_nr,
            prim.link_id,
            prim.bytes().len()
        );
        self.prims.push_back(prim);
    }

    pub fn len(&self) -> usize {
        self.prims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prims.is_empty()
    }

    pub fn flush(&mut self) {
        self.prims.clear();
    }

    /// Drops every primitive addressed to `chan`
    pub fn flush_chan(&mut self, chan: LchanType) {
        self.prims.retain(|p| p.chan != chan);
    }

    fn take_first(&mut self, pred: impl Fn(&Primitive) -> bool) -> Option<Primitive> {
        let pos = self.prims.iter().position(pred)?;
        self.prims.remove(pos)
    }

    /// First primitive for `chan`, in arrival order
    pub fn dequeue_one(&mut self, chan: LchanType) -> Option<Primitive> {
        self.take_first(|p| p.chan == chan)
    }

    /// A random access request addressed to a dedicated channel (handover access),
    /// which preempts whatever the channel would send otherwise
    pub fn dequeue_urgent_rach(&mut self, chan: LchanType) -> Option<Primitive> {
        if chan == LchanType::Rach {
            return None;
        }
        self.take_first(|p| p.chan == chan && p.is_rach())
    }

    /// First FACCH (`facch`) or traffic frame for `chan`
    pub fn dequeue_tch(&mut self, chan: LchanType, facch: bool) -> Option<Primitive> {
        self.take_first(|p| p.chan == chan && !p.is_rach() && p.is_facch() == facch)
    }

    /// FACCH/F wins over TCH/F. The traffic frame it steals is discarded.
    pub fn dequeue_tch_f(&mut self, chan: LchanType) -> Option<Primitive> {
        let facch = self.dequeue_tch(chan, true);
        let tch = self.dequeue_tch(chan, false);
        match (facch, tch) {
            (Some(facch), Some(_)) => {
                tracing::debug!("{}: FACCH replaces a traffic frame", chan);
                Some(facch)
            }
            (Some(facch), None) => Some(facch),
            (None, tch) => tch,
        }
    }

    /// Packet data block scheduled for the block starting at `fn_`. Future blocks stay
    /// queued, blocks whose frame has passed are dropped.
    pub fn dequeue_pdtch(&mut self, chan: LchanType, fn_: u32) -> Option<Primitive> {
        while let Some(pos) = self.prims.iter().position(|p| p.chan == chan) {
            let prim_fn = self.prims[pos].fn_.unwrap_or(fn_);
            let diff = trxcon_core::tdma::fn_diff(prim_fn, fn_);
            if diff == 0 {
                return self.prims.remove(pos);
            }
            if diff > 0 {
                return None;
            }
            tracing::error!(
                "{}: dropping stale Tx prim (current fn={}, prim fn={})",
                chan,
                fn_,
                prim_fn
            );
            self.prims.remove(pos);
        }
        None
    }

    /// Measurement Reports and other frames alternate on SACCH. When nothing
    /// suitable is queued a report is composed from the cache, so this always
    /// yields a primitive.
    pub fn dequeue_sacch(&mut self, chan: LchanType, chan_nr: u8, link_id: u8, sacch: &mut SacchState) -> Primitive {
        let mr_now = !sacch.mr_tx_last;

        let mr = self
            .prims
            .iter()
            .position(|p| p.chan == chan && !p.is_rach() && p.is_meas_rep());
        let nmr = self
            .prims
            .iter()
            .position(|p| p.chan == chan && !p.is_rach() && !p.is_meas_rep());

        let pick = match (mr_now, mr, nmr) {
            (true, Some(pos), _) => Some(pos),
            (false, _, Some(pos)) => Some(pos),
            (false, Some(pos), None) => Some(pos),
            _ => None,
        };

        let prim = match pick.and_then(|pos| self.prims.remove(pos)) {
            Some(prim) => {
                if prim.is_meas_rep() {
                    let mut cache = [0u8; GSM_MACBLOCK_LEN];
                    let n = prim.bytes().len().min(GSM_MACBLOCK_LEN);
                    cache[..n].copy_from_slice(&prim.bytes()[..n]);
                    sacch.mr_cache = cache;
                    sacch.mr_cache_usage = 0;
                    tracing::debug!("{}: SACCH MR cache has been updated", chan);
                }
                prim
            }
            None => sacch.compose_mr(chan, chan_nr, link_id),
        };

        sacch.mr_tx_last = prim.is_meas_rep();
        tracing::debug!(
            "{}: SACCH decision: {}",
            chan,
            if sacch.mr_tx_last { "Measurement Report" } else { "data frame" }
        );
        prim
    }

    /// Dequeue policy by channel type. SACCH, TCH/H and PDTCH have their own
    /// dequeue functions since they depend on channel state or timing.
    pub fn dequeue(&mut self, chan: LchanType) -> Option<Primitive> {
        match chan {
            LchanType::TchF => self.dequeue_tch_f(chan),
            _ => self.dequeue_one(chan),
        }
    }
}

/// LAPDm fill frame, TS 44.006 clause 8.4.2.3, padded with random fill bits.
/// SACCH frames carry a 2 byte L1 header in front.
pub fn dummy_lapdm(sacch: bool) -> Vec<u8> {
    let mut rng = rand::rng();
    let mut frame = Vec::with_capacity(GSM_MACBLOCK_LEN);
    if sacch {
        frame.extend_from_slice(&[0x00, 0x00]);
    }
    frame.extend_from_slice(&[0x01, 0x03, 0x01, 0x2b]);
    while frame.len() < GSM_MACBLOCK_LEN {
        frame.push(rng.random());
    }
    frame
}

/// Bad frame (silence) pattern of a speech mode, empty when the mode has none
pub fn bad_frame_ind(chan: LchanType, mode: TchMode) -> Vec<u8> {
    let (first, len) = match mode {
        TchMode::SpeechV1 if chan == LchanType::TchF => (0xd0, GSM_FR_BYTES),
        TchMode::SpeechV1 => (0x70, GSM_HR_BYTES),
        TchMode::SpeechEfr => (0xc0, GSM_EFR_BYTES),
        _ => return Vec::new(),
    };
    let mut frame = vec![0u8; len];
    frame[0] = first;
    frame
}

/// Filler primitive for channels that transmit continuously. Data modes have none.
pub fn dummy_prim(chan: LchanType, chan_nr: u8, link_id: u8, mode: TchMode) -> Option<Primitive> {
    let payload = if chan.is_tch() && mode.is_speech() {
        bad_frame_ind(chan, mode)
    } else if chan.is_tch() && mode.is_data() {
        return None;
    } else {
        dummy_lapdm(chan.is_sacch())
    };
    if payload.is_empty() {
        return None;
    }
    tracing::debug!("{}: transmitting a dummy / silence frame", chan);
    Some(Primitive::data(chan, chan_nr, link_id, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tch(len: usize, tag: u8) -> Primitive {
        Primitive::data(LchanType::TchF, 0x0a, 0, vec![tag; len])
    }

    fn sacch(payload: Vec<u8>) -> Primitive {
        Primitive::data(LchanType::SacchTf, 0x0a, 0x40, payload)
    }

    fn meas_rep(tag: u8) -> Vec<u8> {
        let mut mr = DUMMY_MEAS_REP.to_vec();
        mr[10] = tag;
        mr
    }

    #[test]
    fn test_facch_replaces_tch() {
        let mut q = PrimQueue::new();
        q.enqueue(tch(GSM_FR_BYTES, 1));
        q.enqueue(tch(GSM_MACBLOCK_LEN, 2));
        assert_eq!(q.len(), 2);

        let p = q.dequeue(LchanType::TchF).unwrap();
        assert!(p.is_facch());
        assert_eq!(p.bytes()[0], 2);
        // The stolen traffic frame is gone
        assert!(q.dequeue(LchanType::TchF).is_none());
        assert!(q.is_empty());
    }

    #[test]
    fn test_tch_fifo_without_facch() {
        let mut q = PrimQueue::new();
        q.enqueue(tch(GSM_FR_BYTES, 1));
        q.enqueue(tch(GSM_FR_BYTES, 2));
        assert_eq!(q.dequeue(LchanType::TchF).unwrap().bytes()[0], 1);
        assert_eq!(q.dequeue(LchanType::TchF).unwrap().bytes()[0], 2);
    }

    #[test]
    fn test_fifo_by_channel() {
        let mut q = PrimQueue::new();
        q.enqueue(Primitive::data(LchanType::Sdcch4(0), 0x20, 0, vec![1; 23]));
        q.enqueue(Primitive::data(LchanType::Sdcch4(1), 0x28, 0, vec![2; 23]));
        q.enqueue(Primitive::data(LchanType::Sdcch4(0), 0x20, 0, vec![3; 23]));

        assert_eq!(q.dequeue(LchanType::Sdcch4(1)).unwrap().bytes()[0], 2);
        assert_eq!(q.dequeue(LchanType::Sdcch4(0)).unwrap().bytes()[0], 1);
        assert_eq!(q.dequeue(LchanType::Sdcch4(0)).unwrap().bytes()[0], 3);
        assert!(q.dequeue(LchanType::Sdcch4(0)).is_none());
    }

    #[test]
    fn test_urgent_rach() {
        let mut q = PrimQueue::new();
        q.enqueue(tch(GSM_FR_BYTES, 1));
        let req = RachPrim {
            offset: 0,
            ra: 0x42,
            is_11bit: false,
            synch_seq: RachSynchSeq::Ts0,
        };
        q.enqueue(Primitive::rach(LchanType::TchF, 0x0a, 0, req));

        assert!(q.dequeue_urgent_rach(LchanType::Rach).is_none());
        let p = q.dequeue_urgent_rach(LchanType::TchF).unwrap();
        assert!(p.is_rach());
        // The access request is never taken as a traffic frame
        assert!(!q.dequeue(LchanType::TchF).unwrap().is_rach());
    }

    #[test]
    fn test_pdtch_fn_matching() {
        let mut q = PrimQueue::new();
        for fn_ in [100u32, 104, 113] {
            let mut p = Primitive::data(LchanType::Pdtch, 0xc0, 0, vec![0; 23]);
            p.fn_ = Some(fn_);
            q.enqueue(p);
        }
        // 100 is stale and dropped, 104 matches
        assert_eq!(q.dequeue_pdtch(LchanType::Pdtch, 104).unwrap().fn_, Some(104));
        // 113 is in the future
        assert!(q.dequeue_pdtch(LchanType::Pdtch, 108).is_none());
        assert_eq!(q.len(), 1);
        assert_eq!(q.dequeue_pdtch(LchanType::Pdtch, 113).unwrap().fn_, Some(113));
    }

    #[test]
    fn test_sacch_alternates_mr() {
        let mut q = PrimQueue::new();
        let mut st = SacchState::default();
        q.enqueue(sacch(vec![0x00, 0x00, 0x01, 0x03, 0x01, 0x2b, 0x2b]));
        q.enqueue(sacch(meas_rep(0xaa)));
        q.enqueue(sacch(vec![0x00, 0x00, 0x05, 0x03, 0x01, 0x2b, 0x2b]));

        // MR first, then the other frames
        let p = q.dequeue_sacch(LchanType::SacchTf, 0x0a, 0x40, &mut st);
        assert!(p.is_meas_rep());
        assert_eq!(st.mr_cache[10], 0xaa);
        assert!(st.mr_tx_last);

        let p = q.dequeue_sacch(LchanType::SacchTf, 0x0a, 0x40, &mut st);
        assert_eq!(p.bytes()[2], 0x01);
        assert!(!st.mr_tx_last);

        // No MR queued: compose one from the cache
        let p = q.dequeue_sacch(LchanType::SacchTf, 0x0a, 0x40, &mut st);
        assert!(p.is_meas_rep());
        assert_eq!(p.bytes()[10], 0xaa);
        assert_eq!(st.mr_cache_usage, 1);

        let p = q.dequeue_sacch(LchanType::SacchTf, 0x0a, 0x40, &mut st);
        assert_eq!(p.bytes()[2], 0x05);
        assert!(q.is_empty());
    }

    #[test]
    fn test_sacch_dummy_mr() {
        let mut q = PrimQueue::new();
        let mut st = SacchState::default();
        let p = q.dequeue_sacch(LchanType::Sacch4(1), 0x28, 0x40, &mut st);
        assert_eq!(p.bytes(), &DUMMY_MEAS_REP);
        assert_eq!(p.link_id, 0x40);
        // Nothing but reports available, so reports keep going out
        for _ in 0..6 {
            assert!(q.dequeue_sacch(LchanType::Sacch4(1), 0x28, 0x40, &mut st).is_meas_rep());
        }
        assert_eq!(st.mr_cache_usage, 7);
    }

    #[test]
    fn test_dummy_prims() {
        let p = dummy_prim(LchanType::Sdcch8(3), 0x58, 0, TchMode::Sign).unwrap();
        assert_eq!(p.bytes().len(), GSM_MACBLOCK_LEN);
        assert_eq!(&p.bytes()[..4], &[0x01, 0x03, 0x01, 0x2b]);

        let p = dummy_prim(LchanType::SacchTf, 0x08, 0x40, TchMode::Sign).unwrap();
        assert_eq!(&p.bytes()[..6], &[0x00, 0x00, 0x01, 0x03, 0x01, 0x2b]);

        let p = dummy_prim(LchanType::TchF, 0x08, 0, TchMode::SpeechV1).unwrap();
        assert_eq!(p.bytes().len(), GSM_FR_BYTES);
        assert_eq!(p.bytes()[0], 0xd0);
        assert!(p.is_traffic());

        let p = dummy_prim(LchanType::TchF, 0x08, 0, TchMode::Sign).unwrap();
        assert!(p.is_facch());

        assert!(dummy_prim(LchanType::TchF, 0x08, 0, TchMode::Data12k0).is_none());
    }

    #[test]
    fn test_bad_frame_patterns() {
        assert_eq!(bad_frame_ind(LchanType::TchF, TchMode::SpeechEfr)[0], 0xc0);
        assert_eq!(bad_frame_ind(LchanType::TchF, TchMode::SpeechEfr).len(), GSM_EFR_BYTES);
        let hr = bad_frame_ind(LchanType::TchH(1), TchMode::SpeechV1);
        assert_eq!(hr.len(), GSM_HR_BYTES);
        assert_eq!(hr[0], 0x70);
        assert!(bad_frame_ind(LchanType::TchF, TchMode::Sign).is_empty());
    }
}
