use trxcon_core::{BurstBuf, BurstType, SBit, TchMode, UBit};

use super::components::a5::A5Cipher;
use super::lchan_desc::LchanType;
use super::meas::{MeasHist, MeasSet};
use super::prim::{Primitive, SacchState};

/// Receive bookkeeping used for frame loss compensation
#[derive(Debug, Clone, Copy, Default)]
pub struct TdmaStats {
    /// Frame number of the last processed (or substituted) burst
    pub last_proc: u32,
    pub num_proc: u32,
    pub num_lost: u32,
}

/// Runtime state of one logical channel on a timeslot
pub struct LchanState {
    pub chan: LchanType,
    pub active: bool,
    pub burst_type: BurstType,

    /// Bursts accumulated for the block(s) in progress, bit n is burst n
    pub rx_mask: u32,
    pub tx_mask: u32,
    pub rx_bursts: BurstBuf<SBit>,
    pub tx_bursts: BurstBuf<UBit>,

    pub meas: MeasHist,
    pub meas_avg: MeasSet,

    pub tch_mode: TchMode,
    /// Training sequence code for normal bursts
    pub tsc: u8,

    /// TCH/H: the next block downlink is the second one stolen by a FACCH/H
    pub dl_ongoing_facch: bool,
    /// TCH/H: uplink bursts still owed to a FACCH/H in progress
    pub ul_facch_blocks: u8,

    /// Primitive being transmitted
    pub prim: Option<Primitive>,
    pub a5: Option<A5Cipher>,
    pub tdma: TdmaStats,
    pub sacch: SacchState,
}

impl LchanState {
    pub fn new(chan: LchanType) -> Self {
        Self {
            chan,
            active: false,
            burst_type: BurstType::Gmsk,
            rx_mask: 0,
            tx_mask: 0,
            rx_bursts: BurstBuf::with_bits(0),
            tx_bursts: BurstBuf::with_bits(0),
            meas: MeasHist::default(),
            meas_avg: MeasSet::default(),
            tch_mode: TchMode::Sign,
            tsc: 0,
            dl_ongoing_facch: false,
            ul_facch_blocks: 0,
            prim: None,
            a5: None,
            tdma: TdmaStats::default(),
            sacch: SacchState::default(),
        }
    }

    /// Allocates the burst buffers of the channel type, if it has handlers
    pub fn alloc_buffers(&mut self) {
        let desc = self.chan.desc();
        if desc.burst_buf_size == 0 {
            return;
        }
        if desc.rx.is_some() {
            self.rx_bursts = BurstBuf::with_bits(desc.burst_buf_size);
        }
        if desc.tx.is_some() {
            self.tx_bursts = BurstBuf::with_bits(desc.burst_buf_size);
        }
    }

    /// Back to the freshly allocated, inactive state
    pub fn reset(&mut self) {
        if self.tdma.num_proc > 0 {
            tracing::debug!(
                "{}: TDMA stats: processed {} frames, {} lost",
                self.chan,
                self.tdma.num_proc,
                self.tdma.num_lost
            );
        }
        *self = Self::new(self.chan);
    }

    /// Measurement averaged over the last `n` bursts, stored as the block measurement
    pub fn meas_avg(&mut self, n: usize) {
        self.meas_avg = self.meas.avg(n);
    }

    pub fn chan_nr(&self, tn: u8) -> u8 {
        self.chan.desc().chan_nr | (tn & 7)
    }

    pub fn link_id(&self) -> u8 {
        self.chan.desc().link_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trxcon_core::A5Algo;

    #[test]
    fn test_alloc_by_table() {
        let mut l = LchanState::new(LchanType::TchH(1));
        assert!(l.rx_bursts.is_empty());
        l.alloc_buffers();
        assert_eq!(l.rx_bursts.num_bursts(), 6);
        assert_eq!(l.tx_bursts.num_bursts(), 6);

        // Receive only
        let mut l = LchanState::new(LchanType::Bcch);
        l.alloc_buffers();
        assert_eq!(l.rx_bursts.num_bursts(), 4);
        assert!(l.tx_bursts.is_empty());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut l = LchanState::new(LchanType::TchF);
        l.alloc_buffers();
        l.active = true;
        l.rx_mask = 0xff;
        l.tch_mode = TchMode::SpeechV1;
        l.ul_facch_blocks = 3;
        l.a5 = Some(A5Cipher::new(A5Algo(1), &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap());
        l.meas.push(10, -70, 0);
        l.tdma.num_proc = 4;

        l.reset();
        assert!(!l.active);
        assert_eq!(l.chan, LchanType::TchF);
        assert_eq!(l.rx_mask, 0);
        assert_eq!(l.tch_mode, TchMode::Sign);
        assert_eq!(l.ul_facch_blocks, 0);
        assert!(l.a5.is_none());
        assert!(l.rx_bursts.is_empty());
        assert_eq!(l.tdma.num_proc, 0);
        assert_eq!(l.meas.avg(1), MeasSet::default());
    }

    #[test]
    fn test_chan_nr() {
        let l = LchanState::new(LchanType::Sacch8(2));
        assert_eq!(l.chan_nr(5), 0x55);
        assert_eq!(l.link_id(), 0x40);
    }
}
