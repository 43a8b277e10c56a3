//! TDMA scheduler core: timeslots, their logical channels and transmit queues, and the
//! multiframe dispatch of received and transmitted bursts.

use std::sync::Arc;

use trxcon_core::bits::GSM_BURST_LEN;
use trxcon_core::tdma::{TRX_TS_COUNT, fn_diff, fn_inc};
use trxcon_core::{A5Algo, MAX_A5_KEY_LEN, PchanConfig, SBit, TchMode, UBit};
use trxcon_saps::SapMsgInner;

use super::SchedError;
use super::components::a5::A5Cipher;
use super::components::codec::{ChannelCodec, Gsm0503Codec};
use super::lchan::LchanState;
use super::lchan_desc::{LchanType, RxHandler, TxHandler};
use super::lchans::{self, BurstInd, BurstReq, LchanCtx, SyncState};
use super::mframe::{MframeLayout, MframeTables};
use super::prim::{PrimQueue, Primitive, dummy_prim};

/// Signal level reported with a burst substituted for a lost frame
const SUBST_RSSI: i8 = -120;

/// A timeslot owns its logical channels and its transmit queue
pub struct Timeslot {
    pub tn: u8,
    /// None after `reset_ts` until the timeslot is configured again
    pub layout: Option<Arc<MframeLayout>>,
    pub lchans: Vec<LchanState>,
    pub queue: PrimQueue,
}

impl Timeslot {
    fn new(tn: u8) -> Self {
        Self {
            tn,
            layout: None,
            lchans: Vec::new(),
            queue: PrimQueue::new(),
        }
    }

    pub fn find_lchan(&self, chan: LchanType) -> Option<&LchanState> {
        self.lchans.iter().find(|l| l.chan == chan)
    }

    pub fn find_lchan_mut(&mut self, chan: LchanType) -> Option<&mut LchanState> {
        self.lchans.iter_mut().find(|l| l.chan == chan)
    }

    fn activate(&mut self, chan: LchanType) -> Result<(), SchedError> {
        let tn = self.tn;
        let lchan = self.find_lchan_mut(chan).ok_or(SchedError::NoLchan(chan))?;
        if lchan.active {
            tracing::error!("logical channel {} already activated on tn={}", chan, tn);
            return Err(SchedError::AlreadyActive(chan));
        }
        tracing::info!("activating lchan={} on tn={}", chan, tn);
        lchan.alloc_buffers();
        lchan.active = true;
        Ok(())
    }

    fn deactivate(&mut self, chan: LchanType) -> Result<(), SchedError> {
        let tn = self.tn;
        let lchan = self.find_lchan_mut(chan).ok_or(SchedError::NoLchan(chan))?;
        if !lchan.active {
            tracing::error!("logical channel {} already deactivated on tn={}", chan, tn);
            return Err(SchedError::NotActive(chan));
        }
        tracing::debug!("deactivating lchan={} on tn={}", chan, tn);
        lchan.reset();
        self.queue.flush_chan(chan);
        Ok(())
    }

    fn deactivate_all(&mut self) {
        tracing::debug!("deactivating all logical channels on tn={}", self.tn);
        for lchan in self.lchans.iter_mut() {
            lchan.reset();
        }
    }
}

/// Runs the lost frame substitution for `lchan` ahead of a burst received at `fn_`.
/// Returns the number of bursts fed to the handler in place of the missing ones.
fn subst_frame_loss(
    ctx: &mut LchanCtx,
    layout: &MframeLayout,
    handler: RxHandler,
    lchan: &mut LchanState,
    fn_: u32,
) -> Result<u32, SchedError> {
    // Nothing to compare against before the first burst
    if lchan.tdma.num_proc == 0 {
        return Err(SchedError::NoHistory);
    }

    let last = lchan.tdma.last_proc;
    let elapsed = fn_diff(fn_, last);
    if elapsed < 0 {
        tracing::error!(
            ts = fn_,
            "{}: rx burst with fn={} older than the last processed fn={}, dropping",
            lchan.chan,
            fn_,
            last
        );
        return Err(SchedError::Stale { fn_, last });
    }
    if elapsed as u32 > layout.period {
        tracing::warn!(
            ts = fn_,
            "{}: too many (>{}) contiguous TDMA frames elapsed ({}) since the last processed fn={}",
            lchan.chan,
            layout.period,
            elapsed,
            last
        );
        return Err(SchedError::GapTooLarge {
            elapsed: elapsed as u32,
            period: layout.period,
        });
    }
    if elapsed == 0 {
        tracing::error!(ts = fn_, "{}: no TDMA frames elapsed since the last processed fn={}", lchan.chan, last);
        return Err(SchedError::Duplicate { fn_ });
    }

    let zeros = [0 as SBit; GSM_BURST_LEN];
    let mut subst_fn = last;
    let mut substituted = 0;
    for _ in 0..elapsed - 1 {
        subst_fn = fn_inc(subst_fn);
        let frame = layout.frame(subst_fn);
        if frame.dl_chan != lchan.chan {
            continue;
        }

        tracing::info!(ts = subst_fn, "{}: substituting lost TDMA frame", lchan.chan);
        let bi = BurstInd {
            fn_: subst_fn,
            bid: frame.dl_bid,
            burst: &zeros,
            rssi: SUBST_RSSI,
            toa256: 0,
        };
        if let Err(e) = lchans::handle_rx(handler, ctx, lchan, &bi) {
            tracing::trace!(ts = subst_fn, "{}: substituted burst: {}", lchan.chan, e);
        }

        lchan.tdma.last_proc = subst_fn;
        lchan.tdma.num_proc = lchan.tdma.num_proc.wrapping_add(1);
        lchan.tdma.num_lost += 1;
        substituted += 1;
    }
    Ok(substituted)
}

/// Scheduler for the eight timeslots of one transceiver
pub struct L1Scheduler {
    tables: MframeTables,
    codec: Box<dyn ChannelCodec>,
    slots: [Option<Timeslot>; TRX_TS_COUNT],
    pub sync: SyncState,
    /// ARFCN reported in indications and confirmations
    pub band_arfcn: u16,
}

impl Default for L1Scheduler {
    fn default() -> Self {
        Self::new(Box::new(Gsm0503Codec::new()))
    }
}

impl L1Scheduler {
    pub fn new(codec: Box<dyn ChannelCodec>) -> Self {
        tracing::info!("init scheduler");
        Self {
            tables: MframeTables::new(),
            codec,
            slots: Default::default(),
            sync: SyncState::default(),
            band_arfcn: 0,
        }
    }

    pub fn ts(&self, tn: u8) -> Option<&Timeslot> {
        self.slots.get(tn as usize)?.as_ref()
    }

    pub fn ts_mut(&mut self, tn: u8) -> Option<&mut Timeslot> {
        self.slots.get_mut(tn as usize)?.as_mut()
    }

    /// Configured timeslot, or NotConfigured
    fn configured_ts(&mut self, tn: u8) -> Result<&mut Timeslot, SchedError> {
        match self.ts_mut(tn) {
            Some(ts) if ts.layout.is_some() => Ok(ts),
            _ => Err(SchedError::NotConfigured { tn }),
        }
    }

    pub fn find_lchan(&self, tn: u8, chan: LchanType) -> Option<&LchanState> {
        self.ts(tn)?.find_lchan(chan)
    }

    /// Number of primitives waiting on a timeslot
    pub fn queue_len(&self, tn: u8) -> usize {
        self.ts(tn).map_or(0, |ts| ts.queue.len())
    }

    /// (Re)configures a timeslot for a channel combination. Channels flagged for automatic
    /// activation are activated right away.
    pub fn configure_ts(&mut self, tn: u8, config: PchanConfig) -> Result<(), SchedError> {
        if tn as usize >= TRX_TS_COUNT {
            return Err(SchedError::NotConfigured { tn });
        }
        match self.slots[tn as usize] {
            Some(_) => self.reset_ts(tn)?,
            None => {
                tracing::info!("add a new TDMA timeslot #{}", tn);
                self.slots[tn as usize] = Some(Timeslot::new(tn));
            }
        }

        let Some(layout) = self.tables.lookup(config, tn) else {
            tracing::error!("no multiframe layout for {} on tn={}", config, tn);
            return Err(SchedError::NotConfigured { tn });
        };
        tracing::info!("(re)configure TDMA timeslot #{} as {}", tn, layout.name);

        let ts = self.allocated_ts(tn)?;
        ts.lchans = LchanType::ALL
            .iter()
            .copied()
            .filter(|t| layout.has_lchan(*t))
            .map(LchanState::new)
            .collect();
        ts.layout = Some(layout);

        let auto: Vec<LchanType> = ts
            .lchans
            .iter()
            .map(|l| l.chan)
            .filter(|t| t.desc().auto_active)
            .collect();
        for chan in auto {
            ts.activate(chan)?;
        }
        Ok(())
    }

    fn allocated_ts(&mut self, tn: u8) -> Result<&mut Timeslot, SchedError> {
        self.ts_mut(tn).ok_or(SchedError::NotConfigured { tn })
    }

    /// Drops the layout, the channels and the queue of a timeslot
    pub fn reset_ts(&mut self, tn: u8) -> Result<(), SchedError> {
        let ts = self.allocated_ts(tn)?;
        ts.queue.flush();
        ts.deactivate_all();
        ts.lchans.clear();
        ts.layout = None;
        Ok(())
    }

    pub fn del_ts(&mut self, tn: u8) {
        if self.reset_ts(tn).is_ok() {
            tracing::info!("delete TDMA timeslot #{}", tn);
            self.slots[tn as usize] = None;
        }
    }

    /// Deletes every timeslot. Stopping the clock is up to the caller.
    pub fn reset(&mut self) {
        tracing::info!("reset scheduler");
        for tn in 0..TRX_TS_COUNT as u8 {
            self.del_ts(tn);
        }
        self.sync = SyncState::default();
    }

    pub fn activate(&mut self, tn: u8, chan: LchanType) -> Result<(), SchedError> {
        self.configured_ts(tn)?.activate(chan)
    }

    pub fn deactivate(&mut self, tn: u8, chan: LchanType) -> Result<(), SchedError> {
        self.configured_ts(tn)?.deactivate(chan)
    }

    /// Activates or deactivates every channel sharing the base channel number of `chan_nr`,
    /// i.e. a dedicated channel together with its SACCH. Returns the first failure.
    pub fn set_lchans(&mut self, chan_nr: u8, active: bool, tch_mode: TchMode, tsc: u8) -> Result<(), SchedError> {
        let tn = chan_nr & 0x07;
        let ts = self.configured_ts(tn)?;

        let matching: Vec<LchanType> = ts
            .lchans
            .iter()
            .map(|l| l.chan)
            .filter(|t| t.desc().chan_nr == chan_nr & 0xf8)
            .collect();
        if matching.is_empty() {
            return Err(SchedError::NoLchan(LchanType::Idle));
        }

        let mut res = Ok(());
        for chan in matching {
            let rc = if active {
                ts.activate(chan).map(|_| {
                    if let Some(lchan) = ts.find_lchan_mut(chan) {
                        lchan.tch_mode = tch_mode;
                        lchan.tsc = tsc;
                    }
                })
            } else {
                ts.deactivate(chan)
            };
            if res.is_ok() {
                res = rc;
            }
        }
        res
    }

    /// Enables ciphering on every active channel of a timeslot. A5/0 disables it.
    pub fn start_ciphering(&mut self, tn: u8, algo: A5Algo, key: &[u8]) -> Result<(), SchedError> {
        if key.len() > MAX_A5_KEY_LEN {
            tracing::error!("A5 key of {} bytes is too long", key.len());
            return Err(SchedError::InvalidKeyLen(key.len()));
        }
        let cipher = match algo.0 {
            0 => None,
            _ => Some(A5Cipher::new(algo, key).map_err(SchedError::Cipher)?),
        };

        let ts = self.configured_ts(tn)?;
        for lchan in ts.lchans.iter_mut().filter(|l| l.active) {
            lchan.a5 = cipher.clone();
        }
        tracing::info!("{} enabled on tn={}", algo, tn);
        Ok(())
    }

    /// Queues a primitive for transmission. The addressed channel must exist and be active.
    pub fn enqueue(&mut self, tn: u8, prim: Primitive) -> Result<(), SchedError> {
        let ts = self.configured_ts(tn)?;
        match ts.find_lchan(prim.chan) {
            Some(lchan) if lchan.active => {
                ts.queue.enqueue(prim);
                Ok(())
            }
            _ => {
                tracing::error!(
                    "no [active] lchan for chan_nr=0x{:02x} link_id=0x{:02x}, dropping prim",
                    prim.chan_nr,
                    prim.link_id
                );
                Err(SchedError::NoLchan(prim.chan))
            }
        }
    }

    /// Whether a burst is expected on (tn, fn) by an active channel
    pub fn handle_rx_probe(&self, tn: u8, fn_: u32) -> Result<bool, SchedError> {
        let ts = self.ts(tn).ok_or(SchedError::NotConfigured { tn })?;
        let layout = ts.layout.as_ref().ok_or(SchedError::NotConfigured { tn })?;
        let chan = layout.frame(fn_).dl_chan;
        if chan.desc().rx.is_none() {
            return Err(SchedError::NoHandler);
        }
        let lchan = ts.find_lchan(chan).ok_or(SchedError::NoHandler)?;
        Ok(lchan.active)
    }

    /// Dispatches a received burst to the channel the layout maps (tn, fn) to
    pub fn handle_rx_burst(
        &mut self,
        tn: u8,
        fn_: u32,
        rssi: i8,
        toa256: i16,
        mut burst: Vec<SBit>,
        out: &mut Vec<SapMsgInner>,
    ) -> Result<(), SchedError> {
        if burst.len() < GSM_BURST_LEN {
            return Err(SchedError::InvalidPayload {
                len: burst.len(),
                expected: GSM_BURST_LEN,
            });
        }

        let Self {
            codec,
            slots,
            sync,
            band_arfcn,
            ..
        } = self;
        let ts = match slots.get_mut(tn as usize) {
            Some(Some(ts)) if ts.layout.is_some() => ts,
            _ => {
                tracing::trace!(ts = fn_, "TDMA timeslot #{} isn't configured, ignoring burst", tn);
                return Err(SchedError::NotConfigured { tn });
            }
        };
        let Timeslot {
            layout, lchans, queue, ..
        } = ts;
        let Some(layout) = layout.as_deref() else {
            return Err(SchedError::NotConfigured { tn });
        };

        let frame = layout.frame(fn_);
        let (chan, bid) = (frame.dl_chan, frame.dl_bid);
        let Some(handler) = chan.desc().rx else {
            return Err(SchedError::NoHandler);
        };
        let Some(lchan) = lchans.iter_mut().find(|l| l.chan == chan) else {
            return Err(SchedError::NoHandler);
        };
        if !lchan.active {
            return Ok(());
        }

        let mut ctx = LchanCtx {
            codec: &**codec,
            tn,
            band_arfcn: *band_arfcn,
            queue,
            sync,
            out,
        };

        match subst_frame_loss(&mut ctx, layout, handler, lchan, fn_) {
            Err(e @ SchedError::Stale { .. }) => return Err(e),
            Err(SchedError::NoHistory) | Ok(_) => {}
            Err(e) => tracing::debug!(ts = fn_, "{}: loss compensation: {}", chan, e),
        }

        if let Some(a5) = &lchan.a5 {
            a5.decrypt_burst(fn_, &mut burst);
        }

        let bi = BurstInd {
            fn_,
            bid,
            burst: &burst,
            rssi,
            toa256,
        };
        let res = lchans::handle_rx(handler, &mut ctx, lchan, &bi);

        lchan.tdma.last_proc = fn_;
        lchan.tdma.num_proc = lchan.tdma.num_proc.wrapping_add(1);
        if lchan.tdma.num_proc == 0 {
            tracing::warn!("{}: TDMA frame counter wrapped", chan);
            lchan.tdma.num_proc = 1;
        }
        res
    }

    /// Builds the uplink burst for (tn, fn), if the layout maps it to an active channel
    /// with something to send
    pub fn pull_burst(&mut self, tn: u8, fn_: u32, out: &mut Vec<SapMsgInner>) -> Result<Option<Vec<UBit>>, SchedError> {
        let Self {
            codec,
            slots,
            sync,
            band_arfcn,
            ..
        } = self;
        let Some(Some(ts)) = slots.get_mut(tn as usize) else {
            return Ok(None);
        };
        let Timeslot {
            layout, lchans, queue, ..
        } = ts;
        let Some(layout) = layout.as_deref() else {
            return Ok(None);
        };

        let frame = layout.frame(fn_);
        let (chan, bid) = (frame.ul_chan, frame.ul_bid);
        let Some(mut handler) = chan.desc().tx else {
            return Ok(None);
        };
        let Some(lchan) = lchans.iter_mut().find(|l| l.chan == chan && l.active) else {
            return Ok(None);
        };

        if lchan.prim.is_none() {
            // Handover access preempts whatever the channel would send
            lchan.prim = queue.dequeue_urgent_rach(chan);
        }
        if lchan.prim.is_none() && !matches!(handler, TxHandler::TchH | TxHandler::Pdtch) {
            let desc = chan.desc();
            lchan.prim = if chan.is_sacch() {
                let chan_nr = lchan.chan_nr(tn);
                Some(queue.dequeue_sacch(chan, chan_nr, desc.link_id, &mut lchan.sacch))
            } else {
                queue.dequeue(chan)
            };
            if lchan.prim.is_none() && desc.cbtx {
                lchan.prim = dummy_prim(chan, lchan.chan_nr(tn), desc.link_id, lchan.tch_mode);
            }
            if lchan.prim.is_none() {
                return Ok(None);
            }
        }

        if chan != LchanType::Rach && lchan.prim.as_ref().is_some_and(|p| p.is_rach()) {
            handler = TxHandler::Rach;
        }

        let mut ctx = LchanCtx {
            codec: &**codec,
            tn,
            band_arfcn: *band_arfcn,
            queue,
            sync,
            out,
        };
        let br = BurstReq { fn_, bid };
        let mut burst = lchans::handle_tx(handler, &mut ctx, lchan, &br)?;

        // Access bursts are never ciphered
        if let (Some(burst), Some(a5)) = (burst.as_mut(), &lchan.a5) {
            if handler != TxHandler::Rach {
                a5.encrypt_burst(fn_, burst);
            }
        }
        Ok(burst)
    }

    /// Pulls the uplink bursts of all timeslots for one frame
    pub fn pull_send_frame(&mut self, fn_: u32, out: &mut Vec<SapMsgInner>) -> Vec<(u8, Vec<UBit>)> {
        let mut bursts = Vec::new();
        for tn in 0..TRX_TS_COUNT as u8 {
            match self.pull_burst(tn, fn_, out) {
                Ok(Some(burst)) => bursts.push((tn, burst)),
                Ok(None) => {}
                Err(SchedError::NoPrim) => tracing::trace!(ts = fn_, "tn={}: nothing to send", tn),
                Err(e) => tracing::debug!(ts = fn_, "tn={}: failed to pull burst: {}", tn, e),
            }
        }
        bursts
    }
}
