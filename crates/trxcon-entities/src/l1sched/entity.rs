//! Scheduler entity: L1CTL requests in, bursts to and from the transceiver link,
//! indications and confirmations back up.

use trxcon_config::SharedConfig;
use trxcon_core::tdma::fn_add;
use trxcon_core::{Sap, TrxconEntity};
use trxcon_saps::l1ctl::{L1ctlDataReq, L1ctlFbsbReq, L1ctlRachReq};
use trxcon_saps::trxc::{TrxCmd, TrxcCmdReq};
use trxcon_saps::trxd::{TrxdBurstInd, TrxdBurstReq};
use trxcon_saps::{SapMsg, SapMsgInner};

use super::SchedError;
use super::components::codec::ChannelCodec;
use super::lchan_desc::{LchanType, chan_nr2lchan_type};
use super::prim::{Primitive, RachPrim};
use super::sched::L1Scheduler;
use crate::{MessageQueue, TrxconEntityTrait};

pub struct L1Sched {
    config: SharedConfig,
    sched: L1Scheduler,

    /// Cached from config
    fn_advance: u32,
    tx_power: u8,

    /// Frame number of the last tick
    fn_: u32,
}

impl L1Sched {
    pub fn new(config: SharedConfig) -> Self {
        Self::with_scheduler(config, L1Scheduler::default())
    }

    pub fn with_codec(config: SharedConfig, codec: Box<dyn ChannelCodec>) -> Self {
        Self::with_scheduler(config, L1Scheduler::new(codec))
    }

    fn with_scheduler(config: SharedConfig, mut sched: L1Scheduler) -> Self {
        let (fn_advance, tx_power) = {
            let c = config.config();
            tracing::info!(
                "L1Sched: fn_advance={} band_arfcn={} bsic={:?}",
                c.trx.fn_advance,
                c.cell.band_arfcn,
                c.cell.bsic
            );
            sched.band_arfcn = c.cell.band_arfcn;
            // A preset BSIC allows random access without waiting for the SCH
            if let Some(bsic) = c.cell.bsic {
                sched.sync.bsic = bsic;
            }
            (c.trx.fn_advance, config.state_read().tx_power)
        };

        Self {
            config,
            sched,
            fn_advance,
            tx_power,
            fn_: 0,
        }
    }

    pub fn scheduler(&self) -> &L1Scheduler {
        &self.sched
    }

    pub fn scheduler_mut(&mut self) -> &mut L1Scheduler {
        &mut self.sched
    }

    fn send_up(&self, queue: &mut MessageQueue, out: Vec<SapMsgInner>) {
        for msg in out {
            if let SapMsgInner::L1ctlFbsbConf(conf) = &msg {
                if let Some(expected) = self.config.config().cell.bsic {
                    if expected != conf.bsic {
                        tracing::warn!(ts = conf.fn_, "decoded bsic={} differs from configured bsic={}", conf.bsic, expected);
                    }
                }
                self.config.state_write().bsic = Some(conf.bsic);
            }
            queue.push_back(SapMsg::new(
                Sap::L1ctlSap,
                TrxconEntity::L1Sched,
                TrxconEntity::L1ctl,
                self.fn_,
                msg,
            ));
        }
    }

    fn send_trxc(&self, queue: &mut MessageQueue, msg: SapMsgInner) {
        queue.push_back(SapMsg::new(
            Sap::TrxcSap,
            TrxconEntity::L1Sched,
            TrxconEntity::TrxLink,
            self.fn_,
            msg,
        ));
    }

    fn send_cmd(&self, queue: &mut MessageQueue, cmd: TrxCmd) {
        self.send_trxc(queue, SapMsgInner::TrxcCmdReq(TrxcCmdReq { cmd }));
    }

    fn enqueue(&mut self, tn: u8, prim: Primitive) {
        if let Err(e) = self.sched.enqueue(tn, prim) {
            tracing::error!(ts = self.fn_, "failed to enqueue prim on tn={}: {}", tn, e);
        }
    }

    fn rx_data_req(&mut self, req: L1ctlDataReq) {
        let chan = chan_nr2lchan_type(req.chan_nr, req.link_id);
        let mut prim = Primitive::data(chan, req.chan_nr, req.link_id, req.payload);
        prim.fn_ = req.fn_;
        self.enqueue(req.chan_nr & 0x07, prim);
    }

    fn rx_rach_req(&mut self, req: L1ctlRachReq) {
        // A RACH on a dedicated channel number is a handover access
        let chan = chan_nr2lchan_type(req.chan_nr, req.link_id);
        let rach = RachPrim {
            offset: req.offset,
            ra: req.ra,
            is_11bit: req.is_11bit,
            synch_seq: req.synch_seq,
        };
        tracing::debug!(
            ts = self.fn_,
            "RACH request on {}: ra=0x{:02x} offset={} 11bit={}",
            chan,
            req.ra,
            req.offset,
            req.is_11bit
        );
        self.enqueue(req.chan_nr & 0x07, Primitive::rach(chan, req.chan_nr, req.link_id, rach));
    }

    fn rx_fbsb_req(&mut self, queue: &mut MessageQueue, req: L1ctlFbsbReq) {
        tracing::info!(ts = self.fn_, "FBSB request on band_arfcn={}", req.band_arfcn);
        self.sched.sync.fbsb_conf_sent = false;
        self.sched.band_arfcn = req.band_arfcn;
        self.config.state_write().band_arfcn = req.band_arfcn;
        self.send_cmd(queue, TrxCmd::RxTune { band_arfcn: req.band_arfcn });
        self.send_cmd(queue, TrxCmd::TxTune { band_arfcn: req.band_arfcn });
    }

    fn rx_l1ctl_prim(&mut self, queue: &mut MessageQueue, message: SapMsg) {
        match message.msg {
            SapMsgInner::L1ctlDataReq(req) => self.rx_data_req(req),
            SapMsgInner::L1ctlTrafficReq(req) => {
                let chan = chan_nr2lchan_type(req.chan_nr, req.link_id);
                let prim = Primitive::data(chan, req.chan_nr, req.link_id, req.payload);
                self.enqueue(req.chan_nr & 0x07, prim);
            }
            SapMsgInner::L1ctlRachReq(req) => self.rx_rach_req(req),
            SapMsgInner::L1ctlFbsbReq(req) => self.rx_fbsb_req(queue, req),
            SapMsgInner::L1ctlTsConfigReq(req) => match self.sched.configure_ts(req.tn, req.pchan) {
                Ok(()) => self.send_cmd(
                    queue,
                    TrxCmd::SetSlot {
                        tn: req.tn,
                        pchan: req.pchan,
                    },
                ),
                Err(e) => tracing::error!(ts = self.fn_, "failed to configure tn={} as {}: {}", req.tn, req.pchan, e),
            },
            SapMsgInner::L1ctlLchanReq(req) => {
                let tn = req.chan_nr & 0x07;
                if let Err(e) = self.sched.set_lchans(req.chan_nr, req.active, req.tch_mode, req.tsc) {
                    tracing::error!(
                        ts = self.fn_,
                        "failed to {} chan_nr=0x{:02x}: {}",
                        if req.active { "activate" } else { "deactivate" },
                        req.chan_nr,
                        e
                    );
                    return;
                }
                // Ciphering preset in the configuration starts with the channel
                if let (true, Some(c)) = (req.active, self.config.config().ciphering.clone()) {
                    if let Err(e) = self.sched.start_ciphering(tn, c.algo, &c.key) {
                        tracing::error!(ts = self.fn_, "failed to start ciphering on tn={}: {}", tn, e);
                    }
                }
            }
            SapMsgInner::L1ctlCryptoReq(req) => {
                if let Err(e) = self.sched.start_ciphering(req.tn, req.algo, &req.key) {
                    tracing::error!(ts = self.fn_, "failed to start ciphering on tn={}: {}", req.tn, e);
                }
            }
            SapMsgInner::L1ctlResetReq(req) => {
                self.sched.reset();
                if req.reset_clock {
                    self.send_trxc(queue, SapMsgInner::TrxcFlushReq);
                    self.send_trxc(queue, SapMsgInner::ClockResetReq);
                }
            }
            other => tracing::warn!(ts = self.fn_, "L1Sched: unexpected L1CTL prim {}", other),
        }
    }

    fn rx_burst_ind(&mut self, queue: &mut MessageQueue, ind: TrxdBurstInd) {
        let mut out = Vec::new();
        let (tn, fn_) = (ind.tn, ind.fn_);
        match self
            .sched
            .handle_rx_burst(tn, fn_, ind.rssi, ind.toa256, ind.burst, &mut out)
        {
            Ok(()) => {}
            Err(SchedError::NotConfigured { .. } | SchedError::NoHandler) => {}
            Err(e) => tracing::debug!(ts = fn_, "tn={}: rx burst: {}", tn, e),
        }
        self.send_up(queue, out);
    }

    /// Number of uplink primitives waiting on a timeslot
    pub fn queue_len(&self, tn: u8) -> usize {
        self.sched.queue_len(tn)
    }

    pub fn lchan_active(&self, tn: u8, chan: LchanType) -> bool {
        self.sched.find_lchan(tn, chan).is_some_and(|l| l.active)
    }
}

impl TrxconEntityTrait for L1Sched {
    fn entity(&self) -> TrxconEntity {
        TrxconEntity::L1Sched
    }

    fn set_config(&mut self, config: SharedConfig) {
        self.config = config;
    }

    fn rx_prim(&mut self, queue: &mut MessageQueue, message: SapMsg) {
        tracing::debug!(ts = self.fn_, "rx_prim: {:?} {}", message.sap, message.msg);

        match message.sap {
            Sap::L1ctlSap => self.rx_l1ctl_prim(queue, message),
            Sap::TrxdSap => match message.msg {
                SapMsgInner::TrxdBurstInd(ind) => self.rx_burst_ind(queue, ind),
                other => tracing::warn!(ts = self.fn_, "L1Sched: unexpected TRXD prim {}", other),
            },
            Sap::TrxcSap => tracing::warn!(ts = self.fn_, "L1Sched: unexpected TRXC prim {}", message.msg),
        }
    }

    fn tick_start(&mut self, queue: &mut MessageQueue, fn_: u32) {
        self.fn_ = fn_;

        // Bursts are sent ahead of time, giving the transceiver a few frames of slack
        let tx_fn = fn_add(fn_, self.fn_advance as i64);
        let mut out = Vec::new();
        let bursts = self.sched.pull_send_frame(tx_fn, &mut out);
        for (tn, burst) in bursts {
            queue.push_back(SapMsg::new(
                Sap::TrxdSap,
                TrxconEntity::L1Sched,
                TrxconEntity::TrxLink,
                fn_,
                SapMsgInner::TrxdBurstReq(TrxdBurstReq {
                    tn,
                    fn_: tx_fn,
                    pwr: self.tx_power,
                    burst,
                }),
            ));
        }
        self.send_up(queue, out);
    }
}
