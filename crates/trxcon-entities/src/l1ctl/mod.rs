//! Upper boundary of the stack. Without an L2/L3 client attached, this entity brings the
//! transceiver up, camps on the configured cell and logs what the scheduler reports.

use std::time::Instant;

use trxcon_config::SharedConfig;
use trxcon_core::{PchanConfig, Sap, TrxconEntity};
use trxcon_saps::l1ctl::{L1ctlFbsbReq, L1ctlTsConfigReq};
use trxcon_saps::trxc::{TrxCmd, TrxLinkEvent, TrxcCmdReq};
use trxcon_saps::{SapMsg, SapMsgInner};

use crate::{MessageQueue, TrxconEntityTrait};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootPhase {
    /// Nothing sent yet
    Init,
    /// Waiting for the transceiver to answer ECHO
    Echo,
    /// Timeslot, tuning and power-up requested
    PowerOn,
    Running,
    /// The link failed, waiting for the operator
    Offline,
}

/// What reached the boundary so far
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct L1ctlStats {
    pub data_ind: u32,
    pub bad_ind: u32,
    pub data_conf: u32,
    pub rach_conf: u32,
    pub pm_conf: u32,
}

pub struct L1ctl {
    config: SharedConfig,
    phase: BootPhase,
    stats: L1ctlStats,
    fn_: u32,
}

impl L1ctl {
    pub fn new(config: SharedConfig) -> Self {
        Self {
            config,
            phase: BootPhase::Init,
            stats: L1ctlStats::default(),
            fn_: 0,
        }
    }

    pub fn phase(&self) -> BootPhase {
        self.phase
    }

    pub fn stats(&self) -> &L1ctlStats {
        &self.stats
    }

    fn send(&self, queue: &mut MessageQueue, sap: Sap, dest: TrxconEntity, msg: SapMsgInner) {
        queue.push_back(SapMsg::new(sap, TrxconEntity::L1ctl, dest, self.fn_, msg));
    }

    fn send_cmd(&self, queue: &mut MessageQueue, cmd: TrxCmd) {
        self.send(
            queue,
            Sap::TrxcSap,
            TrxconEntity::TrxLink,
            SapMsgInner::TrxcCmdReq(TrxcCmdReq { cmd }),
        );
    }

    /// TS0 as CCCH, tune to the cell, then power on
    fn start_cell_search(&mut self, queue: &mut MessageQueue) {
        let band_arfcn = self.config.config().cell.band_arfcn;
        tracing::info!("Transceiver idle, searching for the cell on band_arfcn={}", band_arfcn);
        self.send(
            queue,
            Sap::L1ctlSap,
            TrxconEntity::L1Sched,
            SapMsgInner::L1ctlTsConfigReq(L1ctlTsConfigReq {
                tn: 0,
                pchan: PchanConfig::Ccch,
            }),
        );
        self.send(
            queue,
            Sap::L1ctlSap,
            TrxconEntity::L1Sched,
            SapMsgInner::L1ctlFbsbReq(L1ctlFbsbReq { band_arfcn }),
        );
        self.send_cmd(queue, TrxCmd::PowerOn);
        self.phase = BootPhase::PowerOn;
    }

    fn rx_link_event(&mut self, queue: &mut MessageQueue, event: TrxLinkEvent) {
        match (self.phase, event) {
            (BootPhase::Echo, TrxLinkEvent::Idle) => self.start_cell_search(queue),
            (BootPhase::PowerOn, TrxLinkEvent::Active) => {
                tracing::info!("Transceiver active");
                self.phase = BootPhase::Running;
            }
            (_, TrxLinkEvent::Offline(failure)) => {
                tracing::error!("Transceiver link lost: {}", failure);
                self.phase = BootPhase::Offline;
            }
            (_, TrxLinkEvent::ClockLost) => {
                tracing::warn!("Clock from transceiver lost, waiting for it to come back");
            }
            (phase, event) => tracing::debug!("Link event {:?} in phase {:?}", event, phase),
        }
    }

    fn rx_l1ctl_prim(&mut self, msg: SapMsgInner) {
        match msg {
            SapMsgInner::L1ctlDataInd(ind) => {
                if ind.is_bad() {
                    self.stats.bad_ind += 1;
                    tracing::debug!(ts = ind.fn_, "bad block on chan_nr=0x{:02x}", ind.chan_nr);
                } else {
                    self.stats.data_ind += 1;
                    tracing::debug!(
                        ts = ind.fn_,
                        "DATA IND chan_nr=0x{:02x} link_id=0x{:02x} rssi={} errors={}/{}: {:02x?}",
                        ind.chan_nr,
                        ind.link_id,
                        ind.rssi,
                        ind.n_errors,
                        ind.n_bits_total,
                        ind.payload
                    );
                }
            }
            SapMsgInner::L1ctlDataConf(conf) => {
                self.stats.data_conf += 1;
                tracing::debug!(ts = conf.fn_, "DATA CONF chan_nr=0x{:02x}", conf.chan_nr);
            }
            SapMsgInner::L1ctlRachConf(conf) => {
                self.stats.rach_conf += 1;
                tracing::info!(ts = conf.fn_, "RACH CONF chan_nr=0x{:02x}", conf.chan_nr);
            }
            SapMsgInner::L1ctlFbsbConf(conf) => {
                tracing::info!(
                    ts = conf.fn_,
                    "Camped on band_arfcn={} bsic={} rx_level={}",
                    conf.band_arfcn,
                    conf.bsic,
                    conf.rx_level
                );
            }
            SapMsgInner::L1ctlPmConf(conf) => {
                self.stats.pm_conf += 1;
                tracing::info!("PM CONF band_arfcn={} dbm={}", conf.band_arfcn, conf.dbm);
            }
            other => tracing::warn!("L1ctl: unexpected prim {}", other),
        }
    }
}

impl TrxconEntityTrait for L1ctl {
    fn entity(&self) -> TrxconEntity {
        TrxconEntity::L1ctl
    }

    fn set_config(&mut self, config: SharedConfig) {
        self.config = config;
    }

    fn rx_prim(&mut self, queue: &mut MessageQueue, message: SapMsg) {
        tracing::debug!(ts = self.fn_, "rx_prim: {:?} {}", message.sap, message.msg);

        match message.msg {
            SapMsgInner::TrxLinkEvent(event) => self.rx_link_event(queue, event),
            msg => self.rx_l1ctl_prim(msg),
        }
    }

    fn poll(&mut self, queue: &mut MessageQueue, _now: Instant) {
        if self.phase == BootPhase::Init {
            tracing::info!("Probing transceiver");
            self.send_cmd(queue, TrxCmd::Echo);
            self.phase = BootPhase::Echo;
        }
    }

    fn tick_start(&mut self, _queue: &mut MessageQueue, fn_: u32) {
        self.fn_ = fn_;
    }
}

#[cfg(test)]
mod tests {
    use trxcon_saps::trxc::TrxFailure;

    use super::*;

    fn event(event: TrxLinkEvent) -> SapMsg {
        SapMsg::new(
            Sap::TrxcSap,
            TrxconEntity::TrxLink,
            TrxconEntity::L1ctl,
            0,
            SapMsgInner::TrxLinkEvent(event),
        )
    }

    #[test]
    fn test_boot_sequence() {
        let mut l1ctl = L1ctl::new(SharedConfig::new(1));
        let mut queue = MessageQueue::new();

        l1ctl.poll(&mut queue, Instant::now());
        l1ctl.poll(&mut queue, Instant::now());
        assert_eq!(queue.len(), 1);
        assert_eq!(l1ctl.phase(), BootPhase::Echo);
        queue.pop_front();

        l1ctl.rx_prim(&mut queue, event(TrxLinkEvent::Idle));
        let msgs: Vec<SapMsg> = std::iter::from_fn(|| queue.pop_front()).collect();
        assert!(matches!(msgs[0].msg, SapMsgInner::L1ctlTsConfigReq(ref r) if r.tn == 0));
        assert!(matches!(msgs[1].msg, SapMsgInner::L1ctlFbsbReq(ref r) if r.band_arfcn == 1));
        assert!(matches!(
            msgs[2].msg,
            SapMsgInner::TrxcCmdReq(TrxcCmdReq { cmd: TrxCmd::PowerOn })
        ));
        assert_eq!(msgs[2].dest, TrxconEntity::TrxLink);

        l1ctl.rx_prim(&mut queue, event(TrxLinkEvent::Active));
        assert_eq!(l1ctl.phase(), BootPhase::Running);

        l1ctl.rx_prim(
            &mut queue,
            event(TrxLinkEvent::Offline(TrxFailure::RetryExhausted { verb: "SETTA" })),
        );
        assert_eq!(l1ctl.phase(), BootPhase::Offline);
        assert!(queue.is_empty());
    }
}
