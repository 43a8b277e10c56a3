use std::time::Instant;

use trxcon_config::SharedConfig;
use trxcon_core::{Sap, TrxconEntity};
use trxcon_saps::trxc::{TrxClockInd, TrxcCmdReq, TrxcMeasureReq};
use trxcon_saps::trxd::TrxdBurstReq;
use trxcon_saps::{SapMsg, SapMsgInner};

use super::TrxError;
use super::link::{CtrlOutput, TrxCtrl, TrxState};
use super::proto::{decode_burst_ind, encode_burst_req, parse_clck};
use super::transport::{TrxChannel, TrxTransport, UdpTrxTransport};
use crate::{MessageQueue, TrxconEntityTrait};

/// Transceiver link entity: owns the sockets and the control FSM
pub struct TrxLink {
    config: SharedConfig,
    transport: Box<dyn TrxTransport>,
    ctrl: TrxCtrl,
    /// Clock indications come from the CLCK socket rather than the data path
    use_clck: bool,
    fn_: u32,
    /// Bursts refused while the link was not active, reported once per state change
    refused: u32,
}

impl TrxLink {
    pub fn new(config: SharedConfig, transport: Box<dyn TrxTransport>) -> Self {
        let use_clck = config.config().trx.use_clck;
        Self {
            config,
            transport,
            ctrl: TrxCtrl::new(),
            use_clck,
            fn_: 0,
            refused: 0,
        }
    }

    /// Opens the UDP sockets described by the configuration
    pub fn open(config: SharedConfig) -> Result<Self, TrxError> {
        let transport = UdpTrxTransport::open(&config.config().trx)?;
        Ok(Self::new(config, Box::new(transport)))
    }

    pub fn state(&self) -> TrxState {
        self.ctrl.state()
    }

    pub fn ctrl(&self) -> &TrxCtrl {
        &self.ctrl
    }

    fn send_to(&self, queue: &mut MessageQueue, sap: Sap, dest: TrxconEntity, msg: SapMsgInner) {
        queue.push_back(SapMsg::new(sap, TrxconEntity::TrxLink, dest, self.fn_, msg));
    }

    fn apply_outputs(&mut self, queue: &mut MessageQueue, outputs: Vec<CtrlOutput>) {
        for output in outputs {
            match output {
                CtrlOutput::Send(text) => {
                    // The transceiver expects a NUL-terminated string
                    let mut buf = text.into_bytes();
                    buf.push(0);
                    if let Err(e) = self.transport.send(TrxChannel::Ctrl, &buf) {
                        tracing::error!("TRXC: {}", e);
                    }
                }
                CtrlOutput::Event(event) => {
                    tracing::info!("TRX link event: {:?}", event);
                    self.refused = 0;
                    self.send_to(queue, Sap::TrxcSap, TrxconEntity::L1ctl, SapMsgInner::TrxLinkEvent(event));
                }
                CtrlOutput::PmConf(conf) => {
                    self.send_to(queue, Sap::L1ctlSap, TrxconEntity::L1ctl, SapMsgInner::L1ctlPmConf(conf));
                }
            }
        }
    }

    fn rx_cmd_req(&mut self, queue: &mut MessageQueue, req: TrxcCmdReq, now: Instant) {
        let mut outputs = Vec::new();
        if let Err(e) = self.ctrl.submit(req.cmd.clone(), now, &mut outputs) {
            tracing::warn!("TRXC: cannot queue {}: {}", req.cmd.verb(), e);
        }
        self.apply_outputs(queue, outputs);
    }

    fn rx_measure_req(&mut self, queue: &mut MessageQueue, req: TrxcMeasureReq, now: Instant) {
        let mut outputs = Vec::new();
        if let Err(e) = self
            .ctrl
            .measure(req.band_arfcn_start, req.band_arfcn_stop, now, &mut outputs)
        {
            tracing::warn!("TRXC: cannot start power measurement: {}", e);
        }
        self.apply_outputs(queue, outputs);
    }

    fn tx_burst(&mut self, req: TrxdBurstReq) {
        if !self.ctrl.is_active() {
            if self.refused == 0 {
                tracing::warn!(ts = req.fn_, "Ignoring TX data, transceiver isn't ready ({:?})", self.ctrl.state());
            }
            self.refused = self.refused.saturating_add(1);
            return;
        }
        tracing::trace!(ts = req.fn_, "TX burst tn={} fn={} pwr={}", req.tn, req.fn_, req.pwr);
        if let Err(e) = self.transport.send(TrxChannel::Data, &encode_burst_req(&req)) {
            tracing::error!(ts = req.fn_, "TRXD: {}", e);
        }
    }

    fn clock_ind(&self, queue: &mut MessageQueue, fn_: u32) {
        self.send_to(
            queue,
            Sap::TrxcSap,
            TrxconEntity::L1Sched,
            SapMsgInner::TrxClockInd(TrxClockInd { fn_ }),
        );
    }

    fn rx_clck(&mut self, queue: &mut MessageQueue) {
        for buf in self.transport.receive(TrxChannel::Clck) {
            match parse_clck(&buf) {
                Ok(fn_) => self.clock_ind(queue, fn_),
                Err(e) => tracing::warn!("Unknown message on CLCK socket: {}", e),
            }
        }
    }

    fn rx_data(&mut self, queue: &mut MessageQueue) {
        for buf in self.transport.receive(TrxChannel::Data) {
            let ind = match decode_burst_ind(&buf) {
                Ok(ind) => ind,
                Err(e) => {
                    tracing::error!("TRXD: {}", e);
                    continue;
                }
            };
            tracing::trace!(
                ts = ind.fn_,
                "RX burst tn={} fn={} rssi={} toa={}",
                ind.tn,
                ind.fn_,
                ind.rssi,
                ind.toa256
            );

            let fn_ = ind.fn_;
            self.send_to(queue, Sap::TrxdSap, TrxconEntity::L1Sched, SapMsgInner::TrxdBurstInd(ind));

            // Without a CLCK socket the clock is corrected once per 51-multiframe
            if !self.use_clck && fn_ % 51 == 0 {
                self.clock_ind(queue, fn_);
            }
        }
    }
}

impl TrxconEntityTrait for TrxLink {
    fn entity(&self) -> TrxconEntity {
        TrxconEntity::TrxLink
    }

    fn set_config(&mut self, config: SharedConfig) {
        self.use_clck = config.config().trx.use_clck;
        self.config = config;
    }

    fn rx_prim(&mut self, queue: &mut MessageQueue, message: SapMsg) {
        tracing::trace!("rx_prim: {:?} {}", message.sap, message.msg);

        let now = Instant::now();
        match message.msg {
            SapMsgInner::TrxdBurstReq(req) => self.tx_burst(req),
            SapMsgInner::TrxcCmdReq(req) => self.rx_cmd_req(queue, req, now),
            SapMsgInner::TrxcMeasureReq(req) => self.rx_measure_req(queue, req, now),
            SapMsgInner::TrxcFlushReq => {
                tracing::info!("Flushing control queue ({} pending)", self.ctrl.pending());
                self.ctrl.flush();
            }
            other => tracing::warn!("TrxLink: unexpected prim {}", other),
        }
    }

    fn poll(&mut self, queue: &mut MessageQueue, now: Instant) {
        if self.use_clck {
            self.rx_clck(queue);
        }

        let mut outputs = Vec::new();
        for buf in self.transport.receive(TrxChannel::Ctrl) {
            if let Err(e) = self.ctrl.handle_rsp(&buf, now, &mut outputs) {
                tracing::warn!("TRXC: {}", e);
            }
        }
        self.ctrl.poll(now, &mut outputs);
        self.apply_outputs(queue, outputs);

        self.rx_data(queue);
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.ctrl.next_deadline()
    }

    fn tick_start(&mut self, _queue: &mut MessageQueue, fn_: u32) {
        self.fn_ = fn_;
    }
}

impl Drop for TrxLink {
    fn drop(&mut self) {
        tracing::info!("Shutdown transceiver interface");
        self.ctrl.flush();
    }
}
