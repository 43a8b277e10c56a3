//! Control command queue and operational state of the transceiver.
//!
//! One command is in flight at a time. Its response either advances the state, restores
//! the state saved when the command was sent, or takes the link offline.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use trxcon_core::arfcn::arfcn_to_khz;
use trxcon_saps::l1ctl::L1ctlPmConf;
use trxcon_saps::trxc::{TrxCmd, TrxFailure, TrxLinkEvent};

use super::TrxError;
use super::proto::{format_cmd, parse_rsp};

pub const TRXC_RSP_TIMEOUT: Duration = Duration::from_secs(2);
pub const TRXC_MAX_RETRIES: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrxState {
    Offline,
    Idle,
    Active,
    RspWait,
}

/// What the owner of the FSM has to do after an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CtrlOutput {
    /// Send this text on the control socket
    Send(String),
    Event(TrxLinkEvent),
    PmConf(L1ctlPmConf),
}

struct PendingCmd {
    cmd: TrxCmd,
    text: String,
    retry_cnt: u8,
}

/// Range of an ongoing power measurement
struct PmSweep {
    current: u16,
    stop: u16,
}

pub struct TrxCtrl {
    state: TrxState,
    /// State to return to once the response arrives
    prev_state: TrxState,
    powered_up: bool,
    queue: VecDeque<PendingCmd>,
    deadline: Option<Instant>,
    pm: Option<PmSweep>,
}

impl Default for TrxCtrl {
    fn default() -> Self {
        Self::new()
    }
}

impl TrxCtrl {
    pub fn new() -> Self {
        Self {
            state: TrxState::Offline,
            prev_state: TrxState::Offline,
            powered_up: false,
            queue: VecDeque::new(),
            deadline: None,
            pm: None,
        }
    }

    pub fn state(&self) -> TrxState {
        self.state
    }

    pub fn powered_up(&self) -> bool {
        self.powered_up
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Bursts may be sent. Waiting for a response to a command issued while
    /// active does not interrupt transmission.
    pub fn is_active(&self) -> bool {
        match self.state {
            TrxState::Active => true,
            TrxState::RspWait => self.prev_state == TrxState::Active,
            _ => false,
        }
    }

    fn send_head(&mut self, now: Instant, out: &mut Vec<CtrlOutput>) {
        let Some(head) = self.queue.front() else {
            return;
        };
        tracing::debug!("Sending control '{}'", head.text);
        out.push(CtrlOutput::Send(head.text.clone()));

        if self.state != TrxState::RspWait {
            self.prev_state = self.state;
            self.state = TrxState::RspWait;
        }
        self.deadline = Some(now + TRXC_RSP_TIMEOUT);
    }

    /// Queues a command. It is sent right away when nothing else is in flight.
    pub fn submit(&mut self, cmd: TrxCmd, now: Instant, out: &mut Vec<CtrlOutput>) -> Result<(), TrxError> {
        if cmd == TrxCmd::PowerOn && self.powered_up {
            tracing::error!("Suppressing POWERON as we're already powered up");
            return Err(TrxError::AlreadyPoweredUp);
        }

        let text = format_cmd(&cmd)?;
        let pending = !self.queue.is_empty();
        tracing::info!("Adding new control '{}'", text);
        self.queue.push_back(PendingCmd {
            cmd,
            text,
            retry_cnt: 0,
        });

        if !pending {
            self.send_head(now, out);
        }
        Ok(())
    }

    /// Starts a power measurement sweep over `start..=stop`
    pub fn measure(&mut self, start: u16, stop: u16, now: Instant, out: &mut Vec<CtrlOutput>) -> Result<(), TrxError> {
        self.pm = Some(PmSweep { current: start, stop });
        self.submit(TrxCmd::Measure { band_arfcn: start }, now, out)
    }

    /// Drops every pending command and returns to IDLE
    pub fn flush(&mut self) {
        self.state = TrxState::Idle;
        self.queue.clear();
        self.deadline = None;
        self.pm = None;
    }

    fn fail(&mut self, failure: TrxFailure, out: &mut Vec<CtrlOutput>) {
        tracing::error!("Transceiver offline: {}", failure);
        self.state = TrxState::Offline;
        self.powered_up = false;
        self.queue.clear();
        self.deadline = None;
        self.pm = None;
        out.push(CtrlOutput::Event(TrxLinkEvent::Offline(failure)));
    }

    /// Retransmits the command in flight once its timer expired
    pub fn poll(&mut self, now: Instant, out: &mut Vec<CtrlOutput>) {
        match self.deadline {
            Some(deadline) if now >= deadline => {}
            _ => return,
        }
        self.deadline = None;

        let Some(head) = self.queue.front_mut() else {
            return;
        };
        tracing::warn!("No response from transceiver to '{}'", head.text);

        head.retry_cnt += 1;
        if head.retry_cnt > TRXC_MAX_RETRIES {
            let verb = head.cmd.verb();
            self.fail(TrxFailure::RetryExhausted { verb }, out);
            return;
        }
        self.send_head(now, out);
    }

    /// Handles a datagram received on the control socket
    pub fn handle_rsp(&mut self, buf: &[u8], now: Instant, out: &mut Vec<CtrlOutput>) -> Result<(), TrxError> {
        let rsp = match parse_rsp(buf) {
            Ok(rsp) => rsp,
            Err(e) => {
                tracing::warn!("Unknown message on CTRL port: {}", e);
                return Ok(());
            }
        };
        tracing::info!("Response message: {:?}", rsp);

        self.deadline = None;
        let Some(head) = self.queue.pop_front() else {
            return Err(TrxError::Unsolicited(rsp.verb));
        };

        let verb = head.cmd.verb();
        if rsp.verb != verb {
            self.fail(
                TrxFailure::UnexpectedResponse {
                    expected: verb,
                    got: rsp.verb,
                },
                out,
            );
            return Ok(());
        }

        if rsp.status != 0 {
            if head.cmd.is_critical() {
                self.fail(
                    TrxFailure::CommandRejected {
                        verb,
                        status: rsp.status,
                    },
                    out,
                );
                return Ok(());
            }
            tracing::error!("Transceiver rejected TRX command '{}' with status {}", head.text, rsp.status);
        }

        match head.cmd {
            TrxCmd::PowerOn => {
                self.powered_up = true;
                self.state = TrxState::Active;
                out.push(CtrlOutput::Event(TrxLinkEvent::Active));
            }
            TrxCmd::PowerOff => {
                self.powered_up = false;
                self.state = TrxState::Idle;
                out.push(CtrlOutput::Event(TrxLinkEvent::Idle));
            }
            TrxCmd::Echo => {
                self.state = TrxState::Idle;
                out.push(CtrlOutput::Event(TrxLinkEvent::Idle));
            }
            TrxCmd::Measure { band_arfcn } => {
                self.state = self.prev_state;
                self.measure_rsp(band_arfcn, &rsp.params, out);
            }
            _ => self.state = self.prev_state,
        }

        self.send_head(now, out);
        Ok(())
    }

    /// `RSP MEASURE 0 <kHz> <dBm>`: reports the level and moves on to the next ARFCN
    fn measure_rsp(&mut self, band_arfcn: u16, params: &[String], out: &mut Vec<CtrlOutput>) {
        let parsed = match params {
            [khz, dbm, ..] => khz.parse::<u32>().ok().zip(dbm.parse::<i16>().ok()),
            _ => None,
        };
        let Some((khz, dbm)) = parsed else {
            tracing::error!("Power measurement error: malformed response {:?}", params);
            return;
        };
        if arfcn_to_khz(band_arfcn, false) != Some(khz) {
            tracing::error!("Power measurement error: response {} kHz doesn't match ARFCN={}", khz, band_arfcn);
            return;
        }

        out.push(CtrlOutput::PmConf(L1ctlPmConf { band_arfcn, dbm }));

        let Some(pm) = self.pm.as_mut() else {
            return;
        };
        if band_arfcn == pm.stop {
            tracing::debug!("Power measurement done");
            self.pm = None;
            return;
        }
        pm.current = band_arfcn + 1;
        let next = pm.current;
        // Queued behind anything already pending; sent by the caller
        match format_cmd(&TrxCmd::Measure { band_arfcn: next }) {
            Ok(text) => self.queue.push_back(PendingCmd {
                cmd: TrxCmd::Measure { band_arfcn: next },
                text,
                retry_cnt: 0,
            }),
            Err(e) => {
                tracing::error!("Power measurement stopped at ARFCN={}: {}", next, e);
                self.pm = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use trxcon_core::PchanConfig;

    use super::*;

    fn sent(out: &[CtrlOutput]) -> Vec<&str> {
        out.iter()
            .filter_map(|o| match o {
                CtrlOutput::Send(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    fn events(out: &[CtrlOutput]) -> Vec<&TrxLinkEvent> {
        out.iter()
            .filter_map(|o| match o {
                CtrlOutput::Event(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_power_up_sequence() {
        let t0 = Instant::now();
        let mut ctrl = TrxCtrl::new();
        let mut out = vec![];
        ctrl.submit(TrxCmd::Echo, t0, &mut out).unwrap();
        ctrl.submit(TrxCmd::PowerOn, t0, &mut out).unwrap();
        // Only the head is in flight
        assert_eq!(sent(&out), ["CMD ECHO"]);
        assert_eq!(ctrl.state(), TrxState::RspWait);
        assert_eq!(ctrl.next_deadline(), Some(t0 + TRXC_RSP_TIMEOUT));

        out.clear();
        ctrl.handle_rsp(b"RSP ECHO 0", t0, &mut out).unwrap();
        assert_eq!(events(&out), [&TrxLinkEvent::Idle]);
        assert_eq!(sent(&out), ["CMD POWERON"]);
        assert!(!ctrl.is_active());

        out.clear();
        ctrl.handle_rsp(b"RSP POWERON 0\0", t0, &mut out).unwrap();
        assert_eq!(events(&out), [&TrxLinkEvent::Active]);
        assert_eq!(ctrl.state(), TrxState::Active);
        assert!(ctrl.is_active());
        assert_eq!(ctrl.next_deadline(), None);

        assert_eq!(ctrl.submit(TrxCmd::PowerOn, t0, &mut out), Err(TrxError::AlreadyPoweredUp));
    }

    #[test]
    fn test_other_responses_restore_state() {
        let t0 = Instant::now();
        let mut ctrl = TrxCtrl::new();
        let mut out = vec![];
        ctrl.submit(TrxCmd::Echo, t0, &mut out).unwrap();
        ctrl.handle_rsp(b"RSP ECHO 0", t0, &mut out).unwrap();
        ctrl.submit(TrxCmd::PowerOn, t0, &mut out).unwrap();
        ctrl.handle_rsp(b"RSP POWERON 0", t0, &mut out).unwrap();

        let cmd = TrxCmd::SetSlot {
            tn: 0,
            pchan: PchanConfig::Ccch,
        };
        ctrl.submit(cmd, t0, &mut out).unwrap();
        assert_eq!(ctrl.state(), TrxState::RspWait);
        assert!(ctrl.is_active());
        ctrl.handle_rsp(b"RSP SETSLOT 0 0 4", t0, &mut out).unwrap();
        assert_eq!(ctrl.state(), TrxState::Active);
    }

    #[test]
    fn test_retry_exhaustion_goes_offline_once() {
        let t0 = Instant::now();
        let mut ctrl = TrxCtrl::new();
        let mut out = vec![];
        ctrl.submit(TrxCmd::Echo, t0, &mut out).unwrap();
        ctrl.submit(TrxCmd::PowerOn, t0, &mut out).unwrap();

        let mut now = t0;
        for _ in 0..TRXC_MAX_RETRIES {
            // Not yet due
            ctrl.poll(now + Duration::from_millis(1999), &mut out);
            now += TRXC_RSP_TIMEOUT;
            ctrl.poll(now, &mut out);
        }
        assert_eq!(sent(&out), ["CMD ECHO"; 4]);
        assert!(events(&out).is_empty());

        for _ in 0..3 {
            now += TRXC_RSP_TIMEOUT;
            ctrl.poll(now, &mut out);
        }
        assert_eq!(
            events(&out),
            [&TrxLinkEvent::Offline(TrxFailure::RetryExhausted { verb: "ECHO" })]
        );
        assert_eq!(ctrl.state(), TrxState::Offline);
        assert_eq!(ctrl.pending(), 0);
        assert_eq!(ctrl.next_deadline(), None);
    }

    #[test]
    fn test_rejected_commands() {
        let t0 = Instant::now();
        let mut ctrl = TrxCtrl::new();
        let mut out = vec![];
        ctrl.submit(TrxCmd::Echo, t0, &mut out).unwrap();
        ctrl.handle_rsp(b"RSP ECHO 0", t0, &mut out).unwrap();

        // Non-critical commands may fail
        out.clear();
        ctrl.submit(TrxCmd::SetTa(3), t0, &mut out).unwrap();
        ctrl.handle_rsp(b"RSP SETTA -1", t0, &mut out).unwrap();
        assert!(events(&out).is_empty());
        assert_eq!(ctrl.state(), TrxState::Idle);

        ctrl.submit(TrxCmd::RxTune { band_arfcn: 1 }, t0, &mut out).unwrap();
        ctrl.handle_rsp(b"RSP RXTUNE -1 935200", t0, &mut out).unwrap();
        assert_eq!(
            events(&out),
            [&TrxLinkEvent::Offline(TrxFailure::CommandRejected {
                verb: "RXTUNE",
                status: -1
            })]
        );
        assert_eq!(ctrl.state(), TrxState::Offline);
    }

    #[test]
    fn test_verb_mismatch_is_fatal() {
        let t0 = Instant::now();
        let mut ctrl = TrxCtrl::new();
        let mut out = vec![];
        ctrl.submit(TrxCmd::Echo, t0, &mut out).unwrap();
        ctrl.submit(TrxCmd::PowerOn, t0, &mut out).unwrap();
        ctrl.handle_rsp(b"RSP POWEROFF 0", t0, &mut out).unwrap();
        assert!(matches!(
            events(&out)[..],
            [TrxLinkEvent::Offline(TrxFailure::UnexpectedResponse { expected: "ECHO", .. })]
        ));
        assert_eq!(ctrl.pending(), 0);

        // Nothing in flight any more
        assert_eq!(
            ctrl.handle_rsp(b"RSP ECHO 0", t0, &mut out),
            Err(TrxError::Unsolicited("ECHO".to_string()))
        );
        // Garbage is ignored
        assert_eq!(ctrl.handle_rsp(b"hello", t0, &mut out), Ok(()));
    }

    #[test]
    fn test_measure_sweep() {
        let t0 = Instant::now();
        let mut ctrl = TrxCtrl::new();
        let mut out = vec![];
        ctrl.measure(1, 2, t0, &mut out).unwrap();
        assert_eq!(sent(&out), ["CMD MEASURE 935200"]);

        out.clear();
        ctrl.handle_rsp(b"RSP MEASURE 0 935200 -70", t0, &mut out).unwrap();
        assert_eq!(out[0], CtrlOutput::PmConf(L1ctlPmConf { band_arfcn: 1, dbm: -70 }));
        assert_eq!(sent(&out), ["CMD MEASURE 935400"]);

        out.clear();
        ctrl.handle_rsp(b"RSP MEASURE 0 935400 -90", t0, &mut out).unwrap();
        assert_eq!(out, [CtrlOutput::PmConf(L1ctlPmConf { band_arfcn: 2, dbm: -90 })]);
        assert_eq!(ctrl.pending(), 0);
    }

    #[test]
    fn test_flush() {
        let t0 = Instant::now();
        let mut ctrl = TrxCtrl::new();
        let mut out = vec![];
        ctrl.submit(TrxCmd::Echo, t0, &mut out).unwrap();
        ctrl.submit(TrxCmd::PowerOn, t0, &mut out).unwrap();
        ctrl.flush();
        assert_eq!(ctrl.state(), TrxState::Idle);
        assert_eq!(ctrl.pending(), 0);
        assert_eq!(ctrl.next_deadline(), None);
    }
}
