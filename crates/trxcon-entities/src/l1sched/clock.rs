use std::time::{Duration, Instant};

use trxcon_core::tdma::{GSM_TDMA_FN_DURATION_US, fn_diff, fn_inc};

/// Largest frame number jump handled as jitter. Beyond it the clock is re-anchored.
pub const MAX_FN_SKEW: i32 = 50;
/// Frames without a clock indication before the transceiver is considered lost
pub const TRX_LOSS_FRAMES: u32 = 400;

const FN_US: i64 = GSM_TDMA_FN_DURATION_US as i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    /// No indication received yet, or the clock was lost
    Wait,
    Ok,
}

/// Outcome of a timer expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockTick {
    /// Timer not due, or clock not running
    Idle,
    Advanced,
    /// Host clock jumped, the clock went back to WAIT
    Skew,
    /// No indication for TRX_LOSS_FRAMES frames, the clock went back to WAIT
    Lost,
}

/// Local frame clock, disciplined by the frame numbers the transceiver reports.
///
/// The clock never reads the system time itself; callers pass `now` so the event loop
/// and tests share the same notion of time. `on_frame` is invoked once for every
/// frame number the clock moves to, in order.
pub struct TdmaClock {
    state: ClockState,
    fn_counter_proc: u32,
    fn_counter_lost: u32,
    /// Wall-clock time at which `fn_counter_proc` started
    anchor: Instant,
    deadline: Option<Instant>,
}

impl Default for TdmaClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TdmaClock {
    pub fn new() -> Self {
        Self {
            state: ClockState::Wait,
            fn_counter_proc: 0,
            fn_counter_lost: 0,
            anchor: Instant::now(),
            deadline: None,
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    /// Last frame number handed out
    pub fn fn_counter_proc(&self) -> u32 {
        self.fn_counter_proc
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn reset(&mut self) {
        self.state = ClockState::Wait;
        self.deadline = None;
        self.fn_counter_proc = 0;
        self.fn_counter_lost = 0;
    }

    fn elapsed_us(&self, now: Instant) -> i64 {
        match now.checked_duration_since(self.anchor) {
            Some(d) => d.as_micros() as i64,
            None => -(self.anchor.duration_since(now).as_micros() as i64),
        }
    }

    fn arm(&mut self, now: Instant, us: i64) {
        self.deadline = Some(now + Duration::from_micros(us.max(0) as u64));
    }

    fn correct(&mut self, fn_: u32, now: Instant, on_frame: &mut impl FnMut(u32)) {
        self.fn_counter_proc = fn_;
        on_frame(fn_);
        self.anchor = now;
        self.arm(now, FN_US);
    }

    /// Feeds a frame number reported by the transceiver
    pub fn handle_indication(&mut self, fn_: u32, now: Instant, mut on_frame: impl FnMut(u32)) {
        self.fn_counter_lost = 0;

        if self.state == ClockState::Wait {
            self.correct(fn_, now, &mut on_frame);
            tracing::info!(ts = fn_, "Initial clock received: fn={}", fn_);
            self.state = ClockState::Ok;
            return;
        }

        tracing::trace!(ts = fn_, "Clock indication: fn={}", fn_);

        let elapsed_us = self.elapsed_us(now);
        let elapsed_fn = fn_diff(fn_, self.fn_counter_proc);

        if !(-MAX_FN_SKEW..=MAX_FN_SKEW).contains(&elapsed_fn) {
            tracing::warn!("GSM clock skew: old fn={}, new fn={}", self.fn_counter_proc, fn_);
            self.correct(fn_, now, &mut on_frame);
            return;
        }

        tracing::trace!("GSM clock jitter: {}us", elapsed_fn as i64 * FN_US - elapsed_us);

        if elapsed_fn < 0 {
            // We ran ahead of the transceiver: hold until it catches up
            let ahead = -(elapsed_fn as i64);
            self.anchor = now + Duration::from_micros((ahead * FN_US) as u64);
            self.arm(now, FN_US * (1 + ahead));
            return;
        }

        while fn_ != self.fn_counter_proc {
            self.fn_counter_proc = fn_inc(self.fn_counter_proc);
            on_frame(self.fn_counter_proc);
        }

        self.anchor = now;
        self.arm(now, FN_US);
    }

    /// Runs the frame timer if it is due, advancing in whole frames to absorb host jitter
    pub fn tick(&mut self, now: Instant, mut on_frame: impl FnMut(u32)) -> ClockTick {
        if self.state != ClockState::Ok {
            return ClockTick::Idle;
        }
        match self.deadline {
            Some(deadline) if now >= deadline => {}
            _ => return ClockTick::Idle,
        }
        self.deadline = None;

        let lost = self.fn_counter_lost;
        self.fn_counter_lost += 1;
        if lost == TRX_LOSS_FRAMES {
            tracing::warn!("No more clock from transceiver");
            self.state = ClockState::Wait;
            return ClockTick::Lost;
        }

        let mut elapsed_us = self.elapsed_us(now);
        if elapsed_us > FN_US * MAX_FN_SKEW as i64 || elapsed_us < 0 {
            tracing::warn!("PC clock skew: elapsed {}us", elapsed_us);
            self.state = ClockState::Wait;
            return ClockTick::Skew;
        }

        while elapsed_us > FN_US / 2 {
            self.anchor += Duration::from_micros(FN_US as u64);
            elapsed_us -= FN_US;
            self.fn_counter_proc = fn_inc(self.fn_counter_proc);
            on_frame(self.fn_counter_proc);
        }

        self.arm(now, FN_US - elapsed_us);
        ClockTick::Advanced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trxcon_core::GSM_HYPERFRAME;

    fn us(n: u64) -> Duration {
        Duration::from_micros(n)
    }

    #[test]
    fn test_initial_indication() {
        let t0 = Instant::now();
        let mut clock = TdmaClock::new();
        let mut frames = vec![];
        assert_eq!(clock.tick(t0, |f| frames.push(f)), ClockTick::Idle);

        clock.handle_indication(100, t0, |f| frames.push(f));
        assert_eq!(clock.state(), ClockState::Ok);
        assert_eq!(frames, vec![100]);
        assert_eq!(clock.next_deadline(), Some(t0 + us(4615)));

        // Not due yet
        assert_eq!(clock.tick(t0 + us(4000), |f| frames.push(f)), ClockTick::Idle);
        assert_eq!(clock.tick(t0 + us(4615), |f| frames.push(f)), ClockTick::Advanced);
        assert_eq!(frames, vec![100, 101]);
    }

    #[test]
    fn test_tick_absorbs_host_jitter() {
        let t0 = Instant::now();
        let mut clock = TdmaClock::new();
        let mut frames = vec![];
        clock.handle_indication(0, t0, |f| frames.push(f));

        // The loop was late by almost two frames, so three frames are produced at once
        clock.tick(t0 + us(3 * 4615 + 100), |f| frames.push(f));
        assert_eq!(frames, vec![0, 1, 2, 3]);
        assert_eq!(clock.next_deadline(), Some(t0 + us(3 * 4615 + 100) + us(4515)));
    }

    #[test]
    fn test_fn_wraps_at_hyperframe() {
        let t0 = Instant::now();
        let mut clock = TdmaClock::new();
        let mut frames = vec![];
        clock.handle_indication(GSM_HYPERFRAME - 2, t0, |f| frames.push(f));
        let mut now = t0;
        for _ in 0..3 {
            now += us(4615);
            clock.tick(now, |f| frames.push(f));
        }
        assert_eq!(frames, vec![GSM_HYPERFRAME - 2, GSM_HYPERFRAME - 1, 0, 1]);
    }

    #[test]
    fn test_indication_catches_up() {
        let t0 = Instant::now();
        let mut clock = TdmaClock::new();
        let mut frames = vec![];
        clock.handle_indication(1000, t0, |f| frames.push(f));
        clock.handle_indication(1003, t0 + us(1000), |f| frames.push(f));
        assert_eq!(frames, vec![1000, 1001, 1002, 1003]);
        assert_eq!(clock.fn_counter_proc(), 1003);
    }

    #[test]
    fn test_indication_behind_holds_clock() {
        let t0 = Instant::now();
        let mut clock = TdmaClock::new();
        let mut frames = vec![];
        clock.handle_indication(1000, t0, |f| frames.push(f));
        clock.handle_indication(1005, t0, |f| frames.push(f));
        frames.clear();

        // Transceiver reports a frame we already processed
        clock.handle_indication(1003, t0, |f| frames.push(f));
        assert!(frames.is_empty());
        assert_eq!(clock.fn_counter_proc(), 1005);
        assert_eq!(clock.next_deadline(), Some(t0 + us(3 * 4615)));
    }

    #[test]
    fn test_skew_reanchors() {
        let t0 = Instant::now();
        let mut clock = TdmaClock::new();
        let mut frames = vec![];
        clock.handle_indication(1000, t0, |f| frames.push(f));
        clock.handle_indication(2000, t0 + us(10), |f| frames.push(f));
        assert_eq!(frames, vec![1000, 2000]);

        // Same across the hyperframe boundary, in the backward direction
        frames.clear();
        clock.handle_indication(GSM_HYPERFRAME - 100, t0 + us(20), |f| frames.push(f));
        assert_eq!(frames, vec![GSM_HYPERFRAME - 100]);
        assert_eq!(clock.state(), ClockState::Ok);
    }

    #[test]
    fn test_clock_loss() {
        let t0 = Instant::now();
        let mut clock = TdmaClock::new();
        clock.handle_indication(0, t0, |_| {});

        let mut now = t0;
        for _ in 0..TRX_LOSS_FRAMES {
            now += us(4615);
            assert_eq!(clock.tick(now, |_| {}), ClockTick::Advanced);
        }
        now += us(4615);
        assert_eq!(clock.tick(now, |_| {}), ClockTick::Lost);
        assert_eq!(clock.state(), ClockState::Wait);

        // Stays quiet until the next indication
        assert_eq!(clock.tick(now + us(4615), |_| {}), ClockTick::Idle);
    }

    #[test]
    fn test_host_stall_is_skew() {
        let t0 = Instant::now();
        let mut clock = TdmaClock::new();
        clock.handle_indication(0, t0, |_| {});
        assert_eq!(clock.tick(t0 + Duration::from_secs(1), |_| {}), ClockTick::Skew);
        assert_eq!(clock.state(), ClockState::Wait);
    }
}
