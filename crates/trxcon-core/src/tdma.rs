use core::fmt;

/// Number of TDMA frames in a GSM hyperframe. Frame numbers wrap to 0 here.
pub const GSM_HYPERFRAME: u32 = 26 * 51 * 2048;

/// Nominal duration of one TDMA frame in microseconds
pub const GSM_TDMA_FN_DURATION_US: u64 = 4615;

/// Number of timeslots in a TDMA frame
pub const TRX_TS_COUNT: usize = 8;

/// Successor of a frame number
#[inline(always)]
pub fn fn_inc(fn_: u32) -> u32 {
    (fn_ + 1) % GSM_HYPERFRAME
}

/// Adds a (possibly negative) number of frames to a frame number, wrapping at the hyperframe
#[inline(always)]
pub fn fn_add(fn_: u32, num: i64) -> u32 {
    (fn_ as i64 + num).rem_euclid(GSM_HYPERFRAME as i64) as u32
}

/// Unsigned distance from `b` to `a`, modulo the hyperframe
#[inline(always)]
pub fn fn_sub(a: u32, b: u32) -> u32 {
    (a as i64 - b as i64).rem_euclid(GSM_HYPERFRAME as i64) as u32
}

/// Difference a - b normalized into the signed range [-HF/2, HF/2)
pub fn fn_diff(a: u32, b: u32) -> i32 {
    let mut diff = fn_sub(a, b) as i32;
    if diff >= (GSM_HYPERFRAME / 2) as i32 {
        diff -= GSM_HYPERFRAME as i32;
    }
    diff
}

/// GSM time as decomposed from a frame number, see 3GPP TS 45.002 clause 3.3.2.2
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct GsmTime {
    pub fn_: u32,
    /// Superframe counter, 0..2047
    pub t1: u16,
    /// Position in the 26-multiframe
    pub t2: u8,
    /// Position in the 51-multiframe
    pub t3: u8,
    /// 51-multiframe counter modulo 8, used for paging group selection
    pub tc: u8,
}

impl GsmTime {
    pub fn from_fn(fn_: u32) -> Self {
        let fn_ = fn_ % GSM_HYPERFRAME;
        GsmTime {
            fn_,
            t1: (fn_ / (26 * 51)) as u16,
            t2: (fn_ % 26) as u8,
            t3: (fn_ % 51) as u8,
            tc: ((fn_ / 51) % 8) as u8,
        }
    }

    /// Reassemble the frame number from T1, T2 and T3
    pub fn from_t1_t2_t3(t1: u16, t2: u8, t3: u8) -> Self {
        let t3_t2 = (t3 as i32 - t2 as i32).rem_euclid(26) as u32;
        let fn_ = 51 * t3_t2 + t3 as u32 + 51 * 26 * t1 as u32;
        GsmTime::from_fn(fn_)
    }
}

impl fmt::Display for GsmTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:7}={:4}/{:02}/{:02}", self.fn_, self.t1, self.t2, self.t3)
    }
}

impl fmt::Debug for GsmTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:7}={:4}/{:02}/{:02}", self.fn_, self.t1, self.t2, self.t3)
    }
}
