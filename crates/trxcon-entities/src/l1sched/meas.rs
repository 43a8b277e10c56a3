/// Number of bursts kept in the measurement history of a logical channel
pub const MEAS_HIST_LEN: usize = 8;

/// Measurements of a single burst, or the average over a block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeasSet {
    pub fn_: u32,
    /// dBm
    pub rssi: i8,
    pub toa256: i16,
}

/// Ring buffer of per-burst measurements
#[derive(Debug, Clone, Default)]
pub struct MeasHist {
    buf: [MeasSet; MEAS_HIST_LEN],
    /// Most recent entry, None until the first push
    head: Option<usize>,
}

impl MeasHist {
    pub fn push(&mut self, fn_: u32, rssi: i8, toa256: i16) {
        let next = match self.head {
            Some(h) if h + 1 < MEAS_HIST_LEN => h + 1,
            _ => 0,
        };
        self.buf[next] = MeasSet { fn_, rssi, toa256 };
        self.head = Some(next);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Average over the `n` most recent entries. The frame number of the result is
    /// that of the oldest entry taken into account, i.e. the first burst of the block.
    pub fn avg(&self, n: usize) -> MeasSet {
        let n = n.clamp(1, MEAS_HIST_LEN);
        let Some(head) = self.head else {
            return MeasSet::default();
        };

        let mut rssi_sum: i32 = 0;
        let mut toa_sum: i32 = 0;
        let mut idx = head;
        for i in 0..n {
            rssi_sum += self.buf[idx].rssi as i32;
            toa_sum += self.buf[idx].toa256 as i32;
            if i + 1 == n {
                break;
            }
            idx = if idx == 0 { MEAS_HIST_LEN - 1 } else { idx - 1 };
        }

        MeasSet {
            fn_: self.buf[idx].fn_,
            rssi: (rssi_sum / n as i32) as i8,
            toa256: (toa_sum / n as i32) as i16,
        }
    }
}
