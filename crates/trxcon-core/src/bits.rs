//! Soft and hard bit helpers, and the burst buffers used by the logical channel handlers.
//!
//! Soft bits follow the "positive means 0, negative means 1" convention with a magnitude
//! of 0..=127, where 0 is an erasure. Hard bits are 0 or 1 stored in a byte.

/// Soft bit
pub type SBit = i8;
/// Hard bit
pub type UBit = u8;

/// Number of bit positions in a normal burst
pub const GSM_BURST_LEN: usize = 148;
/// Payload bits of a GMSK normal burst, including both stealing flags (2 * 58)
pub const GSM_NBITS_NB_GMSK_PAYLOAD: usize = 116;
/// Bytes in a MAC block (LAPDm frame)
pub const GSM_MACBLOCK_LEN: usize = 23;

#[inline(always)]
pub fn sbit_to_ubit(s: SBit) -> UBit {
    if s < 0 { 1 } else { 0 }
}

#[inline(always)]
pub fn ubit_to_sbit(u: UBit) -> SBit {
    if u & 1 != 0 { -127 } else { 127 }
}

pub fn sbits_to_ubits(soft: &[SBit], out: &mut [UBit]) {
    for (o, s) in out.iter_mut().zip(soft.iter()) {
        *o = sbit_to_ubit(*s);
    }
}

/// Unpacks `n` bits from `bytes`, least significant bit of each byte first
pub fn bytes_to_bits_lsb(bytes: &[u8], n: usize) -> Vec<UBit> {
    (0..n).map(|i| (bytes[i / 8] >> (i % 8)) & 1).collect()
}

/// Packs bits into bytes, least significant bit of each byte first
pub fn bits_to_bytes_lsb(bits: &[UBit]) -> Vec<u8> {
    let mut out = vec![0u8; bits.len().div_ceil(8)];
    for (i, b) in bits.iter().enumerate() {
        out[i / 8] |= (b & 1) << (i % 8);
    }
    out
}

/// Unpacks `n` bits from `bytes`, most significant bit first
pub fn bytes_to_bits_msb(bytes: &[u8], n: usize) -> Vec<UBit> {
    (0..n).map(|i| (bytes[i / 8] >> (7 - (i % 8))) & 1).collect()
}

/// Renders a burst mask as a string, e.g. "**.*" for bursts 0, 1 and 3 out of 4
pub fn burst_mask_str(mask: u8, nbits: usize) -> String {
    (0..nbits)
        .rev()
        .map(|i| if mask & (1 << i) != 0 { '*' } else { '.' })
        .collect()
}

/// Fixed-size buffer holding `num_bursts` burst payloads of `burst_len` bits each.
/// All burst access is bounds-checked by burst index.
#[derive(Clone)]
pub struct BurstBuf<T: Copy + Default> {
    data: Vec<T>,
    burst_len: usize,
}

impl<T: Copy + Default> BurstBuf<T> {
    pub fn new(num_bursts: usize, burst_len: usize) -> Self {
        Self {
            data: vec![T::default(); num_bursts * burst_len],
            burst_len,
        }
    }

    /// Buffer sized in bits, as listed in the logical channel table
    pub fn with_bits(total_bits: usize) -> Self {
        Self::new(total_bits / GSM_NBITS_NB_GMSK_PAYLOAD, GSM_NBITS_NB_GMSK_PAYLOAD)
    }

    pub fn num_bursts(&self) -> usize {
        if self.burst_len == 0 { 0 } else { self.data.len() / self.burst_len }
    }

    pub fn burst_len(&self) -> usize {
        self.burst_len
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Payload of burst `n`. Panics when `n` is beyond the buffer, which is a table error.
    pub fn burst(&self, n: usize) -> &[T] {
        assert!(n < self.num_bursts(), "burst {} out of range ({} bursts)", n, self.num_bursts());
        &self.data[n * self.burst_len..(n + 1) * self.burst_len]
    }

    pub fn burst_mut(&mut self, n: usize) -> &mut [T] {
        assert!(n < self.num_bursts(), "burst {} out of range ({} bursts)", n, self.num_bursts());
        &mut self.data[n * self.burst_len..(n + 1) * self.burst_len]
    }

    /// The last `n` bursts as one contiguous slice
    pub fn tail(&self, n: usize) -> &[T] {
        assert!(n <= self.num_bursts());
        &self.data[(self.num_bursts() - n) * self.burst_len..]
    }

    pub fn tail_mut(&mut self, n: usize) -> &mut [T] {
        assert!(n <= self.num_bursts());
        let start = (self.num_bursts() - n) * self.burst_len;
        &mut self.data[start..]
    }

    /// The first `n` bursts as one contiguous slice
    pub fn head(&self, n: usize) -> &[T] {
        &self.data[..n * self.burst_len]
    }

    pub fn head_mut(&mut self, n: usize) -> &mut [T] {
        &mut self.data[..n * self.burst_len]
    }

    /// Moves bursts `n..` to the front of the buffer. The freed bursts at the end keep
    /// their previous content until overwritten.
    pub fn shift_left(&mut self, n: usize) {
        let off = n * self.burst_len;
        if off >= self.data.len() {
            return;
        }
        self.data.copy_within(off.., 0);
    }

    pub fn clear(&mut self) {
        self.data.fill(T::default());
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}
