// A5 burst ciphering, 3GPP TS 43.020 / 55.216

use trxcon_core::{A5Algo, GsmTime, SBit, UBit};

/// Keystream bits per direction and burst
pub const A5_KS_BITS: usize = 114;

const R1_MASK: u32 = 0x07ffff;
const R2_MASK: u32 = 0x3fffff;
const R3_MASK: u32 = 0x7fffff;

const R1_MID: u32 = 0x000100;
const R2_MID: u32 = 0x000400;
const R3_MID: u32 = 0x000400;

const R1_TAPS: u32 = 0x072000;
const R2_TAPS: u32 = 0x300000;
const R3_TAPS: u32 = 0x700080;

const R1_OUT: u32 = 0x040000;
const R2_OUT: u32 = 0x200000;
const R3_OUT: u32 = 0x400000;

#[inline(always)]
fn parity(x: u32) -> u32 {
    x.count_ones() & 1
}

#[inline(always)]
fn clock_one(reg: u32, mask: u32, taps: u32) -> u32 {
    ((reg << 1) & mask) | parity(reg & taps)
}

/// Keystream for one TDMA frame
#[derive(Clone)]
pub struct A5Keystream {
    /// Downlink (network to mobile), used to decrypt received bursts
    pub dl: [UBit; A5_KS_BITS],
    /// Uplink (mobile to network), used to encrypt transmitted bursts
    pub ul: [UBit; A5_KS_BITS],
}

struct A51 {
    r1: u32,
    r2: u32,
    r3: u32,
}

impl A51 {
    fn new(key: &[u8], count: u32) -> Self {
        let mut s = A51 { r1: 0, r2: 0, r3: 0 };
        for i in 0..64 {
            s.clock_all();
            let bit = ((key[i / 8] >> (i & 7)) & 1) as u32;
            s.xor_in(bit);
        }
        for i in 0..22 {
            s.clock_all();
            s.xor_in((count >> i) & 1);
        }
        for _ in 0..100 {
            s.clock_majority();
        }
        s
    }

    fn xor_in(&mut self, bit: u32) {
        self.r1 ^= bit;
        self.r2 ^= bit;
        self.r3 ^= bit;
    }

    fn clock_all(&mut self) {
        self.r1 = clock_one(self.r1, R1_MASK, R1_TAPS);
        self.r2 = clock_one(self.r2, R2_MASK, R2_TAPS);
        self.r3 = clock_one(self.r3, R3_MASK, R3_TAPS);
    }

    fn clock_majority(&mut self) {
        let m1 = self.r1 & R1_MID != 0;
        let m2 = self.r2 & R2_MID != 0;
        let m3 = self.r3 & R3_MID != 0;
        let maj = (m1 as u8 + m2 as u8 + m3 as u8) >= 2;
        if m1 == maj {
            self.r1 = clock_one(self.r1, R1_MASK, R1_TAPS);
        }
        if m2 == maj {
            self.r2 = clock_one(self.r2, R2_MASK, R2_TAPS);
        }
        if m3 == maj {
            self.r3 = clock_one(self.r3, R3_MASK, R3_TAPS);
        }
    }

    fn output_bit(&self) -> UBit {
        (parity(self.r1 & R1_OUT) ^ parity(self.r2 & R2_OUT) ^ parity(self.r3 & R3_OUT)) as UBit
    }

    fn next_bit(&mut self) -> UBit {
        self.clock_majority();
        self.output_bit()
    }
}

/// COUNT input of the cipher: T1 (11 bits), T3 (6 bits) and T2 (5 bits)
pub fn a5_fn_count(fn_: u32) -> u32 {
    let t = GsmTime::from_fn(fn_);
    ((t.t1 as u32) << 11) | ((t.t3 as u32) << 5) | t.t2 as u32
}

/// A5/1 keystream for the given 64 bit key and COUNT
pub fn a5_1(key: &[u8; 8], count: u32) -> A5Keystream {
    let mut s = A51::new(key, count);
    let mut ks = A5Keystream {
        dl: [0; A5_KS_BITS],
        ul: [0; A5_KS_BITS],
    };
    for b in ks.dl.iter_mut() {
        *b = s.next_bit();
    }
    for b in ks.ul.iter_mut() {
        *b = s.next_bit();
    }
    ks
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum A5Error {
    Unsupported(A5Algo),
    KeyLen(usize),
}

impl core::fmt::Display for A5Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            A5Error::Unsupported(a) => write!(f, "{} is not supported", a),
            A5Error::KeyLen(l) => write!(f, "key of {} bytes is too short", l),
        }
    }
}

impl std::error::Error for A5Error {}

/// Ciphering context of a logical channel
#[derive(Debug, Clone)]
pub struct A5Cipher {
    algo: A5Algo,
    key: [u8; 8],
}

impl A5Cipher {
    /// Only A5/0 and A5/1 are accepted. A5/1 uses the first 8 bytes of the key.
    pub fn new(algo: A5Algo, key: &[u8]) -> Result<Self, A5Error> {
        match algo.0 {
            0 => Ok(Self { algo, key: [0; 8] }),
            1 => {
                if key.len() < 8 {
                    return Err(A5Error::KeyLen(key.len()));
                }
                let mut k = [0u8; 8];
                k.copy_from_slice(&key[..8]);
                Ok(Self { algo, key: k })
            }
            _ => Err(A5Error::Unsupported(algo)),
        }
    }

    pub fn algo(&self) -> A5Algo {
        self.algo
    }

    /// Keystream for `fn_`, None for A5/0
    pub fn keystream(&self, fn_: u32) -> Option<A5Keystream> {
        match self.algo.0 {
            1 => Some(a5_1(&self.key, a5_fn_count(fn_))),
            _ => None,
        }
    }

    /// Decrypts the data bits of a received 148-bit soft burst in place
    pub fn decrypt_burst(&self, fn_: u32, burst: &mut [SBit]) {
        if let Some(ks) = self.keystream(fn_) {
            for i in 0..57 {
                if ks.dl[i] != 0 {
                    burst[i + 3] = burst[i + 3].saturating_neg();
                }
                if ks.dl[i + 57] != 0 {
                    burst[i + 88] = burst[i + 88].saturating_neg();
                }
            }
        }
    }

    /// Encrypts the data bits of a 148-bit hard burst in place
    pub fn encrypt_burst(&self, fn_: u32, burst: &mut [UBit]) {
        if let Some(ks) = self.keystream(fn_) {
            for i in 0..57 {
                burst[i + 3] ^= ks.ul[i];
                burst[i + 88] ^= ks.ul[i + 57];
            }
        }
    }
}
