/// Cyclic block code over a bit-per-byte slice, processed first bit first.
/// `poly` omits the leading term, so a code of `bits` parity bits has generator
/// D^bits + poly(D). Parity bits are emitted highest degree first.
#[derive(Debug, Clone, Copy)]
pub struct CrcCode {
    pub bits: usize,
    pub poly: u64,
    pub init: u64,
    pub remainder_inv: u64,
}

/// Fire code protecting xCCH and CS-1 blocks: D^40 + D^26 + D^23 + D^17 + D^3 + 1
pub const GSM_FIRE_XCCH: CrcCode = CrcCode {
    bits: 40,
    poly: 0x0004820009,
    init: 0,
    remainder_inv: 0xff_ffff_ffff,
};

/// CRC3 over class 1a bits of full rate speech: D^3 + D + 1
pub const GSM_CRC3_TCH_FR: CrcCode = CrcCode {
    bits: 3,
    poly: 0x3,
    init: 0,
    remainder_inv: 0x7,
};

/// Parity of the 8 bit access burst: D^6 + D^5 + D^3 + D^2 + D + 1
pub const GSM_PARITY_RACH: CrcCode = CrcCode {
    bits: 6,
    poly: 0x2f,
    init: 0,
    remainder_inv: 0x3f,
};

/// Parity of the synchronisation burst: D^10 + D^8 + D^6 + D^5 + D^4 + D^2 + 1
pub const GSM_PARITY_SCH: CrcCode = CrcCode {
    bits: 10,
    poly: 0x175,
    init: 0,
    remainder_inv: 0x3ff,
};

impl CrcCode {
    #[inline]
    fn mask(&self) -> u64 {
        if self.bits == 64 { u64::MAX } else { (1u64 << self.bits) - 1 }
    }

    /// Remainder over `data`, one bit per byte
    pub fn compute(&self, data: &[u8]) -> u64 {
        let mask = self.mask();
        let mut crc = self.init;
        for &b in data {
            let top = (crc >> (self.bits - 1)) & 1;
            crc = (crc << 1) & mask;
            if top ^ (b & 1) as u64 != 0 {
                crc ^= self.poly;
            }
        }
        (crc ^ self.remainder_inv) & mask
    }

    /// Writes the parity bits for `data` into `parity[..bits]`
    pub fn set_bits(&self, data: &[u8], parity: &mut [u8]) {
        let crc = self.compute(data);
        for (i, p) in parity.iter_mut().take(self.bits).enumerate() {
            *p = ((crc >> (self.bits - 1 - i)) & 1) as u8;
        }
    }

    /// True when `parity` matches the parity computed over `data`
    pub fn check_bits(&self, data: &[u8], parity: &[u8]) -> bool {
        let crc = self.compute(data);
        parity
            .iter()
            .take(self.bits)
            .enumerate()
            .all(|(i, p)| (p & 1) as u64 == (crc >> (self.bits - 1 - i)) & 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_check() {
        let data: Vec<u8> = (0..184).map(|i| ((i * 7 + 3) % 5 == 0) as u8).collect();
        for code in [GSM_FIRE_XCCH, GSM_CRC3_TCH_FR, GSM_PARITY_RACH, GSM_PARITY_SCH] {
            let mut parity = vec![0u8; code.bits];
            code.set_bits(&data, &mut parity);
            assert!(code.check_bits(&data, &parity));

            let mut corrupted = data.clone();
            corrupted[17] ^= 1;
            assert!(!code.check_bits(&corrupted, &parity), "{} bit code missed a flip", code.bits);
        }
    }

    #[test]
    fn test_zero_data_has_inverted_parity() {
        // All-zero input leaves a zero remainder, so the parity is all ones
        let mut parity = [0u8; 3];
        GSM_CRC3_TCH_FR.set_bits(&[0u8; 50], &mut parity);
        assert_eq!(parity, [1, 1, 1]);
    }
}
