// GSM 05.03 interleaving and burst mapping, 3GPP TS 45.003 clauses 3.1.3 and 4.1.4
//
// Burst payloads are stored as 116 bits: e(0..57), hl, hu, e(57..114).

use trxcon_core::bits::GSM_NBITS_NB_GMSK_PAYLOAD;

/// Coded bits of one xCCH/FACCH block
pub const CODED_BLOCK_BITS: usize = 456;
/// Payload position of the lower stealing flag (hl)
pub const HL_POS: usize = 57;
/// Payload position of the upper stealing flag (hu)
pub const HU_POS: usize = 58;

/// Interleaving schemes for 456-bit coded blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interleaving {
    /// Block rectangular over 4 bursts (xCCH, PDTCH CS-1)
    Block4,
    /// Block diagonal over 8 bursts (TCH/FS, FACCH/F)
    Diagonal8,
    /// Block diagonal over 6 bursts (FACCH/H)
    Diagonal6,
}

impl Interleaving {
    /// Number of bursts a block is spread over
    pub const fn num_bursts(self) -> usize {
        match self {
            Interleaving::Block4 => 4,
            Interleaving::Diagonal8 => 8,
            Interleaving::Diagonal6 => 6,
        }
    }

    /// Burst index and bit position within the burst for coded bit `k`
    #[inline]
    pub const fn map(self, k: usize) -> (usize, usize) {
        let j = 2 * ((49 * k) % 57) + ((k % 8) / 4);
        let b = match self {
            Interleaving::Block4 => k % 4,
            Interleaving::Diagonal8 => k % 8,
            Interleaving::Diagonal6 => (k % 8) - 4 * ((k % 8) / 6),
        };
        (b, j)
    }
}

/// Position of interleaved bit `j` (0..114) within a 116-bit burst payload
#[inline(always)]
pub const fn payload_pos(j: usize) -> usize {
    if j < 57 { j } else { j + 2 }
}

/// Spreads `input` (456 coded bits) over the bursts of `output`, which holds
/// `scheme.num_bursts()` payloads of 116 bits. Positions not used by this block are left as is,
/// so diagonally interleaved blocks can be written on top of the previous one.
pub fn interleave<T: Copy>(scheme: Interleaving, input: &[T], output: &mut [T]) {
    assert!(input.len() >= CODED_BLOCK_BITS);
    assert!(output.len() >= scheme.num_bursts() * GSM_NBITS_NB_GMSK_PAYLOAD);
    for (k, bit) in input.iter().take(CODED_BLOCK_BITS).enumerate() {
        let (b, j) = scheme.map(k);
        output[b * GSM_NBITS_NB_GMSK_PAYLOAD + payload_pos(j)] = *bit;
    }
}

/// Inverse of [`interleave`]
pub fn deinterleave<T: Copy>(scheme: Interleaving, input: &[T], output: &mut [T]) {
    assert!(input.len() >= scheme.num_bursts() * GSM_NBITS_NB_GMSK_PAYLOAD);
    assert!(output.len() >= CODED_BLOCK_BITS);
    for (k, bit) in output.iter_mut().take(CODED_BLOCK_BITS).enumerate() {
        let (b, j) = scheme.map(k);
        *bit = input[b * GSM_NBITS_NB_GMSK_PAYLOAD + payload_pos(j)];
    }
}

/// Stealing flag positions carrying this block's flags, as (burst, payload position).
/// Even coded positions use hu, odd ones hl.
pub fn steal_flag_positions(scheme: Interleaving) -> &'static [(usize, usize)] {
    match scheme {
        Interleaving::Block4 => &[
            (0, HL_POS),
            (0, HU_POS),
            (1, HL_POS),
            (1, HU_POS),
            (2, HL_POS),
            (2, HU_POS),
            (3, HL_POS),
            (3, HU_POS),
        ],
        Interleaving::Diagonal8 => &[
            (0, HU_POS),
            (1, HU_POS),
            (2, HU_POS),
            (3, HU_POS),
            (4, HL_POS),
            (5, HL_POS),
            (6, HL_POS),
            (7, HL_POS),
        ],
        Interleaving::Diagonal6 => &[
            (0, HU_POS),
            (1, HU_POS),
            (2, HU_POS),
            (3, HU_POS),
            (2, HL_POS),
            (3, HL_POS),
            (4, HL_POS),
            (5, HL_POS),
        ],
    }
}
