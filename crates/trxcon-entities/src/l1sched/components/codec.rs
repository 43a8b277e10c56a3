// GSM 05.03 channel coding, 3GPP TS 45.003

use core::fmt;

use trxcon_core::bits::{GSM_MACBLOCK_LEN, GSM_NBITS_NB_GMSK_PAYLOAD, bits_to_bytes_lsb, bytes_to_bits_lsb, bytes_to_bits_msb};
use trxcon_core::{SBit, TchMode, UBit};

use super::convenc::conv_encode;
use super::crc::{GSM_CRC3_TCH_FR, GSM_FIRE_XCCH, GSM_PARITY_RACH, GSM_PARITY_SCH};
use super::interleaver::{CODED_BLOCK_BITS, Interleaving, deinterleave, interleave, steal_flag_positions};
use super::viterbi::GsmViterbiDecoder;

/// Full rate speech frame: 0xD signature nibble followed by 260 class-ordered bits
pub const GSM_FR_BYTES: usize = 33;
pub const GSM_EFR_BYTES: usize = 31;
/// Half rate speech frame including the ToC octet
pub const GSM_HR_BYTES: usize = 15;
/// Largest PDTCH block (CS-4)
pub const GPRS_MAX_BLOCK_LEN: usize = 54;

const FR_CLASS1A_BITS: usize = 50;
const FR_CLASS1_BITS: usize = 182;
const FR_CLASS2_BITS: usize = 78;
const FR_SPEECH_BITS: usize = FR_CLASS1_BITS + FR_CLASS2_BITS;
/// Class 1 bits, CRC3 and tail before convolutional coding
const FR_CONV_IN_BITS: usize = FR_CLASS1_BITS + 3 + 4;

const XCCH_DATA_BITS: usize = 184;
const XCCH_CONV_IN_BITS: usize = XCCH_DATA_BITS + 40 + 4;

const RACH_CONV_IN_BITS: usize = 8 + 6 + 4;
pub const RACH_CODED_BITS: usize = 2 * RACH_CONV_IN_BITS;
const RACH_EXT_CONV_IN_BITS: usize = 11 + 6 + 4;
/// Coded bits dropped from the 42 bit code word of an extended access burst
const RACH_EXT_PUNCTURED: [usize; 6] = [0, 2, 5, 37, 39, 41];

const SCH_INFO_BITS: usize = 25;
const SCH_CONV_IN_BITS: usize = SCH_INFO_BITS + 10 + 4;
pub const SCH_CODED_BITS: usize = 2 * SCH_CONV_IN_BITS;

/// Stealing flag patterns of the GPRS coding schemes CS-1..CS-4
const PDTCH_CS_FLAGS: [[UBit; 8]; 4] = [
    [1, 1, 1, 1, 1, 1, 1, 1],
    [1, 1, 0, 0, 1, 0, 0, 0],
    [0, 0, 1, 0, 0, 0, 0, 1],
    [0, 0, 0, 1, 0, 1, 1, 0],
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Coding scheme or channel mode without an implementation
    Unsupported(&'static str),
    InvalidLength { expected: usize, got: usize },
    /// Decoded block failed its parity check
    CrcMismatch { n_errors: u16, n_bits_total: u16 },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Unsupported(what) => write!(f, "{} is not supported", what),
            CodecError::InvalidLength { expected, got } => write!(f, "payload of {} bytes, expected {}", got, expected),
            CodecError::CrcMismatch { n_errors, n_bits_total } => {
                write!(f, "parity check failed (ber={}/{})", n_errors, n_bits_total)
            }
        }
    }
}

impl std::error::Error for CodecError {}

/// A successfully decoded block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub data: Vec<u8>,
    pub n_errors: u16,
    pub n_bits_total: u16,
}

/// Result of decoding a traffic channel block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TchFrame {
    /// Signalling block that stole the traffic frame
    Facch(Decoded),
    Speech(Decoded),
}

/// Channel coding used by the logical channel handlers.
///
/// Burst arguments are contiguous 116-bit payloads. Soft bits are positive for 0 and
/// negative for 1, with 0 marking an erased bit.
pub trait ChannelCodec: Send {
    /// Encodes a 23 byte MAC block into 4 burst payloads
    fn xcch_encode(&self, data: &[u8]) -> Result<Vec<UBit>, CodecError>;
    fn xcch_decode(&self, bursts: &[SBit]) -> Result<Decoded, CodecError>;

    /// Encodes a PDTCH block into 4 burst payloads, the coding scheme follows from the length
    fn pdtch_encode(&self, data: &[u8]) -> Result<Vec<UBit>, CodecError>;
    fn pdtch_decode(&self, bursts: &[SBit]) -> Result<Decoded, CodecError>;

    /// Encodes a speech frame or FACCH block on top of the 8 burst payloads in `bursts`.
    /// Only positions belonging to the new block are written.
    fn tch_fr_encode(&self, bursts: &mut [UBit], data: &[u8], mode: TchMode) -> Result<(), CodecError>;
    fn tch_fr_decode(&self, bursts: &[SBit], mode: TchMode) -> Result<TchFrame, CodecError>;

    /// Half rate counterpart over 6 burst payloads
    fn tch_hr_encode(&self, bursts: &mut [UBit], data: &[u8], mode: TchMode) -> Result<(), CodecError>;
    fn tch_hr_decode(&self, bursts: &[SBit], facch_possible: bool, mode: TchMode) -> Result<TchFrame, CodecError>;

    /// Encodes the 36 coded bits of an access burst, 8-bit or extended 11-bit
    fn rach_encode(&self, ra: u16, bsic: u8, is_11bit: bool) -> Result<Vec<UBit>, CodecError>;

    /// Decodes the 78 coded bits of a synchronisation burst into the packed 25 info bits
    fn sch_decode(&self, coded: &[SBit]) -> Result<[u8; 4], CodecError>;
}

/// GMSK coding of TS 45.003 for the channels the scheduler serves
#[derive(Default)]
pub struct Gsm0503Codec {
    viterbi: GsmViterbiDecoder,
}

impl Gsm0503Codec {
    pub fn new() -> Self {
        Self {
            viterbi: GsmViterbiDecoder::new(),
        }
    }

    /// Viterbi decoding of `coded` (burst soft bit convention). Returns the decoded bits and
    /// the number of non-erased coded bits that differ from the re-encoded block.
    fn conv_decode(&self, coded: &[SBit]) -> (Vec<UBit>, u16) {
        let inverted: Vec<SBit> = coded.iter().map(|s| s.saturating_neg()).collect();
        let decoded = self.viterbi.decode(&inverted);
        let reencoded = conv_encode(&decoded);
        let n_errors = coded
            .iter()
            .zip(reencoded.iter())
            .filter(|(s, b)| **s != 0 && (**s < 0) != (**b != 0))
            .count();
        (decoded, n_errors as u16)
    }

    /// Fire coding and convolutional coding of a MAC block into 456 bits
    fn xcch_code_block(data: &[u8]) -> Result<Vec<UBit>, CodecError> {
        if data.len() != GSM_MACBLOCK_LEN {
            return Err(CodecError::InvalidLength {
                expected: GSM_MACBLOCK_LEN,
                got: data.len(),
            });
        }
        let mut u = bytes_to_bits_lsb(data, XCCH_DATA_BITS);
        u.resize(XCCH_CONV_IN_BITS, 0);
        let (d, p) = u.split_at_mut(XCCH_DATA_BITS);
        GSM_FIRE_XCCH.set_bits(d, p);
        Ok(conv_encode(&u))
    }

    /// Inverse of `xcch_code_block` over 456 deinterleaved soft bits
    fn xcch_decode_block(&self, coded: &[SBit]) -> Result<Decoded, CodecError> {
        let (u, n_errors) = self.conv_decode(coded);
        let n_bits_total = CODED_BLOCK_BITS as u16;
        if !GSM_FIRE_XCCH.check_bits(&u[..XCCH_DATA_BITS], &u[XCCH_DATA_BITS..XCCH_DATA_BITS + 40]) {
            return Err(CodecError::CrcMismatch { n_errors, n_bits_total });
        }
        Ok(Decoded {
            data: bits_to_bytes_lsb(&u[..XCCH_DATA_BITS]),
            n_errors,
            n_bits_total,
        })
    }

    fn deinterleave_soft(scheme: Interleaving, bursts: &[SBit]) -> Result<Vec<SBit>, CodecError> {
        check_bursts(bursts.len(), scheme.num_bursts())?;
        let mut coded = vec![0 as SBit; CODED_BLOCK_BITS];
        deinterleave(scheme, bursts, &mut coded);
        Ok(coded)
    }

    fn set_steal_flags(scheme: Interleaving, bursts: &mut [UBit], value: UBit) {
        for (b, pos) in steal_flag_positions(scheme) {
            bursts[b * GSM_NBITS_NB_GMSK_PAYLOAD + pos] = value;
        }
    }

    /// True when the stealing flags of this block mostly read as 1
    fn is_stolen(scheme: Interleaving, bursts: &[SBit]) -> bool {
        let sum: i32 = steal_flag_positions(scheme)
            .iter()
            .map(|(b, pos)| bursts[b * GSM_NBITS_NB_GMSK_PAYLOAD + pos] as i32)
            .sum();
        sum < 0
    }

    fn facch_encode(scheme: Interleaving, bursts: &mut [UBit], data: &[u8]) -> Result<(), CodecError> {
        check_bursts(bursts.len(), scheme.num_bursts())?;
        let coded = Self::xcch_code_block(data)?;
        interleave(scheme, &coded, bursts);
        Self::set_steal_flags(scheme, bursts, 1);
        Ok(())
    }

    fn fr_speech_encode(bursts: &mut [UBit], data: &[u8]) -> Result<(), CodecError> {
        // 4 signature bits precede the speech bits
        let all = bytes_to_bits_msb(data, 4 + FR_SPEECH_BITS);
        let d = &all[4..];

        let mut u = vec![0 as UBit; FR_CONV_IN_BITS];
        for k in 0..91 {
            u[k] = d[2 * k];
            u[184 - k] = d[2 * k + 1];
        }
        GSM_CRC3_TCH_FR.set_bits(&d[..FR_CLASS1A_BITS], &mut u[91..94]);

        let mut coded = conv_encode(&u);
        coded.extend_from_slice(&d[FR_CLASS1_BITS..]);
        interleave(Interleaving::Diagonal8, &coded, bursts);
        Self::set_steal_flags(Interleaving::Diagonal8, bursts, 0);
        Ok(())
    }

    fn fr_speech_decode(&self, coded: &[SBit]) -> Result<Decoded, CodecError> {
        let conv_len = 2 * FR_CONV_IN_BITS;
        let (u, n_errors) = self.conv_decode(&coded[..conv_len]);
        let n_bits_total = CODED_BLOCK_BITS as u16;

        let mut d = vec![0 as UBit; FR_SPEECH_BITS];
        for k in 0..91 {
            d[2 * k] = u[k];
            d[2 * k + 1] = u[184 - k];
        }
        for (dst, s) in d[FR_CLASS1_BITS..].iter_mut().zip(coded[conv_len..].iter()) {
            *dst = (*s < 0) as UBit;
        }
        if !GSM_CRC3_TCH_FR.check_bits(&d[..FR_CLASS1A_BITS], &u[91..94]) {
            return Err(CodecError::CrcMismatch { n_errors, n_bits_total });
        }

        let mut data = vec![0u8; GSM_FR_BYTES];
        let signature: [UBit; 4] = [1, 1, 0, 1];
        for (i, b) in signature.iter().chain(d.iter()).enumerate() {
            data[i / 8] |= (b & 1) << (7 - (i % 8));
        }
        Ok(Decoded {
            data,
            n_errors,
            n_bits_total,
        })
    }

    /// Closest CS-1..CS-4 flag pattern, numbered from 1
    fn pdtch_coding_scheme(bursts: &[SBit]) -> usize {
        let flags: Vec<SBit> = steal_flag_positions(Interleaving::Block4)
            .iter()
            .map(|(b, pos)| bursts[b * GSM_NBITS_NB_GMSK_PAYLOAD + pos])
            .collect();
        let mut best = (0usize, i32::MIN);
        for (cs, pattern) in PDTCH_CS_FLAGS.iter().enumerate() {
            let score: i32 = flags
                .iter()
                .zip(pattern.iter())
                .map(|(s, p)| if *p != 0 { -(*s as i32) } else { *s as i32 })
                .sum();
            if score > best.1 {
                best = (cs, score);
            }
        }
        best.0 + 1
    }
}

#[inline]
fn check_bursts(len: usize, num_bursts: usize) -> Result<(), CodecError> {
    let expected = num_bursts * GSM_NBITS_NB_GMSK_PAYLOAD;
    if len < expected {
        return Err(CodecError::InvalidLength { expected, got: len });
    }
    Ok(())
}

impl ChannelCodec for Gsm0503Codec {
    fn xcch_encode(&self, data: &[u8]) -> Result<Vec<UBit>, CodecError> {
        let coded = Self::xcch_code_block(data)?;
        let mut bursts = vec![0 as UBit; 4 * GSM_NBITS_NB_GMSK_PAYLOAD];
        interleave(Interleaving::Block4, &coded, &mut bursts);
        Self::set_steal_flags(Interleaving::Block4, &mut bursts, 1);
        Ok(bursts)
    }

    fn xcch_decode(&self, bursts: &[SBit]) -> Result<Decoded, CodecError> {
        let coded = Self::deinterleave_soft(Interleaving::Block4, bursts)?;
        self.xcch_decode_block(&coded)
    }

    fn pdtch_encode(&self, data: &[u8]) -> Result<Vec<UBit>, CodecError> {
        match data.len() {
            GSM_MACBLOCK_LEN => self.xcch_encode(data),
            34 | 40 | GPRS_MAX_BLOCK_LEN => Err(CodecError::Unsupported("GPRS CS-2..CS-4")),
            got => Err(CodecError::InvalidLength {
                expected: GSM_MACBLOCK_LEN,
                got,
            }),
        }
    }

    fn pdtch_decode(&self, bursts: &[SBit]) -> Result<Decoded, CodecError> {
        check_bursts(bursts.len(), 4)?;
        match Self::pdtch_coding_scheme(bursts) {
            1 => self.xcch_decode(bursts),
            _ => Err(CodecError::Unsupported("GPRS CS-2..CS-4")),
        }
    }

    fn tch_fr_encode(&self, bursts: &mut [UBit], data: &[u8], mode: TchMode) -> Result<(), CodecError> {
        check_bursts(bursts.len(), 8)?;
        if data.len() == GSM_MACBLOCK_LEN {
            return Self::facch_encode(Interleaving::Diagonal8, bursts, data);
        }
        match mode {
            TchMode::SpeechV1 => {
                if data.len() != GSM_FR_BYTES {
                    return Err(CodecError::InvalidLength {
                        expected: GSM_FR_BYTES,
                        got: data.len(),
                    });
                }
                Self::fr_speech_encode(bursts, data)
            }
            TchMode::Sign => Err(CodecError::InvalidLength {
                expected: GSM_MACBLOCK_LEN,
                got: data.len(),
            }),
            TchMode::SpeechEfr => Err(CodecError::Unsupported("TCH/EFS")),
            TchMode::SpeechAmr => Err(CodecError::Unsupported("TCH/AFS")),
            _ => Err(CodecError::Unsupported("CSD on TCH/F")),
        }
    }

    fn tch_fr_decode(&self, bursts: &[SBit], mode: TchMode) -> Result<TchFrame, CodecError> {
        let coded = Self::deinterleave_soft(Interleaving::Diagonal8, bursts)?;
        // Every block carries signalling in signalling mode
        if mode == TchMode::Sign || Self::is_stolen(Interleaving::Diagonal8, bursts) {
            return self.xcch_decode_block(&coded).map(TchFrame::Facch);
        }
        match mode {
            TchMode::SpeechV1 => self.fr_speech_decode(&coded).map(TchFrame::Speech),
            TchMode::SpeechEfr => Err(CodecError::Unsupported("TCH/EFS")),
            TchMode::SpeechAmr => Err(CodecError::Unsupported("TCH/AFS")),
            _ => Err(CodecError::Unsupported("CSD on TCH/F")),
        }
    }

    fn tch_hr_encode(&self, bursts: &mut [UBit], data: &[u8], mode: TchMode) -> Result<(), CodecError> {
        check_bursts(bursts.len(), 6)?;
        if data.len() == GSM_MACBLOCK_LEN {
            return Self::facch_encode(Interleaving::Diagonal6, bursts, data);
        }
        match mode {
            TchMode::Sign => Err(CodecError::InvalidLength {
                expected: GSM_MACBLOCK_LEN,
                got: data.len(),
            }),
            TchMode::SpeechV1 => Err(CodecError::Unsupported("TCH/HS")),
            TchMode::SpeechAmr => Err(CodecError::Unsupported("TCH/AHS")),
            _ => Err(CodecError::Unsupported("CSD on TCH/H")),
        }
    }

    fn tch_hr_decode(&self, bursts: &[SBit], facch_possible: bool, mode: TchMode) -> Result<TchFrame, CodecError> {
        check_bursts(bursts.len(), 6)?;
        if facch_possible && (mode == TchMode::Sign || Self::is_stolen(Interleaving::Diagonal6, bursts)) {
            let coded = Self::deinterleave_soft(Interleaving::Diagonal6, bursts)?;
            return self.xcch_decode_block(&coded).map(TchFrame::Facch);
        }
        match mode {
            TchMode::Sign => Err(CodecError::CrcMismatch {
                n_errors: 0,
                n_bits_total: 0,
            }),
            TchMode::SpeechV1 => Err(CodecError::Unsupported("TCH/HS")),
            TchMode::SpeechAmr => Err(CodecError::Unsupported("TCH/AHS")),
            _ => Err(CodecError::Unsupported("CSD on TCH/H")),
        }
    }

    fn rach_encode(&self, ra: u16, bsic: u8, is_11bit: bool) -> Result<Vec<UBit>, CodecError> {
        let (nbits, conv_in_bits) = if is_11bit {
            (11, RACH_EXT_CONV_IN_BITS)
        } else {
            (8, RACH_CONV_IN_BITS)
        };
        // Upper 8 bits in the first octet, the 3 remaining ones in the second
        let packed = if is_11bit {
            [((ra >> 3) & 0xff) as u8, (ra & 0x07) as u8]
        } else {
            [ra as u8, 0]
        };
        let mut u = bytes_to_bits_lsb(&packed, nbits);
        u.resize(conv_in_bits, 0);
        let (d, p) = u.split_at_mut(nbits);
        GSM_PARITY_RACH.set_bits(d, p);
        for (i, bit) in p.iter_mut().take(6).enumerate() {
            *bit ^= (bsic >> (5 - i)) & 1;
        }

        let coded = conv_encode(&u);
        if !is_11bit {
            return Ok(coded);
        }
        Ok(coded
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !RACH_EXT_PUNCTURED.contains(i))
            .map(|(_, b)| b)
            .collect())
    }

    fn sch_decode(&self, coded: &[SBit]) -> Result<[u8; 4], CodecError> {
        if coded.len() < SCH_CODED_BITS {
            return Err(CodecError::InvalidLength {
                expected: SCH_CODED_BITS,
                got: coded.len(),
            });
        }
        let (u, n_errors) = self.conv_decode(&coded[..SCH_CODED_BITS]);
        if !GSM_PARITY_SCH.check_bits(&u[..SCH_INFO_BITS], &u[SCH_INFO_BITS..SCH_INFO_BITS + 10]) {
            return Err(CodecError::CrcMismatch {
                n_errors,
                n_bits_total: SCH_CODED_BITS as u16,
            });
        }
        let packed = bits_to_bytes_lsb(&u[..SCH_INFO_BITS]);
        let mut out = [0u8; 4];
        out.copy_from_slice(&packed[..4]);
        Ok(out)
    }
}

/// Encodes the 78 coded bits of a synchronisation burst from packed info bits.
/// The mobile never transmits an SCH, this is used to build test bursts.
pub fn sch_encode(sb_info: &[u8; 4]) -> Vec<UBit> {
    let mut u = bytes_to_bits_lsb(sb_info, SCH_INFO_BITS);
    u.resize(SCH_CONV_IN_BITS, 0);
    let (d, p) = u.split_at_mut(SCH_INFO_BITS);
    GSM_PARITY_SCH.set_bits(d, p);
    conv_encode(&u)
}
