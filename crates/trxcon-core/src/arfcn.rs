//! ARFCN to carrier frequency conversion, 3GPP TS 45.005 clause 2

use core::fmt;

/// Flag in an ARFCN value selecting the PCS1900 band for the overlapping 512..810 range
pub const ARFCN_FLAG_PCS: u16 = 0x8000;
/// Flag in an ARFCN value indicating uplink
pub const ARFCN_FLAG_UPLINK: u16 = 0x4000;
pub const ARFCN_MASK: u16 = 0x3fff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GsmBand {
    Gsm450,
    Gsm480,
    Gsm850,
    Gsm900,
    Dcs1800,
    Pcs1900,
}

impl fmt::Display for GsmBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GsmBand::Gsm450 => "GSM450",
            GsmBand::Gsm480 => "GSM480",
            GsmBand::Gsm850 => "GSM850",
            GsmBand::Gsm900 => "GSM900",
            GsmBand::Dcs1800 => "DCS1800",
            GsmBand::Pcs1900 => "PCS1900",
        };
        f.write_str(s)
    }
}

/// Band an ARFCN belongs to, or None when it lies outside every known band
pub fn arfcn_to_band(arfcn: u16) -> Option<GsmBand> {
    let n = arfcn & ARFCN_MASK;
    if arfcn & ARFCN_FLAG_PCS != 0 {
        return if (512..=810).contains(&n) { Some(GsmBand::Pcs1900) } else { None };
    }
    match n {
        0..=124 | 955..=1023 => Some(GsmBand::Gsm900),
        128..=251 => Some(GsmBand::Gsm850),
        259..=293 => Some(GsmBand::Gsm450),
        306..=340 => Some(GsmBand::Gsm480),
        512..=885 => Some(GsmBand::Dcs1800),
        _ => None,
    }
}

/// Carrier frequency in units of 100 kHz
pub fn arfcn_to_freq10(arfcn: u16, uplink: bool) -> Option<u32> {
    let band = arfcn_to_band(arfcn)?;
    let n = (arfcn & ARFCN_MASK) as i32;

    let (ul, duplex) = match band {
        GsmBand::Gsm900 => {
            // E-GSM and R-GSM channels count down from 1024
            let n = if n >= 955 { n - 1024 } else { n };
            (8900 + 2 * n, 450)
        }
        GsmBand::Gsm850 => (8242 + 2 * (n - 128), 450),
        GsmBand::Gsm450 => (4506 + 2 * (n - 259), 100),
        GsmBand::Gsm480 => (4790 + 2 * (n - 306), 100),
        GsmBand::Dcs1800 => (17102 + 2 * (n - 512), 950),
        GsmBand::Pcs1900 => (18502 + 2 * (n - 512), 800),
    };

    let freq10 = if uplink { ul } else { ul + duplex };
    Some(freq10 as u32)
}

/// Carrier frequency in kHz, as used in transceiver tuning commands
pub fn arfcn_to_khz(arfcn: u16, uplink: bool) -> Option<u32> {
    arfcn_to_freq10(arfcn, uplink).map(|f| f * 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gsm900() {
        assert_eq!(arfcn_to_khz(1, true), Some(890_200));
        assert_eq!(arfcn_to_khz(1, false), Some(935_200));
        assert_eq!(arfcn_to_khz(0, false), Some(935_000));
        // E-GSM
        assert_eq!(arfcn_to_khz(975, true), Some(880_200));
        assert_eq!(arfcn_to_band(975), Some(GsmBand::Gsm900));
    }

    #[test]
    fn test_dcs_pcs() {
        assert_eq!(arfcn_to_khz(512, true), Some(1_710_200));
        assert_eq!(arfcn_to_khz(512, false), Some(1_805_200));
        assert_eq!(arfcn_to_khz(512 | ARFCN_FLAG_PCS, true), Some(1_850_200));
        assert_eq!(arfcn_to_khz(512 | ARFCN_FLAG_PCS, false), Some(1_930_200));
        assert_eq!(arfcn_to_band(885 | ARFCN_FLAG_PCS), None);
    }

    #[test]
    fn test_gsm850_and_gaps() {
        assert_eq!(arfcn_to_khz(128, true), Some(824_200));
        assert_eq!(arfcn_to_khz(128, false), Some(869_200));
        assert_eq!(arfcn_to_band(126), None);
        assert_eq!(arfcn_to_band(900), None);
    }
}
