//! TDMA multiframe layouts, 3GPP TS 45.002 clause 7 table 1
//!
//! A layout maps every frame of its period to the logical channel and burst index
//! received (downlink) and transmitted (uplink) on a timeslot. Layouts are built once
//! and shared between timeslots through `Arc`.

use std::sync::Arc;

use trxcon_core::PchanConfig;

use super::lchan_desc::LchanType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MframeFrame {
    pub dl_chan: LchanType,
    pub dl_bid: u8,
    pub ul_chan: LchanType,
    pub ul_bid: u8,
}

const IDLE: (LchanType, u8) = (LchanType::Idle, 0);

#[derive(Debug)]
pub struct MframeLayout {
    pub config: PchanConfig,
    pub name: &'static str,
    pub period: u32,
    /// Timeslots this layout may be used on
    pub slotmask: u8,
    /// Every logical channel appearing in the layout, by [`LchanType::mask_bit`]
    pub lchan_mask: u64,
    pub frames: Vec<MframeFrame>,
}

impl MframeLayout {
    fn build(
        config: PchanConfig,
        name: &'static str,
        slotmask: u8,
        period: u32,
        dl: impl Fn(u32) -> (LchanType, u8),
        ul: impl Fn(u32) -> (LchanType, u8),
    ) -> Self {
        let frames: Vec<MframeFrame> = (0..period)
            .map(|f| {
                let (dl_chan, dl_bid) = dl(f);
                let (ul_chan, ul_bid) = ul(f);
                MframeFrame {
                    dl_chan,
                    dl_bid,
                    ul_chan,
                    ul_bid,
                }
            })
            .collect();

        let lchan_mask = frames
            .iter()
            .flat_map(|fr| [fr.dl_chan, fr.ul_chan])
            .filter(|t| *t != LchanType::Idle)
            .fold(0u64, |mask, t| mask | t.mask_bit());

        Self {
            config,
            name,
            period,
            slotmask,
            lchan_mask,
            frames,
        }
    }

    /// Frame descriptor for an absolute frame number
    #[inline]
    pub fn frame(&self, fn_: u32) -> &MframeFrame {
        &self.frames[(fn_ % self.period) as usize]
    }

    pub fn has_lchan(&self, chan: LchanType) -> bool {
        self.lchan_mask & chan.mask_bit() != 0
    }
}

/// Downlink of the BCCH/CCCH part of a 51-multiframe, for frames 0..50
fn ccch_dl(f51: u32) -> (LchanType, u8) {
    if f51 == 50 {
        return IDLE;
    }
    let group = f51 / 10;
    let r = (f51 % 10) as u8;
    match r {
        0 => (LchanType::Fcch, 0),
        1 => (LchanType::Sch, 0),
        2..=5 if group == 0 => (LchanType::Bcch, r - 2),
        2..=5 => (LchanType::Ccch, r - 2),
        _ => (LchanType::Ccch, r - 6),
    }
}

fn ccch_sdcch4_dl(f102: u32, cbch: bool) -> (LchanType, u8) {
    let half = f102 / 51;
    let f = f102 % 51;
    // Dedicated blocks start on frames 22, 26, 32, 36, 42 and 46
    let chan = match f {
        0..=19 => return ccch_dl(f),
        20 | 30 | 40 => return (LchanType::Fcch, 0),
        21 | 31 | 41 => return (LchanType::Sch, 0),
        22..=25 => LchanType::Sdcch4(0),
        26..=29 => LchanType::Sdcch4(1),
        32..=35 if cbch => LchanType::Sdcch4Cbch,
        32..=35 => LchanType::Sdcch4(2),
        36..=39 => LchanType::Sdcch4(3),
        42..=45 if half == 0 => LchanType::Sacch4(0),
        42..=45 if cbch => return IDLE,
        42..=45 => LchanType::Sacch4(2),
        46..=49 if half == 0 => LchanType::Sacch4(1),
        46..=49 => LchanType::Sacch4(3),
        _ => return IDLE,
    };
    let start = match f {
        22..=25 => 22,
        26..=29 => 26,
        32..=35 => 32,
        36..=39 => 36,
        42..=45 => 42,
        _ => 46,
    };
    (chan, (f - start) as u8)
}

fn ccch_sdcch4_ul(f102: u32, cbch: bool) -> (LchanType, u8) {
    let half = f102 / 51;
    let f = f102 % 51;
    let chan = match f {
        0..=3 => LchanType::Sdcch4(3),
        6..=9 if half == 0 => LchanType::Sacch4(2),
        6..=9 => LchanType::Sacch4(0),
        10..=13 if half == 0 => LchanType::Sacch4(3),
        10..=13 => LchanType::Sacch4(1),
        37..=40 => LchanType::Sdcch4(0),
        41..=44 => LchanType::Sdcch4(1),
        47..=50 => LchanType::Sdcch4(2),
        _ => return (LchanType::Rach, 0),
    };
    if cbch && matches!(chan, LchanType::Sdcch4(2) | LchanType::Sacch4(2)) {
        return IDLE;
    }
    let bid = match f {
        0..=3 => f,
        6..=13 => f - 6,
        37..=44 => f - 37,
        _ => f - 47,
    };
    (chan, (bid % 4) as u8)
}

fn sdcch8_dl(f102: u32, cbch: bool) -> (LchanType, u8) {
    let bid = (f102 % 51 % 4) as u8;
    let (chan, bid) = match f102 {
        0..=31 => (LchanType::Sdcch8((f102 / 4) as u8), bid),
        32..=47 => (LchanType::Sacch8(((f102 - 32) / 4) as u8), bid),
        51..=82 => (LchanType::Sdcch8(((f102 - 51) / 4) as u8), ((f102 - 51) % 4) as u8),
        83..=98 => (LchanType::Sacch8(4 + ((f102 - 83) / 4) as u8), ((f102 - 83) % 4) as u8),
        _ => return IDLE,
    };
    match chan {
        LchanType::Sdcch8(2) if cbch => (LchanType::Sdcch8Cbch, bid),
        LchanType::Sacch8(2) if cbch => IDLE,
        _ => (chan, bid),
    }
}

fn sdcch8_ul(f102: u32, cbch: bool) -> (LchanType, u8) {
    // Uplink lags the downlink by 15 frames
    let (chan, bid) = sdcch8_dl((f102 + 102 - 15) % 102, false);
    if cbch && matches!(chan, LchanType::Sdcch8(2) | LchanType::Sacch8(2)) {
        return IDLE;
    }
    (chan, bid)
}

/// First frame of the SACCH block of a full rate channel on `tn`
fn tchf_sacch_start(tn: u8) -> u32 {
    (12 + 13 * tn as u32) % 104
}

fn tchf(f104: u32, tn: u8) -> (LchanType, u8) {
    let f26 = f104 % 26;
    match f26 {
        0..=11 => (LchanType::TchF, (f26 % 4) as u8),
        13..=24 => (LchanType::TchF, ((f26 - 13) % 4) as u8),
        _ => {
            let s = tchf_sacch_start(tn);
            if f26 == s % 26 {
                (LchanType::SacchTf, (((f104 + 104 - s) % 104) / 26) as u8)
            } else {
                IDLE
            }
        }
    }
}

fn tchh(f104: u32, tn: u8) -> (LchanType, u8) {
    let f26 = f104 % 26;
    match f26 {
        0..=11 | 13..=24 => {
            let g = if f26 < 12 { f26 } else { f26 - 13 };
            (LchanType::TchH((g % 2) as u8), ((g / 2) % 2) as u8)
        }
        _ => {
            let s0 = 12 + 26 * (tn as u32 / 2);
            let (sub, s) = if f26 == 12 { (0, s0) } else { (1, s0 + 13) };
            (LchanType::SacchTh(sub), (((f104 + 104 - s) % 104) / 26) as u8)
        }
    }
}

fn pdch(f104: u32) -> (LchanType, u8) {
    let f52 = f104 % 52;
    match f52 {
        12 | 38 => (LchanType::Ptcch, ((f104 - 12) / 26) as u8),
        25 | 51 => IDLE,
        _ => {
            let start = f52 - f52 % 13;
            (LchanType::Pdtch, ((f52 - start) % 4) as u8)
        }
    }
}

/// All known layouts
pub struct MframeTables {
    layouts: Vec<Arc<MframeLayout>>,
}

impl Default for MframeTables {
    fn default() -> Self {
        Self::new()
    }
}

impl MframeTables {
    pub fn new() -> Self {
        let mut layouts = vec![
            MframeLayout::build(PchanConfig::Ccch, "CCCH", 0x55, 51, ccch_dl, |_| (LchanType::Rach, 0)),
            MframeLayout::build(
                PchanConfig::CcchSdcch4,
                "CCCH+SDCCH4",
                0x01,
                102,
                |f| ccch_sdcch4_dl(f, false),
                |f| ccch_sdcch4_ul(f, false),
            ),
            MframeLayout::build(
                PchanConfig::CcchSdcch4Cbch,
                "CCCH+SDCCH4+CBCH",
                0x01,
                102,
                |f| ccch_sdcch4_dl(f, true),
                |f| ccch_sdcch4_ul(f, true),
            ),
            MframeLayout::build(
                PchanConfig::Sdcch8,
                "SDCCH8",
                0xff,
                102,
                |f| sdcch8_dl(f, false),
                |f| sdcch8_ul(f, false),
            ),
            MframeLayout::build(
                PchanConfig::Sdcch8Cbch,
                "SDCCH8+CBCH",
                0xff,
                102,
                |f| sdcch8_dl(f, true),
                |f| sdcch8_ul(f, true),
            ),
        ];

        // The SACCH position depends on the timeslot
        for tn in 0..8u8 {
            layouts.push(MframeLayout::build(
                PchanConfig::TchF,
                "TCH/F",
                1 << tn,
                104,
                |f| tchf(f, tn),
                |f| tchf(f, tn),
            ));
        }
        for pair in 0..4u8 {
            let tn = pair * 2;
            layouts.push(MframeLayout::build(
                PchanConfig::TchH,
                "TCH/H",
                0x03 << tn,
                104,
                |f| tchh(f, tn),
                |f| tchh(f, tn),
            ));
        }

        layouts.push(MframeLayout::build(PchanConfig::Pdch, "PDCH", 0xff, 104, pdch, pdch));

        Self {
            layouts: layouts.into_iter().map(Arc::new).collect(),
        }
    }

    /// Layout for a channel combination on a timeslot, if the combination may be used there
    pub fn lookup(&self, config: PchanConfig, tn: u8) -> Option<Arc<MframeLayout>> {
        self.layouts
            .iter()
            .find(|l| l.config == config && l.slotmask & (1 << (tn & 7)) != 0)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(layout: &MframeLayout, chan: LchanType, ul: bool) -> usize {
        layout
            .frames
            .iter()
            .filter(|f| if ul { f.ul_chan == chan } else { f.dl_chan == chan })
            .count()
    }

    /// Each block of a channel must be a run of burst indices 0, 1, 2, 3
    fn assert_blocks_of_four(layout: &MframeLayout, chan: LchanType, ul: bool) {
        let bids: Vec<u8> = layout
            .frames
            .iter()
            .filter_map(|f| {
                if ul {
                    (f.ul_chan == chan).then_some(f.ul_bid)
                } else {
                    (f.dl_chan == chan).then_some(f.dl_bid)
                }
            })
            .collect();
        assert_eq!(bids.len() % 4, 0, "{} {}", layout.name, chan);
        for (i, bid) in bids.iter().enumerate() {
            assert_eq!(*bid as usize, i % 4, "{} {} ul={}", layout.name, chan, ul);
        }
    }

    #[test]
    fn test_lookup() {
        let t = MframeTables::new();
        assert!(t.lookup(PchanConfig::Ccch, 0).is_some());
        assert!(t.lookup(PchanConfig::Ccch, 1).is_none());
        assert!(t.lookup(PchanConfig::CcchSdcch4, 2).is_none());
        assert!(t.lookup(PchanConfig::None, 0).is_none());
        let l = t.lookup(PchanConfig::TchH, 5).unwrap();
        assert_eq!(l.slotmask, 0x30);
        // Shared, not copied
        let a = t.lookup(PchanConfig::Pdch, 3).unwrap();
        let b = t.lookup(PchanConfig::Pdch, 4).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_ccch() {
        let t = MframeTables::new();
        let l = t.lookup(PchanConfig::Ccch, 0).unwrap();
        assert_eq!(l.period, 51);
        assert_eq!(count(&l, LchanType::Fcch, false), 5);
        assert_eq!(count(&l, LchanType::Sch, false), 5);
        assert_eq!(count(&l, LchanType::Bcch, false), 4);
        assert_eq!(count(&l, LchanType::Ccch, false), 36);
        assert_eq!(count(&l, LchanType::Rach, true), 51);
        assert_blocks_of_four(&l, LchanType::Ccch, false);
        assert_eq!(l.frame(51 * 7 + 2).dl_chan, LchanType::Bcch);
        assert_eq!(l.frame(50).dl_chan, LchanType::Idle);
        assert!(l.has_lchan(LchanType::Rach));
        assert!(!l.has_lchan(LchanType::Idle));
    }

    #[test]
    fn test_ccch_sdcch4() {
        let t = MframeTables::new();
        let l = t.lookup(PchanConfig::CcchSdcch4, 0).unwrap();
        assert_eq!(l.period, 102);
        for n in 0..4 {
            assert_eq!(count(&l, LchanType::Sdcch4(n), false), 8);
            assert_eq!(count(&l, LchanType::Sdcch4(n), true), 8);
            assert_eq!(count(&l, LchanType::Sacch4(n), false), 4);
            assert_eq!(count(&l, LchanType::Sacch4(n), true), 4);
            assert_blocks_of_four(&l, LchanType::Sdcch4(n), false);
            assert_blocks_of_four(&l, LchanType::Sdcch4(n), true);
            assert_blocks_of_four(&l, LchanType::Sacch4(n), false);
            assert_blocks_of_four(&l, LchanType::Sacch4(n), true);
        }
        assert_eq!(l.frame(32).dl_chan, LchanType::Sdcch4(2));
        assert_eq!(l.frame(32).dl_bid, 0);
        assert_eq!(l.frame(39).dl_bid, 3);
        assert_eq!(l.frame(51 + 42).dl_chan, LchanType::Sacch4(2));
        assert_eq!(l.frame(51 + 42).dl_bid, 0);
        for f in 0..102 {
            // No dedicated burst index outside 0..3 and no panic on the first frames
            assert!(l.frame(f).dl_bid < 4 && l.frame(f).ul_bid < 4);
        }
        assert_eq!(count(&l, LchanType::Rach, true), 2 * 27);

        let c = t.lookup(PchanConfig::CcchSdcch4Cbch, 0).unwrap();
        assert_eq!(count(&c, LchanType::Sdcch4Cbch, false), 8);
        assert_blocks_of_four(&c, LchanType::Sdcch4Cbch, false);
        assert!(!c.has_lchan(LchanType::Sdcch4(2)));
        assert!(!c.has_lchan(LchanType::Sacch4(2)));
        assert!(c.has_lchan(LchanType::Sdcch4(3)));
    }

    #[test]
    fn test_sdcch8() {
        let t = MframeTables::new();
        let l = t.lookup(PchanConfig::Sdcch8, 3).unwrap();
        for n in 0..8 {
            assert_eq!(count(&l, LchanType::Sdcch8(n), false), 8);
            assert_eq!(count(&l, LchanType::Sdcch8(n), true), 8);
            assert_eq!(count(&l, LchanType::Sacch8(n), false), 4);
            assert_blocks_of_four(&l, LchanType::Sdcch8(n), true);
        }
        // Uplink starts 15 frames after the downlink
        assert_eq!(l.frame(15).ul_chan, LchanType::Sdcch8(0));
        assert_eq!(l.frame(15).ul_bid, 0);
        assert_eq!(l.frame(0).dl_chan, LchanType::Sdcch8(0));

        let c = t.lookup(PchanConfig::Sdcch8Cbch, 3).unwrap();
        assert!(c.has_lchan(LchanType::Sdcch8Cbch));
        assert!(!c.has_lchan(LchanType::Sdcch8(2)));
    }

    #[test]
    fn test_tchf_sacch_position() {
        let t = MframeTables::new();
        for tn in 0..8u8 {
            let l = t.lookup(PchanConfig::TchF, tn).unwrap();
            assert_eq!(count(&l, LchanType::TchF, false), 96);
            assert_eq!(count(&l, LchanType::SacchTf, false), 4);
            assert_eq!(count(&l, LchanType::Idle, false), 4);
            assert_blocks_of_four(&l, LchanType::TchF, false);

            // The block may wrap past frame 103, walk it from its first frame
            let s = (12 + 13 * tn as u32) % 104;
            let bids: Vec<u8> = (s..s + 104)
                .map(|f| l.frame(f))
                .filter(|fr| fr.dl_chan == LchanType::SacchTf)
                .map(|fr| fr.dl_bid)
                .collect();
            assert_eq!(bids, vec![0, 1, 2, 3], "TN{}", tn);
            assert_eq!(l.frame(s).ul_chan, LchanType::SacchTf);
            assert_eq!(l.frame(s).ul_bid, 0);
        }
        let l = t.lookup(PchanConfig::TchF, 1).unwrap();
        assert_eq!(l.frame(25).dl_chan, LchanType::SacchTf);
        assert_eq!(l.frame(103).dl_bid, 3);
        assert_eq!(l.frame(12).dl_chan, LchanType::Idle);

        let l = t.lookup(PchanConfig::TchF, 2).unwrap();
        assert_eq!(l.frame(38).dl_bid, 0);
        assert_eq!(l.frame(12).dl_bid, 3);
    }

    #[test]
    fn test_tchh() {
        let t = MframeTables::new();
        let l = t.lookup(PchanConfig::TchH, 0).unwrap();
        assert_eq!(count(&l, LchanType::TchH(0), false), 48);
        assert_eq!(count(&l, LchanType::TchH(1), false), 48);
        assert_eq!(count(&l, LchanType::SacchTh(0), false), 4);
        assert_eq!(count(&l, LchanType::SacchTh(1), true), 4);
        assert_eq!(l.frame(13).dl_chan, LchanType::TchH(0));
        assert_eq!(l.frame(15).dl_bid, 1);
        assert_eq!(l.frame(14).dl_chan, LchanType::TchH(1));
        assert_eq!(l.frame(12).dl_chan, LchanType::SacchTh(0));
        assert_eq!(l.frame(25).dl_chan, LchanType::SacchTh(1));

        let l = t.lookup(PchanConfig::TchH, 2).unwrap();
        assert_eq!(l.frame(38).dl_chan, LchanType::SacchTh(0));
        assert_eq!(l.frame(38).dl_bid, 0);
    }

    #[test]
    fn test_pdch() {
        let t = MframeTables::new();
        let l = t.lookup(PchanConfig::Pdch, 7).unwrap();
        assert_eq!(count(&l, LchanType::Pdtch, false), 96);
        assert_eq!(count(&l, LchanType::Ptcch, false), 4);
        assert_blocks_of_four(&l, LchanType::Pdtch, false);
        assert_blocks_of_four(&l, LchanType::Ptcch, true);
        assert_eq!(l.frame(90).dl_bid, 3);
    }
}
