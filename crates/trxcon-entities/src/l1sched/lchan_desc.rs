use core::fmt;

use trxcon_core::PchanConfig;
use trxcon_core::bits::GSM_NBITS_NB_GMSK_PAYLOAD;
use trxcon_core::gsm_types::chan_nr::{self, LID_DEDIC, LID_PTCCH, LID_SACCH};

const BPLEN: usize = GSM_NBITS_NB_GMSK_PAYLOAD;

/// Logical channel types. Sub-channels carry their index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LchanType {
    Idle,
    Fcch,
    Sch,
    Bcch,
    Rach,
    Ccch,
    TchF,
    /// TCH/H sub-channel 0..1
    TchH(u8),
    /// SDCCH/4 sub-channel 0..3
    Sdcch4(u8),
    /// SDCCH/8 sub-channel 0..7
    Sdcch8(u8),
    SacchTf,
    SacchTh(u8),
    Sacch4(u8),
    Sacch8(u8),
    Pdtch,
    Ptcch,
    Sdcch4Cbch,
    Sdcch8Cbch,
}

/// Receive handler families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxHandler {
    Xcch,
    TchF,
    TchH,
    Pdtch,
    Sch,
}

/// Transmit handler families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxHandler {
    Xcch,
    TchF,
    TchH,
    Pdtch,
    Rach,
}

/// Static description of a logical channel type
#[derive(Debug, Clone, Copy)]
pub struct LchanDesc {
    pub name: &'static str,
    /// RSL channel number with the timeslot bits cleared
    pub chan_nr: u8,
    pub link_id: u8,
    /// Size of the rx and tx burst buffers in bits
    pub burst_buf_size: usize,
    /// Activated together with the timeslot
    pub auto_active: bool,
    /// Must transmit even when nothing is queued
    pub cbtx: bool,
    /// Belongs to a packet data channel
    pub pdch: bool,
    pub rx: Option<RxHandler>,
    pub tx: Option<TxHandler>,
}

impl LchanDesc {
    const fn new(name: &'static str, chan_nr: u8, link_id: u8, bursts: usize) -> Self {
        Self {
            name,
            chan_nr,
            link_id,
            burst_buf_size: bursts * BPLEN,
            auto_active: false,
            cbtx: false,
            pdch: false,
            rx: None,
            tx: None,
        }
    }

    const fn auto(mut self) -> Self {
        self.auto_active = true;
        self
    }

    const fn cbtx(mut self) -> Self {
        self.cbtx = true;
        self
    }

    const fn pdch(mut self) -> Self {
        self.pdch = true;
        self
    }

    const fn rx(mut self, h: RxHandler) -> Self {
        self.rx = Some(h);
        self
    }

    const fn tx(mut self, h: TxHandler) -> Self {
        self.tx = Some(h);
        self
    }

    const fn data(self) -> Self {
        self.rx(RxHandler::Xcch).tx(TxHandler::Xcch)
    }
}

const SDCCH4_NAMES: [&str; 4] = ["SDCCH/4(0)", "SDCCH/4(1)", "SDCCH/4(2)", "SDCCH/4(3)"];
const SACCH4_NAMES: [&str; 4] = ["SACCH/4(0)", "SACCH/4(1)", "SACCH/4(2)", "SACCH/4(3)"];
const SDCCH8_NAMES: [&str; 8] = [
    "SDCCH/8(0)",
    "SDCCH/8(1)",
    "SDCCH/8(2)",
    "SDCCH/8(3)",
    "SDCCH/8(4)",
    "SDCCH/8(5)",
    "SDCCH/8(6)",
    "SDCCH/8(7)",
];
const SACCH8_NAMES: [&str; 8] = [
    "SACCH/8(0)",
    "SACCH/8(1)",
    "SACCH/8(2)",
    "SACCH/8(3)",
    "SACCH/8(4)",
    "SACCH/8(5)",
    "SACCH/8(6)",
    "SACCH/8(7)",
];

impl LchanType {
    pub const COUNT: usize = 40;

    /// Every logical channel type, in index order
    pub const ALL: [LchanType; Self::COUNT] = [
        LchanType::Idle,
        LchanType::Fcch,
        LchanType::Sch,
        LchanType::Bcch,
        LchanType::Rach,
        LchanType::Ccch,
        LchanType::TchF,
        LchanType::TchH(0),
        LchanType::TchH(1),
        LchanType::Sdcch4(0),
        LchanType::Sdcch4(1),
        LchanType::Sdcch4(2),
        LchanType::Sdcch4(3),
        LchanType::Sdcch8(0),
        LchanType::Sdcch8(1),
        LchanType::Sdcch8(2),
        LchanType::Sdcch8(3),
        LchanType::Sdcch8(4),
        LchanType::Sdcch8(5),
        LchanType::Sdcch8(6),
        LchanType::Sdcch8(7),
        LchanType::SacchTf,
        LchanType::SacchTh(0),
        LchanType::SacchTh(1),
        LchanType::Sacch4(0),
        LchanType::Sacch4(1),
        LchanType::Sacch4(2),
        LchanType::Sacch4(3),
        LchanType::Sacch8(0),
        LchanType::Sacch8(1),
        LchanType::Sacch8(2),
        LchanType::Sacch8(3),
        LchanType::Sacch8(4),
        LchanType::Sacch8(5),
        LchanType::Sacch8(6),
        LchanType::Sacch8(7),
        LchanType::Pdtch,
        LchanType::Ptcch,
        LchanType::Sdcch4Cbch,
        LchanType::Sdcch8Cbch,
    ];

    /// Position in [`LchanType::ALL`], also the bit used in layout channel masks
    pub const fn index(self) -> usize {
        match self {
            LchanType::Idle => 0,
            LchanType::Fcch => 1,
            LchanType::Sch => 2,
            LchanType::Bcch => 3,
            LchanType::Rach => 4,
            LchanType::Ccch => 5,
            LchanType::TchF => 6,
            LchanType::TchH(n) => 7 + (n as usize & 1),
            LchanType::Sdcch4(n) => 9 + (n as usize & 3),
            LchanType::Sdcch8(n) => 13 + (n as usize & 7),
            LchanType::SacchTf => 21,
            LchanType::SacchTh(n) => 22 + (n as usize & 1),
            LchanType::Sacch4(n) => 24 + (n as usize & 3),
            LchanType::Sacch8(n) => 28 + (n as usize & 7),
            LchanType::Pdtch => 36,
            LchanType::Ptcch => 37,
            LchanType::Sdcch4Cbch => 38,
            LchanType::Sdcch8Cbch => 39,
        }
    }

    pub const fn mask_bit(self) -> u64 {
        1u64 << self.index()
    }

    pub fn is_tch(self) -> bool {
        matches!(self, LchanType::TchF | LchanType::TchH(_))
    }

    pub fn is_sacch(self) -> bool {
        matches!(
            self,
            LchanType::SacchTf | LchanType::SacchTh(_) | LchanType::Sacch4(_) | LchanType::Sacch8(_)
        )
    }

    pub fn name(self) -> &'static str {
        self.desc().name
    }

    pub fn desc(self) -> LchanDesc {
        use RxHandler as R;
        use TxHandler as T;
        match self {
            LchanType::Idle => LchanDesc::new("IDLE", 0x00, LID_DEDIC, 0),
            // Handled by the transceiver
            LchanType::Fcch => LchanDesc::new("FCCH", 0x00, LID_DEDIC, 0),
            LchanType::Sch => LchanDesc::new("SCH", chan_nr::BCCH, LID_DEDIC, 0).auto().rx(R::Sch),
            LchanType::Bcch => LchanDesc::new("BCCH", chan_nr::BCCH, LID_DEDIC, 4).auto().rx(R::Xcch),
            LchanType::Rach => LchanDesc::new("RACH", chan_nr::RACH, LID_DEDIC, 0).auto().tx(T::Rach),
            LchanType::Ccch => LchanDesc::new("CCCH", chan_nr::PCH_AGCH, LID_DEDIC, 4).auto().rx(R::Xcch),
            LchanType::TchF => LchanDesc::new("TCH/F", chan_nr::BM_TCHF, LID_DEDIC, 8)
                .cbtx()
                .rx(R::TchF)
                .tx(T::TchF),
            LchanType::TchH(n) => {
                let name = if n & 1 == 0 { "TCH/H(0)" } else { "TCH/H(1)" };
                LchanDesc::new(name, chan_nr::LM_TCHH | ((n & 1) << 3), LID_DEDIC, 6)
                    .cbtx()
                    .rx(R::TchH)
                    .tx(T::TchH)
            }
            LchanType::Sdcch4(n) => {
                let n = n & 3;
                LchanDesc::new(SDCCH4_NAMES[n as usize], chan_nr::SDCCH4 | (n << 3), LID_DEDIC, 4)
                    .cbtx()
                    .data()
            }
            LchanType::Sdcch8(n) => {
                let n = n & 7;
                LchanDesc::new(SDCCH8_NAMES[n as usize], chan_nr::SDCCH8 | (n << 3), LID_DEDIC, 4)
                    .cbtx()
                    .data()
            }
            LchanType::SacchTf => LchanDesc::new("SACCH/TF", chan_nr::BM_TCHF, LID_SACCH, 4).data(),
            LchanType::SacchTh(n) => {
                let name = if n & 1 == 0 { "SACCH/TH(0)" } else { "SACCH/TH(1)" };
                LchanDesc::new(name, chan_nr::LM_TCHH | ((n & 1) << 3), LID_SACCH, 4).data()
            }
            LchanType::Sacch4(n) => {
                let n = n & 3;
                LchanDesc::new(SACCH4_NAMES[n as usize], chan_nr::SDCCH4 | (n << 3), LID_SACCH, 4).data()
            }
            LchanType::Sacch8(n) => {
                let n = n & 7;
                LchanDesc::new(SACCH8_NAMES[n as usize], chan_nr::SDCCH8 | (n << 3), LID_SACCH, 4).data()
            }
            LchanType::Pdtch => LchanDesc::new("PDTCH", chan_nr::OSMO_PDCH, LID_DEDIC, 12)
                .pdch()
                .rx(R::Pdtch)
                .tx(T::Pdtch),
            LchanType::Ptcch => LchanDesc::new("PTCCH", chan_nr::OSMO_PDCH, LID_PTCCH, 4).pdch().data(),
            LchanType::Sdcch4Cbch => LchanDesc::new("SDCCH/4(CBCH)", chan_nr::OSMO_CBCH4, LID_DEDIC, 4)
                .auto()
                .rx(R::Xcch),
            LchanType::Sdcch8Cbch => LchanDesc::new("SDCCH/8(CBCH)", chan_nr::OSMO_CBCH8, LID_DEDIC, 4)
                .auto()
                .rx(R::Xcch),
        }
    }
}

impl fmt::Display for LchanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Logical channel type addressed by an RSL channel number and link identifier.
/// Returns [`LchanType::Idle`] when nothing matches.
pub fn chan_nr2lchan_type(chan_nr: u8, link_id: u8) -> LchanType {
    LchanType::ALL
        .iter()
        .copied()
        // SCH shares the BCCH channel number but carries no L2 frames
        .filter(|t| *t != LchanType::Sch)
        .find(|t| {
            let desc = t.desc();
            desc.chan_nr == (chan_nr & 0xf8) && desc.link_id == link_id
        })
        .unwrap_or(LchanType::Idle)
}

/// Channel combination implied by an RSL channel number
pub fn chan_nr2pchan_config(chan_nr: u8) -> PchanConfig {
    let cbits = chan_nr::cbits(chan_nr);

    if cbits == 0x01 {
        PchanConfig::TchF
    } else if (cbits & 0x1e) == 0x02 {
        PchanConfig::TchH
    } else if (cbits & 0x1c) == 0x04 {
        PchanConfig::CcchSdcch4
    } else if (cbits & 0x18) == 0x08 {
        PchanConfig::Sdcch8
    } else if cbits == 0x19 {
        PchanConfig::CcchSdcch4Cbch
    } else if cbits == 0x1a {
        PchanConfig::Sdcch8Cbch
    } else if cbits == 0x18 {
        PchanConfig::Pdch
    } else {
        PchanConfig::None
    }
}
