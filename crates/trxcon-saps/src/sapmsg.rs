use core::fmt::Display;

use trxcon_core::{Sap, TrxconEntity};

use super::l1ctl::*;
use super::trxc::*;
use super::trxd::*;

/// Exhaustive list of primitives exchanged between entities
#[derive(Debug)]
pub enum SapMsgInner {
    // TRXD-SAP
    TrxdBurstInd(TrxdBurstInd),
    TrxdBurstReq(TrxdBurstReq),

    // TRXC-SAP
    TrxcCmdReq(TrxcCmdReq),
    TrxcMeasureReq(TrxcMeasureReq),
    TrxClockInd(TrxClockInd),
    /// Put the TDMA clock back into its waiting state
    ClockResetReq,
    /// Drop pending control commands and return the link to IDLE
    TrxcFlushReq,
    TrxLinkEvent(TrxLinkEvent),

    // L1CTL-SAP, downwards
    L1ctlDataReq(L1ctlDataReq),
    L1ctlTrafficReq(L1ctlTrafficReq),
    L1ctlRachReq(L1ctlRachReq),
    L1ctlFbsbReq(L1ctlFbsbReq),
    L1ctlTsConfigReq(L1ctlTsConfigReq),
    L1ctlLchanReq(L1ctlLchanReq),
    L1ctlCryptoReq(L1ctlCryptoReq),
    L1ctlResetReq(L1ctlResetReq),

    // L1CTL-SAP, upwards
    L1ctlDataInd(L1ctlDataInd),
    L1ctlDataConf(L1ctlDataConf),
    L1ctlRachConf(L1ctlRachConf),
    L1ctlFbsbConf(L1ctlFbsbConf),
    L1ctlPmConf(L1ctlPmConf),
}

impl Display for SapMsgInner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            SapMsgInner::TrxdBurstInd(_) => "TrxdBurstInd",
            SapMsgInner::TrxdBurstReq(_) => "TrxdBurstReq",
            SapMsgInner::TrxcCmdReq(_) => "TrxcCmdReq",
            SapMsgInner::TrxcMeasureReq(_) => "TrxcMeasureReq",
            SapMsgInner::TrxClockInd(_) => "TrxClockInd",
            SapMsgInner::ClockResetReq => "ClockResetReq",
            SapMsgInner::TrxcFlushReq => "TrxcFlushReq",
            SapMsgInner::TrxLinkEvent(_) => "TrxLinkEvent",
            SapMsgInner::L1ctlDataReq(_) => "L1ctlDataReq",
            SapMsgInner::L1ctlTrafficReq(_) => "L1ctlTrafficReq",
            SapMsgInner::L1ctlRachReq(_) => "L1ctlRachReq",
            SapMsgInner::L1ctlFbsbReq(_) => "L1ctlFbsbReq",
            SapMsgInner::L1ctlTsConfigReq(_) => "L1ctlTsConfigReq",
            SapMsgInner::L1ctlLchanReq(_) => "L1ctlLchanReq",
            SapMsgInner::L1ctlCryptoReq(_) => "L1ctlCryptoReq",
            SapMsgInner::L1ctlResetReq(_) => "L1ctlResetReq",
            SapMsgInner::L1ctlDataInd(_) => "L1ctlDataInd",
            SapMsgInner::L1ctlDataConf(_) => "L1ctlDataConf",
            SapMsgInner::L1ctlRachConf(_) => "L1ctlRachConf",
            SapMsgInner::L1ctlFbsbConf(_) => "L1ctlFbsbConf",
            SapMsgInner::L1ctlPmConf(_) => "L1ctlPmConf",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct SapMsg {
    pub sap: Sap,
    pub src: TrxconEntity,
    pub dest: TrxconEntity,
    /// Frame number at the time the message was created
    pub fn_: u32,
    pub msg: SapMsgInner,
}

impl SapMsg {
    pub fn new(sap: Sap, src: TrxconEntity, dest: TrxconEntity, fn_: u32, msg: SapMsgInner) -> Self {
        Self { sap, src, dest, fn_, msg }
    }

    pub fn get_source(&self) -> &TrxconEntity {
        &self.src
    }
    pub fn get_dest(&self) -> &TrxconEntity {
        &self.dest
    }
    pub fn get_sap(&self) -> &Sap {
        &self.sap
    }
}
