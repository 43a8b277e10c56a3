#![allow(dead_code)]

/// Primitives between scheduler and the L1CTL boundary
pub mod l1ctl;
pub mod sapmsg;
/// Transceiver control, clock and link events
pub mod trxc;
/// Transceiver burst data
pub mod trxd;

pub use sapmsg::*;
