//! Core utilities for trxcon
//!
//! This crate provides the types shared by every part of the stack:
//! - TDMA frame number arithmetic and GsmTime
//! - Soft/hard bit helpers and bounds-checked burst buffers
//! - GSM channel configuration, channel mode and channel number types
//! - ARFCN to frequency conversion
//! - Logging setup and debug macros

pub mod arfcn;
pub mod bits;
pub mod debug;
pub mod gsm_types;
pub mod tdma;
pub mod trxcon_entities;

// Re-export commonly used items
pub use bits::{BurstBuf, SBit, UBit};
pub use gsm_types::*;
pub use tdma::{GSM_HYPERFRAME, GsmTime};
pub use trxcon_entities::{Sap, TrxconEntity};
