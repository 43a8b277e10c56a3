use core::fmt;
use std::sync::{Arc, RwLock};

use trxcon_core::arfcn::arfcn_to_band;
use trxcon_core::{A5Algo, MAX_A5_KEY_LEN};

/// Largest frame number advance we accept, beyond it bursts would be scheduled
/// further ahead than the clock skew tolerance
pub const MAX_FN_ADVANCE: u32 = 50;

/// Transceiver link configuration
#[derive(Debug, Clone)]
pub struct CfgTrx {
    /// Address our sockets bind to
    pub local_host: String,
    /// Address of the transceiver
    pub remote_host: String,
    /// Transceiver base port. The CLCK, CTRL and DATA sockets use base, base+1, base+2 on the
    /// transceiver side and base+100, base+101, base+102 locally.
    pub base_port: u16,
    /// Number of frames uplink bursts are scheduled ahead of the clock
    pub fn_advance: u32,
    /// Transmit power attenuation in dB, sent with every uplink burst
    pub tx_power_attenuation: u8,
    /// Take the clock from the CLCK socket. When false the clock is derived from received bursts.
    pub use_clck: bool,
}

impl Default for CfgTrx {
    fn default() -> Self {
        Self {
            local_host: "127.0.0.1".to_string(),
            remote_host: "127.0.0.1".to_string(),
            base_port: default_base_port(),
            fn_advance: default_fn_advance(),
            tx_power_attenuation: 0,
            use_clck: true,
        }
    }
}

#[inline]
fn default_base_port() -> u16 {
    6700
}

#[inline]
fn default_fn_advance() -> u32 {
    3
}

#[derive(Debug, Clone, Default)]
pub struct CfgCell {
    /// ARFCN to camp on, optionally with the PCS flag set
    pub band_arfcn: u16,
    /// Expected BSIC. Used for random access before the SCH is decoded, and checked against it.
    pub bsic: Option<u8>,
}

/// Static ciphering parameters, applied whenever a dedicated channel is activated. Meant for
/// testing against a transceiver replaying a ciphered capture.
#[derive(Debug, Clone)]
pub struct CfgCiphering {
    pub algo: A5Algo,
    pub key: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    PortRange(u16),
    FnAdvance(u32),
    UnknownBand(u16),
    Bsic(u8),
    CipherAlgo(A5Algo),
    CipherKeyLen(usize),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::PortRange(p) => write!(f, "base_port {} leaves no room for the +102 data port", p),
            ConfigError::FnAdvance(a) => write!(f, "fn_advance {} exceeds {}", a, MAX_FN_ADVANCE),
            ConfigError::UnknownBand(a) => write!(f, "band_arfcn {} does not belong to a known band", a),
            ConfigError::Bsic(b) => write!(f, "bsic {} exceeds 63", b),
            ConfigError::CipherAlgo(a) => write!(f, "unsupported ciphering algorithm {}", a),
            ConfigError::CipherKeyLen(l) => write!(f, "ciphering key of {} bytes, expected 8..={}", l, MAX_A5_KEY_LEN),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct StackConfig {
    pub debug_log: Option<String>,
    pub trx: CfgTrx,
    pub cell: CfgCell,
    pub ciphering: Option<CfgCiphering>,
}

impl StackConfig {
    pub fn new(band_arfcn: u16) -> Self {
        StackConfig {
            debug_log: None,
            trx: CfgTrx::default(),
            cell: CfgCell { band_arfcn, bsic: None },
            ciphering: None,
        }
    }

    /// Validate that all configuration fields are within range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trx.base_port.checked_add(102).is_none() {
            return Err(ConfigError::PortRange(self.trx.base_port));
        }
        if self.trx.fn_advance > MAX_FN_ADVANCE {
            return Err(ConfigError::FnAdvance(self.trx.fn_advance));
        }
        if arfcn_to_band(self.cell.band_arfcn).is_none() {
            return Err(ConfigError::UnknownBand(self.cell.band_arfcn));
        }
        if let Some(bsic) = self.cell.bsic {
            if bsic > 63 {
                return Err(ConfigError::Bsic(bsic));
            }
        }
        if let Some(ref c) = self.ciphering {
            // Only A5/0 and A5/1 are implemented
            if c.algo.0 > 1 {
                return Err(ConfigError::CipherAlgo(c.algo));
            }
            if c.algo.0 != 0 && (c.key.len() < 8 || c.key.len() > MAX_A5_KEY_LEN) {
                return Err(ConfigError::CipherKeyLen(c.key.len()));
            }
        }
        Ok(())
    }
}

/// Mutable runtime state, written by the entities as they learn about the cell.
#[derive(Debug, Clone, Default)]
pub struct StackState {
    /// ARFCN the transceiver is currently tuned to
    pub band_arfcn: u16,
    /// BSIC learned from the SCH
    pub bsic: Option<u8>,
    /// Timing advance in symbols
    pub ta: i8,
    /// Transmit power attenuation in dB
    pub tx_power: u8,
}

/// Global shared configuration: immutable config + mutable state.
#[derive(Clone)]
pub struct SharedConfig {
    /// Read-only configuration (immutable after construction).
    cfg: Arc<StackConfig>,
    /// Mutable state guarded with RwLock (write by the stack, read by others).
    state: Arc<RwLock<StackState>>,
}

impl SharedConfig {
    pub fn new(band_arfcn: u16) -> Self {
        Self::from_config(StackConfig::new(band_arfcn))
    }

    pub fn from_config(cfg: StackConfig) -> Self {
        let state = StackState {
            band_arfcn: cfg.cell.band_arfcn,
            tx_power: cfg.trx.tx_power_attenuation,
            ..Default::default()
        };
        Self::from_parts(cfg, state)
    }

    /// Panics on an invalid configuration, use `try_from_parts` for input from users.
    pub fn from_parts(cfg: StackConfig, state: StackState) -> Self {
        match Self::try_from_parts(cfg, state) {
            Ok(c) => c,
            Err(e) => panic!("Invalid stack configuration: {}", e),
        }
    }

    pub fn try_from_parts(cfg: StackConfig, state: StackState) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            cfg: Arc::new(cfg),
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Access immutable config.
    pub fn config(&self) -> Arc<StackConfig> {
        Arc::clone(&self.cfg)
    }

    /// Read guard for mutable state. A poisoned lock still yields the state.
    pub fn state_read(&self) -> std::sync::RwLockReadGuard<'_, StackState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Write guard for mutable state.
    pub fn state_write(&self) -> std::sync::RwLockWriteGuard<'_, StackState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}
