use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use toml::Value;
use trxcon_core::A5Algo;

use super::stack_config::{CfgCell, CfgCiphering, CfgTrx, SharedConfig, StackConfig, StackState};

/// Build `SharedConfig` from a TOML configuration file
pub fn from_toml_str(toml_str: &str) -> Result<SharedConfig, Box<dyn std::error::Error>> {
    let root: TomlConfigRoot = toml::from_str(toml_str)?;

    let expected_config_version = "0.1";
    if !root.config_version.eq(expected_config_version) {
        return Err(format!(
            "Unrecognized config_version: {}, expect {}",
            root.config_version, expected_config_version
        )
        .into());
    }
    if !root.extra.is_empty() {
        return Err(format!("Unrecognized top-level fields: {:?}", sorted_keys(&root.extra)).into());
    }
    if let Some(ref trx) = root.trx {
        if !trx.extra.is_empty() {
            return Err(format!("Unrecognized fields: trx::{:?}", sorted_keys(&trx.extra)).into());
        }
    }
    if !root.cell.extra.is_empty() {
        return Err(format!("Unrecognized fields: cell::{:?}", sorted_keys(&root.cell.extra)).into());
    }
    if let Some(ref c) = root.ciphering {
        if !c.extra.is_empty() {
            return Err(format!("Unrecognized fields: ciphering::{:?}", sorted_keys(&c.extra)).into());
        }
    }

    let mut cfg = StackConfig {
        debug_log: root.debug_log,
        trx: CfgTrx::default(),
        cell: CfgCell {
            band_arfcn: root.cell.band_arfcn,
            bsic: root.cell.bsic,
        },
        ciphering: None,
    };

    if let Some(trx) = root.trx {
        apply_trx_patch(&mut cfg.trx, trx);
    }

    if let Some(c) = root.ciphering {
        cfg.ciphering = Some(CfgCiphering {
            algo: A5Algo(c.algo),
            key: parse_hex_key(&c.key)?,
        });
    }

    let state = StackState {
        band_arfcn: cfg.cell.band_arfcn,
        tx_power: cfg.trx.tx_power_attenuation,
        ..Default::default()
    };

    Ok(SharedConfig::try_from_parts(cfg, state)?)
}

/// Build `SharedConfig` from any reader.
pub fn from_reader<R: Read>(reader: R) -> Result<SharedConfig, Box<dyn std::error::Error>> {
    let mut contents = String::new();
    let mut reader = BufReader::new(reader);
    reader.read_to_string(&mut contents)?;
    from_toml_str(&contents)
}

/// Build `SharedConfig` from a file path.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<SharedConfig, Box<dyn std::error::Error>> {
    let f = File::open(path)?;
    let r = BufReader::new(f);
    let cfg = from_reader(r)?;
    Ok(cfg)
}

fn apply_trx_patch(dst: &mut CfgTrx, src: TrxDto) {
    if let Some(v) = src.local_host {
        dst.local_host = v;
    }
    if let Some(v) = src.remote_host {
        dst.remote_host = v;
    }
    if let Some(v) = src.base_port {
        dst.base_port = v;
    }
    if let Some(v) = src.fn_advance {
        dst.fn_advance = v;
    }
    if let Some(v) = src.tx_power_attenuation {
        dst.tx_power_attenuation = v;
    }
    if let Some(v) = src.use_clck {
        dst.use_clck = v;
    }
}

/// Parses a key given as hex digits, optionally separated by spaces or colons
fn parse_hex_key(s: &str) -> Result<Vec<u8>, String> {
    let digits: String = s.chars().filter(|c| !c.is_whitespace() && *c != ':').collect();
    if !digits.is_ascii() {
        return Err(format!("ciphering key is not hex: {}", s));
    }
    if digits.len() % 2 != 0 {
        return Err(format!("ciphering key has an odd number of hex digits: {}", s));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|e| format!("invalid ciphering key {}: {}", s, e)))
        .collect()
}

fn sorted_keys(map: &HashMap<String, Value>) -> Vec<&str> {
    let mut v: Vec<&str> = map.keys().map(|s| s.as_str()).collect();
    v.sort_unstable();
    v
}

/// ----------------------- DTOs for input shape -----------------------

#[derive(Deserialize)]
struct TomlConfigRoot {
    config_version: String,
    debug_log: Option<String>,

    #[serde(default)]
    trx: Option<TrxDto>,

    cell: CellDto,

    #[serde(default)]
    ciphering: Option<CipheringDto>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct TrxDto {
    pub local_host: Option<String>,
    pub remote_host: Option<String>,
    pub base_port: Option<u16>,
    pub fn_advance: Option<u32>,
    pub tx_power_attenuation: Option<u8>,
    pub use_clck: Option<bool>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct CellDto {
    pub band_arfcn: u16,
    pub bsic: Option<u8>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct CipheringDto {
    pub algo: u8,
    #[serde(default)]
    pub key: String,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CONFIG: &str = r#"
config_version = "0.1"
debug_log = "/tmp/trxcon.log"

[trx]
local_host = "127.0.0.1"
remote_host = "192.168.1.20"
base_port = 5700
fn_advance = 2
tx_power_attenuation = 10

[cell]
band_arfcn = 871
bsic = 63

[ciphering]
algo = 1
key = "01:23:45:67:89:ab:cd:ef"
"#;

    #[test]
    fn test_full_config() {
        let shared = from_toml_str(FULL_CONFIG).expect("config should parse");
        let cfg = shared.config();
        assert_eq!(cfg.debug_log.as_deref(), Some("/tmp/trxcon.log"));
        assert_eq!(cfg.trx.remote_host, "192.168.1.20");
        assert_eq!(cfg.trx.base_port, 5700);
        assert_eq!(cfg.trx.fn_advance, 2);
        assert!(cfg.trx.use_clck);
        assert_eq!(cfg.cell.band_arfcn, 871);
        assert_eq!(cfg.cell.bsic, Some(63));
        let c = cfg.ciphering.as_ref().expect("ciphering section");
        assert_eq!(c.algo, A5Algo(1));
        assert_eq!(c.key, vec![0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef]);
        assert_eq!(shared.state_read().tx_power, 10);
    }

    #[test]
    fn test_minimal_config_defaults() {
        let shared = from_toml_str("config_version = \"0.1\"\n[cell]\nband_arfcn = 1\n").expect("config should parse");
        let cfg = shared.config();
        assert_eq!(cfg.trx.base_port, 6700);
        assert_eq!(cfg.trx.fn_advance, 3);
        assert!(cfg.ciphering.is_none());
        assert_eq!(shared.state_read().band_arfcn, 1);
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let err = from_toml_str("config_version = \"0.1\"\n[cell]\nband_arfcn = 1\nfoo = 2\n").err().expect("must fail");
        assert!(err.to_string().contains("cell::[\"foo\"]"), "{}", err);

        let err = from_toml_str("config_version = \"0.1\"\nbar = 1\n[cell]\nband_arfcn = 1\n").err().expect("must fail");
        assert!(err.to_string().contains("top-level"), "{}", err);
    }

    #[test]
    fn test_rejects_bad_version_and_values() {
        assert!(from_toml_str("config_version = \"0.5\"\n[cell]\nband_arfcn = 1\n").is_err());
        assert!(from_toml_str("config_version = \"0.1\"\n[cell]\nband_arfcn = 1100\n").is_err());
        assert!(from_toml_str("config_version = \"0.1\"\n[trx]\nfn_advance = 99\n[cell]\nband_arfcn = 1\n").is_err());
        assert!(parse_hex_key("abc").is_err());
        assert!(parse_hex_key("zz").is_err());
    }
}
