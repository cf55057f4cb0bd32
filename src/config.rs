use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{VoucherError, VoucherResult};
use crate::types::ProgramId;

/// Environment variable that supplies the signing seed, taking precedence
/// over the `signer_seed` config field.
pub const SIGNER_SEED_ENV: &str = "VOUCHER_SIGNER_SEED";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    #[serde(default = "default_node_endpoint")]
    pub node_endpoint: String,
    /// Program the issued vouchers are scoped to.
    pub program_id: ProgramId,
    /// Hex-encoded seed for the voucher account. The `VOUCHER_SIGNER_SEED`
    /// environment variable overrides this field.
    #[serde(default)]
    pub signer_seed: Option<String>,
    #[serde(default = "default_inclusion_timeout_secs")]
    pub inclusion_timeout_secs: u64,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_node_endpoint() -> String {
    "ws://127.0.0.1:9944".to_string()
}

fn default_inclusion_timeout_secs() -> u64 {
    30
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            node_endpoint: default_node_endpoint(),
            program_id: ProgramId([0u8; 32]),
            signer_seed: None,
            inclusion_timeout_secs: default_inclusion_timeout_secs(),
        }
    }
}

impl ServiceConfig {
    pub fn load(path: &Path) -> VoucherResult<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|err| VoucherError::Config(format!("unable to parse config: {err}")))
    }

    pub fn save(&self, path: &Path) -> VoucherResult<()> {
        let encoded = toml::to_string_pretty(self)
            .map_err(|err| VoucherError::Config(format!("failed to encode config: {err}")))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, encoded)?;
        Ok(())
    }

    /// Resolves the signing seed, preferring the environment over the
    /// config file. Startup must fail when neither is present.
    pub fn resolve_seed(&self) -> VoucherResult<String> {
        if let Ok(seed) = env::var(SIGNER_SEED_ENV) {
            if !seed.trim().is_empty() {
                return Ok(seed);
            }
        }
        self.signer_seed.clone().ok_or_else(|| {
            VoucherError::Config(format!(
                "no signing seed: set {SIGNER_SEED_ENV} or the signer_seed config field"
            ))
        })
    }

    pub fn inclusion_timeout(&self) -> Duration {
        Duration::from_secs(self.inclusion_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_cover_omitted_fields() {
        let config: ServiceConfig =
            toml::from_str(&format!("program_id = \"0x{}\"", "bb".repeat(32))).unwrap();
        assert_eq!(config.listen, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.inclusion_timeout_secs, 30);
        assert!(config.signer_seed.is_none());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("config/service.toml");
        let mut config = ServiceConfig::default();
        config.program_id = format!("0x{}", "bb".repeat(32)).parse().unwrap();
        config.signer_seed = Some("11".repeat(32));
        config.save(&path).expect("save");

        let loaded = ServiceConfig::load(&path).expect("load");
        assert_eq!(loaded.program_id, config.program_id);
        assert_eq!(loaded.signer_seed, config.signer_seed);
    }

    #[test]
    fn resolve_seed_fails_without_any_source() {
        let config = ServiceConfig::default();
        // Only meaningful when the override variable is not exported.
        if env::var(SIGNER_SEED_ENV).is_err() {
            assert!(config.resolve_seed().is_err());
        }
    }

    #[test]
    fn resolve_seed_uses_config_field() {
        if env::var(SIGNER_SEED_ENV).is_ok() {
            return;
        }
        let mut config = ServiceConfig::default();
        config.signer_seed = Some("22".repeat(32));
        assert_eq!(config.resolve_seed().unwrap(), "22".repeat(32));
    }
}
