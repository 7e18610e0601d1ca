//! Gateway settings, layered from defaults, an optional `gateway.toml`, and
//! `GOVERNANCE_GATEWAY_*` environment overrides via the `config` crate.

use std::num::NonZeroU32;

use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub port: u16,
    pub gate_block_threshold: f64,
    pub gate_transform_threshold: f64,
    pub audit_max_entries: usize,
    pub action_rate_limit_per_sec: NonZeroU32,
    pub action_rate_burst: NonZeroU32,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            port: 3000,
            gate_block_threshold: governance_core::constants::GATE_BLOCK_THRESHOLD,
            gate_transform_threshold: governance_core::constants::GATE_TRANSFORM_THRESHOLD,
            audit_max_entries: 100_000,
            action_rate_limit_per_sec: NonZeroU32::new(50).unwrap(),
            action_rate_burst: NonZeroU32::new(20).unwrap(),
        }
    }
}

impl GatewaySettings {
    /// Build from, in ascending priority: built-in defaults, an optional
    /// `gateway.toml` in the working directory, then `GOVERNANCE_GATEWAY_*`
    /// environment variables (double-underscore-nested, e.g.
    /// `GOVERNANCE_GATEWAY_PORT=8080`).
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = GatewaySettings::default();
        let built = Config::builder()
            .set_default("port", defaults.port)?
            .set_default("gate_block_threshold", defaults.gate_block_threshold)?
            .set_default("gate_transform_threshold", defaults.gate_transform_threshold)?
            .set_default("audit_max_entries", defaults.audit_max_entries as i64)?
            .set_default("action_rate_limit_per_sec", defaults.action_rate_limit_per_sec.get() as i64)?
            .set_default("action_rate_burst", defaults.action_rate_burst.get() as i64)?
            .add_source(File::with_name("gateway").required(false))
            .add_source(Environment::with_prefix("GOVERNANCE_GATEWAY"))
            .build()?;

        built.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_kernel_constants() {
        let settings = GatewaySettings::default();
        assert_eq!(settings.port, 3000);
        assert_eq!(
            settings.gate_block_threshold,
            governance_core::constants::GATE_BLOCK_THRESHOLD
        );
    }

    #[test]
    fn load_with_no_file_or_env_falls_back_to_defaults() {
        let settings = GatewaySettings::load().expect("settings should load from defaults alone");
        assert_eq!(settings.port, GatewaySettings::default().port);
    }
}
