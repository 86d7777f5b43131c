//! Opt-in for beta resources
//!
//! Beta resources are only usable once enabled in the provider block or via
//! `STACKIT_ENABLE_BETA_RESOURCES`. The environment variable wins over the
//! configuration. The decision is made once per provider instance.

use std::sync::OnceLock;

use log::warn;
use stackit_core::provider::{ProviderError, ProviderResult};

use crate::config::ENV_ENABLE_BETA;

#[derive(Debug, Default)]
pub struct BetaGate {
    configured: Option<bool>,
    env: Option<String>,
    enabled: OnceLock<bool>,
}

impl BetaGate {
    pub fn new(configured: Option<bool>, env: Option<String>) -> Self {
        Self {
            configured,
            env,
            enabled: OnceLock::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        *self.enabled.get_or_init(|| {
            if let Some(raw) = &self.env {
                match raw.trim().to_ascii_lowercase().as_str() {
                    "true" => return true,
                    "false" => return false,
                    other => warn!(
                        "{} has invalid value {:?}, expected \"true\" or \"false\"; falling back to the provider configuration",
                        ENV_ENABLE_BETA, other
                    ),
                }
            }
            self.configured.unwrap_or(false)
        })
    }

    /// Fail unless beta resources are enabled
    pub fn check(&self, resource_type: &str) -> ProviderResult<()> {
        if self.enabled() {
            warn!(
                "stackit_{} is in beta and may change without notice",
                resource_type
            );
            Ok(())
        } else {
            Err(ProviderError::configuration(
                format!("stackit_{} is in beta", resource_type),
                format!(
                    "beta resources must be enabled explicitly: set enable_beta_resources = true in the provider block or {}=true",
                    ENV_ENABLE_BETA
                ),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_by_default() {
        let gate = BetaGate::default();
        assert!(!gate.enabled());
        assert!(gate.check("service_account_key").is_err());
    }

    #[test]
    fn env_overrides_config() {
        assert!(!BetaGate::new(Some(true), Some("false".to_string())).enabled());
        assert!(BetaGate::new(Some(false), Some("TRUE".to_string())).enabled());
    }

    #[test]
    fn invalid_env_falls_back_to_config() {
        assert!(BetaGate::new(Some(true), Some("yes please".to_string())).enabled());
        assert!(!BetaGate::new(None, Some("1".to_string())).enabled());
    }

    #[test]
    fn decision_is_cached() {
        let gate = BetaGate::new(Some(true), None);
        assert!(gate.enabled());
        assert!(gate.check("service_account_key").is_ok());
        assert!(gate.enabled.get().is_some());
    }
}
