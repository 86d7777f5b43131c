//! Provider configuration
//!
//! Settings come from the `provider` block of the configuration file and are
//! completed from `STACKIT_*` environment variables.

use std::collections::HashMap;
use std::time::Duration;

use log::warn;
use serde::Deserialize;

pub const DEFAULT_REGION: &str = "eu01";

const ENV_TOKEN: &str = "STACKIT_SERVICE_ACCOUNT_TOKEN";
const ENV_REGION: &str = "STACKIT_REGION";
pub const ENV_ENABLE_BETA: &str = "STACKIT_ENABLE_BETA_RESOURCES";

/// Platform services with their own API endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    OpenSearch,
    ServiceAccount,
    Dns,
    Iaas,
    Ske,
    SqlServerFlex,
    Git,
    ResourceManager,
}

impl Service {
    pub const ALL: [Service; 8] = [
        Service::OpenSearch,
        Service::ServiceAccount,
        Service::Dns,
        Service::Iaas,
        Service::Ske,
        Service::SqlServerFlex,
        Service::Git,
        Service::ResourceManager,
    ];

    /// Key used in the `custom_endpoints` map of the configuration
    pub fn key(&self) -> &'static str {
        match self {
            Service::OpenSearch => "opensearch",
            Service::ServiceAccount => "service_account",
            Service::Dns => "dns",
            Service::Iaas => "iaas",
            Service::Ske => "ske",
            Service::SqlServerFlex => "sqlserverflex",
            Service::Git => "git",
            Service::ResourceManager => "resourcemanager",
        }
    }

    /// Environment variable overriding the endpoint
    pub fn env_var(&self) -> String {
        format!("STACKIT_{}_CUSTOM_ENDPOINT", self.key().to_uppercase())
    }

    fn default_endpoint(&self, region: &str) -> String {
        match self {
            Service::OpenSearch => format!("https://opensearch.api.{}.stackit.cloud", region),
            Service::ServiceAccount => "https://service-account.api.stackit.cloud".to_string(),
            Service::Dns => "https://dns.api.stackit.cloud".to_string(),
            Service::Iaas => format!("https://iaas.api.{}.stackit.cloud", region),
            Service::Ske => "https://ske.api.stackit.cloud".to_string(),
            Service::SqlServerFlex => "https://sqlserverflex.api.stackit.cloud".to_string(),
            Service::Git => "https://git.api.stackit.cloud".to_string(),
            Service::ResourceManager => "https://resource-manager.api.stackit.cloud".to_string(),
        }
    }
}

/// Polling behaviour of convergence waits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub poll_interval: Duration,
    pub timeout: Duration,
    /// Consecutive 502/503/504 responses tolerated while polling
    pub transient_retries: u32,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(45 * 60),
            transient_retries: 5,
        }
    }
}

/// Raw `provider` block
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    pub service_account_token: Option<String>,
    pub region: Option<String>,
    /// Service key (e.g. "opensearch") to base URL
    pub custom_endpoints: HashMap<String, String>,
    pub enable_beta_resources: Option<bool>,
    pub wait_poll_interval_secs: Option<u64>,
    pub wait_timeout_secs: Option<u64>,
}

/// Configuration with environment fallbacks applied
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub service_account_token: Option<String>,
    pub region: String,
    pub endpoints: HashMap<Service, String>,
    pub enable_beta_resources: Option<bool>,
    /// Raw value of the beta environment variable, evaluated by the beta gate
    pub beta_env: Option<String>,
    pub wait: WaitConfig,
}

impl ProviderConfig {
    /// Resolve against the process environment
    pub fn resolve(self) -> ResolvedConfig {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve against an arbitrary environment lookup
    pub fn resolve_with(self, env: impl Fn(&str) -> Option<String>) -> ResolvedConfig {
        let region = self
            .region
            .filter(|r| !r.is_empty())
            .or_else(|| env(ENV_REGION).filter(|r| !r.is_empty()))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        for key in self.custom_endpoints.keys() {
            if !Service::ALL.iter().any(|s| s.key() == key) {
                warn!("ignoring custom endpoint for unknown service '{}'", key);
            }
        }

        let endpoints = Service::ALL
            .iter()
            .map(|service| {
                let url = self
                    .custom_endpoints
                    .get(service.key())
                    .cloned()
                    .or_else(|| env(&service.env_var()))
                    .unwrap_or_else(|| service.default_endpoint(&region));
                (*service, url.trim_end_matches('/').to_string())
            })
            .collect();

        let defaults = WaitConfig::default();
        let wait = WaitConfig {
            poll_interval: self
                .wait_poll_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            timeout: self
                .wait_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            transient_retries: defaults.transient_retries,
        };

        ResolvedConfig {
            service_account_token: self
                .service_account_token
                .or_else(|| env(ENV_TOKEN)),
            region,
            endpoints,
            enable_beta_resources: self.enable_beta_resources,
            beta_env: env(ENV_ENABLE_BETA),
            wait,
        }
    }
}

impl ResolvedConfig {
    pub fn endpoint(&self, service: Service) -> &str {
        self.endpoints
            .get(&service)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Point every service at one base URL, as a mock server does in tests
    pub fn with_single_endpoint(mut self, base_url: &str) -> Self {
        for service in Service::ALL {
            self.endpoints
                .insert(service, base_url.trim_end_matches('/').to_string());
        }
        self
    }

    pub fn with_wait(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let resolved = ProviderConfig::default().resolve_with(env_of(&[]));
        assert_eq!(resolved.region, "eu01");
        assert_eq!(
            resolved.endpoint(Service::OpenSearch),
            "https://opensearch.api.eu01.stackit.cloud"
        );
        assert_eq!(resolved.wait, WaitConfig::default());
        assert!(resolved.service_account_token.is_none());
    }

    #[test]
    fn config_wins_over_env_for_endpoints() {
        let config = ProviderConfig {
            custom_endpoints: HashMap::from([(
                "dns".to_string(),
                "http://localhost:9000/".to_string(),
            )]),
            ..Default::default()
        };
        let resolved = config.resolve_with(env_of(&[
            ("STACKIT_DNS_CUSTOM_ENDPOINT", "http://env"),
            ("STACKIT_GIT_CUSTOM_ENDPOINT", "http://git-env"),
        ]));
        assert_eq!(resolved.endpoint(Service::Dns), "http://localhost:9000");
        assert_eq!(resolved.endpoint(Service::Git), "http://git-env");
    }

    #[test]
    fn region_from_env_is_substituted() {
        let resolved = ProviderConfig::default().resolve_with(env_of(&[
            ("STACKIT_REGION", "eu02"),
            ("STACKIT_SERVICE_ACCOUNT_TOKEN", "token"),
        ]));
        assert_eq!(resolved.region, "eu02");
        assert_eq!(
            resolved.endpoint(Service::Iaas),
            "https://iaas.api.eu02.stackit.cloud"
        );
        assert_eq!(resolved.service_account_token.as_deref(), Some("token"));
    }

    #[test]
    fn env_var_names() {
        assert_eq!(
            Service::SqlServerFlex.env_var(),
            "STACKIT_SQLSERVERFLEX_CUSTOM_ENDPOINT"
        );
    }

    #[test]
    fn deserializes_provider_block() {
        let config: ProviderConfig = serde_json::from_value(serde_json::json!({
            "region": "eu01",
            "enable_beta_resources": true,
            "wait_poll_interval_secs": 1
        }))
        .unwrap();
        assert_eq!(config.enable_beta_resources, Some(true));
        let resolved = config.resolve_with(env_of(&[]));
        assert_eq!(resolved.wait.poll_interval, Duration::from_secs(1));
    }
}
