//! Loading `main.json`

use std::path::Path;

use serde::Deserialize;
use stackit_core::provider::{Provider, ResourceKind};
use stackit_core::resource::{Resource, json_to_attributes};
use stackit_provider::ProviderConfig;
use stackit_state::BackendConfig;

/// Type names may be written with the host prefix
const TYPE_PREFIX: &str = "stackit_";

/// Contents of the configuration file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    resources: Vec<Block>,
    #[serde(default)]
    data: Vec<Block>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Block {
    #[serde(rename = "type")]
    resource_type: String,
    name: String,
    #[serde(default)]
    attributes: serde_json::Map<String, serde_json::Value>,
}

impl Block {
    fn to_resource(&self, read_only: bool) -> Resource {
        let mut resource = Resource::new(short_type_name(&self.resource_type), &self.name)
            .with_read_only(read_only);
        resource.attributes =
            json_to_attributes(&serde_json::Value::Object(self.attributes.clone()));
        resource
    }
}

/// `stackit_git_instance` and `git_instance` name the same type
pub fn short_type_name(resource_type: &str) -> &str {
    resource_type
        .strip_prefix(TYPE_PREFIX)
        .unwrap_or(resource_type)
}

impl Configuration {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::parse(&content).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
    }

    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Managed resources followed by data sources
    pub fn desired(&self) -> Vec<Resource> {
        self.resources
            .iter()
            .map(|b| b.to_resource(false))
            .chain(self.data.iter().map(|b| b.to_resource(true)))
            .collect()
    }

    /// Check every block against the provider's schema, collecting all problems
    pub fn validate(&self, provider: &dyn Provider) -> Result<(), String> {
        let mut problems = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for resource in self.desired() {
            let (kind, noun) = if resource.is_data_source() {
                (ResourceKind::DataSource, "data source")
            } else {
                (ResourceKind::Resource, "resource")
            };
            if !seen.insert((resource.id.clone(), resource.is_data_source())) {
                problems.push(format!("{}: declared more than once", resource.id));
                continue;
            }
            let Some(schema) = provider.schema(&resource.id.resource_type, kind) else {
                problems.push(format!(
                    "{}: unknown {} type {}{}",
                    resource.id,
                    noun,
                    TYPE_PREFIX,
                    resource.id.resource_type
                ));
                continue;
            };
            if let Err(errors) = schema.validate(&resource.attributes) {
                problems.extend(
                    errors
                        .into_iter()
                        .map(|e| format!("{}: {}", resource.id, e)),
                );
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(format!("Invalid configuration:\n  {}", problems.join("\n  ")))
        }
    }
}
