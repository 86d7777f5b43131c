//! Resource and data source handlers
//!
//! Every managed resource implements `ManagedResource`, every data source
//! implements `DataSource`. The provider dispatches core operations to them
//! by type name. This module also holds the error and model helpers the
//! handlers share.

use std::collections::HashMap;
use std::fmt::Display;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use stackit_core::identifier::{build_internal_id, parse_import_id};
use stackit_core::provider::{ProviderError, ProviderResult, ResourceKind, ResourceType};
use stackit_core::resource::{
    Resource, ResourceId, State, Value, decode_attributes, encode_attributes,
};
use stackit_core::schema::ResourceSchema;

use crate::client::{ApiError, describe_lookup_error};
use crate::wait::WaitError;

#[async_trait]
pub trait ManagedResource: Send + Sync {
    /// Type name without the `stackit_` prefix
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    /// Names of the composite identifier parts, in order
    fn id_fields(&self) -> &'static [&'static str];

    /// Beta resources are only served once beta resources are enabled
    fn is_beta(&self) -> bool {
        false
    }

    async fn create(&self, resource: &Resource) -> ProviderResult<State>;

    /// Returns `State::not_found` when the remote object is gone
    async fn read(&self, current: &State) -> ProviderResult<State>;

    async fn update(&self, from: &State, to: &Resource) -> ProviderResult<State>;

    async fn delete(&self, current: &State) -> ProviderResult<()>;

    /// Seed a state holding only the scoping attributes
    fn import(&self, id: &ResourceId, import_id: &str) -> ProviderResult<State> {
        let parts = parse_import_id(import_id, self.id_fields()).map_err(|e| {
            ProviderError::configuration(format!("Error importing {}", self.type_name()), e.to_string())
                .for_resource(id.clone())
        })?;
        let attributes = self
            .id_fields()
            .iter()
            .zip(parts)
            .map(|(field, part)| (field.to_string(), Value::String(part)))
            .collect();
        Ok(State::existing(id.clone(), attributes).with_identifier(import_id))
    }
}

#[async_trait]
pub trait DataSource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    async fn read(&self, config: &Resource) -> ProviderResult<State>;
}

/// Type description handed to the core
pub struct RegisteredType {
    name: &'static str,
    kind: ResourceKind,
    schema: ResourceSchema,
}

impl RegisteredType {
    pub fn new(name: &'static str, kind: ResourceKind, schema: ResourceSchema) -> Self {
        Self { name, kind, schema }
    }
}

impl ResourceType for RegisteredType {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn schema(&self) -> ResourceSchema {
        self.schema.clone()
    }
}

// =============================================================================
// Error helpers
// =============================================================================

pub fn calling_api(summary: &str, err: ApiError) -> ProviderError {
    ProviderError::api(summary, format!("Calling API: {}", err)).with_cause(err)
}

pub fn waiting(summary: &str, what: &str, err: WaitError) -> ProviderError {
    ProviderError::wait(summary, format!("{} waiting: {}", what, err)).with_cause(err)
}

pub fn processing(summary: &str, err: impl Display) -> ProviderError {
    ProviderError::mapping(summary, format!("Processing API payload: {}", err))
}

/// Data source lookup failure with a status-aware description
pub fn lookup_failed(
    summary: &str,
    err: ApiError,
    not_found: &str,
    by_status: &[(u16, String)],
) -> ProviderError {
    ProviderError::api(summary, describe_lookup_error(&err, not_found, by_status)).with_cause(err)
}

// =============================================================================
// Model helpers
// =============================================================================

/// Decode configured or stored attributes into a typed model
pub fn decode_model<M: DeserializeOwned>(
    summary: &str,
    id: &ResourceId,
    attributes: &HashMap<String, Value>,
) -> ProviderResult<M> {
    decode_attributes(attributes).map_err(|e| {
        ProviderError::configuration(summary, format!("Reading attributes: {}", e))
            .with_cause(e)
            .for_resource(id.clone())
    })
}

/// Build an existing state from a typed model and its identifier parts
pub fn model_state<M: Serialize, S: AsRef<str>>(
    summary: &str,
    id: &ResourceId,
    id_parts: &[S],
    model: &M,
) -> ProviderResult<State> {
    let identifier = build_internal_id(id_parts).map_err(|e| {
        ProviderError::mapping(summary, format!("Building identifier: {}", e))
            .for_resource(id.clone())
    })?;
    let attributes = encode_attributes(model).map_err(|e| {
        processing(summary, &e).with_cause(e).for_resource(id.clone())
    })?;
    Ok(State::existing(id.clone(), attributes).with_identifier(identifier))
}

/// Read a required scoping attribute from state
pub fn required_str<'a>(
    summary: &str,
    id: &ResourceId,
    attributes: &'a HashMap<String, Value>,
    key: &str,
) -> ProviderResult<&'a str> {
    attributes
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ProviderError::configuration(summary, format!("'{}' is not set", key))
                .for_resource(id.clone())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize)]
    struct Model {
        project_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    }

    #[test]
    fn model_state_sets_identifier() {
        let id = ResourceId::new("git_instance", "main");
        let model = Model {
            project_id: "p".to_string(),
            name: None,
        };
        let state = model_state("Error", &id, &["p", "i"], &model).unwrap();
        assert_eq!(state.identifier.as_deref(), Some("p,i"));
        assert!(state.exists);
        assert!(!state.attributes.contains_key("name"));
    }

    #[test]
    fn model_state_rejects_separator_in_part() {
        let id = ResourceId::new("git_instance", "main");
        let model = Model {
            project_id: "p".to_string(),
            name: None,
        };
        let err = model_state("Error", &id, &["p", "a,b"], &model).unwrap_err();
        assert_eq!(err.kind, stackit_core::provider::ErrorKind::Mapping);
    }

    #[test]
    fn required_str_reports_missing_key() {
        let id = ResourceId::new("git_instance", "main");
        let err = required_str("Error reading", &id, &HashMap::new(), "project_id").unwrap_err();
        assert!(err.to_string().contains("'project_id' is not set"));
    }
}
