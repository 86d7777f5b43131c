//! Provider - Trait abstracting resource operations
//!
//! A Provider exposes the resource and data source types of one platform and
//! performs the convergence operations (create, read, update, delete, import)
//! against it. The interpreter drives a Provider from a Plan.

use std::future::Future;
use std::pin::Pin;

use crate::resource::{Resource, ResourceId, State};
use crate::schema::ResourceSchema;

/// Category of a Provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration or an operation the resource does not support
    Configuration,
    /// Remote payload could not be mapped to or from the declarative model
    Mapping,
    /// The API call itself failed
    Api,
    /// Waiting for convergence failed or timed out
    Wait,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Mapping => "mapping",
            ErrorKind::Api => "api",
            ErrorKind::Wait => "wait",
        };
        f.write_str(s)
    }
}

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub kind: ErrorKind,
    /// Short description of the failed operation (e.g. "Error creating instance")
    pub summary: String,
    pub detail: String,
    pub resource_id: Option<ResourceId>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref id) = self.resource_id {
            write!(f, "[{}] ", id)?;
        }
        if self.detail.is_empty() {
            write!(f, "{}", self.summary)
        } else {
            write!(f, "{}: {}", self.summary, self.detail)
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(kind: ErrorKind, summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            summary: summary.into(),
            detail: detail.into(),
            resource_id: None,
            cause: None,
        }
    }

    pub fn configuration(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, summary, detail)
    }

    pub fn mapping(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Mapping, summary, detail)
    }

    pub fn api(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Api, summary, detail)
    }

    pub fn wait(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Wait, summary, detail)
    }

    pub fn for_resource(mut self, id: ResourceId) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Whether a type is managed or read-only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Resource,
    DataSource,
}

/// Definition of resource types that a Provider can handle
pub trait ResourceType: Send + Sync {
    /// Resource type name (e.g., "opensearch_instance")
    fn name(&self) -> &'static str;

    fn kind(&self) -> ResourceKind;

    /// Attribute schema for this resource type
    fn schema(&self) -> ResourceSchema;
}

/// Main Provider trait
///
/// All operations are async and involve side effects.
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "stackit")
    fn name(&self) -> &'static str;

    /// List of resource and data source types this Provider can handle
    fn resource_types(&self) -> Vec<Box<dyn ResourceType>>;

    /// Schema of a single type, if this Provider knows it
    fn schema(&self, resource_type: &str, kind: ResourceKind) -> Option<ResourceSchema> {
        self.resource_types()
            .into_iter()
            .find(|t| t.name() == resource_type && t.kind() == kind)
            .map(|t| t.schema())
    }

    /// Refresh a managed resource from its last known state
    ///
    /// Returns `State::not_found()` if the remote object is gone.
    fn read(&self, current: &State) -> BoxFuture<'_, ProviderResult<State>>;

    /// Look up a data source from its configured arguments
    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>>;

    /// Create a resource and wait until it is ready
    ///
    /// Returns State with identifier set to the composite internal ID
    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>>;

    /// Update a resource in place and wait until it converged
    fn update(&self, from: &State, to: &Resource) -> BoxFuture<'_, ProviderResult<State>>;

    /// Delete a resource and wait until it is gone
    fn delete(&self, current: &State) -> BoxFuture<'_, ProviderResult<()>>;

    /// Seed a state from an import identifier
    ///
    /// Only the scoping attributes are set; a following `read` fills the rest.
    fn import(&self, id: &ResourceId, import_id: &str) -> BoxFuture<'_, ProviderResult<State>>;
}

/// Provider implementation for Box<dyn Provider>
/// This enables dynamic dispatch for Providers
impl Provider for Box<dyn Provider> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        (**self).resource_types()
    }

    fn read(&self, current: &State) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).read(current)
    }

    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).read_data_source(resource)
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).create(resource)
    }

    fn update(&self, from: &State, to: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).update(from, to)
    }

    fn delete(&self, current: &State) -> BoxFuture<'_, ProviderResult<()>> {
        (**self).delete(current)
    }

    fn import(&self, id: &ResourceId, import_id: &str) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).import(id, import_id)
    }
}
