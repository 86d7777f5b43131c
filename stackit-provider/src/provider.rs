//! STACKIT provider
//!
//! Owns one REST client per service and routes the core operations to the
//! resource and data source handlers by type name.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use stackit_core::provider::{
    BoxFuture, Provider, ProviderError, ProviderResult, ResourceKind, ResourceType,
};
use stackit_core::resource::{Resource, ResourceId, State};

use crate::client::{ApiClient, Authenticator, TokenAuth};
use crate::config::{ResolvedConfig, Service};
use crate::features::BetaGate;
use crate::resources::{DataSource, ManagedResource, RegisteredType};
use crate::services::{dns, git, iaas, opensearch, resourcemanager, serviceaccount, ske, sqlserverflex};
use crate::sweep::Sweepable;
use crate::wait::WaitHandler;

const USER_AGENT: &str = concat!("stackit-provider/", env!("CARGO_PKG_VERSION"));

/// Upper bound for a single API request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// STACKIT provider
pub struct StackitProvider {
    resources: HashMap<&'static str, Arc<dyn ManagedResource>>,
    data_sources: HashMap<&'static str, Arc<dyn DataSource>>,
    sweepers: HashMap<&'static str, Arc<dyn Sweepable>>,
    beta: BetaGate,
    region: String,
}

impl StackitProvider {
    /// Configure the provider: one client per service endpoint
    pub fn new(config: ResolvedConfig) -> ProviderResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                ProviderError::configuration("Could not Configure API Client", e.to_string())
                    .with_cause(e)
            })?;
        let auth: Arc<dyn Authenticator> =
            Arc::new(TokenAuth::new(config.service_account_token.clone()));
        let client = |service: Service| {
            debug!("{} endpoint {}", service.key(), config.endpoint(service));
            ApiClient::new(http.clone(), config.endpoint(service), auth.clone())
        };
        let waiter = WaitHandler::new(config.wait);

        let opensearch_instance = Arc::new(opensearch::InstanceResource::new(
            client(Service::OpenSearch),
            waiter,
        ));
        let git_instance = Arc::new(git::GitResource::new(client(Service::Git), waiter));
        let project = Arc::new(resourcemanager::ProjectResource::new(
            client(Service::ResourceManager),
            waiter,
        ));
        let server = Arc::new(iaas::ServerResource::new(client(Service::Iaas), waiter));
        let key = Arc::new(serviceaccount::KeyResource::new(client(
            Service::ServiceAccount,
        )));

        let mut provider = Self {
            resources: HashMap::new(),
            data_sources: HashMap::new(),
            sweepers: HashMap::new(),
            beta: BetaGate::new(config.enable_beta_resources, config.beta_env.clone()),
            region: config.region.clone(),
        };

        provider.add_resource(opensearch_instance.clone());
        provider.add_resource(git_instance.clone());
        provider.add_resource(project.clone());
        provider.add_resource(server);
        provider.add_resource(key);

        provider.add_sweeper(opensearch::INSTANCE_TYPE, opensearch_instance);
        provider.add_sweeper(git::GIT_TYPE, git_instance);
        provider.add_sweeper(resourcemanager::PROJECT_TYPE, project);

        provider.add_data_source(Arc::new(opensearch::InstanceDataSource::new(client(
            Service::OpenSearch,
        ))));
        provider.add_data_source(Arc::new(dns::ZoneDataSource::new(client(Service::Dns))));
        provider.add_data_source(Arc::new(iaas::PublicIpDataSource::new(client(Service::Iaas))));
        provider.add_data_source(Arc::new(iaas::PublicIpRangesDataSource::new(client(
            Service::Iaas,
        ))));
        provider.add_data_source(Arc::new(iaas::NetworkAreaDataSource::new(client(
            Service::Iaas,
        ))));
        provider.add_data_source(Arc::new(ske::ClusterDataSource::new(
            client(Service::Ske),
            config.region.clone(),
        )));
        provider.add_data_source(Arc::new(sqlserverflex::InstanceDataSource::new(
            client(Service::SqlServerFlex),
            config.region.clone(),
        )));

        Ok(provider)
    }

    fn add_resource(&mut self, handler: Arc<dyn ManagedResource>) {
        self.resources.insert(handler.type_name(), handler);
    }

    fn add_data_source(&mut self, handler: Arc<dyn DataSource>) {
        self.data_sources.insert(handler.type_name(), handler);
    }

    fn add_sweeper(&mut self, resource_type: &'static str, sweeper: Arc<dyn Sweepable>) {
        self.sweepers.insert(resource_type, sweeper);
    }

    /// Default region for regional APIs
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Teardown sweeper for a resource type, if it has one
    pub fn sweeper(&self, resource_type: &str) -> Option<Arc<dyn Sweepable>> {
        self.sweepers.get(resource_type).cloned()
    }

    fn resource(&self, id: &ResourceId) -> ProviderResult<&Arc<dyn ManagedResource>> {
        let handler = self.resources.get(id.resource_type.as_str()).ok_or_else(|| {
            ProviderError::configuration(
                "Unknown resource type",
                format!("stackit_{} is not a resource of this provider", id.resource_type),
            )
            .for_resource(id.clone())
        })?;
        if handler.is_beta() {
            self.beta
                .check(handler.type_name())
                .map_err(|e| e.for_resource(id.clone()))?;
        }
        Ok(handler)
    }

    fn data_source(&self, id: &ResourceId) -> ProviderResult<&Arc<dyn DataSource>> {
        self.data_sources.get(id.resource_type.as_str()).ok_or_else(|| {
            ProviderError::configuration(
                "Unknown data source type",
                format!("stackit_{} is not a data source of this provider", id.resource_type),
            )
            .for_resource(id.clone())
        })
    }
}

impl Provider for StackitProvider {
    fn name(&self) -> &'static str {
        "stackit"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        let resources = self.resources.values().map(|r| {
            Box::new(RegisteredType::new(r.type_name(), ResourceKind::Resource, r.schema()))
                as Box<dyn ResourceType>
        });
        let data_sources = self.data_sources.values().map(|d| {
            Box::new(RegisteredType::new(d.type_name(), ResourceKind::DataSource, d.schema()))
                as Box<dyn ResourceType>
        });
        let mut types: Vec<Box<dyn ResourceType>> = resources.chain(data_sources).collect();
        types.sort_by_key(|t| (t.name(), t.kind() == ResourceKind::DataSource));
        types
    }

    fn read(&self, current: &State) -> BoxFuture<'_, ProviderResult<State>> {
        let current = current.clone();
        Box::pin(async move { self.resource(&current.id)?.read(&current).await })
    }

    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.data_source(&resource.id)?.read(&resource).await })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.resource(&resource.id)?.create(&resource).await })
    }

    fn update(&self, from: &State, to: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move { self.resource(&to.id)?.update(&from, &to).await })
    }

    fn delete(&self, current: &State) -> BoxFuture<'_, ProviderResult<()>> {
        let current = current.clone();
        Box::pin(async move { self.resource(&current.id)?.delete(&current).await })
    }

    fn import(&self, id: &ResourceId, import_id: &str) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let import_id = import_id.to_string();
        Box::pin(async move { self.resource(&id)?.import(&id, &import_id) })
    }
}
