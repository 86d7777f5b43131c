//! SKE Kubernetes clusters

use std::collections::HashMap;

use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use stackit_core::provider::ProviderResult;
use stackit_core::resource::{Resource, State};
use stackit_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::client::ApiClient;
use crate::resources::{DataSource, decode_model, lookup_failed, model_state, required_str};
use crate::utils::region_with_override;

pub const CLUSTER_TYPE: &str = "ske_cluster";

const READ: &str = "Reading cluster";

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Cluster {
    kubernetes: Option<Kubernetes>,
    #[serde(default)]
    nodepools: Vec<Nodepool>,
    maintenance: Option<Maintenance>,
    network: Option<Network>,
    hibernation: Option<Hibernation>,
    extensions: Option<Extensions>,
    status: Option<ClusterStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Kubernetes {
    version: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Nodepool {
    name: Option<String>,
    machine: Option<Machine>,
    minimum: Option<i64>,
    maximum: Option<i64>,
    max_surge: Option<i64>,
    max_unavailable: Option<i64>,
    volume: Option<Volume>,
    labels: Option<HashMap<String, String>>,
    taints: Option<Vec<Taint>>,
    cri: Option<Cri>,
    availability_zones: Option<Vec<String>>,
    allow_system_components: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Machine {
    #[serde(rename = "type")]
    machine_type: Option<String>,
    image: Option<Image>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Image {
    name: Option<String>,
    version: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Volume {
    #[serde(rename = "type")]
    volume_type: Option<String>,
    size: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Taint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Cri {
    name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Maintenance {
    auto_update: Option<AutoUpdate>,
    time_window: Option<TimeWindow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AutoUpdate {
    kubernetes_version: Option<bool>,
    machine_image_version: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TimeWindow {
    start: Option<String>,
    end: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Network {
    id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Hibernation {
    #[serde(default)]
    schedules: Vec<HibernationSchedule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct HibernationSchedule {
    start: Option<String>,
    end: Option<String>,
    timezone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Extensions {
    acl: Option<AclExtension>,
    dns: Option<DnsExtension>,
    observability: Option<ObservabilityExtension>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AclExtension {
    enabled: Option<bool>,
    allowed_cidrs: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DnsExtension {
    enabled: Option<bool>,
    zones: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservabilityExtension {
    enabled: Option<bool>,
    instance_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClusterStatus {
    egress_address_ranges: Option<Vec<String>>,
    pod_address_ranges: Option<Vec<String>>,
}

// =============================================================================
// Model
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterModel {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_version_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub egress_address_ranges: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_address_ranges: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_pools: Option<Vec<NodePoolModel>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<MaintenanceModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hibernations: Option<Vec<HibernationModel>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionsModel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePoolModel {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_version_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_surge: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_unavailable: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taints: Option<Vec<Taint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zones: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_system_components: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceModel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_kubernetes_version_updates: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_machine_image_version_updates: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkModel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HibernationModel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtensionsModel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acl: Option<AclModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns: Option<DnsModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityModel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AclModel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_cidrs: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsModel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zones: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservabilityModel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

fn non_empty<T>(items: Option<Vec<T>>) -> Option<Vec<T>> {
    items.filter(|items| !items.is_empty())
}

impl NodePoolModel {
    fn from_wire(pool: Nodepool) -> Self {
        let machine = pool.machine.unwrap_or_default();
        let image = machine.image.unwrap_or_default();
        let volume = pool.volume.unwrap_or_default();
        Self {
            name: pool.name.unwrap_or_default(),
            machine_type: machine.machine_type,
            os_name: image.name,
            os_version_used: image.version,
            minimum: pool.minimum,
            maximum: pool.maximum,
            max_surge: pool.max_surge,
            max_unavailable: pool.max_unavailable,
            volume_type: volume.volume_type,
            volume_size: volume.size,
            labels: pool.labels.filter(|labels| !labels.is_empty()),
            taints: non_empty(pool.taints),
            cri: pool.cri.and_then(|cri| cri.name),
            availability_zones: non_empty(pool.availability_zones),
            allow_system_components: pool.allow_system_components,
        }
    }
}

impl ClusterModel {
    fn apply(&mut self, cluster: Cluster, region: &str) {
        self.region = Some(region.to_string());
        self.kubernetes_version_used = cluster.kubernetes.and_then(|k| k.version);

        let status = cluster.status.unwrap_or_default();
        self.egress_address_ranges = non_empty(status.egress_address_ranges);
        self.pod_address_ranges = non_empty(status.pod_address_ranges);

        self.node_pools = non_empty(Some(
            cluster
                .nodepools
                .into_iter()
                .map(NodePoolModel::from_wire)
                .collect(),
        ));

        self.maintenance = cluster.maintenance.map(|m| {
            let auto_update = m.auto_update.unwrap_or_default();
            let window = m.time_window.unwrap_or_default();
            MaintenanceModel {
                enable_kubernetes_version_updates: auto_update.kubernetes_version,
                enable_machine_image_version_updates: auto_update.machine_image_version,
                start: window.start,
                end: window.end,
            }
        });

        self.network = cluster
            .network
            .and_then(|n| n.id)
            .map(|id| NetworkModel { id: Some(id) });

        self.hibernations = cluster.hibernation.and_then(|h| {
            non_empty(Some(
                h.schedules
                    .into_iter()
                    .map(|s| HibernationModel {
                        start: s.start,
                        end: s.end,
                        timezone: s.timezone,
                    })
                    .collect(),
            ))
        });

        self.extensions = cluster.extensions.map(|e| ExtensionsModel {
            acl: e.acl.map(|acl| AclModel {
                enabled: acl.enabled,
                allowed_cidrs: acl.allowed_cidrs,
            }),
            dns: e.dns.map(|dns| DnsModel {
                enabled: dns.enabled,
                zones: dns.zones,
            }),
            observability: e.observability.map(|o| ObservabilityModel {
                enabled: o.enabled,
                instance_id: o.instance_id,
            }),
        });
    }
}

pub struct ClusterDataSource {
    client: ApiClient,
    default_region: String,
}

impl ClusterDataSource {
    pub fn new(client: ApiClient, default_region: impl Into<String>) -> Self {
        Self {
            client,
            default_region: default_region.into(),
        }
    }
}

fn computed(name: &str, attr_type: AttributeType) -> AttributeSchema {
    AttributeSchema::new(name, attr_type).computed()
}

fn computed_object(name: &str, fields: Vec<AttributeSchema>) -> AttributeSchema {
    computed(name, AttributeType::Object(fields))
}

fn computed_object_list(name: &str, fields: Vec<AttributeSchema>) -> AttributeSchema {
    computed(name, AttributeType::List(Box::new(AttributeType::Object(fields))))
}

#[async_trait]
impl DataSource for ClusterDataSource {
    fn type_name(&self) -> &'static str {
        CLUSTER_TYPE
    }

    fn schema(&self) -> ResourceSchema {
        let string = || AttributeType::String;
        let node_pool = vec![
            computed("name", string()).with_description("Specifies the name of the node pool."),
            computed("machine_type", string()).with_description("The machine type."),
            computed("os_name", string()).with_description("The name of the OS image."),
            computed("os_version_used", string()).with_description("Full OS image version used."),
            computed("minimum", AttributeType::Int).with_description("Minimum number of nodes in the pool."),
            computed("maximum", AttributeType::Int).with_description("Maximum number of nodes in the pool."),
            computed("max_surge", AttributeType::Int),
            computed("max_unavailable", AttributeType::Int),
            computed("volume_type", string()),
            computed("volume_size", AttributeType::Int).with_description("The volume size in GB."),
            computed("labels", types::labels()).with_description("Labels to add to each node."),
            computed_object_list(
                "taints",
                vec![
                    computed("effect", string()),
                    computed("key", string()),
                    computed("value", string()),
                ],
            ),
            computed("cri", string()).with_description("Specifies the container runtime."),
            computed("availability_zones", types::string_list()),
            computed("allow_system_components", AttributeType::Bool),
        ];

        ResourceSchema::new(CLUSTER_TYPE)
            .with_description("SKE Cluster data source schema. Must have a `region` specified in the provider configuration.")
            .attribute(
                AttributeSchema::new("project_id", types::uuid())
                    .required()
                    .with_description("STACKIT project ID to which the cluster is associated."),
            )
            .attribute(
                AttributeSchema::new("name", types::no_separator())
                    .required()
                    .with_description("The cluster name."),
            )
            .attribute(
                AttributeSchema::new("region", AttributeType::String)
                    .with_description("The resource region. If not defined, the provider region is used."),
            )
            .attribute(computed("kubernetes_version_used", string()).with_description(
                "Full Kubernetes version used. For example, if `1.22` was selected, this value may result to `1.22.15`",
            ))
            .attribute(computed("egress_address_ranges", types::string_list()))
            .attribute(computed("pod_address_ranges", types::string_list()))
            .attribute(computed_object_list("node_pools", node_pool))
            .attribute(computed_object(
                "maintenance",
                vec![
                    computed("enable_kubernetes_version_updates", AttributeType::Bool),
                    computed("enable_machine_image_version_updates", AttributeType::Bool),
                    computed("start", string()),
                    computed("end", string()),
                ],
            ))
            .attribute(computed_object("network", vec![computed("id", string())]))
            .attribute(computed_object_list(
                "hibernations",
                vec![
                    computed("start", string()),
                    computed("end", string()),
                    computed("timezone", string()),
                ],
            ))
            .attribute(computed_object(
                "extensions",
                vec![
                    computed_object(
                        "acl",
                        vec![
                            computed("enabled", AttributeType::Bool),
                            computed("allowed_cidrs", types::string_list()),
                        ],
                    ),
                    computed_object(
                        "dns",
                        vec![
                            computed("enabled", AttributeType::Bool),
                            computed("zones", types::string_list()),
                        ],
                    ),
                    computed_object(
                        "observability",
                        vec![
                            computed("enabled", AttributeType::Bool),
                            computed("instance_id", string()),
                        ],
                    ),
                ],
            ))
    }

    async fn read(&self, config: &Resource) -> ProviderResult<State> {
        let id = &config.id;
        let project_id = required_str(READ, id, &config.attributes, "project_id")?.to_string();
        let name = required_str(READ, id, &config.attributes, "name")?.to_string();
        let mut model: ClusterModel = decode_model(READ, id, &config.attributes)?;
        let region = region_with_override(model.region.as_deref(), &self.default_region);

        let cluster: Cluster = self
            .client
            .get(&format!(
                "/v2/projects/{}/regions/{}/clusters/{}",
                project_id, region, name
            ))
            .await
            .map_err(|e| {
                lookup_failed(
                    READ,
                    e,
                    &format!(
                        "Cluster with name {:?} does not exist in project {:?}.",
                        name, project_id
                    ),
                    &[(
                        403,
                        format!("Project with ID {:?} not found or forbidden access", project_id),
                    )],
                )
                .for_resource(id.clone())
            })?;
        model.apply(cluster, &region);

        info!(
            "SKE cluster read project_id={} region={} name={}",
            project_id, region, name
        );
        model_state(READ, id, &[&project_id, &region, &name], &model)
    }
}
