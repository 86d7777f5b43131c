//! SQLServer Flex instances

use std::collections::HashMap;

use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use stackit_core::provider::ProviderResult;
use stackit_core::resource::{Resource, State};
use stackit_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::client::ApiClient;
use crate::conversion::MappingError;
use crate::resources::{
    DataSource, decode_model, lookup_failed, model_state, processing, required_str,
};
use crate::utils::{region_with_override, simplify_backup_schedule};

pub const INSTANCE_TYPE: &str = "sqlserverflex_instance";

const READ: &str = "Reading instance";
const PROCESS: &str = "Error reading instance";

#[derive(Debug, Clone, Deserialize)]
struct GetInstanceResponse {
    item: Option<Instance>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Instance {
    id: Option<String>,
    name: Option<String>,
    acl: Option<Acl>,
    backup_schedule: Option<String>,
    flavor: Option<Flavor>,
    replicas: Option<i64>,
    storage: Option<Storage>,
    version: Option<String>,
    /// Option values are strings on the wire, `retentionDays` included
    options: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Acl {
    items: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Flavor {
    id: Option<String>,
    description: Option<String>,
    cpu: Option<i64>,
    memory: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Storage {
    class: Option<String>,
    size: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceModel {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub instance_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acl: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_schedule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor: Option<FlavorModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<OptionsModel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlavorModel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ram: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageModel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsModel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_days: Option<i64>,
}

impl InstanceModel {
    fn apply(&mut self, instance: Instance, region: &str) -> Result<(), MappingError> {
        if let Some(instance_id) = instance.id.filter(|id| !id.is_empty()) {
            if self.instance_id.is_empty() {
                self.instance_id = instance_id;
            }
        }
        if self.instance_id.is_empty() {
            return Err(MappingError::Missing("instance id not present".to_string()));
        }

        self.region = Some(region.to_string());
        self.name = instance.name;
        self.acl = instance.acl.and_then(|acl| acl.items);
        // the API stores the schedule without leading zeros
        self.backup_schedule = instance
            .backup_schedule
            .map(|schedule| simplify_backup_schedule(&schedule));
        self.flavor = instance.flavor.map(|f| FlavorModel {
            id: f.id,
            description: f.description,
            cpu: f.cpu,
            ram: f.memory,
        });
        self.replicas = instance.replicas;
        self.storage = instance.storage.map(|s| StorageModel {
            class: s.class,
            size: s.size,
        });
        self.version = instance.version;
        self.options = instance.options.map(|options| options_model(&options)).transpose()?;
        Ok(())
    }
}

fn options_model(options: &HashMap<String, String>) -> Result<OptionsModel, MappingError> {
    let retention_days = options
        .get("retentionDays")
        .map(|days| {
            days.parse::<i64>().map_err(|_| MappingError::TypeMismatch {
                attribute: "options.retention_days".to_string(),
                found: "string",
                expected: "int64",
            })
        })
        .transpose()?;
    Ok(OptionsModel {
        edition: options.get("edition").cloned(),
        retention_days,
    })
}

pub struct InstanceDataSource {
    client: ApiClient,
    default_region: String,
}

impl InstanceDataSource {
    pub fn new(client: ApiClient, default_region: impl Into<String>) -> Self {
        Self {
            client,
            default_region: default_region.into(),
        }
    }
}

#[async_trait]
impl DataSource for InstanceDataSource {
    fn type_name(&self) -> &'static str {
        INSTANCE_TYPE
    }

    fn schema(&self) -> ResourceSchema {
        let computed = |name: &str, attr_type: AttributeType| AttributeSchema::new(name, attr_type).computed();

        ResourceSchema::new(INSTANCE_TYPE)
            .with_description("SQLServer Flex instance data source schema. Must have a `region` specified in the provider configuration.")
            .attribute(
                AttributeSchema::new("instance_id", types::uuid())
                    .required()
                    .with_description("ID of the SQLServer Flex instance."),
            )
            .attribute(
                AttributeSchema::new("project_id", types::uuid())
                    .required()
                    .with_description("STACKIT project ID to which the instance is associated."),
            )
            .attribute(
                AttributeSchema::new("region", AttributeType::String)
                    .with_description("The resource region. If not defined, the provider region is used."),
            )
            .attribute(computed("name", AttributeType::String).with_description("Instance name."))
            .attribute(
                computed("acl", types::string_list())
                    .with_description("The Access Control List (ACL) for the SQLServer Flex instance."),
            )
            .attribute(computed("backup_schedule", AttributeType::String).with_description(
                r#"The backup schedule. Should follow the cron scheduling system format (e.g. "0 0 * * *")."#,
            ))
            .attribute(computed(
                "flavor",
                AttributeType::Object(vec![
                    computed("id", AttributeType::String),
                    computed("description", AttributeType::String),
                    computed("cpu", AttributeType::Int),
                    computed("ram", AttributeType::Int),
                ]),
            ))
            .attribute(computed("replicas", AttributeType::Int))
            .attribute(computed(
                "storage",
                AttributeType::Object(vec![
                    computed("class", AttributeType::String),
                    computed("size", AttributeType::Int),
                ]),
            ))
            .attribute(computed("version", AttributeType::String))
            .attribute(
                computed(
                    "options",
                    AttributeType::Object(vec![
                        computed("edition", AttributeType::String),
                        computed("retention_days", AttributeType::Int),
                    ]),
                )
                .with_description("Custom parameters for the SQLServer Flex instance."),
            )
    }

    async fn read(&self, config: &Resource) -> ProviderResult<State> {
        let id = &config.id;
        let project_id = required_str(READ, id, &config.attributes, "project_id")?.to_string();
        let instance_id = required_str(READ, id, &config.attributes, "instance_id")?.to_string();
        let mut model: InstanceModel = decode_model(READ, id, &config.attributes)?;
        let region = region_with_override(model.region.as_deref(), &self.default_region);

        let response: GetInstanceResponse = self
            .client
            .get(&format!(
                "/v2/projects/{}/regions/{}/instances/{}",
                project_id, region, instance_id
            ))
            .await
            .map_err(|e| {
                lookup_failed(
                    READ,
                    e,
                    &format!(
                        "Instance with ID {:?} does not exist in project {:?}.",
                        instance_id, project_id
                    ),
                    &[(
                        403,
                        format!("Project with ID {:?} not found or forbidden access", project_id),
                    )],
                )
                .for_resource(id.clone())
            })?;

        let instance = response
            .item
            .ok_or_else(|| processing(PROCESS, "no instance provided").for_resource(id.clone()))?;
        model
            .apply(instance, &region)
            .map_err(|e| processing(PROCESS, &e).with_cause(e).for_resource(id.clone()))?;

        info!(
            "SQLServer Flex instance read project_id={} region={} instance_id={}",
            project_id, region, instance_id
        );
        model_state(READ, id, &[&project_id, &region, &instance_id], &model)
    }
}
