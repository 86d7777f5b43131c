use async_trait::async_trait;
use log::info;
use stackit_core::provider::ProviderResult;
use stackit_core::resource::{Resource, State};
use stackit_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::api::OpenSearchApi;
use super::parameters::parameters_type;
use super::resource::load_plan_name_and_version;
use super::{INSTANCE_TYPE, InstanceModel, map_fields};
use crate::client::ApiClient;
use crate::resources::{DataSource, decode_model, lookup_failed, model_state, processing, required_str};

const READ: &str = "Error reading instance";

pub struct InstanceDataSource {
    api: OpenSearchApi,
}

impl InstanceDataSource {
    pub fn new(client: ApiClient) -> Self {
        Self {
            api: OpenSearchApi::new(client),
        }
    }
}

#[async_trait]
impl DataSource for InstanceDataSource {
    fn type_name(&self) -> &'static str {
        INSTANCE_TYPE
    }

    fn schema(&self) -> ResourceSchema {
        let computed = [
            "name",
            "version",
            "plan_name",
            "plan_id",
            "cf_guid",
            "cf_space_guid",
            "cf_organization_guid",
            "dashboard_url",
            "image_url",
        ];
        computed
            .into_iter()
            .fold(
                ResourceSchema::new(INSTANCE_TYPE)
                    .with_description("OpenSearch instance data source schema.")
                    .attribute(AttributeSchema::new("project_id", types::uuid()).required())
                    .attribute(AttributeSchema::new("instance_id", types::uuid()).required())
                    .attribute(AttributeSchema::new("parameters", parameters_type()).computed()),
                |schema, name| schema.attribute(AttributeSchema::new(name, AttributeType::String).computed()),
            )
    }

    async fn read(&self, config: &Resource) -> ProviderResult<State> {
        let id = &config.id;
        let project_id = required_str(READ, id, &config.attributes, "project_id")?.to_string();
        let instance_id = required_str(READ, id, &config.attributes, "instance_id")?.to_string();
        let mut model: InstanceModel = decode_model(READ, id, &config.attributes)?;

        let instance = self
            .api
            .get_instance(&project_id, &instance_id)
            .await
            .map_err(|e| {
                lookup_failed(
                    READ,
                    e,
                    &format!(
                        "Instance with ID {:?} does not exist in project {:?}.",
                        instance_id, project_id
                    ),
                    &[
                        (
                            403,
                            format!("Project with ID {:?} not found or forbidden access", project_id),
                        ),
                        (410, format!("Instance {:?} is gone.", instance_id)),
                    ],
                )
                .for_resource(id.clone())
            })?;

        map_fields(&instance, &mut model)
            .map_err(|e| processing(READ, &e).with_cause(e).for_resource(id.clone()))?;
        load_plan_name_and_version(&self.api, READ, &mut model)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        info!(
            "OpenSearch instance read project_id={} instance_id={}",
            project_id, instance_id
        );
        model_state(READ, id, &[&project_id, &instance_id], &model)
    }
}
