use async_trait::async_trait;
use log::info;
use serde_json::Map;
use stackit_core::provider::{ProviderError, ProviderResult};
use stackit_core::resource::{Resource, State};
use stackit_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::api::{CreateInstancePayload, OpenSearchApi, PartialUpdateInstancePayload};
use super::offerings::{resolve_plan_id, resolve_plan_name_and_version};
use super::parameters::{Parameters, parameters_type};
use super::{INSTANCE_TYPE, InstanceModel, map_fields, wait_for_deletion, wait_for_operation};
use crate::client::{ApiClient, ApiError};
use crate::resources::{
    ManagedResource, calling_api, decode_model, model_state, processing, required_str, waiting,
};
use crate::sweep::{SweepCandidate, Sweepable};
use crate::wait::{WaitError, WaitHandler};

const CREATE: &str = "Error creating instance";
const READ: &str = "Error reading instance";
const UPDATE: &str = "Error updating instance";
const DELETE: &str = "Error deleting instance";

pub(super) fn instance_schema() -> ResourceSchema {
    ResourceSchema::new(INSTANCE_TYPE)
        .with_description("OpenSearch instance resource schema.")
        .attribute(
            AttributeSchema::new("project_id", types::uuid())
                .required()
                .requires_replace()
                .with_description("STACKIT project ID to which the instance is associated."),
        )
        .attribute(
            AttributeSchema::new("instance_id", AttributeType::String)
                .computed()
                .with_description("ID of the OpenSearch instance."),
        )
        .attribute(
            AttributeSchema::new("name", types::non_empty_string())
                .required()
                .requires_replace()
                .with_description("Instance name."),
        )
        .attribute(
            AttributeSchema::new("version", AttributeType::String)
                .required()
                .with_description("The service version."),
        )
        .attribute(
            AttributeSchema::new("plan_name", AttributeType::String)
                .required()
                .with_description("The selected plan name."),
        )
        .attribute(
            AttributeSchema::new("parameters", parameters_type())
                .optional_computed()
                .with_description("Instance parameters."),
        )
        .attribute(AttributeSchema::new("plan_id", AttributeType::String).computed())
        .attribute(AttributeSchema::new("cf_guid", AttributeType::String).computed())
        .attribute(AttributeSchema::new("cf_space_guid", AttributeType::String).computed())
        .attribute(AttributeSchema::new("cf_organization_guid", AttributeType::String).computed())
        .attribute(AttributeSchema::new("dashboard_url", AttributeType::String).computed())
        .attribute(AttributeSchema::new("image_url", AttributeType::String).computed())
}

pub struct InstanceResource {
    api: OpenSearchApi,
    waiter: WaitHandler,
}

impl InstanceResource {
    pub fn new(client: ApiClient, waiter: WaitHandler) -> Self {
        Self {
            api: OpenSearchApi::new(client),
            waiter,
        }
    }

    async fn load_plan_id(&self, summary: &str, model: &InstanceModel) -> ProviderResult<String> {
        let offerings = self
            .api
            .list_offerings(&model.project_id)
            .await
            .map_err(|e| {
                ProviderError::api(summary, format!("Loading service plan: getting OpenSearch offerings: {}", e))
                    .with_cause(e)
            })?;
        resolve_plan_id(
            &offerings,
            model.version.as_deref().unwrap_or_default(),
            model.plan_name.as_deref().unwrap_or_default(),
        )
        .map_err(|e| {
            ProviderError::configuration(summary, format!("Loading service plan: {}", e)).with_cause(e)
        })
    }

    fn wire_parameters(summary: &str, model: &InstanceModel) -> ProviderResult<Map<String, serde_json::Value>> {
        match &model.parameters {
            None => Ok(Map::new()),
            Some(params) => Parameters::from_model(params)
                .map(|p| p.to_wire())
                .map_err(|e| {
                    ProviderError::configuration(summary, format!("Creating API payload: {}", e))
                        .with_cause(e)
                }),
        }
    }
}

/// Fill `plan_name` and `version` from the plan the instance runs on
pub(super) async fn load_plan_name_and_version(
    api: &OpenSearchApi,
    summary: &str,
    model: &mut InstanceModel,
) -> ProviderResult<()> {
    let plan_id = model.plan_id.clone().unwrap_or_default();
    let offerings = api.list_offerings(&model.project_id).await.map_err(|e| {
        ProviderError::api(
            summary,
            format!("Loading service plan details: getting OpenSearch offerings: {}", e),
        )
        .with_cause(e)
    })?;
    let (plan_name, version) = resolve_plan_name_and_version(&offerings, &plan_id).map_err(|e| {
        ProviderError::mapping(summary, format!("Loading service plan details: {}", e)).with_cause(e)
    })?;
    model.plan_name = Some(plan_name);
    model.version = Some(version);
    Ok(())
}

#[async_trait]
impl ManagedResource for InstanceResource {
    fn type_name(&self) -> &'static str {
        INSTANCE_TYPE
    }

    fn schema(&self) -> ResourceSchema {
        instance_schema()
    }

    fn id_fields(&self) -> &'static [&'static str] {
        &["project_id", "instance_id"]
    }

    async fn create(&self, resource: &Resource) -> ProviderResult<State> {
        let id = &resource.id;
        let mut model: InstanceModel = decode_model(CREATE, id, &resource.attributes)?;
        let project_id = model.project_id.clone();

        let plan_id = self
            .load_plan_id(CREATE, &model)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        let payload = CreateInstancePayload {
            instance_name: model.name.clone().unwrap_or_default(),
            parameters: Self::wire_parameters(CREATE, &model).map_err(|e| e.for_resource(id.clone()))?,
            plan_id,
        };

        let created = self
            .api
            .create_instance(&project_id, &payload)
            .await
            .map_err(|e| calling_api(CREATE, e).for_resource(id.clone()))?;
        let instance_id = created.instance_id.ok_or_else(|| {
            processing(CREATE, "instance id not present").for_resource(id.clone())
        })?;

        let instance = wait_for_operation(&self.api, &self.waiter, &project_id, &instance_id, "create")
            .await
            .map_err(|e| waiting(CREATE, "Instance creation", e).for_resource(id.clone()))?;

        model.instance_id = Some(instance_id.clone());
        map_fields(&instance, &mut model)
            .map_err(|e| processing(CREATE, &e).with_cause(e).for_resource(id.clone()))?;

        info!(
            "OpenSearch instance created project_id={} instance_id={}",
            project_id, instance_id
        );
        model_state(CREATE, id, &[&project_id, &instance_id], &model)
    }

    async fn read(&self, current: &State) -> ProviderResult<State> {
        let id = &current.id;
        let mut model: InstanceModel = decode_model(READ, id, &current.attributes)?;
        let project_id = model.project_id.clone();
        let instance_id = required_str(READ, id, &current.attributes, "instance_id")?.to_string();

        let instance = match self.api.get_instance(&project_id, &instance_id).await {
            Ok(instance) => instance,
            Err(e) if e.is_not_found_or_gone() => {
                info!(
                    "OpenSearch instance not found project_id={} instance_id={}",
                    project_id, instance_id
                );
                return Ok(State::not_found(id.clone()));
            }
            Err(e) => return Err(calling_api(READ, e).for_resource(id.clone())),
        };

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

    async fn update(&self, from: &State, to: &Resource) -> ProviderResult<State> {
        let id = &to.id;
        let instance_id = required_str(UPDATE, id, &from.attributes, "instance_id")?.to_string();
        let mut model: InstanceModel = decode_model(UPDATE, id, &to.attributes)?;
        let project_id = model.project_id.clone();

        let plan_id = self
            .load_plan_id(UPDATE, &model)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        let payload = PartialUpdateInstancePayload {
            parameters: Self::wire_parameters(UPDATE, &model).map_err(|e| e.for_resource(id.clone()))?,
            plan_id,
        };

        self.api
            .partial_update_instance(&project_id, &instance_id, &payload)
            .await
            .map_err(|e| calling_api(UPDATE, e).for_resource(id.clone()))?;

        let instance = wait_for_operation(&self.api, &self.waiter, &project_id, &instance_id, "update")
            .await
            .map_err(|e| waiting(UPDATE, "Instance update", e).for_resource(id.clone()))?;

        model.instance_id = Some(instance_id.clone());
        map_fields(&instance, &mut model)
            .map_err(|e| processing(UPDATE, &e).with_cause(e).for_resource(id.clone()))?;

        info!(
            "OpenSearch instance updated project_id={} instance_id={}",
            project_id, instance_id
        );
        model_state(UPDATE, id, &[&project_id, &instance_id], &model)
    }

    async fn delete(&self, current: &State) -> ProviderResult<()> {
        let id = &current.id;
        let project_id = required_str(DELETE, id, &current.attributes, "project_id")?;
        let instance_id = required_str(DELETE, id, &current.attributes, "instance_id")?;

        match self.api.delete_instance(project_id, instance_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found_or_gone() => {}
            Err(e) => return Err(calling_api(DELETE, e).for_resource(id.clone())),
        }

        wait_for_deletion(&self.api, &self.waiter, project_id, instance_id)
            .await
            .map_err(|e| waiting(DELETE, "Instance deletion", e).for_resource(id.clone()))?;

        info!(
            "OpenSearch instance deleted project_id={} instance_id={}",
            project_id, instance_id
        );
        Ok(())
    }
}

#[async_trait]
impl Sweepable for InstanceResource {
    fn kind(&self) -> &'static str {
        "opensearch instance"
    }

    async fn list_candidates(&self, project_id: &str) -> Result<Vec<SweepCandidate>, ApiError> {
        Ok(self
            .api
            .list_instances(project_id)
            .await?
            .into_iter()
            .filter_map(|instance| {
                let deleting = instance.last_operation_is("delete", "in progress");
                instance
                    .instance_id
                    .map(|id| SweepCandidate { id, deleting })
            })
            .collect())
    }

    async fn delete_candidate(&self, project_id: &str, instance_id: &str) -> Result<(), ApiError> {
        self.api.delete_instance(project_id, instance_id).await
    }

    async fn wait_deleted(&self, project_id: &str, instance_id: &str) -> Result<(), WaitError> {
        wait_for_deletion(&self.api, &self.waiter, project_id, instance_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use stackit_core::resource::{ResourceId, Value};
    use wiremock::matchers::{body_json, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::TokenAuth;
    use crate::config::WaitConfig;

    const PROJECT: &str = "2f0e4d2a-9a0e-4b8e-8a51-4c3f0a0a7b11";

    fn handler(server: &MockServer) -> InstanceResource {
        let client = ApiClient::new(
            reqwest::Client::new(),
            server.uri(),
            Arc::new(TokenAuth::new(Some("token".to_string()))),
        );
        InstanceResource::new(
            client,
            WaitHandler::new(WaitConfig {
                poll_interval: Duration::from_millis(1),
                timeout: Duration::from_secs(5),
                transient_retries: 2,
            }),
        )
    }

    async fn mount_offerings(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path(format!("/v1/projects/{}/offerings", PROJECT)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "offerings": [{
                    "name": "opensearch",
                    "version": "2",
                    "plans": [{"id": "plan-1", "name": "stackit-opensearch-single"}]
                }]
            })))
            .mount(server)
            .await;
    }

    fn desired() -> Resource {
        Resource::new(INSTANCE_TYPE, "search")
            .with_attribute("project_id", PROJECT)
            .with_attribute("name", "search")
            .with_attribute("version", "2")
            .with_attribute("plan_name", "stackit-opensearch-single")
            .with_attribute(
                "parameters",
                Value::Map(HashMap::from([(
                    "tls_protocols".to_string(),
                    Value::List(vec![Value::from("TLSv1.3")]),
                )])),
            )
    }

    #[test]
    fn schema_validates_configuration() {
        assert!(instance_schema().validate(&desired().attributes).is_ok());
        assert_eq!(instance_schema().replace_triggers(), vec!["name", "project_id"]);
    }

    #[tokio::test]
    async fn create_sends_wire_names_and_waits() {
        let server = MockServer::start().await;
        mount_offerings(&server).await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/projects/{}/instances", PROJECT)))
            .and(body_partial_json(json!({
                "instanceName": "search",
                "planId": "plan-1",
                "parameters": {"tls-protocols": ["TLSv1.3"]}
            })))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({"instanceId": "iid"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/projects/{}/instances/iid", PROJECT)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "instanceId": "iid",
                "name": "search",
                "planId": "plan-1",
                "dashboardUrl": "https://dashboard",
                "parameters": {"tls-protocols": ["TLSv1.3"], "enable_monitoring": false},
                "lastOperation": {"type": "create", "state": "succeeded"}
            })))
            .mount(&server)
            .await;

        let state = handler(&server).create(&desired()).await.unwrap();
        assert_eq!(state.identifier.as_deref(), Some(&*format!("{},iid", PROJECT)));
        assert_eq!(state.get_str("dashboard_url"), Some("https://dashboard"));
        assert_eq!(state.get_str("plan_id"), Some("plan-1"));
        match &state.attributes["parameters"] {
            Value::Map(params) => assert_eq!(params["enable_monitoring"], Value::Bool(false)),
            other => panic!("unexpected parameters {:?}", other),
        }
    }

    #[tokio::test]
    async fn create_fails_on_failed_operation() {
        let server = MockServer::start().await;
        mount_offerings(&server).await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({"instanceId": "iid"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/projects/{}/instances/iid", PROJECT)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "instanceId": "iid",
                "lastOperation": {"type": "create", "state": "failed", "description": "quota"}
            })))
            .mount(&server)
            .await;

        let err = handler(&server).create(&desired()).await.unwrap_err();
        assert_eq!(err.kind, stackit_core::provider::ErrorKind::Wait);
        assert!(err.to_string().contains("Instance creation waiting"));
    }

    #[tokio::test]
    async fn create_reports_unknown_plan() {
        let server = MockServer::start().await;
        mount_offerings(&server).await;

        let resource = desired().with_attribute("plan_name", "huge");
        let err = handler(&server).create(&resource).await.unwrap_err();
        assert!(err.to_string().contains("couldn't find plan_name 'huge'"));
        assert!(err.to_string().contains("- stackit-opensearch-single"));
    }

    #[tokio::test]
    async fn read_gone_instance_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&server)
            .await;

        let current = State::existing(
            ResourceId::new(INSTANCE_TYPE, "search"),
            HashMap::from([
                ("project_id".to_string(), Value::from(PROJECT)),
                ("instance_id".to_string(), Value::from("iid")),
            ]),
        );
        let state = handler(&server).read(&current).await.unwrap();
        assert!(!state.exists);
    }

    #[tokio::test]
    async fn delete_treats_missing_instance_as_deleted() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let current = State::existing(
            ResourceId::new(INSTANCE_TYPE, "search"),
            HashMap::from([
                ("project_id".to_string(), Value::from(PROJECT)),
                ("instance_id".to_string(), Value::from("iid")),
            ]),
        );
        handler(&server).delete(&current).await.unwrap();
    }

    #[tokio::test]
    async fn update_without_parameters_omits_the_field() {
        let server = MockServer::start().await;
        mount_offerings(&server).await;
        Mock::given(method("PATCH"))
            .and(path(format!("/v1/projects/{}/instances/iid", PROJECT)))
            .and(body_json(json!({"planId": "plan-1"})))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/projects/{}/instances/iid", PROJECT)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "instanceId": "iid",
                "name": "search",
                "planId": "plan-1",
                "lastOperation": {"type": "update", "state": "succeeded"}
            })))
            .mount(&server)
            .await;

        let current = State::existing(
            ResourceId::new(INSTANCE_TYPE, "search"),
            HashMap::from([
                ("project_id".to_string(), Value::from(PROJECT)),
                ("instance_id".to_string(), Value::from("iid")),
            ]),
        );
        let mut wanted = desired();
        wanted.attributes.remove("parameters");

        let state = handler(&server).update(&current, &wanted).await.unwrap();
        assert_eq!(state.get_str("instance_id"), Some("iid"));
    }

    #[test]
    fn create_payload_without_parameters_has_no_parameters_key() {
        let payload = CreateInstancePayload {
            instance_name: "search".to_string(),
            parameters: Map::new(),
            plan_id: "plan-1".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"instanceName": "search", "planId": "plan-1"})
        );
    }

    #[test]
    fn import_seeds_scoping_attributes() {
        let server_less = InstanceResource::new(
            ApiClient::new(
                reqwest::Client::new(),
                "http://localhost",
                Arc::new(TokenAuth::new(None)),
            ),
            WaitHandler::new(WaitConfig::default()),
        );
        let id = ResourceId::new(INSTANCE_TYPE, "search");
        let state = server_less.import(&id, &format!("{},iid", PROJECT)).unwrap();
        assert_eq!(state.get_str("instance_id"), Some("iid"));
        assert_eq!(state.get_str("project_id"), Some(PROJECT));

        assert!(server_less.import(&id, "only-one-part").is_err());
    }
}
