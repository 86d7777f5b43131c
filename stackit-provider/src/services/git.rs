//! Git instances

use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use stackit_core::provider::{ProviderError, ProviderResult};
use stackit_core::resource::{Resource, State};
use stackit_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::client::{ApiClient, ApiError};
use crate::resources::{
    ManagedResource, calling_api, decode_model, model_state, processing, required_str, waiting,
};
use crate::sweep::{SweepCandidate, Sweepable};
use crate::wait::{WaitError, WaitHandler, WaitStatus};

pub const GIT_TYPE: &str = "git_instance";

const CREATE: &str = "Error creating git instance";
const READ: &str = "Error reading git instance";
const UPDATE: &str = "Error updating git instance";
const DELETE: &str = "Error deleting git instance";

const STATE_READY: &str = "Ready";
const STATE_ERROR: &str = "Error";
const STATE_DELETING: &str = "Deleting";

#[derive(Debug, Clone, Default, Deserialize)]
struct GitInstance {
    id: Option<String>,
    name: Option<String>,
    url: Option<String>,
    version: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ListInstancesResponse {
    #[serde(default)]
    instances: Vec<GitInstance>,
}

#[derive(Debug, Clone, Serialize)]
struct CreateInstancePayload<'a> {
    name: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitModel {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl GitModel {
    fn apply(&mut self, instance: &GitInstance) {
        if let Some(name) = &instance.name {
            self.name = name.clone();
        }
        self.url = instance.url.clone();
        self.version = instance.version.clone();
    }
}

pub struct GitResource {
    client: ApiClient,
    waiter: WaitHandler,
}

impl GitResource {
    pub fn new(client: ApiClient, waiter: WaitHandler) -> Self {
        Self { client, waiter }
    }

    fn instances_path(project_id: &str) -> String {
        format!("/v1beta/projects/{}/instances", project_id)
    }

    fn instance_path(project_id: &str, instance_id: &str) -> String {
        format!("/v1beta/projects/{}/instances/{}", project_id, instance_id)
    }

    async fn get(&self, project_id: &str, instance_id: &str) -> Result<GitInstance, ApiError> {
        self.client.get(&Self::instance_path(project_id, instance_id)).await
    }

    async fn wait_ready(&self, project_id: &str, instance_id: &str) -> Result<GitInstance, WaitError> {
        self.waiter
            .wait(&format!("git instance {} ready", instance_id), move || async move {
                let instance = self.get(project_id, instance_id).await?;
                match instance.state.as_deref() {
                    Some(STATE_READY) => Ok(WaitStatus::Done(instance)),
                    Some(STATE_ERROR) => Err(WaitError::Failed(format!(
                        "create failed for git instance with id {}",
                        instance_id
                    ))),
                    _ => Ok(WaitStatus::Pending),
                }
            })
            .await
    }

    async fn wait_gone(&self, project_id: &str, instance_id: &str) -> Result<(), WaitError> {
        self.waiter
            .wait(&format!("git instance {} gone", instance_id), move || async move {
                match self.get(project_id, instance_id).await {
                    Ok(_) => Ok(WaitStatus::Pending),
                    Err(e) if e.is_not_found_or_gone() => Ok(WaitStatus::Done(())),
                    Err(e) => Err(e.into()),
                }
            })
            .await
    }
}

#[async_trait]
impl ManagedResource for GitResource {
    fn type_name(&self) -> &'static str {
        GIT_TYPE
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(GIT_TYPE)
            .with_description("Git Instance resource schema.")
            .attribute(
                AttributeSchema::new("project_id", types::uuid())
                    .required()
                    .requires_replace()
                    .with_description("STACKIT project ID to which the git instance is associated."),
            )
            .attribute(
                AttributeSchema::new("name", types::non_empty_string())
                    .required()
                    .requires_replace()
                    .with_description("Unique name linked to the git instance."),
            )
            .attribute(
                AttributeSchema::new("instance_id", AttributeType::String)
                    .computed()
                    .with_description("ID linked to the git instance."),
            )
            .attribute(
                AttributeSchema::new("url", AttributeType::String)
                    .computed()
                    .with_description("Url linked to the git instance."),
            )
            .attribute(
                AttributeSchema::new("version", AttributeType::String)
                    .computed()
                    .with_description("Version linked to the git instance."),
            )
    }

    fn id_fields(&self) -> &'static [&'static str] {
        &["project_id", "instance_id"]
    }

    async fn create(&self, resource: &Resource) -> ProviderResult<State> {
        let id = &resource.id;
        let mut model: GitModel = decode_model(CREATE, id, &resource.attributes)?;

        let created: GitInstance = self
            .client
            .post(
                &Self::instances_path(&model.project_id),
                &CreateInstancePayload { name: &model.name },
            )
            .await
            .map_err(|e| calling_api(CREATE, e).for_resource(id.clone()))?;
        let instance_id = created
            .id
            .ok_or_else(|| processing(CREATE, "git instance id not present").for_resource(id.clone()))?;

        let instance = self
            .wait_ready(&model.project_id, &instance_id)
            .await
            .map_err(|e| waiting(CREATE, "Git instance creation", e).for_resource(id.clone()))?;

        model.instance_id = Some(instance_id.clone());
        model.apply(&instance);

        info!(
            "Git instance created project_id={} instance_id={}",
            model.project_id, instance_id
        );
        model_state(CREATE, id, &[&model.project_id, &instance_id], &model)
    }

    async fn read(&self, current: &State) -> ProviderResult<State> {
        let id = &current.id;
        let mut model: GitModel = decode_model(READ, id, &current.attributes)?;
        let instance_id = required_str(READ, id, &current.attributes, "instance_id")?.to_string();

        let instance = match self.get(&model.project_id, &instance_id).await {
            Ok(instance) => instance,
            Err(e) if e.is_not_found_or_gone() => return Ok(State::not_found(id.clone())),
            Err(e) => return Err(calling_api(READ, e).for_resource(id.clone())),
        };
        model.apply(&instance);

        info!(
            "Git instance read project_id={} instance_id={}",
            model.project_id, instance_id
        );
        model_state(READ, id, &[&model.project_id, &instance_id], &model)
    }

    async fn update(&self, _from: &State, to: &Resource) -> ProviderResult<State> {
        Err(ProviderError::configuration(
            UPDATE,
            "Git instances cannot be updated in place; changing project_id or name replaces the instance",
        )
        .for_resource(to.id.clone()))
    }

    async fn delete(&self, current: &State) -> ProviderResult<()> {
        let id = &current.id;
        let project_id = required_str(DELETE, id, &current.attributes, "project_id")?;
        let instance_id = required_str(DELETE, id, &current.attributes, "instance_id")?;

        match self
            .client
            .delete(&Self::instance_path(project_id, instance_id))
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found_or_gone() => {}
            Err(e) => return Err(calling_api(DELETE, e).for_resource(id.clone())),
        }
        self.wait_gone(project_id, instance_id)
            .await
            .map_err(|e| waiting(DELETE, "Git instance deletion", e).for_resource(id.clone()))?;

        info!(
            "Git instance deleted project_id={} instance_id={}",
            project_id, instance_id
        );
        Ok(())
    }
}

#[async_trait]
impl Sweepable for GitResource {
    fn kind(&self) -> &'static str {
        "git instance"
    }

    async fn list_candidates(&self, project_id: &str) -> Result<Vec<SweepCandidate>, ApiError> {
        let response: ListInstancesResponse =
            self.client.get(&Self::instances_path(project_id)).await?;
        Ok(response
            .instances
            .into_iter()
            .filter_map(|i| {
                let deleting = i.state.as_deref() == Some(STATE_DELETING);
                i.id.map(|id| SweepCandidate { id, deleting })
            })
            .collect())
    }

    async fn delete_candidate(&self, project_id: &str, instance_id: &str) -> Result<(), ApiError> {
        self.client
            .delete(&Self::instance_path(project_id, instance_id))
            .await
    }

    async fn wait_deleted(&self, project_id: &str, instance_id: &str) -> Result<(), WaitError> {
        self.wait_gone(project_id, instance_id).await
    }
}
