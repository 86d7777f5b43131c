//! Resource manager projects

use std::collections::HashMap;

use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use stackit_core::provider::ProviderResult;
use stackit_core::resource::{Resource, State};
use stackit_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::client::{ApiClient, ApiError};
use crate::resources::{
    ManagedResource, calling_api, decode_model, model_state, processing, required_str, waiting,
};
use crate::sweep::{SweepCandidate, Sweepable};
use crate::utils::{LEGACY_PROJECT_ROLES, is_legacy_project_role, supported_values_documentation};
use crate::wait::{WaitError, WaitHandler, WaitStatus};

pub const PROJECT_TYPE: &str = "resourcemanager_project";

const CREATE: &str = "Error creating project";
const READ: &str = "Error reading project";
const UPDATE: &str = "Error updating project";
const DELETE: &str = "Error deleting project";

const OWNER_ROLE: &str = "owner";

const LIFECYCLE_CREATING: &str = "CREATING";
const LIFECYCLE_ACTIVE: &str = "ACTIVE";
const LIFECYCLE_DELETING: &str = "DELETING";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Project {
    container_id: Option<String>,
    project_id: Option<String>,
    name: Option<String>,
    labels: Option<HashMap<String, String>>,
    parent: Option<Parent>,
    lifecycle_state: Option<String>,
    creation_time: Option<String>,
    update_time: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Parent {
    container_id: Option<String>,
    id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ListProjectsResponse {
    #[serde(default)]
    items: Vec<Project>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub subject: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateProjectPayload<'a> {
    name: &'a str,
    container_parent_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<&'a HashMap<String, String>>,
    members: Vec<Member>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct PartialUpdateProjectPayload<'a> {
    name: &'a str,
    container_parent_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<&'a HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectModel {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent_container_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<Member>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl ProjectModel {
    /// Members sent on creation: the owner first, then configured members
    fn members(&self) -> Vec<Member> {
        let owner = self.owner_email.iter().map(|email| Member {
            subject: email.clone(),
            role: OWNER_ROLE.to_string(),
        });
        let configured = self.members.iter().flatten().cloned();
        let members: Vec<Member> = owner.chain(configured).collect();
        for member in &members {
            if is_legacy_project_role(&member.role) {
                warn!(
                    "member {} uses the legacy project role {}; use one of owner, editor, reader instead",
                    member.subject, member.role
                );
            }
        }
        members
    }

    fn apply(&mut self, project: &Project) {
        if let Some(name) = &project.name {
            self.name = name.clone();
        }
        self.container_id = project.container_id.clone().or(self.container_id.take());
        self.project_id = project.project_id.clone();
        self.creation_time = project.creation_time.clone();
        self.update_time = project.update_time.clone();

        // keep the configured form of the parent, which may be its container id or its UUID
        if let Some(parent) = &project.parent {
            let configured = &self.parent_container_id;
            let matches_configured = parent.container_id.as_ref() == Some(configured)
                || parent.id.as_ref() == Some(configured);
            if !matches_configured {
                if let Some(container_id) = &parent.container_id {
                    self.parent_container_id = container_id.clone();
                }
            }
        }

        self.labels = match (&project.labels, &self.labels) {
            (Some(labels), _) if !labels.is_empty() => Some(labels.clone()),
            (_, None) => None,
            _ => Some(HashMap::new()),
        };
    }
}

pub struct ProjectResource {
    client: ApiClient,
    waiter: WaitHandler,
}

impl ProjectResource {
    pub fn new(client: ApiClient, waiter: WaitHandler) -> Self {
        Self { client, waiter }
    }

    fn project_path(container_id: &str) -> String {
        format!("/v2/projects/{}", container_id)
    }

    async fn get(&self, container_id: &str) -> Result<Project, ApiError> {
        self.client.get(&Self::project_path(container_id)).await
    }

    async fn wait_active(&self, operation: &str, container_id: &str) -> Result<Project, WaitError> {
        self.waiter
            .wait(&format!("project {} active", container_id), move || async move {
                let project = self.get(container_id).await?;
                match project.lifecycle_state.as_deref() {
                    Some(LIFECYCLE_ACTIVE) => Ok(WaitStatus::Done(project)),
                    Some(LIFECYCLE_CREATING) | None => Ok(WaitStatus::Pending),
                    Some(other) => Err(WaitError::Failed(format!(
                        "{} project {}: lifecycle state is {}",
                        operation, container_id, other
                    ))),
                }
            })
            .await
    }

    /// A project is deleted once it is gone or its lifecycle reached DELETING
    async fn wait_gone(&self, container_id: &str) -> Result<(), WaitError> {
        self.waiter
            .wait(&format!("project {} deleted", container_id), move || async move {
                match self.get(container_id).await {
                    Err(e) if e.is_not_found_or_gone() => Ok(WaitStatus::Done(())),
                    Err(e) => Err(e.into()),
                    Ok(project) if project.lifecycle_state.as_deref() == Some(LIFECYCLE_DELETING) => {
                        Ok(WaitStatus::Done(()))
                    }
                    Ok(_) => Ok(WaitStatus::Pending),
                }
            })
            .await
    }
}

#[async_trait]
impl ManagedResource for ProjectResource {
    fn type_name(&self) -> &'static str {
        PROJECT_TYPE
    }

    fn schema(&self) -> ResourceSchema {
        let member_type = AttributeType::Object(vec![
            AttributeSchema::new("subject", AttributeType::String)
                .required()
                .with_description("Email address of the member."),
            AttributeSchema::new("role", types::non_empty_string())
                .required()
                .with_description(format!(
                    "Role of the member. Legacy roles are still accepted: {}",
                    supported_values_documentation(&LEGACY_PROJECT_ROLES)
                )),
        ]);

        ResourceSchema::new(PROJECT_TYPE)
            .with_description("Resource Manager project resource schema.")
            .attribute(
                AttributeSchema::new("name", types::non_empty_string())
                    .required()
                    .with_description("Project name."),
            )
            .attribute(
                AttributeSchema::new("parent_container_id", types::non_empty_string())
                    .required()
                    .with_description("Parent resource identifier. Both container ID (user-friendly) and UUID are supported."),
            )
            .attribute(
                AttributeSchema::new("owner_email", AttributeType::String)
                    .required()
                    .requires_replace()
                    .with_description("Email address of the owner of the project. This value is only considered during creation."),
            )
            .attribute(
                AttributeSchema::new("members", AttributeType::List(Box::new(member_type)))
                    .requires_replace()
                    .with_description("Additional members granted on creation."),
            )
            .attribute(
                AttributeSchema::new("labels", types::labels())
                    .with_description("Labels are key-value string pairs which can be attached to a resource container."),
            )
            .attribute(
                AttributeSchema::new("container_id", AttributeType::String)
                    .computed()
                    .with_description("Project container ID. Globally unique, user-friendly identifier."),
            )
            .attribute(
                AttributeSchema::new("project_id", AttributeType::String)
                    .computed()
                    .with_description("Project UUID identifier. This is the ID that can be used in most of the other resources to identify the project."),
            )
            .attribute(AttributeSchema::new("creation_time", AttributeType::String).computed())
            .attribute(AttributeSchema::new("update_time", AttributeType::String).computed())
    }

    fn id_fields(&self) -> &'static [&'static str] {
        &["container_id"]
    }

    async fn create(&self, resource: &Resource) -> ProviderResult<State> {
        let id = &resource.id;
        let mut model: ProjectModel = decode_model(CREATE, id, &resource.attributes)?;

        let payload = CreateProjectPayload {
            name: &model.name,
            container_parent_id: &model.parent_container_id,
            labels: model.labels.as_ref(),
            members: model.members(),
        };
        let created: Project = self
            .client
            .post("/v2/projects", &payload)
            .await
            .map_err(|e| calling_api(CREATE, e).for_resource(id.clone()))?;
        let container_id = created
            .container_id
            .ok_or_else(|| processing(CREATE, "container id not present").for_resource(id.clone()))?;

        let project = self
            .wait_active("creating", &container_id)
            .await
            .map_err(|e| waiting(CREATE, "Project creation", e).for_resource(id.clone()))?;
        model.container_id = Some(container_id.clone());
        model.apply(&project);

        info!("Project created container_id={}", container_id);
        model_state(CREATE, id, &[&container_id], &model)
    }

    async fn read(&self, current: &State) -> ProviderResult<State> {
        let id = &current.id;
        let mut model: ProjectModel = decode_model(READ, id, &current.attributes)?;
        let container_id = required_str(READ, id, &current.attributes, "container_id")?.to_string();

        let project = match self.get(&container_id).await {
            Ok(project) => project,
            Err(e) if e.is_not_found_or_gone() => return Ok(State::not_found(id.clone())),
            Err(e) => return Err(calling_api(READ, e).for_resource(id.clone())),
        };
        model.apply(&project);

        info!("Project read container_id={}", container_id);
        model_state(READ, id, &[&container_id], &model)
    }

    async fn update(&self, from: &State, to: &Resource) -> ProviderResult<State> {
        let id = &to.id;
        let container_id = required_str(UPDATE, id, &from.attributes, "container_id")?.to_string();
        let mut model: ProjectModel = decode_model(UPDATE, id, &to.attributes)?;

        let payload = PartialUpdateProjectPayload {
            name: &model.name,
            container_parent_id: &model.parent_container_id,
            labels: model.labels.as_ref(),
        };
        let _: Project = self
            .client
            .patch(&Self::project_path(&container_id), &payload)
            .await
            .map_err(|e| calling_api(UPDATE, e).for_resource(id.clone()))?;
        let updated = self
            .wait_active("updating", &container_id)
            .await
            .map_err(|e| waiting(UPDATE, "Project update", e).for_resource(id.clone()))?;

        model.container_id = Some(container_id.clone());
        model.apply(&updated);

        info!("Project updated container_id={}", container_id);
        model_state(UPDATE, id, &[&container_id], &model)
    }

    async fn delete(&self, current: &State) -> ProviderResult<()> {
        let id = &current.id;
        let container_id = required_str(DELETE, id, &current.attributes, "container_id")?;

        match self.client.delete(&Self::project_path(container_id)).await {
            Ok(()) => {}
            Err(e) if e.is_not_found_or_gone() => {}
            Err(e) => return Err(calling_api(DELETE, e).for_resource(id.clone())),
        }
        self.wait_gone(container_id)
            .await
            .map_err(|e| waiting(DELETE, "Project deletion", e).for_resource(id.clone()))?;

        info!("Project deleted container_id={}", container_id);
        Ok(())
    }
}

#[async_trait]
impl Sweepable for ProjectResource {
    fn kind(&self) -> &'static str {
        "project"
    }

    /// `scope` is the parent container id
    async fn list_candidates(&self, parent_container_id: &str) -> Result<Vec<SweepCandidate>, ApiError> {
        let response: ListProjectsResponse = self
            .client
            .get(&format!("/v2/projects?containerParentId={}", parent_container_id))
            .await?;
        Ok(response
            .items
            .into_iter()
            .filter_map(|p| {
                let deleting = p.lifecycle_state.as_deref() == Some(LIFECYCLE_DELETING);
                p.container_id.map(|id| SweepCandidate { id, deleting })
            })
            .collect())
    }

    async fn delete_candidate(&self, _parent: &str, container_id: &str) -> Result<(), ApiError> {
        self.client.delete(&Self::project_path(container_id)).await
    }

    async fn wait_deleted(&self, _parent: &str, container_id: &str) -> Result<(), WaitError> {
        self.wait_gone(container_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use stackit_core::resource::Value;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::TokenAuth;
    use crate::config::WaitConfig;
    use crate::sweep::sweep;

    fn projects(server: &MockServer) -> ProjectResource {
        ProjectResource::new(
            ApiClient::new(
                reqwest::Client::new(),
                server.uri(),
                Arc::new(TokenAuth::new(Some("token".to_string()))),
            ),
            WaitHandler::new(WaitConfig {
                poll_interval: Duration::from_millis(1),
                timeout: Duration::from_secs(5),
                transient_retries: 0,
            }),
        )
    }

    fn project_body(lifecycle: &str) -> serde_json::Value {
        json!({
            "containerId": "project-abc",
            "projectId": "7b1c4c4e-7a56-4d57-8f0e-3b5e4f0d3c21",
            "name": "demo",
            "labels": {"env": "test"},
            "parent": {"containerId": "folder-xyz", "id": "0bd1e5c7-3a4f-4f0e-9c4d-2a1b3c4d5e6f"},
            "lifecycleState": lifecycle
        })
    }

    #[test]
    fn owner_is_first_member() {
        let model = ProjectModel {
            owner_email: Some("owner@example.com".to_string()),
            members: Some(vec![Member {
                subject: "dev@example.com".to_string(),
                role: "project.member".to_string(),
            }]),
            ..Default::default()
        };
        let members = model.members();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].role, OWNER_ROLE);
        assert_eq!(members[1].subject, "dev@example.com");
    }

    #[test]
    fn configured_parent_uuid_is_kept() {
        let mut model = ProjectModel {
            parent_container_id: "0bd1e5c7-3a4f-4f0e-9c4d-2a1b3c4d5e6f".to_string(),
            ..Default::default()
        };
        let project: Project = serde_json::from_value(project_body(LIFECYCLE_ACTIVE)).unwrap();
        model.apply(&project);
        assert_eq!(model.parent_container_id, "0bd1e5c7-3a4f-4f0e-9c4d-2a1b3c4d5e6f");

        let mut moved = ProjectModel {
            parent_container_id: "folder-old".to_string(),
            ..Default::default()
        };
        moved.apply(&project);
        assert_eq!(moved.parent_container_id, "folder-xyz");
    }

    #[tokio::test]
    async fn create_sends_owner_and_waits_for_active() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/projects"))
            .and(body_partial_json(json!({
                "name": "demo",
                "containerParentId": "folder-xyz",
                "members": [{"subject": "owner@example.com", "role": "owner"}]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(project_body(LIFECYCLE_CREATING)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/projects/project-abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(project_body(LIFECYCLE_ACTIVE)))
            .mount(&server)
            .await;

        let resource = Resource::new(PROJECT_TYPE, "demo")
            .with_attribute("name", "demo")
            .with_attribute("parent_container_id", "folder-xyz")
            .with_attribute("owner_email", "owner@example.com")
            .with_attribute(
                "labels",
                Value::Map(HashMap::from([("env".to_string(), Value::from("test"))])),
            );
        let state = projects(&server).create(&resource).await.unwrap();
        assert_eq!(state.identifier.as_deref(), Some("project-abc"));
        assert_eq!(
            state.get_str("project_id"),
            Some("7b1c4c4e-7a56-4d57-8f0e-3b5e4f0d3c21")
        );
    }

    #[tokio::test]
    async fn update_waits_until_project_is_active_again() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/v2/projects/project-abc"))
            .and(body_partial_json(json!({"name": "demo", "containerParentId": "folder-xyz"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(project_body(LIFECYCLE_CREATING)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/projects/project-abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(project_body(LIFECYCLE_CREATING)))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/projects/project-abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(project_body(LIFECYCLE_ACTIVE)))
            .mount(&server)
            .await;

        let from = State::existing(
            stackit_core::resource::ResourceId::new(PROJECT_TYPE, "demo"),
            HashMap::from([("container_id".to_string(), Value::from("project-abc"))]),
        );
        let to = Resource::new(PROJECT_TYPE, "demo")
            .with_attribute("name", "demo")
            .with_attribute("parent_container_id", "folder-xyz")
            .with_attribute("owner_email", "owner@example.com");
        let state = projects(&server).update(&from, &to).await.unwrap();
        assert_eq!(state.identifier.as_deref(), Some("project-abc"));
        assert_eq!(
            state.get_str("project_id"),
            Some("7b1c4c4e-7a56-4d57-8f0e-3b5e4f0d3c21")
        );
    }

    #[tokio::test]
    async fn sweep_skips_deleting_projects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/projects"))
            .and(query_param("containerParentId", "folder-xyz"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"containerId": "project-a", "lifecycleState": "ACTIVE"},
                    {"containerId": "project-b", "lifecycleState": "DELETING"},
                    {"containerId": "project-c", "lifecycleState": "ACTIVE"}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v2/projects/project-a"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/projects/project-a"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let tracked = vec!["project-a".to_string(), "project-b".to_string()];
        let report = sweep(&projects(&server), "folder-xyz", &tracked).await.unwrap();
        assert_eq!(report.deleted, vec!["project-a".to_string()]);
        assert_eq!(report.skipped_deleting, vec!["project-b".to_string()]);
    }
}
