//! Servers
//!
//! Only `name` and `labels` change in place, everything else replaces the
//! server. A Windows cloud-config in `user_data` is checked by the schema,
//! so the mistakes the image rejects surface at plan time instead of as an
//! unbootable server. Create checks it again before calling the API.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::info;
use serde::{Deserialize, Serialize};
use stackit_core::provider::{ProviderError, ProviderResult};
use stackit_core::resource::{Resource, State, Value};
use stackit_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{SERVER_TYPE, map_labels};
use crate::client::{ApiClient, ApiError};
use crate::cloud_init::{is_windows_cloud_init, validate_windows_cloud_init};
use crate::resources::{
    ManagedResource, calling_api, decode_model, model_state, processing, required_str, waiting,
};
use crate::wait::{WaitError, WaitHandler, WaitStatus};

const CREATE: &str = "Error creating server";
const READ: &str = "Error reading server";
const UPDATE: &str = "Error updating server";
const DELETE: &str = "Error deleting server";

const STATUS_ACTIVE: &str = "ACTIVE";
const STATUS_ERROR: &str = "ERROR";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Server {
    id: Option<String>,
    name: Option<String>,
    machine_type: Option<String>,
    availability_zone: Option<String>,
    image_id: Option<String>,
    keypair_name: Option<String>,
    labels: Option<HashMap<String, String>>,
    status: Option<String>,
    error_message: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateServerPayload<'a> {
    name: &'a str,
    machine_type: &'a str,
    image_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    availability_zone: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keypair_name: Option<&'a str>,
    /// Base64 encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    user_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<&'a HashMap<String, String>>,
}

#[derive(Debug, Serialize)]
struct PartialUpdateServerPayload<'a> {
    name: &'a str,
    labels: &'a HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerModel {
    #[serde(default)]
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub machine_type: String,
    #[serde(default)]
    pub image_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keypair_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl ServerModel {
    /// `user_data` is write-only on the API and keeps its configured value
    fn apply(&mut self, server: &Server) {
        if let Some(name) = &server.name {
            self.name = name.clone();
        }
        if let Some(machine_type) = &server.machine_type {
            self.machine_type = machine_type.clone();
        }
        if let Some(image_id) = &server.image_id {
            self.image_id = image_id.clone();
        }
        self.availability_zone = server
            .availability_zone
            .clone()
            .or(self.availability_zone.take());
        self.keypair_name = server.keypair_name.clone().or(self.keypair_name.take());
        self.labels = map_labels(server.labels.as_ref(), self.labels.as_ref());
        self.status = server.status.clone();
        self.created_at = server.created_at.clone();
        self.updated_at = server.updated_at.clone();
    }
}

/// `user_data` string, validated when it is a Windows cloud-config
fn user_data_type() -> AttributeType {
    AttributeType::Custom {
        name: "UserData".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| match value {
            Value::String(data) if is_windows_cloud_init(data) => {
                validate_windows_cloud_init(data).map_err(|e| format!("Invalid user_data: {}", e))
            }
            _ => Ok(()),
        },
    }
}

/// Reject a Windows cloud-config the image would not accept
fn check_user_data(user_data: Option<&str>) -> Result<(), ProviderError> {
    match user_data {
        Some(data) if is_windows_cloud_init(data) => validate_windows_cloud_init(data).map_err(|e| {
            ProviderError::configuration(CREATE, format!("Invalid user_data: {}", e)).with_cause(e)
        }),
        _ => Ok(()),
    }
}

pub struct ServerResource {
    client: ApiClient,
    waiter: WaitHandler,
}

impl ServerResource {
    pub fn new(client: ApiClient, waiter: WaitHandler) -> Self {
        Self { client, waiter }
    }

    fn servers_path(project_id: &str) -> String {
        format!("/v1/projects/{}/servers", project_id)
    }

    fn server_path(project_id: &str, server_id: &str) -> String {
        format!("/v1/projects/{}/servers/{}", project_id, server_id)
    }

    async fn get(&self, project_id: &str, server_id: &str) -> Result<Server, ApiError> {
        self.client.get(&Self::server_path(project_id, server_id)).await
    }

    async fn wait_active(
        &self,
        operation: &str,
        project_id: &str,
        server_id: &str,
    ) -> Result<Server, WaitError> {
        self.waiter
            .wait(&format!("server {} active", server_id), move || async move {
                let server = self.get(project_id, server_id).await?;
                match server.status.as_deref() {
                    Some(STATUS_ACTIVE) => Ok(WaitStatus::Done(server)),
                    Some(STATUS_ERROR) => Err(WaitError::Failed(format!(
                        "{} failed for server with id {}: {}",
                        operation,
                        server_id,
                        server.error_message.as_deref().unwrap_or("no error message")
                    ))),
                    _ => Ok(WaitStatus::Pending),
                }
            })
            .await
    }

    async fn wait_gone(&self, project_id: &str, server_id: &str) -> Result<(), WaitError> {
        self.waiter
            .wait(&format!("server {} gone", server_id), move || async move {
                match self.get(project_id, server_id).await {
                    Ok(_) => Ok(WaitStatus::Pending),
                    Err(e) if e.is_not_found_or_gone() => Ok(WaitStatus::Done(())),
                    Err(e) => Err(e.into()),
                }
            })
            .await
    }
}

#[async_trait]
impl ManagedResource for ServerResource {
    fn type_name(&self) -> &'static str {
        SERVER_TYPE
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(SERVER_TYPE)
            .with_description("Server resource schema.")
            .attribute(
                AttributeSchema::new("project_id", types::uuid())
                    .required()
                    .requires_replace()
                    .with_description("STACKIT project ID to which the server is associated."),
            )
            .attribute(
                AttributeSchema::new("server_id", AttributeType::String)
                    .computed()
                    .with_description("The server ID."),
            )
            .attribute(
                AttributeSchema::new("name", types::non_empty_string())
                    .required()
                    .with_description("The name of the server."),
            )
            .attribute(
                AttributeSchema::new("machine_type", types::non_empty_string())
                    .required()
                    .requires_replace()
                    .with_description("Name of the type of the machine for the server."),
            )
            .attribute(
                AttributeSchema::new("image_id", types::uuid())
                    .required()
                    .requires_replace()
                    .with_description("The image ID to boot the server from."),
            )
            .attribute(
                AttributeSchema::new("availability_zone", AttributeType::String)
                    .optional_computed()
                    .requires_replace()
                    .with_description("The availability zone of the server."),
            )
            .attribute(
                AttributeSchema::new("keypair_name", AttributeType::String)
                    .requires_replace()
                    .with_description("The name of the keypair used during server creation."),
            )
            .attribute(
                AttributeSchema::new("user_data", user_data_type())
                    .requires_replace()
                    .with_description(
                        "User data that is passed via cloud-init to the server. \
                         A Windows `#cloud-config` must define users with an unquoted `passwd`.",
                    ),
            )
            .attribute(AttributeSchema::new("labels", types::labels()).with_description(
                "Labels are key-value string pairs which can be attached to a resource container",
            ))
            .attribute(AttributeSchema::new("status", AttributeType::String).computed())
            .attribute(AttributeSchema::new("created_at", AttributeType::String).computed())
            .attribute(AttributeSchema::new("updated_at", AttributeType::String).computed())
    }

    fn id_fields(&self) -> &'static [&'static str] {
        &["project_id", "server_id"]
    }

    async fn create(&self, resource: &Resource) -> ProviderResult<State> {
        let id = &resource.id;
        let mut model: ServerModel = decode_model(CREATE, id, &resource.attributes)?;
        check_user_data(model.user_data.as_deref()).map_err(|e| e.for_resource(id.clone()))?;

        let payload = CreateServerPayload {
            name: &model.name,
            machine_type: &model.machine_type,
            image_id: &model.image_id,
            availability_zone: model.availability_zone.as_deref(),
            keypair_name: model.keypair_name.as_deref(),
            user_data: model.user_data.as_ref().map(|data| STANDARD.encode(data)),
            labels: model.labels.as_ref(),
        };
        let created: Server = self
            .client
            .post(&Self::servers_path(&model.project_id), &payload)
            .await
            .map_err(|e| calling_api(CREATE, e).for_resource(id.clone()))?;
        let server_id = created
            .id
            .ok_or_else(|| processing(CREATE, "server id not present").for_resource(id.clone()))?;

        let server = self
            .wait_active("create", &model.project_id, &server_id)
            .await
            .map_err(|e| waiting(CREATE, "Server creation", e).for_resource(id.clone()))?;

        model.server_id = Some(server_id.clone());
        model.apply(&server);

        info!(
            "Server created project_id={} server_id={}",
            model.project_id, server_id
        );
        model_state(CREATE, id, &[&model.project_id, &server_id], &model)
    }

    async fn read(&self, current: &State) -> ProviderResult<State> {
        let id = &current.id;
        let mut model: ServerModel = decode_model(READ, id, &current.attributes)?;
        let server_id = required_str(READ, id, &current.attributes, "server_id")?.to_string();

        let server = match self.get(&model.project_id, &server_id).await {
            Ok(server) => server,
            Err(e) if e.is_not_found_or_gone() => return Ok(State::not_found(id.clone())),
            Err(e) => return Err(calling_api(READ, e).for_resource(id.clone())),
        };
        model.apply(&server);

        info!(
            "Server read project_id={} server_id={}",
            model.project_id, server_id
        );
        model_state(READ, id, &[&model.project_id, &server_id], &model)
    }

    async fn update(&self, from: &State, to: &Resource) -> ProviderResult<State> {
        let id = &to.id;
        let server_id = required_str(UPDATE, id, &from.attributes, "server_id")?.to_string();
        let mut model: ServerModel = decode_model(UPDATE, id, &to.attributes)?;
        model.server_id = Some(server_id.clone());

        let no_labels = HashMap::new();
        let payload = PartialUpdateServerPayload {
            name: &model.name,
            labels: model.labels.as_ref().unwrap_or(&no_labels),
        };
        let _: Server = self
            .client
            .patch(&Self::server_path(&model.project_id, &server_id), &payload)
            .await
            .map_err(|e| calling_api(UPDATE, e).for_resource(id.clone()))?;
        let server = self
            .wait_active("update", &model.project_id, &server_id)
            .await
            .map_err(|e| waiting(UPDATE, "Server update", e).for_resource(id.clone()))?;
        model.apply(&server);

        info!(
            "Server updated project_id={} server_id={}",
            model.project_id, server_id
        );
        model_state(UPDATE, id, &[&model.project_id, &server_id], &model)
    }

    async fn delete(&self, current: &State) -> ProviderResult<()> {
        let id = &current.id;
        let project_id = required_str(DELETE, id, &current.attributes, "project_id")?;
        let server_id = required_str(DELETE, id, &current.attributes, "server_id")?;

        let deleted = self
            .client
            .delete(&Self::server_path(project_id, server_id))
            .await;
        match deleted {
            Ok(()) => {}
            Err(e) if e.is_not_found_or_gone() => {}
            Err(e) => return Err(calling_api(DELETE, e).for_resource(id.clone())),
        }
        self.wait_gone(project_id, server_id)
            .await
            .map_err(|e| waiting(DELETE, "Server deletion", e).for_resource(id.clone()))?;

        info!(
            "Server deleted project_id={} server_id={}",
            project_id, server_id
        );
        Ok(())
    }
}
