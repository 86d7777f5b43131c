//! OpenSearch REST API payloads and calls

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::client::{ApiClient, ApiError};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub instance_id: Option<String>,
    pub name: Option<String>,
    pub plan_id: Option<String>,
    pub dashboard_url: Option<String>,
    pub cf_guid: Option<String>,
    pub cf_space_guid: Option<String>,
    pub cf_organization_guid: Option<String>,
    pub image_url: Option<String>,
    pub parameters: Option<Map<String, Json>>,
    pub last_operation: Option<LastOperation>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LastOperation {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub state: Option<String>,
    pub description: Option<String>,
}

impl Instance {
    /// Whether the last operation of type `kind` ended in `state`
    pub fn last_operation_is(&self, kind: &str, state: &str) -> bool {
        self.last_operation.as_ref().is_some_and(|op| {
            op.kind.as_deref() == Some(kind) && op.state.as_deref() == Some(state)
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstancePayload {
    pub instance_name: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Json>,
    pub plan_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceResponse {
    pub instance_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialUpdateInstancePayload {
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Json>,
    pub plan_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListInstancesResponse {
    #[serde(default)]
    pub instances: Vec<Instance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListOfferingsResponse {
    #[serde(default)]
    pub offerings: Vec<Offering>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Offering {
    pub name: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub plans: Vec<Plan>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Plan {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub free: Option<bool>,
}

/// Typed calls against the OpenSearch service endpoint
#[derive(Debug, Clone)]
pub struct OpenSearchApi {
    client: ApiClient,
}

impl OpenSearchApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn get_instance(&self, project_id: &str, instance_id: &str) -> Result<Instance, ApiError> {
        self.client
            .get(&format!("/v1/projects/{}/instances/{}", project_id, instance_id))
            .await
    }

    pub async fn list_instances(&self, project_id: &str) -> Result<Vec<Instance>, ApiError> {
        let response: ListInstancesResponse = self
            .client
            .get(&format!("/v1/projects/{}/instances", project_id))
            .await?;
        Ok(response.instances)
    }

    pub async fn create_instance(
        &self,
        project_id: &str,
        payload: &CreateInstancePayload,
    ) -> Result<CreateInstanceResponse, ApiError> {
        self.client
            .post(&format!("/v1/projects/{}/instances", project_id), payload)
            .await
    }

    pub async fn partial_update_instance(
        &self,
        project_id: &str,
        instance_id: &str,
        payload: &PartialUpdateInstancePayload,
    ) -> Result<(), ApiError> {
        self.client
            .patch::<_, serde::de::IgnoredAny>(
                &format!("/v1/projects/{}/instances/{}", project_id, instance_id),
                payload,
            )
            .await
            .map(|_| ())
    }

    pub async fn delete_instance(&self, project_id: &str, instance_id: &str) -> Result<(), ApiError> {
        self.client
            .delete(&format!("/v1/projects/{}/instances/{}", project_id, instance_id))
            .await
    }

    pub async fn list_offerings(&self, project_id: &str) -> Result<Vec<Offering>, ApiError> {
        let response: ListOfferingsResponse = self
            .client
            .get(&format!("/v1/projects/{}/offerings", project_id))
            .await?;
        Ok(response.offerings)
    }
}
