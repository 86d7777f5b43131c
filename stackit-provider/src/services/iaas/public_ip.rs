use std::collections::HashMap;

use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use stackit_core::provider::ProviderResult;
use stackit_core::resource::{Resource, State};
use stackit_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{PUBLIC_IP_TYPE, map_labels};
use crate::client::ApiClient;
use crate::resources::{DataSource, decode_model, lookup_failed, model_state, required_str};

const READ: &str = "Error reading public ip";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicIp {
    ip: Option<String>,
    network_interface: Option<String>,
    labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublicIpModel {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub public_ip_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_interface_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

pub struct PublicIpDataSource {
    client: ApiClient,
}

impl PublicIpDataSource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSource for PublicIpDataSource {
    fn type_name(&self) -> &'static str {
        PUBLIC_IP_TYPE
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(PUBLIC_IP_TYPE)
            .with_description("Public IP resource schema. Must have a `region` specified in the provider configuration.")
            .attribute(
                AttributeSchema::new("project_id", types::uuid())
                    .required()
                    .with_description("STACKIT project ID to which the public IP is associated."),
            )
            .attribute(
                AttributeSchema::new("public_ip_id", types::uuid())
                    .required()
                    .with_description("The public IP ID."),
            )
            .attribute(
                AttributeSchema::new("ip", AttributeType::String)
                    .computed()
                    .with_description("The IP address."),
            )
            .attribute(
                AttributeSchema::new("network_interface_id", AttributeType::String)
                    .computed()
                    .with_description("Associates the public IP with a network interface or a virtual IP (ID)."),
            )
            .attribute(AttributeSchema::new("labels", types::labels()).computed())
    }

    async fn read(&self, config: &Resource) -> ProviderResult<State> {
        let id = &config.id;
        let project_id = required_str(READ, id, &config.attributes, "project_id")?;
        let public_ip_id = required_str(READ, id, &config.attributes, "public_ip_id")?;
        let mut model: PublicIpModel = decode_model(READ, id, &config.attributes)?;

        let public_ip: PublicIp = self
            .client
            .get(&format!("/v1/projects/{}/public-ips/{}", project_id, public_ip_id))
            .await
            .map_err(|e| {
                lookup_failed(
                    READ,
                    e,
                    &format!(
                        "Public ip with ID {:?} does not exist in project {:?}.",
                        public_ip_id, project_id
                    ),
                    &[(
                        403,
                        format!("Project with ID {:?} not found or forbidden access", project_id),
                    )],
                )
                .for_resource(id.clone())
            })?;

        model.ip = public_ip.ip;
        model.network_interface_id = public_ip.network_interface;
        model.labels = map_labels(public_ip.labels.as_ref(), None);

        info!(
            "Public IP read project_id={} public_ip_id={}",
            project_id, public_ip_id
        );
        model_state(READ, id, &[project_id, public_ip_id], &model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::TokenAuth;

    const PROJECT: &str = "2f0e4d2a-9a0e-4b8e-8a51-4c3f0a0a7b11";
    const PUBLIC_IP: &str = "6b8e2f1a-3c4d-4e5f-9a0b-1c2d3e4f5a6b";

    fn data_source(server: &MockServer) -> PublicIpDataSource {
        PublicIpDataSource::new(ApiClient::new(
            reqwest::Client::new(),
            server.uri(),
            Arc::new(TokenAuth::new(Some("token".to_string()))),
        ))
    }

    fn config() -> Resource {
        Resource::new(PUBLIC_IP_TYPE, "ingress")
            .with_read_only(true)
            .with_attribute("project_id", PROJECT)
            .with_attribute("public_ip_id", PUBLIC_IP)
    }

    #[tokio::test]
    async fn reads_public_ip() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/projects/{}/public-ips/{}", PROJECT, PUBLIC_IP)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": PUBLIC_IP,
                "ip": "193.148.160.1",
                "networkInterface": "nic-1",
                "labels": {}
            })))
            .mount(&server)
            .await;

        let state = data_source(&server).read(&config()).await.unwrap();
        assert_eq!(state.get_str("ip"), Some("193.148.160.1"));
        assert_eq!(state.get_str("network_interface_id"), Some("nic-1"));
        assert!(!state.attributes.contains_key("labels"));
    }

    #[tokio::test]
    async fn missing_public_ip_is_described() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = data_source(&server).read(&config()).await.unwrap_err();
        assert_eq!(
            err.detail,
            format!(
                "Public ip with ID \"{}\" does not exist in project \"{}\".",
                PUBLIC_IP, PROJECT
            )
        );
    }
}
