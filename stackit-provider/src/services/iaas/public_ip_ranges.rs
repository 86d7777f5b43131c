//! Public IP ranges of the STACKIT cloud
//!
//! The API returns the ranges in no stable order; they are sorted so that a
//! refresh never reports a change on its own.

use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use stackit_core::provider::ProviderResult;
use stackit_core::resource::{Resource, State};
use stackit_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::PUBLIC_IP_RANGES_TYPE;
use crate::client::ApiClient;
use crate::resources::{DataSource, lookup_failed, model_state};

const READ: &str = "Error reading public IP ranges";

#[derive(Debug, Clone, Default, Deserialize)]
struct PublicNetworkListResponse {
    #[serde(default)]
    items: Vec<PublicNetwork>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PublicNetwork {
    cidr: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublicIpRangesModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip_ranges: Option<Vec<PublicIpRange>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr_list: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicIpRange {
    pub cidr: String,
}

/// Sorted, non-empty CIDRs of the listed networks
fn sorted_cidrs(response: PublicNetworkListResponse) -> Vec<String> {
    let mut cidrs: Vec<String> = response
        .items
        .into_iter()
        .filter_map(|network| network.cidr)
        .filter(|cidr| !cidr.is_empty())
        .collect();
    cidrs.sort();
    cidrs
}

pub struct PublicIpRangesDataSource {
    client: ApiClient,
}

impl PublicIpRangesDataSource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSource for PublicIpRangesDataSource {
    fn type_name(&self) -> &'static str {
        PUBLIC_IP_RANGES_TYPE
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(PUBLIC_IP_RANGES_TYPE)
            .with_description("A list of all public IP ranges that STACKIT uses.")
            .attribute(
                AttributeSchema::new(
                    "public_ip_ranges",
                    AttributeType::List(Box::new(AttributeType::Object(vec![AttributeSchema::new(
                        "cidr",
                        AttributeType::String,
                    )
                    .computed()
                    .with_description("Classless Inter-Domain Routing (CIDR)")]))),
                )
                .computed()
                .with_description("A list of IP range strings (CIDRs)"),
            )
            .attribute(
                AttributeSchema::new("cidr_list", AttributeType::List(Box::new(AttributeType::String)))
                    .computed()
                    .with_description("A list of IP range strings (CIDRs) extracted from the public_ip_ranges for easy consumption."),
            )
    }

    async fn read(&self, config: &Resource) -> ProviderResult<State> {
        let id = &config.id;
        let response: PublicNetworkListResponse = self
            .client
            .get("/v1/networks/public-ip-ranges")
            .await
            .map_err(|e| {
                lookup_failed(
                    READ,
                    e,
                    "Public ip ranges cannot be found",
                    &[(403, "Forbidden access".to_string())],
                )
                .for_resource(id.clone())
            })?;

        let cidrs = sorted_cidrs(response);
        let model = if cidrs.is_empty() {
            PublicIpRangesModel::default()
        } else {
            PublicIpRangesModel {
                public_ip_ranges: Some(
                    cidrs.iter().map(|cidr| PublicIpRange { cidr: cidr.clone() }).collect(),
                ),
                cidr_list: Some(cidrs.clone()),
            }
        };

        info!("Public IP ranges read count={}", cidrs.len());
        model_state(READ, id, &cidrs, &model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use stackit_core::resource::Value;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::TokenAuth;

    fn data_source(server: &MockServer) -> PublicIpRangesDataSource {
        PublicIpRangesDataSource::new(ApiClient::new(
            reqwest::Client::new(),
            server.uri(),
            Arc::new(TokenAuth::new(Some("token".to_string()))),
        ))
    }

    fn config() -> Resource {
        Resource::new(PUBLIC_IP_RANGES_TYPE, "all").with_read_only(true)
    }

    #[tokio::test]
    async fn ranges_are_sorted_and_joined_into_the_identifier() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/networks/public-ip-ranges"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"cidr": "192.168.0.0/24"},
                    {"cidr": "10.0.0.0/8"},
                    {"cidr": ""},
                    {}
                ]
            })))
            .mount(&server)
            .await;

        let state = data_source(&server).read(&config()).await.unwrap();
        assert_eq!(state.identifier.as_deref(), Some("10.0.0.0/8,192.168.0.0/24"));
        assert_eq!(
            state.attributes.get("cidr_list"),
            Some(&Value::List(vec![
                Value::from("10.0.0.0/8"),
                Value::from("192.168.0.0/24")
            ]))
        );
    }

    #[tokio::test]
    async fn no_ranges_leaves_lists_unset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;

        let state = data_source(&server).read(&config()).await.unwrap();
        assert!(state.exists);
        assert!(!state.attributes.contains_key("public_ip_ranges"));
        assert!(!state.attributes.contains_key("cidr_list"));
    }

    #[tokio::test]
    async fn forbidden_is_described() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = data_source(&server).read(&config()).await.unwrap_err();
        assert_eq!(err.detail, "Forbidden access");
    }
}
