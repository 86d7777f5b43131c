use std::collections::HashMap;

use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use stackit_core::provider::ProviderResult;
use stackit_core::resource::{Resource, State};
use stackit_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{NETWORK_AREA_TYPE, map_labels};
use crate::client::ApiClient;
use crate::resources::{DataSource, lookup_failed, model_state, required_str};

const READ: &str = "Error reading network area";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NetworkArea {
    name: Option<String>,
    project_count: Option<i64>,
    labels: Option<HashMap<String, String>>,
    ipv4: Option<AreaIpv4>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AreaIpv4 {
    default_nameservers: Option<Vec<String>>,
    network_ranges: Option<Vec<WireNetworkRange>>,
    transfer_network: Option<String>,
    default_prefix_len: Option<i64>,
    max_prefix_len: Option<i64>,
    min_prefix_len: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireNetworkRange {
    network_range_id: Option<String>,
    prefix: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkAreaModel {
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub network_area_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_nameservers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_ranges: Option<Vec<NetworkRange>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_prefix_length: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_prefix_length: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_prefix_length: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRange {
    #[serde(default)]
    pub network_range_id: String,
    #[serde(default)]
    pub prefix: String,
}

impl NetworkAreaModel {
    fn apply(&mut self, area: NetworkArea) {
        self.name = area.name;
        self.project_count = area.project_count;
        self.labels = map_labels(area.labels.as_ref(), None);

        let ipv4 = area.ipv4.unwrap_or_default();
        self.default_nameservers = ipv4.default_nameservers.filter(|ns| !ns.is_empty());
        self.network_ranges = ipv4
            .network_ranges
            .map(|ranges| {
                ranges
                    .into_iter()
                    .map(|r| NetworkRange {
                        network_range_id: r.network_range_id.unwrap_or_default(),
                        prefix: r.prefix.unwrap_or_default(),
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|ranges| !ranges.is_empty());
        self.transfer_network = ipv4.transfer_network;
        self.default_prefix_length = ipv4.default_prefix_len;
        self.max_prefix_length = ipv4.max_prefix_len;
        self.min_prefix_length = ipv4.min_prefix_len;
    }
}

pub struct NetworkAreaDataSource {
    client: ApiClient,
}

impl NetworkAreaDataSource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSource for NetworkAreaDataSource {
    fn type_name(&self) -> &'static str {
        NETWORK_AREA_TYPE
    }

    fn schema(&self) -> ResourceSchema {
        let network_range = AttributeType::Object(vec![
            AttributeSchema::new("network_range_id", AttributeType::String).computed(),
            AttributeSchema::new("prefix", AttributeType::String).computed(),
        ]);
        let int = |name: &str, desc: &str| {
            AttributeSchema::new(name, AttributeType::Int)
                .computed()
                .with_description(desc)
        };

        ResourceSchema::new(NETWORK_AREA_TYPE)
            .with_description("Network area datasource schema. Must have a `region` specified in the provider configuration.")
            .attribute(
                AttributeSchema::new("organization_id", types::uuid())
                    .required()
                    .with_description("STACKIT organization ID to which the network area is associated."),
            )
            .attribute(
                AttributeSchema::new("network_area_id", types::uuid())
                    .required()
                    .with_description("The network area ID."),
            )
            .attribute(
                AttributeSchema::new("name", AttributeType::String)
                    .computed()
                    .with_description("The name of the network area."),
            )
            .attribute(int(
                "project_count",
                "The amount of projects currently referencing this area.",
            ))
            .attribute(
                AttributeSchema::new("default_nameservers", types::string_list())
                    .computed()
                    .with_description("List of DNS Servers/Nameservers."),
            )
            .attribute(
                AttributeSchema::new("network_ranges", AttributeType::List(Box::new(network_range)))
                    .computed()
                    .with_description("List of Network ranges."),
            )
            .attribute(
                AttributeSchema::new("transfer_network", AttributeType::String)
                    .computed()
                    .with_description("Classless Inter-Domain Routing (CIDR)."),
            )
            .attribute(int(
                "default_prefix_length",
                "The default prefix length for networks in the network area.",
            ))
            .attribute(int(
                "max_prefix_length",
                "The maximal prefix length for networks in the network area.",
            ))
            .attribute(int(
                "min_prefix_length",
                "The minimal prefix length for networks in the network area.",
            ))
            .attribute(AttributeSchema::new("labels", types::labels()).computed())
    }

    async fn read(&self, config: &Resource) -> ProviderResult<State> {
        let id = &config.id;
        let organization_id = required_str(READ, id, &config.attributes, "organization_id")?;
        let network_area_id = required_str(READ, id, &config.attributes, "network_area_id")?;

        let area: NetworkArea = self
            .client
            .get(&format!(
                "/v1/organizations/{}/network-areas/{}",
                organization_id, network_area_id
            ))
            .await
            .map_err(|e| {
                lookup_failed(
                    READ,
                    e,
                    &format!(
                        "Network area with ID {:?} does not exist in organization {:?}.",
                        network_area_id, organization_id
                    ),
                    &[(
                        403,
                        format!(
                            "Organization with ID {:?} not found or forbidden access",
                            organization_id
                        ),
                    )],
                )
                .for_resource(id.clone())
            })?;

        let mut model = NetworkAreaModel {
            organization_id: organization_id.to_string(),
            network_area_id: network_area_id.to_string(),
            ..Default::default()
        };
        model.apply(area);

        info!(
            "Network area read organization_id={} network_area_id={}",
            organization_id, network_area_id
        );
        model_state(READ, id, &[organization_id, network_area_id], &model)
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

    const ORGANIZATION: &str = "5e1a3b2c-7d9f-4a0b-8c1d-2e3f4a5b6c7d";
    const AREA: &str = "9f8e7d6c-5b4a-4392-8170-6f5e4d3c2b1a";

    fn data_source(server: &MockServer) -> NetworkAreaDataSource {
        NetworkAreaDataSource::new(ApiClient::new(
            reqwest::Client::new(),
            server.uri(),
            Arc::new(TokenAuth::new(Some("token".to_string()))),
        ))
    }

    fn config() -> Resource {
        Resource::new(NETWORK_AREA_TYPE, "area")
            .with_read_only(true)
            .with_attribute("organization_id", ORGANIZATION)
            .with_attribute("network_area_id", AREA)
    }

    #[tokio::test]
    async fn reads_network_area() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!(
                "/v1/organizations/{}/network-areas/{}",
                ORGANIZATION, AREA
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "areaId": AREA,
                "name": "shared",
                "projectCount": 3,
                "ipv4": {
                    "defaultNameservers": ["1.1.1.1"],
                    "networkRanges": [{"networkRangeId": "r-1", "prefix": "10.0.0.0/16"}],
                    "transferNetwork": "172.16.0.0/24",
                    "defaultPrefixLen": 25,
                    "maxPrefixLen": 29,
                    "minPrefixLen": 24
                }
            })))
            .mount(&server)
            .await;

        let state = data_source(&server).read(&config()).await.unwrap();
        assert_eq!(state.get_str("name"), Some("shared"));
        assert_eq!(state.attributes.get("project_count"), Some(&Value::Int(3)));
        assert_eq!(state.attributes.get("max_prefix_length"), Some(&Value::Int(29)));
        assert_eq!(state.get_str("transfer_network"), Some("172.16.0.0/24"));
        let Some(Value::List(ranges)) = state.attributes.get("network_ranges") else {
            panic!("network_ranges not set");
        };
        assert_eq!(ranges.len(), 1);
        assert_eq!(
            state.identifier.as_deref(),
            Some(&*format!("{},{}", ORGANIZATION, AREA))
        );
    }

    #[tokio::test]
    async fn forbidden_organization_is_described() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = data_source(&server).read(&config()).await.unwrap_err();
        assert_eq!(
            err.detail,
            format!(
                "Organization with ID \"{}\" not found or forbidden access",
                ORGANIZATION
            )
        );
    }
}
