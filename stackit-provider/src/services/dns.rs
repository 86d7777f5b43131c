//! DNS zones

use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use stackit_core::provider::ProviderResult;
use stackit_core::resource::{Resource, State};
use stackit_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::client::ApiClient;
use crate::resources::{DataSource, lookup_failed, model_state, processing, required_str};

pub const ZONE_TYPE: &str = "dns_zone";

const READ: &str = "Unable to Read Zone";

#[derive(Debug, Clone, Deserialize)]
struct ZoneResponse {
    zone: Option<Zone>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Zone {
    id: Option<String>,
    name: Option<String>,
    dns_name: Option<String>,
    description: Option<String>,
    acl: Option<String>,
    active: Option<bool>,
    contact_email: Option<String>,
    #[serde(rename = "defaultTTL")]
    default_ttl: Option<i64>,
    expire_time: Option<i64>,
    is_reverse_zone: Option<bool>,
    negative_cache: Option<i64>,
    primary_name_server: Option<String>,
    primaries: Option<Vec<String>>,
    record_count: Option<i64>,
    refresh_time: Option<i64>,
    retry_time: Option<i64>,
    serial_number: Option<i64>,
    #[serde(rename = "type")]
    zone_type: Option<String>,
    visibility: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneModel {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub zone_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_ttl: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_reverse_zone: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_cache: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_name_server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primaries: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<i64>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub zone_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

fn map_fields(response: ZoneResponse, project_id: &str) -> Result<ZoneModel, &'static str> {
    let zone = response.zone.ok_or("response input is nil")?;
    let zone_id = zone.id.ok_or("zone id not present")?;
    Ok(ZoneModel {
        project_id: project_id.to_string(),
        zone_id,
        name: zone.name,
        dns_name: zone.dns_name,
        description: zone.description,
        acl: zone.acl,
        active: zone.active,
        contact_email: zone.contact_email,
        default_ttl: zone.default_ttl,
        expire_time: zone.expire_time,
        is_reverse_zone: zone.is_reverse_zone,
        negative_cache: zone.negative_cache,
        primary_name_server: zone.primary_name_server,
        primaries: zone.primaries.filter(|p| !p.is_empty()),
        record_count: zone.record_count,
        refresh_time: zone.refresh_time,
        retry_time: zone.retry_time,
        serial_number: zone.serial_number,
        zone_type: zone.zone_type,
        visibility: zone.visibility,
        state: zone.state,
    })
}

pub struct ZoneDataSource {
    client: ApiClient,
}

impl ZoneDataSource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSource for ZoneDataSource {
    fn type_name(&self) -> &'static str {
        ZONE_TYPE
    }

    fn schema(&self) -> ResourceSchema {
        let strings = [
            ("name", "The user given name of the zone."),
            ("dns_name", "The zone name. E.g. `example.com`"),
            ("description", "Description of the zone."),
            ("acl", "The access control list."),
            ("contact_email", "A contact e-mail for the zone."),
            ("primary_name_server", "Primary name server. FQDN."),
            ("type", "Zone type."),
            ("visibility", "Visibility of the zone."),
            ("state", "Zone state."),
        ];
        let ints = [
            ("default_ttl", "Default time to live."),
            ("expire_time", "Expire time."),
            ("negative_cache", "Negative caching."),
            ("record_count", "Record count how many records are in the zone."),
            ("refresh_time", "Refresh time."),
            ("retry_time", "Retry time."),
            ("serial_number", "Serial number."),
        ];
        let bools = [
            ("active", ""),
            ("is_reverse_zone", "Specifies, if the zone is a reverse zone or not."),
        ];

        let computed = strings
            .iter()
            .map(|(name, desc)| (name, desc, AttributeType::String))
            .chain(ints.iter().map(|(name, desc)| (name, desc, AttributeType::Int)))
            .chain(bools.iter().map(|(name, desc)| (name, desc, AttributeType::Bool)));

        computed.fold(
            ResourceSchema::new(ZONE_TYPE)
                .with_description("DNS Zone resource schema.")
                .attribute(
                    AttributeSchema::new("project_id", types::uuid())
                        .required()
                        .with_description("STACKIT project ID to which the dns zone is associated."),
                )
                .attribute(
                    AttributeSchema::new("zone_id", types::uuid())
                        .required()
                        .with_description("The zone ID."),
                )
                .attribute(
                    AttributeSchema::new("primaries", types::string_list())
                        .computed()
                        .with_description("Primary name server for secondary zone."),
                ),
            |schema, (name, desc, attr_type)| {
                schema.attribute(
                    AttributeSchema::new(*name, attr_type)
                        .computed()
                        .with_description(*desc),
                )
            },
        )
    }

    async fn read(&self, config: &Resource) -> ProviderResult<State> {
        let id = &config.id;
        let project_id = required_str(READ, id, &config.attributes, "project_id")?;
        let zone_id = required_str(READ, id, &config.attributes, "zone_id")?;

        let response: ZoneResponse = self
            .client
            .get(&format!("/v1/projects/{}/zones/{}", project_id, zone_id))
            .await
            .map_err(|e| {
                lookup_failed(
                    READ,
                    e,
                    &format!(
                        "Zone with ID {:?} does not exist in project {:?}.",
                        zone_id, project_id
                    ),
                    &[(
                        403,
                        format!("Project with ID {:?} not found or forbidden access", project_id),
                    )],
                )
                .for_resource(id.clone())
            })?;

        let model = map_fields(response, project_id)
            .map_err(|e| processing("Mapping fields", e).for_resource(id.clone()))?;

        info!("DNS zone read project_id={} zone_id={}", project_id, zone_id);
        model_state(READ, id, &[project_id, &model.zone_id], &model)
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

    const PROJECT: &str = "2f0e4d2a-9a0e-4b8e-8a51-4c3f0a0a7b11";
    const ZONE: &str = "3d4e5f6a-7b8c-4d9e-8f0a-1b2c3d4e5f6a";

    fn data_source(server: &MockServer) -> ZoneDataSource {
        ZoneDataSource::new(ApiClient::new(
            reqwest::Client::new(),
            server.uri(),
            Arc::new(TokenAuth::new(Some("token".to_string()))),
        ))
    }

    fn config() -> Resource {
        Resource::new(ZONE_TYPE, "zone")
            .with_read_only(true)
            .with_attribute("project_id", PROJECT)
            .with_attribute("zone_id", ZONE)
    }

    #[tokio::test]
    async fn reads_zone() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/projects/{}/zones/{}", PROJECT, ZONE)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "zone": {
                    "id": ZONE,
                    "name": "example",
                    "dnsName": "example.com",
                    "active": true,
                    "defaultTTL": 3600,
                    "type": "primary",
                    "primaries": []
                }
            })))
            .mount(&server)
            .await;

        let state = data_source(&server).read(&config()).await.unwrap();
        assert_eq!(state.get_str("dns_name"), Some("example.com"));
        assert_eq!(state.get_str("type"), Some("primary"));
        assert_eq!(state.attributes.get("default_ttl"), Some(&Value::Int(3600)));
        assert_eq!(state.attributes.get("active"), Some(&Value::Bool(true)));
        assert!(!state.attributes.contains_key("primaries"));
    }

    #[tokio::test]
    async fn response_without_zone_is_a_mapping_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let err = data_source(&server).read(&config()).await.unwrap_err();
        assert_eq!(err.kind, stackit_core::provider::ErrorKind::Mapping);
    }

    #[tokio::test]
    async fn missing_zone_is_described() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = data_source(&server).read(&config()).await.unwrap_err();
        assert!(err.detail.starts_with("Zone with ID"));
    }
}
