//! Service account keys
//!
//! Keys are immutable: every configurable attribute forces a new key, and
//! the private key is only ever returned by the create call.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use stackit_core::provider::{ProviderError, ProviderResult};
use stackit_core::resource::{Resource, State};
use stackit_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::client::ApiClient;
use crate::conversion::MappingError;
use crate::resources::{
    ManagedResource, calling_api, decode_model, model_state, processing, required_str,
};

pub const KEY_TYPE: &str = "service_account_key";

const CREATE: &str = "Error creating service account access token";
const READ: &str = "Error reading service account key";
const UPDATE: &str = "Error updating service account access token";
const DELETE: &str = "Error deleting service account key";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyModel {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub service_account_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotate_when_changed: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_algorithm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateKeyPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    public_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    valid_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyResponse {
    id: Option<String>,
    key_algorithm: Option<String>,
    key_origin: Option<String>,
    key_type: Option<String>,
    public_key: Option<String>,
    created_at: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>,
    #[serde(default)]
    credentials: Credentials,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Credentials {
    aud: Option<String>,
    iss: Option<String>,
    kid: Option<String>,
    sub: Option<String>,
    private_key: Option<String>,
}

/// Expiry of a key valid for `ttl_days` from `now`, `None` when it is not a
/// representable timestamp
pub fn compute_valid_until(now: DateTime<Utc>, ttl_days: i64) -> Option<DateTime<Utc>> {
    let hours = ttl_days.checked_mul(24)?;
    now.checked_add_signed(Duration::try_hours(hours)?)
}

fn timestamp(t: Option<DateTime<Utc>>) -> Option<String> {
    t.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn map_common_fields(response: &KeyResponse, model: &mut KeyModel) -> Result<(), MappingError> {
    let key_id = response
        .id
        .clone()
        .ok_or_else(|| MappingError::Missing("service account key id not present".to_string()))?;

    if model.public_key.is_none() {
        model.public_key = response.public_key.clone();
    }
    model.key_id = Some(key_id);
    model.created_at = timestamp(response.created_at);
    model.valid_until = timestamp(response.valid_until);
    model.key_algorithm = response.key_algorithm.clone();
    model.key_origin = response.key_origin.clone();
    model.key_type = response.key_type.clone();
    model.audience = response.credentials.aud.clone();
    model.issuer = response.credentials.iss.clone();
    model.kid = response.credentials.kid.clone();
    model.subject = response.credentials.sub.clone();
    Ok(())
}

/// Map a create response, the only response carrying the private key
fn map_create_response(raw: &serde_json::Value, model: &mut KeyModel) -> Result<(), MappingError> {
    let response: KeyResponse = serde_json::from_value(raw.clone())
        .map_err(|e| MappingError::Missing(format!("response or model input is nil: {}", e)))?;
    map_common_fields(&response, model)?;
    model.private_key = response.credentials.private_key;
    model.raw_response = Some(raw.to_string());
    Ok(())
}

pub struct KeyResource {
    client: ApiClient,
}

impl KeyResource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn keys_path(project_id: &str, email: &str) -> String {
        format!("/v2/projects/{}/service-accounts/{}/keys", project_id, email)
    }

    fn key_schema() -> ResourceSchema {
        let computed = [
            ("key_id", "The unique identifier for the key associated with the service account."),
            ("created_at", "The precise timestamp marking when the access token was created, provided in a formatted date-time string."),
            ("valid_until", "The date and time until which the key remains valid. If left unspecified, the key is considered valid until it is deleted."),
            ("audience", "A list or string representing the intended audience for the token, indicating who can consume it."),
            ("issuer", "The entity or authority that issued the token, typically a URL or email address, indicating its source."),
            ("kid", "The Key ID ('kid'), which aids in identifying the exact key used for signing the token."),
            ("subject", "The subject claim ('sub') identifies the principal that is the subject of the JWT."),
            ("key_algorithm", "The cryptographic algorithm used for the key, such as 'RSA_2048', specifying the bit size and type."),
            ("key_origin", "The way in which the key was provided or generated, with possible values including 'USER_PROVIDED' or 'GENERATED'."),
            ("key_type", "The type of key management, such as 'USER_MANAGED' or 'SYSTEM_MANAGED', indicating how keys are administered."),
        ];
        computed.into_iter().fold(
            ResourceSchema::new(KEY_TYPE)
                .with_description("Schema for managing a STACKIT service account access token.")
                .attribute(
                    AttributeSchema::new("project_id", types::uuid())
                        .required()
                        .requires_replace()
                        .with_description("The STACKIT project ID associated with the service account token."),
                )
                .attribute(
                    AttributeSchema::new("service_account_email", types::no_separator())
                        .required()
                        .requires_replace()
                        .with_description("The email address associated with the service account, used for account identification and communication."),
                )
                .attribute(
                    AttributeSchema::new("public_key", AttributeType::String)
                        .optional_computed()
                        .requires_replace()
                        .with_description("The public portion of the key pair, which may be shared openly and used for verification or encryption."),
                )
                .attribute(
                    AttributeSchema::new("ttl_days", types::positive_int())
                        .requires_replace()
                        .with_description("Specifies the key's validity duration in days. If left unspecified, the key is considered valid until it is deleted"),
                )
                .attribute(
                    AttributeSchema::new("rotate_when_changed", types::labels())
                        .requires_replace()
                        .with_description("A map of arbitrary key/value pairs designed to force key recreation when they change."),
                )
                .attribute(
                    AttributeSchema::new("private_key", AttributeType::String)
                        .computed()
                        .sensitive()
                        .with_description("The private portion of the key pair, used to sign or encrypt data. For security reasons, handle with care."),
                )
                .attribute(
                    AttributeSchema::new("raw_response", AttributeType::String)
                        .computed()
                        .sensitive()
                        .with_description("The raw JSON representation of the API response, available for direct use."),
                ),
            |schema, (name, description)| {
                schema.attribute(
                    AttributeSchema::new(name, AttributeType::String)
                        .computed()
                        .with_description(description),
                )
            },
        )
    }
}

#[async_trait]
impl ManagedResource for KeyResource {
    fn type_name(&self) -> &'static str {
        KEY_TYPE
    }

    fn schema(&self) -> ResourceSchema {
        Self::key_schema()
    }

    fn id_fields(&self) -> &'static [&'static str] {
        &["project_id", "service_account_email", "key_id"]
    }

    fn is_beta(&self) -> bool {
        true
    }

    async fn create(&self, resource: &Resource) -> ProviderResult<State> {
        let id = &resource.id;
        let mut model: KeyModel = decode_model(CREATE, id, &resource.attributes)?;

        let valid_until = match model.ttl_days {
            Some(days) => Some(compute_valid_until(Utc::now(), days).ok_or_else(|| {
                ProviderError::configuration(
                    CREATE,
                    format!("ttl_days {} is too far in the future", days),
                )
                .for_resource(id.clone())
            })?),
            None => None,
        };
        let payload = CreateKeyPayload {
            public_key: model.public_key.clone().filter(|k| !k.is_empty()),
            valid_until,
        };

        let raw: serde_json::Value = self
            .client
            .post(&Self::keys_path(&model.project_id, &model.service_account_email), &payload)
            .await
            .map_err(|e| calling_api(CREATE, e).for_resource(id.clone()))?;

        map_create_response(&raw, &mut model)
            .map_err(|e| processing(CREATE, &e).with_cause(e).for_resource(id.clone()))?;

        let key_id = model.key_id.clone().unwrap_or_default();
        info!(
            "Service account key created project_id={} service_account_email={} key_id={}",
            model.project_id, model.service_account_email, key_id
        );
        model_state(
            CREATE,
            id,
            &[&model.project_id, &model.service_account_email, &key_id],
            &model,
        )
    }

    async fn read(&self, current: &State) -> ProviderResult<State> {
        let id = &current.id;
        let mut model: KeyModel = decode_model(READ, id, &current.attributes)?;
        let key_id = required_str(READ, id, &current.attributes, "key_id")?.to_string();

        let path = format!(
            "{}/{}",
            Self::keys_path(&model.project_id, &model.service_account_email),
            key_id
        );
        let response: KeyResponse = match self.client.get(&path).await {
            Ok(response) => response,
            Err(e) if e.is_not_found_or_gone() => return Ok(State::not_found(id.clone())),
            Err(e) => return Err(calling_api(READ, e).for_resource(id.clone())),
        };

        map_common_fields(&response, &mut model)
            .map_err(|e| processing(READ, &e).with_cause(e).for_resource(id.clone()))?;

        info!(
            "Service account key read project_id={} key_id={}",
            model.project_id, key_id
        );
        model_state(
            READ,
            id,
            &[&model.project_id, &model.service_account_email, &key_id],
            &model,
        )
    }

    async fn update(&self, _from: &State, to: &Resource) -> ProviderResult<State> {
        Err(
            ProviderError::configuration(UPDATE, "Service accounts can't be updated")
                .for_resource(to.id.clone()),
        )
    }

    async fn delete(&self, current: &State) -> ProviderResult<()> {
        let id = &current.id;
        let project_id = required_str(DELETE, id, &current.attributes, "project_id")?;
        let email = required_str(DELETE, id, &current.attributes, "service_account_email")?;
        let key_id = required_str(DELETE, id, &current.attributes, "key_id")?;

        match self
            .client
            .delete(&format!("{}/{}", Self::keys_path(project_id, email), key_id))
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found_or_gone() => {}
            Err(e) => return Err(calling_api(DELETE, e).for_resource(id.clone())),
        }

        info!(
            "Service account key deleted project_id={} key_id={}",
            project_id, key_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::TimeZone;
    use serde_json::json;
    use stackit_core::resource::{ResourceId, Value};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::TokenAuth;

    const PROJECT: &str = "2f0e4d2a-9a0e-4b8e-8a51-4c3f0a0a7b11";
    const EMAIL: &str = "sa01@sa.stackit.cloud";

    fn key_resource(server: &MockServer) -> KeyResource {
        KeyResource::new(ApiClient::new(
            reqwest::Client::new(),
            server.uri(),
            Arc::new(TokenAuth::new(Some("token".to_string()))),
        ))
    }

    fn key_response() -> serde_json::Value {
        json!({
            "id": "key-1",
            "keyAlgorithm": "RSA_2048",
            "keyOrigin": "GENERATED",
            "keyType": "USER_MANAGED",
            "publicKey": "pub",
            "createdAt": "2024-05-01T10:00:00Z",
            "validUntil": "2024-05-31T10:00:00Z",
            "credentials": {"aud": "aud", "iss": "iss", "kid": "kid", "sub": "sub", "privateKey": "priv"}
        })
    }

    #[test]
    fn valid_until_adds_whole_days() {
        let now = Utc.with_ymd_and_hms(2024, 2, 28, 12, 30, 0).unwrap();
        assert_eq!(
            compute_valid_until(now, 2),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap())
        );
    }

    #[test]
    fn valid_until_out_of_range_is_none() {
        let now = Utc::now();
        assert!(types::positive_int().validate(&Value::Int(1_000_000_000)).is_ok());
        assert_eq!(compute_valid_until(now, 1_000_000_000), None);
        assert_eq!(compute_valid_until(now, i64::MAX), None);
    }

    #[tokio::test]
    async fn huge_ttl_is_rejected_before_calling_the_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(key_response()))
            .expect(0)
            .mount(&server)
            .await;

        let resource = Resource::new(KEY_TYPE, "key")
            .with_attribute("project_id", PROJECT)
            .with_attribute("service_account_email", EMAIL)
            .with_attribute("ttl_days", 1_000_000_000i64);
        let err = key_resource(&server).create(&resource).await.unwrap_err();
        assert_eq!(err.kind, stackit_core::provider::ErrorKind::Configuration);
        assert!(err.detail.contains("ttl_days"), "{}", err.detail);
    }

    #[test]
    fn create_response_sets_private_key_and_raw_response() {
        let mut model = KeyModel {
            project_id: PROJECT.to_string(),
            ..Default::default()
        };
        map_create_response(&key_response(), &mut model).unwrap();
        assert_eq!(model.private_key.as_deref(), Some("priv"));
        assert_eq!(model.created_at.as_deref(), Some("2024-05-01T10:00:00Z"));
        assert_eq!(model.key_id.as_deref(), Some("key-1"));
        let raw: serde_json::Value =
            serde_json::from_str(model.raw_response.as_deref().unwrap()).unwrap();
        assert_eq!(raw, key_response());
    }

    #[test]
    fn response_without_id_is_rejected() {
        let mut model = KeyModel::default();
        let err = map_common_fields(&KeyResponse::default(), &mut model).unwrap_err();
        assert_eq!(err.to_string(), "service account key id not present");
    }

    #[test]
    fn configured_public_key_is_kept() {
        let mut model = KeyModel {
            public_key: Some("mine".to_string()),
            ..Default::default()
        };
        let response: KeyResponse = serde_json::from_value(key_response()).unwrap();
        map_common_fields(&response, &mut model).unwrap();
        assert_eq!(model.public_key.as_deref(), Some("mine"));
    }

    #[tokio::test]
    async fn read_keeps_create_only_attributes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!(
                "/v2/projects/{}/service-accounts/{}/keys/key-1",
                PROJECT, EMAIL
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(key_response()))
            .mount(&server)
            .await;

        let current = State::existing(
            ResourceId::new(KEY_TYPE, "key"),
            HashMap::from([
                ("project_id".to_string(), Value::from(PROJECT)),
                ("service_account_email".to_string(), Value::from(EMAIL)),
                ("key_id".to_string(), Value::from("key-1")),
                ("private_key".to_string(), Value::from("from-create")),
            ]),
        );
        let state = key_resource(&server).read(&current).await.unwrap();
        assert_eq!(state.get_str("private_key"), Some("from-create"));
        assert_eq!(state.get_str("key_algorithm"), Some("RSA_2048"));
        assert_eq!(
            state.identifier.as_deref(),
            Some(&*format!("{},{},key-1", PROJECT, EMAIL))
        );
    }

    #[tokio::test]
    async fn update_is_rejected() {
        let server = MockServer::start().await;
        let current = State::existing(ResourceId::new(KEY_TYPE, "key"), HashMap::new());
        let err = key_resource(&server)
            .update(&current, &Resource::new(KEY_TYPE, "key"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, stackit_core::provider::ErrorKind::Configuration);
        assert_eq!(err.detail, "Service accounts can't be updated");
    }
}
