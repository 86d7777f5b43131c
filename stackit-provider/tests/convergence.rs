//! Create, read and drift detection through the provider against a mock API

use std::collections::HashMap;
use std::time::Duration;

use serde_json::json;
use stackit_core::differ::create_plan;
use stackit_core::interpreter::Interpreter;
use stackit_core::provider::{Provider, ResourceKind};
use stackit_core::resource::{Resource, ResourceId, State};
use stackit_core::schema::ResourceSchema;
use stackit_provider::{ProviderConfig, StackitProvider, WaitConfig};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROJECT: &str = "2f0e4d2a-9a0e-4b8e-8a51-4c3f0a0a7b11";
const INSTANCE: &str = "8a1d2c3b-4e5f-4a6b-9c8d-7e6f5a4b3c2d";

fn provider(server: &MockServer) -> StackitProvider {
    let config = ProviderConfig {
        service_account_token: Some("token".to_string()),
        ..Default::default()
    }
    .resolve_with(|_| None)
    .with_single_endpoint(&server.uri())
    .with_wait(WaitConfig {
        poll_interval: Duration::from_millis(1),
        timeout: Duration::from_secs(5),
        transient_retries: 2,
    });
    StackitProvider::new(config).unwrap()
}

fn resource_schemas(provider: &StackitProvider) -> HashMap<String, ResourceSchema> {
    provider
        .resource_types()
        .into_iter()
        .filter(|t| t.kind() == ResourceKind::Resource)
        .map(|t| (t.name().to_string(), t.schema()))
        .collect()
}

async fn mount_opensearch(server: &MockServer) {
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
    Mock::given(method("POST"))
        .and(path(format!("/v1/projects/{}/instances", PROJECT)))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"instanceId": INSTANCE})))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/projects/{}/instances/{}", PROJECT, INSTANCE)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "instanceId": INSTANCE,
            "name": "search",
            "planId": "plan-1",
            "dashboardUrl": "https://dashboard.example",
            "parameters": {"sgw_acl": "10.0.0.0/8", "tls-protocols": ["TLSv1.3", "TLSv1.2"]},
            "lastOperation": {"type": "create", "state": "succeeded"}
        })))
        .mount(server)
        .await;
}

fn desired_instance() -> Resource {
    Resource::new("opensearch_instance", "search")
        .with_attribute("project_id", PROJECT)
        .with_attribute("name", "search")
        .with_attribute("version", "2")
        .with_attribute("plan_name", "stackit-opensearch-single")
}

#[tokio::test]
async fn created_instance_reads_back_identically() {
    let server = MockServer::start().await;
    mount_opensearch(&server).await;

    let interpreter = Interpreter::new(provider(&server));
    let schemas = resource_schemas(interpreter.provider());
    let desired = vec![desired_instance()];
    let mut states: HashMap<ResourceId, State> = HashMap::new();

    let plan = create_plan(&desired, &states, &schemas);
    assert_eq!(plan.mutation_count(), 1);
    let result = interpreter.apply(&plan, &mut states).await;
    assert!(result.is_success(), "{:?}", result.outcomes);

    let created = states[&desired[0].id].clone();
    assert_eq!(
        created.identifier.as_deref(),
        Some(&*format!("{},{}", PROJECT, INSTANCE))
    );

    let read = interpreter.provider().read(&created).await.unwrap();
    assert!(read.exists);
    assert_eq!(read.identifier, created.identifier);
    assert_eq!(read.attributes, created.attributes);

    // converged: planning again changes nothing
    let plan = create_plan(&desired, &states, &schemas);
    assert!(plan.is_empty(), "{:?}", plan.effects());
}

#[tokio::test]
async fn out_of_band_deletion_drops_the_resource_from_state() {
    let server = MockServer::start().await;
    mount_opensearch(&server).await;

    let interpreter = Interpreter::new(provider(&server));
    let schemas = resource_schemas(interpreter.provider());
    let desired = vec![desired_instance()];
    let mut states: HashMap<ResourceId, State> = HashMap::new();

    let plan = create_plan(&desired, &states, &schemas);
    assert!(interpreter.apply(&plan, &mut states).await.is_success());

    server.reset().await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/projects/{}/instances/{}", PROJECT, INSTANCE)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let current = states[&desired[0].id].clone();
    let read = interpreter.provider().read(&current).await.unwrap();
    assert!(!read.exists);

    let refreshed = interpreter.refresh(&mut states).await;
    assert_eq!(refreshed.drifted, vec![desired[0].id.clone()]);
    assert!(refreshed.errors.is_empty());
    assert!(states.is_empty());

    // the next plan recreates it
    let plan = create_plan(&desired, &states, &schemas);
    assert_eq!(plan.mutation_count(), 1);
}

#[tokio::test]
async fn import_then_read_fills_the_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v1beta/projects/{}/instances/git-1", PROJECT)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "git-1",
            "name": "repo",
            "url": "https://git.example/repo",
            "version": "1.0",
            "state": "Ready"
        })))
        .mount(&server)
        .await;

    let interpreter = Interpreter::new(provider(&server));
    let id = ResourceId::new("git_instance", "repo");
    let state = interpreter
        .import(&id, &format!("{},git-1", PROJECT))
        .await
        .unwrap();
    assert_eq!(state.get_str("name"), Some("repo"));
    assert_eq!(state.get_str("url"), Some("https://git.example/repo"));
}
