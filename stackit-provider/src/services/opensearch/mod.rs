//! OpenSearch instances

pub mod api;
pub mod datasource;
pub mod offerings;
pub mod parameters;
pub mod resource;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::conversion::MappingError;
use crate::wait::{WaitError, WaitHandler, WaitStatus};
use api::{Instance, OpenSearchApi};
use parameters::Parameters;

pub use datasource::InstanceDataSource;
pub use resource::InstanceResource;

pub const INSTANCE_TYPE: &str = "opensearch_instance";

/// Declarative model of an instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceModel {
    #[serde(default)]
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Map<String, Json>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cf_guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cf_space_guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cf_organization_guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Copy an API instance into the model
///
/// The instance id already in the model wins over the one in the payload.
/// List parameters keep the order of the parameters previously in the model.
pub fn map_fields(instance: &Instance, model: &mut InstanceModel) -> Result<(), MappingError> {
    let instance_id = match (&model.instance_id, &instance.instance_id) {
        (Some(id), _) if !id.is_empty() => id.clone(),
        (_, Some(id)) => id.clone(),
        _ => return Err(MappingError::Missing("instance id not present".to_string())),
    };

    model.instance_id = Some(instance_id);
    model.name = instance.name.clone();
    model.plan_id = instance.plan_id.clone();
    model.cf_guid = instance.cf_guid.clone();
    model.cf_space_guid = instance.cf_space_guid.clone();
    model.cf_organization_guid = instance.cf_organization_guid.clone();
    model.dashboard_url = instance.dashboard_url.clone();
    model.image_url = instance.image_url.clone();

    model.parameters = match &instance.parameters {
        None => None,
        Some(wire) => {
            let mut parameters = Parameters::from_wire(wire)?;
            if let Some(prior) = &model.parameters {
                parameters.reconcile_lists(&Parameters::from_model(prior)?);
            }
            Some(parameters.to_model())
        }
    };
    Ok(())
}

/// Wait until the last operation of type `operation` succeeded
pub(crate) async fn wait_for_operation(
    api: &OpenSearchApi,
    waiter: &WaitHandler,
    project_id: &str,
    instance_id: &str,
    operation: &str,
) -> Result<Instance, WaitError> {
    waiter
        .wait(&format!("opensearch instance {} {}", instance_id, operation), move || async move {
            let instance = api.get_instance(project_id, instance_id).await?;
            if instance.last_operation_is(operation, "succeeded") {
                Ok(WaitStatus::Done(instance))
            } else if instance.last_operation_is(operation, "failed") {
                let description = instance
                    .last_operation
                    .as_ref()
                    .and_then(|op| op.description.clone())
                    .unwrap_or_default();
                Err(WaitError::Failed(format!(
                    "{} failed for instance with id {}: {}",
                    operation, instance_id, description
                )))
            } else {
                Ok(WaitStatus::Pending)
            }
        })
        .await
}

/// Wait until the instance is gone
pub(crate) async fn wait_for_deletion(
    api: &OpenSearchApi,
    waiter: &WaitHandler,
    project_id: &str,
    instance_id: &str,
) -> Result<(), WaitError> {
    waiter
        .wait(&format!("opensearch instance {} delete", instance_id), move || async move {
            match api.get_instance(project_id, instance_id).await {
                Err(e) if e.is_not_found_or_gone() => Ok(WaitStatus::Done(())),
                Err(e) => Err(e.into()),
                Ok(instance) if instance.last_operation_is("delete", "succeeded") => {
                    Ok(WaitStatus::Done(()))
                }
                Ok(instance) if instance.last_operation_is("delete", "failed") => Err(
                    WaitError::Failed(format!("delete failed for instance with id {}", instance_id)),
                ),
                Ok(_) => Ok(WaitStatus::Pending),
            }
        })
        .await
}
