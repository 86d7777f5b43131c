//! State file structures for persisting resource state

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use stackit_core::resource::{ResourceId, State, attributes_to_json, json_to_attributes};

/// The persisted state of every managed resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// State file format version
    pub version: u32,
    /// Incremented on every write
    pub serial: u64,
    /// Identifies one state history; a write never crosses lineages
    pub lineage: String,
    /// Version of the tool that last wrote this state
    pub tool_version: String,
    pub resources: Vec<ResourceState>,
}

impl StateFile {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new() -> Self {
        Self::with_lineage(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_lineage(lineage: String) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            serial: 0,
            lineage,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            resources: Vec::new(),
        }
    }

    pub fn increment_serial(&mut self) {
        self.serial += 1;
        self.tool_version = env!("CARGO_PKG_VERSION").to_string();
    }

    pub fn find_resource(&self, resource_type: &str, name: &str) -> Option<&ResourceState> {
        self.resources
            .iter()
            .find(|r| r.resource_type == resource_type && r.name == name)
    }

    /// Add or replace the entry for the same type and name
    pub fn upsert_resource(&mut self, resource: ResourceState) {
        match self
            .resources
            .iter_mut()
            .find(|r| r.resource_type == resource.resource_type && r.name == resource.name)
        {
            Some(existing) => *existing = resource,
            None => self.resources.push(resource),
        }
    }

    pub fn remove_resource(&mut self, resource_type: &str, name: &str) -> Option<ResourceState> {
        let pos = self
            .resources
            .iter()
            .position(|r| r.resource_type == resource_type && r.name == name)?;
        Some(self.resources.remove(pos))
    }

    /// Tracked states keyed by resource id, as the interpreter works on them
    pub fn states(&self) -> HashMap<ResourceId, State> {
        self.resources
            .iter()
            .map(|r| {
                let state = r.to_state();
                (state.id.clone(), state)
            })
            .collect()
    }

    /// Replace the tracked resources, ordered by resource id
    pub fn set_states(&mut self, states: &HashMap<ResourceId, State>) {
        let mut resources: Vec<ResourceState> = states
            .values()
            .filter(|s| s.exists)
            .map(ResourceState::from_state)
            .collect();
        resources.sort_by(|a, b| {
            (&a.resource_type, &a.name).cmp(&(&b.resource_type, &b.name))
        });
        self.resources = resources;
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

/// State of a single managed resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource type without the `stackit_` prefix (e.g. "git_instance")
    pub resource_type: String,
    pub name: String,
    /// Composite internal identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl ResourceState {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            identifier: None,
            attributes: serde_json::Map::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn from_state(state: &State) -> Self {
        let attributes = match attributes_to_json(&state.attributes) {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Self {
            resource_type: state.id.resource_type.clone(),
            name: state.id.name.clone(),
            identifier: state.identifier.clone(),
            attributes,
        }
    }

    pub fn to_state(&self) -> State {
        let id = ResourceId::new(&self.resource_type, &self.name);
        let attributes = json_to_attributes(&serde_json::Value::Object(self.attributes.clone()));
        let state = State::existing(id, attributes);
        match &self.identifier {
            Some(identifier) => state.with_identifier(identifier.clone()),
            None => state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stackit_core::resource::Value;

    #[test]
    fn test_state_file_new() {
        let state = StateFile::new();
        assert_eq!(state.version, StateFile::CURRENT_VERSION);
        assert_eq!(state.serial, 0);
        assert!(!state.lineage.is_empty());
        assert!(state.resources.is_empty());
    }

    #[test]
    fn test_upsert_and_remove_resource() {
        let mut state = StateFile::new();
        state.upsert_resource(
            ResourceState::new("git_instance", "repo").with_attribute("name", json!("repo")),
        );
        state.upsert_resource(
            ResourceState::new("git_instance", "repo").with_attribute("name", json!("renamed")),
        );
        assert_eq!(state.resources.len(), 1);
        assert_eq!(
            state.find_resource("git_instance", "repo").unwrap().attributes["name"],
            json!("renamed")
        );

        assert!(state.remove_resource("git_instance", "repo").is_some());
        assert!(state.remove_resource("git_instance", "repo").is_none());
    }

    #[test]
    fn test_states_keep_identifier_and_attributes() {
        let id = ResourceId::new("opensearch_instance", "search");
        let tracked = State::existing(
            id.clone(),
            HashMap::from([
                ("project_id".to_string(), Value::from("p")),
                (
                    "parameters".to_string(),
                    Value::Map(HashMap::from([(
                        "plugins".to_string(),
                        Value::List(vec![Value::from("analysis-icu")]),
                    )])),
                ),
            ]),
        )
        .with_identifier("p,i");

        let mut file = StateFile::new();
        file.set_states(&HashMap::from([
            (id.clone(), tracked.clone()),
            (
                ResourceId::new("git_instance", "gone"),
                State::not_found(ResourceId::new("git_instance", "gone")),
            ),
        ]));
        assert_eq!(file.resources.len(), 1);

        let json = serde_json::to_string_pretty(&file).unwrap();
        let restored: StateFile = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.states()[&id], tracked);
    }
}
