//! Differ - Compare desired state with current state to generate a Plan
//!
//! Compares the desired state declared in configuration with the current state
//! refreshed from the Provider, and generates the Effects required to converge.

use std::collections::{HashMap, HashSet};

use crate::effect::Effect;
use crate::plan::Plan;
use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::{AttributeType, ResourceSchema};

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with in-place changeable differences -> needs update
    Update {
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// A replace-on-change attribute differs -> delete and create again
    Replace {
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
///
/// Only attributes present in the configuration are compared. Attributes the
/// schema marks as computed are owned by the server and never diffed.
pub fn diff(desired: &Resource, current: &State, schema: Option<&ResourceSchema>) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = find_changed_attributes(&desired.attributes, &current.attributes, schema);

    if changed.is_empty() {
        return Diff::NoChange(desired.id.clone());
    }

    let forces_replace = schema.is_some_and(|s| {
        changed
            .iter()
            .any(|name| s.attributes.get(name).is_some_and(|a| a.requires_replace))
    });

    if forces_replace {
        Diff::Replace {
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    } else {
        Diff::Update {
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Find changed attributes between desired and current state
fn find_changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
    schema: Option<&ResourceSchema>,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, desired_value) in desired {
        // Skip internal attributes (starting with _)
        if key.starts_with('_') {
            continue;
        }
        if schema.is_some_and(|s| !s.is_configurable(key)) {
            continue;
        }

        let attr_type = schema
            .and_then(|s| s.attributes.get(key))
            .map(|a| &a.attr_type);
        match current.get(key) {
            Some(current_value) if value_matches(attr_type, desired_value, current_value) => {}
            _ => changed.push(key.clone()),
        }
    }

    changed.sort();
    changed
}

/// Nested objects only compare the fields that are configured; the server
/// fills in the rest.
fn value_matches(attr_type: Option<&AttributeType>, desired: &Value, current: &Value) -> bool {
    match (attr_type, desired, current) {
        (Some(AttributeType::Object(fields)), Value::Map(desired), Value::Map(current)) => {
            desired.iter().all(|(key, desired_value)| {
                let field_type = fields.iter().find(|f| &f.name == key).map(|f| &f.attr_type);
                current
                    .get(key)
                    .is_some_and(|current_value| value_matches(field_type, desired_value, current_value))
            })
        }
        _ => desired == current,
    }
}

/// Compute Diff for every configured resource and generate a Plan
///
/// Data sources always produce a Read. States with no configured counterpart
/// produce a Delete, ordered by resource id.
pub fn create_plan(
    desired: &[Resource],
    current_states: &HashMap<ResourceId, State>,
    schemas: &HashMap<String, ResourceSchema>,
) -> Plan {
    let mut plan = Plan::new();

    for resource in desired.iter().filter(|r| r.is_data_source()) {
        plan.add(Effect::Read(resource.clone()));
    }

    for resource in desired.iter().filter(|r| !r.is_data_source()) {
        let current = current_states
            .get(&resource.id)
            .cloned()
            .unwrap_or_else(|| State::not_found(resource.id.clone()));

        match diff(resource, &current, schemas.get(&resource.id.resource_type)) {
            Diff::Create(r) => plan.add(Effect::Create(r)),
            Diff::Update { from, to, .. } => plan.add(Effect::Update { from, to }),
            Diff::Replace { from, to, .. } => plan.add(Effect::Replace { from, to }),
            Diff::NoChange(_) => {}
        }
    }

    let configured: HashSet<&ResourceId> = desired.iter().map(|r| &r.id).collect();
    let mut orphaned: Vec<&State> = current_states
        .values()
        .filter(|s| s.exists && !configured.contains(&s.id))
        .collect();
    orphaned.sort_by_key(|s| s.id.to_string());
    for state in orphaned {
        plan.add(Effect::Delete(state.clone()));
    }

    plan
}

/// Plan deleting every existing resource, in reverse id order
pub fn destroy_plan(current_states: &HashMap<ResourceId, State>) -> Plan {
    let mut states: Vec<&State> = current_states.values().filter(|s| s.exists).collect();
    states.sort_by_key(|s| std::cmp::Reverse(s.id.to_string()));

    let mut plan = Plan::new();
    for state in states {
        plan.add(Effect::Delete(state.clone()));
    }
    plan
}
