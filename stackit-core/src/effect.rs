//! Effect - Side effects described as values
//!
//! An Effect names one provider operation without performing it. The
//! interpreter turns Effects into calls.

use crate::resource::{Resource, ResourceId, State};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Look up a data source
    Read(Resource),
    Create(Resource),
    Update { from: State, to: Resource },
    /// Delete the remote object and create it again from `to`
    Replace { from: State, to: Resource },
    Delete(State),
}

impl Effect {
    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Effect::Read(r) | Effect::Create(r) => &r.id,
            Effect::Update { to, .. } | Effect::Replace { to, .. } => &to.id,
            Effect::Delete(s) => &s.id,
        }
    }

    /// Whether this Effect changes remote infrastructure
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Effect::Read(_))
    }

    /// Short verb used when printing plans
    pub fn kind(&self) -> &'static str {
        match self {
            Effect::Read(_) => "read",
            Effect::Create(_) => "create",
            Effect::Update { .. } => "update",
            Effect::Replace { .. } => "replace",
            Effect::Delete(_) => "delete",
        }
    }
}
