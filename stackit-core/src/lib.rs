//! STACKIT Core
//!
//! Declarative resource model and convergence engine shared by the STACKIT
//! provider, state backends and CLI.

pub mod differ;
pub mod effect;
pub mod identifier;
pub mod interpreter;
pub mod plan;
pub mod provider;
pub mod reconcile;
pub mod resource;
pub mod schema;
