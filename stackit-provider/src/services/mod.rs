//! STACKIT services
//!
//! One module per service API. Each exposes its managed resources and data
//! sources; the provider wires them to their service endpoint.

pub mod dns;
pub mod git;
pub mod iaas;
pub mod opensearch;
pub mod resourcemanager;
pub mod serviceaccount;
pub mod ske;
pub mod sqlserverflex;
