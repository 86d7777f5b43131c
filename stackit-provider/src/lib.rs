//! STACKIT Provider
//!
//! Resources and data sources of the STACKIT cloud, driven through the
//! service REST APIs.
//!
//! ## Module Structure
//!
//! - `provider` - StackitProvider, dispatching core operations by type name
//! - `resources` - Handler traits and shared error/model helpers
//! - `services` - One module per STACKIT service
//! - `client` - Authenticated JSON client per service endpoint
//! - `wait` - Polling until asynchronous operations converge
//! - `config` - Provider block and environment resolution
//! - `sweep` - Teardown of leftovers after acceptance runs

pub mod client;
pub mod cloud_init;
pub mod config;
pub mod conversion;
pub mod features;
pub mod provider;
pub mod resources;
pub mod services;
pub mod sweep;
pub mod utils;
pub mod wait;

// Re-export main types
pub use config::{ProviderConfig, ResolvedConfig, WaitConfig};
pub use provider::StackitProvider;
