//! State backend implementations

mod local;

pub use local::LocalBackend;

use crate::backend::{BackendConfig, BackendError, BackendResult, StateBackend};

/// Create the backend named by the configuration
pub fn create_backend(config: &BackendConfig) -> BackendResult<Box<dyn StateBackend>> {
    match config.backend_type.as_str() {
        "local" => Ok(Box::new(LocalBackend::from_config(config))),
        other => Err(BackendError::UnsupportedBackend(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_backend_is_rejected() {
        let config = BackendConfig {
            backend_type: "s3".to_string(),
            ..Default::default()
        };
        match create_backend(&config) {
            Err(BackendError::UnsupportedBackend(name)) => assert_eq!(name, "s3"),
            Err(other) => panic!("Expected UnsupportedBackend, got {other:?}"),
            Ok(_) => panic!("Expected UnsupportedBackend, got a backend"),
        }
    }

    #[test]
    fn local_backend_is_the_default() {
        assert!(create_backend(&BackendConfig::default()).is_ok());
    }
}
