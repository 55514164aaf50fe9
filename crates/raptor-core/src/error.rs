//! Error types for descriptor loading and validation.

use thiserror::Error;

/// Result type alias for descriptor operations.
pub type DescriptorResult<T> = Result<T, DescriptorError>;

/// Errors raised while reading or validating a deployment descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("failed to read descriptor {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode descriptor {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("descriptor contains a service with an empty name")]
    EmptyServiceName,

    #[error("service {0} is declared more than once")]
    DuplicateService(String),

    #[error("service {service} specifies invalid {param}: {value:?}")]
    InvalidResourceSpec {
        service: String,
        param: String,
        value: String,
    },
}
