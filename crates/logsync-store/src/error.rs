//! Object-store error classification.

use logsync_core::ServiceError;

#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("object store error: {0}")]
    Other(String),
}

impl From<ObjectStoreError> for ServiceError {
    fn from(e: ObjectStoreError) -> Self {
        match e {
            ObjectStoreError::NotFound(m) => ServiceError::NotFound(m),
            ObjectStoreError::AccessDenied(m) => {
                tracing::error!("object store access denied: {m}");
                ServiceError::Forbidden(m)
            }
            ObjectStoreError::Network(m) => ServiceError::ServiceUnavailable(m),
            ObjectStoreError::Other(m) => {
                tracing::error!("object store error: {m}");
                ServiceError::Internal(m)
            }
        }
    }
}
