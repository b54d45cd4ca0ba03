use thiserror::Error;

use crate::db::StoreError;
use crate::feed::RegistryError;

/// Failures while bringing the server up or serving
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("storage unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("vendor registry: {0}")]
    Registry(#[from] RegistryError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
