use thiserror::Error;

use crate::{apis::ApiError, store::StoreError};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Upstream unavailable: {0}")]
    Upstream(#[from] ApiError),
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
