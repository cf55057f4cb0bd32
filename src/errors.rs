use std::io;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoucherError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("cryptography error: {0}")]
    Crypto(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("extrinsic rejected by chain: {0}")]
    ChainRejection(String),
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("node connectivity failure: {0}")]
    Connectivity(String),
    #[error("timed out after {}s waiting for block inclusion", .0.as_secs())]
    Timeout(Duration),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type VoucherResult<T> = Result<T, VoucherError>;
