//! Sakura Cloud backend error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SakuraError {
    #[error("usacloud not found. Please install: brew install usacloud")]
    UsacloudNotFound,

    #[error("usacloud command failed: {0}")]
    CommandFailed(String),

    #[error("SSH key not found: {0}")]
    SshKeyNotFound(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SakuraError>;
