use clusterflow_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error(
        "Dockerに接続できません: {0}\n\nヒント:\n  • Dockerが起動しているか確認してください\n  • DOCKER_HOST の設定を確認してください"
    )]
    DockerConnectionFailed(String),

    #[error(
        "イメージ '{image}' を取得できません: {reason}\n\nヒント:\n  • イメージ名とタグを確認してください\n  • プライベートレジストリの場合は docker login を確認してください"
    )]
    ImageUnavailable { image: String, reason: String },

    #[error("コンテナ '{container}' が残っています")]
    ContainerStillPresent { container: String },

    #[error("Docker APIエラー: {0}")]
    DockerApiError(String),
}

impl From<bollard::errors::Error> for ContainerError {
    fn from(err: bollard::errors::Error) -> Self {
        // 404/409 は呼び出し側で処理済みのはず
        let err_str = err.to_string();
        if err_str.contains("Connection refused") || err_str.contains("No such file or directory") {
            ContainerError::DockerConnectionFailed(err_str)
        } else {
            ContainerError::DockerApiError(err_str)
        }
    }
}

impl ContainerError {
    /// Map into the backend-neutral error for the provision path
    pub fn into_provision_error(self) -> CloudError {
        match self {
            ContainerError::ImageUnavailable { .. } => CloudError::Validation(self.to_string()),
            other => CloudError::Provision(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ContainerError>;
