//! HTTP API
//!
//! | Route | Purpose |
//! |---|---|
//! | `GET /health-check` | liveness |
//! | `GET /status?clusterID=` | one cluster |
//! | `GET /clusters` | every cluster |
//! | `POST /check-in` | agent heartbeat |
//! | `POST /{provider}/create` | provision from a JSON template |
//! | `POST /{provider}/terminate` | request teardown (form field `clusterID`) |

use axum::body::Bytes;
use axum::extract::{Form, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clusterflow_cloud::{CheckIn, ProviderKind};
use clusterflow_controlplane::{ControlPlane, ControlPlaneError, StatusSummary};
use serde::Deserialize;

pub const TERMINATION_ACCEPTED: &str = "received cluster termination request";

#[derive(Debug)]
pub enum ApiError {
    MissingClusterId,
    ControlPlane(ControlPlaneError),
}

impl From<ControlPlaneError> for ApiError {
    fn from(err: ControlPlaneError) -> Self {
        ApiError::ControlPlane(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingClusterId => StatusCode::BAD_REQUEST,
            ApiError::ControlPlane(err) => match err {
                ControlPlaneError::Validation(_)
                | ControlPlaneError::Deserialization(_)
                | ControlPlaneError::ProviderMismatch { .. } => StatusCode::BAD_REQUEST,
                ControlPlaneError::NotFound(_)
                | ControlPlaneError::ProviderDisabled(_)
                | ControlPlaneError::ProviderUnavailable(_)
                | ControlPlaneError::UnknownProvider(_) => StatusCode::NOT_FOUND,
                ControlPlaneError::AlreadyExists(_) => StatusCode::CONFLICT,
                ControlPlaneError::Provision(_) | ControlPlaneError::Destroy(_) => {
                    StatusCode::BAD_GATEWAY
                }
            },
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::MissingClusterId => "clusterID is required".to_string(),
            ApiError::ControlPlane(err) => err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %message, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %message, "Request rejected");
        }
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ClusterIdParams {
    #[serde(rename = "clusterID")]
    pub cluster_id: Option<String>,
}

impl ClusterIdParams {
    fn require(self) -> Result<String, ApiError> {
        self.cluster_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(ApiError::MissingClusterId)
    }
}

fn parse_provider(name: &str) -> Result<ProviderKind, ApiError> {
    name.parse::<ProviderKind>()
        .map_err(|e| ApiError::ControlPlane(e.into()))
}

pub fn router(plane: ControlPlane) -> Router {
    Router::new()
        .route("/health-check", get(health_check))
        .route("/status", get(status))
        .route("/clusters", get(list_clusters))
        .route("/check-in", post(check_in))
        .route("/{provider}/create", post(create_cluster))
        .route("/{provider}/terminate", post(terminate_cluster))
        .with_state(plane)
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

async fn status(
    State(plane): State<ControlPlane>,
    Query(params): Query<ClusterIdParams>,
) -> Result<Json<StatusSummary>, ApiError> {
    let cluster_id = params.require()?;
    Ok(Json(plane.get_status(&cluster_id).await?))
}

async fn list_clusters(State(plane): State<ControlPlane>) -> Json<Vec<StatusSummary>> {
    Json(plane.list_clusters().await)
}

async fn check_in(State(plane): State<ControlPlane>, Json(payload): Json<CheckIn>) -> StatusCode {
    plane.check_in(&payload).await;
    StatusCode::OK
}

async fn create_cluster(
    State(plane): State<ControlPlane>,
    Path(provider): Path<String>,
    body: Bytes,
) -> Result<Json<StatusSummary>, ApiError> {
    let kind = parse_provider(&provider)?;
    let summary = plane.create_cluster(kind, &body).await?;
    tracing::info!(cluster_id = %summary.cluster_id, provider = %kind, "Cluster created");
    Ok(Json(summary))
}

async fn terminate_cluster(
    State(plane): State<ControlPlane>,
    Path(provider): Path<String>,
    Form(params): Form<ClusterIdParams>,
) -> Result<&'static str, ApiError> {
    let kind = parse_provider(&provider)?;
    let cluster_id = params.require()?;
    let outcome = plane.request_termination(kind, &cluster_id).await?;
    tracing::info!(cluster_id = %cluster_id, provider = %kind, outcome = ?outcome, "Termination accepted");
    Ok(TERMINATION_ACCEPTED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ControlPlaneError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (ControlPlaneError::Deserialization("x".into()), StatusCode::BAD_REQUEST),
            (
                ControlPlaneError::ProviderMismatch {
                    cluster_id: "c".into(),
                    requested: ProviderKind::Aws,
                    actual: ProviderKind::Docker,
                },
                StatusCode::BAD_REQUEST,
            ),
            (ControlPlaneError::NotFound("c".into()), StatusCode::NOT_FOUND),
            (
                ControlPlaneError::ProviderDisabled(ProviderKind::Aws),
                StatusCode::NOT_FOUND,
            ),
            (ControlPlaneError::UnknownProvider("azure".into()), StatusCode::NOT_FOUND),
            (ControlPlaneError::AlreadyExists("c".into()), StatusCode::CONFLICT),
            (ControlPlaneError::Provision("x".into()), StatusCode::BAD_GATEWAY),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
        assert_eq!(ApiError::MissingClusterId.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_cluster_id_required() {
        let blank = ClusterIdParams {
            cluster_id: Some("  ".to_string()),
        };
        assert!(matches!(blank.require(), Err(ApiError::MissingClusterId)));
        let present = ClusterIdParams {
            cluster_id: Some("c1".to_string()),
        };
        assert_eq!(present.require().unwrap(), "c1");
    }
}
