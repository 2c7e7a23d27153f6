//! HTTP gateway
//!
//! The dashboard-facing surface: per-environment deployment listings and
//! per-deployment pod logs, plus the environment index and a liveness
//! probe. Failures map to typed JSON error bodies; they are never folded
//! into success-shaped payloads.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use shiftscope_cluster::ClusterError;
use shiftscope_types::{EnrichedDeployment, LogCollection, PodLogResult};

use crate::aggregator;
use crate::config::Settings;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/environments", get(environments))
        .route("/{env}", get(environment_deployments))
        .route("/{env_logs}/{deployment}", get(deployment_logs))
        .with_state(state)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn environments(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.settings.environments())
}

async fn environment_deployments(
    State(state): State<AppState>,
    Path(env): Path<String>,
) -> Result<Json<Vec<EnrichedDeployment>>, ApiError> {
    let cluster = state
        .settings
        .cluster(&env)
        .ok_or(ApiError::UnknownEnvironment)?;

    tracing::info!(env = %env, "listing deployments");
    let deployments = aggregator::environment_deployments(
        cluster,
        &state.settings.timeouts,
        &state.settings.limits,
    )
    .await?;

    Ok(Json(deployments))
}

#[derive(Serialize)]
struct LogsResponse {
    deployment: String,
    logs: BTreeMap<String, PodLogResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'static str>,
}

async fn deployment_logs(
    State(state): State<AppState>,
    Path((env_segment, deployment)): Path<(String, String)>,
) -> Result<Json<LogsResponse>, ApiError> {
    // The logs path spells its first segment as `<env>-logs`; anything
    // without the suffix is not part of the surface.
    let env = env_segment
        .strip_suffix("-logs")
        .ok_or(ApiError::UnknownEnvironment)?;
    let cluster = state
        .settings
        .cluster(env)
        .ok_or(ApiError::UnknownEnvironment)?;

    tracing::info!(env = %env, deployment = %deployment, "collecting pod logs");
    let collection = aggregator::environment_logs(
        cluster,
        &deployment,
        &state.settings.timeouts,
        &state.settings.limits,
    )
    .await?;

    let response = match collection {
        LogCollection::Collected(logs) => LogsResponse {
            deployment,
            logs,
            status: None,
        },
        LogCollection::NoPods => LogsResponse {
            deployment,
            logs: BTreeMap::new(),
            status: Some("no pods matched the deployment selector"),
        },
    };
    Ok(Json(response))
}

#[derive(Debug)]
pub enum ApiError {
    UnknownEnvironment,
    Cluster(ClusterError),
}

impl From<ClusterError> for ApiError {
    fn from(err: ClusterError) -> Self {
        Self::Cluster(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::UnknownEnvironment => (
                StatusCode::NOT_FOUND,
                json!({ "error": "Environment not found" }),
            ),
            ApiError::Cluster(err) => {
                let (status, kind) = match &err {
                    ClusterError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
                    ClusterError::Auth { .. } => (StatusCode::BAD_GATEWAY, "authentication"),
                    ClusterError::Fetch { .. } => (StatusCode::BAD_GATEWAY, "fetch"),
                    ClusterError::Parse(_) => (StatusCode::BAD_GATEWAY, "parse"),
                    ClusterError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
                };
                (status, json!({ "error": err.to_string(), "kind": kind }))
            }
        };
        (status, Json(body)).into_response()
    }
}
