//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use openapi_server::models::{
    DeployAccepted, DeployPayload, ErrorResponse, HealthResponse, RoundSemantics,
    TaskListResponse, TaskSummary, VersionResponse,
};
use secrecy::ExposeSecret;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::errors::ErrorKind;
use crate::models::request::DeployRequest;
use crate::server::state::ServerState;
use crate::utils::{secrets_match, version_info};

const SERVICE_NAME: &str = "pagesmith-deployer";

fn error_response(status: StatusCode, error: &str, message: impl Into<String>) -> Response {
    let body = ErrorResponse {
        error: error.to_string(),
        message: message.into(),
    };
    (status, Json(body)).into_response()
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorKind::TaskBusy => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Liveness handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
        version: version.version,
        supported_rounds: RoundSemantics {
            create: "round 1 creates the repository and publishes the app".to_string(),
            update: "rounds 2 and later revise the published app".to_string(),
        },
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Accept a deploy request and run it in the background
pub async fn deploy_handler(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<DeployPayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!("Malformed deploy request: {}", rejection.body_text());
            return error_response(
                StatusCode::BAD_REQUEST,
                ErrorKind::InvalidRequest.as_str(),
                rejection.body_text(),
            );
        }
    };

    let authorized = payload
        .secret
        .as_deref()
        .is_some_and(|candidate| secrets_match(state.secret.expose_secret(), candidate));
    if !authorized {
        warn!("Rejecting deploy request with a bad secret");
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized", "invalid secret");
    }

    let request = DeployRequest::from(payload);
    let admission = match state.orchestrator.admit(&request) {
        Ok(admission) => admission,
        Err(rejected) => {
            let (kind, message) = match rejected.error {
                Some(failure) => (failure.kind, failure.message),
                None => (ErrorKind::InvalidRequest, "request rejected".to_string()),
            };
            return error_response(status_for(kind), kind.as_str(), message);
        }
    };

    let deployment_id = Uuid::new_v4();
    let accepted = DeployAccepted {
        status: "accepted".to_string(),
        deployment_id,
        task: admission.request().task.clone(),
        round: admission.request().round,
        nonce: admission.request().nonce.clone(),
    };

    let span = info_span!(
        "deployment",
        id = %deployment_id,
        task = %admission.request().repo_name,
        round = admission.request().round
    );
    info!(parent: &span, "Accepted deploy request");

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(
        async move {
            orchestrator.execute(admission).await;
        }
        .instrument(span),
    );

    (StatusCode::ACCEPTED, Json(accepted)).into_response()
}

/// List known tasks
pub async fn tasks_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let locks = state.orchestrator.locks();
    let tasks: Vec<TaskSummary> = state
        .orchestrator
        .registry()
        .list()
        .into_iter()
        .map(|(task, record)| TaskSummary {
            busy: locks.is_held(&task),
            last_round: record.last_round,
            repository_url: record.repository_url,
            state: record.fsm.label().to_string(),
            last_error: record.last_error,
            updated_at: record.updated_at,
            task,
        })
        .collect();

    Json(TaskListResponse {
        total: tasks.len(),
        tasks,
    })
}
