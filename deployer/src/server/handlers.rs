//! HTTP request handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::deploy::fsm::PipelineState;
use crate::deploy::task::DeploymentTask;
use crate::server::state::ServerState;
use crate::utils::version_info;
use crate::webhook::event::{WebhookEvent, DELIVERY_HEADER, EVENT_HEADER};
use crate::webhook::signature::SIGNATURE_HEADER;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub pipeline: PipelineState,
}

/// Health check handler
pub async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "intoxicode-deployer".to_string(),
        version: version.version,
        pipeline: state.orchestrator.state().await,
    })
}

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
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

/// Latest deployment handler; 404 until a task has finished
pub async fn latest_deployment_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<impl IntoResponse, StatusCode> {
    state
        .orchestrator
        .last_report()
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// Body of a rejected webhook
#[derive(Debug, Serialize)]
pub struct RejectedResponse {
    pub ok: bool,
    pub message: String,
    pub payload: String,
}

/// Webhook handler.
///
/// Verifies the signature over the raw body, then queues a deployment when
/// the event asks for one. The response never waits for the deployment.
pub async fn webhook_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = header_str(&headers, SIGNATURE_HEADER);
    let delivery = header_str(&headers, DELIVERY_HEADER).unwrap_or("-");

    if let Err(e) = state.verifier.authenticate(&body, signature) {
        warn!("Rejected webhook delivery {}: {}", delivery, e);
        let rejected = RejectedResponse {
            ok: false,
            message: "Could not verify payload authenticity".to_string(),
            payload: String::from_utf8_lossy(&body).into_owned(),
        };
        return (StatusCode::UNAUTHORIZED, Json(rejected)).into_response();
    }

    let event_type = header_str(&headers, EVENT_HEADER);
    let event = match WebhookEvent::decode(event_type, &body) {
        Ok(event) => event,
        Err(e) => {
            warn!(
                "Ignoring webhook delivery {} ({}): {}",
                delivery,
                event_type.unwrap_or("-"),
                e
            );
            return StatusCode::OK.into_response();
        }
    };

    match event.trigger() {
        Some(trigger) => {
            let task = DeploymentTask::new(trigger, event.describe());
            info!(
                "Webhook delivery {}: {}, queueing deployment {}",
                delivery, task.origin, task.id
            );
            if let Err(e) = state.queue.submit(task) {
                error!("Failed to queue deployment: {}", e);
            }
        }
        None => {
            debug!("Webhook delivery {}: {}, nothing to do", delivery, event.describe());
        }
    }

    StatusCode::OK.into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
