// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    /// Individual health checks and their results.
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// "configured", or "development" when the built-in token secret is in use.
    pub token_secret: String,
    /// Number of login challenges currently held.
    pub live_challenges: usize,
}

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Health check endpoint handler.
///
/// A server running with the development token secret reports "degraded"
/// but still answers 200 so local setups stay usable.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service status", body = ReadyResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let token_secret = if state.uses_dev_secret {
        "development"
    } else {
        "configured"
    };

    let response = ReadyResponse {
        status: if state.uses_dev_secret { "degraded" } else { "ok" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            token_secret: token_secret.to_string(),
            live_challenges: state.challenges.len(),
        },
    };

    (StatusCode::OK, Json(response))
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness probe handler.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = ReadyResponse)
    )
)]
pub async fn readiness(state: State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    health(state).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dev_secret_reports_degraded() {
        let (status, Json(body)) = health(State(AppState::default())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "degraded");
        assert_eq!(body.checks.token_secret, "development");
        assert_eq!(body.checks.live_challenges, 0);
    }

    #[tokio::test]
    async fn configured_secret_reports_ok() {
        let config = crate::config::ServerConfig {
            jwt_secret: "a-real-secret".to_string(),
            ..Default::default()
        };
        let (_, Json(body)) = health(State(AppState::new(&config))).await;
        assert_eq!(body.status, "ok");
    }
}
