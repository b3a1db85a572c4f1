//! Liveness endpoint.

use axum::{Json, http::StatusCode};
use serde::{Deserialize, Serialize};

/// Service name reported by [`health_check`].
pub const SERVICE_NAME: &str = "boxoffice";

/// Liveness report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Always `"ok"` while the process serves requests
    pub status: String,
    /// Service name
    pub service: String,
    /// Crate version of the running binary
    pub version: String,
}

/// Report that the server is up and which build is answering.
///
/// Storage is not touched; a reachable database is not part of liveness.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<HealthReport>) {
    let report = HealthReport {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    (StatusCode::OK, Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_reports_service_identity() {
        let (status, Json(report)) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report.status, "ok");
        assert_eq!(report.service, SERVICE_NAME);
        assert_eq!(report.version, env!("CARGO_PKG_VERSION"));
    }
}
