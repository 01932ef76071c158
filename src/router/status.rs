//! Process health reporting.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use serde::Serialize;
use sysinfo::{Pid, System};

use crate::AppState;

const MEMORY_WARN_RATIO: f64 = 0.95;
const MEMORY_ERROR_RATIO: f64 = 0.98;

/// Outcome of one liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Warn,
    Error,
}

#[derive(Debug, Serialize)]
pub struct Checks {
    transport: CheckStatus,
    memory: CheckStatus,
    disk: CheckStatus,
}

/// Basic health verdict.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    status: &'static str,
    timestamp: String,
    uptime: u64,
    version: &'static str,
    environment: String,
    email_provider: String,
    checks: Checks,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostReport {
    hostname: Option<String>,
    os: Option<String>,
    kernel_version: Option<String>,
    cpus: usize,
    total_memory: u64,
    used_memory: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessReport {
    pid: u32,
    memory: u64,
}

/// Detailed metrics, no verdict attached.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedHealth {
    timestamp: String,
    uptime: u64,
    version: &'static str,
    environment: String,
    email_provider: String,
    system: HostReport,
    process: ProcessReport,
}

/// Memory pressure against the two fixed thresholds.
fn memory_status(used: u64, total: u64) -> CheckStatus {
    if total == 0 {
        return CheckStatus::Error;
    }
    let ratio = used as f64 / total as f64;
    if ratio > MEMORY_ERROR_RATIO {
        CheckStatus::Error
    } else if ratio > MEMORY_WARN_RATIO {
        CheckStatus::Warn
    } else {
        CheckStatus::Ok
    }
}

/// Filesystem reachability.
fn disk_status() -> CheckStatus {
    if std::fs::metadata(".").is_ok() {
        CheckStatus::Ok
    } else {
        CheckStatus::Error
    }
}

/// Basic liveness verdict, AND-reduction of the three checks.
pub async fn health(
    State(state): State<AppState>,
) -> (StatusCode, Json<Health>) {
    let mut system = System::new();
    system.refresh_memory();

    let checks = Checks {
        // The handle was constructed at startup or the process would
        // not be serving.
        transport: CheckStatus::Ok,
        memory: memory_status(system.used_memory(), system.total_memory()),
        disk: disk_status(),
    };
    let healthy = [checks.transport, checks.memory, checks.disk]
        .iter()
        .all(|check| *check != CheckStatus::Error);

    let body = Health {
        status: if healthy { "healthy" } else { "unhealthy" },
        timestamp: Utc::now().to_rfc3339(),
        uptime: state.started.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.to_string(),
        email_provider: state.config.email_provider.to_string(),
        checks,
    };
    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(body))
}

/// Host and process metrics.
pub async fn health_detailed(
    State(state): State<AppState>,
) -> Json<DetailedHealth> {
    let mut system = System::new_all();
    system.refresh_all();

    let pid = Pid::from_u32(std::process::id());
    let process_memory = system
        .process(pid)
        .map(|process| process.memory())
        .unwrap_or_default();

    Json(DetailedHealth {
        timestamp: Utc::now().to_rfc3339(),
        uptime: state.started.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.to_string(),
        email_provider: state.config.email_provider.to_string(),
        system: HostReport {
            hostname: System::host_name(),
            os: System::long_os_version(),
            kernel_version: System::kernel_version(),
            cpus: system.cpus().len(),
            total_memory: system.total_memory(),
            used_memory: system.used_memory(),
        },
        process: ProcessReport {
            pid: std::process::id(),
            memory: process_memory,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::*;
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;

    #[test]
    fn memory_thresholds() {
        assert_eq!(memory_status(94, 100), CheckStatus::Ok);
        assert_eq!(memory_status(95, 100), CheckStatus::Ok);
        assert_eq!(memory_status(96, 100), CheckStatus::Warn);
        assert_eq!(memory_status(98, 100), CheckStatus::Warn);
        assert_eq!(memory_status(99, 100), CheckStatus::Error);
        assert_eq!(memory_status(0, 0), CheckStatus::Error);
    }

    #[test]
    fn warn_does_not_fail_the_verdict() {
        let checks = [CheckStatus::Ok, CheckStatus::Warn, CheckStatus::Ok];
        assert!(checks.iter().all(|check| *check != CheckStatus::Error));
    }

    #[tokio::test]
    async fn health_reports_the_provider_and_checks() {
        let state = router::state();
        let app = app(state.clone());

        let response = make_request(
            Some(&state),
            app,
            Method::GET,
            "/health",
            String::new(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["emailProvider"], "sandbox");
        assert_eq!(body["environment"], "development");
        assert_eq!(body["checks"]["transport"], "ok");
        assert_eq!(body["checks"]["disk"], "ok");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn health_does_not_require_an_api_key() {
        let state = router::state();
        let app = app(state);

        let response =
            make_request(None, app, Method::GET, "/health", String::new())
                .await;

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn detailed_health_reports_host_metrics() {
        let state = router::state();
        let app = app(state.clone());

        let response = make_request(
            Some(&state),
            app,
            Method::GET,
            "/health/detailed",
            String::new(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert!(body["system"]["totalMemory"].as_u64().unwrap() > 0);
        assert!(body["process"]["pid"].as_u64().unwrap() > 0);
    }
}
