//! Request logging middleware

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;

/// Prefix of health endpoints probed by load balancers and uptime checks
const HEALTH_PREFIX: &str = "/health";

fn is_health_check(path: &str) -> bool {
    path == "/" || path.starts_with(HEALTH_PREFIX)
}

/// Successful health checks are noise; everything else is logged.
pub fn should_log(path: &str, status: StatusCode) -> bool {
    !(status.is_success() && is_health_check(path))
}

/// Log one line per request with method, path, status and latency.
pub async fn log_access(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    let status = response.status();
    if should_log(&path, status) {
        let elapsed = start.elapsed().as_millis();
        if status.is_server_error() {
            log::warn!("{} {} {} {}ms", method, path, status.as_u16(), elapsed);
        } else {
            log::info!("{} {} {} {}ms", method, path, status.as_u16(), elapsed);
        }
    }
    response
}
