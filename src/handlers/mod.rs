pub mod orders;
pub mod payments;

use actix_web::HttpResponse;
use chrono::Utc;

/// GET /health — liveness probe for deploy tooling; no auth.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up")),
    tag = "health"
)]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
