use actix_web::HttpResponse;
use thiserror::Error;

use crate::domain::DomainError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NotFound => AppError::NotFound,
            DomainError::InvalidInput(msg) => AppError::Validation(msg),
            DomainError::IllegalTransition { .. } => AppError::Conflict(e.to_string()),
            DomainError::Conflict(msg) => AppError::Conflict(msg),
            DomainError::OrderRefExhausted => AppError::Internal(e.to_string()),
            DomainError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(e: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};
        match e {
            Error::NotFound => AppError::NotFound,
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                AppError::Conflict(format!("duplicate record: {}", info.message()))
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<r2d2::Error> for AppError {
    fn from(e: r2d2::Error) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(e: actix_web::error::BlockingError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Upstream(e.to_string())
    }
}

impl actix_web::ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        // One envelope shape for every module.
        let body = serde_json::json!({ "error": self.to_string() });
        match self {
            AppError::Validation(_) => HttpResponse::BadRequest().json(body),
            AppError::Unauthorized(_) => HttpResponse::Unauthorized().json(body),
            AppError::Forbidden => HttpResponse::Forbidden().json(body),
            AppError::NotFound => HttpResponse::NotFound().json(body),
            AppError::Conflict(_) => HttpResponse::Conflict().json(body),
            AppError::Upstream(_) => HttpResponse::BadGateway().json(body),
            AppError::Internal(msg) => {
                log::error!("internal error: {msg}");
                HttpResponse::InternalServerError()
                    .json(serde_json::json!({ "error": "Internal error" }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::ResponseError;

    #[test]
    fn validation_returns_400() {
        let resp = AppError::Validation("bad".into()).error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unauthorized_returns_401_and_forbidden_403() {
        assert_eq!(
            AppError::Unauthorized("no token".into())
                .error_response()
                .status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Forbidden.error_response().status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn not_found_returns_404() {
        assert_eq!(
            AppError::NotFound.error_response().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn conflict_returns_409() {
        let resp = AppError::Conflict("already paid".into()).error_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn upstream_returns_502_and_internal_500() {
        assert_eq!(
            AppError::Upstream("gateway down".into())
                .error_response()
                .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::Internal("oops".into()).error_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_error_message_is_not_leaked() {
        let err = AppError::Internal("secret connection string".into());
        assert_eq!(err.to_string(), "Internal error: secret connection string");
        // The HTTP body must stay generic; to_string is for logs only.
    }

    #[test]
    fn illegal_transition_maps_to_conflict() {
        let app: AppError = DomainError::IllegalTransition {
            from: "Cancelled",
            to: "Pending",
        }
        .into();
        assert!(matches!(app, AppError::Conflict(_)));
    }

    #[test]
    fn domain_not_found_maps_to_app_not_found() {
        let app: AppError = DomainError::NotFound.into();
        assert!(matches!(app, AppError::NotFound));
    }

    #[test]
    fn diesel_not_found_maps_to_404() {
        let app: AppError = diesel::result::Error::NotFound.into();
        assert!(matches!(app, AppError::NotFound));
    }

    #[test]
    fn order_ref_exhaustion_is_internal() {
        let app: AppError = DomainError::OrderRefExhausted.into();
        assert!(matches!(app, AppError::Internal(_)));
    }
}
