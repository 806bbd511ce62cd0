use actix_web::HttpRequest;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

/// Claims carried by the HS256 bearer tokens the auth service issues.
/// This service only validates tokens; it never mints them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
    pub exp: i64,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// Extract and validate the `Authorization: Bearer <jwt>` header.
pub fn authenticate(req: &HttpRequest, secret: &str) -> Result<Claims, AppError> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing Authorization header".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("malformed Authorization header".into()))?;

    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| AppError::Unauthorized(format!("invalid token: {e}")))?;

    Ok(data.claims)
}

/// Same as [`authenticate`], additionally requiring the admin role.
pub fn authenticate_admin(req: &HttpRequest, secret: &str) -> Result<Claims, AppError> {
    let claims = authenticate(req, secret)?;
    if claims.is_admin() {
        Ok(claims)
    } else {
        Err(AppError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "unit-test-secret";

    fn token_for(role: &str, ttl: Duration) -> String {
        let claims = Claims {
            sub: Uuid::new_v4(),
            username: "tester".into(),
            email: "tester@example.com".into(),
            role: role.into(),
            exp: (Utc::now() + ttl).timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn accepts_a_valid_bearer_token() {
        let req = TestRequest::default()
            .insert_header((
                "Authorization",
                format!("Bearer {}", token_for("user", Duration::hours(1))),
            ))
            .to_http_request();
        let claims = authenticate(&req, SECRET).unwrap();
        assert_eq!(claims.username, "tester");
        assert!(!claims.is_admin());
    }

    #[test]
    fn rejects_missing_header() {
        let req = TestRequest::default().to_http_request();
        assert!(matches!(
            authenticate(&req, SECRET),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn rejects_non_bearer_scheme() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Basic abc123"))
            .to_http_request();
        assert!(matches!(
            authenticate(&req, SECRET),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let req = TestRequest::default()
            .insert_header((
                "Authorization",
                format!("Bearer {}", token_for("user", Duration::hours(1))),
            ))
            .to_http_request();
        assert!(matches!(
            authenticate(&req, "another-secret"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn rejects_expired_token() {
        let req = TestRequest::default()
            .insert_header((
                "Authorization",
                format!("Bearer {}", token_for("user", Duration::hours(-1))),
            ))
            .to_http_request();
        assert!(matches!(
            authenticate(&req, SECRET),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn admin_gate_rejects_plain_users() {
        let req = TestRequest::default()
            .insert_header((
                "Authorization",
                format!("Bearer {}", token_for("user", Duration::hours(1))),
            ))
            .to_http_request();
        assert!(matches!(
            authenticate_admin(&req, SECRET),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn admin_gate_accepts_admins() {
        let req = TestRequest::default()
            .insert_header((
                "Authorization",
                format!("Bearer {}", token_for("admin", Duration::hours(1))),
            ))
            .to_http_request();
        let claims = authenticate_admin(&req, SECRET).unwrap();
        assert!(claims.is_admin());
    }
}
