//! Access token verification.
//!
//! Tokens are HS256 JWTs signed with `ACCESS_TOKEN_SECRET` by the account
//! service. Only verification lives here.

use crate::error::AppError;
use actix_web::{http::header, HttpRequest};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims carried by an access token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: Uuid,
    pub username: String,
    pub exp: usize,
}

#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "access token rejected");
                AppError::Unauthorized
            })
    }
}

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "unit-test-secret";

    fn token(secret: &str, user_id: Uuid, exp_offset: i64) -> String {
        let claims = Claims {
            user_id,
            username: "ada".into(),
            exp: (chrono::Utc::now().timestamp() + exp_offset) as usize,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token_yields_claims() {
        let user_id = Uuid::new_v4();
        let claims = TokenVerifier::new(SECRET)
            .verify(&token(SECRET, user_id, 3600))
            .unwrap();
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.username, "ada");
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let result = TokenVerifier::new(SECRET).verify(&token(SECRET, Uuid::new_v4(), -60));
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let result = TokenVerifier::new(SECRET).verify(&token("other", Uuid::new_v4(), 3600));
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(TokenVerifier::new(SECRET).verify("not.a.jwt").is_err());
    }

    #[test]
    fn test_bearer_token_extraction() {
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer abc.def.ghi"))
            .to_http_request();
        assert_eq!(bearer_token(&req), Some("abc.def.ghi"));

        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Basic dXNlcjpwYXNz"))
            .to_http_request();
        assert_eq!(bearer_token(&req), None);

        let req = TestRequest::default().to_http_request();
        assert_eq!(bearer_token(&req), None);
    }
}
