//! Authentication and authorization.
//!
//! A single middleware resolves the caller into an [`AuthContext`]
//! (`user_id`, `role`, `franchise_id`) once per request and injects it into
//! request extensions; handlers receive it by extractor. Role gates are
//! applied per router group via [`AuthRouterExt`].

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
    Router,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Caller role resolved from the token.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, utoipa::ToSchema,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Franchise,
}

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    /// Present for franchise users, absent for admins.
    pub franchise_id: Option<i64>,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Authorization context resolved once per request.
#[derive(Debug, Clone, Serialize)]
pub struct AuthContext {
    pub user_id: String,
    pub role: Role,
    pub franchise_id: Option<i64>,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Fails with Forbidden unless the caller is an admin.
    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "administrator role required".into(),
            ))
        }
    }

    /// The franchise the caller acts for. Admins have none.
    pub fn require_franchise(&self) -> Result<i64, ServiceError> {
        self.franchise_id.ok_or_else(|| {
            ServiceError::Forbidden("caller is not associated with a franchise".into())
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| ServiceError::Unauthorized("missing or invalid bearer token".into()))
    }
}

/// Token issuance and validation.
#[derive(Clone)]
pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl_secs: usize,
}

impl AuthService {
    pub fn new(jwt_secret: &str, token_ttl_secs: usize) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            token_ttl_secs,
        }
    }

    /// Issue a token for a user. Franchise users must carry their franchise id.
    pub fn issue_token(
        &self,
        user_id: &str,
        role: Role,
        franchise_id: Option<i64>,
    ) -> Result<String, ServiceError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            franchise_id,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.token_ttl_secs as i64,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::AuthError(format!("failed to sign token: {}", e)))
    }

    /// Validate a token and resolve the caller's context.
    pub fn resolve(&self, token: &str) -> Result<AuthContext, ServiceError> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| ServiceError::Unauthorized(format!("invalid token: {}", e)))?;

        let claims = data.claims;
        if claims.role == Role::Franchise && claims.franchise_id.is_none() {
            return Err(ServiceError::Unauthorized(
                "franchise token missing franchise_id claim".into(),
            ));
        }

        Ok(AuthContext {
            user_id: claims.sub,
            role: claims.role,
            franchise_id: claims.franchise_id,
        })
    }
}

/// Middleware resolving the bearer token into an [`AuthContext`].
///
/// A request without an Authorization header passes through without a
/// context; role gates and the extractor reject it downstream. A present but
/// invalid token is rejected immediately.
pub async fn auth_context_middleware(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned);

    if let Some(token) = bearer {
        match auth.resolve(&token) {
            Ok(ctx) => {
                request.extensions_mut().insert(ctx);
            }
            Err(err) => return err.into_response(),
        }
    }

    next.run(request).await
}

async fn require_role_middleware(role: Role, request: Request, next: Next) -> Response {
    match request.extensions().get::<AuthContext>() {
        None => ServiceError::Unauthorized("missing or invalid bearer token".into())
            .into_response(),
        Some(ctx) if ctx.role != role => {
            ServiceError::Forbidden(format!("{} role required", role)).into_response()
        }
        Some(_) => next.run(request).await,
    }
}

/// Router extension applying role gates to a route group.
pub trait AuthRouterExt<S> {
    /// Require an authenticated caller with the given role.
    fn with_role(self, role: Role) -> Self;
}

impl<S> AuthRouterExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_role(self, role: Role) -> Self {
        self.layer(axum::middleware::from_fn(
            move |request: Request, next: Next| require_role_middleware(role, request, next),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::new(&"s".repeat(64), 3600)
    }

    #[test]
    fn token_round_trip_preserves_context() {
        let auth = service();
        let token = auth
            .issue_token("user-1", Role::Franchise, Some(42))
            .unwrap();
        let ctx = auth.resolve(&token).unwrap();
        assert_eq!(ctx.user_id, "user-1");
        assert_eq!(ctx.role, Role::Franchise);
        assert_eq!(ctx.franchise_id, Some(42));
    }

    #[test]
    fn franchise_token_without_franchise_id_is_rejected() {
        let auth = service();
        let token = auth.issue_token("user-2", Role::Franchise, None).unwrap();
        let err = auth.resolve(&token).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let auth = service();
        let other = AuthService::new(&"x".repeat(64), 3600);
        let token = other.issue_token("user-3", Role::Admin, None).unwrap();
        assert!(auth.resolve(&token).is_err());
    }

    #[test]
    fn role_checks() {
        let admin = AuthContext {
            user_id: "a".into(),
            role: Role::Admin,
            franchise_id: None,
        };
        assert!(admin.require_admin().is_ok());
        assert!(admin.require_franchise().is_err());

        let franchise = AuthContext {
            user_id: "f".into(),
            role: Role::Franchise,
            franchise_id: Some(7),
        };
        assert!(franchise.require_admin().is_err());
        assert_eq!(franchise.require_franchise().unwrap(), 7);
    }

    #[test]
    fn role_parses_from_lowercase() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("franchise".parse::<Role>().unwrap(), Role::Franchise);
        assert!("superuser".parse::<Role>().is_err());
    }
}
