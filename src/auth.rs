use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    models::{Role, User},
    repository::RepositoryState,
};

/// Header accepted in `Env::Local` to impersonate an existing user without a JWT.
pub const LOCAL_USER_HEADER: &str = "x-user-id";

/// Claims
///
/// Payload expected inside the HS256 JSON Web Token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's id in the `users` table.
    pub sub: Uuid,
    /// Expiration time; always validated.
    pub exp: usize,
    /// Issued at.
    pub iat: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request. The role is read from the
/// database on every request, so a demotion takes effect immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Rejects customers with 403; staff and admin pass.
    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "Only staff or admin can perform this action".to_string(),
            ))
        }
    }

    fn from_user(user: User) -> Result<Self, ApiError> {
        let role = user
            .role
            .parse::<Role>()
            .map_err(|e| ApiError::Unauthorized(e.to_string()))?;
        Ok(AuthUser { id: user.id, role })
    }
}

/// resolve
///
/// Shared by the mandatory and optional extractors:
/// - `Ok(None)`: the request carries no credentials at all (guest);
/// - `Ok(Some(_))`: credentials are valid and belong to an existing user;
/// - `Err(_)`: credentials were supplied but are invalid (401) or the lookup failed (500).
async fn resolve(
    parts: &Parts,
    repo: &RepositoryState,
    config: &AppConfig,
) -> Result<Option<AuthUser>, ApiError> {
    // Local development bypass, guarded by the Env check. A bad header falls
    // through to the JWT flow.
    if config.env == Env::Local {
        let bypass_id = parts
            .headers
            .get(LOCAL_USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| Uuid::parse_str(raw).ok());

        if let Some(user_id) = bypass_id {
            if let Some(user) = repo.get_user(user_id).await? {
                return AuthUser::from_user(user).map(Some);
            }
        }
    }

    let Some(auth_header) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let token = auth_header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("Malformed authorization header".to_string()))?;

    let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
        let reason = match e.kind() {
            ErrorKind::ExpiredSignature => "Token expired",
            _ => "Invalid token",
        };
        ApiError::Unauthorized(reason.to_string())
    })?;

    // The token is valid but the user may have been removed since it was issued.
    let user = repo
        .get_user(token_data.claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Unknown user".to_string()))?;

    AuthUser::from_user(user).map(Some)
}

/// Mandatory authentication: missing credentials are rejected with 401.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        resolve(parts, &repo, &config)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))
    }
}

/// Optional authentication (`Option<AuthUser>`): guests get `None`, but invalid
/// credentials are still rejected with 401.
impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        resolve(parts, &repo, &config).await
    }
}
