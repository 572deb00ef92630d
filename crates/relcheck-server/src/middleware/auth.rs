use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::audit;
use crate::auth::{self, AuthContext, AuthError, KeyTable};
use crate::config::ApiKeyEntry;
use crate::error::ApiError;

#[derive(Clone)]
pub struct AuthState {
    keys: Option<Arc<KeyTable>>,
}

impl AuthState {
    pub fn dev_mode() -> Self {
        Self { keys: None }
    }

    /// Authentication is enforced only when at least one key is configured.
    pub fn from_entries(entries: &[ApiKeyEntry]) -> Self {
        let table = KeyTable::from_entries(entries);
        if table.is_empty() {
            Self::dev_mode()
        } else {
            Self {
                keys: Some(Arc::new(table)),
            }
        }
    }

    pub fn is_dev_mode(&self) -> bool {
        self.keys.is_none()
    }
}

fn skip_auth(path: &str) -> bool {
    matches!(path, "/healthz" | "/metrics")
}

pub async fn rest_auth_middleware(
    State(auth_state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if skip_auth(request.uri().path()) {
        return next.run(request).await;
    }

    let Some(keys) = auth_state.keys.as_ref() else {
        request.extensions_mut().insert(AuthContext {
            key_id: "dev".to_string(),
        });
        return next.run(request).await;
    };

    let raw_key = match bearer_token(&request) {
        Ok(key) => key.to_string(),
        Err(e) => return reject(e, None),
    };

    match auth::authenticate(&raw_key, keys) {
        Ok(ctx) => {
            audit::audit_auth_success(&ctx.key_id);
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(AuthError::Internal(msg)) => {
            tracing::error!(error = %msg, "api key verification failed");
            ApiError::Unauthenticated("invalid api key".to_string()).into_response()
        }
        Err(e) => {
            let key_id = auth::parse_api_key(&raw_key).ok().map(|(id, _)| id);
            reject(e, key_id)
        }
    }
}

fn bearer_token(request: &Request<Body>) -> Result<&str, AuthError> {
    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingHeader)?;
    header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidKeyFormat)
}

fn reject(error: AuthError, key_id: Option<&str>) -> Response {
    let reason = error.to_string();
    audit::audit_auth_failure(&reason, key_id);
    ApiError::Unauthenticated(reason).into_response()
}
