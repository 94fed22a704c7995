//! HTTP Basic authentication for the admin API.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::WWW_AUTHENTICATE, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{authorization::Basic, Authorization, HeaderMapExt};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::AdminConfig;

use super::error::ApiError;

/// Configured admin credentials
#[derive(Clone)]
pub struct AdminCredentials {
    username: String,
    password_digest: [u8; 32],
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials").field("username", &self.username).finish_non_exhaustive()
    }
}

impl AdminCredentials {
    pub fn new<U: Into<String>>(username: U, password: &str) -> Self {
        Self { username: username.into(), password_digest: digest(password) }
    }

    fn verify(&self, username: &str, password: &str) -> bool {
        username == self.username && digest(password) == self.password_digest
    }
}

impl From<&AdminConfig> for AdminCredentials {
    fn from(config: &AdminConfig) -> Self {
        Self::new(config.username.clone(), &config.password)
    }
}

/// Authenticated caller, available to handlers as a request extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminUser(pub String);

/// Middleware rejecting requests without valid Basic credentials
pub async fn require_basic_auth(
    State(credentials): State<Arc<AdminCredentials>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let Some(Authorization(basic)) = request.headers().typed_get::<Authorization<Basic>>() else {
        debug!(http.method = %method, http.path = %path, "Missing basic credentials");
        return challenge(ApiError::unauthorized("missing basic authentication credentials"));
    };

    if !credentials.verify(basic.username(), basic.password()) {
        warn!(
            http.method = %method,
            http.path = %path,
            user = %basic.username(),
            "Admin authentication failed"
        );
        return challenge(ApiError::unauthorized("invalid credentials"));
    }

    request.extensions_mut().insert(AdminUser(basic.username().to_string()));
    next.run(request).await
}

fn challenge(err: ApiError) -> Response {
    let mut response = err.into_response();
    response
        .headers_mut()
        .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Basic realm=\"flowgate\""));
    response
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_username_and_password() {
        let credentials = AdminCredentials::new("admin", "s3cret");
        assert!(credentials.verify("admin", "s3cret"));
        assert!(!credentials.verify("admin", "wrong"));
        assert!(!credentials.verify("root", "s3cret"));
    }

    #[test]
    fn debug_hides_password() {
        let credentials = AdminCredentials::new("admin", "s3cret");
        assert!(!format!("{:?}", credentials).contains("s3cret"));
    }
}
