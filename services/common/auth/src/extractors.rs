use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde_json::Value;

use crate::claims;
use crate::error::AuthError;
use crate::validate::Credentials;

/// Credentials of an authenticated request, placed in the request extensions
/// by [`crate::middleware::require_jwt`].
#[derive(Debug, Clone, PartialEq)]
pub struct AuthContext {
    pub credentials: Credentials,
}

impl AuthContext {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.credentials.get(name)
    }

    pub fn string_claim(&self, name: &str) -> Option<&str> {
        claims::string_claim(&self.credentials, name)
    }

    pub fn scopes(&self) -> Vec<String> {
        claims::scopes(&self.credentials)
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes().iter().any(|granted| granted == scope)
    }

    pub fn into_credentials(self) -> Credentials {
        self.credentials
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AuthError::MissingCredentials)
    }
}

/// Credentials a validator attached to a rejected request. Only routes in
/// [`crate::middleware::AuthMode::Try`] see them; the request itself stays
/// unauthenticated.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedCredentials(pub Value);

#[async_trait]
impl<S> FromRequestParts<S> for RejectedCredentials
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RejectedCredentials>()
            .cloned()
            .ok_or(AuthError::MissingCredentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use serde_json::json;

    fn context(value: Value) -> AuthContext {
        AuthContext::new(value.as_object().cloned().expect("object"))
    }

    #[tokio::test]
    async fn extracts_context_from_extensions() {
        let (mut parts, _) = Request::new(()).into_parts();
        let expected = context(json!({"username": "john"}));
        parts.extensions.insert(expected.clone());

        let extracted = AuthContext::from_request_parts(&mut parts, &())
            .await
            .expect("context present");
        assert_eq!(extracted, expected);
        assert_eq!(extracted.string_claim("username"), Some("john"));
    }

    #[tokio::test]
    async fn missing_context_is_unauthorized() {
        let (mut parts, _) = Request::new(()).into_parts();
        let err = AuthContext::from_request_parts(&mut parts, &())
            .await
            .expect_err("no context");
        assert!(err.is_missing());
    }

    #[test]
    fn scope_helpers_read_scope_claim() {
        let auth = context(json!({"scope": "read:items write:items"}));
        assert!(auth.has_scope("write:items"));
        assert!(!auth.has_scope("admin"));
    }

    #[tokio::test]
    async fn rejected_credentials_are_read_from_extensions() {
        let (mut parts, _) = Request::new(()).into_parts();
        assert!(RejectedCredentials::from_request_parts(&mut parts, &())
            .await
            .is_err());

        parts
            .extensions
            .insert(RejectedCredentials(json!({"user": "doe"})));
        let extracted = RejectedCredentials::from_request_parts(&mut parts, &())
            .await
            .expect("credentials present");
        assert_eq!(extracted, RejectedCredentials(json!({"user": "doe"})));
    }
}
