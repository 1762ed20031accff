use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::error::error_response;
use crate::AuthContext;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("Insufficient scope")]
    InsufficientScope { required: Vec<String> },
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        error_response(StatusCode::FORBIDDEN, Some(self.to_string()), None)
    }
}

/// Passes when no scope is required or the credentials carry at least one of
/// the required scopes.
pub fn ensure_scope<S>(auth: &AuthContext, required: &[S]) -> Result<(), GuardError>
where
    S: AsRef<str>,
{
    if required.is_empty() {
        return Ok(());
    }

    let granted = auth.scopes();
    let has_scope = required
        .iter()
        .any(|scope| granted.iter().any(|g| g == scope.as_ref()));

    if has_scope {
        Ok(())
    } else {
        Err(GuardError::InsufficientScope {
            required: required.iter().map(|s| s.as_ref().to_string()).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn auth(scope: serde_json::Value) -> AuthContext {
        AuthContext::new(json!({ "scope": scope }).as_object().cloned().unwrap())
    }

    #[test]
    fn any_required_scope_is_enough() {
        let ctx = auth(json!(["read", "write"]));
        assert!(ensure_scope(&ctx, &["admin", "write"]).is_ok());
        assert!(ensure_scope::<&str>(&ctx, &[]).is_ok());
    }

    #[test]
    fn missing_scope_is_forbidden() {
        let err = ensure_scope(&auth(json!("read")), &["admin"]).unwrap_err();
        assert_eq!(
            err,
            GuardError::InsufficientScope {
                required: vec!["admin".to_string()]
            }
        );
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }
}
