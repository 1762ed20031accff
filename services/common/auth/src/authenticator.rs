use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{StrategyOptions, StrategySettings};
use crate::error::{AuthError, AuthResult, ConfigError};
use crate::validate::Credentials;

/// Result of running the bearer strategy against one request.
#[derive(Debug)]
pub enum AuthOutcome {
    Authenticated(Credentials),
    Rejected(AuthError),
}

impl AuthOutcome {
    pub fn into_result(self) -> AuthResult<Credentials> {
        match self {
            AuthOutcome::Authenticated(credentials) => Ok(credentials),
            AuthOutcome::Rejected(err) => Err(err),
        }
    }
}

/// A configured JWT bearer strategy. Cheap to clone; every clone shares the
/// same immutable settings.
#[derive(Debug, Clone)]
pub struct JwtStrategy {
    settings: Arc<StrategySettings>,
}

impl JwtStrategy {
    pub fn new(options: StrategyOptions) -> Result<Self, ConfigError> {
        let settings = StrategySettings::try_from(options)?;
        Ok(Self {
            settings: Arc::new(settings),
        })
    }

    /// Build a strategy from a JSON options object.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        Self::new(StrategyOptions::from_value(value)?)
    }

    pub fn settings(&self) -> &StrategySettings {
        &self.settings
    }

    pub async fn authenticate(&self, request: &Parts) -> AuthOutcome {
        match self.run(request).await {
            Ok(credentials) => {
                debug!(path = %request.uri.path(), "bearer token accepted");
                AuthOutcome::Authenticated(credentials)
            }
            Err(err) => {
                let status = err.status();
                if status.is_server_error()
                    || matches!(
                        err,
                        AuthError::KeyResolution(_) | AuthError::CredentialValidation(_)
                    )
                {
                    warn!(
                        path = %request.uri.path(),
                        status = status.as_u16(),
                        tags = ?err.log_tags(),
                        error = %err,
                        "bearer authentication failed"
                    );
                } else {
                    debug!(
                        path = %request.uri.path(),
                        status = status.as_u16(),
                        error = %err,
                        "bearer token rejected"
                    );
                }
                AuthOutcome::Rejected(err)
            }
        }
    }

    async fn run(&self, request: &Parts) -> AuthResult<Credentials> {
        let token = bearer_token(&request.headers)?;

        let resolved = self
            .settings
            .key_resolver()
            .resolve(request, token)
            .await
            .map_err(AuthError::KeyResolution)?;

        let claims = self.settings.verifier().verify(token, &resolved.key)?;

        let Some(validator) = self.settings.validator() else {
            return Ok(claims);
        };
        let decision = validator
            .validate(claims, resolved.extra_info)
            .await
            .map_err(AuthError::CredentialValidation)?;

        if !decision.is_valid {
            return Err(AuthError::InvalidCredentials {
                credentials: decision.credentials,
            });
        }

        match decision.credentials {
            Some(Value::Object(credentials)) => Ok(credentials),
            _ => Err(AuthError::MalformedCredentials),
        }
    }
}

/// Extract the compact token from `Authorization: Bearer <token>`.
///
/// The value is split on whitespace runs; leading or trailing whitespace
/// yields an empty part, so `" Bearer x"` counts as three parts. A value that
/// is not visible ASCII (obs-text bytes) is rejected as a malformed header
/// (400) rather than being handed to the verifier.
pub fn bearer_token(headers: &HeaderMap) -> AuthResult<&str> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Err(AuthError::MissingCredentials);
    };
    let raw = value.to_str().map_err(|_| AuthError::MalformedHeader)?;
    if raw.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    let mut parts = Vec::with_capacity(2);
    if raw.starts_with(char::is_whitespace) {
        parts.push("");
    }
    parts.extend(raw.split_whitespace());
    if raw.ends_with(char::is_whitespace) {
        parts.push("");
    }

    let [scheme, token] = parts[..] else {
        return Err(AuthError::MalformedHeader);
    };
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MissingCredentials);
    }
    if token.split('.').count() != 3 {
        return Err(AuthError::MalformedHeader);
    }

    Ok(token)
}
