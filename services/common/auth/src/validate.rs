use async_trait::async_trait;
use serde_json::Value;

use crate::claims::Claims;
use crate::error::CallbackError;

/// Application credentials attached to an authenticated request.
pub type Credentials = serde_json::Map<String, Value>;

/// What a credential validator decided about a verified token.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationDecision {
    pub is_valid: bool,
    /// Must be a JSON object when `is_valid` is true.
    pub credentials: Option<Value>,
}

impl ValidationDecision {
    pub fn valid(credentials: impl Into<Value>) -> Self {
        Self {
            is_valid: true,
            credentials: Some(credentials.into()),
        }
    }

    pub fn invalid() -> Self {
        Self {
            is_valid: false,
            credentials: None,
        }
    }

    /// Reject while still reporting who the token claimed to be.
    pub fn invalid_with(credentials: impl Into<Value>) -> Self {
        Self {
            is_valid: false,
            credentials: Some(credentials.into()),
        }
    }
}

/// Maps verified claims (plus whatever context the key resolver produced) to
/// an accept/reject decision and the credentials handlers will see.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    async fn validate(
        &self,
        claims: Claims,
        extra_info: Option<Value>,
    ) -> Result<ValidationDecision, CallbackError>;
}
