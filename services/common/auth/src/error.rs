use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Challenge scheme advertised on 401 responses.
pub const BEARER: &str = "Bearer";

const INTERNAL_MESSAGE: &str = "An internal server error occurred";

/// Rejected strategy options. Messages use the `child "<field>" fails because [..]`
/// schema-validation format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("\"jwt auth strategy options\" must be an object")]
    NotAnObject,
    #[error("child \"key\" fails because [\"key\" is required]")]
    MissingKey,
    #[error("child \"key\" fails because [\"key\" must be a buffer or a string, \"key\" must be a Function]")]
    InvalidKey,
    #[error("child \"key\" fails because [{0}]")]
    KeyDecode(String),
    #[error("child \"validateFunc\" fails because [\"validateFunc\" must be a Function]")]
    ValidatorNotAFunction,
    #[error("child \"algorithms\" fails because [\"algorithms\" must be an array]")]
    AlgorithmsNotAnArray,
    #[error("child \"algorithms\" fails because [\"algorithms\" at position {0} fails because [\"{0}\" must be a string]]")]
    AlgorithmNotAString(usize),
    #[error("child \"algorithms\" fails because [\"{0}\" is not a supported algorithm]")]
    UnknownAlgorithm(String),
    #[error("child \"{0}\" fails because [\"{0}\" must be a string, \"{0}\" must be an array]")]
    InvalidExpectation(&'static str),
    #[error("child \"{0}\" fails because [\"{0}\" must be a string]")]
    NotAString(&'static str),
    #[error("child \"{0}\" fails because [\"{0}\" must be a boolean]")]
    NotABoolean(&'static str),
    #[error("child \"{0}\" fails because [\"{0}\" must be a non-negative integer]")]
    NotSeconds(&'static str),
    #[error("\"{0}\" is not allowed")]
    UnknownOption(String),
}

/// Why the token verifier refused a token. `Display` is the exact reason text
/// appended to `JSON Web Token validation failed: `.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("jwt malformed")]
    Malformed,
    #[error("invalid token")]
    InvalidToken,
    #[error("secret or public key must be provided")]
    MissingKey,
    #[error("{0}")]
    InvalidKey(String),
    #[error("jwt signature is required")]
    MissingSignature,
    #[error("invalid algorithm")]
    InvalidAlgorithm,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid nbf value")]
    InvalidNotBefore,
    #[error("jwt not active")]
    NotActive,
    #[error("invalid exp value")]
    InvalidExpiry,
    #[error("jwt expired")]
    Expired,
    #[error("jwt audience invalid. expected: {0}")]
    Audience(String),
    #[error("jwt issuer invalid. expected: {0}")]
    Issuer(String),
    #[error("jwt subject invalid. expected: {0}")]
    Subject(String),
    #[error("jwt jwtid invalid. expected: {0}")]
    JwtId(String),
    #[error("iat required when maxAge is specified")]
    MissingIssuedAt,
    #[error("maxAge exceeded")]
    MaxAgeExceeded,
}

/// Failure raised by application code plugged into the strategy (key
/// resolvers and credential validators).
///
/// A status set here is preserved all the way to the response, so an
/// application-level "forbidden" stays a 403. Without one the failure is
/// treated as an internal error.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CallbackError {
    status: Option<StatusCode>,
    message: String,
    tags: Vec<String>,
    credentials: Option<Value>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl CallbackError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            tags: Vec::new(),
            credentials: None,
            source: None,
        }
    }

    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            ..Self::new(message)
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::FORBIDDEN, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::UNAUTHORIZED, message)
    }

    /// Wrap an arbitrary error. The result carries no status and maps to 500.
    pub fn from_error<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let message = err.to_string();
        Self {
            source: Some(Box::new(err)),
            ..Self::new(message)
        }
    }

    pub fn tagged<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_credentials(mut self, credentials: impl Into<Value>) -> Self {
        self.credentials = Some(credentials.into());
        self
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn credentials(&self) -> Option<&Value> {
        self.credentials.as_ref()
    }
}

/// Every way a request can fail bearer authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer credentials")]
    MissingCredentials,
    #[error("Bad HTTP authentication header format")]
    MalformedHeader,
    #[error("key resolution failed: {0}")]
    KeyResolution(#[source] CallbackError),
    #[error("JSON Web Token validation failed: {0}")]
    TokenVerification(#[from] VerifyError),
    #[error("credential validation failed: {0}")]
    CredentialValidation(#[source] CallbackError),
    #[error("Invalid token")]
    InvalidCredentials { credentials: Option<Value> },
    #[error("Bad credentials object received for jwt auth validation")]
    MalformedCredentials,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingCredentials
            | AuthError::TokenVerification(_)
            | AuthError::InvalidCredentials { .. } => StatusCode::UNAUTHORIZED,
            AuthError::MalformedHeader => StatusCode::BAD_REQUEST,
            AuthError::KeyResolution(err) | AuthError::CredentialValidation(err) => {
                err.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            AuthError::MalformedCredentials => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message intended for the client. A missing credential carries none.
    pub fn message(&self) -> Option<String> {
        match self {
            AuthError::MissingCredentials => None,
            AuthError::KeyResolution(err) | AuthError::CredentialValidation(err) => {
                Some(err.message().to_owned())
            }
            other => Some(other.to_string()),
        }
    }

    pub fn challenge(&self) -> Option<&'static str> {
        (self.status() == StatusCode::UNAUTHORIZED).then_some(BEARER)
    }

    pub fn log_tags(&self) -> Vec<String> {
        match self {
            AuthError::KeyResolution(err) => err.tags().to_vec(),
            AuthError::CredentialValidation(err) if err.tags().is_empty() => {
                vec!["auth".to_string(), "jwt".to_string()]
            }
            AuthError::CredentialValidation(err) => err.tags().to_vec(),
            AuthError::MalformedCredentials => vec!["credentials".to_string()],
            _ => Vec::new(),
        }
    }

    /// Credentials the application attached to a rejection, if any.
    pub fn credentials(&self) -> Option<&Value> {
        match self {
            AuthError::CredentialValidation(err) => err.credentials(),
            AuthError::InvalidCredentials { credentials } => credentials.as_ref(),
            _ => None,
        }
    }

    /// True when the request simply did not present bearer credentials.
    pub fn is_missing(&self) -> bool {
        matches!(self, AuthError::MissingCredentials)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    status_code: u16,
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

pub(crate) fn error_response(
    status: StatusCode,
    message: Option<String>,
    challenge: Option<&'static str>,
) -> Response {
    let message = if status.is_server_error() {
        Some(INTERNAL_MESSAGE.to_string())
    } else {
        message
    };

    let www_authenticate = challenge.map(|scheme| match &message {
        Some(text) => format!("{scheme} error=\"{}\"", text.replace('"', "\\\"")),
        None => scheme.to_string(),
    });

    let body = ErrorBody {
        status_code: status.as_u16(),
        error: status.canonical_reason().unwrap_or("Unknown"),
        message,
    };
    let mut response = (status, Json(body)).into_response();
    if let Some(value) = www_authenticate.and_then(|v| HeaderValue::from_str(&v).ok()) {
        response.headers_mut().insert(WWW_AUTHENTICATE, value);
    }
    response
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        error_response(self.status(), self.message(), self.challenge())
    }
}
