use std::fmt;

use async_trait::async_trait;
use axum::http::request::Parts;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde_json::Value;

use crate::error::{CallbackError, ConfigError, VerifyError};

/// Signature family a key (or an algorithm) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Hmac,
    Rsa,
    Ec,
    Ed,
}

impl KeyFamily {
    pub fn of(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => KeyFamily::Hmac,
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => KeyFamily::Rsa,
            Algorithm::ES256 | Algorithm::ES384 => KeyFamily::Ec,
            Algorithm::EdDSA => KeyFamily::Ed,
        }
    }

    /// Algorithms accepted when the strategy does not configure an allow-list.
    pub fn default_algorithms(self) -> &'static [Algorithm] {
        match self {
            KeyFamily::Hmac => &[Algorithm::HS256, Algorithm::HS384, Algorithm::HS512],
            KeyFamily::Rsa => &[
                Algorithm::RS256,
                Algorithm::RS384,
                Algorithm::RS512,
                Algorithm::PS256,
                Algorithm::PS384,
                Algorithm::PS512,
            ],
            KeyFamily::Ec => &[Algorithm::ES256, Algorithm::ES384],
            KeyFamily::Ed => &[Algorithm::EdDSA],
        }
    }
}

/// Key material a token is verified against.
#[derive(Clone, PartialEq, Eq)]
pub enum VerificationKey {
    /// Shared HMAC secret.
    Secret(Vec<u8>),
    RsaPem(Vec<u8>),
    EcPem(Vec<u8>),
    EdPem(Vec<u8>),
}

impl VerificationKey {
    pub fn secret(bytes: impl AsRef<[u8]>) -> Self {
        Self::Secret(bytes.as_ref().to_vec())
    }

    pub fn from_base64_secret(encoded: &str) -> Result<Self, ConfigError> {
        STANDARD
            .decode(encoded.trim())
            .map(Self::Secret)
            .map_err(|err| ConfigError::KeyDecode(format!("\"key\" is not valid base64: {err}")))
    }

    pub fn rsa_pem(pem: impl AsRef<[u8]>) -> Self {
        Self::RsaPem(pem.as_ref().to_vec())
    }

    pub fn ec_pem(pem: impl AsRef<[u8]>) -> Self {
        Self::EcPem(pem.as_ref().to_vec())
    }

    pub fn ed_pem(pem: impl AsRef<[u8]>) -> Self {
        Self::EdPem(pem.as_ref().to_vec())
    }

    pub fn family(&self) -> KeyFamily {
        match self {
            VerificationKey::Secret(_) => KeyFamily::Hmac,
            VerificationKey::RsaPem(_) => KeyFamily::Rsa,
            VerificationKey::EcPem(_) => KeyFamily::Ec,
            VerificationKey::EdPem(_) => KeyFamily::Ed,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    fn bytes(&self) -> &[u8] {
        match self {
            VerificationKey::Secret(bytes)
            | VerificationKey::RsaPem(bytes)
            | VerificationKey::EcPem(bytes)
            | VerificationKey::EdPem(bytes) => bytes,
        }
    }

    pub(crate) fn decoding_key(&self) -> Result<DecodingKey, VerifyError> {
        let parsed = match self {
            VerificationKey::Secret(bytes) => return Ok(DecodingKey::from_secret(bytes)),
            VerificationKey::RsaPem(pem) => DecodingKey::from_rsa_pem(pem),
            VerificationKey::EcPem(pem) => DecodingKey::from_ec_pem(pem),
            VerificationKey::EdPem(pem) => DecodingKey::from_ed_pem(pem),
        };
        parsed.map_err(|err| VerifyError::InvalidKey(err.to_string()))
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_tuple("VerificationKey")
            .field(&self.family())
            .finish()
    }
}

impl From<&str> for VerificationKey {
    fn from(value: &str) -> Self {
        Self::secret(value)
    }
}

impl From<String> for VerificationKey {
    fn from(value: String) -> Self {
        Self::Secret(value.into_bytes())
    }
}

impl From<Vec<u8>> for VerificationKey {
    fn from(value: Vec<u8>) -> Self {
        Self::Secret(value)
    }
}

/// Outcome of a key lookup: the key plus opaque context handed unchanged to
/// the credential validator.
#[derive(Debug, Clone)]
pub struct ResolvedKey {
    pub key: VerificationKey,
    pub extra_info: Option<Value>,
}

impl ResolvedKey {
    pub fn new(key: impl Into<VerificationKey>) -> Self {
        Self {
            key: key.into(),
            extra_info: None,
        }
    }

    pub fn with_extra_info(mut self, extra_info: impl Into<Value>) -> Self {
        self.extra_info = Some(extra_info.into());
        self
    }
}

/// Supplies the key a token must be verified with. Implementations may look
/// the key up remotely; the lookup runs once per request.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    async fn resolve(&self, request: &Parts, token: &str) -> Result<ResolvedKey, CallbackError>;
}

/// Resolver for a fixed key configured up front.
#[derive(Debug, Clone)]
pub struct StaticKey {
    key: VerificationKey,
}

impl StaticKey {
    pub fn new(key: impl Into<VerificationKey>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &VerificationKey {
        &self.key
    }
}

#[async_trait]
impl KeyResolver for StaticKey {
    async fn resolve(&self, _request: &Parts, _token: &str) -> Result<ResolvedKey, CallbackError> {
        Ok(ResolvedKey::new(self.key.clone()))
    }
}
