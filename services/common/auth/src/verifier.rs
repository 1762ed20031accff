use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{crypto, Algorithm};
use serde_json::{Map, Value};
use tracing::debug;

use crate::claims::{self, Claims};
use crate::config::VerifyOptions;
use crate::error::VerifyError;
use crate::key::{KeyFamily, VerificationKey};

/// Verifies compact JWS tokens against a caller-supplied key.
#[derive(Debug, Clone, Default)]
pub struct TokenVerifier {
    options: VerifyOptions,
}

impl TokenVerifier {
    pub fn new(options: VerifyOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &VerifyOptions {
        &self.options
    }

    pub fn verify(&self, token: &str, key: &VerificationKey) -> Result<Claims, VerifyError> {
        let (header_segment, payload_segment, signature) = split_token(token)?;
        let header = decode_segment(header_segment)?;
        let claims = decode_segment(payload_segment)?;

        if key.is_empty() {
            return Err(VerifyError::MissingKey);
        }
        if signature.is_empty() {
            return Err(VerifyError::MissingSignature);
        }

        // Only `alg` is read from the header; "none" and unknown names fail here.
        let alg = header
            .get("alg")
            .and_then(Value::as_str)
            .and_then(|name| Algorithm::from_str(name).ok())
            .ok_or(VerifyError::InvalidAlgorithm)?;

        let family = key.family();
        let allowed = self
            .options
            .algorithms
            .as_deref()
            .unwrap_or_else(|| family.default_algorithms());
        if !allowed.contains(&alg) || KeyFamily::of(alg) != family {
            return Err(VerifyError::InvalidAlgorithm);
        }

        let decoding_key = key.decoding_key()?;
        let message = &token[..header_segment.len() + 1 + payload_segment.len()];
        match crypto::verify(signature, message.as_bytes(), &decoding_key, alg) {
            Ok(true) => {}
            Ok(false) => return Err(VerifyError::InvalidSignature),
            Err(err) => return Err(signature_error(err.kind())),
        }

        let now = self
            .options
            .clock_timestamp
            .unwrap_or_else(|| Utc::now().timestamp());
        claims::check(&claims, &self.options, now)?;

        debug!(alg = ?alg, "verified JWT successfully");
        Ok(claims)
    }
}

/// Decode the payload without checking the signature or any claim. Meant for
/// key resolvers that pick a key based on who the token claims to be.
pub fn decode_unverified(token: &str) -> Result<Claims, VerifyError> {
    let (_, payload_segment, _) = split_token(token)?;
    decode_segment(payload_segment)
}

fn split_token(token: &str) -> Result<(&str, &str, &str), VerifyError> {
    let mut segments = token.split('.');
    match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(header), Some(payload), Some(signature), None) => Ok((header, payload, signature)),
        _ => Err(VerifyError::Malformed),
    }
}

/// Header and payload segments must both be base64url JSON objects.
fn decode_segment(segment: &str) -> Result<Map<String, Value>, VerifyError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| VerifyError::InvalidToken)?;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(object)) => Ok(object),
        _ => Err(VerifyError::InvalidToken),
    }
}

fn signature_error(kind: &ErrorKind) -> VerifyError {
    match kind {
        ErrorKind::InvalidKeyFormat | ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidRsaKey(_) => {
            VerifyError::InvalidKey(format!("{kind:?}"))
        }
        ErrorKind::InvalidAlgorithm => VerifyError::InvalidAlgorithm,
        _ => VerifyError::InvalidSignature,
    }
}
