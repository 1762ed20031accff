use serde_json::{Map, Value};

use crate::config::VerifyOptions;
use crate::error::VerifyError;

/// Decoded JWT payload. Claims are arbitrary JSON, keyed by name.
pub type Claims = Map<String, Value>;

/// Check registered claims against the options, in the order clients observe
/// failures: nbf, exp, aud, iss, sub, jti, then maxAge.
pub(crate) fn check(claims: &Claims, options: &VerifyOptions, now: i64) -> Result<(), VerifyError> {
    let tolerance = options.clock_tolerance as f64;
    let now = now as f64;

    if !options.ignore_not_before {
        if let Some(nbf) = claims.get("nbf") {
            let nbf = nbf.as_f64().ok_or(VerifyError::InvalidNotBefore)?;
            if nbf > now + tolerance {
                return Err(VerifyError::NotActive);
            }
        }
    }

    if !options.ignore_expiration {
        if let Some(exp) = claims.get("exp") {
            let exp = exp.as_f64().ok_or(VerifyError::InvalidExpiry)?;
            if now >= exp + tolerance {
                return Err(VerifyError::Expired);
            }
        }
    }

    if let Some(expected) = options.audience.as_ref().filter(|e| e.is_set()) {
        let presented: Vec<&str> = match claims.get("aud") {
            Some(Value::String(aud)) => vec![aud.as_str()],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        if !presented.iter().any(|aud| expected.matches(aud)) {
            return Err(VerifyError::Audience(expected.values().join(" or ")));
        }
    }

    if let Some(expected) = options.issuer.as_ref().filter(|e| e.is_set()) {
        let iss = claims.get("iss").and_then(Value::as_str);
        if !iss.is_some_and(|iss| expected.matches(iss)) {
            return Err(VerifyError::Issuer(expected.values().join(",")));
        }
    }

    if let Some(subject) = non_empty(options.subject.as_deref()) {
        if claims.get("sub").and_then(Value::as_str) != Some(subject) {
            return Err(VerifyError::Subject(subject.to_string()));
        }
    }

    if let Some(jwt_id) = non_empty(options.jwt_id.as_deref()) {
        if claims.get("jti").and_then(Value::as_str) != Some(jwt_id) {
            return Err(VerifyError::JwtId(jwt_id.to_string()));
        }
    }

    if let Some(max_age) = options.max_age.filter(|secs| *secs > 0) {
        let iat = claims
            .get("iat")
            .and_then(Value::as_f64)
            .ok_or(VerifyError::MissingIssuedAt)?;
        if now >= iat + max_age as f64 + tolerance {
            return Err(VerifyError::MaxAgeExceeded);
        }
    }

    Ok(())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Read a string claim.
pub fn string_claim<'a>(claims: &'a Claims, name: &str) -> Option<&'a str> {
    claims.get(name).and_then(Value::as_str)
}

/// Scopes granted by the token, from a space-delimited `scope` string or a
/// `scope` array.
pub fn scopes(claims: &Claims) -> Vec<String> {
    match claims.get("scope") {
        Some(Value::String(scope)) => scope.split_whitespace().map(str::to_string).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
