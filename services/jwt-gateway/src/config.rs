use std::env;

use anyhow::{anyhow, bail, Context, Result};
use common_jwt_auth::{
    parse_algorithms, Algorithm, Expected, KeyFamily, StrategyOptions, VerificationKey,
    VerifyOptions,
};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8090;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub strategy: StrategyOptions,
}

pub fn load_config() -> Result<GatewayConfig> {
    load_config_from(|key| env::var(key).ok())
}

/// Build the gateway configuration from a variable lookup.
pub fn load_config_from<F>(lookup: F) -> Result<GatewayConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).and_then(|value| normalize_optional(&value));

    let host = var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = var("PORT")
        .map(|value| value.parse::<u16>())
        .transpose()
        .context("Failed to parse PORT")?
        .unwrap_or(DEFAULT_PORT);

    let algorithms = var("JWT_ALGORITHMS")
        .map(|value| parse_algorithms(split_list(&value)))
        .transpose()
        .context("Failed to parse JWT_ALGORITHMS")?;

    let key = load_key(&var, algorithms.as_deref())?;

    let mut verify = VerifyOptions::new();
    if let Some(algorithms) = algorithms {
        verify = verify.with_algorithms(algorithms);
    }
    if let Some(audience) = var("JWT_AUDIENCE").and_then(|value| expected(&value)) {
        verify = verify.with_audience(audience);
    }
    if let Some(issuer) = var("JWT_ISSUER").and_then(|value| expected(&value)) {
        verify = verify.with_issuer(issuer);
    }
    if let Some(subject) = var("JWT_SUBJECT") {
        verify = verify.with_subject(subject);
    }
    if let Some(seconds) = seconds(&var, "JWT_CLOCK_TOLERANCE_SECONDS")? {
        verify = verify.with_clock_tolerance(seconds);
    }
    if let Some(seconds) = seconds(&var, "JWT_MAX_AGE_SECONDS")? {
        verify = verify.with_max_age(seconds);
    }

    Ok(GatewayConfig {
        host,
        port,
        strategy: StrategyOptions::new().key(key).verify_options(verify),
    })
}

fn load_key<V>(var: &V, algorithms: Option<&[Algorithm]>) -> Result<VerificationKey>
where
    V: Fn(&str) -> Option<String>,
{
    let secret = var("JWT_SECRET");
    let secret_base64 = var("JWT_SECRET_BASE64");
    let public_pem = var("JWT_PUBLIC_KEY_PEM");

    match (secret, secret_base64, public_pem) {
        (Some(secret), None, None) => Ok(VerificationKey::secret(secret)),
        (None, Some(encoded), None) => VerificationKey::from_base64_secret(&encoded)
            .context("Failed to decode JWT_SECRET_BASE64"),
        (None, None, Some(pem)) => {
            // The PEM header does not say which family an SPKI key is; the
            // first configured algorithm decides.
            let family = algorithms
                .and_then(|algs| algs.first().copied())
                .map(KeyFamily::of)
                .unwrap_or(KeyFamily::Rsa);
            match family {
                KeyFamily::Ec => Ok(VerificationKey::ec_pem(pem)),
                KeyFamily::Ed => Ok(VerificationKey::ed_pem(pem)),
                KeyFamily::Rsa => Ok(VerificationKey::rsa_pem(pem)),
                KeyFamily::Hmac => Err(anyhow!(
                    "JWT_PUBLIC_KEY_PEM cannot be used with HMAC algorithms"
                )),
            }
        }
        (None, None, None) => bail!(
            "One of JWT_SECRET, JWT_SECRET_BASE64 or JWT_PUBLIC_KEY_PEM must be set"
        ),
        _ => bail!(
            "Only one of JWT_SECRET, JWT_SECRET_BASE64 or JWT_PUBLIC_KEY_PEM may be set"
        ),
    }
}

fn seconds<V>(var: &V, key: &str) -> Result<Option<u64>>
where
    V: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|value| value.parse::<u64>())
        .transpose()
        .with_context(|| format!("Failed to parse {key}"))
}

fn split_list(value: &str) -> Vec<&str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect()
}

fn expected(value: &str) -> Option<Expected> {
    let mut items = split_list(value);
    match items.len() {
        0 => None,
        1 => items.pop().map(Expected::from),
        _ => Some(Expected::from(items)),
    }
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_jwt_auth::KeySource;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<GatewayConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        load_config_from(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_with_only_a_secret() {
        let config = load(&[("JWT_SECRET", "s3cret")]).expect("config");
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8090);
        assert_eq!(config.strategy.verify(), &VerifyOptions::new());
        assert!(matches!(
            config.strategy.key_source(),
            Some(KeySource::Static(VerificationKey::Secret(_)))
        ));
    }

    #[test]
    fn lists_and_timings_are_parsed() {
        let config = load(&[
            ("JWT_SECRET", "s3cret"),
            ("PORT", "9000"),
            ("JWT_ALGORITHMS", "HS256, HS512"),
            ("JWT_AUDIENCE", "a,b,c"),
            ("JWT_ISSUER", "https://issuer.example"),
            ("JWT_SUBJECT", "svc"),
            ("JWT_CLOCK_TOLERANCE_SECONDS", "30"),
            ("JWT_MAX_AGE_SECONDS", "3600"),
        ])
        .expect("config");

        let verify = config.strategy.verify();
        assert_eq!(config.port, 9000);
        assert_eq!(
            verify.algorithms,
            Some(vec![Algorithm::HS256, Algorithm::HS512])
        );
        assert_eq!(verify.audience, Some(Expected::from(["a", "b", "c"])));
        assert_eq!(verify.issuer, Some(Expected::from("https://issuer.example")));
        assert_eq!(verify.subject.as_deref(), Some("svc"));
        assert_eq!(verify.clock_tolerance, 30);
        assert_eq!(verify.max_age, Some(3600));
    }

    #[test]
    fn exactly_one_key_source_is_required() {
        let err = load(&[]).expect_err("no key");
        assert!(err.to_string().contains("must be set"));

        let err = load(&[("JWT_SECRET", "a"), ("JWT_SECRET_BASE64", "YQ==")]).expect_err("two keys");
        assert!(err.to_string().contains("Only one"));
    }

    #[test]
    fn pem_family_follows_algorithms() {
        let config = load(&[
            ("JWT_PUBLIC_KEY_PEM", "-----BEGIN PUBLIC KEY-----"),
            ("JWT_ALGORITHMS", "ES256"),
        ])
        .expect("config");
        assert!(matches!(
            config.strategy.key_source(),
            Some(KeySource::Static(VerificationKey::EcPem(_)))
        ));

        let err = load(&[
            ("JWT_PUBLIC_KEY_PEM", "-----BEGIN PUBLIC KEY-----"),
            ("JWT_ALGORITHMS", "HS256"),
        ])
        .expect_err("hmac with pem");
        assert!(err.to_string().contains("HMAC"));
    }

    #[test]
    fn bad_values_name_the_variable() {
        let err = load(&[("JWT_SECRET", "a"), ("PORT", "eighty")]).expect_err("bad port");
        assert_eq!(err.to_string(), "Failed to parse PORT");

        let err = load(&[("JWT_SECRET", "a"), ("JWT_ALGORITHMS", "HS999")]).expect_err("bad alg");
        assert_eq!(err.to_string(), "Failed to parse JWT_ALGORITHMS");

        let err = load(&[("JWT_SECRET_BASE64", "@@@")]).expect_err("bad base64");
        assert_eq!(err.to_string(), "Failed to decode JWT_SECRET_BASE64");
    }
}
