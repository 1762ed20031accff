use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use jsonwebtoken::Algorithm;
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::key::{KeyResolver, StaticKey, VerificationKey};
use crate::validate::CredentialValidator;
use crate::verifier::TokenVerifier;

/// Expected value(s) for a string claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expected {
    One(String),
    AnyOf(Vec<String>),
}

impl Expected {
    pub fn values(&self) -> Vec<&str> {
        match self {
            Expected::One(value) => vec![value.as_str()],
            Expected::AnyOf(values) => values.iter().map(String::as_str).collect(),
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.values().contains(&candidate)
    }

    /// An empty single value disables the check; a list always applies.
    pub fn is_set(&self) -> bool {
        match self {
            Expected::One(value) => !value.is_empty(),
            Expected::AnyOf(_) => true,
        }
    }
}

impl From<&str> for Expected {
    fn from(value: &str) -> Self {
        Expected::One(value.to_string())
    }
}

impl From<String> for Expected {
    fn from(value: String) -> Self {
        Expected::One(value)
    }
}

impl From<Vec<String>> for Expected {
    fn from(values: Vec<String>) -> Self {
        Expected::AnyOf(values)
    }
}

impl From<Vec<&str>> for Expected {
    fn from(values: Vec<&str>) -> Self {
        Expected::AnyOf(values.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Expected {
    fn from(values: [&str; N]) -> Self {
        Expected::AnyOf(values.iter().map(|value| value.to_string()).collect())
    }
}

/// Runtime configuration for token verification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Accepted `alg` values. `None` accepts the key family's defaults.
    pub algorithms: Option<Vec<Algorithm>>,
    pub audience: Option<Expected>,
    pub issuer: Option<Expected>,
    pub subject: Option<String>,
    pub jwt_id: Option<String>,
    /// Allowable clock skew in seconds when validating nbf/exp/maxAge.
    pub clock_tolerance: u64,
    /// Maximum token age in seconds, measured from `iat`.
    pub max_age: Option<u64>,
    pub ignore_expiration: bool,
    pub ignore_not_before: bool,
    /// Fixed "now" (unix seconds). Uses the system clock when unset.
    pub clock_timestamp: Option<i64>,
}

impl VerifyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_algorithms(mut self, algorithms: impl IntoIterator<Item = Algorithm>) -> Self {
        self.algorithms = Some(algorithms.into_iter().collect());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<Expected>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<Expected>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_jwt_id(mut self, jwt_id: impl Into<String>) -> Self {
        self.jwt_id = Some(jwt_id.into());
        self
    }

    pub fn with_clock_tolerance(mut self, seconds: u64) -> Self {
        self.clock_tolerance = seconds;
        self
    }

    pub fn with_max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn with_clock_timestamp(mut self, timestamp: i64) -> Self {
        self.clock_timestamp = Some(timestamp);
        self
    }
}

/// Parse algorithm names such as `"HS256"` or `"RS256"`.
pub fn parse_algorithms<I, S>(names: I) -> Result<Vec<Algorithm>, ConfigError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|name| {
            let name = name.as_ref().trim();
            Algorithm::from_str(name).map_err(|_| ConfigError::UnknownAlgorithm(name.to_string()))
        })
        .collect()
}

/// Where the verification key comes from.
#[derive(Clone)]
pub enum KeySource {
    Static(VerificationKey),
    Resolver(Arc<dyn KeyResolver>),
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Static(key) => f.debug_tuple("Static").field(key).finish(),
            KeySource::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

const OPTION_NAMES: &[&str] = &[
    "key",
    "validateFunc",
    "algorithms",
    "audience",
    "issuer",
    "subject",
    "jwtid",
    "clockTolerance",
    "maxAge",
    "ignoreExpiration",
    "ignoreNotBefore",
];

/// Caller-supplied strategy options, before normalization.
///
/// Declarative fields can be parsed from JSON with [`StrategyOptions::from_value`];
/// resolvers and validators are code and can only be attached through the
/// builder methods.
#[derive(Clone, Default)]
pub struct StrategyOptions {
    key: Option<KeySource>,
    validator: Option<Arc<dyn CredentialValidator>>,
    verify: VerifyOptions,
}

impl StrategyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the shape of a JSON options object.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let object = value.as_object().ok_or(ConfigError::NotAnObject)?;
        let mut options = Self::new();

        if let Some(key) = object.get("key") {
            options.key = Some(KeySource::Static(parse_key(key)?));
        }
        if object.contains_key("validateFunc") {
            return Err(ConfigError::ValidatorNotAFunction);
        }
        if let Some(algorithms) = object.get("algorithms") {
            let names = algorithms
                .as_array()
                .ok_or(ConfigError::AlgorithmsNotAnArray)?
                .iter()
                .enumerate()
                .map(|(position, name)| {
                    name.as_str().ok_or(ConfigError::AlgorithmNotAString(position))
                })
                .collect::<Result<Vec<_>, _>>()?;
            options.verify.algorithms = Some(parse_algorithms(names)?);
        }
        options.verify.audience = parse_expected(object, "audience")?;
        options.verify.issuer = parse_expected(object, "issuer")?;
        options.verify.subject = parse_string(object, "subject")?;
        options.verify.jwt_id = parse_string(object, "jwtid")?;
        if let Some(seconds) = parse_seconds(object, "clockTolerance")? {
            options.verify.clock_tolerance = seconds;
        }
        options.verify.max_age = parse_seconds(object, "maxAge")?;
        options.verify.ignore_expiration = parse_bool(object, "ignoreExpiration")?;
        options.verify.ignore_not_before = parse_bool(object, "ignoreNotBefore")?;

        if let Some(unknown) = object
            .keys()
            .find(|name| !OPTION_NAMES.contains(&name.as_str()))
        {
            return Err(ConfigError::UnknownOption(unknown.clone()));
        }

        Ok(options)
    }

    pub fn key(mut self, key: impl Into<VerificationKey>) -> Self {
        self.key = Some(KeySource::Static(key.into()));
        self
    }

    pub fn key_resolver<R>(mut self, resolver: R) -> Self
    where
        R: KeyResolver + 'static,
    {
        self.key = Some(KeySource::Resolver(Arc::new(resolver)));
        self
    }

    pub fn validate_with<V>(mut self, validator: V) -> Self
    where
        V: CredentialValidator + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn algorithms(mut self, algorithms: impl IntoIterator<Item = Algorithm>) -> Self {
        self.verify = self.verify.with_algorithms(algorithms);
        self
    }

    pub fn audience(mut self, audience: impl Into<Expected>) -> Self {
        self.verify = self.verify.with_audience(audience);
        self
    }

    pub fn issuer(mut self, issuer: impl Into<Expected>) -> Self {
        self.verify = self.verify.with_issuer(issuer);
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.verify = self.verify.with_subject(subject);
        self
    }

    /// Replace every verification setting at once.
    pub fn verify_options(mut self, verify: VerifyOptions) -> Self {
        self.verify = verify;
        self
    }

    pub fn key_source(&self) -> Option<&KeySource> {
        self.key.as_ref()
    }

    pub fn verify(&self) -> &VerifyOptions {
        &self.verify
    }
}

impl fmt::Debug for StrategyOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyOptions")
            .field("key", &self.key)
            .field("has_validator", &self.validator.is_some())
            .field("verify", &self.verify)
            .finish()
    }
}

fn parse_key(value: &Value) -> Result<VerificationKey, ConfigError> {
    match value {
        Value::String(secret) => Ok(VerificationKey::from(secret.as_str())),
        // Serialized byte buffers: {"type": "Buffer", "data": [..]}
        Value::Object(buffer) if buffer.get("type").and_then(Value::as_str) == Some("Buffer") => {
            let bytes = buffer
                .get("data")
                .and_then(Value::as_array)
                .ok_or(ConfigError::InvalidKey)?
                .iter()
                .map(|byte| {
                    byte.as_u64()
                        .and_then(|b| u8::try_from(b).ok())
                        .ok_or(ConfigError::InvalidKey)
                })
                .collect::<Result<Vec<u8>, _>>()?;
            Ok(VerificationKey::Secret(bytes))
        }
        _ => Err(ConfigError::InvalidKey),
    }
}

fn parse_expected(
    object: &Map<String, Value>,
    name: &'static str,
) -> Result<Option<Expected>, ConfigError> {
    match object.get(name) {
        None => Ok(None),
        Some(Value::String(value)) => Ok(Some(Expected::One(value.clone()))),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or(ConfigError::InvalidExpectation(name))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(|values| Some(Expected::AnyOf(values))),
        Some(_) => Err(ConfigError::InvalidExpectation(name)),
    }
}

fn parse_string(
    object: &Map<String, Value>,
    name: &'static str,
) -> Result<Option<String>, ConfigError> {
    match object.get(name) {
        None => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(ConfigError::NotAString(name)),
    }
}

fn parse_seconds(
    object: &Map<String, Value>,
    name: &'static str,
) -> Result<Option<u64>, ConfigError> {
    object
        .get(name)
        .map(|value| value.as_u64().ok_or(ConfigError::NotSeconds(name)))
        .transpose()
}

fn parse_bool(object: &Map<String, Value>, name: &'static str) -> Result<bool, ConfigError> {
    match object.get(name) {
        None => Ok(false),
        Some(value) => value.as_bool().ok_or(ConfigError::NotABoolean(name)),
    }
}

/// Normalized, read-only settings shared by every request of a strategy.
pub struct StrategySettings {
    key_resolver: Arc<dyn KeyResolver>,
    validator: Option<Arc<dyn CredentialValidator>>,
    verifier: TokenVerifier,
}

impl StrategySettings {
    pub fn key_resolver(&self) -> &dyn KeyResolver {
        self.key_resolver.as_ref()
    }

    /// `None` when decoded claims are used as credentials unchanged.
    pub fn validator(&self) -> Option<&dyn CredentialValidator> {
        self.validator.as_deref()
    }

    pub fn has_validator(&self) -> bool {
        self.validator.is_some()
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }
}

impl TryFrom<StrategyOptions> for StrategySettings {
    type Error = ConfigError;

    fn try_from(options: StrategyOptions) -> Result<Self, ConfigError> {
        let key_resolver: Arc<dyn KeyResolver> = match options.key {
            None => return Err(ConfigError::MissingKey),
            Some(KeySource::Static(key)) => Arc::new(StaticKey::new(key)),
            Some(KeySource::Resolver(resolver)) => resolver,
        };
        Ok(Self {
            key_resolver,
            validator: options.validator,
            verifier: TokenVerifier::new(options.verify),
        })
    }
}

impl fmt::Debug for StrategySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategySettings")
            .field("has_validator", &self.has_validator())
            .field("verify", self.verifier.options())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn error_for(value: Value) -> String {
        StrategyOptions::from_value(&value)
            .and_then(StrategySettings::try_from)
            .expect_err("options should be rejected")
            .to_string()
    }

    #[test]
    fn rejects_non_object_options() {
        assert_eq!(
            error_for(Value::Null),
            "\"jwt auth strategy options\" must be an object"
        );
        assert_eq!(
            error_for(json!("wrong options type")),
            "\"jwt auth strategy options\" must be an object"
        );
        assert_eq!(
            error_for(json!(["wrong", "options", "type"])),
            "\"jwt auth strategy options\" must be an object"
        );
    }

    #[test]
    fn requires_key() {
        assert_eq!(
            error_for(json!({})),
            "child \"key\" fails because [\"key\" is required]"
        );
    }

    #[test]
    fn rejects_numeric_key() {
        assert_eq!(
            error_for(json!({"key": 10})),
            "child \"key\" fails because [\"key\" must be a buffer or a string, \"key\" must be a Function]"
        );
    }

    #[test]
    fn accepts_serialized_buffer_key() {
        let options = StrategyOptions::from_value(&json!({
            "key": {"type": "Buffer", "data": [115, 101, 99, 114, 101, 116]}
        }))
        .expect("buffer key accepted");
        match options.key_source() {
            Some(KeySource::Static(key)) => assert_eq!(key, &VerificationKey::secret("secret")),
            other => panic!("unexpected key source: {other:?}"),
        }
    }

    #[test]
    fn rejects_numeric_audience() {
        assert_eq!(
            error_for(json!({"key": "123456", "audience": 123})),
            "child \"audience\" fails because [\"audience\" must be a string, \"audience\" must be an array]"
        );
    }

    #[test]
    fn rejects_validate_func_in_data() {
        assert_eq!(
            error_for(json!({"key": "123456", "validateFunc": "loadUser"})),
            "child \"validateFunc\" fails because [\"validateFunc\" must be a Function]"
        );
    }

    #[test]
    fn rejects_bad_algorithms() {
        assert_eq!(
            error_for(json!({"key": "k", "algorithms": "HS256"})),
            "child \"algorithms\" fails because [\"algorithms\" must be an array]"
        );
        assert_eq!(
            error_for(json!({"key": "k", "algorithms": [1]})),
            "child \"algorithms\" fails because [\"algorithms\" at position 0 fails because [\"0\" must be a string]]"
        );
        assert_eq!(
            error_for(json!({"key": "k", "algorithms": ["XX999"]})),
            "child \"algorithms\" fails because [\"XX999\" is not a supported algorithm]"
        );
    }

    #[test]
    fn rejects_non_string_subject_and_unknown_options() {
        assert_eq!(
            error_for(json!({"key": "k", "subject": ["a"]})),
            "child \"subject\" fails because [\"subject\" must be a string]"
        );
        assert_eq!(
            error_for(json!({"key": "k", "scope": "admin"})),
            "\"scope\" is not allowed"
        );
    }

    #[test]
    fn parses_full_options() {
        let options = StrategyOptions::from_value(&json!({
            "key": "secret",
            "algorithms": ["HS256", "HS512"],
            "audience": ["a", "b"],
            "issuer": "iss",
            "subject": "sub",
            "jwtid": "id-1",
            "clockTolerance": 5,
            "maxAge": 3600,
            "ignoreNotBefore": true
        }))
        .expect("valid options");

        let verify = options.verify();
        assert_eq!(
            verify.algorithms,
            Some(vec![Algorithm::HS256, Algorithm::HS512])
        );
        assert_eq!(verify.audience, Some(Expected::from(["a", "b"])));
        assert_eq!(verify.issuer, Some(Expected::from("iss")));
        assert_eq!(verify.subject.as_deref(), Some("sub"));
        assert_eq!(verify.jwt_id.as_deref(), Some("id-1"));
        assert_eq!(verify.clock_tolerance, 5);
        assert_eq!(verify.max_age, Some(3600));
        assert!(verify.ignore_not_before);
        assert!(!verify.ignore_expiration);
    }

    #[test]
    fn static_key_is_wrapped_in_a_resolver() {
        let settings = StrategySettings::try_from(StrategyOptions::new().key("secret"))
            .expect("valid settings");
        assert!(!settings.has_validator());
    }

    #[test]
    fn expected_single_empty_value_is_unset() {
        assert!(!Expected::from("").is_set());
        assert!(Expected::AnyOf(Vec::new()).is_set());
        assert!(Expected::from(["a", "b"]).matches("b"));
    }
}
