pub mod authenticator;
pub mod claims;
pub mod config;
pub mod error;
pub mod extractors;
pub mod guards;
pub mod key;
pub mod middleware;
pub mod validate;
pub mod verifier;

pub use authenticator::{bearer_token, AuthOutcome, JwtStrategy};
pub use claims::Claims;
pub use config::{
    parse_algorithms, Expected, KeySource, StrategyOptions, StrategySettings, VerifyOptions,
};
pub use error::{AuthError, AuthResult, CallbackError, ConfigError, VerifyError, BEARER};
pub use extractors::{AuthContext, RejectedCredentials};
pub use guards::{ensure_scope, GuardError};
pub use jsonwebtoken::Algorithm;
pub use key::{KeyFamily, KeyResolver, ResolvedKey, StaticKey, VerificationKey};
pub use middleware::{require_jwt, AuthMode, RouteAuth};
pub use validate::{CredentialValidator, Credentials, ValidationDecision};
pub use verifier::{decode_unverified, TokenVerifier};
