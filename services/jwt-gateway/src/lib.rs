pub mod config;

use axum::routing::{get, post};
use axum::{Json, Router};
use common_jwt_auth::{require_jwt, AuthContext, AuthMode, JwtStrategy, RouteAuth};
use serde::Serialize;
use serde_json::Value;

pub use config::{load_config, load_config_from, GatewayConfig};

pub const ADMIN_SCOPE: &str = "admin";

#[derive(Debug, Serialize)]
pub struct Identity {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Value>,
}

/// Echo the credentials of the authenticated caller.
async fn token_credentials(auth: AuthContext) -> Json<Value> {
    Json(Value::Object(auth.into_credentials()))
}

async fn whoami(auth: Option<AuthContext>) -> Json<Identity> {
    Json(Identity {
        authenticated: auth.is_some(),
        credentials: auth.map(|ctx| Value::Object(ctx.into_credentials())),
    })
}

async fn greeting(auth: Option<AuthContext>) -> String {
    let name = auth
        .as_ref()
        .and_then(|ctx| ctx.string_claim("username").or_else(|| ctx.string_claim("sub")))
        .unwrap_or("stranger")
        .to_string();
    format!("Hello, {name}")
}

async fn admin(auth: AuthContext) -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "scopes": auth.scopes(),
    }))
}

/// Routes:
/// - `GET /healthz`
/// - `POST /token` requires a valid bearer token
/// - `GET /whoami` accepts anonymous callers but rejects bad tokens
/// - `GET /greeting` never rejects
/// - `GET /admin` requires the `admin` scope
pub fn build_router(strategy: JwtStrategy) -> Router {
    let required = require_jwt(
        Router::new().route("/token", post(token_credentials)),
        RouteAuth::new(strategy.clone()),
    );
    let optional = require_jwt(
        Router::new().route("/whoami", get(whoami)),
        RouteAuth::new(strategy.clone()).with_mode(AuthMode::Optional),
    );
    let best_effort = require_jwt(
        Router::new().route("/greeting", get(greeting)),
        RouteAuth::new(strategy.clone()).with_mode(AuthMode::Try),
    );
    let scoped = require_jwt(
        Router::new().route("/admin", get(admin)),
        RouteAuth::new(strategy).with_scope([ADMIN_SCOPE]),
    );

    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .merge(required)
        .merge(optional)
        .merge(best_effort)
        .merge(scoped)
}
