#![allow(dead_code)]

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use common_jwt_auth::{
    require_jwt, AuthContext, Credentials, JwtStrategy, RejectedCredentials, RouteAuth,
};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const SECRET: &str = "NeverShareYourSecret";

pub fn sign(payload: Value) -> String {
    sign_with(Algorithm::HS256, &payload, SECRET)
}

pub fn sign_with(alg: Algorithm, payload: &Value, secret: &str) -> String {
    encode(
        &Header::new(alg),
        payload,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("sign token")
}

pub fn now() -> i64 {
    Utc::now().timestamp()
}

pub fn credentials(value: Value) -> Credentials {
    value.as_object().cloned().expect("object credentials")
}

async fn whoami(auth: AuthContext) -> Json<Value> {
    Json(Value::Object(auth.credentials))
}

async fn maybe_whoami(
    auth: Option<AuthContext>,
    rejected: Option<RejectedCredentials>,
) -> Json<Value> {
    match (auth, rejected) {
        (Some(auth), _) => Json(json!({ "authenticated": true, "credentials": auth.credentials })),
        (None, Some(RejectedCredentials(rejected))) => {
            Json(json!({ "authenticated": false, "rejected": rejected }))
        }
        (None, None) => Json(json!({ "authenticated": false })),
    }
}

/// `POST /token` echoes the credentials of a strictly authenticated request.
pub fn app(strategy: JwtStrategy) -> Router {
    app_with(RouteAuth::new(strategy))
}

pub fn app_with(auth: RouteAuth) -> Router {
    require_jwt(Router::new().route("/token", post(whoami)), auth)
}

/// `GET /maybe` reports whether the request was authenticated, and any
/// credentials attached to a rejection.
pub fn optional_app(auth: RouteAuth) -> Router {
    require_jwt(Router::new().route("/maybe", get(maybe_whoami)), auth)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub challenge: Option<String>,
    pub body: Value,
}

impl TestResponse {
    pub fn message(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }
}

pub async fn send(app: Router, method: &str, uri: &str, authorization: Option<&str>) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    let request = builder.body(Body::empty()).expect("request");

    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let challenge = response
        .headers()
        .get(WWW_AUTHENTICATE)
        .map(|value| value.to_str().expect("ascii header").to_string());
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };

    TestResponse {
        status,
        challenge,
        body,
    }
}

pub async fn post_token(app: Router, authorization: Option<&str>) -> TestResponse {
    send(app, "POST", "/token", authorization).await
}
