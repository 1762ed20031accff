use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;

use crate::authenticator::{AuthOutcome, JwtStrategy};
use crate::extractors::{AuthContext, RejectedCredentials};
use crate::guards::ensure_scope;

/// How a route treats requests that fail authentication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthMode {
    /// Every rejection is returned to the client.
    #[default]
    Required,
    /// Requests without bearer credentials go through unauthenticated; any
    /// other rejection is returned.
    Optional,
    /// Every rejection is ignored and the request goes through unauthenticated.
    /// Credentials attached to the rejection are available as
    /// [`RejectedCredentials`].
    Try,
}

/// Per-route authentication settings.
#[derive(Debug, Clone)]
pub struct RouteAuth {
    strategy: JwtStrategy,
    mode: AuthMode,
    scope: Vec<String>,
}

impl RouteAuth {
    pub fn new(strategy: JwtStrategy) -> Self {
        Self {
            strategy,
            mode: AuthMode::Required,
            scope: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: AuthMode) -> Self {
        self.mode = mode;
        self
    }

    /// Require at least one of the given scopes.
    pub fn with_scope<I, S>(mut self, scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope = scope.into_iter().map(Into::into).collect();
        self
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn strategy(&self) -> &JwtStrategy {
        &self.strategy
    }
}

/// Protect every route already added to `router`.
pub fn require_jwt<S>(router: Router<S>, auth: RouteAuth) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(middleware::from_fn_with_state(auth, authenticate_request))
}

pub async fn authenticate_request(
    State(auth): State<RouteAuth>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    match auth.strategy.authenticate(&parts).await {
        AuthOutcome::Authenticated(credentials) => {
            let context = AuthContext::new(credentials);
            if let Err(err) = ensure_scope(&context, auth.scope.as_slice()) {
                return err.into_response();
            }
            parts.extensions.insert(context);
        }
        AuthOutcome::Rejected(err) => match auth.mode {
            AuthMode::Required => return err.into_response(),
            AuthMode::Optional if !err.is_missing() => return err.into_response(),
            AuthMode::Optional => {}
            AuthMode::Try => {
                if let Some(credentials) = err.credentials() {
                    parts
                        .extensions
                        .insert(RejectedCredentials(credentials.clone()));
                }
            }
        },
    }

    next.run(Request::from_parts(parts, body)).await
}
