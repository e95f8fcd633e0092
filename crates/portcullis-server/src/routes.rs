//! HTTP routes.

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

use portcullis_auth::{AuthLayer, AuthOrchestrator, Identity, IdentityContext};

/// Body of `GET /v1/whoami`.
#[derive(Debug, Serialize)]
pub struct WhoAmI {
    /// Whether the request carried a verified identity.
    pub authenticated: bool,
    /// The identity, flattened into the top-level object.
    #[serde(flatten)]
    pub identity: Option<IdentityContext>,
}

/// Build the application router.
///
/// `/health` is always public. Everything under `/v1` sits behind the
/// auth gate.
pub fn app(orchestrator: Arc<AuthOrchestrator>) -> Router {
    let protected = Router::new()
        .route("/v1/whoami", get(whoami))
        .layer(AuthLayer::new(orchestrator));

    Router::new().route("/health", get(health)).merge(protected)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn whoami(identity: Option<Identity>) -> Json<WhoAmI> {
    let identity = identity.map(|Identity(ctx)| ctx);
    Json(WhoAmI {
        authenticated: identity.is_some(),
        identity,
    })
}
