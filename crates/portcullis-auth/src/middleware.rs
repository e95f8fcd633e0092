//! Tower authentication middleware.
//!
//! `AuthLayer` and `AuthService` run an [`AuthOrchestrator`] in front of any
//! inner service. On success the resolved [`IdentityContext`] (if any) is
//! inserted into the request extensions; on rejection the inner service is
//! never called and the caller gets [`unauthorized_response`].

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::{Request, StatusCode};
use tower::{Layer, Service};

use crate::orchestrator::{AuthDecision, AuthOrchestrator};

/// `error` field of the rejection body.
pub const UNAUTHORIZED_ERROR: &str = "unauthorized";
/// `code` field of the rejection body.
pub const UNAUTHORIZED_CODE: &str = "AUTH_REQUIRED";

/// Tower `Layer` that wraps services with multi-strategy authentication.
#[derive(Clone)]
pub struct AuthLayer {
    orchestrator: Arc<AuthOrchestrator>,
}

impl AuthLayer {
    /// Create a new auth layer around a shared orchestrator.
    pub fn new(orchestrator: Arc<AuthOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            orchestrator: self.orchestrator.clone(),
        }
    }
}

/// Tower `Service` that authenticates requests before forwarding them.
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    orchestrator: Arc<AuthOrchestrator>,
}

impl<S> Service<Request<Body>> for AuthService<S>
where
    S: Service<Request<Body>, Error = Infallible> + Clone + Send + 'static,
    S::Response: IntoResponse,
    S::Future: Send,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let orchestrator = self.orchestrator.clone();

        Box::pin(async move {
            match orchestrator.authenticate(req.headers()).await {
                AuthDecision::Authenticated(identity) => {
                    if let Some(identity) = identity {
                        req.extensions_mut().insert(identity);
                    }
                    let resp = inner
                        .call(req)
                        .await
                        .unwrap_or_else(|infallible| match infallible {});
                    Ok(resp.into_response())
                }
                AuthDecision::Rejected => Ok(unauthorized_response()),
            }
        })
    }
}

/// The single rejection response, identical for every failure cause.
pub fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": UNAUTHORIZED_ERROR,
            "code": UNAUTHORIZED_CODE,
        })),
    )
        .into_response()
}
