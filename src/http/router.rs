//! Transport routing seam.
//!
//! The pipeline only needs somewhere to mount a route function for a verb and
//! a path template. [`AxumRouter`] is the provided implementation.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::RawPathParamsRejection;
use axum::extract::RawPathParams;
use axum::routing::on;
use axum::Router;
use futures_util::future::BoxFuture;

use crate::http::request::RawRequest;
use crate::resource::Verb;

/// A mounted endpoint: raw request in, finished transport response out.
pub type RouteFn = Arc<dyn Fn(RawRequest) -> BoxFuture<'static, axum::response::Response> + Send + Sync>;

pub trait SimpleRouter {
    /// Mount `route` for `verb` requests matching `path` (`/widgets/{id}` syntax).
    fn register_route(&mut self, verb: Verb, path: &str, route: RouteFn);
}

/// [`SimpleRouter`] over an `axum::Router`.
#[derive(Debug, Default)]
pub struct AxumRouter {
    router: Router,
}

impl AxumRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}

impl SimpleRouter for AxumRouter {
    fn register_route(&mut self, verb: Verb, path: &str, route: RouteFn) {
        let handler = move |params: Result<RawPathParams, RawPathParamsRejection>,
                            request: axum::http::Request<Body>| {
            let route = Arc::clone(&route);
            async move {
                // Templates without variables reject; treat that as no variables.
                let path_vars: HashMap<String, String> = params
                    .map(|params| {
                        params
                            .iter()
                            .map(|(k, v)| (k.to_string(), v.to_string()))
                            .collect()
                    })
                    .unwrap_or_default();
                route(RawRequest::new(request).with_path_vars(path_vars)).await
            }
        };

        let router = std::mem::take(&mut self.router);
        self.router = router.route(path, on(verb.method_filter(), handler));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use futures_util::FutureExt;
    use tower::ServiceExt;

    fn echo_path_vars() -> RouteFn {
        Arc::new(|raw: RawRequest| {
            async move {
                let mut vars: Vec<_> = raw
                    .path_vars()
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect();
                vars.sort();
                vars.join("&").into_response()
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn test_path_vars_and_verb_filter() {
        let mut router = AxumRouter::new();
        router.register_route(Verb::Get, "/widgets/{id}/parts/{part}", echo_path_vars());
        router.register_route(Verb::Delete, "/widgets/{id}/parts/{part}", echo_path_vars());
        let app = router.into_router();

        let res = app
            .clone()
            .oneshot(
                axum::http::Request::get("/widgets/7/parts/a%20b")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, "id=7&part=a b");

        let res = app
            .oneshot(
                axum::http::Request::post("/widgets/7/parts/a")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
