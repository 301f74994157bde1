//! Endpoint binding entry point.

use std::sync::Arc;

use serde::Serialize;

use crate::codec::CodecRegistry;
use crate::config::ServiceConfig;
use crate::dispatch::{dispatch, Anonymous, BindError, Binder, Handler};
use crate::http::request::DEFAULT_BODY_LIMIT;
use crate::http::router::{RouteFn, SimpleRouter};
use crate::observability::trace::{log_sink, TraceSink};
use crate::pipeline::endpoint::BoundEndpoint;
use crate::resource::{ResourceDef, Verb};

type CompileFn<'h, Bn> =
    Box<dyn FnOnce(&RootHandler<Bn>) -> Result<(Verb, String, RouteFn), BindError> + 'h>;

/// A definition paired with its handler, for [`RootHandler::bind_all`].
///
/// Erases the argument, body and reply types so endpoints of different
/// shapes can be bound together.
pub struct Binding<'h, Bn = Anonymous> {
    compile: CompileFn<'h, Bn>,
}

impl<'h, Bn: Binder> Binding<'h, Bn> {
    pub fn new<A, B, R, H>(def: ResourceDef<A, B, R>, handler: &'h H) -> Self
    where
        A: Send + 'static,
        B: Send + 'static,
        R: Serialize + Send + 'static,
        H: Handler<A, B, R> + ?Sized,
    {
        Self {
            compile: Box::new(move |root: &RootHandler<Bn>| root.compile(def, handler)),
        }
    }
}

/// Settings every bound endpoint shares.
#[derive(Clone)]
pub(crate) struct Shared {
    pub(crate) codecs: Arc<CodecRegistry>,
    pub(crate) trace_header: String,
    pub(crate) span_header: String,
    pub(crate) trace_sink: TraceSink,
    pub(crate) max_body_bytes: usize,
}

/// Binds resource definitions and handlers onto a router.
///
/// ```no_run
/// use endpoint_binder::{handler_fn, AxumRouter, Capabilities, ResourceDef, Response, RootHandler};
///
/// # fn main() -> Result<(), endpoint_binder::BindError> {
/// let root = RootHandler::new();
/// let mut router = AxumRouter::new();
/// let ping = Capabilities::new().get(handler_fn(|_req, mut res: Response<String>| async move {
///     res.reply("pong".to_string());
///     res
/// }));
/// root.bind(&mut router, ResourceDef::get("/ping").reply::<String>(), &ping)?;
/// # Ok(())
/// # }
/// ```
pub struct RootHandler<Bn = Anonymous> {
    shared: Shared,
    binder: Bn,
    resource_root: String,
}

impl Default for RootHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl RootHandler {
    /// JSON codec, `tr-trace`/`tr-span` headers, log trace sink, no resource root.
    pub fn new() -> Self {
        Self {
            shared: Shared {
                codecs: Arc::new(CodecRegistry::new()),
                trace_header: "tr-trace".to_string(),
                span_header: "tr-span".to_string(),
                trace_sink: log_sink(),
                max_body_bytes: DEFAULT_BODY_LIMIT,
            },
            binder: Anonymous,
            resource_root: "/".to_string(),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new()
            .with_trace_headers(&config.tracing.trace_header, &config.tracing.span_header)
            .with_resource_root(&config.binding.resource_root)
            .with_body_limit(config.binding.max_body_bytes)
    }
}

impl<Bn: Binder> RootHandler<Bn> {
    /// Replace the binder applied to every handler bound afterwards.
    pub fn with_binder<B2: Binder>(self, binder: B2) -> RootHandler<B2> {
        RootHandler {
            shared: self.shared,
            binder,
            resource_root: self.resource_root,
        }
    }

    pub fn with_codecs(mut self, codecs: CodecRegistry) -> Self {
        self.shared.codecs = Arc::new(codecs);
        self
    }

    /// Mutable access to the codec registry.
    ///
    /// Returns `None` once an endpoint has been bound, since bound endpoints
    /// share the registry.
    pub fn codecs_mut(&mut self) -> Option<&mut CodecRegistry> {
        Arc::get_mut(&mut self.shared.codecs)
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.shared.codecs
    }

    pub fn with_trace_headers(mut self, trace_header: &str, span_header: &str) -> Self {
        self.shared.trace_header = trace_header.to_string();
        self.shared.span_header = span_header.to_string();
        self
    }

    pub fn with_trace_sink(mut self, sink: TraceSink) -> Self {
        self.shared.trace_sink = sink;
        self
    }

    /// Prefix joined in front of every template bound afterwards.
    pub fn with_resource_root(mut self, root: &str) -> Self {
        self.resource_root = root.to_string();
        self
    }

    pub fn with_body_limit(mut self, max_body_bytes: usize) -> Self {
        self.shared.max_body_bytes = max_body_bytes;
        self
    }

    /// Build the route function for `def` without mounting it.
    ///
    /// Returns the verb and full path to mount it under.
    pub fn compile<A, B, R, H>(
        &self,
        def: ResourceDef<A, B, R>,
        handler: &H,
    ) -> Result<(Verb, String, RouteFn), BindError>
    where
        A: Send + 'static,
        B: Send + 'static,
        R: Serialize + Send + 'static,
        H: Handler<A, B, R> + ?Sized,
    {
        let def = def.rooted(&self.resource_root);
        let verb = def.verb();
        let path = def.template().to_string();
        let inner = dispatch(handler, verb)?;
        let wrapped = self.binder.bind(inner);
        let route = BoundEndpoint::new(def, wrapped, self.shared.clone()).into_route();
        Ok((verb, path, route))
    }

    /// Bind `handler` to `def` and mount it on `router`.
    ///
    /// Fails when the handler has no capability for the definition's verb.
    pub fn bind<A, B, R, H>(
        &self,
        router: &mut impl SimpleRouter,
        def: ResourceDef<A, B, R>,
        handler: &H,
    ) -> Result<(), BindError>
    where
        A: Send + 'static,
        B: Send + 'static,
        R: Serialize + Send + 'static,
        H: Handler<A, B, R> + ?Sized,
    {
        let (verb, path, route) = self.compile(def, handler)?;
        router.register_route(verb, &path, route);
        tracing::info!(verb = %verb, path = %path, "Bound endpoint");
        Ok(())
    }

    /// Bind every endpoint in `bindings`.
    ///
    /// All endpoints are compiled before any is mounted, so a failure leaves
    /// `router` untouched.
    pub fn bind_all<'h>(
        &self,
        router: &mut impl SimpleRouter,
        bindings: impl IntoIterator<Item = Binding<'h, Bn>>,
    ) -> Result<(), BindError> {
        let routes = bindings
            .into_iter()
            .map(|binding| (binding.compile)(self))
            .collect::<Result<Vec<_>, _>>()?;
        for (verb, path, route) in routes {
            router.register_route(verb, &path, route);
            tracing::info!(verb = %verb, path = %path, "Bound endpoint");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{handler_fn, Capabilities};
    use crate::http::Response;

    struct Recorder(Vec<(Verb, String)>);

    impl SimpleRouter for Recorder {
        fn register_route(&mut self, verb: Verb, path: &str, _route: RouteFn) {
            self.0.push((verb, path.to_string()));
        }
    }

    fn get_only() -> Capabilities<(), (), ()> {
        Capabilities::new().get(handler_fn(|_req, mut res: Response<()>| async move {
            res.set_status(204, "No Content");
            res
        }))
    }

    #[test]
    fn test_bind_joins_resource_root() {
        let root = RootHandler::new().with_resource_root("/api/v1");
        let mut router = Recorder(Vec::new());
        root.bind(&mut router, ResourceDef::get("/widgets"), &get_only()).unwrap();
        assert_eq!(router.0, vec![(Verb::Get, "/api/v1/widgets".to_string())]);
    }

    #[test]
    fn test_bind_fails_fast_on_missing_verb() {
        let root = RootHandler::new();
        let mut router = Recorder(Vec::new());
        let err = root
            .bind(&mut router, ResourceDef::delete("/widgets"), &get_only())
            .unwrap_err();
        assert!(matches!(err, BindError::MissingCapability { verb: Verb::Delete, .. }));
        assert!(router.0.is_empty());
    }

    #[test]
    fn test_bind_all_mixed_shapes() {
        let root = RootHandler::new();
        let mut router = Recorder(Vec::new());
        let get = get_only();
        let echo: Capabilities<(), axum::body::Bytes, ()> =
            Capabilities::new().post(handler_fn(|_req, mut res: Response<()>| async move {
                res.set_status(204, "No Content");
                res
            }));

        root.bind_all(
            &mut router,
            [
                Binding::new(ResourceDef::get("/widgets"), &get),
                Binding::new(ResourceDef::post("/echo").raw_body(), &echo),
            ],
        )
        .unwrap();
        assert_eq!(
            router.0,
            vec![(Verb::Get, "/widgets".to_string()), (Verb::Post, "/echo".to_string())]
        );
    }

    #[test]
    fn test_bind_all_mounts_nothing_on_failure() {
        let root = RootHandler::new();
        let mut router = Recorder(Vec::new());
        let get = get_only();

        let err = root
            .bind_all(
                &mut router,
                [
                    Binding::new(ResourceDef::get("/widgets"), &get),
                    Binding::new(ResourceDef::delete("/widgets"), &get),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, BindError::MissingCapability { verb: Verb::Delete, .. }));
        assert!(router.0.is_empty());
    }

    #[test]
    fn test_codecs_frozen_after_bind() {
        let mut root = RootHandler::new();
        assert!(root.codecs_mut().is_some());

        let mut router = Recorder(Vec::new());
        root.bind(&mut router, ResourceDef::get("/a"), &get_only()).unwrap();
        // The recorder dropped the route, so the registry is exclusive again.
        assert!(root.codecs_mut().is_some());

        let (_, _, route) = root.compile(ResourceDef::get("/b"), &get_only()).unwrap();
        assert!(root.codecs_mut().is_none());
        drop(route);
        assert!(root.codecs_mut().is_some());
    }

    #[test]
    fn test_from_config() {
        let mut config = ServiceConfig::default();
        config.tracing.trace_header = "x-trace".into();
        config.binding.resource_root = "/api".into();
        let root = RootHandler::from_config(&config);
        assert_eq!(root.shared.trace_header, "x-trace");
        assert_eq!(root.resource_root, "/api");
        assert!(root.codecs().lookup_encoder("application/json").is_some());
    }
}
