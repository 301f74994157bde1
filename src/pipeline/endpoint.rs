//! One bound endpoint: definition, wrapped handler and shared settings.

use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use serde::Serialize;
use tracing::Instrument;

use crate::codec::CodecError;
use crate::dispatch::HandlerFn;
use crate::http::request::{RawRequest, Request, RequestContext};
use crate::http::response::Response;
use crate::http::router::RouteFn;
use crate::observability::metrics;
use crate::observability::trace::{Category, MessageTracer, TraceFinalizer, Tracer};
use crate::pipeline::error::PipelineError;
use crate::pipeline::extract::extract_args;
use crate::pipeline::negotiate::negotiate;
use crate::pipeline::reply::{catch_fault, guaranteed_reply, HandlerFault, ReplyOutcome};
use crate::pipeline::root::Shared;
use crate::resource::{BodyShape, ResourceDef, Verb};

pub(crate) struct BoundEndpoint<A, B, R> {
    def: ResourceDef<A, B, R>,
    handler: HandlerFn<A, B, R>,
    shared: Shared,
    name: String,
}

impl<A, B, R> BoundEndpoint<A, B, R>
where
    A: Send + 'static,
    B: Send + 'static,
    R: Serialize + Send + 'static,
{
    pub(crate) fn new(def: ResourceDef<A, B, R>, handler: HandlerFn<A, B, R>, shared: Shared) -> Self {
        let name = def.name();
        Self {
            def,
            handler,
            shared,
            name,
        }
    }

    pub(crate) fn into_route(self) -> RouteFn {
        let endpoint = Arc::new(self);
        Arc::new(move |raw: RawRequest| {
            let endpoint = Arc::clone(&endpoint);
            async move { endpoint.serve(raw).await }.boxed()
        })
    }

    /// Serve one request. Always returns a response.
    pub(crate) async fn serve(&self, mut raw: RawRequest) -> axum::response::Response {
        let start = Instant::now();
        raw.set_body_limit(self.shared.max_body_bytes);

        let tracer = MessageTracer::from_headers(
            raw.headers(),
            &self.shared.trace_header,
            &self.shared.span_header,
        );
        let _finalizer = TraceFinalizer::new(tracer.clone(), Arc::clone(&self.shared.trace_sink));
        let span = tracing::info_span!(
            "endpoint",
            resource = %self.name,
            trace_id = %tracer.trace_id(),
            span_id = %tracer.span_id(),
        );

        let result = catch_fault(self.run(raw, &tracer))
            .instrument(span.clone())
            .await
            .and_then(|inner| inner);
        let (outcome, fault) = match result {
            Ok(outcome) => (outcome, None),
            Err(fault) => (ReplyOutcome::default(), Some(fault)),
        };

        let _entered = span.enter();
        let response = guaranteed_reply(outcome, fault.as_ref(), &tracer, &self.name);
        metrics::record_reply(
            self.def.verb().as_str(),
            &self.name,
            response.status().as_u16(),
            start,
        );
        response
    }

    async fn run(
        &self,
        mut raw: RawRequest,
        tracer: &MessageTracer,
    ) -> Result<ReplyOutcome, HandlerFault> {
        let verb = self.def.verb();
        let mut outcome = ReplyOutcome {
            head_only: verb == Verb::Head,
            ..Default::default()
        };

        let extracted = extract_args(&mut raw, verb).await;
        tracer.received(&self.name, &extracted.args, raw.headers());

        let args = match self.def.args_binder().bind(&extracted.args) {
            Ok(args) => args,
            Err(e) => {
                let err = PipelineError::from(e);
                tracing::warn!(error = %err, "Rejecting request");
                outcome.fail(&err);
                return Ok(outcome);
            }
        };

        let request_types = raw.content_types();
        let body = if verb.has_body() && self.def.body_shape().is_declared() {
            match self.decode_body(&mut raw, &request_types, &extracted.form, tracer).await {
                Ok(body) => body,
                Err(e) => {
                    let err = PipelineError::BodyDecode(e);
                    tracing::warn!(error = %err, "Rejecting request");
                    outcome.fail(&err);
                    return Ok(outcome);
                }
            }
        } else {
            None
        };

        let context = RequestContext::new(Arc::new(tracer.clone()));
        let request = Request::bound(args, body, context, self.name.clone(), raw);
        let response = catch_fault((self.handler)(request, Response::new())).await?;

        let Response {
            status,
            message,
            headers,
            content_type,
            body,
            error,
        } = response;

        if let Some(error) = &error {
            tracer.annotate(Category::Error, "request failed", &error.to_string());
            tracing::warn!(error = %error, "Handler reported an error");
        }

        outcome.status = status;
        outcome.message = message;
        outcome.headers = headers;
        match status {
            Some(status) if status.is_success() => {}
            _ => return Ok(outcome),
        }

        let content_type = negotiate(
            content_type.as_deref(),
            self.def.response_content_types(),
            &request_types,
            self.def.request_content_types(),
        );
        let binary = body.is_binary();
        match self.shared.codecs.encode_reply(body, &content_type).await {
            Ok(bytes) => {
                if binary {
                    tracer.annotate_binary(Category::ResponseData, "body", bytes.clone(), &content_type);
                } else {
                    tracer.annotate(Category::ResponseData, "body", &String::from_utf8_lossy(&bytes));
                }
                outcome.body = bytes;
                outcome.content_type = Some(content_type);
            }
            Err(e) => {
                let err = PipelineError::BodyEncode(e);
                tracing::error!(error = %err, content_type = %content_type, "Failed to encode reply");
                outcome.fail(&err);
            }
        }

        Ok(outcome)
    }

    async fn decode_body(
        &self,
        raw: &mut RawRequest,
        request_types: &[String],
        form: &std::collections::HashMap<String, String>,
        tracer: &MessageTracer,
    ) -> Result<Option<B>, CodecError> {
        let shape: &BodyShape<B> = self.def.body_shape();
        let bytes = raw.bytes().await?;
        tracer.annotate_binary(
            Category::RequestData,
            "body",
            bytes.clone(),
            request_types.first().map(String::as_str).unwrap_or_default(),
        );
        self.shared.codecs.decode_body(shape, bytes, request_types, form)
    }
}
