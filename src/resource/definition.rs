//! Endpoint contract builder.

use std::fmt;
use std::marker::PhantomData;

use axum::body::Bytes;
use serde::de::DeserializeOwned;

use crate::resource::args::{Args, ArgsBinder};
use crate::resource::body::BodyShape;
use crate::resource::verb::Verb;

/// Immutable description of one endpoint.
///
/// `A` is the argument shape, `B` the request body, `R` the reply body.
/// Built with chained calls, then moved into the pipeline by
/// [`RootHandler::bind`](crate::pipeline::RootHandler::bind).
pub struct ResourceDef<A = (), B = (), R = ()> {
    template: String,
    verb: Verb,
    request_content_types: Vec<String>,
    response_content_types: Vec<String>,
    args: ArgsBinder<A>,
    body: BodyShape<B>,
    reply: PhantomData<fn() -> R>,
}

impl ResourceDef {
    pub fn new(verb: Verb, template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            verb,
            request_content_types: Vec::new(),
            response_content_types: Vec::new(),
            args: ArgsBinder::compile(),
            body: BodyShape::None,
            reply: PhantomData,
        }
    }

    pub fn get(template: impl Into<String>) -> Self {
        Self::new(Verb::Get, template)
    }

    pub fn post(template: impl Into<String>) -> Self {
        Self::new(Verb::Post, template)
    }

    pub fn put(template: impl Into<String>) -> Self {
        Self::new(Verb::Put, template)
    }

    pub fn delete(template: impl Into<String>) -> Self {
        Self::new(Verb::Delete, template)
    }

    pub fn head(template: impl Into<String>) -> Self {
        Self::new(Verb::Head, template)
    }

    pub fn patch(template: impl Into<String>) -> Self {
        Self::new(Verb::Patch, template)
    }
}

impl<A, B, R> ResourceDef<A, B, R> {
    fn reshape<A2, B2, R2>(self, args: ArgsBinder<A2>, body: BodyShape<B2>) -> ResourceDef<A2, B2, R2> {
        ResourceDef {
            template: self.template,
            verb: self.verb,
            request_content_types: self.request_content_types,
            response_content_types: self.response_content_types,
            args,
            body,
            reply: PhantomData,
        }
    }

    /// Declare the argument shape filled from path variables and query/form fields.
    pub fn args<A2: Args>(self) -> ResourceDef<A2, B, R> {
        let body = self.body.clone();
        self.reshape(ArgsBinder::compile(), body)
    }

    /// Declare a structured request body decoded through the codec registry.
    pub fn body<B2: DeserializeOwned>(self) -> ResourceDef<A, B2, R> {
        let args = self.args.clone();
        self.reshape(args, BodyShape::structured())
    }

    /// Like [`body`](Self::body), but urlencoded posts bind through `B2`'s field table.
    pub fn form_body<B2: DeserializeOwned + Args>(self) -> ResourceDef<A, B2, R> {
        let args = self.args.clone();
        self.reshape(args, BodyShape::form())
    }

    /// Hand the raw request bytes to the handler.
    pub fn raw_body(self) -> ResourceDef<A, Bytes, R> {
        let args = self.args.clone();
        self.reshape(args, BodyShape::raw())
    }

    /// Declare the reply body type.
    pub fn reply<R2>(self) -> ResourceDef<A, B, R2> {
        let args = self.args.clone();
        let body = self.body.clone();
        self.reshape(args, body)
    }

    /// Request content types accepted, in preference order.
    pub fn accepts<I, S>(mut self, content_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request_content_types = content_types.into_iter().map(Into::into).collect();
        self
    }

    /// Response content types producible, in preference order.
    pub fn produces<I, S>(mut self, content_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.response_content_types = content_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn request_content_types(&self) -> &[String] {
        &self.request_content_types
    }

    pub fn response_content_types(&self) -> &[String] {
        &self.response_content_types
    }

    pub fn args_binder(&self) -> &ArgsBinder<A> {
        &self.args
    }

    pub fn body_shape(&self) -> &BodyShape<B> {
        &self.body
    }

    /// Display name used in traces and logs, e.g. `GET - /widgets/{id}`.
    pub fn name(&self) -> String {
        format!("{} - {}", self.verb, self.template)
    }

    /// Mount the template under `root`.
    pub(crate) fn rooted(mut self, root: &str) -> Self {
        self.template = join_path(root, &self.template);
        self
    }
}

impl<A, B, R> fmt::Debug for ResourceDef<A, B, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDef")
            .field("template", &self.template)
            .field("verb", &self.verb)
            .field("request_content_types", &self.request_content_types)
            .field("response_content_types", &self.response_content_types)
            .field("args", &self.args)
            .field("body", &self.body)
            .finish()
    }
}

fn join_path(root: &str, template: &str) -> String {
    let root = root.trim_end_matches('/');
    let template = template.trim_start_matches('/');
    format!("{root}/{template}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Field;
    use serde::Deserialize;

    #[derive(Debug, Default)]
    struct WidgetId {
        id: u64,
    }

    impl Args for WidgetId {
        fn fields() -> Vec<Field<Self>> {
            vec![Field::uint("id", |w: &mut Self, v: u64| w.id = v)]
        }
    }

    #[derive(Debug, Deserialize)]
    struct NewWidget {
        #[allow(dead_code)]
        name: String,
    }

    #[test]
    fn test_builder_shapes() {
        let def = ResourceDef::put("/widgets/{id}")
            .args::<WidgetId>()
            .body::<NewWidget>()
            .reply::<String>()
            .accepts(["application/json"])
            .produces(["application/json", "text/plain"]);

        assert_eq!(def.verb(), Verb::Put);
        assert_eq!(def.name(), "PUT - /widgets/{id}");
        assert_eq!(def.args_binder().fields().len(), 1);
        assert!(def.body_shape().is_declared());
        assert_eq!(def.response_content_types()[1], "text/plain");
        assert_eq!(def.request_content_types(), ["application/json".to_string()]);
    }

    #[test]
    fn test_default_shapes_are_empty() {
        let def = ResourceDef::get("/ping");
        assert!(def.args_binder().is_empty());
        assert!(!def.body_shape().is_declared());
        assert!(def.response_content_types().is_empty());
    }

    #[test]
    fn test_rooted_template() {
        let def = ResourceDef::get("/widgets").rooted("/api/v1/");
        assert_eq!(def.template(), "/api/v1/widgets");
        assert_eq!(ResourceDef::get("/widgets").rooted("").template(), "/widgets");
        assert_eq!(ResourceDef::get("echo").rooted("/").template(), "/echo");
    }

    #[test]
    fn test_raw_body() {
        let def = ResourceDef::post("/echo").raw_body();
        assert!(def.body_shape().is_raw());
    }
}
