//! Verb-tagged handler functions.

use std::fmt;

use crate::dispatch::HandlerFn;
use crate::resource::Verb;

/// One verb a handler can serve, with its function.
pub enum Capability<A, B, R> {
    Get(HandlerFn<A, B, R>),
    Post(HandlerFn<A, B, R>),
    Put(HandlerFn<A, B, R>),
    Delete(HandlerFn<A, B, R>),
    Head(HandlerFn<A, B, R>),
    Patch(HandlerFn<A, B, R>),
}

impl<A, B, R> Clone for Capability<A, B, R> {
    fn clone(&self) -> Self {
        let (verb, f) = self.parts();
        Capability::new(verb, f.clone())
    }
}

impl<A, B, R> fmt::Debug for Capability<A, B, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capability({})", self.verb())
    }
}

impl<A, B, R> Capability<A, B, R> {
    pub fn new(verb: Verb, f: HandlerFn<A, B, R>) -> Self {
        match verb {
            Verb::Get => Capability::Get(f),
            Verb::Post => Capability::Post(f),
            Verb::Put => Capability::Put(f),
            Verb::Delete => Capability::Delete(f),
            Verb::Head => Capability::Head(f),
            Verb::Patch => Capability::Patch(f),
        }
    }

    fn parts(&self) -> (Verb, &HandlerFn<A, B, R>) {
        match self {
            Capability::Get(f) => (Verb::Get, f),
            Capability::Post(f) => (Verb::Post, f),
            Capability::Put(f) => (Verb::Put, f),
            Capability::Delete(f) => (Verb::Delete, f),
            Capability::Head(f) => (Verb::Head, f),
            Capability::Patch(f) => (Verb::Patch, f),
        }
    }

    pub fn verb(&self) -> Verb {
        self.parts().0
    }

    pub fn into_fn(self) -> HandlerFn<A, B, R> {
        match self {
            Capability::Get(f)
            | Capability::Post(f)
            | Capability::Put(f)
            | Capability::Delete(f)
            | Capability::Head(f)
            | Capability::Patch(f) => f,
        }
    }
}

/// The set of verbs a handler serves. Later entries for a verb replace earlier ones.
pub struct Capabilities<A, B, R> {
    table: Vec<Capability<A, B, R>>,
}

impl<A, B, R> Default for Capabilities<A, B, R> {
    fn default() -> Self {
        Self { table: Vec::new() }
    }
}

impl<A, B, R> Clone for Capabilities<A, B, R> {
    fn clone(&self) -> Self {
        Self { table: self.table.clone() }
    }
}

impl<A, B, R> fmt::Debug for Capabilities<A, B, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.table.iter().map(Capability::verb)).finish()
    }
}

impl<A, B, R> Capabilities<A, B, R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, capability: Capability<A, B, R>) -> Self {
        let verb = capability.verb();
        self.table.retain(|existing| existing.verb() != verb);
        self.table.push(capability);
        self
    }

    pub fn get(self, f: HandlerFn<A, B, R>) -> Self {
        self.with(Capability::Get(f))
    }

    pub fn post(self, f: HandlerFn<A, B, R>) -> Self {
        self.with(Capability::Post(f))
    }

    pub fn put(self, f: HandlerFn<A, B, R>) -> Self {
        self.with(Capability::Put(f))
    }

    pub fn delete(self, f: HandlerFn<A, B, R>) -> Self {
        self.with(Capability::Delete(f))
    }

    pub fn head(self, f: HandlerFn<A, B, R>) -> Self {
        self.with(Capability::Head(f))
    }

    pub fn patch(self, f: HandlerFn<A, B, R>) -> Self {
        self.with(Capability::Patch(f))
    }

    pub fn supports(&self, verb: Verb) -> bool {
        self.table.iter().any(|c| c.verb() == verb)
    }

    /// Take the function registered for `verb`.
    pub fn resolve(self, verb: Verb) -> Option<HandlerFn<A, B, R>> {
        self.table
            .into_iter()
            .find(|c| c.verb() == verb)
            .map(Capability::into_fn)
    }
}

/// A value that serves one or more verbs for an endpoint.
pub trait Handler<A, B, R>: Send + Sync {
    fn capabilities(&self) -> Capabilities<A, B, R>;
}

impl<A, B, R> Handler<A, B, R> for Capabilities<A, B, R> {
    fn capabilities(&self) -> Capabilities<A, B, R> {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::handler_fn;
    use crate::http::{Request, Response};

    fn status_handler(code: u16) -> HandlerFn<(), (), ()> {
        handler_fn(move |_req, mut res: Response<()>| async move {
            res.set_status(code, "set");
            res
        })
    }

    #[test]
    fn test_supports() {
        let caps = Capabilities::new()
            .get(status_handler(200))
            .delete(status_handler(204));
        assert!(caps.supports(Verb::Get));
        assert!(caps.supports(Verb::Delete));
        assert!(!caps.supports(Verb::Patch));
        assert_eq!(format!("{caps:?}"), "[Get, Delete]");
    }

    #[tokio::test]
    async fn test_later_entry_replaces_earlier() {
        let caps = Capabilities::new()
            .post(status_handler(200))
            .post(status_handler(201));
        let f = caps.resolve(Verb::Post).unwrap();
        let res = f(Request::local((), None), Response::new()).await;
        assert_eq!(res.status().map(|s| s.as_u16()), Some(201));
    }

    #[test]
    fn test_capability_verb() {
        let cap = Capability::new(Verb::Head, status_handler(200));
        assert!(matches!(cap, Capability::Head(_)));
        assert_eq!(cap.clone().verb(), Verb::Head);
    }
}
