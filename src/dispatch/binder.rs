//! Handler wrapping extension point.
//!
//! A binder sees every bound handler once, at bind time, and returns the
//! function the pipeline will actually call. Authentication, per-handler
//! rate limits and similar concerns live here.

use crate::dispatch::HandlerFn;

pub trait Binder: Send + Sync + 'static {
    fn bind<A, B, R>(&self, inner: HandlerFn<A, B, R>) -> HandlerFn<A, B, R>
    where
        A: Send + 'static,
        B: Send + 'static,
        R: Send + 'static;
}

/// Binder that leaves handlers untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl Binder for Anonymous {
    fn bind<A, B, R>(&self, inner: HandlerFn<A, B, R>) -> HandlerFn<A, B, R>
    where
        A: Send + 'static,
        B: Send + 'static,
        R: Send + 'static,
    {
        inner
    }
}
