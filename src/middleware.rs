//! Handlers and middleware: the two function shapes a route's dispatch
//! pipeline is built from.
//!
//! A [`Handler`] drives a [`RequestContext`] to a terminal state. A
//! [`Middleware`] wraps one handler to produce another, so middleware
//! registered at `/api` sees every request under `/api/*` before (and,
//! if it chooses to act after awaiting the inner handler, after) the
//! matched route's own handler runs.

use crate::context::RequestContext;
use futures_util::future::BoxFuture;
use std::sync::Arc;

/// Drives a request context to a terminal state. Boxed rather than generic
/// since handlers are registered at runtime from arbitrary call sites.
#[derive(Clone)]
pub struct Handler(Arc<dyn Fn(Arc<RequestContext>) -> BoxFuture<'static, ()> + Send + Sync>);

impl Handler {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        Self(Arc::new(move |ctx| Box::pin(f(ctx))))
    }

    pub fn call(&self, ctx: Arc<RequestContext>) -> BoxFuture<'static, ()> {
        (self.0)(ctx)
    }
}

/// Wraps a [`Handler`] to produce another. Registered against a path prefix;
/// every route beneath that prefix is dispatched through it.
#[derive(Clone)]
pub struct Middleware(Arc<dyn Fn(Handler) -> Handler + Send + Sync>);

impl Middleware {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Handler) -> Handler + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn apply(&self, inner: Handler) -> Handler {
        (self.0)(inner)
    }
}

/// Compose `middlewares` (root-to-leaf registration order) around `leaf`.
///
/// The last-registered (deepest-prefix) middleware wraps the leaf first;
/// the first-registered (shallowest-prefix, typically `/`) ends up
/// outermost, so it is the first thing to observe the request and the
/// last thing to observe the response.
pub fn compose(middlewares: &[Middleware], leaf: Handler) -> Handler {
    middlewares.iter().rev().fold(leaf, |acc, mw| mw.apply(acc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{HandledContext, Request};
    use crate::routing::Method;
    use http::{HeaderMap, Response};
    use http_body_util::{BodyExt, Empty};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn ctx() -> Arc<RequestContext> {
        let req = Request::new(
            Method::Get,
            "/a".into(),
            String::new(),
            HeaderMap::new(),
            http_body_util::combinators::BoxBody::new(Empty::new().map_err(|n: std::convert::Infallible| match n {})),
        );
        Arc::new(RequestContext::new(req))
    }

    fn respond_leaf() -> Handler {
        Handler::new(|ctx: Arc<RequestContext>| async move {
            let response = Response::new(http_body_util::combinators::BoxBody::new(
                Empty::new().map_err(|n: std::convert::Infallible| match n {}),
            ));
            ctx.with_response(response).unwrap();
        })
    }

    fn marker_middleware(log: Arc<std::sync::Mutex<Vec<&'static str>>>, name: &'static str) -> Middleware {
        Middleware::new(move |inner: Handler| {
            let log = log.clone();
            Handler::new(move |ctx: Arc<RequestContext>| {
                let log = log.clone();
                let inner = inner.clone();
                async move {
                    log.lock().unwrap().push(name);
                    inner.call(ctx).await;
                }
            })
        })
    }

    #[tokio::test]
    async fn outermost_middleware_observes_first() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let chain = vec![marker_middleware(log.clone(), "root"), marker_middleware(log.clone(), "api")];
        let handler = compose(&chain, respond_leaf());
        let c = ctx();
        handler.call(c.clone()).await;
        assert_eq!(*log.lock().unwrap(), vec!["root", "api"]);
        assert!(matches!(c.into_handled(), Some(HandledContext::Responded(_))));
    }

    #[tokio::test]
    async fn empty_chain_runs_the_leaf_directly() {
        let c = ctx();
        compose(&[], respond_leaf()).call(c.clone()).await;
        assert!(c.is_handled());
    }

    #[tokio::test]
    async fn counts_each_middleware_exactly_once() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter2 = counter.clone();
        let mw = Middleware::new(move |inner: Handler| {
            let counter = counter2.clone();
            Handler::new(move |ctx: Arc<RequestContext>| {
                let counter = counter.clone();
                let inner = inner.clone();
                async move {
                    counter.fetch_add(1, Ordering::Relaxed);
                    inner.call(ctx).await;
                }
            })
        });
        let handler = compose(&[mw], respond_leaf());
        handler.call(ctx()).await;
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }
}
