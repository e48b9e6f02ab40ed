//! `RelicRouter`: a method-aware route table plus path-scoped middleware,
//! composed fresh for every dispatch and hot-swappable as a unit.

use crate::accessor::path_param::captured_store;
use crate::context::builtin::{
    matched_path_property, path_parameters_property, query_parameters_property, remaining_path_property,
    router_property,
};
use crate::context::{HandledContext, Request, RequestContext};
use crate::error::{RelicError, Result};
use crate::middleware::{compose, Handler, Middleware};
use crate::path::{parse_pattern, NormalizedPath};
use crate::routing::{LookupResult, Method, MethodRouter};
use arc_swap::ArcSwap;
use http::{Response, StatusCode};
use http_body_util::{combinators::BoxBody, BodyExt, Empty};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

fn empty_response(status: StatusCode) -> Response<crate::context::RequestBody> {
    Response::builder()
        .status(status)
        .body(BoxBody::new(Empty::new().map_err(|never: std::convert::Infallible| match never {})))
        .expect("status and empty body are always a valid response")
}

/// Literal-prefix trie used purely to resolve which middleware a request
/// path passes through — patterns (`:param`, `*`, `**`) are never used here,
/// since `use()` is always registered against a concrete path prefix.
#[derive(Default)]
struct MiddlewareTrie {
    middlewares: Vec<Middleware>,
    children: HashMap<String, MiddlewareTrie>,
}

impl MiddlewareTrie {
    fn register(&mut self, prefix: &NormalizedPath, middleware: Middleware) {
        let mut node = self;
        for segment in prefix.segments() {
            node = node.children.entry(segment.clone()).or_default();
        }
        node.middlewares.push(middleware);
    }

    /// Middleware along the root-to-leaf path covering `path`, in
    /// registration order.
    fn collect_for(&self, path: &NormalizedPath) -> Vec<Middleware> {
        let mut collected = self.middlewares.clone();
        let mut node = self;
        for segment in path.segments() {
            match node.children.get(segment) {
                Some(child) => {
                    collected.extend(child.middlewares.iter().cloned());
                    node = child;
                }
                None => break,
            }
        }
        collected
    }
}

/// A complete, immutable snapshot of a router's routes, middleware and miss
/// policy. Swapped atomically by [`RelicRouter::inject`].
pub struct RouterState {
    routes: MethodRouter<Handler>,
    middleware: MiddlewareTrie,
    not_found: Handler,
    method_not_allowed: Arc<dyn Fn(Vec<Method>) -> Handler + Send + Sync>,
}

impl RouterState {
    fn default_not_found() -> Handler {
        Handler::new(|ctx: Arc<RequestContext>| async move {
            let _ = ctx.with_response(empty_response(StatusCode::NOT_FOUND));
        })
    }

    fn default_method_not_allowed(allowed: Vec<Method>) -> Handler {
        let allow_header = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
        Handler::new(move |ctx: Arc<RequestContext>| {
            let allow_header = allow_header.clone();
            async move {
                let mut response = empty_response(StatusCode::METHOD_NOT_ALLOWED);
                if let Ok(value) = http::HeaderValue::from_str(&allow_header) {
                    response.headers_mut().insert(http::header::ALLOW, value);
                }
                let _ = ctx.with_response(response);
            }
        })
    }
}

/// Builds a [`RouterState`] before it goes live. Registration errors
/// (`DuplicateRoute`, `ParameterConflict`, `MethodConflict`, `TailNotFinal`)
/// surface here, at startup, never during request handling.
pub struct RouterBuilder {
    routes: MethodRouter<Handler>,
    middleware: MiddlewareTrie,
    not_found: Handler,
    method_not_allowed: Arc<dyn Fn(Vec<Method>) -> Handler + Send + Sync>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            routes: MethodRouter::new(),
            middleware: MiddlewareTrie::default(),
            not_found: RouterState::default_not_found(),
            method_not_allowed: Arc::new(RouterState::default_method_not_allowed),
        }
    }

    pub fn add(&mut self, method: Method, pattern: &str, handler: Handler) -> Result<&mut Self> {
        self.routes.add(method, &parse_pattern(pattern)?, handler)?;
        Ok(self)
    }

    pub fn any_of(&mut self, methods: &[Method], pattern: &str, handler: Handler) -> Result<&mut Self> {
        self.routes.any_of(methods, &parse_pattern(pattern)?, handler)?;
        Ok(self)
    }

    pub fn any(&mut self, pattern: &str, handler: Handler) -> Result<&mut Self> {
        self.routes.any(&parse_pattern(pattern)?, handler)?;
        Ok(self)
    }

    pub fn use_middleware(&mut self, prefix: &str, middleware: Middleware) -> &mut Self {
        self.middleware.register(&NormalizedPath::parse(prefix), middleware);
        self
    }

    /// Override the default 404 response.
    pub fn not_found(&mut self, handler: Handler) -> &mut Self {
        self.not_found = handler;
        self
    }

    /// Override the default 405 + `Allow` response.
    pub fn with_method_not_allowed(&mut self, policy: impl Fn(Vec<Method>) -> Handler + Send + Sync + 'static) -> &mut Self {
        self.method_not_allowed = Arc::new(policy);
        self
    }

    pub fn build(self) -> RouterState {
        RouterState {
            routes: self.routes,
            middleware: self.middleware,
            not_found: self.not_found,
            method_not_allowed: self.method_not_allowed,
        }
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The live, hot-reloadable route table. Reads (every dispatch) are
/// lock-free; a rebuild via [`RelicRouter::inject`] constructs an entirely
/// new [`RouterState`] off to the side and swaps it in atomically, so
/// in-flight requests always see one consistent table, never a partially
/// rebuilt one.
pub struct RelicRouter {
    state: ArcSwap<RouterState>,
    build_lock: Mutex<()>,
    self_ref: Weak<RelicRouter>,
}

impl RelicRouter {
    /// Built via `Arc::new_cyclic` so the router can hand out a reference to
    /// itself (the `router` built-in property, set on every successful
    /// dispatch) without a handler or middleware needing to be threaded an
    /// `Arc<RelicRouter>` separately.
    pub fn new(state: RouterState) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            state: ArcSwap::from_pointee(state),
            build_lock: Mutex::new(()),
            self_ref: weak.clone(),
        })
    }

    /// Atomically replace the live route table. `rebuild` constructs the
    /// replacement from scratch (typically by re-running the same
    /// registration calls against a fresh `RouterBuilder`) and can fail,
    /// in which case the previously live table is left untouched.
    pub fn inject(&self, rebuild: impl FnOnce() -> Result<RouterState>) -> Result<()> {
        let _guard = self.build_lock.lock().unwrap_or_else(|e| e.into_inner());
        let next = rebuild()?;
        self.state.store(Arc::new(next));
        Ok(())
    }

    /// Route `ctx`'s current request, attach any captured path parameters,
    /// compose the matching middleware chain around the resolved handler
    /// (or the not-found / method-not-allowed policy), and run it to
    /// completion.
    pub async fn dispatch(&self, ctx: &Arc<RequestContext>) {
        let state = self.state.load_full();
        let request = ctx.request();
        let path = request.path().clone();
        let method = request.method();
        ctx.record_dispatch_path(&path);

        // A `PathMiss` never reached a trie terminal, so it never sees
        // middleware — it goes straight to the fallback. `Match` and
        // `MethodMiss` both resolved to a terminal (the latter just lacks a
        // handler for this method), so both pass through the middleware
        // collected for that terminal's ancestors.
        let handler = match state.routes.lookup(&path, method) {
            LookupResult::Match {
                value,
                parameters,
                matched,
                remaining,
            } => {
                let path_params = Arc::new(captured_store(parameters));
                let next_request = request.with_captured_params((*path_params).clone());
                let properties = next_request.properties();
                path_parameters_property().set(properties, path_params);
                query_parameters_property().set(properties, Arc::new(next_request.query_params().clone()));
                matched_path_property().set(properties, matched);
                remaining_path_property().set(properties, remaining);
                if let Some(router) = self.self_ref.upgrade() {
                    router_property().set(properties, router);
                }
                ctx.set_request(next_request);
                value
            }
            LookupResult::PathMiss => {
                state.not_found.call(ctx.clone()).await;
                return;
            }
            LookupResult::MethodMiss { allowed } => (state.method_not_allowed)(allowed),
        };

        let middlewares = state.middleware.collect_for(&path);
        compose(&middlewares, handler).call(ctx.clone()).await;
    }

    /// Re-enter the router with a new path, preserving `ctx`'s token, body
    /// handle and properties, optionally replacing the headers (`None` keeps
    /// the current request's headers). Fails with `ForwardNotRouted` if `ctx`
    /// has already reached a terminal state, or with `ForwardLoopDetected` if
    /// `raw_path` has already been dispatched against under this request's
    /// token — directly, or through an earlier `forward_to` in the same
    /// chain — which would otherwise recurse through `dispatch`/`forward_to`
    /// without bound.
    pub async fn forward_to(&self, ctx: &Arc<RequestContext>, raw_path: String, headers: Option<http::HeaderMap>) -> Result<()> {
        if ctx.is_handled() {
            return Err(RelicError::ForwardNotRouted);
        }
        let target = NormalizedPath::parse(&raw_path);
        if ctx.has_dispatched_to(&target) {
            return Err(RelicError::ForwardLoopDetected { path: raw_path });
        }
        ctx.set_request(ctx.request().copy_with(raw_path, headers));
        self.dispatch(ctx).await;
        Ok(())
    }
}
