//! The per-request terminal state machine: `New -> {Responded, Hijacked, Upgraded}`.

use crate::context::request::{Request, RequestBody};
use crate::error::{RelicError, Result};
use crate::path::NormalizedPath;
use arc_swap::ArcSwap;
use http::Response;
use std::collections::HashSet;
use std::sync::Mutex;

/// The outcome a server adapter acts on once a request reaches a terminal state.
pub enum HandledContext {
    Responded(Response<RequestBody>),
    /// The connection has been handed off to the adapter's hijack callback.
    Hijacked,
    /// The connection has been handed off as a protocol upgrade (e.g. WebSocket).
    Upgraded,
}

enum State {
    New,
    Responded(Response<RequestBody>),
    Hijacked,
    Upgraded,
}

/// Wraps a [`Request`] with its terminal-state tracking.
///
/// `with_response` may be called repeatedly — each call replaces the
/// previously stored response, which lets outer middleware rewrite a
/// response an inner handler already produced. Every other transition,
/// and any transition attempted after `hijack`/`upgrade`, fails with
/// [`RelicError::AlreadyHandled`].
pub struct RequestContext {
    request: ArcSwap<Request>,
    state: Mutex<State>,
    supports_hijack: bool,
    supports_upgrade: bool,
    /// Every path this request's token has been dispatched against so far,
    /// across the original entry and any `forward_to` re-entries. Used to
    /// detect a handler forwarding a request back onto a path it (directly
    /// or transitively) already visited — see `RelicRouter::forward_to`.
    forward_chain: Mutex<HashSet<NormalizedPath>>,
}

impl RequestContext {
    /// Build a context with no escape-hatch capabilities — `hijack`/
    /// `upgrade` always fail. Use [`RequestContext::with_capabilities`] when
    /// the driving adapter advertises either.
    pub fn new(request: Request) -> Self {
        Self::with_capabilities(request, false, false)
    }

    /// Build a context carrying the capabilities the adapter driving this
    /// request actually advertises (see `crate::server::Adapter`).
    pub fn with_capabilities(request: Request, supports_hijack: bool, supports_upgrade: bool) -> Self {
        Self {
            request: ArcSwap::from_pointee(request),
            state: Mutex::new(State::New),
            supports_hijack,
            supports_upgrade,
            forward_chain: Mutex::new(HashSet::new()),
        }
    }

    pub fn request(&self) -> Request {
        (**self.request.load()).clone()
    }

    /// Replace the request this context carries. Used by the router when a
    /// route match attaches captured path parameters, and by `forward_to`
    /// when re-entering the router with a different path.
    pub fn set_request(&self, request: Request) {
        self.request.store(std::sync::Arc::new(request));
    }

    /// Record that this request's token has now been dispatched against
    /// `path`. Called once per `RelicRouter::dispatch` invocation, whether
    /// that's the original entry or a `forward_to` re-entry.
    pub fn record_dispatch_path(&self, path: &NormalizedPath) {
        self.forward_chain
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.clone());
    }

    /// Whether this request's token has already been dispatched against `path`.
    pub fn has_dispatched_to(&self, path: &NormalizedPath) -> bool {
        self.forward_chain.lock().unwrap_or_else(|e| e.into_inner()).contains(path)
    }

    pub fn is_handled(&self) -> bool {
        !matches!(*self.state.lock().unwrap_or_else(|e| e.into_inner()), State::New)
    }

    pub fn with_response(&self, response: Response<RequestBody>) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match &*state {
            State::New | State::Responded(_) => {
                *state = State::Responded(response);
                Ok(())
            }
            State::Hijacked | State::Upgraded => Err(RelicError::AlreadyHandled),
        }
    }

    /// Transition to `Hijacked`. Fails with `NotHijackable` when the adapter
    /// driving this request didn't advertise hijack support at construction
    /// time, regardless of the current state.
    pub fn hijack(&self) -> Result<()> {
        if !self.supports_hijack {
            return Err(RelicError::NotHijackable);
        }
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match &*state {
            State::New => {
                *state = State::Hijacked;
                Ok(())
            }
            _ => Err(RelicError::AlreadyHandled),
        }
    }

    /// Transition to `Upgraded`. Fails with `NotUpgradable` when the adapter
    /// didn't advertise upgrade support, or when the request headers don't
    /// carry a valid upgrade handshake (`Connection: upgrade`, `Upgrade:
    /// websocket`, a `Sec-WebSocket-Key`).
    pub fn upgrade(&self) -> Result<()> {
        if !self.supports_upgrade || !has_valid_upgrade_handshake(&self.request()) {
            return Err(RelicError::NotUpgradable);
        }
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match &*state {
            State::New => {
                *state = State::Upgraded;
                Ok(())
            }
            _ => Err(RelicError::AlreadyHandled),
        }
    }

    /// Consume the context, returning its final state if it reached one.
    pub fn into_handled(self) -> Option<HandledContext> {
        match self.state.into_inner().unwrap_or_else(|e| e.into_inner()) {
            State::New => None,
            State::Responded(response) => Some(HandledContext::Responded(response)),
            State::Hijacked => Some(HandledContext::Hijacked),
            State::Upgraded => Some(HandledContext::Upgraded),
        }
    }
}

/// A minimal WebSocket handshake check: `Connection` names `upgrade` (it may
/// list other tokens alongside it), `Upgrade` names `websocket`, and a
/// `Sec-WebSocket-Key` is present. Implementing the handshake response, or
/// any other upgrade protocol, is the adapter's job — this only gates the
/// state transition.
fn has_valid_upgrade_handshake(request: &Request) -> bool {
    let connection_has_upgrade = request
        .headers()
        .get(http::header::CONNECTION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.split(',').any(|token| token.trim().eq_ignore_ascii_case("upgrade")));
    let upgrade_is_websocket = request
        .headers()
        .get(http::header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
    connection_has_upgrade && upgrade_is_websocket && request.headers().contains_key("sec-websocket-key")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::Method;
    use http::{HeaderMap, HeaderValue, Response};
    use http_body_util::{BodyExt, Empty};

    fn empty_body() -> crate::context::RequestBody {
        http_body_util::combinators::BoxBody::new(Empty::new().map_err(|never: std::convert::Infallible| match never {}))
    }

    fn plain_request() -> Request {
        Request::new(Method::Get, "/a".into(), String::new(), HeaderMap::new(), empty_body())
    }

    fn upgrade_request() -> Request {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::CONNECTION, HeaderValue::from_static("Upgrade"));
        headers.insert(http::header::UPGRADE, HeaderValue::from_static("websocket"));
        headers.insert("sec-websocket-key", HeaderValue::from_static("dGhlIHNhbXBsZSBub25jZQ=="));
        Request::new(Method::Get, "/ws".into(), String::new(), headers, empty_body())
    }

    fn ctx() -> RequestContext {
        RequestContext::new(plain_request())
    }

    fn response() -> Response<RequestBody> {
        Response::new(http_body_util::combinators::BoxBody::new(
            Empty::new().map_err(|never: std::convert::Infallible| match never {}),
        ))
    }

    #[test]
    fn responded_can_be_re_emitted() {
        let c = ctx();
        c.with_response(response()).unwrap();
        assert!(c.with_response(response()).is_ok());
    }

    #[test]
    fn hijacked_rejects_further_transitions() {
        let c = RequestContext::with_capabilities(plain_request(), true, false);
        c.hijack().unwrap();
        assert!(matches!(c.with_response(response()), Err(RelicError::AlreadyHandled)));
        assert!(matches!(c.upgrade(), Err(RelicError::AlreadyHandled)));
    }

    #[test]
    fn hijack_without_adapter_support_fails() {
        let c = ctx();
        assert!(matches!(c.hijack(), Err(RelicError::NotHijackable)));
    }

    #[test]
    fn upgraded_rejects_further_transitions() {
        let c = RequestContext::with_capabilities(upgrade_request(), false, true);
        c.upgrade().unwrap();
        assert!(matches!(c.with_response(response()), Err(RelicError::AlreadyHandled)));
    }

    #[test]
    fn upgrade_without_adapter_support_fails() {
        let c = RequestContext::with_capabilities(upgrade_request(), false, false);
        assert!(matches!(c.upgrade(), Err(RelicError::NotUpgradable)));
    }

    #[test]
    fn upgrade_without_handshake_headers_fails() {
        let c = RequestContext::with_capabilities(plain_request(), false, true);
        assert!(matches!(c.upgrade(), Err(RelicError::NotUpgradable)));
    }

    #[test]
    fn new_context_has_no_handled_outcome() {
        let c = ctx();
        assert!(c.into_handled().is_none());
    }
}
