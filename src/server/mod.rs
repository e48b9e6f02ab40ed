pub mod adapter;
pub mod headers;
pub mod runtime;

pub use adapter::{Adapter, NoEscapeHatches};

use crate::config::RelicConfig;
use crate::context::{HandledContext, Request as RelicRequest, RequestContext};
use crate::error::RelicError;
use crate::router::RelicRouter;
use crate::routing::Method;
use anyhow::Result;
use futures_util::FutureExt;
use http::{Response, StatusCode};
use http_body_util::{combinators::BoxBody, BodyExt, Empty};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{error, info, warn};

fn empty_body() -> crate::context::RequestBody {
    BoxBody::new(Empty::new().map_err(|never: std::convert::Infallible| match never {}))
}

fn status_response(status: StatusCode) -> Response<crate::context::RequestBody> {
    Response::builder()
        .status(status)
        .body(empty_body())
        .expect("status and empty body are always a valid response")
}

/// Runs a [`RelicRouter`] against hyper connections on a single listening
/// socket, with idempotent graceful shutdown.
///
/// A fleet of `RelicServer`s binding the same port with `SO_REUSEPORT`
/// (see [`runtime::instance_count`] and [`bind_reuseport`]) is how this
/// crate scales — each instance is single-threaded and cooperative,
/// dispatching whatever connections the kernel hands it.
pub struct RelicServer {
    router: Arc<RelicRouter>,
    config: RelicConfig,
    adapter: Arc<dyn Adapter>,
    shutdown: Arc<Notify>,
    closed: AtomicBool,
}

impl RelicServer {
    /// Builds a server around the built-in [`NoEscapeHatches`] adapter — no
    /// hijack, no upgrade. Use [`RelicServer::with_adapter`] to advertise
    /// either.
    pub fn new(router: Arc<RelicRouter>, config: RelicConfig) -> Self {
        Self {
            router,
            config,
            adapter: Arc::new(NoEscapeHatches),
            shutdown: Arc::new(Notify::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Replace the adapter capability set this server advertises to every
    /// `RequestContext` it constructs.
    pub fn with_adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapter = adapter;
        self
    }

    /// Idempotent: a second call observes the server already closing and
    /// does nothing further.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.shutdown.notify_waiters();
        }
    }

    /// Bind and serve until `close()` is called, then drain in-flight
    /// connections for up to the configured timeout before returning.
    pub async fn serve(&self) -> Result<()> {
        let addr: SocketAddr = self.config.listen.parse()?;
        let listener = TcpListener::from_std(bind_reuseport(addr)?)?;
        info!("server: listening, addr={}", addr);

        let in_flight = Arc::new(tokio::sync::Semaphore::new(0));
        let active_conns = Arc::new(AtomicI64::new(0));

        loop {
            let accepted = tokio::select! {
                result = listener.accept() => result,
                _ = self.shutdown.notified() => {
                    info!("server: stop accepting new connections, draining...");
                    break;
                }
            };

            let (stream, peer_addr) = match accepted {
                Ok(v) => v,
                Err(e) => {
                    error!("server: accept failed, error={}", e);
                    continue;
                }
            };

            active_conns.fetch_add(1, Ordering::Relaxed);
            in_flight.add_permits(1);
            let in_flight = in_flight.clone();
            let active_conns = active_conns.clone();
            let router = self.router.clone();
            let config = self.config.clone();
            let adapter = self.adapter.clone();

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let router = router.clone();
                let config = config.clone();
                let adapter = adapter.clone();
                let svc = service_fn(move |req: hyper::Request<Incoming>| {
                    let router = router.clone();
                    let config = config.clone();
                    let adapter = adapter.clone();
                    async move { Ok::<_, std::convert::Infallible>(handle(req, &router, &config, &adapter).await) }
                });

                if let Err(e) = auto::Builder::new(TokioExecutor::new())
                    .http1()
                    .keep_alive(true)
                    .http2()
                    .keep_alive_interval(Some(Duration::from_secs(20)))
                    .serve_connection_with_upgrades(io, svc)
                    .await
                {
                    if !e.to_string().contains("connection closed") {
                        error!("server: connection error, peer={}, error={}", peer_addr, e);
                    }
                }

                active_conns.fetch_sub(1, Ordering::Relaxed);
                let _ = in_flight.acquire().await;
            });
        }

        let active = active_conns.load(Ordering::Relaxed);
        if active > 0 {
            info!("server: waiting for {} active connections to drain", active);
            let drain = async {
                loop {
                    if active_conns.load(Ordering::Relaxed) == 0 {
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            };
            match tokio::time::timeout(self.config.drain_timeout(), drain).await {
                Ok(_) => info!("server: all connections drained"),
                Err(_) => {
                    let remaining = active_conns.load(Ordering::Relaxed);
                    warn!(
                        "server: drain timeout ({}s), {} connections still active",
                        self.config.drain_timeout_secs,
                        remaining
                    );
                }
            }
        }

        Ok(())
    }
}

/// Convert one hyper request into a `Request`, dispatch it through the
/// router, and convert the result back into a hyper-compatible response.
/// Requests failing header-layer validation never reach the router at all.
/// Hijacked/upgraded outcomes are not representable as a hyper `Response`
/// in this minimal adapter — they fall through to a 501, even when `adapter`
/// does advertise support for either, since actually taking the connection
/// over is the adapter implementation's job, not this conversion function's.
async fn handle(
    req: hyper::Request<Incoming>,
    router: &RelicRouter,
    config: &RelicConfig,
    adapter: &Arc<dyn Adapter>,
) -> Response<crate::context::RequestBody> {
    let method = match req.method().as_str().parse::<Method>() {
        Ok(m) => m,
        Err(_) => return status_response(StatusCode::NOT_IMPLEMENTED),
    };

    let headers = req.headers().clone();
    if let Err(err) = headers::validate_headers(&headers, config) {
        return header_error_response(&err);
    }

    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();
    let body = req
        .into_body()
        .map_err(|e| Box::new(e) as crate::context::RequestBodyError)
        .boxed();

    let request = RelicRequest::new(method, path, query, headers, body);
    let ctx = Arc::new(RequestContext::with_capabilities(
        request,
        adapter.supports_hijack(),
        adapter.supports_upgrade(),
    ));

    let outcome = AssertUnwindSafe(router.dispatch(&ctx)).catch_unwind().await;
    if let Err(panic) = outcome {
        let detail = panic_message(&panic);
        error!("server: handler panicked, detail={}", detail);
        let _ = ctx.with_response(status_response(StatusCode::INTERNAL_SERVER_ERROR));
    }

    let mut response = match Arc::try_unwrap(ctx).map(RequestContext::into_handled) {
        Ok(Some(HandledContext::Responded(response))) => response,
        Ok(Some(HandledContext::Hijacked)) | Ok(Some(HandledContext::Upgraded)) => {
            status_response(StatusCode::NOT_IMPLEMENTED)
        }
        Ok(None) => {
            error!("server: handler returned without reaching a terminal state");
            status_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
        Err(_) => {
            error!("server: request context outlived its connection task");
            status_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    };

    if config.apply_default_headers {
        headers::apply_default_headers(&mut response, config);
    }

    response
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// The response Relic returns for a request that fails header-layer
/// validation (see [`headers::validate_headers`]) before it ever reaches
/// routing — a malformed `Content-Length`/`Transfer-Encoding` pairing maps
/// to 400, an oversized body to 413.
pub fn header_error_response(err: &RelicError) -> Response<crate::context::RequestBody> {
    warn!("server: header error, detail={}", err);
    let status = match err {
        RelicError::MaxBodySizeExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::BAD_REQUEST,
    };
    status_response(status)
}

/// Bind `addr` with `SO_REUSEADDR`/`SO_REUSEPORT` set before listening, so
/// multiple `RelicServer` instances in this process (or in sibling
/// processes) can each hold their own socket on the same port and let the
/// kernel load-balance accepted connections across them.
fn bind_reuseport(addr: SocketAddr) -> Result<std::net::TcpListener> {
    use socket2::{Domain, Protocol, Socket, Type};

    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;
    Ok(socket.into())
}
