//! A small demo binary wiring a handful of illustrative routes into a
//! `RelicServer`. Not part of the library surface — useful as a worked
//! example and as something to point manual/integration testing at.

use clap::Parser;
use http::{Response, StatusCode};
use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full};
use relic::accessor::path_param::PathParam;
use relic::context::RequestContext;
use relic::middleware::{Handler, Middleware};
use relic::router::{RelicRouter, RouterBuilder};
use relic::routing::Method;
use relic::server::RelicServer;
use relic::{config::RelicConfig, RequestBody};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "relic-demo", about = "Demo server exercising Relic's routing core")]
struct Cli {
    /// Path to a TOML or JSON config file; falls back to built-in defaults.
    #[arg(long, default_value = "relic.toml")]
    config: PathBuf,
}

fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
        .init();
    guard
}

fn text_response(status: StatusCode, body: impl Into<String>) -> Response<RequestBody> {
    let body = Full::new(bytes::Bytes::from(body.into()))
        .map_err(|never: std::convert::Infallible| match never {})
        .boxed();
    Response::builder().status(status).body(body).expect("valid response")
}

fn empty_response(status: StatusCode) -> Response<RequestBody> {
    Response::builder()
        .status(status)
        .body(BoxBody::new(Empty::new().map_err(|never: std::convert::Infallible| match never {})))
        .expect("valid response")
}

fn greeting_handler() -> Handler {
    Handler::new(|ctx: Arc<RequestContext>| async move {
        let request = ctx.request();
        let name = PathParam::<String>::string("name")
            .call(request.path_params(), request.accessor_cache())
            .unwrap_or_else(|_| "stranger".to_string());
        let age = PathParam::<i64>::int("age")
            .call(request.path_params(), request.accessor_cache())
            .unwrap_or(0);
        let body = format!("Hello {name}! To think you are {age} years old.");
        let _ = ctx.with_response(text_response(StatusCode::OK, body));
    })
}

fn generic_entity_handler() -> Handler {
    Handler::new(|ctx: Arc<RequestContext>| async move {
        let request = ctx.request();
        let entity = PathParam::<String>::string("entity")
            .call(request.path_params(), request.accessor_cache())
            .unwrap_or_default();
        let id = PathParam::<String>::string("id")
            .call(request.path_params(), request.accessor_cache())
            .unwrap_or_default();
        let _ = ctx.with_response(text_response(StatusCode::OK, format!("{entity}/{id}")));
    })
}

fn user_profile_handler() -> Handler {
    Handler::new(|ctx: Arc<RequestContext>| async move {
        let request = ctx.request();
        let id = PathParam::<String>::string("id")
            .call(request.path_params(), request.accessor_cache())
            .unwrap_or_default();
        let _ = ctx.with_response(text_response(StatusCode::OK, format!("profile for user {id}")));
    })
}

fn catchall_files_handler() -> Handler {
    Handler::new(|ctx: Arc<RequestContext>| async move {
        let _ = ctx.with_response(text_response(StatusCode::OK, "catchall file listing"));
    })
}

fn specific_report_handler() -> Handler {
    Handler::new(|ctx: Arc<RequestContext>| async move {
        let _ = ctx.with_response(text_response(StatusCode::OK, "the special report"));
    })
}

fn widgets_handler() -> Handler {
    Handler::new(|ctx: Arc<RequestContext>| async move {
        let _ = ctx.with_response(empty_response(StatusCode::OK));
    })
}

fn logging_middleware(scope: &'static str) -> Middleware {
    Middleware::new(move |inner: Handler| {
        Handler::new(move |ctx: Arc<RequestContext>| {
            let inner = inner.clone();
            async move {
                tracing::info!("demo: middleware scope={} path={}", scope, ctx.request().raw_path());
                inner.call(ctx).await;
            }
        })
    })
}

fn build_router() -> relic::error::Result<RouterBuilder> {
    let mut builder = RouterBuilder::new();
    builder.use_middleware("/", logging_middleware("root"));
    builder.use_middleware("/api", logging_middleware("api"));

    builder.add(Method::Get, "/user/:name/age/:age", greeting_handler())?;
    builder.add(Method::Get, "/users/:id/profile", user_profile_handler())?;
    builder.add(Method::Get, "/:entity/:id", generic_entity_handler())?;
    builder.add(Method::Get, "/files/special/report", specific_report_handler())?;
    builder.add(Method::Get, "/files/**", catchall_files_handler())?;
    builder.any_of(&[Method::Get, Method::Post], "/api/widgets", widgets_handler())?;

    Ok(builder)
}

async fn wait_for_shutdown() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("failed to install SIGTERM handler");
    #[cfg(unix)]
    let terminate = terminate.recv();
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("demo: received ctrl-c"),
        _ = terminate => tracing::info!("demo: received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _tracing_guard = init_tracing();

    let config = RelicConfig::load(&cli.config)?;
    let state = build_router()?.build();
    let router = RelicRouter::new(state);

    // Scale by running one single-threaded server instance per available
    // core, all bound to the same address via SO_REUSEPORT (see
    // `relic::server::runtime::instance_count`); the kernel spreads incoming
    // connections across the fleet instead of any one instance running its
    // own worker pool.
    let instances = relic::server::runtime::instance_count();
    tracing::info!("demo: starting {} server instance(s) on {}", instances, config.listen);

    let servers: Vec<Arc<RelicServer>> = (0..instances)
        .map(|_| Arc::new(RelicServer::new(router.clone(), config.clone())))
        .collect();

    let serving: Vec<_> = servers
        .iter()
        .map(|server| {
            let server = server.clone();
            tokio::spawn(async move { server.serve().await })
        })
        .collect();

    wait_for_shutdown().await;
    for server in &servers {
        server.close();
    }
    for task in serving {
        task.await??;
    }

    Ok(())
}
