//! End-to-end dispatch scenarios exercised purely through the public API:
//! build a router, send requests through it, inspect the responses.

use http::{HeaderMap, StatusCode};
use http_body_util::{combinators::BoxBody, BodyExt, Empty};
use relic::accessor::path_param::PathParam;
use relic::context::{HandledContext, Request, RequestContext};
use relic::middleware::{Handler, Middleware};
use relic::router::{RelicRouter, RouterBuilder};
use relic::routing::Method;
use relic::RequestBody;
use std::sync::{Arc, Mutex};

fn empty_body() -> RequestBody {
    BoxBody::new(Empty::new().map_err(|never: std::convert::Infallible| match never {}))
}

fn get(path: &str) -> Request {
    Request::new(Method::Get, path.to_string(), String::new(), HeaderMap::new(), empty_body())
}

fn request_with_method(method: Method, path: &str) -> Request {
    Request::new(method, path.to_string(), String::new(), HeaderMap::new(), empty_body())
}

async fn dispatch(router: &RelicRouter, request: Request) -> HandledContext {
    let ctx = Arc::new(RequestContext::new(request));
    router.dispatch(&ctx).await;
    Arc::try_unwrap(ctx).ok().unwrap().into_handled().expect("route always responds in these tests")
}

fn text_handler(body: &'static str) -> Handler {
    Handler::new(move |ctx: Arc<RequestContext>| async move {
        let response = http::Response::builder()
            .status(StatusCode::OK)
            .body(
                http_body_util::Full::new(bytes::Bytes::from_static(body.as_bytes()))
                    .map_err(|never: std::convert::Infallible| match never {})
                    .boxed(),
            )
            .unwrap();
        let _ = ctx.with_response(response);
    })
}

async fn body_text(response: http::Response<RequestBody>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn greets_by_captured_name_and_age() {
    let mut builder = RouterBuilder::new();
    builder
        .add(
            Method::Get,
            "/user/:name/age/:age",
            Handler::new(|ctx: Arc<RequestContext>| async move {
                let request = ctx.request();
                let name = PathParam::<String>::string("name")
                    .call(request.path_params(), request.accessor_cache())
                    .unwrap();
                let age = PathParam::<i64>::int("age")
                    .call(request.path_params(), request.accessor_cache())
                    .unwrap();
                let response = http::Response::builder()
                    .status(StatusCode::OK)
                    .body(
                        http_body_util::Full::new(bytes::Bytes::from(format!(
                            "Hello {name}! To think you are {age} years old."
                        )))
                        .map_err(|never: std::convert::Infallible| match never {})
                        .boxed(),
                    )
                    .unwrap();
                let _ = ctx.with_response(response);
            }),
        )
        .unwrap();
    let router = RelicRouter::new(builder.build());

    match dispatch(&router, get("/user/Alice/age/25")).await {
        HandledContext::Responded(response) => {
            assert_eq!(body_text(response).await, "Hello Alice! To think you are 25 years old.");
        }
        _ => panic!("expected a response"),
    }
}

#[tokio::test]
async fn unmatched_path_gets_default_404_fallback() {
    let mut builder = RouterBuilder::new();
    builder.add(Method::Get, "/known", text_handler("ok")).unwrap();
    let router = RelicRouter::new(builder.build());

    match dispatch(&router, get("/unknown/path")).await {
        HandledContext::Responded(response) => assert_eq!(response.status(), StatusCode::NOT_FOUND),
        _ => panic!("expected a response"),
    }
}

#[tokio::test]
async fn unmatched_path_runs_an_overridden_not_found_handler() {
    let mut builder = RouterBuilder::new();
    builder.not_found(text_handler("Sorry, that doesn't compute"));
    let router = RelicRouter::new(builder.build());

    match dispatch(&router, get("/unknown/path")).await {
        HandledContext::Responded(response) => {
            assert_eq!(body_text(response).await, "Sorry, that doesn't compute");
        }
        _ => panic!("expected a response"),
    }
}

#[tokio::test]
async fn literal_and_specific_routes_win_over_generic_parameter_routes() {
    let mut builder = RouterBuilder::new();
    builder.add(Method::Get, "/:entity/:id", text_handler("generic")).unwrap();
    builder.add(Method::Get, "/users/:id/profile", text_handler("profile")).unwrap();
    let router = RelicRouter::new(builder.build());

    match dispatch(&router, get("/users/789")).await {
        HandledContext::Responded(response) => assert_eq!(body_text(response).await, "generic"),
        _ => panic!("expected a response"),
    }
    match dispatch(&router, get("/users/789/profile")).await {
        HandledContext::Responded(response) => assert_eq!(body_text(response).await, "profile"),
        _ => panic!("expected a response"),
    }
}

#[tokio::test]
async fn specific_route_wins_over_tail_wildcard_catchall() {
    let mut builder = RouterBuilder::new();
    builder.add(Method::Get, "/files/**", text_handler("catchall")).unwrap();
    builder.add(Method::Get, "/files/special/report", text_handler("specific")).unwrap();
    let router = RelicRouter::new(builder.build());

    match dispatch(&router, get("/files/special/report")).await {
        HandledContext::Responded(response) => assert_eq!(body_text(response).await, "specific"),
        _ => panic!("expected a response"),
    }
    match dispatch(&router, get("/files/special/other")).await {
        HandledContext::Responded(response) => assert_eq!(body_text(response).await, "catchall"),
        _ => panic!("expected a response"),
    }
}

#[tokio::test]
async fn any_of_rejects_unlisted_methods_with_405_and_allow() {
    let mut builder = RouterBuilder::new();
    builder
        .any_of(&[Method::Get, Method::Post], "/widgets", text_handler("ok"))
        .unwrap();
    let router = RelicRouter::new(builder.build());

    match dispatch(&router, request_with_method(Method::Put, "/widgets")).await {
        HandledContext::Responded(response) => {
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(response.headers().get(http::header::ALLOW).unwrap(), "GET, POST");
        }
        _ => panic!("expected a response"),
    }
}

#[tokio::test]
async fn middleware_scoping_matches_request_prefix() {
    let mut builder = RouterBuilder::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let root_seen = seen.clone();
    builder.use_middleware(
        "/",
        Middleware::new(move |inner: Handler| {
            let seen = root_seen.clone();
            Handler::new(move |ctx: Arc<RequestContext>| {
                let seen = seen.clone();
                let inner = inner.clone();
                async move {
                    seen.lock().unwrap().push("root");
                    inner.call(ctx).await;
                }
            })
        }),
    );

    let api_seen = seen.clone();
    builder.use_middleware(
        "/api",
        Middleware::new(move |inner: Handler| {
            let seen = api_seen.clone();
            Handler::new(move |ctx: Arc<RequestContext>| {
                let seen = seen.clone();
                let inner = inner.clone();
                async move {
                    seen.lock().unwrap().push("api");
                    inner.call(ctx).await;
                }
            })
        }),
    );

    builder.add(Method::Get, "/api/widgets", text_handler("widgets")).unwrap();
    builder.add(Method::Get, "/health", text_handler("ok")).unwrap();
    let router = RelicRouter::new(builder.build());

    dispatch(&router, get("/api/widgets")).await;
    assert_eq!(*seen.lock().unwrap(), vec!["root", "api"]);

    seen.lock().unwrap().clear();
    dispatch(&router, get("/health")).await;
    assert_eq!(*seen.lock().unwrap(), vec!["root"]);

    seen.lock().unwrap().clear();
    // An unmatched path never sees middleware at all, even one registered
    // under a prefix the path happens to share — it goes straight to the
    // fallback.
    dispatch(&router, get("/api/unknown")).await;
    assert!(seen.lock().unwrap().is_empty());
}
