//! The inbound request value carried through routing, middleware and handlers.

use crate::accessor::path_param::PathParamRawStore;
use crate::accessor::query_param::{self, QueryParamRawStore};
use crate::accessor::AccessorCache;
use crate::context::property::PropertyStore;
use crate::path::NormalizedPath;
use crate::routing::Method;
use bytes::Bytes;
use http::HeaderMap;
use http_body_util::combinators::BoxBody;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub type RequestBodyError = Box<dyn std::error::Error + Send + Sync>;
pub type RequestBody = BoxBody<Bytes, RequestBodyError>;

/// Identifies one logical request across `copy_with`/`forward_to` re-entries.
/// Two `Request`s produced from the same inbound connection share a token;
/// the token itself carries no meaning beyond equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(u64);

impl Token {
    fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Token(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A request body that can be taken at most once. A second `take` observes
/// `None` rather than panicking — handlers that don't need the body never
/// pay for it, and a handler that forwards a request without consuming the
/// body leaves it available downstream.
#[derive(Clone)]
pub struct BodyHandle {
    inner: Arc<Mutex<Option<RequestBody>>>,
}

impl BodyHandle {
    pub fn new(body: RequestBody) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(body))),
        }
    }

    pub fn take(&self) -> Option<RequestBody> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    /// Move whatever body `source` currently holds into a freshly allocated
    /// handle, leaving `source` empty immediately. Used by `copy_with` so a
    /// forwarded request deterministically owns the body — the original
    /// loses it the instant the copy is made, rather than the two handles
    /// racing each other for whichever side calls `take` first.
    fn moved_from(source: &BodyHandle) -> Self {
        Self {
            inner: Arc::new(Mutex::new(source.take())),
        }
    }
}

/// An inbound HTTP request, normalized for routing and accessor lookups.
#[derive(Clone)]
pub struct Request {
    token: Token,
    method: Method,
    path: NormalizedPath,
    raw_path: String,
    query: String,
    headers: HeaderMap,
    body: BodyHandle,
    path_params: Arc<PathParamRawStore>,
    query_params: Arc<QueryParamRawStore>,
    accessor_cache: Arc<AccessorCache>,
    properties: Arc<PropertyStore>,
}

impl Request {
    pub fn new(method: Method, raw_path: String, query: String, headers: HeaderMap, body: RequestBody) -> Self {
        let path = NormalizedPath::parse(&raw_path);
        let query_params = query_param::parse_query(&query);
        Self {
            token: Token::fresh(),
            method,
            path,
            raw_path,
            query,
            headers,
            body: BodyHandle::new(body),
            path_params: Arc::new(PathParamRawStore::new()),
            query_params: Arc::new(query_params),
            accessor_cache: Arc::new(AccessorCache::new()),
            properties: Arc::new(PropertyStore::new()),
        }
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &NormalizedPath {
        &self.path
    }

    pub fn raw_path(&self) -> &str {
        &self.raw_path
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &BodyHandle {
        &self.body
    }

    pub fn path_params(&self) -> &PathParamRawStore {
        &self.path_params
    }

    pub fn query_params(&self) -> &QueryParamRawStore {
        &self.query_params
    }

    pub fn accessor_cache(&self) -> &AccessorCache {
        &self.accessor_cache
    }

    pub fn properties(&self) -> &PropertyStore {
        &self.properties
    }

    /// The router calls this once routing succeeds, attaching the captured
    /// path parameters for this match. The accessor cache is reset, since
    /// captures (and therefore decoded values) differ per match.
    pub fn with_captured_params(&self, path_params: PathParamRawStore) -> Self {
        Self {
            path_params: Arc::new(path_params),
            accessor_cache: Arc::new(AccessorCache::new()),
            ..self.clone()
        }
    }

    /// Produce a copy for re-dispatch (`forward_to`), overriding the path and,
    /// when supplied, the headers — `None` keeps the original request's
    /// headers unchanged. The token and properties of the original request
    /// are preserved either way. The body is moved into the copy: the
    /// original deterministically loses it at the moment of the call, rather
    /// than the two requests racing each other for whichever calls `take`
    /// first.
    pub fn copy_with(&self, raw_path: String, headers: Option<HeaderMap>) -> Self {
        let path = NormalizedPath::parse(&raw_path);
        Self {
            raw_path,
            path,
            headers: headers.unwrap_or_else(|| self.headers.clone()),
            body: BodyHandle::moved_from(&self.body),
            path_params: Arc::new(PathParamRawStore::new()),
            accessor_cache: Arc::new(AccessorCache::new()),
            ..self.clone()
        }
    }
}
