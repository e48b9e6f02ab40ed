//! Relic: a trie-based routing and request-dispatch core for HTTP servers.
//!
//! [`routing`] implements the path trie and its method-aware layer.
//! [`path`] normalizes request paths and parses registration-time patterns.
//! [`accessor`] and [`context`] give handlers typed, memoized access to
//! captured parameters and per-request scratch state. [`middleware`] and
//! [`router`] compose handlers into a dispatch pipeline with path-scoped
//! middleware and hot-reloadable route tables. [`server`] is the built-in
//! hyper-based adapter that drives all of the above from a listening socket.

pub mod accessor;
pub mod config;
pub mod context;
pub mod error;
pub mod middleware;
pub mod path;
pub mod router;
pub mod routing;
pub mod server;

pub use context::{ContextProperty, HandledContext, Request, RequestBody, RequestContext};
pub use error::{RelicError, Result};
pub use middleware::{Handler, Middleware};
pub use router::{RelicRouter, RouterBuilder, RouterState};
pub use routing::{LookupResult, Method};
