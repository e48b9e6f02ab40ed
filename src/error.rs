use std::fmt;

/// Errors surfaced by the routing and dispatch core.
///
/// Registration-time variants (`DuplicateRoute`, `ParameterConflict`,
/// `MethodConflict`, `TailNotFinal`) are programmer errors: they are
/// returned from `insert`/`add` at startup and should never reach request
/// handling. The remaining variants are raised during request handling.
#[derive(Debug)]
pub enum RelicError {
    /// Two registered patterns produce the same segment-kind sequence.
    DuplicateRoute { pattern: String },
    /// A parameter edge already exists at this position with a different symbol.
    ParameterConflict {
        pattern: String,
        existing: String,
        new: String,
    },
    /// A method was registered on a terminal already claimed by `any()`, or vice versa.
    MethodConflict { pattern: String },
    /// `/**` appeared in a non-final pattern segment.
    TailNotFinal { pattern: String },
    /// `Accessor::call` found no raw value for its key.
    Missing,
    /// A decoder function failed on a present raw value.
    Decode(String),
    /// `ContextProperty::get` found nothing set for this request.
    MissingProperty { name: &'static str },
    /// `RequestContext::hijack` called but the adapter did not advertise hijack support.
    NotHijackable,
    /// `RequestContext::upgrade` called but the adapter did not advertise upgrade
    /// support, or the request headers don't carry a valid upgrade handshake.
    NotUpgradable,
    /// A second terminal transition was attempted on an already-terminal context.
    AlreadyHandled,
    /// `forward_to` could not re-enter the router (router not reachable).
    ForwardNotRouted,
    /// `forward_to` targeted a path this request's token has already been
    /// dispatched against, directly or transitively — forwarding it again
    /// would recurse without bound.
    ForwardLoopDetected { path: String },
    /// The header layer rejected the request (malformed/missing headers).
    HeaderError(String),
    /// The body exceeded the route's configured maximum size.
    MaxBodySizeExceeded { limit: u64 },
}

impl fmt::Display for RelicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelicError::DuplicateRoute { pattern } => {
                write!(f, "duplicate route registration for pattern '{pattern}'")
            }
            RelicError::ParameterConflict {
                pattern,
                existing,
                new,
            } => write!(
                f,
                "parameter conflict on pattern '{pattern}': edge already bound to ':{existing}', got ':{new}'"
            ),
            RelicError::MethodConflict { pattern } => write!(
                f,
                "method conflict on pattern '{pattern}': any() and a specific method both target this terminal"
            ),
            RelicError::TailNotFinal { pattern } => write!(
                f,
                "tail wildcard '/**' must be the final segment in pattern '{pattern}'"
            ),
            RelicError::Missing => write!(f, "required value missing"),
            RelicError::Decode(msg) => write!(f, "decode failed: {msg}"),
            RelicError::MissingProperty { name } => {
                write!(f, "context property '{name}' was not set on this request")
            }
            RelicError::NotHijackable => write!(f, "this request cannot be hijacked"),
            RelicError::NotUpgradable => write!(f, "this request cannot be upgraded"),
            RelicError::AlreadyHandled => {
                write!(f, "request context already reached a terminal state")
            }
            RelicError::ForwardNotRouted => write!(f, "forward_to could not re-enter the router"),
            RelicError::ForwardLoopDetected { path } => {
                write!(f, "forward_to would re-enter already-visited path '{path}'")
            }
            RelicError::HeaderError(msg) => write!(f, "malformed headers: {msg}"),
            RelicError::MaxBodySizeExceeded { limit } => {
                write!(f, "body exceeded the maximum of {limit} bytes")
            }
        }
    }
}

impl std::error::Error for RelicError {}

pub type Result<T> = std::result::Result<T, RelicError>;
