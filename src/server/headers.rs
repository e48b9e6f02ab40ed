//! Default response headers applied after a request has been handled, and
//! header-layer request validation run before routing.

use crate::config::RelicConfig;
use crate::context::RequestBody;
use crate::error::RelicError;
use http::{HeaderMap, HeaderValue, Response};

/// Stamp `Date` and, if configured, `X-Powered-By` onto a response, but only
/// when the handler didn't already set one — a handler that cares about
/// either header (e.g. one replaying an upstream `Date`) wins. Applied once
/// per response, after the route's own handler and middleware chain have
/// run, and only for `Responded` outcomes — hijacked and upgraded
/// connections bypass header injection entirely since the adapter, not this
/// layer, owns their bytes from that point on.
pub fn apply_default_headers(response: &mut Response<RequestBody>, config: &RelicConfig) {
    if response.headers().get(http::header::DATE).is_none() {
        if let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(std::time::SystemTime::now())) {
            response.headers_mut().insert(http::header::DATE, value);
        }
    }
    if response.headers().get("x-powered-by").is_none() {
        if let Some(token) = &config.powered_by {
            if let Ok(value) = HeaderValue::from_str(token) {
                response.headers_mut().insert("x-powered-by", value);
            }
        }
    }
}

/// Header-layer validation run before a request reaches the router: catches
/// malformed framing an adapter should reject with a 4xx itself rather than
/// handing to application code. Checks `Content-Length` against one
/// process-wide `max_body_bytes`, plus a guard against carrying both
/// `Content-Length` and `Transfer-Encoding` — the classic request-smuggling
/// ambiguity.
pub fn validate_headers(headers: &HeaderMap, config: &RelicConfig) -> std::result::Result<(), RelicError> {
    if headers.contains_key(http::header::TRANSFER_ENCODING) && headers.contains_key(http::header::CONTENT_LENGTH) {
        return Err(RelicError::HeaderError(
            "request carries both Content-Length and Transfer-Encoding".to_string(),
        ));
    }
    if let Some(len) = headers
        .get(http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
    {
        if len > config.max_body_bytes {
            return Err(RelicError::MaxBodySizeExceeded {
                limit: config.max_body_bytes,
            });
        }
    }
    Ok(())
}
