//! The contract a server adapter advertises to the dispatch core.
//!
//! Relic's router and middleware are transport-agnostic; an adapter is what
//! turns bytes on a socket into a [`crate::context::Request`] and a finished
//! [`crate::context::HandledContext`] back into bytes. The built-in
//! [`super::RelicServer`] is a hyper-based adapter; embedders wanting a
//! different transport (h3, a test harness, a unix socket) implement this
//! trait instead.

/// Capabilities an adapter advertises about itself. `RelicServer` reads
/// these once per connection and bakes them into the `RequestContext` it
/// builds (`RequestContext::with_capabilities`), so `hijack`/`upgrade`
/// reflect what the adapter driving the request can actually do rather than
/// a value a handler would otherwise have to guess at.
pub trait Adapter: Send + Sync {
    /// Whether this adapter can satisfy `RequestContext::hijack`. The
    /// built-in hyper adapter reports `false`: handing a hyper connection to
    /// arbitrary application code defeats hyper's own connection management,
    /// so hijacking is only meaningful for adapters built around a raw
    /// socket.
    fn supports_hijack(&self) -> bool {
        false
    }

    /// Whether this adapter can satisfy `RequestContext::upgrade` (e.g. a
    /// WebSocket handshake). Implementing the upgraded protocol itself is
    /// outside this crate's scope — only the state transition is.
    fn supports_upgrade(&self) -> bool {
        false
    }
}

/// The default adapter capability set: no hijack, no upgrade.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEscapeHatches;

impl Adapter for NoEscapeHatches {}
