//! The built-in [`ContextProperty`] instances the router itself populates on
//! every successful dispatch (spec §4.5's "common built-in properties").
//!
//! These exist alongside the specialized [`crate::accessor::path_param`] and
//! [`crate::accessor::query_param`] accessors, not instead of them: the
//! accessors are how a handler decodes one named value out of the captured
//! store, while these properties expose the raw stores (and the matched/
//! remaining path) to code that wants the whole picture — logging
//! middleware printing every captured parameter, for instance.
//!
//! Each accessor function below owns a single process-wide [`OnceLock`], so
//! repeated calls return the *same* `ContextProperty` instance — identity is
//! what the property store keys on, so a fresh instance per call would never
//! see what the router set.

use super::property::ContextProperty;
use crate::accessor::path_param::PathParamRawStore;
use crate::accessor::query_param::QueryParamRawStore;
use crate::path::NormalizedPath;
use crate::router::RelicRouter;
use std::sync::{Arc, OnceLock};

pub fn path_parameters_property() -> &'static ContextProperty<Arc<PathParamRawStore>> {
    static PROPERTY: OnceLock<ContextProperty<Arc<PathParamRawStore>>> = OnceLock::new();
    PROPERTY.get_or_init(|| ContextProperty::new("pathParameters"))
}

pub fn query_parameters_property() -> &'static ContextProperty<Arc<QueryParamRawStore>> {
    static PROPERTY: OnceLock<ContextProperty<Arc<QueryParamRawStore>>> = OnceLock::new();
    PROPERTY.get_or_init(|| ContextProperty::new("queryParameters"))
}

pub fn matched_path_property() -> &'static ContextProperty<NormalizedPath> {
    static PROPERTY: OnceLock<ContextProperty<NormalizedPath>> = OnceLock::new();
    PROPERTY.get_or_init(|| ContextProperty::new("matchedPath"))
}

pub fn remaining_path_property() -> &'static ContextProperty<NormalizedPath> {
    static PROPERTY: OnceLock<ContextProperty<NormalizedPath>> = OnceLock::new();
    PROPERTY.get_or_init(|| ContextProperty::new("remainingPath"))
}

/// The router that produced the current match, for handlers/middleware that
/// need to reach back into it (e.g. to call `forward_to` with a fresh
/// lookup, or to inspect route metadata outside the dispatch path itself).
pub fn router_property() -> &'static ContextProperty<Arc<RelicRouter>> {
    static PROPERTY: OnceLock<ContextProperty<Arc<RelicRouter>>> = OnceLock::new();
    PROPERTY.get_or_init(|| ContextProperty::new("router"))
}
