//! [`Accessor`] specialized to captured path-parameter segments.

use super::{Accessor, RawStore};
use crate::error::{RelicError, Result};
use crate::routing::Symbol;

pub type PathParamRawStore = RawStore<Symbol, String>;

/// A named path parameter, decoded from the segment text the router captured.
pub type PathParam<T> = Accessor<T, Symbol, String>;

impl<T: Clone + Send + Sync + 'static> PathParam<T> {
    /// A path parameter identified by name, decoded with `decode`.
    pub fn with_decoder(name: &str, decode: impl Fn(&str) -> Result<T> + Send + Sync + 'static) -> Self {
        Accessor::new(Symbol::intern(name), move |raw: &String| decode(raw.as_str()))
    }
}

impl PathParam<String> {
    pub fn string(name: &str) -> Self {
        PathParam::with_decoder(name, |raw| Ok(raw.to_string()))
    }
}

impl PathParam<i64> {
    pub fn int(name: &str) -> Self {
        PathParam::with_decoder(name, |raw| {
            raw.parse::<i64>().map_err(|e| RelicError::Decode(e.to_string()))
        })
    }
}

impl PathParam<f64> {
    pub fn double(name: &str) -> Self {
        PathParam::with_decoder(name, |raw| {
            raw.parse::<f64>().map_err(|e| RelicError::Decode(e.to_string()))
        })
    }
}

impl PathParam<u64> {
    pub fn num(name: &str) -> Self {
        PathParam::with_decoder(name, |raw| {
            raw.parse::<u64>().map_err(|e| RelicError::Decode(e.to_string()))
        })
    }
}

/// Build the raw store a request's matched path parameters feed into accessors.
pub fn captured_store(parameters: Vec<(Symbol, String)>) -> PathParamRawStore {
    parameters.into_iter().collect()
}
