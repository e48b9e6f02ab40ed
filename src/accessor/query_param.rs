//! [`Accessor`] specialized to the request's query string.

use super::{Accessor, RawStore};
use crate::error::{RelicError, Result};

pub type QueryParamRawStore = RawStore<String, String>;

/// A named query parameter, decoded from its first occurrence in the query string.
pub type QueryParam<T> = Accessor<T, String, String>;

impl<T: Clone + Send + Sync + 'static> QueryParam<T> {
    pub fn with_decoder(name: &str, decode: impl Fn(&str) -> Result<T> + Send + Sync + 'static) -> Self {
        Accessor::new(name.to_string(), move |raw: &String| decode(raw.as_str()))
    }
}

impl QueryParam<String> {
    pub fn string(name: &str) -> Self {
        QueryParam::with_decoder(name, |raw| Ok(raw.to_string()))
    }
}

impl QueryParam<i64> {
    pub fn int(name: &str) -> Self {
        QueryParam::with_decoder(name, |raw| {
            raw.parse::<i64>().map_err(|e| RelicError::Decode(e.to_string()))
        })
    }
}

impl QueryParam<f64> {
    pub fn double(name: &str) -> Self {
        QueryParam::with_decoder(name, |raw| {
            raw.parse::<f64>().map_err(|e| RelicError::Decode(e.to_string()))
        })
    }
}

impl QueryParam<bool> {
    pub fn flag(name: &str) -> Self {
        QueryParam::with_decoder(name, |raw| match raw {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            other => Err(RelicError::Decode(format!("not a boolean: '{other}'"))),
        })
    }
}

/// Parse `a=1&b=2` into a raw store, keeping the first value for repeated keys
/// and percent-decoding neither key nor value — query values are opaque text
/// the application's decoder is responsible for interpreting.
pub fn parse_query(query: &str) -> QueryParamRawStore {
    let mut store = QueryParamRawStore::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = match pair.split_once('=') {
            Some((k, v)) => (k, v),
            None => (pair, ""),
        };
        if store.raw(&key.to_string()).is_none() {
            store.insert(key.to_string(), value.to_string());
        }
    }
    store
}
