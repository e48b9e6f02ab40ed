use crate::error::{RelicError, Result};
use crate::path::{NormalizedPath, PathPattern};
use crate::routing::trie::PathTrie;
use crate::routing::Symbol;
use std::collections::HashMap;
use std::str::FromStr;

/// HTTP methods recognized at registration time. Parsing is case-insensitive;
/// anything else is rejected rather than silently accepted as a wildcard method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Trace,
    Connect,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
        }
    }

    const ALL: [Method; 9] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Patch,
        Method::Head,
        Method::Options,
        Method::Trace,
        Method::Connect,
    ];
}

impl FromStr for Method {
    type Err = RelicError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            "TRACE" => Ok(Method::Trace),
            "CONNECT" => Ok(Method::Connect),
            other => Err(RelicError::Decode(format!("unknown HTTP method '{other}'"))),
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-pattern terminal: the handlers registered against each method, plus
/// an optional catch-all from `any()`. A terminal is either method-specific
/// or `any`-claimed, never both — mixing raises `MethodConflict`.
#[derive(Debug, Clone)]
struct MethodTable<V> {
    methods: HashMap<Method, V>,
    any: Option<V>,
}

impl<V> MethodTable<V> {
    fn new() -> Self {
        Self {
            methods: HashMap::new(),
            any: None,
        }
    }

    fn insert(&mut self, method: Method, value: V, pattern: &str) -> Result<()> {
        if self.any.is_some() {
            return Err(RelicError::MethodConflict {
                pattern: pattern.to_string(),
            });
        }
        if self.methods.contains_key(&method) {
            return Err(RelicError::DuplicateRoute {
                pattern: pattern.to_string(),
            });
        }
        self.methods.insert(method, value);
        Ok(())
    }

    fn insert_any(&mut self, value: V, pattern: &str) -> Result<()> {
        if self.any.is_some() {
            return Err(RelicError::DuplicateRoute {
                pattern: pattern.to_string(),
            });
        }
        if !self.methods.is_empty() {
            return Err(RelicError::MethodConflict {
                pattern: pattern.to_string(),
            });
        }
        self.any = Some(value);
        Ok(())
    }

    fn lookup(&self, method: Method) -> Option<&V> {
        self.methods.get(&method).or(self.any.as_ref())
    }

    /// Methods accepted at this terminal, for a 405 response's `Allow` header.
    fn allowed(&self) -> Vec<Method> {
        if self.any.is_some() {
            return Method::ALL.to_vec();
        }
        let mut allowed: Vec<Method> = self.methods.keys().copied().collect();
        allowed.sort_by_key(|m| m.as_str());
        allowed
    }
}

/// The outcome of dispatching a request path and method through a [`MethodRouter`].
pub enum LookupResult<V> {
    Match {
        value: V,
        parameters: Vec<(Symbol, String)>,
        matched: NormalizedPath,
        remaining: NormalizedPath,
    },
    /// No pattern covers this path at all.
    PathMiss,
    /// A pattern covers this path, but not for the requested method.
    MethodMiss { allowed: Vec<Method> },
}

/// A `PathTrie` whose terminals carry a method-keyed handler table, giving
/// every registered path its own independent set of accepted methods.
pub struct MethodRouter<V> {
    trie: PathTrie<MethodTable<V>>,
}

impl<V: Clone> MethodRouter<V> {
    pub fn new() -> Self {
        Self { trie: PathTrie::new() }
    }

    pub fn add(&mut self, method: Method, pattern: &PathPattern, value: V) -> Result<()> {
        let raw = pattern.raw().to_string();
        let table = self.trie.get_or_insert_with(pattern, MethodTable::new)?;
        table.insert(method, value, &raw)
    }

    pub fn any_of(&mut self, methods: &[Method], pattern: &PathPattern, value: V) -> Result<()> {
        let raw = pattern.raw().to_string();
        let table = self.trie.get_or_insert_with(pattern, MethodTable::new)?;
        for method in methods {
            table.insert(*method, value.clone(), &raw)?;
        }
        Ok(())
    }

    pub fn any(&mut self, pattern: &PathPattern, value: V) -> Result<()> {
        let raw = pattern.raw().to_string();
        let table = self.trie.get_or_insert_with(pattern, MethodTable::new)?;
        table.insert_any(value, &raw)
    }

    pub fn lookup(&self, path: &NormalizedPath, method: Method) -> LookupResult<V> {
        match self.trie.lookup(path) {
            None => LookupResult::PathMiss,
            Some(m) => match m.value.lookup(method) {
                Some(value) => LookupResult::Match {
                    value: value.clone(),
                    parameters: m.parameters,
                    matched: m.matched,
                    remaining: m.remaining,
                },
                None => LookupResult::MethodMiss {
                    allowed: m.value.allowed(),
                },
            },
        }
    }
}

impl<V: Clone> Default for MethodRouter<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::parse_pattern;

    fn pattern(raw: &str) -> PathPattern {
        parse_pattern(raw).unwrap()
    }

    #[test]
    fn method_parsing_is_case_insensitive() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("PoSt".parse::<Method>().unwrap(), Method::Post);
        assert!("FETCH".parse::<Method>().is_err());
    }

    #[test]
    fn distinct_methods_on_same_pattern_are_independent() {
        let mut router = MethodRouter::new();
        router.add(Method::Get, &pattern("/widgets"), "list").unwrap();
        router.add(Method::Post, &pattern("/widgets"), "create").unwrap();

        match router.lookup(&NormalizedPath::parse("/widgets"), Method::Get) {
            LookupResult::Match { value, .. } => assert_eq!(value, "list"),
            _ => panic!("expected match"),
        }
        match router.lookup(&NormalizedPath::parse("/widgets"), Method::Post) {
            LookupResult::Match { value, .. } => assert_eq!(value, "create"),
            _ => panic!("expected match"),
        }
    }

    #[test]
    fn unregistered_method_on_known_path_is_method_miss_with_allow() {
        let mut router = MethodRouter::new();
        router.any_of(&[Method::Get, Method::Post], &pattern("/widgets"), "h").unwrap();

        match router.lookup(&NormalizedPath::parse("/widgets"), Method::Put) {
            LookupResult::MethodMiss { allowed } => {
                assert_eq!(allowed, vec![Method::Get, Method::Post]);
            }
            _ => panic!("expected method miss"),
        }
    }

    #[test]
    fn unknown_path_is_path_miss() {
        let mut router: MethodRouter<&'static str> = MethodRouter::new();
        router.add(Method::Get, &pattern("/widgets"), "list").unwrap();
        assert!(matches!(
            router.lookup(&NormalizedPath::parse("/gadgets"), Method::Get),
            LookupResult::PathMiss
        ));
    }

    #[test]
    fn any_conflicts_with_a_specific_method() {
        let mut router = MethodRouter::new();
        router.any(&pattern("/widgets"), "h").unwrap();
        let err = router.add(Method::Get, &pattern("/widgets"), "h2").unwrap_err();
        assert!(matches!(err, RelicError::MethodConflict { .. }));
    }

    #[test]
    fn specific_method_conflicts_with_any() {
        let mut router = MethodRouter::new();
        router.add(Method::Get, &pattern("/widgets"), "h").unwrap();
        let err = router.any(&pattern("/widgets"), "h2").unwrap_err();
        assert!(matches!(err, RelicError::MethodConflict { .. }));
    }

    #[test]
    fn re_registering_the_same_method_is_duplicate_route() {
        let mut router = MethodRouter::new();
        router.add(Method::Get, &pattern("/widgets"), "h").unwrap();
        let err = router.add(Method::Get, &pattern("/widgets"), "h2").unwrap_err();
        assert!(matches!(err, RelicError::DuplicateRoute { .. }));
    }
}
