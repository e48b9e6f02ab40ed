use crate::error::{RelicError, Result};
use crate::path::{NormalizedPath, PathPattern, PatternSegment};
use crate::routing::Symbol;
use std::collections::HashMap;

/// A polymorphic trie keyed by segment kind, supporting literal, parameter,
/// wildcard and tail-wildcard edges with a backtracking lookup.
///
/// Matching priority at each node is literal > parameter > wildcard > tail;
/// `lookup` performs a proper depth-first backtracking search, so a branch
/// that is chosen first but fails to cover the remainder is unwound in
/// favor of the next lower-priority edge (see module tests for the
/// `/users/:id/profile` vs `/:entity/:id` scenario this guarantees).
#[derive(Debug)]
pub struct PathTrie<V> {
    root: Node<V>,
}

#[derive(Debug)]
struct Node<V> {
    value: Option<V>,
    literal: HashMap<String, Node<V>>,
    parameter: Option<(Symbol, Box<Node<V>>)>,
    wildcard: Option<Box<Node<V>>>,
    /// Terminal for a `/**` edge. Per the tail invariant this node never
    /// gains children — it carries at most a value.
    tail: Option<Box<Node<V>>>,
}

impl<V> Node<V> {
    fn empty() -> Self {
        Self {
            value: None,
            literal: HashMap::new(),
            parameter: None,
            wildcard: None,
            tail: None,
        }
    }
}

/// The result of a successful trie lookup.
pub struct TrieMatch<V> {
    pub value: V,
    pub parameters: Vec<(Symbol, String)>,
    pub matched: NormalizedPath,
    pub remaining: NormalizedPath,
}

impl<V> PathTrie<V> {
    pub fn new() -> Self {
        Self { root: Node::empty() }
    }

    /// Insert `value` at `pattern`, failing if a value is already present
    /// at the exact same segment-kind sequence.
    pub fn insert(&mut self, pattern: &PathPattern, value: V) -> Result<()> {
        check_no_repeated_symbol(pattern)?;
        let node = descend(&mut self.root, pattern.segments(), pattern.raw())?;
        if node.value.is_some() {
            return Err(RelicError::DuplicateRoute {
                pattern: pattern.raw().to_string(),
            });
        }
        node.value = Some(value);
        Ok(())
    }

    /// Fetch the terminal value at `pattern`, creating it via `make` on
    /// first visit. Unlike `insert`, re-visiting an already-populated
    /// terminal is not an error — this is what lets a `MethodRouter`
    /// register several methods against the same pattern.
    pub fn get_or_insert_with<F: FnOnce() -> V>(
        &mut self,
        pattern: &PathPattern,
        make: F,
    ) -> Result<&mut V> {
        check_no_repeated_symbol(pattern)?;
        let node = descend(&mut self.root, pattern.segments(), pattern.raw())?;
        Ok(node.value.get_or_insert_with(make))
    }
}

impl<V> PathTrie<V>
where
    V: Clone,
{
    /// Look up `path`, returning the highest-priority match and its
    /// captured parameters, if any route covers it.
    pub fn lookup(&self, path: &NormalizedPath) -> Option<TrieMatch<V>> {
        let segments = path.segments();
        let mut params = Vec::new();
        let (value, tail_start) = walk(&self.root, segments, 0, &mut params)?;

        let (matched, remaining) = match tail_start {
            Some(start) => (path.suffix(0).segments()[..start].to_vec(), path.suffix(start)),
            None => (segments.to_vec(), NormalizedPath::from_segments(Vec::new())),
        };

        Some(TrieMatch {
            value,
            parameters: params,
            matched: NormalizedPath::from_segments(matched),
            remaining,
        })
    }
}

impl<V> Default for PathTrie<V> {
    fn default() -> Self {
        Self::new()
    }
}

fn check_no_repeated_symbol(pattern: &PathPattern) -> Result<()> {
    let mut seen = Vec::new();
    for seg in pattern.segments() {
        if let PatternSegment::Parameter(sym) = seg {
            if seen.contains(sym) {
                return Err(RelicError::ParameterConflict {
                    pattern: pattern.raw().to_string(),
                    existing: sym.name(),
                    new: sym.name(),
                });
            }
            seen.push(*sym);
        }
    }
    Ok(())
}

/// Walk/create the node path for `segments`, returning the terminal node.
fn descend<'a, V>(
    mut node: &'a mut Node<V>,
    segments: &[PatternSegment],
    pattern_raw: &str,
) -> Result<&'a mut Node<V>> {
    for (i, seg) in segments.iter().enumerate() {
        let is_last = i == segments.len() - 1;
        node = match seg {
            PatternSegment::Literal(text) => node.literal.entry(text.clone()).or_insert_with(Node::empty),
            PatternSegment::Parameter(sym) => {
                match &mut node.parameter {
                    Some((existing, _)) if existing != sym => {
                        return Err(RelicError::ParameterConflict {
                            pattern: pattern_raw.to_string(),
                            existing: existing.name(),
                            new: sym.name(),
                        });
                    }
                    Some((_, child)) => child,
                    None => {
                        node.parameter = Some((*sym, Box::new(Node::empty())));
                        &mut node.parameter.as_mut().unwrap().1
                    }
                }
            }
            PatternSegment::Wildcard => node.wildcard.get_or_insert_with(|| Box::new(Node::empty())),
            PatternSegment::TailWildcard => {
                if !is_last {
                    return Err(RelicError::TailNotFinal {
                        pattern: pattern_raw.to_string(),
                    });
                }
                node.tail.get_or_insert_with(|| Box::new(Node::empty()))
            }
        };
    }
    Ok(node)
}

/// Depth-first backtracking match. Returns the matched value and, when the
/// match was produced by a tail edge, the index in `segments` where the
/// tail remainder begins.
fn walk<V: Clone>(
    node: &Node<V>,
    segments: &[String],
    idx: usize,
    params: &mut Vec<(Symbol, String)>,
) -> Option<(V, Option<usize>)> {
    if idx == segments.len() {
        return node.value.clone().map(|v| (v, None));
    }

    if let Some(child) = node.literal.get(&segments[idx]) {
        if let Some(result) = walk(child, segments, idx + 1, params) {
            return Some(result);
        }
    }

    if let Some((sym, child)) = &node.parameter {
        params.push((*sym, segments[idx].clone()));
        let result = walk(child, segments, idx + 1, params);
        if result.is_some() {
            return result;
        }
        params.pop();
    }

    if let Some(child) = &node.wildcard {
        if let Some(result) = walk(child, segments, idx + 1, params) {
            return Some(result);
        }
    }

    // Tail requires a non-empty remainder — `idx < segments.len()` is
    // guaranteed by the early return above, so reaching here means there
    // is at least one segment left to hand to the tail.
    if let Some(child) = &node.tail {
        if let Some(v) = &child.value {
            return Some((v.clone(), Some(idx)));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::parse_pattern;

    fn insert(trie: &mut PathTrie<&'static str>, pattern: &str, value: &'static str) {
        trie.insert(&parse_pattern(pattern).unwrap(), value).unwrap();
    }

    fn lookup_names(trie: &PathTrie<&'static str>, path: &str) -> Option<&'static str> {
        trie.lookup(&NormalizedPath::parse(path)).map(|m| m.value)
    }

    #[test]
    fn literal_beats_parameter_via_backtracking() {
        let mut trie = PathTrie::new();
        insert(&mut trie, "/:entity/:id", "generic");
        insert(&mut trie, "/users/:id/profile", "profile");

        let m = trie.lookup(&NormalizedPath::parse("/users/789")).unwrap();
        assert_eq!(m.value, "generic");
        assert_eq!(
            m.parameters,
            vec![(Symbol::intern("entity"), "users".to_string()), (Symbol::intern("id"), "789".to_string())]
        );
    }

    #[test]
    fn specific_beats_tail_wildcard() {
        let mut trie = PathTrie::new();
        insert(&mut trie, "/files/**", "catchall");
        insert(&mut trie, "/files/special/report", "specific");

        assert_eq!(lookup_names(&trie, "/files/special/report"), Some("specific"));

        let m = trie.lookup(&NormalizedPath::parse("/files/special/other")).unwrap();
        assert_eq!(m.value, "catchall");
        assert_eq!(m.remaining.to_path_string(), "/special/other");
        assert_eq!(m.matched.to_path_string(), "/files");
    }

    #[test]
    fn tail_wildcard_requires_non_empty_remainder() {
        let mut trie = PathTrie::new();
        insert(&mut trie, "/files/**", "catchall");
        assert!(lookup_names(&trie, "/files").is_none());
    }

    #[test]
    fn wildcard_matches_exactly_one_segment() {
        let mut trie = PathTrie::new();
        insert(&mut trie, "/a/*", "single");
        assert_eq!(lookup_names(&trie, "/a/b"), Some("single"));
        assert!(lookup_names(&trie, "/a/b/c").is_none());
        assert!(lookup_names(&trie, "/a").is_none());
    }

    #[test]
    fn root_pattern_matches_only_root() {
        let mut trie = PathTrie::new();
        insert(&mut trie, "/", "root");
        assert_eq!(lookup_names(&trie, "/"), Some("root"));
        assert!(lookup_names(&trie, "/a").is_none());
    }

    #[test]
    fn duplicate_pattern_is_rejected() {
        let mut trie: PathTrie<&'static str> = PathTrie::new();
        insert(&mut trie, "/a/b", "first");
        let err = trie.insert(&parse_pattern("/a/b").unwrap(), "second").unwrap_err();
        assert!(matches!(err, RelicError::DuplicateRoute { .. }));
    }

    #[test]
    fn conflicting_parameter_symbol_is_rejected() {
        let mut trie: PathTrie<&'static str> = PathTrie::new();
        insert(&mut trie, "/:id/a", "first");
        let err = trie.insert(&parse_pattern("/:other/b").unwrap(), "second").unwrap_err();
        assert!(matches!(err, RelicError::ParameterConflict { .. }));
    }

    #[test]
    fn repeated_symbol_within_one_pattern_is_rejected() {
        let mut trie: PathTrie<&'static str> = PathTrie::new();
        let err = trie
            .insert(&parse_pattern("/:id/files/:id").unwrap(), "first")
            .unwrap_err();
        assert!(matches!(err, RelicError::ParameterConflict { .. }));
    }

    #[test]
    fn wildcard_and_parameter_coexist_as_separate_edges() {
        let mut trie = PathTrie::new();
        insert(&mut trie, "/a/*", "wild");
        insert(&mut trie, "/a/:id", "param");
        // Parameter has priority; wildcard branch is unreachable here since
        // the parameter edge always covers a single segment too, but both
        // edges are legal to register independently.
        assert_eq!(lookup_names(&trie, "/a/x"), Some("param"));
    }

    #[test]
    fn registration_order_does_not_affect_lookup() {
        let mut a = PathTrie::new();
        insert(&mut a, "/users/:id/profile", "profile");
        insert(&mut a, "/:entity/:id", "generic");

        let mut b = PathTrie::new();
        insert(&mut b, "/:entity/:id", "generic");
        insert(&mut b, "/users/:id/profile", "profile");

        for path in ["/users/789", "/users/1/profile", "/orders/42"] {
            assert_eq!(lookup_names(&a, path), lookup_names(&b, path));
        }
    }
}
