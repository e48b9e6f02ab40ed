use dashmap::DashMap;
use std::sync::{Mutex, OnceLock};

/// An interned parameter name.
///
/// Declared once (typically as a module-level constant via [`Symbol::intern`])
/// and compared by a small integer id — cheap equality and hashing regardless
/// of the underlying name's length. Distinct strings intern to distinct ids;
/// the same string always interns to the same id, process-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

fn forward() -> &'static DashMap<Box<str>, u32> {
    static FORWARD: OnceLock<DashMap<Box<str>, u32>> = OnceLock::new();
    FORWARD.get_or_init(DashMap::new)
}

fn reverse() -> &'static Mutex<Vec<Box<str>>> {
    static REVERSE: OnceLock<Mutex<Vec<Box<str>>>> = OnceLock::new();
    REVERSE.get_or_init(|| Mutex::new(Vec::new()))
}

impl Symbol {
    /// Intern `name`, returning the same `Symbol` for equal strings across
    /// the whole process.
    pub fn intern(name: &str) -> Self {
        if let Some(id) = forward().get(name) {
            return Symbol(*id);
        }
        let id = *forward().entry(name.into()).or_insert_with(|| {
            let mut rev = reverse().lock().unwrap_or_else(|e| e.into_inner());
            rev.push(name.into());
            (rev.len() - 1) as u32
        });
        Symbol(id)
    }

    /// The interned name. Always succeeds — a `Symbol` can only be
    /// constructed via `intern`.
    pub fn name(&self) -> String {
        reverse().lock().unwrap_or_else(|e| e.into_inner())[self.0 as usize].to_string()
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_interns_to_same_symbol() {
        assert_eq!(Symbol::intern("id"), Symbol::intern("id"));
    }

    #[test]
    fn distinct_names_intern_distinct() {
        assert_ne!(Symbol::intern("id_a"), Symbol::intern("id_b"));
    }

    #[test]
    fn round_trips_the_name() {
        let s = Symbol::intern("entity_name_roundtrip");
        assert_eq!(s.name(), "entity_name_roundtrip");
    }
}
