use crate::routing::Symbol;

/// A single segment of a registration-time route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSegment {
    Literal(String),
    Parameter(Symbol),
    Wildcard,
    TailWildcard,
}

/// A parsed route pattern — the registration-time analogue of `NormalizedPath`.
#[derive(Debug, Clone)]
pub struct PathPattern {
    segments: Vec<PatternSegment>,
    raw: String,
}

impl PathPattern {
    pub fn segments(&self) -> &[PatternSegment] {
        &self.segments
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Parse error: `/**` appeared in a non-final position.
pub(super) struct TailNotFinal;

pub(super) fn parse(raw: &str) -> Result<PathPattern, TailNotFinal> {
    let mut segments = Vec::new();
    let parts: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();

    for (i, part) in parts.iter().enumerate() {
        let is_last = i == parts.len() - 1;
        let seg = match *part {
            "**" => {
                if !is_last {
                    return Err(TailNotFinal);
                }
                PatternSegment::TailWildcard
            }
            "*" => PatternSegment::Wildcard,
            s if s.starts_with(':') && s.len() > 1 => {
                PatternSegment::Parameter(Symbol::intern(&s[1..]))
            }
            s => PatternSegment::Literal(s.to_string()),
        };
        segments.push(seg);
    }

    Ok(PathPattern {
        segments,
        raw: raw.to_string(),
    })
}
