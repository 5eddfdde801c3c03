// ============================================================
// Layer 3 — Translation Direction
// ============================================================
// Names the two sides of a parallel corpus the way experiment
// configs spell it: "en->de". The left side is the source
// language, the right side the target language. Parsing is
// whitespace-tolerant, so "en -> de" works too.
//

use anyhow::bail;
use std::fmt;
use std::str::FromStr;

/// Source and target language of a translation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Direction {
    /// Source language name, e.g. "en"
    pub src: String,
    /// Target language name, e.g. "de"
    pub trg: String,
}

impl Direction {
    pub fn new(src: impl Into<String>, trg: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            trg: trg.into(),
        }
    }

    /// True if `lang` names either side of this direction.
    pub fn contains(&self, lang: &str) -> bool {
        self.src == lang || self.trg == lang
    }
}

impl FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((src, trg)) = s.split_once("->") else {
            bail!("invalid direction '{s}': expected 'src->trg', e.g. 'en->de'");
        };
        let (src, trg) = (src.trim(), trg.trim());
        if src.is_empty() || trg.is_empty() {
            bail!("invalid direction '{s}': both languages must be named");
        }
        Ok(Self::new(src, trg))
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.src, self.trg)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_simple_direction() {
        let d: Direction = "en->de".parse().unwrap();
        assert_eq!(d.src, "en");
        assert_eq!(d.trg, "de");
    }

    #[test]
    fn test_parses_with_whitespace() {
        let d: Direction = "  en -> de ".parse().unwrap();
        assert_eq!(d, Direction::new("en", "de"));
    }

    #[test]
    fn test_rejects_missing_arrow() {
        assert!("ende".parse::<Direction>().is_err());
    }

    #[test]
    fn test_rejects_empty_side() {
        assert!("en->".parse::<Direction>().is_err());
        assert!("->de".parse::<Direction>().is_err());
    }

    #[test]
    fn test_display_roundtrips() {
        let d: Direction = "fr->en".parse().unwrap();
        assert_eq!(d.to_string(), "fr->en");
    }

    #[test]
    fn test_contains_both_sides() {
        let d = Direction::new("en", "de");
        assert!(d.contains("en"));
        assert!(d.contains("de"));
        assert!(!d.contains("fr"));
    }
}
