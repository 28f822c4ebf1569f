//! Name-based identity matching
//!
//! Scores the likelihood that a local and a remote display name refer to
//! the same person. Rules are ordered strongest-first as a deliberate
//! tie-break: a later, weaker rule could spuriously fire before a stronger
//! one if checked out of order.

/// A positive match between two display names
#[derive(Debug, Clone, PartialEq)]
pub struct NameMatch {
    /// Confidence in (0, 1]
    pub confidence: f64,
    /// Human-readable reason shown in the mapping UI
    pub reason: &'static str,
}

/// Compare two display names; `None` means no plausible match.
///
/// First rule that fires wins:
/// 1. case-insensitive exact equality -> 0.95
/// 2. equality after normalization -> 0.90
/// 3. first token equal (case-insensitive, length >= 2) -> 0.70
/// 4. one a case-insensitive substring of the other -> 0.50
pub fn match_names(a: &str, b: &str) -> Option<NameMatch> {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();

    if a_lower == b_lower {
        return Some(NameMatch {
            confidence: 0.95,
            reason: "Exact name match",
        });
    }

    if normalize(a) == normalize(b) {
        return Some(NameMatch {
            confidence: 0.90,
            reason: "Normalized name match",
        });
    }

    let a_first = a_lower.split_whitespace().next().unwrap_or("");
    let b_first = b_lower.split_whitespace().next().unwrap_or("");
    if a_first.chars().count() >= 2 && a_first == b_first {
        return Some(NameMatch {
            confidence: 0.70,
            reason: "First name match",
        });
    }

    if !a_lower.is_empty()
        && !b_lower.is_empty()
        && (a_lower.contains(&b_lower) || b_lower.contains(&a_lower))
    {
        return Some(NameMatch {
            confidence: 0.50,
            reason: "Partial name match",
        });
    }

    None
}

/// Lowercase, strip characters outside letters/digits/whitespace
/// (Unicode-aware), collapse runs of whitespace to single spaces.
fn normalize(name: &str) -> String {
    let stripped: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}
