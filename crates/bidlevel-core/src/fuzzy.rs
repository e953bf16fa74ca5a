//! Token-overlap matching for names that neither index nor dictionary resolve.

use std::collections::BTreeSet;

use crate::dictionary::{token_string, ScopeDictionary};

/// Minimum Jaccard overlap for a fuzzy match.
pub const MIN_JACCARD: f64 = 0.2;

/// Significant tokens: lowercased, stopwords and brand names dropped, light
/// plural stemming, pure numbers dropped.
pub fn significant_tokens(text: &str, dictionary: &ScopeDictionary) -> BTreeSet<String> {
    token_string(text)
        .split(' ')
        .filter(|t| !t.is_empty())
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .filter(|t| !dictionary.is_stopword(t))
        .map(stem)
        .filter(|t| t.len() > 1)
        .collect()
}

fn stem(token: &str) -> String {
    let t = token;
    if t.len() > 4 && t.ends_with("ies") {
        format!("{}y", &t[..t.len() - 3])
    } else if t.len() > 3 && t.ends_with('s') && !t.ends_with("ss") {
        t[..t.len() - 1].to_string()
    } else {
        t.to_string()
    }
}

pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    shared / union
}

/// Best candidate for `query`, as a zero-based index.
///
/// A candidate qualifies when its Jaccard overlap reaches [`MIN_JACCARD`] or all
/// of the query's significant tokens appear in it. Highest score wins; the first
/// candidate wins ties.
pub fn best_match<'a, I>(query: &str, candidates: I, dictionary: &ScopeDictionary) -> Option<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let query_tokens = significant_tokens(query, dictionary);
    if query_tokens.is_empty() {
        return None;
    }

    let mut best: Option<(usize, f64)> = None;
    for (index, candidate) in candidates.into_iter().enumerate() {
        let tokens = significant_tokens(candidate, dictionary);
        let score = jaccard(&query_tokens, &tokens);
        let subset = !tokens.is_empty() && query_tokens.is_subset(&tokens);
        if score < MIN_JACCARD && !subset {
            continue;
        }
        // Subset matches rank above plain overlap at the same score.
        let rank = if subset { score + 1.0 } else { score };
        if best.is_none_or(|(_, best_rank)| rank > best_rank) {
            best = Some((index, rank));
        }
    }
    best.map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict() -> ScopeDictionary {
        ScopeDictionary::generic("23")
    }

    #[test]
    fn tokens_drop_noise() {
        let tokens = significant_tokens("The 2 Trane rooftop units", &dict());
        assert_eq!(tokens, BTreeSet::from(["rooftop".to_string(), "unit".to_string()]));
    }

    #[test]
    fn stemming() {
        assert_eq!(stem("batteries"), "battery");
        assert_eq!(stem("dampers"), "damper");
        assert_eq!(stem("glass"), "glass");
        assert_eq!(stem("gas"), "gas");
    }

    #[test]
    fn subset_match() {
        let candidates = ["Ductwork", "Kitchen hood exhaust", "Exhaust fans"];
        assert_eq!(best_match("hood exhaust", candidates, &dict()), Some(1));
    }

    #[test]
    fn overlap_match() {
        let candidates = ["Fire dampers", "Smoke detectors"];
        assert_eq!(best_match("Fire/smoke damper assemblies", candidates, &dict()), Some(0));
    }

    #[test]
    fn no_match_below_threshold() {
        let candidates = ["Ductwork", "Boilers"];
        assert_eq!(best_match("Asbestos abatement", candidates, &dict()), None);
    }

    #[test]
    fn first_wins_ties() {
        let candidates = ["Gas piping", "Gas piping"];
        assert_eq!(best_match("gas piping", candidates, &dict()), Some(0));
    }
}
