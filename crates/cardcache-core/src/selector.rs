//! Set-diversifying selection of candidates.

use std::collections::HashSet;

use crate::models::CardCandidate;

/// Pick at most `limit` candidates, taking the first card of each distinct
/// set before falling back to further cards from already-used sets.
/// Both passes preserve input order, so the result is deterministic.
pub fn select(candidates: &[CardCandidate], limit: usize) -> Vec<CardCandidate> {
    let mut picked: Vec<usize> = Vec::with_capacity(limit.min(candidates.len()));
    let mut seen_sets: HashSet<&str> = HashSet::new();

    for (i, card) in candidates.iter().enumerate() {
        if picked.len() >= limit {
            break;
        }
        if seen_sets.insert(card.set_id.as_str()) {
            picked.push(i);
        }
    }

    if picked.len() < limit {
        let taken: HashSet<usize> = picked.iter().copied().collect();
        for i in (0..candidates.len()).filter(|i| !taken.contains(i)) {
            if picked.len() >= limit {
                break;
            }
            picked.push(i);
        }
    }

    picked.into_iter().map(|i| candidates[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: &str, set: &str) -> CardCandidate {
        CardCandidate {
            id: id.to_string(),
            name: id.to_string(),
            set_id: set.to_string(),
            set_name: set.to_string(),
            rarity: None,
            image_url: format!("https://img/{}.png", id),
            release_date: None,
        }
    }

    fn ids(cards: &[CardCandidate]) -> Vec<&str> {
        cards.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_one_per_set_when_enough_sets() {
        let candidates = vec![
            card("a1", "a"),
            card("a2", "a"),
            card("b1", "b"),
            card("b2", "b"),
            card("c1", "c"),
            card("c2", "c"),
        ];
        let picked = select(&candidates, 3);
        assert_eq!(ids(&picked), vec!["a1", "b1", "c1"]);
    }

    #[test]
    fn test_fallback_to_same_set() {
        let candidates: Vec<_> = (1..=5).map(|i| card(&format!("a{}", i), "a")).collect();
        let picked = select(&candidates, 3);
        assert_eq!(ids(&picked), vec!["a1", "a2", "a3"]);
        assert!(picked.iter().all(|c| c.set_id == "a"));
    }

    #[test]
    fn test_fill_after_distinct_sets() {
        let candidates = vec![card("a1", "a"), card("a2", "a"), card("b1", "b"), card("a3", "a")];
        let picked = select(&candidates, 3);
        assert_eq!(ids(&picked), vec!["a1", "b1", "a2"]);
    }

    #[test]
    fn test_fewer_candidates_than_limit() {
        let candidates = vec![card("a1", "a")];
        assert_eq!(ids(&select(&candidates, 5)), vec!["a1"]);
        assert!(select(&[], 5).is_empty());
        assert!(select(&candidates, 0).is_empty());
    }

    #[test]
    fn test_selection_is_deterministic() {
        let candidates = vec![card("x1", "x"), card("y1", "y"), card("x2", "x"), card("z1", "z")];
        assert_eq!(select(&candidates, 3), select(&candidates, 3));
    }
}
