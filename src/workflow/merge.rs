use crate::llm::Provider;
use crate::workflow::types::{BrainstormCandidate, Outline, OutlineSection};
use std::collections::{BTreeMap, HashSet};

/// Concatenate candidate points in provider-priority order, dropping
/// case-insensitive exact duplicates and keeping the first occurrence.
///
/// Providers missing from `priority` are merged after the listed ones, in
/// their natural order, so no candidate is silently ignored.
pub fn merge_candidates(
    candidates: &BTreeMap<Provider, BrainstormCandidate>,
    priority: &[Provider],
) -> Vec<String> {
    let mut order: Vec<Provider> = priority
        .iter()
        .copied()
        .filter(|provider| candidates.contains_key(provider))
        .collect();
    for provider in candidates.keys() {
        if !order.contains(provider) {
            order.push(*provider);
        }
    }

    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for provider in order {
        let Some(candidate) = candidates.get(&provider) else {
            continue;
        };
        for point in &candidate.points {
            let point = point.trim();
            if point.is_empty() {
                continue;
            }
            if seen.insert(dedup_key(point)) {
                merged.push(point.to_string());
            }
        }
    }
    merged
}

fn dedup_key(point: &str) -> String {
    point.to_lowercase()
}

/// The draft shown for review when no outline provider is configured or it failed.
pub fn draft_outline(topic: &str, merged_points: &[String]) -> Outline {
    let title = topic.trim().to_string();
    Outline {
        sections: vec![OutlineSection::new(title.clone(), merged_points.to_vec())],
        title,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(provider: Provider, points: &[&str]) -> (Provider, BrainstormCandidate) {
        (
            provider,
            BrainstormCandidate {
                provider,
                points: points.iter().map(|p| p.to_string()).collect(),
            },
        )
    }

    #[test]
    fn test_merge_dedups_in_first_seen_order() {
        let candidates = BTreeMap::from([
            candidate(Provider::Claude37, &["Fast", "Safe", "Fast"]),
            candidate(Provider::Gpt4, &["Fast", "Concurrent"]),
        ]);
        let merged = merge_candidates(&candidates, &[Provider::Claude37, Provider::Gpt4]);
        assert_eq!(merged, vec!["Fast", "Safe", "Concurrent"]);
    }

    #[test]
    fn test_priority_not_map_order_decides() {
        let candidates = BTreeMap::from([
            candidate(Provider::ClaudeV1, &["memory safety"]),
            candidate(Provider::Gpt4, &["Memory Safety", "Zero-cost abstractions"]),
        ]);
        let merged = merge_candidates(&candidates, &[Provider::Gpt4, Provider::ClaudeV1]);
        assert_eq!(merged, vec!["Memory Safety", "Zero-cost abstractions"]);
    }

    #[test]
    fn test_unlisted_provider_still_merged() {
        let candidates = BTreeMap::from([
            candidate(Provider::Gpt4, &["A"]),
            candidate(Provider::ClaudeV1, &["B"]),
        ]);
        let merged = merge_candidates(&candidates, &[Provider::Gpt4]);
        assert_eq!(merged, vec!["A", "B"]);
    }

    #[test]
    fn test_near_duplicates_are_kept() {
        let candidates = BTreeMap::from([candidate(
            Provider::Claude37,
            &["Fast", "Fast!", " fast "],
        )]);
        let merged = merge_candidates(&candidates, &[Provider::Claude37]);
        assert_eq!(merged, vec!["Fast", "Fast!"]);
    }

    #[test]
    fn test_draft_outline_uses_topic() {
        let outline = draft_outline(" Intro to Rust ", &["Fast".to_string()]);
        assert_eq!(outline.title, "Intro to Rust");
        assert_eq!(outline.sections.len(), 1);
        assert_eq!(outline.sections[0].points, vec!["Fast"]);
        outline.validate().unwrap();
    }
}
