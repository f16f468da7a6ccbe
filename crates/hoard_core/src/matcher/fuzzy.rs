//! `nucleo-matcher` backed fuzzy scoring.
//!
//! Raw nucleo scores are unbounded, so each score is normalized against the
//! score the query earns when matched against itself.

use super::{clamp_score, Matcher, MatcherKind, RankedCandidate, MAX_SCORE};
use nucleo_matcher::pattern::{AtomKind, CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Config, Matcher as NucleoMatcher, Utf32Str};

/// Token-based fuzzy matcher: every query word must match as a subsequence.
#[derive(Clone)]
pub struct FuzzyMatcher {
    config: Config,
}

impl FuzzyMatcher {
    pub fn new() -> Self {
        Self {
            config: Config::DEFAULT,
        }
    }

    fn scorer(&self, query: &str) -> QueryScorer {
        let pattern = Pattern::new(
            query,
            CaseMatching::Ignore,
            Normalization::Smart,
            AtomKind::Fuzzy,
        );
        let mut matcher = NucleoMatcher::new(self.config.clone());
        let mut buf = Vec::new();
        let ceiling = if pattern.atoms.is_empty() {
            0
        } else {
            pattern
                .score(Utf32Str::new(query, &mut buf), &mut matcher)
                .unwrap_or(0)
        };
        QueryScorer {
            pattern,
            matcher,
            buf,
            ceiling,
        }
    }
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Matcher for FuzzyMatcher {
    fn kind(&self) -> MatcherKind {
        MatcherKind::Fuzzy
    }

    fn score(&self, query: &str, candidate: &str) -> f64 {
        self.scorer(query).score(candidate)
    }

    fn rank<'a>(&self, query: &str, candidates: &[&'a str]) -> Vec<RankedCandidate<'a>> {
        let mut scorer = self.scorer(query);
        let mut ranked = candidates
            .iter()
            .enumerate()
            .map(|(index, &candidate)| RankedCandidate {
                index,
                candidate,
                score: scorer.score(candidate),
            })
            .collect::<Vec<_>>();
        ranked.sort_by(|left, right| right.score.total_cmp(&left.score));
        ranked
    }
}

/// Per-query state reused across candidates.
struct QueryScorer {
    pattern: Pattern,
    matcher: NucleoMatcher,
    buf: Vec<char>,
    ceiling: u32,
}

impl QueryScorer {
    fn score(&mut self, candidate: &str) -> f64 {
        if self.ceiling == 0 {
            return 0.0;
        }
        let raw = self
            .pattern
            .score(Utf32Str::new(candidate, &mut self.buf), &mut self.matcher)
            .unwrap_or(0);
        clamp_score(MAX_SCORE * f64::from(raw) / f64::from(self.ceiling))
    }
}

#[cfg(test)]
mod tests {
    use super::FuzzyMatcher;
    use crate::matcher::Matcher;

    #[test]
    fn exact_text_scores_full_marks() {
        let score = FuzzyMatcher::new().score("example", "example");
        assert_eq!(score, 100.0);
    }

    #[test]
    fn typo_subsequence_scores_above_half() {
        let score = FuzzyMatcher::new().score("exmple", "Example a test site");
        assert!(score >= 50.0, "typo score {score}");
    }

    #[test]
    fn missing_token_scores_zero() {
        let matcher = FuzzyMatcher::new();
        assert_eq!(matcher.score("smith", "Alice Jones"), 0.0);
        assert_eq!(matcher.score("   ", "Alice Jones"), 0.0);
    }

    #[test]
    fn rank_agrees_with_score() {
        let matcher = FuzzyMatcher::new();
        let candidates = ["Alice Jones", "Alice Smith", "Bob"];
        let ranked = matcher.rank("alice smith", &candidates);
        assert_eq!(ranked[0].candidate, "Alice Smith");
        for hit in &ranked {
            assert_eq!(hit.score, matcher.score("alice smith", hit.candidate));
        }
    }
}
