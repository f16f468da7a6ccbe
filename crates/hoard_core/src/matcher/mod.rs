//! Query-to-candidate similarity ranking.
//!
//! # Responsibility
//! - Score candidate strings against a free-form query on a `[0, 100]` scale.
//! - Pick one strategy at construction time and hide it behind [`Matcher`].
//!
//! # Invariants
//! - Scoring is pure: identical input always yields identical output.
//! - `rank` is a stable sort; equal scores keep candidate order.
//! - Both strategies share the same scale, so callers never branch on kind.

#[cfg(feature = "fuzzy")]
mod fuzzy;
mod heuristic;

#[cfg(feature = "fuzzy")]
pub use fuzzy::FuzzyMatcher;
pub use heuristic::{ratcliff_obershelp_ratio, HeuristicMatcher};

/// Highest score any strategy returns.
pub const MAX_SCORE: f64 = 100.0;

/// Active matching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherKind {
    /// Library-backed fuzzy matching (`nucleo-matcher`).
    Fuzzy,
    /// Built-in token-wise Ratcliff/Obershelp ratio.
    Heuristic,
}

impl MatcherKind {
    /// Best strategy compiled into this binary.
    pub fn detect() -> Self {
        if cfg!(feature = "fuzzy") {
            Self::Fuzzy
        } else {
            Self::Heuristic
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fuzzy => "fuzzy",
            Self::Heuristic => "heuristic",
        }
    }
}

/// One scored candidate from [`Matcher::rank`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedCandidate<'a> {
    /// Position in the input slice.
    pub index: usize,
    pub candidate: &'a str,
    pub score: f64,
}

/// Similarity strategy. Implementations must be deterministic.
pub trait Matcher {
    fn kind(&self) -> MatcherKind;

    /// Similarity of `candidate` to `query` in `[0, 100]`.
    fn score(&self, query: &str, candidate: &str) -> f64;

    /// Scores every candidate and sorts by descending score.
    fn rank<'a>(&self, query: &str, candidates: &[&'a str]) -> Vec<RankedCandidate<'a>> {
        let mut ranked = candidates
            .iter()
            .enumerate()
            .map(|(index, &candidate)| RankedCandidate {
                index,
                candidate,
                score: self.score(query, candidate),
            })
            .collect::<Vec<_>>();
        ranked.sort_by(|left, right| right.score.total_cmp(&left.score));
        ranked
    }
}

/// Builds the matcher for `kind`.
///
/// Requesting [`MatcherKind::Fuzzy`] without the `fuzzy` feature falls back
/// to the heuristic.
pub fn matcher_for(kind: MatcherKind) -> Box<dyn Matcher> {
    match kind {
        #[cfg(feature = "fuzzy")]
        MatcherKind::Fuzzy => Box::new(FuzzyMatcher::new()),
        #[cfg(not(feature = "fuzzy"))]
        MatcherKind::Fuzzy => {
            log::warn!("event=matcher_select module=matcher status=degraded requested=fuzzy active=heuristic");
            Box::new(HeuristicMatcher)
        }
        MatcherKind::Heuristic => Box::new(HeuristicMatcher),
    }
}

pub(crate) fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, MAX_SCORE)
}
