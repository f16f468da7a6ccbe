//! Built-in similarity used when no fuzzy library is compiled in.

use super::{clamp_score, Matcher, MatcherKind, MAX_SCORE};

/// Token-wise Ratcliff/Obershelp scorer.
///
/// Each query token takes its best ratio against the candidate tokens (a
/// containing token counts as a perfect match); the final score is the mean
/// over query tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicMatcher;

impl Matcher for HeuristicMatcher {
    fn kind(&self) -> MatcherKind {
        MatcherKind::Heuristic
    }

    fn score(&self, query: &str, candidate: &str) -> f64 {
        let query_tokens = tokenize(query);
        let candidate_tokens = tokenize(candidate);
        if query_tokens.is_empty() || candidate_tokens.is_empty() {
            return 0.0;
        }

        let total = query_tokens
            .iter()
            .map(|query_token| {
                candidate_tokens
                    .iter()
                    .map(|candidate_token| {
                        if candidate_token.contains(query_token.as_str()) {
                            1.0
                        } else {
                            ratcliff_obershelp_ratio(query_token, candidate_token)
                        }
                    })
                    .fold(0.0, f64::max)
            })
            .sum::<f64>();

        clamp_score(MAX_SCORE * total / query_tokens.len() as f64)
    }
}

/// `2·M / T`, where `M` counts chars in recursively found longest common
/// substrings and `T` is the combined length. Two empty strings score 1.0.
pub fn ratcliff_obershelp_ratio(left: &str, right: &str) -> f64 {
    let left = left.chars().collect::<Vec<_>>();
    let right = right.chars().collect::<Vec<_>>();
    let total = left.len() + right.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&left, &right) as f64 / total as f64
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn matching_chars(left: &[char], right: &[char]) -> usize {
    let (left_start, right_start, len) = longest_common_block(left, right);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&left[..left_start], &right[..right_start])
        + matching_chars(&left[left_start + len..], &right[right_start + len..])
}

/// Earliest longest common substring as `(left_start, right_start, len)`.
fn longest_common_block(left: &[char], right: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut previous = vec![0usize; right.len() + 1];
    for (i, left_char) in left.iter().enumerate() {
        let mut current = vec![0usize; right.len() + 1];
        for (j, right_char) in right.iter().enumerate() {
            if left_char == right_char {
                let run = previous[j] + 1;
                current[j + 1] = run;
                if run > best.2 {
                    best = (i + 1 - run, j + 1 - run, run);
                }
            }
        }
        previous = current;
    }
    best
}
