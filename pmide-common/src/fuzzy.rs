//! Fuzzy ranking for the command palette and search boxes
//!
//! Query characters must appear in order in the candidate (case-insensitive).
//! Matches at word starts, runs of consecutive characters, prefixes and exact
//! hits score higher; gaps and long candidates score lower. When no
//! subsequence exists, a Jaro-Winkler comparison against the candidate's
//! words catches small typos with a score below every subsequence match.

use serde::Serialize;

const SCORE_MATCH: i64 = 16;
const BONUS_CONSECUTIVE: i64 = 12;
const BONUS_BOUNDARY: i64 = 10;
const BONUS_FIRST_CHAR: i64 = 8;
const BONUS_SUBSTRING: i64 = 30;
const BONUS_PREFIX: i64 = 40;
const BONUS_EXACT: i64 = 100;
const PENALTY_GAP: i64 = 2;
const MAX_GAP_PENALTY: i64 = 10;
const MAX_LEADING_PENALTY: i64 = 10;
const MAX_LENGTH_PENALTY: i64 = 10;

const TYPO_THRESHOLD: f64 = 0.85;
/// Typo matches score in `1..=TYPO_CEILING`; subsequence matches stay above it
const TYPO_CEILING: i64 = 10;

/// An item paired with its match score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranked<T> {
    pub item: T,
    pub score: i64,
}

/// Score `candidate` against `query`; `None` means no match
pub fn score(query: &str, candidate: &str) -> Option<i64> {
    let query = query.trim();
    if query.is_empty() {
        return Some(0);
    }

    let q: Vec<char> = query.chars().flat_map(char::to_lowercase).collect();
    let (orig, lower) = fold_case(candidate);

    if let Some(base) = best_subsequence(&q, &orig, &lower) {
        let q_str: String = q.iter().collect();
        let c_str: String = lower.iter().collect();

        let mut total = base;
        if c_str == q_str {
            total += BONUS_EXACT;
        } else if c_str.starts_with(&q_str) {
            total += BONUS_PREFIX;
        } else if c_str.contains(&q_str) {
            total += BONUS_SUBSTRING;
        }
        let extra = lower.len().saturating_sub(q.len()) as i64;
        total -= (extra / 4).min(MAX_LENGTH_PENALTY);

        return Some(total.max(TYPO_CEILING + 1));
    }

    typo_score(query, candidate)
}

/// Lowercase `candidate`, keeping an original char for every lowered one
///
/// Chars whose lowercase form is several chars (`İ`) repeat in `orig` so the
/// two vectors stay index-aligned.
fn fold_case(candidate: &str) -> (Vec<char>, Vec<char>) {
    let mut orig = Vec::with_capacity(candidate.len());
    let mut lower = Vec::with_capacity(candidate.len());
    for c in candidate.chars() {
        for l in c.to_lowercase() {
            orig.push(c);
            lower.push(l);
        }
    }
    (orig, lower)
}

fn is_boundary(orig: &[char], i: usize) -> bool {
    if i == 0 {
        return true;
    }
    let prev = orig[i - 1];
    let cur = orig[i];
    !prev.is_alphanumeric() || (prev.is_lowercase() && cur.is_uppercase())
}

/// Gaps this long or longer all pay `MAX_GAP_PENALTY`
const CAPPED_GAP: usize = (MAX_GAP_PENALTY / PENALTY_GAP) as usize;

/// Best alignment of `q` as a subsequence of `lower`
///
/// One row per query char; `row[i]` is the best score with the current query
/// char placed at `i`. Predecessors further back than `CAPPED_GAP` share one
/// penalty, so a running maximum replaces the scan over them and the whole
/// pass stays linear in the candidate length.
fn best_subsequence(q: &[char], orig: &[char], lower: &[char]) -> Option<i64> {
    if q.len() > lower.len() {
        return None;
    }
    let placed = |i: usize| SCORE_MATCH + if is_boundary(orig, i) { BONUS_BOUNDARY } else { 0 };

    let mut row: Vec<Option<i64>> = lower
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            (c == q[0]).then(|| {
                let first = if i == 0 { BONUS_FIRST_CHAR } else { 0 };
                placed(i) + first - (i as i64).min(MAX_LEADING_PENALTY)
            })
        })
        .collect();

    for &qc in &q[1..] {
        let mut next: Vec<Option<i64>> = vec![None; lower.len()];
        let mut far_best: Option<i64> = None;

        for i in 0..lower.len() {
            if i > CAPPED_GAP {
                far_best = far_best.max(row[i - CAPPED_GAP - 1]);
            }
            if lower[i] != qc {
                continue;
            }

            let mut best = far_best.map(|s| s - MAX_GAP_PENALTY);
            for l in i.saturating_sub(CAPPED_GAP)..i {
                let Some(prev) = row[l] else { continue };
                let gap = i - l - 1;
                let step = if gap == 0 {
                    prev + BONUS_CONSECUTIVE
                } else {
                    prev - (gap as i64 * PENALTY_GAP).min(MAX_GAP_PENALTY)
                };
                best = best.max(Some(step));
            }
            next[i] = best.map(|b| b + placed(i));
        }
        row = next;
    }

    row.into_iter().flatten().max()
}

fn typo_score(query: &str, candidate: &str) -> Option<i64> {
    let query = query.to_lowercase();
    let candidate = candidate.to_lowercase();

    let best = candidate
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| strsim::jaro_winkler(&query, w))
        .chain(std::iter::once(strsim::jaro_winkler(&query, &candidate)))
        .fold(0.0f64, f64::max);

    if best < TYPO_THRESHOLD {
        return None;
    }
    let scaled = (best - TYPO_THRESHOLD) / (1.0 - TYPO_THRESHOLD) * (TYPO_CEILING - 1) as f64;
    Some(1 + scaled.round() as i64)
}

/// Best weighted score across several fields of one item
///
/// Weights scale each field's score; a name field at 1.0 beats a body field at 0.4.
pub fn score_fields(query: &str, fields: &[(&str, f64)]) -> Option<i64> {
    fields
        .iter()
        .filter_map(|(text, weight)| score(query, text).map(|s| (s as f64 * weight).round() as i64))
        .max()
}

/// Rank items by `key`, dropping non-matches; ties keep input order
pub fn rank<T, I, F>(query: &str, items: I, key: F) -> Vec<Ranked<T>>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> &str,
{
    let mut ranked: Vec<Ranked<T>> = items
        .into_iter()
        .filter_map(|item| score(query, key(&item)).map(|score| Ranked { item, score }))
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

/// Rank items by several weighted fields
pub fn rank_fields<T, I, F>(query: &str, items: I, fields: F) -> Vec<Ranked<T>>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> Vec<(&str, f64)>,
{
    let mut ranked: Vec<Ranked<T>> = items
        .into_iter()
        .filter_map(|item| {
            let s = score_fields(query, &fields(&item));
            s.map(|score| Ranked { item, score })
        })
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}
