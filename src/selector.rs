//! Pure dual-constraint selection over a candidate list. No state, no
//! I/O — a fixed candidate list always yields the same choice.

use crate::candidate::EncodedCandidate;
use crate::request::RejectionReason;

/// `(byte_size <= max_bytes) AND (diff <= max_diff)`, with `0` meaning
/// "no constraint" on either side.
fn passes(candidate: &EncodedCandidate, max_bytes: u32, max_diff: f64) -> bool {
    let budget_ok = max_bytes == 0 || candidate.byte_size() as u64 <= u64::from(max_bytes);
    let diff_ok = max_diff == 0.0 || candidate.diff <= max_diff;
    budget_ok && diff_ok
}

/// Select the best candidate from `candidates` (in original insertion
/// order — the original-file candidate, if any, must be first so it wins
/// true ties). Returns `None` plus a [`RejectionReason`] when nothing
/// passes both constraints.
pub fn select(
    candidates: &[EncodedCandidate],
    max_bytes: u32,
    max_diff: f64,
) -> (Option<usize>, Option<RejectionReason>) {
    let passing: Vec<usize> = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| passes(c, max_bytes, max_diff))
        .map(|(i, _)| i)
        .collect();

    if passing.is_empty() {
        return (None, Some(rejection_reason(candidates, max_bytes, max_diff)));
    }

    let mut best = passing[0];
    for &idx in &passing[1..] {
        if is_better(&candidates[idx], idx, &candidates[best], best) {
            best = idx;
        }
    }
    (Some(best), None)
}

/// `candidate` beats `incumbent` if it's strictly smaller, or — on a true
/// byte-size tie — if its format outranks the incumbent's. Equal rank on
/// a true tie keeps the first-inserted one (the original candidate wins
/// because it is always inserted first).
fn is_better(
    candidate: &EncodedCandidate,
    _candidate_idx: usize,
    incumbent: &EncodedCandidate,
    _incumbent_idx: usize,
) -> bool {
    if candidate.byte_size() != incumbent.byte_size() {
        return candidate.byte_size() < incumbent.byte_size();
    }
    let candidate_rank = candidate.format.tie_break_rank();
    let incumbent_rank = incumbent.format.tie_break_rank();
    if candidate_rank != incumbent_rank {
        return candidate_rank > incumbent_rank;
    }
    // Exact tie on size and format rank: the earlier-inserted candidate
    // (the incumbent, since we scan in order) keeps its position.
    false
}

fn rejection_reason(
    candidates: &[EncodedCandidate],
    max_bytes: u32,
    max_diff: f64,
) -> RejectionReason {
    let mut failed_budget_only = false;
    let mut failed_diff_only = false;
    let mut failed_both = false;

    for candidate in candidates {
        let budget_ok = max_bytes == 0 || candidate.byte_size() as u64 <= u64::from(max_bytes);
        let diff_ok = max_diff == 0.0 || candidate.diff <= max_diff;
        match (budget_ok, diff_ok) {
            (true, true) => unreachable!("a passing candidate would have short-circuited selection"),
            (false, true) => failed_budget_only = true,
            (true, false) => failed_diff_only = true,
            (false, false) => failed_both = true,
        }
    }

    if failed_both || (failed_budget_only && failed_diff_only) {
        RejectionReason::Both
    } else if failed_budget_only {
        RejectionReason::Budget
    } else {
        RejectionReason::DiffCeiling
    }
}
