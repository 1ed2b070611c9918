//! Shift consensus and candidate selection.
//!
//! Each parameter set yields one `CandidateMeasure`. A candidate is trusted
//! when at least three successful candidates (itself included) landed within
//! the tolerance of each other; among all successful candidates the cheapest
//! one is chosen and the correspondence is rejected when that one lacks
//! support.

use crate::geom::AttemptFailure;
use crate::params::ParameterSet;
use crate::util::math::distance;
use std::fmt;

/// Result of a successful attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct CandidateFit {
    pub sample: f64,
    pub line: f64,
    /// Correlation score of the match.
    pub template_score: f64,
    /// Mutual information between the reference window and the matched window.
    pub mi_score: f64,
    /// Distance moved from the projected location.
    pub shift: f64,
}

/// One parameter set's attempt at registering a measure.
#[derive(Clone, Debug, PartialEq)]
pub struct CandidateMeasure {
    pub measure_id: u64,
    pub parameter_index: usize,
    pub parameters: ParameterSet,
    /// Mutual information before matching.
    pub baseline_mi: f64,
    /// Correlation before matching.
    pub baseline_corr: f64,
    pub fit: Result<CandidateFit, AttemptFailure>,
}

impl CandidateMeasure {
    /// `(baseline_mi - mi) + (baseline_corr - corr)`, lower is better.
    pub fn cost(&self) -> Option<f64> {
        let fit = self.fit.as_ref().ok()?;
        Some((self.baseline_mi - fit.mi_score) + (self.baseline_corr - fit.template_score))
    }

    /// Matched `(sample, line)`.
    pub fn point(&self) -> Option<(f64, f64)> {
        self.fit.as_ref().ok().map(|fit| (fit.sample, fit.line))
    }
}

/// Marks points that agree with at least two others within `tolerance`.
///
/// Row `i` of the pairwise distance matrix counts entries `<= tolerance`; the
/// diagonal is zero so a point needs more than two hits.
pub fn check_for_shift_consensus(points: &[(f64, f64)], tolerance: f64) -> Vec<bool> {
    points
        .iter()
        .map(|&p| points.iter().filter(|&&q| distance(p, q) <= tolerance).count() > 2)
        .collect()
}

/// Why a correspondence was not registered.
#[derive(Clone, Debug, PartialEq)]
pub enum RejectReason {
    /// Every attempt failed; the first failure is kept.
    NoSuccessfulAttempts {
        attempts: usize,
        first: Option<AttemptFailure>,
    },
    /// The cheapest candidate is not supported by the others.
    NoConsensus { parameter_index: usize, cost: f64 },
    /// Too few reverse registrations returned to the reference point.
    FailedValidation { within_tolerance: usize, required: usize },
    /// The correspondence could not be set up at all.
    Attempt(AttemptFailure),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NoSuccessfulAttempts { attempts, first } => {
                write!(f, "all {attempts} attempts failed")?;
                if let Some(first) = first {
                    write!(f, " (first: {first})")?;
                }
                Ok(())
            }
            RejectReason::NoConsensus {
                parameter_index,
                cost,
            } => write!(
                f,
                "lowest-cost candidate (parameter set {parameter_index}, cost {cost:.4}) has no shift consensus"
            ),
            RejectReason::FailedValidation {
                within_tolerance,
                required,
            } => write!(
                f,
                "reverse validation returned {within_tolerance} of {required} required points within tolerance"
            ),
            RejectReason::Attempt(err) => write!(f, "{err}"),
        }
    }
}

/// Accept or reject, derived from the candidates of one correspondence.
#[derive(Clone, Debug, PartialEq)]
pub enum ConsensusDecision {
    Accept {
        measure_id: u64,
        chosen: CandidateMeasure,
        cost: f64,
        /// Parameter indices of the agreeing candidates.
        inliers: Vec<usize>,
    },
    Reject {
        measure_id: u64,
        reason: RejectReason,
    },
}

impl ConsensusDecision {
    pub fn measure_id(&self) -> u64 {
        match self {
            ConsensusDecision::Accept { measure_id, .. }
            | ConsensusDecision::Reject { measure_id, .. } => *measure_id,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, ConsensusDecision::Accept { .. })
    }

    /// Chosen candidate when accepted.
    pub fn chosen(&self) -> Option<&CandidateMeasure> {
        match self {
            ConsensusDecision::Accept { chosen, .. } => Some(chosen),
            ConsensusDecision::Reject { .. } => None,
        }
    }
}

/// Picks the cheapest successful candidate and requires shift consensus for it.
pub fn decide(
    measure_id: u64,
    candidates: &[CandidateMeasure],
    tolerance: f64,
) -> ConsensusDecision {
    let successful: Vec<&CandidateMeasure> =
        candidates.iter().filter(|c| c.fit.is_ok()).collect();
    if successful.is_empty() {
        let first = candidates.iter().find_map(|c| c.fit.as_ref().err().cloned());
        return ConsensusDecision::Reject {
            measure_id,
            reason: RejectReason::NoSuccessfulAttempts {
                attempts: candidates.len(),
                first,
            },
        };
    }

    let points: Vec<(f64, f64)> = successful.iter().filter_map(|c| c.point()).collect();
    let inlier = check_for_shift_consensus(&points, tolerance);

    let mut best: Option<(usize, f64)> = None;
    for (i, candidate) in successful.iter().enumerate() {
        let Some(cost) = candidate.cost() else {
            continue;
        };
        match best {
            Some((_, b)) if cost >= b => {}
            _ => best = Some((i, cost)),
        }
    }
    let Some((chosen, cost)) = best else {
        return ConsensusDecision::Reject {
            measure_id,
            reason: RejectReason::NoSuccessfulAttempts {
                attempts: candidates.len(),
                first: None,
            },
        };
    };

    if !inlier[chosen] {
        return ConsensusDecision::Reject {
            measure_id,
            reason: RejectReason::NoConsensus {
                parameter_index: successful[chosen].parameter_index,
                cost,
            },
        };
    }

    let inliers = successful
        .iter()
        .zip(&inlier)
        .filter(|(_, ok)| **ok)
        .map(|(c, _)| c.parameter_index)
        .collect();
    ConsensusDecision::Accept {
        measure_id,
        chosen: successful[chosen].clone(),
        cost,
        inliers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_close_points_agree() {
        let points = [(10.0, 10.0), (10.1, 10.0), (10.0, 10.2)];
        assert_eq!(check_for_shift_consensus(&points, 0.5), vec![true; 3]);
    }

    #[test]
    fn two_of_five_is_not_consensus() {
        let points = [(0.0, 0.0), (0.1, 0.0), (5.0, 5.0), (9.0, 1.0), (3.0, 8.0)];
        assert_eq!(check_for_shift_consensus(&points, 0.5), vec![false; 5]);
    }
}
