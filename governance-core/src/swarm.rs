//! Swarm formations (S): geometric agent formations and
//! a trust-weighted vote tally, consumed by external coordinators. Pure
//! helper functions over caller-supplied positions/trust scores; the kernel
//! holds no swarm state of its own (formations are not part of canonical
//! per-agent state).

use serde::{Deserialize, Serialize};

use crate::quorum::Vote;

/// A 3D point, reusing the lattice/manifold convention of plain arrays
/// rather than a vector type.
pub type Position = [f64; 3];

/// The geometric shape a formation arranges its members into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormationShape {
    Line,
    Ring,
    Wedge,
    Grid,
}

/// Member positions generated for one formation, anchored at `center` with
/// the given `spacing` between neighbors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formation {
    pub shape: FormationShape,
    pub positions: Vec<Position>,
    pub centroid: Position,
    pub spread: f64,
}

fn centroid_of(positions: &[Position]) -> Position {
    if positions.is_empty() {
        return [0.0, 0.0, 0.0];
    }
    let n = positions.len() as f64;
    let mut sum = [0.0; 3];
    for p in positions {
        sum[0] += p[0];
        sum[1] += p[1];
        sum[2] += p[2];
    }
    [sum[0] / n, sum[1] / n, sum[2] / n]
}

fn distance(a: &Position, b: &Position) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Mean distance of every member from the formation's own centroid: a
/// dispersion measure a coordinator can use to detect a formation pulling
/// apart.
fn spread_of(positions: &[Position], centroid: &Position) -> f64 {
    if positions.is_empty() {
        return 0.0;
    }
    let n = positions.len() as f64;
    positions.iter().map(|p| distance(p, centroid)).sum::<f64>() / n
}

/// Arrange `count` members into `shape` around `center`, `spacing` apart.
/// `count == 0` yields an empty formation with a zero centroid and spread.
pub fn build_formation(
    shape: FormationShape,
    center: Position,
    spacing: f64,
    count: usize,
) -> Formation {
    let positions = match shape {
        FormationShape::Line => line_positions(center, spacing, count),
        FormationShape::Ring => ring_positions(center, spacing, count),
        FormationShape::Wedge => wedge_positions(center, spacing, count),
        FormationShape::Grid => grid_positions(center, spacing, count),
    };
    let centroid = centroid_of(&positions);
    let spread = spread_of(&positions, &centroid);
    Formation { shape, positions, centroid, spread }
}

fn line_positions(center: Position, spacing: f64, count: usize) -> Vec<Position> {
    let half = (count.saturating_sub(1)) as f64 / 2.0;
    (0..count)
        .map(|i| {
            let offset = (i as f64 - half) * spacing;
            [center[0] + offset, center[1], center[2]]
        })
        .collect()
}

fn ring_positions(center: Position, spacing: f64, count: usize) -> Vec<Position> {
    if count == 0 {
        return Vec::new();
    }
    let radius = spacing * count as f64 / std::f64::consts::TAU;
    (0..count)
        .map(|i| {
            let theta = std::f64::consts::TAU * i as f64 / count as f64;
            [
                center[0] + radius * theta.cos(),
                center[1] + radius * theta.sin(),
                center[2],
            ]
        })
        .collect()
}

/// A V-shaped wedge opening behind `center`, two ranks per side.
fn wedge_positions(center: Position, spacing: f64, count: usize) -> Vec<Position> {
    (0..count)
        .map(|i| {
            let rank = (i / 2 + 1) as f64;
            let side = if i % 2 == 0 { 1.0 } else { -1.0 };
            [
                center[0] - rank * spacing,
                center[1] + side * rank * spacing * 0.5,
                center[2],
            ]
        })
        .collect()
}

fn grid_positions(center: Position, spacing: f64, count: usize) -> Vec<Position> {
    if count == 0 {
        return Vec::new();
    }
    let cols = (count as f64).sqrt().ceil() as usize;
    (0..count)
        .map(|i| {
            let row = (i / cols) as f64;
            let col = (i % cols) as f64;
            [center[0] + col * spacing, center[1] + row * spacing, center[2]]
        })
        .collect()
}

/// Trust-weighted generalization of [`crate::quorum::tally`]: each vote
/// carries a trust weight (e.g. the caster's `flux` or immune risk
/// modifier) instead of counting for exactly one. Quorum is still `2f + 1`
/// of the *unweighted* node count (so a pile of low-trust votes cannot
/// manufacture a quorum on their own), but the winning value is the one
/// with the greatest summed trust weight among those that individually
/// reached unweighted quorum share.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedVote {
    pub vote: Vote,
    pub trust: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedQuorumResult {
    pub required_nodes: usize,
    pub quorum: usize,
    pub valid_configuration: bool,
    pub reached: bool,
    pub outcome: Option<Vote>,
    pub winning_weight: f64,
}

/// Tally trust-weighted votes under fault tolerance `f`.
pub fn weighted_tally(votes: &[WeightedVote], f: usize) -> WeightedQuorumResult {
    let required_nodes = 3 * f + 1;
    let quorum = 2 * f + 1;
    let valid_configuration = votes.len() >= required_nodes;

    if !valid_configuration {
        return WeightedQuorumResult {
            required_nodes,
            quorum,
            valid_configuration,
            reached: false,
            outcome: None,
            winning_weight: 0.0,
        };
    }

    let approve_count = votes.iter().filter(|v| v.vote == Vote::Approve).count();
    let reject_count = votes.iter().filter(|v| v.vote == Vote::Reject).count();

    let approve_weight: f64 = votes
        .iter()
        .filter(|v| v.vote == Vote::Approve)
        .map(|v| v.trust)
        .sum();
    let reject_weight: f64 = votes
        .iter()
        .filter(|v| v.vote == Vote::Reject)
        .map(|v| v.trust)
        .sum();

    let (outcome, winning_weight) = if approve_count >= quorum && reject_count >= quorum {
        if approve_weight >= reject_weight {
            (Some(Vote::Approve), approve_weight)
        } else {
            (Some(Vote::Reject), reject_weight)
        }
    } else if approve_count >= quorum {
        (Some(Vote::Approve), approve_weight)
    } else if reject_count >= quorum {
        (Some(Vote::Reject), reject_weight)
    } else {
        (None, 0.0)
    };

    WeightedQuorumResult {
        required_nodes,
        quorum,
        valid_configuration,
        reached: outcome.is_some(),
        outcome,
        winning_weight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_formation_is_centered_and_collinear() {
        let formation = build_formation(FormationShape::Line, [0.0, 0.0, 0.0], 2.0, 4);
        assert_eq!(formation.positions.len(), 4);
        assert!(formation.centroid[0].abs() < 1e-9);
        for p in &formation.positions {
            assert!(p[1].abs() < 1e-9);
        }
    }

    #[test]
    fn ring_formation_members_equidistant_from_centroid() {
        let formation = build_formation(FormationShape::Ring, [0.0, 0.0, 0.0], 1.0, 6);
        for p in &formation.positions {
            let d = distance(p, &formation.centroid);
            assert!((d - formation.spread).abs() < 1e-6);
        }
    }

    #[test]
    fn grid_formation_spread_grows_with_member_count() {
        let small = build_formation(FormationShape::Grid, [0.0, 0.0, 0.0], 1.0, 4);
        let large = build_formation(FormationShape::Grid, [0.0, 0.0, 0.0], 1.0, 16);
        assert!(large.spread > small.spread);
    }

    #[test]
    fn empty_formation_has_zero_centroid_and_spread() {
        let formation = build_formation(FormationShape::Wedge, [1.0, 2.0, 3.0], 1.0, 0);
        assert_eq!(formation.centroid, [0.0, 0.0, 0.0]);
        assert_eq!(formation.spread, 0.0);
    }

    #[test]
    fn weighted_tally_breaks_unweighted_tie_by_trust() {
        let votes = [
            WeightedVote { vote: Vote::Approve, trust: 0.9 },
            WeightedVote { vote: Vote::Approve, trust: 0.9 },
            WeightedVote { vote: Vote::Approve, trust: 0.9 },
            WeightedVote { vote: Vote::Reject, trust: 0.1 },
        ];
        let result = weighted_tally(&votes, 1);
        assert!(result.reached);
        assert_eq!(result.outcome, Some(Vote::Approve));
    }

    #[test]
    fn weighted_tally_requires_unweighted_quorum_share() {
        // A single high-trust vote cannot manufacture quorum alone.
        let votes = [
            WeightedVote { vote: Vote::Approve, trust: 100.0 },
            WeightedVote { vote: Vote::Reject, trust: 0.1 },
            WeightedVote { vote: Vote::Reject, trust: 0.1 },
            WeightedVote { vote: Vote::Abstain, trust: 0.1 },
        ];
        let result = weighted_tally(&votes, 1);
        assert!(!result.reached);
    }
}
