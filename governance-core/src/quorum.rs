//! BFT quorum helper (R.10): a pure function over a vote multiset,
//! unconnected to any agent's canonical state. Byzantine agreement across
//! kernel instances is out of core scope; this only computes the
//! outcome a caller's votes would produce under a `3f+1` quorum formula.

use serde::{Deserialize, Serialize};

/// A single node's vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vote {
    Approve,
    Reject,
    Abstain,
}

/// Result of tallying a vote multiset against a fault-tolerance parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumResult {
    /// Required node count, `3f + 1`.
    pub required_nodes: usize,
    /// Quorum size, `2f + 1`.
    pub quorum: usize,
    /// `true` iff `votes.len() >= required_nodes`.
    pub valid_configuration: bool,
    /// `true` iff some non-abstain value reached `quorum`.
    pub reached: bool,
    /// The value that reached quorum, if any.
    pub outcome: Option<Vote>,
}

/// Tally `votes` under fault tolerance `f`. First non-abstain value to reach
/// `q = 2f + 1` wins; ties resolved by vote order (first to reach the
/// threshold, scanning the tally in `Approve, Reject` order since those are
/// the only two non-abstain values).
pub fn tally(votes: &[Vote], f: usize) -> QuorumResult {
    let required_nodes = 3 * f + 1;
    let quorum = 2 * f + 1;
    let valid_configuration = votes.len() >= required_nodes;

    if !valid_configuration {
        return QuorumResult {
            required_nodes,
            quorum,
            valid_configuration,
            reached: false,
            outcome: None,
        };
    }

    let approve_count = votes.iter().filter(|v| **v == Vote::Approve).count();
    let reject_count = votes.iter().filter(|v| **v == Vote::Reject).count();

    let outcome = if approve_count >= quorum {
        Some(Vote::Approve)
    } else if reject_count >= quorum {
        Some(Vote::Reject)
    } else {
        None
    };

    QuorumResult {
        required_nodes,
        quorum,
        valid_configuration,
        reached: outcome.is_some(),
        outcome,
    }
}
