//! Torus memory gate (G.6): given the current 4-angle write-gate
//! state and an incoming memory event, computes a candidate rotation and
//! snaps (rejects) it when the divergence from the current angles is too
//! large.

use std::f64::consts::{PI, TAU};

use crate::constants::{
    TORUS_SNAP_THRESHOLD, TORUS_WEIGHT_PHI, TORUS_WEIGHT_RHO, TORUS_WEIGHT_SIGMA,
    TORUS_WEIGHT_THETA,
};
use crate::state::{MemoryEvent, TorusAngles};

/// Shortest-arc angular distance between two angles, mod `2*pi`.
fn shortest_arc(a: f64, b: f64) -> f64 {
    let diff = (a - b).rem_euclid(TAU);
    diff.min(TAU - diff)
}

/// Build the candidate torus angles a memory event would rotate to.
pub fn candidate_angles(current: &TorusAngles, event: &MemoryEvent) -> TorusAngles {
    TorusAngles {
        theta: (event.domain as f64 / 21.0) * TAU,
        phi: (current.phi + event.sequence as f64 * TAU / 1000.0).rem_euclid(TAU),
        rho: ((event.polarity + 1.0) / 2.0) * PI,
        sigma: event.authority * TAU,
    }
}

/// Weighted divergence between current and candidate angles, normalised by
/// `pi`, with weights on theta/rho/sigma/phi per [`TORUS_WEIGHT_THETA`]
/// and siblings.
pub fn divergence(current: &TorusAngles, candidate: &TorusAngles) -> f64 {
    let d_theta = shortest_arc(current.theta, candidate.theta);
    let d_phi = shortest_arc(current.phi, candidate.phi);
    let d_rho = shortest_arc(current.rho, candidate.rho);
    let d_sigma = shortest_arc(current.sigma, candidate.sigma);

    (TORUS_WEIGHT_THETA * d_theta
        + TORUS_WEIGHT_RHO * d_rho
        + TORUS_WEIGHT_SIGMA * d_sigma
        + TORUS_WEIGHT_PHI * d_phi)
        / PI
}

/// Outcome of proposing a memory event against the current torus state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TorusGateResult {
    pub candidate: TorusAngles,
    pub divergence: f64,
    pub snap: bool,
}

/// Propose a memory event: compute the candidate angles and divergence, and
/// flag a snap if it exceeds the configured threshold. Committing the
/// candidate (on non-snap) is the caller's responsibility.
pub fn propose(current: &TorusAngles, event: &MemoryEvent) -> TorusGateResult {
    let candidate = candidate_angles(current, event);
    let divergence = divergence(current, &candidate);
    TorusGateResult {
        candidate,
        divergence,
        snap: divergence > TORUS_SNAP_THRESHOLD,
    }
}
