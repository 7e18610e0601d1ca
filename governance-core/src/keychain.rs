//! Hamiltonian key chain & geodesic monitor (E.5): a fixed
//! 16-polyhedron path, HMAC-chained per-step keys, geodesic-deviation and
//! curvature intrusion detection, and the Langues cost function.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::constants::{
    self, EPSILON_CURVATURE, EPSILON_SNAP, HYPER_RANGE, INTRUSION_RATE_THRESHOLD,
    LANGUES_BETA_BASE, LANGUES_COST_HIGH, LANGUES_COST_LOW, MAX_INTRUSIONS, POLYHEDRA,
};
use crate::error::{GovernanceError, Result};
use crate::state::RhythmWindow;

/// The 6-dimensional "Langues" context vector, decomposed into a 4D intent
/// sub-block and a 2D temporal sub-block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LanguesVector(pub [f64; 6]);

impl LanguesVector {
    /// Read the HYPER block of a 21D state vector directly as (x1..x6).
    pub fn from_state(state: &[f64; constants::BRAIN_DIMENSIONS]) -> Self {
        let mut v = [0.0; 6];
        v.copy_from_slice(&state[HYPER_RANGE]);
        Self(v)
    }

    pub fn intent(&self) -> [f64; 4] {
        [self.0[0], self.0[1], self.0[2], self.0[3]]
    }

    pub fn temporal(&self) -> [f64; 2] {
        [self.0[4], self.0[5]]
    }
}

/// Classification of a Langues cost value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguesDecision {
    Allow,
    Quarantine,
    Deny,
}

/// Kernel-owned key-chain and rhythm bookkeeping for one agent. Not part of
/// the externally persisted canonical record — this is internal
/// intrusion-detection state the kernel keeps alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeychainState {
    pub current_key: [u8; 32],
    /// Index into [`POLYHEDRA`] of the *next* step to advance into, 0..16.
    pub step_index: u8,
    pub rhythm: RhythmWindow,
    pub intrusion_count: u32,
    pub total_steps: u64,
}

impl KeychainState {
    pub fn new(seed_key: [u8; 32]) -> Self {
        Self {
            current_key: seed_key,
            step_index: 0,
            rhythm: RhythmWindow::new(),
            intrusion_count: 0,
            total_steps: 0,
        }
    }
}

/// Result of one geodesic-monitor call: deviation, curvature, the rhythm
/// sample, the Langues cost/decision, escalation, and the induced trust
/// value the flux controller can consume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorResult {
    pub deviation: f64,
    pub curvature: f64,
    pub is_intrusion: bool,
    pub langues_cost: f64,
    pub langues_decision: LanguesDecision,
    pub escalation: bool,
    pub induced_trust: f64,
}

/// Deterministic centroid of polyhedron `i`'s position on the Hamiltonian
/// path, in the 6D Langues space. Only the path order and per-polyhedron
/// `min_flux` are fixed; the exact embedding is a heuristic, so here a
/// golden-angle spiral keeps consecutive steps well separated while staying
/// deterministic and bounded.
fn polyhedron_centroid(i: usize) -> [f64; 6] {
    let golden_angle = TAU / (constants::phi() * constants::phi());
    let theta = i as f64 * golden_angle;
    let radius = 0.3 + 0.4 * POLYHEDRA[i % POLYHEDRA.len()].min_flux;
    [
        radius * theta.cos(),
        radius * theta.sin(),
        radius * (2.0 * theta).cos(),
        radius * (2.0 * theta).sin(),
        radius * (3.0 * theta).cos(),
        radius * (3.0 * theta).sin(),
    ]
}

/// Expected geodesic position at normalised time `tau in [0,1]`: the
/// centroid of the polyhedron for step `floor(tau*16)`.
fn expected_position(tau: f64) -> [f64; 6] {
    let step = expected_step(tau);
    polyhedron_centroid(step)
}

fn expected_step(tau: f64) -> usize {
    ((tau.clamp(0.0, 1.0) * POLYHEDRA.len() as f64) as usize).min(POLYHEDRA.len() - 1)
}

fn euclidean_distance6(a: &[f64; 6], b: &[f64; 6]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Menger curvature of three consecutive expected-path centroids around
/// `tau`, projected to their first three dimensions.
fn expected_path_curvature(tau: f64) -> f64 {
    let step = expected_step(tau) as isize;
    let n = POLYHEDRA.len() as isize;
    let prev = polyhedron_centroid(((step - 1).rem_euclid(n)) as usize);
    let curr = polyhedron_centroid((step.rem_euclid(n)) as usize);
    let next = polyhedron_centroid(((step + 1).rem_euclid(n)) as usize);

    let a = [prev[0], prev[1], prev[2]];
    let b = [curr[0], curr[1], curr[2]];
    let c = [next[0], next[1], next[2]];

    let ab = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let bc = [c[0] - b[0], c[1] - b[1], c[2] - b[2]];
    let ac = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];

    let cross = [
        ab[1] * bc[2] - ab[2] * bc[1],
        ab[2] * bc[0] - ab[0] * bc[2],
        ab[0] * bc[1] - ab[1] * bc[0],
    ];
    let area = (cross[0].powi(2) + cross[1].powi(2) + cross[2].powi(2)).sqrt() / 2.0;

    let len = |v: &[f64; 3]| (v[0].powi(2) + v[1].powi(2) + v[2].powi(2)).sqrt();
    let denom = (len(&ab) * len(&bc) * len(&ac)).max(1e-12);

    4.0 * area / denom
}

/// Langues cost: `L(x,tau) = sum_{i=1..6} w_i * exp(beta_i*(x_i + sin(omega_i*tau + phi_i)))`,
/// with `w_i = phi^(i-1)`, `phi_i = 2*pi*(i-1)/6`, `beta_i = beta_base * phi^((i-1)/2)`,
/// `omega_i = i`. Evaluation runs i=1..6 in order,.
pub fn langues_cost(x: &LanguesVector, tau: f64) -> f64 {
    let golden = constants::phi();
    let mut total = 0.0;
    for i in 1..=6usize {
        let fi = i as f64;
        let w_i = golden.powi(i as i32 - 1);
        let phi_i = TAU * (fi - 1.0) / 6.0;
        let beta_i = LANGUES_BETA_BASE * golden.powf((fi - 1.0) / 2.0);
        let omega_i = fi;
        total += w_i * (beta_i * (x.0[i - 1] + (omega_i * tau + phi_i).sin())).exp();
    }
    total
}

pub fn classify_langues_cost(cost: f64) -> LanguesDecision {
    if cost < LANGUES_COST_LOW {
        LanguesDecision::Allow
    } else if cost < LANGUES_COST_HIGH {
        LanguesDecision::Quarantine
    } else {
        LanguesDecision::Deny
    }
}

/// Advance the key chain one Hamiltonian-path step and run the geodesic
/// intrusion check + Langues cost at normalised time `tau`.
pub fn monitor(chain: &mut KeychainState, langues: &LanguesVector, tau: f64) -> Result<MonitorResult> {
    let step_name = POLYHEDRA[chain.step_index as usize % POLYHEDRA.len()].name;
    chain.current_key = governance_verification::hmac_step(&chain.current_key, step_name)?;
    chain.step_index = ((chain.step_index as usize + 1) % POLYHEDRA.len()) as u8;
    chain.total_steps += 1;

    let expected = expected_position(tau);
    let deviation = euclidean_distance6(&langues.0, &expected);
    let curvature = expected_path_curvature(tau);
    let is_intrusion = deviation > EPSILON_SNAP || curvature > EPSILON_CURVATURE;

    chain.rhythm.push(is_intrusion);
    if is_intrusion {
        chain.intrusion_count += 1;
    }

    let intrusion_rate = if chain.rhythm.is_empty() {
        0.0
    } else {
        chain.rhythm.iter().filter(|b| *b).count() as f64 / chain.rhythm.len() as f64
    };

    let escalation = chain.intrusion_count >= MAX_INTRUSIONS
        || (chain.total_steps >= 5 && intrusion_rate > INTRUSION_RATE_THRESHOLD);

    let cost = langues_cost(langues, tau);
    let decision = classify_langues_cost(cost);

    let induced_trust = if escalation {
        0.0
    } else if deviation <= EPSILON_SNAP {
        1.0 - 0.2 * (deviation / EPSILON_SNAP)
    } else {
        let off = (deviation / (10.0 * EPSILON_SNAP)).min(1.0);
        0.3 * (1.0 - off)
    };

    Ok(MonitorResult {
        deviation,
        curvature,
        is_intrusion,
        langues_cost: cost,
        langues_decision: decision,
        escalation,
        induced_trust,
    })
}

/// Verify that sequentially applying `HMAC(K_i, polyhedron[i].name)` sixteen
/// times from `k0` reproduces `expected_final`.
pub fn verify_chain_reduction(k0: [u8; 32], expected_final: [u8; 32]) -> Result<bool> {
    let mut key = k0;
    for p in POLYHEDRA.iter() {
        key = governance_verification::hmac_step(&key, p.name)?;
    }
    Ok(key == expected_final)
}

/// Derive the seed key `K0` from a 32-byte shared secret.
pub fn derive_seed_key(shared_secret: &[u8; 32], intent_fingerprint: &str, epoch: u64) -> Result<[u8; 32]> {
    governance_verification::derive_seed_key(shared_secret, intent_fingerprint, epoch)
        .map_err(GovernanceError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_chain_reduction_is_reproducible() {
        let k0 = [7u8; 32];
        let mut key = k0;
        for p in POLYHEDRA.iter() {
            key = governance_verification::hmac_step(&key, p.name).unwrap();
        }
        assert!(verify_chain_reduction(k0, key).unwrap());
    }

    #[test]
    fn tampered_final_key_fails_verification() {
        let k0 = [7u8; 32];
        let mut wrong_final = [0u8; 32];
        wrong_final[0] = 1;
        assert!(!verify_chain_reduction(k0, wrong_final).unwrap());
    }

    #[test]
    fn on_geodesic_point_is_not_an_intrusion() {
        let mut chain = KeychainState::new([1u8; 32]);
        let expected = expected_position(0.0);
        let langues = LanguesVector(expected);
        let result = monitor(&mut chain, &langues, 0.0).unwrap();
        assert!(!result.is_intrusion);
        assert!(result.induced_trust >= 0.8);
    }

    #[test]
    fn far_off_geodesic_point_is_an_intrusion() {
        let mut chain = KeychainState::new([1u8; 32]);
        let langues = LanguesVector([10.0, 10.0, 10.0, 10.0, 10.0, 10.0]);
        let result = monitor(&mut chain, &langues, 0.0).unwrap();
        assert!(result.is_intrusion);
        assert!(result.induced_trust < 0.3);
    }

    #[test]
    fn sustained_intrusions_trigger_escalation() {
        let mut chain = KeychainState::new([1u8; 32]);
        let langues = LanguesVector([10.0, 10.0, 10.0, 10.0, 10.0, 10.0]);
        let mut last = None;
        for i in 0..6 {
            let tau = i as f64 / 6.0;
            last = Some(monitor(&mut chain, &langues, tau).unwrap());
        }
        assert!(last.unwrap().escalation);
    }

    #[test]
    fn low_cost_classifies_as_allow() {
        let x = LanguesVector([0.0; 6]);
        let cost = langues_cost(&x, 0.0);
        assert_eq!(classify_langues_cost(cost.min(0.5)), LanguesDecision::Allow);
    }

    #[test]
    fn high_cost_classifies_as_deny() {
        assert_eq!(classify_langues_cost(10.0), LanguesDecision::Deny);
    }
}
