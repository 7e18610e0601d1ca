//! Canonical per-agent state and the kernel's working-state auxiliaries.
//! The canonical record is what gets persisted externally; the
//! rest (immune record, key chain state, trajectory window) is kernel-owned
//! bookkeeping that never escapes by reference.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{self, BRAIN_DIMENSIONS};

/// Fixed-capacity ring buffer with an explicit head/count, avoiding hidden
/// reallocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingBuffer<T: Copy, const N: usize> {
    buf: [Option<T>; N],
    head: usize,
    count: usize,
}

impl<T: Copy, const N: usize> RingBuffer<T, N> {
    pub fn new() -> Self {
        Self {
            buf: [None; N],
            head: 0,
            count: 0,
        }
    }

    pub fn push(&mut self, value: T) {
        self.buf[self.head] = Some(value);
        self.head = (self.head + 1) % N;
        self.count = (self.count + 1).min(N);
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        N
    }

    /// Iterate oldest-to-newest.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        let start = if self.count == N { self.head } else { 0 };
        (0..self.count).map(move |i| self.buf[(start + i) % N].expect("within count"))
    }
}

impl<T: Copy, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

pub type SuspicionHistory = RingBuffer<f64, { constants::IMMUNE_HISTORY_CAPACITY }>;
pub type RhythmWindow = RingBuffer<bool, { constants::RHYTHM_WINDOW }>;

/// Flux tier, derived from continuous flux `ν` by threshold bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FluxState {
    Polly,
    Quasi,
    Demi,
    Collapsed,
}

impl FluxState {
    pub fn from_flux(nu: f64) -> Self {
        if nu >= constants::FLUX_POLLY_MIN {
            FluxState::Polly
        } else if nu >= constants::FLUX_QUASI_MIN {
            FluxState::Quasi
        } else if nu >= constants::FLUX_DEMI_MIN {
            FluxState::Demi
        } else {
            FluxState::Collapsed
        }
    }

    pub fn capabilities(&self) -> &'static [&'static str] {
        match self {
            FluxState::Polly => constants::CAPS_POLLY,
            FluxState::Quasi => constants::CAPS_QUASI,
            FluxState::Demi => constants::CAPS_DEMI,
            FluxState::Collapsed => constants::CAPS_COLLAPSED,
        }
    }
}

/// Per-agent immune/suspicion state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImmuneState {
    Healthy,
    Monitoring,
    Inflamed,
    Quarantined,
    Expelled,
}

impl ImmuneState {
    /// Risk modifier surfaced to K. `Expelled` maps to `+inf`.
    pub fn risk_modifier(&self) -> f64 {
        match self {
            ImmuneState::Healthy => constants::IMMUNE_RISK_MODIFIER_HEALTHY,
            ImmuneState::Monitoring => constants::IMMUNE_RISK_MODIFIER_MONITORING,
            ImmuneState::Inflamed => constants::IMMUNE_RISK_MODIFIER_INFLAMED,
            ImmuneState::Quarantined => constants::IMMUNE_QUARANTINE_AMPLIFICATION,
            ImmuneState::Expelled => f64::INFINITY,
        }
    }

    pub fn flux_penalty(&self) -> f64 {
        match self {
            ImmuneState::Healthy => constants::IMMUNE_FLUX_PENALTY_HEALTHY,
            ImmuneState::Monitoring => constants::IMMUNE_FLUX_PENALTY_MONITORING,
            ImmuneState::Inflamed => constants::IMMUNE_FLUX_PENALTY_INFLAMED,
            ImmuneState::Quarantined => constants::IMMUNE_FLUX_PENALTY_QUARANTINED,
            ImmuneState::Expelled => constants::IMMUNE_FLUX_PENALTY_EXPELLED,
        }
    }
}

/// Gate-level decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Transform,
    Block,
}

/// Domain-facing outcome after BLOCK refinement. `Allow`/`Quarantine` mirror
/// `Decision::Allow`/`Transform` one-for-one; `Escalate`/`Deny` are the two
/// ways a `Block` can resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovernanceOutcome {
    Allow,
    Quarantine,
    Escalate,
    Deny,
}

/// Four write-gate angles, each in `[0, 2*pi)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TorusAngles {
    pub theta: f64,
    pub phi: f64,
    pub rho: f64,
    pub sigma: f64,
}

impl Default for TorusAngles {
    fn default() -> Self {
        Self {
            theta: 0.0,
            phi: 0.0,
            rho: 0.0,
            sigma: 0.0,
        }
    }
}

/// A memory write-event submitted alongside an action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MemoryEvent {
    pub content_hash: u64,
    pub domain: u32,
    pub sequence: u64,
    pub polarity: f64,
    pub authority: f64,
}

/// Dual-lattice acceptance/coherence state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatticeState {
    pub last_static_accepted: bool,
    pub dynamic_displacement: f64,
    pub coherence: f64,
    pub validated: bool,
}

impl Default for LatticeState {
    fn default() -> Self {
        Self {
            last_static_accepted: true,
            dynamic_displacement: 0.0,
            coherence: 1.0,
            validated: true,
        }
    }
}

/// Penalty / breathing engine state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PenaltyState {
    pub fail_count: u32,
    pub tau_delay: f64,
    pub last_penalty_at: Option<u64>,
    pub snap_count: u32,
}

impl Default for PenaltyState {
    fn default() -> Self {
        Self {
            fail_count: 0,
            tau_delay: 1.0,
            last_penalty_at: None,
            snap_count: 0,
        }
    }
}

/// The canonical per-agent state record, owned exclusively by K.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub agent_id: String,
    pub step: u64,
    pub hyp: [f64; BRAIN_DIMENSIONS],
    pub torus: TorusAngles,
    pub flux: f64,
    pub flux_state: FluxState,
    pub lattice: LatticeState,
    pub capabilities: Vec<String>,
    pub audit_anchor: String,
    pub penalties: PenaltyState,
    pub immune_state: ImmuneState,
}

impl AgentState {
    pub fn new(agent_id: impl Into<String>) -> Self {
        let flux_state = FluxState::from_flux(0.5);
        Self {
            agent_id: agent_id.into(),
            step: 0,
            hyp: [0.0; BRAIN_DIMENSIONS],
            torus: TorusAngles::default(),
            flux: 0.5,
            flux_state,
            lattice: LatticeState::default(),
            capabilities: flux_state.capabilities().iter().map(|s| s.to_string()).collect(),
            audit_anchor: governance_audit::GENESIS_HASH.to_string(),
            penalties: PenaltyState::default(),
            immune_state: ImmuneState::Healthy,
        }
    }
}

/// A single point along an agent's trajectory, used by the detection bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub step: u64,
    pub state: [f64; BRAIN_DIMENSIONS],
    pub embedded: [f64; BRAIN_DIMENSIONS],
    pub distance: f64,
    pub curvature: f64,
    pub timestamp: DateTime<Utc>,
}

/// Per-agent immune/suspicion bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImmuneRecord {
    pub suspicion: f64,
    pub flag_count: u64,
    pub accusers: HashSet<String>,
    pub quarantine_count: u32,
    pub suspicion_history: SuspicionHistory,
    pub last_state_change: u64,
}

impl ImmuneRecord {
    pub fn new() -> Self {
        Self {
            suspicion: 0.0,
            flag_count: 0,
            accusers: HashSet::new(),
            quarantine_count: 0,
            suspicion_history: SuspicionHistory::new(),
            last_state_change: 0,
        }
    }
}

impl Default for ImmuneRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// An optional bee-colony-tier accusation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dance {
    pub dancer: String,
    pub target: String,
    pub anomaly_dims: Vec<usize>,
    pub magnitude: f64,
    pub distance: f64,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub decay_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_wraps_at_capacity() {
        let mut rb: RingBuffer<f64, 3> = RingBuffer::new();
        rb.push(1.0);
        rb.push(2.0);
        rb.push(3.0);
        rb.push(4.0);

        assert_eq!(rb.len(), 3);
        assert_eq!(rb.iter().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn flux_state_buckets_correctly() {
        assert_eq!(FluxState::from_flux(0.95), FluxState::Polly);
        assert_eq!(FluxState::from_flux(0.6), FluxState::Quasi);
        assert_eq!(FluxState::from_flux(0.2), FluxState::Demi);
        assert_eq!(FluxState::from_flux(0.0), FluxState::Collapsed);
    }

    #[test]
    fn expelled_risk_modifier_is_infinite() {
        assert!(ImmuneState::Expelled.risk_modifier().is_infinite());
    }

    #[test]
    fn new_agent_state_has_genesis_audit_anchor() {
        let state = AgentState::new("agent-1");
        assert_eq!(state.audit_anchor, governance_audit::GENESIS_HASH);
        assert_eq!(state.step, 0);
    }
}
