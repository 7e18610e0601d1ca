//! Kernel & 9-step pipeline (K.7): owns every agent's canonical
//! state and composes the manifold, detection, immune, flux, key chain,
//! lattice, torus and audit subsystems into one deterministic
//! `process_action` call.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use governance_audit::{AuditLayer, AuditLogHandle};

use crate::constants::{
    self, BRAIN_DIMENSIONS, GATE_BLOCK_THRESHOLD, GATE_TRANSFORM_THRESHOLD,
    HARD_BLOCK_COLLAPSED_RISK, HARD_BLOCK_DENY_RISK, HARD_BLOCK_ESCALATION_RISK,
    HARD_BLOCK_INTRUSION_COUNT, HARD_BLOCK_INTRUSION_RISK, HARD_BLOCK_UNVALIDATED_RISK,
    PENALTY_BLOCK_MULTIPLIER, PENALTY_MAX_STUTTER, PENALTY_RECOVERY_MULTIPLIER,
    PENALTY_STUTTER_MULTIPLIER, RISK_DENY_THRESHOLD, RISK_ESCALATE_THRESHOLD,
    TORUS_SNAP_THRESHOLD,
};
use crate::detection::{self, Assessment};
use crate::error::{GovernanceError, Result};
use crate::flux;
use crate::immune;
use crate::keychain::{self, KeychainState, LanguesDecision, LanguesVector, MonitorResult};
use crate::lattice::{self, LatticeResult};
use crate::manifold;
use crate::state::{
    AgentState, Decision, FluxState, GovernanceOutcome, ImmuneRecord, ImmuneState, MemoryEvent,
    PenaltyState, TorusAngles, TrajectoryPoint,
};
use crate::torus;

/// Overridable thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelConfig {
    pub block_threshold: f64,
    pub transform_threshold: f64,
    pub stutter_multiplier: f64,
    pub max_stutter: f64,
    pub flux_contraction_per_snap: f64,
    pub snap_divergence_threshold: f64,
    /// Bounded trajectory window the detection bank scores over.
    pub trajectory_window: usize,
    pub audit_max_entries: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            block_threshold: GATE_BLOCK_THRESHOLD,
            transform_threshold: GATE_TRANSFORM_THRESHOLD,
            stutter_multiplier: PENALTY_STUTTER_MULTIPLIER,
            max_stutter: PENALTY_MAX_STUTTER,
            flux_contraction_per_snap: constants::FLUX_CONTRACTION_PER_SNAP,
            snap_divergence_threshold: TORUS_SNAP_THRESHOLD,
            trajectory_window: 64,
            audit_max_entries: 100_000,
        }
    }
}

/// Open-ended action kind: navigate, click, type, scroll, execute_script,
/// and anything else round-trips through `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Navigate,
    Click,
    Type,
    Scroll,
    ExecuteScript,
    Other(String),
}

/// Per-action input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionInput {
    pub action_type: ActionType,
    pub state_vector: [f64; BRAIN_DIMENSIONS],
    pub memory_event: Option<MemoryEvent>,
}

/// The step-2 metrics bundle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Metrics {
    pub combined_risk: f64,
    pub hyperbolic_distance: f64,
    pub phase_deviation: f64,
    pub spectral_coherence: f64,
    pub drift_magnitude: f64,
    /// Boundary-clamp warning: the raw vector's norm
    /// reached `POINCARE_MAX_NORM` and the embedding was rescaled.
    pub rescaled: bool,
    pub monitor: MonitorResult,
}

/// Per-action output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub decision: Decision,
    pub governance_outcome: GovernanceOutcome,
    pub metrics: Metrics,
    pub lattice_result: LatticeResult,
    pub torus_result: Option<torus::TorusGateResult>,
    pub penalty_applied: bool,
    pub audit_hash: String,
    pub state: AgentState,
}

#[derive(Debug, Clone)]
struct AgentRecord {
    state: AgentState,
    immune: ImmuneRecord,
    chain: KeychainState,
    trajectory: VecDeque<TrajectoryPoint>,
    expected_tongue: usize,
}

/// The fields the convergence property fingerprints: everything
/// that must agree between two kernel instances fed the same ordered calls,
/// excluding wall-clock audit hashes.
#[derive(Serialize)]
struct DeterminismFingerprint<'a> {
    agent_id: &'a str,
    step: u64,
    flux: f64,
    flux_state: FluxState,
    immune_state: ImmuneState,
    fail_count: u32,
    snap_count: u32,
    lattice_coherence: f64,
    lattice_validated: bool,
}

/// One entry in the ordered, cross-agent broadcast log. Carries only the
/// determinism fingerprint, never a wall-clock hash, so replaying it is
/// reproducible.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub agent_id: String,
    pub step: u64,
    pub fingerprint: String,
}

/// Owns every agent's canonical state and the shared audit log. One
/// `Kernel` per process;, calls for a single agent must not be
/// interleaved (the `&mut self` borrow on [`process_action`] enforces this
/// for a single-threaded caller — a concurrent front end wraps it in a
/// mutex, as `governance-gateway` does).
pub struct Kernel {
    config: KernelConfig,
    audit: AuditLogHandle,
    agents: HashMap<String, AgentRecord>,
    ordered_log: Vec<StepRecord>,
}

impl Kernel {
    pub fn new(config: KernelConfig) -> Self {
        let audit = AuditLogHandle::new(config.audit_max_entries);
        Self {
            config,
            audit,
            agents: HashMap::new(),
            ordered_log: Vec::new(),
        }
    }

    pub fn with_audit_handle(config: KernelConfig, audit: AuditLogHandle) -> Self {
        Self {
            config,
            audit,
            agents: HashMap::new(),
            ordered_log: Vec::new(),
        }
    }

    pub fn audit_handle(&self) -> AuditLogHandle {
        self.audit.clone()
    }

    pub fn ordered_log(&self) -> &[StepRecord] {
        &self.ordered_log
    }

    /// Register a new agent with a derived/raw 32-byte master key.
    /// Re-registering an existing agent resets its state.
    pub fn register_agent(&mut self, agent_id: impl Into<String>, seed_key: [u8; 32]) {
        self.register_agent_with_tongue(agent_id, seed_key, 0)
    }

    pub fn register_agent_with_tongue(
        &mut self,
        agent_id: impl Into<String>,
        seed_key: [u8; 32],
        expected_tongue: usize,
    ) {
        let agent_id = agent_id.into();
        let record = AgentRecord {
            state: AgentState::new(agent_id.clone()),
            immune: ImmuneRecord::new(),
            chain: KeychainState::new(seed_key),
            trajectory: VecDeque::with_capacity(self.config.trajectory_window),
            expected_tongue,
        };
        self.agents.insert(agent_id, record);
    }

    pub fn agent_state(&self, agent_id: &str) -> Option<&AgentState> {
        self.agents.get(agent_id).map(|r| &r.state)
    }

    /// Fingerprint of everything the convergence property binds.
    pub fn state_fingerprint(&self, agent_id: &str) -> Result<String> {
        let record = self
            .agents
            .get(agent_id)
            .ok_or_else(|| GovernanceError::UnknownAgent(agent_id.to_string()))?;
        let fp = DeterminismFingerprint {
            agent_id,
            step: record.state.step,
            flux: record.state.flux,
            flux_state: record.state.flux_state,
            immune_state: record.state.immune_state,
            fail_count: record.state.penalties.fail_count,
            snap_count: record.state.penalties.snap_count,
            lattice_coherence: record.state.lattice.coherence,
            lattice_validated: record.state.lattice.validated,
        };
        governance_verification::fingerprint(&fp).map_err(GovernanceError::from)
    }

    /// Run one action through the full 9-step pipeline.
    #[tracing::instrument(skip(self, action, accusers), fields(agent_id = %agent_id))]
    pub fn process_action(
        &mut self,
        agent_id: &str,
        action: ActionInput,
        accusers: &HashSet<String>,
    ) -> Result<ActionOutcome> {
        for (index, x) in action.state_vector.iter().enumerate() {
            if !x.is_finite() {
                return Err(GovernanceError::NonFinite { index });
            }
        }
        if let Some(event) = &action.memory_event {
            if event.domain >= BRAIN_DIMENSIONS as u32 {
                return Err(GovernanceError::InvalidDomain { domain: event.domain });
            }
        }

        let record = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| GovernanceError::UnknownAgent(agent_id.to_string()))?;

        let step = record.state.step;

        // --- 2. Score ------------------------------------------------------
        let raw_norm = manifold::norm(&action.state_vector);
        let embedded_vec = manifold::safe_poincare_embed(&action.state_vector);
        // `safe_poincare_embed` only clamps when the *embedded* norm would
        // exceed the ball boundary (manifold.rs), which for the exponential
        // map `tanh(r/2) * v/r` requires a raw norm far out past the knee of
        // `tanh` — not merely `raw_norm >= POINCARE_MAX_NORM`. Read the clamp
        // back off the embedded vector itself rather than guessing from the
        // pre-embedding norm.
        let rescaled = manifold::norm(&embedded_vec) >= constants::POINCARE_MAX_NORM;
        let mut embedded = [0.0_f64; BRAIN_DIMENSIONS];
        embedded.copy_from_slice(&embedded_vec);

        let origin = [0.0_f64; BRAIN_DIMENSIONS];
        let hyperbolic_distance = manifold::hyperbolic_distance(&embedded, &origin);

        let phase_deviation = raw_norm.clamp(0.0, 1.0);
        let spectral_coherence = 1.0 - phase_deviation;
        let drift_magnitude = raw_norm;

        let combined_risk = (0.3 * hyperbolic_distance / 20.0
            + 0.3 * phase_deviation
            + 0.2 * (1.0 - spectral_coherence)
            + 0.2 * drift_magnitude)
            .min(1.0);

        record.trajectory.push_back(TrajectoryPoint {
            step,
            state: action.state_vector,
            embedded,
            distance: hyperbolic_distance,
            curvature: 0.0,
            timestamp: Utc::now(),
        });
        while record.trajectory.len() > record_trajectory_window(&self.config) {
            record.trajectory.pop_front();
        }
        let trajectory_slice: Vec<TrajectoryPoint> = record.trajectory.iter().cloned().collect();
        let assessment: Assessment = detection::assess(&trajectory_slice, record.expected_tongue);

        let immune_update = immune::update(
            &mut record.immune,
            record.state.immune_state,
            &assessment,
            accusers,
        );
        record.state.immune_state = immune_update.new_state;

        // E: key chain & geodesic monitor, at the normalised position within
        // the current 16-step Hamiltonian cycle. The geodesic is only
        // defined on tau in [0,1]; the raw step counter is unbounded, so
        // it is folded onto the cycle it indexes into — see DESIGN.md.
        let tau = (step % constants::POLYHEDRA.len() as u64) as f64
            / constants::POLYHEDRA.len() as f64;
        let langues = LanguesVector::from_state(&embedded);
        let monitor = keychain::monitor(&mut record.chain, &langues, tau)?;

        let metrics = Metrics {
            combined_risk,
            hyperbolic_distance,
            phase_deviation,
            spectral_coherence,
            drift_magnitude,
            rescaled,
            monitor,
        };

        // --- 3. Transform ----------------------------------------------------
        let anomaly_dims: Vec<usize> = action
            .state_vector
            .iter()
            .enumerate()
            .filter(|(_, x)| x.abs() > 0.7)
            .map(|(i, _)| i)
            .collect();
        let phason = lattice::build_threat_phason(combined_risk, &anomaly_dims, step);
        let mut hyper6 = [0.0_f64; 6];
        hyper6.copy_from_slice(&embedded[constants::HYPER_RANGE]);
        let lattice_result = lattice::project(&hyper6, phason);

        // --- 4. Decide (the gate) -------------------------------------------
        let hard_block = (monitor.escalation && combined_risk > HARD_BLOCK_ESCALATION_RISK)
            || (monitor.langues_decision == LanguesDecision::Deny
                && combined_risk > HARD_BLOCK_DENY_RISK)
            || (record.chain.intrusion_count >= HARD_BLOCK_INTRUSION_COUNT
                && combined_risk > HARD_BLOCK_INTRUSION_RISK)
            || record.state.immune_state == ImmuneState::Expelled
            || (record.state.flux_state == FluxState::Collapsed
                && combined_risk > HARD_BLOCK_COLLAPSED_RISK)
            || (!lattice_result.validated && combined_risk > HARD_BLOCK_UNVALIDATED_RISK);

        let decision = if hard_block {
            Decision::Block
        } else {
            let effective_risk = 0.4 * combined_risk
                + 0.2 * (1.0 - lattice_result.coherence)
                + 0.2 * if record.state.penalties.tau_delay > 2.0 { 1.0 } else { 0.0 }
                + 0.2 * if record.state.immune_state == ImmuneState::Quarantined { 1.0 } else { 0.0 };

            if effective_risk >= self.config.block_threshold {
                Decision::Block
            } else if effective_risk >= self.config.transform_threshold {
                Decision::Transform
            } else {
                Decision::Allow
            }
        };
        let governance_outcome = refine_decision(decision, combined_risk);

        // --- 6. Memory write --------------------------------------------------
        let mut torus_result = None;
        let mut did_snap = false;
        if matches!(decision, Decision::Allow | Decision::Transform) {
            if let Some(event) = &action.memory_event {
                let proposal = torus::propose(&record.state.torus, event);
                did_snap = proposal.snap;
                if !proposal.snap {
                    record.state.torus = proposal.candidate;
                }
                torus_result = Some(proposal);
            }
        }

        // --- 7. Penalty & breathing --------------------------------------------
        let mut penalty_applied = false;
        if did_snap {
            record.state.penalties.snap_count += 1;
            record.state.penalties.tau_delay =
                (record.state.penalties.tau_delay * self.config.stutter_multiplier)
                    .min(self.config.max_stutter);
            penalty_applied = true;
        }
        if decision == Decision::Block {
            record.state.penalties.fail_count += 1;
            record.state.penalties.tau_delay =
                (record.state.penalties.tau_delay * PENALTY_BLOCK_MULTIPLIER)
                    .min(self.config.max_stutter);
            record.state.penalties.last_penalty_at = Some(step);
            penalty_applied = true;
        }
        if !penalty_applied {
            record.state.penalties.tau_delay =
                (record.state.penalties.tau_delay * PENALTY_RECOVERY_MULTIPLIER).max(1.0);
        }

        let flux_update = flux::evolve(
            record.state.flux,
            monitor.induced_trust,
            record.state.immune_state,
            step,
        );
        let flux_update = if did_snap {
            flux::contract_for_snap(flux_update.flux)
        } else {
            flux_update
        };
        record.state.flux = flux_update.flux;
        record.state.flux_state = flux_update.flux_state;
        record.state.capabilities = flux_update
            .flux_state
            .capabilities()
            .iter()
            .map(|s| s.to_string())
            .collect();

        record.state.hyp = embedded;
        record.state.lattice.last_static_accepted = lattice_result.accepted;
        record.state.lattice.dynamic_displacement = lattice_result.displacement;
        record.state.lattice.coherence = lattice_result.coherence;
        record.state.lattice.validated = lattice_result.validated;
        record.state.step = step + 1;

        // --- 8. Audit -----------------------------------------------------------
        let boundary_distance = (1.0 - manifold::norm(&embedded)).max(0.0);
        let audit_hash = self.audit.append(
            AuditLayer::Gate,
            "process_action",
            combined_risk,
            boundary_distance,
            json!({
                "agent_id": agent_id,
                "step": step,
                "decision": decision,
                "governance_outcome": governance_outcome,
                "immune_state": record.state.immune_state,
                "flux_state": record.state.flux_state,
                "snap": did_snap,
            }),
        )?;
        record.state.audit_anchor = audit_hash.clone();

        // --- 9. Broadcast ---------------------------------------------------------
        let fingerprint = self.state_fingerprint(agent_id)?;
        self.ordered_log.push(StepRecord {
            agent_id: agent_id.to_string(),
            step,
            fingerprint,
        });

        let state = self.agents.get(agent_id).expect("just processed").state.clone();

        tracing::info!(
            agent_id,
            step,
            decision = ?decision,
            governance_outcome = ?governance_outcome,
            "processed action"
        );

        Ok(ActionOutcome {
            decision,
            governance_outcome,
            metrics,
            lattice_result,
            torus_result,
            penalty_applied,
            audit_hash,
            state,
        })
    }
}

fn record_trajectory_window(config: &KernelConfig) -> usize {
    config.trajectory_window.max(1)
}

/// Refine a gate [`Decision`] into the domain-facing [`GovernanceOutcome`]
///: `Allow`/`Transform` map
/// one-for-one onto `Allow`/`Quarantine`; `Block` resolves into
/// `Quarantine`/`Escalate`/`Deny` using `combined_risk` against the
/// detection bank's own thresholds.
pub fn refine_decision(decision: Decision, combined_risk: f64) -> GovernanceOutcome {
    match decision {
        Decision::Allow => GovernanceOutcome::Allow,
        Decision::Transform => GovernanceOutcome::Quarantine,
        Decision::Block => {
            if combined_risk >= RISK_DENY_THRESHOLD {
                GovernanceOutcome::Deny
            } else if combined_risk >= RISK_ESCALATE_THRESHOLD {
                GovernanceOutcome::Escalate
            } else {
                GovernanceOutcome::Quarantine
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_action(step: u64) -> ActionInput {
        let mut v = [0.0_f64; BRAIN_DIMENSIONS];
        for i in 0..5 {
            v[i] = 0.95 + 0.2 * ((step as f64 * 0.1 + i as f64).sin());
        }
        ActionInput {
            action_type: ActionType::Navigate,
            state_vector: v,
            memory_event: None,
        }
    }

    #[test]
    fn smooth_honest_agent_stays_allowed() {
        let mut kernel = Kernel::new(KernelConfig::default());
        kernel.register_agent("agent-1", [0u8; 32]);
        let accusers = HashSet::new();

        let mut last_outcome = None;
        for step in 0..100 {
            let outcome = kernel
                .process_action("agent-1", sine_action(step), &accusers)
                .unwrap();
            last_outcome = Some(outcome);
        }

        let outcome = last_outcome.unwrap();
        assert_eq!(outcome.decision, Decision::Allow);
        assert_eq!(outcome.state.immune_state, ImmuneState::Healthy);
    }

    #[test]
    fn boundary_pushing_vector_rescales_and_transforms_or_worse() {
        let mut kernel = Kernel::new(KernelConfig::default());
        kernel.register_agent("agent-2", [1u8; 32]);
        let accusers = HashSet::new();

        // The exponential map `tanh(r/2) * v/r` only actually clamps to
        // `POINCARE_MAX_NORM` once `tanh(r/2)` itself saturates past the
        // boundary, which needs a raw norm out past ~19, not merely past 1.
        let raw_norm = 25.0;
        let mut v = [0.0_f64; BRAIN_DIMENSIONS];
        let per_dim = raw_norm / (BRAIN_DIMENSIONS as f64).sqrt();
        for x in v.iter_mut() {
            *x = per_dim;
        }
        let action = ActionInput {
            action_type: ActionType::Navigate,
            state_vector: v,
            memory_event: None,
        };

        let outcome = kernel.process_action("agent-2", action, &accusers).unwrap();
        assert!(outcome.metrics.rescaled);
        assert!((outcome.metrics.drift_magnitude - raw_norm).abs() < 1e-6);
        assert_ne!(outcome.decision, Decision::Allow);
    }

    #[test]
    fn moderately_large_vector_is_not_reported_as_rescaled() {
        let mut kernel = Kernel::new(KernelConfig::default());
        kernel.register_agent("agent-2b", [1u8; 32]);
        let accusers = HashSet::new();

        // raw_norm = 1.5 pushes past POINCARE_MAX_NORM itself but is nowhere
        // near the raw norm needed for `safe_poincare_embed` to actually
        // clamp (~19+, see above) — `rescaled` must track the real clamp,
        // not the raw pre-embedding norm.
        let mut v = [0.0_f64; BRAIN_DIMENSIONS];
        let per_dim = 1.5 / (BRAIN_DIMENSIONS as f64).sqrt();
        for x in v.iter_mut() {
            *x = per_dim;
        }
        let action = ActionInput {
            action_type: ActionType::Navigate,
            state_vector: v,
            memory_event: None,
        };

        let outcome = kernel.process_action("agent-2b", action, &accusers).unwrap();
        assert!(!outcome.metrics.rescaled);
    }

    #[test]
    fn unknown_agent_is_rejected() {
        let mut kernel = Kernel::new(KernelConfig::default());
        let accusers = HashSet::new();
        let result = kernel.process_action("ghost", sine_action(0), &accusers);
        assert!(matches!(result, Err(GovernanceError::UnknownAgent(_))));
    }

    #[test]
    fn non_finite_state_is_rejected_without_mutation() {
        let mut kernel = Kernel::new(KernelConfig::default());
        kernel.register_agent("agent-3", [2u8; 32]);
        let accusers = HashSet::new();

        let mut v = [0.0_f64; BRAIN_DIMENSIONS];
        v[4] = f64::NAN;
        let action = ActionInput {
            action_type: ActionType::Navigate,
            state_vector: v,
            memory_event: None,
        };

        let result = kernel.process_action("agent-3", action, &accusers);
        assert!(matches!(result, Err(GovernanceError::NonFinite { index: 4 })));
        assert_eq!(kernel.agent_state("agent-3").unwrap().step, 0);
    }

    #[test]
    fn hard_block_dominates_even_with_low_effective_risk() {
        let mut kernel = Kernel::new(KernelConfig::default());
        kernel.register_agent("agent-4", [3u8; 32]);
        if let Some(record) = kernel.agents.get_mut("agent-4") {
            record.state.immune_state = ImmuneState::Expelled;
        }
        let accusers = HashSet::new();

        let outcome = kernel
            .process_action("agent-4", sine_action(0), &accusers)
            .unwrap();
        assert_eq!(outcome.decision, Decision::Block);
    }

    #[test]
    fn refine_decision_maps_allow_and_transform_one_for_one() {
        assert_eq!(refine_decision(Decision::Allow, 0.0), GovernanceOutcome::Allow);
        assert_eq!(
            refine_decision(Decision::Transform, 0.2),
            GovernanceOutcome::Quarantine
        );
    }

    #[test]
    fn refine_decision_splits_block_by_combined_risk() {
        assert_eq!(
            refine_decision(Decision::Block, 0.9),
            GovernanceOutcome::Deny
        );
        assert_eq!(
            refine_decision(Decision::Block, 0.65),
            GovernanceOutcome::Escalate
        );
        assert_eq!(
            refine_decision(Decision::Block, 0.1),
            GovernanceOutcome::Quarantine
        );
    }
}
