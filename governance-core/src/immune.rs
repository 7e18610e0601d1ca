//! Immune model (C.3): a per-agent suspicion accumulator driving a
//! five-state machine, with a spatial-consensus gate on the quarantine
//! transition and a bee-colony-tier accusation contract.

use std::collections::HashSet;

use crate::constants::{
    self, IMMUNE_CONSENSUS_MIN, IMMUNE_DECAY, IMMUNE_EXPULSION_THRESHOLD,
    IMMUNE_INFLAMED_THRESHOLD, IMMUNE_MAX_QUARANTINE_COUNT, IMMUNE_MONITORING_THRESHOLD,
    IMMUNE_PER_FLAG_COST, IMMUNE_QUARANTINE_AMPLIFICATION, IMMUNE_QUARANTINE_THRESHOLD,
    IMMUNE_REPULSION_BASE, IMMUNE_REPULSION_CAP,
};
use crate::detection::Assessment;
use crate::state::ImmuneRecord;
pub use crate::state::ImmuneState;

/// Contract for an external source of accuser sets per target agent, as
/// surfaced by an optional bee-colony-tier sidecar. No concrete
/// implementation ships in the core; a sidecar can implement this to feed
/// spatial consensus.
pub trait AccusationSource {
    fn accusers_for(&self, target_agent: &str) -> HashSet<String>;
}

/// Result of running one assessment through the immune model.
#[derive(Debug, Clone, PartialEq)]
pub struct ImmuneUpdate {
    pub previous_state: ImmuneState,
    pub new_state: ImmuneState,
    pub suspicion: f64,
    pub risk_modifier: f64,
    pub repulsion_force: f64,
    pub transitioned: bool,
}

/// Update `record`/`state` in place from one detection `assessment`, and
/// (if the caller has accusers for this step) the current accuser set.
/// Returns the resulting state transition.
pub fn update(
    record: &mut ImmuneRecord,
    state: ImmuneState,
    assessment: &Assessment,
    accusers: &HashSet<String>,
) -> ImmuneUpdate {
    // Expelled is terminal: no assessment can move it.
    if state == ImmuneState::Expelled {
        return ImmuneUpdate {
            previous_state: state,
            new_state: state,
            suspicion: record.suspicion,
            risk_modifier: state.risk_modifier(),
            repulsion_force: repulsion_force(record.suspicion, state),
            transitioned: false,
        };
    }

    if assessment.any_flagged {
        let mut increment = assessment.flag_count as f64
            * IMMUNE_PER_FLAG_COST
            * (0.5 + 0.5 * assessment.combined_score);
        if state == ImmuneState::Quarantined {
            increment *= IMMUNE_QUARANTINE_AMPLIFICATION - 1.0;
        }
        record.suspicion += increment;
        record.flag_count += 1;
    } else {
        record.suspicion = (record.suspicion - IMMUNE_DECAY).max(0.0);
    }

    record.accusers = accusers.clone();
    record.suspicion_history.push(record.suspicion);

    let has_consensus = record.accusers.len() >= IMMUNE_CONSENSUS_MIN;
    let new_state = next_state(record, has_consensus);

    let transitioned = new_state != state;
    if transitioned && new_state == ImmuneState::Quarantined {
        record.quarantine_count += 1;
    }

    ImmuneUpdate {
        previous_state: state,
        new_state,
        suspicion: record.suspicion,
        risk_modifier: new_state.risk_modifier(),
        repulsion_force: repulsion_force(record.suspicion, new_state),
        transitioned,
    }
}

fn next_state(record: &ImmuneRecord, has_consensus: bool) -> ImmuneState {
    let suspicion = record.suspicion;

    if suspicion >= IMMUNE_EXPULSION_THRESHOLD
        || record.quarantine_count >= IMMUNE_MAX_QUARANTINE_COUNT
    {
        ImmuneState::Expelled
    } else if suspicion >= IMMUNE_QUARANTINE_THRESHOLD && has_consensus {
        ImmuneState::Quarantined
    } else if suspicion >= IMMUNE_QUARANTINE_THRESHOLD {
        ImmuneState::Inflamed
    } else if suspicion >= IMMUNE_INFLAMED_THRESHOLD {
        ImmuneState::Inflamed
    } else if suspicion >= IMMUNE_MONITORING_THRESHOLD {
        ImmuneState::Monitoring
    } else {
        ImmuneState::Healthy
    }
}

/// Repulsion force: `base * phi^suspicion`, amplified while quarantined,
/// capped at a large constant.
pub fn repulsion_force(suspicion: f64, state: ImmuneState) -> f64 {
    let mut force = IMMUNE_REPULSION_BASE * constants::phi().powf(suspicion);
    if state == ImmuneState::Quarantined {
        force *= IMMUNE_QUARANTINE_AMPLIFICATION;
    }
    force.min(IMMUNE_REPULSION_CAP)
}

/// Release an agent from quarantine: halves suspicion, clears accusers.
/// Does not itself re-run the state machine; the caller re-derives the
/// state from the halved suspicion on the next assessment.
pub fn release_from_quarantine(record: &mut ImmuneRecord) {
    record.suspicion *= 0.5;
    record.accusers.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flagged_assessment(flag_count: u32, combined_score: f64) -> Assessment {
        use crate::detection::DetectorResult;
        let result = |score: f64, flagged: bool| DetectorResult {
            score,
            flagged,
            evidence: String::new(),
        };
        Assessment {
            phase_distance: result(combined_score, flag_count > 0),
            curvature: result(0.0, false),
            lissajous: result(0.0, false),
            decimal_drift: result(0.0, false),
            six_tonic: result(0.0, false),
            combined_score,
            flag_count,
            any_flagged: flag_count > 0,
            decision: crate::state::GovernanceOutcome::Allow,
        }
    }

    #[test]
    fn unflagged_assessments_decay_toward_healthy() {
        let mut record = ImmuneRecord::new();
        record.suspicion = 0.5;
        let unflagged = flagged_assessment(0, 0.0);
        let accusers = HashSet::new();
        let update = update(&mut record, ImmuneState::Monitoring, &unflagged, &accusers);
        assert!(update.suspicion < 0.5);
    }

    #[test]
    fn repeated_flags_reach_monitoring_then_inflamed() {
        let mut record = ImmuneRecord::new();
        let mut state = ImmuneState::Healthy;
        let accusers = HashSet::new();
        for _ in 0..5 {
            let assessment = flagged_assessment(1, 0.6);
            let update = update(&mut record, state, &assessment, &accusers);
            state = update.new_state;
        }
        assert!(matches!(state, ImmuneState::Monitoring | ImmuneState::Inflamed));
    }

    #[test]
    fn quarantine_requires_consensus() {
        let mut record = ImmuneRecord::new();
        record.suspicion = 2.5;
        let assessment = flagged_assessment(1, 0.9);

        let few_accusers: HashSet<String> = ["a".to_string()].into_iter().collect();
        let update = update(&mut record, ImmuneState::Inflamed, &assessment, &few_accusers);
        assert_ne!(update.new_state, ImmuneState::Quarantined);

        let mut record2 = ImmuneRecord::new();
        record2.suspicion = 2.5;
        let many_accusers: HashSet<String> =
            ["a".to_string(), "b".to_string(), "c".to_string()].into_iter().collect();
        let update2 = update(&mut record2, ImmuneState::Inflamed, &assessment, &many_accusers);
        assert_eq!(update2.new_state, ImmuneState::Quarantined);
    }

    #[test]
    fn expulsion_is_terminal() {
        let mut record = ImmuneRecord::new();
        record.suspicion = 10.0;
        let assessment = flagged_assessment(0, 0.0);
        let accusers = HashSet::new();
        let update = update(&mut record, ImmuneState::Expelled, &assessment, &accusers);
        assert_eq!(update.new_state, ImmuneState::Expelled);
        assert!(!update.transitioned);
    }

    #[test]
    fn quarantine_count_past_max_forces_expulsion() {
        let mut record = ImmuneRecord::new();
        record.quarantine_count = IMMUNE_MAX_QUARANTINE_COUNT;
        record.suspicion = IMMUNE_QUARANTINE_THRESHOLD;
        let accusers: HashSet<String> =
            ["a".to_string(), "b".to_string(), "c".to_string()].into_iter().collect();
        let assessment = flagged_assessment(1, 0.9);
        let update = update(&mut record, ImmuneState::Inflamed, &assessment, &accusers);
        assert_eq!(update.new_state, ImmuneState::Expelled);
    }

    #[test]
    fn release_halves_suspicion_and_clears_accusers() {
        let mut record = ImmuneRecord::new();
        record.suspicion = 4.0;
        record.accusers.insert("a".to_string());
        release_from_quarantine(&mut record);
        assert_eq!(record.suspicion, 2.0);
        assert!(record.accusers.is_empty());
    }

    #[test]
    fn repulsion_force_grows_with_suspicion() {
        let low = repulsion_force(0.1, ImmuneState::Healthy);
        let high = repulsion_force(3.0, ImmuneState::Healthy);
        assert!(high > low);
    }

    #[test]
    fn quarantined_repulsion_is_amplified() {
        let base = repulsion_force(2.0, ImmuneState::Inflamed);
        let quarantined = repulsion_force(2.0, ImmuneState::Quarantined);
        assert!(quarantined > base);
    }
}
