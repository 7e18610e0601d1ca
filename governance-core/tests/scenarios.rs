//! End-to-end pipeline scenarios, run through the public `Kernel` API only.

use std::collections::HashSet;

use governance_core::kernel::{ActionInput, ActionType, Kernel, KernelConfig};
use governance_core::quorum::{tally, Vote};
use governance_core::state::{Decision, FluxState, ImmuneState, MemoryEvent};

const N: usize = governance_core::constants::BRAIN_DIMENSIONS;

fn sine_action(step: u64) -> ActionInput {
    let mut v = [0.0_f64; N];
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
fn smooth_honest_agent_stays_allowed_for_100_steps() {
    let mut kernel = Kernel::new(KernelConfig::default());
    kernel.register_agent("agent-honest", [0u8; 32]);
    let accusers = HashSet::new();

    let mut last = None;
    for step in 0..100u64 {
        let outcome = kernel
            .process_action("agent-honest", sine_action(step), &accusers)
            .expect("smooth trajectory must be accepted");
        assert_eq!(outcome.decision, Decision::Allow);
        last = Some(outcome);
    }

    let outcome = last.unwrap();
    assert_eq!(outcome.state.flux_state, FluxState::Polly);
    assert_eq!(outcome.state.immune_state, ImmuneState::Healthy);
}

#[test]
fn boundary_pushing_vector_rescales_and_is_not_allowed() {
    let mut kernel = Kernel::new(KernelConfig::default());
    kernel.register_agent("agent-boundary", [1u8; 32]);
    let accusers = HashSet::new();

    // `safe_poincare_embed`'s clamp only engages once `tanh(raw_norm / 2)`
    // itself saturates past the ball boundary, which needs a raw norm out
    // past ~19 — a raw norm of 1.5 does not trigger it.
    let raw_norm = 25.0;
    let mut v = [0.0_f64; N];
    let per_dim = raw_norm / (N as f64).sqrt();
    for x in v.iter_mut() {
        *x = per_dim;
    }
    let action = ActionInput {
        action_type: ActionType::Navigate,
        state_vector: v,
        memory_event: None,
    };

    let outcome = kernel
        .process_action("agent-boundary", action, &accusers)
        .unwrap();

    assert!(outcome.metrics.rescaled);
    assert!((outcome.metrics.drift_magnitude - raw_norm).abs() < 1e-6);
    assert_ne!(outcome.decision, Decision::Allow);
}

#[test]
fn phase_error_injection_raises_suspicion_above_monitoring_threshold() {
    let mut kernel = Kernel::new(KernelConfig::default());
    kernel.register_agent_with_tongue("agent-phase", [2u8; 32], 0);
    let accusers = HashSet::new();

    // Expected tongue 0 puts the expected phase angle at 0; holding the
    // whole PHASE block at pi is the angle directly opposite it.
    let mut v = [0.0_f64; N];
    for i in governance_core::constants::PHASE_RANGE {
        v[i] = std::f64::consts::PI;
    }
    let action = ActionInput {
        action_type: ActionType::Navigate,
        state_vector: v,
        memory_event: None,
    };

    let mut last_state = None;
    for _ in 0..50u64 {
        let outcome = kernel
            .process_action("agent-phase", action.clone(), &accusers)
            .unwrap();
        last_state = Some(outcome.state);
    }

    let state = last_state.unwrap();
    assert_ne!(state.immune_state, ImmuneState::Healthy);
}

#[test]
fn torus_contradiction_snaps_and_grows_stutter_delay() {
    let mut kernel = Kernel::new(KernelConfig::default());
    kernel.register_agent("agent-torus", [3u8; 32]);
    let accusers = HashSet::new();

    let mild = [0.02_f64; N];

    let first_event = MemoryEvent {
        content_hash: 1,
        domain: 5,
        sequence: 0,
        polarity: -1.0,
        authority: 0.0,
    };
    let first = kernel
        .process_action(
            "agent-torus",
            ActionInput {
                action_type: ActionType::Navigate,
                state_vector: mild,
                memory_event: Some(first_event),
            },
            &accusers,
        )
        .unwrap();
    let tau_before = first.state.penalties.tau_delay;

    let second_event = MemoryEvent {
        content_hash: 2,
        domain: 5,
        sequence: 500,
        polarity: 1.0,
        authority: 0.5,
    };
    let second = kernel
        .process_action(
            "agent-torus",
            ActionInput {
                action_type: ActionType::Navigate,
                state_vector: mild,
                memory_event: Some(second_event),
            },
            &accusers,
        )
        .unwrap();

    let torus_result = second.torus_result.expect("same-domain event must be proposed");
    assert!(torus_result.snap);
    assert!(torus_result.divergence > 0.7);
    assert!(second.penalty_applied);
    assert!(second.state.penalties.tau_delay > tau_before);
}

#[test]
fn sustained_flagging_forces_expulsion_which_is_terminal() {
    let mut kernel = Kernel::new(KernelConfig::default());
    kernel.register_agent("agent-rogue", [4u8; 32]);
    let accusers = HashSet::new();

    let mut v = [0.0_f64; N];
    for i in governance_core::constants::PHASE_RANGE {
        v[i] = std::f64::consts::PI;
    }
    let action = ActionInput {
        action_type: ActionType::Navigate,
        state_vector: v,
        memory_event: None,
    };

    let mut reached_expulsion = false;
    for _ in 0..300u64 {
        let outcome = kernel
            .process_action("agent-rogue", action.clone(), &accusers)
            .unwrap();
        if outcome.state.immune_state == ImmuneState::Expelled {
            reached_expulsion = true;
            break;
        }
    }
    assert!(reached_expulsion, "sustained flagging never reached expulsion");

    // Expulsion is terminal: any later call, regardless of the action's own
    // risk, is hard-blocked and the state never leaves Expelled.
    let calm = ActionInput {
        action_type: ActionType::Navigate,
        state_vector: [0.0_f64; N],
        memory_event: None,
    };
    let after = kernel
        .process_action("agent-rogue", calm, &accusers)
        .unwrap();
    assert_eq!(after.state.immune_state, ImmuneState::Expelled);
    assert_eq!(after.decision, Decision::Block);
}

#[test]
fn quorum_split_vote_does_not_reach_with_one_fault() {
    let votes = [Vote::Approve, Vote::Reject, Vote::Reject, Vote::Abstain];
    let result = tally(&votes, 1);
    assert!(!result.reached);
    assert_eq!(result.outcome, None);
}
