//! # Governance Core
//!
//! Manifold, detection, immune, flux, key-chain, lattice, torus and canonical
//! state primitives composed by [`kernel::Kernel`] into a deterministic
//! per-agent `process_action` pipeline, plus the BFT quorum helper and
//! swarm-formation utilities external coordinators consume.

pub mod constants;
pub mod detection;
pub mod error;
pub mod flux;
pub mod immune;
pub mod keychain;
pub mod kernel;
pub mod lattice;
pub mod manifold;
pub mod quorum;
pub mod state;
pub mod swarm;
pub mod torus;

pub use error::{GovernanceError, Result};
pub use kernel::{
    ActionInput, ActionOutcome, ActionType, Kernel, KernelConfig, Metrics, StepRecord,
};
pub use state::{
    AgentState, Decision, FluxState, GovernanceOutcome, ImmuneState, MemoryEvent, PenaltyState,
    TorusAngles,
};
