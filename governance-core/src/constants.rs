//! Fixed constants shared by every module. These are the
//! cross-implementation contract: two kernels built from this same
//! constant set, fed the same ordered calls, must converge on the same
//! decisions.

/// Dimensionality of the canonical state vector.
pub const BRAIN_DIMENSIONS: usize = 21;

/// `HYPER` named block: base context / trust axes, also the Langues space.
pub const HYPER_RANGE: std::ops::Range<usize> = 0..6;
/// `PHASE` named block: phase angles.
pub const PHASE_RANGE: std::ops::Range<usize> = 6..12;
/// `HAM` named block: Hamiltonian momenta.
pub const HAM_RANGE: std::ops::Range<usize> = 12..16;
/// `LATTICE` named block: lattice path indices.
pub const LATTICE_RANGE: std::ops::Range<usize> = 16..18;
/// `FLUX` named block: breathing / flux scalar, a single index.
pub const FLUX_INDEX: usize = 18;
/// `SPEC` named block: participation ratio and spectral entropy.
pub const SPEC_RANGE: std::ops::Range<usize> = 19..21;

/// Golden ratio, `(1 + sqrt(5)) / 2`.
pub fn phi() -> f64 {
    (1.0 + 5.0_f64.sqrt()) / 2.0
}

/// General-purpose small epsilon for near-zero guards.
pub const BRAIN_EPSILON: f64 = 1e-10;
/// Poincaré ball boundary epsilon; no embedded point may reach norm 1.
pub const EPSILON_BOUNDARY: f64 = 1e-8;
/// Maximum allowed norm for any point embedded in the ball.
pub const POINCARE_MAX_NORM: f64 = 1.0 - EPSILON_BOUNDARY;

// --- Flux tiers --------------------------------------------------------

pub const FLUX_POLLY_MIN: f64 = 0.8;
pub const FLUX_QUASI_MIN: f64 = 0.5;
pub const FLUX_DEMI_MIN: f64 = 0.1;

pub const CAPS_POLLY: &[&str] = &["read", "write", "execute", "deploy", "admin", "create"];
pub const CAPS_QUASI: &[&str] = &["read", "write", "execute", "create"];
pub const CAPS_DEMI: &[&str] = &["read", "write"];
pub const CAPS_COLLAPSED: &[&str] = &["read"];

/// Flux controller: mean-reversion rate.
pub const FLUX_KAPPA: f64 = 0.1;
/// Flux controller: oscillation amplitude.
pub const FLUX_SIGMA: f64 = 0.05;
/// Flux controller: oscillation angular frequency, tuned to the 16-step
/// Hamiltonian path period.
pub fn flux_omega() -> f64 {
    std::f64::consts::TAU / 16.0
}
/// Flux controller: Euler step size.
pub const FLUX_DT: f64 = 1.0;
/// Flux controller: trust level above which a fixed boost is added.
pub const FLUX_TRUST_BOOST_THRESHOLD: f64 = 0.8;
pub const FLUX_TRUST_BOOST: f64 = 0.1;
/// Flux lost per torus snap, applied after evolution.
pub const FLUX_CONTRACTION_PER_SNAP: f64 = 0.15;

/// Immune-state flux penalties, in state-machine order.
pub const IMMUNE_FLUX_PENALTY_HEALTHY: f64 = 0.0;
pub const IMMUNE_FLUX_PENALTY_MONITORING: f64 = 0.05;
pub const IMMUNE_FLUX_PENALTY_INFLAMED: f64 = 0.15;
pub const IMMUNE_FLUX_PENALTY_QUARANTINED: f64 = 0.40;
pub const IMMUNE_FLUX_PENALTY_EXPELLED: f64 = 1.0;

// --- Immune model ---------------------------------------------

pub const IMMUNE_MONITORING_THRESHOLD: f64 = 0.3;
pub const IMMUNE_INFLAMED_THRESHOLD: f64 = 1.0;
pub const IMMUNE_QUARANTINE_THRESHOLD: f64 = 2.0;
pub const IMMUNE_EXPULSION_THRESHOLD: f64 = 5.0;
pub const IMMUNE_CONSENSUS_MIN: usize = 3;
pub const IMMUNE_MAX_QUARANTINE_COUNT: u32 = 3;
pub const IMMUNE_PER_FLAG_COST: f64 = 0.2;
pub const IMMUNE_DECAY: f64 = 0.1;
pub const IMMUNE_QUARANTINE_AMPLIFICATION: f64 = 2.0;
pub const IMMUNE_REPULSION_BASE: f64 = 1.0;
pub const IMMUNE_REPULSION_CAP: f64 = 1.0e6;
/// Capacity of the suspicion ring history.
pub const IMMUNE_HISTORY_CAPACITY: usize = 64;

/// Risk modifiers surfaced to K, in state-machine order. `expelled` is
/// represented as `f64::INFINITY`.
pub const IMMUNE_RISK_MODIFIER_HEALTHY: f64 = 1.0;
pub const IMMUNE_RISK_MODIFIER_MONITORING: f64 = 1.2;
pub const IMMUNE_RISK_MODIFIER_INFLAMED: f64 = 1.5;

// --- Detection bank ---------------------------------------------

pub const DETECTOR_WEIGHT_PHASE_DISTANCE: f64 = 0.25;
pub const DETECTOR_WEIGHT_CURVATURE: f64 = 0.20;
pub const DETECTOR_WEIGHT_LISSAJOUS: f64 = 0.20;
pub const DETECTOR_WEIGHT_DECIMAL_DRIFT: f64 = 0.15;
pub const DETECTOR_WEIGHT_SIX_TONIC: f64 = 0.20;

pub const DETECTOR_FLAG_THRESHOLD: f64 = 0.5;

/// Shared with `kernel::refine_decision`: the BLOCK-refinement thresholds
/// (see DESIGN.md "Open Questions — Decisions").
pub const RISK_QUARANTINE_THRESHOLD: f64 = 0.3;
pub const RISK_ESCALATE_THRESHOLD: f64 = 0.6;
pub const RISK_DENY_THRESHOLD: f64 = 0.85;

// --- Key chain & geodesic monitor ---------------------------------------------

pub const HKDF_SALT: &[u8] = governance_verification::HKDF_SALT;
pub const HKDF_INFO: &[u8] = governance_verification::HKDF_INFO;

pub const EPSILON_SNAP: f64 = 0.2;
pub const EPSILON_CURVATURE: f64 = 0.5;
pub const MAX_INTRUSIONS: u32 = 5;
pub const INTRUSION_RATE_THRESHOLD: f64 = 0.3;
pub const RHYTHM_WINDOW: usize = 16;

pub const LANGUES_COST_LOW: f64 = 1.0;
pub const LANGUES_COST_HIGH: f64 = 5.0;
pub const LANGUES_BETA_BASE: f64 = 1.0;

/// The 16 canonical polyhedra, in fixed Hamiltonian-path order.
pub struct PolyhedronSpec {
    pub name: &'static str,
    pub category: &'static str,
    pub min_flux: f64,
    pub cognitive_function: &'static str,
}

pub const POLYHEDRA: [PolyhedronSpec; 16] = [
    PolyhedronSpec { name: "Tetrahedron", category: "core", min_flux: 0.00, cognitive_function: "grounding" },
    PolyhedronSpec { name: "Cube", category: "core", min_flux: 0.05, cognitive_function: "structure" },
    PolyhedronSpec { name: "Octahedron", category: "core", min_flux: 0.10, cognitive_function: "balance" },
    PolyhedronSpec { name: "Dodecahedron", category: "cortex", min_flux: 0.20, cognitive_function: "synthesis" },
    PolyhedronSpec { name: "Icosahedron", category: "cortex", min_flux: 0.30, cognitive_function: "pattern-recognition" },
    PolyhedronSpec { name: "Truncated Icosahedron", category: "cortex", min_flux: 0.38, cognitive_function: "planning" },
    PolyhedronSpec { name: "Rhombicuboctahedron", category: "cortex", min_flux: 0.45, cognitive_function: "analogy" },
    PolyhedronSpec { name: "Snub Dodecahedron", category: "subconscious", min_flux: 0.52, cognitive_function: "intuition" },
    PolyhedronSpec { name: "Small Stellated Dodecahedron", category: "subconscious", min_flux: 0.58, cognitive_function: "association" },
    PolyhedronSpec { name: "Great Stellated Dodecahedron", category: "subconscious", min_flux: 0.65, cognitive_function: "consolidation" },
    PolyhedronSpec { name: "Szilassi", category: "subconscious", min_flux: 0.70, cognitive_function: "anomaly-surfacing" },
    PolyhedronSpec { name: "Csaszar", category: "cerebellum", min_flux: 0.75, cognitive_function: "coordination" },
    PolyhedronSpec { name: "Pentagonal Bipyramid", category: "cerebellum", min_flux: 0.80, cognitive_function: "timing" },
    PolyhedronSpec { name: "Triangular Cupola", category: "cerebellum", min_flux: 0.85, cognitive_function: "calibration" },
    PolyhedronSpec { name: "Rhombic Dodecahedron", category: "connectome", min_flux: 0.92, cognitive_function: "integration" },
    PolyhedronSpec { name: "Bilinski Dodecahedron", category: "connectome", min_flux: 0.97, cognitive_function: "unification" },
];

// --- Dual lattice & torus gate ---------------------------------------------

pub fn lattice_acceptance_radius() -> f64 {
    1.0 / phi()
}
pub const LATTICE_MAX_PHASON_AMPLITUDE: f64 = 0.3;
pub const LATTICE_PHASON_COUPLING: f64 = 1.0;
pub const LATTICE_COHERENCE_THRESHOLD: f64 = 0.6;
/// Weights for (displacement score, structure preserved, static accepted, moderated interference).
pub const LATTICE_COHERENCE_WEIGHTS: (f64, f64, f64, f64) = (0.35, 0.25, 0.25, 0.15);

pub const TORUS_SNAP_THRESHOLD: f64 = 0.7;

/// Divergence weights on (theta, rho, sigma, phi).6. The source
/// text's 0.35/0.30/0.20/0.15 split caps divergence at 0.65 whenever domain
/// (theta) is held fixed, making a same-domain contradiction structurally
/// unable to snap (see DESIGN.md "Open Questions — Decisions"). Rebalanced
/// here so a fixed-domain contradiction can still cross the snap threshold
/// through rho/sigma/phi alone, while keeping theta the dominant single term
/// and the weights summing to 1.0.
pub const TORUS_WEIGHT_THETA: f64 = 0.25;
pub const TORUS_WEIGHT_RHO: f64 = 0.35;
pub const TORUS_WEIGHT_SIGMA: f64 = 0.25;
pub const TORUS_WEIGHT_PHI: f64 = 0.15;

// --- Kernel gate ---------------------------------------------

pub const GATE_BLOCK_THRESHOLD: f64 = 0.8;
pub const GATE_TRANSFORM_THRESHOLD: f64 = 0.5;

/// Hard-block thresholds, checked before the soft gate ever runs.
pub const HARD_BLOCK_ESCALATION_RISK: f64 = 0.3;
pub const HARD_BLOCK_DENY_RISK: f64 = 0.4;
pub const HARD_BLOCK_INTRUSION_COUNT: u32 = 5;
pub const HARD_BLOCK_INTRUSION_RISK: f64 = 0.15;
pub const HARD_BLOCK_COLLAPSED_RISK: f64 = 0.3;
pub const HARD_BLOCK_UNVALIDATED_RISK: f64 = 0.6;

// --- Penalty / breathing engine ---------------------------------------------

pub const PENALTY_STUTTER_MULTIPLIER: f64 = 1.5;
pub const PENALTY_MAX_STUTTER: f64 = 10.0;
pub const PENALTY_BLOCK_MULTIPLIER: f64 = 1.2;
pub const PENALTY_RECOVERY_MULTIPLIER: f64 = 0.85;
