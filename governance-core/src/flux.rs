//! Flux controller (D.4): a per-agent continuous value `nu in [0,1]`
//! evolved by an explicit Euler step, bucketed into a capability tier.

use crate::constants::{
    self, FLUX_DT, FLUX_KAPPA, FLUX_SIGMA, FLUX_TRUST_BOOST, FLUX_TRUST_BOOST_THRESHOLD,
};
use crate::state::{FluxState, ImmuneState};

/// Result of one flux evolution step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluxUpdate {
    pub flux: f64,
    pub flux_state: FluxState,
    pub accessible_polyhedra: usize,
    pub effective_dimensionality: f64,
}

/// Evolve `nu` by one Euler step:
/// `dnu = kappa*(trust - nu) + sigma*sin(omega*t) - immune_penalty + trust_boost*1[trust>0.8]`
/// `nu <- clamp(nu + dnu*dt, 0, 1)`
pub fn evolve(nu: f64, trust: f64, immune_state: ImmuneState, local_step: u64) -> FluxUpdate {
    let omega = constants::flux_omega();
    let t = local_step as f64;

    let trust_boost = if trust > FLUX_TRUST_BOOST_THRESHOLD {
        FLUX_TRUST_BOOST
    } else {
        0.0
    };

    let d_nu = FLUX_KAPPA * (trust - nu) + FLUX_SIGMA * (omega * t).sin()
        - immune_state.flux_penalty()
        + trust_boost;

    let new_nu = (nu + d_nu * FLUX_DT).clamp(0.0, 1.0);
    let flux_state = FluxState::from_flux(new_nu);

    finish(new_nu, flux_state)
}

/// Contract the flux value after a torus snap: applied *after*
/// evolution has already run, so the contraction persists into the next step.
pub fn contract_for_snap(nu: f64) -> FluxUpdate {
    let new_nu = (nu - constants::FLUX_CONTRACTION_PER_SNAP).max(0.0);
    let flux_state = FluxState::from_flux(new_nu);
    finish(new_nu, flux_state)
}

fn finish(nu: f64, flux_state: FluxState) -> FluxUpdate {
    let accessible = constants::POLYHEDRA
        .iter()
        .filter(|p| nu >= p.min_flux)
        .count();

    FluxUpdate {
        flux: nu,
        flux_state,
        accessible_polyhedra: accessible,
        effective_dimensionality: accessible as f64 / constants::POLYHEDRA.len() as f64,
    }
}
