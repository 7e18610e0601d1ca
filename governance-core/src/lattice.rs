//! Dual-lattice projector (F.6): a static 6D -> 3D cut-and-project
//! pass over the HYPER block with a fixed 5-fold-symmetric basis, plus a
//! dynamic phason-shift transform used to score structural coherence.
//!
//! The exact 6x3 projection coefficients are not pinned by the source beyond
//! "5-fold-symmetric trig of angles `2*pi*k/5` with phi elevation"; this
//! module fixes a concrete golden-ratio/5-fold basis (documented in
//! DESIGN.md) so the scores are internally consistent and reproducible.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::constants::{
    self, LATTICE_COHERENCE_THRESHOLD, LATTICE_COHERENCE_WEIGHTS, LATTICE_MAX_PHASON_AMPLITUDE,
    LATTICE_PHASON_COUPLING,
};

/// `A_parallel`, mapping the 6D HYPER block into the 3D physical subspace.
/// Row `k` (`k in 0..3`) holds the coefficient of each of the 6 input
/// dimensions for output dimension `k`.
fn parallel_matrix() -> [[f64; 6]; 3] {
    build_basis(false)
}

/// `A_perpendicular`, mapping the 6D HYPER block into the 3D perpendicular
/// (internal) subspace.
fn perp_matrix() -> [[f64; 6]; 3] {
    build_basis(true)
}

fn build_basis(perpendicular: bool) -> [[f64; 6]; 3] {
    let phi = constants::phi();
    let mut m = [[0.0; 6]; 3];
    for k in 0..5 {
        let theta = TAU * k as f64 / 5.0;
        let angle = if perpendicular { 2.0 * theta } else { theta };
        let elevation = if perpendicular { -1.0 / phi } else { 1.0 / phi };
        m[0][k] = angle.cos();
        m[1][k] = angle.sin();
        m[2][k] = elevation;
    }
    // Sixth basis vector: pure golden-ratio elevation, orthogonal to the
    // 5-fold ring ("phi elevation").
    m[0][5] = 0.0;
    m[1][5] = 0.0;
    m[2][5] = if perpendicular { -phi } else { phi };

    let norm = (2.0 / 5.0_f64).sqrt();
    for row in m.iter_mut() {
        for v in row.iter_mut() {
            *v *= norm;
        }
    }
    m
}

fn apply3x6(matrix: &[[f64; 6]; 3], v: &[f64; 6]) -> [f64; 3] {
    let mut out = [0.0; 3];
    for (row, out_i) in matrix.iter().zip(out.iter_mut()) {
        *out_i = row.iter().zip(v.iter()).map(|(a, b)| a * b).sum();
    }
    out
}

/// Lift a 3D output vector back to 6D via the Moore-Penrose pseudoinverse
/// `A^T (A A^T)^-1`. The inner `3x3` inversion uses a direct cofactor
/// (Cramer's rule) formula; a near-singular `A A^T` falls back to treating
/// the inverse as identity.
fn pseudo_inverse_lift(matrix: &[[f64; 6]; 3], p: &[f64; 3]) -> ([f64; 6], bool) {
    let gram = gram3(matrix);
    let (inv, singular) = invert3x3_cofactor(&gram);
    let q = mat3_vec3(&inv, p);
    let mut lifted = [0.0; 6];
    for j in 0..6 {
        lifted[j] = matrix[0][j] * q[0] + matrix[1][j] * q[1] + matrix[2][j] * q[2];
    }
    (lifted, singular)
}

fn gram3(matrix: &[[f64; 6]; 3]) -> [[f64; 3]; 3] {
    let mut g = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            g[i][j] = matrix[i].iter().zip(matrix[j].iter()).map(|(a, b)| a * b).sum();
        }
    }
    g
}

/// Direct cofactor inversion of a 3x3 matrix. Returns `(inverse, singular)`;
/// `singular` is `true` (and `inverse` is the identity) when `|det|` falls
/// below a numerical floor.
fn invert3x3_cofactor(m: &[[f64; 3]; 3]) -> ([[f64; 3]; 3], bool) {
    let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);

    if det.abs() < 1e-10 {
        return (
            [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            true,
        );
    }

    let inv_det = 1.0 / det;
    let cof = [
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ];
    (cof, false)
}

fn mat3_vec3(m: &[[f64; 3]; 3], v: &[f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

fn norm3(v: &[f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

fn distance3(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    norm3(&[a[0] - b[0], a[1] - b[1], a[2] - b[2]])
}

fn add6(a: &[f64; 6], b: &[f64; 6]) -> [f64; 6] {
    let mut out = [0.0; 6];
    for i in 0..6 {
        out[i] = a[i] + b[i];
    }
    out
}

/// A threat-driven phason (perpendicular-space shift).6.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Phason {
    pub direction: [f64; 3],
    pub magnitude: f64,
}

/// Build a threat phason: magnitude from the clipped threat level, direction
/// from the unit sum of anomaly-dimension perpendicular basis rows (falling
/// back to a golden-angle rotation, driven by `rotation_step`, when there are
/// no anomaly dims within the HYPER block).
pub fn build_threat_phason(threat: f64, anomaly_dims: &[usize], rotation_step: u64) -> Phason {
    let magnitude = threat.clamp(0.0, 1.0) * LATTICE_MAX_PHASON_AMPLITUDE * LATTICE_PHASON_COUPLING;
    let perp = perp_matrix();

    let relevant: Vec<usize> = anomaly_dims.iter().copied().filter(|&i| i < 6).collect();
    let direction = if relevant.is_empty() {
        let golden_angle = TAU / (constants::phi() * constants::phi());
        let theta = rotation_step as f64 * golden_angle;
        [theta.cos(), theta.sin(), 0.0]
    } else {
        let mut sum = [0.0; 3];
        for i in relevant {
            for k in 0..3 {
                sum[k] += perp[k][i];
            }
        }
        let n = norm3(&sum);
        if n < 1e-12 {
            [1.0, 0.0, 0.0]
        } else {
            [sum[0] / n, sum[1] / n, sum[2] / n]
        }
    };

    Phason { direction, magnitude }
}

/// Full result of one dual-lattice pass over a 6D HYPER point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatticeResult {
    pub accepted: bool,
    pub tile_thick: bool,
    pub displacement: f64,
    pub structure_preserved: bool,
    pub coherence: f64,
    pub validated: bool,
    pub pseudo_inverse_singular: bool,
}

/// Run the static acceptance test and the dynamic phason-shift transform.
pub fn project(hyper: &[f64; 6], phason: Phason) -> LatticeResult {
    let par = parallel_matrix();
    let perp = perp_matrix();

    let p_parallel = apply3x6(&par, hyper);
    let p_perp = apply3x6(&perp, hyper);

    let radius = constants::lattice_acceptance_radius();
    let perp_norm = norm3(&p_perp);
    let accepted = perp_norm <= radius;
    let tile_thick = perp_norm <= radius / constants::phi();

    let (lifted, singular) = pseudo_inverse_lift(&par, &p_parallel);

    let mut shift6 = [0.0; 6];
    for j in 0..6 {
        shift6[j] = perp[0][j] * phason.direction[0] * phason.magnitude
            + perp[1][j] * phason.direction[1] * phason.magnitude
            + perp[2][j] * phason.direction[2] * phason.magnitude;
    }
    let shifted = add6(&lifted, &shift6);

    let p_parallel_new = apply3x6(&par, &shifted);
    let displacement = distance3(&p_parallel, &p_parallel_new);
    let structure_preserved = phason.magnitude <= LATTICE_MAX_PHASON_AMPLITUDE;

    let displacement_score = 1.0 / (1.0 + 5.0 * displacement);
    let structure_score = if structure_preserved { 1.0 } else { 0.0 };
    let accepted_score = if accepted { 1.0 } else { 0.3 };
    let interference_score = (1.0 - perp_norm / (2.0 * radius)).clamp(0.0, 1.0);

    let (w_disp, w_struct, w_accept, w_interference) = LATTICE_COHERENCE_WEIGHTS;
    let coherence = w_disp * displacement_score
        + w_struct * structure_score
        + w_accept * accepted_score
        + w_interference * interference_score;

    let validated = accepted && structure_preserved && coherence >= LATTICE_COHERENCE_THRESHOLD;

    LatticeResult {
        accepted,
        tile_thick,
        displacement,
        structure_preserved,
        coherence,
        validated,
        pseudo_inverse_singular: singular,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_is_accepted_with_zero_displacement() {
        let hyper = [0.0; 6];
        let phason = Phason { direction: [1.0, 0.0, 0.0], magnitude: 0.0 };
        let result = project(&hyper, phason);
        assert!(result.accepted);
        assert!(result.displacement.abs() < 1e-9);
        assert!(result.validated);
    }

    #[test]
    fn large_perpendicular_component_is_rejected() {
        let hyper = [5.0, -5.0, 5.0, -5.0, 5.0, -5.0];
        let phason = Phason { direction: [0.0, 0.0, 1.0], magnitude: 0.0 };
        let result = project(&hyper, phason);
        assert!(!result.accepted);
    }

    #[test]
    fn phason_shift_beyond_max_amplitude_breaks_structure() {
        let hyper = [0.1; 6];
        let phason = Phason { direction: [1.0, 0.0, 0.0], magnitude: 10.0 };
        let result = project(&hyper, phason);
        assert!(!result.structure_preserved);
        assert!(!result.validated);
    }

    #[test]
    fn threat_phason_scales_with_threat_level() {
        let low = build_threat_phason(0.1, &[0, 1], 0);
        let high = build_threat_phason(0.9, &[0, 1], 0);
        assert!(high.magnitude > low.magnitude);
    }

    #[test]
    fn empty_anomaly_dims_rotate_by_golden_angle() {
        let p0 = build_threat_phason(0.5, &[], 0);
        let p1 = build_threat_phason(0.5, &[], 1);
        assert_ne!(p0.direction, p1.direction);
    }

    #[test]
    fn near_singular_gram_falls_back_to_identity() {
        let (_, singular) = invert3x3_cofactor(&[[0.0; 3]; 3]);
        assert!(singular);
    }
}
