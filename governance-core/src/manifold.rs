//! Manifold primitives: safe Poincaré embedding, hyperbolic distance,
//! golden-ratio importance weighting. All functions here are total — there
//! is no failure mode.

use crate::constants::{phi, BRAIN_EPSILON, POINCARE_MAX_NORM};

/// Euclidean norm of a slice.
pub fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Map `v` into the open unit ball via the exponential map from the origin:
/// `tanh(r/2) * v/r`, returning the zero vector when `r` is too small to
/// normalize safely. Result is rescaled to at most [`POINCARE_MAX_NORM`].
pub fn safe_poincare_embed(v: &[f64]) -> Vec<f64> {
    let r = norm(v);
    if r < BRAIN_EPSILON {
        return vec![0.0; v.len()];
    }

    let scale = (r / 2.0).tanh() / r;
    let mut embedded: Vec<f64> = v.iter().map(|x| x * scale).collect();

    let embedded_norm = norm(&embedded);
    if embedded_norm > POINCARE_MAX_NORM {
        let rescale = POINCARE_MAX_NORM / embedded_norm;
        for x in embedded.iter_mut() {
            *x *= rescale;
        }
    }

    embedded
}

/// `arcosh(1 + 2*||u-v||^2 / ((1-||u||^2)(1-||v||^2)))`, with the denominator
/// floor-clamped and the arcosh argument floor-clamped to 1 so the result
/// never goes complex or overflows near the ball boundary.
pub fn hyperbolic_distance(u: &[f64], v: &[f64]) -> f64 {
    debug_assert_eq!(u.len(), v.len());

    let diff_sq: f64 = u.iter().zip(v.iter()).map(|(a, b)| (a - b).powi(2)).sum();
    let norm_u_sq = u.iter().map(|x| x * x).sum::<f64>();
    let norm_v_sq = v.iter().map(|x| x * x).sum::<f64>();

    let denom = ((1.0 - norm_u_sq) * (1.0 - norm_v_sq)).max(BRAIN_EPSILON);
    let arg = (1.0 + 2.0 * diff_sq / denom).max(1.0);

    arg.acosh()
}

/// Multiply component `i` by `phi^i`. Importance scoring only — never used
/// for embedding, since the exponential weights would saturate the ball.
pub fn apply_golden_weighting(v: &[f64]) -> Vec<f64> {
    let phi = phi();
    v.iter()
        .enumerate()
        .map(|(i, x)| x * phi.powi(i as i32))
        .collect()
}

/// Resolution-rescaling factor for a local dimension estimate `d` (e.g. a
/// Menger-curvature reading) between two sampling resolutions related by
/// ratio `R`: `harmonic_scale(d, R) = R^d`. Total for `R > 0`; the duality
/// `harmonic_scale(d, R) * harmonic_scale(d, 1/R) == 1` holds for every `d`.
pub fn harmonic_scale(d: f64, resolution_ratio: f64) -> f64 {
    resolution_ratio.powf(d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_zero_vector_stays_zero() {
        let v = vec![0.0; 21];
        let embedded = safe_poincare_embed(&v);
        assert!(norm(&embedded) < BRAIN_EPSILON);
    }

    #[test]
    fn embed_result_never_exceeds_boundary() {
        let v = vec![100.0; 21];
        let embedded = safe_poincare_embed(&v);
        assert!(norm(&embedded) <= POINCARE_MAX_NORM + 1e-12);
    }

    #[test]
    fn embed_preserves_direction() {
        let v = vec![3.0, 4.0, 0.0];
        let embedded = safe_poincare_embed(&v);
        let ratio_a = embedded[0] / v[0];
        let ratio_b = embedded[1] / v[1];
        assert!((ratio_a - ratio_b).abs() < 1e-9);
    }

    #[test]
    fn distance_to_self_is_zero() {
        let v = vec![0.1, 0.2, 0.05];
        let d = hyperbolic_distance(&v, &v);
        assert!(d.abs() < 1e-9);
    }

    #[test]
    fn distance_is_symmetric() {
        let u = vec![0.1, 0.0, 0.0];
        let v = vec![0.0, 0.2, 0.0];
        assert!((hyperbolic_distance(&u, &v) - hyperbolic_distance(&v, &u)).abs() < 1e-12);
    }

    #[test]
    fn distance_grows_with_separation() {
        let origin = vec![0.0, 0.0];
        let near = vec![0.1, 0.0];
        let far = vec![0.5, 0.0];
        assert!(hyperbolic_distance(&origin, &far) > hyperbolic_distance(&origin, &near));
    }

    #[test]
    fn golden_weighting_scales_each_component() {
        let v = vec![1.0, 1.0, 1.0];
        let weighted = apply_golden_weighting(&v);
        assert!((weighted[0] - 1.0).abs() < 1e-12);
        assert!(weighted[1] > weighted[0]);
        assert!(weighted[2] > weighted[1]);
    }

    #[test]
    fn harmonic_scale_duality_holds() {
        for &d in &[0.0, 0.5, 1.0, 2.3] {
            for &r in &[0.25, 1.0, 2.0, 7.5] {
                let product = harmonic_scale(d, r) * harmonic_scale(d, 1.0 / r);
                assert!((product - 1.0).abs() < 1e-9);
            }
        }
    }
}
