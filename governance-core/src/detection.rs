//! Detection bank (B.2): five independent anomaly scorers over a
//! trajectory of embedded points, combined into one assessment.
//!
//! Floating-point evaluation order is fixed throughout: sums run
//! oldest-to-newest over the trajectory slice, with no reordering for
//! vectorization.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DETECTOR_FLAG_THRESHOLD, DETECTOR_WEIGHT_CURVATURE, DETECTOR_WEIGHT_DECIMAL_DRIFT,
    DETECTOR_WEIGHT_LISSAJOUS, DETECTOR_WEIGHT_PHASE_DISTANCE, DETECTOR_WEIGHT_SIX_TONIC,
    PHASE_RANGE, RISK_DENY_THRESHOLD, RISK_ESCALATE_THRESHOLD, RISK_QUARANTINE_THRESHOLD,
};
use crate::manifold::norm;
use crate::state::{GovernanceOutcome, TrajectoryPoint};

/// Output of a single detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorResult {
    pub score: f64,
    pub flagged: bool,
    pub evidence: String,
}

impl DetectorResult {
    fn new(score: f64, evidence: impl Into<String>) -> Self {
        let score = score.clamp(0.0, 1.0);
        Self {
            flagged: score > DETECTOR_FLAG_THRESHOLD,
            score,
            evidence: evidence.into(),
        }
    }

    fn empty(evidence: &str) -> Self {
        Self {
            score: 0.0,
            flagged: false,
            evidence: evidence.to_string(),
        }
    }
}

/// Combined output of all five detectors for one trajectory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub phase_distance: DetectorResult,
    pub curvature: DetectorResult,
    pub lissajous: DetectorResult,
    pub decimal_drift: DetectorResult,
    pub six_tonic: DetectorResult,
    pub combined_score: f64,
    pub flag_count: u32,
    pub any_flagged: bool,
    pub decision: GovernanceOutcome,
}

/// 1. Phase + distance: mean embedded distance from the origin combined with
/// deviation of the PHASE block mean from the expected tongue angle.
fn phase_distance(trajectory: &[TrajectoryPoint], expected_tongue: usize) -> DetectorResult {
    if trajectory.is_empty() {
        return DetectorResult::empty("empty trajectory");
    }

    let mean_distance =
        trajectory.iter().map(|p| p.distance).sum::<f64>() / trajectory.len() as f64;

    let expected_angle = expected_tongue as f64 * PI / 3.0;
    let mean_phase_deviation = trajectory
        .iter()
        .map(|p| {
            let phase_mean =
                p.state[PHASE_RANGE].iter().sum::<f64>() / PHASE_RANGE.len() as f64;
            angular_distance(phase_mean, expected_angle)
        })
        .sum::<f64>()
        / trajectory.len() as f64;

    let normalized_deviation = (mean_phase_deviation / PI).clamp(0.0, 1.0);
    let score = 1.0 - ((1.0 - mean_distance.clamp(0.0, 1.0)) * (1.0 - normalized_deviation));

    DetectorResult::new(
        score,
        format!(
            "mean_distance={mean_distance:.4} phase_deviation={mean_phase_deviation:.4}"
        ),
    )
}

fn angular_distance(a: f64, b: f64) -> f64 {
    let two_pi = 2.0 * PI;
    let diff = (a - b).rem_euclid(two_pi);
    diff.min(two_pi - diff)
}

/// 2. Curvature accumulation: Menger curvature of consecutive interior
/// triples, projected to the first three embedded dimensions.
fn curvature(trajectory: &[TrajectoryPoint]) -> DetectorResult {
    if trajectory.len() < 3 {
        return DetectorResult::empty("trajectory too short for curvature");
    }

    let mut total = 0.0;
    let mut n = 0usize;

    for window in trajectory.windows(3) {
        let a = &window[0].embedded[0..3];
        let b = &window[1].embedded[0..3];
        let c = &window[2].embedded[0..3];

        let ab = sub3(b, a);
        let bc = sub3(c, b);
        let ac = sub3(c, a);

        let cross = cross3(&ab, &bc);
        let area = norm(&cross) / 2.0;

        let len_ab = norm(&ab);
        let len_bc = norm(&bc);
        let len_ac = norm(&ac);
        let denom = (len_ab * len_bc * len_ac).max(1e-12);

        total += 4.0 * area / denom;
        n += 1;
    }

    let mean_curvature = total / n.max(1) as f64;
    DetectorResult::new(mean_curvature, format!("mean_curvature={mean_curvature:.4}"))
}

fn sub3(a: &[f64], b: &[f64]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn cross3(a: &[f64], b: &[f64]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// 3. Threat-plane Lissajous: project (behaviour, intent) over time to 2D
/// and count self-intersections of the resulting polyline.
fn lissajous(trajectory: &[TrajectoryPoint]) -> DetectorResult {
    if trajectory.len() < 4 {
        return DetectorResult::empty("trajectory too short for lissajous");
    }

    let points: Vec<(f64, f64)> = trajectory
        .iter()
        .map(|p| (p.state[0], p.state[1]))
        .collect();

    let mut intersections = 0u32;
    let segment_count = points.len() - 1;

    for i in 0..segment_count {
        for j in (i + 2)..segment_count {
            if i == 0 && j == segment_count - 1 {
                continue;
            }
            if segments_intersect(points[i], points[i + 1], points[j], points[j + 1]) {
                intersections += 1;
            }
        }
    }

    let max_possible = (segment_count * segment_count.saturating_sub(2) / 2).max(1);
    let score = intersections as f64 / max_possible as f64;

    DetectorResult::new(score, format!("self_intersections={intersections}"))
}

fn segments_intersect(p1: (f64, f64), p2: (f64, f64), p3: (f64, f64), p4: (f64, f64)) -> bool {
    let d1 = cross2(sub2(p4, p3), sub2(p1, p3));
    let d2 = cross2(sub2(p4, p3), sub2(p2, p3));
    let d3 = cross2(sub2(p2, p1), sub2(p3, p1));
    let d4 = cross2(sub2(p2, p1), sub2(p4, p1));

    ((d1 > 0.0) != (d2 > 0.0)) && ((d3 > 0.0) != (d4 > 0.0))
}

fn sub2(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    (a.0 - b.0, a.1 - b.1)
}

fn cross2(a: (f64, f64), b: (f64, f64)) -> f64 {
    a.0 * b.1 - a.1 * b.0
}

/// 4. Decimal drift magnitude: how uniformly the fractional part of each
/// state component is distributed across the trajectory. Too little
/// variance (near-exact round values) suggests a synthesized state vector
/// that bypassed the upstream evaluator pipeline.
fn decimal_drift(trajectory: &[TrajectoryPoint]) -> DetectorResult {
    if trajectory.is_empty() {
        return DetectorResult::empty("empty trajectory");
    }

    let fractions: Vec<f64> = trajectory
        .iter()
        .flat_map(|p| p.state.iter().map(|x| (x * 1e6).fract().abs()))
        .collect();

    let mean = fractions.iter().sum::<f64>() / fractions.len() as f64;
    let variance =
        fractions.iter().map(|f| (f - mean).powi(2)).sum::<f64>() / fractions.len() as f64;

    // Expected variance for a uniform [0,1) fractional distribution is 1/12.
    const EXPECTED_VARIANCE: f64 = 1.0 / 12.0;
    let drift = (EXPECTED_VARIANCE - variance).abs() / EXPECTED_VARIANCE;

    DetectorResult::new(drift, format!("fraction_variance={variance:.6}"))
}

/// 5. Six-tonic oscillation: a real-valued O(n^2) DFT of the PHASE-block
/// mean angle time series, checking for a dominant frequency at bin
/// `len/6` (the expected six-tonic period).
fn six_tonic(trajectory: &[TrajectoryPoint]) -> DetectorResult {
    let n = trajectory.len();
    if n < 6 {
        return DetectorResult::empty("trajectory too short for spectral analysis");
    }

    let signal: Vec<f64> = trajectory
        .iter()
        .map(|p| p.state[PHASE_RANGE].iter().sum::<f64>() / PHASE_RANGE.len() as f64)
        .collect();

    let spectrum = real_dft_magnitude(&signal);
    let expected_bin = (n / 6).max(1).min(spectrum.len().saturating_sub(1));

    let (dominant_bin, dominant_energy) = spectrum
        .iter()
        .enumerate()
        .skip(1)
        .fold((0usize, 0.0_f64), |acc, (i, &e)| if e > acc.1 { (i, e) } else { acc });

    let total_energy: f64 = spectrum.iter().skip(1).sum::<f64>().max(1e-12);

    let static_signal = dominant_energy / total_energy < 0.05;
    let displaced = dominant_bin != expected_bin && dominant_energy / total_energy > 0.3;

    let half = n / 2;
    let replay = half >= 6 && {
        let first_half = real_dft_magnitude(&signal[..half]);
        let second_half = real_dft_magnitude(&signal[half..]);
        dominant_bin_index(&first_half) == dominant_bin_index(&second_half)
            && dominant_bin_index(&first_half) > 0
    };

    let score = if static_signal {
        0.9
    } else if displaced {
        0.7
    } else if replay {
        0.6
    } else {
        (1.0 - total_energy.min(1.0) / total_energy).abs().min(0.2)
    };

    DetectorResult::new(
        score,
        format!(
            "dominant_bin={dominant_bin} expected_bin={expected_bin} static={static_signal} displaced={displaced} replay={replay}"
        ),
    )
}

fn dominant_bin_index(spectrum: &[f64]) -> usize {
    spectrum
        .iter()
        .enumerate()
        .skip(1)
        .fold((0usize, 0.0_f64), |acc, (i, &e)| if e > acc.1 { (i, e) } else { acc })
        .0
}

/// Magnitude spectrum of a real-valued signal via a direct (non-FFT) DFT.
/// Trajectories are capped at a bounded window, so O(n^2) is adequate and
/// keeps evaluation order fully specified.
fn real_dft_magnitude(signal: &[f64]) -> Vec<f64> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }

    let mut magnitudes = Vec::with_capacity(n / 2 + 1);
    for k in 0..=(n / 2) {
        let mut re = 0.0;
        let mut im = 0.0;
        for (t, &x) in signal.iter().enumerate() {
            let angle = -2.0 * PI * k as f64 * t as f64 / n as f64;
            re += x * angle.cos();
            im += x * angle.sin();
        }
        magnitudes.push((re * re + im * im).sqrt());
    }
    magnitudes
}

/// Run all five detectors and combine them into an [`Assessment`].
pub fn assess(trajectory: &[TrajectoryPoint], expected_tongue: usize) -> Assessment {
    let phase_distance_result = phase_distance(trajectory, expected_tongue);
    let curvature_result = curvature(trajectory);
    let lissajous_result = lissajous(trajectory);
    let decimal_drift_result = decimal_drift(trajectory);
    let six_tonic_result = six_tonic(trajectory);

    let combined_score = DETECTOR_WEIGHT_PHASE_DISTANCE * phase_distance_result.score
        + DETECTOR_WEIGHT_CURVATURE * curvature_result.score
        + DETECTOR_WEIGHT_LISSAJOUS * lissajous_result.score
        + DETECTOR_WEIGHT_DECIMAL_DRIFT * decimal_drift_result.score
        + DETECTOR_WEIGHT_SIX_TONIC * six_tonic_result.score;

    let flag_count = [
        &phase_distance_result,
        &curvature_result,
        &lissajous_result,
        &decimal_drift_result,
        &six_tonic_result,
    ]
    .iter()
    .filter(|r| r.flagged)
    .count() as u32;

    let decision = if combined_score >= RISK_DENY_THRESHOLD {
        GovernanceOutcome::Deny
    } else if combined_score >= RISK_ESCALATE_THRESHOLD {
        GovernanceOutcome::Escalate
    } else if combined_score >= RISK_QUARANTINE_THRESHOLD && flag_count > 0 {
        GovernanceOutcome::Quarantine
    } else {
        GovernanceOutcome::Allow
    };

    Assessment {
        phase_distance: phase_distance_result,
        curvature: curvature_result,
        lissajous: lissajous_result,
        decimal_drift: decimal_drift_result,
        six_tonic: six_tonic_result,
        combined_score,
        flag_count,
        any_flagged: flag_count >= 1,
        decision,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::BRAIN_DIMENSIONS;
    use chrono::Utc;

    fn point(step: u64, phase_value: f64) -> TrajectoryPoint {
        let mut state = [0.01_f64; BRAIN_DIMENSIONS];
        for idx in PHASE_RANGE {
            state[idx] = phase_value;
        }
        TrajectoryPoint {
            step,
            state,
            embedded: state,
            distance: 0.05,
            curvature: 0.0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn empty_trajectory_is_never_flagged() {
        let assessment = assess(&[], 0);
        assert_eq!(assessment.flag_count, 0);
        assert!(!assessment.any_flagged);
        assert_eq!(assessment.decision, GovernanceOutcome::Allow);
    }

    #[test]
    fn smooth_low_amplitude_trajectory_stays_unflagged() {
        let trajectory: Vec<TrajectoryPoint> = (0..20)
            .map(|i| point(i, (i as f64 * 0.01).sin() * 0.05))
            .collect();
        let assessment = assess(&trajectory, 0);
        assert!(assessment.combined_score < RISK_QUARANTINE_THRESHOLD);
    }

    #[test]
    fn opposite_phase_injection_raises_phase_distance_score() {
        let opposite = PI;
        let trajectory: Vec<TrajectoryPoint> = (0..20).map(|i| point(i, opposite)).collect();
        let result = phase_distance(&trajectory, 0);
        assert!(result.score > 0.3);
    }

    #[test]
    fn curvature_of_collinear_points_is_zero() {
        let trajectory: Vec<TrajectoryPoint> = (0..5)
            .map(|i| {
                let mut state = [0.0_f64; BRAIN_DIMENSIONS];
                state[0] = i as f64;
                TrajectoryPoint {
                    step: i,
                    state,
                    embedded: state,
                    distance: 0.0,
                    curvature: 0.0,
                    timestamp: Utc::now(),
                }
            })
            .collect();
        let result = curvature(&trajectory);
        assert!(result.score < 1e-6);
    }
}
