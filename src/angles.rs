//! Quaternion ⇄ Euler conversion and relative rotation between samples.
//!
//! Everything here is a pure function over value types. Non-unit or
//! non-finite input is not rejected; NaN propagates per IEEE-754.

use std::f64::consts::FRAC_PI_2;

use crate::types::{Euler, OrientationData, Quaternion};

/// Hamilton product `a ⊗ b`. Not normalized.
pub fn quaternion_multiply(a: Quaternion, b: Quaternion) -> Quaternion {
    Quaternion {
        x: a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
        y: a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
        z: a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
        w: a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
    }
}

/// `(-x, -y, -z, w)`, the inverse rotation for a unit quaternion.
pub fn quaternion_conjugate(q: Quaternion) -> Quaternion {
    Quaternion {
        x: -q.x,
        y: -q.y,
        z: -q.z,
        w: q.w,
    }
}

/// Decompose into Euler angles (degrees) in the recording sensor's frame.
///
/// The standard roll/pitch/yaw triple is computed first, with pitch clamped
/// to ±90° once `|sin(pitch)| >= 1`. The result is then relabelled for the
/// sensor: `yaw = -pitch`, `pitch = roll`, `roll = -yaw`. Downstream
/// consumers depend on this exact mapping.
pub fn quaternion_to_euler(q: Quaternion) -> Euler {
    let Quaternion { x, y, z, w } = q;

    let sinr_cosp = 2.0 * (w * x + y * z);
    let cosr_cosp = 1.0 - 2.0 * (x * x + y * y);
    let roll = sinr_cosp.atan2(cosr_cosp).to_degrees();

    let sinp = 2.0 * (w * y - z * x);
    let pitch = if sinp.abs() >= 1.0 {
        // Gimbal lock: asin would return NaN just past ±1
        (sinp.signum() * FRAC_PI_2).to_degrees()
    } else {
        sinp.asin().to_degrees()
    };

    let siny_cosp = 2.0 * (w * z + x * y);
    let cosy_cosp = 1.0 - 2.0 * (y * y + z * z);
    let yaw = siny_cosp.atan2(cosy_cosp).to_degrees();

    Euler {
        yaw: -pitch,
        pitch: roll,
        roll: -yaw,
    }
}

/// Rotation taking `last` to `current`: `conjugate(last) ⊗ current`.
pub fn local_rotation_delta(current: Quaternion, last: Quaternion) -> Quaternion {
    quaternion_multiply(quaternion_conjugate(last), current)
}

/// Euler angles for every sample, in order
pub fn euler_track(samples: &[OrientationData]) -> Vec<Euler> {
    samples
        .iter()
        .map(|sample| quaternion_to_euler(sample.quaternion))
        .collect()
}

/// Per-step relative rotation for each consecutive pair of samples.
///
/// Returns `samples.len() - 1` deltas (none for fewer than two samples).
pub fn rotation_deltas(samples: &[OrientationData]) -> Vec<Quaternion> {
    samples
        .windows(2)
        .map(|pair| local_rotation_delta(pair[1].quaternion, pair[0].quaternion))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_1_SQRT_2;

    fn assert_quat_eq(a: Quaternion, b: Quaternion, eps: f64) {
        assert_abs_diff_eq!(a.x, b.x, epsilon = eps);
        assert_abs_diff_eq!(a.y, b.y, epsilon = eps);
        assert_abs_diff_eq!(a.z, b.z, epsilon = eps);
        assert_abs_diff_eq!(a.w, b.w, epsilon = eps);
    }

    fn about_x_90() -> Quaternion {
        Quaternion::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2)
    }

    fn about_y_90() -> Quaternion {
        Quaternion::new(0.0, FRAC_1_SQRT_2, 0.0, FRAC_1_SQRT_2)
    }

    #[test]
    fn test_identity_to_euler() {
        let e = quaternion_to_euler(Quaternion::IDENTITY);
        assert_eq!(e.yaw, 0.0);
        assert_eq!(e.pitch, 0.0);
        assert_eq!(e.roll, 0.0);
    }

    #[test]
    fn test_yaw_90_about_z_is_remapped_to_roll() {
        let q = Quaternion::new(0.0, 0.0, FRAC_1_SQRT_2, FRAC_1_SQRT_2);
        let e = quaternion_to_euler(q);
        assert_abs_diff_eq!(e.yaw, 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(e.pitch, 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(e.roll, -90.0, epsilon = 1e-3);
    }

    #[test]
    fn test_truncated_components_about_z() {
        // Four-digit sensor output lands ~0.001° short of the exact angle
        let e = quaternion_to_euler(Quaternion::new(0.0, 0.0, 0.7071, 0.7071));
        assert_abs_diff_eq!(e.yaw, 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(e.pitch, 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(e.roll, -90.0, epsilon = 1e-2);
    }

    #[test]
    fn test_roll_about_x_is_remapped_to_pitch() {
        let e = quaternion_to_euler(about_x_90());
        assert_abs_diff_eq!(e.yaw, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(e.pitch, 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(e.roll, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_gimbal_clamp_positive() {
        // sin(pitch) term is exactly 1.0
        let e = quaternion_to_euler(Quaternion::new(0.0, 0.5, 0.0, 1.0));
        assert!(!e.yaw.is_nan());
        assert_abs_diff_eq!(e.yaw, -90.0, epsilon = 1e-12);
    }

    #[test]
    fn test_gimbal_clamp_negative() {
        let e = quaternion_to_euler(Quaternion::new(0.0, -0.5, 0.0, 1.0));
        assert!(!e.yaw.is_nan());
        assert_abs_diff_eq!(e.yaw, 90.0, epsilon = 1e-12);
    }

    #[test]
    fn test_gimbal_clamp_rounding_overshoot() {
        // 2 * (1/√2)² rounds to slightly above 1.0
        let e = quaternion_to_euler(about_y_90());
        assert!(!e.yaw.is_nan());
        assert_abs_diff_eq!(e.yaw, -90.0, epsilon = 1e-12);
    }

    #[test]
    fn test_nan_propagates() {
        let e = quaternion_to_euler(Quaternion::new(f64::NAN, 0.0, 0.0, 1.0));
        assert!(e.pitch.is_nan());
        assert!(e.yaw.is_nan());
    }

    #[test]
    fn test_conjugate_involution() {
        let q = Quaternion::new(0.12, -0.34, 0.56, 0.78);
        assert_eq!(quaternion_conjugate(quaternion_conjugate(q)), q);
        assert_eq!(quaternion_conjugate(q), Quaternion::new(-0.12, 0.34, -0.56, 0.78));
    }

    #[test]
    fn test_multiply_not_commutative() {
        let ab = quaternion_multiply(about_x_90(), about_y_90());
        let ba = quaternion_multiply(about_y_90(), about_x_90());
        assert!((ab.z - ba.z).abs() > 0.5);
    }

    #[test]
    fn test_multiply_matches_nalgebra() {
        let a = Quaternion::new(0.1, 0.2, 0.3, 0.4);
        let b = Quaternion::new(-0.5, 0.6, 0.7, -0.8);
        let expected = nalgebra::Quaternion::from(a) * nalgebra::Quaternion::from(b);
        assert_quat_eq(quaternion_multiply(a, b), expected.into(), 1e-12);
    }

    #[test]
    fn test_multiply_scales_magnitude() {
        let a = Quaternion::new(0.0, 0.0, 0.0, 2.0);
        let b = Quaternion::new(0.0, 3.0, 0.0, 0.0);
        assert_abs_diff_eq!(quaternion_multiply(a, b).norm(), 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_delta_of_same_sample_is_identity() {
        let unit = nalgebra::UnitQuaternion::from_euler_angles(0.3, -1.1, 2.4);
        let q = Quaternion::from(unit);
        assert_quat_eq(local_rotation_delta(q, q), Quaternion::IDENTITY, 1e-12);
    }

    #[test]
    fn test_delta_composes_back_to_current() {
        let last = Quaternion::from(nalgebra::UnitQuaternion::from_euler_angles(0.2, 0.1, -0.4));
        let current = Quaternion::from(nalgebra::UnitQuaternion::from_euler_angles(0.5, -0.3, 0.9));

        let delta = local_rotation_delta(current, last);
        assert_quat_eq(quaternion_multiply(last, delta), current, 1e-12);

        // Right-multiplying by the inverse gives a different rotation
        let swapped = quaternion_multiply(current, quaternion_conjugate(last));
        assert!(
            (swapped.x - delta.x).abs() > 1e-6
                || (swapped.y - delta.y).abs() > 1e-6
                || (swapped.z - delta.z).abs() > 1e-6
        );
    }

    #[test]
    fn test_rotation_deltas_over_stream() {
        let samples = vec![
            OrientationData::new(Quaternion::IDENTITY, 0.0),
            OrientationData::new(about_x_90(), 16.0),
            OrientationData::new(about_x_90(), 33.0),
        ];

        let deltas = rotation_deltas(&samples);
        assert_eq!(deltas.len(), 2);
        assert_quat_eq(deltas[0], about_x_90(), 1e-12);
        assert_quat_eq(deltas[1], Quaternion::IDENTITY, 1e-12);

        assert!(rotation_deltas(&samples[..1]).is_empty());
        assert!(rotation_deltas(&[]).is_empty());
    }

    #[test]
    fn test_euler_track_keeps_order() {
        let samples = vec![
            OrientationData::new(Quaternion::IDENTITY, 0.0),
            OrientationData::new(about_x_90(), 16.0),
        ];

        let track = euler_track(&samples);
        assert_eq!(track.len(), 2);
        assert_eq!(track[0], quaternion_to_euler(Quaternion::IDENTITY));
        assert_abs_diff_eq!(track[1].pitch, 90.0, epsilon = 1e-9);
    }
}
