//! Math type re-exports and transform utilities.
//!
//! Host-side samples are double precision (`DQuat`/`DVec3`), matching the
//! layout the encoder reads. Decoded samples come back from the codec as
//! single precision `qvvf` blocks.

pub use glam::{DQuat, DVec3, DVec4, Quat, Vec3, Vec4};

use bytemuck::{Pod, Zeroable};
use std::fmt;

/// Squared-length tolerance for a rotation to count as normalized.
pub const QUAT_NORM_TOLERANCE: f64 = 1e-4;

/// Check that every component of a vector is finite.
#[inline]
pub fn is_finite3(v: DVec3) -> bool {
    v.is_finite()
}

/// Check that a quaternion is finite and has unit length within tolerance.
#[inline]
pub fn is_normalized_quat(q: DQuat) -> bool {
    q.is_finite() && (q.length_squared() - 1.0).abs() <= QUAT_NORM_TOLERANCE
}

/// Linear blend between two scalars.
#[inline]
pub fn lerp(a: f64, b: f64, alpha: f64) -> f64 {
    a + (b - a) * alpha
}

/// Normalized linear blend between two rotations along the shortest arc.
pub fn quat_nlerp(a: DQuat, b: DQuat, alpha: f64) -> DQuat {
    let b = if a.dot(b) < 0.0 { -b } else { b };
    let blended = DQuat::from_xyzw(
        lerp(a.x, b.x, alpha),
        lerp(a.y, b.y, alpha),
        lerp(a.z, b.z, alpha),
        lerp(a.w, b.w, alpha),
    );
    let len_sq = blended.length_squared();
    if len_sq > 0.0 {
        blended * (1.0 / len_sq.sqrt())
    } else {
        DQuat::IDENTITY
    }
}

/// Rotation, translation and scale in double precision.
#[derive(Clone, Copy, PartialEq)]
pub struct Qvv {
    pub rotation: DQuat,
    pub translation: DVec3,
    pub scale: DVec3,
}

impl Qvv {
    /// Identity transform: no rotation, zero translation, unit scale.
    pub const IDENTITY: Self = Self {
        rotation: DQuat::IDENTITY,
        translation: DVec3::ZERO,
        scale: DVec3::ONE,
    };

    /// Number of doubles a transform occupies in the raw sample buffer.
    pub const NUM_DOUBLES: usize = 10;

    #[inline]
    pub const fn new(rotation: DQuat, translation: DVec3, scale: DVec3) -> Self {
        Self { rotation, translation, scale }
    }

    /// Finite components and a normalized rotation.
    pub fn is_valid(&self) -> bool {
        is_normalized_quat(self.rotation) && is_finite3(self.translation) && is_finite3(self.scale)
    }

    /// Blend toward `other`: nlerp for rotation, lerp for translation and scale.
    pub fn blend(&self, other: &Self, alpha: f64) -> Self {
        Self {
            rotation: quat_nlerp(self.rotation, other.rotation, alpha),
            translation: self.translation.lerp(other.translation, alpha),
            scale: self.scale.lerp(other.scale, alpha),
        }
    }

    /// Load from the 10-double layout `[rx, ry, rz, rw, tx, ty, tz, sx, sy, sz]`.
    pub fn from_slice(values: &[f64]) -> Self {
        Self {
            rotation: DQuat::from_xyzw(values[0], values[1], values[2], values[3]),
            translation: DVec3::new(values[4], values[5], values[6]),
            scale: DVec3::new(values[7], values[8], values[9]),
        }
    }

    /// Store into the 10-double layout used by [`Qvv::from_slice`].
    pub fn write_to_slice(&self, out: &mut [f64]) {
        let r = self.rotation;
        out[..4].copy_from_slice(&[r.x, r.y, r.z, r.w]);
        out[4..7].copy_from_slice(&self.translation.to_array());
        out[7..10].copy_from_slice(&self.scale.to_array());
    }
}

impl Default for Qvv {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Debug for Qvv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Qvv(r={:?}, t={:?}, s={:?})", self.rotation, self.translation, self.scale)
    }
}

/// Decoded transform as written by the codec: 12 floats with padded vectors.
#[derive(Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Qvvf {
    pub rotation: [f32; 4],
    pub translation: [f32; 4],
    pub scale: [f32; 4],
}

impl Qvvf {
    /// Size in bytes of one decoded transform.
    pub const SIZE: usize = 12 * 4;

    pub const IDENTITY: Self = Self {
        rotation: [0.0, 0.0, 0.0, 1.0],
        translation: [0.0; 4],
        scale: [1.0, 1.0, 1.0, 0.0],
    };

    /// Narrow a double precision transform.
    pub fn from_qvv(qvv: &Qvv) -> Self {
        let r = qvv.rotation.as_quat();
        let t = qvv.translation.as_vec3();
        let s = qvv.scale.as_vec3();
        Self {
            rotation: [r.x, r.y, r.z, r.w],
            translation: [t.x, t.y, t.z, 0.0],
            scale: [s.x, s.y, s.z, 0.0],
        }
    }

    #[inline]
    pub fn rotation(&self) -> Quat {
        Quat::from_array(self.rotation)
    }

    #[inline]
    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.translation[0], self.translation[1], self.translation[2])
    }

    #[inline]
    pub fn scale(&self) -> Vec3 {
        Vec3::new(self.scale[0], self.scale[1], self.scale[2])
    }

    /// Widen to double precision.
    pub fn to_qvv(&self) -> Qvv {
        Qvv {
            rotation: self.rotation().as_dquat(),
            translation: self.translation().as_dvec3(),
            scale: self.scale().as_dvec3(),
        }
    }

    /// Component-wise comparison ignoring the padding lanes.
    pub fn near_equal(&self, other: &Self, tolerance: f32) -> bool {
        let close = |a: &[f32], b: &[f32]| a.iter().zip(b).all(|(x, y)| (x - y).abs() <= tolerance);
        close(&self.rotation, &other.rotation)
            && close(&self.translation[..3], &other.translation[..3])
            && close(&self.scale[..3], &other.scale[..3])
    }
}

impl Default for Qvvf {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Debug for Qvvf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Qvvf(r={:?}, t={:?}, s={:?})",
            self.rotation,
            &self.translation[..3],
            &self.scale[..3]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_valid() {
        assert!(Qvv::IDENTITY.is_valid());
        assert!(is_normalized_quat(DQuat::IDENTITY));
        assert!(!is_normalized_quat(DQuat::from_xyzw(0.0, 0.0, 0.0, 0.0)));
        assert!(!is_normalized_quat(DQuat::from_xyzw(0.0, 0.0, 0.0, 1.01)));
    }

    #[test]
    fn test_invalid_translation() {
        let mut q = Qvv::IDENTITY;
        q.translation.y = f64::NAN;
        assert!(!q.is_valid());
        q.translation.y = 0.0;
        q.scale.z = f64::INFINITY;
        assert!(!q.is_valid());
    }

    #[test]
    fn test_slice_layout() {
        let q = Qvv::new(
            DQuat::from_rotation_z(0.5),
            DVec3::new(1.0, 2.0, 3.0),
            DVec3::new(4.0, 5.0, 6.0),
        );
        let mut buf = [0.0; 10];
        q.write_to_slice(&mut buf);
        assert_eq!(&buf[4..], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(buf[3], q.rotation.w);
        assert_eq!(Qvv::from_slice(&buf), q);
    }

    #[test]
    fn test_blend() {
        let a = Qvv::IDENTITY;
        let b = Qvv::new(DQuat::from_rotation_y(1.0), DVec3::splat(2.0), DVec3::splat(3.0));
        let mid = a.blend(&b, 0.5);
        assert!((mid.translation - DVec3::ONE).length() < 1e-12);
        assert!((mid.scale - DVec3::splat(2.0)).length() < 1e-12);
        assert!(mid.is_valid());
        assert_eq!(a.blend(&b, 0.0).translation, a.translation);
        assert!((a.blend(&b, 1.0).rotation.dot(b.rotation).abs() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_nlerp_shortest_arc() {
        let a = DQuat::IDENTITY;
        let b = -DQuat::IDENTITY;
        // Same rotation with opposite sign must not pass through zero.
        let mid = quat_nlerp(a, b, 0.5);
        assert!(is_normalized_quat(mid));
    }

    #[test]
    fn test_qvvf_layout() {
        assert_eq!(std::mem::size_of::<Qvvf>(), Qvvf::SIZE);
        let f = Qvvf::from_qvv(&Qvv::IDENTITY);
        assert!(f.near_equal(&Qvvf::IDENTITY, 0.0));
        assert_eq!(f.to_qvv(), Qvv::IDENTITY);
    }
}
