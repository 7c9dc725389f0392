//! Rounding policies and interpolation results.
//!
//! A query time usually falls between two samples. The rounding policy
//! decides how far toward the second sample the result is blended.

use crate::util::{Error, Qvvf, Result};

/// Kind of value stored in every sample of a track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SampleType {
    /// Rotation, translation and scale.
    Transform,
    /// A single float.
    Scalar,
}

impl SampleType {
    /// Tag written into the metadata header.
    pub const fn tag(self) -> f64 {
        match self {
            Self::Transform => 0.0,
            Self::Scalar => 1.0,
        }
    }

    /// Parse the metadata header tag.
    pub fn from_tag(tag: f64) -> Option<Self> {
        if tag == 0.0 {
            Some(Self::Transform)
        } else if tag == 1.0 {
            Some(Self::Scalar)
        } else {
            None
        }
    }

    /// Doubles per sample in the raw sample buffer.
    pub const fn raw_sample_len(self) -> usize {
        match self {
            Self::Transform => 10,
            Self::Scalar => 1,
        }
    }

    /// Doubles per track in the metadata descriptor area.
    pub const fn descriptor_len(self) -> usize {
        match self {
            Self::Transform => 7,
            Self::Scalar => 2,
        }
    }

    /// Bytes per decoded sample written by the codec.
    pub const fn decoded_size(self) -> usize {
        match self {
            Self::Transform => Qvvf::SIZE,
            Self::Scalar => 4,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Transform => "transform",
            Self::Scalar => "scalar",
        }
    }
}

/// How a continuous sample time maps to a blend factor between two samples.
///
/// The discriminants are the values passed across the native boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum RoundingPolicy {
    /// Interpolate linearly between the two surrounding samples.
    #[default]
    None = 0,
    /// Always return the earlier sample.
    Floor = 1,
    /// Always return the later sample.
    Ceil = 2,
    /// Return whichever sample is nearest.
    Nearest = 3,
}

impl RoundingPolicy {
    /// All policies, in wire order.
    pub const ALL: [Self; 4] = [Self::None, Self::Floor, Self::Ceil, Self::Nearest];

    /// Value passed to the native decompress entry points.
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Parse a wire value.
    pub const fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(Self::None),
            1 => Some(Self::Floor),
            2 => Some(Self::Ceil),
            3 => Some(Self::Nearest),
            _ => None,
        }
    }

    /// Apply this policy to a raw interpolation factor in `[0, 1]`.
    #[inline]
    pub fn apply(self, raw_alpha: f64) -> f64 {
        match self {
            Self::None => raw_alpha,
            Self::Floor => 0.0,
            Self::Ceil => 1.0,
            Self::Nearest => (raw_alpha + 0.5).floor().min(1.0),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Nearest => "nearest",
        }
    }
}

impl TryFrom<i32> for RoundingPolicy {
    type Error = Error;

    fn try_from(v: i32) -> Result<Self> {
        Self::from_i32(v).ok_or(Error::InvalidRoundingPolicy(v))
    }
}

/// Result of sample interpolation query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleInterp {
    /// First sample index.
    pub index0: usize,
    /// Second sample index (equal to `index0` at the end of a track).
    pub index1: usize,
    /// Interpolation factor (0.0 = `index0`, 1.0 = `index1`).
    pub alpha: f64,
}

impl SampleInterp {
    /// Create for exact sample (no interpolation needed).
    pub fn exact(index: usize) -> Self {
        Self {
            index0: index,
            index1: index,
            alpha: 0.0,
        }
    }

    /// Create for interpolation between two samples.
    pub fn lerp(index0: usize, index1: usize, alpha: f64) -> Self {
        Self {
            index0,
            index1,
            alpha: alpha.clamp(0.0, 1.0),
        }
    }

    /// Check if this is an exact sample (no interpolation).
    pub fn is_exact(&self) -> bool {
        self.index0 == self.index1 || self.alpha == 0.0 || self.alpha == 1.0
    }

    /// Index of the sample that dominates the blend.
    pub fn nearest_index(&self) -> usize {
        if self.alpha < 0.5 { self.index0 } else { self.index1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_type_layout() {
        assert_eq!(SampleType::from_tag(SampleType::Scalar.tag()), Some(SampleType::Scalar));
        assert_eq!(SampleType::from_tag(2.0), None);
        assert_eq!(SampleType::Transform.raw_sample_len(), 10);
        assert_eq!(SampleType::Transform.descriptor_len(), 7);
        assert_eq!(SampleType::Transform.decoded_size(), 48);
        assert_eq!(SampleType::Scalar.decoded_size(), 4);
    }

    #[test]
    fn test_policy_wire_values() {
        for policy in RoundingPolicy::ALL {
            assert_eq!(RoundingPolicy::from_i32(policy.as_i32()), Some(policy));
        }
        assert_eq!(RoundingPolicy::Nearest.as_i32(), 3);
        assert!(matches!(
            RoundingPolicy::try_from(7),
            Err(Error::InvalidRoundingPolicy(7))
        ));
    }

    #[test]
    fn test_policy_apply() {
        assert_eq!(RoundingPolicy::None.apply(0.25), 0.25);
        assert_eq!(RoundingPolicy::Floor.apply(0.75), 0.0);
        assert_eq!(RoundingPolicy::Ceil.apply(0.25), 1.0);
        assert_eq!(RoundingPolicy::Nearest.apply(0.25), 0.0);
        assert_eq!(RoundingPolicy::Nearest.apply(0.5), 1.0);
        assert_eq!(RoundingPolicy::Nearest.apply(0.75), 1.0);
        assert_eq!(RoundingPolicy::Nearest.apply(1.0), 1.0);
    }

    #[test]
    fn test_sample_interp() {
        let exact = SampleInterp::exact(5);
        assert!(exact.is_exact());
        assert_eq!(exact.index0, 5);

        let lerp = SampleInterp::lerp(2, 3, 1.5);
        assert_eq!(lerp.alpha, 1.0);
        assert_eq!(lerp.nearest_index(), 3);

        let lerp = SampleInterp::lerp(2, 3, 0.25);
        assert!(!lerp.is_exact());
        assert_eq!(lerp.nearest_index(), 2);
    }
}
