//! Per-track compression parameters.
//!
//! Descriptors are stored in the metadata buffer as doubles, one fixed-size
//! block per track. Optional indices are written as `-1.0`.

use crate::core::SampleType;
use crate::util::{Error, Result};

/// Exclusive upper bound of `precision` and the constant thresholds.
pub const MAX_PRECISION: f64 = 100.0;

/// Exclusive upper bound of `shell_distance`.
pub const MAX_SHELL_DISTANCE: f64 = 10000.0;

/// Value written for a stripped output index or a missing parent.
const NO_INDEX: f64 = -1.0;

#[inline]
fn in_range(value: f64, max: f64) -> bool {
    value >= 0.0 && value < max
}

fn encode_index(index: Option<u16>) -> f64 {
    index.map_or(NO_INDEX, f64::from)
}

fn decode_index(track: usize, field: &str, value: f64) -> Result<Option<u16>> {
    if value < 0.0 {
        return Ok(None);
    }
    if value.fract() != 0.0 || value > u16::MAX as f64 {
        return Err(Error::descriptor(track, format!("{} {} is not a valid index", field, value)));
    }
    Ok(Some(value as u16))
}

/// Compression parameters of a scalar track.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScalarDescriptor {
    /// Position in the decoded output; `None` strips the track.
    pub output_index: Option<u16>,
    /// Maximum error tolerated by the codec.
    pub precision: f64,
}

impl ScalarDescriptor {
    pub const DEFAULT_PRECISION: f64 = 0.0001;

    pub fn new(output_index: Option<u16>) -> Self {
        Self { output_index, precision: Self::DEFAULT_PRECISION }
    }

    pub fn with_precision(mut self, precision: f64) -> Self {
        self.precision = precision;
        self
    }
}

impl Default for ScalarDescriptor {
    fn default() -> Self {
        Self::new(Some(0))
    }
}

/// Compression parameters of a transform track.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformDescriptor {
    /// Position in the decoded output; `None` strips the track.
    pub output_index: Option<u16>,
    /// Parent transform; `None` for a root.
    pub parent_index: Option<u16>,
    /// Maximum error tolerated at the shell distance.
    pub precision: f64,
    /// Distance of the virtual vertices used to measure error.
    pub shell_distance: f64,
    /// Rotation angle (radians) below which a rotation track is constant.
    pub constant_rotation_threshold_angle: f64,
    pub constant_translation_threshold: f64,
    pub constant_scale_threshold: f64,
}

impl TransformDescriptor {
    pub const DEFAULT_PRECISION: f64 = 0.01;
    pub const DEFAULT_SHELL_DISTANCE: f64 = 3.0;
    pub const DEFAULT_ROTATION_THRESHOLD: f64 = 0.00284714461;
    pub const DEFAULT_TRANSLATION_THRESHOLD: f64 = 0.001;
    pub const DEFAULT_SCALE_THRESHOLD: f64 = 0.00001;

    pub fn new(output_index: Option<u16>) -> Self {
        Self {
            output_index,
            parent_index: None,
            precision: Self::DEFAULT_PRECISION,
            shell_distance: Self::DEFAULT_SHELL_DISTANCE,
            constant_rotation_threshold_angle: Self::DEFAULT_ROTATION_THRESHOLD,
            constant_translation_threshold: Self::DEFAULT_TRANSLATION_THRESHOLD,
            constant_scale_threshold: Self::DEFAULT_SCALE_THRESHOLD,
        }
    }

    pub fn with_parent(mut self, parent_index: Option<u16>) -> Self {
        self.parent_index = parent_index;
        self
    }

    pub fn with_precision(mut self, precision: f64) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_shell_distance(mut self, shell_distance: f64) -> Self {
        self.shell_distance = shell_distance;
        self
    }
}

impl Default for TransformDescriptor {
    fn default() -> Self {
        Self::new(Some(0))
    }
}

/// Compression parameters of one track.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TrackDescriptor {
    Scalar(ScalarDescriptor),
    Transform(TransformDescriptor),
}

impl TrackDescriptor {
    /// Defaults for the track at `track_index`: output in track order, no parent.
    ///
    /// Output indices are 16-bit, so tracks past index 65535 have no default.
    pub fn default_for(sample_type: SampleType, track_index: usize) -> Result<Self> {
        let output_index = u16::try_from(track_index).map_err(|_| {
            Error::descriptor(track_index, "no default output index past 65535")
        })?;
        Ok(match sample_type {
            SampleType::Scalar => Self::Scalar(ScalarDescriptor::new(Some(output_index))),
            SampleType::Transform => Self::Transform(TransformDescriptor::new(Some(output_index))),
        })
    }

    pub fn sample_type(&self) -> SampleType {
        match self {
            Self::Scalar(_) => SampleType::Scalar,
            Self::Transform(_) => SampleType::Transform,
        }
    }

    pub fn output_index(&self) -> Option<u16> {
        match self {
            Self::Scalar(d) => d.output_index,
            Self::Transform(d) => d.output_index,
        }
    }

    /// Parent transform, always `None` for scalar tracks.
    pub fn parent_index(&self) -> Option<u16> {
        match self {
            Self::Scalar(_) => None,
            Self::Transform(d) => d.parent_index,
        }
    }

    pub fn precision(&self) -> f64 {
        match self {
            Self::Scalar(d) => d.precision,
            Self::Transform(d) => d.precision,
        }
    }

    /// Check every field range; `track` only labels the error.
    pub fn validate(&self, track: usize) -> Result<()> {
        if !in_range(self.precision(), MAX_PRECISION) {
            return Err(Error::descriptor(track, format!("precision {} out of range [0, 100)", self.precision())));
        }

        if let Self::Transform(d) = self {
            if !in_range(d.shell_distance, MAX_SHELL_DISTANCE) {
                return Err(Error::descriptor(
                    track,
                    format!("shell distance {} out of range [0, 10000)", d.shell_distance),
                ));
            }
            let thresholds = [
                ("constant rotation threshold", d.constant_rotation_threshold_angle),
                ("constant translation threshold", d.constant_translation_threshold),
                ("constant scale threshold", d.constant_scale_threshold),
            ];
            for (name, value) in thresholds {
                if !in_range(value, MAX_PRECISION) {
                    return Err(Error::descriptor(track, format!("{} {} out of range [0, 100)", name, value)));
                }
            }
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate(0).is_ok()
    }

    /// Decode a descriptor block. `block` must hold at least `descriptor_len()` doubles.
    pub fn read(sample_type: SampleType, track: usize, block: &[f64]) -> Result<Self> {
        match sample_type {
            SampleType::Scalar => Ok(Self::Scalar(ScalarDescriptor {
                output_index: decode_index(track, "output index", block[0])?,
                precision: block[1],
            })),
            SampleType::Transform => Ok(Self::Transform(TransformDescriptor {
                output_index: decode_index(track, "output index", block[0])?,
                parent_index: decode_index(track, "parent index", block[1])?,
                precision: block[2],
                shell_distance: block[3],
                constant_rotation_threshold_angle: block[4],
                constant_translation_threshold: block[5],
                constant_scale_threshold: block[6],
            })),
        }
    }

    /// Encode into a descriptor block of `descriptor_len()` doubles.
    pub fn write(&self, block: &mut [f64]) {
        match self {
            Self::Scalar(d) => {
                block[0] = encode_index(d.output_index);
                block[1] = d.precision;
            }
            Self::Transform(d) => {
                block[0] = encode_index(d.output_index);
                block[1] = encode_index(d.parent_index);
                block[2] = d.precision;
                block[3] = d.shell_distance;
                block[4] = d.constant_rotation_threshold_angle;
                block[5] = d.constant_translation_threshold;
                block[6] = d.constant_scale_threshold;
            }
        }
    }
}

impl From<ScalarDescriptor> for TrackDescriptor {
    fn from(d: ScalarDescriptor) -> Self {
        Self::Scalar(d)
    }
}

impl From<TransformDescriptor> for TrackDescriptor {
    fn from(d: TransformDescriptor) -> Self {
        Self::Transform(d)
    }
}
