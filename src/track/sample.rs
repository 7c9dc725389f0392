//! Sample values and the accessor into the shared raw sample buffer.
//!
//! A [`SampleRef`] has no storage of its own: it is a `(type, offset)` pair
//! and every read or write names the buffer it goes through.

use crate::core::SampleType;
use crate::util::{Error, Qvv, Result};

/// One value of a track at one sample index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sample {
    Transform(Qvv),
    Scalar(f64),
}

impl Sample {
    /// The identity value of a sample type.
    pub fn identity(sample_type: SampleType) -> Self {
        match sample_type {
            SampleType::Transform => Self::Transform(Qvv::IDENTITY),
            SampleType::Scalar => Self::Scalar(0.0),
        }
    }

    pub fn sample_type(&self) -> SampleType {
        match self {
            Self::Transform(_) => SampleType::Transform,
            Self::Scalar(_) => SampleType::Scalar,
        }
    }

    /// Finite components; transforms also need a normalized rotation.
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Transform(qvv) => qvv.is_valid(),
            Self::Scalar(v) => v.is_finite(),
        }
    }

    /// Blend toward `other`. Both samples must have the same type.
    pub fn blend(&self, other: &Self, alpha: f64) -> Result<Self> {
        match (self, other) {
            (Self::Transform(a), Self::Transform(b)) => Ok(Self::Transform(a.blend(b, alpha))),
            (Self::Scalar(a), Self::Scalar(b)) => Ok(Self::Scalar(a + (b - a) * alpha)),
            _ => Err(mismatch(self.sample_type(), other.sample_type())),
        }
    }

    pub fn as_transform(&self) -> Option<&Qvv> {
        match self {
            Self::Transform(qvv) => Some(qvv),
            Self::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::Transform(_) => None,
        }
    }
}

impl From<Qvv> for Sample {
    fn from(qvv: Qvv) -> Self {
        Self::Transform(qvv)
    }
}

impl From<f64> for Sample {
    fn from(v: f64) -> Self {
        Self::Scalar(v)
    }
}

fn mismatch(expected: SampleType, actual: SampleType) -> Error {
    Error::TypeMismatch {
        expected: expected.name(),
        actual: actual.name(),
    }
}

/// Typed view of one sample inside a raw sample buffer.
///
/// A buffer too short to hold the sample is reported as
/// [`Error::BufferTooShort`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleRef {
    sample_type: SampleType,
    offset: usize,
}

impl SampleRef {
    /// Accessor for the sample starting at `offset` doubles into the buffer.
    pub const fn new(sample_type: SampleType, offset: usize) -> Self {
        Self { sample_type, offset }
    }

    #[inline]
    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    /// Offset in doubles from the start of the raw buffer.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// One past the last double of this sample.
    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.sample_type.raw_sample_len()
    }

    fn slot<'a>(&self, raw: &'a [f64]) -> Result<&'a [f64]> {
        let actual = raw.len();
        raw.get(self.offset..self.end())
            .ok_or(Error::BufferTooShort { needed: self.end(), actual })
    }

    fn slot_mut<'a>(&self, raw: &'a mut [f64]) -> Result<&'a mut [f64]> {
        let actual = raw.len();
        let end = self.end();
        raw.get_mut(self.offset..end)
            .ok_or(Error::BufferTooShort { needed: end, actual })
    }

    fn expect(&self, sample_type: SampleType) -> Result<()> {
        if self.sample_type == sample_type {
            Ok(())
        } else {
            Err(mismatch(sample_type, self.sample_type))
        }
    }

    /// Read whichever variant this accessor holds.
    pub fn read(&self, raw: &[f64]) -> Result<Sample> {
        let slot = self.slot(raw)?;
        Ok(match self.sample_type {
            SampleType::Transform => Sample::Transform(Qvv::from_slice(slot)),
            SampleType::Scalar => Sample::Scalar(slot[0]),
        })
    }

    /// Write a sample; fails if its variant does not match the accessor.
    pub fn write(&self, raw: &mut [f64], sample: &Sample) -> Result<()> {
        match sample {
            Sample::Transform(qvv) => self.write_transform(raw, qvv),
            Sample::Scalar(v) => self.write_scalar(raw, *v),
        }
    }

    pub fn read_transform(&self, raw: &[f64]) -> Result<Qvv> {
        self.expect(SampleType::Transform)?;
        Ok(Qvv::from_slice(self.slot(raw)?))
    }

    pub fn write_transform(&self, raw: &mut [f64], value: &Qvv) -> Result<()> {
        self.expect(SampleType::Transform)?;
        value.write_to_slice(self.slot_mut(raw)?);
        Ok(())
    }

    pub fn read_scalar(&self, raw: &[f64]) -> Result<f64> {
        self.expect(SampleType::Scalar)?;
        Ok(self.slot(raw)?[0])
    }

    pub fn write_scalar(&self, raw: &mut [f64], value: f64) -> Result<()> {
        self.expect(SampleType::Scalar)?;
        self.slot_mut(raw)?[0] = value;
        Ok(())
    }

    /// Reset to the identity value.
    pub fn reset(&self, raw: &mut [f64]) -> Result<()> {
        self.write(raw, &Sample::identity(self.sample_type))
    }

    /// Finite and normalized; a buffer too short to hold the sample is not valid.
    pub fn is_valid(&self, raw: &[f64]) -> bool {
        self.read(raw).is_ok_and(|sample| sample.is_valid())
    }
}
