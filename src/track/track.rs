//! Layout of a single track inside the shared buffers.

use super::descriptor::TrackDescriptor;
use super::sample::{Sample, SampleRef};
use crate::core::{RoundingPolicy, SampleType, UniformSampling};
use crate::util::{Error, Result};

/// Inclusive upper bound of track and sample counts.
pub const MAX_COUNT: usize = 1 << 24;

/// Exclusive upper bound of the sample rate in Hz.
pub const MAX_SAMPLE_RATE: f64 = 10000.0;

pub(crate) fn check_sample_count(sample_count: usize) -> Result<()> {
    if sample_count > MAX_COUNT {
        return Err(Error::InvalidSampleCount(sample_count));
    }
    Ok(())
}

pub(crate) fn check_sample_rate(sample_rate: f64) -> Result<()> {
    if !(sample_rate.is_finite() && (0.0..MAX_SAMPLE_RATE).contains(&sample_rate)) {
        return Err(Error::InvalidSampleRate(sample_rate));
    }
    Ok(())
}

/// One track: a fixed window into the metadata and raw sample buffers.
///
/// A `Track` owns no data. It records where its descriptor block and its
/// samples live, and every accessor takes the buffer it reads from. Buffers
/// shorter than that window are rejected with [`Error::BufferTooShort`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Track {
    index: usize,
    sample_type: SampleType,
    sampling: UniformSampling,
    /// Start of the descriptor block, in doubles.
    descriptor_offset: usize,
    /// Start of the first sample, in doubles.
    raw_offset: usize,
}

impl Track {
    /// A standalone track whose descriptor and samples both start at offset 0.
    pub fn new(sample_type: SampleType, sample_count: usize, sample_rate: f64) -> Result<Self> {
        check_sample_count(sample_count)?;
        check_sample_rate(sample_rate)?;
        Ok(Self::at(0, sample_type, UniformSampling::new(sample_count, sample_rate), 0, 0))
    }

    pub(crate) fn at(
        index: usize,
        sample_type: SampleType,
        sampling: UniformSampling,
        descriptor_offset: usize,
        raw_offset: usize,
    ) -> Self {
        Self { index, sample_type, sampling, descriptor_offset, raw_offset }
    }

    /// Position of this track in its collection.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    #[inline]
    pub fn sample_count(&self) -> usize {
        self.sampling.sample_count
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sampling.sample_rate
    }

    #[inline]
    pub fn sampling(&self) -> UniformSampling {
        self.sampling
    }

    /// Duration in seconds; see [`crate::core::track_duration`].
    #[inline]
    pub fn duration(&self) -> f64 {
        self.sampling.duration()
    }

    #[inline]
    pub fn descriptor_offset(&self) -> usize {
        self.descriptor_offset
    }

    #[inline]
    pub fn raw_offset(&self) -> usize {
        self.raw_offset
    }

    /// Doubles spanned by the samples of this track.
    #[inline]
    pub fn raw_len(&self) -> usize {
        self.sample_count() * self.sample_type.raw_sample_len()
    }

    /// Accessor for sample `index`.
    pub fn sample(&self, index: usize) -> Result<SampleRef> {
        let count = self.sample_count();
        if index >= count {
            return Err(Error::SampleOutOfBounds { index, count });
        }
        Ok(SampleRef::new(
            self.sample_type,
            self.raw_offset + index * self.sample_type.raw_sample_len(),
        ))
    }

    /// Accessors for every sample in order.
    pub fn samples(&self) -> impl Iterator<Item = SampleRef> + '_ {
        let stride = self.sample_type.raw_sample_len();
        (0..self.sample_count())
            .map(move |i| SampleRef::new(self.sample_type, self.raw_offset + i * stride))
    }

    fn check_raw(&self, raw: &[f64]) -> Result<()> {
        let needed = self.raw_offset + self.raw_len();
        if raw.len() < needed {
            return Err(Error::BufferTooShort { needed, actual: raw.len() });
        }
        Ok(())
    }

    fn descriptor_end(&self) -> usize {
        self.descriptor_offset + self.sample_type.descriptor_len()
    }

    fn descriptor_block<'a>(&self, metadata: &'a [f64]) -> Result<&'a [f64]> {
        metadata
            .get(self.descriptor_offset..self.descriptor_end())
            .ok_or(Error::BufferTooShort { needed: self.descriptor_end(), actual: metadata.len() })
    }

    fn descriptor_block_mut<'a>(&self, metadata: &'a mut [f64]) -> Result<&'a mut [f64]> {
        let actual = metadata.len();
        let end = self.descriptor_end();
        metadata
            .get_mut(self.descriptor_offset..end)
            .ok_or(Error::BufferTooShort { needed: end, actual })
    }

    pub fn descriptor(&self, metadata: &[f64]) -> Result<TrackDescriptor> {
        TrackDescriptor::read(self.sample_type, self.index, self.descriptor_block(metadata)?)
    }

    /// Store a descriptor. Its variant must match the track's sample type;
    /// field ranges are checked by [`Track::validate`].
    pub fn set_descriptor(&self, metadata: &mut [f64], descriptor: &TrackDescriptor) -> Result<()> {
        if descriptor.sample_type() != self.sample_type {
            return Err(Error::TypeMismatch {
                expected: self.sample_type.name(),
                actual: descriptor.sample_type().name(),
            });
        }
        descriptor.write(self.descriptor_block_mut(metadata)?);
        Ok(())
    }

    /// Set every sample to identity and the descriptor to its default.
    pub fn reset(&self, metadata: &mut [f64], raw: &mut [f64]) -> Result<()> {
        self.check_raw(raw)?;
        TrackDescriptor::default_for(self.sample_type, self.index)?.write(self.descriptor_block_mut(metadata)?);
        for sample in self.samples() {
            sample.reset(raw)?;
        }
        Ok(())
    }

    /// First invalid field: the descriptor, then samples in order.
    pub fn validate(&self, metadata: &[f64], raw: &[f64]) -> Result<()> {
        self.descriptor(metadata)?.validate(self.index)?;
        self.check_raw(raw)?;
        for (i, sample) in self.samples().enumerate() {
            if !sample.read(raw)?.is_valid() {
                return Err(Error::InvalidSample { track: self.index, sample: i });
            }
        }
        Ok(())
    }

    pub fn is_valid(&self, metadata: &[f64], raw: &[f64]) -> bool {
        self.validate(metadata, raw).is_ok()
    }

    /// Host-side preview: clamp `sample_time` to the duration and blend the
    /// surrounding samples.
    pub fn sample_at(&self, raw: &[f64], sample_time: f64, policy: RoundingPolicy) -> Result<Sample> {
        let interp = self.sampling.find(sample_time, policy)?;
        let first = self.sample(interp.index0)?.read(raw)?;
        if interp.index0 == interp.index1 || interp.alpha == 0.0 {
            return Ok(first);
        }
        let second = self.sample(interp.index1)?.read(raw)?;
        first.blend(&second, interp.alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{DQuat, DVec3, Qvv};

    #[test]
    fn test_ranges() {
        assert!(Track::new(SampleType::Scalar, MAX_COUNT, 30.0).is_ok());
        assert!(matches!(
            Track::new(SampleType::Scalar, MAX_COUNT + 1, 30.0),
            Err(Error::InvalidSampleCount(_))
        ));
        assert!(matches!(
            Track::new(SampleType::Transform, 3, 10000.0),
            Err(Error::InvalidSampleRate(_))
        ));
        assert!(Track::new(SampleType::Transform, 3, -1.0).is_err());
        assert!(Track::new(SampleType::Transform, 3, f64::NAN).is_err());
        assert!(Track::new(SampleType::Transform, 3, 9999.99).is_ok());
    }

    #[test]
    fn test_standalone_layout() {
        let track = Track::new(SampleType::Transform, 4, 30.0).unwrap();
        let mut metadata = vec![0.0; SampleType::Transform.descriptor_len()];
        let mut raw = vec![0.0; track.raw_len()];
        track.reset(&mut metadata, &mut raw).unwrap();

        assert_eq!(track.sample(3).unwrap().offset(), 30);
        assert!(matches!(track.sample(4), Err(Error::SampleOutOfBounds { index: 4, count: 4 })));
        assert!(track.is_valid(&metadata, &raw));
        assert!((track.duration() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_sample_reported() {
        let track = Track::new(SampleType::Scalar, 3, 30.0).unwrap();
        let mut metadata = vec![0.0; 2];
        let mut raw = vec![0.0; 3];
        track.reset(&mut metadata, &mut raw).unwrap();
        raw[2] = f64::INFINITY;
        assert!(matches!(
            track.validate(&metadata, &raw),
            Err(Error::InvalidSample { track: 0, sample: 2 })
        ));
    }

    #[test]
    fn test_descriptor_type_checked() {
        let track = Track::new(SampleType::Scalar, 1, 30.0).unwrap();
        let mut metadata = vec![0.0; 2];
        let transform = TrackDescriptor::default_for(SampleType::Transform, 0).unwrap();
        assert!(matches!(
            track.set_descriptor(&mut metadata, &transform),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_short_buffers_rejected() {
        let track = Track::new(SampleType::Transform, 3, 30.0).unwrap();
        let mut metadata = vec![0.0; 7];
        let mut raw = vec![0.0; 10];

        assert!(matches!(
            track.sample(2).unwrap().read(&raw),
            Err(Error::BufferTooShort { needed: 30, actual: 10 })
        ));
        assert!(matches!(track.descriptor(&[]), Err(Error::BufferTooShort { needed: 7, actual: 0 })));
        assert!(matches!(
            track.set_descriptor(&mut [0.0; 3], &TrackDescriptor::default_for(SampleType::Transform, 0).unwrap()),
            Err(Error::BufferTooShort { .. })
        ));
        assert!(matches!(track.reset(&mut metadata, &mut raw), Err(Error::BufferTooShort { needed: 30, .. })));
        assert!(matches!(track.validate(&metadata, &raw), Err(Error::BufferTooShort { .. })));
        assert!(!track.is_valid(&metadata, &raw));
        assert!(track.sample_at(&raw, 1.0, RoundingPolicy::None).is_err());

        // Nothing was written by the failed reset.
        assert_eq!(metadata, vec![0.0; 7]);
    }

    #[test]
    fn test_sample_at_blends() {
        let track = Track::new(SampleType::Transform, 2, 10.0).unwrap();
        let mut metadata = vec![0.0; 7];
        let mut raw = vec![0.0; track.raw_len()];
        track.reset(&mut metadata, &mut raw).unwrap();
        let moved = Qvv::new(DQuat::IDENTITY, DVec3::new(2.0, 0.0, 0.0), DVec3::ONE);
        track.sample(1).unwrap().write_transform(&mut raw, &moved).unwrap();

        let mid = track.sample_at(&raw, 0.05, RoundingPolicy::None).unwrap();
        let mid = mid.as_transform().unwrap();
        assert!((mid.translation.x - 1.0).abs() < 1e-9);

        let floor = track.sample_at(&raw, 0.05, RoundingPolicy::Floor).unwrap();
        assert_eq!(floor, Sample::Transform(Qvv::IDENTITY));

        // Past the end clamps to the last sample.
        let end = track.sample_at(&raw, 5.0, RoundingPolicy::None).unwrap();
        assert_eq!(end, Sample::Transform(moved));
    }
}
