//! A set of uniformly sampled tracks backed by two shared flat buffers.
//!
//! The metadata buffer starts with a four-double header
//! `[track_count, sample_type_tag, sample_count, sample_rate]` followed by
//! one descriptor block per track. The raw buffer holds each track's samples
//! contiguously, track after track. Both buffers are handed to the encoder
//! as-is.

use byteorder::{ByteOrder, LittleEndian};
use tracing::trace;

use super::descriptor::TrackDescriptor;
use super::sample::{Sample, SampleRef};
use super::track::{check_sample_count, check_sample_rate, Track, MAX_COUNT};
use crate::core::{RoundingPolicy, SampleType, UniformSampling};
use crate::util::{Error, Result};

/// Doubles in the metadata header.
pub const METADATA_HEADER_LEN: usize = 4;

/// A zeroed buffer of `len` doubles, or `OutOfMemory` if it cannot be reserved.
fn zeroed(len: usize) -> Result<Vec<f64>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| Error::OutOfMemory { requested: len.saturating_mul(8) })?;
    buf.resize(len, 0.0);
    Ok(buf)
}

fn to_le_bytes(values: &[f64]) -> Vec<u8> {
    let mut bytes = vec![0u8; values.len() * 8];
    LittleEndian::write_f64_into(values, &mut bytes);
    bytes
}

/// Tracks sharing a sample type, count and rate.
#[derive(Clone, Debug)]
pub struct TrackCollection {
    sample_type: SampleType,
    sampling: UniformSampling,
    tracks: Vec<Track>,
    metadata: Vec<f64>,
    raw: Vec<f64>,
}

impl TrackCollection {
    /// Create a collection with identity samples and default descriptors.
    pub fn new(
        sample_type: SampleType,
        track_count: usize,
        sample_count: usize,
        sample_rate: f64,
    ) -> Result<Self> {
        if track_count > MAX_COUNT {
            return Err(Error::InvalidTrackCount(track_count));
        }
        check_sample_count(sample_count)?;
        check_sample_rate(sample_rate)?;

        let sampling = UniformSampling::new(sample_count, sample_rate);
        let descriptor_len = sample_type.descriptor_len();
        let track_raw_len = sample_count * sample_type.raw_sample_len();

        let raw_len = track_count
            .checked_mul(track_raw_len)
            .ok_or(Error::OutOfMemory { requested: usize::MAX })?;
        let mut raw = zeroed(raw_len)?;
        let mut metadata = zeroed(METADATA_HEADER_LEN + track_count * descriptor_len)?;
        metadata[0] = track_count as f64;
        metadata[1] = sample_type.tag();
        metadata[2] = sample_count as f64;
        metadata[3] = sample_rate;

        let tracks: Vec<Track> = (0..track_count)
            .map(|i| {
                Track::at(
                    i,
                    sample_type,
                    sampling,
                    METADATA_HEADER_LEN + i * descriptor_len,
                    i * track_raw_len,
                )
            })
            .collect();

        for track in &tracks {
            track.reset(&mut metadata, &mut raw)?;
        }

        trace!(
            "TrackCollection::new: {} {} tracks x {} samples @ {} Hz",
            track_count,
            sample_type.name(),
            sample_count,
            sample_rate
        );

        Ok(Self { sample_type, sampling, tracks, metadata, raw })
    }

    #[inline]
    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    #[inline]
    pub fn track_count(&self) -> usize {
        self.tracks.len()
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
    pub fn duration(&self) -> f64 {
        self.sampling.duration()
    }

    pub fn track(&self, index: usize) -> Result<Track> {
        self.tracks
            .get(index)
            .copied()
            .ok_or(Error::TrackOutOfBounds { index, count: self.tracks.len() })
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// The metadata buffer: header followed by descriptor blocks.
    pub fn metadata(&self) -> &[f64] {
        &self.metadata
    }

    /// Mutable descriptor area; the four header doubles are not exposed.
    pub fn descriptors_mut(&mut self) -> &mut [f64] {
        &mut self.metadata[METADATA_HEADER_LEN..]
    }

    /// The raw sample buffer.
    pub fn raw_data(&self) -> &[f64] {
        &self.raw
    }

    pub fn raw_data_mut(&mut self) -> &mut [f64] {
        &mut self.raw
    }

    /// Metadata as the little-endian bytes copied into native memory.
    pub fn metadata_bytes(&self) -> Vec<u8> {
        to_le_bytes(&self.metadata)
    }

    /// Raw samples as the little-endian bytes copied into native memory.
    pub fn raw_bytes(&self) -> Vec<u8> {
        to_le_bytes(&self.raw)
    }

    /// Accessor for one sample of one track.
    pub fn sample(&self, track: usize, sample: usize) -> Result<SampleRef> {
        self.track(track)?.sample(sample)
    }

    pub fn read_sample(&self, track: usize, sample: usize) -> Result<Sample> {
        self.sample(track, sample)?.read(&self.raw)
    }

    pub fn write_sample(&mut self, track: usize, sample: usize, value: impl Into<Sample>) -> Result<()> {
        let accessor = self.sample(track, sample)?;
        accessor.write(&mut self.raw, &value.into())
    }

    pub fn descriptor(&self, track: usize) -> Result<TrackDescriptor> {
        self.track(track)?.descriptor(&self.metadata)
    }

    pub fn set_descriptor(&mut self, track: usize, descriptor: impl Into<TrackDescriptor>) -> Result<()> {
        let track = self.track(track)?;
        track.set_descriptor(&mut self.metadata, &descriptor.into())
    }

    /// Report the first problem found.
    ///
    /// Tracks are checked in order (descriptor, then samples). After that the
    /// collection-wide invariants: output indices unique and contiguous from
    /// zero, parents naming another track.
    pub fn validate(&self) -> Result<()> {
        let mut descriptors = Vec::with_capacity(self.tracks.len());
        for track in &self.tracks {
            track.validate(&self.metadata, &self.raw)?;
            descriptors.push(track.descriptor(&self.metadata)?);
        }

        let mut seen = vec![false; self.tracks.len()];
        let mut output_count = 0;
        for (i, d) in descriptors.iter().enumerate() {
            if let Some(output) = d.output_index() {
                let slot = seen.get_mut(output as usize).ok_or_else(|| {
                    Error::descriptor(i, format!("output index {} exceeds track count {}", output, self.tracks.len()))
                })?;
                if *slot {
                    return Err(Error::descriptor(i, format!("output index {} already used", output)));
                }
                *slot = true;
                output_count += 1;
            }
            if let Some(parent) = d.parent_index() {
                if parent as usize >= self.tracks.len() || parent as usize == i {
                    return Err(Error::descriptor(i, format!("parent index {} does not name another track", parent)));
                }
            }
        }

        if let Some(gap) = seen[..output_count].iter().position(|used| !used) {
            let track = descriptors
                .iter()
                .position(|d| d.output_index().is_some_and(|o| o as usize >= output_count))
                .unwrap_or(0);
            return Err(Error::descriptor(track, format!("output indices skip {}", gap)));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Host-side preview of one track at `sample_time`.
    pub fn sample_at(&self, track: usize, sample_time: f64, policy: RoundingPolicy) -> Result<Sample> {
        self.track(track)?.sample_at(&self.raw, sample_time, policy)
    }

    /// Number of tracks that are not stripped from the output.
    pub fn output_track_count(&self) -> usize {
        self.tracks
            .iter()
            .filter_map(|t| t.descriptor(&self.metadata).ok())
            .filter(|d| d.output_index().is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::{ScalarDescriptor, TransformDescriptor};
    use crate::util::{DQuat, DVec3, Qvv};

    #[test]
    fn test_layout() {
        let c = TrackCollection::new(SampleType::Transform, 2, 3, 30.0).unwrap();
        assert_eq!(c.metadata().len(), 4 + 2 * 7);
        assert_eq!(&c.metadata()[..4], &[2.0, 0.0, 3.0, 30.0]);
        assert_eq!(c.raw_data().len(), 2 * 3 * 10);
        assert_eq!(c.raw_bytes().len(), 2 * 3 * 10 * 8);
        assert_eq!(c.track(1).unwrap().raw_offset(), 30);
        assert_eq!(c.track(1).unwrap().descriptor_offset(), 11);
        assert!(c.is_valid());

        for t in 0..2 {
            for s in 0..3 {
                assert_eq!(c.read_sample(t, s).unwrap(), Sample::Transform(Qvv::IDENTITY));
            }
        }
    }

    #[test]
    fn test_byte_views_little_endian() {
        let mut c = TrackCollection::new(SampleType::Scalar, 1, 2, 30.0).unwrap();
        c.write_sample(0, 1, -2.5).unwrap();
        let raw = c.raw_bytes();
        assert_eq!(&raw[8..16], &(-2.5f64).to_le_bytes());
        let meta = c.metadata_bytes();
        assert_eq!(meta.len(), (4 + 2) * 8);
        assert_eq!(&meta[24..32], &30.0f64.to_le_bytes());
    }

    #[test]
    fn test_unaddressable_outputs() {
        assert!(TrackCollection::new(SampleType::Scalar, 65_536, 0, 30.0).is_ok());
        assert!(matches!(
            TrackCollection::new(SampleType::Scalar, 65_537, 0, 30.0),
            Err(Error::InvalidDescriptor { track: 65_536, .. })
        ));
    }

    #[test]
    fn test_allocation_failure_reported() {
        assert!(matches!(
            TrackCollection::new(SampleType::Transform, MAX_COUNT, MAX_COUNT, 30.0),
            Err(Error::OutOfMemory { .. })
        ));
    }

    #[test]
    fn test_range_checks() {
        assert!(matches!(
            TrackCollection::new(SampleType::Scalar, 1, 1, 10000.0),
            Err(Error::InvalidSampleRate(_))
        ));
        assert!(matches!(
            TrackCollection::new(SampleType::Scalar, MAX_COUNT + 1, 1, 30.0),
            Err(Error::InvalidTrackCount(_))
        ));
        let empty = TrackCollection::new(SampleType::Scalar, 0, 0, 0.0).unwrap();
        assert_eq!(empty.metadata().len(), 4);
        assert!(empty.is_valid());
    }

    #[test]
    fn test_tracks_disjoint() {
        let mut c = TrackCollection::new(SampleType::Scalar, 3, 2, 30.0).unwrap();
        c.write_sample(1, 0, 5.0).unwrap();
        assert_eq!(c.raw_data(), &[0.0, 0.0, 5.0, 0.0, 0.0, 0.0]);
        assert!(matches!(c.write_sample(3, 0, 1.0), Err(Error::TrackOutOfBounds { index: 3, count: 3 })));
        assert!(matches!(
            c.write_sample(0, 0, Qvv::IDENTITY),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_sample_named() {
        let mut c = TrackCollection::new(SampleType::Transform, 2, 2, 30.0).unwrap();
        let bad = Qvv::new(DQuat::from_xyzw(0.0, 0.0, 0.0, 2.0), DVec3::ZERO, DVec3::ONE);
        c.write_sample(1, 1, bad).unwrap();
        assert!(!c.is_valid());
        assert!(matches!(c.validate(), Err(Error::InvalidSample { track: 1, sample: 1 })));
    }

    #[test]
    fn test_output_indices() {
        let mut c = TrackCollection::new(SampleType::Scalar, 3, 1, 30.0).unwrap();
        c.set_descriptor(2, ScalarDescriptor::new(Some(0))).unwrap();
        assert!(matches!(c.validate(), Err(Error::InvalidDescriptor { track: 2, .. })));

        // Strip track 1 and renumber: 0 -> 0, 2 -> 1.
        c.set_descriptor(1, ScalarDescriptor::new(None)).unwrap();
        c.set_descriptor(2, ScalarDescriptor::new(Some(1))).unwrap();
        assert!(c.is_valid());
        assert_eq!(c.output_track_count(), 2);

        // Stripped track leaves a gap at 1.
        c.set_descriptor(2, ScalarDescriptor::new(Some(2))).unwrap();
        assert!(matches!(c.validate(), Err(Error::InvalidDescriptor { track: 2, .. })));
    }

    #[test]
    fn test_parent_index() {
        let mut c = TrackCollection::new(SampleType::Transform, 2, 1, 30.0).unwrap();
        c.set_descriptor(1, TransformDescriptor::new(Some(1)).with_parent(Some(0))).unwrap();
        assert!(c.is_valid());
        c.set_descriptor(1, TransformDescriptor::new(Some(1)).with_parent(Some(1))).unwrap();
        assert!(!c.is_valid());
        c.set_descriptor(1, TransformDescriptor::new(Some(1)).with_parent(Some(5))).unwrap();
        assert!(!c.is_valid());
    }

    #[test]
    fn test_descriptor_range_reported() {
        let mut c = TrackCollection::new(SampleType::Scalar, 2, 1, 30.0).unwrap();
        c.set_descriptor(1, ScalarDescriptor::new(Some(1)).with_precision(150.0)).unwrap();
        assert!(matches!(c.validate(), Err(Error::InvalidDescriptor { track: 1, .. })));
    }

    #[test]
    fn test_sample_at() {
        let mut c = TrackCollection::new(SampleType::Scalar, 1, 3, 30.0).unwrap();
        c.write_sample(0, 1, 3.0).unwrap();
        c.write_sample(0, 2, 6.0).unwrap();
        let v = c.sample_at(0, 1.5 / 30.0, RoundingPolicy::None).unwrap();
        assert!((v.as_scalar().unwrap() - 4.5).abs() < 1e-9);
        assert_eq!(c.sample_at(0, 1.5 / 30.0, RoundingPolicy::Ceil).unwrap(), Sample::Scalar(6.0));
        assert!(matches!(
            TrackCollection::new(SampleType::Scalar, 1, 0, 30.0).unwrap().sample_at(0, 0.0, RoundingPolicy::None),
            Err(Error::EmptyTrack)
        ));
    }
}
