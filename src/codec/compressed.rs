//! Compressed buffers and decoded samples.

use byteorder::{ByteOrder, LittleEndian};

use super::context::CodecContext;
use super::driver;
use super::native::NativeModule;
use crate::arena::Handle;
use crate::core::{BufferFormat, CompressedHeader, RoundingPolicy, SampleType};
use crate::util::{Error, Qvvf, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    Unbound,
    Bound(Handle),
    Disposed,
}

/// Read-only codec output.
///
/// A buffer is decoded through the arena: [`CompressedBuffer::bind`] copies
/// it in once, and [`CompressedBuffer::dispose`] releases that copy. Both
/// transitions are one-way.
#[derive(Debug)]
pub struct CompressedBuffer {
    bytes: Vec<u8>,
    header: CompressedHeader,
    binding: Binding,
}

impl CompressedBuffer {
    /// Wrap encoder output or bytes loaded from elsewhere.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        let header = CompressedHeader::parse(&bytes)?;
        Ok(Self { bytes, header, binding: Binding::Unbound })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn header(&self) -> &CompressedHeader {
        &self.header
    }

    pub fn format(&self) -> BufferFormat {
        self.header.format
    }

    pub fn version(&self) -> u16 {
        self.header.version
    }

    pub fn track_count(&self) -> usize {
        self.header.track_count as usize
    }

    pub fn sample_count(&self) -> usize {
        self.header.sample_count as usize
    }

    pub fn sample_type(&self) -> SampleType {
        self.header.sample_type
    }

    /// Bytes per decoded sample.
    pub fn sample_size(&self) -> usize {
        self.header.sample_size()
    }

    /// Bytes needed to decode every track at once.
    pub fn output_buffer_size(&self) -> usize {
        self.header.output_buffer_size()
    }

    pub fn duration(&self) -> f64 {
        self.header.duration()
    }

    /// Check the stored size and hash against the bytes.
    pub fn verify(&self) -> bool {
        self.header.verify(&self.bytes)
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.binding, Binding::Bound(_))
    }

    pub fn is_disposed(&self) -> bool {
        self.binding == Binding::Disposed
    }

    /// Arena handle of the bound copy.
    pub fn handle(&self) -> Option<Handle> {
        match self.binding {
            Binding::Bound(handle) => Some(handle),
            _ => None,
        }
    }

    fn bound(&self) -> Result<Handle> {
        match self.binding {
            Binding::Bound(handle) => Ok(handle),
            Binding::Unbound => Err(Error::NotBound),
            Binding::Disposed => Err(Error::Disposed),
        }
    }

    /// Copy the buffer into the context's arena.
    pub fn bind<M: NativeModule>(&mut self, ctx: &CodecContext<M>) -> Result<()> {
        match self.binding {
            Binding::Bound(_) => return Err(Error::AlreadyBound),
            Binding::Disposed => return Err(Error::Disposed),
            Binding::Unbound => {}
        }
        let handle = ctx.with_arena(|arena| driver::bind(arena, ctx.config(), &self.bytes))?;
        self.binding = Binding::Bound(handle);
        Ok(())
    }

    /// Decode every track at `sample_time` seconds.
    ///
    /// Times past the end clamp to the last sample; negative or NaN times
    /// are rejected.
    pub fn decode_all<M: NativeModule>(
        &self,
        ctx: &CodecContext<M>,
        sample_time: f64,
        policy: RoundingPolicy,
    ) -> Result<DecodedTracks> {
        let handle = self.bound()?;
        let bytes = ctx.with_arena(|arena| {
            driver::decode_all(arena, ctx.config(), handle, &self.header, sample_time, policy)
        })?;
        Ok(DecodedTracks::from_bytes(self.header.sample_type, &bytes))
    }

    /// Decode track `track` at `sample_time` seconds.
    pub fn decode_one<M: NativeModule>(
        &self,
        ctx: &CodecContext<M>,
        track: usize,
        sample_time: f64,
        policy: RoundingPolicy,
    ) -> Result<DecodedSample> {
        let handle = self.bound()?;
        let bytes = ctx.with_arena(|arena| {
            driver::decode_one(arena, ctx.config(), handle, &self.header, track, sample_time, policy)
        })?;
        DecodedTracks::from_bytes(self.header.sample_type, &bytes).get(0)
    }

    /// Release the bound copy. An unbound buffer simply becomes disposed.
    pub fn dispose<M: NativeModule>(&mut self, ctx: &CodecContext<M>) -> Result<()> {
        match self.binding {
            Binding::Disposed => return Err(Error::Disposed),
            Binding::Bound(handle) => {
                ctx.with_arena(|arena| driver::unbind(arena, ctx.config(), handle))?;
            }
            Binding::Unbound => {}
        }
        self.binding = Binding::Disposed;
        Ok(())
    }
}

/// One decoded sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecodedSample {
    Transform(Qvvf),
    Scalar(f32),
}

impl DecodedSample {
    pub fn as_transform(&self) -> Option<&Qvvf> {
        match self {
            Self::Transform(qvvf) => Some(qvvf),
            Self::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::Transform(_) => None,
        }
    }
}

/// Samples of every output track at one time.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTracks {
    sample_type: SampleType,
    values: Vec<f32>,
}

impl DecodedTracks {
    fn from_bytes(sample_type: SampleType, bytes: &[u8]) -> Self {
        let mut values = vec![0.0; bytes.len() / 4];
        LittleEndian::read_f32_into(&bytes[..values.len() * 4], &mut values);
        Self { sample_type, values }
    }

    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    fn floats_per_sample(&self) -> usize {
        self.sample_type.decoded_size() / 4
    }

    pub fn len(&self) -> usize {
        self.values.len() / self.floats_per_sample()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Output as written by the codec.
    pub fn as_f32(&self) -> &[f32] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Result<DecodedSample> {
        match self.sample_type {
            SampleType::Transform => self.transform(index).map(DecodedSample::Transform),
            SampleType::Scalar => self.scalar(index).map(DecodedSample::Scalar),
        }
    }

    pub fn transform(&self, index: usize) -> Result<Qvvf> {
        let transforms = self.transforms()?;
        transforms
            .get(index)
            .copied()
            .ok_or(Error::TrackOutOfBounds { index, count: transforms.len() })
    }

    pub fn scalar(&self, index: usize) -> Result<f32> {
        if self.sample_type != SampleType::Scalar {
            return Err(Error::TypeMismatch { expected: "scalar", actual: self.sample_type.name() });
        }
        self.values
            .get(index)
            .copied()
            .ok_or(Error::TrackOutOfBounds { index, count: self.values.len() })
    }

    /// All decoded transforms.
    pub fn transforms(&self) -> Result<&[Qvvf]> {
        if self.sample_type != SampleType::Transform {
            return Err(Error::TypeMismatch { expected: "transform", actual: self.sample_type.name() });
        }
        let whole = self.values.len() - self.values.len() % self.floats_per_sample();
        Ok(bytemuck::cast_slice(&self.values[..whole]))
    }

    /// All decoded scalars.
    pub fn scalars(&self) -> Result<&[f32]> {
        if self.sample_type != SampleType::Scalar {
            return Err(Error::TypeMismatch { expected: "scalar", actual: self.sample_type.name() });
        }
        Ok(&self.values)
    }
}
