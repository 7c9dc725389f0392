//! Host-resident codec module.
//!
//! [`ReferenceCodec`] implements the native entry points over a
//! [`HostMemory`] with the same argument checks and status codes as the
//! compiled module. It does not compress: samples are stored as 32-bit
//! floats behind a regular buffer header, and decoding blends the two
//! samples chosen by the sampling engine. Stripped tracks are dropped and
//! the rest are stored in output index order.

use byteorder::{ByteOrder, LittleEndian};
use tracing::trace;

use super::config::CodecConfig;
use super::native::NativeModule;
use crate::arena::{HostMemory, LinearMemory, Region};
use crate::core::{
    buffer_hash, clamp_sample_time, find_samples, BufferFormat, CompressedHeader, RoundingPolicy,
    SampleInterp, SampleType,
};
use crate::track::{TrackDescriptor, METADATA_HEADER_LEN};
use crate::util::{lerp, Qvv, Qvvf, Result};

/// Bytes below this offset are reserved, like a module's static data.
pub const REFERENCE_HEAP_BASE: usize = 1024;

/// Format version written into every header.
pub const REFERENCE_FORMAT_VERSION: u16 = 1;

const INITIAL_PAGES: usize = 1;

/// Status code returned by a failed check.
type Code = i32;

const INVALID_METADATA_SIZE: Code = -1;
const INVALID_RAW_SIZE: Code = -2;
const COMPRESSION_FAILED: Code = -3;
const BUFFER_TOO_SMALL: Code = -4;
const UNSUPPORTED_SAMPLE_TYPE: Code = 0;

const INVALID_BUFFER: Code = -1;
const CORRUPTED_DATA: Code = -2;
const OUTPUT_TOO_SMALL: Code = -3;
const OUTPUT_MISALIGNED: Code = -4;
const INVALID_TRACK_INDEX: Code = -5;

/// Lossless stand-in for the compiled codec.
#[derive(Debug)]
pub struct ReferenceCodec {
    memory: HostMemory,
}

impl ReferenceCodec {
    pub fn new(config: &CodecConfig) -> Self {
        Self {
            memory: HostMemory::new(INITIAL_PAGES, REFERENCE_HEAP_BASE, config.max_memory_pages as usize),
        }
    }

    /// Loader for [`super::CodecContext::initialize`].
    pub async fn load(config: CodecConfig) -> Result<Self> {
        Ok(Self::new(&config))
    }

    pub fn memory(&self) -> &HostMemory {
        &self.memory
    }

    fn try_compress(&self, metadata: Region, raw: Region) -> std::result::Result<Vec<u8>, Code> {
        let data = self.memory.data();
        let meta_bytes = data.get(metadata.range()).ok_or(INVALID_METADATA_SIZE)?;
        if meta_bytes.len() < METADATA_HEADER_LEN * 8 || meta_bytes.len() % 8 != 0 {
            return Err(INVALID_METADATA_SIZE);
        }
        let mut meta = vec![0.0; meta_bytes.len() / 8];
        LittleEndian::read_f64_into(meta_bytes, &mut meta);

        let sample_type = SampleType::from_tag(meta[1]).ok_or(UNSUPPORTED_SAMPLE_TYPE)?;
        let track_count = as_count(meta[0]).ok_or(INVALID_METADATA_SIZE)?;
        let sample_count = as_count(meta[2]).ok_or(INVALID_METADATA_SIZE)?;
        let sample_rate = meta[3];
        let descriptor_len = sample_type.descriptor_len();
        if meta.len() != METADATA_HEADER_LEN + track_count * descriptor_len {
            return Err(INVALID_METADATA_SIZE);
        }

        let track_len = sample_count * sample_type.raw_sample_len();
        let raw_len = track_count * track_len * 8;
        let raw_bytes = data
            .get(raw.range())
            .and_then(|bytes| bytes.get(..raw_len))
            .ok_or(INVALID_RAW_SIZE)?;
        let mut samples = vec![0.0; raw_len / 8];
        LittleEndian::read_f64_into(raw_bytes, &mut samples);

        let mut outputs = Vec::with_capacity(track_count);
        for track in 0..track_count {
            let start = METADATA_HEADER_LEN + track * descriptor_len;
            let descriptor = TrackDescriptor::read(sample_type, track, &meta[start..start + descriptor_len])
                .map_err(|_| COMPRESSION_FAILED)?;
            if !descriptor.is_valid() {
                return Err(COMPRESSION_FAILED);
            }
            if let Some(output) = descriptor.output_index() {
                outputs.push((output, track));
            }
        }
        outputs.sort_unstable();

        let format = BufferFormat::for_sample_type(sample_type);
        if format == BufferFormat::LegacyClip && outputs.len() > u16::MAX as usize {
            return Err(COMPRESSION_FAILED);
        }

        let header = CompressedHeader {
            format,
            size: 0,
            hash: 0,
            version: REFERENCE_FORMAT_VERSION,
            algorithm: 0,
            track_count: outputs.len() as u32,
            segment_count: u32::from(format == BufferFormat::LegacyClip),
            sample_count: sample_count as u32,
            sample_rate: sample_rate as f32,
            has_scale: format == BufferFormat::LegacyClip,
            sample_type,
        };

        let payload: Vec<f32> = outputs
            .iter()
            .flat_map(|&(_, track)| &samples[track * track_len..(track + 1) * track_len])
            .map(|&v| v as f32)
            .collect();

        let mut out = Vec::with_capacity(format.header_size() + payload.len() * 4);
        header.write_to(&mut out);
        let header_size = out.len();
        out.resize(header_size + payload.len() * 4, 0);
        LittleEndian::write_f32_into(&payload, &mut out[header_size..]);

        if out.len() > raw.len as usize {
            return Err(BUFFER_TOO_SMALL);
        }
        if out.len() > i32::MAX as usize {
            return Err(COMPRESSION_FAILED);
        }
        let size = out.len() as u32;
        LittleEndian::write_u32(&mut out[0..4], size);
        let hash = buffer_hash(&out);
        LittleEndian::write_u32(&mut out[4..8], hash);
        Ok(out)
    }

    /// Parse and verify the buffer in `region`.
    fn open(&self, region: Region) -> std::result::Result<(CompressedHeader, &[u8]), Code> {
        let bytes = self.memory.data().get(region.range()).ok_or(INVALID_BUFFER)?;
        let header = CompressedHeader::parse(bytes).map_err(|_| INVALID_BUFFER)?;
        let size = header.size as usize;
        if size > bytes.len() {
            return Err(INVALID_BUFFER);
        }
        if !header.verify(bytes) {
            return Err(CORRUPTED_DATA);
        }
        let expected = header.format.header_size()
            + header.track_count as usize * header.sample_count as usize * header.sample_type.raw_sample_len() * 4;
        if size != expected {
            return Err(CORRUPTED_DATA);
        }
        Ok((header, &bytes[header.format.header_size()..size]))
    }

    fn check_output(&self, header: &CompressedHeader, output: Region, tracks: usize) -> std::result::Result<(), Code> {
        let needed = tracks * header.sample_size();
        if (output.len as usize) < needed || output.end() as usize > self.memory.len() {
            return Err(OUTPUT_TOO_SMALL);
        }
        let alignment = match header.sample_type {
            SampleType::Transform => 16,
            SampleType::Scalar => 4,
        };
        if output.offset as usize % alignment != 0 {
            return Err(OUTPUT_MISALIGNED);
        }
        Ok(())
    }

    fn try_decompress(
        &self,
        buffer: Region,
        sample_time: f32,
        policy: i32,
        track: Option<i32>,
        output: Region,
    ) -> std::result::Result<Vec<u8>, Code> {
        let (header, payload) = self.open(buffer)?;
        let policy = RoundingPolicy::from_i32(policy).ok_or(INVALID_BUFFER)?;

        let tracks = match track {
            Some(index) => {
                let index = usize::try_from(index).map_err(|_| INVALID_TRACK_INDEX)?;
                if index >= header.track_count as usize {
                    return Err(INVALID_TRACK_INDEX);
                }
                index..index + 1
            }
            None => 0..header.track_count as usize,
        };
        self.check_output(&header, output, tracks.len())?;

        let t = clamp_sample_time(sample_time as f64, header.duration());
        let interp = find_samples(header.sample_count as usize, header.sample_rate as f64, t, policy)
            .map_err(|_| INVALID_BUFFER)?;
        trace!("ReferenceCodec::decompress: t={} -> {:?}", t, interp);

        let mut values = Vec::with_capacity(tracks.len() * Qvvf::SIZE / 4);
        for track in tracks {
            decode_sample(&header, payload, track, &interp, &mut values);
        }
        let mut out = vec![0u8; values.len() * 4];
        LittleEndian::write_f32_into(&values, &mut out);
        Ok(out)
    }

    fn store(&mut self, output: Region, bytes: &[u8]) {
        let start = output.offset as usize;
        self.memory.data_mut()[start..start + bytes.len()].copy_from_slice(bytes);
    }
}

fn as_count(value: f64) -> Option<usize> {
    (value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64).then_some(value as usize)
}

/// Append the decoded sample of `track` to `values`.
fn decode_sample(header: &CompressedHeader, payload: &[u8], track: usize, interp: &SampleInterp, values: &mut Vec<f32>) {
    let floats = header.sample_type.raw_sample_len();
    let read = |sample: usize| -> Vec<f64> {
        let start = (track * header.sample_count as usize + sample) * floats * 4;
        let mut buf = vec![0.0f32; floats];
        LittleEndian::read_f32_into(&payload[start..start + floats * 4], &mut buf);
        buf.into_iter().map(f64::from).collect()
    };

    let first = read(interp.index0);
    let second = read(interp.index1);
    match header.sample_type {
        SampleType::Transform => {
            let blended = Qvv::from_slice(&first).blend(&Qvv::from_slice(&second), interp.alpha);
            let qvvf = Qvvf::from_qvv(&blended);
            values.extend_from_slice(bytemuck::cast_slice::<Qvvf, f32>(std::slice::from_ref(&qvvf)));
        }
        SampleType::Scalar => values.push(lerp(first[0], second[0], interp.alpha) as f32),
    }
}

impl LinearMemory for ReferenceCodec {
    fn data(&self) -> &[u8] {
        self.memory.data()
    }

    fn data_mut(&mut self) -> &mut [u8] {
        self.memory.data_mut()
    }

    fn grow(&mut self, min_len: usize) -> Result<()> {
        self.memory.grow(min_len)
    }

    fn heap_base(&self) -> usize {
        self.memory.heap_base()
    }
}

impl NativeModule for ReferenceCodec {
    fn compress(&mut self, metadata: Region, raw: Region) -> Result<i32> {
        Ok(match self.try_compress(metadata, raw) {
            Ok(bytes) => {
                self.store(raw, &bytes);
                bytes.len() as i32
            }
            Err(code) => code,
        })
    }

    fn decompress_tracks(&mut self, buffer: Region, sample_time: f32, policy: i32, output: Region) -> Result<i32> {
        Ok(match self.try_decompress(buffer, sample_time, policy, None, output) {
            Ok(bytes) => {
                self.store(output, &bytes);
                0
            }
            Err(code) => code,
        })
    }

    fn decompress_track(
        &mut self,
        buffer: Region,
        sample_time: f32,
        policy: i32,
        track_index: i32,
        output: Region,
    ) -> Result<i32> {
        Ok(match self.try_decompress(buffer, sample_time, policy, Some(track_index), output) {
            Ok(bytes) => {
                self.store(output, &bytes);
                0
            }
            Err(code) => code,
        })
    }
}
