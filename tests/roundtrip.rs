//! Encode, bind, decode and dispose through a context backed by the reference codec.

mod common;

use acl_bridge::codec::{CodecConfig, CodecContext, CompressedBuffer, DecodedSample, ReferenceCodec};
use acl_bridge::core::{find_samples, BufferFormat, RoundingPolicy, SampleType};
use acl_bridge::track::{ScalarDescriptor, TrackCollection, TransformDescriptor};
use acl_bridge::util::{CompressFailure, DQuat, DVec3, DecompressFailure, Quat, Qvv, Qvvf};
use acl_bridge::{Error, ErrorKind};

use common::reference_context;

const EPS: f32 = 1e-5;

#[tokio::test]
async fn test_identity_roundtrip() {
    let ctx = reference_context(CodecConfig::default()).await;
    let tracks = TrackCollection::new(SampleType::Transform, 2, 3, 30.0).unwrap();

    let mut buffer = ctx.encode(&tracks).unwrap();
    assert_eq!(buffer.format(), BufferFormat::LegacyClip);
    assert_eq!(buffer.track_count(), 2);
    assert_eq!(buffer.sample_count(), 3);
    assert_eq!(buffer.output_buffer_size(), 2 * Qvvf::SIZE);
    assert!(buffer.verify());

    buffer.bind(&ctx).unwrap();
    let pose = buffer.decode_all(&ctx, 1.0 / 30.0, RoundingPolicy::None).unwrap();
    assert_eq!(pose.len(), 2);
    for qvv in pose.transforms().unwrap() {
        assert!(qvv.near_equal(&Qvvf::IDENTITY, EPS));
    }

    let interp = find_samples(3, 30.0, 1.0 / 30.0, RoundingPolicy::None).unwrap();
    assert_eq!((interp.index0, interp.index1), (1, 2));
    assert!(interp.alpha.abs() < 1e-9);

    buffer.dispose(&ctx).unwrap();
    let mut arena = ctx.arena().unwrap();
    arena.compact().unwrap();
    assert_eq!(arena.live_count(), 0);
    assert_eq!(arena.end_offset(), arena.base_offset());
}

fn assert_identity(sample: &DecodedSample, t: f64, policy: RoundingPolicy) {
    match sample {
        DecodedSample::Transform(qvvf) => assert!(
            qvvf.near_equal(&Qvvf::IDENTITY, EPS),
            "t={} policy={:?}: {:?}",
            t,
            policy,
            qvvf
        ),
        DecodedSample::Scalar(v) => assert_eq!(*v, 0.0, "t={} policy={:?}", t, policy),
    }
}

#[tokio::test]
async fn test_identity_at_any_time() {
    let ctx = reference_context(CodecConfig::default()).await;
    // Start, between samples, on a sample, the end, and past the end.
    let times = [0.0, 1.0 / 60.0, 1.0 / 30.0, 0.05, 2.0 / 30.0, 10.0];

    for sample_type in [SampleType::Transform, SampleType::Scalar] {
        let tracks = TrackCollection::new(sample_type, 2, 3, 30.0).unwrap();
        let mut buffer = ctx.encode(&tracks).unwrap();
        buffer.bind(&ctx).unwrap();

        for &t in &times {
            for policy in RoundingPolicy::ALL {
                let all = buffer.decode_all(&ctx, t, policy).unwrap();
                assert_eq!(all.len(), 2);
                for track in 0..2 {
                    let one = buffer.decode_one(&ctx, track, t, policy).unwrap();
                    assert_eq!(all.get(track).unwrap(), one);
                    assert_identity(&one, t, policy);
                }
            }
        }
        buffer.dispose(&ctx).unwrap();
    }
    assert_eq!(ctx.arena().unwrap().live_count(), 0);
}

#[tokio::test]
async fn test_interpolated_transform() {
    let ctx = reference_context(CodecConfig::default()).await;
    let mut tracks = TrackCollection::new(SampleType::Transform, 1, 2, 30.0).unwrap();
    let moved = Qvv::new(DQuat::from_rotation_z(0.5), DVec3::new(1.0, 0.0, 0.0), DVec3::ONE);
    tracks.write_sample(0, 1, moved).unwrap();

    let mut buffer = ctx.encode(&tracks).unwrap();
    buffer.bind(&ctx).unwrap();

    let halfway = buffer.decode_one(&ctx, 0, 0.5 / 30.0, RoundingPolicy::None).unwrap();
    let halfway = *halfway.as_transform().unwrap();
    assert!((halfway.translation().x - 0.5).abs() < 1e-4);
    assert!(halfway.rotation().abs_diff_eq(Quat::from_rotation_z(0.25), 1e-4));

    let floor = buffer.decode_one(&ctx, 0, 0.5 / 30.0, RoundingPolicy::Floor).unwrap();
    assert!(floor.as_transform().unwrap().near_equal(&Qvvf::IDENTITY, EPS));

    let ceil = buffer.decode_one(&ctx, 0, 0.5 / 30.0, RoundingPolicy::Ceil).unwrap();
    assert!(ceil.as_transform().unwrap().near_equal(&Qvvf::from_qvv(&moved), EPS));

    // Past the end clamps to the last sample.
    let late = buffer.decode_one(&ctx, 0, 10.0, RoundingPolicy::None).unwrap();
    assert!(late.as_transform().unwrap().near_equal(&Qvvf::from_qvv(&moved), EPS));

    buffer.dispose(&ctx).unwrap();
}

#[tokio::test]
async fn test_scalar_tracks() {
    let ctx = reference_context(CodecConfig::default()).await;
    let mut tracks = TrackCollection::new(SampleType::Scalar, 3, 4, 10.0).unwrap();
    for track in 0..3 {
        for sample in 0..4 {
            tracks.write_sample(track, sample, (track * 10 + sample) as f64).unwrap();
        }
    }

    let mut buffer = ctx.encode(&tracks).unwrap();
    assert_eq!(buffer.format(), BufferFormat::TrackList);
    buffer.bind(&ctx).unwrap();

    let values = buffer.decode_all(&ctx, 0.25, RoundingPolicy::None).unwrap();
    assert_eq!(values.sample_type(), SampleType::Scalar);
    let scalars = values.scalars().unwrap();
    assert_eq!(scalars.len(), 3);
    for (track, value) in scalars.iter().enumerate() {
        assert!((value - (track as f32 * 10.0 + 2.5)).abs() < 1e-4);
    }

    let nearest = buffer.decode_one(&ctx, 2, 0.25, RoundingPolicy::Nearest).unwrap();
    let nearest = nearest.as_scalar().unwrap();
    assert!(nearest == 22.0 || nearest == 23.0);

    buffer.dispose(&ctx).unwrap();
}

#[tokio::test]
async fn test_output_order_and_stripped_tracks() {
    let ctx = reference_context(CodecConfig::default()).await;
    let mut tracks = TrackCollection::new(SampleType::Scalar, 3, 1, 30.0).unwrap();
    for track in 0..3 {
        tracks.write_sample(track, 0, track as f64 + 1.0).unwrap();
    }
    tracks.set_descriptor(0, ScalarDescriptor::new(Some(1))).unwrap();
    tracks.set_descriptor(1, ScalarDescriptor::new(None)).unwrap();
    tracks.set_descriptor(2, ScalarDescriptor::new(Some(0))).unwrap();

    let mut buffer = ctx.encode(&tracks).unwrap();
    assert_eq!(buffer.track_count(), 2);
    buffer.bind(&ctx).unwrap();

    let values = buffer.decode_all(&ctx, 0.0, RoundingPolicy::None).unwrap();
    assert_eq!(values.scalars().unwrap(), &[3.0, 1.0]);
    assert!(matches!(
        buffer.decode_one(&ctx, 2, 0.0, RoundingPolicy::None),
        Err(Error::TrackOutOfBounds { index: 2, count: 2 })
    ));
    buffer.dispose(&ctx).unwrap();
}

#[tokio::test]
async fn test_not_ready() {
    let ctx: CodecContext<ReferenceCodec> = CodecContext::new(CodecConfig::default());
    let tracks = TrackCollection::new(SampleType::Scalar, 1, 1, 30.0).unwrap();

    let err = ctx.encode(&tracks).unwrap_err();
    assert!(matches!(err, Error::NotReady));
    assert_eq!(err.kind(), ErrorKind::NotReady);

    let ready = reference_context(CodecConfig::default()).await;
    let mut buffer = ready.encode(&tracks).unwrap();
    assert!(matches!(buffer.bind(&ctx), Err(Error::NotReady)));
    assert!(!buffer.is_bound());
}

#[tokio::test]
async fn test_binding_lifecycle() {
    let ctx = reference_context(CodecConfig::default()).await;
    let tracks = TrackCollection::new(SampleType::Transform, 1, 2, 30.0).unwrap();
    let mut buffer = ctx.encode(&tracks).unwrap();

    assert!(matches!(buffer.decode_all(&ctx, 0.0, RoundingPolicy::None), Err(Error::NotBound)));

    buffer.bind(&ctx).unwrap();
    assert!(buffer.is_bound());
    assert!(matches!(buffer.bind(&ctx), Err(Error::AlreadyBound)));
    assert_eq!(ctx.arena().unwrap().live_count(), 1);

    buffer.dispose(&ctx).unwrap();
    assert!(buffer.is_disposed());
    assert!(matches!(buffer.decode_all(&ctx, 0.0, RoundingPolicy::None), Err(Error::Disposed)));
    assert!(matches!(buffer.bind(&ctx), Err(Error::Disposed)));
    assert!(matches!(buffer.dispose(&ctx), Err(Error::Disposed)));

    let mut unbound = ctx.encode(&tracks).unwrap();
    unbound.dispose(&ctx).unwrap();
    assert!(unbound.is_disposed());
}

#[tokio::test]
async fn test_foreign_context() {
    let ctx_a = reference_context(CodecConfig::default()).await;
    let ctx_b = reference_context(CodecConfig::default()).await;
    let tracks = TrackCollection::new(SampleType::Scalar, 2, 2, 30.0).unwrap();

    let mut buffer = ctx_a.encode(&tracks).unwrap();
    buffer.bind(&ctx_a).unwrap();

    assert!(matches!(
        buffer.decode_all(&ctx_b, 0.0, RoundingPolicy::None),
        Err(Error::ForeignHandle)
    ));
    assert_eq!(ctx_b.arena().unwrap().live_count(), 0);
    assert!(matches!(buffer.dispose(&ctx_b), Err(Error::ForeignHandle)));
    assert!(buffer.is_bound());

    buffer.dispose(&ctx_a).unwrap();
}

#[tokio::test]
async fn test_invalid_sample_time() {
    let ctx = reference_context(CodecConfig::default()).await;
    let tracks = TrackCollection::new(SampleType::Scalar, 1, 2, 30.0).unwrap();
    let mut buffer = ctx.encode(&tracks).unwrap();
    buffer.bind(&ctx).unwrap();

    assert!(matches!(
        buffer.decode_all(&ctx, -1.0, RoundingPolicy::None),
        Err(Error::InvalidSampleTime(_))
    ));
    assert!(matches!(
        buffer.decode_one(&ctx, 0, f64::NAN, RoundingPolicy::None),
        Err(Error::InvalidSampleTime(_))
    ));
    assert_eq!(ctx.arena().unwrap().live_count(), 1);
    buffer.dispose(&ctx).unwrap();
}

#[tokio::test]
async fn test_empty_tracks() {
    let ctx = reference_context(CodecConfig::default()).await;
    let tracks = TrackCollection::new(SampleType::Scalar, 2, 0, 30.0).unwrap();
    let mut buffer = ctx.encode(&tracks).unwrap();
    assert_eq!(buffer.sample_count(), 0);
    buffer.bind(&ctx).unwrap();
    assert!(matches!(buffer.decode_all(&ctx, 0.0, RoundingPolicy::None), Err(Error::EmptyTrack)));
    buffer.dispose(&ctx).unwrap();
}

#[tokio::test]
async fn test_invalid_collection_never_allocates() {
    let ctx = reference_context(CodecConfig::default()).await;
    let mut tracks = TrackCollection::new(SampleType::Transform, 2, 1, 30.0).unwrap();
    tracks.set_descriptor(1, TransformDescriptor::new(Some(1)).with_parent(Some(1))).unwrap();

    let err = ctx.encode(&tracks).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let arena = ctx.arena().unwrap();
    assert_eq!(arena.live_count(), 0);
    assert_eq!(arena.end_offset(), arena.base_offset());
}

#[test]
fn test_sample_rate_ceiling() {
    assert!(matches!(
        TrackCollection::new(SampleType::Scalar, 1, 1, 10000.0),
        Err(Error::InvalidSampleRate(_))
    ));
    assert!(TrackCollection::new(SampleType::Scalar, 1, 1, 9999.0).is_ok());
}

#[tokio::test]
async fn test_compress_failure_rolls_back() {
    let ctx = reference_context(CodecConfig::default().with_min_output_reserve(0)).await;
    let tracks = TrackCollection::new(SampleType::Scalar, 1, 1, 30.0).unwrap();

    let err = ctx.encode(&tracks).unwrap_err();
    assert!(matches!(err, Error::Compress(CompressFailure::BufferTooSmall)));
    assert_eq!(err.kind(), ErrorKind::Boundary);

    let arena = ctx.arena().unwrap();
    assert_eq!(arena.live_count(), 0);
    assert_eq!(arena.end_offset(), arena.base_offset());
}

#[tokio::test]
async fn test_corrupted_buffer() {
    let ctx = reference_context(CodecConfig::default()).await;
    let tracks = TrackCollection::new(SampleType::Scalar, 1, 2, 30.0).unwrap();
    let mut bytes = ctx.encode(&tracks).unwrap().into_bytes();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;

    let mut buffer = CompressedBuffer::from_bytes(bytes).unwrap();
    assert!(!buffer.verify());
    buffer.bind(&ctx).unwrap();
    assert!(matches!(
        buffer.decode_all(&ctx, 0.0, RoundingPolicy::None),
        Err(Error::Decompress(DecompressFailure::CorruptedData))
    ));
    assert_eq!(ctx.arena().unwrap().live_count(), 1);
    buffer.dispose(&ctx).unwrap();
}

#[test]
fn test_malformed_header() {
    assert!(matches!(CompressedBuffer::from_bytes(vec![0u8; 64]), Err(Error::UnrecognizedFormat)));
}

#[tokio::test]
async fn test_bound_buffer_survives_growth() {
    let ctx = reference_context(CodecConfig::default()).await;
    let mut small = TrackCollection::new(SampleType::Scalar, 1, 2, 30.0).unwrap();
    small.write_sample(0, 1, 4.0).unwrap();
    let mut buffer = ctx.encode(&small).unwrap();
    buffer.bind(&ctx).unwrap();

    // 80 000 bytes of raw samples force the memory past its first page.
    let large = TrackCollection::new(SampleType::Transform, 10, 100, 30.0).unwrap();
    let mut large = ctx.encode(&large).unwrap();
    large.bind(&ctx).unwrap();

    let value = buffer.decode_one(&ctx, 0, 1.0 / 60.0, RoundingPolicy::None).unwrap();
    assert!((value.as_scalar().unwrap() - 2.0).abs() < 1e-4);

    large.dispose(&ctx).unwrap();
    buffer.dispose(&ctx).unwrap();
    assert_eq!(ctx.arena().unwrap().live_count(), 0);
}
