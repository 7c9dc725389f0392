//! Uniform time sampling.
//!
//! Every track is sampled at a fixed rate starting at time zero, so a
//! sample time maps to a fractional sample index by a single multiply.

use super::sample::{RoundingPolicy, SampleInterp};
use crate::util::{Error, Result};

/// Duration in seconds of a uniformly sampled track.
///
/// A single sample is a static pose and lasts forever.
pub fn track_duration(sample_count: usize, sample_rate: f64) -> f64 {
    match sample_count {
        0 => 0.0,
        1 => f64::INFINITY,
        n if sample_rate > 0.0 => (n - 1) as f64 / sample_rate,
        _ => f64::INFINITY,
    }
}

/// Clamp a query time into `[0, duration]`. NaN stays NaN.
#[inline]
pub fn clamp_sample_time(sample_time: f64, duration: f64) -> f64 {
    if sample_time.is_nan() {
        return sample_time;
    }
    sample_time.max(0.0).min(duration)
}

/// Find the two samples surrounding `sample_time` and the blend factor between them.
///
/// The caller clamps `sample_time` to the track duration; negative or NaN
/// times are rejected.
pub fn find_samples(
    sample_count: usize,
    sample_rate: f64,
    sample_time: f64,
    policy: RoundingPolicy,
) -> Result<SampleInterp> {
    if sample_count == 0 {
        return Err(Error::EmptyTrack);
    }
    if sample_time.is_nan() || sample_time < 0.0 {
        return Err(Error::InvalidSampleTime(sample_time));
    }

    let last = sample_count - 1;
    let raw_index = sample_time * sample_rate;
    let index0 = if raw_index.is_finite() {
        (raw_index.floor() as usize).min(last)
    } else {
        last
    };
    let index1 = (index0 + 1).min(last);

    let raw_alpha = if raw_index.is_finite() {
        (raw_index - index0 as f64).clamp(0.0, 1.0)
    } else {
        0.0
    };

    Ok(SampleInterp {
        index0,
        index1,
        alpha: policy.apply(raw_alpha),
    })
}

/// Uniform sampling description shared by every track of a collection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UniformSampling {
    pub sample_count: usize,
    pub sample_rate: f64,
}

impl UniformSampling {
    pub const fn new(sample_count: usize, sample_rate: f64) -> Self {
        Self { sample_count, sample_rate }
    }

    /// Duration in seconds.
    #[inline]
    pub fn duration(&self) -> f64 {
        track_duration(self.sample_count, self.sample_rate)
    }

    /// Time of a sample index.
    #[inline]
    pub fn sample_time(&self, index: usize) -> f64 {
        if self.sample_rate > 0.0 {
            index as f64 / self.sample_rate
        } else {
            0.0
        }
    }

    /// Clamp `sample_time` to the duration, then find the surrounding samples.
    pub fn find(&self, sample_time: f64, policy: RoundingPolicy) -> Result<SampleInterp> {
        if sample_time.is_nan() {
            return Err(Error::InvalidSampleTime(sample_time));
        }
        let t = clamp_sample_time(sample_time, self.duration());
        find_samples(self.sample_count, self.sample_rate, t, policy)
    }
}
