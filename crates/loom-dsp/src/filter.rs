//! The voice insert filter chain: a closed set of filter kinds behind one
//! uniform `process` entry point.

use loom_core::Sample;

use crate::biquad::{BiquadCoeffs, BiquadTdf2};
use crate::processor::{MonoProcessor, Processor};

/// A single tunable biquad stage (low-pass or high-pass) plus the
/// parameters needed to recompute its coefficients when retuned.
#[derive(Debug, Clone)]
pub struct TunableBiquad {
    stage: BiquadTdf2,
    cutoff_hz: f64,
    q: f64,
    sample_rate: f64,
    kind: TunableKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TunableKind {
    LowPass,
    HighPass,
}

impl TunableBiquad {
    fn new(kind: TunableKind, cutoff_hz: f64, q: f64, sample_rate: f64) -> Self {
        let coeffs = Self::coeffs_for(kind, cutoff_hz, q, sample_rate);
        Self {
            stage: BiquadTdf2::new(coeffs),
            cutoff_hz,
            q,
            sample_rate,
            kind,
        }
    }

    fn coeffs_for(kind: TunableKind, cutoff_hz: f64, q: f64, sample_rate: f64) -> BiquadCoeffs {
        match kind {
            TunableKind::LowPass => BiquadCoeffs::lowpass(cutoff_hz, q, sample_rate),
            TunableKind::HighPass => BiquadCoeffs::highpass(cutoff_hz, q, sample_rate),
        }
    }

    pub fn set_cutoff(&mut self, cutoff_hz: f64) {
        self.cutoff_hz = cutoff_hz;
        self.stage
            .set_coeffs(Self::coeffs_for(self.kind, self.cutoff_hz, self.q, self.sample_rate));
    }
}

/// The closed set of filter variants a voice can carry, per the
/// `LowPass | HighPass | NoOp | Chain` data model.
#[derive(Debug, Clone)]
pub enum AudioFilter {
    NoOp,
    LowPass(TunableBiquad),
    HighPass(TunableBiquad),
    Chain(Vec<AudioFilter>),
}

impl AudioFilter {
    pub fn low_pass(cutoff_hz: f64, q: f64, sample_rate: f64) -> Self {
        AudioFilter::LowPass(TunableBiquad::new(TunableKind::LowPass, cutoff_hz, q, sample_rate))
    }

    pub fn high_pass(cutoff_hz: f64, q: f64, sample_rate: f64) -> Self {
        AudioFilter::HighPass(TunableBiquad::new(TunableKind::HighPass, cutoff_hz, q, sample_rate))
    }

    /// `combine`: empty input collapses to `NoOp`, a single filter is
    /// passed through unwrapped, anything larger becomes a `Chain`.
    pub fn combine(mut filters: Vec<AudioFilter>) -> Self {
        match filters.len() {
            0 => AudioFilter::NoOp,
            1 => filters.remove(0),
            _ => AudioFilter::Chain(filters),
        }
    }

    pub fn process(&mut self, buffer: &mut [Sample], offset: usize, length: usize) {
        let end = (offset + length).min(buffer.len());
        if offset >= end {
            return;
        }
        let slice = &mut buffer[offset..end];
        match self {
            AudioFilter::NoOp => {}
            AudioFilter::LowPass(biquad) | AudioFilter::HighPass(biquad) => {
                biquad.stage.process_block(slice);
            }
            AudioFilter::Chain(stages) => {
                for stage in stages.iter_mut() {
                    stage.process(buffer, offset, length);
                }
            }
        }
    }

    pub fn set_cutoff(&mut self, cutoff_hz: f64) {
        match self {
            AudioFilter::LowPass(biquad) | AudioFilter::HighPass(biquad) => {
                biquad.set_cutoff(cutoff_hz);
            }
            AudioFilter::Chain(stages) => {
                for stage in stages.iter_mut() {
                    stage.set_cutoff(cutoff_hz);
                }
            }
            AudioFilter::NoOp => {}
        }
    }

    pub fn reset(&mut self) {
        match self {
            AudioFilter::NoOp => {}
            AudioFilter::LowPass(biquad) | AudioFilter::HighPass(biquad) => biquad.stage.reset(),
            AudioFilter::Chain(stages) => {
                for stage in stages.iter_mut() {
                    stage.reset();
                }
            }
        }
    }
}
