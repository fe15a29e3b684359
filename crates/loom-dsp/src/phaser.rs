//! Orbit insert phaser: an LFO-swept allpass chain, built from the same
//! biquad allpass coefficients used elsewhere plus the sine-LFO modulation
//! idiom shared with the modulated delay lines.

use loom_core::Sample;

use crate::biquad::{BiquadCoeffs, BiquadTdf2};
use crate::processor::{MonoProcessor, Processor};

pub const DISABLE_THRESHOLD: f64 = 0.01;
const STAGES: usize = 4;

pub struct Phaser {
    sample_rate: f64,
    stages: [BiquadTdf2; STAGES],
    feedback_state: f64,
    lfo_phase: f64,
    rate: f64,
    depth: f64,
    center: f64,
    sweep: f64,
    feedback: f64,
}

impl Phaser {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            stages: std::array::from_fn(|_| BiquadTdf2::bypass()),
            feedback_state: 0.0,
            lfo_phase: 0.0,
            rate: 0.5,
            depth: 0.0,
            center: 1000.0,
            sweep: 800.0,
            feedback: 0.0,
        }
    }

    pub fn set_params(&mut self, rate: f64, depth: f64, center: f64, sweep: f64, feedback: f64) {
        self.rate = rate.max(0.0);
        self.depth = depth.clamp(0.0, 1.0);
        self.center = center.max(20.0);
        self.sweep = sweep.max(0.0);
        self.feedback = feedback.clamp(0.0, 0.9);
    }

    pub fn is_enabled(&self) -> bool {
        self.depth >= DISABLE_THRESHOLD
    }

    pub fn process(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        if !self.is_enabled() {
            return;
        }
        let lfo_inc = 2.0 * std::f64::consts::PI * self.rate / self.sample_rate;
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let lfo = self.lfo_phase.sin();
            let freq = (self.center + lfo * self.sweep * self.depth).max(20.0);
            let coeffs = BiquadCoeffs::allpass(freq, 0.7, self.sample_rate);
            for stage in self.stages.iter_mut() {
                stage.set_coeffs(coeffs);
            }

            let mono_in = (*l + *r) * 0.5 + self.feedback_state * self.feedback;
            let mut wet = mono_in;
            for stage in self.stages.iter_mut() {
                wet = stage.process_sample(wet);
            }
            self.feedback_state = wet;

            let mixed = mono_in * (1.0 - self.depth) + wet * self.depth;
            *l = *l * (1.0 - self.depth) + mixed * self.depth;
            *r = *r * (1.0 - self.depth) + mixed * self.depth;

            self.lfo_phase += lfo_inc;
            if self.lfo_phase > std::f64::consts::TAU {
                self.lfo_phase -= std::f64::consts::TAU;
            }
        }
    }

    pub fn reset(&mut self) {
        for stage in self.stages.iter_mut() {
            stage.reset();
        }
        self.feedback_state = 0.0;
        self.lfo_phase = 0.0;
    }
}
