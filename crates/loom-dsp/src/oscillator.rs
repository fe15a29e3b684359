//! Waveform generators. Each kind honours the shared contract: write
//! `length` samples into `buf` starting at `offset`, optionally modulated
//! per-sample by `phase_mod`, and return the phase to resume from next
//! call. All outputs stay within `[-1, 1]`.

use loom_core::{OscillatorKind, Sample};
use rand::Rng;
use rand::rngs::SmallRng;
use rand::SeedableRng;

const TAU: f64 = std::f64::consts::TAU;

/// Paul Kellett's pink-noise approximation filter state.
#[derive(Debug, Clone, Copy, Default)]
struct PinkFilter {
    b0: f64,
    b1: f64,
    b2: f64,
}

impl PinkFilter {
    fn step(&mut self, white: f64) -> f64 {
        self.b0 = 0.99765 * self.b0 + white * 0.0990460;
        self.b1 = 0.96300 * self.b1 + white * 0.2965164;
        self.b2 = 0.57000 * self.b2 + white * 1.0526913;
        (self.b0 + self.b1 + self.b2 + white * 0.1848) / 4.0
    }
}

pub struct Oscillator {
    kind: OscillatorKind,
    unison_voices: usize,
    unison_detune: f64,
    rng: SmallRng,
    pink: PinkFilter,
    brown: f64,
}

impl Oscillator {
    pub fn new(kind: OscillatorKind) -> Self {
        Self {
            kind,
            unison_voices: 1,
            unison_detune: 0.0,
            rng: SmallRng::seed_from_u64(0xC0FF_EE15),
            pink: PinkFilter::default(),
            brown: 0.0,
        }
    }

    pub fn with_unison(mut self, voices: usize, detune: f64) -> Self {
        self.unison_voices = voices.max(1);
        self.unison_detune = detune;
        self
    }

    pub fn with_warmth(self, f: f64) -> WarmedOscillator {
        let coeff = if f <= 0.0 { 0.0 } else { f.min(0.99) };
        WarmedOscillator {
            inner: self,
            coeff,
            state: 0.0,
        }
    }

    pub fn process(
        &mut self,
        buf: &mut [Sample],
        offset: usize,
        length: usize,
        start_phase: f64,
        phase_inc: f64,
        phase_mod: Option<&[f64]>,
    ) -> f64 {
        let end = (offset + length).min(buf.len());
        if offset >= end {
            return start_phase;
        }
        let mut phase = start_phase;

        match self.kind {
            OscillatorKind::Sine => {
                for (i, s) in buf[offset..end].iter_mut().enumerate() {
                    let inc = modulated_inc(phase_inc, phase_mod, i);
                    *s = phase.sin();
                    phase += inc;
                }
            }
            OscillatorKind::Sawtooth => {
                for (i, s) in buf[offset..end].iter_mut().enumerate() {
                    let inc = modulated_inc(phase_inc, phase_mod, i);
                    *s = naive_saw(phase);
                    phase += inc;
                }
            }
            OscillatorKind::Square => {
                for (i, s) in buf[offset..end].iter_mut().enumerate() {
                    let inc = modulated_inc(phase_inc, phase_mod, i);
                    *s = if unit_phase(phase) < 0.5 { 1.0 } else { -1.0 };
                    phase += inc;
                }
            }
            OscillatorKind::Triangle => {
                for (i, s) in buf[offset..end].iter_mut().enumerate() {
                    let inc = modulated_inc(phase_inc, phase_mod, i);
                    *s = triangle(phase);
                    phase += inc;
                }
            }
            OscillatorKind::Supersaw => {
                let voices = self.unison_voices.max(1);
                let detune = self.unison_detune;
                for (i, s) in buf[offset..end].iter_mut().enumerate() {
                    let inc = modulated_inc(phase_inc, phase_mod, i);
                    let mut sum = 0.0;
                    for v in 0..voices {
                        let spread = if voices > 1 {
                            (v as f64 / (voices - 1) as f64) * 2.0 - 1.0
                        } else {
                            0.0
                        };
                        let factor = 1.0 + spread * detune;
                        sum += naive_saw(phase * factor);
                    }
                    *s = (sum / voices as f64).clamp(-1.0, 1.0);
                    phase += inc;
                }
            }
            OscillatorKind::WhiteNoise => {
                for s in buf[offset..end].iter_mut() {
                    *s = self.rng.random_range(-1.0..=1.0);
                    phase += phase_inc;
                }
            }
            OscillatorKind::PinkNoise => {
                for s in buf[offset..end].iter_mut() {
                    let white: f64 = self.rng.random_range(-1.0..=1.0);
                    *s = self.pink.step(white).clamp(-1.0, 1.0);
                    phase += phase_inc;
                }
            }
            OscillatorKind::BrownNoise => {
                for s in buf[offset..end].iter_mut() {
                    let white: f64 = self.rng.random_range(-1.0..=1.0);
                    self.brown = (self.brown + white * 0.02).clamp(-1.0, 1.0);
                    *s = self.brown;
                    phase += phase_inc;
                }
            }
            OscillatorKind::Impulse => {
                for (i, s) in buf[offset..end].iter_mut().enumerate() {
                    let inc = modulated_inc(phase_inc, phase_mod, i);
                    let before = unit_phase(phase);
                    let after = unit_phase(phase + inc);
                    *s = if after < before { 1.0 } else { 0.0 };
                    phase += inc;
                }
            }
        }

        phase
    }
}

fn modulated_inc(phase_inc: f64, phase_mod: Option<&[f64]>, i: usize) -> f64 {
    match phase_mod {
        Some(mod_buf) => phase_inc * mod_buf.get(i).copied().unwrap_or(1.0),
        None => phase_inc,
    }
}

fn unit_phase(phase: f64) -> f64 {
    (phase / TAU).rem_euclid(1.0)
}

fn naive_saw(phase: f64) -> f64 {
    2.0 * unit_phase(phase) - 1.0
}

fn triangle(phase: f64) -> f64 {
    let t = unit_phase(phase);
    if t < 0.5 {
        4.0 * t - 1.0
    } else {
        3.0 - 4.0 * t
    }
}

/// `withWarmth` result: a one-pole low-pass wrapped around an oscillator.
pub struct WarmedOscillator {
    inner: Oscillator,
    coeff: f64,
    state: f64,
}

impl WarmedOscillator {
    pub fn process(
        &mut self,
        buf: &mut [Sample],
        offset: usize,
        length: usize,
        start_phase: f64,
        phase_inc: f64,
        phase_mod: Option<&[f64]>,
    ) -> f64 {
        let end_phase = self
            .inner
            .process(buf, offset, length, start_phase, phase_inc, phase_mod);
        if self.coeff > 0.0 {
            let end = (offset + length).min(buf.len());
            for s in buf[offset..end].iter_mut() {
                self.state = (1.0 - self.coeff) * *s + self.coeff * self.state;
                *s = self.state;
            }
        }
        end_phase
    }
}
