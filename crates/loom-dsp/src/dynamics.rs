//! Feed-forward compressor with a soft-knee gain reduction curve and a
//! settings-string parser, matching the `"thr:ratio:knee:attack:release"`
//! shorthand patterns pass around at the pattern-language boundary.

use loom_core::{Decibels, Sample};

const DEFAULT_KNEE_DB: f64 = 6.0;
const DEFAULT_ATTACK_SEC: f64 = 0.003;
const DEFAULT_RELEASE_SEC: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorSettings {
    pub threshold_db: f64,
    pub ratio: f64,
    pub knee_db: f64,
    pub attack_sec: f64,
    pub release_sec: f64,
}

/// Parses `"thr:ratio[:knee[:attack[:release]]]"`. Returns `None` on
/// malformed input; the caller falls back to a disabled/bypass compressor.
pub fn parse_settings(settings: &str) -> Option<CompressorSettings> {
    let mut parts = settings.split(':');
    let threshold_db: f64 = parts.next()?.trim().parse().ok()?;
    let ratio: f64 = parts.next()?.trim().parse().ok()?;
    let knee_db = match parts.next() {
        Some(s) if !s.trim().is_empty() => s.trim().parse().ok()?,
        _ => DEFAULT_KNEE_DB,
    };
    let attack_sec = match parts.next() {
        Some(s) if !s.trim().is_empty() => s.trim().parse().ok()?,
        _ => DEFAULT_ATTACK_SEC,
    };
    let release_sec = match parts.next() {
        Some(s) if !s.trim().is_empty() => s.trim().parse().ok()?,
        _ => DEFAULT_RELEASE_SEC,
    };
    if ratio <= 0.0 {
        return None;
    }
    Some(CompressorSettings {
        threshold_db,
        ratio,
        knee_db,
        attack_sec,
        release_sec,
    })
}

struct EnvelopeFollower {
    sample_rate: f64,
    attack_coeff: f64,
    release_coeff: f64,
    envelope: f64,
}

impl EnvelopeFollower {
    fn new(sample_rate: f64, attack_sec: f64, release_sec: f64) -> Self {
        let mut follower = Self {
            sample_rate,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            envelope: 0.0,
        };
        follower.set_times(attack_sec, release_sec);
        follower
    }

    fn set_times(&mut self, attack_sec: f64, release_sec: f64) {
        self.attack_coeff = coeff_for(attack_sec.max(1e-6), self.sample_rate);
        self.release_coeff = coeff_for(release_sec.max(1e-6), self.sample_rate);
    }

    fn step(&mut self, input: Sample) -> f64 {
        let rectified = input.abs();
        let coeff = if rectified > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = rectified + coeff * (self.envelope - rectified);
        self.envelope
    }

    fn reset(&mut self) {
        self.envelope = 0.0;
    }
}

fn coeff_for(time_sec: f64, sample_rate: f64) -> f64 {
    (-1.0 / (time_sec * sample_rate)).exp()
}

/// Computes the gain reduction in dB for a detected level, per the
/// soft-knee curve: untouched below the knee, quadratic within it, linear
/// above.
fn gain_reduction_db(level_db: f64, threshold_db: f64, ratio: f64, knee_db: f64) -> f64 {
    let knee_start = threshold_db - knee_db / 2.0;
    let knee_end = threshold_db + knee_db / 2.0;

    if level_db <= knee_start {
        0.0
    } else if level_db >= knee_end {
        let over_db = level_db - threshold_db;
        over_db * (1.0 - 1.0 / ratio)
    } else {
        let slope = 1.0 - 1.0 / ratio;
        let x = level_db - knee_start;
        (slope * x * x) / (2.0 * knee_db.max(1e-6))
    }
}

pub struct Compressor {
    settings: CompressorSettings,
    follower: EnvelopeFollower,
    makeup_gain: f64,
    mix: f64,
}

impl Compressor {
    pub fn new(sample_rate: f64, settings: CompressorSettings) -> Self {
        let follower = EnvelopeFollower::new(sample_rate, settings.attack_sec, settings.release_sec);
        Self {
            settings,
            follower,
            makeup_gain: 1.0,
            mix: 1.0,
        }
    }

    pub fn from_settings_string(sample_rate: f64, settings: &str) -> Option<Self> {
        parse_settings(settings).map(|s| Compressor::new(sample_rate, s))
    }

    pub fn set_makeup_gain(&mut self, gain: f64) {
        self.makeup_gain = gain.max(0.0);
    }

    pub fn set_mix(&mut self, mix: f64) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    pub fn process_sample(&mut self, input: Sample) -> Sample {
        let detected = self.follower.step(input);
        let level_db = Decibels::from_gain(detected).0;
        let reduction_db = gain_reduction_db(
            level_db,
            self.settings.threshold_db,
            self.settings.ratio,
            self.settings.knee_db,
        );
        let gain = Decibels(-reduction_db).to_gain() * self.makeup_gain;
        let compressed = input * gain;
        input * (1.0 - self.mix) + compressed * self.mix
    }

    pub fn process_block(&mut self, buf: &mut [Sample]) {
        for s in buf.iter_mut() {
            *s = self.process_sample(*s);
        }
    }

    pub fn reset(&mut self) {
        self.follower.reset();
    }
}

/// A stereo wrapper that links the envelope detector across both channels
/// (the peak of left/right drives both gains), matching the way this
/// codebase's stereo compressors avoid image shift.
pub struct StereoCompressor {
    left: Compressor,
    right: Compressor,
    link: bool,
}

impl StereoCompressor {
    pub fn new(sample_rate: f64, settings: CompressorSettings) -> Self {
        Self {
            left: Compressor::new(sample_rate, settings),
            right: Compressor::new(sample_rate, settings),
            link: true,
        }
    }

    pub fn set_link(&mut self, link: bool) {
        self.link = link;
    }

    pub fn process(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        if self.link {
            for (l, r) in left.iter_mut().zip(right.iter_mut()) {
                let detected = l.abs().max(r.abs());
                let level_db = Decibels::from_gain(self.left.follower.step(detected)).0;
                self.right.follower.envelope = self.left.follower.envelope;
                let reduction_db = gain_reduction_db(
                    level_db,
                    self.left.settings.threshold_db,
                    self.left.settings.ratio,
                    self.left.settings.knee_db,
                );
                let gain = Decibels(-reduction_db).to_gain() * self.left.makeup_gain;
                *l *= gain;
                *r *= gain;
            }
        } else {
            self.left.process_block(left);
            self.right.process_block(right);
        }
    }

    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}
