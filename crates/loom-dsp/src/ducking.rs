//! Cross-orbit sidechain ducking: a mono envelope follower on the sidechain
//! signal reduces the target orbit's level proportionally to `depth`.

use loom_core::Sample;

fn settle_coeff(settle_sec: f64, sample_rate: f64) -> f64 {
    (-6.908 / (settle_sec.max(1e-6) * sample_rate)).exp()
}

pub struct Ducking {
    sample_rate: f64,
    attack_coeff: f64,
    release_coeff: f64,
    depth: f64,
    envelope: f64,
}

impl Ducking {
    pub fn new(sample_rate: f64) -> Self {
        let mut ducking = Self {
            sample_rate,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            depth: 0.0,
            envelope: 0.0,
        };
        ducking.set_params(0.0, 0.0);
        ducking
    }

    pub fn set_params(&mut self, attack_sec: f64, depth: f64) {
        // Coefficients are tuned so the envelope reaches ~99.9% of its
        // target within `attack_sec`, matching "attack" being read as a
        // settle time rather than a single RC time constant. Release
        // relaxes four times slower than attack.
        self.attack_coeff = settle_coeff(attack_sec, self.sample_rate);
        self.release_coeff = settle_coeff(attack_sec * 4.0, self.sample_rate);
        self.depth = depth.clamp(0.0, 1.0);
    }

    pub fn is_enabled(&self) -> bool {
        self.depth > 0.0
    }

    /// `input` is the target (ducked) channel; `sidechain` is the
    /// triggering signal. Both are processed in place for `input`.
    pub fn process(&mut self, input: &mut [Sample], sidechain: &[Sample]) {
        if !self.is_enabled() {
            return;
        }
        for (x, &sc) in input.iter_mut().zip(sidechain.iter()) {
            let rectified = sc.abs();
            let coeff = if rectified > self.envelope {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope = rectified + coeff * (self.envelope - rectified);
            let gain = 1.0 - self.depth * self.envelope.min(1.0);
            *x *= gain;
        }
    }

    /// Stereo variant sharing a single mono sidechain envelope across both
    /// channels, advanced once per frame (not once per channel), so the
    /// left and right gains at a given frame always agree.
    pub fn process_stereo(
        &mut self,
        left: &mut [Sample],
        right: &mut [Sample],
        sidechain_left: &[Sample],
        sidechain_right: &[Sample],
    ) {
        if !self.is_enabled() {
            return;
        }
        for i in 0..left.len().min(right.len()).min(sidechain_left.len()).min(sidechain_right.len()) {
            let rectified = sidechain_left[i].abs().max(sidechain_right[i].abs());
            let coeff = if rectified > self.envelope {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope = rectified + coeff * (self.envelope - rectified);
            let gain = 1.0 - self.depth * self.envelope.min(1.0);
            left[i] *= gain;
            right[i] *= gain;
        }
    }

    pub fn reset(&mut self) {
        self.envelope = 0.0;
    }
}
