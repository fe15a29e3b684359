//! A single mix bus: the renderer's unit of effect processing and the
//! target every voice addresses by integer ID.

use loom_core::{CompressorSpec, DelaySpec, DuckingSpec, PhaserSpec, ReverbSpec, Sample, StereoBuffer};
use loom_dsp::{Compressor, CompressorSettings, DelayLine, Ducking, Phaser, Reverb};

const DEACTIVATE_THRESHOLD: Sample = 1e-4;

/// Per-voice copies of the orbit-level effect specs, carried by a `Voice`
/// so the scheduler can hand them to `update_from_voice` the first time
/// this voice's orbit is touched in a block — voices never run these
/// effects themselves, the orbit does.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrbitEffectSpecs {
    pub delay: Option<DelaySpec>,
    pub reverb: Option<ReverbSpec>,
    pub phaser: Option<PhaserSpec>,
    pub compressor: Option<CompressorSpec>,
    pub ducking: Option<DuckingSpec>,
}

pub struct Orbit {
    id: usize,
    sample_rate: f64,
    mix: StereoBuffer,
    delay: DelayLine,
    reverb: Reverb,
    phaser: Phaser,
    compressor: Option<Compressor>,
    ducking: Option<Ducking>,
    duck_orbit_id: Option<usize>,
    is_active: bool,
}

impl Orbit {
    pub fn new(id: usize, sample_rate: f64, block_frames: usize) -> Self {
        Self {
            id,
            sample_rate,
            mix: StereoBuffer::new(block_frames),
            delay: DelayLine::new(sample_rate),
            reverb: Reverb::new(sample_rate),
            phaser: Phaser::new(sample_rate),
            compressor: None,
            ducking: None,
            duck_orbit_id: None,
            is_active: false,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn resize(&mut self, block_frames: usize) {
        self.mix.resize(block_frames);
    }

    pub fn mix_mut(&mut self) -> (&mut [Sample], &mut [Sample]) {
        self.mix.channels_mut()
    }

    pub fn mix(&self) -> (&[Sample], &[Sample]) {
        (self.mix.left(), self.mix.right())
    }

    pub fn duck_orbit_id(&self) -> Option<usize> {
        self.duck_orbit_id
    }

    pub fn has_ducking(&self) -> bool {
        self.ducking.is_some()
    }

    /// Re-applies effect parameters from a voice's carried specs. Idempotent
    /// within a block when called on the same specs; the scheduler restricts
    /// calls to once per orbit per block (first voice to touch it).
    pub fn update_from_voice(&mut self, specs: OrbitEffectSpecs) {
        self.is_active = true;

        if let Some(d) = specs.delay {
            self.delay.set_params(d.time_sec, d.feedback, d.amount);
        }
        if let Some(r) = specs.reverb {
            self.reverb
                .set_params(r.room, r.room_size, r.room_lp, r.room_fade, r.room_dim, r.i_response);
        }
        if let Some(p) = specs.phaser {
            self.phaser.set_params(p.rate, p.depth, p.center, p.sweep, 0.0);
        }

        self.compressor = specs.compressor.map(|c| {
            Compressor::new(
                self.sample_rate,
                CompressorSettings {
                    threshold_db: c.threshold_db,
                    ratio: c.ratio,
                    knee_db: c.knee_db,
                    attack_sec: c.attack_sec,
                    release_sec: c.release_sec,
                },
            )
        });

        match specs.ducking {
            Some(d) => {
                let mut ducking = self.ducking.take().unwrap_or_else(|| Ducking::new(self.sample_rate));
                ducking.set_params(d.attack_sec, d.depth);
                self.ducking = Some(ducking);
                self.duck_orbit_id = Some(d.orbit_id);
            }
            None => {
                self.ducking = None;
                self.duck_orbit_id = None;
            }
        }
    }

    pub fn clear(&mut self) {
        self.mix.clear();
    }

    /// Runs the insert chain: delay send, then reverb send, then phaser,
    /// then compressor. Cross-orbit ducking is applied separately by
    /// `Orbits::process_and_mix`, since it needs another orbit's buffer.
    pub fn process_effects(&mut self) {
        if !self.is_active {
            return;
        }
        let (left, right) = self.mix.channels_mut();
        self.delay.process(left, right);
        self.reverb.process(left, right);
        self.phaser.process(left, right);
        if let Some(compressor) = self.compressor.as_mut() {
            let (left, right) = self.mix.channels_mut();
            compressor.process_block(left);
            compressor.process_block(right);
        }
    }

    pub fn duck_with_sidechain(&mut self, sidechain_left: &[Sample], sidechain_right: &[Sample]) {
        if let Some(ducking) = self.ducking.as_mut() {
            let (left, right) = self.mix.channels_mut();
            ducking.process_stereo(left, right, sidechain_left, sidechain_right);
        }
    }

    /// Flips `is_active` to false iff every sample in both channels is at
    /// or below the deactivation threshold; returns the new state.
    pub fn try_deactivate(&mut self) -> bool {
        if !self.is_active {
            return false;
        }
        if self.mix.is_silent(DEACTIVATE_THRESHOLD) {
            self.is_active = false;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_orbit_stays_inactive_until_touched() {
        let orbit = Orbit::new(0, 44_100.0, 128);
        assert!(!orbit.is_active());
    }

    #[test]
    fn update_from_voice_marks_active() {
        let mut orbit = Orbit::new(0, 44_100.0, 128);
        orbit.update_from_voice(OrbitEffectSpecs::default());
        assert!(orbit.is_active());
    }

    #[test]
    fn try_deactivate_flips_off_only_when_silent() {
        let mut orbit = Orbit::new(0, 44_100.0, 4);
        orbit.update_from_voice(OrbitEffectSpecs::default());
        orbit.mix_mut().0[0] = 1.0;
        assert!(!orbit.try_deactivate());
        assert!(orbit.is_active());

        orbit.mix_mut().0[0] = 0.0;
        assert!(orbit.try_deactivate());
        assert!(!orbit.is_active());
    }

    #[test]
    fn try_deactivate_is_a_noop_once_already_inactive() {
        let mut orbit = Orbit::new(0, 44_100.0, 4);
        assert!(!orbit.try_deactivate());
    }
}
