//! ADSR envelope: a per-sample stage machine driving voice amplitude.

use loom_core::{Frame, Sample};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Attack,
    Decay,
    Sustain,
    Release,
    Done,
}

#[derive(Debug, Clone, Copy)]
pub struct Envelope {
    attack_frames: Frame,
    decay_frames: Frame,
    sustain_level: f64,
    release_frames: Frame,
    level: f64,
    stage: EnvelopeStage,
    frames_in_stage: Frame,
    release_start_level: f64,
}

impl Envelope {
    pub fn new(attack_frames: Frame, decay_frames: Frame, sustain_level: f64, release_frames: Frame) -> Self {
        Self {
            attack_frames: attack_frames.max(0),
            decay_frames: decay_frames.max(0),
            sustain_level: sustain_level.clamp(0.0, 1.0),
            release_frames: release_frames.max(0),
            level: 0.0,
            stage: EnvelopeStage::Attack,
            frames_in_stage: 0,
            release_start_level: 0.0,
        }
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn is_done(&self) -> bool {
        self.stage == EnvelopeStage::Done
    }

    /// Forces the envelope into `Release` immediately, preserving its
    /// current level as the ramp-down start point. Used by `Cmd.Cleanup`.
    pub fn force_release(&mut self) {
        if self.stage != EnvelopeStage::Release && self.stage != EnvelopeStage::Done {
            self.stage = EnvelopeStage::Release;
            self.frames_in_stage = 0;
        }
    }

    /// Advances the envelope by one sample. `frames_until_gate_end` is the
    /// number of frames remaining before the gate releases (may be
    /// negative once past it, which forces an immediate transition to
    /// `Release`).
    pub fn next_sample(&mut self, frames_until_gate_end: Frame) -> Sample {
        if self.stage == EnvelopeStage::Sustain && frames_until_gate_end <= 0 {
            self.stage = EnvelopeStage::Release;
            self.frames_in_stage = 0;
        }

        match self.stage {
            EnvelopeStage::Attack => {
                if self.attack_frames == 0 {
                    self.level = 1.0;
                    self.stage = EnvelopeStage::Decay;
                    self.frames_in_stage = 0;
                } else {
                    self.level = (self.frames_in_stage + 1) as f64 / self.attack_frames as f64;
                    self.level = self.level.min(1.0);
                    self.frames_in_stage += 1;
                    if self.frames_in_stage >= self.attack_frames {
                        self.stage = EnvelopeStage::Decay;
                        self.frames_in_stage = 0;
                    }
                }
            }
            EnvelopeStage::Decay => {
                if self.decay_frames == 0 {
                    self.level = self.sustain_level;
                    self.stage = EnvelopeStage::Sustain;
                    self.frames_in_stage = 0;
                } else {
                    let t = (self.frames_in_stage + 1) as f64 / self.decay_frames as f64;
                    self.level = 1.0 + (self.sustain_level - 1.0) * t.min(1.0);
                    self.frames_in_stage += 1;
                    if self.frames_in_stage >= self.decay_frames {
                        self.stage = EnvelopeStage::Sustain;
                        self.frames_in_stage = 0;
                        self.level = self.sustain_level;
                    }
                }
            }
            EnvelopeStage::Sustain => {
                self.level = self.sustain_level;
            }
            EnvelopeStage::Release => {
                if self.release_frames == 0 {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Done;
                } else {
                    let start_level = if self.frames_in_stage == 0 {
                        self.level
                    } else {
                        self.release_start_level
                    };
                    self.release_start_level = start_level;
                    let t = (self.frames_in_stage + 1) as f64 / self.release_frames as f64;
                    self.level = start_level * (1.0 - t.min(1.0));
                    self.frames_in_stage += 1;
                    if self.frames_in_stage >= self.release_frames {
                        self.level = 0.0;
                        self.stage = EnvelopeStage::Done;
                    }
                }
            }
            EnvelopeStage::Done => {
                self.level = 0.0;
            }
        }

        self.level
    }
}
