//! Planner-visible, immutable voice parameterisation (data model only — the
//! renderer's polymorphic `Voice` lives in `loom-voice` and is built from
//! these types at scheduling time).

use crate::time::Frame;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adsr {
    pub attack_sec: f64,
    pub decay_sec: f64,
    pub sustain_level: f64,
    pub release_sec: f64,
}

impl Adsr {
    pub fn release_frames(&self, sample_rate: f64) -> Frame {
        (self.release_sec.max(0.0) * sample_rate).round() as Frame
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterSpec {
    LowPass { cutoff_hz: f64, q: f64 },
    HighPass { cutoff_hz: f64, q: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelaySpec {
    pub time_sec: f64,
    pub feedback: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbSpec {
    pub room: f64,
    pub room_size: f64,
    pub room_lp: f64,
    pub room_fade: f64,
    pub room_dim: f64,
    pub i_response: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaserSpec {
    pub rate: f64,
    pub depth: f64,
    pub center: f64,
    pub sweep: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VibratoSpec {
    pub rate: f64,
    pub depth: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorSpec {
    pub threshold_db: f64,
    pub ratio: f64,
    pub knee_db: f64,
    pub attack_sec: f64,
    pub release_sec: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuckingSpec {
    pub orbit_id: usize,
    pub attack_sec: f64,
    pub depth: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnisonSpec {
    pub voices: usize,
    pub detune: f64,
    pub spread: f64,
}

/// What oscillator (or sampler) the voice should render from.
#[derive(Debug, Clone, PartialEq)]
pub enum SoundSource {
    Oscillator(OscillatorKind),
    Sample(SampleRequest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OscillatorKind {
    Sine,
    Sawtooth,
    Square,
    Triangle,
    Supersaw,
    WhiteNoise,
    PinkNoise,
    BrownNoise,
    Impulse,
}

/// A request against the (external) sample registry, per §4.7.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleRequest {
    pub bank: Option<String>,
    pub sound: Option<String>,
    pub note: Option<f64>,
    pub index: Option<usize>,
}

/// The full, immutable parameterisation of a voice as produced by the
/// planner. One `VoiceData` may spawn one or more renderer `Voice`s when
/// `unison` is present.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceData {
    pub source: SoundSource,
    pub freq_hz: Option<f64>,
    pub adsr: Adsr,
    pub filters: Vec<FilterSpec>,
    pub pan: f64,
    pub gain: f64,
    pub orbit_id: usize,
    pub delay: Option<DelaySpec>,
    pub reverb: Option<ReverbSpec>,
    pub phaser: Option<PhaserSpec>,
    pub vibrato: Option<VibratoSpec>,
    pub compressor: Option<CompressorSpec>,
    pub ducking: Option<DuckingSpec>,
    pub unison: Option<UnisonSpec>,
    pub warmth: Option<f64>,
}

impl VoiceData {
    /// Clamps pan into `[-1, 1]` and gain into `[0, ∞)`, as required by the
    /// data model invariants.
    pub fn normalized(mut self) -> Self {
        self.pan = self.pan.clamp(-1.0, 1.0);
        self.gain = self.gain.max(0.0);
        if let Some(w) = self.warmth {
            self.warmth = Some(w.clamp(0.0, 0.999_999));
        }
        self
    }
}

/// A voice as scheduled by the planner, still in planner time units
/// (seconds). Converted to frame counts by the scheduler at `scheduleVoice`
/// time.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledVoice {
    pub playback_id: String,
    pub data: VoiceData,
    pub start_time: f64,
    pub gate_end_time: f64,
    pub playback_start_time: f64,
}

impl ScheduledVoice {
    pub fn start_frame(&self, sample_rate: f64) -> Frame {
        crate::time::seconds_to_frame(self.start_time, sample_rate)
    }

    pub fn gate_end_frame(&self, sample_rate: f64) -> Frame {
        crate::time::seconds_to_frame(self.gate_end_time, sample_rate)
    }

    pub fn end_frame(&self, sample_rate: f64) -> Frame {
        self.gate_end_frame(sample_rate) + self.data.adsr.release_frames(sample_rate)
    }
}
