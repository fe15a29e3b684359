//! The renderer's polymorphic voice: a closed `Synth`/`Sample` variant set
//! sharing one insert filter, one envelope, and one render contract.

use loom_core::{Adsr, Frame, Sample as Sig, VibratoSpec};
use loom_dsp::{AudioFilter, Envelope, Oscillator};
use loom_orbit::OrbitEffectSpecs;

use crate::sample_index::SampleDescriptor;

/// The slice of an orbit's mix buffer a voice is allowed to touch during a
/// render call. Borrowed for the duration of that call only.
pub struct RenderTarget<'a> {
    pub mix_left: &'a mut [Sig],
    pub mix_right: &'a mut [Sig],
}

struct Vibrato {
    rate: f64,
    depth: f64,
    phase: f64,
}

impl Vibrato {
    fn from_spec(spec: Option<VibratoSpec>) -> Self {
        match spec {
            Some(s) => Self {
                rate: s.rate.max(0.0),
                depth: s.depth.max(0.0),
                phase: 0.0,
            },
            None => Self {
                rate: 0.0,
                depth: 0.0,
                phase: 0.0,
            },
        }
    }

    fn is_enabled(&self) -> bool {
        self.depth > 0.0
    }

    /// Fills `mod_scratch[..length]` with per-sample phase-rate multipliers.
    fn fill(&mut self, mod_scratch: &mut [f64], length: usize, sample_rate: f64) {
        let inc = std::f64::consts::TAU * self.rate / sample_rate;
        for slot in mod_scratch.iter_mut().take(length) {
            *slot = 1.0 + self.depth * self.phase.sin();
            self.phase += inc;
            if self.phase > std::f64::consts::TAU {
                self.phase -= std::f64::consts::TAU;
            }
        }
    }
}

struct VoiceShared {
    playback_id: String,
    orbit_id: usize,
    start_frame: Frame,
    gate_end_frame: Frame,
    end_frame: Frame,
    gain: f64,
    pan: f64,
    filter: AudioFilter,
    envelope: Envelope,
    vibrato: Vibrato,
    orbit_effects: OrbitEffectSpecs,
}

impl VoiceShared {
    fn finished(&self, block_start: Frame) -> bool {
        self.envelope.is_done() || block_start >= self.end_frame
    }

    /// Pan law: constant power, `pan` in `[-1, 1]`.
    fn pan_gains(&self) -> (f64, f64) {
        let theta = (self.pan.clamp(-1.0, 1.0) + 1.0) * std::f64::consts::FRAC_PI_4;
        (theta.cos(), theta.sin())
    }

    fn force_release(&mut self) {
        self.envelope.force_release();
    }
}

pub struct SynthVoice {
    shared: VoiceShared,
    oscillator: Oscillator,
    freq_hz: f64,
    phase: f64,
    sample_rate: f64,
}

pub struct SampleVoice {
    shared: VoiceShared,
    descriptor: SampleDescriptor,
    ratio: f64,
    read_pos: f64,
}

pub enum Voice {
    Synth(SynthVoice),
    Sample(SampleVoice),
}

#[allow(clippy::too_many_arguments)]
pub struct VoiceParams {
    pub playback_id: String,
    pub orbit_id: usize,
    pub start_frame: Frame,
    pub gate_end_frame: Frame,
    pub end_frame: Frame,
    pub gain: f64,
    pub pan: f64,
    pub filter: AudioFilter,
    pub adsr: Adsr,
    pub vibrato: Option<VibratoSpec>,
    pub orbit_effects: OrbitEffectSpecs,
    pub sample_rate: f64,
}

impl VoiceParams {
    fn into_shared(self) -> VoiceShared {
        let envelope = Envelope::new(
            (self.adsr.attack_sec.max(0.0) * self.sample_rate).round() as Frame,
            (self.adsr.decay_sec.max(0.0) * self.sample_rate).round() as Frame,
            self.adsr.sustain_level,
            self.adsr.release_frames(self.sample_rate),
        );
        VoiceShared {
            playback_id: self.playback_id,
            orbit_id: self.orbit_id,
            start_frame: self.start_frame,
            gate_end_frame: self.gate_end_frame,
            end_frame: self.end_frame,
            gain: self.gain,
            pan: self.pan,
            filter: self.filter,
            envelope,
            vibrato: Vibrato::from_spec(self.vibrato),
            orbit_effects: self.orbit_effects,
        }
    }
}

impl Voice {
    pub fn new_synth(params: VoiceParams, oscillator: Oscillator, freq_hz: f64) -> Self {
        let sample_rate = params.sample_rate;
        Voice::Synth(SynthVoice {
            shared: params.into_shared(),
            oscillator,
            freq_hz,
            phase: 0.0,
            sample_rate,
        })
    }

    pub fn new_sample(params: VoiceParams, descriptor: SampleDescriptor, ratio: f64) -> Self {
        Voice::Sample(SampleVoice {
            shared: params.into_shared(),
            descriptor,
            ratio,
            read_pos: 0.0,
        })
    }

    fn shared(&self) -> &VoiceShared {
        match self {
            Voice::Synth(v) => &v.shared,
            Voice::Sample(v) => &v.shared,
        }
    }

    fn shared_mut(&mut self) -> &mut VoiceShared {
        match self {
            Voice::Synth(v) => &mut v.shared,
            Voice::Sample(v) => &mut v.shared,
        }
    }

    pub fn orbit_id(&self) -> usize {
        self.shared().orbit_id
    }

    pub fn playback_id(&self) -> &str {
        &self.shared().playback_id
    }

    pub fn start_frame(&self) -> Frame {
        self.shared().start_frame
    }

    pub fn end_frame(&self) -> Frame {
        self.shared().end_frame
    }

    pub fn orbit_effects(&self) -> OrbitEffectSpecs {
        self.shared().orbit_effects
    }

    pub fn force_release(&mut self) {
        self.shared_mut().force_release();
    }

    /// Renders the overlap of `[blockStart, blockStart+blockFrames)` with
    /// this voice's lifetime into `target`, returning `true` iff the voice
    /// is finished (envelope done or past `endFrame`) and may be dropped.
    pub fn render(
        &mut self,
        target: &mut RenderTarget,
        scratch: &mut [Sig],
        mod_scratch: &mut [f64],
        block_start: Frame,
        block_frames: usize,
    ) -> bool {
        let end_of_block = block_start + block_frames as Frame;
        if self.shared().finished(block_start) || end_of_block <= self.shared().start_frame {
            return self.shared().finished(block_start);
        }

        let local_start = (self.shared().start_frame - block_start).max(0) as usize;
        let local_end = (self.shared().end_frame - block_start).clamp(0, block_frames as Frame) as usize;
        if local_start >= local_end {
            return self.shared().finished(block_start);
        }
        let length = local_end - local_start;

        match self {
            Voice::Synth(v) => v.render_into(scratch, mod_scratch, local_start, length),
            Voice::Sample(v) => v.render_into(scratch, local_start, length),
        }

        let shared = self.shared_mut();
        shared.filter.process(scratch, local_start, length);

        let gate_end = shared.gate_end_frame;
        let (pan_l, pan_r) = shared.pan_gains();
        let gain = shared.gain;
        for i in local_start..local_end {
            let frame = block_start + i as Frame;
            let frames_until_gate_end = gate_end - frame;
            let env = shared.envelope.next_sample(frames_until_gate_end);
            let sample = scratch[i] * gain * env;
            target.mix_left[i] += sample * pan_l;
            target.mix_right[i] += sample * pan_r;
        }

        self.shared().finished(block_start)
    }
}

impl SynthVoice {
    fn render_into(&mut self, scratch: &mut [Sig], mod_scratch: &mut [f64], offset: usize, length: usize) {
        let phase_inc = std::f64::consts::TAU * self.freq_hz / self.sample_rate;
        let phase_mod = if self.shared.vibrato.is_enabled() {
            self.shared.vibrato.fill(mod_scratch, length, self.sample_rate);
            Some(&mod_scratch[..length])
        } else {
            None
        };
        self.phase = self
            .oscillator
            .process(scratch, offset, length, self.phase, phase_inc, phase_mod);
    }
}

impl SampleVoice {
    fn render_into(&mut self, scratch: &mut [Sig], offset: usize, length: usize) {
        let pcm = &self.descriptor.pcm.pcm;
        let end = (offset + length).min(scratch.len());
        for slot in scratch[offset..end].iter_mut() {
            *slot = read_linear(pcm, self.read_pos);
            self.read_pos += self.ratio;
        }
    }
}

fn read_linear(pcm: &[f32], pos: f64) -> Sig {
    if pcm.is_empty() {
        return 0.0;
    }
    let idx0 = pos.floor() as usize;
    if idx0 + 1 >= pcm.len() {
        return *pcm.last().unwrap() as Sig;
    }
    let frac = pos - pos.floor();
    let a = pcm[idx0] as f64;
    let b = pcm[idx0 + 1] as f64;
    a * (1.0 - frac) + b * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_core::{MonoSamplePcm, OscillatorKind};

    fn default_params(sample_rate: f64, start: Frame, gate_end: Frame, end: Frame) -> VoiceParams {
        VoiceParams {
            playback_id: "test".into(),
            orbit_id: 0,
            start_frame: start,
            gate_end_frame: gate_end,
            end_frame: end,
            gain: 1.0,
            pan: 0.0,
            filter: AudioFilter::NoOp,
            adsr: Adsr {
                attack_sec: 0.0,
                decay_sec: 0.0,
                sustain_level: 1.0,
                release_sec: 0.0,
            },
            vibrato: None,
            orbit_effects: OrbitEffectSpecs::default(),
            sample_rate,
        }
    }

    #[test]
    fn synth_voice_renders_into_mix_buffer_within_window() {
        let sample_rate = 44_100.0;
        let params = default_params(sample_rate, 0, 512, 512);
        let mut voice = Voice::new_synth(params, Oscillator::new(OscillatorKind::Sine), 440.0);

        let mut mix_left = vec![0.0; 512];
        let mut mix_right = vec![0.0; 512];
        let mut scratch = vec![0.0; 512];
        let mut mod_scratch = vec![0.0; 512];
        let mut target = RenderTarget {
            mix_left: &mut mix_left,
            mix_right: &mut mix_right,
        };

        let finished = voice.render(&mut target, &mut scratch, &mut mod_scratch, 0, 512);
        assert!(!finished, "voice consumed its whole window but endFrame hasn't passed blockStart yet");
        assert!(mix_left.iter().any(|&x| x != 0.0));
        assert!(mix_left.iter().all(|&x| x.is_finite()));

        let mut target = RenderTarget {
            mix_left: &mut mix_left,
            mix_right: &mut mix_right,
        };
        let finished_next_block = voice.render(&mut target, &mut scratch, &mut mod_scratch, 512, 512);
        assert!(finished_next_block);
    }

    #[test]
    fn voice_not_yet_started_renders_silently() {
        let sample_rate = 44_100.0;
        let params = default_params(sample_rate, 1000, 2000, 2000);
        let mut voice = Voice::new_synth(params, Oscillator::new(OscillatorKind::Sine), 440.0);

        let mut mix_left = vec![0.0; 512];
        let mut mix_right = vec![0.0; 512];
        let mut scratch = vec![0.0; 512];
        let mut mod_scratch = vec![0.0; 512];
        let mut target = RenderTarget {
            mix_left: &mut mix_left,
            mix_right: &mut mix_right,
        };

        let finished = voice.render(&mut target, &mut scratch, &mut mod_scratch, 0, 512);
        assert!(!finished);
        assert!(mix_left.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn force_release_eventually_finishes_the_voice() {
        let sample_rate = 44_100.0;
        let mut params = default_params(sample_rate, 0, 1_000_000, 1_000_000);
        params.adsr.release_sec = 0.01;
        let mut voice = Voice::new_synth(params, Oscillator::new(OscillatorKind::Sine), 440.0);
        voice.force_release();

        let mut mix_left = vec![0.0; 512];
        let mut mix_right = vec![0.0; 512];
        let mut scratch = vec![0.0; 512];
        let mut mod_scratch = vec![0.0; 512];

        let mut finished = false;
        for block in 0..200 {
            let mut target = RenderTarget {
                mix_left: &mut mix_left,
                mix_right: &mut mix_right,
            };
            finished = voice.render(&mut target, &mut scratch, &mut mod_scratch, block * 512, 512);
            if finished {
                break;
            }
        }
        assert!(finished);
    }

    #[test]
    fn sample_voice_interpolates_and_respects_ratio() {
        let sample_rate = 44_100.0;
        let params = default_params(sample_rate, 0, 64, 64);
        let descriptor = SampleDescriptor {
            key: "hit".into(),
            pitch_hz: 440.0,
            pcm: MonoSamplePcm::new(44_100, (0..128).map(|i| i as f32 / 128.0).collect()),
        };
        let mut voice = Voice::new_sample(params, descriptor, 0.5);

        let mut mix_left = vec![0.0; 64];
        let mut mix_right = vec![0.0; 64];
        let mut scratch = vec![0.0; 64];
        let mut mod_scratch = vec![0.0; 64];
        let mut target = RenderTarget {
            mix_left: &mut mix_left,
            mix_right: &mut mix_right,
        };
        voice.render(&mut target, &mut scratch, &mut mod_scratch, 0, 64);
        assert!(mix_left.iter().all(|&x| x.is_finite()));
    }
}
