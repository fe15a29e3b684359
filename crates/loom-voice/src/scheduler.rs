//! Promotes scheduled voices into the active set as the block cursor
//! crosses their start frame, and drives their render calls each block.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};

use loom_core::{Frame, MonoSamplePcm, Sample as Sig, SampleRequest, ScheduledVoice, SoundSource};
use loom_dsp::{AudioFilter, Oscillator};
use loom_orbit::{OrbitEffectSpecs, Orbits};

use crate::sample_index::SampleDescriptor;
use crate::voice::{RenderTarget, Voice, VoiceParams};

fn sample_request_key(request: &SampleRequest) -> String {
    format!(
        "{:?}|{:?}|{:?}|{:?}",
        request.bank,
        request.sound,
        request.note.map(f64::to_bits),
        request.index
    )
}

struct PendingVoice {
    seq: u64,
    start_frame: Frame,
    playback_id: String,
    voice: Voice,
}

impl PartialEq for PendingVoice {
    fn eq(&self, other: &Self) -> bool {
        self.start_frame == other.start_frame && self.seq == other.seq
    }
}
impl Eq for PendingVoice {}

impl PartialOrd for PendingVoice {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingVoice {
    /// Ascending by `start_frame`, then by insertion order — ties resolve
    /// FIFO, matching the scheduling ordering guarantee.
    fn cmp(&self, other: &Self) -> Ordering {
        self.start_frame
            .cmp(&other.start_frame)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// A voice still waiting on an unresolved sample reference.
struct PendingSample {
    playback_id: String,
    data: ScheduledVoice,
}

pub struct VoiceScheduler {
    sample_rate: f64,
    pending: BinaryHeap<Reverse<PendingVoice>>,
    active: Vec<Voice>,
    next_seq: u64,
    sample_cache: HashMap<String, SampleDescriptor>,
    pending_samples: HashMap<String, Vec<PendingSample>>,
}

impl VoiceScheduler {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            pending: BinaryHeap::new(),
            active: Vec::new(),
            next_seq: 0,
            sample_cache: HashMap::new(),
            pending_samples: HashMap::new(),
        }
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drops pending voices for `playback_id` without touching active ones —
    /// the `Cmd::ClearScheduled` contract.
    pub fn clear_scheduled(&mut self, playback_id: &str) {
        self.drop_pending_for(playback_id);
    }

    fn drop_pending_for(&mut self, playback_id: &str) {
        let remaining: BinaryHeap<Reverse<PendingVoice>> = self
            .pending
            .drain()
            .filter(|Reverse(p)| p.playback_id != playback_id)
            .collect();
        self.pending = remaining;
    }

    /// Converts a `ScheduledVoice` to frame units and either pushes it into
    /// the pending heap directly, or — if it references an unresolved
    /// sample — stashes it and returns the request the caller must ask the
    /// planner to resolve via `Feedback::RequestSample`.
    pub fn schedule_voice(&mut self, sv: ScheduledVoice, clear_scheduled: bool) -> Option<SampleRequest> {
        if clear_scheduled {
            self.drop_pending_for(&sv.playback_id);
        }

        if let SoundSource::Sample(request) = &sv.data.source {
            let key = sample_request_key(request);
            if let Some(descriptor) = self.sample_cache.get(&key).cloned() {
                self.push_sample_voice(&sv, descriptor);
                return None;
            }
            let request = request.clone();
            self.pending_samples.entry(key).or_default().push(PendingSample {
                playback_id: sv.playback_id.clone(),
                data: sv,
            });
            return Some(request);
        }

        self.push_synth_voice(&sv);
        None
    }

    /// Called when the planner answers a `RequestSample` with PCM. Resolves
    /// every voice that was waiting on this request and pushes them.
    pub fn sample_resolved(&mut self, request: &SampleRequest, pitch_hz: f64, pcm: MonoSamplePcm) {
        let key = sample_request_key(request);
        let descriptor = SampleDescriptor {
            key: request.sound.clone().unwrap_or_default(),
            pitch_hz,
            pcm,
        };
        self.sample_cache.insert(key.clone(), descriptor.clone());
        if let Some(waiters) = self.pending_samples.remove(&key) {
            for waiter in waiters {
                self.push_sample_voice(&waiter.data, descriptor.clone());
            }
        }
    }

    /// Called when the planner reports a sample could not be resolved.
    /// Every voice waiting on it is silently discarded.
    pub fn sample_not_found(&mut self, request: &SampleRequest) {
        let key = sample_request_key(request);
        self.pending_samples.remove(&key);
    }

    /// Drops both pending and active voices for `playback_id`; active
    /// voices are forced into Release rather than cut instantly.
    pub fn cleanup(&mut self, playback_id: &str) {
        self.drop_pending_for(playback_id);
        self.pending_samples
            .values_mut()
            .for_each(|waiters| waiters.retain(|w| w.playback_id != playback_id));
        for voice in self.active.iter_mut() {
            if voice.playback_id() == playback_id {
                voice.force_release();
            }
        }
    }

    fn push_synth_voice(&mut self, sv: &ScheduledVoice) {
        let SoundSource::Oscillator(kind) = sv.data.source else {
            return;
        };
        let freq_hz = sv.data.freq_hz.unwrap_or(440.0);
        let mut oscillator = Oscillator::new(kind);
        if let Some(unison) = sv.data.unison {
            oscillator = oscillator.with_unison(unison.voices, unison.detune);
        }
        let params = self.build_params(sv);
        let seq = self.next_seq();
        self.pending.push(Reverse(PendingVoice {
            seq,
            start_frame: params.start_frame,
            playback_id: sv.playback_id.clone(),
            voice: Voice::new_synth(params, oscillator, freq_hz),
        }));
    }

    fn push_sample_voice(&mut self, sv: &ScheduledVoice, descriptor: SampleDescriptor) {
        let target_hz = sv.data.freq_hz.unwrap_or(descriptor.pitch_hz).max(1.0);
        let ratio = (descriptor.pitch_hz.max(1.0) / target_hz)
            * (descriptor.pcm.sample_rate as f64 / self.sample_rate);
        let params = self.build_params(sv);
        let seq = self.next_seq();
        self.pending.push(Reverse(PendingVoice {
            seq,
            start_frame: params.start_frame,
            playback_id: sv.playback_id.clone(),
            voice: Voice::new_sample(params, descriptor, ratio),
        }));
    }

    fn build_params(&self, sv: &ScheduledVoice) -> VoiceParams {
        let data = sv.data.clone().normalized();
        let filters = data
            .filters
            .iter()
            .map(|spec| match *spec {
                loom_core::FilterSpec::LowPass { cutoff_hz, q } => {
                    AudioFilter::low_pass(cutoff_hz, q, self.sample_rate)
                }
                loom_core::FilterSpec::HighPass { cutoff_hz, q } => {
                    AudioFilter::high_pass(cutoff_hz, q, self.sample_rate)
                }
            })
            .collect();
        VoiceParams {
            playback_id: sv.playback_id.clone(),
            orbit_id: data.orbit_id,
            start_frame: sv.start_frame(self.sample_rate),
            gate_end_frame: sv.gate_end_frame(self.sample_rate),
            end_frame: sv.end_frame(self.sample_rate),
            gain: data.gain,
            pan: data.pan,
            filter: AudioFilter::combine(filters),
            adsr: data.adsr,
            vibrato: data.vibrato,
            orbit_effects: OrbitEffectSpecs {
                delay: data.delay,
                reverb: data.reverb,
                phaser: data.phaser,
                compressor: data.compressor,
                ducking: data.ducking,
            },
            sample_rate: self.sample_rate,
        }
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Promotes due voices, renders every active voice into its orbit, and
    /// drops voices that finished this block.
    pub fn process(
        &mut self,
        block_start: Frame,
        block_frames: usize,
        orbits: &mut Orbits,
        scratch: &mut [Sig],
        mod_scratch: &mut [f64],
    ) {
        let horizon = block_start + block_frames as Frame;
        while let Some(Reverse(entry)) = self.pending.peek() {
            if entry.start_frame >= horizon {
                break;
            }
            let Reverse(entry) = self.pending.pop().unwrap();
            self.active.push(entry.voice);
        }

        let mut touched: HashSet<usize> = HashSet::new();
        let mut finished_idx = Vec::new();
        for (idx, voice) in self.active.iter_mut().enumerate() {
            let orbit_id = voice.orbit_id();
            let first_touch = touched.insert(orbit_id);
            let effects = voice.orbit_effects();
            let orbit = orbits.get_or_init(orbit_id);
            if first_touch {
                orbit.update_from_voice(effects);
            }
            let (mix_left, mix_right) = orbit.mix_mut();
            let mut target = RenderTarget { mix_left, mix_right };
            let finished = voice.render(&mut target, scratch, mod_scratch, block_start, block_frames);
            if finished {
                finished_idx.push(idx);
            }
        }

        for idx in finished_idx.into_iter().rev() {
            self.active.swap_remove(idx);
        }
    }
}
