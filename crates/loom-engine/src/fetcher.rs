//! The planner-side loop: on a periodic tick, queries the (external) event
//! source for both the sample-lookahead and the scheduling horizon,
//! pre-resolves sample references, and pushes `Cmd`s into the CommLink.
//!
//! Runs as a cooperative `tokio` task. Cancellation is observed once per
//! iteration via a shared flag — matching the `isRunning` idiom used on the
//! renderer side — rather than by aborting the task, so the planner never
//! leaves the CommLink half-way through a logical step.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use loom_comm::{Cmd, Feedback, PlannerLink};
use loom_core::time::{frame_to_cycles, seconds_to_cycles};
use loom_core::{EngineConfig, Frame, MonoSamplePcm, SampleRequest, ScheduledVoice, SoundSource};

/// A half-open cycle-range query against the pattern/event source. Must be
/// pure with respect to the time range and return events sorted by start
/// time; may be called concurrently with rendering but not re-entrantly on
/// itself.
pub trait EventSource<T>: Send + Sync {
    fn query(&self, from_cycles: f64, to_cycles: f64) -> Vec<T>;
}

/// The (external) sample registry. `resolve` stands in for the callback
/// contract in the distilled interface (`getWithCallback`); an
/// implementation backed by real I/O should perform its own async hand-off
/// internally and return once resolved.
pub trait SampleRegistry: Send + Sync {
    fn has_sample(&self, request: &SampleRequest) -> bool;

    /// Returns `(noteUsed, pitchHz, pcm)`, or `None` when the request can't
    /// be satisfied.
    fn resolve(&self, request: &SampleRequest) -> Option<(Option<f64>, f64, MonoSamplePcm)>;
}

fn request_key(request: &SampleRequest) -> String {
    format!(
        "{:?}|{:?}|{:?}|{:?}",
        request.bank,
        request.sound,
        request.note.map(f64::to_bits),
        request.index
    )
}

pub struct FetcherConfig {
    pub sample_rate: f64,
    pub cycles_per_second: f64,
    pub lookahead_sec: f64,
    pub prefetch_cycles: f64,
    pub fetch_period_ms: u64,
}

impl FetcherConfig {
    pub fn from_engine_config(config: &EngineConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            cycles_per_second: config.cycles_per_second,
            lookahead_sec: config.lookahead_sec,
            prefetch_cycles: config.prefetch_cycles,
            fetch_period_ms: config.fetch_period_ms,
        }
    }
}

/// Owns the planner's half of the CommLink and drives the scheduling and
/// sample-lookahead loop. `T` is whatever event type the event source
/// yields; `transform` turns one into a `ScheduledVoice`.
pub struct Fetcher<T, E, R, F>
where
    E: EventSource<T>,
    R: SampleRegistry,
    F: Fn(&T) -> ScheduledVoice + Send,
{
    config: FetcherConfig,
    source: Arc<E>,
    registry: Arc<R>,
    transform: F,
    link: PlannerLink,
    query_cursor_cycles: f64,
    current_frame: Frame,
    requested: HashSet<String>,
}

impl<T, E, R, F> Fetcher<T, E, R, F>
where
    T: Send,
    E: EventSource<T>,
    R: SampleRegistry,
    F: Fn(&T) -> ScheduledVoice + Send,
{
    pub fn new(config: FetcherConfig, source: Arc<E>, registry: Arc<R>, transform: F, link: PlannerLink) -> Self {
        Self {
            config,
            source,
            registry,
            transform,
            link,
            query_cursor_cycles: 0.0,
            current_frame: 0,
            requested: HashSet::new(),
        }
    }

    pub fn query_cursor_cycles(&self) -> f64 {
        self.query_cursor_cycles
    }

    pub fn current_frame(&self) -> Frame {
        self.current_frame
    }

    /// Runs one iteration of the loop: drains feedback, prefetches samples,
    /// then schedules every event up to the lookahead horizon.
    pub fn tick(&mut self) {
        self.drain_feedback();
        self.prefetch_samples();
        self.schedule_due_events();
    }

    /// Drives `tick` on `fetch_period_ms` cadence until `running` is flipped
    /// to false. Checked once per iteration, never mid-tick.
    pub async fn run(mut self, running: Arc<AtomicBool>) {
        let period = Duration::from_millis(self.config.fetch_period_ms.max(1));
        while running.load(Ordering::Acquire) {
            self.tick();
            tokio::time::sleep(period).await;
        }
    }

    fn drain_feedback(&mut self) {
        while let Some(feedback) = self.link.feedback_rx.receive() {
            match feedback {
                Feedback::UpdateCursorFrame { frame } => self.current_frame = frame,
                Feedback::RequestSample { request } => self.resolve_and_reply(request),
            }
        }
    }

    fn now_cycles(&self) -> f64 {
        frame_to_cycles(self.current_frame, self.config.sample_rate, self.config.cycles_per_second)
    }

    /// Queries a one-cycle window `prefetch_cycles` ahead of playback and
    /// kicks off resolution for any sample reference not already known or
    /// in flight.
    fn prefetch_samples(&mut self) {
        let from = self.now_cycles() + self.config.prefetch_cycles;
        let events = self.source.query(from, from + 1.0);
        for event in &events {
            let voice = (self.transform)(event);
            if let SoundSource::Sample(request) = &voice.data.source {
                let key = request_key(request);
                if self.requested.contains(&key) || self.registry.has_sample(request) {
                    continue;
                }
                self.requested.insert(key);
                self.resolve_and_reply(request.clone());
            }
        }
    }

    /// Advances `query_cursor_cycles` in unit-cycle chunks up to the
    /// scheduling horizon, sending `ScheduleVoice` for every event.
    fn schedule_due_events(&mut self) {
        let target_cycles = self.now_cycles() + seconds_to_cycles(self.config.lookahead_sec, self.config.cycles_per_second);
        while self.query_cursor_cycles < target_cycles {
            let from = self.query_cursor_cycles;
            let to = from + 1.0;
            let events = self.source.query(from, to);
            for event in &events {
                let voice = (self.transform)(event);
                self.link.control_tx.send(Cmd::ScheduleVoice { voice, clear_scheduled: false });
            }
            self.query_cursor_cycles = to;
        }
    }

    fn resolve_and_reply(&mut self, request: SampleRequest) {
        match self.registry.resolve(&request) {
            Some((note, pitch_hz, pcm)) => {
                self.link.control_tx.send(Cmd::SampleComplete { request, note, pitch_hz, pcm });
            }
            None => {
                self.link.control_tx.send(Cmd::SampleNotFound { request });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_comm::CommLink;
    use loom_core::{Adsr, OscillatorKind};
    use std::sync::Mutex;

    #[derive(Clone)]
    struct FixedEvent {
        start: f64,
    }

    struct FixedSource {
        events_per_cycle: usize,
    }

    impl EventSource<FixedEvent> for FixedSource {
        fn query(&self, from_cycles: f64, to_cycles: f64) -> Vec<FixedEvent> {
            let _ = to_cycles;
            (0..self.events_per_cycle).map(|_| FixedEvent { start: from_cycles }).collect()
        }
    }

    struct NeverResolves;

    impl SampleRegistry for NeverResolves {
        fn has_sample(&self, _request: &SampleRequest) -> bool {
            false
        }

        fn resolve(&self, _request: &SampleRequest) -> Option<(Option<f64>, f64, MonoSamplePcm)> {
            None
        }
    }

    struct AlwaysResolves;

    impl SampleRegistry for AlwaysResolves {
        fn has_sample(&self, _request: &SampleRequest) -> bool {
            false
        }

        fn resolve(&self, _request: &SampleRequest) -> Option<(Option<f64>, f64, MonoSamplePcm)> {
            Some((None, 440.0, MonoSamplePcm::new(44_100, vec![0.0; 16])))
        }
    }

    fn transform(event: &FixedEvent) -> ScheduledVoice {
        ScheduledVoice {
            playback_id: format!("voice-{}", event.start),
            data: loom_core::VoiceData {
                source: SoundSource::Oscillator(OscillatorKind::Sine),
                freq_hz: Some(440.0),
                adsr: Adsr {
                    attack_sec: 0.001,
                    decay_sec: 0.0,
                    sustain_level: 1.0,
                    release_sec: 0.001,
                },
                filters: vec![],
                pan: 0.0,
                gain: 1.0,
                orbit_id: 0,
                delay: None,
                reverb: None,
                phaser: None,
                vibrato: None,
                compressor: None,
                ducking: None,
                unison: None,
                warmth: None,
            },
            start_time: event.start,
            gate_end_time: event.start + 1.0,
            playback_start_time: event.start,
        }
    }

    #[test]
    fn tick_schedules_events_up_to_lookahead_horizon() {
        let config = FetcherConfig {
            sample_rate: 44_100.0,
            cycles_per_second: 1.0,
            lookahead_sec: 3.0,
            prefetch_cycles: 8.0,
            fetch_period_ms: 16,
        };
        let (planner, _renderer) = CommLink::new(64);
        let source = Arc::new(FixedSource { events_per_cycle: 1 });
        let registry = Arc::new(NeverResolves);
        let mut fetcher = Fetcher::new(config, source, registry, transform, planner);
        fetcher.tick();
        // lookahead_sec=3 at cyclesPerSecond=1 => target_cycles == 3, chunks [0,1),[1,2),[2,3)
        assert_eq!(fetcher.query_cursor_cycles(), 3.0);
    }

    #[test]
    fn prefetch_requests_each_unresolved_sample_exactly_once() {
        struct SampleSource;
        impl EventSource<FixedEvent> for SampleSource {
            fn query(&self, from_cycles: f64, _to_cycles: f64) -> Vec<FixedEvent> {
                vec![FixedEvent { start: from_cycles }]
            }
        }

        let config = FetcherConfig {
            sample_rate: 44_100.0,
            cycles_per_second: 1.0,
            lookahead_sec: 0.0,
            prefetch_cycles: 4.0,
            fetch_period_ms: 16,
        };
        let (planner, mut renderer) = CommLink::new(64);
        let source = Arc::new(SampleSource);
        let registry = Arc::new(AlwaysResolves);
        let calls = Arc::new(Mutex::new(0usize));
        let calls_clone = Arc::clone(&calls);
        let sample_transform = move |event: &FixedEvent| {
            *calls_clone.lock().unwrap() += 1;
            ScheduledVoice {
                playback_id: "s".into(),
                data: loom_core::VoiceData {
                    source: SoundSource::Sample(SampleRequest {
                        bank: Some("drums".into()),
                        sound: Some("kick".into()),
                        note: None,
                        index: None,
                    }),
                    freq_hz: None,
                    adsr: Adsr {
                        attack_sec: 0.0,
                        decay_sec: 0.0,
                        sustain_level: 1.0,
                        release_sec: 0.0,
                    },
                    filters: vec![],
                    pan: 0.0,
                    gain: 1.0,
                    orbit_id: 0,
                    delay: None,
                    reverb: None,
                    phaser: None,
                    vibrato: None,
                    compressor: None,
                    ducking: None,
                    unison: None,
                    warmth: None,
                },
                start_time: event.start,
                gate_end_time: event.start + 1.0,
                playback_start_time: event.start,
            }
        };
        let mut fetcher = Fetcher::new(config, source, registry, sample_transform, planner);
        fetcher.tick();
        fetcher.tick();
        assert!(matches!(renderer.control_rx.receive(), Some(Cmd::SampleComplete { .. })));
        assert!(renderer.control_rx.receive().is_none());
    }
}
