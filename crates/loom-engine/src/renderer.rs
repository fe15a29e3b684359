//! The renderer: the synchronous, allocation-free per-block function the
//! audio backend calls. Owns the scheduler, the orbits, and the scratch
//! buffers; never suspends, never takes a lock the planner could contend.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use loom_comm::{Cmd, Feedback, RendererLink};
use loom_core::{sample::to_interleaved_i16, EngineConfig, Frame, Sample, StereoBuffer};
use loom_orbit::Orbits;
use loom_voice::VoiceScheduler;

/// Shared, lock-free state published by the renderer and observed by the
/// planner: the current cursor frame and the engine's running flag.
pub struct RendererHandle {
    cursor: AtomicI64,
    running: AtomicBool,
}

impl RendererHandle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            cursor: AtomicI64::new(0),
            running: AtomicBool::new(true),
        })
    }

    pub fn cursor_frame(&self) -> Frame {
        self.cursor.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Atomic compare-and-set; returns `true` iff this call made the change
    /// (exactly one concurrent caller observes `true`).
    pub fn stop(&self) -> bool {
        self.running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

pub struct Renderer {
    sample_rate: f64,
    block_frames: usize,
    handle: Arc<RendererHandle>,
    link: RendererLink,
    scheduler: VoiceScheduler,
    orbits: Orbits,
    master: StereoBuffer,
    scratch: Vec<Sample>,
    mod_scratch: Vec<Sample>,
}

impl Renderer {
    pub fn new(config: &EngineConfig, link: RendererLink, handle: Arc<RendererHandle>) -> Self {
        Self {
            sample_rate: config.sample_rate,
            block_frames: config.block_size,
            handle,
            link,
            scheduler: VoiceScheduler::new(config.sample_rate),
            orbits: Orbits::new(config.sample_rate, config.block_size, config.clamped_max_orbits()),
            master: StereoBuffer::new(config.block_size),
            scratch: vec![0.0; config.block_size],
            mod_scratch: vec![0.0; config.block_size],
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn block_frames(&self) -> usize {
        self.block_frames
    }

    pub fn handle(&self) -> Arc<RendererHandle> {
        Arc::clone(&self.handle)
    }

    /// Renders one block into `out`, an interleaved L/R little-endian i16
    /// buffer of length `2 * block_frames`. Advances the shared cursor and
    /// publishes it via feedback. Never suspends, never allocates.
    pub fn render_block(&mut self, out: &mut [i16]) {
        self.drain_control();

        let block_start = self.handle.cursor_frame();
        self.master.clear();

        self.scheduler.process(
            block_start,
            self.block_frames,
            &mut self.orbits,
            &mut self.scratch,
            &mut self.mod_scratch,
        );
        self.orbits.process_and_mix(&mut self.master);
        self.orbits.round_robin_cleanup();
        self.master.clamp_non_finite();

        to_interleaved_i16(self.master.left(), self.master.right(), out);

        let next_cursor = block_start + self.block_frames as Frame;
        self.handle.cursor.store(next_cursor, Ordering::Release);
        self.link
            .feedback_tx
            .send(Feedback::UpdateCursorFrame { frame: next_cursor });
    }

    fn drain_control(&mut self) {
        while let Some(cmd) = self.link.control_rx.receive() {
            match cmd {
                Cmd::ScheduleVoice { voice, clear_scheduled } => {
                    self.request_sample_if_needed(self.scheduler.schedule_voice(voice, clear_scheduled));
                }
                Cmd::ReplaceVoices { playback_id, voices } => {
                    self.scheduler.cleanup(&playback_id);
                    for voice in voices {
                        self.request_sample_if_needed(self.scheduler.schedule_voice(voice, false));
                    }
                }
                Cmd::ClearScheduled { playback_id } => self.scheduler.clear_scheduled(&playback_id),
                Cmd::Cleanup { playback_id } => self.scheduler.cleanup(&playback_id),
                Cmd::SampleComplete { request, note: _, pitch_hz, pcm } => {
                    self.scheduler.sample_resolved(&request, pitch_hz, pcm);
                }
                Cmd::SampleNotFound { request } => self.scheduler.sample_not_found(&request),
            }
        }
    }

    fn request_sample_if_needed(&mut self, request: Option<loom_core::SampleRequest>) {
        if let Some(request) = request {
            self.link.feedback_tx.send(Feedback::RequestSample { request });
        }
    }
}
