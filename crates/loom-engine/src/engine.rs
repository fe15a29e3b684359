//! The top-level `Engine`: owns the CommLink's renderer half, the
//! `Renderer` (which in turn owns the `VoiceScheduler` and `Orbits`), and
//! the shared running flag the planner-side `Fetcher` task honours.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use loom_comm::{CommLink, PlannerLink};
use loom_core::{EngineConfig, Frame};

use crate::fetcher::{EventSource, Fetcher, SampleRegistry};
use crate::renderer::{Renderer, RendererHandle};

/// Owns the renderer side of the pipeline and the lifecycle of the planner
/// task. Construction hands back the planner's `CommLink` half so the
/// caller can build a `Fetcher` against it.
pub struct Engine {
    renderer: Renderer,
    handle: Arc<RendererHandle>,
    running: Arc<AtomicBool>,
    fetcher_task: Option<tokio::task::JoinHandle<()>>,
}

impl Engine {
    pub fn new(config: &EngineConfig) -> (Self, PlannerLink) {
        let (planner_link, renderer_link) = CommLink::new(config.comm_link_capacity_or_default());
        let handle = RendererHandle::new();
        let renderer = Renderer::new(config, renderer_link, Arc::clone(&handle));
        (
            Self {
                renderer,
                handle,
                running: Arc::new(AtomicBool::new(true)),
                fetcher_task: None,
            },
            planner_link,
        )
    }

    pub fn sample_rate(&self) -> f64 {
        self.renderer.sample_rate()
    }

    pub fn block_frames(&self) -> usize {
        self.renderer.block_frames()
    }

    pub fn cursor_frame(&self) -> Frame {
        self.handle.cursor_frame()
    }

    /// Renders one block — the function the audio backend calls at its
    /// block cadence. Synchronous, allocation-free, never suspends.
    pub fn render_block(&mut self, out: &mut [i16]) {
        self.renderer.render_block(out);
    }

    /// Spawns the planner's `Fetcher` loop as a `tokio` task sharing this
    /// engine's running flag. Only one fetcher task should be spawned per
    /// engine instance.
    pub fn spawn_fetcher<T, E, R, F>(&mut self, fetcher: Fetcher<T, E, R, F>)
    where
        T: Send + 'static,
        E: EventSource<T> + 'static,
        R: SampleRegistry + 'static,
        F: Fn(&T) -> loom_core::ScheduledVoice + Send + 'static,
    {
        let running = Arc::clone(&self.running);
        self.fetcher_task = Some(tokio::spawn(fetcher.run(running)));
    }

    /// Flips the running flag so the fetcher's loop exits after its current
    /// iteration, then awaits it. The audio backend is responsible for
    /// draining one final `render_block` and stopping the stream — the
    /// engine itself never forces that, since it has no access to the
    /// host's callback.
    pub async fn shutdown(mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(task) = self.fetcher_task.take() {
            let _ = task.await;
        }
    }
}
