//! The bounded duplex CommLink joining the planner and the renderer.
//!
//! Both directions are single-producer/single-consumer and backed by
//! `rtrb`, the same ring buffer this codebase reaches for whenever a
//! command queue has to cross from a UI/planner thread onto the audio
//! thread without blocking it.

use loom_core::{Frame, MonoSamplePcm, SampleRequest, ScheduledVoice};
use rtrb::{Consumer, Producer, RingBuffer};

/// Messages sent planner → renderer.
#[derive(Debug, Clone)]
pub enum Cmd {
    ScheduleVoice {
        voice: ScheduledVoice,
        clear_scheduled: bool,
    },
    ReplaceVoices {
        playback_id: String,
        voices: Vec<ScheduledVoice>,
    },
    ClearScheduled {
        playback_id: String,
    },
    Cleanup {
        playback_id: String,
    },
    SampleComplete {
        request: SampleRequest,
        note: Option<f64>,
        pitch_hz: f64,
        pcm: MonoSamplePcm,
    },
    SampleNotFound {
        request: SampleRequest,
    },
}

/// Messages sent renderer → planner.
#[derive(Debug, Clone)]
pub enum Feedback {
    UpdateCursorFrame { frame: Frame },
    RequestSample { request: SampleRequest },
}

/// One direction of the link: a bounded SPSC queue with a non-blocking
/// send/receive contract. Neither side may free the other's handle.
pub struct Sender<T> {
    producer: Producer<T>,
}

impl<T> Sender<T> {
    /// Non-blocking. Returns `false` (without mutating state beyond the
    /// attempted push) when the queue is full.
    pub fn send(&mut self, msg: T) -> bool {
        match self.producer.push(msg) {
            Ok(()) => true,
            Err(_full) => {
                log::warn!("CommLink queue full, message dropped");
                false
            }
        }
    }

    pub fn is_full(&self) -> bool {
        self.producer.is_full()
    }
}

pub struct Receiver<T> {
    consumer: Consumer<T>,
}

impl<T> Receiver<T> {
    /// Non-blocking. Returns `None` when the queue is empty.
    pub fn receive(&mut self) -> Option<T> {
        self.consumer.pop().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }
}

/// A bounded duplex channel: `control` carries `Cmd`s planner→renderer,
/// `feedback` carries `Feedback`s renderer→planner. Constructed once and
/// split into a planner-side and renderer-side half.
pub struct CommLink;

/// The renderer's half of the link: receives commands, sends feedback.
pub struct RendererLink {
    pub control_rx: Receiver<Cmd>,
    pub feedback_tx: Sender<Feedback>,
}

/// The planner's half of the link: sends commands, receives feedback.
pub struct PlannerLink {
    pub control_tx: Sender<Cmd>,
    pub feedback_rx: Receiver<Feedback>,
}

impl CommLink {
    /// Builds both halves of the link with the given per-direction
    /// capacity (defaults to 8192 when `capacity == 0`).
    pub fn new(capacity: usize) -> (PlannerLink, RendererLink) {
        let capacity = if capacity == 0 {
            loom_core::config::DEFAULT_COMM_LINK_CAPACITY
        } else {
            capacity
        };

        let (control_tx, control_rx) = RingBuffer::new(capacity);
        let (feedback_tx, feedback_rx) = RingBuffer::new(capacity);

        (
            PlannerLink {
                control_tx: Sender { producer: control_tx },
                feedback_rx: Receiver { consumer: feedback_rx },
            },
            RendererLink {
                control_rx: Receiver { consumer: control_rx },
                feedback_tx: Sender { producer: feedback_tx },
            },
        )
    }
}
