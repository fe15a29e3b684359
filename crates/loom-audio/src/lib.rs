//! cpal-backed output harness: wires a `loom_engine::Engine` to a real
//! sound device. Everything in this crate is an adapter — the scheduling
//! and mixing logic lives entirely downstream in `loom-engine`.

mod device;
mod error;
mod stream;

pub use device::{get_default_output_device, get_host};
pub use error::{AudioError, AudioResult};
pub use stream::AudioStream;
