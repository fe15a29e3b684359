//! Wires the scheduler and orbit mix bus into a synchronous per-block
//! renderer, a cooperative `tokio` planner task, and the top-level `Engine`
//! that owns both.

pub mod engine;
pub mod fetcher;
pub mod renderer;

pub use engine::Engine;
pub use fetcher::{EventSource, Fetcher, FetcherConfig, SampleRegistry};
pub use renderer::{Renderer, RendererHandle};
