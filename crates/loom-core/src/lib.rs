//! Shared types for the Loom performance engine: sample buffers, frame/cycle
//! time conversions, engine-wide configuration, units, and the error type
//! threaded through every other `loom-*` crate.

pub mod config;
pub mod error;
pub mod sample;
pub mod time;
pub mod units;
pub mod value;
pub mod voice_data;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use sample::{MonoSamplePcm, Sample, StereoBuffer};
pub use time::Frame;
pub use units::Decibels;
pub use value::VoiceValue;
pub use voice_data::{
    Adsr, CompressorSpec, DelaySpec, DuckingSpec, FilterSpec, OscillatorKind, PhaserSpec,
    SampleRequest, ScheduledVoice, SoundSource, UnisonSpec, VibratoSpec, VoiceData,
};
