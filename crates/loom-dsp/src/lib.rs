//! Oscillators, filters, envelopes, and the per-orbit effect chain: delay,
//! reverb, phaser, compressor, ducking.

pub mod biquad;
pub mod delay;
pub mod dynamics;
pub mod ducking;
pub mod envelope;
pub mod filter;
pub mod oscillator;
pub mod phaser;
pub mod processor;
pub mod reverb;

pub use biquad::{BiquadCoeffs, BiquadTdf2};
pub use delay::DelayLine;
pub use ducking::Ducking;
pub use dynamics::{Compressor, CompressorSettings, StereoCompressor};
pub use envelope::{Envelope, EnvelopeStage};
pub use filter::AudioFilter;
pub use oscillator::{Oscillator, WarmedOscillator};
pub use phaser::Phaser;
pub use processor::{MonoProcessor, Processor, ProcessorConfig, StereoProcessor};
pub use reverb::Reverb;
