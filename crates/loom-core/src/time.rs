//! Frame, second, and cycle time conversions.

/// A signed stereo-sample-frame counter from engine start.
pub type Frame = i64;

pub fn frame_to_seconds(frame: Frame, sample_rate: f64) -> f64 {
    frame as f64 / sample_rate
}

pub fn seconds_to_frame(seconds: f64, sample_rate: f64) -> Frame {
    (seconds * sample_rate).round() as Frame
}

pub fn seconds_to_cycles(seconds: f64, cycles_per_second: f64) -> f64 {
    seconds * cycles_per_second
}

pub fn cycles_to_seconds(cycles: f64, cycles_per_second: f64) -> f64 {
    cycles / cycles_per_second
}

pub fn frame_to_cycles(frame: Frame, sample_rate: f64, cycles_per_second: f64) -> f64 {
    seconds_to_cycles(frame_to_seconds(frame, sample_rate), cycles_per_second)
}
