//! Orbit delay send: a circular mono buffer per channel, cross-faded
//! dry/wet into the orbit's delay send buffer.

use loom_core::Sample;

const MAX_DELAY_SECONDS: f64 = 4.0;
pub const DISABLE_THRESHOLD_SEC: f64 = 0.01;

#[derive(Debug, Clone)]
struct MonoDelay {
    buffer: Vec<Sample>,
    write_pos: usize,
    delay_samples: usize,
}

impl MonoDelay {
    fn new(sample_rate: f64) -> Self {
        let size = (MAX_DELAY_SECONDS * sample_rate).ceil() as usize + 1;
        Self {
            buffer: vec![0.0; size.max(2)],
            write_pos: 0,
            delay_samples: 1,
        }
    }

    fn set_delay_samples(&mut self, samples: usize) {
        self.delay_samples = samples.clamp(1, self.buffer.len() - 1);
    }

    fn step(&mut self, input: Sample, feedback: Sample) -> Sample {
        let size = self.buffer.len();
        let read_pos = (self.write_pos + size - self.delay_samples) % size;
        let wet = self.buffer[read_pos];
        self.buffer[self.write_pos] = input + feedback * wet;
        self.write_pos = (self.write_pos + 1) % size;
        wet
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

/// Per-orbit stereo delay send. Disabled (a pure pass-through of silence
/// into the send buffer) when `delay_time_sec < DISABLE_THRESHOLD_SEC`.
#[derive(Debug, Clone)]
pub struct DelayLine {
    sample_rate: f64,
    left: MonoDelay,
    right: MonoDelay,
    delay_time_sec: f64,
    feedback: f64,
    amount: f64,
}

impl DelayLine {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            left: MonoDelay::new(sample_rate),
            right: MonoDelay::new(sample_rate),
            delay_time_sec: 0.0,
            feedback: 0.0,
            amount: 0.0,
        }
    }

    pub fn set_params(&mut self, delay_time_sec: f64, feedback: f64, amount: f64) {
        self.delay_time_sec = delay_time_sec.max(0.0);
        self.feedback = feedback.clamp(0.0, 0.95);
        self.amount = amount.max(0.0);
        let samples = (self.delay_time_sec * self.sample_rate).round() as usize;
        self.left.set_delay_samples(samples);
        self.right.set_delay_samples(samples);
    }

    pub fn is_enabled(&self) -> bool {
        self.delay_time_sec >= DISABLE_THRESHOLD_SEC
    }

    /// Reads the dry orbit buffer, mixes the delayed signal back in per
    /// `amount`, and updates the circular buffers.
    pub fn process(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        if !self.is_enabled() {
            return;
        }
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let wet_l = self.left.step(*l, self.feedback);
            let wet_r = self.right.step(*r, self.feedback);
            *l += wet_l * self.amount;
            *r += wet_r * self.amount;
        }
    }

    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_below_threshold_leaves_buffer_untouched() {
        let mut delay = DelayLine::new(44_100.0);
        delay.set_params(0.005, 0.5, 1.0);
        let mut left = vec![1.0; 16];
        let mut right = vec![1.0; 16];
        delay.process(&mut left, &mut right);
        assert!(left.iter().all(|&x| x == 1.0));
    }

    #[test]
    fn enabled_delay_eventually_echoes_input() {
        let sample_rate = 1000.0;
        let mut delay = DelayLine::new(sample_rate);
        delay.set_params(0.01, 0.0, 1.0);
        let mut left = vec![0.0; 40];
        left[0] = 1.0;
        let mut right = vec![0.0; 40];
        delay.process(&mut left, &mut right);
        // 10 samples of delay at 1kHz/0.01s; an echo should appear later
        // in the buffer, distinct from the dry impulse at index 0.
        assert!(left[10] != 0.0 || left[11] != 0.0);
    }

    #[test]
    fn feedback_is_clamped_to_spec_range() {
        let mut delay = DelayLine::new(44_100.0);
        delay.set_params(0.1, 5.0, 1.0);
        assert!(delay.feedback <= 0.95);
    }
}
