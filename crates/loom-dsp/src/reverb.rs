//! Orbit reverb send: an 8-line Hadamard-mixed feedback delay network
//! (FDN), the algorithmic-decay topology this codebase always reaches for
//! instead of convolution when the parameter is a room size, not an
//! impulse response.

use loom_core::Sample;

pub const DISABLE_THRESHOLD: f64 = 0.01;

const LINES: usize = 8;
const BASE_DELAYS: [usize; LINES] = [1087, 1283, 1481, 1669, 1877, 2083, 2293, 2503];
const HADAMARD_NORM: f64 = 0.353_553_390_593_273_73; // 1/sqrt(8)

fn hadamard8(input: &[f64; LINES]) -> [f64; LINES] {
    // Fast Walsh-Hadamard transform, order 8, normalised by 1/sqrt(8).
    let mut a = *input;
    let mut h = 1usize;
    while h < LINES {
        let mut i = 0;
        while i < LINES {
            for j in i..i + h {
                let x = a[j];
                let y = a[j + h];
                a[j] = x + y;
                a[j + h] = x - y;
            }
            i += h * 2;
        }
        h *= 2;
    }
    for v in a.iter_mut() {
        *v *= HADAMARD_NORM;
    }
    a
}

struct FdnLine {
    buffer: Vec<Sample>,
    write_pos: usize,
    base_len: usize,
    current_len: usize,
    lfo_phase: f64,
    lfo_inc: f64,
    lp_state: f64,
    hp_state: f64,
    hp_prev_in: f64,
    feedback_gain: f64,
}

impl FdnLine {
    fn new(base_delay: usize, sample_rate: f64, lfo_seed: f64) -> Self {
        let scaled = ((base_delay as f64) * sample_rate / 48_000.0).round() as usize;
        let capacity = scaled * 2 + 8;
        Self {
            buffer: vec![0.0; capacity.max(8)],
            write_pos: 0,
            base_len: scaled.max(1),
            current_len: scaled.max(1),
            lfo_phase: lfo_seed,
            lfo_inc: 2.0 * std::f64::consts::PI * 0.3 / sample_rate,
            lp_state: 0.0,
            hp_state: 0.0,
            hp_prev_in: 0.0,
            feedback_gain: 0.6,
        }
    }

    fn rescale(&mut self, space_scale: f64, sample_rate: f64) {
        let scaled = ((self.base_len as f64) * space_scale.max(0.05)) as usize;
        self.current_len = scaled.clamp(1, self.buffer.len() - 4);
        let _ = sample_rate;
    }

    fn read_modulated(&self) -> Sample {
        // +/- 2 samples of LFO-driven fractional delay to break up metallic
        // ringing, linearly interpolated.
        let mod_depth = 2.0;
        let modulation = self.lfo_phase.sin() * mod_depth;
        let read_pos = self.write_pos as f64 - self.current_len as f64 + modulation;
        let size = self.buffer.len() as f64;
        let wrapped = ((read_pos % size) + size) % size;
        let idx0 = wrapped.floor() as usize % self.buffer.len();
        let idx1 = (idx0 + 1) % self.buffer.len();
        let frac = wrapped - wrapped.floor();
        self.buffer[idx0] * (1.0 - frac) + self.buffer[idx1] * frac
    }

    fn apply_decay_shaping(&mut self, input: Sample, lp_coeff: f64, hp_coeff: f64) -> Sample {
        self.lp_state = input + lp_coeff * (self.lp_state - input);
        let shaped = self.lp_state;
        let hp_out = hp_coeff * (self.hp_state + shaped - self.hp_prev_in);
        self.hp_prev_in = shaped;
        self.hp_state = hp_out;
        hp_out
    }

    fn write(&mut self, value: Sample) {
        self.buffer[self.write_pos] = value;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
        self.lfo_phase += self.lfo_inc;
        if self.lfo_phase > std::f64::consts::TAU {
            self.lfo_phase -= std::f64::consts::TAU;
        }
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
        self.lp_state = 0.0;
        self.hp_state = 0.0;
        self.hp_prev_in = 0.0;
    }
}

struct FdnCore {
    lines: [FdnLine; LINES],
    lp_coeff: f64,
    hp_coeff: f64,
    dc_block_prev_in: f64,
    dc_block_prev_out: f64,
}

impl FdnCore {
    fn new(sample_rate: f64) -> Self {
        let lines = std::array::from_fn(|i| {
            FdnLine::new(BASE_DELAYS[i], sample_rate, i as f64 * 0.7)
        });
        Self {
            lines,
            lp_coeff: 0.2,
            hp_coeff: 0.995,
            dc_block_prev_in: 0.0,
            dc_block_prev_out: 0.0,
        }
    }

    fn update_decay(&mut self, decay: f64) {
        let gain = 0.40 + decay.clamp(0.0, 1.0) * 0.54;
        for line in self.lines.iter_mut() {
            line.feedback_gain = gain;
        }
    }

    fn update_damping(&mut self, room_lp: f64, room_dim: f64) {
        self.lp_coeff = room_lp.clamp(0.0, 0.999);
        self.hp_coeff = (0.999 - room_dim.clamp(0.0, 1.0) * 0.05).clamp(0.9, 0.999);
    }

    fn update_space_scale(&mut self, scale: f64, sample_rate: f64) {
        for line in self.lines.iter_mut() {
            line.rescale(scale, sample_rate);
        }
    }

    fn step(&mut self, input: Sample) -> Sample {
        let mut reads = [0.0; LINES];
        for (i, line) in self.lines.iter().enumerate() {
            reads[i] = line.read_modulated();
        }
        let mixed = hadamard8(&reads);
        let mut out_sum = 0.0;
        for (i, line) in self.lines.iter_mut().enumerate() {
            let shaped = line.apply_decay_shaping(mixed[i], self.lp_coeff, self.hp_coeff);
            let fed = input + shaped * line.feedback_gain;
            line.write(fed);
            out_sum += reads[i];
        }
        let raw = out_sum / LINES as f64;
        // DC blocker: y[n] = x[n] - x[n-1] + 0.9995*y[n-1]
        let blocked = raw - self.dc_block_prev_in + 0.9995 * self.dc_block_prev_out;
        self.dc_block_prev_in = raw;
        self.dc_block_prev_out = blocked;
        blocked
    }

    fn reset(&mut self) {
        for line in self.lines.iter_mut() {
            line.reset();
        }
        self.dc_block_prev_in = 0.0;
        self.dc_block_prev_out = 0.0;
    }
}

/// Per-orbit algorithmic reverb send.
pub struct Reverb {
    sample_rate: f64,
    core: FdnCore,
    room: f64,
    room_size: f64,
    room_lp: f64,
    room_fade: f64,
    room_dim: f64,
    i_response: f64,
}

impl Reverb {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            core: FdnCore::new(sample_rate),
            room: 0.0,
            room_size: 0.0,
            room_lp: 0.2,
            room_fade: 0.5,
            room_dim: 0.0,
            i_response: 0.5,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_params(
        &mut self,
        room: f64,
        room_size: f64,
        room_lp: f64,
        room_fade: f64,
        room_dim: f64,
        i_response: f64,
    ) {
        self.room = room.clamp(0.0, 1.0);
        self.room_size = room_size.clamp(0.0, 1.0);
        self.room_lp = room_lp.clamp(0.0, 1.0);
        self.room_fade = room_fade.clamp(0.0, 1.0);
        self.room_dim = room_dim.clamp(0.0, 1.0);
        self.i_response = i_response.clamp(0.0, 1.0);

        // room_fade maps inversely to feedback decay: a faster fade is a
        // lower feedback gain, a longer fade approaches the ceiling.
        self.core.update_decay(1.0 - self.room_fade);
        self.core.update_damping(self.room_lp, self.room_dim);
        // room_size directly rescales every delay line length, so doubling
        // it at least doubles the time energy takes to recirculate. A pure
        // multiplicative map (no additive floor) is required for that:
        // scale(2r)/scale(r) == 2 exactly, for any r with 2r in [0,1].
        let scale = self.room_size * 2.0;
        self.core.update_space_scale(scale, self.sample_rate);
    }

    pub fn is_enabled(&self) -> bool {
        self.room_size >= DISABLE_THRESHOLD
    }

    pub fn process(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        if !self.is_enabled() {
            return;
        }
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let mono_in = (*l + *r) * 0.5;
            let wet = self.core.step(mono_in);
            *l = *l * (1.0 - self.i_response) + wet * self.i_response;
            *r = *r * (1.0 - self.i_response) + wet * self.i_response;
        }
    }

    pub fn reset(&mut self) {
        self.core.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_below_threshold_leaves_input_untouched() {
        let mut reverb = Reverb::new(44_100.0);
        reverb.set_params(0.5, 0.005, 0.2, 0.5, 0.0, 0.5);
        let mut left = vec![1.0; 8];
        let mut right = vec![1.0; 8];
        reverb.process(&mut left, &mut right);
        assert!(left.iter().all(|&x| x == 1.0));
    }

    #[test]
    fn enabled_reverb_produces_finite_output() {
        let mut reverb = Reverb::new(44_100.0);
        reverb.set_params(0.5, 0.6, 0.2, 0.6, 0.1, 0.5);
        let mut left = vec![0.0; 2000];
        left[0] = 1.0;
        let mut right = vec![0.0; 2000];
        reverb.process(&mut left, &mut right);
        assert!(left.iter().all(|x| x.is_finite()));
        assert!(left.iter().any(|&x| x != 0.0));
    }

    #[test]
    fn doubling_room_size_at_least_doubles_tail_energy() {
        let sample_rate = 44_100.0;
        let tail_energy = |room_size: f64| {
            let mut reverb = Reverb::new(sample_rate);
            reverb.set_params(0.5, room_size, 0.1, 0.9, 0.0, 1.0);
            let mut left = vec![0.0; 8000];
            left[0] = 1.0;
            let mut right = vec![0.0; 8000];
            reverb.process(&mut left, &mut right);
            left[4000..8000].iter().map(|x| x.abs()).sum::<f64>()
        };
        let room_size = 0.25;
        let small = tail_energy(room_size);
        let large = tail_energy(room_size * 2.0);
        assert!(
            large >= small * 2.0,
            "doubling room_size should at least double tail energy: small={small} large={large}"
        );
    }
}
