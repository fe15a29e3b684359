//! The bounded, ID-addressed collection of orbits and the per-block
//! mix-down into the master bus.

use std::collections::BTreeMap;

use loom_core::{Sample, StereoBuffer};

use crate::orbit::Orbit;

/// `id mod max_orbits` is the bucket every voice/orbit reference lands in;
/// a `BTreeMap` gives the stable ascending iteration order the mixing and
/// round-robin cleanup steps both rely on.
pub struct Orbits {
    sample_rate: f64,
    block_frames: usize,
    max_orbits: usize,
    orbits: BTreeMap<usize, Orbit>,
    cleanup_cursor: usize,
}

impl Orbits {
    pub fn new(sample_rate: f64, block_frames: usize, max_orbits: usize) -> Self {
        Self {
            sample_rate,
            block_frames,
            max_orbits: max_orbits.clamp(1, 32),
            orbits: BTreeMap::new(),
            cleanup_cursor: 0,
        }
    }

    pub fn max_orbits(&self) -> usize {
        self.max_orbits
    }

    pub fn len(&self) -> usize {
        self.orbits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orbits.is_empty()
    }

    fn bucket(&self, id: usize) -> usize {
        id % self.max_orbits
    }

    /// Lazily creates the orbit for `id`'s bucket if it doesn't exist yet.
    /// Does not mark it active — that's `Orbit::update_from_voice`'s job.
    pub fn get_or_init(&mut self, id: usize) -> &mut Orbit {
        let bucket = self.bucket(id);
        let block_frames = self.block_frames;
        let sample_rate = self.sample_rate;
        self.orbits
            .entry(bucket)
            .or_insert_with(|| Orbit::new(bucket, sample_rate, block_frames))
    }

    pub fn clear_all(&mut self) {
        for orbit in self.orbits.values_mut() {
            orbit.clear();
        }
    }

    pub fn resize(&mut self, block_frames: usize) {
        self.block_frames = block_frames;
        for orbit in self.orbits.values_mut() {
            orbit.resize(block_frames);
        }
    }

    /// 1. Runs each active orbit's insert effects.
    /// 2. Applies cross-orbit ducking (sidechain read, target write).
    /// 3. Sums every active orbit into `master` (inactive orbits never mix).
    pub fn process_and_mix(&mut self, master: &mut StereoBuffer) {
        for orbit in self.orbits.values_mut() {
            orbit.process_effects();
        }

        let sidechains: Vec<(usize, usize)> = self
            .orbits
            .iter()
            .filter(|(_, o)| o.has_ducking())
            .filter_map(|(&id, o)| o.duck_orbit_id().map(|source| (id, source)))
            .collect();

        for (target_id, source_id) in sidechains {
            if !self.orbits.contains_key(&source_id) {
                continue; // missing sidechain orbit is a no-op
            }
            let (source_left, source_right): (Vec<Sample>, Vec<Sample>) = {
                let source = &self.orbits[&source_id];
                let (l, r) = source.mix();
                (l.to_vec(), r.to_vec())
            };
            if let Some(target) = self.orbits.get_mut(&target_id) {
                target.duck_with_sidechain(&source_left, &source_right);
            }
        }

        for orbit in self.orbits.values() {
            if orbit.is_active() {
                let (left, right) = orbit.mix();
                master.add_stereo(left, right);
            }
        }
    }

    /// Checks `try_deactivate` on exactly one orbit (indexed by
    /// `cleanup_cursor mod max_orbits`), then advances the cursor. Bounds
    /// per-block cleanup work to O(blockFrames) regardless of orbit count.
    pub fn round_robin_cleanup(&mut self) {
        let bucket = self.cleanup_cursor % self.max_orbits;
        if let Some(orbit) = self.orbits.get_mut(&bucket) {
            orbit.try_deactivate();
        }
        self.cleanup_cursor = (self.cleanup_cursor + 1) % self.max_orbits;
    }
}
