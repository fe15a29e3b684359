//! The sample registry's index of banks/sounds/aliases and the
//! deterministic, total lookup described in the sample resolution rules.

use std::collections::HashMap;

use loom_core::{MonoSamplePcm, SampleRequest};

#[derive(Debug, Clone)]
pub struct SampleDescriptor {
    pub key: String,
    pub pitch_hz: f64,
    pub pcm: MonoSamplePcm,
}

#[derive(Debug, Clone)]
pub struct Sound {
    pub key: String,
    /// Sorted once by `pitch_hz`, ascending, at construction time.
    samples: Vec<SampleDescriptor>,
}

impl Sound {
    pub fn new(key: impl Into<String>, mut samples: Vec<SampleDescriptor>) -> Self {
        samples.sort_by(|a, b| a.pitch_hz.partial_cmp(&b.pitch_hz).unwrap());
        Self {
            key: key.into(),
            samples,
        }
    }

    /// First sample whose `pitch_hz >= target_hz`; falls back to the
    /// highest-pitched sample if none qualifies.
    pub fn nearest_by_pitch(&self, target_hz: f64) -> Option<&SampleDescriptor> {
        self.samples
            .iter()
            .find(|s| s.pitch_hz >= target_hz)
            .or_else(|| self.samples.last())
    }

    pub fn by_index(&self, index: usize) -> Option<&SampleDescriptor> {
        if self.samples.is_empty() {
            None
        } else {
            Some(&self.samples[index % self.samples.len()])
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Bank {
    pub name: String,
    sounds: HashMap<String, Sound>,
}

impl Bank {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sounds: HashMap::new(),
        }
    }

    pub fn insert_sound(&mut self, sound: Sound) {
        self.sounds.insert(sound.key.clone(), sound);
    }

    pub fn sound(&self, key: &str) -> Option<&Sound> {
        self.sounds.get(key)
    }
}

/// `{ banks: {name -> Bank}, aliases: {string -> string} }`.
#[derive(Debug, Clone, Default)]
pub struct SampleIndex {
    banks: HashMap<String, Bank>,
    aliases: HashMap<String, String>,
}

impl SampleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_bank(&mut self, bank: Bank) {
        self.banks.insert(bank.name.clone(), bank);
    }

    pub fn insert_alias(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.aliases.insert(from.into(), to.into());
    }

    fn resolve_bank(&self, name: &str) -> Option<&Bank> {
        self.banks
            .get(name)
            .or_else(|| self.aliases.get(name).and_then(|target| self.banks.get(target)))
    }

    /// Deterministic, total lookup per the sample resolution rules: a
    /// missing bank, sound, or empty sound all resolve to `None`
    /// (`Sample.NotFound` at the CommLink boundary).
    pub fn resolve(&self, request: &SampleRequest) -> Option<&SampleDescriptor> {
        let bank_name = request.bank.as_deref().unwrap_or("");
        let bank = self.resolve_bank(bank_name)?;
        let sound_key = request.sound.as_deref()?;
        let sound = bank.sound(sound_key)?;

        if let Some(note) = request.note {
            let target_hz = note_to_hz(note);
            sound.nearest_by_pitch(target_hz)
        } else {
            sound.by_index(request.index.unwrap_or(0))
        }
    }
}

/// MIDI-note-to-frequency is an external music-theory helper in the full
/// system; this is the minimal equal-temperament fallback used only when
/// resolving samples by `note` without a richer tuning table supplied.
fn note_to_hz(note: f64) -> f64 {
    440.0 * 2f64.powf((note - 69.0) / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(key: &str, pitch_hz: f64) -> SampleDescriptor {
        SampleDescriptor {
            key: key.to_string(),
            pitch_hz,
            pcm: MonoSamplePcm::new(44_100, vec![0.0; 4]),
        }
    }

    #[test]
    fn missing_bank_yields_none() {
        let index = SampleIndex::new();
        let request = SampleRequest {
            bank: Some("drums".into()),
            sound: Some("kick".into()),
            note: None,
            index: None,
        };
        assert!(index.resolve(&request).is_none());
    }

    #[test]
    fn missing_sound_yields_none() {
        let mut index = SampleIndex::new();
        index.insert_bank(Bank::new("drums"));
        let request = SampleRequest {
            bank: Some("drums".into()),
            sound: Some("kick".into()),
            note: None,
            index: None,
        };
        assert!(index.resolve(&request).is_none());
    }

    #[test]
    fn index_wraps_modulo_sample_count() {
        let mut bank = Bank::new("drums");
        bank.insert_sound(Sound::new("kick", vec![descriptor("a", 100.0), descriptor("b", 200.0)]));
        let mut index = SampleIndex::new();
        index.insert_bank(bank);
        let request = SampleRequest {
            bank: Some("drums".into()),
            sound: Some("kick".into()),
            note: None,
            index: Some(2),
        };
        let resolved = index.resolve(&request).unwrap();
        assert_eq!(resolved.key, "a");
    }

    #[test]
    fn note_picks_nearest_pitch_at_or_above_with_fallback_to_highest() {
        let mut bank = Bank::new("drums");
        bank.insert_sound(Sound::new(
            "piano",
            vec![descriptor("low", 220.0), descriptor("mid", 440.0), descriptor("high", 880.0)],
        ));
        let mut index = SampleIndex::new();
        index.insert_bank(bank);

        let mid_request = SampleRequest {
            bank: Some("drums".into()),
            sound: Some("piano".into()),
            note: Some(69.0), // A4 = 440Hz
            index: None,
        };
        assert_eq!(index.resolve(&mid_request).unwrap().key, "mid");

        let above_highest = SampleRequest {
            bank: Some("drums".into()),
            sound: Some("piano".into()),
            note: Some(96.0), // well above 880Hz
            index: None,
        };
        assert_eq!(index.resolve(&above_highest).unwrap().key, "high");
    }

    #[test]
    fn alias_redirects_to_target_bank() {
        let mut bank = Bank::new("real_drums");
        bank.insert_sound(Sound::new("kick", vec![descriptor("k", 100.0)]));
        let mut index = SampleIndex::new();
        index.insert_bank(bank);
        index.insert_alias("drums", "real_drums");

        let request = SampleRequest {
            bank: Some("drums".into()),
            sound: Some("kick".into()),
            note: None,
            index: None,
        };
        assert_eq!(index.resolve(&request).unwrap().key, "k");
    }
}
