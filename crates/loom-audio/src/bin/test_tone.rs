//! Plays a single sustained sine tone through the default output device.
//! A minimal smoke test for the renderer/stream wiring, in the spirit of
//! a one-shot hardware check rather than a real performance.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use loom_audio::{get_default_output_device, AudioStream};
use loom_comm::Cmd;
use loom_core::{Adsr, EngineConfig, OscillatorKind, ScheduledVoice, SoundSource, VoiceData};
use loom_engine::Engine;

fn main() {
    env_logger::init();

    let config = EngineConfig {
        sample_rate: 44_100.0,
        block_size: 256,
        ..Default::default()
    };

    let (engine, planner) = Engine::new(&config);
    let engine = Arc::new(Mutex::new(engine));

    let voice = ScheduledVoice {
        playback_id: "test-tone".into(),
        data: VoiceData {
            source: SoundSource::Oscillator(OscillatorKind::Sine),
            freq_hz: Some(440.0),
            adsr: Adsr {
                attack_sec: 0.05,
                decay_sec: 0.0,
                sustain_level: 0.8,
                release_sec: 0.3,
            },
            filters: vec![],
            pan: 0.0,
            gain: 0.5,
            orbit_id: 0,
            delay: None,
            reverb: None,
            phaser: None,
            vibrato: None,
            compressor: None,
            ducking: None,
            unison: None,
            warmth: None,
        },
        start_time: 0.0,
        gate_end_time: 3.0,
        playback_start_time: 0.0,
    };

    if !planner.control_tx.send(Cmd::ScheduleVoice { voice, clear_scheduled: false }) {
        log::error!("control channel full, test tone was not scheduled");
        return;
    }

    let device = match get_default_output_device() {
        Ok(device) => device,
        Err(err) => {
            log::error!("no output device available: {err}");
            return;
        }
    };

    match AudioStream::new(&device, engine) {
        Ok(stream) => {
            log::info!("playing 440Hz test tone for 4 seconds");
            std::thread::sleep(Duration::from_secs(4));
            drop(stream);
        }
        Err(err) => log::error!("failed to start output stream: {err}"),
    }
}
