// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The synthesis engine: owns the output device and turns trigger calls into voices.
//!
//! The engine starts uninitialized. [`Engine::init`] opens the output and must be
//! called before any note sounds; triggers that arrive earlier are dropped. Voices are
//! never stopped early: a struck note always decays on its own.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, span, Level};

use crate::audio::{AudioError, Device, Mixer, Output};
use crate::playsync::CancelHandle;
use crate::synth::Voice;

/// Gain applied to the sum of every voice.
pub const MASTER_GAIN: f32 = 0.4;

/// Note length used for gesture presses.
pub const DEFAULT_NOTE_DURATION: Duration = Duration::from_millis(1500);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("audio output unavailable: {0}")]
    Audio(#[from] AudioError),
}

/// Something that can sound notes. The sequencer and the frame loop only see this.
pub trait Instrument: Send + Sync {
    /// Strikes a note. Calls that cannot sound are ignored.
    fn trigger(&self, frequency: f32, duration: Duration);

    /// Registers a pending schedule so a global stop can cancel it.
    fn adopt_schedule(&self, _handle: CancelHandle) {}
}

struct Active {
    mixer: Arc<Mixer>,
    output: Box<dyn Output>,
}

pub struct Engine {
    device: Arc<dyn Device>,
    active: Mutex<Option<Active>>,
    /// Schedules (sequencer sessions) that `stop_all` cancels.
    pending: Mutex<Vec<CancelHandle>>,
}

impl Engine {
    /// Creates an uninitialized engine for the given device. Nothing is opened yet.
    pub fn new(device: Arc<dyn Device>) -> Engine {
        Engine {
            device,
            active: Mutex::new(None),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Opens the output. Calling this on an initialized engine only resumes a suspended
    /// output. On failure nothing is left open and the call may be retried.
    pub fn init(&self) -> Result<(), EngineError> {
        let span = span!(Level::INFO, "engine init");
        let _enter = span.enter();

        let mut active = self.active.lock();
        if let Some(active) = active.as_mut() {
            if active.output.is_suspended() {
                info!(device = %self.device, "Resuming suspended output.");
                active.output.resume()?;
            }
            return Ok(());
        }

        let mixer = Arc::new(Mixer::new(
            self.device.channels(),
            self.device.sample_rate(),
            MASTER_GAIN,
        ));
        let mut output = self.device.open(mixer.clone())?;
        if output.is_suspended() {
            if let Err(e) = output.resume() {
                output.close();
                return Err(e.into());
            }
        }

        info!(
            device = %self.device,
            sample_rate = mixer.sample_rate(),
            channels = mixer.num_channels(),
            "Audio engine initialized."
        );
        *active = Some(Active { mixer, output });
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Strikes a note starting now. Ignored until the engine is initialized, and for
    /// frequencies or durations that can't sound.
    pub fn trigger(&self, frequency: f32, duration: Duration) {
        if !frequency.is_finite() || frequency <= 0.0 || duration.is_zero() {
            debug!(frequency, ?duration, "Ignoring trigger with invalid parameters");
            return;
        }

        let active = self.active.lock();
        let Some(active) = active.as_ref() else {
            debug!(frequency, "Ignoring trigger, engine not initialized");
            return;
        };

        let mixer = &active.mixer;
        let voice = Voice::new(
            frequency,
            duration,
            mixer.sample_rate(),
            mixer.current_sample(),
        );
        debug!(voice = voice.id(), frequency, ?duration, "Triggering note");
        mixer.add_voice(voice);
    }

    /// Strikes a note with the default length.
    pub fn trigger_default(&self, frequency: f32) {
        self.trigger(frequency, DEFAULT_NOTE_DURATION);
    }

    /// Registers a pending schedule. Finished schedules are dropped along the way.
    pub fn adopt_schedule(&self, handle: CancelHandle) {
        let mut pending = self.pending.lock();
        pending.retain(|handle| !handle.is_done());
        pending.push(handle);
    }

    /// Cancels every pending schedule. Notes already sounding decay normally.
    pub fn stop_all(&self) {
        let pending: Vec<CancelHandle> = self.pending.lock().drain(..).collect();
        if !pending.is_empty() {
            info!(count = pending.len(), "Cancelling pending schedules.");
        }
        for handle in pending {
            handle.cancel();
        }
    }

    /// Cancels pending schedules, closes the output and drops every voice. The engine
    /// may be initialized again afterwards.
    pub fn shutdown(&self) {
        self.stop_all();
        let Some(mut active) = self.active.lock().take() else {
            return;
        };
        active.output.close();
        let dropped = active.mixer.clear();
        info!(device = %self.device, dropped, "Audio engine shut down.");
    }

    /// Voices sounding or about to sound. Zero when uninitialized.
    pub fn active_voice_count(&self) -> usize {
        self.active
            .lock()
            .as_ref()
            .map_or(0, |active| active.mixer.active_voice_count())
    }

    pub fn master_gain(&self) -> f32 {
        MASTER_GAIN
    }

    /// The output sample rate, once initialized.
    pub fn sample_rate(&self) -> Option<u32> {
        self.active
            .lock()
            .as_ref()
            .map(|active| active.mixer.sample_rate())
    }
}

impl Instrument for Engine {
    fn trigger(&self, frequency: f32, duration: Duration) {
        Engine::trigger(self, frequency, duration);
    }

    fn adopt_schedule(&self, handle: CancelHandle) {
        Engine::adopt_schedule(self, handle);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock;
    use crate::testutil::audio_test_utils::{calculate_peak, calculate_rms};

    const SAMPLE_RATE: u32 = 44100;

    fn setup() -> (mock::Device, Engine) {
        let device = mock::Device::get("mock");
        let engine = Engine::new(Arc::new(device.clone()));
        (device, engine)
    }

    fn frames(seconds: f32) -> usize {
        (seconds * SAMPLE_RATE as f32) as usize
    }

    #[test]
    fn test_init_is_idempotent() -> Result<(), EngineError> {
        let (device, engine) = setup();
        assert!(!engine.is_initialized());
        assert_eq!(engine.sample_rate(), None);

        engine.init()?;
        engine.init()?;
        assert!(engine.is_initialized());
        assert_eq!(device.open_count(), 1);
        assert_eq!(engine.master_gain(), 0.4);
        assert_eq!(engine.sample_rate(), Some(SAMPLE_RATE));
        Ok(())
    }

    #[test]
    fn test_failed_init_can_be_retried() -> Result<(), EngineError> {
        let (device, engine) = setup();
        device.fail_next_opens(1);

        assert!(engine.init().is_err());
        assert!(!engine.is_initialized());
        assert!(!device.is_open());

        engine.init()?;
        assert!(engine.is_initialized());
        Ok(())
    }

    #[test]
    fn test_failed_resume_leaves_nothing_open() {
        let (device, engine) = setup();
        device.start_suspended(true);
        device.fail_next_resumes(1);

        assert!(engine.init().is_err());
        assert!(!engine.is_initialized());
        assert!(!device.is_open());
    }

    #[test]
    fn test_init_resumes_suspended_output() -> Result<(), EngineError> {
        let (device, engine) = setup();
        device.start_suspended(true);
        engine.init()?;
        engine.trigger(440.0, Duration::from_millis(200));
        assert!(calculate_rms(&device.render(frames(0.1))) > 0.0);
        Ok(())
    }

    #[test]
    fn test_trigger_before_init_is_ignored() -> Result<(), EngineError> {
        let (device, engine) = setup();
        engine.trigger_default(440.0);
        assert_eq!(engine.active_voice_count(), 0);

        engine.init()?;
        assert_eq!(engine.active_voice_count(), 0);
        assert!(device.render(1024).iter().all(|sample| *sample == 0.0));
        Ok(())
    }

    #[test]
    fn test_endless_trigger_keeps_sounding() -> Result<(), EngineError> {
        let (device, engine) = setup();
        engine.init()?;
        device.render(64);

        engine.trigger(440.0, Duration::from_secs(u64::MAX));
        assert!(calculate_rms(&device.render(frames(0.1))) > 0.0);
        assert_eq!(engine.active_voice_count(), 1);
        Ok(())
    }

    #[test]
    fn test_invalid_triggers_are_ignored() -> Result<(), EngineError> {
        let (_device, engine) = setup();
        engine.init()?;
        engine.trigger(0.0, DEFAULT_NOTE_DURATION);
        engine.trigger(-440.0, DEFAULT_NOTE_DURATION);
        engine.trigger(f32::NAN, DEFAULT_NOTE_DURATION);
        engine.trigger(f32::INFINITY, DEFAULT_NOTE_DURATION);
        engine.trigger(440.0, Duration::ZERO);
        assert_eq!(engine.active_voice_count(), 0);
        Ok(())
    }

    #[test]
    fn test_rapid_retrigger_layers_voices() -> Result<(), EngineError> {
        let (device, engine) = setup();
        engine.init()?;

        engine.trigger(440.0, Duration::from_millis(500));
        device.render(frames(0.01));
        engine.trigger(440.0, Duration::from_millis(500));
        assert_eq!(engine.active_voice_count(), 2);

        let output = device.render(frames(0.3));
        assert_eq!(engine.active_voice_count(), 2);
        // Two voices of three layers each at a 0.6 peak envelope through the master gain.
        let peak = calculate_peak(&output);
        assert!(peak > 0.0);
        assert!(peak < 2.0 * 3.0 * 0.6 * MASTER_GAIN * 1.2, "peak {}", peak);
        Ok(())
    }

    #[test]
    fn test_voice_reclaimed_after_margin() -> Result<(), EngineError> {
        let (device, engine) = setup();
        engine.init()?;
        engine.trigger(261.63, Duration::from_millis(200));

        // Stops at 8820 frames and is reclaimable 4410 frames later.
        device.render(13229);
        assert_eq!(engine.active_voice_count(), 1);
        device.render(1);
        assert_eq!(engine.active_voice_count(), 0);
        Ok(())
    }

    #[test]
    fn test_notes_decay() -> Result<(), EngineError> {
        let (device, engine) = setup();
        engine.init()?;
        engine.trigger_default(440.0);

        let output = device.render(frames(1.5));
        let channels = 2;
        let early = calculate_rms(&output[frames(0.02) * channels..frames(0.12) * channels]);
        let late = calculate_rms(&output[frames(1.3) * channels..frames(1.4) * channels]);
        assert!(early > late * 5.0, "early {} late {}", early, late);
        Ok(())
    }

    #[test]
    fn test_stop_all_cancels_schedules_only() -> Result<(), EngineError> {
        let (device, engine) = setup();
        engine.init()?;
        engine.trigger(392.0, Duration::from_secs(1));

        let handle = CancelHandle::new();
        engine.adopt_schedule(handle.clone());
        engine.stop_all();

        assert!(handle.is_cancelled());
        assert_eq!(engine.active_voice_count(), 1);
        assert!(calculate_rms(&device.render(1024)) > 0.0);
        Ok(())
    }

    #[test]
    fn test_shutdown_releases_everything() -> Result<(), EngineError> {
        let (device, engine) = setup();
        engine.init()?;
        engine.trigger_default(440.0);
        let handle = CancelHandle::new();
        engine.adopt_schedule(handle.clone());

        engine.shutdown();
        assert!(handle.is_cancelled());
        assert!(!engine.is_initialized());
        assert!(!device.is_open());
        assert_eq!(engine.active_voice_count(), 0);

        engine.init()?;
        assert_eq!(device.open_count(), 2);
        Ok(())
    }

    #[test]
    fn test_drop_closes_output() -> Result<(), EngineError> {
        let (device, engine) = setup();
        engine.init()?;
        drop(engine);
        assert!(!device.is_open());
        Ok(())
    }
}
