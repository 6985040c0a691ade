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
// Voice mixing shared by the cpal and mock outputs.
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::synth::{Voice, VoiceRegistry};

struct MixState {
    registry: VoiceRegistry,
    /// Mono scratch buffer reused across blocks.
    scratch: Vec<f32>,
}

/// Mixes every live voice into interleaved output and owns the sample clock.
pub struct Mixer {
    state: Mutex<MixState>,
    /// New voices queued by triggering threads.
    voice_tx: crossbeam_channel::Sender<Voice>,
    voice_rx: crossbeam_channel::Receiver<Voice>,
    /// Number of output channels
    num_channels: u16,
    /// Sample rate
    sample_rate: u32,
    /// Gain applied to the summed voices before output.
    master_gain: f32,
    /// Frames rendered so far.
    current_sample: AtomicU64,
    /// Voice count published after each block.
    active_voices: AtomicUsize,
}

impl Mixer {
    /// Creates a new mixer
    pub fn new(num_channels: u16, sample_rate: u32, master_gain: f32) -> Self {
        let (voice_tx, voice_rx) = crossbeam_channel::unbounded();
        Self {
            state: Mutex::new(MixState {
                registry: VoiceRegistry::new(),
                scratch: Vec::new(),
            }),
            voice_tx,
            voice_rx,
            num_channels: num_channels.max(1),
            sample_rate,
            master_gain,
            current_sample: AtomicU64::new(0),
            active_voices: AtomicUsize::new(0),
        }
    }

    /// Queues a voice. It joins the mix at the start of the next block.
    pub fn add_voice(&self, voice: Voice) {
        // The receiver lives as long as the mixer, so the send cannot fail.
        let _ = self.voice_tx.send(voice);
    }

    /// Fills an interleaved buffer with the next block of audio.
    pub fn process_into_output(&self, output: &mut [f32]) {
        let channels = self.num_channels as usize;
        let frames = output.len() / channels;
        let mut state = self.state.lock();
        let MixState { registry, scratch } = &mut *state;

        let block_start = self.current_sample.load(Ordering::Acquire);
        while let Ok(mut voice) = self.voice_rx.try_recv() {
            // Triggered while the previous block was rendering.
            voice.start_no_earlier_than(block_start);
            registry.add_voice(voice);
        }

        scratch.clear();
        scratch.resize(frames, 0.0);
        registry.render_into(scratch, block_start);

        for (frame, sample) in output.chunks_mut(channels).zip(scratch.iter()) {
            frame.fill(sample * self.master_gain);
        }
        // Any trailing partial frame is silence.
        output[frames * channels..].fill(0.0);

        let block_end = block_start + frames as u64;
        self.current_sample.store(block_end, Ordering::Release);

        let reclaimed = registry.reclaim_finished(block_end);
        if reclaimed > 0 {
            debug!(
                reclaimed,
                active = registry.active_count(),
                "Reclaimed finished voices"
            );
        }
        self.active_voices
            .store(registry.active_count(), Ordering::Release);
    }

    /// Processes multiple frames of audio mixing.
    pub fn process_frames(&self, num_frames: usize) -> Vec<f32> {
        let mut frames = vec![0.0f32; num_frames * self.num_channels as usize];
        self.process_into_output(&mut frames);
        frames
    }

    /// Drops every voice, queued or sounding.
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let mut dropped = state.registry.clear();
        while self.voice_rx.try_recv().is_ok() {
            dropped += 1;
        }
        self.active_voices.store(0, Ordering::Release);
        dropped
    }

    /// The sample clock position of the next frame to be rendered.
    pub fn current_sample(&self) -> u64 {
        self.current_sample.load(Ordering::Acquire)
    }

    /// Voices sounding or waiting to join the mix.
    pub fn active_voice_count(&self) -> usize {
        self.active_voices.load(Ordering::Acquire) + self.voice_rx.len()
    }

    /// Gets the number of output channels
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Gets the sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }
}
