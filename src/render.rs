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

//! Offline rendering. Songs are played through a mock device with the sample clock
//! advanced by hand, so each step lands on an exact frame.

use std::{path::Path, sync::Arc};

use hound::{SampleFormat, WavSpec, WavWriter};
use thiserror::Error;
use tracing::info;

use crate::audio::mock;
use crate::engine::{Engine, EngineError};
use crate::sequencer::SEQUENCE_NOTE_DURATION;
use crate::songs::Song;
use crate::synth::voice::RECLAIM_MARGIN;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("failed to write WAV: {0}")]
    Wav(#[from] hound::Error),
}

/// Interleaved audio produced by an offline render.
pub struct Rendered {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl Rendered {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Writes the audio as a 32-bit float WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<(), RenderError> {
        let mut writer = WavWriter::create(
            path,
            WavSpec {
                channels: self.channels,
                sample_rate: self.sample_rate,
                bits_per_sample: 32,
                sample_format: SampleFormat::Float,
            },
        )?;
        for sample in &self.samples {
            writer.write_sample(*sample)?;
        }
        writer.finalize()?;
        Ok(())
    }
}

fn ms_to_frames(ms: u64, sample_rate: u32) -> u64 {
    ms * sample_rate as u64 / 1000
}

/// Renders a song from its first note until the last one has died away.
pub fn render_song(song: &Song, sample_rate: u32) -> Result<Rendered, RenderError> {
    let device = mock::Device::with_format("mock-render", sample_rate, mock::DEFAULT_CHANNELS);
    let engine = Engine::new(Arc::new(device.clone()));
    engine.init()?;

    let mut samples = Vec::new();
    let mut rendered = 0u64;
    let mut offset_ms = 0u64;
    for step in song.steps() {
        let target = ms_to_frames(offset_ms, sample_rate);
        samples.extend(device.render((target - rendered) as usize));
        rendered = target;

        engine.trigger(step.frequency, SEQUENCE_NOTE_DURATION);
        offset_ms += step.delay_ms;
    }

    let tail = (SEQUENCE_NOTE_DURATION + RECLAIM_MARGIN).as_millis() as u64;
    samples.extend(device.render(ms_to_frames(tail, sample_rate) as usize));
    engine.shutdown();

    info!(
        song = song.name(),
        frames = samples.len() / mock::DEFAULT_CHANNELS as usize,
        sample_rate,
        "Rendered song."
    );
    Ok(Rendered {
        samples,
        channels: mock::DEFAULT_CHANNELS,
        sample_rate,
    })
}
