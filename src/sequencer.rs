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
use std::{
    io,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, span, Level};

use crate::engine::Instrument;
use crate::playsync::{CancelHandle, FinishOnDrop};

/// Length of every note the sequencer strikes.
pub const SEQUENCE_NOTE_DURATION: Duration = Duration::from_millis(800);

#[derive(Debug, Error)]
pub enum SequencerError {
    #[error("failed to start sequence thread: {0}")]
    Spawn(#[from] io::Error),
}

/// One note of a song. `delay_ms` is the gap between this note and the next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceStep {
    pub frequency: f32,
    pub delay_ms: u64,
    pub note: String,
}

impl SequenceStep {
    pub fn new(frequency: f32, delay_ms: u64, note: &str) -> SequenceStep {
        SequenceStep {
            frequency,
            delay_ms,
            note: note.to_string(),
        }
    }
}

struct Session {
    cancel_handle: CancelHandle,
    thread: thread::JoinHandle<()>,
}

/// Plays a list of steps against an instrument, one session at a time.
pub struct Sequencer {
    instrument: Arc<dyn Instrument>,
    session: Mutex<Option<Session>>,
}

impl Sequencer {
    pub fn new(instrument: Arc<dyn Instrument>) -> Sequencer {
        Sequencer {
            instrument,
            session: Mutex::new(None),
        }
    }

    /// Starts playing `steps`, stopping any session already running. Step `i` sounds
    /// at the sum of the delays before it, measured from the start of the session.
    /// `on_step` is called with each note's name as it sounds, and `on_complete` right
    /// after the last one. An empty song completes immediately.
    pub fn play<S, C>(
        &self,
        steps: Vec<SequenceStep>,
        mut on_step: S,
        on_complete: C,
    ) -> Result<(), SequencerError>
    where
        S: FnMut(&str) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        // The old session is replaced under the lock, so two sessions never overlap.
        // It is joined once the lock is released.
        let mut session = self.session.lock();
        let previous = session.take();
        if let Some(previous) = &previous {
            previous.cancel_handle.cancel();
        }

        if steps.is_empty() {
            drop(session);
            Self::join(previous);
            debug!("Empty sequence, completing immediately");
            on_complete();
            return Ok(());
        }

        let cancel_handle = CancelHandle::new();
        self.instrument.adopt_schedule(cancel_handle.clone());

        let spawned = {
            let cancel_handle = cancel_handle.clone();
            let finish = FinishOnDrop::new(cancel_handle.clone());
            let instrument = self.instrument.clone();
            thread::Builder::new()
                .name("airpiano-sequencer".to_string())
                .spawn(move || {
                    let span = span!(Level::INFO, "sequence", steps = steps.len());
                    let _enter = span.enter();

                    let start = Instant::now();
                    let mut offset = Duration::ZERO;
                    for step in steps.iter() {
                        if cancel_handle.wait_until(start + offset) {
                            info!("Sequence cancelled.");
                            return;
                        }
                        debug!(note = step.note, frequency = step.frequency, "Sequence step");
                        instrument.trigger(step.frequency, SEQUENCE_NOTE_DURATION);
                        on_step(&step.note);
                        offset += Duration::from_millis(step.delay_ms);
                    }

                    // The last step sounded, so the song is complete even if a stop
                    // arrived after it.
                    drop(finish);
                    info!("Sequence complete.");
                    on_complete();
                })
        };

        let started = spawned.map(|thread| {
            *session = Some(Session {
                cancel_handle,
                thread,
            });
        });
        drop(session);
        Self::join(previous);
        Ok(started?)
    }

    /// Cancels the running session. Notes already struck keep decaying; steps not yet
    /// reached never sound.
    pub fn stop(&self) {
        // Take the session out first so callbacks can query the sequencer while we join.
        let session = self.session.lock().take();
        if let Some(session) = &session {
            session.cancel_handle.cancel();
        }
        Self::join(session);
    }

    fn join(session: Option<Session>) {
        let Some(session) = session else {
            return;
        };
        // A callback may stop or replace its own session; it can't join itself.
        if session.thread.thread().id() == thread::current().id() {
            return;
        }
        if session.thread.join().is_err() {
            tracing::error!("Sequence thread panicked");
        }
    }

    /// Returns true while a session has steps left to play.
    pub fn is_playing(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|session| !session.cancel_handle.is_done())
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        self.stop();
    }
}
