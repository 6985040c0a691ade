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

//! The input side: hand trackers and the frame loop that feeds the classifier.
//!
//! A tracker hands over one set of hands per camera frame. The frame loop runs on its
//! own thread and processes each frame completely (classify, trigger, publish) before
//! asking for the next one, so frames never overlap.

use std::{
    fs, io,
    path::Path,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, span, trace, warn, Level};

use crate::engine::{Instrument, DEFAULT_NOTE_DURATION};
use crate::gesture::{Classification, Classifier};
use crate::landmarks::HandFrame;
use crate::playsync::CancelHandle;

/// Pause after a failed frame before asking again.
const RETRY_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("tracker is not ready")]
    NotReady,

    #[error("tracker failed: {0}")]
    Failed(String),

    #[error("tracker closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unable to parse recording: {0}")]
    Parse(String),
}

/// A source of hand landmarks, one call per frame.
pub trait HandTracker: Send {
    /// Waits for the next frame. `Ok(None)` means nothing arrived in time and the
    /// cycle is skipped. [`TrackingError::Closed`] ends the frame loop; any other
    /// error only skips the cycle.
    fn next_frame(&mut self) -> Result<Option<Vec<HandFrame>>, TrackingError>;

    /// Releases the tracker's resources.
    fn close(&mut self) {}
}

/// Owns a tracker for the frame loop and closes it when dropped, including when the
/// loop's thread never starts.
struct ClosingTracker(Box<dyn HandTracker>);

impl Drop for ClosingTracker {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// A tracker fed over a channel by some external provider. When frames pile up only
/// the newest is kept.
pub struct ChannelTracker {
    frames: Receiver<Vec<HandFrame>>,
    poll_interval: Duration,
}

impl ChannelTracker {
    pub fn new(frames: Receiver<Vec<HandFrame>>, poll_interval: Duration) -> ChannelTracker {
        ChannelTracker {
            frames,
            poll_interval,
        }
    }
}

impl HandTracker for ChannelTracker {
    fn next_frame(&mut self) -> Result<Option<Vec<HandFrame>>, TrackingError> {
        let mut newest = match self.frames.recv_timeout(self.poll_interval) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => return Ok(None),
            Err(RecvTimeoutError::Disconnected) => return Err(TrackingError::Closed),
        };

        let mut skipped = 0;
        while let Ok(frame) = self.frames.try_recv() {
            newest = frame;
            skipped += 1;
        }
        if skipped > 0 {
            trace!(skipped, "Coalesced stale frames");
        }
        Ok(Some(newest))
    }
}

/// A recorded session on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recording {
    pub frames: Vec<Vec<HandFrame>>,
}

impl Recording {
    /// Reads a recording. The format follows the extension: `.json`, `.yaml` or `.yml`.
    pub fn load(path: &Path) -> Result<Recording, TrackingError> {
        let contents = fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        match extension {
            "json" => {
                serde_json::from_str(&contents).map_err(|e| TrackingError::Parse(e.to_string()))
            }
            "yaml" | "yml" => {
                serde_yml::from_str(&contents).map_err(|e| TrackingError::Parse(e.to_string()))
            }
            other => Err(TrackingError::Parse(format!(
                "unsupported recording format {:?}",
                other
            ))),
        }
    }
}

/// Replays a recording at a fixed frame interval, then closes.
pub struct RecordedTracker {
    frames: std::vec::IntoIter<Vec<HandFrame>>,
    interval: Duration,
    next_at: Option<Instant>,
}

impl RecordedTracker {
    pub fn new(recording: Recording, interval: Duration) -> RecordedTracker {
        RecordedTracker {
            frames: recording.frames.into_iter(),
            interval,
            next_at: None,
        }
    }

    /// Loads a recording from disk.
    pub fn load(path: &Path, interval: Duration) -> Result<RecordedTracker, TrackingError> {
        let recording = Recording::load(path)?;
        info!(
            path = %path.display(),
            frames = recording.frames.len(),
            "Loaded recorded session."
        );
        Ok(RecordedTracker::new(recording, interval))
    }
}

impl HandTracker for RecordedTracker {
    fn next_frame(&mut self) -> Result<Option<Vec<HandFrame>>, TrackingError> {
        if let Some(next_at) = self.next_at {
            spin_sleep::sleep(next_at.saturating_duration_since(Instant::now()));
        }
        let frame = self.frames.next().ok_or(TrackingError::Closed)?;
        self.next_at = Some(self.next_at.unwrap_or_else(Instant::now) + self.interval);
        Ok(Some(frame))
    }
}

/// The running frame loop.
pub struct FrameLoop {
    cancel_handle: CancelHandle,
    thread: Option<thread::JoinHandle<()>>,
}

impl FrameLoop {
    /// Starts pulling frames from `tracker` on a new thread. Each newly pressed key
    /// strikes its note on `instrument`; every classification is offered to `events`
    /// and dropped if the receiver is behind.
    pub fn spawn(
        tracker: Box<dyn HandTracker>,
        mut classifier: Classifier,
        instrument: Arc<dyn Instrument>,
        events: Option<Sender<Classification>>,
    ) -> Result<FrameLoop, TrackingError> {
        let cancel_handle = CancelHandle::new();
        let mut tracker = ClosingTracker(tracker);

        let thread = {
            let cancel_handle = cancel_handle.clone();
            thread::Builder::new()
                .name("airpiano-frames".to_string())
                .spawn(move || {
                    let span = span!(Level::INFO, "frame loop");
                    let _enter = span.enter();

                    let mut frames = 0u64;
                    while !cancel_handle.is_cancelled() {
                        let hands = match tracker.0.next_frame() {
                            Ok(Some(hands)) => hands,
                            Ok(None) => continue,
                            Err(TrackingError::Closed) => {
                                info!(frames, "Tracker closed.");
                                break;
                            }
                            Err(e) => {
                                debug!(err = %e, "Skipping frame");
                                if cancel_handle.wait_for(RETRY_DELAY) {
                                    break;
                                }
                                continue;
                            }
                        };
                        frames += 1;

                        let classification = classifier.classify(&hands);
                        if !classification.pressed.is_empty() {
                            debug!(
                                pressed = %classification.pressed,
                                hooked = %classification.hooked,
                                "Keys pressed"
                            );
                        }
                        for key in classification.pressed.keys() {
                            instrument.trigger(key.frequency, DEFAULT_NOTE_DURATION);
                        }

                        if let Some(events) = &events {
                            if events.try_send(classification).is_err() {
                                trace!("Dropped classification, presentation is behind");
                            }
                        }
                    }

                    drop(tracker);
                    cancel_handle.finish();
                })?
        };

        Ok(FrameLoop {
            cancel_handle,
            thread: Some(thread),
        })
    }

    /// Returns true until the loop has exited.
    pub fn is_running(&self) -> bool {
        !self.cancel_handle.is_done()
    }

    /// Halts the loop and waits for it to release the tracker.
    pub fn stop(&mut self) {
        self.cancel_handle.cancel();
        self.join();
    }

    /// Waits for the loop to exit on its own, e.g. at the end of a recording.
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Frame loop thread panicked");
            }
        }
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::error::Error;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::landmarks::{open_hand, Point3, INDEX_TIP};
    use crate::testutil::{eventually, RecordingInstrument};

    fn hooked_index(label: &str, origin_x: f32) -> HandFrame {
        let mut hand = open_hand(label, origin_x);
        let dip = hand.joints[INDEX_TIP - 1];
        let pip = hand.joints[INDEX_TIP - 2];
        let length = dip.to(&pip).length();
        hand.joints[INDEX_TIP] = Point3::new(dip.x + length, dip.y, dip.z);
        hand
    }

    /// Replays a fixed script of results, then reports closed.
    struct ScriptedTracker {
        script: VecDeque<Result<Option<Vec<HandFrame>>, TrackingError>>,
        closed: Arc<AtomicBool>,
    }

    impl HandTracker for ScriptedTracker {
        fn next_frame(&mut self) -> Result<Option<Vec<HandFrame>>, TrackingError> {
            self.script.pop_front().unwrap_or(Err(TrackingError::Closed))
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_unstarted_loop_closes_tracker() {
        let closed = Arc::new(AtomicBool::new(false));
        let job = {
            let tracker = ClosingTracker(Box::new(ScriptedTracker {
                script: VecDeque::new(),
                closed: closed.clone(),
            }));
            move || drop(tracker)
        };
        // Dropped unrun, as when the loop's thread fails to spawn.
        drop(job);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_channel_tracker_keeps_newest() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut tracker = ChannelTracker::new(rx, Duration::from_millis(10));

        assert!(matches!(tracker.next_frame(), Ok(None)));

        tx.send(vec![open_hand("Left", 0.3)]).unwrap();
        tx.send(Vec::new()).unwrap();
        tx.send(vec![open_hand("Right", 0.7)]).unwrap();
        let frame = tracker.next_frame().unwrap().unwrap();
        assert_eq!(frame.len(), 1);
        assert_eq!(frame[0].handedness, "Right");
        assert!(matches!(tracker.next_frame(), Ok(None)));

        drop(tx);
        assert!(matches!(tracker.next_frame(), Err(TrackingError::Closed)));
    }

    #[test]
    fn test_recording_formats() -> Result<(), Box<dyn Error>> {
        let recording = Recording {
            frames: vec![vec![open_hand("Right", 0.7)], Vec::new()],
        };
        let dir = tempfile::tempdir()?;

        let json = dir.path().join("session.json");
        fs::write(&json, serde_json::to_string(&recording)?)?;
        assert_eq!(Recording::load(&json)?.frames.len(), 2);

        let yaml = dir.path().join("session.yaml");
        fs::write(&yaml, serde_yml::to_string(&recording)?)?;
        let loaded = Recording::load(&yaml)?;
        assert_eq!(loaded.frames[0][0].joints.len(), 21);

        let text = dir.path().join("session.txt");
        fs::write(&text, "frames: []")?;
        assert!(matches!(
            Recording::load(&text),
            Err(TrackingError::Parse(_))
        ));
        Ok(())
    }

    #[test]
    fn test_recorded_tracker_paces_and_closes() {
        let recording = Recording {
            frames: vec![Vec::new(), Vec::new(), Vec::new()],
        };
        let mut tracker = RecordedTracker::new(recording, Duration::from_millis(20));

        let start = Instant::now();
        for _ in 0..3 {
            assert!(matches!(tracker.next_frame(), Ok(Some(_))));
        }
        assert!(start.elapsed() >= Duration::from_millis(40));
        assert!(matches!(tracker.next_frame(), Err(TrackingError::Closed)));
    }

    #[test]
    fn test_frame_loop_triggers_on_press_edges() -> Result<(), Box<dyn Error>> {
        let instrument = Arc::new(RecordingInstrument::new());
        let recording = Recording {
            frames: vec![
                vec![open_hand("Right", 0.7)],
                vec![hooked_index("Right", 0.7)],
                vec![hooked_index("Right", 0.7)],
                vec![open_hand("Right", 0.7)],
                vec![hooked_index("Right", 0.7)],
            ],
        };
        let (events_tx, events_rx) = crossbeam_channel::unbounded();

        let mut frame_loop = FrameLoop::spawn(
            Box::new(RecordedTracker::new(recording, Duration::from_millis(1))),
            Classifier::default(),
            instrument.clone(),
            Some(events_tx),
        )?;
        frame_loop.join();
        assert!(!frame_loop.is_running());

        assert_eq!(
            instrument.triggers(),
            vec![(440.0, DEFAULT_NOTE_DURATION), (440.0, DEFAULT_NOTE_DURATION)]
        );
        let events: Vec<Classification> = events_rx.try_iter().collect();
        assert_eq!(events.len(), 5);
        assert!(events[2].hooked.contains(5));
        assert!(events[2].pressed.is_empty());
        assert!(events[3].released.contains(5));
        Ok(())
    }

    #[test]
    fn test_errors_skip_the_cycle_and_keep_state() -> Result<(), Box<dyn Error>> {
        let instrument = Arc::new(RecordingInstrument::new());
        let closed = Arc::new(AtomicBool::new(false));
        let tracker = ScriptedTracker {
            script: VecDeque::from(vec![
                Ok(Some(vec![hooked_index("Left", 0.3)])),
                Err(TrackingError::Failed("inference error".to_string())),
                Err(TrackingError::NotReady),
                Ok(None),
                Ok(Some(vec![hooked_index("Left", 0.3)])),
                Ok(Some(Vec::new())),
                Ok(Some(vec![hooked_index("Left", 0.3)])),
            ]),
            closed: closed.clone(),
        };

        let mut frame_loop = FrameLoop::spawn(
            Box::new(tracker),
            Classifier::default(),
            instrument.clone(),
            None,
        )?;
        frame_loop.join();

        // Left index is key 2 (E4). The held finger across the failures is not a new press.
        assert_eq!(
            instrument.triggers(),
            vec![(329.63, DEFAULT_NOTE_DURATION), (329.63, DEFAULT_NOTE_DURATION)]
        );
        assert!(closed.load(Ordering::SeqCst));
        Ok(())
    }

    #[test]
    fn test_stop_halts_live_loop() -> Result<(), Box<dyn Error>> {
        let instrument = Arc::new(RecordingInstrument::new());
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut frame_loop = FrameLoop::spawn(
            Box::new(ChannelTracker::new(rx, Duration::from_millis(5))),
            Classifier::default(),
            instrument.clone(),
            None,
        )?;

        tx.send(vec![hooked_index("Right", 0.7)])?;
        eventually(|| instrument.trigger_count() == 1, "Press never triggered");
        assert!(frame_loop.is_running());

        frame_loop.stop();
        assert!(!frame_loop.is_running());
        Ok(())
    }
}
