// Copyright (C) 2024 Michael Wilson <mike@mdwn.dev>
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
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Represents the current cancel state.
#[derive(Debug, Clone, Copy, PartialEq)]
enum CancelState {
    Untouched,
    Cancelled,
    /// The guarded work ran to completion.
    Finished,
}

/// A cancel handle is shared between a timed job (a sequence session, a frame loop) and
/// whoever may want to stop it. It's the job's responsibility to respect a cancel request.
#[derive(Clone)]
pub struct CancelHandle {
    state: Arc<Mutex<CancelState>>,
    /// The condvar wakes waiters when the state changes.
    condvar: Arc<Condvar>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        CancelHandle::new()
    }
}

impl CancelHandle {
    /// Creates a new cancel handle.
    pub fn new() -> CancelHandle {
        CancelHandle {
            state: Arc::new(Mutex::new(CancelState::Untouched)),
            condvar: Arc::new(Condvar::new()),
        }
    }

    /// Returns true if the job has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.state.lock() == CancelState::Cancelled
    }

    /// Returns true if the job was cancelled or has finished on its own.
    pub fn is_done(&self) -> bool {
        *self.state.lock() != CancelState::Untouched
    }

    /// Blocks until the deadline passes or the handle leaves the untouched state.
    /// Returns true if the handle was cancelled.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut state = self.state.lock();
        self.condvar.wait_while_until(
            &mut state,
            |state| *state == CancelState::Untouched,
            deadline,
        );
        *state == CancelState::Cancelled
    }

    /// Blocks for at most `timeout`. Returns true if the handle was cancelled.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.wait_until(Instant::now() + timeout)
    }

    /// Cancels the job. Has no effect on a job that already finished.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        if *state == CancelState::Untouched {
            *state = CancelState::Cancelled;
            self.condvar.notify_all();
        }
    }

    /// Marks the job as having run to completion.
    pub fn finish(&self) {
        let mut state = self.state.lock();
        if *state == CancelState::Untouched {
            *state = CancelState::Finished;
            self.condvar.notify_all();
        }
    }
}

/// Finishes a handle when dropped. A job's thread moves the guard in, so the handle
/// reads as done whether the job returns, unwinds or never starts.
pub struct FinishOnDrop(CancelHandle);

impl FinishOnDrop {
    pub fn new(cancel_handle: CancelHandle) -> FinishOnDrop {
        FinishOnDrop(cancel_handle)
    }
}

impl Drop for FinishOnDrop {
    fn drop(&mut self) {
        self.0.finish();
    }
}
