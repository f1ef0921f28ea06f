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
    collections::{HashMap, VecDeque},
    fmt,
    sync::Arc,
    time::Duration,
};

use parking_lot::Mutex;
use tracing::debug;

use super::driver::{Capabilities, FormatMask, Pcm as PcmTrait, PcmConfig};
use super::error::AudioError;
use super::format::SampleFormat;
use super::Direction;

/// How the mock answers a single write request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Accept every requested frame.
    Full,
    /// Accept at most this many frames.
    Partial(usize),
    /// Reject the write with the given diagnostic.
    Fail(String),
}

/// Everything the mock has been asked to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Calls {
    pub opens: usize,
    pub closes: usize,
    /// Requested frame counts, one entry per write call.
    pub writes: Vec<usize>,
    pub waits: usize,
    pub reads: usize,
    /// Bytes the mock accepted, in order.
    pub written: Vec<u8>,
    /// The configuration of the most recent open.
    pub last_config: Option<PcmConfig>,
}

#[derive(Default)]
struct State {
    capabilities: HashMap<(u32, u32, Direction), Option<Capabilities>>,
    open_error: Option<String>,
    not_ready_error: Option<String>,
    writes: VecDeque<WriteOutcome>,
    waits: VecDeque<Result<(), String>>,
    calls: Calls,
}

/// A mock driver. Doesn't touch any hardware; every answer can be scripted.
#[derive(Clone)]
pub struct Driver {
    name: String,
    state: Arc<Mutex<State>>,
}

impl Driver {
    /// Gets the given mock driver.
    pub fn get(name: &str) -> Driver {
        Driver {
            name: name.to_string(),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// The ranges reported for any device without an explicit answer.
    pub fn default_capabilities() -> Capabilities {
        Capabilities {
            min_rate: 8000,
            max_rate: 192000,
            min_channels: 1,
            max_channels: 8,
            min_period_size: 64,
            max_period_size: 8192,
            min_period_count: 2,
            max_period_count: 16,
            formats: [SampleFormat::S16Le, SampleFormat::S32Le, SampleFormat::Float]
                .into_iter()
                .collect::<FormatMask>(),
        }
    }

    /// Answers capability queries for the given device with `capabilities`.
    pub fn with_capabilities(
        self,
        card: u32,
        device: u32,
        direction: Direction,
        capabilities: Capabilities,
    ) -> Driver {
        self.state
            .lock()
            .capabilities
            .insert((card, device, direction), Some(capabilities));
        self
    }

    /// Makes capability queries for the given device return nothing.
    pub fn without_capabilities(self, card: u32, device: u32, direction: Direction) -> Driver {
        self.state
            .lock()
            .capabilities
            .insert((card, device, direction), None);
        self
    }

    /// Makes every open fail without returning a handle.
    pub fn fail_open(self, error: &str) -> Driver {
        self.state.lock().open_error = Some(error.to_string());
        self
    }

    /// Makes every open return a handle that isn't ready.
    pub fn open_not_ready(self, error: &str) -> Driver {
        self.state.lock().not_ready_error = Some(error.to_string());
        self
    }

    /// Queues write outcomes. Once the queue is empty, writes are accepted in full.
    pub fn script_writes<I: IntoIterator<Item = WriteOutcome>>(self, outcomes: I) -> Driver {
        self.state.lock().writes.extend(outcomes);
        self
    }

    /// Queues wait outcomes. Once the queue is empty, waits succeed.
    pub fn script_waits<I: IntoIterator<Item = Result<(), String>>>(self, outcomes: I) -> Driver {
        self.state.lock().waits.extend(outcomes);
        self
    }

    /// A snapshot of the calls made so far.
    pub fn calls(&self) -> Calls {
        self.state.lock().calls.clone()
    }
}

impl super::driver::Driver for Driver {
    fn capabilities(&self, card: u32, device: u32, direction: Direction) -> Option<Capabilities> {
        if direction == Direction::Invalid {
            return None;
        }
        match self.state.lock().capabilities.get(&(card, device, direction)) {
            Some(answer) => *answer,
            None => Some(Self::default_capabilities()),
        }
    }

    fn open(
        &self,
        card: u32,
        device: u32,
        direction: Direction,
        config: &PcmConfig,
    ) -> Result<Box<dyn PcmTrait>, AudioError> {
        let mut state = self.state.lock();
        state.calls.opens += 1;
        state.calls.last_config = Some(*config);
        debug!(
            driver = self.name,
            card, device, %direction, "Opening mock device"
        );

        if let Some(error) = &state.open_error {
            return Err(AudioError::Hardware(error.clone()));
        }

        let (ready, last_error) = match &state.not_ready_error {
            Some(error) => (false, error.clone()),
            None => (true, String::new()),
        };
        Ok(Box::new(Pcm {
            state: self.state.clone(),
            bytes_per_frame: config.channels as usize * config.format.bytes_per_sample(),
            ready,
            closed: false,
            last_error,
        }))
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

/// A handle opened by the mock driver.
pub struct Pcm {
    state: Arc<Mutex<State>>,
    bytes_per_frame: usize,
    ready: bool,
    closed: bool,
    last_error: String,
}

impl PcmTrait for Pcm {
    fn is_ready(&self) -> bool {
        self.ready && !self.closed
    }

    fn write(&mut self, data: &[u8], frames: usize) -> Result<usize, AudioError> {
        let mut state = self.state.lock();
        state.calls.writes.push(frames);

        let accepted = match state.writes.pop_front().unwrap_or(WriteOutcome::Full) {
            WriteOutcome::Full => frames,
            WriteOutcome::Partial(limit) => limit.min(frames),
            WriteOutcome::Fail(error) => {
                self.last_error = error.clone();
                return Err(AudioError::Hardware(error));
            }
        };

        let bytes = (accepted * self.bytes_per_frame).min(data.len());
        state.calls.written.extend_from_slice(&data[..bytes]);
        Ok(accepted)
    }

    fn read(&mut self, data: &mut [u8], frames: usize) -> Result<usize, AudioError> {
        self.state.lock().calls.reads += 1;
        let bytes = (frames * self.bytes_per_frame).min(data.len());
        data[..bytes].fill(0);
        Ok(self.bytes_to_frames(bytes))
    }

    fn wait(&mut self, _timeout: Duration) -> Result<(), AudioError> {
        let mut state = self.state.lock();
        state.calls.waits += 1;
        match state.waits.pop_front().unwrap_or(Ok(())) {
            Ok(()) => Ok(()),
            Err(error) => {
                self.last_error = error.clone();
                Err(AudioError::Hardware(error))
            }
        }
    }

    fn last_error(&self) -> String {
        self.last_error.clone()
    }

    fn frames_to_bytes(&self, frames: usize) -> usize {
        frames * self.bytes_per_frame
    }

    fn bytes_to_frames(&self, bytes: usize) -> usize {
        match self.bytes_per_frame {
            0 => 0,
            frame => bytes / frame,
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.state.lock().calls.closes += 1;
        }
    }
}

impl Drop for Pcm {
    fn drop(&mut self) {
        self.close();
    }
}
