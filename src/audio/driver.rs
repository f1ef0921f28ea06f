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

//! The hardware surface consumed by the negotiator and the device session.

use std::{fmt, time::Duration};

use super::error::AudioError;
use super::format::{HardwareFormat, SampleFormat};
use super::Direction;

const ALL_FORMATS: [SampleFormat; 3] = [
    SampleFormat::S16Le,
    SampleFormat::S32Le,
    SampleFormat::Float,
];

/// A bitmask of the sample encodings a device supports.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatMask(u32);

impl FormatMask {
    pub fn empty() -> FormatMask {
        FormatMask(0)
    }

    pub fn with(self, format: SampleFormat) -> FormatMask {
        FormatMask(self.0 | Self::bit(format))
    }

    pub fn contains(&self, format: SampleFormat) -> bool {
        let bit = Self::bit(format);
        bit != 0 && self.0 & bit == bit
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    /// The formats present in the mask.
    pub fn formats(&self) -> Vec<SampleFormat> {
        ALL_FORMATS
            .into_iter()
            .filter(|format| self.contains(*format))
            .collect()
    }

    fn bit(format: SampleFormat) -> u32 {
        match format {
            SampleFormat::S16Le => 1,
            SampleFormat::S32Le => 1 << 1,
            SampleFormat::Float => 1 << 2,
            SampleFormat::Invalid => 0,
        }
    }
}

impl FromIterator<SampleFormat> for FormatMask {
    fn from_iter<I: IntoIterator<Item = SampleFormat>>(iter: I) -> Self {
        iter.into_iter()
            .fold(FormatMask::empty(), |mask, format| mask.with(format))
    }
}

impl fmt::Debug for FormatMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.formats()).finish()
    }
}

impl fmt::Display for FormatMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.formats().into_iter().map(|f| f.as_str()).collect();
        write!(f, "[{}]", names.join(" "))
    }
}

/// The ranges a device reports for one card, device and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub min_rate: u32,
    pub max_rate: u32,
    pub min_channels: u32,
    pub max_channels: u32,
    pub min_period_size: u32,
    pub max_period_size: u32,
    pub min_period_count: u32,
    pub max_period_count: u32,
    pub formats: FormatMask,
}

/// The full configuration handed to the driver when opening a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmConfig {
    pub channels: u32,
    pub rate: u32,
    pub period_size: u32,
    pub period_count: u32,
    pub format: SampleFormat,
    pub start_threshold: u32,
    pub stop_threshold: u32,
    pub silence_threshold: u32,
    pub silence_size: u32,
    pub avail_min: u32,
}

impl From<&HardwareFormat> for PcmConfig {
    fn from(format: &HardwareFormat) -> Self {
        PcmConfig {
            channels: format.channels,
            rate: format.sample_rate,
            period_size: format.period_size,
            period_count: format.period_count,
            format: format.sample_format,
            start_threshold: format.start_threshold(),
            stop_threshold: format.stop_threshold(),
            silence_threshold: format.silence_threshold(),
            silence_size: format.silence_size,
            avail_min: 0,
        }
    }
}

/// Access to the sound hardware: capability queries and device opening.
pub trait Driver: fmt::Display + Send + Sync {
    /// Queries the hardware ranges for the given device. Returns None if the
    /// device doesn't answer.
    fn capabilities(&self, card: u32, device: u32, direction: Direction) -> Option<Capabilities>;

    /// Opens the given device. A handle may come back that isn't ready; callers
    /// must check `Pcm::is_ready` before using it.
    fn open(
        &self,
        card: u32,
        device: u32,
        direction: Direction,
        config: &PcmConfig,
    ) -> Result<Box<dyn Pcm>, AudioError>;
}

/// An open hardware stream.
pub trait Pcm {
    /// Returns true if the handle was configured successfully.
    fn is_ready(&self) -> bool;

    /// Writes up to `frames` interleaved frames from `data`, returning the frames
    /// the hardware accepted.
    fn write(&mut self, data: &[u8], frames: usize) -> Result<usize, AudioError>;

    /// Reads up to `frames` interleaved frames into `data`.
    fn read(&mut self, data: &mut [u8], frames: usize) -> Result<usize, AudioError>;

    /// Blocks until the device can accept more frames or the timeout expires.
    fn wait(&mut self, timeout: Duration) -> Result<(), AudioError>;

    /// The most recent diagnostic reported by the driver.
    fn last_error(&self) -> String;

    fn frames_to_bytes(&self, frames: usize) -> usize;

    fn bytes_to_frames(&self, bytes: usize) -> usize;

    /// Releases the hardware. Safe to call more than once and on a handle that
    /// never became ready.
    fn close(&mut self);
}
