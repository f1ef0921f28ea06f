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

use std::{error::Error, fmt, str::FromStr};

/// Hardware sample encodings understood by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// 16-bit signed little-endian.
    S16Le,
    /// 32-bit signed little-endian.
    S32Le,
    /// 32-bit IEEE float.
    Float,
    Invalid,
}

impl FromStr for SampleFormat {
    type Err = Box<dyn Error>;

    fn from_str(s: &str) -> Result<Self, Box<dyn Error>> {
        match s {
            "s16le" | "S16LE" | "S16_LE" => Ok(SampleFormat::S16Le),
            "s32le" | "S32LE" | "S32_LE" => Ok(SampleFormat::S32Le),
            "float" | "Float" | "FLOAT_LE" => Ok(SampleFormat::Float),
            _ => Err(format!("Unsupported sample format: {}", s).into()),
        }
    }
}

impl SampleFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            SampleFormat::S16Le => "s16le",
            SampleFormat::S32Le => "s32le",
            SampleFormat::Float => "float",
            SampleFormat::Invalid => "invalid",
        }
    }

    /// Size of one sample in bytes. Zero for an invalid format.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::S16Le => 2,
            SampleFormat::S32Le | SampleFormat::Float => 4,
            SampleFormat::Invalid => 0,
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The streaming format a hardware device is opened with.
///
/// The start, stop and silence thresholds are derived from the period layout
/// and can't be set on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareFormat {
    /// Frames per hardware period.
    pub period_size: u32,
    /// Number of periods in the hardware ring buffer.
    pub period_count: u32,
    pub silence_size: u32,
    pub channels: u32,
    pub sample_rate: u32,
    pub sample_format: SampleFormat,
}

impl HardwareFormat {
    pub fn new(
        period_size: u32,
        period_count: u32,
        channels: u32,
        sample_rate: u32,
        sample_format: SampleFormat,
    ) -> HardwareFormat {
        HardwareFormat {
            period_size,
            period_count,
            silence_size: 0,
            channels,
            sample_rate,
            sample_format,
        }
    }

    /// Playback starts once a full period is queued.
    pub fn start_threshold(&self) -> u32 {
        self.period_size
    }

    /// Playback stops once the whole ring buffer has drained.
    pub fn stop_threshold(&self) -> u32 {
        self.ring_size()
    }

    pub fn silence_threshold(&self) -> u32 {
        self.ring_size()
    }

    /// Size of one frame in bytes.
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * self.sample_format.bytes_per_sample()
    }

    pub fn frames_to_bytes(&self, frames: usize) -> usize {
        frames * self.bytes_per_frame()
    }

    pub fn bytes_to_frames(&self, bytes: usize) -> usize {
        match self.bytes_per_frame() {
            0 => 0,
            frame => bytes / frame,
        }
    }

    /// Returns true if PCM data in the given format can be written without conversion.
    pub fn accepts(&self, pcm: &PcmFormat) -> bool {
        self.sample_rate == pcm.sample_rate
            && self.channels == u32::from(pcm.channels)
            && self.sample_format == pcm.sample_format()
    }

    fn ring_size(&self) -> u32 {
        self.period_size.saturating_mul(self.period_count)
    }
}

impl Default for HardwareFormat {
    /// 44.1kHz stereo S16LE with two periods of 1024 frames.
    fn default() -> Self {
        HardwareFormat::new(1024, 2, 2, 44100, SampleFormat::S16Le)
    }
}

impl fmt::Display for HardwareFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz {}ch {} (period {}x{})",
            self.sample_rate, self.channels, self.sample_format, self.period_size, self.period_count
        )
    }
}

/// The format of decoded PCM payload data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub is_float: bool,
    pub bits_per_sample: u16,
}

impl PcmFormat {
    /// Maps the payload encoding onto a hardware sample format.
    pub fn sample_format(&self) -> SampleFormat {
        match (self.is_float, self.bits_per_sample) {
            (false, 16) => SampleFormat::S16Le,
            (false, 32) => SampleFormat::S32Le,
            (true, 32) => SampleFormat::Float,
            _ => SampleFormat::Invalid,
        }
    }

    pub fn bytes_per_frame(&self) -> usize {
        usize::from(self.channels) * usize::from(self.bits_per_sample / 8)
    }
}

impl fmt::Display for PcmFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz {}ch {}-bit {}",
            self.sample_rate,
            self.channels,
            self.bits_per_sample,
            if self.is_float { "float" } else { "int" }
        )
    }
}
