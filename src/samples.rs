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

//! Pre-decoded sound samples loaded from a directory tree.
//!
//! Each sample file carries a short textual header followed by a `PCM DATA`
//! marker line and raw little-endian interleaved 16-bit PCM:
//!
//! ```text
//! name:kick|samplerate:44100|channels:2|samplewidth:2|frames:100
//! PCM DATA
//! <frames * channels * 2 bytes>
//! ```

use std::fmt;

use crate::audio::PcmFormat;

mod bank;

pub use bank::{parse_sample, SampleBank, DEFAULT_SAMPLES_ROOT, DEFAULT_SAMPLE_EXTENSION};

/// A fully loaded sample. Never changes once it is in a bank.
#[derive(Clone, PartialEq, Eq)]
pub struct SoundSample {
    pub name: String,
    pub sample_rate: u32,
    pub frame_count: usize,
    pub channels: u16,
    /// Interleaved samples, `frame_count * channels` long.
    pub data: Vec<i16>,
}

impl SoundSample {
    /// The payload format, for matching against a device.
    pub fn format(&self) -> PcmFormat {
        PcmFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            is_float: false,
            bits_per_sample: 16,
        }
    }

    /// Returns the memory size of the sample data in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<i16>()
    }
}

impl fmt::Debug for SoundSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundSample")
            .field("name", &self.name)
            .field("sample_rate", &self.sample_rate)
            .field("frame_count", &self.frame_count)
            .field("channels", &self.channels)
            .field("samples", &self.data.len())
            .finish()
    }
}
