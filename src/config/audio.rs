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
use std::{str::FromStr, time::Duration};

use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;
use crate::audio::writer::DEFAULT_WAIT_TIMEOUT;
use crate::audio::{HardwareFormat, SampleFormat};

/// A YAML representation of the preferred streaming format. Every field falls
/// back to the negotiator's default.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Audio {
    /// Preferred sample rate in Hz (default: 44100)
    sample_rate: Option<u32>,

    /// Preferred channel count (default: 2)
    channels: Option<u32>,

    /// Preferred frames per period (default: 1024)
    period_size: Option<u32>,

    /// Preferred number of periods (default: 2)
    period_count: Option<u32>,

    /// Sample format: s16le, s32le or float (default: s16le)
    sample_format: Option<String>,

    /// How long a write waits for the device after a partial write (default: 1s)
    write_timeout: Option<String>,
}

impl Audio {
    /// Returns the preferred format to clamp against the hardware ranges.
    pub fn preferred_format(&self) -> Result<HardwareFormat, ConfigError> {
        let default = HardwareFormat::default();
        let sample_format = match self.sample_format.as_deref() {
            Some(format) => SampleFormat::from_str(format)
                .map_err(|e| ConfigError::invalid("sample_format", e))?,
            None => default.sample_format,
        };

        let format = HardwareFormat::new(
            self.period_size.unwrap_or(default.period_size),
            self.period_count.unwrap_or(default.period_count),
            self.channels.unwrap_or(default.channels),
            self.sample_rate.unwrap_or(default.sample_rate),
            sample_format,
        );
        if format.period_size == 0 || format.period_count == 0 || format.channels == 0 {
            return Err(ConfigError::invalid(
                "audio",
                format!("period size, period count and channels must be non-zero ({})", format),
            ));
        }
        Ok(format)
    }

    /// Returns the write timeout from the configuration.
    pub fn write_timeout(&self) -> Result<Duration, ConfigError> {
        match &self.write_timeout {
            Some(timeout) => Ok(DurationString::from_string(timeout.clone())
                .map_err(|e| ConfigError::invalid("write_timeout", e))?
                .into()),
            None => Ok(DEFAULT_WAIT_TIMEOUT),
        }
    }
}
