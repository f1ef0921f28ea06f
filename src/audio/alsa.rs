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
use std::{fmt, time::Duration};

use alsa::pcm::{Access, Format, Frames, HwParams, PCM};
use alsa::ValueOr;
use tracing::{debug, warn};

use super::driver::{Capabilities, FormatMask, Pcm as PcmTrait, PcmConfig};
use super::error::AudioError;
use super::format::SampleFormat;
use super::Direction;

/// Opens hardware devices directly through alsa-lib using `hw:<card>,<device>`.
#[derive(Default)]
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hw (ALSA)")
    }
}

impl super::driver::Driver for Driver {
    fn capabilities(&self, card: u32, device: u32, direction: Direction) -> Option<Capabilities> {
        let alsa_direction = to_alsa_direction(direction)?;
        let name = hw_name(card, device);

        // alsa-lib is super noisy when probing devices that are busy or absent.
        let shh = shh::stderr().ok();
        let result = probe(&name, alsa_direction);
        drop(shh);

        match result {
            Ok(capabilities) => Some(capabilities),
            Err(e) => {
                debug!(device = name, err = %e, "Unable to query device capabilities");
                None
            }
        }
    }

    fn open(
        &self,
        card: u32,
        device: u32,
        direction: Direction,
        config: &PcmConfig,
    ) -> Result<Box<dyn PcmTrait>, AudioError> {
        let Some(alsa_direction) = to_alsa_direction(direction) else {
            return Err(AudioError::Hardware(format!(
                "cannot open {} with direction {}",
                hw_name(card, device),
                direction
            )));
        };
        let name = hw_name(card, device);
        let pcm = PCM::new(&name, alsa_direction, false)
            .map_err(|e| AudioError::Hardware(format!("unable to open {}: {}", name, e)))?;

        // A handle that fails configuration is still returned, the same way an
        // unconfigured device handle would be, so the caller can read its error.
        let (ready, last_error) = match configure(&pcm, config) {
            Ok(()) => (true, String::new()),
            Err(e) => (false, format!("unable to configure {}: {}", name, e)),
        };

        Ok(Box::new(Pcm {
            pcm: Some(pcm),
            direction,
            bytes_per_frame: config.channels as usize * config.format.bytes_per_sample(),
            ready,
            last_error,
        }))
    }
}

/// A configured alsa-lib PCM handle.
pub struct Pcm {
    pcm: Option<PCM>,
    direction: Direction,
    bytes_per_frame: usize,
    ready: bool,
    last_error: String,
}

impl PcmTrait for Pcm {
    fn is_ready(&self) -> bool {
        self.ready && self.pcm.is_some()
    }

    fn write(&mut self, data: &[u8], frames: usize) -> Result<usize, AudioError> {
        let Some(pcm) = self.pcm.as_ref() else {
            return Err(AudioError::NotOpen);
        };
        let bytes = (frames * self.bytes_per_frame).min(data.len());

        match pcm.io_bytes().writei(&data[..bytes]) {
            Ok(written) => Ok(written),
            Err(e) => {
                let message = e.to_string();
                // An underrun leaves the stream stopped. Re-prepare it and report
                // nothing written so the caller waits for the device.
                if pcm.try_recover(e, true).is_ok() {
                    warn!(err = message, "Recovered from underrun");
                    return Ok(0);
                }
                self.last_error = message.clone();
                Err(AudioError::Hardware(message))
            }
        }
    }

    fn read(&mut self, data: &mut [u8], frames: usize) -> Result<usize, AudioError> {
        let Some(pcm) = self.pcm.as_ref() else {
            return Err(AudioError::NotOpen);
        };
        let bytes = (frames * self.bytes_per_frame).min(data.len());

        pcm.io_bytes().readi(&mut data[..bytes]).map_err(|e| {
            self.last_error = e.to_string();
            AudioError::Hardware(self.last_error.clone())
        })
    }

    fn wait(&mut self, timeout: Duration) -> Result<(), AudioError> {
        let Some(pcm) = self.pcm.as_ref() else {
            return Err(AudioError::NotOpen);
        };
        let timeout_ms = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);

        match pcm.wait(Some(timeout_ms)) {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.last_error = format!("device not ready after {}ms", timeout_ms);
                Err(AudioError::Hardware(self.last_error.clone()))
            }
            Err(e) => {
                self.last_error = e.to_string();
                Err(AudioError::Hardware(self.last_error.clone()))
            }
        }
    }

    fn last_error(&self) -> String {
        self.last_error.clone()
    }

    fn frames_to_bytes(&self, frames: usize) -> usize {
        match &self.pcm {
            Some(pcm) => usize::try_from(pcm.frames_to_bytes(frames as Frames)).unwrap_or(0),
            None => 0,
        }
    }

    fn bytes_to_frames(&self, bytes: usize) -> usize {
        match &self.pcm {
            Some(pcm) => usize::try_from(pcm.bytes_to_frames(bytes as isize)).unwrap_or(0),
            None => 0,
        }
    }

    fn close(&mut self) {
        let Some(pcm) = self.pcm.take() else {
            return;
        };
        if self.ready && self.direction == Direction::Playback {
            if let Err(e) = pcm.drain() {
                debug!(err = %e, "Error draining device on close");
            }
        }
    }
}

impl Drop for Pcm {
    fn drop(&mut self) {
        self.close();
    }
}

fn hw_name(card: u32, device: u32) -> String {
    format!("hw:{},{}", card, device)
}

fn to_alsa_direction(direction: Direction) -> Option<alsa::Direction> {
    match direction {
        Direction::Playback => Some(alsa::Direction::Playback),
        Direction::Capture => Some(alsa::Direction::Capture),
        Direction::Invalid => None,
    }
}

fn to_alsa_format(format: SampleFormat) -> Option<Format> {
    match format {
        SampleFormat::S16Le => Some(Format::S16LE),
        SampleFormat::S32Le => Some(Format::S32LE),
        SampleFormat::Float => Some(Format::FloatLE),
        SampleFormat::Invalid => None,
    }
}

fn frames_to_u32(frames: Frames) -> u32 {
    u32::try_from(frames).unwrap_or(0)
}

// Reads the hardware parameter space of the device without configuring it.
fn probe(name: &str, direction: alsa::Direction) -> Result<Capabilities, alsa::Error> {
    let pcm = PCM::new(name, direction, true)?;
    let hw_params = HwParams::any(&pcm)?;

    let formats = [SampleFormat::S16Le, SampleFormat::S32Le, SampleFormat::Float]
        .into_iter()
        .filter(|format| {
            to_alsa_format(*format).is_some_and(|format| hw_params.test_format(format).is_ok())
        })
        .collect::<FormatMask>();

    Ok(Capabilities {
        min_rate: hw_params.get_rate_min()?,
        max_rate: hw_params.get_rate_max()?,
        min_channels: hw_params.get_channels_min()?,
        max_channels: hw_params.get_channels_max()?,
        min_period_size: frames_to_u32(hw_params.get_period_size_min()?),
        max_period_size: frames_to_u32(hw_params.get_period_size_max()?),
        min_period_count: hw_params.get_periods_min()?,
        max_period_count: hw_params.get_periods_max()?,
        formats,
    })
}

fn configure(pcm: &PCM, config: &PcmConfig) -> Result<(), Box<dyn std::error::Error>> {
    let Some(format) = to_alsa_format(config.format) else {
        return Err(format!("unsupported sample format {}", config.format).into());
    };

    {
        let hw_params = HwParams::any(pcm)?;
        hw_params.set_access(Access::RWInterleaved)?;
        hw_params.set_format(format)?;
        hw_params.set_channels(config.channels)?;
        hw_params.set_rate(config.rate, ValueOr::Nearest)?;
        hw_params.set_period_size(config.period_size as Frames, ValueOr::Nearest)?;
        hw_params.set_periods(config.period_count, ValueOr::Nearest)?;
        pcm.hw_params(&hw_params)?;
    }

    let sw_params = pcm.sw_params_current()?;
    sw_params.set_start_threshold(config.start_threshold as Frames)?;
    sw_params.set_stop_threshold(config.stop_threshold as Frames)?;
    if config.avail_min > 0 {
        sw_params.set_avail_min(config.avail_min as Frames)?;
    }
    pcm.sw_params(&sw_params)?;
    Ok(())
}
