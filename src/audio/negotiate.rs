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
use tracing::{debug, warn};

use super::driver::{Capabilities, Driver};
use super::error::AudioError;
use super::format::HardwareFormat;
use super::topology::DeviceDescriptor;
use super::Direction;

/// Derives a concrete streaming format for a device from its hardware ranges.
pub struct Negotiator<'a> {
    driver: &'a dyn Driver,
    preferred: HardwareFormat,
}

impl<'a> Negotiator<'a> {
    /// Creates a negotiator that prefers 44.1kHz stereo S16LE with 2x1024 frame periods.
    pub fn new(driver: &'a dyn Driver) -> Negotiator<'a> {
        Self::with_preferred(driver, HardwareFormat::default())
    }

    pub fn with_preferred(driver: &'a dyn Driver, preferred: HardwareFormat) -> Negotiator<'a> {
        Negotiator { driver, preferred }
    }

    /// Queries the device and clamps the preferred format against what it reports.
    pub fn negotiate(
        &self,
        card: u32,
        device: u32,
        direction: Direction,
    ) -> Result<HardwareFormat, AudioError> {
        let Some(capabilities) = self.driver.capabilities(card, device, direction) else {
            return Err(AudioError::Hardware(format!(
                "no capabilities reported for card {} device {} ({})",
                card, device, direction
            )));
        };

        debug!(
            card,
            device,
            formats = %capabilities.formats,
            mask = capabilities.formats.bits(),
            "Device formats"
        );
        // The mask is informational only. The preferred encoding is used regardless.
        if !capabilities.formats.contains(self.preferred.sample_format) {
            warn!(
                card,
                device,
                format = %self.preferred.sample_format,
                "Preferred sample format not reported by device"
            );
        }

        Ok(clamp(&capabilities, &self.preferred))
    }

    /// Fills in the format of every descriptor. Descriptors whose device
    /// doesn't answer are left out.
    pub fn apply(&self, descriptors: Vec<DeviceDescriptor>) -> Vec<DeviceDescriptor> {
        descriptors
            .into_iter()
            .filter_map(|mut descriptor| {
                match self.negotiate(descriptor.card, descriptor.device, descriptor.direction) {
                    Ok(format) => {
                        descriptor.format = Some(format);
                        Some(descriptor)
                    }
                    Err(e) => {
                        warn!(
                            card = descriptor.card,
                            device = descriptor.device,
                            err = %e,
                            "Failed to get device format"
                        );
                        None
                    }
                }
            })
            .collect()
    }
}

/// Periods grow to the hardware minimum; channels and rate shrink to the hardware maximum.
pub fn clamp(capabilities: &Capabilities, preferred: &HardwareFormat) -> HardwareFormat {
    HardwareFormat::new(
        capabilities.min_period_size.max(preferred.period_size),
        capabilities.min_period_count.max(preferred.period_count),
        capabilities.max_channels.min(preferred.channels),
        capabilities.max_rate.min(preferred.sample_rate),
        preferred.sample_format,
    )
}
