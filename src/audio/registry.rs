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
use std::{io::BufRead, path::Path};

use tracing::info;

use super::driver::Driver;
use super::error::AudioError;
use super::format::HardwareFormat;
use super::negotiate::Negotiator;
use super::topology::{self, DeviceDescriptor};
use super::Direction;

/// The devices found by one topology scan, each with its negotiated format.
///
/// A registry is never modified after it's built. Rescanning builds a new one.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: Vec<DeviceDescriptor>,
}

impl DeviceRegistry {
    /// Scans the given tables and negotiates a format for every device found.
    pub fn discover<C: BufRead, D: BufRead>(
        driver: &dyn Driver,
        preferred: HardwareFormat,
        cards: C,
        devices: D,
    ) -> Result<DeviceRegistry, AudioError> {
        Self::negotiate(driver, preferred, topology::scan(cards, devices)?)
    }

    /// Scans the tables at the given paths and negotiates a format for every device found.
    pub fn from_tables(
        driver: &dyn Driver,
        preferred: HardwareFormat,
        cards: &Path,
        devices: &Path,
    ) -> Result<DeviceRegistry, AudioError> {
        Self::negotiate(driver, preferred, topology::scan_files(cards, devices)?)
    }

    fn negotiate(
        driver: &dyn Driver,
        preferred: HardwareFormat,
        descriptors: Vec<DeviceDescriptor>,
    ) -> Result<DeviceRegistry, AudioError> {
        let devices = Negotiator::with_preferred(driver, preferred).apply(descriptors);
        if devices.is_empty() {
            return Err(AudioError::EmptyTopology(
                "no device reported a usable format".to_string(),
            ));
        }

        info!(driver = %driver, devices = devices.len(), "Device registry ready");
        Ok(DeviceRegistry { devices })
    }

    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Finds the descriptor for the given device.
    pub fn find(&self, card: u32, device: u32, direction: Direction) -> Option<&DeviceDescriptor> {
        self.devices
            .iter()
            .find(|d| d.card == card && d.device == device && d.direction == direction)
    }

    /// All playback devices, in table order.
    pub fn playback(&self) -> impl Iterator<Item = &DeviceDescriptor> {
        self.devices
            .iter()
            .filter(|d| d.direction == Direction::Playback)
    }
}
