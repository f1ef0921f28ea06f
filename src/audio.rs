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
use std::{fmt, sync::Arc};

pub mod alsa;
pub mod container;
pub mod driver;
pub mod error;
pub mod format;
pub mod mock;
pub mod negotiate;
pub mod registry;
pub mod session;
pub mod topology;
pub mod wav;
pub mod writer;

pub use container::PcmBlob;
pub use driver::{Driver, Pcm};
pub use error::AudioError;
pub use format::{HardwareFormat, PcmFormat, SampleFormat};
pub use registry::DeviceRegistry;
pub use session::Session;
pub use topology::DeviceDescriptor;

/// The direction of a sub-device stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Playback,
    Capture,
    Invalid,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Direction::Playback => "Playback",
                Direction::Capture => "Capture",
                Direction::Invalid => "Invalid",
            }
        )
    }
}

/// Gets the driver with the given name.
pub fn get_driver(name: &str) -> Arc<dyn Driver> {
    if name.starts_with("mock") {
        return Arc::new(mock::Driver::get(name));
    };

    Arc::new(alsa::Driver::new())
}
