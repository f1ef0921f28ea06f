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
use std::path::{Path, PathBuf};

use config::{Config, File};
use serde::Deserialize;

use super::audio::Audio;
use super::error::ConfigError;
use crate::audio::topology::{CARDS_TABLE, DEVICES_TABLE};
use crate::samples::{DEFAULT_SAMPLES_ROOT, DEFAULT_SAMPLE_EXTENSION};

const DEFAULT_DRIVER: &str = "alsa";

/// The configuration for the player.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Player {
    /// The driver to use. Names starting with "mock" select the mock driver.
    driver: Option<String>,
    /// Where to read the card table from.
    cards_table: Option<PathBuf>,
    /// Where to read the device table from.
    devices_table: Option<PathBuf>,
    /// The directory holding one sample folder per instrument.
    samples_root: Option<PathBuf>,
    /// The extension of sample files.
    sample_extension: Option<String>,
    /// Preferred audio format and write behavior.
    audio: Option<Audio>,
}

impl Player {
    /// Parse a player configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Player, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Player>()?)
    }

    pub fn driver(&self) -> &str {
        self.driver.as_deref().unwrap_or(DEFAULT_DRIVER)
    }

    pub fn cards_table(&self) -> &Path {
        self.cards_table
            .as_deref()
            .unwrap_or_else(|| Path::new(CARDS_TABLE))
    }

    pub fn devices_table(&self) -> &Path {
        self.devices_table
            .as_deref()
            .unwrap_or_else(|| Path::new(DEVICES_TABLE))
    }

    pub fn samples_root(&self) -> &Path {
        self.samples_root
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_SAMPLES_ROOT))
    }

    pub fn sample_extension(&self) -> &str {
        self.sample_extension
            .as_deref()
            .unwrap_or(DEFAULT_SAMPLE_EXTENSION)
    }

    /// Returns the audio section, or the defaults if it's missing.
    pub fn audio(&self) -> Audio {
        self.audio.clone().unwrap_or_default()
    }
}
