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
use std::io;

/// Errors raised anywhere in the audio pipeline.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// A file or stream could not be opened or read fully.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Unparseable or unsupported container contents.
    #[error("Format error: {0}")]
    Format(String),

    /// A sample header field is missing or out of range.
    #[error("Validation error in '{field}': {reason}")]
    Validation { field: &'static str, reason: String },

    /// The driver rejected a negotiation, open, write or wait.
    #[error("Hardware error: {0}")]
    Hardware(String),

    /// The topology scan found no cards or no devices.
    #[error("No audio topology found: {0}")]
    EmptyTopology(String),

    #[error("Audio device session is not open")]
    NotOpen,
}

impl AudioError {
    pub(crate) fn format<S: Into<String>>(msg: S) -> AudioError {
        AudioError::Format(msg.into())
    }

    pub(crate) fn validation<S: Into<String>>(field: &'static str, reason: S) -> AudioError {
        AudioError::Validation {
            field,
            reason: reason.into(),
        }
    }
}
