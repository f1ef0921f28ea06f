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
use std::{
    fmt,
    fs::File,
    io::{BufReader, Read, Seek},
    path::Path,
    sync::Arc,
};

use tracing::info;

use super::error::AudioError;
use super::format::PcmFormat;
use super::wav::WavParser;
use crate::util::filename_display;

/// Raw interleaved PCM decoded from a container, with its format.
///
/// The payload is shared and never modified once the blob is built.
#[derive(Clone, PartialEq, Eq)]
pub struct PcmBlob {
    format: PcmFormat,
    data: Arc<[u8]>,
}

impl PcmBlob {
    pub fn new(format: PcmFormat, data: Vec<u8>) -> PcmBlob {
        PcmBlob {
            format,
            data: data.into(),
        }
    }

    pub fn format(&self) -> &PcmFormat {
        &self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns a shared handle to the payload.
    pub fn shared_data(&self) -> Arc<[u8]> {
        self.data.clone()
    }

    /// The number of whole frames in the payload.
    pub fn frames(&self) -> usize {
        match self.format.bytes_per_frame() {
            0 => 0,
            frame => self.data.len() / frame,
        }
    }
}

impl fmt::Debug for PcmBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcmBlob")
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Decodes a binary audio container into PCM.
pub trait ContainerParser {
    fn parse(&self, reader: &mut dyn ReadSeek) -> Result<PcmBlob, AudioError>;
}

/// A readable, seekable byte stream.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Picks a parser by file extension.
pub fn parser_for(path: &Path) -> Result<Box<dyn ContainerParser>, AudioError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("wav") => Ok(Box::new(WavParser::new())),
        _ => Err(AudioError::format(format!(
            "unsupported audio container: {}",
            filename_display(path)
        ))),
    }
}

/// Opens and parses the given file with the parser matching its extension.
pub fn load_file(path: &Path) -> Result<PcmBlob, AudioError> {
    let parser = parser_for(path)?;
    let mut reader = BufReader::new(File::open(path)?);
    let blob = parser.parse(&mut reader)?;
    info!(
        file = filename_display(path),
        format = %blob.format(),
        frames = blob.frames(),
        "Loaded audio file"
    );
    Ok(blob)
}
