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
use std::io::{self, SeekFrom};

use tracing::{debug, warn};

use super::container::{ContainerParser, PcmBlob, ReadSeek};
use super::error::AudioError;
use super::format::PcmFormat;

const RIFF_TAG: &[u8; 4] = b"RIFF";
const WAVE_TAG: &[u8; 4] = b"WAVE";
const FMT_TAG: &[u8; 4] = b"fmt ";
const DATA_TAG: &[u8; 4] = b"data";

const FORMAT_PCM: u16 = 0x0001;
const FORMAT_IEEE_FLOAT: u16 = 0x0003;
const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// KSDATAFORMAT_SUBTYPE_PCM.
pub const SUBFORMAT_PCM: [u8; 16] = [
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71,
];
/// KSDATAFORMAT_SUBTYPE_IEEE_FLOAT.
pub const SUBFORMAT_IEEE_FLOAT: [u8; 16] = [
    0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71,
];

/// The fixed part of the format chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FmtChunk {
    audio_format: u16,
    channels: u16,
    sample_rate: u32,
    byte_rate: u32,
    block_align: u16,
    bits_per_sample: u16,
}

impl FmtChunk {
    fn from_bytes(b: &[u8; 16]) -> FmtChunk {
        FmtChunk {
            audio_format: u16::from_le_bytes([b[0], b[1]]),
            channels: u16::from_le_bytes([b[2], b[3]]),
            sample_rate: u32::from_le_bytes([b[4], b[5], b[6], b[7]]),
            byte_rate: u32::from_le_bytes([b[8], b[9], b[10], b[11]]),
            block_align: u16::from_le_bytes([b[12], b[13]]),
            bits_per_sample: u16::from_le_bytes([b[14], b[15]]),
        }
    }
}

/// Parses RIFF/WAVE containers holding integer PCM or IEEE float data.
///
/// The parser is lenient about the container tags and about anything sitting
/// between the format chunk and the data chunk: it steps forward one byte at a
/// time until it finds the data tag.
#[derive(Debug, Default)]
pub struct WavParser {}

impl WavParser {
    pub fn new() -> WavParser {
        WavParser {}
    }

    /// Parses an in-memory container.
    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<PcmBlob, AudioError> {
        self.parse(&mut io::Cursor::new(bytes))
    }
}

impl ContainerParser for WavParser {
    fn parse(&self, reader: &mut dyn ReadSeek) -> Result<PcmBlob, AudioError> {
        let start = reader.stream_position()?;
        let end = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(start))?;

        let mut header = [0u8; 12];
        reader.read_exact(&mut header)?;
        if &header[0..4] != RIFF_TAG || &header[8..12] != WAVE_TAG {
            warn!("Container is missing its RIFF/WAVE tags, parsing anyway");
        }

        let (tag, size) = read_chunk_header(reader)?;
        if &tag != FMT_TAG {
            warn!(tag = %String::from_utf8_lossy(&tag), "Expected format chunk");
        }
        let mut fmt_bytes = [0u8; 16];
        reader.read_exact(&mut fmt_bytes)?;
        let fmt = FmtChunk::from_bytes(&fmt_bytes);
        debug!(size, ?fmt, "Format chunk");
        let frame_bytes = u32::from(fmt.channels) * u32::from(fmt.bits_per_sample / 8);
        if u32::from(fmt.block_align) != frame_bytes
            || fmt.byte_rate != frame_bytes.saturating_mul(fmt.sample_rate)
        {
            warn!(
                block_align = fmt.block_align,
                byte_rate = fmt.byte_rate,
                "Format chunk alignment doesn't match its layout"
            );
        }

        let is_float = match fmt.audio_format {
            FORMAT_PCM => false,
            FORMAT_IEEE_FLOAT => true,
            FORMAT_EXTENSIBLE => {
                // cbSize, valid bits per sample, channel mask, then the sub-format.
                let mut extension = [0u8; 24];
                reader.read_exact(&mut extension)?;
                let mut sub_format = [0u8; 16];
                sub_format.copy_from_slice(&extension[8..24]);
                resolve_sub_format(&sub_format)?
            }
            other => {
                return Err(AudioError::format(format!(
                    "unsupported audio format code {:#06x}",
                    other
                )))
            }
        };

        let data_size = find_chunk(reader, DATA_TAG)?;
        let position = reader.stream_position()?;
        let remaining = end.saturating_sub(position);
        if u64::from(data_size) > remaining {
            return Err(AudioError::format(format!(
                "data chunk declares {} bytes but only {} remain",
                data_size, remaining
            )));
        }

        let mut data = vec![0u8; data_size as usize];
        reader.read_exact(&mut data)?;

        Ok(PcmBlob::new(
            PcmFormat {
                sample_rate: fmt.sample_rate,
                channels: fmt.channels,
                is_float,
                bits_per_sample: fmt.bits_per_sample,
            },
            data,
        ))
    }
}

fn read_chunk_header(reader: &mut dyn ReadSeek) -> Result<([u8; 4], u32), AudioError> {
    let mut header = [0u8; 8];
    reader.read_exact(&mut header)?;
    Ok((
        [header[0], header[1], header[2], header[3]],
        u32::from_le_bytes([header[4], header[5], header[6], header[7]]),
    ))
}

/// Returns true for integer PCM and false for IEEE float. Anything else is rejected.
fn resolve_sub_format(sub_format: &[u8; 16]) -> Result<bool, AudioError> {
    if sub_format == &SUBFORMAT_PCM {
        Ok(false)
    } else if sub_format == &SUBFORMAT_IEEE_FLOAT {
        Ok(true)
    } else {
        Err(AudioError::format(format!(
            "unsupported extensible sub-format {:02x?}",
            sub_format
        )))
    }
}

/// Slides an 8-byte window forward one byte at a time until its first four
/// bytes match `tag`. Leaves the reader at the start of the chunk body and
/// returns the declared chunk size.
fn find_chunk(reader: &mut dyn ReadSeek, tag: &[u8; 4]) -> Result<u32, AudioError> {
    let not_found = || {
        AudioError::format(format!(
            "no '{}' chunk found",
            String::from_utf8_lossy(tag).trim_end()
        ))
    };

    let mut window = [0u8; 8];
    if !fill(reader, &mut window)? {
        return Err(not_found());
    }

    let mut skipped = 0usize;
    while &window[0..4] != tag {
        window.rotate_left(1);
        if !fill(reader, &mut window[7..])? {
            return Err(not_found());
        }
        skipped += 1;
    }

    if skipped > 0 {
        debug!(skipped, "Skipped bytes before data chunk");
    }
    Ok(u32::from_le_bytes([window[4], window[5], window[6], window[7]]))
}

// Fills the buffer completely. Returns false on a clean end of stream.
fn fill(reader: &mut dyn ReadSeek, buf: &mut [u8]) -> Result<bool, AudioError> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}
