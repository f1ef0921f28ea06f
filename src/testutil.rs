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

use std::{error::Error, fs::File, path::PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};


/// Writes a WAV file with one Vec of samples per channel. i16 samples are
/// written as 16-bit, everything else as 32-bit.
pub fn write_wav<S: hound::Sample + Copy + 'static>(
    path: PathBuf,
    samples: Vec<Vec<S>>,
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    let bits_per_sample = if std::any::TypeId::of::<S>() == std::any::TypeId::of::<i16>() {
        16
    } else {
        32
    };
    write_wav_with_bits(path, samples, sample_rate, bits_per_sample)
}

pub fn write_wav_with_bits<S: hound::Sample + Copy + 'static>(
    path: PathBuf,
    samples: Vec<Vec<S>>,
    sample_rate: u32,
    bits_per_sample: u16,
) -> Result<(), Box<dyn Error>> {
    let tempwav = File::create(path)?;

    // Determine sample format based on the type
    let sample_format = if std::any::TypeId::of::<S>() == std::any::TypeId::of::<f32>() {
        SampleFormat::Float
    } else if std::any::TypeId::of::<S>() == std::any::TypeId::of::<i32>()
        || std::any::TypeId::of::<S>() == std::any::TypeId::of::<i16>()
    {
        SampleFormat::Int
    } else {
        return Err("Unsupported sample format".into());
    };

    let num_channels = samples.len();
    assert!(num_channels <= u16::MAX.into(), "Too many channels!");
    let frames = samples.first().map(|c| c.len()).unwrap_or(0);
    let mut writer = WavWriter::new(
        tempwav,
        WavSpec {
            channels: num_channels as u16,
            sample_rate,
            bits_per_sample,
            sample_format,
        },
    )?;

    for frame in 0..frames {
        for channel in &samples {
            writer.write_sample(channel[frame])?;
        }
    }
    writer.finalize()?;

    Ok(())
}

/// Builds RIFF/WAVE containers byte by byte, including malformed ones.
pub struct ContainerBuilder {
    audio_format: u16,
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
    sub_format: Option<[u8; 16]>,
    fmt_padding: Vec<u8>,
    chunks: Vec<([u8; 4], Vec<u8>)>,
    data: Option<Vec<u8>>,
    declared_data_size: Option<u32>,
}

impl ContainerBuilder {
    pub fn pcm(channels: u16, sample_rate: u32, bits_per_sample: u16) -> ContainerBuilder {
        ContainerBuilder {
            audio_format: 0x0001,
            channels,
            sample_rate,
            bits_per_sample,
            sub_format: None,
            fmt_padding: Vec::new(),
            chunks: Vec::new(),
            data: Some(Vec::new()),
            declared_data_size: None,
        }
    }

    pub fn float(channels: u16, sample_rate: u32) -> ContainerBuilder {
        ContainerBuilder {
            audio_format: 0x0003,
            ..Self::pcm(channels, sample_rate, 32)
        }
    }

    pub fn extensible(
        sub_format: [u8; 16],
        channels: u16,
        sample_rate: u32,
        bits_per_sample: u16,
    ) -> ContainerBuilder {
        ContainerBuilder {
            audio_format: 0xFFFE,
            sub_format: Some(sub_format),
            ..Self::pcm(channels, sample_rate, bits_per_sample)
        }
    }

    pub fn with_audio_format(mut self, audio_format: u16) -> ContainerBuilder {
        self.audio_format = audio_format;
        self
    }

    /// Appends extra bytes to the end of the format chunk.
    pub fn with_fmt_padding(mut self, padding: Vec<u8>) -> ContainerBuilder {
        self.fmt_padding = padding;
        self
    }

    /// Adds a chunk between the format chunk and the data chunk.
    pub fn with_chunk(mut self, tag: [u8; 4], body: Vec<u8>) -> ContainerBuilder {
        self.chunks.push((tag, body));
        self
    }

    pub fn with_data(mut self, data: Vec<u8>) -> ContainerBuilder {
        self.data = Some(data);
        self
    }

    pub fn without_data(mut self) -> ContainerBuilder {
        self.data = None;
        self
    }

    /// Overrides the size written into the data chunk header.
    pub fn declare_data_size(mut self, size: u32) -> ContainerBuilder {
        self.declared_data_size = Some(size);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let block_align = self.channels * (self.bits_per_sample / 8);

        let mut fmt = Vec::new();
        fmt.extend_from_slice(&self.audio_format.to_le_bytes());
        fmt.extend_from_slice(&self.channels.to_le_bytes());
        fmt.extend_from_slice(&self.sample_rate.to_le_bytes());
        fmt.extend_from_slice(&(self.sample_rate * u32::from(block_align)).to_le_bytes());
        fmt.extend_from_slice(&block_align.to_le_bytes());
        fmt.extend_from_slice(&self.bits_per_sample.to_le_bytes());
        if let Some(sub_format) = self.sub_format {
            fmt.extend_from_slice(&22u16.to_le_bytes());
            fmt.extend_from_slice(&self.bits_per_sample.to_le_bytes());
            fmt.extend_from_slice(&0u32.to_le_bytes());
            fmt.extend_from_slice(&sub_format);
        }
        fmt.extend_from_slice(&self.fmt_padding);

        let mut body = Vec::new();
        body.extend_from_slice(b"WAVE");
        push_chunk(&mut body, b"fmt ", &fmt, None);
        for (tag, chunk) in &self.chunks {
            push_chunk(&mut body, tag, chunk, None);
        }
        if let Some(data) = &self.data {
            push_chunk(&mut body, b"data", data, self.declared_data_size);
        }

        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&body);
        bytes
    }
}

fn push_chunk(out: &mut Vec<u8>, tag: &[u8; 4], body: &[u8], declared: Option<u32>) {
    out.extend_from_slice(tag);
    out.extend_from_slice(&declared.unwrap_or(body.len() as u32).to_le_bytes());
    out.extend_from_slice(body);
    if body.len() % 2 == 1 && declared.is_none() {
        out.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::{SUBFORMAT_IEEE_FLOAT, SUBFORMAT_PCM};

    #[test]
    fn test_container_builder_layout() {
        let bytes = ContainerBuilder::pcm(2, 44100, 16)
            .with_data(vec![0u8; 4])
            .build();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), 40);
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(&bytes[36..40], b"data");

        let bytes = ContainerBuilder::extensible(SUBFORMAT_IEEE_FLOAT, 2, 44100, 32).build();
        assert_eq!(&bytes[44..60], &SUBFORMAT_IEEE_FLOAT);
        assert_ne!(SUBFORMAT_PCM, SUBFORMAT_IEEE_FLOAT);
    }
}
