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
    collections::HashMap,
    fs::{self, File},
    io::{self, BufRead, BufReader, Read},
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use tracing::{debug, info, warn};

use super::SoundSample;
use crate::audio::AudioError;
use crate::util::filename_display;

/// Where sample banks live unless configured otherwise.
pub const DEFAULT_SAMPLES_ROOT: &str = "sound/";

/// The extension of sample files, without the dot.
pub const DEFAULT_SAMPLE_EXTENSION: &str = "pcm";

const DATA_MARKER: &str = "PCM DATA";
const MAX_HEADER_SIZE: usize = 4096;
const MAX_AUDIO_DATA_SIZE: usize = 100 * 1024 * 1024;
const MIN_SAMPLE_RATE: u32 = 8000;
const MAX_SAMPLE_RATE: u32 = 192000;
const MAX_CHANNELS: u16 = 8;
const SAMPLE_WIDTH: usize = std::mem::size_of::<i16>();

/// Name-keyed samples loaded from `<root>/<instrument>`.
pub struct SampleBank {
    root: PathBuf,
    extension: String,
    samples: HashMap<String, Arc<SoundSample>>,
}

impl SampleBank {
    pub fn new<P: Into<PathBuf>>(root: P) -> SampleBank {
        SampleBank {
            root: root.into(),
            extension: DEFAULT_SAMPLE_EXTENSION.to_string(),
            samples: HashMap::new(),
        }
    }

    /// Only files with this extension are loaded. A leading dot is ignored.
    pub fn with_extension(mut self, extension: &str) -> SampleBank {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    /// Loads every sample file below the instrument folder, replacing entries
    /// with the same name. Files that fail to parse are logged and skipped.
    /// Returns the number of samples loaded.
    pub fn load(&mut self, instrument: &str) -> Result<usize, AudioError> {
        let folder = self.root.join(instrument);
        if !folder.is_dir() {
            return Err(AudioError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!(
                    "instrument folder {} does not exist or is not a directory",
                    folder.display()
                ),
            )));
        }

        let mut files = Vec::new();
        collect_files(&folder, &self.extension, &mut files)?;
        files.sort();

        let mut loaded = 0;
        for path in files {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                warn!(path = ?path, "Skipping sample with unreadable name");
                continue;
            };
            match parse_sample(&path) {
                Ok(sample) => {
                    debug!(
                        name = stem,
                        frames = sample.frame_count,
                        channels = sample.channels,
                        sample_rate = sample.sample_rate,
                        "Loaded sample"
                    );
                    self.samples.insert(stem.to_string(), Arc::new(sample));
                    loaded += 1;
                }
                Err(e) => warn!(path = ?path, err = %e, "Failed to load sound sample"),
            }
        }

        info!(
            instrument,
            loaded,
            total = self.samples.len(),
            "Loaded sample bank"
        );
        Ok(loaded)
    }

    /// Looks up a sample by file stem.
    pub fn get(&self, name: &str) -> Option<Arc<SoundSample>> {
        self.samples.get(name).cloned()
    }

    /// All sample names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.samples.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the total memory used by loaded samples in bytes.
    pub fn total_memory(&self) -> usize {
        self.samples.values().map(|s| s.memory_size()).sum()
    }
}

fn collect_files(dir: &Path, extension: &str, files: &mut Vec<PathBuf>) -> Result<(), AudioError> {
    for entry in fs::read_dir(dir)? {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                warn!(dir = ?dir, err = %e, "Error reading directory entry");
                continue;
            }
        };

        if path.is_dir() {
            if let Err(e) = collect_files(&path, extension, files) {
                warn!(dir = ?path, err = %e, "Skipping unreadable directory");
            }
        } else if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(extension) {
            files.push(path);
        }
    }
    Ok(())
}

/// Parses a single sample file.
pub fn parse_sample(path: &Path) -> Result<SoundSample, AudioError> {
    let mut reader = BufReader::new(File::open(path)?);
    let header = read_header(&mut reader).map_err(|e| match e {
        AudioError::Format(msg) => {
            AudioError::Format(format!("{}: {}", filename_display(path), msg))
        }
        e => e,
    })?;
    let fields = header_fields(&header);

    let name: String = field(&fields, "name")?;
    let sample_rate: u32 = field(&fields, "samplerate")?;
    let channels: u16 = field(&fields, "channels")?;
    let frames: usize = field(&fields, "frames")?;
    let sample_width: usize = field(&fields, "samplewidth")?;

    if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
        return Err(AudioError::validation(
            "samplerate",
            format!(
                "{} is outside {}-{}",
                sample_rate, MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
            ),
        ));
    }
    if channels == 0 || channels > MAX_CHANNELS {
        return Err(AudioError::validation(
            "channels",
            format!("{} is outside 1-{}", channels, MAX_CHANNELS),
        ));
    }
    if frames == 0 {
        return Err(AudioError::validation("frames", "must be greater than 0"));
    }
    if sample_width != SAMPLE_WIDTH {
        return Err(AudioError::validation(
            "samplewidth",
            format!("{} is unsupported, expected {}", sample_width, SAMPLE_WIDTH),
        ));
    }

    let total_samples = match frames.checked_mul(usize::from(channels)) {
        Some(total) if total <= MAX_AUDIO_DATA_SIZE / SAMPLE_WIDTH => total,
        _ => {
            return Err(AudioError::validation(
                "frames",
                format!("{} frames of {} channels is too large", frames, channels),
            ))
        }
    };

    let mut bytes = vec![0u8; total_samples * SAMPLE_WIDTH];
    reader.read_exact(&mut bytes)?;

    Ok(SoundSample {
        name,
        sample_rate,
        frame_count: frames,
        channels,
        data: bytes
            .chunks_exact(SAMPLE_WIDTH)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect(),
    })
}

/// Reads header text up to the data marker, leaving the reader at the first
/// PCM byte. The marker may end a header line or sit on a line of its own.
fn read_header<R: BufRead>(reader: &mut R) -> Result<String, AudioError> {
    let mut header = String::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = reader
            .by_ref()
            .take(MAX_HEADER_SIZE as u64 + 1)
            .read_until(b'\n', &mut line)?;
        if read == 0 {
            return Err(AudioError::format(format!("{} marker not found", DATA_MARKER)));
        }

        let text = String::from_utf8_lossy(&line);
        let marker = text.find(DATA_MARKER);
        header.push_str(match marker {
            Some(pos) => &text[..pos],
            None => &text[..],
        });
        if header.len() > MAX_HEADER_SIZE {
            return Err(AudioError::format(format!(
                "header is larger than {} bytes",
                MAX_HEADER_SIZE
            )));
        }
        if marker.is_some() {
            return Ok(header);
        }
    }
}

fn header_fields(header: &str) -> HashMap<&str, &str> {
    header
        .split(['|', '\n'])
        .filter_map(|token| token.split_once(':'))
        .map(|(key, value)| (key.trim(), value.trim()))
        .collect()
}

fn field<T: FromStr>(fields: &HashMap<&str, &str>, key: &'static str) -> Result<T, AudioError> {
    let value = fields
        .get(key)
        .ok_or_else(|| AudioError::validation(key, "missing"))?;
    value
        .parse()
        .map_err(|_| AudioError::validation(key, format!("unparseable value '{}'", value)))
}
