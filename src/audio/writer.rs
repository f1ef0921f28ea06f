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

//! Pushes an arbitrary amount of PCM data through a fixed-size hardware ring
//! buffer, one period at a time.

use std::time::Duration;

use tracing::{debug, warn};

use super::driver::Pcm;
use super::error::AudioError;
use super::format::HardwareFormat;

/// How long to wait for the device to accept more data after a partial write.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(1000);

/// What a write call accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Frames the hardware accepted.
    pub frames: usize,
    /// Hardware write requests issued.
    pub writes: usize,
    /// Readiness waits issued after partial writes.
    pub waits: usize,
}

/// A write that stopped before all frames were transferred.
#[derive(Debug, thiserror::Error)]
#[error("wrote {} of {total_frames} frames: {source}", .progress.frames)]
pub struct WriteError {
    /// How far the write got before failing.
    pub progress: Progress,
    pub total_frames: usize,
    #[source]
    pub source: AudioError,
}

/// Writes interleaved PCM to a device in chunks of at most one period.
#[derive(Debug, Clone, Copy)]
pub struct StreamWriter {
    chunk_frames: usize,
    bytes_per_frame: usize,
    wait_timeout: Duration,
}

impl StreamWriter {
    pub fn new(chunk_frames: usize, bytes_per_frame: usize) -> StreamWriter {
        StreamWriter {
            chunk_frames,
            bytes_per_frame,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }

    /// Creates a writer that writes one period of the given format at a time.
    pub fn for_format(format: &HardwareFormat) -> StreamWriter {
        Self::new(format.period_size as usize, format.bytes_per_frame())
    }

    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> StreamWriter {
        self.wait_timeout = wait_timeout;
        self
    }

    /// Writes all of `data` to the device. Succeeds only once every frame has
    /// been accepted. On failure the error carries the frames written so far.
    pub fn write(&self, pcm: &mut dyn Pcm, data: &[u8]) -> Result<Progress, WriteError> {
        let mut progress = Progress::default();

        if self.chunk_frames == 0 || self.bytes_per_frame == 0 {
            return Err(WriteError {
                progress,
                total_frames: 0,
                source: AudioError::Hardware(format!(
                    "invalid write layout: {} frames per chunk, {} bytes per frame",
                    self.chunk_frames, self.bytes_per_frame
                )),
            });
        }

        let total_frames = data.len() / self.bytes_per_frame;
        if data.len() % self.bytes_per_frame != 0 {
            return Err(WriteError {
                progress,
                total_frames,
                source: AudioError::format(format!(
                    "{} bytes is not a whole number of {}-byte frames",
                    data.len(),
                    self.bytes_per_frame
                )),
            });
        }

        while progress.frames < total_frames {
            let frames_to_write = (total_frames - progress.frames).min(self.chunk_frames);
            let start = progress.frames * self.bytes_per_frame;
            let end = start + frames_to_write * self.bytes_per_frame;

            progress.writes += 1;
            let written = match pcm.write(&data[start..end], frames_to_write) {
                Ok(written) => written.min(frames_to_write),
                Err(e) => {
                    let source = hardware_diagnostic(pcm, e);
                    warn!(
                        frames = progress.frames,
                        total_frames,
                        err = %source,
                        "Error writing to device"
                    );
                    return Err(WriteError {
                        progress,
                        total_frames,
                        source,
                    });
                }
            };
            progress.frames += written;

            if written < frames_to_write {
                debug!(
                    requested = frames_to_write,
                    written, "Partial write, waiting for device"
                );
                progress.waits += 1;
                if let Err(e) = pcm.wait(self.wait_timeout) {
                    let source = hardware_diagnostic(pcm, e);
                    warn!(
                        frames = progress.frames,
                        total_frames,
                        err = %source,
                        "Device did not become ready"
                    );
                    return Err(WriteError {
                        progress,
                        total_frames,
                        source,
                    });
                }
            }
        }

        Ok(progress)
    }
}

/// Prefers the driver's own diagnostic over the error it returned.
fn hardware_diagnostic(pcm: &dyn Pcm, error: AudioError) -> AudioError {
    let diagnostic = pcm.last_error();
    if diagnostic.is_empty() {
        error
    } else {
        AudioError::Hardware(diagnostic)
    }
}

/// Encodes 16-bit samples as little-endian bytes.
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::driver::{Driver as _, PcmConfig};
    use crate::audio::mock::{self, WriteOutcome};
    use crate::audio::Direction;

    const PERIOD: usize = 1024;
    const FRAME: usize = 4;

    fn open(driver: &mock::Driver) -> Box<dyn Pcm> {
        let config = PcmConfig::from(&HardwareFormat::default());
        driver.open(0, 0, Direction::Playback, &config).unwrap()
    }

    fn data(frames: usize) -> Vec<u8> {
        (0..frames * FRAME).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_whole_periods_write_once_per_period() {
        let driver = mock::Driver::get("mock");
        let mut pcm = open(&driver);
        let data = data(PERIOD * 4);

        let progress = StreamWriter::new(PERIOD, FRAME)
            .write(pcm.as_mut(), &data)
            .unwrap();

        assert_eq!(
            progress,
            Progress {
                frames: PERIOD * 4,
                writes: 4,
                waits: 0
            }
        );
        let calls = driver.calls();
        assert_eq!(calls.writes, vec![PERIOD; 4]);
        assert_eq!(calls.waits, 0);
        assert_eq!(calls.written, data);
    }

    #[test]
    fn test_final_chunk_is_short() {
        let driver = mock::Driver::get("mock");
        let mut pcm = open(&driver);

        let progress = StreamWriter::new(PERIOD, FRAME)
            .write(pcm.as_mut(), &data(2548))
            .unwrap();

        assert_eq!(progress.frames, 2548);
        assert_eq!(driver.calls().writes, vec![1024, 1024, 500]);
    }

    #[test]
    fn test_partial_write_waits_then_continues() {
        let driver = mock::Driver::get("mock").script_writes(vec![
            WriteOutcome::Full,
            WriteOutcome::Partial(100),
            WriteOutcome::Partial(0),
        ]);
        let mut pcm = open(&driver);
        let data = data(PERIOD * 2);

        let progress = StreamWriter::new(PERIOD, FRAME)
            .write(pcm.as_mut(), &data)
            .unwrap();

        assert_eq!(progress.frames, PERIOD * 2);
        assert_eq!(progress.waits, 2);
        let calls = driver.calls();
        assert_eq!(calls.writes, vec![1024, 1024, 924, 924]);
        assert_eq!(calls.waits, 2);
        assert_eq!(calls.written, data);
    }

    #[test]
    fn test_hardware_error_aborts() {
        let driver = mock::Driver::get("mock").script_writes(vec![
            WriteOutcome::Full,
            WriteOutcome::Fail("cannot write stream data: I/O error".to_string()),
        ]);
        let mut pcm = open(&driver);

        let err = StreamWriter::new(PERIOD, FRAME)
            .write(pcm.as_mut(), &data(PERIOD * 3))
            .unwrap_err();

        assert_eq!(err.progress.frames, PERIOD);
        assert_eq!(err.progress.writes, 2);
        assert_eq!(err.total_frames, PERIOD * 3);
        assert!(matches!(
            err.source,
            AudioError::Hardware(ref msg) if msg == "cannot write stream data: I/O error"
        ));
        assert_eq!(driver.calls().writes.len(), 2);
    }

    #[test]
    fn test_wait_failure_aborts() {
        let driver = mock::Driver::get("mock")
            .script_writes(vec![WriteOutcome::Partial(10)])
            .script_waits(vec![Err("timed out".to_string())]);
        let mut pcm = open(&driver);

        let err = StreamWriter::new(PERIOD, FRAME)
            .with_wait_timeout(Duration::from_millis(5))
            .write(pcm.as_mut(), &data(PERIOD))
            .unwrap_err();

        assert_eq!(err.progress.frames, 10);
        assert_eq!(err.progress.waits, 1);
        assert_eq!(driver.calls().writes.len(), 1);
    }

    #[test]
    fn test_truncated_frame_is_rejected() {
        let driver = mock::Driver::get("mock");
        let mut pcm = open(&driver);

        let err = StreamWriter::new(PERIOD, FRAME)
            .write(pcm.as_mut(), &[0u8; 4 * 10 + 2])
            .unwrap_err();

        assert!(matches!(err.source, AudioError::Format(_)));
        assert_eq!(err.progress.frames, 0);
        assert!(driver.calls().writes.is_empty());
    }

    #[test]
    fn test_invalid_layout_is_rejected() {
        let driver = mock::Driver::get("mock");
        let mut pcm = open(&driver);

        assert!(StreamWriter::new(0, FRAME)
            .write(pcm.as_mut(), &data(4))
            .is_err());
        assert!(StreamWriter::new(PERIOD, 0)
            .write(pcm.as_mut(), &data(4))
            .is_err());
    }

    #[test]
    fn test_success_always_transfers_every_frame() {
        for frames in [0, 1, 1023, 1024, 1025, 3000] {
            let driver = mock::Driver::get("mock").script_writes(vec![
                WriteOutcome::Partial(7),
                WriteOutcome::Full,
                WriteOutcome::Partial(1000),
            ]);
            let mut pcm = open(&driver);
            let data = data(frames);

            let progress = StreamWriter::new(PERIOD, FRAME)
                .write(pcm.as_mut(), &data)
                .unwrap();
            assert_eq!(progress.frames, frames);
            assert_eq!(driver.calls().written, data);
        }
    }

    #[test]
    fn test_failure_never_reports_every_frame() {
        for fail_at in 0..3 {
            let mut outcomes = vec![WriteOutcome::Full; fail_at];
            outcomes.push(WriteOutcome::Fail("xrun".to_string()));
            let driver = mock::Driver::get("mock").script_writes(outcomes);
            let mut pcm = open(&driver);

            let err = StreamWriter::new(PERIOD, FRAME)
                .write(pcm.as_mut(), &data(PERIOD * 3))
                .unwrap_err();
            assert_eq!(err.progress.frames, PERIOD * fail_at);
            assert!(err.progress.frames < err.total_frames);
        }
    }

    #[test]
    fn test_samples_to_bytes() {
        assert_eq!(samples_to_bytes(&[1, -1, 256]), vec![1, 0, 255, 255, 0, 1]);
    }
}
