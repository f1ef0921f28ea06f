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
use std::{fmt, sync::Arc, time::Duration};

use tracing::{debug, info, warn};

use super::container::PcmBlob;
use super::driver::{Driver, Pcm, PcmConfig};
use super::error::AudioError;
use super::format::{HardwareFormat, PcmFormat, SampleFormat};
use super::topology::DeviceDescriptor;
use super::writer::{samples_to_bytes, Progress, StreamWriter, WriteError, DEFAULT_WAIT_TIMEOUT};
use crate::samples::SoundSample;

enum State {
    Closed,
    Open {
        pcm: Box<dyn Pcm>,
        descriptor: DeviceDescriptor,
        format: HardwareFormat,
    },
}

/// One open hardware stream over a negotiated format. Calls on a session must
/// be serialized by the caller.
pub struct Session {
    driver: Arc<dyn Driver>,
    state: State,
    last_error: String,
    wait_timeout: Duration,
}

impl Session {
    pub fn new(driver: Arc<dyn Driver>) -> Session {
        Session {
            driver,
            state: State::Closed,
            last_error: String::new(),
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }

    /// Sets how long a write waits for the device after a partial write.
    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Session {
        self.wait_timeout = wait_timeout;
        self
    }

    /// Opens the device described by `descriptor` using its negotiated format.
    /// The session stays closed on failure.
    pub fn open(&mut self, descriptor: &DeviceDescriptor) -> Result<(), AudioError> {
        if let Some(bound) = self.descriptor() {
            let error = AudioError::Hardware(format!(
                "session is already bound to hw:{},{}",
                bound.card, bound.device
            ));
            return Err(self.fail(error));
        }

        let format = match descriptor.format {
            Some(format) => format,
            None => {
                return Err(self.fail(AudioError::Hardware(format!(
                    "hw:{},{} has no negotiated format",
                    descriptor.card, descriptor.device
                ))))
            }
        };

        let config = PcmConfig::from(&format);
        let mut pcm = match self.driver.open(
            descriptor.card,
            descriptor.device,
            descriptor.direction,
            &config,
        ) {
            Ok(pcm) => pcm,
            Err(e) => return Err(self.fail(e)),
        };

        if !pcm.is_ready() {
            let diagnostic = pcm.last_error();
            pcm.close();
            return Err(self.fail(AudioError::Hardware(if diagnostic.is_empty() {
                format!("hw:{},{} is not ready", descriptor.card, descriptor.device)
            } else {
                diagnostic
            })));
        }

        info!(
            card = descriptor.card,
            device = descriptor.device,
            direction = %descriptor.direction,
            %format,
            "Opened audio device"
        );
        self.state = State::Open {
            pcm,
            descriptor: descriptor.clone(),
            format,
        };
        Ok(())
    }

    /// Releases the device, if any. Does nothing when already closed.
    pub fn close(&mut self) {
        if let State::Open {
            mut pcm, descriptor, ..
        } = std::mem::replace(&mut self.state, State::Closed)
        {
            pcm.close();
            debug!(
                card = descriptor.card,
                device = descriptor.device,
                "Closed audio device"
            );
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open { .. })
    }

    /// The descriptor bound while open.
    pub fn descriptor(&self) -> Option<&DeviceDescriptor> {
        match &self.state {
            State::Open { descriptor, .. } => Some(descriptor),
            State::Closed => None,
        }
    }

    /// The format bound while open.
    pub fn format(&self) -> Option<&HardwareFormat> {
        match &self.state {
            State::Open { format, .. } => Some(format),
            State::Closed => None,
        }
    }

    /// Streams interleaved 16-bit samples to a device bound as s16le.
    pub fn write(&mut self, samples: &[i16]) -> Result<Progress, WriteError> {
        let error = match &self.state {
            State::Open { format, .. } if format.sample_format != SampleFormat::S16Le => {
                AudioError::format(format!(
                    "16-bit samples can't be written to a {} device",
                    format.sample_format
                ))
            }
            _ => return self.write_bytes(&samples_to_bytes(samples)),
        };
        self.last_error = error.to_string();
        Err(WriteError {
            progress: Progress::default(),
            total_frames: 0,
            source: error,
        })
    }

    /// Streams interleaved PCM bytes in the bound format to the device, one
    /// period at a time.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<Progress, WriteError> {
        let result = match &mut self.state {
            State::Closed => Err(WriteError {
                progress: Progress::default(),
                total_frames: 0,
                source: AudioError::NotOpen,
            }),
            State::Open { pcm, format, .. } => StreamWriter::for_format(format)
                .with_wait_timeout(self.wait_timeout)
                .write(pcm.as_mut(), data),
        };
        if let Err(e) = &result {
            self.last_error = e.source.to_string();
        }
        result
    }

    /// Streams a parsed container. The blob must already be in the bound
    /// hardware format.
    pub fn play(&mut self, blob: &PcmBlob) -> Result<Progress, WriteError> {
        self.check_format(blob.format())?;
        self.write_bytes(blob.data())
    }

    /// Streams a sample bank entry. The sample must already be in the bound
    /// hardware format.
    pub fn play_sample(&mut self, sample: &SoundSample) -> Result<Progress, WriteError> {
        self.check_format(&sample.format())?;
        self.write(&sample.data)
    }

    /// Reads up to one buffer of frames from a capture device.
    pub fn read(&mut self, data: &mut [u8]) -> Result<usize, AudioError> {
        let result = match &mut self.state {
            State::Closed => Err(AudioError::NotOpen),
            State::Open { pcm, .. } => {
                let frames = pcm.bytes_to_frames(data.len());
                pcm.read(data, frames)
            }
        };
        result.map_err(|e| self.fail(e))
    }

    /// One period of the bound format in bytes, or 0 while closed.
    pub fn buffer_size(&self) -> usize {
        match &self.state {
            State::Open { pcm, format, .. } => pcm.frames_to_bytes(format.period_size as usize),
            State::Closed => 0,
        }
    }

    /// The most recent diagnostic, kept until the next failing call.
    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    fn check_format(&mut self, source: &PcmFormat) -> Result<(), WriteError> {
        let error = match &self.state {
            State::Closed => AudioError::NotOpen,
            State::Open { format, .. } if format.accepts(source) => return Ok(()),
            State::Open { format, .. } => AudioError::format(format!(
                "source format {} does not match device format {}",
                source, format
            )),
        };
        self.last_error = error.to_string();
        Err(WriteError {
            progress: Progress::default(),
            total_frames: 0,
            source: error,
        })
    }

    fn fail(&mut self, error: AudioError) -> AudioError {
        warn!(err = %error, "Audio session error");
        self.last_error = error.to_string();
        error
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            State::Open { descriptor, .. } => write!(f, "{} on {}", self.driver, descriptor),
            State::Closed => write!(f, "{} (closed)", self.driver),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::{self, WriteOutcome};
    use crate::audio::Direction;

    fn descriptor(format: Option<HardwareFormat>) -> DeviceDescriptor {
        DeviceDescriptor {
            card: 0,
            device: 0,
            direction: Direction::Playback,
            driver: "mock".to_string(),
            description: "mock device".to_string(),
            format,
        }
    }

    fn session(driver: &mock::Driver) -> Session {
        Session::new(Arc::new(driver.clone()))
    }

    #[test]
    fn test_open_close() {
        let driver = mock::Driver::get("mock");
        let mut session = session(&driver);
        assert!(!session.is_open());
        assert_eq!(session.buffer_size(), 0);

        session
            .open(&descriptor(Some(HardwareFormat::default())))
            .unwrap();
        assert!(session.is_open());
        assert_eq!(session.descriptor().unwrap().card, 0);
        assert_eq!(session.buffer_size(), 4096);
        let config = driver.calls().last_config.unwrap();
        assert_eq!(config.start_threshold, 1024);
        assert_eq!(config.stop_threshold, 2048);

        session.close();
        assert!(!session.is_open());
        assert!(session.descriptor().is_none());
        session.close();
        assert_eq!(driver.calls().closes, 1);
    }

    #[test]
    fn test_open_twice_is_rejected() {
        let driver = mock::Driver::get("mock");
        let mut session = session(&driver);
        let descriptor = descriptor(Some(HardwareFormat::default()));
        session.open(&descriptor).unwrap();
        assert!(matches!(
            session.open(&descriptor),
            Err(AudioError::Hardware(_))
        ));
        assert!(session.is_open());
        assert_eq!(driver.calls().opens, 1);
    }

    #[test]
    fn test_open_without_format() {
        let driver = mock::Driver::get("mock");
        let mut session = session(&driver);
        assert!(session.open(&descriptor(None)).is_err());
        assert!(!session.is_open());
        assert_eq!(driver.calls().opens, 0);
    }

    #[test]
    fn test_open_failures_record_diagnostic() {
        let driver = mock::Driver::get("mock").fail_open("no such device");
        let mut session = session(&driver);
        assert!(session
            .open(&descriptor(Some(HardwareFormat::default())))
            .is_err());
        assert!(!session.is_open());
        assert!(session.last_error().contains("no such device"));

        let driver = mock::Driver::get("mock").open_not_ready("hw params rejected");
        let mut not_ready = Session::new(Arc::new(driver.clone()));
        assert!(not_ready
            .open(&descriptor(Some(HardwareFormat::default())))
            .is_err());
        assert!(!not_ready.is_open());
        assert!(not_ready.last_error().contains("hw params rejected"));
        assert_eq!(driver.calls().closes, 1);
    }

    #[test]
    fn test_write_requires_open() {
        let driver = mock::Driver::get("mock");
        let mut session = session(&driver);
        let err = session.write(&[0i16; 4]).unwrap_err();
        assert!(matches!(err.source, AudioError::NotOpen));
        assert!(!session.last_error().is_empty());
        assert!(driver.calls().writes.is_empty());
    }

    #[test]
    fn test_write_uses_period_chunks() {
        let driver = mock::Driver::get("mock");
        let mut session = session(&driver);
        session
            .open(&descriptor(Some(HardwareFormat::default())))
            .unwrap();

        // Three periods of stereo audio.
        let samples = vec![1i16; 1024 * 2 * 3];
        let progress = session.write(&samples).unwrap();
        assert_eq!(progress.frames, 3072);
        assert_eq!(progress.writes, 3);
        assert_eq!(progress.waits, 0);
        assert_eq!(driver.calls().writes, vec![1024, 1024, 1024]);
        assert_eq!(driver.calls().written.len(), 3072 * 4);
    }

    #[test]
    fn test_write_rejects_non_s16_device() {
        let driver = mock::Driver::get("mock");
        let mut session = session(&driver);
        session
            .open(&descriptor(Some(HardwareFormat::new(
                1024,
                2,
                2,
                44100,
                SampleFormat::S32Le,
            ))))
            .unwrap();

        let err = session.write(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap_err();
        assert!(matches!(err.source, AudioError::Format(_)));
        assert_eq!(err.progress.frames, 0);
        assert!(session.last_error().contains("s32le"));
        assert!(driver.calls().writes.is_empty());

        // Raw bytes in the bound format still go through.
        assert_eq!(session.write_bytes(&[0u8; 32]).unwrap().frames, 4);
    }

    #[test]
    fn test_write_failure_is_retained() {
        let driver = mock::Driver::get("mock")
            .script_writes(vec![WriteOutcome::Full, WriteOutcome::Fail("EIO".into())]);
        let mut session = session(&driver);
        session
            .open(&descriptor(Some(HardwareFormat::default())))
            .unwrap();

        let err = session.write(&vec![0i16; 1024 * 2 * 3]).unwrap_err();
        assert_eq!(err.progress.frames, 1024);
        assert!(session.last_error().contains("EIO"));
        assert!(session.is_open());

        // A later success doesn't clear the diagnostic.
        session.write(&[0i16; 4]).unwrap();
        assert!(session.last_error().contains("EIO"));
    }

    #[test]
    fn test_play_blob_format_must_match() {
        let driver = mock::Driver::get("mock");
        let mut session = session(&driver);
        session
            .open(&descriptor(Some(HardwareFormat::default())))
            .unwrap();

        let matching = PcmBlob::new(
            PcmFormat {
                sample_rate: 44100,
                channels: 2,
                is_float: false,
                bits_per_sample: 16,
            },
            vec![0u8; 400],
        );
        assert_eq!(session.play(&matching).unwrap().frames, 100);

        let float = PcmBlob::new(
            PcmFormat {
                sample_rate: 44100,
                channels: 2,
                is_float: true,
                bits_per_sample: 32,
            },
            vec![0u8; 800],
        );
        let err = session.play(&float).unwrap_err();
        assert!(matches!(err.source, AudioError::Format(_)));
        assert_eq!(driver.calls().writes.len(), 1);
    }

    #[test]
    fn test_play_sample() {
        let driver = mock::Driver::get("mock");
        let mut session = session(&driver);
        session
            .open(&descriptor(Some(HardwareFormat::default())))
            .unwrap();

        let sample = SoundSample {
            name: "kick".to_string(),
            sample_rate: 44100,
            frame_count: 2,
            channels: 2,
            data: vec![1, -1, 2, -2],
        };
        assert_eq!(session.play_sample(&sample).unwrap().frames, 2);
        assert_eq!(driver.calls().written, vec![1, 0, 255, 255, 2, 0, 254, 255]);

        let mono = SoundSample {
            channels: 1,
            data: vec![1, 2],
            ..sample
        };
        assert!(session.play_sample(&mono).is_err());
    }

    #[test]
    fn test_read() {
        let driver = mock::Driver::get("mock");
        let mut session = session(&driver);
        let mut buffer = vec![7u8; 64];
        assert!(matches!(session.read(&mut buffer), Err(AudioError::NotOpen)));

        let mut capture = descriptor(Some(HardwareFormat::default()));
        capture.direction = Direction::Capture;
        session.open(&capture).unwrap();
        assert_eq!(session.read(&mut buffer).unwrap(), 16);
        assert_eq!(driver.calls().reads, 1);
    }

    #[test]
    fn test_drop_closes() {
        let driver = mock::Driver::get("mock");
        {
            let mut session = session(&driver);
            session
                .open(&descriptor(Some(HardwareFormat::default())))
                .unwrap();
        }
        assert_eq!(driver.calls().closes, 1);
    }
}
