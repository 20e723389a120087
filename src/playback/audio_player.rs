use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info};
use miniaudio::{Device, DeviceConfig, DeviceType, Format};

use crate::data::AudioData;

/// Audio output as seen by the session. The engine runs on its own clock;
/// the session only queries it and never derives the marker from
/// `position_hint` alone.
pub trait PlaybackEngine {
    /// Take a copy of already decoded audio. Any current output is stopped.
    fn load(&mut self, audio: &AudioData) -> anyhow::Result<()>;
    /// Start (or restart) output at `start_offset_sec`.
    fn play(&mut self, start_offset_sec: f64) -> anyhow::Result<()>;
    fn pause(&mut self);
    fn unpause(&mut self);
    fn stop(&mut self);
    /// True while samples are actively being played.
    fn is_busy(&self) -> bool;
    /// Engine-side position, `None` when no stream has been started.
    fn position_hint(&self) -> Option<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Idle,
    Playing,
    Paused,
}

struct PlaybackData {
    samples: Vec<f32>,
    sample_rate: u32,
    position: usize,
    state: StreamState,
}

fn lock(data: &Mutex<PlaybackData>) -> MutexGuard<'_, PlaybackData> {
    data.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mono miniaudio output device. The device is opened on the first load and
/// closed when the engine is dropped.
pub struct MiniaudioEngine {
    device: Option<Device>,
    device_rate: u32,
    playback_data: Arc<Mutex<PlaybackData>>,
}

impl MiniaudioEngine {
    pub fn new() -> Self {
        Self {
            device: None,
            device_rate: 0,
            playback_data: Arc::new(Mutex::new(PlaybackData {
                samples: Vec::new(),
                sample_rate: 48000,
                position: 0,
                state: StreamState::Idle,
            })),
        }
    }

    fn init_device(&mut self, sample_rate: u32) -> anyhow::Result<()> {
        // Release the old device before opening one at a new rate
        self.device = None;
        let playback_data = Arc::clone(&self.playback_data);

        let mut config = DeviceConfig::new(DeviceType::Playback);
        config.playback_mut().set_format(Format::F32);
        config.playback_mut().set_channels(1);
        config.set_sample_rate(sample_rate);

        config.set_data_callback(move |_device, output, _input| {
            let mut data = lock(&playback_data);
            let frames = output.as_samples_mut::<f32>();

            if data.state != StreamState::Playing {
                frames.fill(0.0);
                return;
            }

            for sample in frames {
                if data.position < data.samples.len() {
                    *sample = data.samples[data.position];
                    data.position += 1;
                } else {
                    data.state = StreamState::Idle;
                    *sample = 0.0;
                }
            }
        });

        let device = Device::new(None, &config)
            .map_err(|e| anyhow::anyhow!("Failed to create audio device: {:?}", e))?;
        device
            .start()
            .map_err(|e| anyhow::anyhow!("Failed to start audio device: {:?}", e))?;

        info!("Audio device opened at {} Hz", sample_rate);
        self.device = Some(device);
        self.device_rate = sample_rate;
        Ok(())
    }
}

impl PlaybackEngine for MiniaudioEngine {
    fn load(&mut self, audio: &AudioData) -> anyhow::Result<()> {
        self.stop();

        {
            let mut data = lock(&self.playback_data);
            data.samples = audio.samples.clone();
            data.sample_rate = audio.sample_rate;
            data.position = 0;
        }

        if self.device.is_none() || self.device_rate != audio.sample_rate {
            self.init_device(audio.sample_rate)?;
        }
        Ok(())
    }

    fn play(&mut self, start_offset_sec: f64) -> anyhow::Result<()> {
        if self.device.is_none() {
            anyhow::bail!("no audio loaded");
        }
        let mut data = lock(&self.playback_data);
        let sample = (start_offset_sec.max(0.0) * data.sample_rate as f64) as usize;
        data.position = sample.min(data.samples.len());
        data.state = StreamState::Playing;
        debug!("Engine play from sample {}", data.position);
        Ok(())
    }

    fn pause(&mut self) {
        let mut data = lock(&self.playback_data);
        if data.state == StreamState::Playing {
            data.state = StreamState::Paused;
        }
    }

    fn unpause(&mut self) {
        let mut data = lock(&self.playback_data);
        if data.state == StreamState::Paused {
            data.state = StreamState::Playing;
        }
    }

    fn stop(&mut self) {
        let mut data = lock(&self.playback_data);
        data.state = StreamState::Idle;
        data.position = 0;
    }

    fn is_busy(&self) -> bool {
        lock(&self.playback_data).state == StreamState::Playing
    }

    fn position_hint(&self) -> Option<f64> {
        let data = lock(&self.playback_data);
        if data.state == StreamState::Idle || data.sample_rate == 0 {
            return None;
        }
        Some(data.position as f64 / data.sample_rate as f64)
    }
}

impl Default for MiniaudioEngine {
    fn default() -> Self {
        Self::new()
    }
}
