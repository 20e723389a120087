use std::fs::File;
use std::path::Path;

use hound::{SampleFormat, WavReader};
use log::{debug, info};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::LoadError;

/// One channel of decoded audio. Multi-channel files keep only their first channel.
#[derive(Debug, Clone)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub duration_seconds: f64,
}

impl AudioData {
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        let duration_seconds = if sample_rate == 0 {
            0.0
        } else {
            samples.len() as f64 / sample_rate as f64
        };
        Self {
            samples,
            sample_rate,
            duration_seconds,
        }
    }

    /// Decode any supported file. WAV goes through hound, everything else
    /// through symphonia format detection.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        info!("Loading audio file: {}", path.display());

        let is_wav = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"));

        let audio = if is_wav {
            Self::from_wav_file(path)?
        } else {
            Self::from_compressed_file(path)?
        };

        if audio.samples.is_empty() {
            return Err(LoadError::Empty(path.to_path_buf()));
        }

        info!(
            "Loaded {} samples @ {} Hz ({:.2}s)",
            audio.samples.len(),
            audio.sample_rate,
            audio.duration_seconds
        );
        Ok(audio)
    }

    pub fn from_wav_file<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let reader = WavReader::open(path).map_err(|e| match e {
            hound::Error::IoError(source) => LoadError::Unreadable {
                path: path.to_path_buf(),
                source,
            },
            other => LoadError::UnsupportedFormat(other.to_string()),
        })?;

        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Float, _) => collect_samples(reader.into_samples::<f32>(), |v| v)?,
            (SampleFormat::Int, 8) => {
                collect_samples(reader.into_samples::<i8>(), |v| v as f32 / 128.0)?
            }
            (SampleFormat::Int, 16) => {
                collect_samples(reader.into_samples::<i16>(), |v| v as f32 / i16::MAX as f32)?
            }
            (SampleFormat::Int, 24) => {
                collect_samples(reader.into_samples::<i32>(), |v| v as f32 / 8388608.0)?
            }
            (SampleFormat::Int, 32) => {
                collect_samples(reader.into_samples::<i32>(), |v| v as f32 / i32::MAX as f32)?
            }
            (SampleFormat::Int, bits) => {
                return Err(LoadError::UnsupportedFormat(format!(
                    "unsupported bit depth: {}",
                    bits
                )));
            }
        };

        let samples = first_channel(interleaved, channels);
        Ok(Self::from_samples(samples, spec.sample_rate))
    }

    fn from_compressed_file(path: &Path) -> Result<Self, LoadError> {
        let file = File::open(path).map_err(|source| LoadError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let detected = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| LoadError::UnsupportedFormat(format!("{}: {}", path.display(), e)))?;
        let mut format = detected.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| LoadError::UnsupportedFormat("no audio track found".into()))?
            .clone();
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| LoadError::Decode("could not determine sample rate".into()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| LoadError::UnsupportedFormat(e.to_string()))?;

        let mut samples = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => return Err(LoadError::Decode(e.to_string())),
            };
            if packet.track_id() != track.id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(msg)) => {
                    debug!("Skipping corrupt packet: {}", msg);
                    continue;
                }
                Err(e) => return Err(LoadError::Decode(e.to_string())),
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count().max(1);
            let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            buf.copy_interleaved_ref(decoded);
            samples.extend(buf.samples().iter().step_by(channels).copied());
        }

        Ok(Self::from_samples(samples, sample_rate))
    }

    #[inline]
    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }
}

fn collect_samples<S, I, F>(samples: I, convert: F) -> Result<Vec<f32>, LoadError>
where
    I: Iterator<Item = hound::Result<S>>,
    F: Fn(S) -> f32,
{
    samples
        .map(|s| s.map(&convert))
        .collect::<Result<Vec<f32>, _>>()
        .map_err(|e| LoadError::Decode(e.to_string()))
}

fn first_channel(interleaved: Vec<f32>, channels: usize) -> Vec<f32> {
    if channels == 1 {
        interleaved
    } else {
        interleaved.into_iter().step_by(channels).collect()
    }
}
