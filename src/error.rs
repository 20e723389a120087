use std::path::PathBuf;

use thiserror::Error;

/// Failures while turning a file into an `AudioData`.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("no audio samples decoded from {0}")]
    Empty(PathBuf),
}

/// Reasons the spectrogram engine refuses to produce a matrix.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("signal is empty")]
    EmptySignal,
    #[error("signal has {samples} samples, shorter than one {window}-sample window")]
    SignalTooShort { samples: usize, window: usize },
    #[error("window size must be at least 2 samples, got {0}")]
    InvalidWindowSize(usize),
    #[error("hop size must be positive")]
    InvalidHopSize,
    #[error("chunk duration must be a positive number of seconds, got {0}")]
    InvalidChunkDuration(f64),
    #[error("sample rate must be positive")]
    InvalidSampleRate,
    #[error("non-finite sample at index {0}")]
    NonFiniteSample(usize),
    #[error("FFT failed: {0}")]
    Fft(String),
}

/// The plot rasterizer was handed something it cannot draw.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RenderError {
    #[error("spectrogram matrix is empty")]
    EmptyMatrix,
    #[error("axis lengths do not match the matrix ({bins} bins x {frames} frames)")]
    AxisMismatch { bins: usize, frames: usize },
    #[error("target image size must be positive")]
    ZeroSize,
}

/// Everything a session command can surface to the user.
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("failed to load audio: {0}")]
    Load(#[from] LoadError),
    #[error("failed to generate spectrogram: {0}")]
    Analysis(#[from] AnalysisError),
    #[error("failed to render spectrogram: {0}")]
    Render(#[from] RenderError),
    #[error("playback error: {0}")]
    Playback(String),
    #[error("load an audio file first")]
    NoFileLoaded,
    #[error("failed to save {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

pub type Result<T> = std::result::Result<T, ViewerError>;
