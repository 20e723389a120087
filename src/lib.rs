//! Chunked STFT spectrogram viewer core: analysis, plot rasterizing, pixel
//! mapping, zoom/autoscroll and a wall-clock playback marker.

pub mod data;
pub mod error;
pub mod playback;
pub mod processing;
pub mod rendering;
pub mod session;
pub mod settings;

pub use error::{Result, ViewerError};
pub use session::{format_time, FrameUpdate, Session, SLIDER_MAX};
pub use settings::Settings;
