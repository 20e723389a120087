pub mod analysis_params;
pub mod audio_data;
pub mod spectrogram;
pub mod view_state;

pub use analysis_params::AnalysisParams;
pub use audio_data::AudioData;
pub use spectrogram::{Spectrogram, SpectrogramMatrix};
pub use view_state::ZoomState;
