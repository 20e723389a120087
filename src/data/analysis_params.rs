use std::f32::consts::PI;

use crate::error::AnalysisError;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisParams {
    pub window_size: usize,
    pub hop_size: usize,
    pub chunk_duration_sec: f64,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            window_size: 1024,
            hop_size: 512,
            chunk_duration_sec: 4.0,
        }
    }
}

impl AnalysisParams {
    pub fn new(window_size: usize, hop_size: usize, chunk_duration_sec: f64) -> Self {
        Self {
            window_size,
            hop_size,
            chunk_duration_sec,
        }
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.window_size < 2 {
            return Err(AnalysisError::InvalidWindowSize(self.window_size));
        }
        if self.hop_size == 0 {
            return Err(AnalysisError::InvalidHopSize);
        }
        if !self.chunk_duration_sec.is_finite() || self.chunk_duration_sec <= 0.0 {
            return Err(AnalysisError::InvalidChunkDuration(self.chunk_duration_sec));
        }
        Ok(())
    }

    /// Only the non-negative half of the spectrum is kept.
    pub fn num_frequency_bins(&self) -> usize {
        self.window_size / 2
    }

    /// Chunk length in samples, never less than one.
    pub fn chunk_samples(&self, sample_rate: u32) -> usize {
        ((self.chunk_duration_sec * sample_rate as f64) as usize).max(1)
    }

    pub fn frequency_resolution(&self, sample_rate: u32) -> f32 {
        if self.window_size == 0 {
            return 0.0;
        }
        sample_rate as f32 / self.window_size as f32
    }

    pub fn hop_seconds(&self, sample_rate: u32) -> f64 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.hop_size as f64 / sample_rate as f64
    }

    /// Frames whose window fits entirely inside `total_samples`.
    pub fn num_frames(&self, total_samples: usize) -> usize {
        if self.hop_size == 0 || total_samples < self.window_size {
            return 0;
        }
        (total_samples - self.window_size) / self.hop_size + 1
    }

    /// Symmetric Hann taper.
    pub fn generate_window(&self) -> Vec<f32> {
        let n = self.window_size;
        if n <= 1 {
            return vec![1.0; n];
        }
        (0..n)
            .map(|i| 0.5 * (1.0 - ((2.0 * PI * i as f32) / (n - 1) as f32).cos()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_bad_params() {
        assert_eq!(
            AnalysisParams::new(1, 1, 1.0).validate(),
            Err(AnalysisError::InvalidWindowSize(1))
        );
        assert_eq!(
            AnalysisParams::new(1024, 0, 1.0).validate(),
            Err(AnalysisError::InvalidHopSize)
        );
        assert!(matches!(
            AnalysisParams::new(1024, 512, 0.0).validate(),
            Err(AnalysisError::InvalidChunkDuration(_))
        ));
        assert!(matches!(
            AnalysisParams::new(1024, 512, f64::NAN).validate(),
            Err(AnalysisError::InvalidChunkDuration(_))
        ));
        assert!(AnalysisParams::default().validate().is_ok());
    }

    #[test]
    fn test_hann_window_shape() {
        let window = AnalysisParams::new(9, 1, 1.0).generate_window();
        assert_eq!(window.len(), 9);
        assert!(window[0].abs() < 1e-6);
        assert!(window[8].abs() < 1e-6);
        assert!((window[4] - 1.0).abs() < 1e-6);
        assert!((window[2] - window[6]).abs() < 1e-6);
    }

    #[test]
    fn test_frame_count() {
        let params = AnalysisParams::new(1024, 512, 4.0);
        assert_eq!(params.num_frames(1023), 0);
        assert_eq!(params.num_frames(1024), 1);
        assert_eq!(params.num_frames(1535), 1);
        assert_eq!(params.num_frames(1536), 2);
        assert_eq!(params.num_frequency_bins(), 512);
        assert_eq!(params.chunk_samples(44100), 176400);
    }
}
