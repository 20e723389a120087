/// Magnitudes laid out `[bin][frame]` in one flat buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpectrogramMatrix {
    num_bins: usize,
    num_frames: usize,
    data: Vec<f32>,
}

impl SpectrogramMatrix {
    /// Transpose frame columns (each `num_bins` long) into bin-major rows.
    pub fn from_columns(num_bins: usize, columns: &[Vec<f32>]) -> Self {
        let num_frames = columns.len();
        let mut data = vec![0.0f32; num_bins * num_frames];
        for (frame, column) in columns.iter().enumerate() {
            for (bin, &mag) in column.iter().take(num_bins).enumerate() {
                data[bin * num_frames + frame] = mag;
            }
        }
        Self {
            num_bins,
            num_frames,
            data,
        }
    }

    #[inline]
    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    #[inline]
    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    #[inline]
    pub fn get(&self, bin: usize, frame: usize) -> Option<f32> {
        if bin >= self.num_bins || frame >= self.num_frames {
            return None;
        }
        Some(self.data[bin * self.num_frames + frame])
    }

    pub fn values(&self) -> &[f32] {
        &self.data
    }
}

/// STFT result: magnitudes plus the time and frequency axes that label them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spectrogram {
    pub matrix: SpectrogramMatrix,
    /// Start time (seconds) of every frame.
    pub times: Vec<f64>,
    /// Center frequency (Hz) of every bin.
    pub frequencies: Vec<f32>,
}

impl Spectrogram {
    #[inline]
    pub fn num_frames(&self) -> usize {
        self.matrix.num_frames()
    }

    #[inline]
    pub fn num_bins(&self) -> usize {
        self.matrix.num_bins()
    }

    /// Last analyzed frame time. This is the right edge of the plotted data and
    /// can fall short of the audio's nominal duration.
    pub fn max_time(&self) -> f64 {
        self.times.last().copied().unwrap_or(0.0)
    }

    pub fn max_freq(&self) -> f32 {
        self.frequencies.last().copied().unwrap_or(0.0)
    }

    #[inline]
    pub fn magnitude_to_db(magnitude: f32) -> f32 {
        20.0 * (magnitude + 1e-6).log10()
    }
}
