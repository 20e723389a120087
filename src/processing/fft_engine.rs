use log::{debug, info};
use rayon::prelude::*;
use realfft::RealFftPlanner;

use crate::data::{AnalysisParams, AudioData, Spectrogram, SpectrogramMatrix};
use crate::error::AnalysisError;

pub struct FftEngine;

impl FftEngine {
    pub fn process(audio: &AudioData, params: &AnalysisParams) -> Result<Spectrogram, AnalysisError> {
        Self::process_samples(&audio.samples, audio.sample_rate, params)
    }

    /// Chunked STFT magnitude spectrogram.
    ///
    /// Frames sit on a single hop grid starting at sample 0. Each chunk of
    /// `chunk_duration_sec` owns the frames that start inside it and may read
    /// up to `window_size - 1` samples past its own end, so inner chunk
    /// boundaries never drop or shift a frame. Frames that would run past the
    /// end of the signal are not emitted: a trailing chunk shorter than one
    /// window contributes nothing and the analyzed range ends slightly before
    /// the audio does.
    ///
    /// Chunks are independent and run in parallel on rayon threads.
    pub fn process_samples(
        samples: &[f32],
        sample_rate: u32,
        params: &AnalysisParams,
    ) -> Result<Spectrogram, AnalysisError> {
        params.validate()?;
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidSampleRate);
        }
        if samples.is_empty() {
            return Err(AnalysisError::EmptySignal);
        }
        let window_len = params.window_size;
        if samples.len() < window_len {
            return Err(AnalysisError::SignalTooShort {
                samples: samples.len(),
                window: window_len,
            });
        }
        if let Some(idx) = samples.iter().position(|s| !s.is_finite()) {
            return Err(AnalysisError::NonFiniteSample(idx));
        }

        let hop = params.hop_size;
        let num_bins = params.num_frequency_bins();
        let chunk_len = params.chunk_samples(sample_rate);
        let num_chunks = samples.len().div_ceil(chunk_len);
        let window = params.generate_window();

        let chunks: Vec<(Vec<f64>, Vec<Vec<f32>>)> = (0..num_chunks)
            .into_par_iter()
            .map(|chunk_idx| -> Result<(Vec<f64>, Vec<Vec<f32>>), AnalysisError> {
                let chunk_start = chunk_idx * chunk_len;
                let chunk_end = (chunk_start + chunk_len).min(samples.len());
                let chunk_offset_sec = chunk_start as f64 / sample_rate as f64;

                let mut planner = RealFftPlanner::<f32>::new();
                let fft = planner.plan_fft_forward(window_len);
                let mut indata = fft.make_input_vec();
                let mut spectrum = fft.make_output_vec();
                let mut scratch = fft.make_scratch_vec();

                let mut times: Vec<f64> = Vec::new();
                let mut columns: Vec<Vec<f32>> = Vec::new();

                // First grid frame at or after the chunk start
                let mut frame_start = chunk_start.div_ceil(hop) * hop;
                while frame_start < chunk_end && frame_start + window_len <= samples.len() {
                    let segment = &samples[frame_start..frame_start + window_len];
                    for ((dst, &s), &w) in indata.iter_mut().zip(segment).zip(&window) {
                        *dst = s * w;
                    }

                    fft.process_with_scratch(&mut indata, &mut spectrum, &mut scratch)
                        .map_err(|e| AnalysisError::Fft(e.to_string()))?;

                    columns.push(spectrum[..num_bins].iter().map(|c| c.norm()).collect());
                    times.push(
                        chunk_offset_sec + (frame_start - chunk_start) as f64 / sample_rate as f64,
                    );
                    frame_start += hop;
                }

                debug!(
                    "Chunk {}: samples {}..{}, {} frames",
                    chunk_idx,
                    chunk_start,
                    chunk_end,
                    columns.len()
                );
                Ok((times, columns))
            })
            .collect::<Result<_, AnalysisError>>()?;

        let total_frames: usize = chunks.iter().map(|(t, _)| t.len()).sum();
        let mut times = Vec::with_capacity(total_frames);
        let mut columns = Vec::with_capacity(total_frames);
        for (chunk_times, chunk_columns) in chunks {
            times.extend(chunk_times);
            columns.extend(chunk_columns);
        }

        let freq_resolution = params.frequency_resolution(sample_rate);
        let frequencies: Vec<f32> = (0..num_bins).map(|k| k as f32 * freq_resolution).collect();

        let matrix = SpectrogramMatrix::from_columns(num_bins, &columns);
        info!(
            "Spectrogram: {} bins x {} frames over {} chunks, max time {:.3}s",
            num_bins,
            matrix.num_frames(),
            num_chunks,
            times.last().copied().unwrap_or(0.0)
        );

        Ok(Spectrogram {
            matrix,
            times,
            frequencies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::f32::consts::PI;

    fn sine(freq: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * seconds) as usize;
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_ten_second_scenario() {
        let samples = sine(1000.0, 44100, 10.0);
        let params = AnalysisParams::new(1024, 512, 4.0);
        let spec = FftEngine::process_samples(&samples, 44100, &params).unwrap();

        assert_eq!(spec.num_bins(), 512);
        assert_eq!(spec.frequencies.len(), 512);
        assert!(spec.num_frames() >= 800);
        assert_eq!(spec.times.len(), spec.num_frames());
        assert!(spec.max_time() < 10.0);
        assert!(spec.max_time() > 9.9);
    }

    #[test]
    fn test_time_axis_continuous_across_chunks() {
        let sample_rate = 8000;
        let samples = sine(440.0, sample_rate, 3.3);
        // Chunk length deliberately not a multiple of the hop
        let params = AnalysisParams::new(256, 96, 0.77);
        let spec = FftEngine::process_samples(&samples, sample_rate, &params).unwrap();

        let max_step = params.hop_seconds(sample_rate) * 1.0001;
        for pair in spec.times.windows(2) {
            assert!(pair[1] > pair[0]);
            assert!(pair[1] - pair[0] <= max_step, "gap {}", pair[1] - pair[0]);
        }
        assert_eq!(spec.num_frames(), params.num_frames(samples.len()));
    }

    #[test]
    fn test_frequency_axis_below_nyquist() {
        let samples = sine(440.0, 48000, 0.5);
        let spec =
            FftEngine::process_samples(&samples, 48000, &AnalysisParams::new(2048, 512, 4.0)).unwrap();
        assert_eq!(spec.frequencies[0], 0.0);
        assert!(spec.frequencies.windows(2).all(|p| p[1] > p[0]));
        assert!(spec.max_freq() < 24000.0);
        assert!((spec.frequencies[1] - 48000.0 / 2048.0).abs() < 1e-3);
    }

    #[test]
    fn test_peak_bin_matches_tone() {
        let sample_rate = 8000;
        let samples = sine(1000.0, sample_rate, 1.0);
        let params = AnalysisParams::new(512, 256, 4.0);
        let spec = FftEngine::process_samples(&samples, sample_rate, &params).unwrap();

        let frame = spec.num_frames() / 2;
        let peak_bin = (0..spec.num_bins())
            .max_by(|&a, &b| {
                spec.matrix.get(a, frame).unwrap().total_cmp(&spec.matrix.get(b, frame).unwrap())
            })
            .unwrap();
        // 1000 Hz / (8000 / 512) = bin 64
        assert_eq!(peak_bin, 64);
    }

    #[test]
    fn test_exactly_one_window_gives_one_frame() {
        let samples = vec![0.25f32; 1024];
        let spec =
            FftEngine::process_samples(&samples, 44100, &AnalysisParams::default()).unwrap();
        assert_eq!(spec.num_frames(), 1);
        assert_eq!(spec.times, vec![0.0]);
    }

    #[test]
    fn test_failures_return_no_matrix() {
        let params = AnalysisParams::default();
        assert_eq!(
            FftEngine::process_samples(&[], 44100, &params),
            Err(AnalysisError::EmptySignal)
        );
        assert_eq!(
            FftEngine::process_samples(&[0.0; 1023], 44100, &params),
            Err(AnalysisError::SignalTooShort {
                samples: 1023,
                window: 1024
            })
        );
        assert_eq!(
            FftEngine::process_samples(&[0.0; 4096], 44100, &AnalysisParams::new(1024, 0, 4.0)),
            Err(AnalysisError::InvalidHopSize)
        );
        assert_eq!(
            FftEngine::process_samples(&[0.0; 4096], 0, &params),
            Err(AnalysisError::InvalidSampleRate)
        );
        let mut with_nan = vec![0.0f32; 4096];
        with_nan[3000] = f32::NAN;
        assert_eq!(
            FftEngine::process_samples(&with_nan, 44100, &params),
            Err(AnalysisError::NonFiniteSample(3000))
        );
    }

    #[test]
    fn test_repeat_analysis_is_identical() {
        let mut rng = rand::rng();
        let samples: Vec<f32> = (0..50_000).map(|_| rng.random_range(-1.0..1.0)).collect();
        let params = AnalysisParams::new(1024, 512, 0.5);

        let a = FftEngine::process_samples(&samples, 22050, &params).unwrap();
        let b = FftEngine::process_samples(&samples, 22050, &params).unwrap();
        assert_eq!(a.times, b.times);
        assert_eq!(a.frequencies, b.frequencies);
        for (x, y) in a.matrix.values().iter().zip(b.matrix.values()) {
            assert!((x - y).abs() <= 1e-6 * x.abs().max(1.0));
        }
        assert!(a.matrix.values().iter().all(|m| m.is_finite() && *m >= 0.0));
    }

    #[test]
    fn test_short_trailing_chunk_is_dropped() {
        // 2 full 1000-sample chunks plus a 100-sample tail shorter than the window
        let samples = vec![0.1f32; 2100];
        let params = AnalysisParams::new(256, 128, 1.0);
        let spec = FftEngine::process_samples(&samples, 1000, &params).unwrap();
        let last_start = spec.max_time() * 1000.0;
        assert!(last_start + 256.0 <= 2100.0);
        assert!(last_start < 2000.0);
    }
}
