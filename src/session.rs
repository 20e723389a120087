use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use image::RgbaImage;
use log::{error, info};

use crate::data::{AudioData, Spectrogram};
use crate::error::{Result, ViewerError};
use crate::playback::{PlaybackEngine, PlaybackSync, TickOutcome, TransportState};
use crate::processing::FftEngine;
use crate::rendering::{annotate, render_spectrogram, DataAreaMapping, MarkerStyle, ViewportController};
use crate::settings::Settings;

/// Position slider resolution.
pub const SLIDER_MAX: u32 = 1000;

const LOG_EVERY_TICKS: u64 = 20;

/// `MM:SS`, minutes not wrapped at the hour.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() { seconds.max(0.0) as u64 } else { 0 };
    format!("{:02}:{:02}", total / 60, total % 60)
}

pub fn slider_to_fraction(value: u32) -> f64 {
    value.min(SLIDER_MAX) as f64 / SLIDER_MAX as f64
}

pub fn fraction_to_slider(fraction: f64) -> u32 {
    if !fraction.is_finite() {
        return 0;
    }
    (fraction.clamp(0.0, 1.0) * SLIDER_MAX as f64).round() as u32
}

/// Everything produced by one successful load.
pub struct LoadedTrack {
    pub path: PathBuf,
    pub audio: AudioData,
    pub spectrogram: Spectrogram,
    pub base_image: RgbaImage,
    pub mapping: DataAreaMapping,
    audio_available: bool,
}

impl LoadedTrack {
    pub fn audio_available(&self) -> bool {
        self.audio_available
    }
}

/// What the host should show after a tick.
#[derive(Debug, Clone)]
pub struct FrameUpdate {
    pub position: f64,
    pub marker_x: u32,
    pub scroll_x: u32,
    pub slider_value: u32,
    pub time_label: String,
    /// Scaled image, annotated with the marker unless playback is stopped.
    pub image: RgbaImage,
    /// Set on the tick that reached the end of the track.
    pub ended: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavedImage {
    pub path: PathBuf,
    pub bytes: u64,
}

/// A viewer session: one loaded file, its spectrogram, zoom and playback.
///
/// Every user action is a method here. The host drives `tick` from a timer
/// and draws whatever comes back.
pub struct Session<E: PlaybackEngine> {
    settings: Settings,
    engine: E,
    track: Option<LoadedTrack>,
    viewport: ViewportController,
    sync: PlaybackSync,
    scaled_cache: Option<RgbaImage>,
    marker_style: MarkerStyle,
    tick_count: u64,
}

impl<E: PlaybackEngine> Session<E> {
    pub fn new(settings: Settings, engine: E) -> Self {
        let viewport = ViewportController::new(settings.zoom_state());
        let sync = PlaybackSync::with_smoothing(0.0, settings.playback.smoothing_window);
        Self {
            settings,
            engine,
            track: None,
            viewport,
            sync,
            scaled_cache: None,
            marker_style: MarkerStyle::default(),
            tick_count: 0,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn track(&self) -> Option<&LoadedTrack> {
        self.track.as_ref()
    }

    pub fn state(&self) -> TransportState {
        self.sync.state()
    }

    pub fn position(&self) -> f64 {
        self.sync.position()
    }

    pub fn total_duration(&self) -> f64 {
        self.sync.total_duration()
    }

    pub fn zoom_factor(&self) -> f64 {
        self.viewport.zoom_factor()
    }

    // ─── Load ───

    /// Decode, analyze and render `path`, then make it the current track.
    ///
    /// Nothing is replaced until all three steps succeed. If only the audio
    /// engine fails, the new spectrogram stays on screen without playback and
    /// the failure is returned.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!("Loading {}", path.display());

        let audio = AudioData::from_file(path)?;
        let spectrogram = FftEngine::process(&audio, &self.settings.analysis_params())?;
        let target_width = self.settings.base_image_width(spectrogram.max_time());
        let plot = render_spectrogram(&spectrogram, target_width, &self.settings.plot_style())?;

        self.engine.stop();
        let max_time = spectrogram.max_time();
        let mapping = DataAreaMapping::from_axis_box(&plot.axis_box, max_time);

        self.viewport = ViewportController::new(self.settings.zoom_state());
        self.viewport
            .set_base_size(plot.image.width(), plot.image.height());
        self.sync = PlaybackSync::with_smoothing(max_time, self.settings.playback.smoothing_window);
        self.scaled_cache = None;
        self.tick_count = 0;

        info!(
            "Spectrogram image {}x{}, {} frames, {:.2}s",
            plot.image.width(),
            plot.image.height(),
            spectrogram.num_frames(),
            max_time
        );

        let engine_result = self.engine.load(&audio);
        self.track = Some(LoadedTrack {
            path: path.to_path_buf(),
            audio,
            spectrogram,
            base_image: plot.image,
            mapping,
            audio_available: engine_result.is_ok(),
        });

        engine_result.map_err(|e| {
            error!("Audio output unavailable for {}: {:#}", path.display(), e);
            ViewerError::Playback(format!("{:#}", e))
        })
    }

    // ─── Transport ───

    /// Play, pause or resume depending on the current state.
    pub fn toggle_playback(&mut self, now: Instant) -> Result<TransportState> {
        self.require_audio()?;
        match self.sync.state() {
            TransportState::Playing => {
                self.engine.pause();
                self.sync.pause();
            }
            TransportState::Paused => {
                self.engine.unpause();
                self.sync.resume(now);
            }
            TransportState::Stopped => {
                if let Err(e) = self.engine.play(self.sync.position()) {
                    return Err(self.playback_failure(e));
                }
                self.sync.start(now);
            }
        }
        Ok(self.sync.state())
    }

    pub fn stop(&mut self) -> Result<()> {
        if self.track.is_none() {
            return Err(ViewerError::NoFileLoaded);
        }
        self.engine.stop();
        self.sync.stop();
        self.tick_count = 0;
        info!("Playback stopped");
        Ok(())
    }

    /// Restart output at `fraction` of the track. Keeps playing if it was,
    /// otherwise stays paused at the new position.
    pub fn seek(&mut self, fraction: f64, now: Instant) -> Result<()> {
        self.require_audio()?;
        let was_playing = self.sync.is_playing();
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        let offset = fraction * self.sync.total_duration();

        self.engine.stop();
        if let Err(e) = self.engine.play(offset) {
            return Err(self.playback_failure(e));
        }
        if !was_playing {
            self.engine.pause();
        }
        self.sync.seek(fraction, now);
        Ok(())
    }

    pub fn seek_slider(&mut self, value: u32, now: Instant) -> Result<()> {
        self.seek(slider_to_fraction(value), now)
    }

    // ─── Zoom ───

    pub fn zoom_in(&mut self) -> bool {
        let changed = self.viewport.zoom_in();
        if changed {
            self.scaled_cache = None;
        }
        changed
    }

    pub fn zoom_out(&mut self) -> bool {
        let changed = self.viewport.zoom_out();
        if changed {
            self.scaled_cache = None;
        }
        changed
    }

    // ─── Display ───

    /// One timer update. `None` when nothing needs redrawing.
    pub fn tick(&mut self, now: Instant, viewport_width: u32) -> Option<FrameUpdate> {
        self.track.as_ref()?;
        match self.sync.tick(now, self.engine.is_busy()) {
            TickOutcome::Idle => None,
            TickOutcome::EndOfTrack => {
                self.engine.stop();
                self.tick_count = 0;
                self.frame(viewport_width, true)
            }
            TickOutcome::Advanced(_) => {
                self.tick_count += 1;
                let frame = self.frame(viewport_width, false)?;
                if self.tick_count % LOG_EVERY_TICKS == 0 {
                    info!(
                        "pos={:.2}s marker_x={} scroll_x={} zoom={:.2}",
                        frame.position,
                        frame.marker_x,
                        frame.scroll_x,
                        self.viewport.zoom_factor()
                    );
                }
                Some(frame)
            }
        }
    }

    /// The frame for the current position without advancing playback.
    pub fn current_frame(&mut self, viewport_width: u32) -> Option<FrameUpdate> {
        self.frame(viewport_width, false)
    }

    /// Scaled image without the marker.
    pub fn display_image(&mut self) -> Option<&RgbaImage> {
        let track = self.track.as_ref()?;
        let viewport = &self.viewport;
        Some(
            self.scaled_cache
                .get_or_insert_with(|| viewport.scale_image(&track.base_image)),
        )
    }

    fn frame(&mut self, viewport_width: u32, ended: bool) -> Option<FrameUpdate> {
        let track = self.track.as_ref()?;
        let viewport = &self.viewport;
        let scaled = self
            .scaled_cache
            .get_or_insert_with(|| viewport.scale_image(&track.base_image));

        let position = self.sync.position();
        let total = self.sync.total_duration();
        let marker_x = viewport.marker_column(&track.mapping, position)?;
        let scroll_x = viewport.scroll_offset(marker_x, viewport_width);
        let image = if self.sync.state() == TransportState::Stopped {
            scaled.clone()
        } else {
            annotate(scaled, marker_x, &self.marker_style)
        };
        let fraction = if total > 0.0 { position / total } else { 0.0 };

        Some(FrameUpdate {
            position,
            marker_x,
            scroll_x,
            slider_value: fraction_to_slider(fraction),
            time_label: format!("{} / {}", format_time(position), format_time(total)),
            image,
            ended,
        })
    }

    // ─── Save ───

    /// Write the unzoomed spectrogram next to the audio file as
    /// `<stem>_fft_spectrogram.png`.
    pub fn save_spectrogram(&self) -> Result<SavedImage> {
        let track = self.track.as_ref().ok_or(ViewerError::NoFileLoaded)?;
        let stem = track
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        let path = track
            .path
            .with_file_name(format!("{}_fft_spectrogram.png", stem));

        track
            .base_image
            .save(&path)
            .map_err(|source| ViewerError::Save {
                path: path.clone(),
                source,
            })?;
        let bytes = fs::metadata(&path)
            .map_err(|e| ViewerError::Save {
                path: path.clone(),
                source: image::ImageError::IoError(e),
            })?
            .len();

        info!(
            "Saved spectrogram to {} ({:.2} MB)",
            path.display(),
            bytes as f64 / (1024.0 * 1024.0)
        );
        Ok(SavedImage { path, bytes })
    }

    fn require_audio(&self) -> Result<()> {
        match &self.track {
            None => Err(ViewerError::NoFileLoaded),
            Some(track) if !track.audio_available => Err(ViewerError::Playback(
                "no audio output for this file".to_string(),
            )),
            Some(_) => Ok(()),
        }
    }

    fn playback_failure(&mut self, e: anyhow::Error) -> ViewerError {
        error!("Playback failed: {:#}", e);
        self.engine.stop();
        self.sync.stop();
        self.tick_count = 0;
        ViewerError::Playback(format!("{:#}", e))
    }
}

impl<E: PlaybackEngine> Drop for Session<E> {
    fn drop(&mut self) {
        self.engine.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeEngine {
        calls: Vec<String>,
        busy: bool,
        fail_load: bool,
        fail_play: bool,
    }

    impl PlaybackEngine for FakeEngine {
        fn load(&mut self, audio: &AudioData) -> anyhow::Result<()> {
            self.calls.push(format!("load {} samples", audio.num_samples()));
            if self.fail_load {
                anyhow::bail!("no output device");
            }
            Ok(())
        }

        fn play(&mut self, start_offset_sec: f64) -> anyhow::Result<()> {
            self.calls.push(format!("play {:.2}", start_offset_sec));
            if self.fail_play {
                anyhow::bail!("device lost");
            }
            self.busy = true;
            Ok(())
        }

        fn pause(&mut self) {
            self.calls.push("pause".into());
            self.busy = false;
        }

        fn unpause(&mut self) {
            self.calls.push("unpause".into());
            self.busy = true;
        }

        fn stop(&mut self) {
            self.calls.push("stop".into());
            self.busy = false;
        }

        fn is_busy(&self) -> bool {
            self.busy
        }

        fn position_hint(&self) -> Option<f64> {
            None
        }
    }

    fn write_sine(path: &Path, seconds: f32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let n = (8000.0 * seconds) as usize;
        for i in 0..n {
            let s = (2.0 * PI * 440.0 * i as f32 / 8000.0).sin() * 0.5;
            writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn loaded_session(dir: &Path, name: &str) -> Session<FakeEngine> {
        let path = dir.join(name);
        write_sine(&path, 10.0);
        let mut session = Session::new(Settings::default(), FakeEngine::default());
        session.load(&path).unwrap();
        session
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "00:00");
        assert_eq!(format_time(65.9), "01:05");
        assert_eq!(format_time(3600.0), "60:00");
        assert_eq!(format_time(-3.0), "00:00");
    }

    #[test]
    fn test_slider_conversion() {
        assert_eq!(slider_to_fraction(500), 0.5);
        assert_eq!(slider_to_fraction(5000), 1.0);
        assert_eq!(fraction_to_slider(0.25), 250);
        assert_eq!(fraction_to_slider(f64::NAN), 0);
    }

    #[test]
    fn test_commands_without_file() {
        let mut session = Session::new(Settings::default(), FakeEngine::default());
        let now = Instant::now();
        assert!(matches!(session.toggle_playback(now), Err(ViewerError::NoFileLoaded)));
        assert!(matches!(session.seek(0.5, now), Err(ViewerError::NoFileLoaded)));
        assert!(matches!(session.stop(), Err(ViewerError::NoFileLoaded)));
        assert!(matches!(session.save_spectrogram(), Err(ViewerError::NoFileLoaded)));
        assert!(!session.zoom_in());
        assert!(session.tick(now, 800).is_none());
        assert!(session.display_image().is_none());
    }

    #[test]
    fn test_load_builds_track() {
        let dir = tempfile::tempdir().unwrap();
        let session = loaded_session(dir.path(), "tone.wav");
        let track = session.track().unwrap();

        assert!(track.audio_available());
        assert_eq!(track.spectrogram.num_bins(), 512);
        assert_eq!(track.base_image.dimensions(), (1200, 600));
        assert_eq!(session.total_duration(), track.spectrogram.max_time());
        assert_eq!(session.state(), TransportState::Stopped);
        // Engine gets the samples decoded for analysis, not a second decode
        let expected = format!("load {} samples", track.audio.num_samples());
        assert_eq!(track.audio.num_samples(), 80_000);
        assert_eq!(session.engine().calls, vec!["stop".to_string(), expected]);
    }

    #[test]
    fn test_failed_load_keeps_previous_track() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = loaded_session(dir.path(), "tone.wav");
        let before = session.track().unwrap().mapping;

        let bogus = dir.path().join("missing.wav");
        assert!(matches!(session.load(&bogus), Err(ViewerError::Load(_))));

        let short = dir.path().join("short.wav");
        write_sine(&short, 0.05);
        assert!(matches!(session.load(&short), Err(ViewerError::Analysis(_))));

        let track = session.track().unwrap();
        assert_eq!(track.path, dir.path().join("tone.wav"));
        assert_eq!(track.mapping, before);
    }

    #[test]
    fn test_engine_load_failure_keeps_spectrogram() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_sine(&path, 10.0);
        let engine = FakeEngine {
            fail_load: true,
            ..FakeEngine::default()
        };
        let mut session = Session::new(Settings::default(), engine);

        assert!(matches!(session.load(&path), Err(ViewerError::Playback(_))));
        assert!(session.track().is_some());
        assert!(!session.track().unwrap().audio_available());
        assert!(matches!(
            session.toggle_playback(Instant::now()),
            Err(ViewerError::Playback(_))
        ));
        assert!(session.display_image().is_some());
    }

    #[test]
    fn test_play_pause_resume() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = loaded_session(dir.path(), "tone.wav");
        let t0 = Instant::now();

        assert_eq!(session.toggle_playback(t0).unwrap(), TransportState::Playing);
        assert_eq!(session.engine().calls.last().unwrap(), "play 0.00");

        let frame = session.tick(t0 + ms(50), 800).unwrap();
        assert!((frame.position - 0.05).abs() < 1e-9);
        assert!(!frame.ended);

        assert_eq!(session.toggle_playback(t0 + ms(60)).unwrap(), TransportState::Paused);
        assert!(session.tick(t0 + ms(100), 800).is_none());

        assert_eq!(session.toggle_playback(t0 + ms(200)).unwrap(), TransportState::Playing);
        assert_eq!(session.engine().calls.last().unwrap(), "unpause");
    }

    #[test]
    fn test_stop_after_playing_resets() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = loaded_session(dir.path(), "tone.wav");
        let t0 = Instant::now();
        session.toggle_playback(t0).unwrap();
        let frame = session.tick(t0 + ms(500), 800).unwrap();
        assert!(frame.position > 0.0);

        session.stop().unwrap();
        assert_eq!(session.state(), TransportState::Stopped);
        assert_eq!(session.position(), 0.0);
        assert_eq!(session.engine().calls.last().unwrap(), "stop");
        assert!(session.tick(t0 + ms(600), 800).is_none());

        let frame = session.current_frame(800).unwrap();
        assert_eq!(frame.position, 0.0);
        assert_eq!(frame.slider_value, 0);
        assert_eq!(frame.scroll_x, 0);
        assert_eq!(&frame.image, session.display_image().unwrap());
    }

    #[test]
    fn test_seek_half_puts_marker_mid_data_area() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = loaded_session(dir.path(), "tone.wav");
        let t0 = Instant::now();
        session.toggle_playback(t0).unwrap();
        session.tick(t0 + ms(50), 800);

        session.seek(0.5, t0 + ms(100)).unwrap();
        assert_eq!(session.state(), TransportState::Playing);
        let half = session.total_duration() / 2.0;
        assert_eq!(session.position(), half);

        let frame = session.current_frame(800).unwrap();
        let track = session.track().unwrap();
        let (left, right) = track.mapping.data_columns(1200);
        let mid = (left + right) / 2;
        assert!(frame.marker_x.abs_diff(mid) <= 1);
        assert_eq!(frame.slider_value, 500);
        assert_eq!(frame.scroll_x, frame.marker_x - 400);
    }

    #[test]
    fn test_seek_while_stopped_stays_paused() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = loaded_session(dir.path(), "tone.wav");
        session.seek_slider(250, Instant::now()).unwrap();

        assert_eq!(session.state(), TransportState::Paused);
        let calls = &session.engine().calls;
        assert_eq!(calls[calls.len() - 1], "pause");
        assert!(calls[calls.len() - 2].starts_with("play "));
    }

    #[test]
    fn test_play_failure_forces_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = loaded_session(dir.path(), "tone.wav");
        session.engine_mut().fail_play = true;

        let err = session.seek(0.5, Instant::now()).unwrap_err();
        assert!(matches!(err, ViewerError::Playback(_)));
        assert_eq!(session.state(), TransportState::Stopped);
        assert_eq!(session.position(), 0.0);
    }

    #[test]
    fn test_end_of_track_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = loaded_session(dir.path(), "tone.wav");
        let t0 = Instant::now();
        session.toggle_playback(t0).unwrap();

        let frame = session.tick(t0 + Duration::from_secs(11), 800).unwrap();
        assert!(frame.ended);
        assert_eq!(frame.position, 0.0);
        assert_eq!(frame.slider_value, 0);
        assert_eq!(session.state(), TransportState::Stopped);
        assert_eq!(&frame.image, session.display_image().unwrap());
    }

    #[test]
    fn test_zoom_rescales_and_moves_marker() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = loaded_session(dir.path(), "tone.wav");
        session.seek(0.5, Instant::now()).unwrap();
        let before = session.current_frame(800).unwrap();

        assert!(session.zoom_in());
        let after = session.current_frame(800).unwrap();
        assert_eq!(after.image.dimensions(), (1440, 720));
        assert!(after.marker_x > before.marker_x);
        // Base image keeps its size
        assert_eq!(session.track().unwrap().base_image.dimensions(), (1200, 600));
    }

    #[test]
    fn test_marker_drawn_on_copy_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = loaded_session(dir.path(), "tone.wav");
        session.seek(0.5, Instant::now()).unwrap();
        let frame = session.current_frame(800).unwrap();
        let clean = session.display_image().unwrap().clone();

        assert_ne!(frame.image, clean);
        assert_eq!(
            *frame.image.get_pixel(frame.marker_x, 0),
            MarkerStyle::default().color
        );
        assert_eq!(&clean, &session.track().unwrap().base_image);
    }

    #[test]
    fn test_save_spectrogram_png() {
        let dir = tempfile::tempdir().unwrap();
        let session = loaded_session(dir.path(), "tone.wav");
        let saved = session.save_spectrogram().unwrap();

        assert_eq!(saved.path, dir.path().join("tone_fft_spectrogram.png"));
        assert!(saved.bytes > 0);
        let decoded = image::open(&saved.path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1200, 600));
    }
}
