use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::{info, warn};

pub const DEFAULT_SMOOTHING_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Playing,
    Paused,
}

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Not playing; nothing changed.
    Idle,
    /// Position advanced to the smoothed value.
    Advanced(f64),
    /// Reached the end of the track and stopped.
    EndOfTrack,
}

/// Derives the playback position from wall-clock time since the current run
/// started, smoothed over the last few ticks.
///
/// Every transition takes `now` explicitly; nothing here reads the clock.
#[derive(Debug, Clone)]
pub struct PlaybackSync {
    state: TransportState,
    position: f64,
    total_duration: f64,
    start_wall_clock: Option<Instant>,
    smoothing: VecDeque<f64>,
    smoothing_window: usize,
}

impl PlaybackSync {
    pub fn new(total_duration: f64) -> Self {
        Self::with_smoothing(total_duration, DEFAULT_SMOOTHING_WINDOW)
    }

    pub fn with_smoothing(total_duration: f64, smoothing_window: usize) -> Self {
        let smoothing_window = smoothing_window.max(1);
        Self {
            state: TransportState::Stopped,
            position: 0.0,
            total_duration: total_duration.max(0.0),
            start_wall_clock: None,
            smoothing: VecDeque::with_capacity(smoothing_window),
            smoothing_window,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn smoothing_buffer(&self) -> impl Iterator<Item = f64> + '_ {
        self.smoothing.iter().copied()
    }

    /// Stopped → Playing from the current position.
    pub fn start(&mut self, now: Instant) {
        self.smoothing.clear();
        self.start_wall_clock = Some(rewind(now, self.position));
        self.state = TransportState::Playing;
        info!("Playback started at {:.2}s", self.position);
    }

    /// Paused → Playing without a jump in the elapsed-time formula.
    pub fn resume(&mut self, now: Instant) {
        self.start_wall_clock = Some(rewind(now, self.position));
        self.state = TransportState::Playing;
        info!("Playback resumed at {:.2}s", self.position);
    }

    /// Playing → Paused; position freezes at its last value.
    pub fn pause(&mut self) {
        if self.state == TransportState::Playing {
            self.state = TransportState::Paused;
            info!("Playback paused at {:.2}s", self.position);
        }
    }

    /// Any → Stopped. The smoothing window is discarded, not drained.
    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
        self.position = 0.0;
        self.start_wall_clock = None;
        self.smoothing.clear();
    }

    /// Jump to `fraction` of the track. Playing keeps playing from there,
    /// anything else ends up paused at the new position.
    pub fn seek(&mut self, fraction: f64, now: Instant) {
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        self.position = fraction * self.total_duration;
        self.smoothing.clear();
        self.smoothing.push_back(self.position);
        self.start_wall_clock = Some(rewind(now, self.position));
        if self.state != TransportState::Playing {
            self.state = TransportState::Paused;
        }
        info!("Seek to {:.2}s ({:.1}%)", self.position, fraction * 100.0);
    }

    /// One timer update. `engine_busy` is the audio engine's own view of
    /// whether it is still producing sound.
    pub fn tick(&mut self, now: Instant, engine_busy: bool) -> TickOutcome {
        if self.state != TransportState::Playing {
            return TickOutcome::Idle;
        }
        let Some(start) = self.start_wall_clock else {
            return TickOutcome::Idle;
        };

        let raw = now.saturating_duration_since(start).as_secs_f64();
        if raw >= self.total_duration || !engine_busy {
            if engine_busy {
                info!("Reached end of track at {:.2}s", self.total_duration);
            } else {
                warn!("Audio engine finished playback");
            }
            self.stop();
            return TickOutcome::EndOfTrack;
        }

        if self.smoothing.len() == self.smoothing_window {
            self.smoothing.pop_front();
        }
        self.smoothing.push_back(raw);
        self.position = self.smoothing.iter().sum::<f64>() / self.smoothing.len() as f64;
        TickOutcome::Advanced(self.position)
    }
}

/// `now - seconds`, saturating at `now` if the platform clock cannot go back
/// that far.
fn rewind(now: Instant, seconds: f64) -> Instant {
    let offset = Duration::from_secs_f64(seconds.max(0.0));
    now.checked_sub(offset).unwrap_or(now)
}
