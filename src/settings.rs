use std::fs;
use std::path::Path;

use anyhow::Context;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::data::view_state::{bounds_valid, step_valid};
use crate::data::{AnalysisParams, ZoomState};
use crate::rendering::{Colormap, PlotStyle};

/// Viewer settings, loaded from a TOML file or defaults.
/// Missing sections and fields fall back to their defaults individually.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub analysis: AnalysisSettings,
    pub display: DisplaySettings,
    pub zoom: ZoomSettings,
    pub playback: PlaybackSettings,
}

// ─── Analysis ───

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub window_size: usize,
    pub hop_size: usize,
    pub chunk_duration_sec: f64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        let params = AnalysisParams::default();
        Self {
            window_size: params.window_size,
            hop_size: params.hop_size,
            chunk_duration_sec: params.chunk_duration_sec,
        }
    }
}

// ─── Display ───

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub image_height: u32,
    pub min_image_width: u32,
    pub pixels_per_ten_seconds: u32,
    pub colormap: Colormap,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            image_height: 600,
            min_image_width: 800,
            pixels_per_ten_seconds: 500,
            colormap: Colormap::Magma,
        }
    }
}

// ─── Zoom ───

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomSettings {
    pub step: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for ZoomSettings {
    fn default() -> Self {
        Self {
            step: 1.2,
            min: 0.5,
            max: 5.0,
        }
    }
}

// ─── Playback ───

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    pub tick_interval_ms: u64,
    pub smoothing_window: usize,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            smoothing_window: 5,
        }
    }
}

impl Settings {
    pub const FILE_NAME: &'static str = "specview.toml";

    /// Missing file gives defaults silently; an unreadable or malformed one
    /// gives defaults with a warning.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(settings) => {
                info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                warn!("Ignoring settings file: {:#}", e);
                Self::default()
            }
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        settings
            .validate()
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        Ok(settings)
    }

    /// Values serde accepts but the viewer cannot use.
    pub fn validate(&self) -> anyhow::Result<()> {
        let zoom = &self.zoom;
        if !bounds_valid(zoom.min, zoom.max) {
            anyhow::bail!(
                "[zoom] needs finite 0 < min <= max, got min={} max={}",
                zoom.min,
                zoom.max
            );
        }
        if !step_valid(zoom.step) {
            anyhow::bail!("[zoom] step must be greater than 1, got {}", zoom.step);
        }
        if self.display.image_height == 0 {
            anyhow::bail!("[display] image_height must be positive");
        }
        self.analysis_params()
            .validate()
            .context("[analysis] parameters rejected")?;
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Saved settings to {}", path.display());
        Ok(())
    }

    pub fn analysis_params(&self) -> AnalysisParams {
        AnalysisParams::new(
            self.analysis.window_size,
            self.analysis.hop_size,
            self.analysis.chunk_duration_sec,
        )
    }

    pub fn zoom_state(&self) -> ZoomState {
        ZoomState::new(self.zoom.step, self.zoom.min, self.zoom.max)
    }

    pub fn plot_style(&self) -> PlotStyle {
        PlotStyle {
            height: self.display.image_height,
            colormap: self.display.colormap,
            ..PlotStyle::default()
        }
    }

    /// Requested base image width for a track of `max_time` seconds.
    pub fn base_image_width(&self, max_time: f64) -> u32 {
        let scaled = (self.display.pixels_per_ten_seconds as f64 * max_time / 10.0).floor();
        (scaled.max(0.0) as u32).max(self.display.min_image_width)
    }
}
