use image::imageops::{self, FilterType};
use image::RgbaImage;
use log::info;

use super::data_area::DataAreaMapping;
use crate::data::ZoomState;

/// Zoom and autoscroll for the displayed spectrogram.
#[derive(Debug, Clone, Default)]
pub struct ViewportController {
    zoom: ZoomState,
    base_size: Option<(u32, u32)>,
}

impl ViewportController {
    pub fn new(zoom: ZoomState) -> Self {
        Self {
            zoom,
            base_size: None,
        }
    }

    /// A new base image was generated: remember its size and reset the zoom.
    pub fn set_base_size(&mut self, width: u32, height: u32) {
        self.base_size = Some((width, height));
        self.zoom.reset();
    }

    pub fn zoom_factor(&self) -> f64 {
        self.zoom.factor
    }

    /// No-op without an image. Returns true if the factor changed.
    pub fn zoom_in(&mut self) -> bool {
        if self.base_size.is_none() {
            return false;
        }
        let changed = self.zoom.zoom_in();
        info!("Zoom in: factor={:.2}", self.zoom.factor);
        changed
    }

    pub fn zoom_out(&mut self) -> bool {
        if self.base_size.is_none() {
            return false;
        }
        let changed = self.zoom.zoom_out();
        info!("Zoom out: factor={:.2}", self.zoom.factor);
        changed
    }

    /// Base size times the zoom factor. Both axes use the same factor so the
    /// aspect ratio is kept.
    pub fn scaled_size(&self) -> Option<(u32, u32)> {
        self.base_size
            .map(|(w, h)| scaled_dimensions(w, h, self.zoom.factor))
    }

    /// Marker column inside the scaled image.
    pub fn marker_column(&self, mapping: &DataAreaMapping, position_sec: f64) -> Option<u32> {
        self.scaled_size()
            .map(|(w, _)| mapping.pixel_for_time(position_sec, w))
    }

    /// Horizontal scroll that centers `marker_x` in a viewport of
    /// `viewport_width`, or 0 when the scaled image already fits.
    pub fn scroll_offset(&self, marker_x: u32, viewport_width: u32) -> u32 {
        match self.scaled_size() {
            Some((scaled_width, _)) => scroll_offset(marker_x, viewport_width, scaled_width),
            None => 0,
        }
    }

    pub fn scale_image(&self, base: &RgbaImage) -> RgbaImage {
        let (w, h) = scaled_dimensions(base.width(), base.height(), self.zoom.factor);
        if (w, h) == base.dimensions() {
            return base.clone();
        }
        imageops::resize(base, w, h, FilterType::Triangle)
    }
}

pub fn scaled_dimensions(width: u32, height: u32, factor: f64) -> (u32, u32) {
    (
        ((width as f64 * factor) as u32).max(1),
        ((height as f64 * factor) as u32).max(1),
    )
}

pub fn scroll_offset(marker_x: u32, viewport_width: u32, scaled_width: u32) -> u32 {
    if scaled_width <= viewport_width {
        return 0;
    }
    let max_scroll = (scaled_width - viewport_width) as i64;
    let centered = marker_x as i64 - (viewport_width / 2) as i64;
    centered.clamp(0, max_scroll) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::spectrogram_renderer::AxisBox;

    fn mapping() -> DataAreaMapping {
        DataAreaMapping::from_axis_box(
            &AxisBox {
                x0: 0.05,
                x1: 0.77,
                y0: 0.1,
                y1: 0.9,
            },
            10.0,
        )
    }

    #[test]
    fn test_zoom_without_image_is_noop() {
        let mut vp = ViewportController::default();
        assert!(!vp.zoom_in());
        assert!(!vp.zoom_out());
        assert_eq!(vp.zoom_factor(), 1.0);
        assert_eq!(vp.scaled_size(), None);
        assert_eq!(vp.marker_column(&mapping(), 1.0), None);
    }

    #[test]
    fn test_scaled_size_and_marker_follow_zoom() {
        let mut vp = ViewportController::default();
        vp.set_base_size(1200, 600);
        assert_eq!(vp.scaled_size(), Some((1200, 600)));
        assert_eq!(vp.marker_column(&mapping(), 5.0), Some(492));

        vp.zoom_in();
        assert_eq!(vp.scaled_size(), Some((1440, 720)));
        assert_eq!(vp.marker_column(&mapping(), 5.0), Some(590));

        vp.set_base_size(1000, 500);
        assert_eq!(vp.zoom_factor(), 1.0);
    }

    #[test]
    fn test_scroll_centers_and_clamps() {
        assert_eq!(scroll_offset(1000, 400, 3000), 800);
        assert_eq!(scroll_offset(100, 400, 3000), 0);
        assert_eq!(scroll_offset(2990, 400, 3000), 2600);
        assert_eq!(scroll_offset(500, 1000, 800), 0);
    }

    #[test]
    fn test_scale_image_dimensions() {
        let mut vp = ViewportController::default();
        vp.set_base_size(100, 50);
        let base = RgbaImage::new(100, 50);
        assert_eq!(vp.scale_image(&base).dimensions(), (100, 50));
        vp.zoom_out();
        assert_eq!(vp.scale_image(&base).dimensions(), (83, 41));
    }
}
