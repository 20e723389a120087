use super::spectrogram_renderer::AxisBox;

/// Where the plotted time range sits inside the full image width.
///
/// Built from the rasterizer's axis box each time the base image is
/// regenerated. Zooming rescales the image uniformly, so the same fractions
/// apply at every zoom level with the scaled width substituted for `W`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataAreaMapping {
    pub x0: f64,
    pub x1: f64,
    pub width: f64,
    /// Last time-axis value, the time plotted at the right edge.
    pub max_time: f64,
}

impl DataAreaMapping {
    pub fn from_axis_box(axis_box: &AxisBox, max_time: f64) -> Self {
        let x0 = axis_box.x0.clamp(0.0, 1.0);
        let x1 = axis_box.x1.clamp(x0, 1.0);
        Self {
            x0,
            x1,
            width: x1 - x0,
            max_time: max_time.max(0.0),
        }
    }

    /// Pixel column for a playback position, clamped into the image.
    pub fn pixel_for_time(&self, position_sec: f64, image_width: u32) -> u32 {
        if image_width == 0 {
            return 0;
        }
        let w = image_width as f64;
        let fraction = if self.max_time > 0.0 {
            position_sec / self.max_time
        } else {
            0.0
        };
        let x = self.x0 * w + fraction * (self.width * w);
        // Nudge so that values landing exactly on a column boundary are not
        // truncated one pixel short.
        let x = (x + 1e-9).floor();
        x.clamp(0.0, (image_width - 1) as f64) as u32
    }

    /// Time plotted under a pixel column, clamped to the analyzed range.
    pub fn time_for_pixel(&self, x: u32, image_width: u32) -> f64 {
        let data_px = self.width * image_width as f64;
        if data_px <= 0.0 {
            return 0.0;
        }
        let fraction = (x as f64 - self.x0 * image_width as f64) / data_px;
        (fraction * self.max_time).clamp(0.0, self.max_time)
    }

    /// Pixel columns `[left, right)` covered by plotted data.
    pub fn data_columns(&self, image_width: u32) -> (u32, u32) {
        let w = image_width as f64;
        let left = (self.x0 * w).ceil() as u32;
        let right = ((self.x1 * w).floor() as u32).min(image_width);
        (left.min(right), right)
    }
}
