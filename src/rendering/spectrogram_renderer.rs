use image::RgbaImage;
use log::info;
use rayon::prelude::*;

use super::color_lut::{ColorLUT, Colormap};
use super::labels::{
    draw_text, draw_text_vertical, format_tick, nice_step, text_width, tick_values, GLYPH_SIZE,
};
use crate::data::Spectrogram;
use crate::error::RenderError;

const BACKGROUND: [u8; 4] = [255, 255, 255, 255];
const FRAME_COLOR: [u8; 4] = [0, 0, 0, 255];
const TICK_LEN: u32 = 5;
const TICK_GAP: i64 = 3;

/// Plot axes position as fractions of the full figure. `y0`/`y1` are measured
/// from the bottom edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisBox {
    pub x0: f64,
    pub x1: f64,
    pub y0: f64,
    pub y1: f64,
}

impl AxisBox {
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }
}

/// Figure layout. The subplot margins are shared between the image axes and
/// the colorbar that sits to their right.
#[derive(Debug, Clone)]
pub struct PlotStyle {
    pub height: u32,
    pub colormap: Colormap,
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
    pub top: f64,
    pub colorbar_fraction: f64,
    pub colorbar_pad: f64,
    pub min_width: u32,
    pub max_width: u32,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            height: 600,
            colormap: Colormap::Magma,
            left: 0.05,
            right: 0.95,
            bottom: 0.1,
            top: 0.9,
            colorbar_fraction: 0.15,
            colorbar_pad: 0.05,
            min_width: 1200,
            max_width: 5000,
        }
    }
}

pub struct RenderedPlot {
    pub image: RgbaImage,
    pub axis_box: AxisBox,
}

struct PixelRect {
    x0: u32,
    x1: u32,
    top: u32,
    bottom: u32,
}

impl PixelRect {
    fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    fn height(&self) -> u32 {
        self.bottom - self.top
    }

    fn contains_row(&self, y: u32) -> bool {
        y >= self.top && y < self.bottom
    }
}

/// Rasterize the spectrogram as a dB-scaled, color-mapped figure with a
/// colorbar. Returns the image and the axes position used to place the
/// playback marker.
pub fn render_spectrogram(
    spec: &Spectrogram,
    target_width: u32,
    style: &PlotStyle,
) -> Result<RenderedPlot, RenderError> {
    let num_frames = spec.num_frames();
    let num_bins = spec.num_bins();
    if num_frames == 0 || num_bins == 0 {
        return Err(RenderError::EmptyMatrix);
    }
    if spec.times.len() != num_frames || spec.frequencies.len() != num_bins {
        return Err(RenderError::AxisMismatch {
            bins: num_bins,
            frames: num_frames,
        });
    }
    if target_width == 0 || style.height == 0 {
        return Err(RenderError::ZeroSize);
    }

    let width = target_width.clamp(style.min_width, style.max_width.max(style.min_width));
    let height = style.height;

    let subplot_width = style.right - style.left;
    let axes_right =
        style.left + subplot_width * (1.0 - style.colorbar_fraction - style.colorbar_pad);
    let colorbar_left = axes_right + subplot_width * style.colorbar_pad;

    let to_px_x = |f: f64| ((f * width as f64).round() as u32).min(width);
    let to_px_y = |f: f64| (((1.0 - f) * height as f64).round() as u32).min(height);

    let data = PixelRect {
        x0: to_px_x(style.left),
        x1: to_px_x(axes_right),
        top: to_px_y(style.top),
        bottom: to_px_y(style.bottom),
    };
    if data.width() == 0 || data.height() == 0 {
        return Err(RenderError::ZeroSize);
    }
    let bar_width = (data.height() / 20).max(4);
    let bar_x0 = to_px_x(colorbar_left);
    let colorbar = PixelRect {
        x0: bar_x0,
        x1: (bar_x0 + bar_width).min(width),
        top: data.top,
        bottom: data.bottom,
    };

    // dB range of the whole matrix
    let (db_min, db_max) = spec
        .matrix
        .values()
        .par_iter()
        .map(|&m| Spectrogram::magnitude_to_db(m))
        .fold(
            || (f32::INFINITY, f32::NEG_INFINITY),
            |(lo, hi), db| (lo.min(db), hi.max(db)),
        )
        .reduce(
            || (f32::INFINITY, f32::NEG_INFINITY),
            |a, b| (a.0.min(b.0), a.1.max(b.1)),
        );
    let db_range = if db_max > db_min { db_max - db_min } else { 1.0 };

    // Frame index for each data column (uniform over the time extent)
    let col_frames: Vec<usize> = (0..data.width())
        .map(|px| {
            let t = (px as f64 + 0.5) / data.width() as f64;
            ((t * num_frames as f64) as usize).min(num_frames - 1)
        })
        .collect();

    // Bin range for each data row, low frequencies at the bottom
    let row_bins: Vec<(usize, usize)> = (0..data.height())
        .map(|py| {
            let from_bottom = (data.height() - 1 - py) as f64;
            let lo = ((from_bottom / data.height() as f64) * num_bins as f64) as usize;
            let hi = (((from_bottom + 1.0) / data.height() as f64) * num_bins as f64) as usize;
            let lo = lo.min(num_bins - 1);
            (lo, hi.clamp(lo + 1, num_bins))
        })
        .collect();

    let lut = ColorLUT::new(style.colormap);
    let row_size = width as usize * 4;
    let mut buffer = vec![0u8; row_size * height as usize];

    buffer
        .par_chunks_mut(row_size)
        .enumerate()
        .for_each(|(y, row)| {
            for px in row.chunks_exact_mut(4) {
                px.copy_from_slice(&BACKGROUND);
            }
            let y = y as u32;

            if data.contains_row(y) {
                let (bin_start, bin_end) = row_bins[(y - data.top) as usize];
                for (col, &frame) in col_frames.iter().enumerate() {
                    let mut max_mag = 0.0f32;
                    for bin in bin_start..bin_end {
                        if let Some(mag) = spec.matrix.get(bin, frame) {
                            max_mag = max_mag.max(mag);
                        }
                    }
                    let t = (Spectrogram::magnitude_to_db(max_mag) - db_min) / db_range;
                    let (r, g, b) = lut.lookup(t);
                    let idx = (data.x0 as usize + col) * 4;
                    row[idx..idx + 4].copy_from_slice(&[r, g, b, 255]);
                }
            }

            if colorbar.contains_row(y) {
                let t = (colorbar.bottom - 1 - y) as f32 / colorbar.height().max(1) as f32;
                let (r, g, b) = lut.lookup(t);
                for x in colorbar.x0..colorbar.x1 {
                    let idx = x as usize * 4;
                    row[idx..idx + 4].copy_from_slice(&[r, g, b, 255]);
                }
            }
        });

    let mut image = RgbaImage::from_raw(width, height, buffer).ok_or(RenderError::ZeroSize)?;
    draw_frame(&mut image, &data);
    draw_frame(&mut image, &colorbar);
    draw_axes(&mut image, spec, &data, &colorbar, (db_min, db_max));

    let axis_box = AxisBox {
        x0: data.x0 as f64 / width as f64,
        x1: data.x1 as f64 / width as f64,
        y0: 1.0 - data.bottom as f64 / height as f64,
        y1: 1.0 - data.top as f64 / height as f64,
    };
    info!(
        "Spectrogram image {}x{}, data area x0={:.3} x1={:.3} width={:.3}",
        width,
        height,
        axis_box.x0,
        axis_box.x1,
        axis_box.width()
    );

    Ok(RenderedPlot { image, axis_box })
}

// ─── Axes ───

/// Title, axis labels and ticks for the time axis, the frequency axis and the
/// colorbar's dB scale.
fn draw_axes(
    image: &mut RgbaImage,
    spec: &Spectrogram,
    data: &PixelRect,
    colorbar: &PixelRect,
    (db_min, db_max): (f32, f32),
) {
    let ink = image::Rgba(FRAME_COLOR);
    let glyph = GLYPH_SIZE as i64;

    // Time: ticks below the data area, placed the same way the marker is
    let max_time = spec.max_time();
    let time_step = nice_step(max_time, (data.width() / 100).max(2));
    for t in tick_values(0.0, max_time, time_step) {
        let x = data.x0 + ((t / max_time.max(f64::MIN_POSITIVE)) * data.width() as f64) as u32;
        let x = x.min(data.x1.saturating_sub(1));
        draw_vline(image, x, data.bottom, data.bottom + TICK_LEN);
        let label = format_tick(t, time_step);
        let lx = x as i64 - text_width(&label, 1) as i64 / 2;
        draw_text(image, lx, (data.bottom + TICK_LEN) as i64 + TICK_GAP, &label, 1, ink);
    }
    let time_label = "Time [s]";
    draw_text(
        image,
        (data.x0 + data.width() / 2) as i64 - text_width(time_label, 1) as i64 / 2,
        (data.bottom + TICK_LEN) as i64 + TICK_GAP + glyph + 8,
        time_label,
        1,
        ink,
    );

    // Frequency: ticks left of the data area, low frequencies at the bottom
    let max_freq = spec.max_freq() as f64;
    let freq_step = nice_step(max_freq, (data.height() / 60).max(2));
    for f in tick_values(0.0, max_freq, freq_step) {
        let offset = ((f / max_freq.max(f64::MIN_POSITIVE)) * data.height() as f64) as u32;
        let y = data.bottom.saturating_sub(1 + offset).max(data.top);
        draw_hline(image, data.x0.saturating_sub(TICK_LEN), data.x0, y);
        let label = format_tick(f, freq_step);
        let lx = data.x0 as i64 - TICK_LEN as i64 - TICK_GAP - text_width(&label, 1) as i64;
        draw_text(image, lx, y as i64 - glyph / 2, &label, 1, ink);
    }
    let freq_label = "Frequency [Hz]";
    draw_text_vertical(
        image,
        2,
        (data.top + data.height() / 2) as i64 + text_width(freq_label, 1) as i64 / 2,
        freq_label,
        1,
        ink,
    );

    // dB scale: ticks right of the colorbar
    let db_min = db_min as f64;
    let db_max = db_max as f64;
    let db_range = db_max - db_min;
    if db_range.is_finite() && db_range > 0.0 {
        let db_step = nice_step(db_range, (colorbar.height() / 60).max(2));
        for db in tick_values(db_min, db_max, db_step) {
            let offset = (((db - db_min) / db_range) * colorbar.height() as f64) as u32;
            let y = colorbar.bottom.saturating_sub(1 + offset).max(colorbar.top);
            draw_hline(image, colorbar.x1, colorbar.x1 + TICK_LEN, y);
            let label = format_tick(db, db_step);
            let lx = (colorbar.x1 + TICK_LEN) as i64 + TICK_GAP;
            draw_text(image, lx, y as i64 - glyph / 2, &label, 1, ink);
        }
    }
    let db_label = "Amplitude [dB]";
    draw_text_vertical(
        image,
        (colorbar.x1 + TICK_LEN) as i64 + TICK_GAP + 5 * glyph + 4,
        (colorbar.top + colorbar.height() / 2) as i64 + text_width(db_label, 1) as i64 / 2,
        db_label,
        1,
        ink,
    );

    let title = "FFT spectrogram";
    draw_text(
        image,
        (data.x0 + data.width() / 2) as i64 - text_width(title, 2) as i64 / 2,
        (data.top as i64 - 2 * glyph) / 2,
        title,
        2,
        ink,
    );
}

fn draw_vline(image: &mut RgbaImage, x: u32, y0: u32, y1: u32) {
    let (w, h) = image.dimensions();
    if x >= w {
        return;
    }
    for y in y0..y1.min(h) {
        image.put_pixel(x, y, image::Rgba(FRAME_COLOR));
    }
}

fn draw_hline(image: &mut RgbaImage, x0: u32, x1: u32, y: u32) {
    let (w, h) = image.dimensions();
    if y >= h {
        return;
    }
    for x in x0..x1.min(w) {
        image.put_pixel(x, y, image::Rgba(FRAME_COLOR));
    }
}

/// One-pixel outline just outside `rect`.
fn draw_frame(image: &mut RgbaImage, rect: &PixelRect) {
    let (w, h) = image.dimensions();
    let left = rect.x0.saturating_sub(1);
    let right = rect.x1.min(w - 1);
    let top = rect.top.saturating_sub(1);
    let bottom = rect.bottom.min(h - 1);

    for x in left..=right {
        image.put_pixel(x, top, image::Rgba(FRAME_COLOR));
        image.put_pixel(x, bottom, image::Rgba(FRAME_COLOR));
    }
    for y in top..=bottom {
        image.put_pixel(left, y, image::Rgba(FRAME_COLOR));
        image.put_pixel(right, y, image::Rgba(FRAME_COLOR));
    }
}
