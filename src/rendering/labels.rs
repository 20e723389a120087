use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgba, RgbaImage};

/// Glyph cell size in pixels at scale 1.
pub const GLYPH_SIZE: u32 = 8;

pub fn text_width(text: &str, scale: u32) -> u32 {
    text.chars().count() as u32 * GLYPH_SIZE * scale.max(1)
}

/// Horizontal text with its top-left corner at `(x, y)`. Pixels falling
/// outside the image are skipped.
pub fn draw_text(image: &mut RgbaImage, x: i64, y: i64, text: &str, scale: u32, color: Rgba<u8>) {
    let scale = scale.max(1) as i64;
    let advance = GLYPH_SIZE as i64 * scale;
    for (i, c) in text.chars().enumerate() {
        let origin_x = x + i as i64 * advance;
        for_each_glyph_pixel(c, |gx, gy| {
            fill_block(image, origin_x + gx * scale, y + gy * scale, scale, color);
        });
    }
}

/// Text rotated a quarter turn counter-clockwise, read bottom to top.
/// `(x, y)` is the bottom-left corner of the rotated run.
pub fn draw_text_vertical(
    image: &mut RgbaImage,
    x: i64,
    y: i64,
    text: &str,
    scale: u32,
    color: Rgba<u8>,
) {
    let scale = scale.max(1) as i64;
    let advance = GLYPH_SIZE as i64 * scale;
    for (i, c) in text.chars().enumerate() {
        let origin_y = y - i as i64 * advance;
        for_each_glyph_pixel(c, |gx, gy| {
            fill_block(image, x + gy * scale, origin_y - (gx + 1) * scale, scale, color);
        });
    }
}

fn for_each_glyph_pixel(c: char, mut f: impl FnMut(i64, i64)) {
    let Some(rows) = BASIC_FONTS.get(c) else {
        return;
    };
    for (gy, bits) in rows.iter().enumerate() {
        for gx in 0..8 {
            if bits & (1 << gx) != 0 {
                f(gx as i64, gy as i64);
            }
        }
    }
}

fn fill_block(image: &mut RgbaImage, x: i64, y: i64, size: i64, color: Rgba<u8>) {
    let (w, h) = image.dimensions();
    for py in y..y + size {
        for px in x..x + size {
            if px >= 0 && py >= 0 && (px as u32) < w && (py as u32) < h {
                image.put_pixel(px as u32, py as u32, color);
            }
        }
    }
}

/// Round tick spacing (1, 2 or 5 times a power of ten) giving at most about
/// `max_ticks` intervals over `range`.
pub fn nice_step(range: f64, max_ticks: u32) -> f64 {
    if !range.is_finite() || range <= 0.0 {
        return 1.0;
    }
    let raw = range / max_ticks.max(1) as f64;
    let magnitude = 10f64.powi(raw.log10().floor() as i32);
    let residual = raw / magnitude;
    let nice = if residual <= 1.0 {
        1.0
    } else if residual <= 2.0 {
        2.0
    } else if residual <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

/// Multiples of `step` inside `[lo, hi]`.
pub fn tick_values(lo: f64, hi: f64, step: f64) -> Vec<f64> {
    if step.is_nan() || step <= 0.0 || !lo.is_finite() || !hi.is_finite() || hi < lo {
        return Vec::new();
    }
    let first = (lo / step).ceil() as i64;
    let last = (hi / step + 1e-9).floor() as i64;
    (first..=last).map(|k| k as f64 * step).collect()
}

/// Label text for a tick, with decimals only when the step needs them.
pub fn format_tick(value: f64, step: f64) -> String {
    let value = if value.abs() < step * 1e-6 { 0.0 } else { value };
    if step >= 1.0 {
        format!("{:.0}", value)
    } else if step >= 0.1 {
        format!("{:.1}", value)
    } else {
        format!("{:.2}", value)
    }
}
