use image::{Rgba, RgbaImage};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerStyle {
    pub color: Rgba<u8>,
    pub width: u32,
    pub dash: u32,
    pub gap: u32,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            color: Rgba([255, 255, 255, 255]),
            width: 4,
            dash: 16,
            gap: 8,
        }
    }
}

/// Paint a vertical dashed line centered on column `x`, full image height.
pub fn draw_marker(image: &mut RgbaImage, x: u32, style: &MarkerStyle) {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 || style.width == 0 {
        return;
    }
    let x = x.min(w - 1);
    let left = x.saturating_sub(style.width / 2);
    let right = (left + style.width).min(w);
    let period = (style.dash + style.gap).max(1);

    for y in 0..h {
        if y % period >= style.dash {
            continue;
        }
        for col in left..right {
            image.put_pixel(col, y, style.color);
        }
    }
}

/// Working copy of `base` with the marker drawn on it. `base` is untouched.
pub fn annotate(base: &RgbaImage, x: u32, style: &MarkerStyle) -> RgbaImage {
    let mut frame = base.clone();
    draw_marker(&mut frame, x, style);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    #[test]
    fn test_dashed_line_pattern() {
        let base = RgbaImage::from_pixel(50, 60, BLACK);
        let out = annotate(&base, 20, &MarkerStyle::default());
        let white = MarkerStyle::default().color;

        for col in 18..22 {
            assert_eq!(*out.get_pixel(col, 0), white);
            assert_eq!(*out.get_pixel(col, 15), white);
            assert_eq!(*out.get_pixel(col, 16), BLACK);
            assert_eq!(*out.get_pixel(col, 23), BLACK);
            assert_eq!(*out.get_pixel(col, 24), white);
        }
        assert_eq!(*out.get_pixel(17, 0), BLACK);
        assert_eq!(*out.get_pixel(22, 0), BLACK);
        assert!(base.pixels().all(|p| *p == BLACK));
    }

    #[test]
    fn test_marker_clipped_at_edges() {
        let base = RgbaImage::from_pixel(10, 10, BLACK);
        let style = MarkerStyle::default();

        let right = annotate(&base, 500, &style);
        assert_eq!(*right.get_pixel(9, 0), style.color);
        assert_eq!(*right.get_pixel(7, 0), style.color);
        assert_eq!(*right.get_pixel(6, 0), BLACK);

        let left = annotate(&base, 0, &style);
        assert_eq!(*left.get_pixel(0, 0), style.color);
        assert_eq!(*left.get_pixel(3, 0), style.color);
        assert_eq!(*left.get_pixel(4, 0), BLACK);
    }
}
