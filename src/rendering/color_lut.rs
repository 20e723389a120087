use serde::{Deserialize, Serialize};

const LUT_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colormap {
    #[default]
    Magma,
    Inferno,
    Viridis,
    Greyscale,
}

/// Pre-built table from a normalized intensity in [0,1] to RGB.
#[derive(Clone)]
pub struct ColorLUT {
    table: Vec<(u8, u8, u8)>,
}

impl ColorLUT {
    pub fn new(colormap: Colormap) -> Self {
        let table = (0..LUT_SIZE)
            .map(|i| Self::map_color(colormap, i as f32 / (LUT_SIZE - 1) as f32))
            .collect();
        Self { table }
    }

    #[inline(always)]
    pub fn lookup(&self, t: f32) -> (u8, u8, u8) {
        if !t.is_finite() {
            return self.table[0];
        }
        let index = (t * (LUT_SIZE - 1) as f32).clamp(0.0, (LUT_SIZE - 1) as f32) as usize;
        self.table[index]
    }

    fn map_color(colormap: Colormap, t: f32) -> (u8, u8, u8) {
        let t = t.clamp(0.0, 1.0);
        // Cubic approximations of the matplotlib maps
        let (r, g, b) = match colormap {
            Colormap::Magma => (
                ((-2.10 * t + 3.30) * t - 0.22) * t,
                ((-0.73 * t - 0.39) * t + 1.14) * t - 0.01,
                ((0.69 * t - 2.49) * t + 2.13) * t + 0.16,
            ),
            Colormap::Inferno => (
                ((-1.83 * t + 2.96) * t + 0.03) * t,
                ((-0.84 * t + 0.03) * t + 0.82) * t - 0.01,
                ((2.36 * t - 4.80) * t + 2.76) * t + 0.17,
            ),
            Colormap::Viridis => (
                ((-1.33 * t + 1.62) * t + 0.27) * t + 0.04,
                ((0.57 * t - 1.30) * t + 1.42) * t + 0.01,
                ((-2.40 * t + 2.26) * t - 0.15) * t + 0.33,
            ),
            Colormap::Greyscale => (t, t, t),
        };
        (
            (r.clamp(0.0, 1.0) * 255.0) as u8,
            (g.clamp(0.0, 1.0) * 255.0) as u8,
            (b.clamp(0.0, 1.0) * 255.0) as u8,
        )
    }
}

impl Default for ColorLUT {
    fn default() -> Self {
        Self::new(Colormap::Magma)
    }
}
