/// Multiplicative zoom applied to the base spectrogram image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomState {
    pub factor: f64,
    pub step: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for ZoomState {
    fn default() -> Self {
        Self {
            factor: 1.0,
            step: 1.2,
            min: 0.5,
            max: 5.0,
        }
    }
}

impl ZoomState {
    /// Bounds that are not finite, not positive or out of order fall back to
    /// the defaults, as does a step that would not enlarge the image.
    pub fn new(step: f64, min: f64, max: f64) -> Self {
        let defaults = Self::default();
        let (min, max) = if bounds_valid(min, max) {
            (min, max)
        } else {
            (defaults.min, defaults.max)
        };
        let step = if step_valid(step) { step } else { defaults.step };
        Self {
            factor: 1.0_f64.clamp(min, max),
            step,
            min,
            max,
        }
    }

    /// Returns true if the factor changed.
    pub fn zoom_in(&mut self) -> bool {
        self.set_factor(self.factor * self.step)
    }

    pub fn zoom_out(&mut self) -> bool {
        self.set_factor(self.factor / self.step)
    }

    pub fn reset(&mut self) {
        self.factor = 1.0_f64.max(self.min).min(self.max);
    }

    fn set_factor(&mut self, factor: f64) -> bool {
        let clamped = factor.max(self.min).min(self.max);
        let changed = (clamped - self.factor).abs() > f64::EPSILON;
        self.factor = clamped;
        changed
    }
}

pub fn bounds_valid(min: f64, max: f64) -> bool {
    min.is_finite() && max.is_finite() && min > 0.0 && min <= max
}

pub fn step_valid(step: f64) -> bool {
    step.is_finite() && step > 1.0
}
