pub mod color_lut;
pub mod data_area;
pub mod labels;
pub mod marker;
pub mod spectrogram_renderer;
pub mod viewport;

pub use color_lut::{ColorLUT, Colormap};
pub use data_area::DataAreaMapping;
pub use marker::{annotate, draw_marker, MarkerStyle};
pub use spectrogram_renderer::{render_spectrogram, AxisBox, PlotStyle, RenderedPlot};
pub use viewport::ViewportController;
