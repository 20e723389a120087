pub mod fft_engine;

pub use fft_engine::FftEngine;
