use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use specview::data::AudioData;
use specview::processing::FftEngine;
use specview::rendering::{annotate, render_spectrogram, Colormap, DataAreaMapping, MarkerStyle};
use specview::{format_time, Settings};

#[derive(Parser)]
#[command(name = "specview", about = "Render the FFT spectrogram of an audio file to PNG")]
struct Cli {
    /// Input audio file (wav, mp3, flac, ogg)
    input: Option<PathBuf>,

    /// Output PNG. Default: <input stem>_fft_spectrogram.png next to the input
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Settings file
    #[arg(short, long, default_value = Settings::FILE_NAME)]
    config: PathBuf,

    /// Override the configured colormap
    #[arg(long, value_parser = ["magma", "inferno", "viridis", "greyscale"])]
    colormap: Option<String>,

    /// Draw the playback marker at this many seconds
    #[arg(long)]
    marker: Option<f64>,

    /// Write the current settings (defaults if no file exists) and exit
    #[arg(long)]
    write_config: bool,
}

fn parse_colormap(name: &str) -> Colormap {
    match name {
        "inferno" => Colormap::Inferno,
        "viridis" => Colormap::Viridis,
        "greyscale" => Colormap::Greyscale,
        _ => Colormap::Magma,
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut settings = Settings::load_or_default(&cli.config);
    if cli.write_config {
        settings.save(&cli.config)?;
        return Ok(());
    }
    if let Some(name) = &cli.colormap {
        settings.display.colormap = parse_colormap(name);
    }

    let input = cli
        .input
        .context("No input file given (see --help)")?;

    // 1. Decode
    let audio = AudioData::from_file(&input)
        .with_context(|| format!("Failed to load {}", input.display()))?;
    info!(
        "{}: {} samples @ {} Hz ({})",
        input.display(),
        audio.num_samples(),
        audio.sample_rate,
        format_time(audio.duration_seconds)
    );

    // 2. Analyze
    let started = Instant::now();
    let spectrogram = FftEngine::process(&audio, &settings.analysis_params())
        .context("Failed to generate spectrogram")?;
    info!("Analysis took {:.2?}", started.elapsed());

    // 3. Render
    let target_width = settings.base_image_width(spectrogram.max_time());
    let plot = render_spectrogram(&spectrogram, target_width, &settings.plot_style())
        .context("Failed to render spectrogram")?;

    let image = match cli.marker {
        Some(seconds) => {
            let mapping = DataAreaMapping::from_axis_box(&plot.axis_box, spectrogram.max_time());
            let x = mapping.pixel_for_time(seconds, plot.image.width());
            info!("Marker at {:.2}s -> column {}", seconds, x);
            annotate(&plot.image, x, &MarkerStyle::default())
        }
        None => plot.image,
    };

    // 4. Save
    let output = cli.output.unwrap_or_else(|| {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        input.with_file_name(format!("{}_fft_spectrogram.png", stem))
    });
    image
        .save(&output)
        .with_context(|| format!("Failed to save {}", output.display()))?;

    let bytes = std::fs::metadata(&output).map(|m| m.len()).unwrap_or(0);
    println!(
        "Saved {} ({}x{}, {:.2} MB)",
        output.display(),
        image.width(),
        image.height(),
        bytes as f64 / (1024.0 * 1024.0)
    );
    Ok(())
}
