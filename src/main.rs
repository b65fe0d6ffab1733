use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use lcd_decoder::{parse_config, LcdConfig, LcdDecoder, Segment};
use serde::Deserialize;
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

#[derive(Parser)]
#[command(name = "lcd-decoder")]
#[command(about = "Read 7-segment LCD/LED digits from images")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode the digits in an image, optionally calibrating first.
    Decode(DecodeArgs),

    /// Print the raw samples taken from every digit.
    Scan(InputArgs),

    /// Draw the sample regions onto a copy of the image.
    Mark {
        #[command(flatten)]
        input: InputArgs,

        /// Where to write the marked image.
        #[arg(long)]
        output: PathBuf,

        /// Paint every sampled pixel instead of outlining the regions.
        #[arg(long)]
        fill: bool,
    },
}

#[derive(Debug, Clone, Args)]
struct InputArgs {
    /// Path to the configuration, JSON if it ends in `.json`, otherwise YAML.
    #[arg(long)]
    config: PathBuf,

    /// Path to the input image.
    #[arg(long)]
    input: PathBuf,
}

#[derive(Debug, Clone, Args)]
struct DecodeArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Calibrate against these characters before decoding.
    #[arg(long)]
    calibrate: Option<String>,

    /// Restore previously saved levels.
    #[arg(long)]
    restore: Option<PathBuf>,

    /// Save the levels in use after decoding.
    #[arg(long)]
    save: Option<PathBuf>,
}

/// Decoder configuration plus options applied to the image before sampling.
#[derive(Debug, Deserialize)]
struct CliConfig {
    /// Clockwise rotation in degrees.
    #[serde(default)]
    rotate: f32,
    #[serde(flatten)]
    lcd: LcdConfig,
}

fn load(args: &InputArgs) -> Result<(LcdDecoder, RgbaImage)> {
    let data = fs::read_to_string(&args.config)
        .with_context(|| format!("Failed to read config {}", args.config.display()))?;
    let conf: CliConfig = parse_config(&args.config, &data)
        .with_context(|| format!("Failed to parse config {}", args.config.display()))?;
    let decoder = LcdDecoder::from_config(&conf.lcd).context("Invalid decoder config")?;
    let image = image::open(&args.input)
        .with_context(|| format!("Failed to load image {}", args.input.display()))?
        .to_rgba8();
    let image = if conf.rotate != 0.0 {
        log::debug!("Rotating by {} degrees", conf.rotate);
        rotate_about_center(
            &image,
            conf.rotate.to_radians(),
            Interpolation::Bilinear,
            Rgba([255, 255, 255, 255]),
        )
    } else {
        image
    };
    Ok((decoder, image))
}

fn decode(args: &DecodeArgs) -> Result<()> {
    let (mut decoder, image) = load(&args.input)?;
    if let Some(path) = &args.restore {
        restore(&mut decoder, path)?;
    }
    if let Some(digits) = &args.calibrate {
        let quality = decoder
            .preset(&image, digits)
            .with_context(|| format!("Calibration against {digits:?} failed"))?;
        let summary = decoder.summary();
        println!(
            "calibration quality {quality} (best {}, worst {}, average {})",
            summary.best,
            summary.worst,
            summary.average()
        );
    }
    let start = Instant::now();
    let result = decoder.decode(&image).context("Decode failed")?;
    log::debug!("{:?}", start.elapsed());
    println!("{}", result.text);
    if !result.is_valid() {
        println!("{} digits did not decode", result.invalid_count());
    }
    if let Some(path) = &args.save {
        decoder
            .save_levels(path)
            .with_context(|| format!("Failed to save levels to {}", path.display()))?;
    }
    Ok(())
}

fn restore(decoder: &mut LcdDecoder, path: &Path) -> Result<()> {
    let levels = decoder
        .restore_levels(path)
        .with_context(|| format!("Failed to restore levels from {}", path.display()))?;
    log::info!("Restored levels of quality {}", levels.quality);
    Ok(())
}

fn scan(args: &InputArgs) -> Result<()> {
    let (decoder, image) = load(args)?;
    let result = decoder.decode(&image).context("Decode failed")?;
    print!("digit  off");
    for segment in Segment::ALL {
        print!(" {:>4}", segment.name());
    }
    println!("   dp  char");
    for (i, (scan, digit)) in result.scans.iter().zip(&result.digits).enumerate() {
        print!("{i:>5} {:>4}", scan.background);
        for value in scan.segments {
            print!(" {value:>4}");
        }
        match scan.dp {
            Some(dp) => print!(" {dp:>4}"),
            None => print!("    -"),
        }
        println!("  {:?} {:#04x}", digit.character, digit.mask);
    }
    Ok(())
}

fn mark(args: &InputArgs, output: &Path, fill: bool) -> Result<()> {
    let (decoder, mut image) = load(args)?;
    decoder.mark_samples(&mut image, fill);
    image
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Decode(args) => decode(args),
        Commands::Scan(args) => scan(args),
        Commands::Mark {
            input,
            output,
            fill,
        } => mark(input, output, *fill),
    }
}
