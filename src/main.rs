//! DermaScan CLI
//!
//! Command-line entry point for classifying dermatoscopic images and
//! rendering Grad-CAM explanation overlays.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use dermascan::backend::{backend_name, default_device};
use dermascan::utils::logging::{init_logging, LogConfig};
use dermascan::{classes, explain, prepare_for_display, preprocess, response, Engine};

/// Dermatoscopic lesion classification with Grad-CAM explanations
#[derive(Parser, Debug)]
#[command(name = "dermascan")]
#[command(version)]
#[command(about = "Skin lesion classification with saliency overlays", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify an image and print the full diagnosis report as JSON
    Classify {
        /// Path to the input image (png, jpg, bmp or tiff)
        #[arg(short, long)]
        image: PathBuf,

        /// Path to the trained model checkpoint
        #[arg(short, long, env = "DERMASCAN_MODEL")]
        model: PathBuf,

        /// Write the report to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render a Grad-CAM explanation overlay for an image
    Explain {
        /// Path to the input image
        #[arg(short, long)]
        image: PathBuf,

        /// Path to the trained model checkpoint
        #[arg(short, long, env = "DERMASCAN_MODEL")]
        model: PathBuf,

        /// Output path for the overlay figure
        #[arg(short, long, default_value = "explanation.png")]
        output: PathBuf,

        /// Explain this class instead of the predicted one
        #[arg(long)]
        class: Option<usize>,
    },

    /// Print the metadata record for a lesion class
    ClassInfo {
        /// Class index in [0, 6]
        index: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    init_logging(&log_config).map_err(anyhow::Error::msg)?;

    // The registry is static; fail fast if it is ever incomplete
    classes::validate_registry().context("class registry validation failed")?;

    match cli.command {
        Commands::Classify {
            image,
            model,
            output,
        } => {
            let engine = load_engine(&model)?;
            let bytes = fs::read(&image)
                .with_context(|| format!("cannot read image {}", image.display()))?;

            let report = response::diagnose(&engine, &bytes)?;
            let json = serde_json::to_string_pretty(&report)?;

            match output {
                Some(path) => {
                    fs::write(&path, json)?;
                    println!("{} report written to {}", "OK".green().bold(), path.display());
                    println!();
                    println!(
                        "  {} {} ({})",
                        "Prediction:".cyan(),
                        report.class_name.bold(),
                        report.confidence
                    );
                    println!("  {} {}", "Severity:".cyan(), report.class_info.severity);
                    println!(
                        "  {} {}",
                        "Action:".cyan(),
                        report.class_info.recommended_action
                    );
                }
                // Bare JSON on stdout stays machine-readable
                None => println!("{}", json),
            }
        }

        Commands::Explain {
            image,
            model,
            output,
            class,
        } => {
            let engine = load_engine(&model)?;
            let bytes = fs::read(&image)
                .with_context(|| format!("cannot read image {}", image.display()))?;

            let tensor = preprocess(&bytes)?;
            let classification = engine.classify(&tensor)?;
            let target = class.unwrap_or(classification.class_index);

            info!(target, "computing attribution map");
            let map = explain::explain(&engine, &tensor, target)?;
            let display = prepare_for_display(&tensor)?;
            let figure = explain::render_overlay(&map, &display)?;

            fs::write(&output, figure.png_bytes())?;
            println!(
                "{} {} overlay for {} written to {}",
                "OK".green().bold(),
                classes::display_name(target)?,
                image.display(),
                output.display()
            );
        }

        Commands::ClassInfo { index } => {
            let meta = classes::class_metadata(index)?;
            println!("{}", serde_json::to_string_pretty(meta)?);
        }
    }

    Ok(())
}

fn load_engine(model: &PathBuf) -> Result<Engine> {
    info!(backend = backend_name(), "initializing inference engine");
    let engine = Engine::load(model, default_device())
        .with_context(|| format!("cannot load model from {}", model.display()))?;
    Ok(engine)
}
