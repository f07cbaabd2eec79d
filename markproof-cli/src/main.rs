//! MarkProof CLI - Invisible image watermarking tool.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Usage error (invalid payload or option)
  65  Data error (image cannot hold or did not match the payload)
  66  Input file missing or unreadable
  69  Decoder artifacts unavailable
  74  Cannot write output file";

#[derive(Parser)]
#[command(name = "markproof")]
#[command(author, version, about = "Invisible DWT-SVD image watermarking", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Suppress decorated output (results are still printed)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// Machine-readable JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed a bit payload into an image
    Embed {
        /// Path to the cover image
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Payload as a 0/1 string ("0110...") or a JSON array ("[0,1,1,0]")
        #[arg(short, long)]
        bits: String,

        /// Declared payload length (defaults to the number of bits given)
        #[arg(short, long)]
        length: Option<usize>,

        /// Wavelet family: haar, db1 or db2
        #[arg(short, long, default_value = "haar")]
        wavelet: String,

        /// Lattice step; larger is more robust and more visible
        #[arg(short, long, default_value_t = markproof_core::DEFAULT_STRENGTH)]
        strength: f64,

        /// Edge of the square frame channels are resampled into
        #[arg(long, default_value_t = markproof_core::DEFAULT_FRAME_EDGE)]
        frame_edge: u32,

        /// Output PNG path (defaults to <IMAGE stem>.watermarked.png)
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },

    /// Decode the payload from one or more images
    ///
    /// Several images are treated as copies of the same watermarked picture;
    /// their bit probabilities are averaged before thresholding.
    Extract {
        /// Image(s) to decode
        #[arg(value_name = "IMAGE", required = true)]
        images: Vec<PathBuf>,

        /// Decoder model artifact (JSON)
        #[arg(short, long, default_value = "models/decoder.json")]
        model: PathBuf,

        /// Feature scaler artifact (JSON)
        #[arg(long, default_value = "models/scaler.json")]
        scaler: PathBuf,

        /// Wavelet family used at embedding
        #[arg(short, long, default_value = "haar")]
        wavelet: String,

        /// Lattice step used at embedding
        #[arg(short, long, default_value_t = markproof_core::DEFAULT_STRENGTH)]
        strength: f64,

        /// Frame edge used at embedding
        #[arg(long, default_value_t = markproof_core::DEFAULT_FRAME_EDGE)]
        frame_edge: u32,

        /// Expected payload; reports bit accuracy and fails on mismatch
        #[arg(short, long)]
        expected: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show how a payload would be laid out in an image
    Inspect {
        /// Path to the image
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Payload length to plan for
        #[arg(short, long, default_value_t = markproof_core::DEFAULT_BIT_COUNT)]
        bits: usize,

        /// Edge of the square frame channels are resampled into
        #[arg(long, default_value_t = markproof_core::DEFAULT_FRAME_EDGE)]
        frame_edge: u32,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

fn init_tracing(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        _ => "debug",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("markproof={level},markproof_core={level}").into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    let quiet = cli.quiet;
    let result = match cli.command {
        Commands::Embed {
            image,
            bits,
            length,
            wavelet,
            strength,
            frame_edge,
            output,
        } => commands::embed::execute(
            commands::embed::EmbedArgs {
                image,
                bits,
                length,
                wavelet,
                strength,
                frame_edge,
                output,
            },
            quiet,
        ),
        Commands::Extract {
            images,
            model,
            scaler,
            wavelet,
            strength,
            frame_edge,
            expected,
            format,
        } => commands::extract::execute(
            commands::extract::ExtractArgs {
                images,
                model,
                scaler,
                wavelet,
                strength,
                frame_edge,
                expected,
            },
            format,
            quiet,
        ),
        Commands::Inspect {
            image,
            bits,
            frame_edge,
            format,
        } => commands::inspect::execute(image, bits, frame_edge, format),
    };

    let exit = match result {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };

    if let Some(message) = &exit.message {
        eprintln!("{} {}", "error:".red().bold(), message);
    }
    std::process::ExitCode::from(exit.code)
}
