//! Extract command implementation.

use std::path::PathBuf;

use anyhow::{bail, Result};
use colored::Colorize;
use markproof_core::{DecoderService, FeatureExtractor, Wavelet};
use tracing::info;

use crate::utils::{bit_errors, format_bits, parse_bits, read_image};
use crate::OutputFormat;

/// Inputs of the extract command.
pub struct ExtractArgs {
    pub images: Vec<PathBuf>,
    pub model: PathBuf,
    pub scaler: PathBuf,
    pub wavelet: String,
    pub strength: f64,
    pub frame_edge: u32,
    pub expected: Option<String>,
}

/// Execute the extract command.
pub fn execute(args: ExtractArgs, format: OutputFormat, quiet: bool) -> Result<()> {
    let wavelet: Wavelet = args.wavelet.parse()?;
    let expected = args.expected.as_deref().map(parse_bits).transpose()?;

    let extractor = FeatureExtractor::new(args.strength, args.frame_edge)?;
    let decoder = DecoderService::load_with(&args.model, &args.scaler, extractor)?;

    let images = args
        .images
        .iter()
        .map(|path| read_image(path))
        .collect::<Result<Vec<_>>>()?;

    let decoded = decoder.decode_many(&images, wavelet)?;
    info!(images = images.len(), bits = decoded.len(), "Decoded watermark");

    let errors = expected.as_ref().map(|e| {
        // Length differences count as errors
        bit_errors(&decoded, e) + decoded.len().abs_diff(e.len())
    });

    match format {
        OutputFormat::Json => {
            let mut body = serde_json::json!({ "decoded_watermark": decoded });
            if let (Some(expected), Some(errors)) = (&expected, errors) {
                body["expected"] = serde_json::json!(expected);
                body["bit_errors"] = serde_json::json!(errors);
            }
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Text if quiet => println!("{}", format_bits(&decoded)),
        OutputFormat::Text => {
            println!();
            println!("{}", "Watermark extracted".green().bold());
            println!();
            println!("   {} {}", "Images:".dimmed(), images.len());
            println!("   {} {}", "Bits:".dimmed(), decoded.len());
            println!("   {} {}", "Payload:".dimmed(), format_bits(&decoded));
            if let Some(errors) = errors {
                let accuracy = 1.0 - errors as f64 / decoded.len().max(1) as f64;
                let line = format!("{} bit error(s), {:.1}% accuracy", errors, accuracy * 100.0);
                if errors == 0 {
                    println!("   {} {}", "Expected:".dimmed(), line.green());
                } else {
                    println!("   {} {}", "Expected:".dimmed(), line.red());
                }
            }
        }
    }

    if let Some(errors) = errors.filter(|e| *e > 0) {
        bail!("Payload mismatch: {} bit error(s)", errors);
    }
    Ok(())
}
