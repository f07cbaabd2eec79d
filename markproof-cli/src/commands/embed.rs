//! Embed command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use markproof_core::{encode_png, Embedder, Wavelet};
use tracing::info;

use crate::utils::{build_output_path, format_bits, parse_bits, read_image};

/// Inputs of the embed command.
pub struct EmbedArgs {
    pub image: PathBuf,
    pub bits: String,
    pub length: Option<usize>,
    pub wavelet: String,
    pub strength: f64,
    pub frame_edge: u32,
    pub output: Option<PathBuf>,
}

/// Execute the embed command.
pub fn execute(args: EmbedArgs, quiet: bool) -> Result<()> {
    let image_path = args.image;
    let bits = parse_bits(&args.bits)?;
    let bit_length = args.length.unwrap_or(bits.len());
    let wavelet: Wavelet = args.wavelet.parse()?;
    let embedder = Embedder::new(args.strength)?.with_frame_edge(args.frame_edge)?;

    let image = read_image(&image_path)?;
    info!(
        path = %image_path.display(),
        width = image.width(),
        height = image.height(),
        "Loaded cover image"
    );

    let marked = embedder
        .embed(&image, bit_length, &bits, wavelet)
        .with_context(|| format!("Embedding failed for {}", image_path.display()))?;
    let png = encode_png(&marked)?;

    let output = args.output.unwrap_or_else(|| build_output_path(&image_path));
    std::fs::write(&output, &png)
        .with_context(|| format!("Failed to write watermarked image: {}", output.display()))?;

    info!(path = %output.display(), bytes = png.len(), "Wrote watermarked image");

    if quiet {
        println!("{}", output.display());
    } else {
        println!();
        println!("{}", "Watermark embedded".green().bold());
        println!();
        println!("   {} {}", "Input:".dimmed(), image_path.display());
        println!("   {} {}", "Output:".dimmed(), output.display());
        println!("   {} {} ({})", "Payload:".dimmed(), bit_length, format_bits(&bits));
        println!("   {} {}", "Wavelet:".dimmed(), wavelet);
        println!("   {} {}", "Strength:".dimmed(), embedder.strength());
    }

    Ok(())
}
