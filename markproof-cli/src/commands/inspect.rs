//! Inspect command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use markproof_core::{capacity_in, Frame};

use crate::utils::read_image;
use crate::OutputFormat;

/// Execute the inspect command.
pub fn execute(image_path: PathBuf, bits: usize, frame_edge: u32, format: OutputFormat) -> Result<()> {
    let frame = Frame::new(frame_edge)?;
    let image = read_image(&image_path)?;
    let layout = capacity_in(&frame, image.width(), image.height(), bits)
        .with_context(|| format!("{} cannot hold {} bits", image_path.display(), bits))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&layout)?),
        OutputFormat::Text => {
            println!("{}", image_path.display().to_string().bold());
            println!(
                "   {} {}x{}",
                "Image:".dimmed(),
                layout.width,
                layout.height
            );
            println!(
                "   {} {}x{}",
                "Frame:".dimmed(),
                layout.frame_edge,
                layout.frame_edge
            );
            println!("   {} {}", "Levels:".dimmed(), layout.levels);
            println!(
                "   {} {}x{}",
                "Band:".dimmed(),
                layout.band_rows,
                layout.band_cols
            );
            println!(
                "   {} {}x{} blocks of {}x{}",
                "Grid:".dimmed(),
                layout.grid_rows,
                layout.grid_cols,
                layout.block_rows,
                layout.block_cols
            );
            println!(
                "   {} {} of {} max",
                "Payload:".dimmed(),
                layout.bit_count,
                layout.max_bits
            );
        }
    }

    Ok(())
}
