//! Example demonstrating embed and self-check tracing output.
//!
//! Run with: cargo run -p markproof-core --example embed_tracing

use image::{Rgb, RgbImage};
use markproof_core::{capacity, Embedder, FeatureExtractor, Wavelet, DEFAULT_BIT_COUNT};
use tracing_subscriber::{fmt, EnvFilter};

fn main() {
    // Initialize tracing subscriber with debug level
    fmt()
        .with_env_filter(EnvFilter::new("markproof_core=debug,info"))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    println!("=== MarkProof Embed Tracing Demo ===\n");

    let cover = RgbImage::from_fn(640, 480, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8])
    });
    let bits: Vec<u8> = (0..DEFAULT_BIT_COUNT).map(|i| (i % 3 == 0) as u8).collect();

    match capacity(cover.width(), cover.height(), bits.len()) {
        Ok(layout) => println!("Layout: {:?}\n", layout),
        Err(e) => {
            eprintln!("Image cannot hold the payload: {}", e);
            return;
        }
    }

    for wavelet in [Wavelet::Haar, Wavelet::Db2] {
        println!("\nEmbedding with {}...\n", wavelet);

        let marked = match Embedder::default().embed(&cover, bits.len(), &bits, wavelet) {
            Ok(marked) => marked,
            Err(e) => {
                println!("\n❌ Failed: {}", e);
                continue;
            }
        };

        match FeatureExtractor::default().extract_features(&marked, wavelet, bits.len()) {
            Ok(features) => {
                let agreeing = features
                    .iter()
                    .zip(&bits)
                    .filter(|(phase, bit)| (**phase >= 0.5) == (**bit == 1))
                    .count();
                println!("\n✅ Success!");
                println!("   Blocks agreeing with payload: {}/{}", agreeing, bits.len());
            }
            Err(e) => println!("\n❌ Failed: {}", e),
        }
    }
}
