//! Veles CLI - One-shot WZ to NX archive conversion.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use veles::prelude::*;

/// Convert a WZ game archive to the NX format
#[derive(Parser)]
#[command(name = "veles")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the WZ archive
    #[arg(default_value = "Data.wz")]
    input: PathBuf,

    /// Output path; defaults to the input with an .nx extension
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let start = Instant::now();

    let output = cli
        .output
        .unwrap_or_else(|| cli.input.with_extension("nx"));

    let wz = WzFile::open(&cli.input)
        .with_context(|| format!("Failed to open {}", cli.input.display()))?;
    let mut converter = Converter::new(wz.data()).context("Failed to parse archive header")?;
    println!("Opened file");

    converter
        .parse_directories()
        .context("Failed to parse directories")?;
    println!("Parsed directories");

    let pb = ProgressBar::new(converter.image_count() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );
    converter
        .parse_images_with(|_| pb.inc(1))
        .context("Failed to parse images")?;
    pb.finish_and_clear();
    println!("Parsed images");

    if converter.key_is_ambiguous() {
        eprintln!("Warning: more than one region key decodes this archive; using the last match");
    }

    converter.resolve_links();
    converter
        .sort_siblings()
        .context("Failed to sort siblings")?;
    println!("Node cleanup finished");

    let tree = converter.into_tree();
    let mut writer = NxWriter::create(&output, tree.layout())
        .with_context(|| format!("Failed to create {}", output.display()))?;
    println!("Opened output");

    writer.write_nodes(tree.nodes()).context("Failed to write nodes")?;
    println!("Wrote nodes");

    writer
        .write_strings(tree.strings())
        .context("Failed to write strings")?;
    println!("Wrote strings");

    writer.finish().context("Failed to flush output")?;
    println!("Done");

    println!("Took {} ms", start.elapsed().as_millis());
    Ok(())
}
