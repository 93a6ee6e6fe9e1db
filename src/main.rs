use anyhow::{Context, Result};
use clap::Parser;
use image::ImageReader;

use coin_tally::{annotate, classify, detect_shapes, format_dollars, normalize_canvas, Cli, Tally};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load input image
    let img = ImageReader::open(&cli.input)
        .with_context(|| format!("Failed to open input file: {:?}", cli.input))?
        .decode()
        .with_context(|| format!("Failed to decode image: {:?}", cli.input))?;

    if cli.verbose {
        eprintln!("Loaded image: {:?} ({}x{})", cli.input, img.width(), img.height());
    }

    // Stretch onto the fixed canvas the size bands are calibrated for
    let canvas = normalize_canvas(&img);

    println!("Width: {}", canvas.width());
    println!("Height: {}", canvas.height());
    println!("No channels: {}", canvas.color().channel_count());

    // Detect candidate shapes
    let shapes = detect_shapes(&canvas, cli.verbose);

    // Count coins per denomination; out-of-band shapes are deliberately
    // left out of the tally
    let mut tally = Tally::new();
    for shape in shapes.iter().filter(|s| s.is_qualifying()) {
        match classify(shape.ellipse.major_dim()) {
            Some(denom) => {
                if cli.verbose {
                    eprintln!("{}: {:.1} px", denom.label(), shape.ellipse.major_dim());
                }
                tally.record(denom);
            }
            None => {
                if cli.verbose {
                    eprintln!("Unmatched shape: {:.1} px", shape.ellipse.major_dim());
                }
            }
        }
    }

    // Print results
    println!("Penny - {}", tally.penny);
    println!("Nickel - {}", tally.nickel);
    println!("Dime - {}", tally.dime);
    println!("Quarter - {}", tally.quarter);
    println!("Total - ${}", format_dollars(tally.total_value()));

    // Save the annotated image
    let annotated = annotate(&canvas.to_rgb8(), &shapes);
    let output_path = cli.output_path();
    annotated
        .save(&output_path)
        .with_context(|| format!("Failed to save annotated image: {:?}", output_path))?;

    eprintln!("Saved annotated image: {:?}", output_path);

    Ok(())
}
