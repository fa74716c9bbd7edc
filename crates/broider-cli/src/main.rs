//! Run the stylization pipeline against an image file and write the
//! embroidered PNG, printing the result metadata as JSON.

use std::path::PathBuf;

use broider_pipeline::process_embroidery;
use clap::Parser;

/// Stylize an image into thread-stitched embroidery.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Input image path (PNG, JPEG, BMP, WebP).
    input: PathBuf,

    /// Output PNG path.
    #[arg(short, long)]
    output: PathBuf,

    /// Options as an inline JSON record, e.g.
    /// '{"maxColors": 6, "hatch": "cross"}'.
    #[arg(long, conflicts_with = "options_file")]
    options: Option<String>,

    /// Options as a JSON file.
    #[arg(long)]
    options_file: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let options_json: serde_json::Value = match (&args.options, &args.options_file) {
        (Some(inline), _) => serde_json::from_str(inline)?,
        (None, Some(path)) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        (None, None) => serde_json::Value::Object(serde_json::Map::new()),
    };

    eprintln!("Reading image from {}", args.input.display());
    let image_bytes = std::fs::read(&args.input)?;

    eprintln!("Processing...");
    let result = process_embroidery(&image_bytes, "", &options_json)?;

    eprintln!(
        "Palette: {} colors, output: {}x{}, warnings: {}",
        result.meta.palette_size,
        result.meta.final_size.width,
        result.meta.final_size.height,
        result.meta.warnings.len(),
    );
    for warning in &result.meta.warnings {
        eprintln!("  warning: {warning}");
    }

    eprintln!("Saving to {}", args.output.display());
    std::fs::write(&args.output, &result.output_bytes)?;

    println!("{}", serde_json::to_string_pretty(&result.meta)?);
    Ok(())
}
