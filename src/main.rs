use anyhow::{Context, Result};
use clap::Parser;
use std::fs;

use fit_to_size::cli::Args;
use fit_to_size::config::Settings;
use fit_to_size::{compress, Budget, CompressionRequest};

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    let target = args.target();
    let max_mb = args.max_mb.unwrap_or_else(|| target.default_max_megabytes());
    let budget = Budget::from_megabytes(max_mb).with_context(|| "Invalid size limit")?;
    let config = Settings::from_args(&args)
        .validate()
        .with_context(|| "Invalid sweep settings")?;

    // Read input file
    let raw = fs::read(&args.input)
        .with_context(|| format!("Failed to read input file: {}", args.input.display()))?;
    let input_len = raw.len();

    log::info!("Read {} bytes, compressing as {}", input_len, target);

    let request = CompressionRequest::new(raw, target, budget);
    let outcome = compress(&request, &config);

    let output_path = args.output_path();
    fs::write(&output_path, outcome.bytes())
        .with_context(|| format!("Failed to write output file: {}", output_path.display()))?;

    if outcome.is_pass_through() {
        log::warn!("Input could not be read as {}; copied unchanged", target);
        println!(
            "Input is not a readable {}; copied unchanged to {}",
            target,
            output_path.display()
        );
        return Ok(());
    }

    let how = outcome
        .trial()
        .map_or_else(|| "original input".to_string(), |t| t.to_string());
    println!(
        "{} -> {} bytes ({}, limit {} bytes{}) written to {}",
        input_len,
        outcome.bytes().len(),
        how,
        budget.bytes(),
        if outcome.within_budget() {
            ""
        } else {
            ", limit not reached"
        },
        output_path.display()
    );

    Ok(())
}
