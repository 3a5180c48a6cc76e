mod core;
mod ui;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::core::{batch, pipeline, DisguiseParams};

#[derive(Parser)]
#[command(author, version, about = "Cosmetic video/audio disguise filter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Disguise a single clip
    Process {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long, help = "Defaults to the OS temp directory")]
        output_dir: Option<PathBuf>,
        #[arg(short, long, default_value_t = 0.1, help = "Mesh intensity, 0.0 to 0.5")]
        alpha: f64,
        #[arg(short, long, default_value_t = 5, help = "Warp intensity, 0 to 20")]
        strength: u32,
        #[arg(long, help = "Seed for reproducible frame randomness")]
        seed: Option<u64>,
    },
    /// Disguise every clip in a directory, sequentially
    Batch {
        #[arg(short, long)]
        input_dir: PathBuf,
        #[arg(short, long, help = "Defaults to the OS temp directory")]
        output_dir: Option<PathBuf>,
        #[arg(short, long, default_value_t = 0.1, help = "Mesh intensity, 0.0 to 0.5")]
        alpha: f64,
        #[arg(short, long, default_value_t = 5, help = "Warp intensity, 0 to 20")]
        strength: u32,
        #[arg(long, help = "Seed for reproducible frame randomness")]
        seed: Option<u64>,
        #[arg(long, help = "Print the batch report as JSON")]
        json: bool,
    },
    /// Interactive mode (menu)
    Interactive,
}

fn check_params(alpha: f64, strength: u32) -> Result<()> {
    if !(0.0..=0.5).contains(&alpha) {
        bail!("alpha must be between 0.0 and 0.5, got {}", alpha);
    }
    if strength > 20 {
        bail!("strength must be between 0 and 20, got {}", strength);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Error registering Ctrl-C handler")?;

    match &cli.command {
        Commands::Process { input, output_dir, alpha, strength, seed } => {
            check_params(*alpha, *strength)?;
            let out_dir = output_dir.clone().unwrap_or_else(std::env::temp_dir);
            let params = DisguiseParams { alpha: *alpha, strength: *strength, seed: *seed };

            let result = pipeline::process_clip(input, &out_dir, &params)?;
            println!("✅ {} frames → {}", result.frames_written, result.artifact.path.display());
            if let Some(duration) = result.duration_secs {
                println!("   final duration: {:.2}s", duration);
            }
        }
        Commands::Batch { input_dir, output_dir, alpha, strength, seed, json } => {
            check_params(*alpha, *strength)?;
            let inputs = batch::collect_videos(input_dir)?;
            if inputs.is_empty() {
                bail!("no video files in {}", input_dir.display());
            }
            let out_dir = output_dir.clone().unwrap_or_else(std::env::temp_dir);
            let params = DisguiseParams { alpha: *alpha, strength: *strength, seed: *seed };

            let report = batch::run(&inputs, &out_dir, &params, &running);
            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "processed {} clip(s), {} failed",
                    report.clips.len(),
                    report.failed_count()
                );
            }
            if report.failed_count() > 0 {
                std::process::exit(1);
            }
        }
        Commands::Interactive => {
            ui::menu::run_menu(&running)?;
        }
    }

    Ok(())
}
