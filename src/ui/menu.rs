use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Input, MultiSelect};

use crate::core::{batch, DisguiseParams};

pub fn run_menu(running: &Arc<AtomicBool>) -> Result<()> {
    // 1. Locate clips
    let dir: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("📂 Video directory")
        .default(".".to_string())
        .interact_text()?;

    let videos = batch::collect_videos(Path::new(&dir))?;
    if videos.is_empty() {
        eprintln!("❌ no video files found in {}", dir);
        return Ok(());
    }

    // 2. Select clips
    let names: Vec<String> = videos
        .iter()
        .map(|p| p.file_name().unwrap_or_default().to_string_lossy().to_string())
        .collect();

    let picked = MultiSelect::with_theme(&ColorfulTheme::default())
        .with_prompt("🎬 Clips to disguise (space to toggle)")
        .items(&names)
        .interact()?;

    if picked.is_empty() {
        eprintln!("nothing selected");
        return Ok(());
    }

    // 3. Tuning
    let alpha: f64 = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("🎚️  Mesh intensity (0.0 - 0.5)")
        .default(0.1)
        .validate_with(|v: &f64| {
            if (0.0..=0.5).contains(v) {
                Ok(())
            } else {
                Err("must be between 0.0 and 0.5")
            }
        })
        .interact_text()?;

    let strength: u32 = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("💫 Warp intensity (0 - 20)")
        .default(5)
        .validate_with(|v: &u32| if *v <= 20 { Ok(()) } else { Err("must be at most 20") })
        .interact_text()?;

    // 4. Run the batch
    let selected: Vec<_> = picked.into_iter().map(|i| videos[i].clone()).collect();
    let out_dir = std::env::temp_dir();
    let params = DisguiseParams { alpha, strength, seed: None };

    println!("\n🚀 disguising {} clip(s) into {}", selected.len(), out_dir.display());
    let report = batch::run(&selected, &out_dir, &params, running);

    println!();
    for clip in &report.clips {
        match &clip.output {
            Some(path) => println!("📥 {}", path),
            None => println!(
                "❌ {} ({})",
                clip.input,
                clip.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }

    Ok(())
}
