use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use serde::Serialize;

use crate::core::pipeline;
use crate::core::DisguiseParams;

#[derive(Debug, Serialize)]
pub struct ClipReport {
    pub input: String,
    pub output: Option<String>,
    pub frames_written: u32,
    pub duration_secs: Option<f64>,
    pub elapsed_secs: f64,
    pub error: Option<String>,
}

impl ClipReport {
    pub fn ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub started: String,
    pub finished: String,
    pub clips: Vec<ClipReport>,
}

impl BatchReport {
    pub fn failed_count(&self) -> usize {
        self.clips.iter().filter(|c| !c.ok()).count()
    }
}

/// Process every clip in order, one at a time. A failed clip is recorded and
/// the loop moves on; Ctrl-C stops between clips, never mid-clip.
pub fn run(
    inputs: &[PathBuf],
    out_dir: &Path,
    params: &DisguiseParams,
    running: &Arc<AtomicBool>,
) -> BatchReport {
    let started = chrono::Local::now().to_rfc3339();
    let mut clips = Vec::with_capacity(inputs.len());

    for input in inputs {
        if !running.load(Ordering::SeqCst) {
            eprintln!("⚠️  interrupted, skipping remaining clips");
            break;
        }

        println!("🎞️  processing {}", input.display());
        let start = Instant::now();
        let report = match pipeline::process_clip(input, out_dir, params) {
            Ok(result) => {
                println!("✅ {} → {}", input.display(), result.artifact.path.display());
                ClipReport {
                    input: input.display().to_string(),
                    output: Some(result.artifact.path.display().to_string()),
                    frames_written: result.frames_written,
                    duration_secs: result.duration_secs,
                    elapsed_secs: start.elapsed().as_secs_f64(),
                    error: None,
                }
            }
            Err(e) => {
                eprintln!("❌ {} failed: {:#}", input.display(), e);
                ClipReport {
                    input: input.display().to_string(),
                    output: None,
                    frames_written: 0,
                    duration_secs: None,
                    elapsed_secs: start.elapsed().as_secs_f64(),
                    error: Some(format!("{:#}", e)),
                }
            }
        };
        clips.push(report);
    }

    BatchReport { started, finished: chrono::Local::now().to_rfc3339(), clips }
}

/// Video files in `dir`, sorted for a stable processing order.
pub fn collect_videos(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut videos: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase();
            matches!(ext.as_str(), "mp4" | "mkv" | "avi" | "mov" | "webm")
        })
        .collect();
    videos.sort();
    Ok(videos)
}
