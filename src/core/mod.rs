pub mod audio;
pub mod batch;
pub mod effects;
pub mod ffutils;
pub mod mesh;
pub mod pipeline;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

/// A file handed from one pipeline stage to the next. Stages verify the
/// artifact exists before consuming it instead of trusting a bare path.
#[derive(Debug, Clone)]
pub struct MediaArtifact {
    pub path: PathBuf,
    pub kind: MediaKind,
}

impl MediaArtifact {
    pub fn video(path: PathBuf) -> Self {
        Self { path, kind: MediaKind::Video }
    }

    pub fn audio(path: PathBuf) -> Self {
        Self { path, kind: MediaKind::Audio }
    }

    pub fn verify(&self) -> Result<&Path> {
        if !self.path.exists() {
            return Err(anyhow!(
                "expected {:?} artifact missing: {}",
                self.kind,
                self.path.display()
            ));
        }
        Ok(&self.path)
    }
}

/// Tuning knobs exposed by the CLI: mesh blend weight (0.0..=0.5), warp
/// amplitude in pixels (0..=20), optional seed for reproducible output.
#[derive(Debug, Clone, Copy)]
pub struct DisguiseParams {
    pub alpha: f64,
    pub strength: u32,
    pub seed: Option<u64>,
}

impl Default for DisguiseParams {
    fn default() -> Self {
        Self { alpha: 0.1, strength: 5, seed: None }
    }
}

/// Append a timestamped line to debug.log in the working directory.
pub fn debug_log(message: &str) {
    use std::io::Write;
    let mut log_path = std::env::current_dir().unwrap_or_default();
    log_path.push("debug.log");

    if let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let _ = writeln!(file, "[{}] {}", timestamp, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_verify_requires_file() {
        let missing = MediaArtifact::video(PathBuf::from("/definitely/not/here.mp4"));
        assert!(missing.verify().is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mp4");
        std::fs::write(&path, b"x").unwrap();
        assert!(MediaArtifact::video(path).verify().is_ok());
    }
}
