use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Context, Result};

use crate::core::debug_log;

pub struct FfTool;

impl FfTool {
    /// Run ffmpeg with the given arguments. A non-zero exit is an error; the
    /// stderr tail rides along in the message so a batch report stays useful.
    pub fn run(args: &[&str]) -> Result<()> {
        debug_log(&format!("ffmpeg {}", args.join(" ")));

        let output = Command::new("ffmpeg")
            .args(args)
            .output()
            .context("failed to launch ffmpeg (is it on PATH?)")?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut tail: Vec<&str> = stderr.lines().rev().take(8).collect();
        tail.reverse();
        debug_log(&format!("ffmpeg failed ({}):\n{}", output.status, tail.join("\n")));
        Err(anyhow!("ffmpeg exited with {}: {}", output.status, tail.join(" | ")))
    }

    /// Container duration in seconds, via ffprobe.
    pub fn duration(src: &Path) -> Result<f64> {
        let output = Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(src)
            .output()
            .context("failed to launch ffprobe (is it on PATH?)")?;

        if !output.status.success() {
            return Err(anyhow!("ffprobe failed on {}", src.display()));
        }

        let text = String::from_utf8(output.stdout)?;
        text.trim()
            .parse::<f64>()
            .with_context(|| format!("unparsable ffprobe duration {:?}", text.trim()))
    }

    /// `<stem>_<suffix>.<ext>` in the same directory as `src`.
    pub fn sibling(src: &Path, suffix: &str, ext: &str) -> PathBuf {
        let stem = src.file_stem().and_then(|s| s.to_str()).unwrap_or("clip");
        src.with_file_name(format!("{}_{}.{}", stem, suffix, ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sibling_appends_suffix_and_swaps_extension() {
        let p = FfTool::sibling(Path::new("/tmp/work/aud_1234.aac"), "furtif", "wav");
        assert_eq!(p, PathBuf::from("/tmp/work/aud_1234_furtif.wav"));
    }

    #[test]
    fn test_sibling_tolerates_extensionless_input() {
        let p = FfTool::sibling(Path::new("/tmp/track"), "furtif", "wav");
        assert_eq!(p, PathBuf::from("/tmp/track_furtif.wav"));
    }

    #[test]
    fn test_run_surfaces_transcoder_failure() {
        // Either ffmpeg is absent (launch error) or it rejects the flag with
        // a non-zero exit; both must come back as Err, never pass silently
        assert!(FfTool::run(&["-totally_invalid_flag"]).is_err());
    }
}
