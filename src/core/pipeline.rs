use std::path::Path;

use anyhow::{bail, Context, Result};
use opencv::{core, prelude::*, videoio};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use crate::core::audio;
use crate::core::debug_log;
use crate::core::effects::{self, WarpField};
use crate::core::ffutils::FfTool;
use crate::core::mesh::{self, MeshSpec};
use crate::core::{DisguiseParams, MediaArtifact};

const MESH_LAYERS: u32 = 4;
const SPACING_CHOICES: [i32; 3] = [30, 40, 50];

pub struct ClipResult {
    pub artifact: MediaArtifact,
    pub frames_written: u32,
    pub duration_secs: Option<f64>,
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .with_context(|| format!("non-UTF-8 path {}", path.display()))
}

/// Per-frame, per-layer grid offsets. The products are widened to u64 so the
/// pattern cannot overflow on very long clips.
fn mesh_offsets(index: u32, layer: u32, spacing: i32) -> (i32, i32) {
    let base = index as u64 * (layer + 1) as u64;
    (
        (base * 2 % spacing as u64) as i32,
        (base * 3 % spacing as u64) as i32,
    )
}

/// Run the whole disguise pipeline on one clip: per-frame rewrite, audio
/// extract, audio disguise, remux. Returns the final deliverable artifact.
pub fn process_clip(input: &Path, out_dir: &Path, params: &DisguiseParams) -> Result<ClipResult> {
    if !input.exists() {
        bail!("input clip does not exist: {}", input.display());
    }

    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    // Fresh temp names per clip so batch runs cannot collide
    let uid = Uuid::new_v4().simple().to_string();
    let video_out = out_dir.join(format!("mod_{}.mp4", uid));

    let frames_written = rewrite_frames(input, &video_out, params, &mut rng)?;
    let modified = MediaArtifact::video(video_out);
    modified.verify()?;

    // Audio comes from the ORIGINAL clip; the rewritten stream has none
    let extracted = MediaArtifact::audio(out_dir.join(format!("aud_{}.aac", uid)));
    FfTool::run(&[
        "-y",
        "-i",
        path_str(input)?,
        "-vn",
        "-acodec",
        "copy",
        "-loglevel",
        "error",
        path_str(&extracted.path)?,
    ])
    .context("audio extraction failed")?;

    let db = audio::draw_gain_db(&mut rng);
    debug_log(&format!("audio gain shift: {} dB", db));
    let disguised = MediaArtifact::audio(audio::disguise_track(extracted.verify()?, db)?);

    let final_out = MediaArtifact::video(out_dir.join(format!("mod_{}_final.mp4", uid)));
    FfTool::run(&[
        "-y",
        "-i",
        path_str(modified.verify()?)?,
        "-i",
        path_str(disguised.verify()?)?,
        "-c:v",
        "copy",
        "-c:a",
        "aac",
        "-shortest",
        "-loglevel",
        "error",
        path_str(&final_out.path)?,
    ])
    .context("remux failed")?;
    final_out.verify()?;

    let duration_secs = FfTool::duration(&final_out.path).ok();
    if let Some(duration) = duration_secs {
        debug_log(&format!("final duration: {:.3}s", duration));
    }

    Ok(ClipResult { artifact: final_out, frames_written, duration_secs })
}

/// The per-frame loop: read, overlay 4 combined meshes, run the effect chain,
/// write. Terminates quietly when the source yields fewer frames than declared.
fn rewrite_frames(
    input: &Path,
    output: &Path,
    params: &DisguiseParams,
    rng: &mut StdRng,
) -> Result<u32> {
    let mut capture = videoio::VideoCapture::from_file(path_str(input)?, videoio::CAP_ANY)?;
    if !capture.is_opened()? {
        bail!("cannot open video file {}", input.display());
    }

    let fps = capture.get(videoio::CAP_PROP_FPS)?;
    let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32;
    let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32;
    let declared = capture.get(videoio::CAP_PROP_FRAME_COUNT)? as u32;

    debug_log(&format!("=== Disguise pipeline: {} ===", input.display()));
    debug_log(&format!("{}x{} @ {:.2} fps, {} declared frames", width, height, fps, declared));

    if width <= 0 || height <= 0 {
        bail!("clip reports invalid geometry {}x{}", width, height);
    }

    let fourcc = videoio::VideoWriter::fourcc('m', 'p', '4', 'v')?;
    let mut writer = videoio::VideoWriter::new(
        path_str(output)?,
        fourcc,
        fps,
        core::Size::new(width, height),
        true,
    )?;
    if !writer.is_opened()? {
        bail!("cannot open video writer {}", output.display());
    }

    let warp = WarpField::new(width, height, params.strength as f64)?;

    let mut written = 0u32;
    let mut frame = Mat::default();
    for index in 0..declared {
        // Fewer frames than declared is normal; stop quietly
        if !capture.read(&mut frame)? || frame.empty() {
            break;
        }

        let mut layers = Vec::with_capacity(MESH_LAYERS as usize);
        for layer in 0..MESH_LAYERS {
            let spacing = SPACING_CHOICES.choose(rng).copied().unwrap_or(40);
            let (offset_x, offset_y) = mesh_offsets(index, layer, spacing);
            let spec = MeshSpec {
                spacing,
                offset_x,
                offset_y,
                contrast: rng.gen_range(0.8..1.2),
                ..MeshSpec::default()
            };
            layers.push(mesh::generate(width, height, &spec, rng)?);
        }
        let combined = mesh::combine(&layers)?;

        let disguised = effects::disguise_frame(&frame, &combined, params.alpha, &warp, rng)?;
        writer.write(&disguised)?;
        written += 1;
    }

    // Error paths release via Drop; the happy path releases eagerly so ffmpeg
    // sees a fully flushed file
    capture.release()?;
    writer.release()?;

    if written == 0 {
        bail!("no decodable frames in {}", input.display());
    }
    debug_log(&format!("wrote {} frames to {}", written, output.display()));
    Ok(written)
}
