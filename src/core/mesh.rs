use anyhow::{bail, Result};
use opencv::{core, imgproc, prelude::*};
use rand::Rng;

/// Parameters for one grid layer. Offsets are taken modulo `spacing`.
#[derive(Debug, Clone, Copy)]
pub struct MeshSpec {
    pub spacing: i32,
    pub thickness: i32,
    pub offset_x: i32,
    pub offset_y: i32,
    pub contrast: f64,
}

impl Default for MeshSpec {
    fn default() -> Self {
        Self { spacing: 40, thickness: 1, offset_x: 0, offset_y: 0, contrast: 1.0 }
    }
}

/// Draw a grayscale-on-black grid: vertical lines at x ≡ offset_x (mod spacing),
/// horizontal lines at y ≡ offset_y (mod spacing). The line shade is a single
/// random base intensity in [180, 255) scaled by `contrast`, clamped to 255.
pub fn generate(width: i32, height: i32, spec: &MeshSpec, rng: &mut impl Rng) -> Result<Mat> {
    let mut mesh = Mat::zeros(height, width, core::CV_8UC3)?.to_mat()?;

    let base: i32 = rng.gen_range(180..255);
    let shade = ((base as f64 * spec.contrast) as i32).min(255) as f64;
    let color = core::Scalar::new(shade, shade, shade, 0.0);

    let mut x = spec.offset_x.rem_euclid(spec.spacing);
    while x < width {
        imgproc::line(
            &mut mesh,
            core::Point::new(x, 0),
            core::Point::new(x, height),
            color,
            spec.thickness,
            imgproc::LINE_8,
            0,
        )?;
        x += spec.spacing;
    }

    let mut y = spec.offset_y.rem_euclid(spec.spacing);
    while y < height {
        imgproc::line(
            &mut mesh,
            core::Point::new(0, y),
            core::Point::new(width, y),
            color,
            spec.thickness,
            imgproc::LINE_8,
            0,
        )?;
        y += spec.spacing;
    }

    Ok(mesh)
}

/// Fold the meshes pairwise with equal 0.5/0.5 weights, in order. This is
/// intentionally NOT an arithmetic mean: every later layer halves the weight
/// of everything folded before it.
pub fn combine(meshes: &[Mat]) -> Result<Mat> {
    let Some((first, rest)) = meshes.split_first() else {
        bail!("mesh sequence is empty");
    };

    let mut combined = first.clone();
    for mesh in rest {
        let mut next = Mat::default();
        core::add_weighted(&combined, 0.5, mesh, 0.5, 0.0, &mut next, -1)?;
        combined = next;
    }
    Ok(combined)
}
