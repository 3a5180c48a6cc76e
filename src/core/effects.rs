use anyhow::{anyhow, Result};
use opencv::{core, imgproc, prelude::*};
use rand::Rng;
use rand_distr::{Distribution, Normal};

pub const NOISE_INTENSITY: f64 = 0.03;

/// Sinusoidal displacement fields for `imgproc::remap`. The fields depend only
/// on the clip geometry and warp strength, so the pipeline builds one per clip
/// and reuses it for every frame.
pub struct WarpField {
    map_x: Mat,
    map_y: Mat,
}

impl WarpField {
    pub fn new(width: i32, height: i32, strength: f64) -> Result<Self> {
        let mut map_x =
            Mat::new_rows_cols_with_default(height, width, core::CV_32FC1, core::Scalar::all(0.0))?;
        let mut map_y =
            Mat::new_rows_cols_with_default(height, width, core::CV_32FC1, core::Scalar::all(0.0))?;

        // One full period across each axis, endpoints inclusive
        let step_x = if width > 1 { std::f64::consts::TAU / (width - 1) as f64 } else { 0.0 };
        let step_y = if height > 1 { std::f64::consts::TAU / (height - 1) as f64 } else { 0.0 };

        for y in 0..height {
            let dy = (step_y * y as f64).cos() * strength;
            for x in 0..width {
                let dx = (step_x * x as f64).sin() * strength;
                *map_x.at_2d_mut::<f32>(y, x)? = (x as f64 + dx) as f32;
                *map_y.at_2d_mut::<f32>(y, x)? = (y as f64 + dy) as f32;
            }
        }

        Ok(Self { map_x, map_y })
    }

    pub fn apply(&self, frame: &Mat) -> Result<Mat> {
        let mut warped = Mat::default();
        imgproc::remap(
            frame,
            &mut warped,
            &self.map_x,
            &self.map_y,
            imgproc::INTER_LINEAR,
            core::BORDER_CONSTANT,
            core::Scalar::default(),
        )?;
        Ok(warped)
    }
}

/// Blend the combined mesh over the frame. The weights sum past 1.0 on bright
/// pixels; the u8 result saturates.
pub fn apply_mesh(frame: &Mat, mesh: &Mat, alpha: f64) -> Result<Mat> {
    let mut blended = Mat::default();
    core::add_weighted(frame, 1.0, mesh, alpha, 0.0, &mut blended, -1)?;
    Ok(blended)
}

/// Soft-light diffusion: the frame blended with a 9x9 Gaussian-blurred copy of
/// itself at 0.85/0.25.
pub fn add_glow(frame: &Mat) -> Result<Mat> {
    let mut blur = Mat::default();
    imgproc::gaussian_blur(
        frame,
        &mut blur,
        core::Size::new(9, 9),
        0.0,
        0.0,
        core::BORDER_DEFAULT,
    )?;
    let mut glowed = Mat::default();
    core::add_weighted(frame, 0.85, &blur, 0.25, 0.0, &mut glowed, -1)?;
    Ok(glowed)
}

/// Per-pixel Gaussian noise with sigma = intensity * 255, summed in an i16
/// domain so negative excursions cannot wrap, then saturated back to u8.
pub fn add_noise(frame: &Mat, intensity: f64, rng: &mut impl Rng) -> Result<Mat> {
    let normal = Normal::new(0.0, intensity * 255.0)
        .map_err(|e| anyhow!("invalid noise sigma: {}", e))?;

    let rows = frame.rows();
    let cols = frame.cols();
    let mut noise =
        Mat::new_rows_cols_with_default(rows, cols, core::CV_16SC3, core::Scalar::all(0.0))?;
    for y in 0..rows {
        for x in 0..cols {
            let px = noise.at_2d_mut::<core::Vec3s>(y, x)?;
            for c in 0..3 {
                px[c] = normal.sample(rng) as i16;
            }
        }
    }

    let mut wide = Mat::default();
    frame.convert_to(&mut wide, core::CV_16SC3, 1.0, 0.0)?;
    let mut sum = Mat::default();
    core::add(&wide, &noise, &mut sum, &core::no_array(), -1)?;

    let mut noisy = Mat::default();
    sum.convert_to(&mut noisy, core::CV_8UC3, 1.0, 0.0)?;
    Ok(noisy)
}

/// Scale every channel by `factor`; convert_to saturates at the u8 bounds.
pub fn vary_brightness(frame: &Mat, factor: f64) -> Result<Mat> {
    let mut scaled = Mat::default();
    frame.convert_to(&mut scaled, -1, factor, 0.0)?;
    Ok(scaled)
}

/// The fixed effect order: mesh-apply → warp → glow → noise → brightness.
/// The brightness factor is drawn fresh per frame from [0.95, 1.05).
pub fn disguise_frame(
    frame: &Mat,
    mesh: &Mat,
    alpha: f64,
    warp: &WarpField,
    rng: &mut impl Rng,
) -> Result<Mat> {
    let mut out = apply_mesh(frame, mesh, alpha)?;
    out = warp.apply(&out)?;
    out = add_glow(&out)?;
    out = add_noise(&out, NOISE_INTENSITY, rng)?;
    let factor = rng.gen_range(0.95..1.05);
    vary_brightness(&out, factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::Vec3b;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn flat(value: u8, rows: i32, cols: i32) -> Mat {
        Mat::new_rows_cols_with_default(rows, cols, core::CV_8UC3, core::Scalar::all(value as f64))
            .unwrap()
    }

    fn gradient_frame(rows: i32, cols: i32) -> Mat {
        let mut frame = flat(0, rows, cols);
        for y in 0..rows {
            for x in 0..cols {
                let v = ((x + y) % 256) as u8;
                *frame.at_2d_mut::<Vec3b>(y, x).unwrap() = Vec3b::from([v, v, v]);
            }
        }
        frame
    }

    fn assert_same_shape(a: &Mat, b: &Mat) {
        assert_eq!(a.rows(), b.rows());
        assert_eq!(a.cols(), b.cols());
        assert_eq!(a.typ(), b.typ());
    }

    #[test]
    fn test_every_effect_preserves_shape() {
        let mut rng = StdRng::seed_from_u64(3);
        let frame = gradient_frame(24, 32);
        let mesh = flat(250, 24, 32);
        let warp = WarpField::new(32, 24, 5.0).unwrap();

        assert_same_shape(&frame, &apply_mesh(&frame, &mesh, 0.5).unwrap());
        assert_same_shape(&frame, &warp.apply(&frame).unwrap());
        assert_same_shape(&frame, &add_glow(&frame).unwrap());
        assert_same_shape(&frame, &add_noise(&frame, NOISE_INTENSITY, &mut rng).unwrap());
        assert_same_shape(&frame, &vary_brightness(&frame, 1.05).unwrap());
        assert_same_shape(&frame, &disguise_frame(&frame, &mesh, 0.1, &warp, &mut rng).unwrap());
    }

    #[test]
    fn test_mesh_blend_saturates() {
        let frame = flat(250, 4, 4);
        let mesh = flat(250, 4, 4);
        // 250 + 0.5 * 250 clamps at 255
        let blended = apply_mesh(&frame, &mesh, 0.5).unwrap();
        assert_eq!(blended.at_2d::<Vec3b>(0, 0).unwrap()[0], 255);
    }

    #[test]
    fn test_noise_on_black_frame_does_not_wrap() {
        let mut rng = StdRng::seed_from_u64(11);
        let frame = flat(0, 16, 16);
        let noisy = add_noise(&frame, NOISE_INTENSITY, &mut rng).unwrap();

        // sigma is ~7.65 here; a wrapped negative sample would show up near 255
        for y in 0..16 {
            for x in 0..16 {
                let px = *noisy.at_2d::<Vec3b>(y, x).unwrap();
                for c in 0..3 {
                    assert!(px[c] < 100, "wraparound value {} at ({}, {})", px[c], x, y);
                }
            }
        }
    }

    #[test]
    fn test_brightness_saturates_at_the_top() {
        let bright = vary_brightness(&flat(250, 4, 4), 1.05).unwrap();
        assert_eq!(bright.at_2d::<Vec3b>(0, 0).unwrap()[0], 255);

        let dim = vary_brightness(&flat(100, 4, 4), 0.95).unwrap();
        assert_eq!(dim.at_2d::<Vec3b>(0, 0).unwrap()[0], 95);
    }

    #[test]
    fn test_warp_field_spans_one_full_period() {
        let warp = WarpField::new(16, 16, 5.0).unwrap();

        // sin(0) = 0 and cos(0) = 1 anchor the top-left corner
        assert_eq!(*warp.map_x.at_2d::<f32>(0, 0).unwrap(), 0.0);
        assert_eq!(*warp.map_y.at_2d::<f32>(0, 0).unwrap(), 5.0);

        // the last column completes the period and lands back on itself
        let last = *warp.map_x.at_2d::<f32>(0, 15).unwrap();
        assert!((last - 15.0).abs() < 1e-4);
    }
}
