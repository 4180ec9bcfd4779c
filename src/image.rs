use ndarray::Array3;
use std::f64::consts::PI;

use crate::error::{Error, Result};
use crate::unfold::CHANNELS;

/// Smooth benchmark image in `[0, 1]` with low-rank channel slices.
pub fn synthetic(height: usize, width: usize) -> Array3<f64> {
    let h = height.max(1) as f64;
    let w = width.max(1) as f64;
    Array3::from_shape_fn((height, width, CHANNELS), |(i, j, c)| {
        let y = i as f64 / h;
        let x = j as f64 / w;
        let phase = c as f64 * PI / 3.0;
        let value = 0.5
            + 0.25 * (2.0 * PI * y + phase).sin() * (2.0 * PI * x).cos()
            + 0.15 * (PI * x + phase).sin()
            + 0.05 * (4.0 * PI * y).cos();
        value.clamp(0.0, 1.0)
    })
}

fn check_same_shape(a: &Array3<f64>, b: &Array3<f64>) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(Error::ShapeMismatch {
            expected: b.shape().to_vec(),
            got: a.shape().to_vec(),
        });
    }
    Ok(())
}

/// `||estimate - truth|| / ||truth||` in the Frobenius norm.
pub fn relative_error(estimate: &Array3<f64>, truth: &Array3<f64>) -> Result<f64> {
    check_same_shape(estimate, truth)?;
    let diff = (estimate - truth).mapv(|x| x * x).sum().sqrt();
    let norm = truth.mapv(|x| x * x).sum().sqrt();
    Ok(if norm > 0.0 { diff / norm } else { diff })
}

/// Peak signal-to-noise ratio in dB for images with values in `[0, peak]`.
pub fn psnr(estimate: &Array3<f64>, truth: &Array3<f64>, peak: f64) -> Result<f64> {
    check_same_shape(estimate, truth)?;
    let mse = (estimate - truth).mapv(|x| x * x).mean().unwrap_or(0.0);
    Ok(10.0 * (peak * peak / mse).log10())
}
