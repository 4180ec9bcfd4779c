use ndarray::Array2;
use rand::prelude::*;

/// Pixel mask with exactly `floor(height * width * ratio)` erased pixels, placed
/// uniformly at random. `true` marks an observed pixel.
pub fn random_erasure(height: usize, width: usize, ratio: f64, seed: u64) -> Array2<bool> {
    let total = height * width;
    let erased = ((total as f64) * ratio.clamp(0.0, 1.0)).floor() as usize;
    let mut flags: Vec<bool> = (0..total).map(|i| i >= erased).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    flags.shuffle(&mut rng);
    Array2::from_shape_vec((height, width), flags)
        .unwrap_or_else(|_| Array2::from_elem((height, width), true))
}

/// Erases the block spanning the fractional rows `top..bottom` and columns `left..right`.
pub fn erase_block(mask: &mut Array2<bool>, rows: (f64, f64), cols: (f64, f64)) {
    let (height, width) = mask.dim();
    let to_index = |fraction: f64, len: usize| ((fraction.clamp(0.0, 1.0) * len as f64) as usize).min(len);
    let (top, bottom) = (to_index(rows.0, height), to_index(rows.1, height));
    let (left, right) = (to_index(cols.0, width), to_index(cols.1, width));
    for i in top..bottom {
        for j in left..right {
            mask[[i, j]] = false;
        }
    }
}
