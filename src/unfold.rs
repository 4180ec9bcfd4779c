use ndarray::{Array2, Array3, Axis};

use crate::error::{Error, Result};

pub const CHANNELS: usize = 3;

fn check_channels(tensor: &Array3<f64>) -> Result<(usize, usize)> {
    let (height, width, channels) = tensor.dim();
    if channels != CHANNELS {
        return Err(Error::ChannelCount { got: channels });
    }
    Ok((height, width))
}

/// Places the three channel slices side by side: `(H, W, 3) -> (H, 3W)`.
pub fn wide(tensor: &Array3<f64>) -> Result<Array2<f64>> {
    let (height, width) = check_channels(tensor)?;
    Ok(Array2::from_shape_fn((height, CHANNELS * width), |(i, j)| {
        tensor[[i, j % width, j / width]]
    }))
}

/// Stacks the three channel slices on top of each other: `(H, W, 3) -> (3H, W)`.
pub fn tall(tensor: &Array3<f64>) -> Result<Array2<f64>> {
    let (height, width) = check_channels(tensor)?;
    Ok(Array2::from_shape_fn((CHANNELS * height, width), |(i, j)| {
        tensor[[i % height, j, i / height]]
    }))
}

/// Inverse of [`wide`].
pub fn fold_wide(matrix: &Array2<f64>) -> Result<Array3<f64>> {
    let (rows, cols) = matrix.dim();
    if cols % CHANNELS != 0 {
        return Err(Error::NotAnUnfolding {
            unfolding: "wide",
            got: vec![rows, cols],
        });
    }
    let width = cols / CHANNELS;
    Ok(Array3::from_shape_fn((rows, width, CHANNELS), |(i, j, c)| {
        matrix[[i, c * width + j]]
    }))
}

/// Inverse of [`tall`].
pub fn fold_tall(matrix: &Array2<f64>) -> Result<Array3<f64>> {
    let (rows, cols) = matrix.dim();
    if rows % CHANNELS != 0 {
        return Err(Error::NotAnUnfolding {
            unfolding: "tall",
            got: vec![rows, cols],
        });
    }
    let height = rows / CHANNELS;
    Ok(Array3::from_shape_fn((height, cols, CHANNELS), |(i, j, c)| {
        matrix[[c * height + i, j]]
    }))
}

/// Channel `c` of a tensor as an owned `(H, W)` matrix.
pub fn channel(tensor: &Array3<f64>, c: usize) -> Array2<f64> {
    tensor.index_axis(Axis(2), c).to_owned()
}
