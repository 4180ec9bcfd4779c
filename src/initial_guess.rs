use ndarray::{Array2, Array3};

use crate::error::Result;
use crate::sampling::SamplingOperator;
use crate::unfold::CHANNELS;

/// Observed entries kept, erased entries set to zero.
pub fn zero_fill(image: &Array3<f64>, sampling: &SamplingOperator) -> Result<Array3<f64>> {
    sampling.apply(image)
}

/// Observed entries kept; each erased entry is replaced by the mean of the observed
/// entries in its row of the same channel, falling back to its column and then to
/// the whole channel.
pub fn mean_fill(image: &Array3<f64>, sampling: &SamplingOperator) -> Result<Array3<f64>> {
    let mut completed = sampling.apply(image)?;
    let (rows, cols, _) = image.dim();
    let mask = sampling.mask();

    for c in 0..CHANNELS {
        let mut row_sums = vec![(0.0, 0usize); rows];
        let mut col_sums = vec![(0.0, 0usize); cols];
        for i in 0..rows {
            for j in 0..cols {
                if mask[[i, j, c]] {
                    let value = image[[i, j, c]];
                    row_sums[i].0 += value;
                    row_sums[i].1 += 1;
                    col_sums[j].0 += value;
                    col_sums[j].1 += 1;
                }
            }
        }

        let (total, count) = row_sums
            .iter()
            .fold((0.0, 0), |(sum, n), &(s, k)| (sum + s, n + k));
        let channel_average = average(total, count).unwrap_or(0.0);
        let row_averages: Vec<Option<f64>> =
            row_sums.iter().map(|&(s, n)| average(s, n)).collect();
        let col_averages: Vec<Option<f64>> =
            col_sums.iter().map(|&(s, n)| average(s, n)).collect();

        let fill = Array2::from_shape_fn((rows, cols), |(i, j)| {
            row_averages[i]
                .or(col_averages[j])
                .unwrap_or(channel_average)
        });
        for ((i, j), value) in fill.indexed_iter() {
            if !mask[[i, j, c]] {
                completed[[i, j, c]] = *value;
            }
        }
    }

    Ok(completed)
}

fn average(sum: f64, count: usize) -> Option<f64> {
    (count > 0).then(|| sum / count as f64)
}
