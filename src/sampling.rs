use ndarray::{Array2, Array3, Zip};

use crate::error::{Error, Result};
use crate::unfold::CHANNELS;

/// Selects the observed entries of an image tensor.
///
/// The operator is a coordinate projection, so it is self-adjoint and idempotent:
/// the gradient of `0.5 * ||A(Z) - A(Z_obs)||^2` is simply `A(Z) - A(Z_obs)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingOperator {
    observed: Array3<bool>,
}

impl SamplingOperator {
    /// Builds the operator from a per-pixel mask, shared by all three channels.
    /// `true` marks an observed pixel.
    pub fn from_pixel_mask(mask: &Array2<bool>) -> Self {
        let observed = Array3::from_shape_fn((mask.nrows(), mask.ncols(), CHANNELS), |(i, j, _)| {
            mask[[i, j]]
        });
        SamplingOperator { observed }
    }

    /// Builds the operator from a per-entry mask of shape `(H, W, 3)`.
    pub fn from_entry_mask(mask: Array3<bool>) -> Result<Self> {
        let channels = mask.dim().2;
        if channels != CHANNELS {
            return Err(Error::ChannelCount { got: channels });
        }
        Ok(SamplingOperator { observed: mask })
    }

    pub fn mask(&self) -> &Array3<bool> {
        &self.observed
    }

    pub fn shape(&self) -> &[usize] {
        self.observed.shape()
    }

    pub fn observed_count(&self) -> usize {
        self.observed.iter().filter(|&&m| m).count()
    }

    /// Fraction of erased entries.
    pub fn erased_ratio(&self) -> f64 {
        let total = self.observed.len();
        if total == 0 {
            return 0.0;
        }
        (total - self.observed_count()) as f64 / total as f64
    }

    fn check_shape(&self, tensor: &Array3<f64>) -> Result<()> {
        if tensor.shape() != self.observed.shape() {
            return Err(Error::ShapeMismatch {
                expected: self.observed.shape().to_vec(),
                got: tensor.shape().to_vec(),
            });
        }
        Ok(())
    }

    /// Zeroes every erased entry and passes observed entries through.
    pub fn apply(&self, tensor: &Array3<f64>) -> Result<Array3<f64>> {
        self.check_shape(tensor)?;
        let mut projected = tensor.clone();
        Zip::from(&mut projected)
            .and(&self.observed)
            .for_each(|value, &is_observed| {
                if !is_observed {
                    *value = 0.0;
                }
            });
        Ok(projected)
    }

    /// `apply(tensor) - apply(observed)`, the gradient of the data-fidelity term at `tensor`.
    pub fn residual(&self, tensor: &Array3<f64>, observed: &Array3<f64>) -> Result<Array3<f64>> {
        self.check_shape(tensor)?;
        self.check_shape(observed)?;
        Ok(Zip::from(tensor)
            .and(observed)
            .and(&self.observed)
            .map_collect(|&value, &target, &is_observed| {
                if is_observed {
                    value - target
                } else {
                    0.0
                }
            }))
    }

    /// `0.5 * ||apply(tensor) - apply(observed)||^2`
    pub fn data_term(&self, tensor: &Array3<f64>, observed: &Array3<f64>) -> Result<f64> {
        let residual = self.residual(tensor, observed)?;
        Ok(0.5 * residual.iter().map(|r| r * r).sum::<f64>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;
    use rand::prelude::*;

    fn random_tensor(height: usize, width: usize, seed: u64) -> Array3<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        Array3::from_shape_fn((height, width, CHANNELS), |_| rng.gen::<f64>() + 0.5)
    }

    fn checkerboard(height: usize, width: usize) -> Array2<bool> {
        Array2::from_shape_fn((height, width), |(i, j)| (i + j) % 2 == 0)
    }

    #[test]
    fn pixel_mask_applies_to_every_channel() {
        let op = SamplingOperator::from_pixel_mask(&arr2(&[[true, false], [false, true]]));
        assert_eq!(op.shape(), &[2, 2, 3]);
        assert_eq!(op.observed_count(), 6);
        assert_abs_diff_eq!(op.erased_ratio(), 0.5);

        let projected = op.apply(&Array3::from_elem((2, 2, 3), 2.0)).unwrap();
        for c in 0..CHANNELS {
            assert_eq!(projected[[0, 0, c]], 2.0);
            assert_eq!(projected[[0, 1, c]], 0.0);
            assert_eq!(projected[[1, 0, c]], 0.0);
            assert_eq!(projected[[1, 1, c]], 2.0);
        }
    }

    #[test]
    fn apply_is_idempotent() {
        let op = SamplingOperator::from_pixel_mask(&checkerboard(6, 5));
        let tensor = random_tensor(6, 5, 3);
        let once = op.apply(&tensor).unwrap();
        assert_eq!(op.apply(&once).unwrap(), once);
    }

    #[test]
    fn residual_matches_difference_of_projections() {
        let op = SamplingOperator::from_pixel_mask(&checkerboard(5, 4));
        let tensor = random_tensor(5, 4, 4);
        let observed = random_tensor(5, 4, 5);
        let expected = op.apply(&tensor).unwrap() - op.apply(&observed).unwrap();
        assert_eq!(op.residual(&tensor, &observed).unwrap(), expected);
        assert!(op.data_term(&tensor, &observed).unwrap() > 0.0);
        assert_abs_diff_eq!(op.data_term(&observed, &observed).unwrap(), 0.0);
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let op = SamplingOperator::from_pixel_mask(&checkerboard(4, 4));
        let tensor = random_tensor(4, 5, 6);
        match op.apply(&tensor) {
            Err(Error::ShapeMismatch { expected, got }) => {
                assert_eq!(expected, vec![4, 4, 3]);
                assert_eq!(got, vec![4, 5, 3]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(op.residual(&random_tensor(4, 4, 7), &tensor).is_err());
    }

    #[test]
    fn entry_mask_needs_three_channels() {
        let mask = Array3::from_elem((2, 2, 1), true);
        assert!(matches!(
            SamplingOperator::from_entry_mask(mask),
            Err(Error::ChannelCount { got: 1 })
        ));
    }
}
