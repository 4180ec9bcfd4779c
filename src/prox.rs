use ndarray::{s, Array1, Array2};
use ndarray_linalg::{JobSvd, SVDDC};

use crate::error::{Error, Result};

fn check_finite(matrix: &Array2<f64>) -> Result<()> {
    if matrix.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(Error::NonFinite { iteration: None })
    }
}

/// Proximal map of `threshold * ||.||_*`, i.e. singular value soft thresholding.
///
/// Decomposes `matrix = U diag(s) V^T`, shrinks every singular value to
/// `max(s_i - threshold, 0)` and reconstructs. Works for any matrix shape.
/// A zero threshold reproduces the input up to reconstruction error.
pub fn prox(matrix: &Array2<f64>, threshold: f64) -> Result<Array2<f64>> {
    if !(threshold >= 0.0 && threshold.is_finite()) {
        return Err(Error::invalid(
            "threshold",
            format!("must be finite and non-negative, got {}", threshold),
        ));
    }
    let (u, singular_values, vt) = thin_svd(matrix)?;

    // Singular values come sorted in descending order, so the ones that
    // survive the shrinkage form a prefix.
    let shrunk: Array1<f64> = singular_values.mapv(|sigma| (sigma - threshold).max(0.0));
    let rank = shrunk.iter().take_while(|&&sigma| sigma > 0.0).count();
    if rank == 0 {
        return Ok(Array2::zeros(matrix.dim()));
    }

    let scaled_u = &u.slice(s![.., ..rank]) * &shrunk.slice(s![..rank]);
    Ok(scaled_u.dot(&vt.slice(s![..rank, ..])))
}

/// Economy decomposition of an `m x n` matrix: `U` is `m x min(m, n)`, `V^T` is `min(m, n) x n`.
fn thin_svd(matrix: &Array2<f64>) -> Result<(Array2<f64>, Array1<f64>, Array2<f64>)> {
    check_finite(matrix)?;
    match decompose(matrix, JobSvd::Some)? {
        (Some(u), singular_values, Some(vt)) => Ok((u, singular_values, vt)),
        _ => Err(Error::NonFinite { iteration: None }),
    }
}

fn decompose(
    matrix: &Array2<f64>,
    job: JobSvd,
) -> Result<(Option<Array2<f64>>, Array1<f64>, Option<Array2<f64>>)> {
    matrix.svddc(job).map_err(|source| Error::Decomposition {
        iteration: None,
        source,
    })
}

/// Singular values in descending order.
pub fn singular_values(matrix: &Array2<f64>) -> Result<Array1<f64>> {
    check_finite(matrix)?;
    let (_, singular_values, _) = decompose(matrix, JobSvd::None)?;
    Ok(singular_values)
}

/// Sum of the singular values.
pub fn nuclear_norm(matrix: &Array2<f64>) -> Result<f64> {
    Ok(singular_values(matrix)?.sum())
}
