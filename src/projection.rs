//! Principal component projection of an embedding batch to plot coordinates.
//!
//! Batches are tiny (a handful to a few dozen points) while vectors are wide,
//! so the components are found from the `n × n` Gram matrix of the centered
//! batch instead of the `d × d` covariance. For centered data `X = U Σ Vᵀ`, the
//! Gram matrix `X Xᵀ = U Σ² Uᵀ` and the principal component scores `X V` equal
//! `U Σ`, so the eigenvectors of the Gram matrix scaled by the square roots of
//! their eigenvalues are exactly the projected coordinates.
//!
//! Each coordinate is then mapped through `(x + 1) / 2`, which lands in `[0, 1]`
//! for typical unit-length embeddings. Values outside `[-1, 1]` are not clamped.

use ndarray::{Array1, Array2, Axis};

use crate::error::PipelineError;

/// One plot position, 2 or 3 coordinates, positionally aligned with its input.
pub type ProjectedPoint = Vec<f64>;

const MAX_SWEEPS: usize = 100;

/// Number of retained components for a batch of `count` vectors:
/// 3 above three points, otherwise a plane.
pub fn target_dimensions(count: usize) -> usize {
    if count > 3 {
        3
    } else {
        2
    }
}

/// Project `vectors` onto their top principal components and normalize.
///
/// Pure and deterministic: the same batch always yields the same points. The
/// sign of each component is fixed so that its largest-magnitude score is positive.
pub fn project(vectors: &[Vec<f32>]) -> Result<Vec<ProjectedPoint>, PipelineError> {
    let n = vectors.len();
    if n < 2 {
        return Err(PipelineError::InvalidInputShape(format!(
            "need at least 2 vectors, got {n}"
        )));
    }

    let dim = vectors[0].len();
    if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dim) {
        return Err(PipelineError::InvalidInputShape(format!(
            "vector {i} has length {}, expected {dim}",
            v.len()
        )));
    }

    let k = target_dimensions(n);
    if dim < k {
        return Err(PipelineError::InvalidInputShape(format!(
            "vectors of length {dim} cannot be projected to {k} dimensions"
        )));
    }

    let data = Array2::from_shape_fn((n, dim), |(i, j)| f64::from(vectors[i][j]));
    let mean = data
        .mean_axis(Axis(0))
        .ok_or_else(|| PipelineError::InvalidInputShape("empty batch".into()))?;
    let centered = &data - &mean;
    let gram = centered.dot(&centered.t());

    let (eigenvalues, eigenvectors) = symmetric_eigen(gram);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]));

    let mut scores = Array2::<f64>::zeros((n, k));
    for (c, &idx) in order.iter().take(k).enumerate() {
        let scale = eigenvalues[idx].max(0.0).sqrt();
        let mut column = eigenvectors.column(idx).mapv(|u| u * scale);
        orient(&mut column);
        scores.column_mut(c).assign(&column);
    }

    Ok(scores
        .rows()
        .into_iter()
        .map(|row| row.iter().map(|&x| normalize(x)).collect())
        .collect())
}

/// Map a centered coordinate from roughly `[-1, 1]` onto `[0, 1]`.
pub fn normalize(value: f64) -> f64 {
    (value + 1.0) / 2.0
}

/// Flip a component so its largest-magnitude entry is positive.
fn orient(column: &mut Array1<f64>) {
    let pivot = column
        .iter()
        .copied()
        .fold(0.0f64, |best, x| if x.abs() > best.abs() { x } else { best });
    if pivot < 0.0 {
        column.mapv_inplace(|x| -x);
    }
}

/// Eigen-decomposition of a real symmetric matrix by cyclic Jacobi rotations.
///
/// Returns the eigenvalues (unsorted) and a matrix whose columns are the
/// matching unit eigenvectors.
fn symmetric_eigen(mut a: Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut v = Array2::<f64>::eye(n);
    let scale: f64 = a.iter().map(|x| x * x).sum();
    if scale == 0.0 {
        return (Array1::zeros(n), v);
    }

    for _ in 0..MAX_SWEEPS {
        let mut off = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off += a[[p, q]] * a[[p, q]];
            }
        }
        if off <= scale * 1e-30 {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for r in 0..n {
                    let arp = a[[r, p]];
                    let arq = a[[r, q]];
                    a[[r, p]] = c * arp - s * arq;
                    a[[r, q]] = s * arp + c * arq;
                }
                for r in 0..n {
                    let apr = a[[p, r]];
                    let aqr = a[[q, r]];
                    a[[p, r]] = c * apr - s * aqr;
                    a[[q, r]] = s * apr + c * aqr;
                }
                for r in 0..n {
                    let vrp = v[[r, p]];
                    let vrq = v[[r, q]];
                    v[[r, p]] = c * vrp - s * vrq;
                    v[[r, q]] = s * vrp + c * vrq;
                }
            }
        }
    }

    (a.diag().to_owned(), v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn jacobi_recovers_known_spectrum() {
        let m = array![[2.0, 1.0, 0.0], [1.0, 2.0, 0.0], [0.0, 0.0, 5.0]];
        let (values, vectors) = symmetric_eigen(m.clone());

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        assert_close(sorted[0], 1.0);
        assert_close(sorted[1], 3.0);
        assert_close(sorted[2], 5.0);

        // M v = λ v for every column
        for (i, &lambda) in values.iter().enumerate() {
            let col = vectors.column(i);
            let mv = m.dot(&col);
            for r in 0..3 {
                assert_close(mv[r], lambda * col[r]);
            }
        }
    }

    #[test]
    fn jacobi_zero_matrix_is_identity_basis() {
        let (values, vectors) = symmetric_eigen(Array2::zeros((3, 3)));
        assert!(values.iter().all(|&x| x == 0.0));
        assert_eq!(vectors, Array2::<f64>::eye(3));
    }

    #[test]
    fn normalize_maps_unit_interval() {
        assert_close(normalize(-1.0), 0.0);
        assert_close(normalize(0.0), 0.5);
        assert_close(normalize(1.0), 1.0);
        // out-of-range stays out of range
        assert_close(normalize(1.5), 1.25);
    }

    #[test]
    fn orient_makes_largest_entry_positive() {
        let mut col = array![0.2, -0.9, 0.4];
        orient(&mut col);
        assert_eq!(col, array![-0.2, 0.9, -0.4]);
    }

    #[test]
    fn dimension_policy() {
        assert_eq!(target_dimensions(2), 2);
        assert_eq!(target_dimensions(3), 2);
        assert_eq!(target_dimensions(4), 3);
        assert_eq!(target_dimensions(40), 3);
    }
}
