//! Small dense symmetric-matrix kernels.
//!
//! Everything both engines need from linear algebra: Kronecker products,
//! partial traces over tensor factors, and a Jacobi eigensolver for the
//! PSD checks and inverse square roots used by POVM sampling. Matrices stay
//! tiny (at most `dim^nb_players` square), so simplicity wins over BLAS.

use ndarray::{Array1, Array2};

/// Jacobi sweep budget; tiny symmetric matrices converge in a handful.
const MAX_JACOBI_SWEEPS: usize = 64;

/// Eigenvalues below this count as zero when inverting.
const EIGEN_FLOOR: f64 = 1e-12;

/// `dim × dim` identity.
#[must_use]
pub fn identity(dim: usize) -> Array2<f64> {
    Array2::eye(dim)
}

#[must_use]
pub fn trace(m: &Array2<f64>) -> f64 {
    m.diag().sum()
}

/// Frobenius inner product `<a, b> = sum_ij a_ij b_ij`.
#[must_use]
pub fn frobenius(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    debug_assert_eq!(a.dim(), b.dim());
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Frobenius norm.
#[must_use]
pub fn norm(m: &Array2<f64>) -> f64 {
    m.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Kronecker product `a ⊗ b`.
#[must_use]
pub fn kron(a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
    let (ar, ac) = a.dim();
    let (br, bc) = b.dim();
    let mut out = Array2::zeros((ar * br, ac * bc));
    for i in 0..ar {
        for j in 0..ac {
            let scale = a[[i, j]];
            if scale == 0.0 {
                continue;
            }
            for k in 0..br {
                for l in 0..bc {
                    out[[i * br + k, j * bc + l]] = scale * b[[k, l]];
                }
            }
        }
    }
    out
}

/// Trace out every tensor factor except `keep` from a matrix acting on
/// `nb_systems` factors of size `dim` each.
#[must_use]
pub fn partial_trace(
    m: &Array2<f64>,
    keep: usize,
    nb_systems: usize,
    dim: usize,
) -> Array2<f64> {
    debug_assert_eq!(m.nrows(), dim.pow(u32::try_from(nb_systems).unwrap_or(u32::MAX)));
    debug_assert!(keep < nb_systems);

    // Basis index layout: factor 0 is most significant. A full index with
    // value `v` at the kept slot splits as high * stride * dim + v * stride
    // + low.
    let stride = dim.pow(u32::try_from(nb_systems - 1 - keep).unwrap_or(u32::MAX));
    let high_count = dim.pow(u32::try_from(keep).unwrap_or(u32::MAX));

    let embed = |high: usize, v: usize, low: usize| high * stride * dim + v * stride + low;

    let mut out = Array2::zeros((dim, dim));
    for a in 0..dim {
        for b in 0..dim {
            let mut sum = 0.0;
            for high in 0..high_count {
                for low in 0..stride {
                    sum += m[[embed(high, a, low), embed(high, b, low)]];
                }
            }
            out[[a, b]] = sum;
        }
    }
    out
}

/// Eigendecomposition of a symmetric matrix by cyclic Jacobi rotations.
///
/// Returns `(eigenvalues, eigenvectors)` with eigenvectors as columns, in
/// no particular order.
#[must_use]
pub fn symmetric_eigen(m: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = m.nrows();
    debug_assert_eq!(n, m.ncols());
    let mut a = m.clone();
    let mut v = identity(n);

    for _ in 0..MAX_JACOBI_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| a[[i, j]] * a[[i, j]])
            .sum();
        if off < 1e-24 {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                if a[[p, q]].abs() < 1e-300 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * a[[p, q]]);
                let t = theta.signum() / (theta.abs() + theta.hypot(1.0));
                let c = 1.0 / t.hypot(1.0);
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    (a.diag().to_owned(), v)
}

/// Smallest eigenvalue of a symmetric matrix.
#[must_use]
pub fn min_eigenvalue(m: &Array2<f64>) -> f64 {
    let (values, _) = symmetric_eigen(m);
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

/// Whether a symmetric matrix is PSD up to `tol`.
#[must_use]
pub fn is_psd(m: &Array2<f64>, tol: f64) -> bool {
    min_eigenvalue(m) > -tol
}

/// `m^{-1/2}` of a symmetric PSD matrix, inverting only eigenvalues above
/// a small floor (pseudo-inverse on the support).
#[must_use]
pub fn inv_sqrt(m: &Array2<f64>) -> Array2<f64> {
    let n = m.nrows();
    let (values, vectors) = symmetric_eigen(m);

    let mut out = Array2::zeros((n, n));
    for (k, &lambda) in values.iter().enumerate() {
        if lambda <= EIGEN_FLOOR {
            continue;
        }
        let scale = 1.0 / lambda.sqrt();
        let column = vectors.column(k);
        for i in 0..n {
            for j in 0..n {
                out[[i, j]] += scale * column[i] * column[j];
            }
        }
    }
    out
}
