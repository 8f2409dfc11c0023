//! Small dense complex linear algebra on 4×4 spatial covariance matrices.
//!
//! The microphone array is fixed at four channels, so matrices and vectors
//! are stack-allocated nalgebra types.

use nalgebra::{Matrix4, SymmetricEigen, Vector4};
use num_complex::Complex64;

/// Number of microphones in the array.
pub const NUM_CHANNELS: usize = 4;

/// Channel × channel complex matrix (spatial covariance, outer product).
pub type Covariance = Matrix4<Complex64>;

/// Complex vector with one entry per channel (observation, steering, weights).
pub type ChannelVector = Vector4<Complex64>;

/// Lift a real scalar into the complex field.
#[inline]
pub fn real(x: f64) -> Complex64 {
    Complex64::new(x, 0.0)
}

/// `y · yᴴ`, a rank-one Hermitian matrix.
#[inline]
pub fn outer(y: &ChannelVector) -> Covariance {
    y * y.adjoint()
}

/// `real(trace(a · b))` without forming the product.
#[inline]
pub fn trace_product_real(a: &Covariance, b: &Covariance) -> f64 {
    let mut acc = 0.0;
    for i in 0..NUM_CHANNELS {
        for j in 0..NUM_CHANNELS {
            acc += (a[(i, j)] * b[(j, i)]).re;
        }
    }
    acc
}

/// Induced 1-norm: the largest absolute column sum.
pub fn norm1(m: &Covariance) -> f64 {
    m.column_iter()
        .map(|col| col.iter().map(|z| z.norm()).sum::<f64>())
        .fold(0.0, f64::max)
}

/// Inverse by LU decomposition with partial pivoting.
///
/// `Matrix4::try_inverse` uses the closed-form cofactor expansion, which
/// loses all accuracy on nearly singular covariances; every inverse in the
/// crate goes through here instead. `None` if a pivot is exactly zero or the
/// result is not finite.
pub fn inverse(m: &Covariance) -> Option<Covariance> {
    m.lu()
        .try_inverse()
        .filter(|inv| inv.iter().all(|z| z.re.is_finite() && z.im.is_finite()))
}

/// Reciprocal condition number in the 1-norm, `1 / (‖m‖₁ · ‖m⁻¹‖₁)`.
///
/// Returns `0.0` for the zero matrix, for matrices that cannot be inverted,
/// and whenever the inverse is not finite.
pub fn reciprocal_condition(m: &Covariance) -> f64 {
    let anorm = norm1(m);
    if !anorm.is_finite() || anorm <= 0.0 {
        return 0.0;
    }
    match inverse(m) {
        Some(inv) => {
            let inorm = norm1(&inv);
            if inorm.is_finite() && inorm > 0.0 {
                1.0 / (anorm * inorm)
            } else {
                0.0
            }
        }
        None => 0.0,
    }
}

/// Whether `m` equals its conjugate transpose to within `tol`, relative to
/// the magnitude of its largest entry.
pub fn is_hermitian(m: &Covariance, tol: f64) -> bool {
    let scale = m.iter().map(|z| z.norm()).fold(1.0, f64::max);
    let diff = m - m.adjoint();
    diff.iter().all(|z| z.norm() <= tol * scale)
}

/// Eigendecomposition of a Hermitian matrix.
///
/// Only the lower triangle is read. Eigenvalues are real and unsorted; the
/// columns of the returned matrix are the matching unit-norm eigenvectors.
/// Falls back to the diagonal and the identity basis if the solver does not
/// converge.
pub fn hermitian_eigen(m: &Covariance) -> (Vector4<f64>, Covariance) {
    match SymmetricEigen::try_new(*m, f64::EPSILON, 1000) {
        Some(eig) => (eig.eigenvalues, eig.eigenvectors),
        None => {
            log::warn!("hermitian eigensolver did not converge; using the diagonal");
            (m.diagonal().map(|z| z.re), Covariance::identity())
        }
    }
}

/// Entropy of the normalised eigenvalue spectrum of a covariance matrix.
///
/// Diffuse (spatially white) fields spread energy over all eigenvalues and
/// score close to `ln(4)`; a single directional source scores close to 0.
/// Negative eigenvalues from rounding are clamped to zero.
pub fn eigen_entropy(m: &Covariance) -> f64 {
    let (values, _) = hermitian_eigen(m);
    let clamped: Vec<f64> = values.iter().map(|&v| v.max(0.0)).collect();
    let total: f64 = clamped.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return 0.0;
    }
    clamped
        .iter()
        .map(|&v| v / total)
        .filter(|&p| p > 0.0)
        .map(|p| -p * p.ln())
        .sum()
}
