//! Diagonal loading that keeps covariance matrices invertible.

use crate::linalg::{self, Covariance, real, reciprocal_condition};

/// Reciprocal condition threshold and likelihood floor used throughout.
pub const THETA: f64 = 1e-6;

/// Powers of ten tried, smallest first, when a matrix is ill-conditioned.
const LOADING_EXPONENTS: std::ops::RangeInclusive<i32> = -6..=-1;

/// Outcome of [`stabilize`].
#[derive(Debug, Clone, Copy)]
pub struct Stabilized {
    /// The (possibly loaded) matrix.
    pub matrix: Covariance,
    /// Number of `10^k · I` additions applied, 0 if the input was already stable.
    pub loadings: usize,
    /// Reciprocal condition number of `matrix`.
    pub rcond: f64,
}

impl Stabilized {
    /// Whether the final matrix meets the threshold it was stabilized against.
    pub fn is_stable(&self, theta: f64) -> bool {
        self.rcond >= theta
    }

    /// Inverse of the stabilized matrix.
    ///
    /// If the loading ladder was exhausted and the matrix is still exactly
    /// singular, a further `theta · ‖m‖₁ · I` is added before inverting, and
    /// the identity is returned as a last resort.
    pub fn inverse(&self, theta: f64) -> Covariance {
        if let Some(inv) = linalg::inverse(&self.matrix) {
            return inv;
        }
        let load = theta * linalg::norm1(&self.matrix).max(1.0);
        log::warn!("stabilized covariance still singular; loading by {load:e}");
        linalg::inverse(&(self.matrix + Covariance::identity() * real(load)))
            .unwrap_or_else(Covariance::identity)
    }
}

/// Regularise a Hermitian matrix until its reciprocal condition number
/// reaches `theta`.
///
/// A matrix that already satisfies the threshold is returned unchanged.
/// Otherwise `10^k · I` is added for k = -6, -5, ..., -1, cumulatively, and
/// the condition is re-tested after every addition. If all six loadings are
/// spent the last matrix is returned as a best effort.
///
/// # Example
/// ```
/// use cgmm_mvdr::linalg::Covariance;
/// use cgmm_mvdr::stabilize::{stabilize, THETA};
///
/// let singular = Covariance::zeros();
/// let fixed = stabilize(&singular, THETA);
/// assert_eq!(fixed.loadings, 1);
/// assert!(fixed.is_stable(THETA));
/// ```
pub fn stabilize(m: &Covariance, theta: f64) -> Stabilized {
    let mut matrix = *m;
    let mut rcond = reciprocal_condition(&matrix);
    let mut loadings = 0;

    if rcond >= theta {
        return Stabilized {
            matrix,
            loadings,
            rcond,
        };
    }

    for k in LOADING_EXPONENTS {
        matrix += Covariance::identity() * real(10f64.powi(k));
        loadings += 1;
        rcond = reciprocal_condition(&matrix);
        if rcond >= theta {
            break;
        }
    }

    if rcond < theta {
        log::warn!("stabilizer exhausted after {loadings} loadings (rcond {rcond:e})");
    }

    Stabilized {
        matrix,
        loadings,
        rcond,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::{ChannelVector, is_hermitian, outer};
    use num_complex::Complex64;

    fn rank_one(scale: f64) -> Covariance {
        let y = ChannelVector::new(
            Complex64::new(scale, 0.0),
            Complex64::new(0.0, scale),
            Complex64::new(-scale, 0.0),
            Complex64::new(0.0, -scale),
        );
        outer(&y)
    }

    #[test]
    fn stable_matrix_is_untouched() {
        let m = Covariance::identity() * real(3.0);
        let out = stabilize(&m, THETA);
        assert_eq!(out.loadings, 0);
        assert_eq!(out.matrix, m);
    }

    #[test]
    fn stabilizing_twice_is_idempotent() {
        let first = stabilize(&rank_one(1.0), THETA);
        assert!(first.is_stable(THETA));
        let second = stabilize(&first.matrix, THETA);
        assert_eq!(second.loadings, 0);
        assert_eq!(second.matrix, first.matrix);
    }

    #[test]
    fn loud_rank_one_needs_larger_loading() {
        // rcond of a·uuᴴ + L·I is L / (1.5a + L); a = 1600 needs L >= 2.4e-3.
        let out = stabilize(&rank_one(20.0), THETA);
        assert!(out.is_stable(THETA));
        assert_eq!(out.loadings, 5);
    }

    #[test]
    fn exhausted_ladder_returns_best_effort() {
        let out = stabilize(&rank_one(1e4), THETA);
        assert_eq!(out.loadings, 6);
        assert!(!out.is_stable(THETA));
        assert!(is_hermitian(&out.matrix, 1e-12));
        assert!(out.inverse(THETA).iter().all(|z| z.re.is_finite() && z.im.is_finite()));
    }

    #[test]
    fn rcond_grows_along_the_ladder() {
        let mut m = rank_one(20.0);
        let mut previous = reciprocal_condition(&m);
        for k in LOADING_EXPONENTS {
            m += Covariance::identity() * real(10f64.powi(k));
            let r = reciprocal_condition(&m);
            assert!(r >= previous, "rcond fell from {previous:e} to {r:e} at 1e{k}");
            previous = r;
        }
    }

    #[test]
    fn reported_rcond_matches_singular_values() {
        for scale in [0.5, 1.0, 5.0, 20.0, 100.0, 1e4] {
            let out = stabilize(&rank_one(scale), THETA);
            let sv = out.matrix.singular_values();
            let reference = sv.min() / sv.max();
            assert!(
                out.rcond >= reference / 5.0 && out.rcond <= reference * 5.0,
                "scale {scale}: reported {:e}, singular values give {reference:e}",
                out.rcond
            );
            if out.is_stable(THETA) {
                assert!(reference >= THETA / 5.0);
            }
            let residual = out.matrix * out.inverse(THETA) - Covariance::identity();
            assert!(residual.norm() < 1e-4, "scale {scale}: residual {}", residual.norm());
        }
    }

    #[test]
    fn loading_preserves_hermitian_symmetry() {
        let out = stabilize(&rank_one(2.0), THETA);
        assert!(is_hermitian(&out.matrix, 1e-12));
    }
}
