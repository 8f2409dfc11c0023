//! Steering-vector extraction and MVDR beamformer design and application.

use crate::cgmm::SpatialCovariances;
use crate::frontend::MultichannelSpectrogram;
use crate::linalg::{self, ChannelVector, Covariance, real};
use ndarray::Array2;
use num_complex::Complex32;

/// Which eigenvector of the target covariance is taken as steering vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SteeringSelection {
    /// Eigenvector of the largest-magnitude eigenvalue (single dominant source).
    #[default]
    Dominant,
    /// Eigenvector of the smallest-magnitude eigenvalue. This is what taking
    /// the first column of an ascending eigensolver yields; kept for
    /// comparison against such implementations.
    Weakest,
}

/// Unit-norm steering vector of one bin, phase-aligned so that its first
/// (reference microphone) entry is real and non-negative.
pub fn steering_vector(target: &Covariance, selection: SteeringSelection) -> ChannelVector {
    let (values, vectors) = linalg::hermitian_eigen(target);
    let magnitudes = values.iter().map(|v| v.abs()).enumerate();
    let picked = match selection {
        SteeringSelection::Dominant => magnitudes.fold((0, f64::NEG_INFINITY), |best, (i, m)| {
            if m > best.1 { (i, m) } else { best }
        }),
        SteeringSelection::Weakest => magnitudes.fold((0, f64::INFINITY), |best, (i, m)| {
            if m < best.1 { (i, m) } else { best }
        }),
    };
    let v = vectors.column(picked.0).into_owned();
    let norm = v.norm();
    if !(norm > 0.0 && norm.is_finite()) {
        let mut e0 = ChannelVector::zeros();
        e0[0] = real(1.0);
        return e0;
    }
    let v = v / real(norm);
    // Eigenvectors are defined up to a phase; pin the reference channel to
    // the non-negative real axis.
    let reference = v[0];
    if reference.norm() > 0.0 {
        v * (reference.conj() / real(reference.norm()))
    } else {
        v
    }
}

/// MVDR weights `w = R_n⁻¹ d / (dᴴ R_n⁻¹ d)` for steering vector `d`.
///
/// `R_n` gets `theta · I` of diagonal loading when its reciprocal condition
/// number is below `theta`. The system is solved by LU rather than by
/// explicit inversion. The result satisfies `wᴴ d = 1`.
pub fn mvdr_weights(noise: &Covariance, steering: &ChannelVector, theta: f64) -> ChannelVector {
    let mut loaded = *noise;
    if linalg::reciprocal_condition(&loaded) < theta {
        loaded += Covariance::identity() * real(theta);
    }

    let numerator = match loaded.lu().solve(steering) {
        Some(n) if n.iter().all(|z| z.re.is_finite() && z.im.is_finite()) => n,
        _ => {
            log::warn!("noise covariance solve failed; falling back to the matched filter");
            *steering
        }
    };
    let denominator = steering.dotc(&numerator);
    if denominator.norm() > 0.0 {
        numerator / denominator
    } else {
        *steering / steering.dotc(steering)
    }
}

/// Per-bin beamformer weights.
#[derive(Debug, Clone)]
pub struct Beamformer {
    steering: Vec<ChannelVector>,
    weights: Vec<ChannelVector>,
}

impl Beamformer {
    /// Design steering vectors and MVDR weights for every bin.
    pub fn design(covariances: &[SpatialCovariances], selection: SteeringSelection, theta: f64) -> Self {
        let design_bin = |covs: &SpatialCovariances| {
            let d = steering_vector(&covs.target, selection);
            (d, mvdr_weights(&covs.noise, &d, theta))
        };

        #[cfg(feature = "parallel")]
        let designed: Vec<(ChannelVector, ChannelVector)> = {
            use rayon::prelude::*;
            covariances.par_iter().map(design_bin).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let designed: Vec<(ChannelVector, ChannelVector)> =
            covariances.iter().map(design_bin).collect();

        let (steering, weights) = designed.into_iter().unzip();
        Self { steering, weights }
    }

    pub fn steering(&self) -> &[ChannelVector] {
        &self.steering
    }

    pub fn weights(&self) -> &[ChannelVector] {
        &self.weights
    }

    /// Apply `wᴴ y` at every time-frequency point.
    ///
    /// Returns a single-channel spectrogram of shape `(bin, frame)`, the
    /// layout the inverse transform expects.
    ///
    /// # Errors
    /// `ShapeMismatch` if the spectrogram has a different number of bins
    /// than the beamformer was designed for.
    pub fn apply(&self, spectrogram: &MultichannelSpectrogram) -> crate::Result<Array2<Complex32>> {
        let bins = spectrogram.num_bins();
        if bins != self.weights.len() {
            return Err(crate::Error::ShapeMismatch {
                expected: format!("{} bins", self.weights.len()),
                got: format!("{bins} bins"),
            });
        }
        let out = Array2::from_shape_fn((bins, spectrogram.num_frames()), |(f, t)| {
            let z = self.weights[f].dotc(&spectrogram.observation(t, f));
            Complex32::new(z.re as f32, z.im as f32)
        });
        Ok(out)
    }
}
