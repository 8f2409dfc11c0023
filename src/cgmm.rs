//! Complex Gaussian mixture model over multichannel STFT observations,
//! trained by expectation-maximisation.
//!
//! Each time-frequency observation `y` is modelled as a two-class mixture of
//! zero-mean complex Gaussians `N(y; 0, φ · R)`: a "noise" class and a
//! "noisy" (target plus noise) class. `R` is a per-bin spatial covariance and
//! `φ` a per-frame power normaliser. Bins never interact, so the model is an
//! arena of independent [`BinModel`]s indexed by bin number.
//!
//! Every EM iteration reads a snapshot of the covariances taken at its
//! start. Responsibilities, refreshed scale factors and the M-step
//! accumulation are written into fresh buffers that replace the class
//! parameters only once the bin's pass is complete.

use crate::frontend::MultichannelSpectrogram;
use crate::linalg::{self, ChannelVector, Covariance, NUM_CHANNELS, real};
use crate::stabilize;
use ndarray::Array2;
use std::f64::consts::PI;
use std::path::Path;

/// Parameters of one mixture class at one frequency bin.
#[derive(Debug, Clone)]
pub struct ClassModel {
    /// Spatial covariance `R`.
    pub covariance: Covariance,
    /// Scale factor `φ` per frame, strictly positive.
    pub phi: Vec<f64>,
    /// Responsibility `λ` per frame.
    pub lambda: Vec<f64>,
}

impl ClassModel {
    fn initial(covariance: Covariance, frames: usize) -> Self {
        Self {
            covariance,
            phi: vec![1.0; frames],
            lambda: vec![1.0; frames],
        }
    }
}

/// Inverse and determinant of a stabilized class covariance, fixed for the
/// duration of one pass over a bin.
struct ClassSnapshot {
    inverse: Covariance,
    /// `det(R)`; real because `R` is Hermitian.
    determinant: f64,
}

impl ClassSnapshot {
    fn new(covariance: &Covariance, theta: f64) -> Self {
        let stable = stabilize::stabilize(covariance, theta);
        Self {
            inverse: stable.inverse(theta),
            determinant: stable.matrix.lu().determinant().re,
        }
    }

    /// `φ = real(tr(y·yᴴ · R⁻¹)) / M + θ`.
    fn scale_factor(&self, yyh: &Covariance, theta: f64) -> f64 {
        linalg::trace_product_real(yyh, &self.inverse) / NUM_CHANNELS as f64 + theta
    }

    /// `real(exp(-yᴴ (R⁻¹/φ) y) / (det(φR) · π)) + θ`, clamped to `[θ, f64::MAX]`.
    ///
    /// An undefined value (NaN) is floored to `θ` like any other degenerate
    /// likelihood, so a class that cannot be evaluated never wins a frame.
    fn likelihood(&self, y: &ChannelVector, phi: f64, theta: f64) -> f64 {
        let exponent = y.dotc(&(self.inverse * y)) / real(phi);
        let normalizer = self.determinant * phi.powi(NUM_CHANNELS as i32) * PI;
        let p = (-exponent).exp().re / normalizer + theta;
        if p.is_nan() {
            theta
        } else {
            p.clamp(theta, f64::MAX)
        }
    }
}

/// Normalise two unnormalised likelihoods into posteriors summing to one.
fn responsibilities(p_noise: f64, p_noisy: f64) -> (f64, f64) {
    let scale = p_noise.max(p_noisy);
    let (a, b) = (p_noise / scale, p_noisy / scale);
    let total = a + b;
    (a / total, b / total)
}

/// Write buffer for one class during an EM pass.
struct Accumulator {
    weighted: Covariance,
    lambda_sum: f64,
    phi: Vec<f64>,
    lambda: Vec<f64>,
}

impl Accumulator {
    fn with_capacity(frames: usize) -> Self {
        Self {
            weighted: Covariance::zeros(),
            lambda_sum: 0.0,
            phi: Vec::with_capacity(frames),
            lambda: Vec::with_capacity(frames),
        }
    }

    fn push(&mut self, lambda: f64, phi: f64, yyh: &Covariance) {
        self.weighted += yyh * real(lambda / phi);
        self.lambda_sum += lambda;
        self.phi.push(phi);
        self.lambda.push(lambda);
    }

    fn finish(self) -> ClassModel {
        let covariance = if self.lambda_sum > 0.0 {
            self.weighted / real(self.lambda_sum)
        } else {
            self.weighted
        };
        ClassModel {
            covariance,
            phi: self.phi,
            lambda: self.lambda,
        }
    }
}

/// Observations, outer-product cache and both class models of one bin.
#[derive(Debug, Clone)]
pub struct BinModel {
    observations: Vec<ChannelVector>,
    outer_products: Vec<Covariance>,
    noise: ClassModel,
    noisy: ClassModel,
}

impl BinModel {
    /// Initialise from the observations of one bin: the noisy covariance is
    /// the sample covariance, the noise covariance the identity, and both
    /// scale factors are derived from those.
    fn new(observations: Vec<ChannelVector>, theta: f64) -> Self {
        let frames = observations.len();
        let outer_products: Vec<Covariance> = observations.iter().map(linalg::outer).collect();
        let sample = outer_products
            .iter()
            .fold(Covariance::zeros(), |acc, yyh| acc + yyh)
            / real(frames.max(1) as f64);

        let mut bin = Self {
            observations,
            outer_products,
            noise: ClassModel::initial(Covariance::identity(), frames),
            noisy: ClassModel::initial(sample, frames),
        };
        bin.refresh_phi(theta);
        bin
    }

    fn refresh_phi(&mut self, theta: f64) {
        let noise = ClassSnapshot::new(&self.noise.covariance, theta);
        let noisy = ClassSnapshot::new(&self.noisy.covariance, theta);
        for (t, yyh) in self.outer_products.iter().enumerate() {
            self.noise.phi[t] = noise.scale_factor(yyh, theta);
            self.noisy.phi[t] = noisy.scale_factor(yyh, theta);
        }
    }

    /// One EM iteration. Returns `Σ_t λ·ln p` for (noise, noisy).
    fn em_step(&mut self, theta: f64) -> (f64, f64) {
        let frames = self.observations.len();
        let noise = ClassSnapshot::new(&self.noise.covariance, theta);
        let noisy = ClassSnapshot::new(&self.noisy.covariance, theta);
        let mut next_noise = Accumulator::with_capacity(frames);
        let mut next_noisy = Accumulator::with_capacity(frames);
        let mut objective = (0.0, 0.0);

        for (t, (y, yyh)) in self
            .observations
            .iter()
            .zip(self.outer_products.iter())
            .enumerate()
        {
            let p_noise = noise.likelihood(y, self.noise.phi[t], theta);
            let p_noisy = noisy.likelihood(y, self.noisy.phi[t], theta);
            let (lambda_noise, lambda_noisy) = responsibilities(p_noise, p_noisy);
            objective.0 += lambda_noise * p_noise.ln();
            objective.1 += lambda_noisy * p_noisy.ln();

            next_noise.push(lambda_noise, noise.scale_factor(yyh, theta), yyh);
            next_noisy.push(lambda_noisy, noisy.scale_factor(yyh, theta), yyh);
        }

        self.noise = next_noise.finish();
        self.noisy = next_noisy.finish();
        objective
    }

    /// Target and clean-noise covariances implied by the current posteriors.
    fn separate(&self) -> SpatialCovariances {
        let mut weighted = Covariance::zeros();
        let mut lambda_sum = 0.0;
        for (yyh, &lambda) in self.outer_products.iter().zip(self.noise.lambda.iter()) {
            weighted += yyh * real(lambda);
            lambda_sum += lambda;
        }
        let noise = if lambda_sum > 0.0 {
            weighted / real(lambda_sum)
        } else {
            weighted
        };
        SpatialCovariances {
            target: self.noisy.covariance - noise,
            noise,
        }
    }

    pub fn observations(&self) -> &[ChannelVector] {
        &self.observations
    }

    /// Cached `y·yᴴ` per frame.
    pub fn outer_products(&self) -> &[Covariance] {
        &self.outer_products
    }

    pub fn noise(&self) -> &ClassModel {
        &self.noise
    }

    pub fn noisy(&self) -> &ClassModel {
        &self.noisy
    }
}

/// Covariances handed to the beamformer design for one bin.
#[derive(Debug, Clone, Copy)]
pub struct SpatialCovariances {
    /// `R_x = R_noisy − R_n`; may be indefinite.
    pub target: Covariance,
    /// `R_n`, the λ_noise-weighted average outer product.
    pub noise: Covariance,
}

/// Objective reported after each EM iteration.
///
/// Each component is `mean(λ · ln p)` over every time-frequency point for
/// that class. It is diagnostic only and never stops training.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationStats {
    /// 1-based iteration index.
    pub iteration: usize,
    pub noise: f64,
    pub noisy: f64,
}

impl IterationStats {
    pub fn total(&self) -> f64 {
        self.noise + self.noisy
    }
}

/// Receives the objective once per EM iteration.
pub trait EmObserver {
    fn on_iteration(&mut self, stats: &IterationStats);
}

impl<F: FnMut(&IterationStats)> EmObserver for F {
    fn on_iteration(&mut self, stats: &IterationStats) {
        self(stats)
    }
}

/// Time-frequency responsibilities, each of shape `(bin, frame)`.
#[derive(Debug, Clone)]
pub struct Masks {
    /// Posterior of the noise class.
    pub noise: Array2<f64>,
    /// Posterior of the noisy class; `noise + noisy == 1` everywhere.
    pub noisy: Array2<f64>,
    /// Per bin, the posterior of whichever class has the more diffuse
    /// (higher eigenvalue entropy) covariance.
    pub entropy_noise: Array2<f64>,
}

impl Masks {
    /// Write the masks as `.npy` files into `dir`, creating it if needed.
    ///
    /// Files: `lambda_noise.npy`, `lambda_noisy.npy`, `lambda_noise_entropy.npy`.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> crate::Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        ndarray_npy::write_npy(dir.join("lambda_noise.npy"), &self.noise)?;
        ndarray_npy::write_npy(dir.join("lambda_noisy.npy"), &self.noisy)?;
        ndarray_npy::write_npy(dir.join("lambda_noise_entropy.npy"), &self.entropy_noise)?;
        Ok(())
    }
}

/// CGMM trainer over a whole spectrogram.
#[derive(Debug, Clone)]
pub struct CgmmEstimator {
    bins: Vec<BinModel>,
    num_frames: usize,
    theta: f64,
    iterations_run: usize,
}

impl CgmmEstimator {
    /// Precompute the outer-product cache and initialise every bin.
    ///
    /// # Errors
    /// `InvalidParameter` if `theta` is not a positive finite number.
    pub fn new(spectrogram: &MultichannelSpectrogram, theta: f64) -> crate::Result<Self> {
        if !(theta.is_finite() && theta > 0.0) {
            return Err(crate::Error::InvalidParameter {
                name: "theta",
                value: theta.to_string(),
                reason: "must be positive and finite".to_string(),
            });
        }
        let num_frames = spectrogram.num_frames();
        let observations = |bin: usize| -> Vec<ChannelVector> {
            (0..num_frames)
                .map(|t| spectrogram.observation(t, bin))
                .collect()
        };

        #[cfg(feature = "parallel")]
        let bins: Vec<BinModel> = {
            use rayon::prelude::*;
            (0..spectrogram.num_bins())
                .into_par_iter()
                .map(|f| BinModel::new(observations(f), theta))
                .collect()
        };
        #[cfg(not(feature = "parallel"))]
        let bins: Vec<BinModel> = (0..spectrogram.num_bins())
            .map(|f| BinModel::new(observations(f), theta))
            .collect();

        Ok(Self {
            bins,
            num_frames,
            theta,
            iterations_run: 0,
        })
    }

    /// Run exactly `iterations` EM iterations and return their objectives.
    pub fn train(&mut self, iterations: usize) -> Vec<IterationStats> {
        let mut history = Vec::with_capacity(iterations);
        self.train_with_observer(iterations, &mut |stats: &IterationStats| history.push(*stats));
        history
    }

    /// Run exactly `iterations` EM iterations, reporting each to `observer`.
    ///
    /// There is no convergence test; the count is always honoured.
    pub fn train_with_observer<O: EmObserver + ?Sized>(
        &mut self,
        iterations: usize,
        observer: &mut O,
    ) {
        let points = (self.bins.len() * self.num_frames).max(1) as f64;
        for _ in 0..iterations {
            let theta = self.theta;

            #[cfg(feature = "parallel")]
            let per_bin: Vec<(f64, f64)> = {
                use rayon::prelude::*;
                self.bins
                    .par_iter_mut()
                    .map(|bin| bin.em_step(theta))
                    .collect()
            };
            #[cfg(not(feature = "parallel"))]
            let per_bin: Vec<(f64, f64)> =
                self.bins.iter_mut().map(|bin| bin.em_step(theta)).collect();

            let (noise, noisy) = per_bin
                .iter()
                .fold((0.0, 0.0), |acc, q| (acc.0 + q.0, acc.1 + q.1));
            self.iterations_run += 1;
            let stats = IterationStats {
                iteration: self.iterations_run,
                noise: noise / points,
                noisy: noisy / points,
            };
            log::debug!(
                "epoch {:2}: Q = {:.5} (noise {:.5}, noisy {:.5})",
                stats.iteration,
                stats.total(),
                stats.noise,
                stats.noisy
            );
            observer.on_iteration(&stats);
        }
    }

    pub fn bins(&self) -> &[BinModel] {
        &self.bins
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// Iterations run so far.
    pub fn iterations_run(&self) -> usize {
        self.iterations_run
    }

    /// Eigenvalue entropy of the (noise, noisy) covariance of every bin.
    pub fn covariance_entropy(&self) -> Vec<(f64, f64)> {
        self.bins
            .iter()
            .map(|bin| {
                (
                    linalg::eigen_entropy(&bin.noise.covariance),
                    linalg::eigen_entropy(&bin.noisy.covariance),
                )
            })
            .collect()
    }

    /// Current responsibilities as `(bin, frame)` masks.
    pub fn masks(&self) -> Masks {
        let shape = (self.bins.len(), self.num_frames);
        let noise = Array2::from_shape_fn(shape, |(f, t)| self.bins[f].noise.lambda[t]);
        let noisy = Array2::from_shape_fn(shape, |(f, t)| self.bins[f].noisy.lambda[t]);
        let entropy = self.covariance_entropy();
        let entropy_noise = Array2::from_shape_fn(shape, |(f, t)| {
            let (e_noise, e_noisy) = entropy[f];
            if e_noise > e_noisy {
                noise[(f, t)]
            } else {
                noisy[(f, t)]
            }
        });
        Masks {
            noise,
            noisy,
            entropy_noise,
        }
    }

    /// `R_x` and `R_n` for every bin from the trained model.
    pub fn separate(&self) -> Vec<SpatialCovariances> {
        self.bins.iter().map(BinModel::separate).collect()
    }
}
