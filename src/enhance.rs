//! End-to-end enhancement: analysis, CGMM training, MVDR design, synthesis.

use crate::cgmm::{CgmmEstimator, EmObserver, IterationStats, Masks};
use crate::frontend;
use crate::mvdr::{Beamformer, SteeringSelection};
use crate::stabilize::THETA;
use ndarray::Array2;
use std::path::Path;

/// Tunable parts of an enhancement pass. The analysis transform is fixed.
#[derive(Debug, Clone)]
pub struct EnhanceConfig {
    /// Number of EM iterations; always run in full.
    pub iterations: usize,
    /// Reciprocal condition threshold and likelihood floor.
    pub theta: f64,
    pub steering: SteeringSelection,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            iterations: 30,
            theta: THETA,
            steering: SteeringSelection::Dominant,
        }
    }
}

impl EnhanceConfig {
    pub fn with_iterations(iterations: usize) -> Self {
        Self {
            iterations,
            ..Self::default()
        }
    }
}

/// Result of [`enhance`].
#[derive(Debug, Clone)]
pub struct Enhancement {
    /// Enhanced mono waveform, same length as the input channels.
    pub signal: Vec<f32>,
    pub masks: Masks,
    pub beamformer: Beamformer,
    /// Objective of every EM iteration, in order.
    pub history: Vec<IterationStats>,
}

/// Enhance a `(4, samples)` recording.
///
/// # Errors
/// Fails on a channel count other than four, on empty or non-finite audio,
/// and on an invalid `theta`.
pub fn enhance(audio: &Array2<f32>, config: &EnhanceConfig) -> crate::Result<Enhancement> {
    enhance_with_observer(audio, config, &mut |_: &IterationStats| {})
}

/// [`enhance`], additionally reporting every EM iteration to `observer`.
pub fn enhance_with_observer<O: EmObserver + ?Sized>(
    audio: &Array2<f32>,
    config: &EnhanceConfig,
    observer: &mut O,
) -> crate::Result<Enhancement> {
    let stft_config = frontend::analysis_config();
    let spectrogram = frontend::analyze(audio, &stft_config)?;

    let mut estimator = CgmmEstimator::new(&spectrogram, config.theta)?;
    let mut history = Vec::with_capacity(config.iterations);
    estimator.train_with_observer(config.iterations, &mut |stats: &IterationStats| {
        history.push(*stats);
        observer.on_iteration(stats);
    });

    let beamformer = Beamformer::design(&estimator.separate(), config.steering, config.theta);
    let enhanced = beamformer.apply(&spectrogram)?;
    let signal = frontend::synthesize(&enhanced, &stft_config, audio.ncols())?;

    log::info!(
        "enhanced {} samples with {} EM iterations",
        signal.len(),
        history.len()
    );

    Ok(Enhancement {
        signal,
        masks: estimator.masks(),
        beamformer,
        history,
    })
}

/// Read a 4-channel recording and return the enhanced mono waveform.
///
/// Nothing is written to disk.
///
/// ```no_run
/// let enhanced = cgmm_mvdr::enhance::enhance_file("array.wav", 10).unwrap();
/// println!("{} samples", enhanced.len());
/// ```
pub fn enhance_file<P: AsRef<Path>>(path: P, iterations: usize) -> crate::Result<Vec<f32>> {
    let (audio, spec) = crate::io::load(path)?;
    log::info!(
        "loaded {} channels x {} samples at {} Hz",
        spec.channels,
        audio.ncols(),
        spec.sample_rate
    );
    let config = EnhanceConfig::with_iterations(iterations);
    Ok(enhance(&audio, &config)?.signal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let cfg = EnhanceConfig::default();
        assert_eq!(cfg.iterations, 30);
        assert_eq!(cfg.theta, 1e-6);
        assert_eq!(cfg.steering, SteeringSelection::Dominant);
        assert_eq!(EnhanceConfig::with_iterations(3).iterations, 3);
    }

    #[test]
    fn output_length_matches_input() {
        let audio = Array2::from_shape_fn((4, 2000), |(c, i)| {
            ((i as f32) * 0.05 + c as f32).sin() * 0.01
        });
        let out = enhance(&audio, &EnhanceConfig::with_iterations(1)).unwrap();
        assert_eq!(out.signal.len(), 2000);
        assert_eq!(out.history.len(), 1);
        assert_eq!(out.masks.noise.dim(), (513, 2000 / 256 + 1));
    }

    #[test]
    fn zero_iterations_still_beamforms() {
        let audio = Array2::from_shape_fn((4, 1500), |(_, i)| ((i as f32) * 0.1).cos() * 0.01);
        let out = enhance(&audio, &EnhanceConfig::with_iterations(0)).unwrap();
        assert!(out.history.is_empty());
        assert!(out.signal.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn rejects_stereo() {
        let audio = Array2::<f32>::zeros((2, 1024));
        assert!(enhance(&audio, &EnhanceConfig::default()).is_err());
    }
}
