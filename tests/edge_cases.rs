//! Edge case tests for boundary conditions and unusual inputs.
//!
//! Tests cover:
//! - Empty and non-finite audio
//! - Wrong channel counts
//! - Recordings shorter than one frame
//! - Degenerate covariance matrices

use cgmm_mvdr::cgmm::CgmmEstimator;
use cgmm_mvdr::enhance::{EnhanceConfig, enhance};
use cgmm_mvdr::frontend::{self, MultichannelSpectrogram};
use cgmm_mvdr::linalg::{ChannelVector, Covariance, outer, real};
use cgmm_mvdr::mvdr::{SteeringSelection, mvdr_weights, steering_vector};
use cgmm_mvdr::stabilize::{THETA, stabilize};
use cgmm_mvdr::{Error, spectrum};
use ndarray::{Array2, Array3};
use num_complex::{Complex32, Complex64};

// Invalid recordings

#[test]
fn empty_recording() {
    let audio = Array2::<f32>::zeros((4, 0));
    assert!(matches!(
        enhance(&audio, &EnhanceConfig::default()),
        Err(Error::EmptyAudio)
    ));
}

#[test]
fn nan_in_recording() {
    let mut audio = Array2::<f32>::zeros((4, 512));
    audio[(2, 100)] = f32::NAN;
    assert!(matches!(
        enhance(&audio, &EnhanceConfig::default()),
        Err(Error::NonFiniteAudio)
    ));
}

#[test]
fn wrong_channel_counts() {
    for channels in [1, 2, 3, 5, 8] {
        let audio = Array2::<f32>::zeros((channels, 512));
        match frontend::analyze(&audio, &frontend::analysis_config()) {
            Err(Error::ChannelCount { expected: 4, got }) => assert_eq!(got, channels),
            other => panic!("{channels} channels: unexpected {other:?}"),
        }
    }
}

#[test]
fn spectrogram_needs_four_channels_and_data() {
    assert!(MultichannelSpectrogram::from_array(Array3::zeros((3, 4, 4))).is_err());
    assert!(MultichannelSpectrogram::from_array(Array3::zeros((4, 0, 4))).is_err());
    assert!(MultichannelSpectrogram::from_array(Array3::zeros((4, 4, 0))).is_err());
}

#[test]
fn invalid_theta() {
    let spec = MultichannelSpectrogram::from_array(Array3::zeros((4, 2, 2))).unwrap();
    for theta in [0.0, -1e-6, f64::NAN, f64::INFINITY] {
        assert!(CgmmEstimator::new(&spec, theta).is_err());
    }
}

// Short recordings

#[test]
fn single_sample_recording() {
    let audio = Array2::from_elem((4, 1), 0.01f32);
    let out = enhance(&audio, &EnhanceConfig::with_iterations(2)).unwrap();
    assert_eq!(out.signal.len(), 1);
    assert!(out.signal[0].is_finite());
    assert_eq!(out.masks.noise.dim(), (513, 1));
}

#[test]
fn shorter_than_one_frame() {
    let audio = Array2::from_shape_fn((4, 300), |(c, i)| ((i + c) as f32 * 0.1).sin() * 0.01);
    let out = enhance(&audio, &EnhanceConfig::with_iterations(3)).unwrap();
    assert_eq!(out.signal.len(), 300);
    assert!(out.signal.iter().all(|v| v.is_finite()));
}

#[test]
fn zero_iterations_still_beamform() {
    let audio = Array2::from_shape_fn((4, 2048), |(c, i)| ((i * (c + 1)) as f32 * 0.01).sin() * 0.01);
    let out = enhance(&audio, &EnhanceConfig::with_iterations(0)).unwrap();
    assert!(out.history.is_empty());
    assert_eq!(out.signal.len(), 2048);
    assert!(out.signal.iter().all(|v| v.is_finite()));
}

// Degenerate matrices

#[test]
fn stabilize_zero_matrix() {
    let st = stabilize(&Covariance::zeros(), THETA);
    assert_eq!(st.loadings, 1);
    assert!(st.is_stable(THETA));
}

#[test]
fn stabilize_non_finite_matrix_is_bounded() {
    let mut m = Covariance::identity();
    m[(1, 1)] = real(f64::INFINITY);
    let st = stabilize(&m, THETA);
    assert_eq!(st.loadings, 6);
    assert!(!st.is_stable(THETA));
}

#[test]
fn rank_one_noise_still_gives_finite_weights() {
    let d = ChannelVector::from_element(real(0.5));
    let noise = outer(&ChannelVector::new(real(1.0), real(-1.0), real(0.0), real(0.0)));
    let w = mvdr_weights(&noise, &d, THETA);
    assert!(w.iter().all(|z| z.re.is_finite() && z.im.is_finite()));
    let response = w.dotc(&d);
    assert!((response - Complex64::new(1.0, 0.0)).norm() < 1e-8);
}

#[test]
fn steering_of_identity_is_unit_norm() {
    for selection in [SteeringSelection::Dominant, SteeringSelection::Weakest] {
        let s = steering_vector(&Covariance::identity(), selection);
        assert!((s.norm() - 1.0).abs() < 1e-12);
    }
}

#[test]
fn istft_rejects_wrong_bin_count() {
    let stft = Array2::<Complex32>::zeros((100, 4));
    assert!(spectrum::istft(&stft, &frontend::analysis_config(), Some(1000)).is_err());
}
