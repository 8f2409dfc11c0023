//! Multichannel speech enhancement with a CGMM mask estimator and an MVDR
//! beamformer.
//!
//! A 4-channel recording is transformed into per-channel spectrograms. A
//! two-class Complex Gaussian Mixture Model trained by EM then learns, for
//! every frequency bin, a spatial covariance for "noise" and for "noisy"
//! (target plus noise) observations, together with time-frequency
//! responsibilities. The clean-noise covariance and the target covariance
//! derived from the model drive an MVDR beamformer whose single-channel
//! output is transformed back into a waveform.
//!
//! # Quick Start
//!
//! ```rust
//! use cgmm_mvdr::enhance::{EnhanceConfig, enhance};
//! use ndarray::Array2;
//!
//! // Four identical channels carrying a quiet 1 kHz tone at 16 kHz.
//! let tone = cgmm_mvdr::io::tone(1000.0, 16000, 0.25);
//! let audio = Array2::from_shape_fn((4, tone.len()), |(_, i)| tone[i] * 0.01);
//!
//! let out = enhance(&audio, &EnhanceConfig::with_iterations(2)).unwrap();
//! assert_eq!(out.signal.len(), audio.ncols());
//! assert_eq!(out.history.len(), 2);
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`io`] | WAV (hound) and generic (symphonia) decoding, WAV writing |
//! | [`spectrum`] | STFT/ISTFT with weighted overlap-add |
//! | [`frontend`] | Fixed 1024/256 analysis, multichannel spectrogram |
//! | [`linalg`] | 4×4 complex covariance helpers (nalgebra) |
//! | [`stabilize`] | Diagonal loading against ill-conditioning |
//! | [`cgmm`] | EM training, masks, target/noise covariance separation |
//! | [`mvdr`] | Steering vectors, MVDR weights, beamforming |
//! | [`enhance`] | The complete pipeline and the file-level entry point |
//! | [`window`], [`fft`] | Hann window and real FFT plans |
//! | [`utils`] | Input validation |
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T>`]. Ill-conditioned
//! covariances and vanishing likelihoods are never errors: they are
//! repaired by diagonal loading and an additive floor.
//!
//! # Feature Flags
//!
//! | Flag | Description |
//! |------|-------------|
//! | `parallel` | Process frequency bins in parallel with rayon |

#![forbid(unsafe_code)]

pub mod error;
pub use error::{Error, Result};

pub mod cgmm;
pub mod enhance;
pub mod fft;
pub mod frontend;
pub mod io;
pub mod linalg;
pub mod mvdr;
pub mod spectrum;
pub mod stabilize;
pub mod utils;
pub mod window;
