//! Fixed analysis/synthesis front-end for the 4-channel array.

use crate::linalg::{ChannelVector, NUM_CHANNELS};
use crate::spectrum::{self, StftConfig};
use crate::window;
use ndarray::{Array2, Array3, ArrayView2, Axis};
use num_complex::{Complex32, Complex64};

/// Analysis frame length in samples.
pub const FRAME_LENGTH: usize = 1024;
/// FFT length in samples.
pub const FFT_LENGTH: usize = 1024;
/// Frame shift in samples (75% overlap).
pub const HOP_LENGTH: usize = 256;

/// The analysis configuration every enhancement pass uses: 1024-point
/// frames and FFTs, hop of 256, periodic Hann window, centred frames with
/// zero padding at the edges.
pub fn analysis_config() -> StftConfig {
    StftConfig {
        n_fft: FFT_LENGTH,
        hop_length: HOP_LENGTH,
        center: true,
        window: window::hann(FRAME_LENGTH),
    }
}

/// Complex spectrogram of every channel, indexed `(channel, frame, bin)`.
#[derive(Debug, Clone)]
pub struct MultichannelSpectrogram {
    data: Array3<Complex64>,
}

impl MultichannelSpectrogram {
    /// Wrap an existing `(channel, frame, bin)` tensor.
    ///
    /// # Errors
    /// `ChannelCount` unless there are exactly four channels, `InvalidSize`
    /// when there are no frames or no bins.
    pub fn from_array(data: Array3<Complex64>) -> crate::Result<Self> {
        let (channels, frames, bins) = data.dim();
        if channels != NUM_CHANNELS {
            return Err(crate::Error::ChannelCount {
                expected: NUM_CHANNELS,
                got: channels,
            });
        }
        if frames == 0 {
            return Err(crate::Error::InvalidSize {
                name: "frames",
                value: 0,
                reason: "spectrogram must contain at least one frame",
            });
        }
        if bins == 0 {
            return Err(crate::Error::InvalidSize {
                name: "bins",
                value: 0,
                reason: "spectrogram must contain at least one frequency bin",
            });
        }
        Ok(Self { data })
    }

    pub fn num_channels(&self) -> usize {
        self.data.dim().0
    }

    pub fn num_frames(&self) -> usize {
        self.data.dim().1
    }

    pub fn num_bins(&self) -> usize {
        self.data.dim().2
    }

    /// The multichannel observation at one time-frequency point.
    pub fn observation(&self, frame: usize, bin: usize) -> ChannelVector {
        ChannelVector::from_fn(|c, _| self.data[(c, frame, bin)])
    }

    /// One channel's spectrogram, shape `(frame, bin)`.
    pub fn channel(&self, channel: usize) -> ArrayView2<'_, Complex64> {
        self.data.index_axis(Axis(0), channel)
    }

    pub fn as_array(&self) -> &Array3<Complex64> {
        &self.data
    }
}

/// Transform a `(channels, samples)` recording into its multichannel
/// spectrogram.
///
/// # Errors
/// Fails on a channel count other than four, or on empty or non-finite audio.
pub fn analyze(audio: &Array2<f32>, config: &StftConfig) -> crate::Result<MultichannelSpectrogram> {
    crate::utils::valid_multichannel(audio, NUM_CHANNELS)?;

    let mut data: Option<Array3<Complex64>> = None;
    for (c, row) in audio.outer_iter().enumerate() {
        let y = row.to_vec();
        let stft = spectrum::stft(&y, config)?;
        let (n_bins, n_frames) = stft.dim();
        let tensor =
            data.get_or_insert_with(|| Array3::zeros((NUM_CHANNELS, n_frames, n_bins)));
        for ((f, t), z) in stft.indexed_iter() {
            tensor[(c, t, f)] = Complex64::new(z.re as f64, z.im as f64);
        }
    }

    let data = data.ok_or(crate::Error::EmptyAudio)?;
    log::info!(
        "analyzed {} channels into {} frames x {} bins",
        data.dim().0,
        data.dim().1,
        data.dim().2
    );
    MultichannelSpectrogram::from_array(data)
}

/// Inverse transform of a single-channel `(bin, frame)` spectrogram back to
/// `length` samples.
pub fn synthesize(
    stft_matrix: &Array2<Complex32>,
    config: &StftConfig,
    length: usize,
) -> crate::Result<Vec<f32>> {
    spectrum::istft(stft_matrix, config, Some(length))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn four_channel(samples: usize) -> Array2<f32> {
        Array2::from_shape_fn((NUM_CHANNELS, samples), |(c, i)| {
            ((i as f32) * 0.013 * (c + 1) as f32).sin() * 0.1
        })
    }

    #[test]
    fn fixed_configuration() {
        let cfg = analysis_config();
        assert_eq!(cfg.n_fft, 1024);
        assert_eq!(cfg.hop_length, 256);
        assert_eq!(cfg.window.len(), 1024);
        assert_eq!(cfg.window[0], 0.0);
    }

    #[test]
    fn analysis_shape() {
        let audio = four_channel(4096);
        let spec = analyze(&audio, &analysis_config()).unwrap();
        assert_eq!(spec.num_channels(), 4);
        assert_eq!(spec.num_frames(), 4096 / HOP_LENGTH + 1);
        assert_eq!(spec.num_bins(), FFT_LENGTH / 2 + 1);
        assert_eq!(spec.channel(2).dim(), (spec.num_frames(), spec.num_bins()));
    }

    #[test]
    fn observation_gathers_channels() {
        let audio = four_channel(2048);
        let spec = analyze(&audio, &analysis_config()).unwrap();
        let y = spec.observation(3, 10);
        for c in 0..NUM_CHANNELS {
            assert_eq!(y[c], spec.as_array()[(c, 3, 10)]);
        }
    }

    #[test]
    fn wrong_channel_count_rejected() {
        let audio = Array2::<f32>::zeros((2, 2048));
        assert!(matches!(
            analyze(&audio, &analysis_config()),
            Err(crate::Error::ChannelCount { expected: 4, got: 2 })
        ));
    }

    #[test]
    fn synthesize_inverts_one_channel() {
        let audio = four_channel(3000);
        let cfg = analysis_config();
        let spec = analyze(&audio, &cfg).unwrap();
        let ch0 = spec.channel(0);
        let stft = Array2::from_shape_fn((spec.num_bins(), spec.num_frames()), |(f, t)| {
            let z = ch0[(t, f)];
            Complex32::new(z.re as f32, z.im as f32)
        });
        let y = synthesize(&stft, &cfg, 3000).unwrap();
        for (a, b) in audio.row(0).iter().zip(y.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-4);
        }
    }
}
