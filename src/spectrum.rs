use crate::fft::RealFftPlan;
use crate::window;
use ndarray::Array2;
use num_complex::Complex32;

/// Short-time Fourier transform parameters.
///
/// With `center` set, the signal is zero-padded by `n_fft / 2` on both
/// sides so that frame `t` is centred on sample `t · hop_length`.
#[derive(Debug, Clone)]
pub struct StftConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    pub center: bool,
    pub window: Vec<f32>,
}

impl StftConfig {
    fn validate(&self) -> crate::Result<()> {
        if self.n_fft == 0 {
            return Err(crate::Error::InvalidSize {
                name: "n_fft",
                value: 0,
                reason: "must be > 0",
            });
        }
        if self.hop_length == 0 {
            return Err(crate::Error::InvalidSize {
                name: "hop_length",
                value: 0,
                reason: "must be > 0",
            });
        }
        if self.window.len() > self.n_fft {
            return Err(crate::Error::InvalidSize {
                name: "window",
                value: self.window.len(),
                reason: "window must not be longer than n_fft",
            });
        }
        Ok(())
    }
}

fn pad_window(window: &[f32], n_fft: usize) -> Vec<f32> {
    if window.len() == n_fft {
        return window.to_vec();
    }
    let mut padded = vec![0.0f32; n_fft];
    let start = (n_fft - window.len()) / 2;
    padded[start..start + window.len()].copy_from_slice(window);
    padded
}

fn pad_center(y: &[f32], n_fft: usize, center: bool) -> Vec<f32> {
    if !center {
        return y.to_vec();
    }
    let pad = n_fft / 2;
    let mut out = vec![0.0f32; y.len() + 2 * pad];
    out[pad..pad + y.len()].copy_from_slice(y);
    out
}

/// Compute the Short-Time Fourier Transform (STFT).
///
/// # Arguments
/// * `y` - Input audio signal
/// * `config` - STFT configuration (FFT size, hop length, window, etc.)
///
/// # Returns
/// Complex STFT matrix of shape (n_freq, n_frames) where n_freq = n_fft/2 + 1
///
/// # Errors
/// Returns an error if the audio is empty or non-finite, or if
/// n_fft/hop_length is zero.
pub fn stft(y: &[f32], config: &StftConfig) -> crate::Result<Array2<Complex32>> {
    crate::utils::valid_audio(y)?;
    config.validate()?;

    let window = pad_window(&config.window, config.n_fft);
    let padded = pad_center(y, config.n_fft, config.center);
    let n_frames = if padded.len() < config.n_fft {
        0
    } else {
        (padded.len() - config.n_fft) / config.hop_length + 1
    };

    let plan = RealFftPlan::new(config.n_fft);
    let n_freq = plan.n_freq();
    let mut stft_matrix = Array2::<Complex32>::zeros((n_freq, n_frames));
    let mut frame_buf = vec![0.0f32; config.n_fft];
    let mut spectrum = plan.make_spectrum();

    for frame in 0..n_frames {
        let start = frame * config.hop_length;
        for (i, slot) in frame_buf.iter_mut().enumerate() {
            *slot = padded[start + i] * window[i];
        }
        plan.forward(&mut frame_buf, &mut spectrum)?;
        for (f, &val) in spectrum.iter().enumerate() {
            stft_matrix[(f, frame)] = val;
        }
    }

    Ok(stft_matrix)
}

/// Compute the Inverse Short-Time Fourier Transform (ISTFT).
///
/// Reconstructs a time-domain signal from its STFT representation using
/// weighted overlap-add synthesis normalised by the window sum-square.
///
/// # Arguments
/// * `stft_matrix` - Complex STFT matrix (n_freq x n_frames)
/// * `config` - STFT configuration (must match the forward STFT)
/// * `length` - Optional output signal length (truncates or zero-pads)
///
/// # Returns
/// Reconstructed time-domain signal
///
/// # Errors
/// Returns an error if the STFT matrix is empty or does not match `n_fft`.
pub fn istft(
    stft_matrix: &Array2<Complex32>,
    config: &StftConfig,
    length: Option<usize>,
) -> crate::Result<Vec<f32>> {
    let (n_freq, n_frames) = stft_matrix.dim();
    if n_freq == 0 || n_frames == 0 {
        return Err(crate::Error::InvalidSize {
            name: "stft_matrix",
            value: 0,
            reason: "STFT matrix must be non-empty",
        });
    }
    config.validate()?;
    if n_freq != config.n_fft / 2 + 1 {
        return Err(crate::Error::ShapeMismatch {
            expected: format!("{} frequency bins", config.n_fft / 2 + 1),
            got: format!("{n_freq} frequency bins"),
        });
    }

    let n_fft = config.n_fft;
    let window = pad_window(&config.window, n_fft);
    let plan = RealFftPlan::new(n_fft);

    let mut y = vec![0.0f32; (n_frames - 1) * config.hop_length + n_fft];
    let window_sums = window::window_sumsquare(&window, n_frames, config.hop_length, n_fft);
    let mut spectrum = plan.make_spectrum();
    let mut frame_buf = vec![0.0f32; n_fft];

    for frame in 0..n_frames {
        for (f, slot) in spectrum.iter_mut().enumerate() {
            *slot = stft_matrix[(f, frame)];
        }
        plan.inverse(&mut spectrum, &mut frame_buf)?;

        let start = frame * config.hop_length;
        for (i, &sample) in frame_buf.iter().enumerate() {
            y[start + i] += sample * window[i];
        }
    }

    for (sample, &wss) in y.iter_mut().zip(window_sums.iter()) {
        if wss > 1e-8 {
            *sample /= wss;
        }
    }

    let start = if config.center { n_fft / 2 } else { 0 };
    let mut out = match length {
        Some(_) => y.get(start..).map(<[f32]>::to_vec).unwrap_or_default(),
        None if config.center && y.len() > 2 * start => y[start..y.len() - start].to_vec(),
        None => y,
    };

    if let Some(len) = length {
        out.resize(len, 0.0);
    }
    Ok(out)
}
