/// Compute a periodic Hann (raised cosine) window.
///
/// The periodic form divides by `n` rather than `n - 1`, which is the
/// DFT-even window used for analysis/synthesis with overlap-add.
///
/// # Arguments
/// * `n` - Window length
///
/// # Returns
/// Hann window of length `n`
pub fn hann(n: usize) -> Vec<f32> {
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![1.0];
    }
    let m = n as f32;
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / m).cos())
        .collect()
}

/// Compute the sum-square envelope of a window across overlapping frames.
///
/// This is the normaliser of weighted overlap-add synthesis: each output
/// sample is divided by the sum of squared window values covering it.
///
/// # Arguments
/// * `window` - Window function values (padded to `n_fft` if shorter)
/// * `n_frames` - Number of frames
/// * `hop_length` - Number of samples between frames
/// * `n_fft` - Frame length in samples
///
/// # Returns
/// An array of length `(n_frames - 1) * hop_length + n_fft`.
pub fn window_sumsquare(
    window: &[f32],
    n_frames: usize,
    hop_length: usize,
    n_fft: usize,
) -> Vec<f32> {
    if window.is_empty() || n_frames == 0 || hop_length == 0 {
        return Vec::new();
    }

    let out_len = (n_frames - 1) * hop_length + n_fft;
    let mut wss = vec![0.0f32; out_len];

    for frame_idx in 0..n_frames {
        let offset = frame_idx * hop_length;
        for (i, &w) in window.iter().enumerate().take(n_fft) {
            wss[offset + i] += w * w;
        }
    }

    wss
}
