use ndarray::Array2;

/// Mean squared error between two signals over their common length.
pub fn mse(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let n = a.len().min(b.len());
    let mut acc = 0.0f32;
    for i in 0..n {
        let d = a[i] - b[i];
        acc += d * d;
    }
    acc / n as f32
}

/// Validate single-channel audio data.
///
/// # Returns
/// `Ok(())` if the signal is non-empty and finite.
///
/// # Example
/// ```
/// use cgmm_mvdr::utils::valid_audio;
///
/// assert!(valid_audio(&[0.0, 0.5, -0.5]).is_ok());
/// assert!(valid_audio(&[]).is_err());
/// assert!(valid_audio(&[f32::NAN]).is_err());
/// ```
pub fn valid_audio(y: &[f32]) -> crate::Result<()> {
    if y.is_empty() {
        return Err(crate::Error::EmptyAudio);
    }

    if !y.iter().all(|&v| v.is_finite()) {
        return Err(crate::Error::NonFiniteAudio);
    }

    Ok(())
}

/// Validate a multichannel recording of shape (channels, samples).
///
/// # Example
/// ```
/// use cgmm_mvdr::utils::valid_multichannel;
/// use ndarray::Array2;
///
/// let y = Array2::<f32>::zeros((4, 16));
/// assert!(valid_multichannel(&y, 4).is_ok());
/// assert!(valid_multichannel(&y, 2).is_err());
/// ```
pub fn valid_multichannel(y: &Array2<f32>, channels: usize) -> crate::Result<()> {
    let (got, samples) = y.dim();
    if got != channels {
        return Err(crate::Error::ChannelCount {
            expected: channels,
            got,
        });
    }
    if samples == 0 {
        return Err(crate::Error::EmptyAudio);
    }
    if !y.iter().all(|v| v.is_finite()) {
        return Err(crate::Error::NonFiniteAudio);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mse_uses_common_length() {
        assert_eq!(mse(&[1.0, 2.0, 3.0], &[1.0, 0.0]), 2.0);
        assert_eq!(mse(&[], &[1.0]), 0.0);
    }

    #[test]
    fn multichannel_rejects_empty_and_nan() {
        let empty = Array2::<f32>::zeros((4, 0));
        assert!(matches!(
            valid_multichannel(&empty, 4),
            Err(crate::Error::EmptyAudio)
        ));

        let mut y = Array2::<f32>::zeros((4, 8));
        y[(2, 3)] = f32::INFINITY;
        assert!(matches!(
            valid_multichannel(&y, 4),
            Err(crate::Error::NonFiniteAudio)
        ));
    }

    #[test]
    fn multichannel_reports_channel_count() {
        let y = Array2::<f32>::zeros((3, 8));
        match valid_multichannel(&y, 4) {
            Err(crate::Error::ChannelCount { expected, got }) => {
                assert_eq!((expected, got), (4, 3));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
