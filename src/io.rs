//! Audio file boundary: decoding multichannel recordings and writing results.
//!
//! Audio is represented as `Array2<f32>` with shape `(channels, samples)`,
//! samples normalised to `[-1.0, 1.0]`.

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use ndarray::Array2;
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Track};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("hound error: {0}")]
    Hound(#[from] hound::Error),
    #[error("symphonia error: {0}")]
    Symphonia(SymphoniaError),
    #[error("no audio track found")]
    NoAudioTrack,
    #[error("unsupported number of channels")]
    UnsupportedChannels,
}

impl From<SymphoniaError> for AudioError {
    fn from(err: SymphoniaError) -> Self {
        Self::Symphonia(err)
    }
}

fn deinterleave(samples: &[f32], channels: usize) -> Array2<f32> {
    let frames = samples.len() / channels.max(1);
    let mut data = Array2::<f32>::zeros((channels, frames));
    for frame in 0..frames {
        for ch in 0..channels {
            data[(ch, frame)] = samples[frame * channels + ch];
        }
    }
    data
}

/// Load a WAV file.
///
/// Integer PCM is scaled by its bit depth; 32-bit float is passed through.
///
/// # Errors
/// Returns `crate::Error::Audio` if the file cannot be read or is invalid
pub fn load_wav<P: AsRef<Path>>(path: P) -> crate::Result<(Array2<f32>, AudioSpec)> {
    let mut reader = WavReader::open(path).map_err(AudioError::Hound)?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(AudioError::UnsupportedChannels.into());
    }

    let mut samples: Vec<f32> = Vec::with_capacity(reader.len() as usize);
    match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, _) => {
            for s in reader.samples::<f32>() {
                samples.push(s.map_err(AudioError::Hound)?);
            }
        }
        (SampleFormat::Int, bits) if bits <= 16 => {
            let scale = (1i32 << (bits - 1)) as f32;
            for s in reader.samples::<i16>() {
                samples.push(s.map_err(AudioError::Hound)? as f32 / scale);
            }
        }
        (SampleFormat::Int, bits) => {
            let scale = (1i64 << (bits - 1)) as f32;
            for s in reader.samples::<i32>() {
                samples.push(s.map_err(AudioError::Hound)? as f32 / scale);
            }
        }
    }

    Ok((
        deinterleave(&samples, spec.channels as usize),
        AudioSpec {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        },
    ))
}

/// Lower-cased file extension, used to pick a decoder.
pub fn detect_format<P: AsRef<Path>>(path: P) -> Option<String> {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_ascii_lowercase())
}

/// Open `path`, detect its container and pick the first track that carries a sample rate.
fn open_track(path: &Path) -> Result<(Box<dyn FormatReader>, Track), AudioError> {
    let mut hint = Hint::new();
    if let Some(ext) = detect_format(path) {
        hint.with_extension(&ext);
    }
    let file = File::open(path).map_err(SymphoniaError::IoError)?;
    let source = MediaSourceStream::new(Box::new(file), Default::default());
    let opened = symphonia::default::get_probe().format(
        &hint,
        source,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let track = opened
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.sample_rate.is_some())
        .cloned()
        .ok_or(AudioError::NoAudioTrack)?;
    Ok((opened.format, track))
}

/// Decode every packet of `track` into one interleaved buffer.
///
/// Corrupt packets are skipped with a warning; end of stream is the
/// unexpected-EOF I/O error symphonia reports after the last packet.
fn decode_interleaved(format: &mut dyn FormatReader, track: &Track) -> Result<Vec<f32>, AudioError> {
    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;
    let mut interleaved = Vec::new();
    let mut buffer: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) if packet.track_id() == track.id => packet,
            Ok(_) => continue,
            Err(SymphoniaError::IoError(err)) if err.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let buf = buffer.get_or_insert_with(|| {
                    SampleBuffer::new(decoded.capacity() as u64, *decoded.spec())
                });
                buf.copy_interleaved_ref(decoded);
                interleaved.extend_from_slice(buf.samples());
            }
            Err(SymphoniaError::DecodeError(err)) => log::warn!("skipping corrupt packet: {err}"),
            Err(err) => return Err(err.into()),
        }
    }
    Ok(interleaved)
}

/// Load any container/codec symphonia can read (FLAC, OGG, MP3, WAV, ...).
///
/// All channels are kept; no mixing or resampling is applied.
pub fn load_audio<P: AsRef<Path>>(path: P) -> Result<(Array2<f32>, AudioSpec), AudioError> {
    let (mut format, track) = open_track(path.as_ref())?;
    let params = &track.codec_params;
    let spec = AudioSpec {
        sample_rate: params.sample_rate.unwrap_or(0),
        channels: params.channels.map_or(0, |c| c.count() as u16),
    };
    if spec.channels == 0 {
        return Err(AudioError::UnsupportedChannels);
    }

    let interleaved = decode_interleaved(format.as_mut(), &track)?;
    log::debug!(
        "decoded {} interleaved samples ({} channels)",
        interleaved.len(),
        spec.channels
    );
    Ok((deinterleave(&interleaved, spec.channels as usize), spec))
}

/// Load a multichannel recording, using hound for WAV and symphonia otherwise.
///
/// ```no_run
/// use cgmm_mvdr::io;
/// let (data, spec) = io::load("array_recording.flac").unwrap();
/// assert_eq!(data.shape()[0], spec.channels as usize);
/// ```
pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<(Array2<f32>, AudioSpec)> {
    match detect_format(&path).as_deref() {
        Some("wav") | Some("wave") => load_wav(path),
        _ => Ok(load_audio(path)?),
    }
}

/// Generate a pure tone.
pub fn tone(frequency: f32, sr: u32, duration: f32) -> Vec<f32> {
    let n_samples = (duration * sr as f32) as usize;
    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sr as f32;
    (0..n_samples)
        .map(|i| (angular_freq * i as f32).sin())
        .collect()
}

/// Save audio data to a WAV file.
///
/// # Arguments
/// * `path` - Path to save the WAV file
/// * `data` - Audio data with shape (channels, frames)
/// * `sample_rate` - Sample rate in Hz
///
/// # Errors
/// Returns `crate::Error::Audio` if the file cannot be written
///
/// # Limitations
/// Only 16-bit integer PCM is written. Samples are clipped to [-1.0, 1.0].
pub fn save_wav<P: AsRef<Path>>(
    path: P,
    data: &Array2<f32>,
    sample_rate: u32,
) -> crate::Result<()> {
    let (channels, frames) = data.dim();
    if channels == 0 || channels > u16::MAX as usize {
        return Err(AudioError::UnsupportedChannels.into());
    }

    let spec = WavSpec {
        channels: channels as u16,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec).map_err(AudioError::Hound)?;
    for frame in 0..frames {
        for ch in 0..channels {
            let sample = data[(ch, frame)].clamp(-1.0, 1.0);
            let s = (sample * i16::MAX as f32) as i16;
            writer.write_sample(s).map_err(AudioError::Hound)?;
        }
    }
    writer.finalize().map_err(AudioError::Hound)?;
    Ok(())
}
