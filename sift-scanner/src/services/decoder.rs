//! Preview audio decoding
//!
//! Decodes fetched preview bytes (MP3/AAC/OGG/WAV via symphonia) to mono f32
//! PCM at the classifier rate, resampling with rubato when the clip was
//! encoded at a different rate.

use crate::error::TrackError;
use crate::services::inference::SAMPLE_RATE;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::io::Cursor;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use thiserror::Error;

/// Decode errors
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Unrecognized audio format: {0}")]
    Probe(String),

    #[error("No audio track found in preview")]
    NoTrack,

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Resample failed: {0}")]
    Resample(String),
}

impl From<DecodeError> for TrackError {
    fn from(err: DecodeError) -> Self {
        TrackError::AudioDecodeFailed(err.to_string())
    }
}

/// Audio decode collaborator boundary: compressed preview bytes in, mono
/// sample buffer at the classifier rate out.
pub trait AudioDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<f32>, DecodeError>;
}

/// symphonia-backed decoder producing mono 44.1 kHz f32 samples
pub struct SymphoniaDecoder {
    target_sample_rate: u32,
}

impl Default for SymphoniaDecoder {
    fn default() -> Self {
        SymphoniaDecoder {
            target_sample_rate: SAMPLE_RATE,
        }
    }
}

impl SymphoniaDecoder {
    pub fn new(target_sample_rate: u32) -> Self {
        SymphoniaDecoder { target_sample_rate }
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<f32>, DecodeError> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

        let probed = symphonia::default::get_probe()
            .format(
                &Hint::new(),
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| DecodeError::Probe(e.to_string()))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoTrack)?;

        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.ok_or(DecodeError::NoTrack)?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| DecodeError::Decode(e.to_string()))?;

        let mut samples: Vec<f32> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => return Err(DecodeError::Decode(e.to_string())),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = decoder
                .decode(&packet)
                .map_err(|e| DecodeError::Decode(e.to_string()))?;
            mix_to_mono(&decoded, &mut samples);
        }

        tracing::debug!(
            samples = samples.len(),
            sample_rate,
            "Decoded preview audio"
        );

        if sample_rate != self.target_sample_rate {
            samples = resample_mono(samples, sample_rate, self.target_sample_rate)?;
        }

        Ok(samples)
    }
}

/// Average all channels of one decoded buffer into `out`.
fn mix_to_mono(decoded: &AudioBufferRef, out: &mut Vec<f32>) {
    fn mix<S>(buf: &symphonia::core::audio::AudioBuffer<S>, out: &mut Vec<f32>)
    where
        S: Sample + Copy,
        f32: FromSample<S>,
    {
        let channels = buf.spec().channels.count();
        let frames = buf.frames();
        out.reserve(frames);

        for frame in 0..frames {
            let mut sum = 0.0f32;
            for ch in 0..channels {
                sum += f32::from_sample(buf.chan(ch)[frame]);
            }
            out.push(sum / channels as f32);
        }
    }

    match decoded {
        AudioBufferRef::U8(buf) => mix(buf, out),
        AudioBufferRef::U16(buf) => mix(buf, out),
        AudioBufferRef::U24(buf) => mix(buf, out),
        AudioBufferRef::U32(buf) => mix(buf, out),
        AudioBufferRef::S8(buf) => mix(buf, out),
        AudioBufferRef::S16(buf) => mix(buf, out),
        AudioBufferRef::S24(buf) => mix(buf, out),
        AudioBufferRef::S32(buf) => mix(buf, out),
        AudioBufferRef::F32(buf) => mix(buf, out),
        AudioBufferRef::F64(buf) => mix(buf, out),
    }
}

/// Resample a mono buffer with sinc interpolation, single pass.
fn resample_mono(samples: Vec<f32>, source_rate: u32, target_rate: u32) -> Result<Vec<f32>, DecodeError> {
    if samples.is_empty() {
        return Ok(samples);
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = target_rate as f64 / source_rate as f64;
    let chunk = samples.len();

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk, 1)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

    let output = resampler
        .process(&[samples], None)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

    Ok(output.into_iter().next().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(sample_rate: u32, samples: &[f32]) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let spec = hound::WavSpec {
                channels: 1,
                sample_rate,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            };
            let mut writer =
                hound::WavWriter::new(Cursor::new(&mut out), spec).expect("writer builds");
            for &s in samples {
                writer
                    .write_sample((s * i16::MAX as f32) as i16)
                    .expect("sample written");
            }
            writer.finalize().expect("finalized");
        }
        out
    }

    #[test]
    fn garbage_bytes_fail_to_probe() {
        let decoder = SymphoniaDecoder::default();
        assert!(decoder.decode(&[0u8; 64]).is_err());
    }

    #[test]
    fn decodes_wav_at_target_rate() {
        let one_second: Vec<f32> = (0..SAMPLE_RATE)
            .map(|i| (i as f32 * 0.01).sin() * 0.5)
            .collect();
        let bytes = wav_bytes(SAMPLE_RATE, &one_second);

        let decoder = SymphoniaDecoder::default();
        let samples = decoder.decode(&bytes).expect("decodes");
        assert_eq!(samples.len(), SAMPLE_RATE as usize);
        assert!(samples.iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn resamples_to_target_rate() {
        // Half a second at 22.05 kHz should come out near 22,050 samples at 44.1 kHz
        let clip: Vec<f32> = vec![0.25; (SAMPLE_RATE / 4) as usize];
        let bytes = wav_bytes(SAMPLE_RATE / 2, &clip);

        let decoder = SymphoniaDecoder::default();
        let samples = decoder.decode(&bytes).expect("decodes");

        let expected = clip.len() * 2;
        let tolerance = expected / 100 + 1;
        assert!(
            samples.len().abs_diff(expected) <= tolerance,
            "expected ~{expected} samples, got {}",
            samples.len()
        );
    }

    #[test]
    fn resample_empty_is_empty() {
        assert!(resample_mono(Vec::new(), 48_000, 44_100).unwrap().is_empty());
    }
}
