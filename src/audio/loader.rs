//! Audio file decoding.
//!
//! WAV goes through hound, FLAC through claxon and Ogg Vorbis through lewton.
//! Everything else (MP3, AAC/M4A, ALAC) is probed by symphonia. All decoders
//! produce interleaved `f32` in [-1, 1] which is then folded down to mono.

use crate::audio::resample::resample;
use crate::error::{BoxError, Error, Result};
use crate::types::AudioClip;
use std::fs::File;
use std::path::Path;

/// Decoded audio at the file's native rate, before any resampling.
pub(crate) struct Decoded {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

/// Decode `path`, resample to `target_sample_rate` and truncate to
/// `max_duration` seconds.
///
/// Fails with `Error::AudioLoad` if the file cannot be decoded or ends up
/// without samples, including the case `max_duration == Some(0.0)`.
pub fn load(path: &Path, target_sample_rate: u32, max_duration: Option<f64>) -> Result<AudioClip> {
    if target_sample_rate == 0 {
        return Err(Error::Config("target sample rate must be positive".into()));
    }
    if let Some(d) = max_duration {
        if !d.is_finite() || d < 0.0 {
            return Err(Error::Config(format!("max_duration ({d}) must be >= 0")));
        }
    }
    if !path.is_file() {
        return Err(Error::audio_load(path, "file not found"));
    }

    let decoded = decode_file(path).map_err(|e| Error::audio_load(path, e))?;
    if decoded.sample_rate == 0 {
        return Err(Error::audio_load(path, "stream reports a sample rate of 0"));
    }
    let mono = downmix(&decoded.samples, decoded.channels);
    if mono.is_empty() {
        return Err(Error::audio_load(path, "no decodable samples"));
    }

    log::debug!(
        "decoded {}: {} frames, {} ch @ {} Hz",
        path.display(),
        mono.len(),
        decoded.channels,
        decoded.sample_rate
    );

    // Truncate before resampling so long recordings don't pay for audio we drop.
    let mut mono = mono;
    if let Some(d) = max_duration {
        // Keep a little filter context; the exact cut happens after resampling.
        let keep = (d * decoded.sample_rate as f64).ceil().min(mono.len() as f64) as usize;
        mono.truncate(keep.saturating_add(512));
    }

    let mut samples = resample(&mono, decoded.sample_rate, target_sample_rate)
        .map_err(|e| Error::audio_load(path, e))?;

    if let Some(d) = max_duration {
        let max_samples = (d * target_sample_rate as f64).floor().min(samples.len() as f64) as usize;
        samples.truncate(max_samples);
    }

    AudioClip::new(samples, target_sample_rate, path)
}

fn decode_file(path: &Path) -> std::result::Result<Decoded, BoxError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "wav" | "wave" => decode_wav(path),
        "flac" => decode_flac(path),
        "ogg" | "oga" => decode_ogg(path),
        _ => decode_symphonia(path, &ext),
    }
}

fn decode_wav(path: &Path) -> std::result::Result<Decoded, BoxError> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.into_samples::<f32>().collect::<std::result::Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };
    Ok(Decoded {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels as usize,
    })
}

fn decode_flac(path: &Path) -> std::result::Result<Decoded, BoxError> {
    let mut reader = claxon::FlacReader::open(path)?;
    let info = reader.streaminfo();
    let scale = (1u64 << (info.bits_per_sample - 1)) as f32;
    let samples = reader
        .samples()
        .map(|s| s.map(|v| v as f32 / scale))
        .collect::<std::result::Result<Vec<f32>, _>>()?;
    Ok(Decoded {
        samples,
        sample_rate: info.sample_rate,
        channels: info.channels as usize,
    })
}

fn decode_ogg(path: &Path) -> std::result::Result<Decoded, BoxError> {
    let file = File::open(path)?;
    let mut reader = lewton::inside_ogg::OggStreamReader::new(file)?;
    let sample_rate = reader.ident_hdr.audio_sample_rate;
    let channels = reader.ident_hdr.audio_channels as usize;
    let mut samples = Vec::new();
    while let Some(packet) = reader.read_dec_packet_itl()? {
        samples.extend(packet.into_iter().map(|s| s as f32 / 32768.0));
    }
    Ok(Decoded {
        samples,
        sample_rate,
        channels,
    })
}

fn decode_symphonia(path: &Path, ext: &str) -> std::result::Result<Decoded, BoxError> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::errors::Error as SymphoniaError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if !ext.is_empty() {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;
    let track = format.default_track().ok_or("no audio track")?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            // A corrupt frame is skipped, the stream carries on.
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("{}: skipping undecodable packet: {e}", path.display());
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        sample_rate = spec.rate;
        channels = spec.channels.count();
        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buf.samples());
    }

    Ok(Decoded {
        samples,
        sample_rate,
        channels: channels.max(1),
    })
}

/// Average interleaved channels into one.
pub(crate) fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("birdcall-loader-{}-{name}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_wav(path: &Path, sample_rate: u32, channels: u16, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            let v = (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sample_rate as f32).sin();
            for _ in 0..channels {
                writer.write_sample((v * 16000.0) as i16).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn downmix_averages_frames() {
        assert_eq!(downmix(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
        assert_eq!(downmix(&[0.25, 0.75], 1), vec![0.25, 0.75]);
    }

    #[test]
    fn loads_wav_at_native_rate() {
        let dir = temp_dir("native");
        let path = dir.join("tone.wav");
        write_wav(&path, 22050, 2, 22050);
        let clip = load(&path, 22050, None).unwrap();
        assert_eq!(clip.sample_rate(), 22050);
        assert_eq!(clip.len(), 22050);
        let peak = clip.samples().iter().fold(0.0f32, |m, v| m.max(v.abs()));
        assert!((peak - 16000.0 / 32768.0).abs() < 1e-3);
    }

    #[test]
    fn resamples_and_truncates() {
        let dir = temp_dir("resample");
        let path = dir.join("tone.wav");
        write_wav(&path, 44100, 1, 44100 * 2);
        let clip = load(&path, 22050, Some(1.5)).unwrap();
        assert_eq!(clip.sample_rate(), 22050);
        assert_eq!(clip.len(), (1.5 * 22050.0) as usize);
    }

    #[test]
    fn huge_duration_keeps_whole_clip() {
        let dir = temp_dir("huge");
        let path = dir.join("tone.wav");
        write_wav(&path, 44100, 1, 44100);
        let clip = load(&path, 22050, Some(1e300)).unwrap();
        assert_eq!(clip.len(), 22050);

        let native = load(&path, 44100, Some(f64::MAX)).unwrap();
        assert_eq!(native.len(), 44100);
    }

    #[test]
    fn zero_duration_is_rejected() {
        let dir = temp_dir("zero");
        let path = dir.join("tone.wav");
        write_wav(&path, 22050, 1, 4096);
        assert!(matches!(load(&path, 22050, Some(0.0)), Err(Error::AudioLoad { .. })));
    }

    #[test]
    fn missing_file_carries_path() {
        let path = Path::new("/definitely/not/here.mp3");
        match load(path, 22050, None) {
            Err(Error::AudioLoad { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn garbage_file_is_a_load_error() {
        let dir = temp_dir("garbage");
        let path = dir.join("noise.mp3");
        std::fs::write(&path, b"this is not audio at all").unwrap();
        assert!(matches!(load(&path, 22050, None), Err(Error::AudioLoad { .. })));
    }
}
