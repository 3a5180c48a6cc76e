use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use rand::Rng;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::core::ffutils::FfTool;

/// Decibel shift applied to the track: either nothing or a just-shy-of-audible
/// 1 dB cut. The point is a changed checksum, not a changed sound.
pub fn draw_gain_db(rng: &mut impl Rng) -> i32 {
    rng.gen_range(-1..1)
}

pub fn gain_factor(db: i32) -> f32 {
    10f32.powf(db as f32 / 20.0)
}

/// Decode `track`, nudge the amplitude by `db`, and write a 16-bit WAV next to
/// it. The remux step re-encodes to AAC anyway, so WAV keeps this hop lossless.
pub fn disguise_track(track: &Path, db: i32) -> Result<PathBuf> {
    let out_path = FfTool::sibling(track, "furtif", "wav");
    let gain = gain_factor(db);

    let file = File::open(track)
        .with_context(|| format!("cannot open audio track {}", track.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = track.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .with_context(|| format!("unrecognized audio container {}", track.display()))?;
    let mut format = probed.format;

    let track_info = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow!("no decodable audio track in {}", track.display()))?;
    let track_id = track_info.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track_info.codec_params, &DecoderOptions::default())
        .context("unsupported audio codec")?;

    let mut writer: Option<hound::WavWriter<BufWriter<File>>> = None;
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // A corrupt packet is recoverable; skip it
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));

            let wav_spec = hound::WavSpec {
                channels: spec.channels.count() as u16,
                sample_rate: spec.rate,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            };
            writer = Some(
                hound::WavWriter::create(&out_path, wav_spec)
                    .with_context(|| format!("cannot create {}", out_path.display()))?,
            );
        }

        if let (Some(buf), Some(wav)) = (sample_buf.as_mut(), writer.as_mut()) {
            buf.copy_interleaved_ref(decoded);
            for &sample in buf.samples() {
                let scaled = (sample * gain).clamp(-1.0, 1.0);
                wav.write_sample((scaled * i16::MAX as f32) as i16)?;
            }
        }
    }

    match writer {
        Some(wav) => {
            wav.finalize()?;
            Ok(out_path)
        }
        None => Err(anyhow!("no audio frames decoded from {}", track.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::f32::consts::TAU;

    #[test]
    fn test_gain_factor_matches_decibel_math() {
        assert!((gain_factor(0) - 1.0).abs() < 1e-6);
        assert!((gain_factor(-1) - 0.891).abs() < 1e-3);
    }

    #[test]
    fn test_drawn_gain_is_noop_or_one_db_cut() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..100 {
            let db = draw_gain_db(&mut rng);
            assert!(db == 0 || db == -1, "unexpected gain {}", db);
        }
    }

    #[test]
    fn test_disguise_preserves_length_and_scales_amplitude() {
        let dir = tempfile::tempdir().unwrap();
        let track = dir.path().join("tone.wav");

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&track, spec).unwrap();
        for i in 0..8000u32 {
            let t = i as f32 / 8000.0;
            let sample = ((t * 440.0 * TAU).sin() * 0.5 * i16::MAX as f32) as i16;
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();

        let out = disguise_track(&track, -1).unwrap();
        assert_eq!(out, dir.path().join("tone_furtif.wav"));

        let mut reader = hound::WavReader::open(&out).unwrap();
        assert_eq!(reader.spec().sample_rate, 8000);
        assert_eq!(reader.spec().channels, 1);

        let samples: Vec<i16> = reader.samples().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 8000);

        let peak = samples.iter().map(|s| s.unsigned_abs() as f32).fold(0.0, f32::max)
            / i16::MAX as f32;
        // 0.5 peak attenuated by 1 dB is about 0.4455
        assert!((peak - 0.4455).abs() < 0.01, "peak {}", peak);
    }

    #[test]
    fn test_zero_db_round_trip_keeps_amplitude() {
        let dir = tempfile::tempdir().unwrap();
        let track = dir.path().join("flat.wav");

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&track, spec).unwrap();
        for _ in 0..1000 {
            writer.write_sample((0.25 * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();

        let out = disguise_track(&track, 0).unwrap();
        let mut reader = hound::WavReader::open(&out).unwrap();
        let samples: Vec<i16> = reader.samples().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 1000);
        let peak = samples[0] as f32 / i16::MAX as f32;
        assert!((peak - 0.25).abs() < 0.001, "peak {}", peak);
    }
}
