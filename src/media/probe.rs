//! Чтение длительности аудиофайлов без внешних программ (через Symphonia)

use std::fs::File;
use std::path::Path;

use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{Result, VoiceSyncError};

/// Длительность аудиофайла в секундах.
///
/// Если контейнер знает число кадров, берём его; иначе (MP3 без заголовка
/// Xing/VBRI) считаем кадры по пакетам.
pub fn audio_duration(path: &Path) -> Result<f64> {
    let unreadable =
        |reason: String| VoiceSyncError::UnreadableMedia(format!("{}: {}", path.display(), reason));

    let file = File::open(path).map_err(|e| unreadable(e.to_string()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| unreadable(format!("unsupported format ({})", e)))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| unreadable("no audio track".to_string()))?;

    let track_id = track.id;
    let params = track.codec_params.clone();
    let sample_rate = params
        .sample_rate
        .ok_or_else(|| unreadable("unknown sample rate".to_string()))?;

    if let Some(frames) = params.n_frames {
        return Ok(frames as f64 / f64::from(sample_rate));
    }

    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|e| unreadable(format!("no decoder ({})", e)))?;

    let mut frames: u64 = 0;
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(unreadable(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(decoded) => frames += decoded.frames() as u64,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping corrupt packet in {}: {}", path.display(), e);
            }
            Err(e) => return Err(unreadable(e.to_string())),
        }
    }

    if frames == 0 {
        return Err(unreadable("no decodable audio".to_string()));
    }

    Ok(frames as f64 / f64::from(sample_rate))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Записать WAV с тишиной заданной длительности
    pub(crate) fn write_silent_wav(path: &Path, seconds: f64) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let samples = (seconds * 8000.0).round() as usize;
        for _ in 0..samples {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_wav_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1.wav");
        write_silent_wav(&path, 2.5);

        let duration = audio_duration(&path).unwrap();
        assert!((duration - 2.5).abs() < 0.01, "duration = {duration}");
    }

    #[test]
    fn test_garbage_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.mp3");
        std::fs::write(&path, b"definitely not audio").unwrap();

        assert!(matches!(
            audio_duration(&path),
            Err(VoiceSyncError::UnreadableMedia(_))
        ));
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        assert!(matches!(
            audio_duration(Path::new("/nonexistent/1.mp3")),
            Err(VoiceSyncError::UnreadableMedia(_))
        ));
    }
}
