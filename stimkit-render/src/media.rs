use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use image::AnimationDecoder;
use image::codecs::gif::GifDecoder;
use stimkit_core::media::MovieFrame;
use stimkit_core::{Error, Frame, MediaLoader, MovieClip, SoundClip};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as DecodeError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Decodes media from disk: audio through symphonia, movies from animated
/// GIFs or from directories of numbered still frames.
#[derive(Debug, Clone)]
pub struct FileMediaLoader {
    /// Playback rate for frame directories.
    pub frame_rate: f64,
}

impl Default for FileMediaLoader {
    fn default() -> Self {
        Self { frame_rate: 25.0 }
    }
}

impl FileMediaLoader {
    pub fn new(frame_rate: f64) -> Self {
        Self { frame_rate }
    }
}

impl MediaLoader for FileMediaLoader {
    fn load_sound(&self, path: &Path) -> stimkit_core::Result<SoundClip> {
        let (rate, channels, samples) =
            decode_audio(path).map_err(|e| Error::media(path, format!("{e:#}")))?;
        let clip = SoundClip::new(rate, channels, samples)?;
        debug!(path = %path.display(), secs = clip.duration().as_secs_f64(), "sound decoded");
        Ok(clip)
    }

    fn load_movie(&self, path: &Path) -> stimkit_core::Result<MovieClip> {
        let frames = if path.is_dir() {
            self.frame_directory(path)
        } else {
            match extension(path).as_deref() {
                Some("gif") => decode_gif(path),
                _ => Err(anyhow!("only animated GIFs and frame directories are supported")),
            }
        }
        .map_err(|e| Error::media(path, format!("{e:#}")))?;
        if frames.is_empty() {
            return Err(Error::media(path, "movie has no frames"));
        }
        debug!(path = %path.display(), frames = frames.len(), "movie decoded");
        Ok(MovieClip { frames })
    }
}

impl FileMediaLoader {
    fn frame_directory(&self, dir: &Path) -> Result<Vec<MovieFrame>> {
        if !(self.frame_rate > 0.0 && self.frame_rate.is_finite()) {
            bail!("frame rate must be positive, got {}", self.frame_rate);
        }
        let delay = Duration::try_from_secs_f64(1.0 / self.frame_rate)
            .map_err(|_| anyhow!("frame rate {} is too low", self.frame_rate))?;
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                extension(p).is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.as_str()))
            })
            .collect();
        paths.sort();
        paths
            .iter()
            .map(|p| {
                let img = image::open(p)
                    .with_context(|| format!("decoding frame {}", p.display()))?
                    .to_rgba8();
                let (w, h) = (img.width(), img.height());
                Ok(MovieFrame {
                    frame: Frame::new(w, h, img.into_raw())?,
                    delay,
                })
            })
            .collect()
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

fn decode_gif(path: &Path) -> Result<Vec<MovieFrame>> {
    let decoder = GifDecoder::new(BufReader::new(File::open(path)?))?;
    let frames = decoder.into_frames().collect_frames()?;
    frames
        .into_iter()
        .map(|f| {
            let (num, den) = f.delay().numer_denom_ms();
            let delay = Duration::from_secs_f64(num as f64 / den.max(1) as f64 / 1000.0);
            let buffer = f.into_buffer();
            let (w, h) = (buffer.width(), buffer.height());
            Ok(MovieFrame {
                frame: Frame::new(w, h, buffer.into_raw())?,
                delay,
            })
        })
        .collect()
}

/// Decode a whole file to interleaved f32 samples.
fn decode_audio(path: &Path) -> Result<(u32, u16, Vec<f32>)> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = extension(path) {
        hint.with_extension(&ext);
    }
    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("no audio track")?;
    let track_id = track.id;
    let mut rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count());
    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(DecodeError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                rate = Some(spec.rate);
                channels = Some(spec.channels.count());
                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            Err(DecodeError::DecodeError(msg)) => {
                warn!(path = %path.display(), msg, "skipping undecodable packet");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let rate = rate.context("unknown sample rate")?;
    let channels = channels.context("unknown channel layout")?;
    Ok((rate, u16::try_from(channels)?, samples))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifEncoder;
    use image::{Delay, RgbaImage};

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("stimkit-media-{}-{name}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_wav(path: &Path, rate: u32, samples: &[i16]) {
        let data_len = (samples.len() * 2) as u32;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&rate.to_le_bytes());
        bytes.extend_from_slice(&(rate * 2).to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn decodes_pcm_wav() {
        let dir = scratch("wav");
        let path = dir.join("beep.wav");
        write_wav(&path, 8000, &[0, 16384, -16384, 0].repeat(200));
        let clip = FileMediaLoader::default().load_sound(&path).unwrap();
        assert_eq!(clip.sample_rate, 8000);
        assert_eq!(clip.channels, 1);
        assert_eq!(clip.frames(), 800);
        assert!((clip.samples[1] - 0.5).abs() < 1e-3);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn decodes_gif_frames_with_delays() {
        let dir = scratch("gif");
        let path = dir.join("clip.gif");
        {
            let mut encoder = GifEncoder::new(File::create(&path).unwrap());
            let frames = (0..3u8).map(|i| {
                let img = RgbaImage::from_pixel(4, 3, image::Rgba([i * 80, 0, 0, 255]));
                image::Frame::from_parts(img, 0, 0, Delay::from_numer_denom_ms(100, 1))
            });
            encoder.encode_frames(frames).unwrap();
        }
        let movie = FileMediaLoader::default().load_movie(&path).unwrap();
        assert_eq!(movie.frames.len(), 3);
        assert_eq!((movie.frames[0].frame.width, movie.frames[0].frame.height), (4, 3));
        assert_eq!(movie.duration(), Duration::from_millis(300));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn frame_directories_play_in_name_order() {
        let dir = scratch("frames");
        for (name, shade) in [("frame_002.png", 200u8), ("frame_001.png", 100), ("notes.txt", 0)] {
            if name.ends_with(".png") {
                RgbaImage::from_pixel(2, 2, image::Rgba([shade, shade, shade, 255]))
                    .save(dir.join(name))
                    .unwrap();
            } else {
                std::fs::write(dir.join(name), "not a frame").unwrap();
            }
        }
        let movie = FileMediaLoader::new(10.0).load_movie(&dir).unwrap();
        assert_eq!(movie.frames.len(), 2);
        assert_eq!(movie.frames[0].frame.rgba[0], 100);
        assert_eq!(movie.frames[1].delay, Duration::from_millis(100));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn vanishing_frame_rates_are_media_errors() {
        let dir = scratch("slow");
        RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 255]))
            .save(dir.join("frame_001.png"))
            .unwrap();
        for rate in [1e-320, 0.0, f64::NAN] {
            let err = FileMediaLoader::new(rate).load_movie(&dir).unwrap_err();
            assert!(matches!(err, Error::Media { .. }), "{rate}: {err}");
        }
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn unsupported_movies_are_media_errors() {
        let err = FileMediaLoader::default()
            .load_movie(Path::new("clip.mp4"))
            .unwrap_err();
        assert!(matches!(err, Error::Media { .. }));
    }
}
