use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result, bail};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use stimkit_core::SoundClip;
use tracing::{info, warn};

/// A clip being played and how many output frames it has produced.
struct Voice {
    clip: SoundClip,
    cursor: AtomicUsize,
}

type Slot = Arc<Mutex<Option<Arc<Voice>>>>;

/// The default output device, playing at most one clip at a time.
pub struct AudioOut {
    _stream: Stream,
    current: Slot,
    device_rate: u32,
}

impl AudioOut {
    pub fn open() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("no audio output device")?;
        let supported = device.default_output_config()?;
        let format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let current: Slot = Arc::default();

        let stream = match format {
            SampleFormat::F32 => build::<f32>(&device, &config, current.clone())?,
            SampleFormat::I16 => build::<i16>(&device, &config, current.clone())?,
            SampleFormat::U16 => build::<u16>(&device, &config, current.clone())?,
            other => bail!("unsupported output sample format {other}"),
        };
        stream.play()?;

        info!(
            device = device.name().unwrap_or_default(),
            rate = config.sample_rate.0,
            channels = config.channels,
            %format,
            "audio output opened"
        );
        Ok(Self {
            _stream: stream,
            current,
            device_rate: config.sample_rate.0,
        })
    }

    /// Replace whatever is playing with `clip`, starting from its first sample.
    pub fn play(&self, clip: &SoundClip) {
        if clip.sample_rate != self.device_rate {
            info!(
                clip = clip.sample_rate,
                device = self.device_rate,
                "resampling clip to the device rate"
            );
        }
        let voice = Voice {
            clip: clip.clone(),
            cursor: AtomicUsize::new(0),
        };
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(voice));
    }

    pub fn stop(&self) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

fn build<T>(device: &cpal::Device, config: &StreamConfig, current: Slot) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let rate = config.sample_rate.0;
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            // Never block the audio thread; a contended slot plays silence
            let voice = current.try_lock().ok().and_then(|slot| slot.clone());
            fill(data, channels, rate, voice.as_deref());
        },
        |err| warn!(%err, "audio stream error"),
        None,
    )?;
    Ok(stream)
}

/// Write the next block of `voice` into an interleaved output buffer,
/// resampling by nearest neighbour and mapping channels by index. Output
/// past the end of the clip is silence.
fn fill<T>(data: &mut [T], channels: usize, device_rate: u32, voice: Option<&Voice>)
where
    T: Sample + FromSample<f32>,
{
    let Some(voice) = voice.filter(|_| channels > 0 && device_rate > 0) else {
        data.fill(T::EQUILIBRIUM);
        return;
    };
    let clip = &voice.clip;
    let clip_channels = clip.channels.max(1) as usize;
    let step = clip.sample_rate as f64 / device_rate as f64;
    let start = voice.cursor.fetch_add(data.len() / channels, Ordering::Relaxed);

    for (i, frame) in data.chunks_mut(channels).enumerate() {
        let src = ((start + i) as f64 * step) as usize;
        for (ch, out) in frame.iter_mut().enumerate() {
            let value = if src < clip.frames() {
                clip.samples[src * clip_channels + ch.min(clip_channels - 1)]
            } else {
                0.0
            };
            *out = T::from_sample(value);
        }
    }
}
