use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stimkit_core::stimuli::{
    Audio, AudioParams, Image, ImageParams, Pause, PauseParams, Text, TextParams, Video,
    VideoParams, VideoRating, VideoRatingParams, WaitForKey, WaitForKeyParams, WaitForTtl,
    WaitForTtlParams,
};
use stimkit_core::media::MAX_TONE_SECS;
use stimkit_core::surface::seconds;
use stimkit_core::{Error, Result, SoundSource, Stimulus, StimulusFactory, Surface};

/// A stimulus variant together with its parameters.
///
/// In JSON the variant name is the key and the parameters are either a
/// positional array or a named object:
/// `{"Text": ["Hello", 1.0]}` or `{"Pause": {"duration": 1}}`.
#[derive(Clone, Serialize, Deserialize)]
pub enum StimulusDescriptor {
    Text(TextParams),
    Image(ImageParams),
    Pause(PauseParams),
    WaitForKey(WaitForKeyParams),
    #[serde(alias = "WaitForTTL")]
    WaitForTtl(WaitForTtlParams),
    Audio(AudioParams),
    Video(VideoParams),
    VideoRating(VideoRatingParams),
    #[serde(skip)]
    Custom(Arc<dyn StimulusFactory>),
}

impl StimulusDescriptor {
    pub fn custom(factory: impl StimulusFactory + 'static) -> Self {
        StimulusDescriptor::Custom(Arc::new(factory))
    }

    pub fn kind(&self) -> &str {
        match self {
            StimulusDescriptor::Text(_) => "text",
            StimulusDescriptor::Image(_) => "image",
            StimulusDescriptor::Pause(_) => "pause",
            StimulusDescriptor::WaitForKey(_) => "wait_for_key",
            StimulusDescriptor::WaitForTtl(_) => "wait_for_ttl",
            StimulusDescriptor::Audio(_) => "audio",
            StimulusDescriptor::Video(_) => "video",
            StimulusDescriptor::VideoRating(_) => "video_rating",
            StimulusDescriptor::Custom(factory) => factory.kind(),
        }
    }

    /// Build a fresh stimulus instance borrowing `surface` for one show.
    pub fn instantiate<'s>(&self, surface: &'s mut dyn Surface) -> Result<Box<dyn Stimulus + 's>> {
        Ok(match self {
            StimulusDescriptor::Text(p) => Box::new(Text::new(surface, p.clone())),
            StimulusDescriptor::Image(p) => Box::new(Image::new(surface, p.clone())),
            StimulusDescriptor::Pause(p) => Box::new(Pause::new(surface, p.clone())),
            StimulusDescriptor::WaitForKey(p) => Box::new(WaitForKey::new(surface, p.clone())),
            StimulusDescriptor::WaitForTtl(p) => Box::new(WaitForTtl::new(surface, p.clone())),
            StimulusDescriptor::Audio(p) => Box::new(Audio::new(surface, p.clone())),
            StimulusDescriptor::Video(p) => Box::new(Video::new(surface, p.clone())),
            StimulusDescriptor::VideoRating(p) => Box::new(VideoRating::new(surface, p.clone())),
            StimulusDescriptor::Custom(factory) => factory.build(surface)?,
        })
    }

    /// Reject parameter values that could only fail once playback is under
    /// way.
    pub fn validate(&self) -> Result<()> {
        match self {
            StimulusDescriptor::Text(p) => {
                seconds(p.duration)?;
                positive("text height", p.height)
            }
            StimulusDescriptor::Image(p) => {
                seconds(p.duration)?;
                if let Some((w, h)) = p.size {
                    positive("image width", w)?;
                    positive("image height", h)?;
                }
                Ok(())
            }
            StimulusDescriptor::Pause(p) => seconds(p.duration).map(drop),
            StimulusDescriptor::WaitForKey(_) => Ok(()),
            StimulusDescriptor::WaitForTtl(p) if p.count == 0 => {
                Err(Error::invalid("wait_for_ttl needs at least one pulse"))
            }
            StimulusDescriptor::WaitForTtl(_) => Ok(()),
            StimulusDescriptor::Audio(p) => {
                if p.volume.is_nan() || p.volume < 0.0 {
                    return Err(Error::invalid(format!("volume {} is negative", p.volume)));
                }
                match &p.value {
                    SoundSource::File(_) => Ok(()),
                    source => match source.frequency() {
                        Some(hz) if hz > 0.0 && hz.is_finite() => {
                            positive("tone length", p.secs as f32)?;
                            if p.secs > MAX_TONE_SECS {
                                return Err(Error::invalid(format!(
                                    "tone of {}s is longer than {MAX_TONE_SECS}s",
                                    p.secs
                                )));
                            }
                            Ok(())
                        }
                        _ => Err(Error::invalid(format!("cannot synthesize {source:?}"))),
                    },
                }
            }
            StimulusDescriptor::Video(p) => match p.movie_dimensions {
                Some((w, h)) => {
                    positive("movie width", w)?;
                    positive("movie height", h)
                }
                None => Ok(()),
            },
            StimulusDescriptor::VideoRating(p) => {
                if p.low >= p.high {
                    return Err(Error::invalid(format!(
                        "rating scale needs low < high, got {}..{}",
                        p.low, p.high
                    )));
                }
                if !(p.low..=p.high).contains(&p.marker_start) {
                    return Err(Error::invalid(format!(
                        "marker start {} lies outside {}..={}",
                        p.marker_start, p.low, p.high
                    )));
                }
                positive("scale width", p.scale_width)
            }
            StimulusDescriptor::Custom(_) => Ok(()),
        }
    }
}

fn positive(what: &str, value: f32) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(Error::invalid(format!("{what} must be positive, got {value}")))
    }
}

impl fmt::Debug for StimulusDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StimulusDescriptor::Text(p) => f.debug_tuple("Text").field(p).finish(),
            StimulusDescriptor::Image(p) => f.debug_tuple("Image").field(p).finish(),
            StimulusDescriptor::Pause(p) => f.debug_tuple("Pause").field(p).finish(),
            StimulusDescriptor::WaitForKey(p) => f.debug_tuple("WaitForKey").field(p).finish(),
            StimulusDescriptor::WaitForTtl(p) => f.debug_tuple("WaitForTtl").field(p).finish(),
            StimulusDescriptor::Audio(p) => f.debug_tuple("Audio").field(p).finish(),
            StimulusDescriptor::Video(p) => f.debug_tuple("Video").field(p).finish(),
            StimulusDescriptor::VideoRating(p) => f.debug_tuple("VideoRating").field(p).finish(),
            StimulusDescriptor::Custom(factory) => {
                f.debug_tuple("Custom").field(&factory.kind()).finish()
            }
        }
    }
}

macro_rules! descriptor_from {
    ($($params:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$params> for StimulusDescriptor {
                fn from(p: $params) -> Self {
                    StimulusDescriptor::$variant(p)
                }
            }
        )*
    };
}

descriptor_from! {
    TextParams => Text,
    ImageParams => Image,
    PauseParams => Pause,
    WaitForKeyParams => WaitForKey,
    WaitForTtlParams => WaitForTtl,
    AudioParams => Audio,
    VideoParams => Video,
    VideoRatingParams => VideoRating,
}

#[cfg(test)]
mod tests {
    use super::*;
    use stimkit_core::stimuli::KeyEvent;

    fn parse(json: &str) -> StimulusDescriptor {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn positional_and_named_forms_agree() {
        let a = parse(r#"{"Text": ["Hello", 1.0]}"#);
        let b = parse(r#"{"Text": {"text": "Hello", "duration": 1.0}}"#);
        match (a, b) {
            (StimulusDescriptor::Text(a), StimulusDescriptor::Text(b)) => {
                assert_eq!(a, b);
                assert_eq!(a, TextParams::new("Hello").duration(1.0));
            }
            other => panic!("expected two Text descriptors, got {other:?}"),
        }
    }

    #[test]
    fn ttl_accepts_the_upper_case_spelling() {
        let d = parse(r#"{"WaitForTTL": []}"#);
        assert_eq!(d.kind(), "wait_for_ttl");
    }

    #[test]
    fn wait_for_key_carries_its_event() {
        let StimulusDescriptor::WaitForKey(p) = parse(r#"{"WaitForKey": [["q"], "exit"]}"#) else {
            panic!("expected WaitForKey");
        };
        assert_eq!(p.event, KeyEvent::Exit);
    }

    #[test]
    fn unknown_variants_fail_to_parse() {
        assert!(serde_json::from_str::<StimulusDescriptor>(r#"{"Flash": [1]}"#).is_err());
        assert!(serde_json::from_str::<StimulusDescriptor>(r#"{"Custom": []}"#).is_err());
    }

    #[test]
    fn validation_catches_bad_values() {
        assert!(StimulusDescriptor::from(PauseParams::new(-1.0)).validate().is_err());
        assert!(StimulusDescriptor::from(PauseParams::new(0.5)).validate().is_ok());

        let ttl = WaitForTtlParams {
            count: 0,
            ..WaitForTtlParams::default()
        };
        assert!(StimulusDescriptor::from(ttl).validate().is_err());

        let note = AudioParams::new(SoundSource::Note("H".into()));
        assert!(StimulusDescriptor::from(note).validate().is_err());
        let tone = AudioParams::new(SoundSource::Tone(440.0));
        assert!(StimulusDescriptor::from(tone).validate().is_ok());

        let rating = VideoRatingParams {
            marker_start: 12,
            ..VideoRatingParams::new("clip.gif")
        };
        assert!(StimulusDescriptor::from(rating).validate().is_err());
    }

    #[test]
    fn durations_beyond_what_playback_can_hold_are_refused() {
        assert!(StimulusDescriptor::from(PauseParams::new(1.8e19)).validate().is_err());
        assert!(StimulusDescriptor::from(TextParams::new("Hi").duration(1e12)).validate().is_err());

        let long_tone = AudioParams {
            secs: MAX_TONE_SECS * 2.0,
            ..AudioParams::new(SoundSource::Tone(440.0))
        };
        assert!(matches!(
            StimulusDescriptor::from(long_tone).validate(),
            Err(Error::InvalidParams(_))
        ));
    }
}
