use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use stimkit_core::stimuli::{AudioParams, KeyEvent, PauseParams, TextParams, WaitForKeyParams};
use stimkit_core::{
    DrawCall, Error, HeadlessBackend, Outcome, PlaybackState, Result, SoundSource, Stimulus,
    StimulusFactory, Surface,
};
use stimkit_paradigm::{DataConfig, DataFormat, Paradigm, ParadigmConfig, StimulusDescriptor};
use stimkit_timing::Timer;

/// Counts how many stimuli it builds and how many of them were shown.
#[derive(Clone, Default)]
struct Counter {
    built: Arc<AtomicUsize>,
    shown: Arc<AtomicUsize>,
}

struct Blank<'s> {
    surface: &'s mut dyn Surface,
    shown: Arc<AtomicUsize>,
}

impl Stimulus for Blank<'_> {
    fn kind(&self) -> &str {
        "blank"
    }

    fn show(&mut self) -> Result<Outcome> {
        self.shown.fetch_add(1, Ordering::SeqCst);
        self.surface.clear();
        self.surface.flip()?;
        Ok(Outcome::Finished)
    }
}

impl StimulusFactory for Counter {
    fn kind(&self) -> &str {
        "blank"
    }

    fn build<'s>(&self, surface: &'s mut dyn Surface) -> Result<Box<dyn Stimulus + 's>> {
        self.built.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(Blank {
            surface,
            shown: self.shown.clone(),
        }))
    }
}

impl Counter {
    fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }

    fn shown(&self) -> usize {
        self.shown.load(Ordering::SeqCst)
    }
}

#[test]
fn text_then_pause_finishes() {
    let backend = HeadlessBackend::new();
    let log = backend.log();
    let clock = backend.clock();
    let mut paradigm = Paradigm::with_defaults(backend);
    paradigm
        .add_stimulus(TextParams::new("Hello").duration(1.0))
        .unwrap()
        .add_stimulus(PauseParams::new(1.0))
        .unwrap();

    assert_eq!(paradigm.play_all().unwrap(), PlaybackState::Finished);
    assert_eq!(paradigm.cursor(), 2);
    assert_eq!(log.texts(), ["Hello"]);
    assert_eq!(log.calls().last(), Some(&DrawCall::Closed));
    assert!(clock.since_start() >= Duration::from_secs(2));
}

#[test]
fn exit_key_aborts_before_the_last_text() {
    let backend = HeadlessBackend::new().press("q", 2.5);
    let log = backend.log();
    let mut paradigm = Paradigm::with_defaults(backend);
    paradigm
        .add_stimuli([
            StimulusDescriptor::from(TextParams::new("A").duration(2.0)),
            WaitForKeyParams::new(["q"]).event(KeyEvent::Exit).into(),
            TextParams::new("B").duration(2.0).into(),
        ])
        .unwrap();

    assert_eq!(paradigm.play_all().unwrap(), PlaybackState::Aborted);
    assert_eq!(paradigm.cursor(), 2);
    assert_eq!(log.texts(), ["A"]);
    assert_eq!(paradigm.dataset().len(), 1);
    assert_eq!(paradigm.dataset().rows()[0]["key"], "q");
}

#[test]
fn quit_key_stops_instantiation() {
    let counter = Counter::default();
    let backend = HeadlessBackend::new().press("escape", 0.3).press("c", 0.6);
    let mut paradigm = Paradigm::with_defaults(backend);
    paradigm
        .add_stimuli([
            StimulusDescriptor::custom(counter.clone()),
            WaitForKeyParams::new(["c"]).into(),
            StimulusDescriptor::custom(counter.clone()),
        ])
        .unwrap();

    assert_eq!(paradigm.play_all().unwrap(), PlaybackState::Aborted);
    assert_eq!(counter.built(), 1);
    assert_eq!(counter.shown(), 1);
    assert!(paradigm.dataset().is_empty());
}

#[test]
fn quit_between_stimuli_stops_before_the_next_is_built() {
    let counter = Counter::default();
    let backend = HeadlessBackend::new().press("escape", 0.005);
    let log = backend.log();
    let mut paradigm = Paradigm::with_defaults(backend);
    paradigm
        .add_stimuli([
            StimulusDescriptor::custom(counter.clone()),
            StimulusDescriptor::custom(counter.clone()),
        ])
        .unwrap();

    assert_eq!(paradigm.play_all().unwrap(), PlaybackState::Aborted);
    assert_eq!(counter.built(), 1);
    assert_eq!(counter.shown(), 1);
    assert!(paradigm.dataset().is_empty());
    assert_eq!(log.flips(), 1);
    assert_eq!(log.calls().last(), Some(&DrawCall::Closed));
}

#[test]
fn empty_paradigm_still_opens_and_closes_the_surface() {
    let backend = HeadlessBackend::new();
    let log = backend.log();
    let mut paradigm = Paradigm::with_defaults(backend);

    assert_eq!(paradigm.play_all().unwrap(), PlaybackState::Finished);
    assert_eq!(paradigm.backend().times_opened(), 1);
    assert_eq!(log.calls().last(), Some(&DrawCall::Closed));
}

#[test]
fn every_descriptor_is_shown_once_in_order() {
    let counter = Counter::default();
    let mut paradigm = Paradigm::with_defaults(HeadlessBackend::new());
    paradigm
        .add_stimuli((0..5).map(|_| StimulusDescriptor::custom(counter.clone())))
        .unwrap();

    assert_eq!(paradigm.play_all().unwrap(), PlaybackState::Finished);
    assert_eq!(counter.built(), 5);
    assert_eq!(counter.shown(), 5);
    assert_eq!(paradigm.backend().times_opened(), 1);
}

#[test]
fn stepping_shares_one_surface() {
    let counter = Counter::default();
    let mut paradigm = Paradigm::with_defaults(HeadlessBackend::new());
    paradigm
        .add_stimuli([
            StimulusDescriptor::custom(counter.clone()),
            StimulusDescriptor::custom(counter.clone()),
            StimulusDescriptor::custom(counter.clone()),
        ])
        .unwrap();

    assert_eq!(paradigm.play_next().unwrap(), Outcome::Finished);
    assert_eq!(paradigm.state(), PlaybackState::Playing);
    assert_eq!(paradigm.play_stimulus(2).unwrap(), Outcome::Finished);
    assert_eq!(paradigm.cursor(), 3);
    assert_eq!(paradigm.state(), PlaybackState::Finished);
    assert_eq!(counter.shown(), 2);
    assert_eq!(paradigm.backend().times_opened(), 1);
}

#[test]
fn misuse_is_reported() {
    let mut empty = Paradigm::with_defaults(HeadlessBackend::new());
    assert!(matches!(empty.play_next(), Err(Error::Exhausted)));
    assert!(matches!(
        empty.play_stimulus(3),
        Err(Error::OutOfRange { index: 3, len: 0 })
    ));

    let mut paradigm = Paradigm::with_defaults(HeadlessBackend::new());
    paradigm.add_stimulus(PauseParams::new(0.1)).unwrap();
    assert_eq!(paradigm.play_all().unwrap(), PlaybackState::Finished);
    assert!(matches!(
        paradigm.play_all(),
        Err(Error::AlreadyPlayed(PlaybackState::Finished))
    ));
    assert_eq!(paradigm.backend().times_opened(), 1);
}

#[test]
fn invalid_parameters_are_refused_when_added() {
    let mut paradigm = Paradigm::with_defaults(HeadlessBackend::new());
    let err = paradigm.add_stimulus(PauseParams::new(f64::NAN)).unwrap_err();
    assert!(matches!(err, Error::InvalidParams(_)));
    assert!(paradigm.is_empty());
}

#[test]
fn failures_abort_and_leave_the_surface_open() {
    let backend = HeadlessBackend::new();
    let log = backend.log();
    let mut paradigm = Paradigm::with_defaults(backend);
    paradigm
        .add_stimulus(AudioParams::new(SoundSource::File("missing.wav".into())))
        .unwrap();

    let err = paradigm.play_all().unwrap_err();
    assert!(matches!(err, Error::Media { .. }));
    assert_eq!(paradigm.state(), PlaybackState::Aborted);
    assert!(!log.calls().contains(&DrawCall::Closed));

    paradigm.close();
    assert_eq!(log.calls().last(), Some(&DrawCall::Closed));
}

#[test]
fn responses_are_written_as_csv() {
    let dir = std::env::temp_dir().join(format!("stimkit-data-{}", std::process::id()));
    let path = dir.join("responses.csv");
    let config = ParadigmConfig::default().with_data(DataConfig::new(DataFormat::Csv, &path));
    let backend = HeadlessBackend::new().press("c", 0.5);
    let mut paradigm = Paradigm::new(backend, config);
    paradigm.add_stimulus(WaitForKeyParams::new(["c"])).unwrap();

    assert_eq!(paradigm.play_all().unwrap(), PlaybackState::Finished);
    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, "index,kind,key,time,rt\n0,wait_for_key,c,0.5,0.5\n");
    std::fs::remove_dir_all(&dir).unwrap();
}
