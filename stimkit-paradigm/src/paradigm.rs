use std::path::PathBuf;

use stimkit_core::input::{self, Scan};
use stimkit_core::{Backend, Error, Outcome, PlaybackState, Result, Row, Surface};
use tracing::{debug, error, info};

use crate::config::ParadigmConfig;
use crate::dataset::Dataset;
use crate::descriptor::StimulusDescriptor;

/// An ordered sequence of stimuli played against a single display surface.
///
/// The surface is opened on the first show and closed once the sequence
/// finishes or is aborted. Each pass is one-shot: a finished or aborted
/// paradigm refuses to play again.
pub struct Paradigm<B: Backend> {
    backend: B,
    config: ParadigmConfig,
    stimuli: Vec<StimulusDescriptor>,
    surface: Option<B::Surface>,
    cursor: usize,
    state: PlaybackState,
    dataset: Dataset,
}

impl<B: Backend> Paradigm<B> {
    pub fn new(backend: B, config: ParadigmConfig) -> Self {
        Self {
            backend,
            config,
            stimuli: Vec::new(),
            surface: None,
            cursor: 0,
            state: PlaybackState::Idle,
            dataset: Dataset::new(),
        }
    }

    pub fn with_defaults(backend: B) -> Self {
        Self::new(backend, ParadigmConfig::default())
    }

    /// Append a stimulus after checking its parameters.
    pub fn add_stimulus(&mut self, stimulus: impl Into<StimulusDescriptor>) -> Result<&mut Self> {
        let stimulus = stimulus.into();
        stimulus.validate()?;
        self.stimuli.push(stimulus);
        Ok(self)
    }

    pub fn add_stimuli<I>(&mut self, stimuli: I) -> Result<&mut Self>
    where
        I: IntoIterator,
        I::Item: Into<StimulusDescriptor>,
    {
        for stimulus in stimuli {
            self.add_stimulus(stimulus)?;
        }
        Ok(self)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StimulusDescriptor> {
        self.stimuli.iter()
    }

    pub fn len(&self) -> usize {
        self.stimuli.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stimuli.is_empty()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Index of the next stimulus `play_next` would show.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn config(&self) -> &ParadigmConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Play every remaining stimulus in order, stopping early on quit.
    pub fn play_all(&mut self) -> Result<PlaybackState> {
        self.begin()?;
        info!(stimuli = self.stimuli.len(), from = self.cursor, "playback started");
        while self.cursor < self.stimuli.len() {
            let outcome = self.step(self.cursor)?;
            if outcome.is_quit() {
                return self.conclude(PlaybackState::Aborted);
            }
        }
        self.conclude(PlaybackState::Finished)
    }

    /// Play only the stimulus under the cursor.
    pub fn play_next(&mut self) -> Result<Outcome> {
        if self.cursor >= self.stimuli.len() {
            return Err(Error::Exhausted);
        }
        self.play_stimulus(self.cursor)
    }

    /// Play the stimulus at `index` and move the cursor past it.
    pub fn play_stimulus(&mut self, index: usize) -> Result<Outcome> {
        if index >= self.stimuli.len() {
            return Err(Error::OutOfRange {
                index,
                len: self.stimuli.len(),
            });
        }
        self.begin()?;
        let outcome = self.step(index)?;
        if outcome.is_quit() {
            self.conclude(PlaybackState::Aborted)?;
        } else if self.cursor >= self.stimuli.len() {
            self.conclude(PlaybackState::Finished)?;
        }
        Ok(outcome)
    }

    /// Write the collected rows to the configured destination. Returns the
    /// path written, or `None` when no data output is configured or nothing
    /// was recorded.
    pub fn write_data(&self) -> Result<Option<PathBuf>> {
        let Some(data) = &self.config.data else {
            return Ok(None);
        };
        if self.dataset.is_empty() {
            info!("no rows recorded, skipping data output");
            return Ok(None);
        }
        let path = data.resolved_destination();
        self.dataset.write(&path, data.format)?;
        Ok(Some(path))
    }

    /// Release the display surface. A pass that is still under way counts
    /// as aborted.
    pub fn close(&mut self) {
        if let Some(mut surface) = self.surface.take() {
            surface.close();
            info!("display surface closed");
        }
        if !self.state.is_done() {
            self.state = PlaybackState::Aborted;
        }
    }

    /// Open the display surface on first use and mark the pass as playing.
    fn begin(&mut self) -> Result<()> {
        if self.state.is_done() {
            return Err(Error::AlreadyPlayed(self.state));
        }
        if self.surface.is_none() {
            let surface = self
                .backend
                .open(&self.config.window, self.config.escape_key.clone())?;
            info!(size = ?surface.size(), "display surface opened");
            self.surface = Some(surface);
        }
        self.state = PlaybackState::Playing;
        Ok(())
    }

    fn conclude(&mut self, state: PlaybackState) -> Result<PlaybackState> {
        self.state = state;
        info!(?state, shown = self.cursor, total = self.stimuli.len(), "playback ended");
        let written = self.write_data();
        if let Some(mut surface) = self.surface.take() {
            surface.close();
        }
        written?;
        Ok(state)
    }

    fn step(&mut self, index: usize) -> Result<Outcome> {
        match self.show(index) {
            Ok(outcome) => {
                self.cursor = index + 1;
                Ok(outcome)
            }
            Err(err) => {
                error!(index, error = %err, "stimulus failed, aborting playback");
                self.state = PlaybackState::Aborted;
                Err(err)
            }
        }
    }

    fn show(&mut self, index: usize) -> Result<Outcome> {
        let Some(surface) = self.surface.as_mut() else {
            return Err(Error::SurfaceClosed);
        };
        let surface: &mut dyn Surface = surface;
        if input::scan(&mut *surface, None) == Scan::Quit {
            info!(index, "quit requested before stimulus");
            return Ok(Outcome::Quit);
        }

        let descriptor = &self.stimuli[index];
        debug!(index, kind = descriptor.kind(), "showing stimulus");
        let mut stimulus = descriptor.instantiate(surface)?;
        let outcome = stimulus.show()?;
        if let Some(record) = stimulus.record() {
            let mut row = Row::new();
            row.insert("index".into(), index.into());
            row.extend(record);
            self.dataset.push(row);
        }
        debug!(index, ?outcome, "stimulus done");
        Ok(outcome)
    }
}

impl<B: Backend> Drop for Paradigm<B> {
    fn drop(&mut self) {
        if let Some(mut surface) = self.surface.take() {
            surface.close();
        }
    }
}
