use crate::error::Result;
use crate::key::KeyPress;
use crate::surface::Surface;

/// One dataset row: named values collected from a stimulus.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// How a call to [`Stimulus::show`] ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The stimulus ran to its natural end.
    Finished,
    /// The stimulus ended on a participant response.
    Responded(KeyPress),
    /// The reserved quit condition was observed; the paradigm must stop.
    Quit,
}

impl Outcome {
    pub fn is_quit(&self) -> bool {
        matches!(self, Outcome::Quit)
    }

    pub fn response(&self) -> Option<&KeyPress> {
        match self {
            Outcome::Responded(press) => Some(press),
            _ => None,
        }
    }
}

/// One unit of sensory presentation.
///
/// Implementations hold a `&mut dyn Surface` for the duration of a single
/// `show`, and must not do blocking work before `show` is called.
pub trait Stimulus {
    /// Short variant name, used in logs and dataset rows.
    fn kind(&self) -> &str;

    /// Present the stimulus, blocking until its end condition.
    fn show(&mut self) -> Result<Outcome>;

    /// Data gathered by the last `show`.
    fn record(&self) -> Option<Row> {
        None
    }
}

/// Builds user-defined stimuli against the shared surface.
pub trait StimulusFactory: Send + Sync {
    fn kind(&self) -> &str;

    fn build<'s>(&self, surface: &'s mut dyn Surface) -> Result<Box<dyn Stimulus + 's>>;
}
